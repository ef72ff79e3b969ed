use bevy_ecs::prelude::World;
use fleet_core::ecs::ClientState;
use fleet_core::error::SimError;
use fleet_core::matching::AlgorithmKind;
use fleet_core::scenario::{build_scenario, NamedParams, ScenarioParams};
use fleet_core::world::snapshot;

#[test]
fn scenario_params_read_from_json_with_defaults() {
    let json = r#"{ "taxiCount": 3, "clientCount": 7, "width": 30, "height": 20, "seed": 5 }"#;
    let params: ScenarioParams = serde_json::from_str(json).expect("valid json");

    assert_eq!(params.taxi_count, 3);
    assert_eq!(params.client_count, 7);
    assert_eq!(params.seed, Some(5));
    assert_eq!(params.taxi_seat_count, ScenarioParams::default().taxi_seat_count);

    let mut world = World::new();
    build_scenario(&mut world, &params).expect("valid scenario");
    let snapshot = snapshot(&mut world);
    assert_eq!(snapshot.taxis.len(), 3);
    assert_eq!(snapshot.clients.len(), 7);
    assert!(snapshot
        .clients
        .iter()
        .all(|client| client.state == ClientState::Waiting && snapshot.bounds.contains(client.origin)));
}

#[test]
fn named_params_are_a_plain_json_object() {
    let json = r#"{ "InitialSearchRadius": 15, "RadiusIncreaseFactor": 3, "ParallelEvaluation": 0 }"#;
    let params: NamedParams = serde_json::from_str(json).expect("valid json");
    assert_eq!(params.get("InitialSearchRadius"), Some(15));
    assert!(!params.flag("ParallelEvaluation", true));

    let encoded = serde_json::to_value(&params).expect("serializable");
    assert_eq!(encoded["RadiusIncreaseFactor"], 3);

    let algorithm = AlgorithmKind::Distributed.build(&params).expect("valid params");
    assert_eq!(algorithm.name(), "distributed");
}

#[test]
fn named_params_configure_scenarios() {
    let params: NamedParams = serde_json::from_str(r#"{ "taxiCount": 2, "clientCount": -1 }"#)
        .expect("valid json");
    assert!(matches!(
        ScenarioParams::from_named(&params),
        Err(SimError::InvalidParameter { name, .. }) if name == "clientCount"
    ));
}

#[test]
fn algorithms_parse_by_name() {
    assert_eq!(
        "Distributed".parse::<AlgorithmKind>().expect("known"),
        AlgorithmKind::Distributed
    );
    assert_eq!(
        " group-by-bearing ".parse::<AlgorithmKind>().expect("known"),
        AlgorithmKind::GroupByBearing
    );
    assert!(matches!(
        "hungarian".parse::<AlgorithmKind>(),
        Err(SimError::UnknownAlgorithm(name)) if name == "hungarian"
    ));
}

#[test]
fn unseeded_scenarios_still_respect_bounds() {
    let params = ScenarioParams::default()
        .with_fleet(4, 3, 5)
        .with_clients(20, 1)
        .with_bounds(2, 1);
    let mut world = World::new();
    build_scenario(&mut world, &params).expect("valid scenario");

    let snapshot = snapshot(&mut world);
    for client in &snapshot.clients {
        assert_ne!(client.origin, client.destination);
        assert!(snapshot.bounds.contains(client.destination));
    }
}
