mod support;

use bevy_ecs::prelude::{Entity, World};
use fleet_core::error::{SimError, StateViolation};
use fleet_core::geometry::Position;
use fleet_core::matching::{NearestTaxi, StepStatus};
use fleet_core::runner::{RunnerConfig, Simulation};
use fleet_core::taxi::Taxi;
use fleet_core::test_helpers::{
    create_test_world, dispatch_once, spawn_test_client, spawn_test_taxi,
};
use fleet_core::world::{ViolationLog, ViolationPolicy};

/// A taxi heading for a pickup whose client no longer exists.
fn orphaned_pickup() -> (World, Entity, Entity) {
    let mut world = create_test_world();
    let taxi = spawn_test_taxi(&mut world, Position::new(0, 0), 2, 10);
    let client = spawn_test_client(&mut world, 0, Position::new(5, 0), Position::new(9, 0));
    assert_eq!(dispatch_once(&mut world, &mut NearestTaxi).status, StepStatus::Found);
    assert!(world.despawn(client));
    (world, taxi, client)
}

#[test]
fn fail_policy_aborts_the_tick() {
    let (world, _, client) = orphaned_pickup();
    let mut simulation = Simulation::from_world(
        world,
        Box::new(NearestTaxi),
        RunnerConfig::default().with_violation_policy(ViolationPolicy::Fail),
    );

    match simulation.step() {
        Err(SimError::StateViolation { time, violation }) => {
            assert_eq!(time, 1);
            assert_eq!(violation, StateViolation::MissingEntity(client));
        }
        other => panic!("expected a state violation, got {other:?}"),
    }
}

#[test]
fn fatal_violation_is_reported_once() {
    let (world, _, _) = orphaned_pickup();
    let mut simulation =
        Simulation::from_world(world, Box::new(NearestTaxi), RunnerConfig::default());
    assert!(simulation.is_finished());
    assert!(simulation.step().is_err());
    assert!(simulation.step().is_ok());
}

#[test]
fn log_and_continue_skips_and_records() {
    let (world, taxi, client) = orphaned_pickup();
    let mut simulation = Simulation::from_world(
        world,
        Box::new(NearestTaxi),
        RunnerConfig::default().with_violation_policy(ViolationPolicy::LogAndContinue),
    );

    simulation.step().expect("skipped");
    simulation.step().expect("skipped");

    let log = simulation.world().resource::<ViolationLog>();
    assert_eq!(log.policy(), ViolationPolicy::LogAndContinue);
    assert_eq!(log.recorded(), &[StateViolation::MissingEntity(client)]);

    // The taxi kept driving its route past the skipped pickup.
    let taxi = simulation.world().get::<Taxi>(taxi).expect("taxi");
    assert_eq!(taxi.position(), Position::new(9, 0));
    assert!(taxi.is_idle());
}
