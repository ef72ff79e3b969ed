pub mod clock;
pub mod dispatch;
pub mod movement;
pub mod telemetry_snapshot;
