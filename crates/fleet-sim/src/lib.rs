//! Tick-driven motion of actors along looping routes.
//!
//! [`SimulationState`] is the pure per-actor state machine. [`Simulator`]
//! owns one tokio task per running actor and publishes every tick as a
//! [`SimulationEvent`] on a broadcast channel.

mod catalog;
mod driver;
mod error;
mod route;
mod state;

pub use catalog::predefined_routes;
pub use driver::{Simulator, SimulatorConfig, StopOutcome};
pub use error::SimulationError;
pub use route::{Route, RoutePoint};
pub use state::{SimulationEvent, SimulationState, TickOutcome};
