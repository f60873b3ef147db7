pub mod error;
pub mod ids;
pub mod time;

pub use error::{ErrorCode, FleetError, FleetResult};
pub use ids::{ActorId, OrderId, PolygonId, RunId, ShipmentId};
pub use time::{now_epoch_millis, EpochMillis};
