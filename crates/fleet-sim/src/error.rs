use fleet_core::{ActorId, ErrorCode, FleetError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("simulation already running for actor {0}")]
    AlreadyRunning(ActorId),
    #[error("no simulation running for actor {0}")]
    NotRunning(ActorId),
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error("invalid speed: {0} km/h")]
    InvalidSpeed(f64),
}

impl SimulationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRunning(_) => ErrorCode::AlreadyRunning,
            Self::NotRunning(_) => ErrorCode::NotRunning,
            Self::InvalidRoute(_) => ErrorCode::InvalidRoute,
            Self::InvalidSpeed(_) => ErrorCode::InvalidSpeed,
        }
    }
}

impl From<SimulationError> for FleetError {
    fn from(value: SimulationError) -> Self {
        FleetError::new(value.code(), value.to_string())
    }
}
