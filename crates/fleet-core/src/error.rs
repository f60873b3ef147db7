use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidCoordinate,
    MalformedPolygon,
    AlreadyRunning,
    InvalidRoute,
    InvalidSpeed,
    NotRunning,
    Storage,
    Internal,
}

impl ErrorCode {
    /// Errors caused by caller input; transports map these to 4xx.
    pub fn is_client_error(self) -> bool {
        !matches!(self, Self::Storage | Self::Internal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetError {
    pub code: ErrorCode,
    pub message: String,
}

impl FleetError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_coordinate(lat: f64, lng: f64) -> Self {
        Self::new(
            ErrorCode::InvalidCoordinate,
            format!("coordinate out of range or not finite: lat={lat}, lng={lng}"),
        )
    }
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for FleetError {}

pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_exclude_internal_faults() {
        assert!(ErrorCode::InvalidCoordinate.is_client_error());
        assert!(ErrorCode::AlreadyRunning.is_client_error());
        assert!(ErrorCode::NotRunning.is_client_error());
        assert!(!ErrorCode::Storage.is_client_error());
        assert!(!ErrorCode::Internal.is_client_error());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = FleetError::invalid_coordinate(91.0, 0.0);
        let rendered = err.to_string();
        assert!(rendered.starts_with("InvalidCoordinate:"));
        assert!(rendered.contains("lat=91"));
    }
}
