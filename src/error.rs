use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RoomRelayError {
    // Messages errors
    MessageParseError(String),

    // Validation errors
    MissingField(&'static str),
    InvalidState(String),

    // Game service errors
    ServiceUnavailable(String),
    ServiceStatus(u16),
    ServiceResponse(String),

    // Hub errors
    HubUnavailable,

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for RoomRelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MissingField(field) => write!(f, "Missing required field: {}", field),
            Self::InvalidState(msg) => write!(f, "Invalid session state: {}", msg),
            Self::ServiceUnavailable(msg) => write!(f, "Game service unavailable: {}", msg),
            Self::ServiceStatus(code) => write!(f, "Game service returned HTTP {}", code),
            Self::ServiceResponse(msg) => write!(f, "Unexpected game service response: {}", msg),
            Self::HubUnavailable => write!(f, "Hub is no longer running"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RoomRelayError {}

impl From<reqwest::Error> for RoomRelayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RoomRelayError::ServiceStatus(status.as_u16()),
            None if err.is_decode() => RoomRelayError::ServiceResponse(err.to_string()),
            None => RoomRelayError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RoomRelayError {
    fn from(err: serde_json::Error) -> Self {
        RoomRelayError::MessageParseError(err.to_string())
    }
}

// Generic result type for the relay
pub type Result<T> = std::result::Result<T, RoomRelayError>;
