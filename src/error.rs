use serde_json::Value;
use thiserror::Error;

pub const GENERIC_FAILURE: &str = "request failed";
pub const CONNECTION_FAILED: &str = "connection failed";
pub const MALFORMED_RESPONSE: &str = "malformed response from server";
pub const NOT_FOUND: &str = "resource does not exist";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table not found: {0}")]
    TableNotFound(String),
}

/// Local, pre-network failures. These never reach the Gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{label} is required")]
    MissingRequiredField { key: String, label: String },
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("{label}: '{input}' is not a number")]
    InvalidNumber { label: String, input: String },
    #[error("{label}: '{value}' is not one of the allowed options")]
    InvalidOption { label: String, value: String },
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("{0} is read-only")]
    ReadOnlyField(String),
    #[error("{label} does not accept this kind of input")]
    InputMismatch { label: String },
}

/// Normalized failure of a single Gateway call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("{message}")]
    Auth {
        status: u16,
        message: String,
        data: Option<Value>,
    },
    #[error("{message}")]
    NotFound { message: String, data: Option<Value> },
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        data: Option<Value>,
    },
    #[error("{message}")]
    Transport { message: String },
}

impl GatewayError {
    /// HTTP status of the failed call; 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Auth { status, .. } | GatewayError::Server { status, .. } => *status,
            GatewayError::NotFound { .. } => 404,
            GatewayError::Transport { .. } => 0,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Auth { message, .. }
            | GatewayError::NotFound { message, .. }
            | GatewayError::Server { message, .. }
            | GatewayError::Transport { message } => message,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            GatewayError::Auth { data, .. }
            | GatewayError::NotFound { data, .. }
            | GatewayError::Server { data, .. } => data.as_ref(),
            GatewayError::Transport { .. } => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth { .. })
    }
}

/// Caller defects: reaching one of these means the calling code is wrong,
/// not that the user did something wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgrammingError {
    #[error("table '{0}' is read-only")]
    ReadOnlyTable(String),
    #[error("cannot {action} while {state}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },
    #[error("record has no id")]
    MissingRecordId,
    #[error("'{0}' is not a usable record id")]
    InvalidRecordId(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Programming(#[from] ProgrammingError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_reports_status_zero() {
        let err = GatewayError::Transport {
            message: CONNECTION_FAILED.to_string(),
        };
        assert_eq!(err.status(), 0);
        assert_eq!(err.message(), "connection failed");
        assert!(err.data().is_none());
    }

    #[test]
    fn test_validation_message_uses_label() {
        let err = ValidationError::MissingRequiredField {
            key: "nombre".to_string(),
            label: "Nombre".to_string(),
        };
        assert_eq!(err.to_string(), "Nombre is required");
    }

    #[test]
    fn test_gateway_errors_display_server_message_verbatim() {
        let auth = GatewayError::Auth {
            status: 401,
            message: "Token expirado".to_string(),
            data: None,
        };
        assert_eq!(auth.to_string(), "Token expirado");
        assert_eq!(auth.status(), 401);
        let server = GatewayError::Server {
            status: 422,
            message: "El correo ya existe".to_string(),
            data: None,
        };
        assert_eq!(Error::Gateway(server.clone()).to_string(), "El correo ya existe");
        assert_eq!(server.status(), 422);
    }
}
