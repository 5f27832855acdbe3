use thiserror::Error;

/// Failures talking to the push gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway transport error: {message}")]
    Transport { message: String },

    #[error("Gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Gateway rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Invalid gateway response: {message}")]
    InvalidResponse { message: String },

    #[error("Gateway configuration error: {message}")]
    Configuration { message: String },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status to the matching variant
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status },
            _ => Self::Status {
                status,
                body: body.into(),
            },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GatewayError::from_status(status.as_u16(), err.to_string()),
            None => GatewayError::transport(err.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            GatewayError::from_status(401, ""),
            GatewayError::Unauthorized { status: 401 }
        ));
        let err = GatewayError::from_status(404, "<!DOCTYPE html>");
        assert!(err.to_string().contains("HTTP 404"));
    }
}
