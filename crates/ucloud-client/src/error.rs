//! UCloud client errors

use thiserror::Error;

/// Provider return codes that callers treat as "resource already gone"
pub mod retcode {
    /// DeleteVPC on a VPC that no longer exists
    pub const VPC_NOT_FOUND: i64 = 58103;
    /// DeleteSubnet on a subnet that no longer exists
    pub const SUBNET_NOT_FOUND: i64 = 8039;
    /// DescribeUHostInstance for an instance that no longer exists
    pub const UHOST_NOT_FOUND: i64 = 8039;
    /// DeleteNATGW on a gateway that no longer exists
    pub const NAT_GATEWAY_NOT_FOUND: i64 = 54002;
    /// DeleteULB on a load balancer that no longer exists
    pub const ULB_NOT_FOUND: i64 = 63059;
}

/// Errors that can occur when interacting with the UCloud API
#[derive(Debug, Error)]
pub enum UCloudError {
    /// Transport failure (connect, timeout, TLS, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API gateway answered with a non-success HTTP status
    #[error("HTTP status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The API answered with a non-zero RetCode
    #[error("{action} failed with RetCode {code}: {message}")]
    RetCode {
        /// Action that failed
        action: String,
        /// Provider return code
        code: i64,
        /// Provider message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request could not be built (missing credential, bad parameter)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Credential rejected by the API
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl UCloudError {
    /// Provider return code carried by this error, if any
    #[must_use]
    pub fn retcode(&self) -> Option<i64> {
        match self {
            Self::RetCode { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error carries the given provider return code
    #[must_use]
    pub fn is_retcode(&self, code: i64) -> bool {
        self.retcode() == Some(code)
    }

    /// Transport and 5xx failures that a later pass may succeed on
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
