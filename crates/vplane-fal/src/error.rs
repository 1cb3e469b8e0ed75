//! FAL error types and status handling.

use std::fmt;
use thiserror::Error;

/// FAL status codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FalStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    TableFull = -13,
    ObjectInUse = -17,
    InvalidObjectId = -19,
}

impl FalStatus {
    /// Creates a status from a raw value. Unknown codes map to `Failure`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => FalStatus::Success,
            -2 => FalStatus::NotSupported,
            -3 => FalStatus::NoMemory,
            -4 => FalStatus::InsufficientResources,
            -5 => FalStatus::InvalidParameter,
            -6 => FalStatus::ItemAlreadyExists,
            -7 => FalStatus::ItemNotFound,
            -13 => FalStatus::TableFull,
            -17 => FalStatus::ObjectInUse,
            -19 => FalStatus::InvalidObjectId,
            _ => FalStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == FalStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> FalResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(FalError::from_status(self))
        }
    }
}

impl fmt::Display for FalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FalStatus::Success => "FAL_STATUS_SUCCESS",
            FalStatus::Failure => "FAL_STATUS_FAILURE",
            FalStatus::NotSupported => "FAL_STATUS_NOT_SUPPORTED",
            FalStatus::NoMemory => "FAL_STATUS_NO_MEMORY",
            FalStatus::InsufficientResources => "FAL_STATUS_INSUFFICIENT_RESOURCES",
            FalStatus::InvalidParameter => "FAL_STATUS_INVALID_PARAMETER",
            FalStatus::ItemAlreadyExists => "FAL_STATUS_ITEM_ALREADY_EXISTS",
            FalStatus::ItemNotFound => "FAL_STATUS_ITEM_NOT_FOUND",
            FalStatus::TableFull => "FAL_STATUS_TABLE_FULL",
            FalStatus::ObjectInUse => "FAL_STATUS_OBJECT_IN_USE",
            FalStatus::InvalidObjectId => "FAL_STATUS_INVALID_OBJECT_ID",
        };
        write!(f, "{}", s)
    }
}

/// Error type for FAL operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FalError {
    /// The FAL returned an error status.
    #[error("FAL operation failed: {status}")]
    Status { status: FalStatus },

    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Item not found: {item}")]
    NotFound { item: String },

    /// Hardware table is full.
    #[error("Table full: {table}")]
    TableFull { table: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FalError {
    /// Creates an error from a FAL status code.
    pub fn from_status(status: FalStatus) -> Self {
        match status {
            FalStatus::Success => FalError::Internal {
                message: "from_status called with success status".to_string(),
            },
            FalStatus::NotSupported => FalError::NotSupported {
                feature: "unknown".to_string(),
            },
            FalStatus::InvalidParameter | FalStatus::InvalidObjectId => {
                FalError::InvalidParameter {
                    message: format!("FAL returned {}", status),
                }
            }
            FalStatus::ItemNotFound => FalError::NotFound {
                item: "unknown".to_string(),
            },
            FalStatus::TableFull | FalStatus::InsufficientResources => FalError::TableFull {
                table: "unknown".to_string(),
            },
            _ => FalError::Status { status },
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        FalError::NotFound { item: item.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        FalError::Internal {
            message: message.into(),
        }
    }

    /// Returns the underlying status if this is a Status error.
    pub fn status(&self) -> Option<FalStatus> {
        match self {
            FalError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for FAL operations.
pub type FalResult<T> = Result<T, FalError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(FalStatus::from_raw(0), FalStatus::Success);
        assert_eq!(FalStatus::from_raw(-13), FalStatus::TableFull);
        assert_eq!(FalStatus::from_raw(-99), FalStatus::Failure);
        assert!(FalStatus::Success.into_result().is_ok());
    }

    #[test]
    fn test_error_from_status() {
        let err = FalStatus::TableFull.into_result().unwrap_err();
        assert!(matches!(err, FalError::TableFull { .. }));

        let err = FalError::from_status(FalStatus::NoMemory);
        assert_eq!(err.status(), Some(FalStatus::NoMemory));
        assert_eq!(
            err.to_string(),
            "FAL operation failed: FAL_STATUS_NO_MEMORY"
        );
    }
}
