//! Southbound error types and RPC status mapping.
//!
//! Device sessions report failures as a small set of kinds the installation
//! engine can act on. Raw RPC status codes from a transport map onto those
//! kinds through [`RpcCode`].

use std::fmt;
use thiserror::Error;

/// gRPC status codes as carried by P4Runtime responses.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl RpcCode {
    /// Creates an RpcCode from a raw i32 value.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => RpcCode::Ok,
            1 => RpcCode::Cancelled,
            3 => RpcCode::InvalidArgument,
            4 => RpcCode::DeadlineExceeded,
            5 => RpcCode::NotFound,
            6 => RpcCode::AlreadyExists,
            7 => RpcCode::PermissionDenied,
            8 => RpcCode::ResourceExhausted,
            9 => RpcCode::FailedPrecondition,
            10 => RpcCode::Aborted,
            11 => RpcCode::OutOfRange,
            12 => RpcCode::Unimplemented,
            13 => RpcCode::Internal,
            14 => RpcCode::Unavailable,
            15 => RpcCode::DataLoss,
            16 => RpcCode::Unauthenticated,
            _ => RpcCode::Unknown,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == RpcCode::Ok
    }

    /// Converts to a Result, returning Ok(()) for `Ok`.
    pub fn into_result(self, message: impl Into<String>) -> DriverResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(DriverError::from_code(self, message))
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RpcCode::Ok => "OK",
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::PermissionDenied => "PERMISSION_DENIED",
            RpcCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Aborted => "ABORTED",
            RpcCode::OutOfRange => "OUT_OF_RANGE",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::DataLoss => "DATA_LOSS",
            RpcCode::Unauthenticated => "UNAUTHENTICATED",
        };
        write!(f, "{}", s)
    }
}

/// What went wrong on the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// An identical entry (same match, same action) is already installed.
    AlreadyExists,
    /// An entry with the same match but a different action is installed.
    Conflict,
    /// The device cannot be reached or the session was lost.
    Unreachable,
    /// The session does not hold mastership for the device.
    Unauthorized,
    /// The entry to delete or read is not installed.
    NotFound,
    /// Any other refusal by the device.
    Rejected,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverErrorKind::AlreadyExists => "already exists",
            DriverErrorKind::Conflict => "conflict",
            DriverErrorKind::Unreachable => "unreachable",
            DriverErrorKind::Unauthorized => "unauthorized",
            DriverErrorKind::NotFound => "not found",
            DriverErrorKind::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Error returned by southbound session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::AlreadyExists, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Conflict, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Unreachable, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::NotFound, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Rejected, message)
    }

    /// Maps an RPC status code onto a driver error kind.
    ///
    /// P4Runtime reports a duplicate insert with a different action as
    /// `INVALID_ARGUMENT` on some targets and `ALREADY_EXISTS` on others; only
    /// the transport can tell those apart, so `AlreadyExists` here always
    /// means the identical-entry case.
    pub fn from_code(code: RpcCode, message: impl Into<String>) -> Self {
        let kind = match code {
            RpcCode::AlreadyExists => DriverErrorKind::AlreadyExists,
            RpcCode::NotFound => DriverErrorKind::NotFound,
            RpcCode::PermissionDenied | RpcCode::Unauthenticated => DriverErrorKind::Unauthorized,
            RpcCode::Unavailable | RpcCode::DeadlineExceeded | RpcCode::Cancelled => {
                DriverErrorKind::Unreachable
            }
            _ => DriverErrorKind::Rejected,
        };
        Self::new(kind, format!("{} ({})", message.into(), code))
    }

    /// Returns true if a later attempt on a fresh session might succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind == DriverErrorKind::Unreachable
    }
}

/// Result type for southbound operations.
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_from_raw() {
        assert_eq!(RpcCode::from_raw(6), RpcCode::AlreadyExists);
        assert_eq!(RpcCode::from_raw(14), RpcCode::Unavailable);
        assert_eq!(RpcCode::from_raw(99), RpcCode::Unknown);
    }

    #[test]
    fn test_ok_into_result() {
        assert!(RpcCode::Ok.into_result("write").is_ok());
        let err = RpcCode::PermissionDenied.into_result("write").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Unauthorized);
    }

    #[test]
    fn test_code_mapping() {
        let cases = [
            (RpcCode::AlreadyExists, DriverErrorKind::AlreadyExists),
            (RpcCode::NotFound, DriverErrorKind::NotFound),
            (RpcCode::Unauthenticated, DriverErrorKind::Unauthorized),
            (RpcCode::Unavailable, DriverErrorKind::Unreachable),
            (RpcCode::InvalidArgument, DriverErrorKind::Rejected),
        ];
        for (code, kind) in cases {
            assert_eq!(DriverError::from_code(code, "op").kind, kind);
        }
    }

    #[test]
    fn test_error_display() {
        let err = DriverError::from_code(RpcCode::Unavailable, "s1 write");
        assert_eq!(err.to_string(), "unreachable: s1 write (UNAVAILABLE)");
        assert!(err.is_retryable());
        assert!(!DriverError::conflict("x").is_retryable());
    }
}
