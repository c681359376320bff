//! Error types for the cross-boundary memory protocol.

use moat_types::{DiagnosticError, ErrorKind, MoatError};
use thiserror::Error;

/// Errors raised while exchanging buffers across the guest boundary.
///
/// Fatal variants mean the invocation must trap: they only arise from
/// protocol corruption or runaway allocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// `ptr == 0` with a non-zero length.
    #[error("invalid packed value: null pointer with length {len}")]
    InvalidPacked { len: u32 },
    /// An allocation would exceed the arena budget.
    #[error("allocation of {requested} bytes exceeds budget ({current} of {limit} bytes in use)")]
    BudgetExceeded {
        requested: u64,
        current: u64,
        limit: u64,
    },
    /// The synthetic pointer space is used up.
    #[error("pointer space exhausted while allocating {requested} bytes")]
    AddressSpaceExhausted { requested: u64 },
    /// A pointer that lies in no tracked buffer.
    #[error("pointer {ptr:#x} is not tracked by the arena")]
    UnknownPointer { ptr: u32 },
    /// An access past the end of a tracked buffer.
    #[error("access of {len} bytes at {ptr:#x} exceeds buffer of {capacity} bytes")]
    OutOfBounds { ptr: u32, len: u64, capacity: usize },
    /// A guest call panicked and was recovered.
    #[error("guest call panicked: {message}")]
    Panicked { message: String },
    /// A payload was not valid JSON for the expected type.
    #[error("invalid payload: {reason}")]
    Payload { reason: String },
}

impl AbiError {
    /// Returns `true` if the current invocation must be trapped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Payload { .. })
    }
}

impl From<AbiError> for MoatError {
    fn from(e: AbiError) -> Self {
        let kind = match &e {
            AbiError::InvalidPacked { .. }
            | AbiError::UnknownPointer { .. }
            | AbiError::OutOfBounds { .. } => ErrorKind::ProtocolViolation,
            AbiError::BudgetExceeded { .. } | AbiError::AddressSpaceExhausted { .. } => {
                ErrorKind::ResourceExhausted
            }
            AbiError::Panicked { .. } => ErrorKind::Internal,
            AbiError::Payload { .. } => ErrorKind::InvalidInput,
        };
        MoatError::new(kind, e.to_string())
    }
}

impl DiagnosticError for AbiError {
    fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidPacked { .. } | Self::UnknownPointer { .. } | Self::OutOfBounds { .. } => {
                Some("The host and guest disagree about a buffer; this indicates memory corruption or a mismatched ABI.".into())
            }
            Self::BudgetExceeded { limit, .. } => Some(format!(
                "The guest tried to hold more than {limit} bytes of cross-boundary buffers."
            )),
            Self::Panicked { .. } => {
                Some("All tracked buffers were released after the panic.".into())
            }
            _ => None,
        }
    }

    fn fix(&self) -> Option<String> {
        match self {
            Self::BudgetExceeded { .. } => Some(
                "Raise [abi] max_allocation_bytes in the host config, or free buffers with deallocate.".into(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_are_not_fatal() {
        let e = AbiError::Payload {
            reason: "expected object".into(),
        };
        assert!(!e.is_fatal());
        assert!(AbiError::InvalidPacked { len: 1 }.is_fatal());
    }

    #[test]
    fn budget_message_states_all_numbers() {
        let e = AbiError::BudgetExceeded {
            requested: 10,
            current: 95,
            limit: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("10") && msg.contains("95") && msg.contains("100"));
    }

    #[test]
    fn protocol_errors_map_to_protocol_violation() {
        let err: MoatError = AbiError::UnknownPointer { ptr: 0x40 }.into();
        assert_eq!(err.kind, ErrorKind::ProtocolViolation);
        assert!(err.kind.is_fatal());
    }

    #[test]
    fn budget_fix_mentions_config_key() {
        let e = AbiError::BudgetExceeded {
            requested: 1,
            current: 1,
            limit: 1,
        };
        assert!(e.fix().expect("has fix").contains("max_allocation_bytes"));
    }
}
