//! Failure kinds reported by the command layer

use std::time::Duration;

use thiserror::Error;

use crate::core::bluetooth::codec::ShortPayload;
use crate::core::bluetooth::types::{CharacteristicKind, ConnectionState};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No link to the mug yet, or it was lost
    #[error("Not connected to the device")]
    NotConnected,

    /// Discovery finished without finding this characteristic
    #[error("Characteristic {0} has not been discovered")]
    CharacteristicUnresolved(CharacteristicKind),

    /// The transport never reported completion
    #[error("No response on {kind} within {timeout:?}")]
    CommandTimeout {
        kind: CharacteristicKind,
        timeout: Duration,
    },

    /// The transport reported an error for the request
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Malformed {kind} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        kind: CharacteristicKind,
        expected: usize,
        actual: usize,
    },

    /// The pipeline did not reach the awaited state in time
    #[error("Timed out after {timeout:?} while {state}")]
    ConnectTimeout {
        state: ConnectionState,
        timeout: Duration,
    },

    #[error("Cancelled")]
    Cancelled,
}

impl BridgeError {
    pub(crate) fn malformed(kind: CharacteristicKind, short: ShortPayload) -> Self {
        Self::MalformedPayload {
            kind,
            expected: short.expected,
            actual: short.actual,
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
