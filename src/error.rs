//! Error type for fallible SeerShape operations.
//!
//! Matching and queries never fail: drift is skipped and logged. Errors are
//! reserved for codec and I/O work around persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeerError {
    #[error("cbor codec error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot load {0} shape ids: no shape is installed")]
    NoShape(usize),
}

pub type Result<T> = std::result::Result<T, SeerError>;
