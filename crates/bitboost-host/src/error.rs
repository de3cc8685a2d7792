//! Error types for the bitboost-host crate.
//!
//! This module defines [`BitBoostError`], the single error type used throughout
//! the crate. All public API functions return [`Result<T>`](crate::Result).
//!
//! # Error Categories
//!
//! - **Load-time**: [`RuntimeInit`](BitBoostError::RuntimeInit) and
//!   [`SchemaParse`](BitBoostError::SchemaParse). The binding cannot work at
//!   all without the engine and its parameter schema, so callers should treat
//!   these as fatal at startup.
//! - **Usage**: wrong shapes or dtypes, unknown parameter names, operating on a
//!   released [`Booster`](crate::Booster), calling the protocol out of order.
//!   Raised before any boundary call is made.
//! - **Native**: a null context or a non-zero status code from the engine.
//!   Status codes are not decoded; every non-zero status maps to
//!   [`NativeCall`](BitBoostError::NativeCall).
//!
//! # Example
//!
//! ```no_run
//! use bitboost_host::{BitBoostError, Runtime, SearchOptions};
//!
//! fn startup() -> Result<(), BitBoostError> {
//!     // Load-time errors propagate with ?
//!     let runtime = Runtime::load(&SearchOptions::default())?;
//!     println!("engine exchanges {}", runtime.numeric_type());
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for bitboost-host operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// (for example decoded engine status codes) without breaking downstream code.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BitBoostError {
    /// The engine library or its schema could not be located or loaded.
    ///
    /// Common causes:
    /// - `libbitboost` is not on any search path
    /// - The library is missing one of the `bb_*` entry points
    /// - The engine reports a float width other than 4 or 8 bytes
    #[error("Runtime initialization failed: {0}")]
    RuntimeInit(String),

    /// The parameter schema source is malformed.
    #[error("Invalid parameter schema: {0}")]
    SchemaParse(String),

    /// An argument is out of its accepted range (e.g. zero features).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Data handed to the engine has the wrong shape, dtype, or contains nulls.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A configuration value has the wrong shape for its parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The parameter name is not part of the loaded schema.
    ///
    /// Parameters marked CLI-only in the schema source are never loaded and
    /// therefore also end up here.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// The booster context was already released.
    #[error("BitBoost context is not live (already released)")]
    NotLive,

    /// The operation needs a dataset; call `load_dataset` first.
    #[error("No dataset loaded; call load_dataset first")]
    DatasetNotLoaded,

    /// The operation is not supported by the engine.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// The engine returned a null context.
    #[error("Engine failed to allocate a context for {n_features} features")]
    AllocationFailed {
        /// Feature count that was requested.
        n_features: usize,
    },

    /// A boundary call returned a non-zero status code.
    #[error("Native {operation} failed with status {status}")]
    NativeCall {
        /// Name of the boundary call.
        operation: &'static str,
        /// Raw status code returned by the engine.
        status: i32,
    },

    /// Error raised by polars while reading or converting data.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// I/O error while reading the schema source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BitBoostError {
    /// Maps a boundary status code to `Ok(())` or [`BitBoostError::NativeCall`].
    pub(crate) fn check_status(operation: &'static str, status: i32) -> Result<(), Self> {
        if status == 0 {
            Ok(())
        } else {
            Err(BitBoostError::NativeCall { operation, status })
        }
    }
}
