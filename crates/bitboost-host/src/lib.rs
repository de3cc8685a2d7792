//! bitboost-host: Rust binding for the native BitBoost gradient boosting engine.
//!
//! BitBoost is a gradient boosting engine written in native code that works
//! on bit-sliced feature representations. It exposes a small C ABI: a handful
//! of entry points that allocate a training context, accept columns of floats,
//! accept string-valued configuration, train, predict, and free the context.
//! This crate wraps that ABI in a safe, owned API built on polars columns.
//!
//! # Features
//!
//! - **Context handles**: [`Booster`] owns one engine context and frees it
//!   exactly once, on [`Booster::release`] or on drop
//! - **Column marshalling**: polars columns are passed to the engine without
//!   copying when contiguous, with one copy otherwise
//! - **Exchange type discovery**: the engine's float width is queried once at
//!   startup and fixes the dtype of every column crossing the boundary
//! - **Schema-driven configuration**: the settable parameters come from the
//!   engine's generated CSV; values are validated and turned into the engine's
//!   string form before any boundary call
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bitboost_host::{Booster, Runtime, SearchOptions};
//! use polars::prelude::*;
//! use std::collections::HashSet;
//!
//! // Load the engine and its schema (once, at startup)
//! let runtime = Runtime::load(&SearchOptions::default())?;
//!
//! let mut booster = Booster::new(&runtime, features.width())?;
//! booster.load_dataset(&features, &HashSet::from([2]))?;
//! booster.load_target(&target)?;
//! booster.configure([("max_depth", 4), ("niterations", 100)])?;
//! booster.train()?;
//!
//! let predictions = booster.predict()?;
//! booster.release()?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Rust Application                       │
//! │                                                              │
//! │  DataFrame / Series ──► Booster ──► Series "prediction"      │
//! │                            │                                 │
//! │  Runtime (schema, numeric type, engine) shared via Arc       │
//! └────────────────────────────┬─────────────────────────────────┘
//!                              │ Engine trait
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                NativeEngine (libloading)                     │
//! │                                                              │
//! │  bb_get_numt_nbytes  bb_alloc  bb_dealloc  bb_refresh_data   │
//! │  bb_set_feature_data  bb_set_config_field  bb_train          │
//! │  bb_predict                                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Initialization
//!
//! [`Runtime::load`] locates the shared library and the parameter schema,
//! loads both and resolves the exchange type. There is no global state: the
//! returned `Arc<Runtime>` is passed to every [`Booster::new`].
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`]. The most common variants:
//!
//! - [`BitBoostError::RuntimeInit`] - the engine could not be located or loaded
//! - [`BitBoostError::InvalidData`] - a column has the wrong shape or dtype
//! - [`BitBoostError::UnknownParameter`] - a name outside the schema
//! - [`BitBoostError::NotLive`] - the booster was already released
//! - [`BitBoostError::NativeCall`] - the engine returned a non-zero status
//!
//! # Thread Safety
//!
//! [`Runtime`] is `Send + Sync`. [`Booster`] is `Send` but not `Sync`: every
//! operation takes `&mut self`, which serializes calls for one context.
//!
//! # Model Persistence
//!
//! The engine has no serialization entry points. [`Booster::write_model`] and
//! [`Booster::read_model`] exist so callers can discover that at runtime; both
//! return [`BitBoostError::NotImplemented`].
//!
//! # Modules
//!
//! - [`engine`] - the boundary trait, the dynamic-library engine and discovery
//! - [`marshal`] - column to buffer conversion

mod booster;
mod config;
pub mod engine;
mod error;
pub mod marshal;
mod numeric;
mod runtime;
mod schema;

// Re-export public API
//
// Handles
pub use booster::{Booster, PREDICTION_COLUMN};
// Configuration
pub use config::{BoosterConfig, BoosterConfigBuilder, ConfigValue, LIST_DELIMITER, coerce};
pub use schema::{ConfigParam, ConfigSchema, ParamType};
// Error types
pub use error::BitBoostError;
// Startup
pub use engine::locate::SearchOptions;
pub use numeric::NumericType;
pub use runtime::Runtime;
// Boundary types
pub use engine::{ContextPtr, Engine, ExchangeSlice, ExchangeSliceMut};
pub use marshal::ExchangeBuffer;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BitBoostError>;
