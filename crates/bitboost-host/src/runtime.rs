//! One-time startup: engine, exchange type, and parameter schema.
//!
//! A [`Runtime`] bundles everything that is fixed for the life of the
//! process once the engine is loaded:
//!
//! 1. **Engine** - the loaded library (or any other [`Engine`])
//! 2. **Numeric type** - queried from the engine exactly once
//! 3. **Schema** - the settable parameters, parsed once
//!
//! It is immutable after construction and shared by every
//! [`Booster`](crate::Booster) through an [`Arc`], so no synchronization is
//! needed to read it from several threads.
//!
//! # Usage
//!
//! Build the runtime once at application startup and pass it around:
//!
//! ```rust,ignore
//! use bitboost_host::{Booster, Runtime, SearchOptions};
//!
//! let runtime = Runtime::load(&SearchOptions::default())?;
//!
//! let mut booster = Booster::new(&runtime, 3)?;
//! // ...
//! ```
//!
//! Failures here are load-time failures: without the engine and its schema the
//! binding cannot do anything, so the caller should abort startup.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::engine::locate::{self, SearchOptions};
use crate::engine::native::NativeEngine;
use crate::engine::Engine;
use crate::error::BitBoostError;
use crate::numeric::NumericType;
use crate::schema::ConfigSchema;

/// Immutable process-wide state shared by all boosters.
pub struct Runtime {
    engine: Arc<dyn Engine>,
    numeric: NumericType,
    schema: ConfigSchema,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &"<engine>")
            .field("numeric", &self.numeric)
            .field("parameters", &self.schema.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Runtime: Send, Sync);

impl Runtime {
    /// Locates, loads and initializes the engine and its schema.
    ///
    /// See [`locate`](crate::engine::locate) for the search order.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::RuntimeInit`] if the library or the schema
    /// cannot be found or loaded, or the engine reports an unsupported width;
    /// [`BitBoostError::SchemaParse`] or [`BitBoostError::Io`] if the schema
    /// file is unreadable or malformed.
    pub fn load(options: &SearchOptions) -> Result<Arc<Self>, BitBoostError> {
        let library = locate::locate_library(options)?;
        let schema = locate::locate_schema(options)?;
        Self::from_paths(library, schema)
    }

    /// Loads the engine and schema from explicit paths.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus discovery.
    pub fn from_paths(
        library: impl AsRef<Path>,
        schema: impl AsRef<Path>,
    ) -> Result<Arc<Self>, BitBoostError> {
        let engine = NativeEngine::load(library)?;
        let schema = ConfigSchema::from_path(schema.as_ref())?;
        Self::with_engine(Arc::new(engine), schema)
    }

    /// Wraps an already loaded engine.
    ///
    /// Queries the engine's float width exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::RuntimeInit`] if the reported width is not 4
    /// or 8 bytes.
    pub fn with_engine(
        engine: Arc<dyn Engine>,
        schema: ConfigSchema,
    ) -> Result<Arc<Self>, BitBoostError> {
        let numeric = NumericType::from_width(engine.numeric_width())?;

        info!(
            "BitBoost runtime ready: exchange type {}, {} settable parameters",
            numeric,
            schema.len()
        );

        Ok(Arc::new(Self {
            engine,
            numeric,
            schema,
        }))
    }

    /// The float type used for every buffer exchanged with the engine.
    #[must_use]
    pub fn numeric_type(&self) -> NumericType {
        self.numeric
    }

    /// The settable parameters.
    #[must_use]
    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;

    #[test]
    fn test_with_engine_resolves_numeric_type() {
        let runtime = Runtime::with_engine(Arc::new(MockEngine::new(4)), ConfigSchema::default())
            .unwrap();
        assert_eq!(runtime.numeric_type(), NumericType::F32);

        let runtime = Runtime::with_engine(Arc::new(MockEngine::new(8)), ConfigSchema::default())
            .unwrap();
        assert_eq!(runtime.numeric_type(), NumericType::F64);
    }

    #[test]
    fn test_with_engine_rejects_bad_width() {
        let err = Runtime::with_engine(Arc::new(MockEngine::new(2)), ConfigSchema::default())
            .unwrap_err();
        assert!(matches!(err, BitBoostError::RuntimeInit(_)));
    }

    #[test]
    fn test_from_paths_missing_library() {
        let err = Runtime::from_paths("/nonexistent/libbitboost.so", "/nonexistent/schema.csv")
            .unwrap_err();
        assert!(matches!(err, BitBoostError::RuntimeInit(_)));
    }

    #[test]
    fn test_load_fails_without_library() {
        let dir = tempfile::tempdir().unwrap();
        let err = Runtime::load(&SearchOptions::only([dir.path()])).unwrap_err();
        assert!(err.to_string().contains("could not be located"));
    }
}
