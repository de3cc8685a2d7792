//! The per-training-run context handle.
//!
//! A [`Booster`] owns exactly one context inside the engine. The context is
//! allocated in [`Booster::new`] and freed either by [`Booster::release`] or,
//! if the booster goes out of scope while still live, by `Drop`. Either way
//! the engine's deallocation is issued exactly once.
//!
//! # Protocol
//!
//! ```text
//! new ──► load_dataset ──► load_target ──► configure ──► train ──► predict ──► release
//!            ▲                                                        │
//!            └──────────── (new data: reload, predict again) ─────────┘
//! ```
//!
//! `load_dataset` declares the example count for everything that follows;
//! `predict` always returns exactly that many values.
//!
//! # Example
//!
//! ```rust,ignore
//! use bitboost_host::{Booster, Runtime, SearchOptions};
//! use polars::prelude::*;
//! use std::collections::HashSet;
//!
//! let runtime = Runtime::load(&SearchOptions::default())?;
//!
//! let features = df! {
//!     "a" => &[1.0f32, 2.0, 3.0],
//!     "b" => &[0.0f32, 1.0, 0.0],
//! }?;
//! let target = Series::new("y".into(), &[0.0f32, 1.0, 1.0]);
//!
//! let mut booster = Booster::new(&runtime, 2)?;
//! booster.load_dataset(&features, &HashSet::from([1]))?;
//! booster.load_target(&target)?;
//! booster.configure([("max_depth", 3)])?;
//! booster.train()?;
//! let predictions = booster.predict()?;
//! booster.release()?;
//! ```
//!
//! # Thread Safety
//!
//! `Booster` is `Send` but not `Sync`: a booster can move to another thread,
//! but calls for one context are serialized by `&mut self`. Distinct boosters
//! are independent and can be driven from different threads.

use std::collections::HashSet;
use std::ffi::CString;
use std::sync::Arc;

use polars::prelude::{DataFrame, NamedFrom, Series};
use tracing::{debug, warn};

use crate::config::{BoosterConfig, ConfigValue, coerce};
use crate::engine::{ContextPtr, ExchangeSliceMut};
use crate::error::BitBoostError;
use crate::marshal::{ExchangeBuffer, exchange_buffer};
use crate::numeric::NumericType;
use crate::runtime::Runtime;

/// Name of the series returned by [`Booster::predict`].
pub const PREDICTION_COLUMN: &str = "prediction";

/// Owned handle to one engine context.
pub struct Booster {
    runtime: Arc<Runtime>,
    /// `None` once released.
    ctx: Option<ContextPtr>,
    n_features: usize,
    /// Unknown until a dataset is loaded.
    n_examples: Option<usize>,
}

impl std::fmt::Debug for Booster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Booster")
            .field("ctx", &self.ctx)
            .field("n_features", &self.n_features)
            .field("n_examples", &self.n_examples)
            .finish()
    }
}

static_assertions::assert_impl_all!(Booster: Send);
static_assertions::assert_not_impl_any!(Booster: Sync);

impl Booster {
    /// Allocates a context for `n_features` features.
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::InvalidArgument`] if `n_features` is zero or does
    ///   not fit the engine's `int` (checked before any boundary call)
    /// - [`BitBoostError::AllocationFailed`] if the engine returns null
    pub fn new(runtime: &Arc<Runtime>, n_features: usize) -> Result<Self, BitBoostError> {
        if n_features == 0 {
            return Err(BitBoostError::InvalidArgument(
                "n_features must be greater than 0".to_string(),
            ));
        }
        let raw = to_c_int(n_features, "n_features")?;

        let ctx = runtime
            .engine()
            .alloc(raw)
            .ok_or(BitBoostError::AllocationFailed { n_features })?;
        debug!(?ctx, n_features, "allocated BitBoost context");

        Ok(Self {
            runtime: Arc::clone(runtime),
            ctx: Some(ctx),
            n_features,
            n_examples: None,
        })
    }

    /// Runs `f` with a fresh booster and releases it on every exit path.
    ///
    /// If `f` fails, its error is returned and the booster is still released.
    /// If `f` succeeds but the release fails, the release error is returned.
    ///
    /// # Errors
    ///
    /// The errors of [`new`](Self::new), of `f`, and of
    /// [`release`](Self::release).
    pub fn scoped<T, F>(runtime: &Arc<Runtime>, n_features: usize, f: F) -> Result<T, BitBoostError>
    where
        F: FnOnce(&mut Booster) -> Result<T, BitBoostError>,
    {
        let mut booster = Self::new(runtime, n_features)?;
        let result = f(&mut booster);
        if booster.is_live() {
            let released = booster.release();
            let value = result?;
            released?;
            Ok(value)
        } else {
            result
        }
    }

    /// Frees the engine context.
    ///
    /// After success the booster is released and every further operation
    /// fails with [`BitBoostError::NotLive`].
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was already released
    /// - [`BitBoostError::NativeCall`] if the engine reports failure; the
    ///   booster then stays live
    pub fn release(&mut self) -> Result<(), BitBoostError> {
        let ctx = self.live()?;
        let status = self.runtime.engine().dealloc(ctx);
        BitBoostError::check_status("dealloc", status)?;
        debug!(?ctx, "released BitBoost context");
        self.ctx = None;
        self.n_examples = None;
        Ok(())
    }

    /// Returns `true` until the context has been released.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.ctx.is_some()
    }

    /// Number of features fixed at construction.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Example count of the current dataset, if one is loaded.
    #[must_use]
    pub fn n_examples(&self) -> Option<usize> {
        self.n_examples
    }

    /// The exchange type columns must have.
    #[must_use]
    pub fn numeric_type(&self) -> NumericType {
        self.runtime.numeric_type()
    }

    /// Loads a new dataset, replacing any previous one.
    ///
    /// Every column of `features` becomes one feature, in column order; the
    /// column at position `i` is flagged categorical iff `i` is in
    /// `categorical`. All checks run before the engine is touched.
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::InvalidData`] if the column count differs from
    ///   [`n_features`](Self::n_features), a categorical index is out of
    ///   range, the frame has no rows, or a column has the wrong dtype or
    ///   contains nulls
    /// - [`BitBoostError::NativeCall`] if the engine rejects the refresh or a
    ///   column; the example count is then forgotten and the dataset must be
    ///   loaded again
    pub fn load_dataset(
        &mut self,
        features: &DataFrame,
        categorical: &HashSet<usize>,
    ) -> Result<(), BitBoostError> {
        let ctx = self.live()?;

        if features.width() != self.n_features {
            return Err(BitBoostError::InvalidData(format!(
                "dataset has {} columns, booster expects {} features",
                features.width(),
                self.n_features
            )));
        }
        if let Some(&bad) = categorical.iter().find(|&&i| i >= self.n_features) {
            return Err(BitBoostError::InvalidData(format!(
                "categorical feature index {} out of range for {} features",
                bad, self.n_features
            )));
        }
        let n_examples = features.height();
        if n_examples == 0 {
            return Err(BitBoostError::InvalidData("dataset has no rows".to_string()));
        }
        let raw_examples = to_c_int(n_examples, "example count")?;

        let numeric = self.numeric_type();
        let buffers = features
            .get_columns()
            .iter()
            .map(|column| exchange_buffer(column.as_materialized_series(), numeric))
            .collect::<Result<Vec<_>, _>>()?;

        let engine = self.runtime.engine();
        self.n_examples = None;
        BitBoostError::check_status("refresh_data", engine.refresh_data(ctx, raw_examples))?;
        debug!(?ctx, n_examples, "refreshed dataset");

        for (feature, buffer) in buffers.iter().enumerate() {
            self.push_column(ctx, feature, buffer, categorical.contains(&feature))?;
        }

        self.n_examples = Some(n_examples);
        Ok(())
    }

    /// Supplies the target column.
    ///
    /// # Errors
    ///
    /// Same as [`set_feature_data`](Self::set_feature_data).
    pub fn load_target(&mut self, target: &Series) -> Result<(), BitBoostError> {
        self.set_feature_data(self.n_features, target, false)
    }

    /// Replaces a single column of the current dataset.
    ///
    /// `feature` ranges over `0..=n_features`; `n_features` is the target.
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::DatasetNotLoaded`] before [`load_dataset`](Self::load_dataset)
    /// - [`BitBoostError::InvalidArgument`] if `feature` is out of range
    /// - [`BitBoostError::InvalidData`] for a length, dtype or null mismatch
    /// - [`BitBoostError::NativeCall`] if the engine rejects the column
    pub fn set_feature_data(
        &mut self,
        feature: usize,
        column: &Series,
        categorical: bool,
    ) -> Result<(), BitBoostError> {
        let ctx = self.live()?;
        let n_examples = self.n_examples.ok_or(BitBoostError::DatasetNotLoaded)?;

        if feature > self.n_features {
            return Err(BitBoostError::InvalidArgument(format!(
                "feature index {} out of range 0..={}",
                feature, self.n_features
            )));
        }
        if column.len() != n_examples {
            return Err(BitBoostError::InvalidData(format!(
                "column '{}' has {} values, dataset has {} examples",
                column.name(),
                column.len(),
                n_examples
            )));
        }

        let buffer = exchange_buffer(column, self.numeric_type())?;
        self.push_column(ctx, feature, &buffer, categorical)
    }

    fn push_column(
        &mut self,
        ctx: ContextPtr,
        feature: usize,
        buffer: &ExchangeBuffer<'_>,
        categorical: bool,
    ) -> Result<(), BitBoostError> {
        let raw_feature = to_c_int(feature, "feature index")?;
        let status =
            self.runtime
                .engine()
                .set_feature_data(ctx, raw_feature, buffer.as_slice(), categorical);
        if status != 0 {
            self.n_examples = None;
            return Err(BitBoostError::NativeCall {
                operation: "set_feature_data",
                status,
            });
        }
        debug!(
            ?ctx,
            feature,
            len = buffer.len(),
            categorical,
            copied = !buffer.is_borrowed(),
            "pushed column"
        );
        Ok(())
    }

    /// Sets one configuration parameter.
    ///
    /// # Errors
    ///
    /// Same as [`configure`](Self::configure).
    pub fn set_config_field(
        &mut self,
        name: &str,
        value: impl Into<ConfigValue>,
    ) -> Result<(), BitBoostError> {
        self.configure([(name, value.into())])
    }

    /// Applies `(name, value)` assignments in order.
    ///
    /// All names and values are validated against the schema before the
    /// first boundary call, so a bad entry leaves the context untouched.
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::UnknownParameter`] for a name outside the schema
    /// - [`BitBoostError::InvalidConfig`] for a value of the wrong shape
    /// - [`BitBoostError::NativeCall`] if the engine rejects a value
    pub fn configure<I, K, V>(&mut self, assignments: I) -> Result<(), BitBoostError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ConfigValue>,
    {
        self.live()?;
        let schema = self.runtime.schema();
        let coerced = assignments
            .into_iter()
            .map(|(name, value)| {
                let param = schema.param(name.as_ref())?;
                Ok((param.name.clone(), coerce(param, &value.into())?))
            })
            .collect::<Result<Vec<_>, BitBoostError>>()?;

        self.push_config(coerced.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    }

    /// Applies a prepared [`BoosterConfig`].
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::NativeCall`] if the engine rejects a value
    pub fn apply_config(&mut self, config: &BoosterConfig) -> Result<(), BitBoostError> {
        self.live()?;
        self.push_config(config.assignments())
    }

    fn push_config<'a>(
        &self,
        assignments: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), BitBoostError> {
        let ctx = self.live()?;
        let engine = self.runtime.engine();
        for (name, value) in assignments {
            let c_name = to_c_string(name)?;
            let c_value = to_c_string(value)?;
            BitBoostError::check_status(
                "set_config_field",
                engine.set_config_field(ctx, &c_name, &c_value),
            )?;
            debug!(?ctx, name, value, "set config field");
        }
        Ok(())
    }

    /// Trains on the current dataset. Blocks until the engine finishes.
    ///
    /// Whether a target was supplied is for the engine to judge.
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::DatasetNotLoaded`] before [`load_dataset`](Self::load_dataset)
    /// - [`BitBoostError::NativeCall`] if training fails
    pub fn train(&mut self) -> Result<(), BitBoostError> {
        let ctx = self.live()?;
        let n_examples = self.n_examples.ok_or(BitBoostError::DatasetNotLoaded)?;
        debug!(?ctx, n_examples, "training");
        BitBoostError::check_status("train", self.runtime.engine().train(ctx))
    }

    /// Predicts one value per example of the current dataset.
    ///
    /// The returned series is named [`PREDICTION_COLUMN`], has the exchange
    /// dtype, and its length is the example count of the last
    /// [`load_dataset`](Self::load_dataset).
    ///
    /// # Errors
    ///
    /// - [`BitBoostError::NotLive`] if the booster was released
    /// - [`BitBoostError::DatasetNotLoaded`] before [`load_dataset`](Self::load_dataset)
    /// - [`BitBoostError::NativeCall`] if prediction fails
    pub fn predict(&mut self) -> Result<Series, BitBoostError> {
        let ctx = self.live()?;
        let n_examples = match self.n_examples {
            Some(n) if n > 0 => n,
            _ => return Err(BitBoostError::DatasetNotLoaded),
        };
        let engine = self.runtime.engine();

        let series = match self.numeric_type() {
            NumericType::F32 => {
                let mut output = vec![0.0f32; n_examples];
                let status = engine.predict(ctx, ExchangeSliceMut::F32(&mut output));
                BitBoostError::check_status("predict", status)?;
                Series::new(PREDICTION_COLUMN.into(), output)
            }
            NumericType::F64 => {
                let mut output = vec![0.0f64; n_examples];
                let status = engine.predict(ctx, ExchangeSliceMut::F64(&mut output));
                BitBoostError::check_status("predict", status)?;
                Series::new(PREDICTION_COLUMN.into(), output)
            }
        };
        debug!(?ctx, n_examples, "predicted");
        Ok(series)
    }

    /// Model serialization is not supported by the engine.
    ///
    /// # Errors
    ///
    /// Always returns [`BitBoostError::NotImplemented`].
    pub fn write_model(&self) -> Result<Vec<u8>, BitBoostError> {
        Err(BitBoostError::NotImplemented("write_model"))
    }

    /// Model deserialization is not supported by the engine.
    ///
    /// # Errors
    ///
    /// Always returns [`BitBoostError::NotImplemented`].
    pub fn read_model(&mut self, _bytes: &[u8]) -> Result<(), BitBoostError> {
        Err(BitBoostError::NotImplemented("read_model"))
    }

    fn live(&self) -> Result<ContextPtr, BitBoostError> {
        self.ctx.ok_or(BitBoostError::NotLive)
    }
}

impl Drop for Booster {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            let status = self.runtime.engine().dealloc(ctx);
            if status == 0 {
                debug!(?ctx, "released BitBoost context on drop");
            } else {
                warn!(?ctx, status, "failed to release BitBoost context on drop");
            }
        }
    }
}

fn to_c_int(value: usize, what: &str) -> Result<i32, BitBoostError> {
    i32::try_from(value).map_err(|_| {
        BitBoostError::InvalidArgument(format!("{what} {value} exceeds the engine's int range"))
    })
}

fn to_c_string(text: &str) -> Result<CString, BitBoostError> {
    CString::new(text).map_err(|_| {
        BitBoostError::InvalidConfig(format!("'{}' contains a NUL byte", text.escape_default()))
    })
}
