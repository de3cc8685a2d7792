//! Shared helpers for the integration tests.
//!
//! `RecordingEngine` stands in for the native library: it keeps one state
//! record per context, logs every boundary call by name, and predicts the
//! target mean for every example.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::{CStr, c_void};
use std::path::PathBuf;
use std::sync::Arc;

use bitboost_host::{ConfigSchema, ContextPtr, Engine, ExchangeSlice, ExchangeSliceMut, Runtime};
use parking_lot::Mutex;

pub fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture_schema() -> ConfigSchema {
    ConfigSchema::from_path(fixtures_path().join("bitboost_config.gen.csv"))
        .expect("Failed to parse schema fixture")
}

/// A runtime over a fresh recording engine and the schema fixture.
pub fn runtime(width: i32) -> (Arc<RecordingEngine>, Arc<Runtime>) {
    let engine = Arc::new(RecordingEngine::new(width));
    let runtime =
        Runtime::with_engine(engine.clone(), fixture_schema()).expect("Failed to build runtime");
    (engine, runtime)
}

#[derive(Debug, Default)]
struct Context {
    n_features: i32,
    n_examples: usize,
    categorical: Vec<i32>,
    target: Option<Vec<f64>>,
    config: Vec<(String, String)>,
    model: Option<f64>,
}

#[derive(Debug, Default)]
struct State {
    next_id: usize,
    contexts: HashMap<usize, Context>,
    log: Vec<String>,
}

pub struct RecordingEngine {
    width: i32,
    state: Mutex<State>,
}

impl RecordingEngine {
    pub fn new(width: i32) -> Self {
        Self {
            width,
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Names of the boundary calls issued so far, in order.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn live_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    /// Configuration received by the only live context.
    pub fn config(&self) -> Vec<(String, String)> {
        let state = self.state.lock();
        state
            .contexts
            .values()
            .next()
            .map(|c| c.config.clone())
            .unwrap_or_default()
    }

    /// Categorical feature indices received by the only live context.
    pub fn categorical(&self) -> Vec<i32> {
        let state = self.state.lock();
        state
            .contexts
            .values()
            .next()
            .map(|c| c.categorical.clone())
            .unwrap_or_default()
    }

    fn with_context<R>(
        &self,
        op: &str,
        ctx: ContextPtr,
        f: impl FnOnce(&mut Context) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        state.log.push(op.to_string());
        state.contexts.get_mut(&(ctx.as_ptr() as usize)).map(f)
    }
}

impl Engine for RecordingEngine {
    fn numeric_width(&self) -> i32 {
        self.width
    }

    fn alloc(&self, n_features: i32) -> Option<ContextPtr> {
        let mut state = self.state.lock();
        state.log.push("alloc".to_string());
        let id = state.next_id;
        state.next_id += 1;
        state.contexts.insert(
            id,
            Context {
                n_features,
                ..Context::default()
            },
        );
        unsafe { ContextPtr::from_raw(std::ptr::without_provenance_mut::<c_void>(id)) }
    }

    fn dealloc(&self, ctx: ContextPtr) -> i32 {
        let mut state = self.state.lock();
        state.log.push("dealloc".to_string());
        match state.contexts.remove(&(ctx.as_ptr() as usize)) {
            Some(_) => 0,
            None => 1,
        }
    }

    fn refresh_data(&self, ctx: ContextPtr, n_examples: i32) -> i32 {
        self.with_context("refresh_data", ctx, |c| {
            c.n_examples = n_examples as usize;
            c.categorical.clear();
            c.target = None;
            0
        })
        .unwrap_or(1)
    }

    fn set_feature_data(
        &self,
        ctx: ContextPtr,
        feature: i32,
        data: ExchangeSlice<'_>,
        categorical: bool,
    ) -> i32 {
        self.with_context("set_feature_data", ctx, |c| {
            if feature > c.n_features || data.len() != c.n_examples {
                return 2;
            }
            if categorical {
                c.categorical.push(feature);
            }
            if feature == c.n_features {
                c.target = Some(match data {
                    ExchangeSlice::F32(s) => s.iter().map(|&v| f64::from(v)).collect(),
                    ExchangeSlice::F64(s) => s.to_vec(),
                });
            }
            0
        })
        .unwrap_or(1)
    }

    fn set_config_field(&self, ctx: ContextPtr, name: &CStr, value: &CStr) -> i32 {
        self.with_context("set_config_field", ctx, |c| {
            c.config.push((
                name.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            ));
            0
        })
        .unwrap_or(1)
    }

    fn train(&self, ctx: ContextPtr) -> i32 {
        self.with_context("train", ctx, |c| {
            let Some(target) = c.target.as_ref() else {
                return 2;
            };
            c.model = Some(target.iter().sum::<f64>() / target.len().max(1) as f64);
            0
        })
        .unwrap_or(1)
    }

    fn predict(&self, ctx: ContextPtr, output: ExchangeSliceMut<'_>) -> i32 {
        self.with_context("predict", ctx, |c| {
            let Some(mean) = c.model else {
                return 2;
            };
            if output.len() != c.n_examples {
                return 2;
            }
            match output {
                ExchangeSliceMut::F32(out) => out.fill(mean as f32),
                ExchangeSliceMut::F64(out) => out.fill(mean),
            }
            0
        })
        .unwrap_or(1)
    }
}
