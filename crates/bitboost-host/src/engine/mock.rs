//! In-memory engine used by the unit tests.
//!
//! Records every boundary call, keeps per-context state like the real engine
//! would, and predicts the mean of the supplied target.

use std::collections::{HashMap, HashSet};
use std::ffi::{CStr, c_void};

use parking_lot::Mutex;

use super::{ContextPtr, Engine, ExchangeSlice, ExchangeSliceMut};

/// One recorded boundary call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Alloc(i32),
    Dealloc,
    RefreshData(i32),
    SetFeatureData {
        feature: i32,
        len: usize,
        categorical: bool,
    },
    SetConfigField(String, String),
    Train,
    Predict(usize),
}

#[derive(Debug, Default)]
struct Context {
    n_features: i32,
    n_examples: i32,
    columns: HashMap<i32, Vec<f64>>,
    config: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct State {
    next_id: usize,
    contexts: HashMap<usize, Context>,
    calls: Vec<Call>,
    failing: HashSet<&'static str>,
}

pub(crate) struct MockEngine {
    width: i32,
    state: Mutex<State>,
}

impl MockEngine {
    pub(crate) fn new(width: i32) -> Self {
        Self {
            width,
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
        }
    }

    /// Makes every subsequent call of `operation` return status 1.
    pub(crate) fn fail(&self, operation: &'static str) {
        self.state.lock().failing.insert(operation);
    }

    pub(crate) fn recover(&self, operation: &'static str) {
        self.state.lock().failing.remove(operation);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn live_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    pub(crate) fn config_of(&self, ctx: ContextPtr) -> Vec<(String, String)> {
        let state = self.state.lock();
        state.contexts[&(ctx.as_ptr() as usize)].config.clone()
    }

    fn record(&self, call: Call, operation: &'static str) -> Option<parking_lot::MutexGuard<'_, State>> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failing.contains(operation) {
            None
        } else {
            Some(state)
        }
    }
}

fn id(ctx: ContextPtr) -> usize {
    ctx.as_ptr() as usize
}

impl Engine for MockEngine {
    fn numeric_width(&self) -> i32 {
        self.width
    }

    fn alloc(&self, n_features: i32) -> Option<ContextPtr> {
        let mut state = self.record(Call::Alloc(n_features), "alloc")?;
        let id = state.next_id;
        state.next_id += 1;
        state.contexts.insert(
            id,
            Context {
                n_features,
                ..Context::default()
            },
        );
        // SAFETY: fake, never dereferenced address handed back only to this engine.
        unsafe { ContextPtr::from_raw(std::ptr::without_provenance_mut::<c_void>(id)) }
    }

    fn dealloc(&self, ctx: ContextPtr) -> i32 {
        let Some(mut state) = self.record(Call::Dealloc, "dealloc") else {
            return 1;
        };
        match state.contexts.remove(&id(ctx)) {
            Some(_) => 0,
            None => 2,
        }
    }

    fn refresh_data(&self, ctx: ContextPtr, n_examples: i32) -> i32 {
        let Some(mut state) = self.record(Call::RefreshData(n_examples), "refresh_data") else {
            return 1;
        };
        let context = state.contexts.get_mut(&id(ctx)).expect("live context");
        context.n_examples = n_examples;
        context.columns.clear();
        0
    }

    fn set_feature_data(
        &self,
        ctx: ContextPtr,
        feature: i32,
        data: ExchangeSlice<'_>,
        categorical: bool,
    ) -> i32 {
        let call = Call::SetFeatureData {
            feature,
            len: data.len(),
            categorical,
        };
        let Some(mut state) = self.record(call, "set_feature_data") else {
            return 1;
        };
        let context = state.contexts.get_mut(&id(ctx)).expect("live context");
        assert!(feature >= 0 && feature <= context.n_features);
        assert_eq!(data.len(), context.n_examples as usize);
        let values = match data {
            ExchangeSlice::F32(s) => s.iter().map(|&v| f64::from(v)).collect(),
            ExchangeSlice::F64(s) => s.to_vec(),
        };
        context.columns.insert(feature, values);
        0
    }

    fn set_config_field(&self, ctx: ContextPtr, name: &CStr, value: &CStr) -> i32 {
        let name = name.to_string_lossy().into_owned();
        let value = value.to_string_lossy().into_owned();
        let call = Call::SetConfigField(name.clone(), value.clone());
        let Some(mut state) = self.record(call, "set_config_field") else {
            return 1;
        };
        let context = state.contexts.get_mut(&id(ctx)).expect("live context");
        context.config.push((name, value));
        0
    }

    fn train(&self, ctx: ContextPtr) -> i32 {
        let Some(state) = self.record(Call::Train, "train") else {
            return 1;
        };
        let context = &state.contexts[&id(ctx)];
        if context.columns.contains_key(&context.n_features) {
            0
        } else {
            3
        }
    }

    fn predict(&self, ctx: ContextPtr, output: ExchangeSliceMut<'_>) -> i32 {
        let Some(state) = self.record(Call::Predict(output.len()), "predict") else {
            return 1;
        };
        let context = &state.contexts[&id(ctx)];
        let target = context.columns.get(&context.n_features);
        let mean = target.map_or(0.0, |t| t.iter().sum::<f64>() / t.len().max(1) as f64);
        match output {
            ExchangeSliceMut::F32(out) => out.fill(mean as f32),
            ExchangeSliceMut::F64(out) => out.fill(mean),
        }
        0
    }
}
