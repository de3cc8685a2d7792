//! The boundary to the native BitBoost engine.
//!
//! The engine exposes eight C entry points. [`Engine`] mirrors them one to one
//! with boundary-safe Rust types, so that everything above this module
//! ([`Booster`](crate::Booster), [`Runtime`](crate::Runtime)) is written
//! against a trait rather than raw symbols.
//!
//! # Architecture
//!
//! ```text
//! Booster ──► Engine (trait)
//!               │
//!               ├── NativeEngine ──► libloading ──► libbitboost.{so,dylib,dll}
//!               │
//!               └── test engines (in-memory)
//! ```
//!
//! # Modules
//!
//! - [`native`] - the `libloading`-backed implementation
//! - [`locate`] - search-path discovery for the library and schema files

pub mod locate;
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::ffi::{CStr, c_void};
use std::fmt;
use std::ptr::NonNull;

use crate::numeric::NumericType;

/// Address of a context allocated by an [`Engine`].
///
/// The address is opaque to the host; it is only ever handed back to the
/// engine that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextPtr(NonNull<c_void>);

// SAFETY: the address is never dereferenced on the host side. Each context is
// owned by exactly one `Booster`, and `&mut` access to that booster is what
// serializes calls into the engine for it.
unsafe impl Send for ContextPtr {}

impl ContextPtr {
    /// Wraps an address returned by an engine's allocation entry point.
    ///
    /// Returns `None` for a null address.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an address produced by the engine that will
    /// receive it, not yet deallocated.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(ContextPtr)
    }

    /// The raw address, for passing back to the engine.
    #[must_use]
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for ContextPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextPtr({:p})", self.0)
    }
}

/// A contiguous, read-only column in the exchange numeric type.
#[derive(Debug, Clone, Copy)]
pub enum ExchangeSlice<'a> {
    /// Column of 4-byte floats.
    F32(&'a [f32]),
    /// Column of 8-byte floats.
    F64(&'a [f64]),
}

impl ExchangeSlice<'_> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ExchangeSlice::F32(s) => s.len(),
            ExchangeSlice::F64(s) => s.len(),
        }
    }

    /// Returns `true` if the slice has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the slice.
    #[must_use]
    pub fn numeric_type(&self) -> NumericType {
        match self {
            ExchangeSlice::F32(_) => NumericType::F32,
            ExchangeSlice::F64(_) => NumericType::F64,
        }
    }

    pub(crate) fn as_ptr(&self) -> *const c_void {
        match self {
            ExchangeSlice::F32(s) => s.as_ptr().cast(),
            ExchangeSlice::F64(s) => s.as_ptr().cast(),
        }
    }
}

/// A contiguous, writable output buffer in the exchange numeric type.
#[derive(Debug)]
pub enum ExchangeSliceMut<'a> {
    /// Buffer of 4-byte floats.
    F32(&'a mut [f32]),
    /// Buffer of 8-byte floats.
    F64(&'a mut [f64]),
}

impl ExchangeSliceMut<'_> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ExchangeSliceMut::F32(s) => s.len(),
            ExchangeSliceMut::F64(s) => s.len(),
        }
    }

    /// Returns `true` if the buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            ExchangeSliceMut::F32(s) => s.as_mut_ptr().cast(),
            ExchangeSliceMut::F64(s) => s.as_mut_ptr().cast(),
        }
    }
}

/// The eight entry points of the BitBoost engine.
///
/// Every method is a single blocking boundary call. Status-returning methods
/// return the engine's raw code: `0` is success, anything else is failure.
///
/// Implementations must be shareable across threads: one engine serves every
/// [`Booster`](crate::Booster) created from the same [`Runtime`](crate::Runtime).
/// Calls for a given context are never issued concurrently by this crate.
pub trait Engine: Send + Sync {
    /// Byte width of the engine's float type (4 or 8).
    fn numeric_width(&self) -> i32;

    /// Allocates a context for `n_features` features. `None` on failure.
    fn alloc(&self, n_features: i32) -> Option<ContextPtr>;

    /// Frees a context.
    fn dealloc(&self, ctx: ContextPtr) -> i32;

    /// (Re)allocates per-example storage for `n_examples` examples, discarding
    /// any previously supplied columns.
    fn refresh_data(&self, ctx: ContextPtr, n_examples: i32) -> i32;

    /// Supplies one column. `feature == n_features` denotes the target.
    ///
    /// `data.len()` always equals the `n_examples` of the last refresh. The
    /// engine must copy the data before returning.
    fn set_feature_data(
        &self,
        ctx: ContextPtr,
        feature: i32,
        data: ExchangeSlice<'_>,
        categorical: bool,
    ) -> i32;

    /// Parses and applies one configuration setting.
    fn set_config_field(&self, ctx: ContextPtr, name: &CStr, value: &CStr) -> i32;

    /// Trains synchronously.
    fn train(&self, ctx: ContextPtr) -> i32;

    /// Writes one prediction per example into `output`.
    ///
    /// `output.len()` always equals the `n_examples` of the last refresh.
    fn predict(&self, ctx: ContextPtr, output: ExchangeSliceMut<'_>) -> i32;
}
