//! The engine loaded from the BitBoost shared library.
//!
//! All eight `bb_*` symbols are resolved once in [`NativeEngine::load`]; a
//! missing symbol fails the load instead of the first call that needs it.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::info;

use super::{ContextPtr, Engine, ExchangeSlice, ExchangeSliceMut};
use crate::error::BitBoostError;

type NumericWidthFn = unsafe extern "C" fn() -> c_int;
type AllocFn = unsafe extern "C" fn(c_int) -> *mut c_void;
type DeallocFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type RefreshDataFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type SetFeatureDataFn = unsafe extern "C" fn(*mut c_void, c_int, *const c_void, c_int) -> c_int;
type SetConfigFieldFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int;
type TrainFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type PredictFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> c_int;

/// Resolved entry points. Only valid while the owning `Library` is loaded.
struct Symbols {
    numeric_width: NumericWidthFn,
    alloc: AllocFn,
    dealloc: DeallocFn,
    refresh_data: RefreshDataFn,
    set_feature_data: SetFeatureDataFn,
    set_config_field: SetConfigFieldFn,
    train: TrainFn,
    predict: PredictFn,
}

/// [`Engine`] backed by a dynamically loaded `libbitboost`.
pub struct NativeEngine {
    path: PathBuf,
    symbols: Symbols,
    // Must outlive every call through `symbols`; it is dropped last.
    _library: Library,
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl NativeEngine {
    /// Loads the engine library at `path` and resolves its entry points.
    ///
    /// # Errors
    ///
    /// Returns [`BitBoostError::RuntimeInit`] if the library cannot be loaded
    /// or any `bb_*` symbol is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BitBoostError> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: loading a library runs its initializers. The path comes from
        // the caller or from discovery and is trusted to be a BitBoost build.
        let library = unsafe {
            Library::new(&path).map_err(|e| {
                BitBoostError::RuntimeInit(format!(
                    "Failed to load library '{}': {}",
                    path.display(),
                    e
                ))
            })?
        };

        let symbols = Symbols {
            numeric_width: resolve(&library, &path, b"bb_get_numt_nbytes\0")?,
            alloc: resolve(&library, &path, b"bb_alloc\0")?,
            dealloc: resolve(&library, &path, b"bb_dealloc\0")?,
            refresh_data: resolve(&library, &path, b"bb_refresh_data\0")?,
            set_feature_data: resolve(&library, &path, b"bb_set_feature_data\0")?,
            set_config_field: resolve(&library, &path, b"bb_set_config_field\0")?,
            train: resolve(&library, &path, b"bb_train\0")?,
            predict: resolve(&library, &path, b"bb_predict\0")?,
        };

        info!("Loaded BitBoost engine from {}", path.display());

        Ok(Self {
            path,
            symbols,
            _library: library,
        })
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Copies a function pointer out of the library.
fn resolve<T: Copy>(library: &Library, path: &Path, name: &[u8]) -> Result<T, BitBoostError> {
    // SAFETY: `T` is one of the `*Fn` aliases above, which match the engine's
    // exported C signatures. The pointer is only used while `library` is kept
    // alive inside the same `NativeEngine`.
    unsafe {
        library.get::<T>(name).map(|symbol| *symbol).map_err(|e| {
            let name = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]);
            BitBoostError::RuntimeInit(format!(
                "Symbol '{}' not found in '{}': {}",
                name,
                path.display(),
                e
            ))
        })
    }
}

// SAFETY (all calls below): the symbols match the engine's C signatures, the
// context pointers were produced by `alloc` of this same library, and buffer
// lengths equal the example count last passed to `refresh_data`.
impl Engine for NativeEngine {
    fn numeric_width(&self) -> i32 {
        unsafe { (self.symbols.numeric_width)() }
    }

    fn alloc(&self, n_features: i32) -> Option<ContextPtr> {
        unsafe { ContextPtr::from_raw((self.symbols.alloc)(n_features)) }
    }

    fn dealloc(&self, ctx: ContextPtr) -> i32 {
        unsafe { (self.symbols.dealloc)(ctx.as_ptr()) }
    }

    fn refresh_data(&self, ctx: ContextPtr, n_examples: i32) -> i32 {
        unsafe { (self.symbols.refresh_data)(ctx.as_ptr(), n_examples) }
    }

    fn set_feature_data(
        &self,
        ctx: ContextPtr,
        feature: i32,
        data: ExchangeSlice<'_>,
        categorical: bool,
    ) -> i32 {
        let is_cat = c_int::from(categorical);
        unsafe { (self.symbols.set_feature_data)(ctx.as_ptr(), feature, data.as_ptr(), is_cat) }
    }

    fn set_config_field(&self, ctx: ContextPtr, name: &CStr, value: &CStr) -> i32 {
        unsafe { (self.symbols.set_config_field)(ctx.as_ptr(), name.as_ptr(), value.as_ptr()) }
    }

    fn train(&self, ctx: ContextPtr) -> i32 {
        unsafe { (self.symbols.train)(ctx.as_ptr()) }
    }

    fn predict(&self, ctx: ContextPtr, mut output: ExchangeSliceMut<'_>) -> i32 {
        unsafe { (self.symbols.predict)(ctx.as_ptr(), output.as_mut_ptr()) }
    }
}
