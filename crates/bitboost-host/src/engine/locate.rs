//! Discovery of the engine library and its parameter schema on disk.
//!
//! # Library Search Order
//!
//! 1. `BITBOOST_LIB` environment variable (path to the library file)
//! 2. `{dir}/libbitboost.so` for every search directory (installed layout)
//! 3. `{dir}/target/{debug,release}/libbitboost.so` for every search directory
//!    (source checkout); when both builds exist the newer one is used
//!
//! # Schema Search Order
//!
//! 1. `BITBOOST_CONFIG_CSV` environment variable
//! 2. `{dir}/bitboost_config.gen.csv` for every search directory
//! 3. `{dir}/../bitboost_config.gen.csv` for every search directory
//!
//! Search directories are the explicitly configured ones, followed by the
//! directory of the running executable and the current working directory.
//! The library file name is platform specific (`libbitboost.so`,
//! `libbitboost.dylib`, `bitboost.dll`).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::BitBoostError;

/// Environment variable overriding the library location.
pub const LIB_ENV: &str = "BITBOOST_LIB";

/// Environment variable overriding the schema location.
pub const CONFIG_CSV_ENV: &str = "BITBOOST_CONFIG_CSV";

/// File name of the generated parameter schema.
pub const CONFIG_CSV: &str = "bitboost_config.gen.csv";

/// Base name of the engine library.
const LIB_NAME: &str = "bitboost";

/// Where to look for the engine library and schema.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Directories searched before the default ones, in order.
    pub search_dirs: Vec<PathBuf>,
    /// Honour the `BITBOOST_LIB` / `BITBOOST_CONFIG_CSV` overrides.
    pub use_env: bool,
    /// Append the executable's directory and the working directory.
    pub use_default_dirs: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            use_env: true,
            use_default_dirs: true,
        }
    }
}

impl SearchOptions {
    /// Options that only search `dirs` (no environment, no default dirs).
    #[must_use]
    pub fn only(dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            search_dirs: dirs.into_iter().map(Into::into).collect(),
            use_env: false,
            use_default_dirs: false,
        }
    }

    /// Adds a directory to search before the default ones.
    #[must_use]
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    fn dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.search_dirs.clone();
        if self.use_default_dirs {
            if let Some(exe_dir) = env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                dirs.push(exe_dir);
            }
            if let Ok(cwd) = env::current_dir() {
                dirs.push(cwd);
            }
        }
        dirs
    }
}

/// Finds the engine shared library.
///
/// # Errors
///
/// Returns [`BitBoostError::RuntimeInit`] listing the searched locations if
/// no library is found, or if `BITBOOST_LIB` points to a missing file.
pub fn locate_library(options: &SearchOptions) -> Result<PathBuf, BitBoostError> {
    if options.use_env {
        if let Ok(path) = env::var(LIB_ENV) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(path);
            }
            return Err(BitBoostError::RuntimeInit(format!(
                "{} points to missing file {}",
                LIB_ENV,
                path.display()
            )));
        }
    }

    let file_name = libloading::library_filename(LIB_NAME);
    let dirs = options.dirs();

    for dir in &dirs {
        let installed = dir.join(&file_name);
        if installed.is_file() {
            debug!("Using installed engine library {}", installed.display());
            return Ok(installed);
        }
    }

    for dir in &dirs {
        let debug_build = dir.join("target").join("debug").join(&file_name);
        let release_build = dir.join("target").join("release").join(&file_name);
        if let Some(path) = pick_build(&debug_build, &release_build) {
            return Ok(path);
        }
    }

    Err(BitBoostError::RuntimeInit(format!(
        "BitBoost library '{}' could not be located. Searched:\n{}",
        file_name.to_string_lossy(),
        describe_dirs(options, LIB_ENV, &dirs)
    )))
}

/// Finds the parameter schema CSV.
///
/// # Errors
///
/// Returns [`BitBoostError::RuntimeInit`] listing the searched locations if
/// no schema is found, or if `BITBOOST_CONFIG_CSV` points to a missing file.
pub fn locate_schema(options: &SearchOptions) -> Result<PathBuf, BitBoostError> {
    if options.use_env {
        if let Ok(path) = env::var(CONFIG_CSV_ENV) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(path);
            }
            return Err(BitBoostError::RuntimeInit(format!(
                "{} points to missing file {}",
                CONFIG_CSV_ENV,
                path.display()
            )));
        }
    }

    let dirs = options.dirs();
    let installed = dirs.iter().map(|dir| dir.join(CONFIG_CSV));
    let in_source = dirs.iter().map(|dir| dir.join("..").join(CONFIG_CSV));

    if let Some(path) = installed.chain(in_source).find(|p| p.is_file()) {
        return Ok(path);
    }

    Err(BitBoostError::RuntimeInit(format!(
        "BitBoost schema '{}' not found. Searched:\n{}",
        CONFIG_CSV,
        describe_dirs(options, CONFIG_CSV_ENV, &dirs)
    )))
}

/// Chooses between a debug and a release build of a source checkout.
fn pick_build(debug_build: &Path, release_build: &Path) -> Option<PathBuf> {
    match (debug_build.is_file(), release_build.is_file()) {
        (true, true) => {
            if modified(debug_build) > modified(release_build) {
                warn!("Using newer BitBoost debug build {}", debug_build.display());
                Some(debug_build.to_path_buf())
            } else {
                Some(release_build.to_path_buf())
            }
        }
        (true, false) => {
            warn!("Using BitBoost debug build {}", debug_build.display());
            Some(debug_build.to_path_buf())
        }
        (false, true) => Some(release_build.to_path_buf()),
        (false, false) => None,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn describe_dirs(options: &SearchOptions, env_var: &str, dirs: &[PathBuf]) -> String {
    let mut lines = Vec::new();
    if options.use_env {
        lines.push(format!(" - {env_var} env var"));
    }
    lines.extend(dirs.iter().map(|d| format!(" - {}", d.display())));
    lines.join("\n")
}
