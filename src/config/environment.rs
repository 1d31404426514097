//! Locating the external model library's installation.
//!
//! The library finds its data through `HEADAS` (and, for older releases,
//! `XANADU`). A value from the environment wins when it names an existing
//! path; otherwise the build-time default is used.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;

pub const HEADAS: &str = "HEADAS";
pub const XANADU: &str = "XANADU";

/// Set `FITFUN_HEADAS_DEFAULT` at build time to bake in an installation path.
pub fn compiled_headas() -> &'static str {
    option_env!("FITFUN_HEADAS_DEFAULT").unwrap_or("/usr/local/headas")
}

/// `XANADU` defaults to the directory above the compiled-in `HEADAS`.
pub fn compiled_xanadu() -> String {
    format!("{}/..", compiled_headas())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSource {
    Environment,
    Compiled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub name: String,
    pub path: PathBuf,
    pub source: PathSource,
}

/// Pick the path for `name`.
///
/// `lookup` reads the variable (the process environment in practice).
pub fn resolve_path(
    name: &str,
    compiled: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedPath, AppError> {
    if let Some(value) = lookup(name) {
        let candidate = PathBuf::from(&value);
        if candidate.exists() {
            return Ok(ResolvedPath {
                name: name.to_string(),
                path: candidate,
                source: PathSource::Environment,
            });
        }
        warn!(
            variable = name,
            value = %value,
            fallback = compiled,
            "environment variable provides an invalid path; falling back to compiled-in path"
        );
    }

    let fallback = Path::new(compiled);
    if !fallback.exists() {
        return Err(AppError::config(format!("Invalid path: {name}={compiled}")));
    }
    Ok(ResolvedPath {
        name: name.to_string(),
        path: fallback.to_path_buf(),
        source: PathSource::Compiled,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEnvironment {
    pub headas: ResolvedPath,
    pub xanadu: ResolvedPath,
}

impl ModelEnvironment {
    pub fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        headas_default: &str,
        xanadu_default: &str,
    ) -> Result<Self, AppError> {
        let xanadu = resolve_path(XANADU, xanadu_default, &lookup)?;
        let headas = resolve_path(HEADAS, headas_default, &lookup)?;
        Ok(Self { headas, xanadu })
    }

    /// Load `.env`, then resolve against the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::resolve_with(|name| std::env::var(name).ok(), compiled_headas(), &compiled_xanadu())
    }

    /// Export the resolved paths so the model library sees them.
    pub fn apply(&self) {
        for resolved in [&self.xanadu, &self.headas] {
            // SAFETY: called from the single-threaded start-up path before any
            // model library is loaded or other threads exist.
            unsafe { std::env::set_var(&resolved.name, &resolved.path) };
            info!(variable = %resolved.name, path = %resolved.path.display(), "model environment set");
        }
    }
}
