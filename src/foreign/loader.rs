//! Resolve external routines from shared libraries.

use std::path::Path;
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::foreign::convention::{Convention, RawSymbol, RoutineSymbol};
use crate::foreign::handle::ForeignHandle;

/// Open a shared library with its symbols resolved immediately and made
/// available to libraries opened later.
pub fn open_library(path: &Path) -> Result<Arc<Library>, AppError> {
    // SAFETY: running a library's initializers is inherent to loading it.
    let library = unsafe { open(path) }.map_err(|err| {
        warn!(path = %path.display(), error = %err, "link error");
        AppError::config(format!("Link error: failed loading {}: {err}", path.display()))
    })?;
    debug!(path = %path.display(), "opened model library");
    Ok(Arc::new(library))
}

#[cfg(unix)]
unsafe fn open(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
unsafe fn open(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}

/// Resolve `symbol` in an already opened library.
///
/// The caller asserts that the symbol really follows `convention`; there is
/// no way to check a C signature at runtime.
pub fn resolve(library: &Arc<Library>, symbol: &str, convention: Convention) -> Result<ForeignHandle, AppError> {
    // SAFETY: the symbol is only ever called through the convention's type,
    // and the handle keeps `library` alive.
    let raw: RawSymbol = unsafe {
        let sym = library.get::<RawSymbol>(symbol.as_bytes()).map_err(|err| {
            warn!(symbol, error = %err, "link error");
            AppError::config(format!("Link error: failed loading {symbol}: {err}"))
        })?;
        *sym
    };
    // SAFETY: see above.
    let routine = unsafe { RoutineSymbol::from_raw(convention, raw) };
    Ok(ForeignHandle::from_library(symbol, routine, Arc::clone(library)))
}

/// Open `path` and resolve `symbol` in one step.
pub fn load_symbol(path: &Path, symbol: &str, convention: Convention) -> Result<ForeignHandle, AppError> {
    let library = open_library(path)?;
    let handle = resolve(&library, symbol, convention)?;
    debug!(symbol, convention = convention.label(), "resolved external routine");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_symbol(&dir.path().join("libnothere.so"), "powerlaw_", Convention::Single).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert!(err.to_string().starts_with("Link error"));
    }

    #[test]
    fn non_library_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.so");
        std::fs::write(&path, b"not an object file").unwrap();
        assert!(open_library(&path).is_err());
    }
}
