//! Model-library configuration: settings and installation paths.

pub mod environment;
pub mod settings;

pub use environment::{ModelEnvironment, PathSource, ResolvedPath};
pub use settings::{Cosmology, ModelLibrarySettings};
