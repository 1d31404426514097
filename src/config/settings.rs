//! Configuration surface of the external model library.
//!
//! Plain data with validated setters. The session keeps one of these and the
//! `env` command prints it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;

pub const DEFAULT_HUBBLE: f64 = 70.0;
pub const DEFAULT_DECEL: f64 = 0.0;
pub const DEFAULT_LAMBDA: f64 = 0.73;

/// Solar abundance tables the model library knows.
pub const ABUNDANCE_TABLES: &[&str] = &["angr", "aspl", "feld", "aneb", "grsa", "wilm", "lodd"];

/// Photoelectric cross-section tables.
pub const XSECTION_TABLES: &[&str] = &["bcmc", "obcm", "vern"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    pub hubble: f64,
    pub decel: f64,
    pub lambda: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            hubble: DEFAULT_HUBBLE,
            decel: DEFAULT_DECEL,
            lambda: DEFAULT_LAMBDA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLibrarySettings {
    data_dir: Option<PathBuf>,
    abundance: String,
    xsection: String,
    cosmology: Cosmology,
    chatter: i32,
    model_strings: BTreeMap<String, String>,
}

impl Default for ModelLibrarySettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            abundance: "angr".to_string(),
            xsection: "bcmc".to_string(),
            cosmology: Cosmology::default(),
            chatter: 10,
            model_strings: BTreeMap::new(),
        }
    }
}

fn pick(kind: &str, table: &[&str], name: &str) -> Result<String, AppError> {
    let lower = name.trim().to_ascii_lowercase();
    if table.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(AppError::config(format!(
            "Unknown {kind} table '{name}' (expected one of: {}).",
            table.join(", ")
        )))
    }
}

impl ModelLibrarySettings {
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn set_data_dir(&mut self, dir: &Path) -> Result<(), AppError> {
        if !dir.is_dir() {
            return Err(AppError::config(format!("Model data directory {} does not exist.", dir.display())));
        }
        self.data_dir = Some(dir.to_path_buf());
        Ok(())
    }

    pub fn abundance(&self) -> &str {
        &self.abundance
    }

    /// Table names are case-insensitive.
    pub fn set_abundance(&mut self, name: &str) -> Result<(), AppError> {
        self.abundance = pick("abundance", ABUNDANCE_TABLES, name)?;
        debug!(table = %self.abundance, "abundance table set");
        Ok(())
    }

    pub fn xsection(&self) -> &str {
        &self.xsection
    }

    pub fn set_xsection(&mut self, name: &str) -> Result<(), AppError> {
        self.xsection = pick("cross-section", XSECTION_TABLES, name)?;
        debug!(table = %self.xsection, "cross-section table set");
        Ok(())
    }

    pub fn cosmology(&self) -> Cosmology {
        self.cosmology
    }

    /// `None` restores the default.
    pub fn set_hubble(&mut self, h0: Option<f64>) -> Result<(), AppError> {
        let h0 = h0.unwrap_or(DEFAULT_HUBBLE);
        if !h0.is_finite() || h0 <= 0.0 {
            return Err(AppError::config(format!("Hubble constant must be positive, got {h0}.")));
        }
        self.cosmology.hubble = h0;
        Ok(())
    }

    pub fn set_decel(&mut self, q0: Option<f64>) -> Result<(), AppError> {
        let q0 = q0.unwrap_or(DEFAULT_DECEL);
        if !q0.is_finite() {
            return Err(AppError::config("Deceleration parameter must be finite."));
        }
        self.cosmology.decel = q0;
        Ok(())
    }

    pub fn set_lambda(&mut self, l0: Option<f64>) -> Result<(), AppError> {
        let l0 = l0.unwrap_or(DEFAULT_LAMBDA);
        if !l0.is_finite() {
            return Err(AppError::config("Cosmological constant must be finite."));
        }
        self.cosmology.lambda = l0;
        Ok(())
    }

    pub fn chatter(&self) -> i32 {
        self.chatter
    }

    pub fn set_chatter(&mut self, level: i32) -> Result<(), AppError> {
        if level < 0 {
            return Err(AppError::config(format!("Chatter level must be non-negative, got {level}.")));
        }
        self.chatter = level;
        Ok(())
    }

    pub fn model_string(&self, key: &str) -> Option<&str> {
        self.model_strings.get(key).map(String::as_str)
    }

    pub fn model_strings(&self) -> &BTreeMap<String, String> {
        &self.model_strings
    }

    /// Keys are stored upper-case; setting an empty value removes the key.
    pub fn set_model_string(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(AppError::config(format!("Invalid model string key '{key}'.")));
        }
        let key = key.to_ascii_uppercase();
        if value.is_empty() {
            self.model_strings.remove(&key);
        } else {
            self.model_strings.insert(key, value.to_string());
        }
        Ok(())
    }
}
