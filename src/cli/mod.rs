//! Command-line parsing for the `fitfun` binary.
//!
//! Parsing and dispatch stay separate from the registry and evaluation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Category, GridUnits};
use crate::foreign::Convention;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fitfun", version, about = "Spectral fit-function registry and external model bridge")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered fit-functions (the built-in routines are always registered).
    List,
    /// Show the parameter defaults of one fit-function.
    Info(InfoArgs),
    /// Print the contiguous grid an external routine would see, with its keep mask.
    Grid(GridArgs),
    /// Evaluate a registered fit-function on a measurement grid.
    Eval(EvalArgs),
    /// Register a routine from a shared library, then show or evaluate it.
    Load(LoadArgs),
    /// Show the resolved model-library environment and settings.
    Env(EnvArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    pub name: String,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON document to a file.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

/// Measurement grid input shared by several commands.
#[derive(Debug, Args, Clone)]
pub struct GridInput {
    /// CSV with `bin_lo,bin_hi[,notice]` columns.
    #[arg(long, value_name = "CSV")]
    pub grid: PathBuf,

    /// Units of the bin edges.
    #[arg(long, value_enum, default_value_t = GridUnits::Angstrom)]
    pub units: GridUnits,
}

#[derive(Debug, Args)]
pub struct GridArgs {
    #[command(flatten)]
    pub input: GridInput,
}

#[derive(Debug, Args)]
pub struct EvalArgs {
    pub name: String,

    #[command(flatten)]
    pub input: GridInput,

    /// Parameter values, comma separated.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Vec<f64>,

    /// Current spectrum for convolution functions, one value per noticed bin.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub current: Option<Vec<f64>>,

    /// Write the evaluated bins to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Shared library holding the routine.
    #[arg(long, value_name = "PATH")]
    pub lib: PathBuf,

    /// Symbol to resolve.
    #[arg(long)]
    pub symbol: String,

    /// Calling convention: f, fn, F or C.
    #[arg(long, value_enum)]
    pub convention: Convention,

    #[arg(long, value_enum, default_value_t = Category::Additive)]
    pub category: Category,

    /// Parameter names, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub params: Vec<String>,

    /// Parameter units, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub units: Vec<String>,

    /// Norm parameter indices (default: the parameter named `norm`).
    #[arg(long, value_delimiter = ',')]
    pub norms: Option<Vec<usize>>,

    /// Fit-function name (default: the symbol).
    #[arg(long)]
    pub name: Option<String>,

    /// Initialization string handed to C-style routines.
    #[arg(long)]
    pub init: Option<String>,

    /// Evaluate right away on this grid.
    #[arg(long, value_name = "CSV", requires = "values")]
    pub grid: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = GridUnits::Angstrom)]
    pub units_of_grid: GridUnits,

    /// Parameter values for the immediate evaluation.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub values: Option<Vec<f64>>,

    /// Current spectrum for convolution routines.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub current: Option<Vec<f64>>,
}

#[derive(Debug, Args)]
pub struct EnvArgs {
    /// Solar abundance table to select.
    #[arg(long)]
    pub abund: Option<String>,

    /// Photoelectric cross-section table to select.
    #[arg(long)]
    pub xsect: Option<String>,

    /// Model library chatter level.
    #[arg(long)]
    pub chatter: Option<i32>,

    /// Model data directory.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Hubble constant H0 (km/s/Mpc).
    #[arg(long, allow_hyphen_values = true)]
    pub h0: Option<f64>,

    /// Deceleration parameter q0.
    #[arg(long, allow_hyphen_values = true)]
    pub q0: Option<f64>,

    /// Cosmological constant lambda0.
    #[arg(long, allow_hyphen_values = true)]
    pub lambda: Option<f64>,

    /// Model string as KEY=VALUE (repeatable; an empty VALUE removes KEY).
    #[arg(long = "model-string", value_name = "KEY=VALUE")]
    pub model_strings: Vec<String>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
