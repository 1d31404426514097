//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - builds a session with the built-in routines
//! - runs one command and prints its report
//! - writes optional exports

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EnvArgs, EvalArgs, GridArgs, InfoArgs, LoadArgs};
use crate::config::{ModelEnvironment, ModelLibrarySettings};
use crate::error::AppError;
use crate::grid::SyntheticGrid;
use crate::io::export::{FunctionInfoFile, to_json, write_eval_csv, write_function_info_json};
use crate::io::ingest::load_grid_csv;
use crate::report::format;
use crate::session::Session;

pub mod pipeline;

/// Entry point for the `fitfun` binary.
pub fn run() -> Result<(), AppError> {
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::List => handle_list(),
        Command::Info(args) => handle_info(args),
        Command::Grid(args) => handle_grid(args),
        Command::Eval(args) => handle_eval(args),
        Command::Load(args) => handle_load(args),
        Command::Env(args) => handle_env(args),
    }
}

fn handle_list() -> Result<(), AppError> {
    let session = pipeline::builtin_session()?;
    print!("{}", format::format_function_list(&session.list()));
    Ok(())
}

fn handle_info(args: InfoArgs) -> Result<(), AppError> {
    let session = pipeline::builtin_session()?;
    print_info(&session, &args.name, args.json, args.export.as_deref())
}

fn print_info(session: &Session, name: &str, json: bool, export: Option<&std::path::Path>) -> Result<(), AppError> {
    let info = session.info(name)?;
    let descriptor = session
        .registry()
        .lookup_name(name)
        .ok_or_else(|| AppError::registry(format!("Fit-function {name} is not defined.")))?;

    let file = FunctionInfoFile::new(descriptor, info.clone());
    if json {
        println!("{}", to_json(&file)?);
    } else {
        print!("{}", format::format_function_info(descriptor, &info));
    }
    if let Some(path) = export {
        write_function_info_json(path, &file)?;
    }
    Ok(())
}

fn handle_grid(args: GridArgs) -> Result<(), AppError> {
    let ingest = load_grid_csv(&args.input.grid, args.input.units)?;
    let synthetic = SyntheticGrid::<f64>::build(&ingest.grid)?;
    print!("{}", format::format_synthetic_grid(&ingest.grid, &synthetic));
    Ok(())
}

fn handle_eval(args: EvalArgs) -> Result<(), AppError> {
    let session = pipeline::builtin_session()?;
    let run = pipeline::run_eval(
        &session,
        &args.name,
        &args.input.grid,
        args.input.units,
        &args.params,
        args.current.as_deref(),
    )?;
    print!("{}", format::format_eval(&args.name, &run.ingest.grid, &run.values, &run.summary));

    if let Some(path) = &args.export {
        write_eval_csv(path, &args.name, &run.ingest.grid, &run.values)?;
    }
    Ok(())
}

fn handle_load(args: LoadArgs) -> Result<(), AppError> {
    pipeline::prepare_environment();
    let mut session = pipeline::builtin_session()?;
    let name = args.name.clone().unwrap_or_else(|| args.symbol.trim_end_matches('_').to_string());

    pipeline::load_routine(
        &mut session,
        pipeline::LoadRequest {
            library: &args.lib,
            symbol: &args.symbol,
            convention: args.convention,
            category: args.category,
            name: &name,
            params: &args.params,
            units: &args.units,
            norms: args.norms.clone(),
            init: args.init.as_deref(),
        },
    )?;

    let (Some(grid), Some(values)) = (&args.grid, &args.values) else {
        return print_info(&session, &name, false, None);
    };
    let run = pipeline::run_eval(&session, &name, grid, args.units_of_grid, values, args.current.as_deref())?;
    print!("{}", format::format_eval(&name, &run.ingest.grid, &run.values, &run.summary));
    Ok(())
}

fn handle_env(args: EnvArgs) -> Result<(), AppError> {
    let env = match ModelEnvironment::from_env() {
        Ok(env) => Some(env),
        Err(err) => {
            warn!(error = %err, "model environment unresolved");
            None
        }
    };

    let mut session = Session::default();
    configure_settings(session.settings_mut(), &args)?;
    let settings = session.settings();

    if args.json {
        let doc = serde_json::json!({ "environment": env, "settings": settings });
        let text = serde_json::to_string_pretty(&doc).map_err(|e| AppError::io(format!("Failed to encode JSON: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", format::format_environment(env.as_ref(), settings));
    }
    Ok(())
}

/// Apply the `env` flags to `settings`.
fn configure_settings(settings: &mut ModelLibrarySettings, args: &EnvArgs) -> Result<(), AppError> {
    if let Some(table) = &args.abund {
        settings.set_abundance(table)?;
    }
    if let Some(table) = &args.xsect {
        settings.set_xsection(table)?;
    }
    if let Some(level) = args.chatter {
        settings.set_chatter(level)?;
    }
    if let Some(dir) = &args.data_dir {
        settings.set_data_dir(dir)?;
    }
    if args.h0.is_some() {
        settings.set_hubble(args.h0)?;
    }
    if args.q0.is_some() {
        settings.set_decel(args.q0)?;
    }
    if args.lambda.is_some() {
        settings.set_lambda(args.lambda)?;
    }
    for pair in &args.model_strings {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::config(format!("Model string '{pair}' is not KEY=VALUE.")))?;
        settings.set_model_string(key, value)?;
    }
    Ok(())
}

/// Rewrite argv so a bare `fitfun` lists the registered functions.
///
/// Rules:
/// - `fitfun`                   -> `fitfun list`
/// - `fitfun --log-level debug` -> `fitfun --log-level debug list`
/// - anything naming a subcommand, help or version is unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    const SUBCOMMANDS: &[&str] = &["list", "info", "grid", "eval", "load", "env", "help"];
    let mut names_command = false;
    let mut args = argv.iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--log-level" {
            args.next();
            continue;
        }
        if SUBCOMMANDS.contains(&arg.as_str()) || matches!(arg.as_str(), "-h" | "--help" | "-V" | "--version") {
            names_command = true;
            break;
        }
    }
    if !names_command {
        argv.push("list".to_string());
    }
    argv
}
