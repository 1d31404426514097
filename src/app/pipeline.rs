//! Shared command workflows.
//!
//! Each command starts from a session with the built-in routines registered,
//! then does its one thing. Presentation stays in `app`.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::ModelEnvironment;
use crate::domain::{Category, FunType, GridUnits};
use crate::error::AppError;
use crate::foreign::{BUILTIN_ROUTINES, Convention};
use crate::io::ingest::{IngestedGrid, load_grid_csv};
use crate::registry::DefaultTable;
use crate::report::{EvalSummary, summarize};
use crate::session::{RoutineSpec, Session};

/// Session with every built-in routine registered under its own name.
pub fn builtin_session() -> Result<Session, AppError> {
    let mut session = Session::default();
    for routine in BUILTIN_ROUTINES {
        session.add_builtin(routine.name)?;
    }
    debug!(count = session.list().len(), "built-in routines registered");
    Ok(session)
}

/// Outputs of one `fitfun eval`.
#[derive(Debug, Clone)]
pub struct EvalRun {
    pub ingest: IngestedGrid,
    pub values: Vec<f64>,
    pub summary: EvalSummary,
}

pub fn run_eval(
    session: &Session,
    name: &str,
    grid_path: &Path,
    units: GridUnits,
    params: &[f64],
    current: Option<&[f64]>,
) -> Result<EvalRun, AppError> {
    let ingest = load_grid_csv(grid_path, units)?;
    let values = session.eval_binned(name, &ingest.grid, params, current)?;
    let summary = summarize(&ingest.grid, &values)?;
    Ok(EvalRun {
        ingest,
        values,
        summary,
    })
}

/// What to register from a shared library.
#[derive(Debug, Clone)]
pub struct LoadRequest<'a> {
    pub library: &'a Path,
    pub symbol: &'a str,
    pub convention: Convention,
    pub category: Category,
    pub name: &'a str,
    pub params: &'a [String],
    pub units: &'a [String],
    pub norms: Option<Vec<usize>>,
    pub init: Option<&'a str>,
}

/// Export the model environment if it resolves.
///
/// Libraries that do not read `HEADAS` still load when it does not, so this
/// only warns. Call before any thread is spawned.
pub fn prepare_environment() {
    match ModelEnvironment::from_env() {
        Ok(env) => env.apply(),
        Err(err) => warn!(error = %err, "model environment unresolved; loading without it"),
    }
}

/// Resolve a routine from a shared library and register it.
pub fn load_routine(session: &mut Session, req: LoadRequest<'_>) -> Result<FunType, AppError> {
    let mut handle = session.load_symbol(req.library, req.symbol, req.convention)?;
    handle.set_init_string(req.init)?;

    let params: Vec<&str> = req.params.iter().map(String::as_str).collect();
    let units: Vec<&str> = req.units.iter().map(String::as_str).collect();
    session.add_routine(
        handle,
        RoutineSpec {
            name: req.name,
            category: req.category,
            param_names: &params,
            units: &units,
            norm_indexes: req.norms,
            defaults: DefaultTable::default(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_session_registers_every_routine_in_order() {
        let s = builtin_session().unwrap();
        let names: Vec<&str> = s.list().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["powerlaw", "gaussian", "constant", "scale"]);
    }

    #[test]
    fn eval_reads_the_grid_and_summarizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bin_lo,bin_hi,notice").unwrap();
        writeln!(file, "1,2,1").unwrap();
        writeln!(file, "2,4,1").unwrap();
        writeln!(file, "4,8,0").unwrap();

        let s = builtin_session().unwrap();
        let run = run_eval(&s, "powerlaw", file.path(), GridUnits::Kev, &[1.0, 2.0], None).unwrap();
        assert_eq!(run.values.len(), 2);
        assert_eq!(run.summary.peak.0, 0);
        approx::assert_relative_eq!(run.summary.total, 0.75, max_relative = 1e-6);
    }

    #[test]
    fn loading_a_missing_library_fails_cleanly() {
        let mut s = builtin_session().unwrap();
        let err = load_routine(
            &mut s,
            LoadRequest {
                library: Path::new("/no/such/libmodel.so"),
                symbol: "model_",
                convention: Convention::Single,
                category: Category::Additive,
                name: "model",
                params: &["norm".to_string()],
                units: &[],
                norms: None,
                init: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Link error"));
        assert_eq!(s.list().len(), BUILTIN_ROUTINES.len());
    }
}
