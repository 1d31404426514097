//! Formatted terminal output.
//!
//! Formatting lives here so the registry and evaluation code stay free of
//! presentation concerns.

use crate::config::{ModelEnvironment, ModelLibrarySettings};
use crate::domain::{FunctionInfo, MeasurementGrid};
use crate::grid::SyntheticGrid;
use crate::registry::FunctionDescriptor;
use crate::report::EvalSummary;

pub fn format_function_list(functions: &[&FunctionDescriptor]) -> String {
    if functions.is_empty() {
        return "(no fit-functions registered)\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:>4} {:>3} {:<4} {:<7} {:<16} {}\n",
        "type", "ver", "cat", "origin", "name", "params"
    ));
    for d in functions {
        out.push_str(&format!(
            "{:>4} {:>3} {:<4} {:<7} {:<16} {}\n",
            d.fun_type(),
            d.version(),
            d.category().display_name(),
            format!("{:?}", d.provenance_kind()).to_lowercase(),
            d.name(),
            d.param_names().join(", "),
        ));
    }
    out
}

pub fn format_function_info(descriptor: &FunctionDescriptor, info: &FunctionInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} (type {}, version {}, {})\n",
        descriptor.name(),
        descriptor.fun_type(),
        descriptor.version(),
        descriptor.category().display_name()
    ));
    if info.is_empty() {
        out.push_str("  (no parameters)\n");
        return out;
    }

    out.push_str(&format!(
        "  {:<3} {:<14} {:<8} {:>12} {:>12} {:>12} {}\n",
        "#", "name", "unit", "value", "min", "max", "frozen"
    ));
    for i in 0..info.len() {
        let norm = if descriptor.norm_indexes().contains(&i) { " (norm)" } else { "" };
        out.push_str(&format!(
            "  {:<3} {:<14} {:<8} {:>12} {:>12} {:>12} {}{}\n",
            i,
            info.name[i],
            info.unit[i],
            fmt_num(info.value[i]),
            fmt_num(info.min[i]),
            fmt_num(info.max[i]),
            if info.freeze[i] { "yes" } else { "no" },
            norm,
        ));
    }
    out
}

pub fn format_synthetic_grid(grid: &MeasurementGrid, synthetic: &SyntheticGrid<f64>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Measurement grid: {} bins, {} noticed ({:?})\n",
        grid.nbins(),
        grid.n_notice(),
        grid.units()
    ));
    out.push_str(&format!(
        "Synthetic grid: {} bins, {} kept{}\n",
        synthetic.nbins(),
        synthetic.n_keep(),
        if synthetic.is_reversed() { ", reversed" } else { "" }
    ));
    out.push_str(&format!("  {:<5} {:>14} {:>14} {}\n", "#", "lo [keV]", "hi [keV]", "keep"));
    let edges = synthetic.edges();
    for (i, keep) in synthetic.keep().iter().enumerate() {
        out.push_str(&format!(
            "  {:<5} {:>14.8} {:>14.8} {}\n",
            i,
            edges[i],
            edges[i + 1],
            if *keep { "yes" } else { "-" }
        ));
    }
    out
}

pub fn format_eval(name: &str, grid: &MeasurementGrid, values: &[f64], summary: &EvalSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {name} on {} noticed bins ===\n", summary.n_notice));
    out.push_str(&format!("  {:<5} {:>14} {:>14} {:>16}\n", "bin", "lo", "hi", "value"));
    for (&bin, value) in grid.notice_list().iter().zip(values) {
        out.push_str(&format!(
            "  {:<5} {:>14.6} {:>14.6} {:>16}\n",
            bin,
            grid.bin_lo()[bin],
            grid.bin_hi()[bin],
            fmt_num(*value)
        ));
    }
    out.push_str(&format!(
        "Total: {} | peak bin {} = {}\n",
        fmt_num(summary.total),
        summary.peak.0,
        fmt_num(summary.peak.1)
    ));
    out
}

pub fn format_environment(env: Option<&ModelEnvironment>, settings: &ModelLibrarySettings) -> String {
    let mut out = String::new();
    match env {
        Some(env) => {
            for r in [&env.headas, &env.xanadu] {
                out.push_str(&format!(
                    "{:<8} {} ({})\n",
                    r.name,
                    r.path.display(),
                    format!("{:?}", r.source).to_lowercase()
                ));
            }
        }
        None => out.push_str("HEADAS   (unresolved)\n"),
    }

    let c = settings.cosmology();
    out.push_str(&format!(
        "data dir: {}\n",
        settings
            .data_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(default)".to_string())
    ));
    out.push_str(&format!("abundance: {} | xsection: {}\n", settings.abundance(), settings.xsection()));
    out.push_str(&format!("cosmology: H0={} q0={} L0={}\n", c.hubble, c.decel, c.lambda));
    out.push_str(&format!("chatter: {}\n", settings.chatter()));
    for (k, v) in settings.model_strings() {
        out.push_str(&format!("  {k} = {v}\n"));
    }
    out
}

fn fmt_num(x: f64) -> String {
    if x != 0.0 && (x.abs() >= 1.0e6 || x.abs() < 1.0e-4) {
        format!("{x:.4e}")
    } else {
        format!("{x:.6}")
    }
}
