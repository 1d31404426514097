//! Which parameters of a new function are normalizations.

use crate::error::AppError;

/// Norm parameter indices for a function with `params`.
///
/// An explicit list wins unless its first entry equals the parameter count,
/// which callers use to say "none supplied". Otherwise the last parameter
/// called `norm` (any case) is the norm, if there is one.
///
/// Only additive functions act on the result (see
/// [`FunctionShape::norm_index`](crate::domain::FunctionShape::norm_index)),
/// so a later category change needs no re-detection.
pub fn detect_norms(name: &str, params: &[String], explicit: Option<&[usize]>) -> Result<Vec<usize>, AppError> {
    let nparams = params.len();

    if let Some(list) = explicit.filter(|l| !l.is_empty() && l[0] != nparams) {
        if let Some(&bad) = list.iter().find(|&&i| i >= nparams) {
            return Err(AppError::config(format!(
                "{name} definition:  norm index {bad} is out of range ({nparams} parameters)"
            )));
        }
        return Ok(list.to_vec());
    }

    Ok(params
        .iter()
        .rposition(|p| p.eq_ignore_ascii_case("norm"))
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn named_norm_is_found_case_insensitively() {
        let p = names(&["center", "width", "Norm"]);
        assert_eq!(detect_norms("gauss", &p, None).unwrap(), vec![2]);
        let p = names(&["NORM", "x", "norm"]);
        assert_eq!(detect_norms("f", &p, None).unwrap(), vec![2]);
    }

    #[test]
    fn explicit_list_is_used_verbatim() {
        let p = names(&["a", "b", "norm"]);
        assert_eq!(detect_norms("f", &p, Some(&[1, 0])).unwrap(), vec![1, 0]);
    }

    #[test]
    fn sentinel_falls_back_to_name_search() {
        let p = names(&["a", "norm"]);
        assert_eq!(detect_norms("f", &p, Some(&[2])).unwrap(), vec![1]);
        assert_eq!(detect_norms("f", &p, Some(&[])).unwrap(), vec![1]);
    }

    #[test]
    fn no_norm_parameter_means_no_norm() {
        let p = names(&["a", "b"]);
        assert!(detect_norms("f", &p, None).unwrap().is_empty());
        assert!(detect_norms("f", &[], None).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_explicit_index_is_rejected() {
        let p = names(&["a", "b", "c"]);
        assert!(detect_norms("f", &p, Some(&[1, 5])).is_err());
    }
}
