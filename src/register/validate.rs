//! Name and unit checks shared by every registration path.

use crate::error::AppError;

/// Size of a name buffer including its terminator; names hold at most
/// `MAX_NAME_SIZE - 1` bytes.
pub const MAX_NAME_SIZE: usize = 64;

/// Parameter names and units after validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckedNames {
    pub params: Vec<String>,
    pub units: Vec<String>,
}

fn bad_name() -> AppError {
    AppError::config(format!(
        "invalid string:  names must have 1-{} non-whitespace characters",
        MAX_NAME_SIZE - 1
    ))
}

/// Non-empty, short enough, and free of whitespace and control characters.
pub fn check_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() >= MAX_NAME_SIZE {
        return Err(bad_name());
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(bad_name());
    }
    Ok(())
}

/// Validate a new function's name, parameter names and units.
///
/// A parameter list consisting of one empty name means "no parameters".
/// Missing units are filled with empty strings.
pub fn check_new_function(name: &str, params: &[String], units: &[String]) -> Result<CheckedNames, AppError> {
    check_name(name)?;

    if params.is_empty() || (params.len() == 1 && params[0].is_empty()) {
        return Ok(CheckedNames::default());
    }

    for p in params {
        check_name(p)?;
    }

    if units.len() > params.len() {
        return Err(AppError::config(format!(
            "{name} definition:  {} units given for {} parameters",
            units.len(),
            params.len()
        )));
    }
    if units.iter().any(|u| u.len() >= MAX_NAME_SIZE) {
        return Err(AppError::config(format!(
            "{name} definition:  units string length exceeds {} characters",
            MAX_NAME_SIZE - 1
        )));
    }

    let mut units = units.to_vec();
    units.resize(params.len(), String::new());
    Ok(CheckedNames {
        params: params.to_vec(),
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn name_rules() {
        assert!(check_name("gauss").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("two words").is_err());
        assert!(check_name("tab\there").is_err());
        assert!(check_name("bell\u{7}").is_err());
        assert!(check_name(&"x".repeat(63)).is_ok());
        assert!(check_name(&"x".repeat(64)).is_err());
    }

    #[test]
    fn single_empty_parameter_means_none() {
        let c = check_new_function("f", &strings(&[""]), &[]).unwrap();
        assert!(c.params.is_empty());
        assert!(c.units.is_empty());
    }

    #[test]
    fn empty_name_among_several_is_rejected() {
        assert!(check_new_function("f", &strings(&["a", ""]), &[]).is_err());
    }

    #[test]
    fn units_are_padded_and_length_checked() {
        let c = check_new_function("f", &strings(&["a", "b"]), &strings(&["keV"])).unwrap();
        assert_eq!(c.units, strings(&["keV", ""]));

        assert!(check_new_function("f", &strings(&["a"]), &["u".repeat(63)]).is_ok());
        let long = "u".repeat(64);
        let err = check_new_function("f", &strings(&["a"]), &[long]).unwrap_err();
        assert!(err.to_string().contains("units string length"));
        assert!(check_new_function("f", &strings(&["a"]), &strings(&["x", "y"])).is_err());
    }
}
