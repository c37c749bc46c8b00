//! Compose-style variable substitution.
//!
//! Supported forms: `$$`, `$VAR`, `${VAR}`, `${VAR:-default}`,
//! `${VAR-default}`, `${VAR:?message}` and `${VAR?message}`.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(
        r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?[-?])([^}]*))?\}|([A-Za-z_][A-Za-z0-9_]*))"
    )
    .expect("placeholder pattern is valid");
    static ref REFERENCE: Regex =
        Regex::new(r"\$+(?:\{([A-Za-z_][A-Za-z0-9_]*)(:?-)?|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("reference pattern is valid");
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("variable {name} is not set")]
    Unset { name: String },

    #[error("required variable {name} is missing a value: {message}")]
    Required { name: String, message: String },
}

/// Substitutes every placeholder in `input` from `vars`.
pub fn interpolate(input: &str, vars: &HashMap<String, String>) -> Result<String, InterpolationError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&input[last..whole.start()]);
        last = whole.end();

        if caps.get(1).is_some() {
            out.push('$');
            continue;
        }

        let name = caps
            .get(2)
            .or_else(|| caps.get(5))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let value = vars.get(name);
        let operator = caps.get(3).map(|m| m.as_str());
        let argument = caps.get(4).map(|m| m.as_str()).unwrap_or_default();

        let resolved = match operator {
            None => value
                .cloned()
                .ok_or_else(|| InterpolationError::Unset { name: name.to_string() })?,
            Some(":-") => match value {
                Some(v) if !v.is_empty() => v.clone(),
                _ => argument.to_string(),
            },
            Some("-") => value.cloned().unwrap_or_else(|| argument.to_string()),
            Some(":?") => match value {
                Some(v) if !v.is_empty() => v.clone(),
                _ => {
                    return Err(InterpolationError::Required {
                        name: name.to_string(),
                        message: argument.to_string(),
                    })
                }
            },
            Some(_) => value.cloned().ok_or_else(|| InterpolationError::Required {
                name: name.to_string(),
                message: argument.to_string(),
            })?,
        };
        out.push_str(&resolved);
    }

    out.push_str(&input[last..]);
    Ok(out)
}

/// Names of the variables `input` needs a value for. Escaped (`$$VAR`)
/// references count since the container shell resolves them; references
/// with a default (`${VAR:-x}`, `${VAR-x}`) do not.
pub fn referenced_variables(input: &str) -> BTreeSet<String> {
    REFERENCE
        .captures_iter(input)
        .filter(|caps| caps.get(2).is_none())
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, String> {
        [("POSTGRES_PORT", "5432"), ("EMPTY", "")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn braced_and_bare_forms() {
        assert_eq!(interpolate("${POSTGRES_PORT}:5432", &vars()).unwrap(), "5432:5432");
        assert_eq!(interpolate("port=$POSTGRES_PORT!", &vars()).unwrap(), "port=5432!");
    }

    #[test]
    fn unset_variable_is_an_error() {
        assert_eq!(
            interpolate("${NOPE}", &vars()),
            Err(InterpolationError::Unset { name: "NOPE".to_string() })
        );
    }

    #[test]
    fn defaults() {
        assert_eq!(interpolate("${NOPE:-8000}", &vars()).unwrap(), "8000");
        assert_eq!(interpolate("${EMPTY:-x}", &vars()).unwrap(), "x");
        assert_eq!(interpolate("${EMPTY-x}", &vars()).unwrap(), "");
        assert_eq!(interpolate("${NOPE-x}", &vars()).unwrap(), "x");
    }

    #[test]
    fn required_forms() {
        assert!(matches!(
            interpolate("${EMPTY:?must be set}", &vars()),
            Err(InterpolationError::Required { .. })
        ));
        assert_eq!(interpolate("${EMPTY?must be set}", &vars()).unwrap(), "");
        assert!(interpolate("${NOPE?must be set}", &vars()).is_err());
    }

    #[test]
    fn double_dollar_escapes() {
        assert_eq!(interpolate("echo $$HOME", &vars()).unwrap(), "echo $HOME");
    }

    #[test]
    fn references_include_escaped_ones() {
        let refs = referenced_variables("pg_isready -U ${POSTGRES_USER} -d $$POSTGRES_DB -p $PORT");
        let refs: Vec<_> = refs.into_iter().collect();
        assert_eq!(refs, vec!["PORT", "POSTGRES_DB", "POSTGRES_USER"]);
    }

    #[test]
    fn references_with_defaults_are_not_required() {
        let refs = referenced_variables(
            "pg_isready -U ${POSTGRES_USER:-postgres} -d ${POSTGRES_DB-store} -h $${PGHOST:-db} -p ${PGPORT:?set it}",
        );
        let refs: Vec<_> = refs.into_iter().collect();
        assert_eq!(refs, vec!["PGPORT"]);
    }
}
