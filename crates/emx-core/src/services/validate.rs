//! Checks run against a functions source directory before it is served.

use std::path::{Path, MAIN_SEPARATOR};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{EmulatorError, Result};

static FUNCTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-zA-Z0-9_-]{1,62}$").unwrap());

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    main: Option<String>,
}

/// Fail unless `source_dir_name` exists as a directory under `cwd`.
pub fn functions_directory_exists(cwd: &Path, source_dir_name: &str) -> Result<()> {
    if !cwd.join(source_dir_name).is_dir() {
        return Err(EmulatorError::Validation(format!(
            "could not load functions because the \"{source_dir_name}\" directory was not found. \
             Please create it or specify a different source directory in emulators.yaml"
        )));
    }
    Ok(())
}

/// Function names must be usable as a subdomain. Names starting with `.` are skipped.
pub fn function_names_are_valid<S: AsRef<str>>(function_names: &[S]) -> Result<()> {
    let invalid: Vec<&str> = function_names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !name.starts_with('.') && !FUNCTION_NAME_RE.is_match(name))
        .collect();
    if !invalid.is_empty() {
        return Err(EmulatorError::Validation(format!(
            "{} function name(s) must be a valid subdomain (lowercase letters, numbers and dashes)",
            invalid.join(", ")
        )));
    }
    Ok(())
}

/// The source directory must hold a package.json whose entry point exists,
/// or failing that a legacy `function.js`.
pub fn package_json_is_valid(
    source_dir_name: &str,
    source_dir: &Path,
    project_dir: &Path,
) -> Result<()> {
    let package_json_file = source_dir.join("package.json");
    if package_json_file.is_file() {
        let main = read_main(&package_json_file).map_err(|e| {
            EmulatorError::Validation(format!(
                "There was an error reading {source_dir_name}{MAIN_SEPARATOR}package.json:\n\n {e}"
            ))
        })?;
        let index_js_file = source_dir.join(main.as_deref().unwrap_or("index.js"));
        if !index_js_file.is_file() {
            let shown = index_js_file
                .strip_prefix(project_dir)
                .unwrap_or(&index_js_file);
            return Err(EmulatorError::Validation(format!(
                "{} does not exist, can't load functions",
                shown.display()
            )));
        }
    } else if !source_dir.join("function.js").is_file() {
        return Err(EmulatorError::Validation(format!(
            "No npm package found in functions source directory. \
             Please run 'npm init' inside {source_dir_name}"
        )));
    }
    Ok(())
}

fn read_main(package_json_file: &Path) -> Result<Option<String>> {
    let contents = std::fs::read_to_string(package_json_file)?;
    let data: PackageJson = serde_json::from_str(&contents)?;
    tracing::debug!("[functions] package.json main: {:?}", data.main);
    Ok(data.main)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn directory_exists() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("functions")).unwrap();
        functions_directory_exists(dir.path(), "functions").unwrap();
    }

    #[test]
    fn missing_directory_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let err = functions_directory_exists(dir.path(), "backend").unwrap_err();
        assert!(err.to_string().contains("\"backend\" directory was not found"));
    }

    #[test]
    fn valid_function_names() {
        function_names_are_valid(&["helloWorld", "api-v2", "on_write", "AB", ".hidden"]).unwrap();
    }

    #[test]
    fn invalid_function_names_are_reported_together() {
        let err = function_names_are_valid(&["ok-name", "1bad", "x", "has space"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "1bad, x, has space function name(s) must be a valid subdomain \
             (lowercase letters, numbers and dashes)"
        );
    }

    #[test]
    fn name_length_limit() {
        let longest = format!("a{}", "b".repeat(62));
        let too_long = format!("a{}", "b".repeat(63));
        function_names_are_valid(&[longest]).unwrap();
        assert!(function_names_are_valid(&[too_long]).is_err());
    }

    #[test]
    fn package_json_with_default_main() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("functions");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("package.json"), r#"{"name": "fns"}"#).unwrap();
        fs::write(source.join("index.js"), "").unwrap();
        package_json_is_valid("functions", &source, dir.path()).unwrap();
    }

    #[test]
    fn package_json_with_missing_main() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("functions");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("package.json"), r#"{"main": "lib/index.js"}"#).unwrap();
        let err = package_json_is_valid("functions", &source, dir.path()).unwrap_err();
        let expected = Path::new("functions").join("lib").join("index.js");
        assert!(err
            .to_string()
            .starts_with(&format!("{} does not exist", expected.display())));
    }

    #[test]
    fn malformed_package_json() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("functions");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("package.json"), "{ not json").unwrap();
        let err = package_json_is_valid("functions", &source, dir.path()).unwrap_err();
        assert!(err.to_string().contains("There was an error reading functions"));
    }

    #[test]
    fn legacy_function_js() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("functions");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("function.js"), "").unwrap();
        package_json_is_valid("functions", &source, dir.path()).unwrap();
    }

    #[test]
    fn empty_source_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("functions");
        fs::create_dir(&source).unwrap();
        let err = package_json_is_valid("functions", &source, dir.path()).unwrap_err();
        assert!(err.to_string().contains("No npm package found"));
    }
}
