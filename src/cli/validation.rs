//! Value parsers for CLI arguments
//!
//! These run inside clap so bad values are reported with the usual usage
//! message before any configuration is loaded.

use std::fs;
use std::path::PathBuf;

/// Validate that a configuration file exists and is readable
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate a project tag: non-empty, no `:` separator, no glob characters
pub fn validate_project(project: &str) -> Result<String, String> {
    let trimmed = project.trim();
    if trimmed.is_empty() {
        return Err("Project tag cannot be empty".to_string());
    }

    if trimmed
        .chars()
        .any(|c| matches!(c, ':' | '*' | '?' | '[' | ']') || c.is_whitespace())
    {
        return Err(format!(
            "Project tag '{}' may not contain ':', glob characters or whitespace",
            trimmed
        ));
    }

    Ok(trimmed.to_string())
}

/// Validate an instance id: non-empty, no `:` separator, no whitespace
pub fn validate_instance_id(id: &str) -> Result<String, String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err("Instance id cannot be empty".to_string());
    }

    if trimmed.contains(':') || trimmed.chars().any(char::is_whitespace) {
        return Err(format!(
            "Instance id '{}' may not contain ':' or whitespace",
            trimmed
        ));
    }

    Ok(trimmed.to_string())
}
