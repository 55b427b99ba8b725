use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load `--input <file.json>` into loan terms or payment inputs.
///
/// Errors are prefixed with `--input <path>`.
pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let file = Path::new(path);
    if !file.is_file() {
        return Err(format!("--input {path}: no such JSON file").into());
    }

    let contents =
        fs::read_to_string(file).map_err(|e| format!("--input {path}: {e}"))?;
    parse_input(&contents).map_err(|e| format!("--input {path}: {e}").into())
}

/// Parse loan or payment inputs from JSON text.
pub fn parse_input<T: DeserializeOwned>(contents: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(contents)
}
