use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Loan or payment inputs piped on stdin, e.g. `cat loan.json | mcalc quote`.
///
/// Returns `None` when stdin is a terminal or the pipe is empty, leaving the
/// caller to report which flags are missing.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().lock().read_to_string(&mut buffer)?;

    match buffer.trim() {
        "" => Ok(None),
        piped => serde_json::from_str(piped)
            .map(Some)
            .map_err(|e| format!("stdin: {e}").into()),
    }
}
