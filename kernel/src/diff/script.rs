//! JSON-lines diff scripts.
//!
//! A script is a recorded diff-line stream, one JSON object per line. The
//! `vdiff` binary replays scripts; hosts can use the same format to capture
//! generator output for later review.

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use super::DiffLine;

/// Errors raised while reading a diff script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A script line was not a valid diff line.
    #[error("Invalid diff line at script line {line}: {source}")]
    Parse {
        /// 1-based line number in the script.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Parses a JSON-lines script. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`ScriptError::Parse`] for the first malformed line.
pub fn parse_script(source: &str) -> Result<Vec<DiffLine>, ScriptError> {
    source
        .lines()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .map(|(index, raw)| {
            serde_json::from_str(raw).map_err(|source| ScriptError::Parse {
                line: index + 1,
                source,
            })
        })
        .collect()
}

/// Reads and parses a script file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line fails to parse.
pub fn read_script(path: &Path) -> Result<Vec<DiffLine>, ScriptError> {
    let content = fs::read_to_string(path)?;
    parse_script(&content)
}

/// Serializes diff lines back to the script format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_script(lines: &[DiffLine]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for line in lines {
        out.push_str(&serde_json::to_string(line)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let script = "{\"type\":\"same\",\"line\":\"a\"}\n\n{\"type\":\"new\",\"line\":\"x\"}\n";
        let lines = parse_script(script).unwrap();
        assert_eq!(lines, vec![DiffLine::same("a"), DiffLine::added("x")]);
    }

    #[test]
    fn reports_offending_line_number() {
        let script = "{\"type\":\"same\",\"line\":\"a\"}\n{\"type\":\"bogus\",\"line\":\"x\"}\n";
        let err = parse_script(script).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 2, .. }));
    }

    #[test]
    fn reads_script_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("edit.jsonl");
        let lines = vec![DiffLine::same("a"), DiffLine::removed("b")];
        fs::write(&path, to_script(&lines)?)?;

        assert_eq!(read_script(&path)?, lines);
        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_script(Path::new("/nonexistent/vdiff/script.jsonl")).unwrap_err();
        assert!(matches!(err, ScriptError::Io(_)));
    }
}
