//! Character dictionary loading for the recognition model.

use crate::core::OcrError;
use std::fs;
use std::path::Path;

/// Loads a recognition character dictionary, one entry per line.
///
/// Entries come back in file order, blank lines included, because the class
/// index of every entry is its line number. The synthetic trailing-space
/// entry the recognition pipeline relies on is appended by the engine, not
/// here.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be read, or `ConfigError` when
/// it contains no entries.
pub fn read_character_dict(path: impl AsRef<Path>) -> Result<Vec<String>, OcrError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let entries: Vec<String> = contents.lines().map(str::to_string).collect();

    if entries.is_empty() {
        return Err(OcrError::config_error(format!(
            "character dictionary '{}' is empty",
            path.display()
        )));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_entries_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "a\nb\nc\n").expect("write dictionary");

        let dict = read_character_dict(file.path()).expect("load dictionary");
        assert_eq!(dict, vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_blank_lines_as_entries() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(file, "a\n\nc\n").expect("write dictionary");

        let dict = read_character_dict(file.path()).expect("load dictionary");
        assert_eq!(dict, vec!["a", "", "c"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_character_dict("definitely/not/a/dict.txt").is_err());
    }

    #[test]
    fn empty_dictionary_is_rejected() {
        let file = tempfile::NamedTempFile::new().expect("create temp file");
        assert!(read_character_dict(file.path()).is_err());
    }
}
