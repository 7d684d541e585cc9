//! Upload and rename filename rules.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{ReaderError, Result};

/// Letters, digits, underscore, hyphen, dot, and space.
pub const FILENAME_PATTERN: &str = r"^[a-zA-Z0-9_\-\. ]+$";

/// Characters rejected with a dedicated message before the pattern check.
pub const FORBIDDEN_CHARS: [char; 10] = [')', '#', '?', '&', '/', '*', '<', '>', '|', '\\'];

fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILENAME_PATTERN).expect("filename pattern is valid"))
}

/// Whether `name` matches the allow-list pattern.
pub fn matches_pattern(name: &str) -> bool {
    filename_regex().is_match(name)
}

/// Check a filename for presence, forbidden characters, and the allow-list pattern.
pub fn validate_filename(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ReaderError::Validation("Filename is required.".to_string()));
    }
    if name.contains(FORBIDDEN_CHARS) {
        return Err(ReaderError::Validation(format!(
            "The filename '{}' must not contain special characters such as ), #, ?, &, /.",
            name
        )));
    }
    if !matches_pattern(name) {
        return Err(ReaderError::Validation(format!(
            "The filename '{}' may only contain letters, digits, underscores, hyphens, dots and spaces.",
            name
        )));
    }
    Ok(())
}

/// Lower-cased text after the last `.`, if any.
pub fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("My Report_v2-final.docx").is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(
            validate_filename("  "),
            Err(ReaderError::Validation(_))
        ));
    }

    #[test]
    fn test_each_forbidden_char_rejected() {
        for c in FORBIDDEN_CHARS {
            let name = format!("bad{}name.pdf", c);
            let err = validate_filename(&name).unwrap_err();
            assert!(
                err.to_string().contains("special characters"),
                "expected forbidden-char message for {:?}",
                c
            );
        }
    }

    #[test]
    fn test_pattern_rejects_other_symbols() {
        let err = validate_filename("ümlaut.pdf").unwrap_err();
        assert!(matches!(err, ReaderError::Validation(_)));
        assert!(validate_filename("semi;colon.pdf").is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension("archive.tar.docx").as_deref(), Some("docx"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("trailing."), None);
    }
}
