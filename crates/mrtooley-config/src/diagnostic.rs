// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics.
//!
//! Unknown keys get a "did you mean" hint picked by Jaro-Winkler similarity
//! and, when the offending file is known, a label pointing at the key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(mrtooley::config::unknown_key),
        help("{}", key_hint(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted in the same section.
        valid_keys: String,
        #[label("not a known key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` should be {expected}, found {found}")]
    #[diagnostic(code(mrtooley::config::wrong_type))]
    WrongType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("validation error: {message}")]
    #[diagnostic(code(mrtooley::config::validation))]
    Validation { message: String },

    /// Anything figment reports that has no dedicated variant.
    #[error("cannot load configuration: {0}")]
    #[diagnostic(code(mrtooley::config::load))]
    Load(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    fn from_figment(error: figment::Error, toml_sources: &[(String, String)]) -> Self {
        use figment::error::Kind;

        match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate_key(&error, field, toml_sources).unzip();
                Self::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::InvalidType(found, expected) => Self::WrongType {
                key: error.path.join("."),
                found: found.to_string(),
                expected: expected.clone(),
            },
            _ => Self::Load(error.to_string()),
        }
    }
}

fn key_hint(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error inside a `figment::Error` into a [`ConfigError`].
///
/// `toml_sources` pairs a file path with its content and is used to attach a
/// source span to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| ConfigError::from_figment(error, toml_sources))
        .collect()
}

/// Span of `field` in the file the error came from. Inline sources carry no
/// file metadata, so a lone source is assumed to be the one.
fn locate_key(
    error: &figment::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let file = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => Some(path.display().to_string()),
        _ => None,
    };
    let (path, content) = match file {
        Some(file) => toml_sources.iter().find(|(p, _)| *p == file)?,
        None if toml_sources.len() == 1 => &toml_sources[0],
        None => return None,
    };
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(path, content.clone()),
    ))
}

/// Byte offset of `field` inside the `[section]` named by `path[0]`, or from
/// the start of the document for top-level keys.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Best match among `valid_keys` above the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_keys() {
        let valid = &["backend", "args"];
        assert_eq!(suggest_key("backnd", valid), Some("backend".into()));
        assert_eq!(
            suggest_key("nmap_dri", &["nmap_dir", "nmap_executable", "arp_table"]),
            Some("nmap_dir".into())
        );
    }

    #[test]
    fn no_suggestion_for_noise() {
        assert_eq!(suggest_key("qqqq", &["backend", "args"]), None);
    }

    #[test]
    fn key_offset_is_section_relative() {
        let content = "[general]\nbackend = 1\n[storage]\n  backnd = \"JSON\"\n";
        let offset = find_key_offset(content, &["storage".to_string()], "backnd").unwrap();
        assert_eq!(&content[offset..offset + 6], "backnd");
        assert!(find_key_offset(content, &["network".to_string()], "backnd").is_none());
    }

    #[test]
    fn key_offset_requires_assignment() {
        let content = "[paths]\nuser_dir_old = 1\nuser_dir = \"x\"\n";
        let offset = find_key_offset(content, &["paths".to_string()], "user_dir").unwrap();
        assert_eq!(&content[offset..offset + 10], "user_dir =");
    }
}
