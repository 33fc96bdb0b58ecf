// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log level names and per-tool log handles.
//!
//! Module loggers are plain `tracing` targets. Tools get a [`ToolLog`] that
//! emits every event inside a `tool` span carrying the tool and instance name.

use tracing::level_filters::LevelFilter;
use tracing::Span;

use crate::error::MrTooleyError;

/// Maps a level name to a filter.
///
/// Accepts the classic names (`NOTSET`, `DEBUG`, `INFO`, `WARNING`, `WARN`,
/// `ERROR`, `CRITICAL`, `FATAL`) plus `TRACE` and `OFF`, in any case.
pub fn parse_log_level(name: &str) -> Result<LevelFilter, MrTooleyError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "NOTSET" | "TRACE" => Ok(LevelFilter::TRACE),
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARNING" | "WARN" => Ok(LevelFilter::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Ok(LevelFilter::ERROR),
        "OFF" => Ok(LevelFilter::OFF),
        other => Err(MrTooleyError::Config(format!("unknown log level `{other}`"))),
    }
}

/// Log handle bound to one tool instance.
#[derive(Debug, Clone)]
pub struct ToolLog {
    span: Span,
}

impl ToolLog {
    pub fn new(tool: &str, instance: Option<&str>) -> Self {
        let span = match instance {
            Some(instance) => tracing::info_span!("tool", tool = %tool, instance = %instance),
            None => tracing::info_span!("tool", tool = %tool),
        };
        Self { span }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn info(&self, text: &str) {
        self.span.in_scope(|| tracing::info!("{text}"));
    }

    pub fn warn(&self, text: &str) {
        self.span.in_scope(|| tracing::warn!("{text}"));
    }

    pub fn err(&self, text: &str) {
        self.span.in_scope(|| tracing::error!("{text}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn classic_names_map_to_filters() {
        assert_eq!(parse_log_level("WARNING").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_log_level("warn").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_log_level("CRITICAL").unwrap(), LevelFilter::ERROR);
        assert_eq!(parse_log_level("Fatal").unwrap(), LevelFilter::ERROR);
        assert_eq!(parse_log_level("NOTSET").unwrap(), LevelFilter::TRACE);
        assert_eq!(parse_log_level(" debug ").unwrap(), LevelFilter::DEBUG);
    }

    #[test]
    fn unknown_level_is_config_error() {
        let err = parse_log_level("loud").unwrap_err();
        assert!(matches!(err, MrTooleyError::Config(_)));
    }

    #[traced_test]
    #[test]
    fn tool_log_emits_inside_span() {
        let log = ToolLog::new("nmap", Some("lab"));
        log.err("nmap exit code: 1");
        assert!(logs_contain("nmap exit code: 1"));
        assert!(logs_contain("instance=lab"));
    }
}
