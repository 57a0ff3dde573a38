//! Miette diagnostics for configuration files.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::error::{ConfigError, Error};

/// Configuration error pointing into the file that caused it.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(sensexbot::config))]
pub struct ConfigDiagnostic {
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub help: Option<String>,
}

impl ConfigDiagnostic {
    /// Build a diagnostic for `error` raised while loading `content`.
    ///
    /// TOML syntax errors carry a span. Validation errors are located by
    /// searching for the offending key.
    #[must_use]
    pub fn from_error(name: &str, content: &str, error: &Error) -> Self {
        let (span, help) = match error {
            Error::Config(ConfigError::Parse(e)) => (
                e.span().map(|r| SourceSpan::from((r.start, r.end.saturating_sub(r.start)))),
                Some("check the TOML syntax around the marked location".to_string()),
            ),
            Error::Config(ConfigError::InvalidValue { field, .. } | ConfigError::MissingField { field }) => (
                locate_key(content, field),
                Some(format!("fix `{field}` in the file or its environment override")),
            ),
            _ => (None, None),
        };
        Self {
            message: error.to_string(),
            src: NamedSource::new(name, content.to_string()),
            span,
            help,
        }
    }
}

/// Span of the last dotted segment of `field` used as a key in `content`.
fn locate_key(content: &str, field: &str) -> Option<SourceSpan> {
    let key = field.rsplit('.').next()?;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(key) {
            if rest.trim_start().starts_with('=') {
                let start = offset + (line.len() - trimmed.len());
                return Some(SourceSpan::from((start, key.len())));
            }
        }
        offset += line.len();
    }
    None
}
