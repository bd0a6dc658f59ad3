use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::diagram::OutputFormat;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SchemaMismatch,
    LoadFailed,
    EmptyData,
    NotLoaded,
    InvalidConfig,
    RenderUnavailable,
    OutputWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SchemaMismatch => "E1001",
            Self::LoadFailed => "E1002",
            Self::EmptyData => "E2001",
            Self::NotLoaded => "E2002",
            Self::InvalidConfig => "E3001",
            Self::RenderUnavailable => "E4001",
            Self::OutputWriteFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SchemaMismatch => "Table is missing required columns",
            Self::LoadFailed => "Table could not be read",
            Self::EmptyData => "No usable flow records",
            Self::NotLoaded => "No table loaded",
            Self::InvalidConfig => "Invalid configuration",
            Self::RenderUnavailable => "Renderer cannot produce the requested format",
            Self::OutputWriteFailed => "Output file write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SchemaMismatch => {
                Some("Add a header row with the columns: source,target,value.")
            }
            Self::LoadFailed => Some("Check that the file exists and is valid UTF-8 CSV."),
            Self::EmptyData => {
                Some("Make sure at least one row has a numeric, non-negative value.")
            }
            Self::NotLoaded => Some("Load a CSV table before building the diagram."),
            Self::InvalidConfig => Some("Fix the palette/layout values and retry."),
            Self::RenderUnavailable => {
                Some("Use --format html, or set render.kaleido_path to the kaleido executable.")
            }
            Self::OutputWriteFailed => {
                Some("Check that the output directory exists and is writable.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the load → build → color → export pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SankeyError {
    /// One or more of `source`, `target`, `value` is absent from the header.
    #[error("table is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// The table could not be opened or parsed at all.
    #[error("failed to load {origin}: {source}")]
    Load {
        origin: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Zero usable records remained after filtering.
    #[error("no usable flow records in table")]
    EmptyData,

    /// A graph was requested before any table was loaded.
    #[error("no data loaded; load a table before building the graph")]
    NotLoaded,

    /// Invalid palette, layout, dimensions or config file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The rendering collaborator cannot produce the requested format.
    #[error("cannot render {format}: {message}")]
    Render {
        format: OutputFormat,
        message: String,
        hint: Option<String>,
    },

    /// The output artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SankeyError {
    /// The stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Schema { .. } => ErrorCode::SchemaMismatch,
            Self::Load { .. } => ErrorCode::LoadFailed,
            Self::EmptyData => ErrorCode::EmptyData,
            Self::NotLoaded => ErrorCode::NotLoaded,
            Self::Config(_) => ErrorCode::InvalidConfig,
            Self::Render { .. } => ErrorCode::RenderUnavailable,
            Self::Io { .. } => ErrorCode::OutputWriteFailed,
        }
    }

    /// Remediation hint. Render errors carry their own, more specific hint.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Render {
                hint: Some(hint), ..
            } => Some(hint.as_str()),
            other => other.code().hint(),
        }
    }

    pub(crate) fn load(
        origin: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Load {
            origin: origin.into(),
            source: source.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::SchemaMismatch,
            ErrorCode::LoadFailed,
            ErrorCode::EmptyData,
            ErrorCode::NotLoaded,
            ErrorCode::InvalidConfig,
            ErrorCode::RenderUnavailable,
            ErrorCode::OutputWriteFailed,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::EmptyData.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn schema_error_lists_every_missing_column() {
        let err = SankeyError::Schema {
            missing: vec!["target".to_string(), "value".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "table is missing required columns: target, value"
        );
        assert_eq!(err.code(), ErrorCode::SchemaMismatch);
    }

    #[test]
    fn render_error_prefers_its_own_hint() {
        let err = SankeyError::Render {
            format: OutputFormat::Png,
            message: "no static image exporter".to_string(),
            hint: Some("install kaleido".to_string()),
        };
        assert_eq!(err.hint(), Some("install kaleido"));
        assert_eq!(err.to_string(), "cannot render png: no static image exporter");

        let bare = SankeyError::Render {
            format: OutputFormat::Svg,
            message: "boom".to_string(),
            hint: None,
        };
        assert_eq!(bare.hint(), ErrorCode::RenderUnavailable.hint());
    }
}
