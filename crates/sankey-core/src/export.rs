//! Diagram export: describe, render, persist.
//!
//! The artifact is rendered completely in memory before anything touches the
//! filesystem, then written to a temporary file next to the destination and
//! renamed over it. A failed export therefore never leaves a partial or
//! truncated file at `output_path`.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument};

use crate::color::ColoredGraph;
use crate::diagram::{DiagramConfig, DiagramSpec, LayoutOptions, OutputFormat};
use crate::error::SankeyError;
use crate::render::Renderer;

/// The file produced by one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub bytes: usize,
}

/// Hands colored graphs to a [`Renderer`] and writes the result.
pub struct DiagramExporter {
    renderer: Box<dyn Renderer>,
    layout: LayoutOptions,
}

impl fmt::Debug for DiagramExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramExporter")
            .field("renderer", &self.renderer.name())
            .field("layout", &self.layout)
            .finish()
    }
}

impl DiagramExporter {
    #[must_use]
    pub fn new(renderer: Box<dyn Renderer>, layout: LayoutOptions) -> Self {
        Self { renderer, layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &LayoutOptions {
        &self.layout
    }

    /// Build the renderer-agnostic description without rendering it.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] if `config` or the layout is invalid.
    pub fn describe(
        &self,
        colored: &ColoredGraph,
        config: &DiagramConfig,
    ) -> Result<DiagramSpec, SankeyError> {
        config.validate()?;
        self.layout.validate()?;
        Ok(DiagramSpec::describe(colored, config, &self.layout))
    }

    /// Render `colored` and write it to `config.output_path`, overwriting any
    /// existing file.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] for invalid settings,
    /// [`SankeyError::Render`] if the renderer cannot produce the format, and
    /// [`SankeyError::Io`] if the file cannot be written.
    #[instrument(skip_all, fields(format = %config.format, path = %config.output_path.display()))]
    pub fn export(
        &self,
        colored: &ColoredGraph,
        config: &DiagramConfig,
    ) -> Result<Artifact, SankeyError> {
        let spec = self.describe(colored, config)?;
        let bytes = self.renderer.render(&spec, config.format)?;
        write_replacing(&config.output_path, &bytes)?;

        info!(
            renderer = self.renderer.name(),
            bytes = bytes.len(),
            "saved {} diagram to {}",
            config.format,
            config.output_path.display()
        );

        Ok(Artifact {
            path: config.output_path.clone(),
            format: config.format,
            bytes: bytes.len(),
        })
    }
}

/// Write `bytes` to `path` via a sibling temporary file and an atomic rename.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), SankeyError> {
    let io_err = |source: io::Error| SankeyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(io_err)?;
    }

    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
