//! Renderer-agnostic diagram description.
//!
//! A [`DiagramSpec`] is everything a rendering backend needs to draw a Sankey
//! diagram: labeled and colored nodes, colored links with values, and the
//! layout hints from [`DiagramConfig`] and [`LayoutOptions`]. Layout itself
//! (node placement, band routing) is left to the backend.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::{Color, ColoredGraph};
use crate::error::SankeyError;

pub const DEFAULT_TITLE: &str = "Sankey Diagram";
pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 800;
pub const DEFAULT_OUTPUT: &str = "sankey_diagram.html";

/// Artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Png,
    Svg,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [Self; 4] = [Self::Html, Self::Png, Self::Svg, Self::Pdf];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    /// Static formats need an image exporter; HTML does not.
    #[must_use]
    pub const fn is_static(self) -> bool {
        !matches!(self, Self::Html)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = SankeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                SankeyError::config(format!(
                    "unknown output format '{s}' (expected html, png, svg or pdf)"
                ))
            })
    }
}

/// Per-run output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub output_path: PathBuf,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            format: OutputFormat::Html,
            output_path: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl DiagramConfig {
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] if either dimension is zero.
    pub fn validate(&self) -> Result<(), SankeyError> {
        if self.width == 0 || self.height == 0 {
            return Err(SankeyError::config(format!(
                "diagram dimensions must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Styling hints forwarded to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutOptions {
    /// Vertical gap between nodes, in pixels.
    pub pad: f64,
    /// Node bar thickness, in pixels.
    pub thickness: f64,
    pub line_color: String,
    pub line_width: f64,
    pub font_size: f64,
    pub background: String,
    /// Horizontal title anchor, 0.0 (left) to 1.0 (right).
    pub title_x: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            pad: 15.0,
            thickness: 20.0,
            line_color: "black".to_string(),
            line_width: 0.5,
            font_size: 12.0,
            background: "white".to_string(),
            title_x: 0.5,
        }
    }
}

impl LayoutOptions {
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] for negative or non-finite sizes, or a
    /// title anchor outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), SankeyError> {
        let sizes = [
            ("pad", self.pad),
            ("thickness", self.thickness),
            ("line_width", self.line_width),
            ("font_size", self.font_size),
        ];
        for (name, value) in sizes {
            if !value.is_finite() || value < 0.0 {
                return Err(SankeyError::config(format!(
                    "layout.{name} must be a non-negative number (got {value})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.title_x) {
            return Err(SankeyError::config(format!(
                "layout.title_x must be between 0 and 1 (got {})",
                self.title_x
            )));
        }
        Ok(())
    }
}

/// A node as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecNode {
    pub label: String,
    pub color: Color,
}

/// A link as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: Color,
}

/// Title, size and styling of the whole figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecLayout {
    pub title: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub options: LayoutOptions,
}

/// Complete renderer-agnostic description of one diagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramSpec {
    pub nodes: Vec<SpecNode>,
    pub links: Vec<SpecLink>,
    pub layout: SpecLayout,
}

impl DiagramSpec {
    #[must_use]
    pub fn describe(colored: &ColoredGraph, config: &DiagramConfig, layout: &LayoutOptions) -> Self {
        let nodes = colored
            .graph
            .nodes()
            .zip(&colored.node_colors)
            .map(|(node, color)| SpecNode {
                label: node.label,
                color: color.clone(),
            })
            .collect();

        let links = colored
            .graph
            .edges()
            .zip(&colored.link_colors)
            .map(|(edge, color)| SpecLink {
                source: edge.source,
                target: edge.target,
                value: edge.value,
                color: color.clone(),
            })
            .collect();

        Self {
            nodes,
            links,
            layout: SpecLayout {
                title: config.title.clone(),
                width: config.width,
                height: config.height,
                options: layout.clone(),
            },
        }
    }
}
