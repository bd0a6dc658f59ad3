//! TOML configuration.
//!
//! Two optional files are merged, the project file winning field by field:
//!
//! 1. user: `<config_dir>/sankey/config.toml`
//! 2. project: `./.sankey.toml` (or an explicit `--config` path)
//!
//! Command-line flags are applied on top by the caller.
//!
//! ```toml
//! palette = ["#4c78a8", "#f58518", "#54a24b"]
//!
//! [defaults]
//! title = "Energy flows"
//! width = 1600
//! format = "html"
//!
//! [layout]
//! pad = 20
//! background = "#fafafa"
//!
//! [render]
//! plotly_js = "vendor/plotly.min.js"   # or "cdn"
//! kaleido_path = "/opt/kaleido/kaleido"
//! scale = 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::Palette;
use crate::diagram::{DiagramConfig, LayoutOptions, OutputFormat};
use crate::error::SankeyError;
use crate::render::{PlotlyJs, RenderSettings};

/// File name of the per-directory project config.
pub const PROJECT_CONFIG_FILE: &str = ".sankey.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SankeyConfig {
    #[serde(default)]
    pub palette: Option<Vec<String>>,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    pub pad: Option<f64>,
    pub thickness: Option<f64>,
    pub line_color: Option<String>,
    pub line_width: Option<f64>,
    pub font_size: Option<f64>,
    pub background: Option<String>,
    pub title_x: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// `"cdn"` or a path to a local plotly.js bundle.
    pub plotly_js: Option<String>,
    pub kaleido_path: Option<PathBuf>,
    pub scale: Option<f64>,
}

impl SankeyConfig {
    /// Merge two configs; every field set in `higher` wins.
    #[must_use]
    pub fn overlay(self, higher: Self) -> Self {
        Self {
            palette: higher.palette.or(self.palette),
            defaults: DefaultsConfig {
                title: higher.defaults.title.or(self.defaults.title),
                width: higher.defaults.width.or(self.defaults.width),
                height: higher.defaults.height.or(self.defaults.height),
                format: higher.defaults.format.or(self.defaults.format),
                output: higher.defaults.output.or(self.defaults.output),
            },
            layout: LayoutConfig {
                pad: higher.layout.pad.or(self.layout.pad),
                thickness: higher.layout.thickness.or(self.layout.thickness),
                line_color: higher.layout.line_color.or(self.layout.line_color),
                line_width: higher.layout.line_width.or(self.layout.line_width),
                font_size: higher.layout.font_size.or(self.layout.font_size),
                background: higher.layout.background.or(self.layout.background),
                title_x: higher.layout.title_x.or(self.layout.title_x),
            },
            render: RenderConfig {
                plotly_js: higher.render.plotly_js.or(self.render.plotly_js),
                kaleido_path: higher.render.kaleido_path.or(self.render.kaleido_path),
                scale: higher.render.scale.or(self.render.scale),
            },
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub palette: Palette,
    pub diagram: DiagramConfig,
    pub layout: LayoutOptions,
    pub render: RenderSettings,
}

impl EffectiveConfig {
    /// Turn a merged [`SankeyConfig`] into validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] for an empty palette, invalid layout
    /// values, zero dimensions or a non-positive image scale.
    pub fn from_config(config: SankeyConfig) -> Result<Self, SankeyError> {
        let palette = match config.palette {
            Some(colors) => Palette::new(colors)?,
            None => Palette::default(),
        };

        let base = DiagramConfig::default();
        let diagram = DiagramConfig {
            title: config.defaults.title.unwrap_or(base.title),
            width: config.defaults.width.unwrap_or(base.width),
            height: config.defaults.height.unwrap_or(base.height),
            format: config.defaults.format.unwrap_or(base.format),
            output_path: config.defaults.output.unwrap_or(base.output_path),
        };
        diagram.validate()?;

        let base = LayoutOptions::default();
        let layout = LayoutOptions {
            pad: config.layout.pad.unwrap_or(base.pad),
            thickness: config.layout.thickness.unwrap_or(base.thickness),
            line_color: config.layout.line_color.unwrap_or(base.line_color),
            line_width: config.layout.line_width.unwrap_or(base.line_width),
            font_size: config.layout.font_size.unwrap_or(base.font_size),
            background: config.layout.background.unwrap_or(base.background),
            title_x: config.layout.title_x.unwrap_or(base.title_x),
        };
        layout.validate()?;

        let base = RenderSettings::default();
        let scale = config.render.scale.unwrap_or(base.scale);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(SankeyError::config(format!(
                "render.scale must be a positive number (got {scale})"
            )));
        }
        let plotly_js = match config.render.plotly_js.as_deref().map(str::trim) {
            None => PlotlyJs::Cdn,
            Some(raw) if raw.eq_ignore_ascii_case("cdn") => PlotlyJs::Cdn,
            Some("") => {
                return Err(SankeyError::config(
                    "render.plotly_js must be \"cdn\" or a path to plotly.js",
                ));
            }
            Some(path) => PlotlyJs::Inline(PathBuf::from(path)),
        };
        let render = RenderSettings {
            plotly_js,
            kaleido_path: config.render.kaleido_path,
            scale,
        };

        Ok(Self {
            palette,
            diagram,
            layout,
            render,
        })
    }
}

/// Read one config file. A missing file yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`SankeyError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load_config_file(path: &Path) -> Result<Option<SankeyConfig>, SankeyError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        SankeyError::config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = toml::from_str::<SankeyConfig>(&content).map_err(|e| {
        SankeyError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), "loaded config file");
    Ok(Some(config))
}

/// Load `./.sankey.toml` from `project_dir`, or defaults if absent.
///
/// # Errors
///
/// Same as [`load_config_file`].
pub fn load_project_config(project_dir: &Path) -> Result<SankeyConfig, SankeyError> {
    Ok(load_config_file(&project_dir.join(PROJECT_CONFIG_FILE))?.unwrap_or_default())
}

/// Path of the user config file, if the platform has a config directory.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sankey/config.toml"))
}

/// Load the user config, or defaults if absent.
///
/// # Errors
///
/// Same as [`load_config_file`].
pub fn load_user_config() -> Result<SankeyConfig, SankeyError> {
    let Some(path) = user_config_path() else {
        return Ok(SankeyConfig::default());
    };
    Ok(load_config_file(&path)?.unwrap_or_default())
}

/// Load, merge and validate configuration for a run.
///
/// `explicit` replaces the project file and must exist.
///
/// # Errors
///
/// Returns [`SankeyError::Config`] if any file is unreadable or invalid, or
/// if `explicit` does not exist.
pub fn resolve_config(
    project_dir: &Path,
    explicit: Option<&Path>,
) -> Result<EffectiveConfig, SankeyError> {
    let user = load_user_config()?;
    let project = match explicit {
        Some(path) => load_config_file(path)?.ok_or_else(|| {
            SankeyError::config(format!("config file {} not found", path.display()))
        })?,
        None => load_project_config(project_dir)?,
    };
    EffectiveConfig::from_config(user.overlay(project))
}
