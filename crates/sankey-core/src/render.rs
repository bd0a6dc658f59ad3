//! Rendering backends.
//!
//! The [`Renderer`] trait turns a [`DiagramSpec`] into the bytes of one
//! artifact. [`PlotlyRenderer`] is the stock backend:
//!
//! - **html** — a standalone page built from a minijinja template with the
//!   Plotly figure JSON embedded. plotly.js comes from the CDN by default or
//!   is inlined from a local bundle ([`PlotlyJs::Inline`]) for fully offline
//!   pages.
//! - **png / svg / pdf** — the figure is piped to the `kaleido` image
//!   exporter. When no exporter can be found the render fails with
//!   [`SankeyError::Render`] and a hint; nothing is written.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use minijinja::{Environment, context};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::diagram::{DiagramSpec, OutputFormat};
use crate::error::SankeyError;

/// plotly.js bundle referenced by CDN-mode pages.
pub const PLOTLY_CDN_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Default pixel ratio for static images.
pub const DEFAULT_SCALE: f64 = 2.0;

const KALEIDO_BIN: &str = "kaleido";

const KALEIDO_ARGS: [&str; 7] = [
    "plotly",
    "--disable-gpu",
    "--allow-file-access-from-files",
    "--disable-extensions",
    "--disable-dev-shm-usage",
    "--disable-software-rasterizer",
    "--single-process",
];

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
{% if plotly_inline %}<script type="text/javascript">{{ plotly_inline | safe }}</script>
{% else %}<script src="{{ plotly_src | safe }}" charset="utf-8"></script>
{% endif %}<style>html, body { margin: 0; background: {{ background }}; }</style>
</head>
<body>
<div id="sankey" style="width: {{ width }}px; height: {{ height }}px;"></div>
<script type="text/javascript">
const figure = {{ figure | safe }};
Plotly.newPlot("sankey", figure.data, figure.layout, { responsive: true });
</script>
</body>
</html>
"#;

/// Something that can draw a diagram in one or more formats.
pub trait Renderer {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Render `spec` as `format`, returning the artifact bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Render`] if the backend cannot produce `format`.
    fn render(&self, spec: &DiagramSpec, format: OutputFormat) -> Result<Vec<u8>, SankeyError>;
}

/// Where HTML pages get plotly.js from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlotlyJs {
    /// `<script src>` pointing at [`PLOTLY_CDN_URL`].
    #[default]
    Cdn,
    /// Contents of a local plotly.js bundle, inlined into the page.
    Inline(PathBuf),
}

/// Renderer capabilities resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub plotly_js: PlotlyJs,
    /// Explicit exporter path. When `None`, `kaleido` is looked up on `PATH`.
    pub kaleido_path: Option<PathBuf>,
    pub scale: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            plotly_js: PlotlyJs::Cdn,
            kaleido_path: None,
            scale: DEFAULT_SCALE,
        }
    }
}

/// Build the Plotly figure (`data` + `layout`) for a diagram.
#[must_use]
pub fn plotly_figure(spec: &DiagramSpec) -> Value {
    let layout = &spec.layout;
    let options = &layout.options;

    let labels: Vec<&str> = spec.nodes.iter().map(|n| n.label.as_str()).collect();
    let node_colors: Vec<String> = spec.nodes.iter().map(|n| n.color.to_string()).collect();
    let sources: Vec<usize> = spec.links.iter().map(|l| l.source).collect();
    let targets: Vec<usize> = spec.links.iter().map(|l| l.target).collect();
    let values: Vec<f64> = spec.links.iter().map(|l| l.value).collect();
    let link_colors: Vec<String> = spec.links.iter().map(|l| l.color.to_string()).collect();

    json!({
        "data": [{
            "type": "sankey",
            "node": {
                "pad": options.pad,
                "thickness": options.thickness,
                "line": { "color": options.line_color, "width": options.line_width },
                "label": labels,
                "color": node_colors,
            },
            "link": {
                "source": sources,
                "target": targets,
                "value": values,
                "color": link_colors,
            },
        }],
        "layout": {
            "title": { "text": layout.title, "x": options.title_x },
            "font": { "size": options.font_size },
            "width": layout.width,
            "height": layout.height,
            "paper_bgcolor": options.background,
            "plot_bgcolor": options.background,
        },
    })
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Renders standalone interactive HTML pages.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    plotly_js: PlotlyJs,
}

impl HtmlRenderer {
    #[must_use]
    pub const fn new(plotly_js: PlotlyJs) -> Self {
        Self { plotly_js }
    }

    /// Render the page as a string.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Render`] if the inline plotly.js bundle cannot be
    /// read or the template fails to render.
    pub fn render_page(&self, spec: &DiagramSpec) -> Result<String, SankeyError> {
        let plotly_inline = match &self.plotly_js {
            PlotlyJs::Cdn => None,
            PlotlyJs::Inline(path) => Some(read_bundle(path)?),
        };

        // `</` inside a <script> block would close it early.
        let figure = plotly_figure(spec).to_string().replace("</", "<\\/");

        let mut env = Environment::new();
        env.add_template("sankey.html", PAGE_TEMPLATE)
            .map_err(|e| html_error(&e))?;
        let template = env.get_template("sankey.html").map_err(|e| html_error(&e))?;

        template
            .render(context! {
                title => spec.layout.title,
                width => spec.layout.width,
                height => spec.layout.height,
                background => spec.layout.options.background,
                plotly_src => PLOTLY_CDN_URL,
                plotly_inline => plotly_inline,
                figure => figure,
            })
            .map_err(|e| html_error(&e))
    }
}

fn read_bundle(path: &Path) -> Result<String, SankeyError> {
    std::fs::read_to_string(path).map_err(|e| SankeyError::Render {
        format: OutputFormat::Html,
        message: format!("cannot read plotly.js bundle {}: {e}", path.display()),
        hint: Some(
            "Point render.plotly_js at a readable plotly.min.js, or set it to \"cdn\".".to_string(),
        ),
    })
}

fn html_error(err: &minijinja::Error) -> SankeyError {
    SankeyError::Render {
        format: OutputFormat::Html,
        message: format!("template error: {err}"),
        hint: None,
    }
}

// ---------------------------------------------------------------------------
// Static images
// ---------------------------------------------------------------------------

/// Handle on a `kaleido` executable.
#[derive(Debug, Clone, PartialEq)]
pub struct Kaleido {
    executable: PathBuf,
    scale: f64,
}

impl Kaleido {
    #[must_use]
    pub const fn new(executable: PathBuf, scale: f64) -> Self {
        Self { executable, scale }
    }

    /// Find an exporter: the configured path if it exists, else `kaleido` on
    /// `PATH`.
    #[must_use]
    pub fn locate(configured: Option<&Path>, scale: f64) -> Option<Self> {
        let executable = match configured {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                warn!(path = %path.display(), "configured kaleido path does not exist");
                None
            }
            None => find_on_path(KALEIDO_BIN),
        }?;
        debug!(executable = %executable.display(), "static image exporter available");
        Some(Self::new(executable, scale))
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Export `figure` to a static image.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Render`] if the exporter cannot be started,
    /// reports a failure, or returns undecodable output.
    #[instrument(skip(self, figure), fields(exe = %self.executable.display()))]
    pub fn export(
        &self,
        figure: &Value,
        format: OutputFormat,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, SankeyError> {
        let fail = |message: String| SankeyError::Render {
            format,
            message,
            hint: Some(format!(
                "Check that {} runs (`{} --help`), or use --format html.",
                self.executable.display(),
                self.executable.display()
            )),
        };

        let mut child = Command::new(&self.executable)
            .args(KALEIDO_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("failed to start image exporter: {e}")))?;

        let request = json!({
            "data": figure,
            "format": format.as_str(),
            "width": width,
            "height": height,
            "scale": self.scale,
        });
        // stdin is closed before waiting so the exporter sees EOF.
        let sent = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| writeln!(stdin, "{request}"));
        if let Err(e) = sent {
            reap(&mut child);
            return Err(fail(format!("failed to send figure to image exporter: {e}")));
        }

        let output = child
            .wait_with_output()
            .map_err(|e| fail(format!("image exporter did not finish: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let payload = parse_kaleido_output(&stdout).map_err(|message| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                fail(message)
            } else {
                fail(format!("{message} ({stderr})"))
            }
        })?;

        match format {
            OutputFormat::Svg | OutputFormat::Html => Ok(payload.into_bytes()),
            OutputFormat::Png | OutputFormat::Pdf => STANDARD
                .decode(payload.trim())
                .map_err(|e| fail(format!("image exporter returned invalid base64: {e}"))),
        }
    }
}

/// Kill `child` and wait for it so no exporter process outlives the export.
fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("image exporter already exited: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("failed to reap image exporter: {e}");
    }
}

/// Pull the first `result` payload out of the exporter's JSON-lines output.
fn parse_kaleido_output(stdout: &str) -> Result<String, String> {
    let mut last_message = None;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let Ok(reply) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(result) = reply.get("result").and_then(Value::as_str) {
            return Ok(result.to_string());
        }
        let code = reply.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            last_message = Some(format!("image exporter failed with code {code}: {message}"));
        }
    }
    Err(last_message.unwrap_or_else(|| "image exporter returned no image".to_string()))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    let candidates: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd"]
    } else {
        &[""]
    };
    env::split_paths(&path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|ext| dir.join(format!("{name}{ext}")))
            .find(|candidate| candidate.is_file())
    })
}

// ---------------------------------------------------------------------------
// Plotly backend
// ---------------------------------------------------------------------------

/// HTML through plotly.js, static formats through kaleido when available.
#[derive(Debug, Clone)]
pub struct PlotlyRenderer {
    html: HtmlRenderer,
    kaleido: Option<Kaleido>,
}

impl PlotlyRenderer {
    /// Resolve capabilities from `settings`. Never fails: a missing image
    /// exporter only matters once a static format is requested.
    #[must_use]
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            html: HtmlRenderer::new(settings.plotly_js.clone()),
            kaleido: Kaleido::locate(settings.kaleido_path.as_deref(), settings.scale),
        }
    }

    /// A renderer with an explicit (or no) image exporter.
    #[must_use]
    pub const fn with_parts(html: HtmlRenderer, kaleido: Option<Kaleido>) -> Self {
        Self { html, kaleido }
    }

    #[must_use]
    pub const fn supports_static(&self) -> bool {
        self.kaleido.is_some()
    }
}

impl Renderer for PlotlyRenderer {
    fn name(&self) -> &'static str {
        "plotly"
    }

    fn render(&self, spec: &DiagramSpec, format: OutputFormat) -> Result<Vec<u8>, SankeyError> {
        if !format.is_static() {
            return self.html.render_page(spec).map(String::into_bytes);
        }

        let Some(kaleido) = &self.kaleido else {
            return Err(SankeyError::Render {
                format,
                message: "static image export needs the kaleido image exporter, which was not found"
                    .to_string(),
                hint: Some(
                    "Set render.kaleido_path in the config to the kaleido executable \
                     (pip installs it under site-packages/kaleido/executable/), \
                     put `kaleido` on PATH, or use --format html."
                        .to_string(),
                ),
            });
        };

        kaleido.export(
            &plotly_figure(spec),
            format,
            spec.layout.width,
            spec.layout.height,
        )
    }
}
