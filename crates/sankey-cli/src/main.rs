#![forbid(unsafe_code)]

mod browser;
mod completions;
mod output;
mod sample;

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use output::{CliError, OutputMode, RunReport};
use sankey_core::config::{EffectiveConfig, resolve_config};
use sankey_core::diagram::OutputFormat;
use sankey_core::loader::LoaderOptions;
use sankey_core::pipeline::SankeyGenerator;
use sankey_core::timing;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate Sankey diagrams from CSV flow tables",
    long_about = "Read a CSV table with source, target and value columns and \
                  write a Sankey diagram as interactive HTML or a static image.",
    after_help = "EXAMPLES:\n    # Try it with the built-in demo table\n    sankey --sample --open\n\n    # Render a table to HTML with a custom title\n    sankey --csv flows.csv --title \"Energy flows\"\n\n    # Static image (needs the kaleido image exporter)\n    sankey --csv flows.csv --format png --output flows.png\n\n    # Emit a machine-readable run summary\n    sankey --csv flows.csv --json"
)]
struct Cli {
    /// Path to the CSV file (columns: source,target,value).
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Output file path [default: sankey_diagram.html].
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Chart title [default: Sankey Diagram].
    #[arg(long)]
    title: Option<String>,

    /// Chart width in pixels [default: 1200].
    #[arg(long)]
    width: Option<u32>,

    /// Chart height in pixels [default: 800].
    #[arg(long)]
    height: Option<u32>,

    /// Output format: html, png, svg or pdf [default: html].
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,

    /// Write the demo table to sample_sankey_data.csv (used when --csv is absent).
    #[arg(long)]
    sample: bool,

    /// Open the HTML diagram in the default browser.
    #[arg(long)]
    open: bool,

    /// Config file to use instead of ./.sankey.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Field delimiter of the CSV file (a single ASCII character, or "tab").
    #[arg(long, value_parser = parse_delimiter, default_value = ",")]
    delimiter: u8,

    /// Emit JSON output instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit a stage timing report to stderr.
    #[arg(long)]
    timing: bool,

    /// Print a shell completion script and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<clap_complete::Shell>,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    /// Apply command-line overrides on top of the file configuration.
    fn apply_overrides(&self, config: &mut EffectiveConfig) {
        let diagram = &mut config.diagram;
        if let Some(title) = &self.title {
            diagram.title.clone_from(title);
        }
        if let Some(width) = self.width {
            diagram.width = width;
        }
        if let Some(height) = self.height {
            diagram.height = height;
        }
        if let Some(format) = self.format {
            diagram.format = format;
        }
        if let Some(output) = &self.output {
            diagram.output_path.clone_from(output);
        }
    }
}

fn parse_format(raw: &str) -> Result<OutputFormat, String> {
    raw.parse::<OutputFormat>().map_err(|_| {
        let names: Vec<&str> = OutputFormat::ALL.iter().map(|f| f.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn parse_delimiter(raw: &str) -> Result<u8, String> {
    if raw.eq_ignore_ascii_case("tab") || raw == "\\t" {
        return Ok(b'\t');
    }
    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(format!(
            "delimiter must be a single ASCII character (got {raw:?})"
        )),
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("SANKEY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "sankey=debug,info"
        } else if quiet {
            "sankey=error,error"
        } else {
            "sankey=info,warn"
        })
    });

    let format = env::var("SANKEY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Generate the diagram described by `cli`.
fn run(cli: &Cli, mode: OutputMode, working_dir: &Path) -> anyhow::Result<()> {
    let mut sample_path = None;
    if cli.sample {
        let path = working_dir.join(sample::SAMPLE_FILE);
        sample::write_sample(&path)?;
        output::status(mode, cli.quiet, &format!("✓ Created {}", sample::SAMPLE_FILE));
        sample_path = Some(path);
    }

    let Some(input) = cli.csv.clone().or_else(|| sample_path.clone()) else {
        output::render_error(
            mode,
            &CliError::with_suggestion(
                "Please provide a CSV file with --csv or use --sample to create sample data",
                "sankey --csv flows.csv",
            ),
        )?;
        if !mode.is_json() {
            Cli::command().print_help()?;
        }
        anyhow::bail!(UsageError);
    };

    if !input.exists() {
        anyhow::bail!("File {} not found", input.display());
    }

    let mut config = resolve_config(working_dir, cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    debug!(?config, "resolved configuration");

    let options = LoaderOptions {
        delimiter: cli.delimiter,
    };
    let mut generator = SankeyGenerator::from_config(&config, options);
    let load = generator
        .load_csv(&input)
        .with_context(|| format!("cannot use {}", input.display()))?;

    let format = config.diagram.format;
    output::status(mode, cli.quiet, &format!("Creating {format} diagram..."));
    let summary = generator.export(&config.diagram)?;

    let mut opened = false;
    if cli.open {
        if format == OutputFormat::Html {
            match browser::open_in_browser(&summary.artifact.path) {
                Ok(()) => opened = true,
                Err(err) => warn!("could not open browser: {err:#}"),
            }
        } else {
            warn!("--open only applies to html output; skipping");
        }
    }

    let report = RunReport {
        input,
        sample: sample_path,
        load,
        summary,
        opened,
    };
    if !cli.quiet || mode.is_json() {
        output::render_report(mode, &report)?;
    }
    output::status(mode, cli.quiet, "✓ Done!");
    Ok(())
}

/// Marker for errors already reported to the user.
#[derive(Debug)]
struct UsageError;

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("no input table")
    }
}

impl std::error::Error for UsageError {}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        return match completions::run_completions(shell, &mut command) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let mode = cli.output_mode();
    let result = env::current_dir()
        .context("cannot determine the working directory")
        .and_then(|dir| run(&cli, mode, &dir));

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            match serde_json::to_string_pretty(&report.to_json()) {
                Ok(json) => eprintln!("{json}"),
                Err(err) => eprintln!("error: {err}"),
            }
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<UsageError>() => ExitCode::FAILURE,
        Err(err) => {
            if output::render_error(mode, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
