//! The load → build → color → export sequence behind one handle.
//!
//! [`SankeyGenerator`] owns the immutable run settings (loader options,
//! palette, exporter) plus the records of the last successful load. Each
//! stage is wrapped in [`timing::timed`] so `--timing` can report where a run
//! spent its time.

use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::color::{ColoredGraph, Palette};
use crate::config::EffectiveConfig;
use crate::diagram::{DiagramConfig, DiagramSpec};
use crate::error::SankeyError;
use crate::export::{Artifact, DiagramExporter};
use crate::graph::{GraphStats, SankeyGraph};
use crate::loader::{FlowRecord, LoaderOptions, TableLoader};
use crate::render::PlotlyRenderer;
use crate::timing;

/// Outcome of [`SankeyGenerator::load_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub records: usize,
    pub dropped: usize,
}

/// Everything a caller may want to report after an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub artifact: Artifact,
    pub stats: GraphStats,
    pub content_hash: String,
}

#[derive(Debug)]
pub struct SankeyGenerator {
    loader: TableLoader,
    palette: Palette,
    exporter: DiagramExporter,
    records: Option<Vec<FlowRecord>>,
}

impl SankeyGenerator {
    #[must_use]
    pub const fn new(loader: TableLoader, palette: Palette, exporter: DiagramExporter) -> Self {
        Self {
            loader,
            palette,
            exporter,
            records: None,
        }
    }

    /// A generator using the Plotly renderer configured by `config`.
    #[must_use]
    pub fn from_config(config: &EffectiveConfig, options: LoaderOptions) -> Self {
        let renderer = PlotlyRenderer::new(&config.render);
        Self::new(
            TableLoader::new(options),
            config.palette.clone(),
            DiagramExporter::new(Box::new(renderer), config.layout.clone()),
        )
    }

    /// Load a table, replacing previously loaded records on success.
    ///
    /// # Errors
    ///
    /// Propagates [`SankeyError::Load`] and [`SankeyError::Schema`]; the
    /// previously loaded records are kept in that case.
    pub fn load_csv(&mut self, path: &Path) -> Result<LoadStats, SankeyError> {
        let report = timing::timed("load", || self.loader.load_with_report(path))?;
        let stats = LoadStats {
            records: report.records.len(),
            dropped: report.dropped,
        };
        self.records = Some(report.records);
        Ok(stats)
    }

    /// Install records directly (tests, other front ends).
    pub fn set_records(&mut self, records: Vec<FlowRecord>) {
        self.records = Some(records);
    }

    #[must_use]
    pub fn records(&self) -> Option<&[FlowRecord]> {
        self.records.as_deref()
    }

    /// Build the graph from the loaded records.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::NotLoaded`] before any successful load and
    /// [`SankeyError::EmptyData`] if the load produced no records.
    pub fn prepare(&self) -> Result<SankeyGraph, SankeyError> {
        let records = self.records.as_deref().ok_or(SankeyError::NotLoaded)?;
        timing::timed("build", || SankeyGraph::build(records))
    }

    /// Build and color the graph.
    ///
    /// # Errors
    ///
    /// Same as [`SankeyGenerator::prepare`].
    pub fn colorize(&self) -> Result<ColoredGraph, SankeyError> {
        let graph = self.prepare()?;
        Ok(timing::timed("color", || {
            ColoredGraph::new(graph, &self.palette)
        }))
    }

    /// Produce the renderer-agnostic description for `config`.
    ///
    /// # Errors
    ///
    /// Same as [`SankeyGenerator::prepare`], plus [`SankeyError::Config`] for
    /// invalid dimensions or layout.
    pub fn create_diagram(&self, config: &DiagramConfig) -> Result<DiagramSpec, SankeyError> {
        let colored = self.colorize()?;
        self.exporter.describe(&colored, config)
    }

    /// Run the whole pipeline and write the artifact.
    ///
    /// # Errors
    ///
    /// Any pipeline error; nothing is written unless rendering succeeded.
    #[instrument(skip_all, fields(format = %config.format))]
    pub fn export(&self, config: &DiagramConfig) -> Result<RunSummary, SankeyError> {
        let colored = self.colorize()?;
        let stats = GraphStats::from_graph(&colored.graph);
        info!(
            nodes = stats.node_count,
            links = stats.edge_count,
            "creating {} diagram",
            config.format
        );

        let artifact = timing::timed("export", || self.exporter.export(&colored, config))?;
        Ok(RunSummary {
            artifact,
            stats,
            content_hash: colored.graph.content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{LayoutOptions, OutputFormat};
    use crate::render::HtmlRenderer;

    fn generator() -> SankeyGenerator {
        SankeyGenerator::new(
            TableLoader::default(),
            Palette::default(),
            DiagramExporter::new(
                Box::new(PlotlyRenderer::with_parts(HtmlRenderer::default(), None)),
                LayoutOptions::default(),
            ),
        )
    }

    #[test]
    fn prepare_before_load_is_not_loaded() {
        assert!(matches!(generator().prepare(), Err(SankeyError::NotLoaded)));
        assert!(generator().records().is_none());
    }

    #[test]
    fn header_only_load_then_prepare_is_empty_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let csv = dir.path().join("empty.csv");
        std::fs::write(&csv, "source,target,value\n").expect("write");

        let mut generator = generator();
        let stats = generator.load_csv(&csv).expect("load");
        assert_eq!(stats, LoadStats { records: 0, dropped: 0 });
        assert!(matches!(generator.prepare(), Err(SankeyError::EmptyData)));
    }

    #[test]
    fn failed_load_keeps_previous_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.csv");
        std::fs::write(&good, "source,target,value\nA,B,1\n").expect("write");
        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "source,value\nA,1\n").expect("write");

        let mut generator = generator();
        generator.load_csv(&good).expect("load");
        assert!(matches!(
            generator.load_csv(&bad),
            Err(SankeyError::Schema { .. })
        ));
        assert_eq!(generator.records().map(<[FlowRecord]>::len), Some(1));
    }

    #[test]
    fn create_diagram_describes_loaded_records() {
        let mut generator = generator();
        generator.set_records(vec![
            FlowRecord::new("A", "B", 10.0),
            FlowRecord::new("B", "C", 5.0),
        ]);

        let spec = generator
            .create_diagram(&DiagramConfig::default())
            .expect("diagram");
        assert_eq!(spec.nodes.len(), 3);
        assert_eq!(spec.links.len(), 2);
    }

    #[test]
    fn export_reports_artifact_and_stats() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut generator = generator();
        generator.set_records(vec![
            FlowRecord::new("A", "B", 10.0),
            FlowRecord::new("B", "C", 5.0),
        ]);

        let config = DiagramConfig {
            output_path: dir.path().join("out.html"),
            ..DiagramConfig::default()
        };
        let summary = generator.export(&config).expect("export");

        assert_eq!(summary.artifact.format, OutputFormat::Html);
        assert!(summary.artifact.path.exists());
        assert_eq!(summary.stats.node_count, 3);
        assert_eq!(summary.stats.edge_count, 2);
        assert!(summary.content_hash.starts_with("blake3:"));
    }
}
