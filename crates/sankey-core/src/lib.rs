//! sankey-core library.
//!
//! Reads a flow table (`source`, `target`, `value`), builds a node-indexed
//! multigraph, assigns colors, and exports a Sankey diagram through a
//! [`render::Renderer`].
//!
//! # Conventions
//!
//! - **Errors**: Library operations return `Result<_, SankeyError>`; the CLI
//!   wraps them with `anyhow`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod color;
pub mod config;
pub mod diagram;
pub mod error;
pub mod export;
pub mod graph;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod timing;

pub use color::{Color, ColoredGraph, Palette};
pub use config::EffectiveConfig;
pub use diagram::{DiagramConfig, DiagramSpec, LayoutOptions, OutputFormat};
pub use error::{ErrorCode, SankeyError};
pub use export::{Artifact, DiagramExporter};
pub use graph::{GraphStats, SankeyGraph};
pub use loader::{FlowRecord, LoaderOptions, TableLoader};
pub use pipeline::{LoadStats, RunSummary, SankeyGenerator};
