//! Node and link coloring.
//!
//! Node `i` gets `palette[i % palette.len()]`. Every link is drawn in a
//! translucent version of its source node's color so flows are visually
//! grouped by origin.

use std::fmt;

use serde::{Serialize, Serializer};
use tracing::instrument;

use crate::error::SankeyError;
use crate::graph::SankeyGraph;

/// Opacity applied to link colors derived from hex node colors.
pub const LINK_ALPHA: f64 = 0.4;

/// Default qualitative palette.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// An 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A renderer color.
///
/// Only `#RRGGBB` strings are understood; anything else (named colors,
/// `rgb()`/`hsl()` notation, ...) is carried verbatim as [`Color::Other`].
/// Hex colors keep the string they were parsed from, so a palette entry is
/// emitted exactly as written.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    Hex { rgb: Rgb, raw: String },
    Rgba(Rgb, f64),
    Other(String),
}

impl Color {
    /// Interpret a color string. Never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        parse_hex(raw).map_or_else(
            || Self::Other(raw.to_string()),
            |rgb| Self::Hex {
                rgb,
                raw: raw.to_string(),
            },
        )
    }

    /// Link color for flows leaving a node of this color.
    ///
    /// Hex colors keep their channels and get alpha [`LINK_ALPHA`]; other
    /// encodings are returned unchanged.
    #[must_use]
    pub fn translucent(&self) -> Self {
        match self {
            Self::Hex { rgb, .. } => Self::Rgba(*rgb, LINK_ALPHA),
            other => other.clone(),
        }
    }

    #[must_use]
    pub const fn rgb(&self) -> Option<Rgb> {
        match self {
            Self::Hex { rgb, .. } | Self::Rgba(rgb, _) => Some(*rgb),
            Self::Other(_) => None,
        }
    }

    #[must_use]
    pub const fn alpha(&self) -> Option<f64> {
        match self {
            Self::Hex { .. } => Some(1.0),
            Self::Rgba(_, alpha) => Some(*alpha),
            Self::Other(_) => None,
        }
    }
}

fn parse_hex(raw: &str) -> Option<Rgb> {
    let digits = raw.strip_prefix('#')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex { raw, .. } | Self::Other(raw) => f.write_str(raw),
            Self::Rgba(Rgb { r, g, b }, alpha) => write!(f, "rgba({r},{g},{b},{alpha})"),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

/// A non-empty, ordered list of node colors used cyclically.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette(Vec<Color>);

impl Palette {
    /// Build a palette from color strings.
    ///
    /// # Errors
    ///
    /// Returns [`SankeyError::Config`] if `colors` is empty or contains a
    /// blank entry.
    pub fn new<I, S>(colors: I) -> Result<Self, SankeyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for (i, raw) in colors.into_iter().enumerate() {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                return Err(SankeyError::config(format!("palette entry {i} is blank")));
            }
            parsed.push(Color::parse(raw));
        }
        if parsed.is_empty() {
            return Err(SankeyError::config(
                "palette must contain at least one color",
            ));
        }
        Ok(Self(parsed))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn colors(&self) -> &[Color] {
        &self.0
    }

    /// Color of the node at `index`, wrapping around the palette.
    #[must_use]
    pub fn color_for(&self, index: usize) -> &Color {
        &self.0[index % self.0.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self(DEFAULT_PALETTE.iter().map(|c| Color::parse(c)).collect())
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Per-node and per-link colors, aligned with node index and edge order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorAssignment {
    pub node_colors: Vec<Color>,
    pub link_colors: Vec<Color>,
}

/// Color every node and link of `graph`.
#[must_use]
#[instrument(skip_all, fields(nodes = graph.node_count(), palette = palette.len()))]
pub fn assign_colors(graph: &SankeyGraph, palette: &Palette) -> ColorAssignment {
    let node_colors: Vec<Color> = (0..graph.node_count())
        .map(|i| palette.color_for(i).clone())
        .collect();
    let link_colors = graph
        .edges()
        .map(|edge| node_colors[edge.source].translucent())
        .collect();

    ColorAssignment {
        node_colors,
        link_colors,
    }
}

/// A graph together with its colors, ready for export.
#[derive(Debug, Clone)]
pub struct ColoredGraph {
    pub graph: SankeyGraph,
    pub node_colors: Vec<Color>,
    pub link_colors: Vec<Color>,
}

impl ColoredGraph {
    #[must_use]
    pub fn new(graph: SankeyGraph, palette: &Palette) -> Self {
        let ColorAssignment {
            node_colors,
            link_colors,
        } = assign_colors(&graph, palette);
        Self {
            graph,
            node_colors,
            link_colors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FlowRecord;

    fn graph(rows: &[(&str, &str, f64)]) -> SankeyGraph {
        let records: Vec<_> = rows
            .iter()
            .map(|(s, t, v)| FlowRecord::new(*s, *t, *v))
            .collect();
        SankeyGraph::build(&records).expect("build")
    }

    #[test]
    fn hex_parses_case_insensitively() {
        assert_eq!(
            Color::parse("#1F77b4").rgb(),
            Some(Rgb {
                r: 31,
                g: 119,
                b: 180
            })
        );
    }

    #[test]
    fn hex_colors_display_as_written() {
        let palette = Palette::new(["#1F77B4", "#aBcDeF"]).expect("palette");
        let g = graph(&[("A", "B", 1.0)]);
        let colors = assign_colors(&g, &palette);

        assert_eq!(colors.node_colors[0].to_string(), "#1F77B4");
        assert_eq!(colors.node_colors[1].to_string(), "#aBcDeF");
        assert_eq!(colors.link_colors[0].to_string(), "rgba(31,119,180,0.4)");
    }

    #[test]
    fn non_hex_colors_are_carried_verbatim() {
        for raw in ["steelblue", "#abc", "rgb(1,2,3)", "#12345g", "#1234567"] {
            let color = Color::parse(raw);
            assert_eq!(color, Color::Other(raw.to_string()));
            assert_eq!(color.translucent().to_string(), raw);
        }
    }

    #[test]
    fn translucent_hex_keeps_rgb_and_sets_alpha() {
        let link = Color::parse("#1f77b4").translucent();
        assert_eq!(link.to_string(), "rgba(31,119,180,0.4)");
        assert_eq!(link.alpha(), Some(LINK_ALPHA));
        assert_eq!(link.rgb(), Color::parse("#1f77b4").rgb());
    }

    #[test]
    fn empty_palette_is_config_error() {
        let empty: [&str; 0] = [];
        assert!(matches!(Palette::new(empty), Err(SankeyError::Config(_))));
        assert!(matches!(
            Palette::new(["#000000", "  "]),
            Err(SankeyError::Config(_))
        ));
    }

    #[test]
    fn default_palette_has_ten_hex_colors() {
        let palette = Palette::default();
        assert_eq!(palette.len(), 10);
        assert!(palette.colors().iter().all(|c| matches!(c, Color::Hex { .. })));
        assert_eq!(palette.color_for(0).to_string(), "#1f77b4");
        assert_eq!(palette.color_for(10).to_string(), "#1f77b4");
        assert_eq!(palette.color_for(13).to_string(), "#d62728");
    }

    #[test]
    fn node_colors_cycle_through_palette() {
        let g = graph(&[("A", "B", 1.0), ("C", "D", 1.0), ("E", "F", 1.0)]);
        let palette = Palette::new(["#ff0000", "#00ff00"]).expect("palette");
        let colors = assign_colors(&g, &palette);

        let rendered: Vec<String> = colors.node_colors.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["#ff0000", "#00ff00", "#ff0000", "#00ff00", "#ff0000", "#00ff00"]
        );
    }

    #[test]
    fn link_colors_follow_source_node() {
        let g = graph(&[("A", "B", 10.0), ("B", "C", 5.0), ("A", "C", 1.0)]);
        let colors = assign_colors(&g, &Palette::default());

        assert_eq!(colors.link_colors.len(), 3);
        assert_eq!(colors.link_colors[0].to_string(), "rgba(31,119,180,0.4)");
        assert_eq!(colors.link_colors[1].to_string(), "rgba(255,127,14,0.4)");
        assert_eq!(colors.link_colors[2], colors.link_colors[0]);
    }

    #[test]
    fn named_palette_colors_pass_through_to_links() {
        let g = graph(&[("A", "B", 1.0)]);
        let palette = Palette::new(["tomato"]).expect("palette");
        let colored = ColoredGraph::new(g, &palette);
        assert_eq!(colored.link_colors, vec![Color::Other("tomato".to_string())]);
    }

    #[test]
    fn colors_serialize_as_strings() {
        let json = serde_json::to_string(&vec![
            Color::parse("#000000"),
            Color::parse("#000000").translucent(),
            Color::parse("red"),
        ])
        .expect("serialize");
        assert_eq!(json, r##"["#000000","rgba(0,0,0,0.4)","red"]"##);
    }
}
