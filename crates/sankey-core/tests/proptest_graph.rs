use std::collections::HashSet;

use proptest::prelude::*;
use sankey_core::color::{Color, LINK_ALPHA, Palette, assign_colors};
use sankey_core::graph::SankeyGraph;
use sankey_core::loader::FlowRecord;

fn arb_label() -> impl Strategy<Value = String> {
    // Small alphabet so labels repeat and produce shared nodes, cycles and
    // parallel edges.
    "[A-F]{1,2}"
}

fn arb_records() -> impl Strategy<Value = Vec<FlowRecord>> {
    prop::collection::vec(
        (arb_label(), arb_label(), 0.0_f64..1_000.0)
            .prop_map(|(source, target, value)| FlowRecord::new(source, target, value)),
        1..40,
    )
}

fn arb_palette() -> impl Strategy<Value = Palette> {
    prop::collection::vec(
        prop_oneof![
            any::<[u8; 3]>().prop_map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}")),
            Just("steelblue".to_string()),
        ],
        1..12,
    )
    .prop_map(|colors| Palette::new(colors).expect("non-empty palette"))
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn node_count_is_distinct_label_count(records in arb_records()) {
        let graph = SankeyGraph::build(&records).expect("build");
        let labels: HashSet<&str> = records
            .iter()
            .flat_map(|r| [r.source.as_str(), r.target.as_str()])
            .collect();
        prop_assert_eq!(graph.node_count(), labels.len());
    }

    #[test]
    fn edges_mirror_records_in_order(records in arb_records()) {
        let graph = SankeyGraph::build(&records).expect("build");
        let edges: Vec<_> = graph.edges().collect();
        prop_assert_eq!(edges.len(), records.len());

        for (edge, record) in edges.iter().zip(&records) {
            prop_assert_eq!(graph.label(edge.source), Some(record.source.as_str()));
            prop_assert_eq!(graph.label(edge.target), Some(record.target.as_str()));
            prop_assert!((edge.value - record.value).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn sources_are_indexed_before_target_only_labels(records in arb_records()) {
        let graph = SankeyGraph::build(&records).expect("build");
        let sources: HashSet<&str> = records.iter().map(|r| r.source.as_str()).collect();
        for node in graph.nodes() {
            let is_source = sources.contains(node.label.as_str());
            prop_assert_eq!(is_source, node.index < sources.len());
        }
    }

    #[test]
    fn node_colors_cycle_through_palette(
        records in arb_records(),
        palette in arb_palette(),
    ) {
        let graph = SankeyGraph::build(&records).expect("build");
        let colors = assign_colors(&graph, &palette);
        prop_assert_eq!(colors.node_colors.len(), graph.node_count());

        for (i, color) in colors.node_colors.iter().enumerate() {
            prop_assert_eq!(color, &colors.node_colors[i % palette.len()]);
            prop_assert_eq!(color, palette.color_for(i));
        }
    }

    #[test]
    fn link_colors_follow_source_node(
        records in arb_records(),
        palette in arb_palette(),
    ) {
        let graph = SankeyGraph::build(&records).expect("build");
        let colors = assign_colors(&graph, &palette);
        prop_assert_eq!(colors.link_colors.len(), graph.edge_count());

        for (edge, link) in graph.edges().zip(&colors.link_colors) {
            let node = &colors.node_colors[edge.source];
            match node {
                Color::Hex { rgb, .. } => {
                    prop_assert_eq!(link.rgb(), Some(*rgb));
                    prop_assert_eq!(link.alpha(), Some(LINK_ALPHA));
                }
                other => prop_assert_eq!(link, other),
            }
        }
    }

    #[test]
    fn content_hash_is_deterministic(records in arb_records()) {
        let a = SankeyGraph::build(&records).expect("build");
        let b = SankeyGraph::build(&records).expect("build");
        prop_assert_eq!(a.content_hash, b.content_hash);
    }
}
