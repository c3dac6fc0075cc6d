use crate::core::capability::{names, slots};
use crate::core::category::Category;
use crate::core::graph::WorkGraph;
use crate::core::work_item::WorkItem;

/// Builds the fixed work graph topology for each category.
///
/// | Category  | Graph                                                   |
/// |-----------|---------------------------------------------------------|
/// | Metadata  | `fetch_metadata`                                        |
/// | Technical | `fetch_technical`                                       |
/// | Both      | `fetch_metadata` + `fetch_technical` -> `summarize`     |
/// | Code      | `fetch_technical` -> `generate_code` (plus the query)   |
///
/// Building is pure: the same inputs always give the same topology, and
/// every call returns a fresh graph with its own items.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder
    }

    pub fn build(&self, category: Category, query: &str) -> WorkGraph {
        match category {
            Category::Metadata => WorkGraph::new()
                .with_item(fetch_metadata(query))
                .with_terminal(names::FETCH_METADATA),

            Category::Technical => WorkGraph::new()
                .with_item(fetch_technical(query))
                .with_terminal(names::FETCH_TECHNICAL),

            Category::Both => WorkGraph::new()
                .with_item(fetch_metadata(query))
                .with_item(fetch_technical(query))
                .with_item(
                    WorkItem::new(names::SUMMARIZE, names::SUMMARIZE)
                        .with_ref(slots::METADATA, names::FETCH_METADATA)
                        .with_ref(slots::TECHNICAL, names::FETCH_TECHNICAL),
                )
                .with_terminal(names::SUMMARIZE),

            Category::Code => WorkGraph::new()
                .with_item(fetch_technical(query))
                .with_item(
                    WorkItem::new(names::GENERATE_CODE, names::GENERATE_CODE)
                        .with_ref(slots::TECHNICAL, names::FETCH_TECHNICAL)
                        .with_literal(slots::QUERY, query),
                )
                .with_terminal(names::GENERATE_CODE),
        }
    }
}

fn fetch_metadata(query: &str) -> WorkItem {
    WorkItem::new(names::FETCH_METADATA, names::FETCH_METADATA).with_literal(slots::QUERY, query)
}

fn fetch_technical(query: &str) -> WorkItem {
    WorkItem::new(names::FETCH_TECHNICAL, names::FETCH_TECHNICAL).with_literal(slots::QUERY, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::work_item::{InputSlot, ItemId};
    use serde_json::json;

    const QUERY: &str = "What is the owner of report X?";

    #[test]
    fn test_metadata_and_technical_are_single_items() {
        let builder = GraphBuilder::new();
        for (category, name) in [
            (Category::Metadata, names::FETCH_METADATA),
            (Category::Technical, names::FETCH_TECHNICAL),
        ] {
            let topology = builder.build(category, QUERY).topology();
            assert_eq!(topology.nodes, vec![(ItemId::from(name), name.to_string())]);
            assert!(topology.edges.is_empty());
            assert_eq!(topology.terminals, vec![ItemId::from(name)]);
        }
    }

    #[test]
    fn test_both_fans_in_to_summarize() {
        let topology = GraphBuilder::new().build(Category::Both, QUERY).topology();
        assert_eq!(topology.nodes.len(), 3);
        assert_eq!(
            topology.edges,
            vec![
                (ItemId::from("fetch_metadata"), ItemId::from("summarize")),
                (ItemId::from("fetch_technical"), ItemId::from("summarize")),
            ]
        );
        assert_eq!(topology.terminals, vec![ItemId::from("summarize")]);
    }

    #[test]
    fn test_code_chains_technical_into_generation_with_query() {
        let graph = GraphBuilder::new().build(Category::Code, QUERY);
        let topology = graph.topology();
        assert_eq!(
            topology.edges,
            vec![(ItemId::from("fetch_technical"), ItemId::from("generate_code"))]
        );
        assert_eq!(topology.terminals, vec![ItemId::from("generate_code")]);

        let generate = graph.item(&ItemId::from("generate_code")).unwrap();
        assert_eq!(
            generate.inputs().get("query"),
            Some(&InputSlot::Literal(json!(QUERY)))
        );
    }

    #[test]
    fn test_build_is_deterministic_and_unshared() {
        let builder = GraphBuilder::new();
        for category in Category::ALL {
            let first = builder.build(category, QUERY);
            let second = builder.build(category, QUERY);
            assert_eq!(first.topology(), second.topology());
            assert_ne!(first.id(), second.id());
            for (a, b) in first.items().iter().zip(second.items()) {
                assert_eq!(a.inputs(), b.inputs());
                assert!(!std::ptr::eq(a, b));
            }
        }
    }
}
