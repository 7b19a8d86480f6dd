//! Builder for the plasma property graph.

use crate::atomic::AtomicData;
use crate::errors::{RadTransError, RadTransResult};
use petgraph::graph::NodeIndex;
use petgraph::visit::{IntoNeighbors, IntoNodeIdentifiers, Visitable};
use petgraph::Graph;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::property::{PlasmaProperty, PlasmaValue};
use super::runtime::BasePlasma;

/// Shared handle to a plasma property
pub type P = Arc<dyn PlasmaProperty>;

/// A node of the plasma graph: either an externally supplied input or a property.
#[derive(Debug, Clone)]
pub enum PlasmaNode {
    Input(String),
    Property(P),
}

impl fmt::Display for PlasmaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlasmaNode::Input(name) => write!(f, "{name}"),
            PlasmaNode::Property(property) => write!(f, "{}", property.name()),
        }
    }
}

/// Graph of plasma nodes, edges carry the name of the value passed along them
pub type PGraph = Graph<PlasmaNode, String>;

/// Build a plasma from a set of inputs and properties.
///
/// Every property input must be either a registered input or the output of
/// exactly one other property. The resulting dependency graph must be acyclic.
pub struct PlasmaBuilder {
    atomic_data: Arc<AtomicData>,
    inputs: Vec<(String, PlasmaValue)>,
    properties: Vec<P>,
}

impl PlasmaBuilder {
    pub fn new(atomic_data: Arc<AtomicData>) -> Self {
        Self {
            atomic_data,
            inputs: vec![],
            properties: vec![],
        }
    }

    /// Register an input value that is supplied from outside of the plasma.
    pub fn with_input(&mut self, name: &str, value: PlasmaValue) -> &mut Self {
        self.inputs.push((name.to_string(), value));
        self
    }

    /// Register a property with the builder.
    pub fn with_property(&mut self, property: P) -> &mut Self {
        self.properties.push(property);
        self
    }

    /// Builds the dependency graph and computes every property once.
    ///
    /// Returns an error if an input is missing, an output is produced twice
    /// or the properties depend on each other in a cycle.
    pub fn build(&self) -> RadTransResult<BasePlasma> {
        let mut graph: PGraph = Graph::new();
        let mut producers: HashMap<String, NodeIndex> = HashMap::new();

        for (name, _) in &self.inputs {
            if let Some(existing) = producers.get(name) {
                return Err(RadTransError::PlasmaDuplicateOutput {
                    output: name.clone(),
                    first: graph[*existing].to_string(),
                    second: "input".to_string(),
                });
            }
            let node = graph.add_node(PlasmaNode::Input(name.clone()));
            producers.insert(name.clone(), node);
        }

        // Register all outputs before linking so that declaration order does not matter
        let mut property_nodes = Vec::with_capacity(self.properties.len());
        for property in &self.properties {
            let node = graph.add_node(PlasmaNode::Property(property.clone()));
            for output in property.outputs() {
                if let Some(existing) = producers.get(&output) {
                    return Err(RadTransError::PlasmaDuplicateOutput {
                        output,
                        first: graph[*existing].to_string(),
                        second: property.name(),
                    });
                }
                producers.insert(output, node);
            }
            property_nodes.push((node, property));
        }

        for (node, property) in property_nodes {
            for input in property.inputs() {
                match producers.get(&input) {
                    Some(producer) => {
                        graph.add_edge(*producer, node, input);
                    }
                    None => {
                        return Err(RadTransError::PlasmaMissingModule {
                            property: property.name(),
                            input,
                        })
                    }
                }
            }
        }

        if let Some(node) = find_cycle(&graph) {
            return Err(RadTransError::PlasmaCycle(graph[node].to_string()));
        }

        BasePlasma::new(
            graph,
            producers,
            self.inputs.iter().cloned().collect(),
            Arc::clone(&self.atomic_data),
        )
    }
}

/// Returns a node on a cycle of the graph, if there is one.
pub(crate) fn find_cycle<G>(g: G) -> Option<G::NodeId>
where
    G: IntoNodeIdentifiers + IntoNeighbors + Visitable,
{
    use petgraph::visit::{depth_first_search, DfsEvent};

    depth_first_search(g, g.node_identifiers(), |event| match event {
        DfsEvent::BackEdge(_, b) => Err(b),
        _ => Ok(()),
    })
    .err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plasma::property::{PlasmaOutputs, PlasmaState};
    use crate::testing::small_atomic_data;
    use ndarray::array;

    #[derive(Debug)]
    struct Link {
        from: &'static str,
        to: &'static str,
    }

    impl PlasmaProperty for Link {
        fn inputs(&self) -> Vec<String> {
            vec![self.from.to_string()]
        }

        fn outputs(&self) -> Vec<String> {
            vec![self.to.to_string()]
        }

        fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
            let value = state.get(self.from)?.clone();
            Ok(HashMap::from([(self.to.to_string(), value)]))
        }
    }

    fn builder() -> PlasmaBuilder {
        PlasmaBuilder::new(Arc::new(small_atomic_data().unwrap()))
    }

    #[test]
    fn test_build_in_any_order() {
        let plasma = builder()
            .with_property(Arc::new(Link { from: "b", to: "c" }))
            .with_property(Arc::new(Link { from: "a", to: "b" }))
            .with_input("a", array![1.0, 2.0].into())
            .build()
            .unwrap();
        assert_eq!(plasma.get_shells("c").unwrap(), &array![1.0, 2.0]);
    }

    #[test]
    fn test_missing_module() {
        let err = builder()
            .with_property(Arc::new(Link { from: "a", to: "b" }))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RadTransError::PlasmaMissingModule { ref input, .. } if input == "a"
        ));
    }

    #[test]
    fn test_duplicate_output() {
        let err = builder()
            .with_input("a", 1.0.into())
            .with_property(Arc::new(Link { from: "a", to: "b" }))
            .with_property(Arc::new(Link { from: "a", to: "b" }))
            .build()
            .unwrap_err();
        assert!(matches!(err, RadTransError::PlasmaDuplicateOutput { .. }));

        let err = builder()
            .with_input("a", 1.0.into())
            .with_property(Arc::new(Link { from: "a", to: "a" }))
            .build()
            .unwrap_err();
        assert!(matches!(err, RadTransError::PlasmaDuplicateOutput { .. }));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = builder()
            .with_property(Arc::new(Link { from: "x", to: "y" }))
            .with_property(Arc::new(Link { from: "y", to: "x" }))
            .build()
            .unwrap_err();
        assert!(matches!(err, RadTransError::PlasmaCycle(_)));
    }
}
