//! A built plasma: the property graph together with its current values.

use crate::atomic::AtomicData;
use crate::errors::{RadTransError, RadTransResult};
use ndarray::{Array1, Array2};
use petgraph::algo::toposort;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::visit::Bfs;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

use super::builder::{PGraph, PlasmaNode, P};
use super::property::{PlasmaState, PlasmaValue};

/// Plasma state kept consistent with its inputs.
///
/// Updating an input recomputes exactly the properties that depend on it,
/// directly or transitively, in dependency order.
#[derive(Debug)]
pub struct BasePlasma {
    graph: PGraph,
    producers: HashMap<String, NodeIndex>,
    /// Position of each node in a topological order of the graph
    order: HashMap<NodeIndex, usize>,
    state: PlasmaState,
}

impl BasePlasma {
    pub(crate) fn new(
        graph: PGraph,
        producers: HashMap<String, NodeIndex>,
        inputs: HashMap<String, PlasmaValue>,
        atomic_data: Arc<AtomicData>,
    ) -> RadTransResult<Self> {
        let sorted = toposort(&graph, None)
            .map_err(|cycle| RadTransError::PlasmaCycle(graph[cycle.node_id()].to_string()))?;
        let order = sorted
            .iter()
            .enumerate()
            .map(|(position, node)| (*node, position))
            .collect();

        let mut state = PlasmaState::new(atomic_data);
        for (name, value) in inputs {
            state.insert(name, value);
        }

        let mut plasma = Self {
            graph,
            producers,
            order,
            state,
        };
        for node in sorted {
            plasma.compute_node(node)?;
        }
        Ok(plasma)
    }

    /// Replaces input values and recomputes every property that depends on them.
    pub fn update(&mut self, changes: Vec<(String, PlasmaValue)>) -> RadTransResult<()> {
        let mut changed = Vec::with_capacity(changes.len());
        for (name, value) in changes {
            let node = self.input_node(&name)?;
            self.state.insert(name, value);
            changed.push(node);
        }

        for node in self.get_plasma_todo(&changed) {
            self.compute_node(node)?;
        }
        Ok(())
    }

    /// Properties downstream of `changed`, sorted so that every property comes
    /// after the properties it depends on.
    pub fn get_plasma_todo(&self, changed: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut todo = HashSet::new();
        for start in changed {
            let mut bfs = Bfs::new(&self.graph, *start);
            while let Some(node) = bfs.next(&self.graph) {
                if matches!(self.graph[node], PlasmaNode::Property(_)) {
                    todo.insert(node);
                }
            }
        }
        let mut todo: Vec<NodeIndex> = todo.into_iter().collect();
        todo.sort_by_key(|node| self.order[node]);
        todo
    }

    fn input_node(&self, name: &str) -> RadTransResult<NodeIndex> {
        match self.producers.get(name) {
            Some(node) if matches!(self.graph[*node], PlasmaNode::Input(_)) => Ok(*node),
            Some(node) => Err(RadTransError::Error(format!(
                "'{name}' is computed by '{}' and cannot be updated directly",
                self.graph[*node]
            ))),
            None => Err(RadTransError::PlasmaValueMissing(name.to_string())),
        }
    }

    fn compute_node(&mut self, node: NodeIndex) -> RadTransResult<()> {
        let property: P = match &self.graph[node] {
            PlasmaNode::Input(_) => return Ok(()),
            PlasmaNode::Property(property) => property.clone(),
        };
        trace!(property = %property.name(), "Computing plasma property");

        let mut outputs = property.calculate(&self.state)?;
        for name in property.outputs() {
            let value = outputs.remove(&name).ok_or_else(|| {
                RadTransError::Error(format!(
                    "'{}' did not compute its output '{name}'",
                    property.name()
                ))
            })?;
            self.state.insert(name, value);
        }
        if !outputs.is_empty() {
            debug!(
                property = %property.name(),
                extra = ?outputs.keys().collect::<Vec<_>>(),
                "Ignoring undeclared plasma outputs"
            );
        }
        Ok(())
    }

    pub fn state(&self) -> &PlasmaState {
        &self.state
    }

    pub fn atomic_data(&self) -> &AtomicData {
        self.state.atomic_data()
    }

    pub fn get(&self, name: &str) -> RadTransResult<&PlasmaValue> {
        self.state.get(name)
    }

    pub fn get_scalar(&self, name: &str) -> RadTransResult<f64> {
        self.state.get_scalar(name)
    }

    pub fn get_shells(&self, name: &str) -> RadTransResult<&Array1<f64>> {
        self.state.get_shells(name)
    }

    pub fn get_table(&self, name: &str) -> RadTransResult<&Array2<f64>> {
        self.state.get_table(name)
    }

    /// Names of the properties in the order they are computed.
    pub fn property_names(&self) -> Vec<String> {
        let mut nodes: Vec<&NodeIndex> = self.order.keys().collect();
        nodes.sort_by_key(|node| self.order[*node]);
        nodes
            .into_iter()
            .filter_map(|node| match &self.graph[*node] {
                PlasmaNode::Property(property) => Some(property.name()),
                PlasmaNode::Input(_) => None,
            })
            .collect()
    }

    /// Create a diagram that represents the property graph in Graphviz format.
    pub fn to_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| format!("label = {:?}", edge.weight()),
            &|_, (_, node)| match node {
                PlasmaNode::Input(name) => format!("label = {:?}, shape = box", name),
                PlasmaNode::Property(property) => format!("label = {:?}", property.name()),
            },
        );
        format!("{:?}", dot)
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::RadTransResult;
    use crate::plasma::builder::PlasmaBuilder;
    use crate::plasma::property::{PlasmaOutputs, PlasmaProperty, PlasmaState};
    use crate::testing::small_atomic_data;
    use ndarray::{array, Array1};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Sums its inputs and counts how often it was computed
    #[derive(Debug)]
    struct Sum {
        inputs: Vec<&'static str>,
        output: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl PlasmaProperty for Sum {
        fn inputs(&self) -> Vec<String> {
            self.inputs.iter().map(|s| s.to_string()).collect()
        }

        fn outputs(&self) -> Vec<String> {
            vec![self.output.to_string()]
        }

        fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut total = Array1::zeros(2);
            for name in &self.inputs {
                total = total + state.get_shells(name)?;
            }
            Ok(HashMap::from([(self.output.to_string(), total.into())]))
        }
    }

    fn sum(inputs: Vec<&'static str>, output: &'static str) -> (Arc<Sum>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::new(Sum {
                inputs,
                output,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn test_update_only_recomputes_descendants() {
        let (ab, ab_calls) = sum(vec!["a", "b"], "ab");
        let (bc, bc_calls) = sum(vec!["c"], "cc");
        let (total, total_calls) = sum(vec!["ab", "cc"], "total");

        let mut plasma = PlasmaBuilder::new(Arc::new(small_atomic_data().unwrap()))
            .with_input("a", array![1.0, 1.0].into())
            .with_input("b", array![2.0, 2.0].into())
            .with_input("c", array![4.0, 4.0].into())
            .with_property(total)
            .with_property(ab)
            .with_property(bc)
            .build()
            .unwrap();

        assert_eq!(plasma.get_shells("total").unwrap(), &array![7.0, 7.0]);
        assert_eq!(ab_calls.load(Ordering::SeqCst), 1);

        plasma
            .update(vec![("a".to_string(), array![10.0, 20.0].into())])
            .unwrap();
        assert_eq!(plasma.get_shells("total").unwrap(), &array![16.0, 26.0]);
        assert_eq!(ab_calls.load(Ordering::SeqCst), 2);
        assert_eq!(bc_calls.load(Ordering::SeqCst), 1);
        assert_eq!(total_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_todo_is_topologically_sorted() {
        let (first, _) = sum(vec!["a"], "x");
        let (second, _) = sum(vec!["x"], "y");
        let (third, _) = sum(vec!["y", "a"], "z");
        let plasma = PlasmaBuilder::new(Arc::new(small_atomic_data().unwrap()))
            .with_property(third)
            .with_property(second)
            .with_property(first)
            .with_input("a", array![1.0, 1.0].into())
            .build()
            .unwrap();

        assert_eq!(plasma.property_names(), vec!["Sum", "Sum", "Sum"]);
        assert_eq!(plasma.get_shells("z").unwrap(), &array![2.0, 2.0]);
    }

    #[test]
    fn test_cannot_update_computed_value() {
        let (first, _) = sum(vec!["a"], "x");
        let mut plasma = PlasmaBuilder::new(Arc::new(small_atomic_data().unwrap()))
            .with_input("a", array![1.0, 1.0].into())
            .with_property(first)
            .build()
            .unwrap();
        assert!(plasma
            .update(vec![("x".to_string(), array![0.0, 0.0].into())])
            .is_err());
        assert!(plasma
            .update(vec![("nope".to_string(), array![0.0, 0.0].into())])
            .is_err());
    }

    #[test]
    fn test_dot_lists_nodes() {
        let (first, _) = sum(vec!["a"], "x");
        let plasma = PlasmaBuilder::new(Arc::new(small_atomic_data().unwrap()))
            .with_input("a", array![1.0, 1.0].into())
            .with_property(first)
            .build()
            .unwrap();
        let dot = plasma.to_dot();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("\"Sum\""));
        assert!(dot.contains("\"a\""));
    }
}
