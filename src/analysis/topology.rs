//! topology.rs
//! Evaluation order of state variables and cycle diagnostics.

use crate::error::{ComposeError, Result};
use crate::store::{Category, Field, FieldPool};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How a composed model would be stepped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationPlan {
    /// State variables, each after every state variable it reads.
    pub state_order: Vec<String>,
    /// Differential variables. They only read the previous step, so their order is free.
    pub differentials: Vec<String>,
    /// State variables no computed field reads.
    pub unused_state_variables: Vec<String>,
}

/// The state variables `field` reads, from its classification when present.
fn state_dependencies<'a>(field: &'a Field, pool: &'a FieldPool) -> Vec<&'a String> {
    match (&field.dependencies, field.equation()) {
        (Some(deps), _) => deps.equation_names.iter().collect(),
        (None, Some(eq)) => {
            eq.arguments().iter().filter(|a| pool.category_of(a) == Some(Category::StateVariable)).collect()
        }
        (None, None) => Vec::new(),
    }
}

/// Orders state variables with Kahn's algorithm. Ties are broken by name so
/// the plan is stable.
pub fn evaluation_plan(pool: &FieldPool) -> Result<EvaluationPlan> {
    // 1. Build the graph: edge dependency -> consumer
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    for field in pool.category(Category::StateVariable) {
        nodes.insert(field.name.as_str(), graph.add_node(field.name.as_str()));
    }

    let mut read: BTreeSet<&str> = BTreeSet::new();
    for field in pool.fields().filter(|f| f.category().is_computed()) {
        for dep in state_dependencies(field, pool) {
            read.insert(dep.as_str());
            if let (Some(&from), Some(&to)) = (nodes.get(dep.as_str()), nodes.get(field.name.as_str())) {
                graph.update_edge(from, to, ());
            }
        }
    }

    // 2. Kahn's algorithm
    let mut in_degree: BTreeMap<NodeIndex, usize> = nodes
        .values()
        .map(|&n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();
    let mut ready: BTreeSet<&str> = nodes
        .iter()
        .filter(|(_, n)| in_degree.get(*n) == Some(&0))
        .map(|(name, _)| *name)
        .collect();

    let mut state_order = Vec::with_capacity(nodes.len());
    while let Some(name) = ready.pop_first() {
        state_order.push(name.to_string());
        let Some(&node) = nodes.get(name) else { continue };
        for child in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&child) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(graph[child]);
                }
            }
        }
    }

    // 3. Whatever is left sits on or behind a cycle
    if state_order.len() != nodes.len() {
        let cycles = find_cycles(&graph);
        tracing::warn!(cycles = cycles.len(), "cycle among state variables");
        return Err(ComposeError::Cycle { cycles });
    }

    let differentials = pool.category(Category::DifferentialVariable).map(|f| f.name.clone()).collect();
    let unused_state_variables =
        nodes.keys().filter(|name| !read.contains(*name)).map(|name| name.to_string()).collect();

    Ok(EvaluationPlan { state_order, differentials, unused_state_variables })
}

/// Strongly connected components that form a cycle, each sorted by name.
fn find_cycles(graph: &DiGraph<&str, ()>) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n)))
        .map(|scc| {
            let mut members: Vec<String> = scc.iter().map(|&n| graph[n].to_string()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::EquationRef;
    use crate::store::{FieldBody, Value};

    fn state(name: &str, expr: &str) -> Field {
        Field::new(name, FieldBody::StateVariable { equation: EquationRef::parse(expr).unwrap() })
    }

    fn param(name: &str) -> Field {
        Field::new(name, FieldBody::Parameter { value: Some(Value::Scalar(1.0)) })
    }

    #[test]
    fn test_diamond_dependency() {
        // a -> b, a -> c, b + c -> d
        let pool: FieldPool =
            [param("k"), state("a", "k"), state("b", "a * 2"), state("c", "a + 1"), state("d", "b + c")]
                .into_iter()
                .collect();

        let plan = evaluation_plan(&pool).unwrap();
        assert_eq!(plan.state_order, ["a", "b", "c", "d"]);
        assert_eq!(plan.unused_state_variables, ["d"]);
    }

    #[test]
    fn test_differentials_are_listed_and_read_state_variables() {
        let pool: FieldPool = [
            param("k"),
            state("wage", "k * 2"),
            Field::new(
                "capital",
                FieldBody::DifferentialVariable { equation: EquationRef::parse("wage - capital").unwrap(), initial: None },
            ),
        ]
        .into_iter()
        .collect();

        let plan = evaluation_plan(&pool).unwrap();
        assert_eq!(plan.differentials, ["capital"]);
        assert!(plan.unused_state_variables.is_empty());
    }

    #[test]
    fn test_cycle_detection_names_members() {
        let pool: FieldPool =
            [state("a", "b + 1"), state("b", "a * 2"), state("c", "c"), state("d", "a")].into_iter().collect();

        let err = evaluation_plan(&pool).unwrap_err();
        match err {
            ComposeError::Cycle { cycles } => {
                assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]);
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}
