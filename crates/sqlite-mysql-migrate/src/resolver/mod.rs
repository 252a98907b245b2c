//! Foreign-key dependency ordering.
//!
//! Tables are ordered with Kahn's algorithm so that every referenced table is
//! created before the tables referencing it. Self-references contribute no
//! edge; references to tables outside the set are reported as dangling. A
//! cycle never fails the resolution: the tables caught in it are appended in
//! extraction order and reported.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::warn;

use crate::core::schema::{ForeignKey, Table};

/// Directed graph of "referenced table -> dependent table" edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Table names in extraction order.
    nodes: Vec<String>,
    /// Outgoing edges per node index, one per foreign key, in insertion order.
    edges: Vec<Vec<usize>>,
    /// Foreign keys whose referenced table is not in the node set.
    dangling: Vec<ForeignKey>,
}

impl DependencyGraph {
    /// Build the graph from tables and their foreign keys.
    pub fn build(tables: &[Table]) -> Self {
        let nodes: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();

        let mut edges = vec![Vec::new(); nodes.len()];
        let mut dangling = Vec::new();

        for (dependent, table) in tables.iter().enumerate() {
            for fk in &table.foreign_keys {
                if fk.is_self_reference() {
                    continue;
                }
                match index.get(&fk.ref_table.to_lowercase()) {
                    Some(&referenced) => edges[referenced].push(dependent),
                    None => dangling.push(fk.clone()),
                }
            }
        }

        Self {
            nodes,
            edges,
            dangling,
        }
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Foreign keys pointing outside the table set.
    pub fn dangling(&self) -> &[ForeignKey] {
        &self.dangling
    }

    /// Topologically sort the graph; never fails.
    pub fn resolve(&self) -> Resolution {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for targets in &self.edges {
            for &dependent in targets {
                in_degree[dependent] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            visited[node] = true;
            order.push(self.nodes[node].clone());
            for &dependent in &self.edges[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        let cyclic: Vec<String> = (0..self.nodes.len())
            .filter(|&i| !visited[i])
            .map(|i| self.nodes[i].clone())
            .collect();

        if !cyclic.is_empty() {
            warn!(
                "Circular foreign key dependencies detected between: {}",
                cyclic.join(", ")
            );
            order.extend(cyclic.iter().cloned());
        }

        for fk in &self.dangling {
            warn!(
                "Foreign key {} references a table that does not exist in the source",
                fk.describe()
            );
        }

        Resolution {
            order,
            cyclic,
            dangling: self.dangling.clone(),
        }
    }
}

/// Outcome of dependency resolution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    /// Every table exactly once, referenced tables first.
    pub order: Vec<String>,
    /// Tables caught in a cycle (appended at the end of `order`).
    pub cyclic: Vec<String>,
    /// Foreign keys whose referenced table is missing.
    pub dangling: Vec<ForeignKey>,
}

impl Resolution {
    pub fn has_cycles(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Build the graph and resolve the creation order in one step.
pub fn resolve_order(tables: &[Table]) -> Resolution {
    DependencyGraph::build(tables).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ReferentialAction;

    fn table(name: &str, refs: &[&str]) -> Table {
        let mut t = Table::new(name, format!("CREATE TABLE {} (id INTEGER)", name));
        for (i, r) in refs.iter().enumerate() {
            t.foreign_keys.push(ForeignKey {
                name: None,
                table: name.to_string(),
                columns: vec![format!("ref_{}", i)],
                ref_table: r.to_string(),
                ref_columns: vec!["id".to_string()],
                on_delete: ReferentialAction::Restrict,
                on_update: ReferentialAction::Restrict,
            });
        }
        t
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_acyclic_order_places_referenced_first() {
        let tables = vec![
            table("order_items", &["orders", "products"]),
            table("orders", &["users"]),
            table("products", &[]),
            table("users", &[]),
        ];
        let res = resolve_order(&tables);
        assert_eq!(res.order.len(), 4);
        assert!(!res.has_cycles());
        for t in &tables {
            for fk in &t.foreign_keys {
                assert!(position(&res.order, &fk.ref_table) < position(&res.order, &t.name));
            }
        }
        // Zero in-degree tables keep extraction order.
        assert_eq!(res.order[0], "products");
        assert_eq!(res.order[1], "users");
    }

    #[test]
    fn test_self_reference_adds_no_edge() {
        let tables = vec![table("categories", &["categories"]), table("items", &["categories"])];
        let graph = DependencyGraph::build(&tables);
        assert_eq!(graph.edge_count(), 1);

        let res = graph.resolve();
        assert_eq!(res.order, vec!["categories".to_string(), "items".to_string()]);
        assert!(res.cyclic.is_empty());
    }

    #[test]
    fn test_cycle_returns_every_table_once() {
        let tables = vec![table("a", &["b"]), table("b", &["a"]), table("c", &[])];
        let res = resolve_order(&tables);
        assert_eq!(res.order, vec!["c".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(res.cyclic, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_duplicate_foreign_keys_count_separately() {
        // Two keys from the same table to the same parent.
        let tables = vec![
            table("messages", &["users", "users"]),
            table("users", &[]),
        ];
        let graph = DependencyGraph::build(&tables);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.resolve().order,
            vec!["users".to_string(), "messages".to_string()]
        );
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        let tables = vec![table("orders", &["customers"]), table("users", &[])];
        let graph = DependencyGraph::build(&tables);
        assert_eq!(graph.edge_count(), 0);

        let res = graph.resolve();
        assert_eq!(res.order.len(), 2);
        assert_eq!(res.dangling.len(), 1);
        assert_eq!(res.dangling[0].ref_table, "customers");
    }

    #[test]
    fn test_edge_count_invariant() {
        let tables = vec![
            table("a", &["a", "b", "missing"]),
            table("b", &["c"]),
            table("c", &[]),
        ];
        let fk_count: usize = tables.iter().map(|t| t.foreign_keys.len()).sum();
        let graph = DependencyGraph::build(&tables);
        // minus one self-reference, minus one dangling
        assert_eq!(graph.edge_count(), fk_count - 2);
    }

    #[test]
    fn test_reference_matching_is_case_insensitive() {
        let tables = vec![table("orders", &["Users"]), table("users", &[])];
        let res = resolve_order(&tables);
        assert!(res.dangling.is_empty());
        assert_eq!(res.order, vec!["users".to_string(), "orders".to_string()]);
    }
}
