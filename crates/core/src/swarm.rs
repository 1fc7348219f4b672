// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SwarmWorkflow — DAG of nodes that launch Runs (spec §3, §4.9).
//!
//! DAG construction and cycle detection are grounded in
//! `examples/jdsingh122918-forge/src/dag/{builder,scheduler}.rs`: build an
//! adjacency map, then walk it with Kahn's algorithm to both validate
//! acyclicity and produce a stable wave order.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

crate::define_id! {
    /// Unique identifier for a swarm workflow definition.
    pub struct WorkflowId("wf-");
}

crate::define_id! {
    /// Unique identifier for one in-flight execution of a workflow.
    pub struct OrchestrationId("orc-");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmNode {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<crate::scheduler::Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub instruction_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub nodes: Vec<SwarmNode>,
    pub edges: Vec<SwarmEdge>,
}

impl SwarmWorkflow {
    pub fn node(&self, id: &str) -> Option<&SwarmNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn dependents(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges.iter().filter(move |e| e.from == id).map(|e| e.to.as_str())
    }

    fn dependencies(&self, id: &str) -> impl Iterator<Item = &str> {
        self.edges.iter().filter(move |e| e.to == id).map(|e| e.from.as_str())
    }

    /// Validate the node/edge set forms a DAG (spec §3 invariant: cycle
    /// insertion is rejected). Uses Kahn's algorithm: if every node can be
    /// removed via in-degree-zero peeling, there is no cycle.
    #[allow(clippy::expect_used)]
    pub fn validate_acyclic(&self) -> Result<(), CoreError> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &self.edges {
            if !ids.contains(edge.from.as_str()) || !ids.contains(edge.to.as_str()) {
                return Err(CoreError::InvalidWorkflow(format!(
                    "edge references unknown node: {} -> {}",
                    edge.from, edge.to
                )));
            }
        }

        let mut indegree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
        for edge in &self.edges {
            *indegree.get_mut(edge.to.as_str()).expect("validated above") += 1;
        }

        let mut queue: VecDeque<&str> =
            indegree.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();
        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for dep in self.dependents(id) {
                let d = indegree.get_mut(dep).expect("dependent is a known node");
                *d -= 1;
                if *d == 0 {
                    queue.push_back(dep);
                }
            }
        }

        if visited != ids.len() {
            return Err(CoreError::InvalidWorkflow("edge set contains a cycle".into()));
        }
        Ok(())
    }

    /// Nodes with no dependencies, in declaration order, for the initial
    /// ready set (spec §4.9 Start).
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| self.dependencies(id).next().is_none())
            .collect()
    }

    pub fn direct_dependents(&self, id: &str) -> Vec<&str> {
        self.dependents(id).collect()
    }

    pub fn direct_dependencies(&self, id: &str) -> Vec<&str> {
        self.dependencies(id).collect()
    }

    /// All transitive descendants of `id`, used when fail-fast blocks an
    /// entire downstream branch (spec §4.9 Progress).
    pub fn descendants(&self, id: &str) -> HashSet<&str> {
        let mut out = HashSet::new();
        let mut queue: VecDeque<&str> = self.dependents(id).collect();
        while let Some(next) = queue.pop_front() {
            if out.insert(next) {
                queue.extend(self.dependents(next));
            }
        }
        out
    }
}

/// Per-node status during one orchestration run (spec §3 Orchestration state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Blocked,
    Skipped,
}

crate::simple_display! {
    NodeStatus {
        Pending => "pending",
        Ready => "ready",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Blocked => "blocked",
        Skipped => "skipped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wf(edges: &[(&str, &str)], node_ids: &[&str]) -> SwarmWorkflow {
        SwarmWorkflow {
            id: WorkflowId::new(),
            name: "t".into(),
            nodes: node_ids
                .iter()
                .map(|id| SwarmNode {
                    id: id.to_string(),
                    enabled: true,
                    schedule: None,
                    agent_id: None,
                    instruction_template: "x".into(),
                    job_id: None,
                })
                .collect(),
            edges: edges.iter().map(|(f, t)| SwarmEdge { from: f.to_string(), to: t.to_string() }).collect(),
        }
    }

    #[test]
    fn rejects_cycle() {
        let w = wf(&[("a", "b"), ("b", "c"), ("c", "a")], &["a", "b", "c"]);
        assert!(w.validate_acyclic().is_err());
    }

    #[test]
    fn accepts_diamond() {
        // a,b -> c -> d (spec §8 scenario 5)
        let w = wf(&[("a", "c"), ("b", "c"), ("c", "d")], &["a", "b", "c", "d"]);
        assert!(w.validate_acyclic().is_ok());
        let mut roots = w.roots();
        roots.sort_unstable();
        assert_eq!(roots, vec!["a", "b"]);
    }

    #[test]
    fn descendants_are_transitive() {
        let w = wf(&[("a", "c"), ("b", "c"), ("c", "d")], &["a", "b", "c", "d"]);
        let mut desc: Vec<&str> = w.descendants("a").into_iter().collect();
        desc.sort_unstable();
        assert_eq!(desc, vec!["c", "d"]);
    }
}
