//! Rooted skeleton topology

use crate::error::ComputeError;
use crate::service::RawSkeleton;
use crate::types::{RootId, SomaPoint};
use std::collections::VecDeque;

/// A validated skeleton: a tree over vertices, rooted at the soma
#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    /// Vertex positions (nm)
    pub vertices: Vec<[f64; 3]>,
    /// Parent of each vertex; None only for the root
    pub parents: Vec<Option<usize>>,
    /// Root vertex index
    pub root: usize,
    children: Vec<Vec<usize>>,
    /// Vertices in breadth-first order from the root
    order: Vec<usize>,
}

impl Skeleton {
    /// Orient the raw edge list away from the root
    ///
    /// Fails when the skeleton is empty, an edge or the root is out of range,
    /// or the edges do not form a single tree.
    pub fn from_raw(root_id: RootId, raw: &RawSkeleton) -> Result<Self, ComputeError> {
        let invalid = |reason: String| ComputeError::InvalidStructure {
            root_id: root_id.get(),
            reason,
        };

        let n = raw.vertices.len();
        if n == 0 {
            return Err(invalid("skeleton has no vertices".into()));
        }
        if raw.root >= n {
            return Err(invalid(format!("root {} out of range for {n} vertices", raw.root)));
        }
        if raw.edges.len() != n - 1 {
            return Err(invalid(format!(
                "{} edges for {n} vertices is not a tree",
                raw.edges.len()
            )));
        }

        let mut adjacency = vec![Vec::new(); n];
        for &[a, b] in &raw.edges {
            if a >= n || b >= n || a == b {
                return Err(invalid(format!("edge ({a}, {b}) is invalid")));
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        let mut parents = vec![None; n];
        let mut children = vec![Vec::new(); n];
        let mut seen = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::from([raw.root]);
        seen[raw.root] = true;

        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &next in &adjacency[v] {
                if !seen[next] {
                    seen[next] = true;
                    parents[next] = Some(v);
                    children[v].push(next);
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            return Err(invalid(format!(
                "{} of {n} vertices are disconnected from the root",
                n - order.len()
            )));
        }

        Ok(Self {
            vertices: raw.vertices.clone(),
            parents,
            root: raw.root,
            children,
            order,
        })
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false; a skeleton has at least its root
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Children of vertex `v`
    pub fn children(&self, v: usize) -> &[usize] {
        &self.children[v]
    }

    /// Vertices ordered so every parent precedes its children
    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    /// Length of the edge from `v` to its parent (0 for the root)
    pub fn edge_length(&self, v: usize) -> f64 {
        match self.parents[v] {
            Some(p) => SomaPoint(self.vertices[v]).distance(&self.vertices[p]),
            None => 0.0,
        }
    }

    /// Vertex `v` and all of its descendants
    pub fn subtree(&self, v: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![v];
        while let Some(u) = stack.pop() {
            out.push(u);
            stack.extend(self.children[u].iter().copied());
        }
        out.sort_unstable();
        out
    }
}
