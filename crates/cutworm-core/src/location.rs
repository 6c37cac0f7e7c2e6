//! Hierarchical locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A node in the spatial hierarchy: one vertex id per level, root first.
///
/// The location itself is the hashable key used by every bin lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location(Vec<u32>);

impl Location {
    pub fn new(vertices: Vec<u32>) -> Self {
        Self(vertices)
    }

    /// The simulation root, present in every space
    pub fn root() -> Self {
        Self(vec![0])
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Index of the graph holding this location's own vertex
    pub fn level(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Vertex at this location's own level
    pub fn vertex(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn vertices(&self) -> &[u32] {
        &self.0
    }

    /// Ancestor (or self) with the given depth
    pub fn prefix(&self, depth: usize) -> Location {
        Location(self.0[..depth.min(self.0.len())].to_vec())
    }

    /// Every ancestor-or-self key, shallowest first
    pub fn ancestry(&self) -> impl Iterator<Item = Location> + '_ {
        (1..=self.depth()).map(move |depth| self.prefix(depth))
    }

    /// Location one level deeper
    pub fn extended(&self, vertex: u32) -> Location {
        let mut vertices = self.0.clone();
        vertices.push(vertex);
        Location(vertices)
    }

    pub fn push(&mut self, vertex: u32) {
        self.0.push(vertex);
    }

    pub fn truncate(&mut self, depth: usize) {
        self.0.truncate(depth);
    }

    pub fn is_ancestor_of(&self, other: &Location) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, vertex) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", vertex)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}
