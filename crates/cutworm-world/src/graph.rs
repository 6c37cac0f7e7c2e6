//! Per-level spatial graphs.

use cutworm_core::{Error, LatticeKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An undirected graph over vertices `0..n` with lattice coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    coordinates: Vec<(i32, i32)>,
    adjacency: Vec<Vec<u32>>,
}

impl Graph {
    /// Single vertex graph used for the simulation root
    pub fn singleton() -> Self {
        Self {
            coordinates: vec![(0, 0)],
            adjacency: vec![Vec::new()],
        }
    }

    /// Build from an edge list; duplicate edges and self loops are dropped
    pub fn from_edges(coordinates: Vec<(i32, i32)>, edges: &[(u32, u32)]) -> Result<Self> {
        let n = coordinates.len() as u32;
        let mut adjacency = vec![Vec::new(); coordinates.len()];
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(Error::Config(format!(
                    "edge ({}, {}) outside graph of {} vertices",
                    a, b, n
                )));
            }
            if a == b || adjacency[a as usize].contains(&b) {
                continue;
            }
            adjacency[a as usize].push(b);
            adjacency[b as usize].push(a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }
        Ok(Self {
            coordinates,
            adjacency,
        })
    }

    /// Adjacency must match the coordinates, stay in range and be symmetric.
    fn check(&self) -> std::result::Result<(), String> {
        if self.coordinates.len() != self.adjacency.len() {
            return Err(format!(
                "{} coordinates for {} adjacency lists",
                self.coordinates.len(),
                self.adjacency.len()
            ));
        }
        for (vertex, neighbors) in self.adjacency.iter().enumerate() {
            for &neighbor in neighbors {
                let back = self
                    .adjacency
                    .get(neighbor as usize)
                    .ok_or_else(|| format!("vertex {} links to missing {}", vertex, neighbor))?;
                if !back.contains(&(vertex as u32)) {
                    return Err(format!("edge {} -> {} is one-way", vertex, neighbor));
                }
            }
        }
        Ok(())
    }

    /// Generate a `rows` x `cols` lattice
    pub fn lattice(kind: LatticeKind, rows: u32, cols: u32) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::Config(format!(
                "{:?} lattice needs positive sides, got {}x{}",
                kind, rows, cols
            )));
        }

        let index = |r: u32, c: u32| r * cols + c;
        let coordinates: Vec<(i32, i32)> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r as i32, c as i32)))
            .collect();

        let mut edges = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let here = index(r, c);
                let right = c + 1 < cols;
                let down = r + 1 < rows;
                match kind {
                    LatticeKind::Square => {
                        if right {
                            edges.push((here, index(r, c + 1)));
                        }
                        if down {
                            edges.push((here, index(r + 1, c)));
                        }
                    }
                    LatticeKind::Moore => {
                        if right {
                            edges.push((here, index(r, c + 1)));
                        }
                        if down {
                            edges.push((here, index(r + 1, c)));
                            if right {
                                edges.push((here, index(r + 1, c + 1)));
                            }
                            if c > 0 {
                                edges.push((here, index(r + 1, c - 1)));
                            }
                        }
                    }
                    LatticeKind::Triangle => {
                        // Offset rows: odd rows lean right.
                        if right {
                            edges.push((here, index(r, c + 1)));
                        }
                        if down {
                            edges.push((here, index(r + 1, c)));
                            if r % 2 == 0 && c > 0 {
                                edges.push((here, index(r + 1, c - 1)));
                            }
                            if r % 2 == 1 && right {
                                edges.push((here, index(r + 1, c + 1)));
                            }
                        }
                    }
                    LatticeKind::Hexagon => {
                        // Brick wall honeycomb.
                        if right {
                            edges.push((here, index(r, c + 1)));
                        }
                        if down && (r + c) % 2 == 0 {
                            edges.push((here, index(r + 1, c)));
                        }
                    }
                }
            }
        }

        Self::from_edges(coordinates, &edges)
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = u32> {
        0..self.adjacency.len() as u32
    }

    pub fn contains(&self, vertex: u32) -> bool {
        (vertex as usize) < self.adjacency.len()
    }

    pub fn neighbors(&self, vertex: u32) -> &[u32] {
        self.adjacency
            .get(vertex as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn coordinate(&self, vertex: u32) -> Option<(i32, i32)> {
        self.coordinates.get(vertex as usize).copied()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Hop distance from `source` to every vertex, `None` when unreachable
    pub fn distances_from(&self, source: u32) -> Vec<Option<u32>> {
        let mut distances = vec![None; self.vertex_count()];
        if !self.contains(source) {
            return distances;
        }

        let mut queue = VecDeque::new();
        distances[source as usize] = Some(0);
        queue.push_back(source);
        while let Some(vertex) = queue.pop_front() {
            let next = distances[vertex as usize].unwrap_or(0) + 1;
            for &neighbor in self.neighbors(vertex) {
                if distances[neighbor as usize].is_none() {
                    distances[neighbor as usize] = Some(next);
                    queue.push_back(neighbor);
                }
            }
        }
        distances
    }

    /// Vertices whose hop distance from `vertex` lies in `lower..=upper`
    pub fn neighborhood(&self, vertex: u32, lower: u32, upper: u32) -> Result<Vec<u32>> {
        if !self.contains(vertex) {
            return Err(Error::UnknownLocation(format!(
                "vertex {} not in graph of {} vertices",
                vertex,
                self.vertex_count()
            )));
        }

        Ok(self
            .distances_from(vertex)
            .into_iter()
            .enumerate()
            .filter_map(|(v, d)| match d {
                Some(d) if d >= lower && d <= upper => Some(v as u32),
                _ => None,
            })
            .collect())
    }
}

/// Directory of pre-built graphs keyed by side length
#[derive(Debug, Clone)]
pub struct GraphLibrary {
    dir: PathBuf,
}

impl GraphLibrary {
    pub const SIDES: [u32; 7] = [1, 2, 4, 8, 10, 25, 50];

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, side: u32) -> PathBuf {
        self.dir.join(format!("graph_{}.bin", side))
    }

    pub fn load(&self, side: u32) -> Result<Graph> {
        if !Self::SIDES.contains(&side) {
            return Err(Error::NotFound(format!("no graph for side length {}", side)));
        }

        let path = self.path(side);
        if !path.exists() {
            return Err(Error::NotFound(format!("graph file {:?}", path)));
        }

        let bytes = std::fs::read(&path)?;
        let graph: Graph = bincode::deserialize(&bytes)?;
        graph.check().map_err(|reason| {
            Error::Config(format!("graph file {:?} is malformed: {}", path, reason))
        })?;
        debug!(side, vertices = graph.vertex_count(), "Loaded graph");
        Ok(graph)
    }

    pub fn save(&self, side: u32, graph: &Graph) -> Result<()> {
        if !Self::SIDES.contains(&side) {
            return Err(Error::NotFound(format!("no graph for side length {}", side)));
        }
        std::fs::create_dir_all(&self.dir)?;
        let bytes = bincode::serialize(graph)?;
        std::fs::write(self.path(side), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_degrees() {
        let square = Graph::lattice(LatticeKind::Square, 3, 3).unwrap();
        assert_eq!(square.vertex_count(), 9);
        assert_eq!(square.neighbors(4).len(), 4);
        assert_eq!(square.edge_count(), 12);

        let moore = Graph::lattice(LatticeKind::Moore, 3, 3).unwrap();
        assert_eq!(moore.neighbors(4).len(), 8);
        assert_eq!(moore.neighbors(0).len(), 3);

        let triangle = Graph::lattice(LatticeKind::Triangle, 4, 4).unwrap();
        assert!(triangle.vertices().all(|v| triangle.neighbors(v).len() <= 6));
        assert_eq!(triangle.neighbors(5).len(), 6);

        let hexagon = Graph::lattice(LatticeKind::Hexagon, 4, 4).unwrap();
        assert!(hexagon.vertices().all(|v| hexagon.neighbors(v).len() <= 3));
        assert_eq!(hexagon.neighbors(5).len(), 3);
    }

    #[test]
    fn test_zero_side_is_rejected() {
        assert!(Graph::lattice(LatticeKind::Square, 0, 3).is_err());
    }

    #[test]
    fn test_neighborhood_bounds() {
        let square = Graph::lattice(LatticeKind::Square, 1, 5).unwrap();
        assert_eq!(square.neighborhood(0, 0, 0).unwrap(), vec![0]);
        assert_eq!(square.neighborhood(2, 1, 1).unwrap(), vec![1, 3]);
        assert_eq!(square.neighborhood(2, 2, 4).unwrap(), vec![0, 4]);
        assert!(square.neighborhood(9, 0, 1).is_err());
    }

    #[test]
    fn test_library_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let library = GraphLibrary::new(dir.path());
        let graph = Graph::lattice(LatticeKind::Moore, 2, 2).unwrap();

        library.save(2, &graph).unwrap();
        assert_eq!(library.load(2).unwrap(), graph);
    }

    #[test]
    fn test_library_rejects_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let library = GraphLibrary::new(dir.path());

        let dangling = Graph {
            coordinates: vec![(0, 0), (0, 1)],
            adjacency: vec![vec![1], vec![0, 7]],
        };
        library.save(2, &dangling).unwrap();
        assert!(matches!(library.load(2), Err(Error::Config(_))));

        let short = Graph {
            coordinates: vec![(0, 0)],
            adjacency: vec![vec![1], vec![0]],
        };
        library.save(4, &short).unwrap();
        assert!(matches!(library.load(4), Err(Error::Config(_))));
    }

    #[test]
    fn test_library_unknown_side() {
        let dir = tempfile::tempdir().unwrap();
        let library = GraphLibrary::new(dir.path());
        assert!(matches!(library.load(3), Err(Error::NotFound(_))));
        assert!(matches!(library.load(4), Err(Error::NotFound(_))));
    }
}
