//! Hierarchical space: a rooted tree of graphs of increasing resolution.

use crate::graph::{Graph, GraphLibrary};
use cutworm_core::{Error, GridSpec, Location, Result, SpaceConfig};
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// Source of one level's graph
#[derive(Debug, Clone)]
pub enum GridSource {
    Spec(GridSpec),
    Graph(Graph),
}

impl From<GridSpec> for GridSource {
    fn from(spec: GridSpec) -> Self {
        GridSource::Spec(spec)
    }
}

impl From<Graph> for GridSource {
    fn from(graph: Graph) -> Self {
        GridSource::Graph(graph)
    }
}

/// Ordered level graphs plus the cached enumeration of every location.
///
/// Level 0 is always a single root vertex. A location of depth `d` holds one
/// vertex from each of the graphs `0..d`.
#[derive(Debug, Clone)]
pub struct Space {
    graphs: Vec<Graph>,
    locations: Vec<Location>,
    keys: BTreeMap<usize, Vec<Location>>,
}

impl Space {
    /// Build the level graphs below the root and enumerate all locations
    pub fn setup(levels: Vec<GridSource>, library: Option<&GraphLibrary>) -> Result<Self> {
        let mut graphs = vec![Graph::singleton()];

        for level in levels {
            let graph = match level {
                GridSource::Graph(graph) => graph,
                GridSource::Spec(GridSpec::Lattice { kind, rows, cols }) => {
                    Graph::lattice(kind, rows, cols)?
                }
                GridSource::Spec(GridSpec::Library { side }) => {
                    let library = library.ok_or_else(|| {
                        Error::Config(format!(
                            "graph of side {} requested without a graph directory",
                            side
                        ))
                    })?;
                    library.load(side)?
                }
            };
            if graph.vertex_count() == 0 {
                return Err(Error::Config(format!(
                    "level {} graph has no vertices",
                    graphs.len()
                )));
            }
            graphs.push(graph);
        }

        let (locations, keys) = enumerate_locations(&graphs);
        info!(
            levels = graphs.len(),
            locations = locations.len(),
            "Space initialized"
        );

        Ok(Self {
            graphs,
            locations,
            keys,
        })
    }

    pub fn from_config(config: &SpaceConfig) -> Result<Self> {
        let library = config.graph_dir.as_ref().map(GraphLibrary::new);
        let levels = config.levels.iter().cloned().map(GridSource::from).collect();
        Self::setup(levels, library.as_ref())
    }

    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }

    pub fn graph(&self, level: usize) -> Option<&Graph> {
        self.graphs.get(level)
    }

    /// Depth of the deepest locations
    pub fn max_depth(&self) -> usize {
        self.graphs.len()
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn keys_at_depth(&self, depth: usize) -> Result<&[Location]> {
        self.keys
            .get(&depth)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Config(format!("no locations at depth {}", depth)))
    }

    pub fn contains(&self, location: &Location) -> bool {
        location.depth() >= 1
            && location.depth() <= self.max_depth()
            && location
                .vertices()
                .iter()
                .enumerate()
                .all(|(level, &v)| self.graphs[level].contains(v))
    }

    /// Vertices at the location's own level within `lower..=upper` hops
    pub fn neighborhood(&self, location: &Location, lower: u32, upper: u32) -> Result<Vec<u32>> {
        let graph = self
            .graph(location.level())
            .ok_or_else(|| Error::UnknownLocation(location.to_string()))?;
        let vertex = location
            .vertex()
            .ok_or_else(|| Error::UnknownLocation(location.to_string()))?;
        graph.neighborhood(vertex, lower, upper)
    }

    /// Location one level deeper with a random vertex of the next graph
    pub fn extend_location<R: Rng + ?Sized>(&self, location: &Location, rng: &mut R) -> Result<Location> {
        if !self.contains(location) {
            return Err(Error::UnknownLocation(location.to_string()));
        }
        let graph = self.graph(location.depth()).ok_or_else(|| {
            Error::InvalidState(format!("{} is already at the deepest level", location))
        })?;
        let vertex = rng.gen_range(0..graph.vertex_count() as u32);
        Ok(location.extended(vertex))
    }

    /// Random location of `depth`, one vertex sampled per level
    pub fn new_location<R: Rng + ?Sized>(&self, depth: usize, rng: &mut R) -> Result<Location> {
        if depth == 0 || depth > self.max_depth() {
            return Err(Error::Config(format!(
                "depth {} outside 1..={}",
                depth,
                self.max_depth()
            )));
        }
        let vertices = self.graphs[..depth]
            .iter()
            .map(|graph| rng.gen_range(0..graph.vertex_count() as u32))
            .collect();
        Ok(Location::new(vertices))
    }

    /// Move `location` to `depth`: shallower targets truncate, deeper ones extend at random
    pub fn relocate<R: Rng + ?Sized>(
        &self,
        location: &Location,
        depth: usize,
        rng: &mut R,
    ) -> Result<Location> {
        let mut moved = location.prefix(depth);
        while moved.depth() < depth {
            moved = self.extend_location(&moved, rng)?;
        }
        Ok(moved)
    }
}

/// Breadth-first cartesian expansion of the level graphs
fn enumerate_locations(graphs: &[Graph]) -> (Vec<Location>, BTreeMap<usize, Vec<Location>>) {
    let mut keys = BTreeMap::new();
    let mut frontier = vec![Location::root()];
    keys.insert(1, frontier.clone());

    for (level, graph) in graphs.iter().enumerate().skip(1) {
        frontier = frontier
            .iter()
            .flat_map(|parent| graph.vertices().map(move |v| parent.extended(v)))
            .collect();
        keys.insert(level + 1, frontier.clone());
    }

    let locations = keys.values().flatten().cloned().collect();
    (locations, keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutworm_core::LatticeKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn space() -> Space {
        Space::setup(
            vec![
                GridSpec::Lattice {
                    kind: LatticeKind::Square,
                    rows: 2,
                    cols: 2,
                }
                .into(),
                GridSpec::Lattice {
                    kind: LatticeKind::Moore,
                    rows: 3,
                    cols: 3,
                }
                .into(),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_location_enumeration() {
        let space = space();
        assert_eq!(space.max_depth(), 3);
        assert_eq!(space.keys_at_depth(1).unwrap(), &[Location::root()]);
        assert_eq!(space.keys_at_depth(2).unwrap().len(), 4);
        assert_eq!(space.keys_at_depth(3).unwrap().len(), 36);
        assert_eq!(space.locations().len(), 41);
        assert!(space.keys_at_depth(4).is_err());
    }

    #[test]
    fn test_random_locations_are_valid() {
        let space = space();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for depth in 1..=3 {
            for _ in 0..50 {
                let location = space.new_location(depth, &mut rng).unwrap();
                assert_eq!(location.depth(), depth);
                assert!(space.contains(&location));
            }
        }
        assert!(space.new_location(4, &mut rng).is_err());
    }

    #[test]
    fn test_extend_location() {
        let space = space();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let field = Location::new(vec![0, 2]);
        let plant = space.extend_location(&field, &mut rng).unwrap();
        assert_eq!(plant.depth(), 3);
        assert!(field.is_ancestor_of(&plant));
        assert!(space.extend_location(&plant, &mut rng).is_err());
    }

    #[test]
    fn test_relocate() {
        let space = space();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let plant = Location::new(vec![0, 1, 4]);
        assert_eq!(space.relocate(&plant, 2, &mut rng).unwrap(), Location::new(vec![0, 1]));
        let root_child = space.relocate(&Location::root(), 3, &mut rng).unwrap();
        assert_eq!(root_child.depth(), 3);
    }

    #[test]
    fn test_neighborhood() {
        let space = space();
        let plant = Location::new(vec![0, 1, 4]);
        assert_eq!(space.neighborhood(&plant, 1, 1).unwrap().len(), 8);
        assert_eq!(space.neighborhood(&Location::root(), 0, 3).unwrap(), vec![0]);
    }

    #[test]
    fn test_missing_library_graph() {
        let dir = tempfile::tempdir().unwrap();
        let library = GraphLibrary::new(dir.path());
        let result = Space::setup(vec![GridSpec::Library { side: 8 }.into()], Some(&library));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
