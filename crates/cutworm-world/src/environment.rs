//! Per-location environment.

use crate::space::Space;
use cutworm_core::{EnvironmentConfig, Location, Toxin};
use serde::{Deserialize, Serialize};

/// Toxin exposure and food supply of one location, fixed at setup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub toxin: Toxin,
    pub food_biomass: f64,
}

impl Environment {
    /// The root has no toxin class. Below it, the first
    /// `round(bt_proportion * n)` vertices of each level graph carry Bt.
    /// Only the deepest locations (plants) hold food.
    pub fn for_location(location: &Location, space: &Space, config: &EnvironmentConfig) -> Self {
        let toxin = match (location.level(), location.vertex()) {
            (0, _) | (_, None) => Toxin::None,
            (level, Some(vertex)) => {
                let count = space.graph(level).map_or(0, |graph| graph.vertex_count());
                let cutoff = (config.bt_proportion * count as f64).round() as u32;
                if vertex < cutoff {
                    Toxin::Present
                } else {
                    Toxin::Absent
                }
            }
        };

        let food_biomass = if location.depth() == space.max_depth() {
            config.plant_biomass
        } else {
            0.0
        };

        Self {
            toxin,
            food_biomass,
        }
    }

    pub fn is_bt(&self) -> bool {
        self.toxin == Toxin::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::GridSource;
    use cutworm_core::{GridSpec, LatticeKind};

    #[test]
    fn test_bt_cutoff() {
        let space = Space::setup(
            vec![GridSource::Spec(GridSpec::Lattice {
                kind: LatticeKind::Square,
                rows: 2,
                cols: 2,
            })],
            None,
        )
        .unwrap();
        let config = EnvironmentConfig {
            bt_proportion: 0.25,
            plant_biomass: 3.0,
        };

        let root = Environment::for_location(&Location::root(), &space, &config);
        assert_eq!(root.toxin, Toxin::None);
        assert_eq!(root.food_biomass, 0.0);

        let first = Environment::for_location(&Location::new(vec![0, 0]), &space, &config);
        assert!(first.is_bt());
        assert_eq!(first.food_biomass, 3.0);

        let second = Environment::for_location(&Location::new(vec![0, 1]), &space, &config);
        assert_eq!(second.toxin, Toxin::Absent);
    }
}
