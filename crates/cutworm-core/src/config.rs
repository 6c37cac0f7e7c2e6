//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::types::{AgentType, Behavior, Genotype};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Named lattice generators for one spatial level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatticeKind {
    /// Honeycomb, up to 3 neighbors per vertex
    Hexagon,
    /// Von Neumann, up to 4 neighbors
    Square,
    /// Square with diagonals, up to 8 neighbors
    Moore,
    /// Triangular tiling, up to 6 neighbors
    Triangle,
}

/// How one level of the spatial hierarchy is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridSpec {
    Lattice {
        kind: LatticeKind,
        rows: u32,
        cols: u32,
    },
    /// Pre-built graph file selected by side length
    Library { side: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// One entry per level below the root
    pub levels: Vec<GridSpec>,
    /// Directory holding `graph_{side}.bin` files
    pub graph_dir: Option<PathBuf>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            levels: vec![
                GridSpec::Lattice {
                    kind: LatticeKind::Square,
                    rows: 2,
                    cols: 2,
                },
                GridSpec::Lattice {
                    kind: LatticeKind::Moore,
                    rows: 5,
                    cols: 5,
                },
            ],
            graph_dir: None,
        }
    }
}

/// Ordered behaviors applied to every agent of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsConfig {
    pub agent_type: AgentType,
    pub behaviors: Vec<Behavior>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub actions: Vec<ActionsConfig>,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub parallel_agents: bool,
    #[serde(default)]
    pub parallel_locations: bool,
    /// Depth of the locations the step iterates over
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_repeat() -> usize {
    1
}

fn default_depth() -> usize {
    1
}

impl StepConfig {
    pub fn new(actions: Vec<ActionsConfig>) -> Self {
        Self {
            actions,
            repeat: default_repeat(),
            shuffle: false,
            parallel_agents: false,
            parallel_locations: false,
            depth: default_depth(),
        }
    }
}

/// Default daily schedule: larvae feed before anything develops
pub fn default_schedule() -> Vec<StepConfig> {
    vec![
        StepConfig::new(vec![ActionsConfig {
            agent_type: AgentType::Larva,
            behaviors: vec![Behavior::Forage, Behavior::Grow],
        }]),
        StepConfig::new(vec![
            ActionsConfig {
                agent_type: AgentType::Egg,
                behaviors: vec![Behavior::Survive, Behavior::Develop],
            },
            ActionsConfig {
                agent_type: AgentType::Larva,
                behaviors: vec![Behavior::Survive, Behavior::Develop],
            },
            ActionsConfig {
                agent_type: AgentType::Pupa,
                behaviors: vec![Behavior::Survive, Behavior::Develop],
            },
            ActionsConfig {
                agent_type: AgentType::Adult,
                behaviors: vec![Behavior::Survive, Behavior::Mate, Behavior::Lay],
            },
        ]),
    ]
}

/// Initial population: rows are (egg_mass, larva, pupa, adult, pregnant adult),
/// columns are (RR, RS, SS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PopulationConfig {
    pub nums: [[u32; 3]; 5],
}

impl PopulationConfig {
    pub fn count(&self, row: usize, genotype: Genotype) -> u32 {
        self.nums[row][genotype.index()]
    }
}

/// Depth at which each stage is placed when it enters the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDepths {
    pub juvenile: usize,
    pub adult: usize,
}

impl Default for StageDepths {
    fn default() -> Self {
        Self {
            juvenile: 3,
            adult: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Fraction of each parent graph's vertices planted with Bt
    pub bt_proportion: f64,
    /// Plant biomass available to foraging larvae per tick
    pub plant_biomass: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            bt_proportion: 0.5,
            plant_biomass: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthConfig {
    /// Mass gained per unit of food eaten
    pub conversion: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self { conversion: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentConfig {
    pub egg_ticks: u32,
    pub larva_ticks: u32,
    pub larva_min_mass: f64,
    pub pupa_ticks: u32,
    /// Mass of a newly hatched larva
    pub hatch_mass: f64,
    /// Fraction of larval mass kept through pupation
    pub pupa_mass_ratio: f64,
}

impl Default for DevelopmentConfig {
    fn default() -> Self {
        Self {
            egg_ticks: 5,
            larva_ticks: 20,
            larva_min_mass: 2.0,
            pupa_ticks: 10,
            hatch_mass: 0.1,
            pupa_mass_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalConfig {
    pub egg: f64,
    pub larva: f64,
    pub pupa: f64,
    pub adult: f64,
    /// Extra larval mortality on Bt plants, indexed RR, RS, SS
    pub bt_mortality: [f64; 3],
    /// Survival multiplier applied to a starving larva
    pub starvation: f64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            egg: 0.98,
            larva: 0.97,
            pupa: 0.98,
            adult: 0.95,
            bt_mortality: [0.0, 0.2, 0.6],
            starvation: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForageConfig {
    /// Gut capacity as a multiple of body mass
    pub gut_ratio: f64,
    /// Minimum gut capacity for a newly hatched larva
    pub min_gut: f64,
}

impl Default for ForageConfig {
    fn default() -> Self {
        Self {
            gut_ratio: 0.5,
            min_gut: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproductionConfig {
    pub fecundity: u32,
    pub clutch_size: u32,
    /// Biomass of a single egg
    pub egg_mass: f64,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            fecundity: 40,
            clutch_size: 20,
            egg_mass: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Chance a hungry larva attacks a smaller larva it meets
    pub probability: f64,
}

/// Parameters of the bundled submodels
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub growth: GrowthConfig,
    pub development: DevelopmentConfig,
    pub survival: SurvivalConfig,
    pub forage: ForageConfig,
    pub reproduction: ReproductionConfig,
    /// Larva-on-larva cannibalism is disabled when absent
    pub encounter: Option<EncounterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmigrationConfig {
    pub mu: f64,
    pub sigma: f64,
    pub agent_types: Vec<AgentType>,
}

impl Default for EmigrationConfig {
    fn default() -> Self {
        Self {
            mu: 500.0,
            sigma: 50.0,
            agent_types: vec![AgentType::Adult],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmigrationConfig {
    pub mu: f64,
    pub sigma: f64,
    pub agent_type: AgentType,
    /// Relative weights of RR, RS, SS immigrants
    pub genotype_weights: [f64; 3],
    pub max_per_tick: usize,
}

impl Default for ImmigrationConfig {
    fn default() -> Self {
        Self {
            mu: 20.0,
            sigma: 5.0,
            agent_type: AgentType::Adult,
            genotype_weights: [0.0, 0.0, 1.0],
            max_per_tick: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Ticks between snapshots
    pub spacing: u64,
    /// Run tag used as the snapshot file prefix
    pub file_name: String,
    pub output_dir: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            spacing: 50,
            file_name: "run".to_string(),
            output_dir: PathBuf::from("./data/snapshots"),
        }
    }
}

/// Full configuration of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub ticks: u64,
    /// Ticks between population gauge reports
    pub report_interval: u64,
    pub space: SpaceConfig,
    pub schedule: Vec<StepConfig>,
    pub population: PopulationConfig,
    pub depths: StageDepths,
    pub environment: EnvironmentConfig,
    pub models: ModelsConfig,
    pub emigration: Option<EmigrationConfig>,
    pub immigration: Option<ImmigrationConfig>,
    pub database: Option<DatabaseConfig>,
    /// Matings after which a male retires
    pub male_mating_limit: Option<u32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ticks: 365,
            report_interval: 25,
            space: SpaceConfig::default(),
            schedule: default_schedule(),
            population: PopulationConfig {
                nums: [[0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0], [5, 10, 20]],
            },
            depths: StageDepths::default(),
            environment: EnvironmentConfig::default(),
            models: ModelsConfig::default(),
            emigration: Some(EmigrationConfig::default()),
            immigration: None,
            database: Some(DatabaseConfig::default()),
            male_mating_limit: None,
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Checks that do not need the built space
    pub fn validate(&self) -> Result<()> {
        let max_depth = self.space.levels.len() + 1;
        if self.depths.juvenile > max_depth || self.depths.adult > max_depth {
            return Err(Error::Config(format!(
                "stage depths {:?} exceed space depth {}",
                self.depths, max_depth
            )));
        }
        if self.depths.juvenile == 0 || self.depths.adult == 0 {
            return Err(Error::Config("stage depths start at 1".to_string()));
        }
        if let Some(database) = &self.database {
            if database.spacing == 0 {
                return Err(Error::Config("database spacing must be positive".to_string()));
            }
        }
        if let Some(emigration) = &self.emigration {
            if emigration.sigma <= 0.0 {
                return Err(Error::Config("emigration sigma must be positive".to_string()));
            }
        }
        if let Some(immigration) = &self.immigration {
            if immigration.sigma <= 0.0 {
                return Err(Error::Config("immigration sigma must be positive".to_string()));
            }
        }
        Ok(())
    }
}
