use cutworm_core::{
    AgentType, DatabaseConfig, Genotype, Location, PopulationConfig, SimulationConfig,
};
use cutworm_store::{reconcile, Database};
use cutworm_world::Simulation;
use std::collections::HashMap;
use tempfile::TempDir;

fn config(output_dir: &TempDir) -> SimulationConfig {
    SimulationConfig {
        seed: 3,
        ticks: 10,
        schedule: Vec::new(),
        population: PopulationConfig {
            nums: [[0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0], [5, 0, 5]],
        },
        emigration: None,
        immigration: None,
        database: Some(DatabaseConfig {
            spacing: 10,
            file_name: "roundtrip".to_string(),
            output_dir: output_dir.path().to_path_buf(),
        }),
        ..SimulationConfig::default()
    }
}

#[test]
fn test_snapshot_matches_memory() {
    let dir = TempDir::new().unwrap();
    let mut sim = Simulation::new(config(&dir)).unwrap();
    sim.run().unwrap();

    let path = dir.path().join("roundtrip_0-10.sqlite");
    assert!(path.exists());
    let (meta, frames) = Database::load(&path).unwrap();
    assert_eq!(meta.run, "roundtrip");
    assert_eq!((meta.start_tick, meta.end_tick), (0, 10));

    let mut expected = HashMap::new();
    for location in sim.space().locations() {
        let Some(bins) = sim.agents().bin(location) else {
            continue;
        };
        for agent_type in AgentType::ALL {
            if let Some(bin) = bins.bin(agent_type) {
                let counts = Genotype::ALL.map(|genotype| bin.counts().get(genotype));
                expected.insert(format!("{}_{}", location, agent_type), counts);
            }
        }
    }

    assert!(!frames.is_empty());
    for frame in &frames {
        assert_eq!(frame.rows(), 10, "{}", frame.name);
        assert_eq!(frame.last_row(), expected.get(&frame.name).copied(), "{}", frame.name);
    }

    let root_adults = format!("{}_{}", Location::root(), AgentType::Adult);
    let root = frames.iter().find(|frame| frame.name == root_adults).unwrap();
    assert_eq!(root.last_row(), Some([5, 0, 5]));
    assert!((root.percent_resistant(9) - 0.5).abs() < 1e-12);
}

#[test]
fn test_completed_run_reconciles() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.ticks = 20;
    let mut sim = Simulation::new(config).unwrap();
    sim.run().unwrap();

    let runs = reconcile(&[dir.path().to_path_buf()], Some(20)).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run, "roundtrip");
    assert_eq!(runs[0].files.len(), 2);
    assert!(runs[0].gaps.is_empty());
    assert!(runs[0].complete);
}
