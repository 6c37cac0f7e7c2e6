//! Exported count tables.

use crate::types::Genotype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of resistance alleles in a population, `NaN` when it is empty
pub fn percent_resistant(rr: u64, rs: u64, ss: u64) -> f64 {
    let denominator = 2 * (rr + rs + ss);
    if denominator == 0 {
        return f64::NAN;
    }
    (2 * rr + rs) as f64 / denominator as f64
}

/// Genotype count time series of one (location, agent type) bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// `"{location}_{agent_type}"`
    pub name: String,
    pub ticks: Vec<u64>,
    pub columns: BTreeMap<Genotype, Vec<u64>>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticks: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty() || self.columns.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.ticks.len()
    }

    /// Count of `genotype` in row `row`, zero for untracked genotypes
    pub fn count(&self, genotype: Genotype, row: usize) -> u64 {
        self.columns
            .get(&genotype)
            .and_then(|column| column.get(row))
            .copied()
            .unwrap_or(0)
    }

    pub fn percent_resistant(&self, row: usize) -> f64 {
        percent_resistant(
            self.count(Genotype::RR, row),
            self.count(Genotype::RS, row),
            self.count(Genotype::SS, row),
        )
    }

    pub fn last_row(&self) -> Option<[u64; 3]> {
        let row = self.rows().checked_sub(1)?;
        Some(Genotype::ALL.map(|genotype| self.count(genotype, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_resistant() {
        assert_eq!(percent_resistant(1, 0, 0), 1.0);
        assert_eq!(percent_resistant(0, 0, 4), 0.0);
        assert_eq!(percent_resistant(1, 2, 1), 0.5);
        assert!(percent_resistant(0, 0, 0).is_nan());
    }

    #[test]
    fn test_frame_access() {
        let mut frame = Frame::new("(0,)_adult");
        assert!(frame.is_empty());

        frame.ticks = vec![1, 2];
        frame.columns.insert(Genotype::RR, vec![3, 4]);
        frame.columns.insert(Genotype::SS, vec![1, 0]);

        assert_eq!(frame.count(Genotype::RS, 0), 0);
        assert_eq!(frame.last_row(), Some([4, 0, 0]));
        assert_eq!(frame.percent_resistant(1), 1.0);
    }
}
