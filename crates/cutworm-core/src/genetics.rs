//! Mendelian inheritance of the resistance locus.

use crate::types::Genotype;
use rand::Rng;

/// Offspring genotype from one random allele of each parent
pub fn cross<R: Rng + ?Sized>(mother: Genotype, father: Genotype, rng: &mut R) -> Genotype {
    let maternal = mother.alleles()[rng.gen_range(0..2)];
    let paternal = father.alleles()[rng.gen_range(0..2)];
    Genotype::from_alleles(maternal, paternal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_homozygous_crosses() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(cross(Genotype::RR, Genotype::RR, &mut rng), Genotype::RR);
            assert_eq!(cross(Genotype::SS, Genotype::SS, &mut rng), Genotype::SS);
            assert_eq!(cross(Genotype::RR, Genotype::SS, &mut rng), Genotype::RS);
            assert_eq!(cross(Genotype::SS, Genotype::RR, &mut rng), Genotype::RS);
        }
    }

    #[test]
    fn test_heterozygous_ratio() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 100_000;
        let mut tally = [0usize; 3];
        for _ in 0..n {
            tally[cross(Genotype::RS, Genotype::RS, &mut rng).index()] += 1;
        }

        let rr = tally[0] as f64 / n as f64;
        let rs = tally[1] as f64 / n as f64;
        let ss = tally[2] as f64 / n as f64;
        assert!((0.23..=0.27).contains(&rr), "RR fraction {}", rr);
        assert!((0.48..=0.52).contains(&rs), "RS fraction {}", rs);
        assert!((0.23..=0.27).contains(&ss), "SS fraction {}", ss);
    }

    #[test]
    fn test_parental_pair_reproduces_genotype() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for genotype in Genotype::ALL {
            let [mother, father] = genotype.parental_pair();
            assert_eq!(cross(mother, father, &mut rng), genotype);
        }
    }
}
