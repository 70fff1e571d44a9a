use crate::error::{Error, Result};
use crate::network::{FeedForwardNetwork, Matrix, Params};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type carried by a chromosome's genes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneKind {
    #[default]
    Real,
    /// Whole numbers; gaussian noise is rounded before it is added.
    Integer,
    /// 0/1 genes; mutation flips bits.
    Binary,
}

/// Gaussian mutation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutation {
    pub rate: f64,
    pub mu: f64,
    pub sigma: f64,
}

/// Flat gene vector tagged with the tensor it came from (`W_1`, `b_2`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    id: String,
    genes: Vec<f64>,
    kind: GeneKind,
    pub enable_crossover: bool,
}

impl Chromosome {
    pub fn new(id: impl Into<String>, genes: Vec<f64>) -> Self {
        Self { id: id.into(), genes, kind: GeneKind::Real, enable_crossover: true }
    }

    pub fn integer(id: impl Into<String>, genes: Vec<f64>) -> Result<Self> {
        if genes.iter().any(|g| g.fract() != 0.0) {
            return Err(Error::InvalidChromosome("integer chromosome holds fractional genes".into()));
        }
        Ok(Self { id: id.into(), genes, kind: GeneKind::Integer, enable_crossover: true })
    }

    pub fn binary(id: impl Into<String>, genes: Vec<f64>) -> Result<Self> {
        if genes.iter().any(|&g| g != 0.0 && g != 1.0) {
            return Err(Error::InvalidChromosome(
                "the chromosome does not code binary information in its genes".into(),
            ));
        }
        Ok(Self { id: id.into(), genes, kind: GeneKind::Binary, enable_crossover: true })
    }

    pub fn with_crossover(mut self, enable: bool) -> Self {
        self.enable_crossover = enable;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub fn kind(&self) -> GeneKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    fn with_genes(&self, genes: Vec<f64>) -> Self {
        Self { genes, ..self.clone() }
    }

    /// Each gene mutates independently with probability `rate`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, mutation: &Mutation, rng: &mut R) -> Result<()> {
        let normal = Normal::new(mutation.mu, mutation.sigma)
            .map_err(|e| Error::InvalidConfig(format!("gaussian mutation: {e}")))?;
        for g in &mut self.genes {
            if rng.r#gen::<f64>() >= mutation.rate {
                continue;
            }
            match self.kind {
                GeneKind::Real => *g += normal.sample(rng),
                GeneKind::Integer => *g += normal.sample(rng).round(),
                GeneKind::Binary => *g = 1.0 - *g,
            }
        }
        Ok(())
    }
}

/// Flatten every weight and bias tensor into its own chromosome.
pub fn encode(network: &FeedForwardNetwork) -> Vec<Chromosome> {
    network
        .params()
        .named()
        .into_iter()
        .map(|(name, m)| Chromosome::new(name, m.as_slice().to_vec()))
        .collect()
}

/// Reshape chromosomes back into network parameters.
pub fn decode(chromosomes: &[Chromosome], layer_sizes: &[usize]) -> Result<Params> {
    let expected = 2 * layer_sizes.len().saturating_sub(1);
    if chromosomes.len() != expected {
        return Err(Error::ChromosomeCount { expected, actual: chromosomes.len() });
    }
    let mut named = BTreeMap::new();
    for c in chromosomes {
        let m = Matrix::from_flat(c.id(), c.len(), 1, c.genes.clone())?;
        named.insert(c.id.clone(), m);
    }
    Params::from_named(&named, layer_sizes)
}

pub fn mutate_all<R: Rng + ?Sized>(
    chromosomes: &mut [Chromosome],
    mutation: &Mutation,
    rng: &mut R,
) -> Result<()> {
    for c in chromosomes {
        c.mutate(mutation, rng)?;
    }
    Ok(())
}

/// Spread factor for one uniform draw `u` in [0, 1).
pub fn sbx_gamma(u: f64, eta: f64) -> f64 {
    let exponent = 1.0 / (eta + 1.0);
    if u <= 0.5 {
        (2.0 * u).powf(exponent)
    } else {
        (1.0 / (2.0 * (1.0 - u))).powf(exponent)
    }
}

/// Simulated binary crossover of two gene vectors with given uniform draws.
pub fn sbx_genes(g1: &[f64], g2: &[f64], draws: &[f64], eta: f64) -> (Vec<f64>, Vec<f64>) {
    let mut c1 = Vec::with_capacity(g1.len());
    let mut c2 = Vec::with_capacity(g1.len());
    for ((a, b), u) in g1.iter().zip(g2).zip(draws) {
        let gamma = sbx_gamma(*u, eta);
        c1.push(0.5 * ((1.0 + gamma) * a + (1.0 - gamma) * b));
        c2.push(0.5 * ((1.0 - gamma) * a + (1.0 + gamma) * b));
    }
    (c1, c2)
}

fn check_pair(index: usize, a: &Chromosome, b: &Chromosome) -> Result<()> {
    if a.kind != b.kind {
        return Err(Error::CrossoverMismatch {
            index,
            reason: format!("{:?} vs {:?} genes", a.kind, b.kind),
        });
    }
    if a.len() != b.len() {
        return Err(Error::CrossoverMismatch {
            index,
            reason: format!("{} vs {} genes", a.len(), b.len()),
        });
    }
    Ok(())
}

fn check_parents(p1: &[Chromosome], p2: &[Chromosome]) -> Result<()> {
    if p1.len() != p2.len() {
        return Err(Error::ChromosomeCount { expected: p1.len(), actual: p2.len() });
    }
    p1.iter().zip(p2).enumerate().try_for_each(|(i, (a, b))| check_pair(i, a, b))
}

/// SBX on every crossover-enabled chromosome pair. Binary chromosomes fall
/// back to a single-point cut; disabled ones are copied unchanged.
pub fn crossover_simulated_binary<R: Rng + ?Sized>(
    p1: &[Chromosome],
    p2: &[Chromosome],
    eta: f64,
    rng: &mut R,
) -> Result<(Vec<Chromosome>, Vec<Chromosome>)> {
    check_parents(p1, p2)?;
    let mut child1 = Vec::with_capacity(p1.len());
    let mut child2 = Vec::with_capacity(p2.len());
    for (a, b) in p1.iter().zip(p2) {
        let (c1, c2) = if !(a.enable_crossover && b.enable_crossover) {
            (a.clone(), b.clone())
        } else if a.kind == GeneKind::Binary {
            single_point(a, b, rng)
        } else {
            let draws: Vec<f64> = (0..a.len()).map(|_| rng.r#gen::<f64>()).collect();
            let (mut g1, mut g2) = sbx_genes(&a.genes, &b.genes, &draws, eta);
            if a.kind == GeneKind::Integer {
                g1.iter_mut().chain(g2.iter_mut()).for_each(|g| *g = g.round());
            }
            (a.with_genes(g1), b.with_genes(g2))
        };
        child1.push(c1);
        child2.push(c2);
    }
    Ok((child1, child2))
}

/// One random cut per chromosome pair, suffixes swapped.
pub fn crossover_single_point<R: Rng + ?Sized>(
    p1: &[Chromosome],
    p2: &[Chromosome],
    rng: &mut R,
) -> Result<(Vec<Chromosome>, Vec<Chromosome>)> {
    check_parents(p1, p2)?;
    let mut child1 = Vec::with_capacity(p1.len());
    let mut child2 = Vec::with_capacity(p2.len());
    for (a, b) in p1.iter().zip(p2) {
        let (c1, c2) = if a.enable_crossover && b.enable_crossover {
            single_point(a, b, rng)
        } else {
            (a.clone(), b.clone())
        };
        child1.push(c1);
        child2.push(c2);
    }
    Ok((child1, child2))
}

fn single_point<R: Rng + ?Sized>(a: &Chromosome, b: &Chromosome, rng: &mut R) -> (Chromosome, Chromosome) {
    if a.is_empty() {
        return (a.clone(), b.clone());
    }
    let cut = rng.gen_range(0..a.len());
    let (g1, g2) = swap_suffix(&a.genes, &b.genes, cut);
    (a.with_genes(g1), b.with_genes(g2))
}

/// Children keep their own prefix `[..cut]` and take the other parent's suffix.
pub fn swap_suffix(g1: &[f64], g2: &[f64], cut: usize) -> (Vec<f64>, Vec<f64>) {
    let mut c1 = g1[..cut].to_vec();
    c1.extend_from_slice(&g2[cut..]);
    let mut c2 = g2[..cut].to_vec();
    c2.extend_from_slice(&g1[cut..]);
    (c1, c2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Activation;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn encode_decode_is_lossless() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let depth = rng.gen_range(2..5);
            let sizes: Vec<usize> = (0..depth).map(|_| rng.gen_range(1..12)).collect();
            let net = FeedForwardNetwork::new(sizes.clone(), Activation::Relu, &mut rng).unwrap();
            let chromosomes = encode(&net);
            assert_eq!(chromosomes.len(), 2 * (sizes.len() - 1));
            assert_eq!(chromosomes[0].id(), "W_1");
            assert_eq!(chromosomes[1].id(), "b_1");
            let params = decode(&chromosomes, &sizes).unwrap();
            assert_eq!(&params, net.params());
        }
    }

    #[test]
    fn decode_rejects_wrong_sizes() {
        let mut rng = StdRng::seed_from_u64(6);
        let net = FeedForwardNetwork::new(vec![4, 3, 2], Activation::Relu, &mut rng).unwrap();
        let mut chromosomes = encode(&net);
        chromosomes[0] = Chromosome::new("W_1", vec![0.0; 11]);
        assert!(matches!(
            decode(&chromosomes, &[4, 3, 2]),
            Err(Error::ShapeMismatch { expected: 12, actual: 11, .. })
        ));
        chromosomes.pop();
        assert!(matches!(decode(&chromosomes, &[4, 3, 2]), Err(Error::ChromosomeCount { .. })));
    }

    #[test]
    fn sbx_children_preserve_parent_sums() {
        let g1 = [0.5, -1.25, 3.0, 10.0];
        let g2 = [2.0, 0.75, -3.0, 10.0];
        let draws = [0.1, 0.5, 0.93, 0.999];
        let (c1, c2) = sbx_genes(&g1, &g2, &draws, 100.0);
        for k in 0..4 {
            assert!((c1[k] + c2[k] - (g1[k] + g2[k])).abs() < 1e-12);
        }
    }

    #[test]
    fn sbx_gamma_is_one_at_the_midpoint() {
        assert_eq!(sbx_gamma(0.5, 3.0), 1.0);
        assert!(sbx_gamma(0.1, 3.0) < 1.0);
        assert!(sbx_gamma(0.9, 3.0) > 1.0);
    }

    #[test]
    fn single_point_swaps_suffixes() {
        let (c1, c2) = swap_suffix(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], 1);
        assert_eq!(c1, vec![1.0, 6.0, 7.0, 8.0]);
        assert_eq!(c2, vec![5.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn crossover_checks_parent_layouts() {
        let mut rng = StdRng::seed_from_u64(8);
        let p1 = vec![Chromosome::binary("x", vec![0.0, 1.0]).unwrap()];
        let p2 = vec![Chromosome::new("x", vec![0.3, 0.1])];
        assert!(matches!(
            crossover_single_point(&p1, &p2, &mut rng),
            Err(Error::CrossoverMismatch { index: 0, .. })
        ));
        let p3 = vec![Chromosome::new("x", vec![0.3]), Chromosome::new("y", vec![0.3])];
        assert!(matches!(
            crossover_simulated_binary(&p2, &p3, 10.0, &mut rng),
            Err(Error::ChromosomeCount { .. })
        ));
    }

    #[test]
    fn disabled_chromosomes_are_copied() {
        let mut rng = StdRng::seed_from_u64(9);
        let p1 = vec![Chromosome::new("a", vec![1.0; 5]).with_crossover(false)];
        let p2 = vec![Chromosome::new("a", vec![2.0; 5])];
        let (c1, c2) = crossover_simulated_binary(&p1, &p2, 2.0, &mut rng).unwrap();
        assert_eq!(c1, p1);
        assert_eq!(c2, p2);
    }

    #[test]
    fn binary_genes_stay_binary() {
        let mut rng = StdRng::seed_from_u64(10);
        assert!(Chromosome::binary("b", vec![0.0, 0.5]).is_err());
        let mut c = Chromosome::binary("b", vec![0.0; 64]).unwrap();
        let mutation = Mutation { rate: 0.5, mu: 0.0, sigma: 1.0 };
        c.mutate(&mutation, &mut rng).unwrap();
        assert!(c.genes().iter().all(|&g| g == 0.0 || g == 1.0));
        assert!(c.genes().iter().any(|&g| g == 1.0));
        let other = Chromosome::binary("b", vec![1.0; 64]).unwrap();
        let (c1, _) = crossover_simulated_binary(&[c], &[other], 100.0, &mut rng).unwrap();
        assert!(c1[0].genes().iter().all(|&g| g == 0.0 || g == 1.0));
    }

    #[test]
    fn integer_mutation_keeps_whole_numbers() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut c = Chromosome::integer("i", vec![3.0; 50]).unwrap();
        c.mutate(&Mutation { rate: 1.0, mu: 0.0, sigma: 4.0 }, &mut rng).unwrap();
        assert!(c.genes().iter().all(|g| g.fract() == 0.0));
    }

    #[test]
    fn zero_rate_leaves_genes_alone() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut c = Chromosome::new("r", vec![0.25; 30]);
        c.mutate(&Mutation { rate: 0.0, mu: 0.0, sigma: 1.0 }, &mut rng).unwrap();
        assert!(c.genes().iter().all(|&g| g == 0.25));

        // every draw is exactly 0.0
        let mut zeros = rand::rngs::mock::StepRng::new(0, 0);
        let mut b = Chromosome::binary("b", vec![1.0; 8]).unwrap();
        b.mutate(&Mutation { rate: 0.0, mu: 0.0, sigma: 1.0 }, &mut zeros).unwrap();
        assert!(b.genes().iter().all(|&g| g == 1.0));
    }
}
