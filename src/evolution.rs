use crate::error::{Error, Result};
use crate::genome::{self, Chromosome, Mutation};
use crate::utils::{softmax, vec_stats};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Anything the genetic algorithm can evolve.
pub trait Individual: Clone + Send {
    /// Genome of this individual, one chromosome per parameter tensor.
    fn encode_chromosomes(&self) -> Vec<Chromosome>;

    /// Compute, store and return the fitness of the finished episode.
    fn calculate_fitness(&mut self) -> f64;

    /// Last computed fitness.
    fn fitness(&self) -> f64;

    /// A fresh individual of the same kind built from `chromosomes`.
    fn with_chromosomes(&self, chromosomes: Vec<Chromosome>) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    #[default]
    RouletteWheel,
    Tournament,
}

/// Knobs used to breed one generation into the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breeding {
    /// Population size of the next generation.
    pub size: usize,
    /// Elites copied unchanged.
    pub elites: usize,
    pub selection: SelectionKind,
    pub tournament_size: usize,
    pub probability_sbx: f64,
    pub eta_sbx: f64,
    pub mutation: Mutation,
}

fn by_fitness<I: Individual>(a: &I, b: &I) -> Ordering {
    a.fitness().partial_cmp(&b.fitness()).unwrap_or(Ordering::Equal)
}

#[derive(Debug, Clone)]
pub struct Population<I> {
    pub individuals: Vec<I>,
}

impl<I: Individual> Population<I> {
    pub fn new(individuals: Vec<I>) -> Self {
        Self { individuals }
    }

    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn fitness(&self) -> Vec<f64> {
        self.individuals.iter().map(Individual::fitness).collect()
    }

    pub fn mean_fitness(&self) -> f64 {
        vec_stats(&self.fitness()).mean
    }

    pub fn std_fitness(&self) -> f64 {
        vec_stats(&self.fitness()).std
    }

    /// First individual holding the maximum fitness.
    pub fn fittest(&self) -> Option<&I> {
        self.individuals
            .iter()
            .reduce(|best, ind| if ind.fitness() > best.fitness() { ind } else { best })
    }

    pub fn calculate_fitness(&mut self) {
        for ind in &mut self.individuals {
            ind.calculate_fitness();
        }
    }

    /// Top `k` by descending fitness; equal fitness keeps population order.
    pub fn select_elitism(&self, k: usize) -> Vec<&I> {
        let mut ranked: Vec<&I> = self.individuals.iter().collect();
        ranked.sort_by(|a, b| by_fitness(*b, *a));
        ranked.truncate(k);
        ranked
    }

    /// Sample `n` individuals with replacement. Selection probabilities are a
    /// softmax over the ascending-sorted fitness values.
    pub fn select_roulette_wheel<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<&I>> {
        if self.is_empty() {
            return Err(Error::Selection("empty population".into()));
        }
        let mut ranked: Vec<&I> = self.individuals.iter().collect();
        ranked.sort_by(|a, b| by_fitness(*a, *b));
        let fitness: Vec<f64> = ranked.iter().map(|ind| ind.fitness()).collect();
        if fitness.iter().any(|f| !f.is_finite()) {
            return Err(Error::Selection("non-finite fitness".into()));
        }
        let wheel = WeightedIndex::new(softmax(&fitness))
            .map_err(|e| Error::Selection(format!("roulette wheel: {e}")))?;
        Ok((0..n).map(|_| ranked[wheel.sample(rng)]).collect())
    }

    /// `n` winners of tournaments between `size` uniformly drawn contestants.
    pub fn select_tournament<R: Rng + ?Sized>(
        &self,
        n: usize,
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<&I>> {
        if self.is_empty() || size == 0 {
            return Err(Error::Selection(format!(
                "tournament of {size} over {} individuals",
                self.size()
            )));
        }
        let mut winners = Vec::with_capacity(n);
        for _ in 0..n {
            let mut best = &self.individuals[rng.gen_range(0..self.size())];
            for _ in 1..size {
                let contender = &self.individuals[rng.gen_range(0..self.size())];
                if contender.fitness() > best.fitness() {
                    best = contender;
                }
            }
            winners.push(best);
        }
        Ok(winners)
    }

    pub fn crossover_simulated_binary<R: Rng + ?Sized>(
        &self,
        parent1: &I,
        parent2: &I,
        eta: f64,
        rng: &mut R,
    ) -> Result<(Vec<Chromosome>, Vec<Chromosome>)> {
        genome::crossover_simulated_binary(
            &parent1.encode_chromosomes(),
            &parent2.encode_chromosomes(),
            eta,
            rng,
        )
    }

    pub fn crossover_single_point<R: Rng + ?Sized>(
        &self,
        parent1: &I,
        parent2: &I,
        rng: &mut R,
    ) -> Result<(Vec<Chromosome>, Vec<Chromosome>)> {
        genome::crossover_single_point(&parent1.encode_chromosomes(), &parent2.encode_chromosomes(), rng)
    }

    fn select_pair<R: Rng + ?Sized>(&self, breeding: &Breeding, rng: &mut R) -> Result<(&I, &I)> {
        let parents = match breeding.selection {
            SelectionKind::RouletteWheel => self.select_roulette_wheel(2, rng)?,
            SelectionKind::Tournament => self.select_tournament(2, breeding.tournament_size, rng)?,
        };
        Ok((parents[0], parents[1]))
    }

    /// Elites first, then mutated offspring until `breeding.size` is reached.
    pub fn next_generation<R: Rng + ?Sized>(&self, breeding: &Breeding, rng: &mut R) -> Result<Vec<I>> {
        let mut next = Vec::with_capacity(breeding.size);
        for elite in self.select_elitism(breeding.elites.min(breeding.size)) {
            next.push(elite.with_chromosomes(elite.encode_chromosomes())?);
        }
        while next.len() < breeding.size {
            let (p1, p2) = self.select_pair(breeding, rng)?;
            let (mut c1, mut c2) = if rng.r#gen::<f64>() < breeding.probability_sbx {
                self.crossover_simulated_binary(p1, p2, breeding.eta_sbx, rng)?
            } else {
                self.crossover_single_point(p1, p2, rng)?
            };
            genome::mutate_all(&mut c1, &breeding.mutation, rng)?;
            genome::mutate_all(&mut c2, &breeding.mutation, rng)?;
            next.push(p1.with_chromosomes(c1)?);
            if next.len() < breeding.size {
                next.push(p2.with_chromosomes(c2)?);
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Fitness is the negated squared distance of the genes to a target.
    #[derive(Debug, Clone)]
    struct Toy {
        genes: Vec<f64>,
        fitness: f64,
    }

    impl Toy {
        fn new(genes: Vec<f64>) -> Self {
            let mut toy = Self { genes, fitness: 0.0 };
            toy.calculate_fitness();
            toy
        }
    }

    impl Individual for Toy {
        fn encode_chromosomes(&self) -> Vec<Chromosome> {
            vec![Chromosome::new("x", self.genes.clone())]
        }

        fn calculate_fitness(&mut self) -> f64 {
            let err: f64 = self.genes.iter().map(|g| (g - 3.0).powi(2)).sum();
            self.fitness = 100.0 / (1.0 + err);
            self.fitness
        }

        fn fitness(&self) -> f64 {
            self.fitness
        }

        fn with_chromosomes(&self, chromosomes: Vec<Chromosome>) -> Result<Self> {
            Ok(Toy::new(chromosomes[0].genes().to_vec()))
        }
    }

    fn population(fitness: &[f64]) -> Population<Toy> {
        Population::new(
            fitness
                .iter()
                .enumerate()
                .map(|(i, &f)| Toy { genes: vec![i as f64], fitness: f })
                .collect(),
        )
    }

    fn breeding(size: usize) -> Breeding {
        Breeding {
            size,
            elites: 4,
            selection: SelectionKind::RouletteWheel,
            tournament_size: 3,
            probability_sbx: 0.5,
            eta_sbx: 100.0,
            mutation: Mutation { rate: 0.2, mu: 0.0, sigma: 0.3 },
        }
    }

    #[test]
    fn derived_views_follow_the_individuals() {
        let mut pop = population(&[1.0, 5.0, 3.0, 5.0]);
        assert_eq!(pop.mean_fitness(), 3.5);
        assert_eq!(pop.fittest().unwrap().genes, vec![1.0]);
        pop.individuals[3].fitness = 9.0;
        assert_eq!(pop.fittest().unwrap().genes, vec![3.0]);
        assert!(population(&[]).fittest().is_none());
        assert_eq!(population(&[2.0, 2.0]).std_fitness(), 0.0);
    }

    #[test]
    fn elitism_keeps_the_best_in_stable_order() {
        let pop = population(&[0.5, 8.0, 3.0, 8.0, 1.0, 7.0]);
        let elites = pop.select_elitism(3);
        assert_eq!(elites.len(), 3);
        let ids: Vec<f64> = elites.iter().map(|e| e.genes[0]).collect();
        assert_eq!(ids, vec![1.0, 3.0, 5.0]);
        let worst_kept = elites.iter().map(|e| e.fitness).fold(f64::INFINITY, f64::min);
        let kept: Vec<f64> = ids.clone();
        for ind in &pop.individuals {
            if !kept.contains(&ind.genes[0]) {
                assert!(ind.fitness <= worst_kept);
            }
        }
    }

    #[test]
    fn roulette_wheel_favours_the_fit() {
        let mut rng = StdRng::seed_from_u64(21);
        let pop = population(&[0.1, 0.2, 4.0]);
        let picks = pop.select_roulette_wheel(1000, &mut rng).unwrap();
        let best = picks.iter().filter(|p| p.genes[0] == 2.0).count();
        assert!(best > 800, "best picked {best} times");
        assert!(picks.iter().any(|p| p.genes[0] != 2.0));
    }

    #[test]
    fn roulette_wheel_rejects_nan() {
        let mut rng = StdRng::seed_from_u64(22);
        let pop = population(&[1.0, f64::NAN]);
        assert!(matches!(pop.select_roulette_wheel(2, &mut rng), Err(Error::Selection(_))));
    }

    #[test]
    fn full_tournament_always_finds_the_best() {
        let mut rng = StdRng::seed_from_u64(23);
        let pop = population(&[1.0, 9.0, 2.0]);
        let winners = pop.select_tournament(20, 50, &mut rng).unwrap();
        assert!(winners.iter().all(|w| w.fitness == 9.0));
        assert!(pop.select_tournament(1, 0, &mut rng).is_err());
    }

    #[test]
    fn next_generation_has_the_configured_size() {
        let mut rng = StdRng::seed_from_u64(24);
        let pop = Population::new((0..10).map(|i| Toy::new(vec![i as f64 * 0.5, 1.0])).collect());
        for size in [1, 7, 10, 11] {
            let next = pop.next_generation(&breeding(size), &mut rng).unwrap();
            assert_eq!(next.len(), size);
        }
    }

    #[test]
    fn best_fitness_never_decreases_with_elitism() {
        let mut rng = StdRng::seed_from_u64(25);
        let mut pop = Population::new((0..20).map(|i| Toy::new(vec![i as f64 * 0.1 - 1.0; 3])).collect());
        let mut best = pop.fittest().unwrap().fitness;
        for selection in [SelectionKind::RouletteWheel, SelectionKind::Tournament] {
            for _ in 0..15 {
                let b = Breeding { selection, ..breeding(20) };
                pop = Population::new(pop.next_generation(&b, &mut rng).unwrap());
                let now = pop.fittest().unwrap().fitness;
                assert!(now >= best);
                best = now;
            }
        }
    }
}
