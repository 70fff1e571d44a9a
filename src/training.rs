use crate::config::Config;
use crate::db::{self, GenerationRecord};
use crate::error::{Error, Result};
use crate::evolution::Population;
use crate::game::Game;
use crate::io::save_snake;
use crate::log;
use crate::snake::Snake;
use crate::utils::vec_stats;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use rusqlite::Connection;
use std::time::Instant;
use tracing::{debug, info};

/// Seed of the game played by individual `index` of `generation`.
pub fn episode_seed(base: u64, generation: u32, population_size: usize, index: usize) -> u64 {
    base.wrapping_add((generation as u64).wrapping_mul(population_size as u64))
        .wrapping_add(index as u64)
}

/// Play every individual once, in its own game. Returns when all are done.
pub fn evaluate(
    population: &mut Population<Snake>,
    shape: (usize, usize),
    base_seed: u64,
    generation: u32,
    parallel: bool,
) -> Result<()> {
    let size = population.size();
    let play = |index: usize, snake: &mut Snake| -> Result<()> {
        let mut game = Game::new(shape, Some(episode_seed(base_seed, generation, size, index)))?;
        *snake = game.run_episode(snake.respawned())?;
        Ok(())
    };
    if parallel {
        population
            .individuals
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, snake)| play(i, snake))
    } else {
        population
            .individuals
            .iter_mut()
            .enumerate()
            .try_for_each(|(i, snake)| play(i, snake))
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Mean fitness of every evaluated generation.
    pub mean_fitness: Vec<f64>,
    /// Last evaluated generation.
    pub population: Population<Snake>,
}

impl TrainingReport {
    pub fn fittest(&self) -> Option<&Snake> {
        self.population.fittest()
    }
}

pub struct GeneticAlgorithm {
    config: Config,
    base_seed: u64,
    rng: StdRng,
    history: Option<Connection>,
}

impl GeneticAlgorithm {
    /// Training is always seeded; a missing seed means 0.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let base_seed = config.game.seed.unwrap_or(0);
        let history = match &config.save.history_db {
            Some(path) => Some(db::init_db(path)?),
            None => None,
        };
        Ok(Self { config, base_seed, rng: StdRng::seed_from_u64(base_seed), history })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> Option<&Connection> {
        self.history.as_ref()
    }

    pub fn initial_population(&mut self) -> Result<Population<Snake>> {
        let params = self.config.snake_params();
        let individuals = (0..self.config.genetic.population_size())
            .map(|id| {
                let mut snake = Snake::new(params.clone(), &mut self.rng)?;
                snake.id = id;
                Ok(snake)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Population::new(individuals))
    }

    fn save(&self, population: &Population<Snake>, generation: u32) -> Result<()> {
        let save = &self.config.save;
        if generation % save.save_steps != 0 {
            return Ok(());
        }
        let shape = self.config.game.board_size;
        if save.save_best_individuals {
            if let Some(best) = population.fittest() {
                let path = save_snake(best, shape, &format!("snake_{generation}"), &save.save_dir.join("fittest"))?;
                debug!(path = %path.display(), "saved fittest snake");
            }
        }
        if save.save_generations {
            let dir = save.save_dir.join(format!("generation_{generation}"));
            for (i, snake) in population.individuals.iter().enumerate() {
                save_snake(snake, shape, &format!("snake_{i}"), &dir)?;
            }
            debug!(dir = %dir.display(), "saved generation");
        }
        Ok(())
    }

    fn record(&self, population: &Population<Snake>, generation: u32) -> Result<()> {
        let Some(best) = population.fittest() else {
            return Err(Error::Selection("empty population".into()));
        };
        let stats = vec_stats(&population.fitness());
        info!(
            generation = generation + 1,
            of = self.config.genetic.num_generations,
            best_fitness = best.fitness,
            best_score = best.score,
            lifespan = best.lifespan,
            mean_fitness = stats.mean,
            std_fitness = stats.std,
            "generation done"
        );
        log::scalar(generation as u64, "best_fitness", best.fitness);
        log::scalar(generation as u64, "mean_fitness", stats.mean);
        log::scalar(generation as u64, "best_score", best.score as f64);
        if let Some(conn) = &self.history {
            db::insert_generation(
                conn,
                &GenerationRecord {
                    generation,
                    best_fitness: best.fitness,
                    mean_fitness: stats.mean,
                    std_fitness: stats.std,
                    best_score: best.score,
                    best_lifespan: best.lifespan,
                    created_at: String::new(),
                },
            )?;
        }
        Ok(())
    }

    /// Evolve for `num_generations`, starting from `population` or a random one.
    pub fn run(&mut self, population: Option<Population<Snake>>) -> Result<TrainingReport> {
        let mut population = match population {
            Some(p) if !p.is_empty() => p,
            _ => self.initial_population()?,
        };
        let genetic = self.config.genetic.clone();
        let mut breeding = genetic.breeding();
        breeding.elites = breeding.elites.min(breeding.size);
        let shape = self.config.game.board_size;
        let mut mean_fitness = Vec::with_capacity(genetic.num_generations as usize);

        info!(
            size = population.size(),
            generations = genetic.num_generations,
            parallel = genetic.parallel,
            "training started"
        );
        for generation in 0..genetic.num_generations {
            let started = Instant::now();
            evaluate(&mut population, shape, self.base_seed, generation, genetic.parallel)?;
            mean_fitness.push(population.mean_fitness());
            self.record(&population, generation)?;
            self.save(&population, generation)?;
            debug!(elapsed = ?started.elapsed(), "generation timing");

            if generation + 1 == genetic.num_generations {
                break;
            }
            let mut next = population.next_generation(&breeding, &mut self.rng)?;
            for (id, snake) in next.iter_mut().enumerate() {
                snake.id = id;
            }
            population = Population::new(next);
        }

        if let Some(best) = population.fittest() {
            info!(fitness = best.fitness, score = best.score, lifespan = best.lifespan, "training done");
        }
        Ok(TrainingReport { mean_fitness, population })
    }
}
