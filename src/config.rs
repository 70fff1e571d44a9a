use crate::error::Error;
use crate::evolution::{Breeding, SelectionKind};
use crate::genome::Mutation;
use crate::network::Activation;
use crate::snake::{Placement, SnakeParams};
use crate::vision::VisionType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub board_size: (usize, usize),
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { board_size: (15, 15), seed: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnakeConfig {
    pub length: usize,
    pub vision_mode: usize,
    pub vision_type: VisionType,
    pub lifespan_max: u32,
    pub hunger_max: u32,
    pub placement: Placement,
    pub rotate_vision: bool,
}

impl Default for SnakeConfig {
    fn default() -> Self {
        let p = SnakeParams::default();
        Self {
            length: p.length,
            vision_mode: p.vision_mode,
            vision_type: p.vision_type,
            lifespan_max: p.lifespan_max,
            hunger_max: p.hunger_max,
            placement: p.placement,
            rotate_vision: p.rotate_vision,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { hidden_layers: vec![20, 12], activation: Activation::Relu }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneticConfig {
    pub num_generations: u32,
    /// Elites carried over unchanged.
    pub num_parents: usize,
    pub num_offspring: usize,
    pub selection: SelectionKind,
    pub tournament_size: usize,
    pub probability_sbx: f64,
    pub eta_sbx: f64,
    pub mutation_rate: f64,
    pub gaussian_mu: f64,
    pub gaussian_std: f64,
    pub parallel: bool,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            num_generations: 100,
            num_parents: 50,
            num_offspring: 450,
            selection: SelectionKind::RouletteWheel,
            tournament_size: 50,
            probability_sbx: 0.5,
            eta_sbx: 100.0,
            mutation_rate: 0.05,
            gaussian_mu: 0.0,
            gaussian_std: 0.2,
            parallel: true,
        }
    }
}

impl GeneticConfig {
    pub fn population_size(&self) -> usize {
        self.num_parents + self.num_offspring
    }

    pub fn mutation(&self) -> Mutation {
        Mutation { rate: self.mutation_rate, mu: self.gaussian_mu, sigma: self.gaussian_std }
    }

    pub fn breeding(&self) -> Breeding {
        Breeding {
            size: self.population_size(),
            elites: self.num_parents,
            selection: self.selection,
            tournament_size: self.tournament_size,
            probability_sbx: self.probability_sbx,
            eta_sbx: self.eta_sbx,
            mutation: self.mutation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SaveConfig {
    pub save_best_individuals: bool,
    pub save_generations: bool,
    /// Save every `save_steps` generations.
    pub save_steps: u32,
    pub save_dir: PathBuf,
    pub history_db: Option<PathBuf>,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_best_individuals: true,
            save_generations: false,
            save_steps: 10,
            save_dir: PathBuf::from("saves"),
            history_db: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub fps_play: u32,
    pub fps_train: u32,
    pub show_grid: bool,
    pub show_vision: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { fps_play: 10, fps_train: 60, show_grid: true, show_vision: false }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub snake: SnakeConfig,
    pub network: NetworkConfig,
    pub genetic: GeneticConfig,
    pub save: SaveConfig,
    pub window: WindowConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        config.validate().with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    pub fn snake_params(&self) -> SnakeParams {
        SnakeParams {
            length: self.snake.length,
            vision_mode: self.snake.vision_mode,
            vision_type: self.snake.vision_type,
            lifespan_max: self.snake.lifespan_max,
            hunger_max: self.snake.hunger_max,
            hidden_layers: self.network.hidden_layers.clone(),
            activation: self.network.activation,
            placement: self.snake.placement,
            rotate_vision: self.snake.rotate_vision,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_owned()));
        let (h, w) = self.game.board_size;
        if h < 3 || w < 3 {
            return invalid("board_size must be at least 3x3");
        }
        if self.snake.length == 0 {
            return invalid("snake length must be at least 1");
        }
        let interior = (h - 2) * (w - 2);
        let room = match self.snake.placement {
            // head on the middle row, body hanging down to the bottom wall
            Placement::Centered => h - 1 - h / 2,
            // one interior cell stays free ahead of the head
            Placement::RandomWalk => interior - 1,
        };
        if self.snake.length > room {
            return invalid("snake length does not fit inside the walls");
        }
        if self.snake.length >= interior {
            return invalid("snake length leaves no free cell for the apple");
        }
        if self.snake.vision_mode == 0 {
            return invalid("vision_mode must be greater than zero");
        }
        if self.network.hidden_layers.contains(&0) {
            return invalid("hidden layers must not be empty");
        }
        let g = &self.genetic;
        if g.population_size() == 0 {
            return invalid("population size must be greater than zero");
        }
        if g.num_parents > g.population_size() {
            return invalid("num_parents exceeds the population size");
        }
        for (name, p) in [("probability_sbx", g.probability_sbx), ("mutation_rate", g.mutation_rate)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("{name} must be in [0, 1]")));
            }
        }
        if !g.gaussian_std.is_finite() || g.gaussian_std < 0.0 {
            return invalid("gaussian_std must be finite and >= 0");
        }
        if !g.eta_sbx.is_finite() || g.eta_sbx < 0.0 {
            return invalid("eta_sbx must be finite and >= 0");
        }
        if g.tournament_size == 0 {
            return invalid("tournament_size must be greater than zero");
        }
        if self.save.save_steps == 0 {
            return invalid("save_steps must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.genetic.population_size(), 500);
        assert_eq!(config.snake_params().layer_sizes(), vec![32, 20, 12, 4]);
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            [game]
            board_size = [10, 12]
            seed = 7

            [snake]
            vision_type = "binary"
            placement = "random_walk"

            [genetic]
            selection = "tournament"
            num_parents = 5
            num_offspring = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.game.board_size, (10, 12));
        assert_eq!(config.game.seed, Some(7));
        assert_eq!(config.snake.vision_type, VisionType::Binary);
        assert_eq!(config.snake.placement, Placement::RandomWalk);
        assert_eq!(config.snake.length, 4);
        assert_eq!(config.genetic.selection, SelectionKind::Tournament);
        assert_eq!(config.genetic.breeding().size, 20);
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn bundled_config_parses() {
        let config = Config::from_toml_str(include_str!("../snake_ga.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.game.seed, Some(42));
        assert_eq!(config.save.history_db, Some(PathBuf::from("saves/history.db")));
        assert_eq!(config.genetic, GeneticConfig::default());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.game.board_size = (2, 10);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.genetic.mutation_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.genetic.num_offspring = 0;
        config.genetic.num_parents = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.snake.length = 20;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.save.save_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn random_walk_keeps_a_cell_ahead_of_the_head() {
        let mut config = Config::default();
        config.game.board_size = (4, 4);
        config.snake.placement = Placement::RandomWalk;
        config.snake.length = 4;
        assert!(config.validate().is_err());
        config.snake.length = 3;
        config.validate().unwrap();

        let mut config = Config::default();
        config.game.board_size = (3, 3);
        config.snake.length = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snake.toml");
        std::fs::write(&path, "[genetic]\nprobability_sbx = 2.0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("snake.toml"));
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
