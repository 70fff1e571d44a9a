use crate::error::{Error, Result};
use crate::evolution::Population;
use crate::grid::{Coord, Item};
use crate::network::{Activation, Matrix, Params};
use crate::snake::{Placement, Snake, SnakeParams};
use crate::vision::VisionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BodyCell {
    pub coord: Coord,
    pub item: Item,
    pub value: i32,
}

fn default_rotate_vision() -> bool {
    true
}

/// On-disk form of a snake.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnakeRecord {
    pub id: usize,
    pub game_shape: (usize, usize),
    pub seed: Option<u64>,
    pub score: u32,
    pub lifespan: u32,
    pub lifespan_max: u32,
    pub hunger_max: u32,
    pub length: usize,
    pub vision_mode: usize,
    pub vision_type: VisionType,
    pub nn_hidden_layers: Vec<usize>,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default = "default_rotate_vision")]
    pub rotate_vision: bool,
    pub body: Vec<BodyCell>,
    /// `W_i` / `b_i` tensors as nested rows.
    pub params: BTreeMap<String, Matrix>,
}

impl SnakeRecord {
    pub fn from_snake(snake: &Snake, game_shape: (usize, usize)) -> Self {
        Self {
            id: snake.id,
            game_shape,
            seed: snake.seed,
            score: snake.score,
            lifespan: snake.lifespan,
            lifespan_max: snake.params.lifespan_max,
            hunger_max: snake.params.hunger_max,
            length: snake.params.length,
            vision_mode: snake.params.vision_mode,
            vision_type: snake.params.vision_type,
            nn_hidden_layers: snake.params.hidden_layers.clone(),
            activation: snake.params.activation,
            placement: snake.params.placement,
            rotate_vision: snake.params.rotate_vision,
            body: snake
                .body
                .iter()
                .map(|c| BodyCell { coord: c.coord, item: c.item, value: c.item.value() })
                .collect(),
            params: snake.network().params().to_named(),
        }
    }

    pub fn snake_params(&self) -> SnakeParams {
        SnakeParams {
            length: self.length,
            vision_mode: self.vision_mode,
            vision_type: self.vision_type,
            lifespan_max: self.lifespan_max,
            hunger_max: self.hunger_max,
            hidden_layers: self.nn_hidden_layers.clone(),
            activation: self.activation,
            placement: self.placement,
            rotate_vision: self.rotate_vision,
        }
    }

    /// Rebuild the snake. Episode statistics are carried over for inspection.
    pub fn to_snake(&self) -> Result<Snake> {
        let params = self.snake_params();
        let nn_params = Params::from_named(&self.params, &params.layer_sizes())?;
        let mut snake = Snake::from_params(params, nn_params)?;
        snake.id = self.id;
        snake.seed = self.seed;
        snake.score = self.score;
        snake.lifespan = self.lifespan;
        Ok(snake)
    }
}

fn with_json_ext(filename: &str) -> String {
    if filename.ends_with(".json") { filename.to_string() } else { format!("{filename}.json") }
}

/// Write `snake` as `dir/filename(.json)`, creating `dir` when missing.
pub fn save_snake(snake: &Snake, game_shape: (usize, usize), filename: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(with_json_ext(filename));
    let record = SnakeRecord::from_snake(snake, game_shape);
    let json = serde_json::to_string(&record)?;
    fs::write(&path, json)?;
    Ok(path)
}

pub fn load_record(path: &Path) -> Result<SnakeRecord> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn load_snake(path: &Path) -> Result<Snake> {
    load_record(path)?.to_snake()
}

/// What a network needs from a saved snake, without its episode state.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedParams {
    pub id: usize,
    pub length: usize,
    pub vision_mode: usize,
    pub vision_type: VisionType,
    /// `W_i` / `b_i` tensors, keyed by name.
    pub nn_params: BTreeMap<String, Matrix>,
}

pub fn load_params(path: &Path) -> Result<SavedParams> {
    let record = load_record(path)?;
    Ok(SavedParams {
        id: record.id,
        length: record.length,
        vision_mode: record.vision_mode,
        vision_type: record.vision_type,
        nn_params: record.params,
    })
}

/// `.json` files of a directory in name order.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Population saved as one file per snake. Unreadable files are skipped and
/// returned next to the population.
pub fn load_population(dir: &Path) -> Result<(Population<Snake>, Vec<(PathBuf, Error)>)> {
    let mut individuals = Vec::new();
    let mut failures = Vec::new();
    for path in json_files(dir)? {
        match load_snake(&path) {
            Ok(snake) => individuals.push(snake),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping snake file");
                failures.push((path, e));
            }
        }
    }
    Ok((Population::new(individuals), failures))
}
