use crate::error::{Error, Result};
use crate::evolution::Individual;
use crate::game::Board;
use crate::game_input::GameInput;
use crate::genome::{self, Chromosome, Mutation};
use crate::grid::{Cell, Coord, Grid, Item};
use crate::network::{Activation, FeedForwardNetwork, Params};
use crate::utils::argmax;
use crate::vision::{FullVision, VisionType};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Compass heading. The discriminant order is the network's output order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
}

impl Direction {
    pub const COUNT: usize = 4;
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Left, Direction::Down, Direction::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// Degrees, counter-clockwise from up.
    pub fn angle(self) -> f64 {
        self.index() as f64 * 90.0
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// (row, col) offset of one step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Left => (0, -1),
            Direction::Down => (1, 0),
            Direction::Right => (0, 1),
        }
    }

    pub fn from_delta(delta: (i32, i32)) -> Option<Direction> {
        Self::ALL.into_iter().find(|d| d.delta() == delta)
    }

    pub fn step(self, coord: Coord) -> Coord {
        let (di, dj) = self.delta();
        (coord.0 + di, coord.1 + dj)
    }
}

/// How the initial body is laid out on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Straight vertical body, head at the board center, heading up.
    #[default]
    Centered,
    /// Random self-avoiding walk and a random heading toward a free cell.
    RandomWalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Outside,
    Wall,
    Body,
    /// Lived more than `lifespan_max` steps.
    Old,
    /// Went more than `hunger_max` steps without an apple.
    Starved,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeathCause::Outside => "left the board",
            DeathCause::Wall => "hit a wall",
            DeathCause::Body => "bit itself",
            DeathCause::Old => "died of old age",
            DeathCause::Starved => "starved",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnakeParams {
    pub length: usize,
    pub vision_mode: usize,
    pub vision_type: VisionType,
    pub lifespan_max: u32,
    pub hunger_max: u32,
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
    pub placement: Placement,
    pub rotate_vision: bool,
}

impl Default for SnakeParams {
    fn default() -> Self {
        Self {
            length: 4,
            vision_mode: 8,
            vision_type: VisionType::Distance,
            lifespan_max: 1000,
            hunger_max: 100,
            hidden_layers: vec![20, 12],
            activation: Activation::Relu,
            placement: Placement::Centered,
            rotate_vision: true,
        }
    }
}

impl SnakeParams {
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(GameInput::size(self.vision_mode));
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(Direction::COUNT);
        sizes
    }
}

/// Tries for a random-walk body before giving up.
const PLACEMENT_ATTEMPTS: usize = 100;

/// Agent driven by a feed-forward network. The body runs tail to head
/// (`body.back()` is the head).
#[derive(Debug, Clone)]
pub struct Snake {
    pub id: usize,
    /// Seed of the game the snake last played in.
    pub seed: Option<u64>,
    pub params: SnakeParams,
    pub direction: Direction,
    pub tail_direction: Direction,
    pub body: VecDeque<Cell>,
    pub vision: FullVision,
    network: FeedForwardNetwork,
    pub score: u32,
    pub lifespan: u32,
    pub hunger: u32,
    pub fitness: f64,
    pub death: Option<DeathCause>,
}

impl Snake {
    /// New snake with a freshly initialized network.
    pub fn new<R: Rng + ?Sized>(params: SnakeParams, rng: &mut R) -> Result<Self> {
        let network = FeedForwardNetwork::new(params.layer_sizes(), params.activation, rng)?;
        Ok(Self::with_network(params, network))
    }

    pub fn from_params(params: SnakeParams, nn_params: Params) -> Result<Self> {
        let network = FeedForwardNetwork::with_params(params.layer_sizes(), nn_params, params.activation)?;
        Ok(Self::with_network(params, network))
    }

    pub fn from_chromosomes(params: SnakeParams, chromosomes: &[Chromosome]) -> Result<Self> {
        let nn_params = genome::decode(chromosomes, &params.layer_sizes())?;
        Self::from_params(params, nn_params)
    }

    fn with_network(params: SnakeParams, network: FeedForwardNetwork) -> Self {
        let vision = FullVision::detached((0, 0), 0.0, params.vision_mode);
        Self {
            id: 0,
            seed: None,
            params,
            direction: Direction::Up,
            tail_direction: Direction::Down,
            body: VecDeque::new(),
            vision,
            network,
            score: 0,
            lifespan: 0,
            hunger: 0,
            fitness: 0.0,
            death: None,
        }
    }

    pub fn network(&self) -> &FeedForwardNetwork {
        &self.network
    }

    pub fn head(&self) -> Option<Cell> {
        self.body.back().copied()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn is_alive(&self) -> bool {
        self.death.is_none() && !self.body.is_empty()
    }

    pub fn bearing(&self) -> f64 {
        if self.params.rotate_vision { self.direction.angle() } else { 0.0 }
    }

    /// Same genome, blank episode state.
    pub fn respawned(&self) -> Self {
        let mut snake = Self::with_network(self.params.clone(), self.network.clone());
        snake.id = self.id;
        snake
    }

    /// Lay out a new body on the board and mark it as snake cells.
    pub fn spawn(&mut self, board: &mut Board) -> Result<()> {
        let (body, direction) = match self.params.placement {
            Placement::Centered => centered_body(&board.grid, self.params.length)?,
            Placement::RandomWalk => random_walk_body(&board.grid, self.params.length, &mut board.rng)?,
        };
        for cell in &body {
            board.grid.set_cell(*cell);
        }
        self.body = body;
        self.direction = direction;
        self.score = 0;
        self.lifespan = 0;
        self.hunger = 0;
        self.fitness = 0.0;
        self.death = None;
        self.tail_direction = self.compute_tail_direction();
        self.update_vision(&board.grid);
        Ok(())
    }

    /// Direction from the last tail cell to the one in front of it.
    pub fn compute_tail_direction(&self) -> Direction {
        match (self.body.front(), self.body.get(1)) {
            (Some(a), Some(b)) => {
                let delta = (b.coord.0 - a.coord.0, b.coord.1 - a.coord.1);
                Direction::from_delta(delta).unwrap_or(self.direction)
            }
            _ => self.direction,
        }
    }

    pub fn update_vision(&mut self, grid: &Grid) {
        if let Some(head) = self.head() {
            let bearing = self.bearing();
            self.vision.update(grid, head.coord, bearing);
        }
    }

    pub fn compute_input(&self, grid_shape: (usize, usize)) -> Vec<f64> {
        GameInput::from_vision(
            &self.vision,
            self.params.vision_type,
            self.tail_direction,
            self.direction,
            grid_shape,
        )
    }

    /// Network decision for the current sensors. Ties go to the first direction.
    pub fn next_direction(&mut self, grid_shape: (usize, usize)) -> Direction {
        let input = self.compute_input(grid_shape);
        let output = self.network.forward(&input);
        Direction::from_index(argmax(&output)).unwrap_or(self.direction)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn die(&mut self, cause: DeathCause) -> Result<bool> {
        tracing::trace!(id = self.id, score = self.score, lifespan = self.lifespan, %cause, "snake died");
        self.death = Some(cause);
        Ok(false)
    }

    /// Advance one cell in the current direction. Returns whether the snake is still alive.
    pub fn step(&mut self, board: &mut Board) -> Result<bool> {
        if self.death.is_some() {
            return Ok(false);
        }
        let Some(head) = self.head() else {
            return Ok(false);
        };
        let next = self.direction.step(head.coord);
        let Some(target) = board.grid.get(next) else {
            return self.die(DeathCause::Outside);
        };

        let ate = match target.item {
            Item::Wall => return self.die(DeathCause::Wall),
            Item::Snake => return self.die(DeathCause::Body),
            Item::Apple => {
                let new_head = Cell::new(next, Item::Snake);
                board.grid.set_cell(new_head);
                self.body.push_back(new_head);
                board.remove_apple(next);
                board.add_apple()?;
                self.score += 1;
                self.hunger = 0;
                true
            }
            Item::Empty => {
                let new_head = Cell::new(next, Item::Snake);
                board.grid.set_cell(new_head);
                self.body.push_back(new_head);
                if let Some(tail) = self.body.pop_front() {
                    board.grid.set(tail.coord, Item::Empty);
                }
                false
            }
        };

        self.tail_direction = self.compute_tail_direction();
        self.update_vision(&board.grid);

        self.lifespan += 1;
        if !ate {
            self.hunger += 1;
        }
        if self.lifespan > self.params.lifespan_max {
            return self.die(DeathCause::Old);
        }
        if self.hunger > self.params.hunger_max {
            return self.die(DeathCause::Starved);
        }
        Ok(true)
    }

    /// Clear the body from the grid.
    pub fn kill(&mut self, grid: &mut Grid) {
        for cell in &self.body {
            if grid.query(cell.coord).item == Item::Snake {
                grid.set(cell.coord, Item::Empty);
            }
        }
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, mutation: &Mutation, rng: &mut R) -> Result<()> {
        let mut chromosomes = self.encode_chromosomes();
        genome::mutate_all(&mut chromosomes, mutation, rng)?;
        let nn_params = genome::decode(&chromosomes, self.network.layer_sizes())?;
        self.network =
            FeedForwardNetwork::with_params(self.network.layer_sizes().to_vec(), nn_params, self.params.activation)?;
        Ok(())
    }
}

/// Reward for apples and survival, with a penalty on long lives that eat little.
pub fn fitness(score: u32, lifespan: u32) -> f64 {
    let score = score as f64;
    let lifespan = lifespan as f64;
    let f = lifespan + (2f64.powf(score) + score.powf(2.1) * 500.0)
        - (0.25 * lifespan).powf(1.3) * score.powf(1.2);
    f.max(0.1)
}

impl Individual for Snake {
    fn encode_chromosomes(&self) -> Vec<Chromosome> {
        genome::encode(&self.network)
    }

    fn calculate_fitness(&mut self) -> f64 {
        self.fitness = fitness(self.score, self.lifespan);
        self.fitness
    }

    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn with_chromosomes(&self, chromosomes: Vec<Chromosome>) -> Result<Self> {
        let mut snake = Snake::from_chromosomes(self.params.clone(), &chromosomes)?;
        snake.id = self.id;
        Ok(snake)
    }
}

fn check_free(grid: &Grid, coord: Coord) -> Result<()> {
    match grid.get(coord) {
        Some(cell) if cell.is_empty() => Ok(()),
        _ => Err(Error::BodyOutsideGrid(coord)),
    }
}

fn centered_body(grid: &Grid, length: usize) -> Result<(VecDeque<Cell>, Direction)> {
    let (mid_row, mid_col) = ((grid.height() / 2) as i32, (grid.width() / 2) as i32);
    let mut body = VecDeque::with_capacity(length);
    for k in (0..length as i32).rev() {
        let coord = (mid_row + k, mid_col);
        check_free(grid, coord)?;
        body.push_back(Cell::new(coord, Item::Snake));
    }
    Ok((body, Direction::Up))
}

fn random_walk_body<R: Rng + ?Sized>(
    grid: &Grid,
    length: usize,
    rng: &mut R,
) -> Result<(VecDeque<Cell>, Direction)> {
    let free = grid.empty_coords();
    if free.is_empty() {
        return Err(Error::NoEmptyCell);
    }
    'attempt: for _ in 0..PLACEMENT_ATTEMPTS {
        let Some(&head) = free.choose(rng) else {
            return Err(Error::NoEmptyCell);
        };
        // walk away from the head; cells[0] is the head
        let mut cells = vec![head];
        while cells.len() < length {
            let last = cells[cells.len() - 1];
            let options: Vec<Coord> = Direction::ALL
                .iter()
                .map(|d| d.step(last))
                .filter(|&c| grid.get(c).is_some_and(|cell| cell.is_empty()) && !cells.contains(&c))
                .collect();
            match options.choose(rng) {
                Some(&c) => cells.push(c),
                None => continue 'attempt,
            }
        }
        let headings: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|d| {
                let c = d.step(head);
                grid.get(c).is_some_and(|cell| cell.is_empty()) && !cells.contains(&c)
            })
            .collect();
        let Some(&direction) = headings.choose(rng) else {
            continue;
        };
        let body = cells.into_iter().rev().map(|c| Cell::new(c, Item::Snake)).collect();
        return Ok((body, direction));
    }
    serpentine_body(grid, length)
}

/// Boustrophedon path over the interior, row by row.
fn serpentine_path(grid: &Grid) -> Vec<Coord> {
    let (h, w) = (grid.height() as i32, grid.width() as i32);
    let mut path = Vec::new();
    for (k, i) in (1..h - 1).enumerate() {
        let cols: Vec<i32> = if k % 2 == 0 { (1..w - 1).collect() } else { (1..w - 1).rev().collect() };
        path.extend(cols.into_iter().map(|j| (i, j)));
    }
    path
}

/// First run of `length + 1` empty cells along the serpentine path: the body
/// plus a free cell ahead of the head.
fn serpentine_body(grid: &Grid, length: usize) -> Result<(VecDeque<Cell>, Direction)> {
    if length == 0 {
        return Err(Error::InvalidConfig("snake length must be at least 1".into()));
    }
    let path = serpentine_path(grid);
    for window in path.windows(length + 1) {
        if !window.iter().all(|&c| grid.query(c).is_empty()) {
            continue;
        }
        let head = window[length - 1];
        let ahead = window[length];
        let Some(direction) = Direction::from_delta((ahead.0 - head.0, ahead.1 - head.1)) else {
            continue;
        };
        let body = window[..length].iter().map(|&c| Cell::new(c, Item::Snake)).collect();
        return Ok((body, direction));
    }
    Err(Error::NoEmptyCell)
}
