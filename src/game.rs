use crate::error::{Error, Result};
use crate::evolution::Individual;
use crate::food;
use crate::grid::{Cell, Coord, Grid, Item};
use crate::snake::{Direction, Snake};
use crate::vision::FullVision;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Grid plus the apples on it and the game's random source.
#[derive(Debug, Clone)]
pub struct Board {
    pub grid: Grid,
    pub apples: Vec<Cell>,
    pub rng: StdRng,
}

impl Board {
    pub fn add_apple(&mut self) -> Result<Cell> {
        let apple = food::respawn(&mut self.grid, &mut self.rng)?;
        self.apples.push(apple);
        Ok(apple)
    }

    /// Forget an apple; the grid cell is left to the caller.
    pub fn remove_apple(&mut self, coord: Coord) {
        self.apples.retain(|a| a.coord != coord);
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// World hosting snakes on a walled grid.
#[derive(Debug, Clone)]
pub struct Game {
    shape: (usize, usize),
    seed: Option<u64>,
    board: Board,
    snakes: Vec<Snake>,
}

impl Game {
    pub fn new(shape: (usize, usize), seed: Option<u64>) -> Result<Self> {
        if shape.0 < 3 || shape.1 < 3 {
            return Err(Error::InvalidConfig(format!("board {shape:?} is smaller than 3x3")));
        }
        let board = Board { grid: Grid::with_walls(shape), apples: Vec::new(), rng: make_rng(seed) };
        Ok(Self { shape, seed, board, snakes: Vec::new() })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Change the seed used by the next [`start`](Self::start).
    pub fn reseed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn grid(&self) -> &Grid {
        &self.board.grid
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn snakes(&self) -> &[Snake] {
        &self.snakes
    }

    pub fn snake(&self, index: usize) -> Option<&Snake> {
        self.snakes.get(index)
    }

    pub fn snake_mut(&mut self, index: usize) -> Option<&mut Snake> {
        self.snakes.get_mut(index)
    }

    pub fn is_running(&self) -> bool {
        self.snakes.iter().any(Snake::is_alive)
    }

    /// Back to an empty walled grid with no snakes or apples.
    pub fn clean(&mut self) {
        self.board.grid.reset();
        self.board.apples.clear();
        self.snakes.clear();
    }

    /// Begin a new episode with `snake` as the only player.
    pub fn start(&mut self, mut snake: Snake) -> Result<()> {
        self.clean();
        self.board.rng = make_rng(self.seed);
        snake.spawn(&mut self.board)?;
        snake.seed = self.seed;
        self.board.add_apple()?;
        snake.update_vision(&self.board.grid);
        // fills the activation cache for the first frame
        snake.next_direction(self.shape);
        tracing::debug!(id = snake.id, seed = ?self.seed, "episode started");
        self.snakes.push(snake);
        Ok(())
    }

    /// Replace every apple with a single one at `coord`.
    pub fn set_apple(&mut self, coord: Coord) -> Result<()> {
        if !self.board.grid.get(coord).is_some_and(|c| c.is_empty()) {
            return Err(Error::InvalidConfig(format!("cannot place an apple on {coord:?}")));
        }
        for apple in self.board.apples.drain(..) {
            self.board.grid.set(apple.coord, Item::Empty);
        }
        let apple = Cell::new(coord, Item::Apple);
        self.board.grid.set_cell(apple);
        self.board.apples.push(apple);
        Ok(())
    }

    /// Move every living snake along its current direction.
    /// Returns whether any snake is still alive.
    pub fn step(&mut self) -> Result<bool> {
        let mut any_alive = false;
        for snake in &mut self.snakes {
            if !snake.is_alive() {
                continue;
            }
            if snake.step(&mut self.board)? {
                any_alive = true;
            } else {
                snake.calculate_fitness();
                snake.kill(&mut self.board.grid);
            }
        }
        Ok(any_alive)
    }

    /// Let each living snake's network pick its direction, then step.
    pub fn step_ai(&mut self) -> Result<bool> {
        for snake in &mut self.snakes {
            if snake.is_alive() {
                let direction = snake.next_direction(self.shape);
                snake.set_direction(direction);
            }
        }
        self.step()
    }

    /// Play `snake` until it dies and hand it back with its fitness set.
    pub fn run_episode(&mut self, snake: Snake) -> Result<Snake> {
        self.start(snake)?;
        while self.step_ai()? {}
        let snake = self.snakes.pop().ok_or_else(|| Error::InvalidConfig("episode lost its snake".into()))?;
        tracing::trace!(
            id = snake.id,
            score = snake.score,
            lifespan = snake.lifespan,
            fitness = snake.fitness,
            "episode finished"
        );
        self.clean();
        Ok(snake)
    }

    /// Read-only copy of everything a renderer needs for one frame.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.board.grid.clone(),
            apples: self.board.apples.iter().map(|a| a.coord).collect(),
            snakes: self
                .snakes
                .iter()
                .map(|s| SnakeView {
                    id: s.id,
                    body: s.body.iter().map(|c| c.coord).collect(),
                    direction: s.direction,
                    alive: s.is_alive(),
                    score: s.score,
                    lifespan: s.lifespan,
                    hunger: s.hunger,
                    vision: s.vision.clone(),
                    activations: s.network().activations().to_vec(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnakeView {
    pub id: usize,
    /// Tail first, head last.
    pub body: Vec<Coord>,
    pub direction: Direction,
    pub alive: bool,
    pub score: u32,
    pub lifespan: u32,
    pub hunger: u32,
    pub vision: FullVision,
    pub activations: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub grid: Grid,
    pub apples: Vec<Coord>,
    pub snakes: Vec<SnakeView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::SnakeParams;

    fn snake(seed: u64) -> Snake {
        let params = SnakeParams { length: 3, hidden_layers: vec![8], ..SnakeParams::default() };
        Snake::new(params, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn start_places_body_and_one_apple() {
        let mut game = Game::new((10, 10), Some(3)).unwrap();
        game.start(snake(1)).unwrap();
        assert_eq!(game.grid().count(Item::Snake), 3);
        assert_eq!(game.grid().count(Item::Apple), 1);
        assert_eq!(game.board().apples.len(), 1);
        let s = &game.snakes()[0];
        assert_eq!(s.vision.rays().len(), 8);
        assert_eq!(s.network().activations().len(), 3);
        assert_eq!(s.seed, Some(3));
    }

    #[test]
    fn clean_restores_the_empty_board() {
        let mut game = Game::new((7, 9), Some(4)).unwrap();
        game.start(snake(2)).unwrap();
        game.clean();
        assert_eq!(game.grid(), &Grid::with_walls((7, 9)));
        assert!(game.snakes().is_empty());
        assert!(game.board().apples.is_empty());
    }

    #[test]
    fn episodes_terminate_and_replay_identically() {
        let mut game = Game::new((10, 10), Some(11)).unwrap();
        let a = game.run_episode(snake(5)).unwrap();
        let b = game.run_episode(snake(5)).unwrap();
        assert!(a.death.is_some());
        assert!(a.lifespan <= a.params.lifespan_max + 1);
        assert_eq!((a.score, a.lifespan, a.fitness), (b.score, b.lifespan, b.fitness));
        assert_eq!(game.grid(), &Grid::with_walls((10, 10)));
    }

    #[test]
    fn dead_snakes_leave_the_grid() {
        let mut game = Game::new((10, 10), Some(6)).unwrap();
        game.start(snake(3)).unwrap();
        game.snake_mut(0).unwrap().set_direction(Direction::Down);
        // straight into its own body
        assert!(!game.step().unwrap());
        assert_eq!(game.grid().count(Item::Snake), 0);
        assert!(game.snakes()[0].fitness > 0.0);
        assert!(!game.is_running());
    }

    #[test]
    fn set_apple_moves_the_only_apple() {
        let mut game = Game::new((10, 10), Some(7)).unwrap();
        game.start(snake(4)).unwrap();
        game.set_apple((1, 1)).unwrap();
        assert_eq!(game.grid().count(Item::Apple), 1);
        assert_eq!(game.grid().query((1, 1)).item, Item::Apple);
        assert!(game.set_apple((0, 0)).is_err());
    }

    #[test]
    fn snapshot_mirrors_the_world() {
        let mut game = Game::new((10, 10), Some(8)).unwrap();
        game.start(snake(6)).unwrap();
        let snap = game.snapshot();
        assert_eq!(snap.grid, *game.grid());
        assert_eq!(snap.snakes[0].body, vec![(7, 5), (6, 5), (5, 5)]);
        assert_eq!(snap.apples.len(), 1);
        assert!(snap.snakes[0].alive);
    }

    #[test]
    fn tiny_boards_are_rejected() {
        assert!(Game::new((2, 5), None).is_err());
    }
}
