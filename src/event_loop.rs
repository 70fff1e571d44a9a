use crate::config::WindowConfig;
use crate::error::Result;
use crate::game::{Game, Snapshot};
use crate::snake::{DeathCause, Direction, Snake};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::info;

const MIN_FPS: u32 = 1;
const MAX_FPS: u32 = 240;

/// Control events produced by a frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Turn(Direction),
    TogglePause,
    Restart,
    ToggleVision,
    ToggleGrid,
    SpeedUp,
    SpeedDown,
    Quit,
}

impl Command {
    /// Keyboard mapping shared by the text frontend: `wasd` turn, `p` pause,
    /// `r` restart, `v` vision, `g` grid, `+`/`-` speed, `q` quit.
    pub fn from_key(key: char) -> Option<Command> {
        match key.to_ascii_lowercase() {
            'w' => Some(Command::Turn(Direction::Up)),
            'a' => Some(Command::Turn(Direction::Left)),
            's' => Some(Command::Turn(Direction::Down)),
            'd' => Some(Command::Turn(Direction::Right)),
            'p' | ' ' => Some(Command::TogglePause),
            'r' => Some(Command::Restart),
            'v' => Some(Command::ToggleVision),
            'g' => Some(Command::ToggleGrid),
            '+' => Some(Command::SpeedUp),
            '-' => Some(Command::SpeedDown),
            'q' => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Display state owned by the session, handed to the frontend with each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub show_grid: bool,
    pub show_vision: bool,
    pub paused: bool,
    pub fps: u32,
    pub episode: usize,
}

/// Render/input boundary. Frontends only ever see snapshots.
pub trait Frontend {
    fn draw(&mut self, snapshot: &Snapshot, overlay: &Overlay) -> Result<()>;
    /// Commands received since the last call.
    fn poll(&mut self) -> Result<Vec<Command>>;
    /// Pace the loop.
    fn wait(&mut self, fps: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pilot {
    /// The network picks every move.
    Network,
    /// Turn commands steer; the snake keeps going straight otherwise.
    Human,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub score: u32,
    pub lifespan: u32,
    pub fitness: f64,
    pub death: Option<DeathCause>,
}

enum Outcome {
    Finished(EpisodeSummary),
    Restart,
    Quit,
}

/// Interactive play or replay of one snake on one board.
pub struct PlaySession {
    game: Game,
    snake: Snake,
    pilot: Pilot,
    overlay: Overlay,
}

impl PlaySession {
    pub fn new(game: Game, snake: Snake, pilot: Pilot, window: &WindowConfig) -> Self {
        let overlay = Overlay {
            show_grid: window.show_grid,
            show_vision: window.show_vision,
            paused: false,
            fps: window.fps_play.clamp(MIN_FPS, MAX_FPS),
            episode: 0,
        };
        Self { game, snake, pilot, overlay }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Play episodes until the frontend quits or `max_episodes` have ended.
    pub fn run<F: Frontend>(&mut self, frontend: &mut F, max_episodes: Option<usize>) -> Result<Vec<EpisodeSummary>> {
        let mut summaries = Vec::new();
        while max_episodes.is_none_or(|max| summaries.len() < max) {
            self.overlay.episode = summaries.len() + 1;
            self.overlay.paused = false;
            match self.play_episode(frontend)? {
                Outcome::Finished(summary) => {
                    info!(
                        episode = self.overlay.episode,
                        score = summary.score,
                        lifespan = summary.lifespan,
                        death = ?summary.death,
                        "episode over"
                    );
                    summaries.push(summary);
                }
                Outcome::Restart => continue,
                Outcome::Quit => break,
            }
        }
        Ok(summaries)
    }

    fn play_episode<F: Frontend>(&mut self, frontend: &mut F) -> Result<Outcome> {
        self.game.start(self.snake.respawned())?;
        loop {
            for command in frontend.poll()? {
                match command {
                    Command::Quit => return Ok(Outcome::Quit),
                    Command::Restart => return Ok(Outcome::Restart),
                    Command::TogglePause => self.overlay.paused = !self.overlay.paused,
                    Command::ToggleGrid => self.overlay.show_grid = !self.overlay.show_grid,
                    Command::ToggleVision => self.overlay.show_vision = !self.overlay.show_vision,
                    Command::SpeedUp => self.overlay.fps = (self.overlay.fps * 2).min(MAX_FPS),
                    Command::SpeedDown => self.overlay.fps = (self.overlay.fps / 2).max(MIN_FPS),
                    Command::Turn(direction) => self.turn(direction),
                }
            }

            frontend.draw(&self.game.snapshot(), &self.overlay)?;
            if !self.overlay.paused {
                let alive = match self.pilot {
                    Pilot::Network => self.game.step_ai()?,
                    Pilot::Human => self.game.step()?,
                };
                if !alive {
                    frontend.draw(&self.game.snapshot(), &self.overlay)?;
                    let summary = self
                        .game
                        .snake(0)
                        .map(|s| EpisodeSummary {
                            score: s.score,
                            lifespan: s.lifespan,
                            fitness: s.fitness,
                            death: s.death,
                        })
                        .unwrap_or(EpisodeSummary { score: 0, lifespan: 0, fitness: 0.0, death: None });
                    return Ok(Outcome::Finished(summary));
                }
            }
            frontend.wait(self.overlay.fps);
        }
    }

    /// Human turns; reversing into the neck is ignored.
    fn turn(&mut self, direction: Direction) {
        if self.pilot != Pilot::Human {
            return;
        }
        if let Some(snake) = self.game.snake_mut(0) {
            let neck = snake.len().checked_sub(2).and_then(|i| snake.body.get(i));
            let head = snake.head();
            if let (Some(neck), Some(head)) = (neck, head) {
                if direction.step(head.coord) == neck.coord {
                    return;
                }
            }
            snake.set_direction(direction);
        }
    }
}

/// Renders frames as text. Commands come from a script, from line input, or nowhere.
pub struct TextFrontend<W: Write> {
    out: W,
    input: Option<Box<dyn BufRead>>,
    script: VecDeque<Vec<Command>>,
    realtime: bool,
}

impl<W: Write> TextFrontend<W> {
    pub fn new(out: W) -> Self {
        Self { out, input: None, script: VecDeque::new(), realtime: false }
    }

    /// Read one line of keys per frame from `input`.
    pub fn with_input(mut self, input: Box<dyn BufRead>) -> Self {
        self.input = Some(input);
        self
    }

    /// Queue commands, one batch per frame.
    pub fn with_script(mut self, script: Vec<Vec<Command>>) -> Self {
        self.script = script.into();
        self
    }

    /// Sleep between frames according to the fps.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Frontend for TextFrontend<W> {
    fn draw(&mut self, snapshot: &Snapshot, overlay: &Overlay) -> Result<()> {
        if overlay.show_grid {
            let header: String = (0..snapshot.grid.width()).map(|j| format!("{:>2}", j % 100)).collect();
            writeln!(self.out, "{header}")?;
        }
        writeln!(self.out, "{}", snapshot.grid)?;
        for view in &snapshot.snakes {
            writeln!(
                self.out,
                "episode {} | score {} | lifespan {} | hunger {} | {}{}",
                overlay.episode,
                view.score,
                view.lifespan,
                view.hunger,
                if view.alive { "alive" } else { "dead" },
                if overlay.paused { " | paused" } else { "" },
            )?;
            if overlay.show_vision {
                for (k, ray) in view.vision.rays().iter().enumerate() {
                    let seen: Vec<String> =
                        ray.nearest_cells.iter().map(|c| format!("{}@{:?}", c.item.name(), c.coord)).collect();
                    writeln!(self.out, "  ray {k} {:>5.1}°: {}", ray.angle, seen.join(" "))?;
                }
            }
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<Command>> {
        if let Some(batch) = self.script.pop_front() {
            return Ok(batch);
        }
        let Some(input) = self.input.as_mut() else {
            return Ok(Vec::new());
        };
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            self.input = None;
            return Ok(vec![Command::Quit]);
        }
        Ok(line.chars().filter_map(Command::from_key).collect())
    }

    fn wait(&mut self, fps: u32) {
        if self.realtime {
            std::thread::sleep(Duration::from_secs_f64(1.0 / fps.max(MIN_FPS) as f64));
        }
    }
}
