use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use snake_ga::config::Config;
use snake_ga::event_loop::{Pilot, PlaySession, TextFrontend};
use snake_ga::game::Game;
use snake_ga::io::{load_population, load_record, load_snake, save_snake};
use snake_ga::snake::Snake;
use snake_ga::training::GeneticAlgorithm;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "snake_ga")]
#[command(about = "Evolve and watch neural-network snakes")]
struct Cli {
    /// Default log filter, overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "info")]
    log: String,
    /// Also append log lines to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the genetic algorithm.
    Train {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Start from a saved generation directory.
        #[arg(long)]
        population: Option<PathBuf>,
    },
    /// Watch a snake, or steer one yourself with --human.
    Play {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Saved snake; a random one is used otherwise.
        #[arg(long)]
        snake: Option<PathBuf>,
        #[arg(long)]
        episodes: Option<usize>,
        /// Read `wasd` / `p` / `r` / `v` / `g` / `+` / `-` / `q` lines from stdin.
        #[arg(long, default_value_t = false)]
        human: bool,
    },
    /// Replay the exact episode a saved snake played.
    Replay {
        #[arg(long)]
        snake: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn train(config: Config, population_dir: Option<&Path>) -> Result<()> {
    let population = match population_dir {
        Some(dir) => {
            let (population, failures) = load_population(dir)
                .with_context(|| format!("failed to load population from {}", dir.display()))?;
            if !failures.is_empty() {
                warn!(skipped = failures.len(), "some snakes could not be loaded");
            }
            info!(size = population.size(), dir = %dir.display(), "population loaded");
            Some(population)
        }
        None => None,
    };
    let shape = config.game.board_size;
    let save_dir = config.save.save_dir.clone();
    let mut ga = GeneticAlgorithm::new(config)?;
    let report = ga.run(population)?;
    if let Some(best) = report.fittest() {
        let path = save_snake(best, shape, "best", &save_dir)?;
        info!(path = %path.display(), fitness = best.fitness, "best snake saved");
    }
    Ok(())
}

fn play(config: Config, snake_path: Option<&Path>, episodes: Option<usize>, human: bool) -> Result<()> {
    let snake = match snake_path {
        Some(path) => load_snake(path)
            .with_context(|| format!("failed to load snake from {}", path.display()))?,
        None => {
            let mut rng = match config.game.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Snake::new(config.snake_params(), &mut rng)?
        }
    };
    let game = Game::new(config.game.board_size, config.game.seed)?;
    let pilot = if human { Pilot::Human } else { Pilot::Network };
    let mut frontend = TextFrontend::new(std::io::stdout()).realtime(!human);
    if human {
        let stdin: Box<dyn BufRead> = Box::new(std::io::BufReader::new(std::io::stdin()));
        frontend = frontend.with_input(stdin);
    }
    let mut session = PlaySession::new(game, snake, pilot, &config.window);
    let summaries = session.run(&mut frontend, episodes)?;
    for (k, s) in summaries.iter().enumerate() {
        info!(episode = k + 1, score = s.score, lifespan = s.lifespan, fitness = s.fitness, "played");
    }
    Ok(())
}

fn replay(config: Config, snake_path: &Path) -> Result<()> {
    let record = load_record(snake_path)
        .with_context(|| format!("failed to load snake from {}", snake_path.display()))?;
    let Some(seed) = record.seed else {
        bail!("{} has no seed, its episode cannot be replayed", snake_path.display());
    };
    let snake = record.to_snake()?;
    let game = Game::new(record.game_shape, Some(seed))?;
    let mut frontend = TextFrontend::new(std::io::stdout()).realtime(true);
    let mut session = PlaySession::new(game, snake, Pilot::Network, &config.window);
    let summaries = session.run(&mut frontend, Some(1))?;
    if let Some(s) = summaries.first() {
        info!(
            score = s.score,
            lifespan = s.lifespan,
            recorded_score = record.score,
            recorded_lifespan = record.lifespan,
            "replay finished"
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    snake_ga::log::init(&cli.log, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Train { config, population } => train(load_config(config.as_deref())?, population.as_deref()),
        Commands::Play { config, snake, episodes, human } => {
            play(load_config(config.as_deref())?, snake.as_deref(), episodes, human)
        }
        Commands::Replay { snake, config } => replay(load_config(config.as_deref())?, &snake),
    }
}
