//! Snake agents driven by small feed-forward networks, evolved with a genetic algorithm.

pub mod config;
pub mod db;
pub mod error;
pub mod event_loop;
pub mod evolution;
pub mod food;
pub mod game;
pub mod game_input;
pub mod genome;
pub mod grid;
pub mod io;
pub mod log;
pub mod network;
pub mod snake;
pub mod training;
pub mod utils;
pub mod vision;

pub use error::{Error, Result};
