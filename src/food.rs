use crate::error::{Error, Result};
use crate::grid::{Cell, Grid, Item};
use rand::Rng;
use rand::seq::SliceRandom;

/// Place an apple on a uniformly random empty cell.
///
/// Scans the whole grid on every call.
pub fn respawn<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Result<Cell> {
    let free = grid.empty_coords();
    let &coord = free.choose(rng).ok_or(Error::NoEmptyCell)?;
    let apple = Cell::new(coord, Item::Apple);
    grid.set_cell(apple);
    Ok(apple)
}
