use crate::grid::Item;
use crate::snake::Direction;
use crate::utils::one_hot;
use crate::vision::{FullVision, VisionType};

/// Builds the network input vector from a snake's sensors.
pub struct GameInput;

impl GameInput {
    /// Input layer width for `mode` rays: 3 per ray, then two direction one-hots.
    pub fn size(mode: usize) -> usize {
        Item::CLASSES * mode + 2 * Direction::COUNT
    }

    /// Ray features in ray order, then tail direction one-hot, then current direction one-hot.
    pub fn from_vision(
        vision: &FullVision,
        vision_type: VisionType,
        tail_direction: Direction,
        direction: Direction,
        grid_shape: (usize, usize),
    ) -> Vec<f64> {
        let mut input = Vec::with_capacity(Self::size(vision.mode));
        let scale = diagonal(grid_shape);
        for ray in vision.rays() {
            match vision_type {
                VisionType::Distance => input.extend(ray.to_distances().iter().map(|d| d / scale)),
                VisionType::Binary => input.extend(ray.to_binary()),
            }
        }
        input.extend(one_hot(tail_direction.index(), Direction::COUNT));
        input.extend(one_hot(direction.index(), Direction::COUNT));
        input
    }
}

/// Length of the playable area's diagonal, used to scale distances into [0, 1].
fn diagonal((h, w): (usize, usize)) -> f64 {
    let di = h.saturating_sub(2).max(1) as f64;
    let dj = w.saturating_sub(2).max(1) as f64;
    (di * di + dj * dj).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn layout_is_rays_then_tail_then_heading() {
        let mut grid = Grid::with_walls((10, 10));
        grid.set((2, 5), Item::Apple);
        let vision = FullVision::new(&grid, (5, 5), 0.0, 4);
        let input = GameInput::from_vision(&vision, VisionType::Binary, Direction::Down, Direction::Up, (10, 10));
        assert_eq!(input.len(), GameInput::size(4));
        assert_eq!(input.len(), 20);
        // ray 0 looks up: wall and apple, no snake
        assert_eq!(&input[0..3], &[1.0, 0.0, 1.0]);
        // ray 1 looks left: wall only
        assert_eq!(&input[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&input[12..16], &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&input[16..20], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn distances_are_scaled_by_the_board_diagonal() {
        let grid = Grid::with_walls((10, 10));
        let vision = FullVision::new(&grid, (5, 5), 0.0, 4);
        let input = GameInput::from_vision(&vision, VisionType::Distance, Direction::Up, Direction::Up, (10, 10));
        let scale = (128.0f64).sqrt();
        assert!((input[0] - 5.0 / scale).abs() < 1e-12);
        assert!((input[6] - 4.0 / scale).abs() < 1e-12);
        assert!(input.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
