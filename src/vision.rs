use crate::grid::{Cell, Coord, Grid, Item};
use crate::utils::round_digits;
use serde::{Deserialize, Serialize};

/// Decimal digits kept on border intersections.
const END_POINT_DIGITS: i32 = 12;

/// How a ray is turned into network features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisionType {
    /// Euclidean distance to the nearest cell of each class, 0 when unseen.
    #[default]
    Distance,
    /// 1 when a class is seen along the ray, 0 otherwise.
    Binary,
}

impl VisionType {
    pub fn as_str(self) -> &'static str {
        match self {
            VisionType::Distance => "distance",
            VisionType::Binary => "binary",
        }
    }
}

/// A single ray cast from `center` at `angle` degrees.
///
/// Angles follow the compass used by [`crate::snake::Direction`]: 0° points
/// toward decreasing rows, 90° toward decreasing columns, 180° toward
/// increasing rows and 270° toward increasing columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Vision {
    pub center: Coord,
    pub angle: f64,
    /// Fractional point where the ray meets the grid border.
    pub end_point: (f64, f64),
    pub end_cell: Cell,
    /// Rasterized cells from center (excluded) to the end cell (included).
    pub visible_cells: Vec<Cell>,
    /// First cell of each non-empty kind, in the order the kinds were met.
    pub nearest_cells: Vec<Cell>,
}

impl Vision {
    pub fn new(grid: &Grid, center: Coord, angle: f64) -> Self {
        let angle = angle.rem_euclid(360.0);
        let end_point = end_point(grid.shape(), center, angle);
        let (h, w) = grid.shape();
        let end_coord = (
            (end_point.0 as i32).clamp(0, h as i32 - 1),
            (end_point.1 as i32).clamp(0, w as i32 - 1),
        );
        let end_cell = grid.query(end_coord);
        let visible_cells = look(grid, center, end_point);
        let nearest_cells = detect(&visible_cells);
        Self { center, angle, end_point, end_cell, visible_cells, nearest_cells }
    }

    /// Nearest visible cell of a given kind, if any.
    pub fn nearest(&self, item: Item) -> Option<&Cell> {
        self.nearest_cells.iter().find(|c| c.item == item)
    }

    /// `[wall, snake, apple]` Euclidean distances from the center, 0 when unseen.
    pub fn to_distances(&self) -> [f64; Item::CLASSES] {
        let mut distances = [0.0; Item::CLASSES];
        for cell in &self.nearest_cells {
            if let Some(idx) = cell.item.class_index() {
                distances[idx] = euclidean(self.center, cell.coord);
            }
        }
        distances
    }

    /// `[wall, snake, apple]` presence flags.
    pub fn to_binary(&self) -> [f64; Item::CLASSES] {
        let mut flags = [0.0; Item::CLASSES];
        for cell in &self.nearest_cells {
            if let Some(idx) = cell.item.class_index() {
                flags[idx] = 1.0;
            }
        }
        flags
    }
}

fn euclidean(a: Coord, b: Coord) -> f64 {
    let di = (a.0 - b.0) as f64;
    let dj = (a.1 - b.1) as f64;
    (di * di + dj * dj).sqrt()
}

/// Intersection of the ray with the grid border.
fn end_point(shape: (usize, usize), center: Coord, angle: f64) -> (f64, f64) {
    let (height, width) = shape;
    let (bottom, right) = ((height - 1) as f64, (width - 1) as f64);
    let (i, j) = (center.0 as f64, center.1 as f64);
    let rad = angle.to_radians();
    let half_pi = std::f64::consts::FRAC_PI_2;
    let pi = std::f64::consts::PI;
    let round = |x: f64| round_digits(x, END_POINT_DIGITS);

    if angle == 0.0 {
        (0.0, j)
    } else if angle < 90.0 {
        let j_end = round(j - rad.tan() * i);
        let i_end = round(i - (half_pi - rad).tan() * j);
        if (0.0..=i).contains(&i_end) { (i_end, 0.0) } else { (0.0, j_end) }
    } else if angle == 90.0 {
        (i, 0.0)
    } else if angle < 180.0 {
        let j_end = round(j - (pi - rad).tan() * (bottom - i));
        let i_end = round(i + (rad - half_pi).tan() * j);
        if (i..=bottom).contains(&i_end) { (i_end, 0.0) } else { (bottom, j_end) }
    } else if angle == 180.0 {
        (bottom, j)
    } else if angle < 270.0 {
        let j_end = round(j + (rad - pi).tan() * (bottom - i));
        let i_end = round(i + (3.0 * half_pi - rad).tan() * (right - j));
        if (i..=bottom).contains(&i_end) { (i_end, right) } else { (bottom, j_end) }
    } else if angle == 270.0 {
        (i, right)
    } else {
        let j_end = round(j + (2.0 * pi - rad).tan() * i);
        let i_end = round(i - (rad - 3.0 * half_pi).tan() * (right - j));
        if (0.0..=i).contains(&i_end) { (i_end, right) } else { (0.0, j_end) }
    }
}

/// Integer line walk (Bresenham) from center to the rounded end point.
fn look(grid: &Grid, center: Coord, end_point: (f64, f64)) -> Vec<Cell> {
    let (mut si, mut sj) = center;
    let ei = end_point.0.round_ties_even() as i32;
    let ej = end_point.1.round_ties_even() as i32;

    let delta_i = (ei - si).abs();
    let delta_j = (ej - sj).abs();
    let sign_i = (ei - si).signum();
    let sign_j = (ej - sj).signum();
    let mut err = delta_i - delta_j;

    let mut cells = Vec::with_capacity((delta_i.max(delta_j)) as usize);
    while si != ei || sj != ej {
        let e2 = 2 * err;
        if e2 >= -delta_j {
            err -= delta_j;
            si += sign_i;
        }
        if e2 <= delta_i {
            err += delta_i;
            sj += sign_j;
        }
        match grid.get((si, sj)) {
            Some(cell) => cells.push(cell),
            None => break,
        }
    }
    cells
}

/// First cell of each non-empty kind along the ray.
fn detect(visible_cells: &[Cell]) -> Vec<Cell> {
    let mut seen = [false; Item::CLASSES];
    let mut nearest = Vec::with_capacity(Item::CLASSES);
    for cell in visible_cells {
        if let Some(idx) = cell.item.class_index() {
            if !seen[idx] {
                seen[idx] = true;
                nearest.push(*cell);
                if nearest.len() == Item::CLASSES {
                    break;
                }
            }
        }
    }
    nearest
}

/// `mode` rays spread evenly around `center`, ray 0 aligned with `bearing`.
#[derive(Debug, Clone, PartialEq)]
pub struct FullVision {
    pub center: Coord,
    pub bearing: f64,
    pub mode: usize,
    rays: Vec<Vision>,
}

impl FullVision {
    pub fn new(grid: &Grid, center: Coord, bearing: f64, mode: usize) -> Self {
        let mut full = Self::detached(center, bearing, mode);
        full.update(grid, center, bearing);
        full
    }

    /// A sensor array that has not looked at any grid yet.
    pub fn detached(center: Coord, bearing: f64, mode: usize) -> Self {
        Self { center, bearing, mode, rays: Vec::new() }
    }

    /// Rebuild every ray from scratch.
    pub fn update(&mut self, grid: &Grid, center: Coord, bearing: f64) {
        self.center = center;
        self.bearing = bearing;
        let theta = 360.0 / self.mode as f64;
        self.rays = (0..self.mode)
            .map(|k| Vision::new(grid, center, bearing + k as f64 * theta))
            .collect();
    }

    pub fn rays(&self) -> &[Vision] {
        &self.rays
    }

    pub fn is_attached(&self) -> bool {
        self.rays.len() == self.mode
    }
}

impl std::ops::Index<usize> for FullVision {
    type Output = Vision;

    fn index(&self, index: usize) -> &Vision {
        &self.rays[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn coords(cells: &[Cell]) -> Vec<Coord> {
        cells.iter().map(|c| c.coord).collect()
    }

    #[test]
    fn right_angles_hit_the_matching_border() {
        let grid = Grid::new((10, 10));
        let center = (5, 3);
        assert_eq!(Vision::new(&grid, center, 0.0).end_point, (0.0, 3.0));
        assert_eq!(Vision::new(&grid, center, 90.0).end_point, (5.0, 0.0));
        assert_eq!(Vision::new(&grid, center, 180.0).end_point, (9.0, 3.0));
        assert_eq!(Vision::new(&grid, center, 270.0).end_point, (5.0, 9.0));
        assert_eq!(Vision::new(&grid, center, 360.0).end_point, (0.0, 3.0));
        assert_eq!(Vision::new(&grid, center, -90.0).end_point, (5.0, 9.0));
    }

    #[test]
    fn diagonals_hit_the_nearest_border() {
        let grid = Grid::new((10, 10));
        let center = (6, 5);
        // up-left: 5 steps reach column 0 at row 1
        assert_eq!(Vision::new(&grid, center, 45.0).end_point, (1.0, 0.0));
        // down-left: 3 steps reach the bottom row at column 2
        assert_eq!(Vision::new(&grid, center, 135.0).end_point, (9.0, 2.0));
        // down-right: 3 steps reach the bottom row at column 8
        assert_eq!(Vision::new(&grid, center, 225.0).end_point, (9.0, 8.0));
        // up-right: 4 steps reach column 9 at row 2
        assert_eq!(Vision::new(&grid, center, 315.0).end_point, (2.0, 9.0));
    }

    #[test]
    fn straight_ray_lists_every_cell_up_to_the_border() {
        let grid = Grid::with_walls((10, 10));
        let vision = Vision::new(&grid, (5, 5), 0.0);
        assert_eq!(coords(&vision.visible_cells), vec![(4, 5), (3, 5), (2, 5), (1, 5), (0, 5)]);
        assert_eq!(vision.end_cell, Cell::new((0, 5), Item::Wall));
        assert_eq!(vision.nearest_cells, vec![Cell::new((0, 5), Item::Wall)]);
        assert_eq!(vision.to_distances(), [5.0, 0.0, 0.0]);
    }

    #[test]
    fn diagonal_ray_steps_diagonally() {
        let grid = Grid::with_walls((10, 10));
        let vision = Vision::new(&grid, (6, 5), 45.0);
        assert_eq!(
            coords(&vision.visible_cells),
            vec![(5, 4), (4, 3), (3, 2), (2, 1), (1, 0)]
        );
    }

    #[test]
    fn nearest_cells_keep_first_of_each_kind() {
        let mut grid = Grid::with_walls((10, 10));
        grid.set((3, 5), Item::Apple);
        grid.set((2, 5), Item::Snake);
        grid.set((1, 5), Item::Apple);
        let vision = Vision::new(&grid, (6, 5), 0.0);
        assert_eq!(
            vision.nearest_cells,
            vec![
                Cell::new((3, 5), Item::Apple),
                Cell::new((2, 5), Item::Snake),
                Cell::new((0, 5), Item::Wall),
            ]
        );
        assert_eq!(vision.to_distances(), [6.0, 4.0, 3.0]);
        assert_eq!(vision.to_binary(), [1.0, 1.0, 1.0]);
        assert_eq!(vision.nearest(Item::Snake).map(|c| c.coord), Some((2, 5)));
    }

    #[test]
    fn every_interior_ray_sees_a_wall() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let h = rng.gen_range(3..30);
            let w = rng.gen_range(3..30);
            let mut grid = Grid::with_walls((h, w));
            for _ in 0..rng.gen_range(0..5) {
                let coord = (rng.gen_range(1..h as i32 - 1), rng.gen_range(1..w as i32 - 1));
                grid.set(coord, if rng.gen_bool(0.5) { Item::Snake } else { Item::Apple });
            }
            let center = (rng.gen_range(1..h as i32 - 1), rng.gen_range(1..w as i32 - 1));
            let angle = rng.gen_range(-720.0..720.0);
            let vision = Vision::new(&grid, center, angle);
            assert!(
                vision.nearest(Item::Wall).is_some(),
                "no wall from {center:?} at {angle} in {h}x{w}"
            );
        }
    }

    #[test]
    fn nearest_entries_are_first_occurrences() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..300 {
            let mut grid = Grid::with_walls((15, 15));
            for _ in 0..20 {
                let coord = (rng.gen_range(1..14), rng.gen_range(1..14));
                grid.set(coord, if rng.gen_bool(0.5) { Item::Snake } else { Item::Apple });
            }
            let center = (rng.gen_range(1..14), rng.gen_range(1..14));
            let vision = Vision::new(&grid, center, rng.gen_range(0.0..360.0));
            let kinds: HashSet<Item> = vision.nearest_cells.iter().map(|c| c.item).collect();
            assert_eq!(kinds.len(), vision.nearest_cells.len());
            for cell in &vision.nearest_cells {
                let first = vision.visible_cells.iter().position(|c| c.item == cell.item);
                let at = vision.visible_cells.iter().position(|c| c == cell);
                assert_eq!(first, at);
            }
        }
    }

    #[test]
    fn full_vision_rays_are_evenly_spaced_from_bearing() {
        let grid = Grid::with_walls((10, 10));
        let full = FullVision::new(&grid, (6, 5), 90.0, 8);
        assert_eq!(full.rays().len(), 8);
        let angles: Vec<f64> = full.rays().iter().map(|r| r.angle).collect();
        assert_eq!(angles, vec![90.0, 135.0, 180.0, 225.0, 270.0, 315.0, 0.0, 45.0]);
        assert_eq!(full[0].end_point, (6.0, 0.0));
    }

    #[test]
    fn update_rebuilds_all_rays() {
        let mut grid = Grid::with_walls((10, 10));
        let mut full = FullVision::new(&grid, (5, 5), 0.0, 4);
        grid.set((2, 2), Item::Apple);
        full.update(&grid, (2, 5), 0.0);
        assert_eq!(full.center, (2, 5));
        assert_eq!(full[1].nearest(Item::Apple).map(|c| c.coord), Some((2, 2)));
    }
}
