use serde::{Deserialize, Serialize};
use std::fmt;

/// (row, col). Signed so that neighbours of border cells can be expressed and rejected.
pub type Coord = (i32, i32);

/// What occupies a cell. The non-empty kinds carry a fixed class index
/// (Wall = 0, Snake = 1, Apple = 2) which the network input layout depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Item {
    Empty,
    Wall,
    Snake,
    Apple,
}

impl Item {
    /// Number of non-empty classes.
    pub const CLASSES: usize = 3;

    pub fn class_index(self) -> Option<usize> {
        match self {
            Item::Empty => None,
            Item::Wall => Some(0),
            Item::Snake => Some(1),
            Item::Apple => Some(2),
        }
    }

    /// Numeric tag used by the persisted format (`Empty` is -1).
    pub fn value(self) -> i32 {
        self.class_index().map_or(-1, |i| i as i32)
    }

    pub fn name(self) -> &'static str {
        match self {
            Item::Empty => "EMPTY",
            Item::Wall => "WALL",
            Item::Snake => "SNAKE",
            Item::Apple => "APPLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub coord: Coord,
    pub item: Item,
}

impl Cell {
    pub fn new(coord: Coord, item: Item) -> Self {
        Self { coord, item }
    }

    pub fn is_empty(&self) -> bool {
        self.item == Item::Empty
    }
}

/// Row-major occupancy grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: (usize, usize),
    items: Vec<Item>,
}

impl Grid {
    /// All-empty grid of `(height, width)`.
    pub fn new(shape: (usize, usize)) -> Self {
        let (height, width) = shape;
        Self { shape, items: vec![Item::Empty; height * width] }
    }

    /// Empty grid surrounded by a ring of walls.
    pub fn with_walls(shape: (usize, usize)) -> Self {
        let mut grid = Self::new(shape);
        grid.add_wall_borders();
        grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn height(&self) -> usize {
        self.shape.0
    }

    pub fn width(&self) -> usize {
        self.shape.1
    }

    pub fn add_wall_borders(&mut self) {
        let (height, width) = self.shape;
        for i in 0..height {
            for j in 0..width {
                if i == 0 || i == height - 1 || j == 0 || j == width - 1 {
                    self.items[i * width + j] = Item::Wall;
                }
            }
        }
    }

    /// Back to all empty plus the wall ring.
    pub fn reset(&mut self) {
        self.items.fill(Item::Empty);
        self.add_wall_borders();
    }

    pub fn is_outside(&self, coord: Coord) -> bool {
        let (i, j) = coord;
        i < 0 || j < 0 || i as usize >= self.shape.0 || j as usize >= self.shape.1
    }

    fn index(&self, coord: Coord) -> usize {
        debug_assert!(!self.is_outside(coord), "coordinate {coord:?} outside grid");
        coord.0 as usize * self.shape.1 + coord.1 as usize
    }

    pub fn query(&self, coord: Coord) -> Cell {
        Cell::new(coord, self.items[self.index(coord)])
    }

    pub fn get(&self, coord: Coord) -> Option<Cell> {
        if self.is_outside(coord) { None } else { Some(self.query(coord)) }
    }

    pub fn set(&mut self, coord: Coord, item: Item) {
        let idx = self.index(coord);
        self.items[idx] = item;
    }

    pub fn set_cell(&mut self, cell: Cell) {
        self.set(cell.coord, cell.item);
    }

    pub fn row(&self, i: usize) -> Vec<Cell> {
        (0..self.shape.1).map(|j| self.query((i as i32, j as i32))).collect()
    }

    pub fn col(&self, j: usize) -> Vec<Cell> {
        (0..self.shape.0).map(|i| self.query((i as i32, j as i32))).collect()
    }

    /// Every empty coordinate, row-major.
    pub fn empty_coords(&self) -> Vec<Coord> {
        let width = self.shape.1;
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| **item == Item::Empty)
            .map(|(idx, _)| ((idx / width) as i32, (idx % width) as i32))
            .collect()
    }

    pub fn count(&self, item: Item) -> usize {
        self.items.iter().filter(|&&it| it == item).count()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (height, width) = self.shape;
        for i in 0..height {
            for j in 0..width {
                let glyph = match self.items[i * width + j] {
                    Item::Wall => "##",
                    Item::Empty => "  ",
                    Item::Apple => " *",
                    Item::Snake => "[]",
                };
                f.write_str(glyph)?;
            }
            if i + 1 < height {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
