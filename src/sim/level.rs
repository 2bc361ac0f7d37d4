//! Chapter 1 level layout and generation

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Grid columns
pub const GRID_WIDTH: usize = 20;
/// Grid rows
pub const GRID_HEIGHT: usize = 15;
/// Rows 0..SKULL_ROWS are skull
pub const SKULL_ROWS: usize = 2;

/// Number of vessel segments per level
pub const VESSEL_SEGMENTS: usize = 5;
/// Vessels never reach the bottom row
const VESSEL_ROW_LIMIT: usize = GRID_HEIGHT - 1;
/// Rows at the top kept clear below the source
const ENTRY_ROWS: usize = 3;

/// A cell coordinate, column `x` and row `y` (row 0 at the top)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: usize,
    pub y: usize,
}

impl GridPos {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn in_grid(&self) -> bool {
        self.x < GRID_WIDTH && self.y < GRID_HEIGHT
    }

    /// Row-major index into a full grid
    pub fn index(&self) -> usize {
        self.y * GRID_WIDTH + self.x
    }
}

/// Source column, target cell and vessel obstacles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub source_column: usize,
    pub target: GridPos,
    pub vessels: Vec<GridPos>,
}

impl Default for LevelLayout {
    fn default() -> Self {
        Self {
            source_column: 10,
            target: GridPos::new(10, 12),
            vessels: Vec::new(),
        }
    }
}

impl LevelLayout {
    /// Roll a new level
    ///
    /// Vessels are kept out of the 3x3 block around the target, so there
    /// is always room for a nanoparticle next to it, and out of the entry
    /// channel below the source.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let source_column = rng.random_range(5..=14);
        let target = GridPos::new(rng.random_range(2..=17), rng.random_range(10..=13));

        let mut layout = Self {
            source_column,
            target,
            vessels: Vec::new(),
        };

        for _ in 0..VESSEL_SEGMENTS {
            let start_x: usize = rng.random_range(1..=18);
            let start_y: usize = rng.random_range(3..=11);
            let length: usize = rng.random_range(2..=5);
            let horizontal = rng.random_bool(0.4);

            for j in 0..length {
                let pos = if horizontal {
                    GridPos::new(start_x + j, start_y)
                } else {
                    GridPos::new(start_x, start_y + j)
                };
                if pos.x < GRID_WIDTH
                    && pos.y < VESSEL_ROW_LIMIT
                    && !layout.in_safe_zone(pos)
                    && !layout.vessels.contains(&pos)
                {
                    layout.vessels.push(pos);
                }
            }
        }

        log::debug!(
            "Generated level: source col {}, target ({}, {}), {} vessel cells",
            layout.source_column,
            layout.target.x,
            layout.target.y,
            layout.vessels.len()
        );
        layout
    }

    pub fn in_safe_zone(&self, pos: GridPos) -> bool {
        let near_target =
            pos.x.abs_diff(self.target.x) <= 1 && pos.y.abs_diff(self.target.y) <= 1;
        let entry_channel = pos.x.abs_diff(self.source_column) <= 1 && pos.y <= ENTRY_ROWS;
        near_target || entry_channel
    }

    pub fn is_vessel(&self, pos: GridPos) -> bool {
        self.vessels.contains(&pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::random::RngState;
    use proptest::prelude::*;

    #[test]
    fn test_default_layout() {
        let layout = LevelLayout::default();
        assert_eq!(layout.source_column, 10);
        assert_eq!(layout.target, GridPos::new(10, 12));
        assert!(layout.vessels.is_empty());
    }

    #[test]
    fn test_safe_zone_shape() {
        let layout = LevelLayout::default();
        assert!(layout.in_safe_zone(GridPos::new(9, 11)));
        assert!(layout.in_safe_zone(GridPos::new(11, 13)));
        assert!(!layout.in_safe_zone(GridPos::new(12, 12)));
        assert!(layout.in_safe_zone(GridPos::new(11, 3)));
        assert!(!layout.in_safe_zone(GridPos::new(11, 4)));
        assert!(!layout.in_safe_zone(GridPos::new(8, 2)));
    }

    #[test]
    fn test_grid_index() {
        assert_eq!(GridPos::new(0, 0).index(), 0);
        assert_eq!(GridPos::new(19, 14).index(), GRID_WIDTH * GRID_HEIGHT - 1);
        assert!(!GridPos::new(20, 0).in_grid());
    }

    proptest! {
        #[test]
        fn prop_generated_levels_respect_bounds(seed in any::<u64>()) {
            let mut rng = RngState::new(seed).to_rng();
            let layout = LevelLayout::generate(&mut rng);

            prop_assert!((5..=14).contains(&layout.source_column));
            prop_assert!((2..=17).contains(&layout.target.x));
            prop_assert!((10..=13).contains(&layout.target.y));

            for (i, v) in layout.vessels.iter().enumerate() {
                prop_assert!(v.x < GRID_WIDTH && v.y < GRID_HEIGHT - 1);
                prop_assert!(!layout.in_safe_zone(*v));
                prop_assert!(!layout.vessels[i + 1..].contains(v));
            }
        }
    }
}
