//! Client-mirrored deterministic food RNG.
//!
//! Food outcomes are defined by structural inputs (seed, food count, probe
//! index), not by evolving RNG state, so client and server agree without
//! exchanging stream positions. The generator itself is the one the browser
//! ships; it is weak as randomness but replay breaks if either side changes
//! it, so any replacement must be deployed in lockstep.

use crate::types::Cell;

/// Deterministic value in [0, 1) from a single integer.
///
/// Reference algorithm: `fract(sin(n) * 10000)`.
pub fn unit_rand(n: u32) -> f64 {
    let x = (n as f64).sin() * 10000.0;
    x - x.floor()
}

/// Place the next food for a snake occupying `occupied` cells.
///
/// Probe k draws x from `unit_rand(seed + food_eaten + k)` and y from the
/// following index; k advances by one per occupied collision. After `grid²`
/// probes the last candidate is returned even if occupied (the board is
/// effectively full and the game is about to end anyway).
pub fn spawn_food(seed: u32, food_eaten: u32, grid: i32, occupied: &[Cell]) -> Cell {
    let max_probes = (grid as u32).saturating_mul(grid as u32);
    let mut k: u32 = 0;
    loop {
        let n = seed.wrapping_add(food_eaten).wrapping_add(k);
        let x = (unit_rand(n) * grid as f64).floor() as i32;
        let y = (unit_rand(n.wrapping_add(1)) * grid as f64).floor() as i32;
        let cell = Cell::new(x, y);
        if !occupied.contains(&cell) || k >= max_probes {
            return cell;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_rand_is_deterministic_and_in_range() {
        for n in [0u32, 1, 42, 7, 0xFFFF_FFFF] {
            let a = unit_rand(n);
            let b = unit_rand(n);
            assert_eq!(a.to_bits(), b.to_bits(), "non-deterministic for n={n}");
            assert!((0.0..1.0).contains(&a), "out of range for n={n}: {a}");
        }
    }

    #[test]
    fn spawn_food_lands_on_grid() {
        for seed in [0u32, 42, 7, 123_456] {
            let c = spawn_food(seed, 0, 30, &[]);
            assert!((0..30).contains(&c.x) && (0..30).contains(&c.y), "{c:?}");
        }
    }

    #[test]
    fn spawn_food_probes_past_occupied_cells() {
        let seed = 42;
        let first = spawn_food(seed, 0, 30, &[]);
        let second = spawn_food(seed, 0, 30, &[first]);
        assert_ne!(first, second);
    }

    #[test]
    fn spawn_food_gives_up_on_a_full_board() {
        // 2x2 grid fully occupied: must still return a cell, not spin.
        let occupied = [
            Cell::new(0, 0),
            Cell::new(0, 1),
            Cell::new(1, 0),
            Cell::new(1, 1),
        ];
        let c = spawn_food(9, 3, 2, &occupied);
        assert!((0..2).contains(&c.x) && (0..2).contains(&c.y));
    }
}
