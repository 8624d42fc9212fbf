//! Who counts as "around" whom.
//!
//! Map geometry belongs to the world, so the broadcast layer takes the
//! predicate as a parameter instead of computing distances itself.

use crate::Position;

/// A symmetric "are these two tiles near each other" test on one map.
///
/// Any `Fn(Position, Position) -> bool` closure is a `Proximity`.
pub trait Proximity: Send + 'static {
    fn are_around(&self, a: Position, b: Position) -> bool;
}

impl<F> Proximity for F
where
    F: Fn(Position, Position) -> bool + Send + 'static,
{
    fn are_around(&self, a: Position, b: Position) -> bool {
        self(a, b)
    }
}

/// Chebyshev distance check: both axes within `radius` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareRadius(pub u16);

impl Default for SquareRadius {
    fn default() -> Self {
        Self(10)
    }
}

impl Proximity for SquareRadius {
    fn are_around(&self, a: Position, b: Position) -> bool {
        a.x.abs_diff(b.x) <= self.0 && a.y.abs_diff(b.y) <= self.0
    }
}
