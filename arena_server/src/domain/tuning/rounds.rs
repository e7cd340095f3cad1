//! Gameplay tuning for the three round kinds.
//!
//! Values are fixed per kind; a resource only carries its remaining round count.
use crate::domain::entities::RoundKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundProfile {
    /// Damage dealt on hit.
    pub power: u32,

    /// Distance in pixels a round may travel before it is spent.
    pub range: f64,

    /// Rounds a freshly planted pack of this kind carries.
    pub starting_rounds: u32,
}

pub fn profile(kind: RoundKind) -> RoundProfile {
    match kind {
        RoundKind::Rapid => RoundProfile {
            power: 2,
            range: 500.0,
            starting_rounds: 25,
        },
        // Split rounds leave the barrel three at a time in a narrow spread.
        RoundKind::Split => RoundProfile {
            power: 5,
            range: 300.0,
            starting_rounds: 12,
        },
        RoundKind::Ballistic => RoundProfile {
            power: 8,
            range: 700.0,
            starting_rounds: 6,
        },
    }
}
