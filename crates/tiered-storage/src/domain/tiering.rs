//! # Tiering
//!
//! Storage tiers and the bitmask recording which tiers hold a block.
//!
//! Bit values are part of the persisted record format:
//!
//! | tier | bit |
//! |------|-----|
//! | Warm | 2   |
//! | Hot  | 4   |
//! | Cold | 8   |

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named class of storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Hot,
    Warm,
    Cold,
}

impl TierKind {
    /// Bit used for this tier inside a [`TieringState`].
    pub const fn bit(self) -> u8 {
        match self {
            TierKind::Warm => 2,
            TierKind::Hot => 4,
            TierKind::Cold => 8,
        }
    }

    /// Local tiers keep blocks on sharded volumes.
    pub const fn is_local(self) -> bool {
        matches!(self, TierKind::Hot | TierKind::Warm)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TierKind::Hot => "hot",
            TierKind::Warm => "warm",
            TierKind::Cold => "cold",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask over {Hot, Warm, Cold}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TieringState(u8);

impl TieringState {
    pub const EMPTY: TieringState = TieringState(0);

    pub const fn only(tier: TierKind) -> Self {
        TieringState(tier.bit())
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, tier: TierKind) -> bool {
        self.0 & tier.bit() != 0
    }

    pub fn insert(&mut self, tier: TierKind) {
        self.0 |= tier.bit();
    }

    pub fn remove(&mut self, tier: TierKind) {
        self.0 &= !tier.bit();
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Local tier holding the block, preferring Hot over Warm.
    pub fn local_tier(self) -> Option<TierKind> {
        [TierKind::Hot, TierKind::Warm]
            .into_iter()
            .find(|tier| self.contains(*tier))
    }
}
