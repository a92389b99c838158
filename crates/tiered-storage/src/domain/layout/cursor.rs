use super::DirLayout;

/// Position of the next write inside a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirCursor {
    pub k_index: u64,
    pub dir_index: u64,
    /// Block files currently in the leaf directory.
    pub dir_block_count: u64,
}

impl DirCursor {
    pub fn new(k_index: u64, dir_index: u64, dir_block_count: u64) -> Self {
        Self {
            k_index,
            dir_index,
            dir_block_count,
        }
    }

    /// The current leaf directory can take one more block.
    ///
    /// A leaf fills up to exactly `dcl` files: the check runs before the
    /// write, so the count after any write is at most `dcl`. Comparing
    /// against `dcl - 1` here would cap leaves at `dcl - 1` files.
    pub fn has_room(&self, layout: &DirLayout) -> bool {
        self.dir_block_count < layout.dcl
    }

    /// Leaf directory following the current one, wrapping K at `DCL`.
    pub fn next_slot(&self, layout: &DirLayout) -> (u64, u64) {
        if self.dir_index + 1 < layout.dcl {
            (self.k_index, self.dir_index + 1)
        } else {
            ((self.k_index + 1) % layout.dcl, 0)
        }
    }

    /// Contents of `index.state`.
    pub fn encode_state(&self) -> String {
        format!("{}\n{}", self.k_index, self.dir_index)
    }

    /// Parse `index.state`. Out-of-range indexes are rejected.
    pub fn decode_state(content: &str, layout: &DirLayout) -> Option<(u64, u64)> {
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let k_index = lines.next()?.parse::<u64>().ok()?;
        let dir_index = lines.next()?.parse::<u64>().ok()?;

        (k_index < layout.dcl && dir_index < layout.dcl).then_some((k_index, dir_index))
    }
}
