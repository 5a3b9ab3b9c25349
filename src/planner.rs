//! Block-range planning for log scans
//!
//! A first scan looks back `window` blocks from the head, never earlier
//! than the checker's start block. Later scans resume right after the
//! last scanned block.

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Number of blocks covered.
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Always false; a `BlockRange` covers at least one block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Split into consecutive chunks of at most `max_blocks` blocks.
    pub fn pages(&self, max_blocks: u64) -> Pages {
        Pages {
            next: Some(self.from),
            to: self.to,
            step: max_blocks.max(1),
        }
    }
}

/// Iterator over the chunks of a `BlockRange`.
pub struct Pages {
    next: Option<u64>,
    to: u64,
    step: u64,
}

impl Iterator for Pages {
    type Item = BlockRange;

    fn next(&mut self) -> Option<BlockRange> {
        let from = self.next?;
        let to = from.saturating_add(self.step - 1).min(self.to);
        self.next = if to >= self.to { None } else { Some(to + 1) };
        Some(BlockRange { from, to })
    }
}

/// Compute the range to scan.
///
/// Returns `None` when there is nothing new to scan: the cached state
/// already covers `current`, or the start block is still in the future.
pub fn plan_range(
    start_block: u64,
    window: u64,
    current: u64,
    last_scanned: Option<u64>,
) -> Option<BlockRange> {
    let from = match last_scanned {
        Some(last) => last.checked_add(1)?,
        None => start_block.max(current.saturating_sub(window)),
    };
    if from > current {
        return None;
    }
    Some(BlockRange { from, to: current })
}
