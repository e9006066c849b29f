const WINDOW: u64 = 64;

/// Anti-replay window for the records of one epoch (RFC 6347 4.1.2.6).
///
/// Bit `n` of `seen` stands for sequence number `right_edge - n`. A record
/// only enters the window once it has authenticated, so checking and
/// marking are separate steps.
#[derive(Debug, Default, Clone)]
pub struct ReplayWindow {
    right_edge: Option<u64>,
    seen: u64,
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance below the right edge, `None` when ahead of it.
    fn offset(&self, seq: u64) -> Option<u64> {
        self.right_edge?.checked_sub(seq)
    }

    /// Whether `seq` was already seen or has fallen off the window.
    pub fn is_replay(&self, seq: u64) -> bool {
        match self.offset(seq) {
            None => false,
            Some(offset) if offset >= WINDOW => true,
            Some(offset) => self.seen & (1 << offset) != 0,
        }
    }

    pub fn mark(&mut self, seq: u64) {
        match self.offset(seq) {
            None => {
                let shift = self.right_edge.map_or(WINDOW, |edge| seq - edge);
                self.seen = if shift >= WINDOW { 0 } else { self.seen << shift };
                self.seen |= 1;
                self.right_edge = Some(seq);
            }
            Some(offset) if offset < WINDOW => self.seen |= 1 << offset,
            Some(_) => {}
        }
    }
}
