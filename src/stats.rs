// Running counters; they only grow, `since` turns two snapshots into a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
    pub purged: u64,
    // thrown away at teardown
    pub discarded: u64,
}

impl QueueStats {
    pub fn since(&self, earlier: &QueueStats) -> QueueStats {
        QueueStats {
            queued: self.queued.saturating_sub(earlier.queued),
            dropped: self.dropped.saturating_sub(earlier.dropped),
            delivered: self.delivered.saturating_sub(earlier.delivered),
            failed: self.failed.saturating_sub(earlier.failed),
            purged: self.purged.saturating_sub(earlier.purged),
            discarded: self.discarded.saturating_sub(earlier.discarded),
        }
    }
}
