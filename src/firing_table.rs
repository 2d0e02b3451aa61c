use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::types::KernelError;

pub const TICKS_PER_SECOND: usize = 1000;

/// Compact spike log for one simulated second.
///
/// Spikes of unit-delay groups land in the D1 table, spikes of multi-delay
/// groups in the D2 table. The companion time tables hold cumulative counts
/// per millisecond: `time[ms + max_delay + 1] - time[ms + max_delay]` is the
/// number of spikes emitted during tick `ms`; slots `[0, max_delay]` hold the
/// carry-over of the previous second.
///
/// Entry stores and loads are relaxed: all writers reserve disjoint ranges via
/// the atomic tail, and readers only run after the host barrier.
pub struct FiringTables {
    max_delay: usize,
    max_spikes_d1: usize,
    max_spikes_d2: usize,
    table_d1: Vec<AtomicU32>,
    table_d2: Vec<AtomicU32>,
    time_d1: Vec<AtomicU32>,
    time_d2: Vec<AtomicU32>,
    sec_count_d1: AtomicUsize,
    sec_count_d2: AtomicUsize,
}

/// Per-second spike counts captured by the boundary pass, before reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondBoundaryCounts {
    pub d1_last_second: usize,
    pub d2_last_second: usize,
    pub d2_carried: usize,
}

impl FiringTables {
    pub fn new(max_delay: usize, max_spikes_d1: usize, max_spikes_d2: usize) -> Self {
        let time_table_len = TICKS_PER_SECOND + max_delay + 1;

        Self {
            max_delay,
            max_spikes_d1,
            max_spikes_d2,
            table_d1: (0..max_spikes_d1).map(|_| AtomicU32::new(0)).collect(),
            table_d2: (0..max_spikes_d2).map(|_| AtomicU32::new(0)).collect(),
            time_d1: (0..time_table_len).map(|_| AtomicU32::new(0)).collect(),
            time_d2: (0..time_table_len).map(|_| AtomicU32::new(0)).collect(),
            sec_count_d1: AtomicUsize::new(0),
            sec_count_d2: AtomicUsize::new(0),
        }
    }

    pub fn push_d1(&self, nids: &[u32]) -> Result<(), KernelError> {
        let start = self.sec_count_d1.fetch_add(nids.len(), Ordering::AcqRel);

        if start + nids.len() > self.max_spikes_d1 {
            warn!(
                occupancy = start + nids.len(),
                ceiling = self.max_spikes_d1,
                "D1 firing table overflow"
            );
            return Err(KernelError::FireUpdateOverflowD1);
        }

        for (offset, nid) in nids.iter().enumerate() {
            self.table_d1[start + offset].store(*nid, Ordering::Relaxed);
        }

        Ok(())
    }

    pub fn push_d2(&self, nids: &[u32]) -> Result<(), KernelError> {
        let start = self.sec_count_d2.fetch_add(nids.len(), Ordering::AcqRel);

        if start + nids.len() > self.max_spikes_d2 {
            warn!(
                occupancy = start + nids.len(),
                ceiling = self.max_spikes_d2,
                "D2 firing table overflow"
            );
            return Err(KernelError::FireUpdateOverflowD2);
        }

        for (offset, nid) in nids.iter().enumerate() {
            self.table_d2[start + offset].store(*nid, Ordering::Relaxed);
        }

        Ok(())
    }

    pub fn sec_count_d1(&self) -> usize {
        self.sec_count_d1.load(Ordering::Acquire)
    }

    pub fn sec_count_d2(&self) -> usize {
        self.sec_count_d2.load(Ordering::Acquire)
    }

    pub fn entry_d1(&self, index: usize) -> u32 {
        self.table_d1[index].load(Ordering::Relaxed)
    }

    pub fn entry_d2(&self, index: usize) -> u32 {
        self.table_d2[index].load(Ordering::Relaxed)
    }

    /// Records the running per-second counts for tick `ms`.
    pub fn update_time_tables(&self, ms: usize) {
        let slot = ms + self.max_delay + 1;
        self.time_d1[slot].store(self.sec_count_d1() as u32, Ordering::Relaxed);
        self.time_d2[slot].store(self.sec_count_d2() as u32, Ordering::Relaxed);
    }

    /// Entry range of the D2 spikes fired `delay` ticks before tick `ms` of
    /// the current second. For `delay > ms` this resolves into the carry-over
    /// slots of the previous second.
    pub fn delivery_window_d2(&self, ms: usize, delay: usize) -> std::ops::Range<usize> {
        let hi_slot = ms + self.max_delay + 1 - delay;

        let lo = self.time_d2[hi_slot - 1].load(Ordering::Relaxed) as usize;
        let hi = self.time_d2[hi_slot].load(Ordering::Relaxed) as usize;

        lo..hi
    }

    /// Entry range of the D1 spikes fired during the previous tick.
    pub fn delivery_window_d1(&self, ms: usize) -> std::ops::Range<usize> {
        let hi_slot = ms + self.max_delay;

        let lo = self.time_d1[hi_slot - 1].load(Ordering::Relaxed) as usize;
        let hi = self.time_d1[hi_slot].load(Ordering::Relaxed) as usize;

        lo..hi
    }

    /// Second-boundary pass: compacts the D2 spikes whose delivery windows
    /// extend into the next second to the front of the table, rebases the
    /// time tables onto the carry-over region and resets the per-second
    /// counters. Returns the pre-reset counts for lifetime accounting.
    pub fn shift_second_boundary(&self) -> SecondBoundaryCounts {
        let d1_last_second = self.sec_count_d1();
        let d2_last_second = self.sec_count_d2();

        // Spikes older than tick `999 - max_delay` have fully elapsed delays;
        // the copy base is the same cumulative count the shifted time table
        // is rebased on, which keeps entries and windows aligned.
        let base = self.time_d2[TICKS_PER_SECOND].load(Ordering::Relaxed) as usize;
        let end = self.time_d2[TICKS_PER_SECOND + self.max_delay].load(Ordering::Relaxed) as usize;

        for (to, from) in (base..end).enumerate() {
            let entry = self.table_d2[from].load(Ordering::Relaxed);
            self.table_d2[to].store(entry, Ordering::Relaxed);
        }

        let d1_base = self.time_d1[TICKS_PER_SECOND].load(Ordering::Relaxed);

        for i in 1..=self.max_delay {
            let d2_shifted = self.time_d2[TICKS_PER_SECOND + i].load(Ordering::Relaxed)
                - base as u32;
            self.time_d2[i].store(d2_shifted, Ordering::Relaxed);

            let d1_shifted = self.time_d1[TICKS_PER_SECOND + i].load(Ordering::Relaxed) - d1_base;
            self.time_d1[i].store(d1_shifted, Ordering::Relaxed);
        }

        self.time_d1[0].store(0, Ordering::Relaxed);
        self.time_d2[0].store(0, Ordering::Relaxed);

        // D1 restarts empty; its single-tick delivery window re-anchors here.
        self.time_d1[self.max_delay].store(0, Ordering::Relaxed);

        let d2_carried = self.time_d2[self.max_delay].load(Ordering::Relaxed) as usize;

        self.sec_count_d1.store(0, Ordering::Release);
        self.sec_count_d2.store(d2_carried, Ordering::Release);

        debug!(
            d1 = d1_last_second,
            d2 = d2_last_second,
            carried = d2_carried,
            "second boundary compaction"
        );

        SecondBoundaryCounts {
            d1_last_second,
            d2_last_second,
            d2_carried,
        }
    }

    #[cfg(test)]
    fn time_table_d2(&self, slot: usize) -> u32 {
        self.time_d2[slot].load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn time_table_d1(&self, slot: usize) -> u32 {
        self.time_d1[slot].load(Ordering::Relaxed)
    }
}
