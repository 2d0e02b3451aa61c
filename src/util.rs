use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

pub fn calculate_hash<T: Hash>(t: &T) -> u64 {
    let mut s = DefaultHasher::new();
    t.hash(&mut s);
    s.finish()
}

/// f32 values stored as raw bits in relaxed atomics. Workers of different
/// partitions never write the same element within a phase; the host barrier
/// between phases publishes the values.
pub fn atomic_f32_load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

pub fn atomic_f32_store(cell: &AtomicU32, value: f32) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

pub fn atomic_f32_add(cell: &AtomicU32, amount: f32) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f32::from_bits(current) + amount).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

pub fn atomic_f32_vec(len: usize, value: f32) -> Vec<AtomicU32> {
    (0..len).map(|_| AtomicU32::new(value.to_bits())).collect()
}

/// Contiguous share of `num_items` for one worker. Boundaries are placed
/// proportionally, so consecutive workers tile the items exactly and shares
/// differ by at most one.
pub fn get_worker_range(num_workers: usize, worker_id: usize, num_items: usize) -> Range<usize> {
    Range {
        start: num_items * worker_id / num_workers,
        end: num_items * (worker_id + 1) / num_workers,
    }
}
