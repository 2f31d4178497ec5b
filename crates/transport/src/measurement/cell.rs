use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

/// `holder` value while no thread owns the cell lock.
const NO_HOLDER: usize = usize::MAX;

/// `f64` stored as bits in an `AtomicU64`.
///
/// Loads and stores are individually atomic, so unsynchronized writers can
/// lose updates but never tear a value.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

fn zeroed(len: usize) -> Vec<AtomicF64> {
    (0..len).map(|_| AtomicF64::default()).collect()
}

/// Accumulated samples of one cell, indexed `[material][time bin]`.
///
/// `mass` holds Σ mass × dwell, `residence` holds Σ dwell. One mutex guards
/// both tables; `holder` records which worker currently owns it.
#[derive(Debug)]
pub struct CellMeasurement {
    lock: Mutex<()>,
    holder: AtomicUsize,
    materials: usize,
    bins: usize,
    mass: Vec<AtomicF64>,
    residence: Vec<AtomicF64>,
}

/// One particle's contribution to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub material: usize,
    pub bin: usize,
    /// Particle mass (kg).
    pub mass: f64,
    /// Time spent in the cell (s).
    pub dwell: f64,
}

/// Lock state found by [`CellMeasurement::break_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenLock {
    /// A worker panicked inside the critical section; poison was cleared.
    Poisoned { holder: Option<usize> },
    /// The lock is still owned by a live thread.
    Held { holder: Option<usize> },
}

/// Clears `holder` when the critical section ends normally. During a panic
/// the holder is kept so lock recovery can name the thread.
struct HeldCell<'a> {
    holder: &'a AtomicUsize,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for HeldCell<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.holder.store(NO_HOLDER, Ordering::Release);
        }
    }
}

impl CellMeasurement {
    pub fn new(materials: usize, bins: usize) -> Self {
        Self {
            lock: Mutex::new(()),
            holder: AtomicUsize::new(NO_HOLDER),
            materials,
            bins,
            mass: zeroed(materials * bins),
            residence: zeroed(materials * bins),
        }
    }

    pub fn materials(&self) -> usize {
        self.materials
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    fn slot(&self, material: usize, bin: usize) -> Option<usize> {
        (material < self.materials && bin < self.bins).then_some(material * self.bins + bin)
    }

    /// Drop all samples and resize the tables.
    pub fn reset(&mut self, materials: usize, bins: usize) {
        self.materials = materials;
        self.bins = bins;
        self.mass = zeroed(materials * bins);
        self.residence = zeroed(materials * bins);
    }

    /// Worker index currently owning the cell lock, if any.
    pub fn holder(&self) -> Option<usize> {
        match self.holder.load(Ordering::Acquire) {
            NO_HOLDER => None,
            h => Some(h),
        }
    }

    /// Try-lock until `timeout`, yielding between attempts. A poisoned lock
    /// is taken over; its tables are plain numbers and stay usable.
    fn acquire(&self, thread: usize, timeout: Duration) -> Option<HeldCell<'_>> {
        let deadline = Instant::now() + timeout;
        loop {
            let guard = match self.lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            };
            if let Some(guard) = guard {
                self.holder.store(thread, Ordering::Release);
                return Some(HeldCell {
                    holder: &self.holder,
                    _guard: guard,
                });
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::yield_now();
        }
    }

    fn accumulate(&self, slot: usize, mass_residence: f64, dwell: f64) {
        let m = &self.mass[slot];
        m.store(m.load() + mass_residence);
        let r = &self.residence[slot];
        r.store(r.load() + dwell);
    }

    /// Add one sample. With `synchronized` the read-modify-write of both
    /// tables happens under the cell lock; otherwise concurrent writers race.
    ///
    /// Errors with the current holder when the lock could not be taken in
    /// time, or `Ok(false)` when the indices are outside the tables.
    pub fn add(
        &self,
        sample: &Sample,
        synchronized: bool,
        thread: usize,
        timeout: Duration,
    ) -> Result<bool, Option<usize>> {
        let Some(slot) = self.slot(sample.material, sample.bin) else {
            return Ok(false);
        };
        let mass_residence = sample.mass * sample.dwell;
        if !synchronized {
            self.accumulate(slot, mass_residence, sample.dwell);
            return Ok(true);
        }
        let Some(_held) = self.acquire(thread, timeout) else {
            return Err(self.holder());
        };
        self.accumulate(slot, mass_residence, sample.dwell);
        Ok(true)
    }

    /// Σ mass × dwell for one material and bin; 0 outside the tables.
    pub fn mass(&self, material: usize, bin: usize) -> f64 {
        self.slot(material, bin)
            .map(|s| self.mass[s].load())
            .unwrap_or(0.0)
    }

    /// Σ dwell for one material and bin; 0 outside the tables.
    pub fn residence(&self, material: usize, bin: usize) -> f64 {
        self.slot(material, bin)
            .map(|s| self.residence[s].load())
            .unwrap_or(0.0)
    }

    /// Σ mass × dwell of one material over all bins.
    pub fn total_mass(&self, material: usize) -> f64 {
        (0..self.bins).map(|bin| self.mass(material, bin)).sum()
    }

    pub fn has_samples(&self) -> bool {
        self.residence.iter().any(|r| r.load() != 0.0)
    }

    /// Recovery after aborted workers: clears a poisoned lock and reports a
    /// lock that is still owned. `None` when the lock was free.
    pub fn break_lock(&self) -> Option<BrokenLock> {
        let holder = self.holder();
        if self.lock.is_poisoned() {
            self.lock.clear_poison();
            self.holder.store(NO_HOLDER, Ordering::Release);
            return Some(BrokenLock::Poisoned { holder });
        }
        match self.lock.try_lock() {
            Ok(_) => None,
            Err(TryLockError::Poisoned(_)) => {
                self.lock.clear_poison();
                self.holder.store(NO_HOLDER, Ordering::Release);
                Some(BrokenLock::Poisoned { holder })
            }
            Err(TryLockError::WouldBlock) => Some(BrokenLock::Held { holder }),
        }
    }

    /// Run `f` while holding the cell lock as worker `thread`. Lets tests and
    /// diagnostics simulate a worker stuck inside a critical section.
    pub fn with_lock<R>(&self, thread: usize, f: impl FnOnce() -> R) -> Option<R> {
        let _held = self.acquire(thread, Duration::ZERO)?;
        Some(f())
    }
}
