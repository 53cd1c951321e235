//! Single-pass accumulators for aggregating rules.
//!
//! Every accumulator here is bounded (or grows with distinct keys only) and
//! gives the same answer however the records were split into batches.

use crate::DataValue;
use quality_core::FailedRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Separator used when composite keys are rendered as text.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Welford running statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation.
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        self.sum += x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance (n - 1), `None` below two observations.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    /// Sample standard deviation.
    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

/// Fixed-size uniform sample (Algorithm R).
///
/// One random draw is made per observation, so the retained sample depends
/// only on the order of observations.
#[derive(Debug, Clone)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    items: Vec<f64>,
    rng: StdRng,
}

impl Reservoir {
    /// Seed used for every reservoir, so runs are reproducible.
    pub const SEED: u64 = 0x5eed_da7a;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: 0,
            items: Vec::with_capacity(capacity.clamp(1, 65_536)),
            rng: StdRng::seed_from_u64(Self::SEED),
        }
    }

    pub fn push(&mut self, x: f64) {
        self.seen += 1;
        let slot = self.rng.random_range(0..self.seen);
        if self.items.len() < self.capacity {
            self.items.push(x);
        } else if slot < self.capacity as u64 {
            self.items[slot as usize] = x;
        }
    }

    /// Observations offered so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// True while every observation is still held.
    pub fn is_exact(&self) -> bool {
        self.seen <= self.capacity as u64
    }

    /// Retained values.
    pub fn values(&self) -> &[f64] {
        &self.items
    }

    /// Retained values, sorted.
    pub fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.items.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Quantile `q` in `[0, 1]` with linear interpolation.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        quantile_sorted(&self.sorted(), q)
    }
}

/// Linear-interpolated quantile of sorted data.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Renders a composite key as text; `None` if any part is null.
pub fn key_string<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a DataValue>,
{
    let mut key = String::new();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&value.render()?);
    }
    Some(key)
}

/// 64-bit hash of a rendered key.
pub fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Key bytes kept verbatim before new keys are tracked by hash only.
pub const EXACT_KEY_BUDGET: usize = 64 * 1024 * 1024;

/// Set of keys with a value per key.
///
/// Keys are compared exactly until their text exceeds the byte budget.
/// Keys first seen after that are stored as a 64-bit hash, so two of them
/// that collide are taken for the same key.
#[derive(Debug, Clone)]
struct KeyMap<V> {
    exact: HashMap<Box<str>, V>,
    hashed: HashMap<u64, V>,
    exact_bytes: usize,
    budget: usize,
}

impl<V: Copy> KeyMap<V> {
    fn with_budget(budget: usize) -> Self {
        Self {
            exact: HashMap::new(),
            hashed: HashMap::new(),
            exact_bytes: 0,
            budget,
        }
    }

    /// Existing value for `key`, or `None` after inserting `value`.
    fn get_or_insert(&mut self, key: &str, value: V) -> Option<V> {
        if let Some(existing) = self.exact.get(key) {
            return Some(*existing);
        }
        if self.exact_bytes + key.len() <= self.budget {
            self.exact_bytes += key.len();
            self.exact.insert(key.into(), value);
            return None;
        }
        match self.hashed.entry(key_hash(key)) {
            Entry::Occupied(entry) => Some(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.exact.len() + self.hashed.len()
    }

    fn is_hashing(&self) -> bool {
        !self.hashed.is_empty()
    }
}

/// Remembers the first row of every key to spot repeats.
#[derive(Debug, Clone)]
pub struct KeyTracker {
    first_seen: KeyMap<u64>,
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::with_budget(EXACT_KEY_BUDGET)
    }
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(bytes: usize) -> Self {
        Self {
            first_seen: KeyMap::with_budget(bytes),
        }
    }

    /// Records a key; returns the first row it was seen at if it repeats.
    pub fn observe(&mut self, key: &str, row: u64) -> Option<u64> {
        self.first_seen.get_or_insert(key, row)
    }

    /// Distinct keys observed.
    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the exact budget ran out and later keys are hashed.
    pub fn is_approximate(&self) -> bool {
        self.first_seen.is_hashing()
    }
}

/// Counts distinct values, exactly within the byte budget.
#[derive(Debug, Clone)]
pub struct DistinctCounter {
    seen: KeyMap<()>,
}

impl Default for DistinctCounter {
    fn default() -> Self {
        Self::with_budget(EXACT_KEY_BUDGET)
    }
}

impl DistinctCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(bytes: usize) -> Self {
        Self {
            seen: KeyMap::with_budget(bytes),
        }
    }

    pub fn observe(&mut self, key: &str) {
        self.seen.get_or_insert(key, ());
    }

    pub fn count(&self) -> usize {
        self.seen.len()
    }

    pub fn is_approximate(&self) -> bool {
        self.seen.is_hashing()
    }
}

/// Failure counter with a bounded sample.
///
/// Counting continues after the sample is full.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    max: usize,
    failed: u64,
    samples: Vec<FailedRecord>,
}

impl SampleBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            failed: 0,
            samples: Vec::new(),
        }
    }

    /// Counts one failure, keeping it while there is room.
    pub fn record(&mut self, record: FailedRecord) {
        self.failed += 1;
        if self.samples.len() < self.max {
            self.samples.push(record);
        }
    }

    /// Counts a failure without building a sample once the buffer is full.
    pub fn record_with<F>(&mut self, build: F)
    where
        F: FnOnce() -> FailedRecord,
    {
        self.failed += 1;
        if self.samples.len() < self.max {
            self.samples.push(build());
        }
    }

    /// Whether more samples would be kept.
    pub fn has_room(&self) -> bool {
        self.samples.len() < self.max
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn samples(&self) -> &[FailedRecord] {
        &self.samples
    }

    /// Takes the samples out.
    pub fn take_samples(&mut self) -> Vec<FailedRecord> {
        std::mem::take(&mut self.samples)
    }
}
