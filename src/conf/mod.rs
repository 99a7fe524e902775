//! Decorator configuration.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How many container items a check visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePolicy {
    /// One pseudo-randomly chosen item per container per call.
    One,
    /// Up to `n` consecutive items starting at a pseudo-random offset.
    Count(usize),
    /// Every item.
    Full,
}

impl Default for SamplePolicy {
    fn default() -> Self {
        Self::One
    }
}

impl SamplePolicy {
    /// Indices of a `len`-item container visited for the per-call `random`.
    ///
    /// Deterministic in `(len, random)`, so a failing check and the report
    /// explaining it visit the same items.
    pub fn indices(self, len: usize, random: u32) -> impl Iterator<Item = usize> {
        let count = match self {
            SamplePolicy::One => len.min(1),
            SamplePolicy::Count(n) => len.min(n),
            SamplePolicy::Full => len,
        };
        let start = match self {
            SamplePolicy::Full => 0,
            _ if len == 0 => 0,
            _ => random as usize % len,
        };
        (0..count).map(move |k| (start + k) % len)
    }

    /// Whether checks under this policy depend on the per-call random integer.
    pub fn is_random(self) -> bool {
        !matches!(self, SamplePolicy::Full)
    }
}

/// Source of the pseudo-random integer each wrapper call draws.
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Next 32-bit integer.
    fn next_u32(&self) -> u32;
}

/// A seeded `StdRng`.
#[derive(Debug)]
pub struct SeededSource {
    rng: Mutex<StdRng>,
}

impl SeededSource {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Seeded deterministically.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl RandomSource for SeededSource {
    fn next_u32(&self) -> u32 {
        self.rng.lock().gen()
    }
}

/// Always returns the same integer; pins element selection in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub u32);

impl RandomSource for FixedSource {
    fn next_u32(&self) -> u32 {
        self.0
    }
}

static PROCESS_SOURCE: Lazy<Arc<dyn RandomSource>> =
    Lazy::new(|| Arc::new(SeededSource::from_entropy()));

/// Shared handle to a [`RandomSource`]; defaults to a process-seeded RNG.
#[derive(Clone)]
pub struct IndexSource(Arc<dyn RandomSource>);

impl IndexSource {
    /// Wraps a random source.
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// Draws the next integer.
    pub fn next_u32(&self) -> u32 {
        self.0.next_u32()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Default for IndexSource {
    fn default() -> Self {
        Self(Arc::clone(&PROCESS_SOURCE))
    }
}

impl fmt::Debug for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexSource({:?})", self.0)
    }
}

/// Decorator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// When false, `float` also accepts `int` and `complex` accepts both.
    pub strict: bool,
    /// How many container items each check visits.
    pub sample: SamplePolicy,
    /// Warn about deprecated `typing` spellings such as `List[int]`.
    pub warn_on_deprecated_hints: bool,
    /// Keep the generated source and hint tree on the wrapper.
    pub is_debug: bool,
    /// Where per-call random integers come from.
    #[serde(skip)]
    pub index_source: IndexSource,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            strict: true,
            sample: SamplePolicy::default(),
            warn_on_deprecated_hints: true,
            is_debug: false,
            index_source: IndexSource::default(),
        }
    }
}

impl Conf {
    /// Default configuration with every container item checked.
    pub fn full() -> Self {
        Self { sample: SamplePolicy::Full, ..Self::default() }
    }

    /// Replaces the random source.
    pub fn with_index_source(mut self, source: impl RandomSource + 'static) -> Self {
        self.index_source = IndexSource::new(source);
        self
    }

    /// Fingerprint of the options that change generated checks.
    pub fn check_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.strict.hash(&mut hasher);
        self.sample.hash(&mut hasher);
        self.warn_on_deprecated_hints.hash(&mut hasher);
        hasher.finish()
    }

    /// Fingerprint of the whole configuration.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.check_fingerprint().hash(&mut hasher);
        self.is_debug.hash(&mut hasher);
        self.index_source.identity().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_indices() {
        assert_eq!(SamplePolicy::One.indices(3, 7).collect::<Vec<_>>(), vec![1]);
        assert_eq!(SamplePolicy::One.indices(0, 7).count(), 0);
        assert_eq!(SamplePolicy::Count(2).indices(3, 2).collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(SamplePolicy::Count(5).indices(2, 0).count(), 2);
        assert_eq!(SamplePolicy::Full.indices(3, 99).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_conf_json() {
        let conf: Conf =
            serde_json::from_str(r#"{"strict": false, "sample": {"count": 3}}"#).unwrap();
        assert!(!conf.strict);
        assert_eq!(conf.sample, SamplePolicy::Count(3));
        assert!(conf.warn_on_deprecated_hints);

        let conf: Conf = serde_json::from_str(r#"{"sample": "full"}"#).unwrap();
        assert_eq!(conf.sample, SamplePolicy::Full);
    }

    #[test]
    fn test_fingerprints() {
        let a = Conf::default();
        let b = Conf::default();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let debug = Conf { is_debug: true, ..Conf::default() };
        assert_eq!(a.check_fingerprint(), debug.check_fingerprint());
        assert_ne!(a.fingerprint(), debug.fingerprint());

        let pinned = Conf::default().with_index_source(FixedSource(0));
        assert_ne!(a.fingerprint(), pinned.fingerprint());
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = SeededSource::with_seed(42);
        let b = SeededSource::with_seed(42);
        assert_eq!(a.next_u32(), b.next_u32());
    }
}
