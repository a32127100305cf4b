#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Length of every vector in the engine.
    pub dimension: usize,

    // If set, makes atom generation reproducible across runs.
    pub seed: Option<u64>,

    /// Cleanup keeps keys whose similarity is strictly above this.
    pub cleanup_threshold: f64,

    /// A fresh atom is rejected while its |dot| with any existing atom
    /// reaches this bound.
    pub max_similarity: f64,

    /// Rejection-sampling attempts per atom before the least similar
    /// candidate is accepted anyway.
    pub max_attempts: u32,

    /// Project atoms onto the unitary manifold so `~` inverts binding exactly.
    pub unitary_atoms: bool,

    /// Every stage emits the zero vector while `t <= start_time`.
    pub start_time: f64,

    /// Propagation delay recorded on each connection. Advisory only: the
    /// scheduler decides whether to honour it.
    pub connection_delay: f64,
}

impl Default for EngineConfig {
    /// 256 dimensions, threshold 0.5 and unitary atoms.
    fn default() -> Self {
        Self {
            dimension: 256,
            seed: None,
            cleanup_threshold: 0.5,
            max_similarity: 0.1,
            max_attempts: 100,
            unitary_atoms: true,
            start_time: 0.0,
            connection_delay: 0.01,
        }
    }
}

impl EngineConfig {
    /// Minimum allowed dimension.
    pub const MIN_DIMENSION: usize = 16;
    /// Maximum allowed dimension (direct convolution is quadratic).
    pub const MAX_DIMENSION: usize = 1 << 16;

    /// Seed used when none is configured.
    pub const DEFAULT_SEED: u64 = 1;

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.dimension < Self::MIN_DIMENSION {
            return Err("dimension too small");
        }
        if self.dimension > Self::MAX_DIMENSION {
            return Err("dimension too large");
        }
        if !(self.cleanup_threshold > 0.0 && self.cleanup_threshold <= 1.0) {
            return Err("cleanup_threshold must be in (0, 1]");
        }
        if !(self.max_similarity > 0.0 && self.max_similarity <= 1.0) {
            return Err("max_similarity must be in (0, 1]");
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0");
        }
        if !self.start_time.is_finite() {
            return Err("start_time must be finite");
        }
        if !(self.connection_delay >= 0.0) || !self.connection_delay.is_finite() {
            return Err("connection_delay must be finite and >= 0");
        }
        Ok(())
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(Self::DEFAULT_SEED)
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the seed for reproducible atoms.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_cleanup_threshold(mut self, threshold: f64) -> Self {
        self.cleanup_threshold = threshold;
        self
    }

    pub fn with_unitary_atoms(mut self, unitary: bool) -> Self {
        self.unitary_atoms = unitary;
        self
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    /// Parse a JSON document; absent fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        let cfg: EngineConfig = serde_json::from_str(json)?;
        cfg.validate().map_err(crate::error::Error::InvalidConfig)?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
