#![forbid(unsafe_code)]

//! Pipeline configuration.

/// Environment variable overriding [`PipelineConfig::max_rebuilds_per_flush`].
pub const MAX_REBUILDS_ENV: &str = "SCOPEKIT_MAX_REBUILDS_PER_FLUSH";

const DEFAULT_MAX_REBUILDS: usize = 10_000;

/// Configuration for a [`Tree`](crate::Tree)'s rebuild pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on region rebuilds in one [`flush`](crate::Tree::flush).
    ///
    /// A builder that mutates a model it depends on re-marks itself dirty on
    /// every build; the bound stops such a loop and leaves the remaining
    /// work queued for the next flush.
    pub max_rebuilds_per_flush: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_rebuilds_per_flush: DEFAULT_MAX_REBUILDS,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `SCOPEKIT_MAX_REBUILDS_PER_FLUSH` when set to
    /// a positive integer.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup(MAX_REBUILDS_ENV)
            && let Ok(n) = val.trim().parse::<usize>()
            && n > 0
        {
            config.max_rebuilds_per_flush = n;
        }
        config
    }

    /// Set the rebuild bound. Zero is clamped to one.
    #[must_use]
    pub fn with_max_rebuilds_per_flush(mut self, max: usize) -> Self {
        self.max_rebuilds_per_flush = max.max(1);
        self
    }
}
