use crate::interpolation::ExtrapolationPolicy;
use serde::{Deserialize, Serialize};
use tfs_clock::TfDuration;

/// Retention and lookup settings shared by every edge of a [`crate::FrameGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// How much history each edge keeps, measured back from its newest sample.
    /// Also the age after which an edge is considered stale.
    pub cache_time: TfDuration,
    /// Hard cap on the samples kept per edge.
    pub max_samples: usize,
    pub extrapolation: ExtrapolationPolicy,
    /// Lookups closer than this to a stored sample return it unchanged.
    pub match_tolerance: TfDuration,
}

impl GraphConfig {
    pub const DEFAULT_CACHE_TIME: TfDuration = TfDuration::from_secs(10);
    pub const DEFAULT_MAX_SAMPLES: usize = 1000;
    pub const DEFAULT_MATCH_TOLERANCE: TfDuration = TfDuration::from_micros(1);
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cache_time: Self::DEFAULT_CACHE_TIME,
            max_samples: Self::DEFAULT_MAX_SAMPLES,
            extrapolation: ExtrapolationPolicy::None,
            match_tolerance: Self::DEFAULT_MATCH_TOLERANCE,
        }
    }
}
