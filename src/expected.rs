//! Per-edge smoothed travel-time expectations, updated by exponential
//! smoothing from each iteration's reducer output (spec.md §4.G).

use nohash_hasher::IntMap;

use crate::error::{ConfigError, ConfigResult};
use crate::network::{EdgeId, Network};

/// A total mapping from edge to a positive expected duration in seconds,
/// initialized to the free-flow bound `length / free_speed` and updated
/// in place by [`ExpectedLinkDurations::update`].
#[derive(Debug, Clone)]
pub struct ExpectedLinkDurations {
    alpha: f64,
    durations: IntMap<EdgeId, f64>,
}

impl ExpectedLinkDurations {
    /// `alpha` is the exponential-smoothing weight on the new observation;
    /// spec.md §9 leaves the default ambiguous between 1.0 and 0.5 across
    /// the corpus's own code paths — this crate defaults to 1.0 at the
    /// call site (`Optimizer::new`), matching spec.md §8 Testable
    /// Property 6's idempotence requirement, per DESIGN.md.
    pub fn new(network: &Network, alpha: f64) -> ConfigResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }
        Ok(ExpectedLinkDurations { alpha, durations: network.minimum_durations() })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn get(&self, edge: EdgeId) -> Option<f64> {
        self.durations.get(&edge).copied()
    }

    /// `d_new = (1 - alpha) * d_old + alpha * d_obs`. An edge absent from
    /// `observations` (never traversed in the log the observations were
    /// reduced from) is left unchanged.
    pub fn update(&mut self, observations: &IntMap<EdgeId, f64>) {
        for (edge, d_obs) in observations {
            if let Some(d_old) = self.durations.get_mut(edge) {
                *d_old = (1.0 - self.alpha) * *d_old + self.alpha * d_obs;
            } else {
                self.durations.insert(*edge, *d_obs);
            }
        }
    }

    pub fn as_map(&self) -> &IntMap<EdgeId, f64> {
        &self.durations
    }
}
