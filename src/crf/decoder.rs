use super::data::{Float, Instance};
use crate::error::Result;

/// The best label path for an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// One label id per item.
    pub labels: Vec<u32>,
    /// Unnormalized score of the path.
    pub score: Float,
}

/// Marginal probabilities over the label lattice of an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Marginals {
    /// Logarithm of the partition function.
    pub log_norm: Float,
    num_labels: usize,
    /// `[T][L]` row-major: `state[L * t + l]` is `p(y_t = l | x)`.
    state: Vec<Float>,
}

impl Marginals {
    pub fn new(log_norm: Float, num_labels: usize, state: Vec<Float>) -> Self {
        Self {
            log_norm,
            num_labels,
            state,
        }
    }

    pub fn num_items(&self) -> usize {
        if self.num_labels == 0 {
            0
        } else {
            self.state.len() / self.num_labels
        }
    }

    /// `p(y_t = l | x)`, or `None` when out of range.
    pub fn point(&self, label: u32, t: usize) -> Option<Float> {
        let l = label as usize;
        if l >= self.num_labels || t >= self.num_items() {
            return None;
        }
        self.state.get(self.num_labels * t + l).copied()
    }

    /// Probability of a path with the given unnormalized score.
    pub fn probability(&self, score: Float) -> Float {
        (score - self.log_norm).exp()
    }
}

/// Inference engine turning an encoded instance into labels.
///
/// Implementations must be deterministic, and must only be handed
/// non-empty instances.
pub trait Decoder: Send + Sync {
    /// Number of distinct labels the decoder chooses from.
    fn num_labels(&self) -> usize;

    /// Most likely label sequence; always `instance.len()` labels long.
    fn viterbi(&self, instance: &Instance) -> Result<Path>;

    /// Per-position label marginals and the partition function.
    fn marginals(&self, instance: &Instance) -> Result<Marginals>;

    /// Unnormalized score of an arbitrary label path.
    fn score(&self, instance: &Instance, labels: &[u32]) -> Result<Float>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marginal_lookup() {
        let m = Marginals::new(0.0, 2, vec![0.25, 0.75, 1.0, 0.0]);
        assert_eq!(m.num_items(), 2);
        assert_eq!(m.point(1, 0), Some(0.75));
        assert_eq!(m.point(0, 1), Some(1.0));
        assert_eq!(m.point(2, 0), None);
        assert_eq!(m.point(0, 2), None);
        assert_eq!(m.probability(0.0), 1.0);
    }
}
