use bitflags::bitflags;

use crate::crf::data::Float;

bitflags! {
    /// Functionality a context is allocated for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Flag: u32 {
        const VITERBI = 0x01;
        const MARGINALS = 0x02;
    }
}

/// Work space for decoding one instance over a first-order label lattice.
#[derive(Debug, Clone)]
pub(crate) struct Crf1dContext {
    /// The total number of distinct labels (L).
    pub num_labels: usize,
    /// The number of items (T) in the instance.
    num_items: usize,
    /// Logarithm of the normalization factor for the instance.
    ///
    /// This is equivalent to the total scores of all paths in the lattice.
    log_norm: Float,
    /// Log-domain amount subtracted from every path by the exponentiation
    /// steps; added back into `log_norm`.
    shift: Float,
    /// State scores, a `[T][L]` matrix whose element `[t][l]` presents the
    /// total score of state features associating label #l at #t.
    pub state: Vec<Float>,
    /// Transition scores, a `[L][L]` matrix whose element `[i][j]` represents
    /// the total score of transition features associating labels #i and #j.
    pub trans: Vec<Float>,
    /// `[T][L]`: scaled total score of paths from BOS arriving at (t, l).
    alpha_score: Vec<Float>,
    /// `[T][L]`: scaled total score of paths from (t, l) arriving at EOS.
    beta_score: Vec<Float>,
    /// `[T]`: scaling coefficient applied to alpha and beta at t.
    scale_factor: Vec<Float>,
    /// `[L]` work space.
    row: Vec<Float>,
    /// `[T][L]`: the label #i at t-1 on the best path arriving at (t, j).
    backward_edge: Vec<usize>,
    exp_state: Vec<Float>,
    exp_trans: Vec<Float>,
    /// `[T][L]`: marginal probability of the state (t, l).
    pub mexp_state: Vec<Float>,
}

impl Crf1dContext {
    /// Allocate zeroed tables for `num_items` items over `num_labels` labels.
    pub fn new(flag: Flag, num_labels: usize, num_items: usize) -> Self {
        let l = num_labels;
        let n = num_items * l;
        let marginals = flag.contains(Flag::MARGINALS);
        let sized = |len: usize, wanted: bool| if wanted { vec![0.0; len] } else { Vec::new() };
        Self {
            num_labels,
            num_items,
            log_norm: 0.0,
            shift: 0.0,
            state: vec![0.0; n],
            trans: vec![0.0; l * l],
            alpha_score: vec![0.0; n],
            beta_score: sized(n, marginals),
            scale_factor: sized(num_items, marginals),
            row: sized(l, marginals),
            backward_edge: if flag.contains(Flag::VITERBI) {
                vec![0; n]
            } else {
                Vec::new()
            },
            exp_state: sized(n, marginals),
            exp_trans: sized(l * l, marginals),
            mexp_state: sized(n, marginals),
        }
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn log_norm(&self) -> Float {
        self.log_norm
    }

    /// Exponentiate transition scores relative to their maximum.
    ///
    /// Every path crosses `T - 1` transitions, so the maximum is recorded
    /// once per transition.
    pub fn exp_transition(&mut self) {
        let max = finite_max(&self.trans);
        for (e, &s) in self.exp_trans.iter_mut().zip(&self.trans) {
            *e = (s - max).exp();
        }
        self.shift += max * self.num_items.saturating_sub(1) as Float;
    }

    /// Exponentiate each item's state scores relative to the item's maximum.
    pub fn exp_state(&mut self) {
        let l = self.num_labels;
        if l == 0 {
            return;
        }
        for t in 0..self.num_items {
            let scores = &self.state[l * t..l * (t + 1)];
            let max = finite_max(scores);
            for (e, &s) in self.exp_state[l * t..l * (t + 1)].iter_mut().zip(scores) {
                *e = (s - max).exp();
            }
            self.shift += max;
        }
    }

    /// Best path through the lattice, with its score.
    ///
    /// State and transition scores are in the log domain. Requires at least
    /// one item.
    pub fn viterbi(&mut self) -> (Vec<usize>, Float) {
        let num_items = self.num_items;
        let l = self.num_labels;
        let mut labels = vec![0; num_items];
        if num_items == 0 || l == 0 {
            return (labels, 0.0);
        }

        /* Compute the scores at (0, *). */
        self.alpha_score[..l].copy_from_slice(&self.state[..l]);

        /* Compute the scores at (t, *). */
        for t in 1..num_items {
            for j in 0..l {
                let mut max_score = Float::NEG_INFINITY;
                let mut argmax = 0;
                for i in 0..l {
                    /* Transit from (t-1, i) to (t, j). */
                    let score = self.alpha_score[l * (t - 1) + i] + self.trans[l * i + j];
                    if max_score < score {
                        max_score = score;
                        argmax = i;
                    }
                }
                /* Backward link (#t, #j) -> (#t-1, #i). */
                self.backward_edge[l * t + j] = argmax;
                self.alpha_score[l * t + j] = max_score + self.state[l * t + j];
            }
        }

        /* Find the node (#T, #i) that reaches EOS with the maximum score. */
        let mut max_score = Float::NEG_INFINITY;
        for i in 0..l {
            let score = self.alpha_score[l * (num_items - 1) + i];
            if max_score < score {
                max_score = score;
                labels[num_items - 1] = i;
            }
        }

        /* Tag labels by tracing the backward links. */
        for t in (0..num_items - 1).rev() {
            let next = labels[t + 1];
            labels[t] = self.backward_edge[l * (t + 1) + next];
        }

        (labels, max_score)
    }

    /// Forward pass on exponentiated scores; sets the normalization factor.
    pub fn alpha_score(&mut self) {
        let l = self.num_labels;
        let num_items = self.num_items;
        if num_items == 0 {
            return;
        }

        /* alpha[0][j] = state[0][j] */
        self.alpha_score[..l].copy_from_slice(&self.exp_state[..l]);
        self.scale_factor[0] = Self::normalize(&mut self.alpha_score[..l]);

        /* alpha[t][j] = state[t][j] * \sum_{i} alpha[t-1][i] * trans[i][j] */
        for t in 1..num_items {
            let (prev, cur) = self.alpha_score.split_at_mut(l * t);
            let prev = &prev[l * (t - 1)..];
            let cur = &mut cur[..l];
            cur.fill(0.0);
            for i in 0..l {
                for j in 0..l {
                    cur[j] += prev[i] * self.exp_trans[l * i + j];
                }
            }
            for (a, &s) in cur.iter_mut().zip(&self.exp_state[l * t..l * (t + 1)]) {
                *a *= s;
            }
            self.scale_factor[t] = Self::normalize(cur);
        }

        /* log(norm) = shift - \sum_{t} log(C[t]) */
        self.log_norm = self.shift
            - self.scale_factor[..num_items]
                .iter()
                .map(|c| c.ln())
                .sum::<Float>();
    }

    /// Backward pass; must follow [`Self::alpha_score`].
    pub fn beta_score(&mut self) {
        let l = self.num_labels;
        let num_items = self.num_items;
        if num_items == 0 {
            return;
        }

        /* Compute the beta scores at (T-1, *). */
        let scale = self.scale_factor[num_items - 1];
        self.beta_score[l * (num_items - 1)..l * num_items].fill(scale);

        for t in (0..num_items - 1).rev() {
            /* row[j] = state[t+1][j] * beta[t+1][j] */
            for j in 0..l {
                self.row[j] = self.beta_score[l * (t + 1) + j] * self.exp_state[l * (t + 1) + j];
            }
            for i in 0..l {
                let mut s = 0.0;
                for j in 0..l {
                    s += self.exp_trans[l * i + j] * self.row[j];
                }
                self.beta_score[l * t + i] = s * self.scale_factor[t];
            }
        }
    }

    /// Marginal probabilities of states; must follow the forward and
    /// backward passes.
    pub fn marginals(&mut self) {
        let l = self.num_labels;

        /* p(t,i) = (1. / C[t]) * fwd'[t][i] * bwd'[t][i] */
        for t in 0..self.num_items {
            let inv = 1.0 / self.scale_factor[t];
            for i in 0..l {
                self.mexp_state[l * t + i] =
                    self.alpha_score[l * t + i] * self.beta_score[l * t + i] * inv;
            }
        }
    }

    /// Log-domain score of a label path; `labels` must cover every item.
    pub fn score(&self, labels: &[usize]) -> Float {
        let l = self.num_labels;
        let Some(&first) = labels.first() else {
            return 0.0;
        };

        /* Stay at (0, labels[0]). */
        let mut i = first;
        let mut r = self.state[i];

        for (t, &j) in labels.iter().enumerate().take(self.num_items).skip(1) {
            /* Transit from (t-1, i) to (t, j). */
            r += self.trans[l * i + j];
            r += self.state[l * t + j];
            i = j;
        }
        r
    }

    fn normalize(row: &mut [Float]) -> Float {
        let sum: Float = row.iter().sum();
        let scale = if sum != 0.0 { 1.0 / sum } else { 1.0 };
        for x in row.iter_mut() {
            *x *= scale;
        }
        scale
    }
}

/// Largest finite score, or 0 when there is none.
fn finite_max(scores: &[Float]) -> Float {
    scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(None, |acc: Option<Float>, s| Some(acc.map_or(s, |m| m.max(s))))
        .unwrap_or(0.0)
}
