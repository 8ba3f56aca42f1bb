//! Exponentially weighted moments with growing-window ("adjust") weights.
//!
//! At step t the observation x_{t-j} carries weight (1-α)^j, so early
//! values are not biased toward the first observation. The variance uses
//! the unbiased weighted estimator
//!
//! ```text
//! var = S * W / (W^2 - W2),   W = Σ w_i,  W2 = Σ w_i^2,
//! S = Σ w_i (x_i - mean)^2
//! ```
//!
//! which is undefined for a single observation; that case reads as 0 so a
//! threshold of `mean + k*std` degenerates to the first value itself.

/// Incremental exponentially weighted mean/variance accumulator.
///
/// Old weights are decayed by (1-α) on every update and the new point
/// enters with weight 1, which reproduces the growing-window weighting
/// exactly without storing the history.
#[derive(Debug, Clone)]
pub struct EwmState {
    alpha: f64,
    n: u64,
    sum_w: f64,
    sum_w2: f64,
    mean: f64,
    m2: f64,
}

impl EwmState {
    /// `alpha` is clamped into (0, 1).
    pub fn new(alpha: f64) -> Self {
        EwmState {
            alpha: alpha.clamp(1e-6, 1.0 - 1e-6),
            n: 0,
            sum_w: 0.0,
            sum_w2: 0.0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Fold one observation into the state.
    pub fn update(&mut self, x: f64) {
        if self.n == 0 {
            self.n = 1;
            self.sum_w = 1.0;
            self.sum_w2 = 1.0;
            self.mean = x;
            self.m2 = 0.0;
            return;
        }
        let decay = 1.0 - self.alpha;
        self.sum_w *= decay;
        self.sum_w2 *= decay * decay;
        self.m2 *= decay;

        let w_old = self.sum_w;
        self.sum_w += 1.0;
        self.sum_w2 += 1.0;

        let delta = x - self.mean;
        self.mean += delta / self.sum_w;
        self.m2 += delta * delta * (w_old / self.sum_w);
        self.n += 1;
    }

    /// Weighted mean. 0 before the first observation.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased weighted variance. 0 when undefined (fewer than two
    /// observations) or numerically degenerate.
    pub fn variance(&self) -> f64 {
        let denom = self.sum_w * self.sum_w - self.sum_w2;
        if denom <= 0.0 {
            return 0.0;
        }
        let var = self.m2 * self.sum_w / denom;
        var.max(0.0)
    }

    /// Square root of [`variance`](Self::variance).
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Threshold series `mean + k*std` over a drift series, where the moment
/// at index i includes drift[i].
pub fn ewm_threshold_series(drifts: &[f64], alpha: f64, k: f64) -> Vec<f64> {
    let mut state = EwmState::new(alpha);
    let mut out = Vec::with_capacity(drifts.len());
    for &d in drifts {
        state.update(d);
        out.push(state.mean() + k * state.std_dev());
    }
    out
}
