/// Streaming autocorrelation accumulator using a ring buffer.
///
/// Computes the normalized autocorrelation function Γ(δ) of a scalar time
/// series without storing the full history. Memory is O(max_lag).
pub struct AutocorrAccum {
    max_lag: usize,
    /// Ring buffer of the most recent `max_lag` values.
    ring: Vec<f64>,
    sum_o: f64,
    sum_o2: f64,
    /// Running sum of o(t)·o(t−δ), length `max_lag + 1`.
    sum_prod: Vec<f64>,
    n_recorded: usize,
    ring_pos: usize,
}

impl AutocorrAccum {
    pub fn new(max_lag: usize) -> Self {
        assert!(max_lag > 0, "max_lag must be positive");
        Self {
            max_lag,
            ring: vec![0.0; max_lag],
            sum_o: 0.0,
            sum_o2: 0.0,
            sum_prod: vec![0.0; max_lag + 1],
            n_recorded: 0,
            ring_pos: 0,
        }
    }

    pub fn push(&mut self, o: f64) {
        let pos = self.ring_pos;
        let ml = self.max_lag;
        self.ring[pos % ml] = o;
        self.sum_o += o;
        self.sum_o2 += o * o;

        // lag max_lag would read the slot just overwritten
        let n_back = self.n_recorded.min(ml - 1);
        for delta in 0..=n_back {
            let idx = (pos + ml - delta) % ml;
            self.sum_prod[delta] += o * self.ring[idx];
        }
        self.n_recorded += 1;
        self.ring_pos = (pos + 1) % ml;
    }

    /// Γ(0..max_lag); empty if nothing was pushed.
    pub fn finish(&self) -> Vec<f64> {
        if self.n_recorded == 0 {
            return Vec::new();
        }
        let m = self.n_recorded as f64;
        let mean = self.sum_o / m;
        let var = self.sum_o2 / m - mean * mean;
        (0..self.max_lag)
            .map(|delta| {
                let count = self.n_recorded.saturating_sub(delta) as f64;
                if count <= 0.0 || var <= 0.0 {
                    return if delta == 0 { 1.0 } else { 0.0 };
                }
                (self.sum_prod[delta] / count - mean * mean) / var
            })
            .collect()
    }
}

/// Integrated autocorrelation time with Sokal's automatic window (c = 5).
pub fn sokal_tau(gamma: &[f64]) -> f64 {
    let mut tau = 0.5;
    for (w, &g) in gamma.iter().enumerate().skip(1) {
        tau += g;
        if w as f64 >= 5.0 * tau {
            return tau;
        }
    }
    tau
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn alternating_series_anticorrelates() {
        let mut acc = AutocorrAccum::new(4);
        for i in 0..1000 {
            acc.push(if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        let g = acc.finish();
        assert_eq!(g.len(), 4);
        assert_abs_diff_eq!(g[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g[1], -1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(g[2], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn uncorrelated_tau_is_half() {
        assert_abs_diff_eq!(sokal_tau(&[1.0, 0.0, 0.0, 0.0]), 0.5);
        assert!(sokal_tau(&[1.0, 0.8, 0.6, 0.4, 0.2]) > 1.0);
    }
}
