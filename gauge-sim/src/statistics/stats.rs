/// Running mean of a scalar observable.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub count: usize,
    pub sum: f64,
    pub sum2: f64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum2 += value * value;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Naive standard error of the mean, ignoring autocorrelation.
    pub fn std_error(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let var = (self.sum2 / n - mean * mean).max(0.0);
        (var / (n - 1.0)).sqrt()
    }
}
