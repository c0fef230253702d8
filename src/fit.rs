/// Standard-normal quantile at 0.10. Fixed to this exact constant so
/// independently produced parameter sets agree to 1e-9.
pub const Z10: f64 = -1.281_551_565_5;
/// Standard-normal quantile at 0.90.
pub const Z90: f64 = 1.281_551_565_5;

/// Lognormal parameters on the log scale, fitted from a percentile quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lognormal {
    pub mu: f64,
    pub sigma: f64,
}

impl Lognormal {
    /// Fit (mu, sigma) from the 10th and 90th percentiles of a positive
    /// quantity:
    ///
    ///   sigma = (ln p90 - ln p10) / (z90 - z10)
    ///   mu    = ln p10 - z10 * sigma
    ///
    /// `p10 == p90` collapses to sigma = 0; every sample is the constant.
    /// Callers must have validated `0 < p10 <= p90` beforehand.
    pub fn fit(p10: f64, p90: f64) -> Self {
        if p10 == p90 {
            return Lognormal { mu: p10.ln(), sigma: 0.0 };
        }
        let sigma = (p90.ln() - p10.ln()) / (Z90 - Z10);
        let mu = p10.ln() - Z10 * sigma;
        Lognormal { mu, sigma }
    }

    /// The distribution median, used as the deterministic point estimate.
    pub fn median(&self) -> f64 {
        self.mu.exp()
    }

    /// Transform one standard-normal draw into a cost sample.
    pub fn sample_at(&self, y: f64) -> f64 {
        (self.mu + self.sigma * y).exp()
    }

    /// Scale the underlying quantity by `factor` (shifts mu, leaves sigma).
    pub fn scaled(&self, factor: f64) -> Self {
        Lognormal { mu: self.mu + factor.ln(), sigma: self.sigma }
    }
}
