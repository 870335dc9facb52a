//! Deterministic signal generators
//!
//! Readings follow a base signal plus uniform noise from a fixed-seed LCG, so
//! every run sees the same sequence.

/// Noisy reading source with occasional dropouts
pub struct NoisySignal {
    seed: u32,
    base: f32,
    slope_per_sample: f32,
    noise: f32,
    dropout_every: Option<usize>,
    produced: usize,
}

impl NoisySignal {
    /// Constant `base` with `±noise` jitter
    pub fn new(base: f32, noise: f32) -> Self {
        Self {
            seed: 42,
            base,
            slope_per_sample: 0.0,
            noise,
            dropout_every: None,
            produced: 0,
        }
    }

    /// Add a linear trend
    pub fn with_slope(mut self, per_sample: f32) -> Self {
        self.slope_per_sample = per_sample;
        self
    }

    /// Report `NaN` every `n` readings, like a sensor failing its CRC check
    pub fn with_dropouts(mut self, every: usize) -> Self {
        self.dropout_every = Some(every);
        self
    }

    fn next_unit(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.seed >> 8) & 0xFFFF) as f32 / 65_535.0
    }

    /// Next reading
    pub fn sample(&mut self) -> f32 {
        let index = self.produced;
        self.produced += 1;
        let jitter = (self.next_unit() * 2.0 - 1.0) * self.noise;
        if let Some(every) = self.dropout_every {
            if (index + 1) % every == 0 {
                return f32::NAN;
            }
        }
        self.base + self.slope_per_sample * index as f32 + jitter
    }

    /// Next `n` readings
    pub fn take(&mut self, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.sample()).collect()
    }
}

/// Readings with a single spike of `height` at `position`
pub fn with_spike(len: usize, base: f32, position: usize, height: f32) -> Vec<f32> {
    (0..len)
        .map(|i| if i == position { base + height } else { base })
        .collect()
}
