//! Multi-octave fractal Brownian motion (fBm) elevation field.
//!
//! Composites octaves of simplex noise, each shifted by its own seeded
//! offset so low and high frequency bands do not line up, then sharpens the
//! result with a sign-preserving power curve.

use noise::{NoiseFn, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::ElevationConfigError;

/// Half-width of the range seeded octave offsets are drawn from.
pub const OFFSET_RANGE: f64 = 100_000.0;

/// Configuration for the elevation field.
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationConfig {
    /// World seed for deterministic generation.
    pub seed: u64,
    /// Frequency of the first (lowest) octave.
    pub base_frequency: f64,
    /// Amplitude of the first octave, in world units.
    pub base_amplitude: f64,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Exponent of the sign-preserving power curve. `1.0` leaves the sum untouched.
    pub power: f64,
    /// Constant added after shaping.
    pub elevation_offset: f64,
    /// Maximum number of octaves any query may accumulate.
    pub max_iterations: u32,
    /// Per-octave `[x, z]` coordinate offsets. Empty means "derive from `seed`".
    pub iterations_offsets: Vec<[f64; 2]>,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_frequency: 0.003,
            base_amplitude: 180.0,
            lacunarity: 2.05,
            persistence: 0.45,
            power: 2.0,
            elevation_offset: 1.0,
            max_iterations: 6,
            iterations_offsets: Vec::new(),
        }
    }
}

impl ElevationConfig {
    /// Check every parameter, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ElevationConfigError> {
        let finite = [
            ("base_frequency", self.base_frequency),
            ("base_amplitude", self.base_amplitude),
            ("lacunarity", self.lacunarity),
            ("persistence", self.persistence),
            ("power", self.power),
            ("elevation_offset", self.elevation_offset),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ElevationConfigError::NonFinite { name, value });
            }
        }

        let positive = [
            ("base_frequency", self.base_frequency),
            ("lacunarity", self.lacunarity),
            ("power", self.power),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(ElevationConfigError::NotPositive { name, value });
            }
        }

        if self.max_iterations == 0 {
            return Err(ElevationConfigError::NoIterations);
        }

        if !self.iterations_offsets.is_empty() {
            if self.iterations_offsets.len() < self.max_iterations as usize {
                return Err(ElevationConfigError::MissingOffsets {
                    provided: self.iterations_offsets.len(),
                    required: self.max_iterations,
                });
            }
            for offset in &self.iterations_offsets {
                for &value in offset {
                    if !value.is_finite() {
                        return Err(ElevationConfigError::NonFinite {
                            name: "iterations_offsets",
                            value,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Derive one `[x, z]` offset per octave from the world seed.
pub fn seeded_offsets(seed: u64, count: u32) -> Vec<[f64; 2]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            [
                rng.random_range(-OFFSET_RANGE..OFFSET_RANGE),
                rng.random_range(-OFFSET_RANGE..OFFSET_RANGE),
            ]
        })
        .collect()
}

/// Deterministic elevation function of world `(x, z)`.
///
/// Holds only immutable state, so it can be shared behind an `Arc` by the
/// chunk tree, build workers and placement code at once.
pub struct ElevationField {
    noise: Simplex,
    config: ElevationConfig,
    offsets: Vec<[f64; 2]>,
}

impl ElevationField {
    /// Validate `config` and build the field.
    pub fn new(config: ElevationConfig) -> Result<Self, ElevationConfigError> {
        config.validate()?;

        let offsets = if config.iterations_offsets.is_empty() {
            seeded_offsets(config.seed, config.max_iterations)
        } else {
            config.iterations_offsets[..config.max_iterations as usize].to_vec()
        };
        let noise = Simplex::new(fold_seed(config.seed));

        Ok(Self {
            noise,
            config,
            offsets,
        })
    }

    /// Sample the elevation at world `(x, z)` using up to `iterations` octaves.
    ///
    /// `iterations` is capped at `max_iterations`. Fewer octaves give a
    /// cheaper truncation of the same series; zero octaves return
    /// `elevation_offset`.
    pub fn elevation(&self, x: f64, z: f64, iterations: u32) -> f64 {
        debug_assert!(
            x.is_finite() && z.is_finite(),
            "elevation queried at non-finite coordinate ({x}, {z})"
        );

        let octaves = iterations.min(self.config.max_iterations) as usize;
        let mut total = 0.0;
        let mut frequency = self.config.base_frequency;
        let mut amplitude = self.config.base_amplitude;

        for offset in &self.offsets[..octaves] {
            let nx = x * frequency + offset[0];
            let nz = z * frequency + offset[1];
            total += self.noise.get([nx, nz]) * amplitude;

            frequency *= self.config.lacunarity;
            amplitude *= self.config.persistence;
        }

        self.shape(total) + self.config.elevation_offset
    }

    /// Sample with every configured octave.
    pub fn elevation_full(&self, x: f64, z: f64) -> f64 {
        self.elevation(x, z, self.config.max_iterations)
    }

    /// Sign-preserving power curve, applied relative to `base_amplitude` so
    /// the output keeps the same scale.
    fn shape(&self, total: f64) -> f64 {
        let amplitude = self.config.base_amplitude;
        if self.config.power == 1.0 || amplitude == 0.0 {
            return total;
        }
        let normalized = total / amplitude;
        amplitude * normalized.signum() * libm::pow(normalized.abs(), self.config.power)
    }

    /// Largest absolute deviation from the offset the unshaped octave sum
    /// can reach with `iterations` octaves (geometric series of amplitudes).
    pub fn max_amplitude(&self, iterations: u32) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.config.base_amplitude.abs();
        for _ in 0..iterations.min(self.config.max_iterations) {
            sum += amp;
            amp *= self.config.persistence.abs();
        }
        sum
    }

    /// Four-point flatness check: the largest absolute height difference
    /// between `(x, z)` and its neighbours `delta` away on each axis.
    pub fn slope_at(&self, x: f64, z: f64, iterations: u32, delta: f64) -> f64 {
        let center = self.elevation(x, z, iterations);
        [(delta, 0.0), (-delta, 0.0), (0.0, delta), (0.0, -delta)]
            .into_iter()
            .map(|(dx, dz)| (self.elevation(x + dx, z + dz, iterations) - center).abs())
            .fold(0.0, f64::max)
    }

    /// The configuration this field was built from.
    pub fn config(&self) -> &ElevationConfig {
        &self.config
    }

    /// The per-octave offsets actually in use.
    pub fn offsets(&self) -> &[[f64; 2]] {
        &self.offsets
    }
}

/// Fold a 64-bit world seed into the 32-bit seed the noise primitive takes.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}
