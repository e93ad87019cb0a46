//! Fourier spectrum preview of a fixed synthetic signal.
//!
//! The forward transform is computed one bin per [`STEP_SECONDS`] so the
//! winding plot animates; once every bin up to Nyquist is known the inverse
//! transform is synthesised from the one-sided spectrum.

use glam::DVec2;
use std::f64::consts::TAU;

/// Sampling intervals; the signal holds `SAMPLES + 1` points over `[0, 2pi]`.
pub const SAMPLES: usize = 100;
pub const DURATION: f64 = TAU;
pub const BIN_COUNT: usize = SAMPLES / 2 + 1;
pub const STEP_SECONDS: f32 = 1.0 / 20.0;

const SAMPLING_RATE: f64 = SAMPLES as f64 / DURATION;

pub fn signal(t: f64) -> f64 {
    t.sin() + 0.2 * (5.0 * t).sin() + 0.5 * (10.0 * t).sin() + 0.75 * (7.0 * t).cos()
}

/// `exp(i * theta)` as a complex number.
fn cis(theta: f64) -> DVec2 {
    DVec2::new(theta.cos(), theta.sin())
}

fn complex_mul(a: DVec2, b: DVec2) -> DVec2 {
    DVec2::new(a.x * b.x - a.y * b.y, a.x * b.y + a.y * b.x)
}

fn sample_time(i: usize) -> f64 {
    i as f64 / SAMPLES as f64 * DURATION
}

#[derive(Debug, Clone)]
pub struct Spectrum {
    signal: Vec<[f64; 2]>,
    /// Signal wound around the origin at the most recent bin's frequency.
    winding: Vec<[f64; 2]>,
    centre_of_mass: [f64; 2],
    frequencies: Vec<f64>,
    coefficients: Vec<DVec2>,
    reconstruction: Vec<[f64; 2]>,
    timer: f32,
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl Spectrum {
    pub fn new() -> Self {
        let signal = (0..=SAMPLES)
            .map(|i| {
                let t = sample_time(i);
                [t, signal(t)]
            })
            .collect();
        Self {
            signal,
            winding: Vec::new(),
            centre_of_mass: [0.0, 0.0],
            frequencies: Vec::with_capacity(BIN_COUNT),
            coefficients: Vec::with_capacity(BIN_COUNT),
            reconstruction: Vec::new(),
            timer: 0.0,
        }
    }

    /// Feeds frame time; returns `true` when a step was taken.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.timer += dt;
        if self.timer < STEP_SECONDS {
            return false;
        }
        self.timer = 0.0;
        self.step()
    }

    /// Computes the next bin, or the inverse transform after the last bin.
    /// Returns `false` once there is nothing left to do.
    pub fn step(&mut self) -> bool {
        if self.coefficients.len() < BIN_COUNT {
            self.compute_bin(self.coefficients.len());
            true
        } else if self.reconstruction.is_empty() {
            self.reconstruct();
            true
        } else {
            false
        }
    }

    pub fn run_to_completion(&mut self) {
        while self.step() {}
    }

    fn compute_bin(&mut self, bin: usize) {
        let frequency = bin as f64 * (SAMPLING_RATE / SAMPLES as f64);
        let mut sum = DVec2::ZERO;
        self.winding.clear();
        for &[t, y] in &self.signal {
            let term = y * cis(-TAU * frequency * t);
            sum += term;
            self.winding.push([term.x, term.y]);
        }
        let coefficient = sum / self.signal.len() as f64;
        self.centre_of_mass = [coefficient.x, coefficient.y];
        self.frequencies.push(frequency);
        self.coefficients.push(coefficient);
    }

    fn reconstruct(&mut self) {
        let last = BIN_COUNT - 1;
        self.reconstruction = (0..=SAMPLES)
            .map(|i| {
                let t = sample_time(i);
                let value: f64 = self
                    .frequencies
                    .iter()
                    .zip(&self.coefficients)
                    .enumerate()
                    .map(|(k, (&frequency, &c))| {
                        let weight = if k == 0 || k == last { 1.0 } else { 2.0 };
                        weight * complex_mul(c, cis(TAU * frequency * t)).x
                    })
                    .sum();
                [t, value]
            })
            .collect();
        tracing::debug!(bins = self.coefficients.len(), "spectrum reconstructed");
    }

    pub fn bins_done(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.reconstruction.is_empty()
    }

    pub fn signal(&self) -> &[[f64; 2]] {
        &self.signal
    }

    pub fn winding(&self) -> &[[f64; 2]] {
        &self.winding
    }

    pub fn centre_of_mass(&self) -> [f64; 2] {
        self.centre_of_mass
    }

    /// `(frequency, magnitude)` per computed bin.
    pub fn magnitudes(&self) -> Vec<[f64; 2]> {
        self.frequencies
            .iter()
            .zip(&self.coefficients)
            .map(|(&f, c)| [f, c.length()])
            .collect()
    }

    /// Empty until [`Spectrum::is_complete`].
    pub fn reconstruction(&self) -> &[[f64; 2]] {
        &self.reconstruction
    }

    /// Indices of the `n` strongest bins, strongest first.
    pub fn dominant_bins(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.coefficients.len()).collect();
        order.sort_by(|&a, &b| {
            self.coefficients[b]
                .length()
                .total_cmp(&self.coefficients[a].length())
        });
        order.truncate(n);
        order
    }
}
