//! Packets emitted by the photosphere at the inner boundary.

use super::packet::PacketCollection;
use crate::constants::{H, K_B};
use crate::radiation_field::luminosity_from_t_inner;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

/// Number of terms of the series used to sample the Planck distribution
const DEFAULT_L_SAMPLES: usize = 1000;

/// Blackbody source with equal packet energies and a limb-brightened angular distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackBodySimpleSource {
    pub seed: u64,
    pub l_samples: usize,
}

impl BlackBodySimpleSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            l_samples: DEFAULT_L_SAMPLES,
        }
    }

    /// Packets for one iteration, reproducible from the seed and the iteration number.
    pub fn create_packets(
        &self,
        temperature: f64,
        no_of_packets: usize,
        r_inner: f64,
        iteration: u64,
    ) -> PacketCollection {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(iteration));
        let nus = self.create_packet_nus(temperature, no_of_packets, &mut rng);
        let mus = create_packet_mus(no_of_packets, &mut rng);
        PacketCollection {
            radii: vec![r_inner; no_of_packets],
            nus,
            mus,
            energies: create_packet_energies(no_of_packets),
        }
    }

    /// Samples blackbody frequencies with the algorithm of Bjorkman & Wood (2001).
    ///
    /// Picks the term `l` of `sum l^-4` with probability proportional to its
    /// value, then draws `x = -ln(xi_1 xi_2 xi_3 xi_4) / l`, `nu = x k T / h`.
    pub fn create_packet_nus<R: Rng + ?Sized>(
        &self,
        temperature: f64,
        no_of_packets: usize,
        rng: &mut R,
    ) -> Vec<f64> {
        let l_array: Vec<f64> = (1..self.l_samples)
            .scan(0.0, |total, l| {
                *total += (l as f64).powi(-4);
                Some(*total)
            })
            .collect();
        let l_coef = PI.powi(4) / 90.0;
        let scale = K_B * temperature / H;

        (0..no_of_packets)
            .map(|_| {
                let target = rng.gen::<f64>() * l_coef;
                let l = l_array.partition_point(|v| *v < target) as f64 + 1.0;
                let xis_prod: f64 = (0..4).map(|_| 1.0 - rng.gen::<f64>()).product();
                -xis_prod.ln() / l * scale
            })
            .collect()
    }
}

/// `mu = sqrt(xi)`, the flux-weighted distribution of an isotropic emitter.
pub fn create_packet_mus<R: Rng + ?Sized>(no_of_packets: usize, rng: &mut R) -> Vec<f64> {
    (0..no_of_packets).map(|_| rng.gen::<f64>().sqrt()).collect()
}

/// Equal energies that sum to one.
pub fn create_packet_energies(no_of_packets: usize) -> Vec<f64> {
    vec![1.0 / no_of_packets as f64; no_of_packets]
}

/// Time over which the packets carry the inner boundary luminosity [s].
///
/// Packet energies sum to one, so this is `1 / L_inner`.
pub fn time_of_simulation(t_inner: f64, r_inner: f64) -> f64 {
    1.0 / luminosity_from_t_inner(t_inner, r_inner)
}
