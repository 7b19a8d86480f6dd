//! Volume-based Monte Carlo estimators of the radiation field.

use super::packet::RPacket;
use crate::constants::C;
use crate::radiation_field::{estimate_j_blues, estimate_radiation_field, DilutePlanckianRadiationField};
use ndarray::{Array1, Array2};
use std::ops::AddAssign;

/// Path-length weighted sums collected while packets move through the ejecta.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimators {
    /// Sum of comoving energy times path length, per shell
    pub j_estimator: Array1<f64>,
    /// Same sum additionally weighted by the comoving frequency, per shell
    pub nu_bar_estimator: Array1<f64>,
    /// Energy over frequency of packets redshifting through a line, lines x shells
    pub j_blue_estimator: Array2<f64>,
    /// Energy of packets redshifting through a line, lines x shells
    pub edotlu_estimator: Array2<f64>,
}

impl Estimators {
    pub fn new(no_of_shells: usize, no_of_lines: usize) -> Self {
        Self {
            j_estimator: Array1::zeros(no_of_shells),
            nu_bar_estimator: Array1::zeros(no_of_shells),
            j_blue_estimator: Array2::zeros((no_of_lines, no_of_shells)),
            edotlu_estimator: Array2::zeros((no_of_lines, no_of_shells)),
        }
    }

    /// Records a packet redshifting through line `line_id` after `distance_trace`.
    pub fn update_line_estimators(
        &mut self,
        packet: &RPacket,
        line_id: usize,
        distance_trace: f64,
        time_explosion: f64,
        full_relativity: bool,
    ) {
        let energy = if full_relativity {
            calc_packet_energy_full_relativity(packet, distance_trace, time_explosion)
        } else {
            calc_packet_energy(packet, distance_trace, time_explosion)
        };
        let index = [line_id, packet.current_shell_id];
        self.j_blue_estimator[index] += energy / packet.nu;
        self.edotlu_estimator[index] += energy;
    }

    /// Radiation temperature and dilution factor implied by `j` and `nu_bar`.
    pub fn radiation_field(
        &self,
        time_of_simulation: f64,
        volume: &Array1<f64>,
    ) -> DilutePlanckianRadiationField {
        estimate_radiation_field(
            &self.j_estimator,
            &self.nu_bar_estimator,
            time_of_simulation,
            volume,
        )
    }

    /// Mean intensity in the blue wing of every line.
    pub fn j_blues(
        &self,
        time_explosion: f64,
        time_of_simulation: f64,
        volume: &Array1<f64>,
    ) -> Array2<f64> {
        estimate_j_blues(&self.j_blue_estimator, time_explosion, time_of_simulation, volume)
    }
}

impl AddAssign<&Estimators> for Estimators {
    fn add_assign(&mut self, other: &Estimators) {
        self.j_estimator += &other.j_estimator;
        self.nu_bar_estimator += &other.nu_bar_estimator;
        self.j_blue_estimator += &other.j_blue_estimator;
        self.edotlu_estimator += &other.edotlu_estimator;
    }
}

/// Comoving energy of the packet at the point where it meets the line.
fn calc_packet_energy(packet: &RPacket, distance_trace: f64, time_explosion: f64) -> f64 {
    let doppler_factor =
        1.0 - (distance_trace + packet.mu * packet.r) / (time_explosion * C);
    packet.energy * doppler_factor
}

fn calc_packet_energy_full_relativity(
    packet: &RPacket,
    distance_trace: f64,
    time_explosion: f64,
) -> f64 {
    let r = (packet.r * packet.r
        + distance_trace * distance_trace
        + 2.0 * packet.r * distance_trace * packet.mu)
        .sqrt();
    let mu = (packet.mu * packet.r + distance_trace) / r;
    let beta = r / (time_explosion * C);
    packet.energy * (1.0 - mu * beta) / (1.0 - beta * beta).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_line_estimators() {
        let mut estimators = Estimators::new(2, 3);
        let mut packet = RPacket::new(1e14, 0.5, 1e15, 0.1, 0);
        packet.current_shell_id = 1;
        let t_exp = 1e6;
        estimators.update_line_estimators(&packet, 2, 1e13, t_exp, false);

        let doppler = 1.0 - (1e13 + 0.5 * 1e14) / (t_exp * C);
        assert_relative_eq!(estimators.edotlu_estimator[[2, 1]], 0.1 * doppler);
        assert_relative_eq!(estimators.j_blue_estimator[[2, 1]], 0.1 * doppler / 1e15);
        assert_eq!(estimators.edotlu_estimator[[2, 0]], 0.0);
    }

    #[test]
    fn test_full_relativity_agrees_at_low_velocity() {
        let packet = RPacket::new(1e10, 0.5, 1e15, 1.0, 0);
        let partial = calc_packet_energy(&packet, 1e9, 1e6);
        let full = calc_packet_energy_full_relativity(&packet, 1e9, 1e6);
        assert_relative_eq!(partial, full, max_relative = 1e-6);
    }

    #[test]
    fn test_merge() {
        let mut a = Estimators::new(2, 1);
        let mut b = Estimators::new(2, 1);
        a.j_estimator[0] = 1.0;
        b.j_estimator[0] = 2.0;
        b.edotlu_estimator[[0, 1]] = 3.0;
        a += &b;
        assert_eq!(a.j_estimator[0], 3.0);
        assert_eq!(a.edotlu_estimator[[0, 1]], 3.0);
    }
}
