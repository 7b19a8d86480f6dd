//! Virtual packets for a low-noise spectrum.
//!
//! At injection and after every interaction a real packet spawns a volley of
//! virtual packets in directions that escape the ejecta without hitting the
//! photosphere. Each one is traced to the surface without interacting and
//! contributes its energy attenuated by `exp(-tau)` along its path.

use super::configuration::MonteCarloConfiguration;
use super::distance::{calculate_distance_boundary, calculate_distance_line, calculate_tau_electron};
use super::frame::{angle_aberration_cmf_to_lf, get_doppler_factor};
use super::opacity::OpacityState;
use super::packet::{PacketStatus, RPacket};
use super::trace::cross_shell_boundary;
use crate::errors::RadTransResult;
use crate::geometry::GeometryState;
use rand::Rng;

/// A packet that is traced without interacting.
#[derive(Debug, Clone, PartialEq)]
pub struct VPacket {
    pub r: f64,
    pub mu: f64,
    pub nu: f64,
    pub energy: f64,
    pub current_shell_id: usize,
    pub next_line_id: usize,
    pub status: PacketStatus,
    pub index: usize,
}

/// Escaped virtual packets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VPacketCollection {
    pub nus: Vec<f64>,
    pub energies: Vec<f64>,
}

impl VPacketCollection {
    pub fn push(&mut self, nu: f64, energy: f64) {
        self.nus.push(nu);
        self.energies.push(energy);
    }

    pub fn extend(&mut self, other: VPacketCollection) {
        self.nus.extend(other.nus);
        self.energies.extend(other.energies);
    }

    pub fn len(&self) -> usize {
        self.nus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nus.is_empty()
    }
}

/// Optical depth accumulated until the virtual packet leaves its shell.
///
/// Returns the optical depth, the distance to the boundary and the shell change.
pub fn trace_vpacket_within_shell(
    vpacket: &mut VPacket,
    geometry: &GeometryState,
    opacity: &OpacityState,
    config: &MonteCarloConfiguration,
) -> RadTransResult<(f64, f64, i64)> {
    let shell = vpacket.current_shell_id;
    let (distance_boundary, delta_shell) = calculate_distance_boundary(
        vpacket.r,
        vpacket.mu,
        geometry.r_inner[shell],
        geometry.r_outer[shell],
    );

    let electron_density = if config.disable_electron_scattering {
        0.0
    } else {
        opacity.electron_density[shell]
    };
    let doppler_factor = get_doppler_factor(
        vpacket.r,
        vpacket.mu,
        geometry.time_explosion,
        config.full_relativity,
    );
    let comov_nu = vpacket.nu * doppler_factor;

    let mut tau_trace_combined = calculate_tau_electron(electron_density, distance_boundary);

    let no_of_lines = opacity.line_list_nu.len();
    let mut cur_line_id = vpacket.next_line_id;
    let mut reached_boundary = false;
    for line_id in vpacket.next_line_id..no_of_lines {
        cur_line_id = line_id;
        let distance_trace_line = calculate_distance_line(
            vpacket.r,
            vpacket.mu,
            vpacket.nu,
            comov_nu,
            opacity.line_list_nu[line_id],
            geometry.time_explosion,
            config.full_relativity,
        )?;
        if distance_boundary <= distance_trace_line {
            reached_boundary = true;
            break;
        }
        if !config.disable_line_scattering {
            tau_trace_combined += opacity.tau_sobolev[[line_id, shell]];
        }
    }
    if !reached_boundary && no_of_lines > 0 && cur_line_id == no_of_lines - 1 {
        cur_line_id += 1;
    }
    vpacket.next_line_id = cur_line_id;

    Ok((tau_trace_combined, distance_boundary, delta_shell))
}

/// Total optical depth between the virtual packet and the outer boundary.
pub fn trace_vpacket(
    vpacket: &mut VPacket,
    geometry: &GeometryState,
    opacity: &OpacityState,
    config: &MonteCarloConfiguration,
) -> RadTransResult<f64> {
    let mut tau_trace_combined = 0.0;
    loop {
        let (tau_shell, distance_boundary, delta_shell) =
            trace_vpacket_within_shell(vpacket, geometry, opacity, config)?;
        tau_trace_combined += tau_shell;

        let (status, shell) =
            cross_shell_boundary(vpacket.current_shell_id, delta_shell, geometry.no_of_shells());
        vpacket.status = status;
        vpacket.current_shell_id = shell;
        if vpacket.status != PacketStatus::InProcess {
            break;
        }

        let r = vpacket.r;
        let new_r = (r * r
            + distance_boundary * distance_boundary
            + 2.0 * r * distance_boundary * vpacket.mu)
            .sqrt();
        vpacket.mu = (vpacket.mu * r + distance_boundary) / new_r;
        vpacket.r = new_r;
    }
    Ok(tau_trace_combined)
}

/// Spawns and traces a volley of virtual packets from the current state of `packet`.
pub fn trace_vpacket_volley<R: Rng + ?Sized>(
    packet: &RPacket,
    collection: &mut VPacketCollection,
    geometry: &GeometryState,
    opacity: &OpacityState,
    config: &MonteCarloConfiguration,
    rng: &mut R,
) -> RadTransResult<()> {
    let settings = &config.virtual_packets;
    let no_of_vpackets = settings.no_of_virtual_packets;
    if no_of_vpackets == 0
        || packet.nu < settings.spawn_start_frequency
        || packet.nu > settings.spawn_end_frequency
    {
        return Ok(());
    }

    let time_explosion = geometry.time_explosion;
    let r_photosphere = geometry.r_inner[0];
    let (mu_min, on_inner_boundary) = if packet.r > r_photosphere {
        let r_inner_over_r = r_photosphere / packet.r;
        (-(1.0 - r_inner_over_r * r_inner_over_r).sqrt(), false)
    } else {
        (0.0, true)
    };
    let mu_bin = (1.0 - mu_min) / no_of_vpackets as f64;
    let packet_doppler_factor =
        get_doppler_factor(packet.r, packet.mu, time_explosion, config.full_relativity);

    for i in 0..no_of_vpackets {
        let mut mu = mu_min + i as f64 * mu_bin + rng.gen::<f64>() * mu_bin;
        // Weights follow Kerzendorf & Sim (2014)
        let weight = if on_inner_boundary {
            2.0 * mu / no_of_vpackets as f64
        } else {
            (1.0 - mu_min) / (2.0 * no_of_vpackets as f64)
        };
        if config.full_relativity {
            mu = angle_aberration_cmf_to_lf(packet.r, mu, time_explosion);
        }
        let vpacket_doppler_factor =
            get_doppler_factor(packet.r, mu, time_explosion, config.full_relativity);
        let doppler_factor_ratio = packet_doppler_factor / vpacket_doppler_factor;

        let mut vpacket = VPacket {
            r: packet.r,
            mu,
            nu: packet.nu * doppler_factor_ratio,
            energy: packet.energy * weight * doppler_factor_ratio,
            current_shell_id: packet.current_shell_id,
            next_line_id: packet.next_line_id,
            status: PacketStatus::InProcess,
            index: i,
        };
        let tau_vpacket = trace_vpacket(&mut vpacket, geometry, opacity, config)?;
        if vpacket.status == PacketStatus::Emitted {
            collection.push(vpacket.nu, vpacket.energy * (-tau_vpacket).exp());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::configuration::VirtualPacketConfiguration;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn geometry() -> GeometryState {
        GeometryState {
            r_inner: array![1e14, 2e14],
            r_outer: array![2e14, 3e14],
            v_inner: array![1e8, 2e8],
            v_outer: array![2e8, 3e8],
            time_explosion: 1e6,
        }
    }

    fn config(n: usize) -> MonteCarloConfiguration {
        MonteCarloConfiguration {
            virtual_packets: VirtualPacketConfiguration {
                no_of_virtual_packets: n,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_transparent_vpacket_escapes_unattenuated() {
        let opacity =
            OpacityState::new(vec![1e10], Array2::zeros((1, 2)), array![0.0, 0.0], None).unwrap();
        let mut vpacket = VPacket {
            r: 1e14,
            mu: 1.0,
            nu: 1e15,
            energy: 1.0,
            current_shell_id: 0,
            next_line_id: 0,
            status: PacketStatus::InProcess,
            index: 0,
        };
        let tau = trace_vpacket(&mut vpacket, &geometry(), &opacity, &config(1)).unwrap();
        assert_eq!(tau, 0.0);
        assert_eq!(vpacket.status, PacketStatus::Emitted);
        assert_eq!(vpacket.current_shell_id, 1);
    }

    #[test]
    fn test_electron_optical_depth() {
        let opacity =
            OpacityState::new(vec![1e10], Array2::zeros((1, 2)), array![1e8, 2e8], None).unwrap();
        let mut vpacket = VPacket {
            r: 1e14,
            mu: 1.0,
            nu: 1e15,
            energy: 1.0,
            current_shell_id: 0,
            next_line_id: 0,
            status: PacketStatus::InProcess,
            index: 0,
        };
        let tau = trace_vpacket(&mut vpacket, &geometry(), &opacity, &config(1)).unwrap();
        let expected = calculate_tau_electron(1e8, 1e14) + calculate_tau_electron(2e8, 1e14);
        assert_relative_eq!(tau, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_volley_from_photosphere() {
        let opacity =
            OpacityState::new(vec![1e10], Array2::zeros((1, 2)), array![0.0, 0.0], None).unwrap();
        let packet = RPacket::new(1e14, 0.5, 1e15, 1.0, 0);
        let mut collection = VPacketCollection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        trace_vpacket_volley(&packet, &mut collection, &geometry(), &opacity, &config(10), &mut rng)
            .unwrap();
        assert_eq!(collection.len(), 10);
        // Weights 2 mu / N integrate to about one over the outward hemisphere
        let total: f64 = collection.energies.iter().sum();
        assert!((total - 1.0).abs() < 0.1, "total {total}");
    }

    #[test]
    fn test_volley_outside_spawn_range() {
        let opacity =
            OpacityState::new(vec![1e10], Array2::zeros((1, 2)), array![0.0, 0.0], None).unwrap();
        let packet = RPacket::new(1e14, 0.5, 1e15, 1.0, 0);
        let mut collection = VPacketCollection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut config = config(10);
        config.virtual_packets.spawn_end_frequency = 1e14;
        trace_vpacket_volley(&packet, &mut collection, &geometry(), &opacity, &config, &mut rng)
            .unwrap();
        assert!(collection.is_empty());
    }
}
