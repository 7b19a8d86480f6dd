//! Propagation of real packets through a shell.

use super::configuration::MonteCarloConfiguration;
use super::distance::{
    calculate_distance_boundary, calculate_distance_electron, calculate_distance_line,
    calculate_tau_electron,
};
use super::estimators::Estimators;
use super::frame::get_doppler_factor;
use super::opacity::OpacityState;
use super::packet::{InteractionType, PacketStatus, RPacket};
use crate::constants::MISS_DISTANCE;
use crate::errors::RadTransResult;
use crate::geometry::GeometryState;
use rand::Rng;
use rand_distr::Exp1;

/// Outcome of tracing a packet to its next event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    pub distance: f64,
    pub interaction_type: InteractionType,
    /// Shell change if the event is a boundary crossing
    pub delta_shell: i64,
}

/// Finds the next event of a packet within its current shell.
///
/// An optical depth is drawn and the lines the packet redshifts through are
/// accumulated in order until the combined line and electron optical depth
/// exceeds it, or the shell boundary or an electron scattering event comes
/// first. Lines passed without interaction update the line estimators.
/// On return `next_line_id` is the interacting line for a line event and
/// the first line not yet passed otherwise.
pub fn trace_packet<R: Rng + ?Sized>(
    packet: &mut RPacket,
    geometry: &GeometryState,
    opacity: &OpacityState,
    estimators: &mut Estimators,
    config: &MonteCarloConfiguration,
    rng: &mut R,
) -> RadTransResult<TraceResult> {
    let shell = packet.current_shell_id;
    let time_explosion = geometry.time_explosion;
    let (distance_boundary, delta_shell) = calculate_distance_boundary(
        packet.r,
        packet.mu,
        geometry.r_inner[shell],
        geometry.r_outer[shell],
    );

    let start_line_id = packet.next_line_id;
    let no_of_lines = opacity.line_list_nu.len();

    let tau_event: f64 = rng.sample(Exp1);
    let mut tau_trace_line_combined = 0.0;

    let cur_electron_density = if config.disable_electron_scattering {
        0.0
    } else {
        opacity.electron_density[shell]
    };
    let electron_distance = |tau: f64| {
        if config.disable_electron_scattering {
            MISS_DISTANCE
        } else {
            calculate_distance_electron(cur_electron_density, tau)
        }
    };
    let mut distance_electron = electron_distance(tau_event);

    let doppler_factor =
        get_doppler_factor(packet.r, packet.mu, time_explosion, config.full_relativity);
    let comov_nu = packet.nu * doppler_factor;

    let mut cur_line_id = start_line_id;
    let mut event = None;

    for line_id in start_line_id..no_of_lines {
        cur_line_id = line_id;
        let nu_line = opacity.line_list_nu[line_id];
        let tau_trace_line = opacity.tau_sobolev[[line_id, shell]];
        tau_trace_line_combined += tau_trace_line;

        let distance_trace = calculate_distance_line(
            packet.r,
            packet.mu,
            packet.nu,
            comov_nu,
            nu_line,
            time_explosion,
            config.full_relativity,
        )?;
        let tau_trace_electron = calculate_tau_electron(cur_electron_density, distance_trace);
        let tau_trace_combined = tau_trace_line_combined + tau_trace_electron;

        if distance_boundary <= distance_trace && distance_boundary <= distance_electron {
            event = Some((distance_boundary, InteractionType::Boundary));
            break;
        }

        if distance_electron < distance_trace && distance_electron < distance_boundary {
            event = Some((distance_electron, InteractionType::EScattering));
            break;
        }

        if tau_trace_combined > tau_event && !config.disable_line_scattering {
            packet.last_interaction_in_nu = packet.nu;
            packet.last_line_interaction_in_id = Some(line_id);
            packet.last_line_interaction_shell_id = Some(shell);
            event = Some((distance_trace, InteractionType::Line));
            break;
        }

        estimators.update_line_estimators(
            packet,
            line_id,
            distance_trace,
            time_explosion,
            config.full_relativity,
        );

        distance_electron = electron_distance(tau_event - tau_trace_line_combined);
    }

    let (distance, interaction_type) = match event {
        Some(event) => event,
        None => {
            // Every remaining line has been passed
            if no_of_lines > 0 && cur_line_id == no_of_lines - 1 {
                cur_line_id += 1;
            }
            if distance_electron < distance_boundary {
                (distance_electron, InteractionType::EScattering)
            } else {
                (distance_boundary, InteractionType::Boundary)
            }
        }
    };

    packet.next_line_id = cur_line_id;

    Ok(TraceResult {
        distance,
        interaction_type,
        delta_shell,
    })
}

/// Moves the packet along its direction and updates `j` and `nu_bar`.
pub fn move_r_packet(
    packet: &mut RPacket,
    distance: f64,
    time_explosion: f64,
    estimators: &mut Estimators,
    full_relativity: bool,
) {
    let doppler_factor = get_doppler_factor(packet.r, packet.mu, time_explosion, full_relativity);
    let comov_nu = packet.nu * doppler_factor;
    let comov_energy = packet.energy * doppler_factor;
    let shell = packet.current_shell_id;
    estimators.j_estimator[shell] += comov_energy * distance;
    estimators.nu_bar_estimator[shell] += comov_energy * distance * comov_nu;

    if distance > 0.0 {
        let r = packet.r;
        let new_r = (r * r + distance * distance + 2.0 * r * distance * packet.mu).sqrt();
        packet.mu = (packet.mu * r + distance) / new_r;
        packet.r = new_r;
    }
}

/// Moves the packet into the neighbouring shell or out of the ejecta.
pub fn move_packet_across_shell_boundary(
    packet: &mut RPacket,
    delta_shell: i64,
    no_of_shells: usize,
) {
    let (status, shell) = cross_shell_boundary(packet.current_shell_id, delta_shell, no_of_shells);
    packet.status = status;
    packet.current_shell_id = shell;
}

/// Status and shell index after crossing a boundary. The shell is unchanged
/// if the packet leaves the ejecta.
pub(crate) fn cross_shell_boundary(
    current_shell_id: usize,
    delta_shell: i64,
    no_of_shells: usize,
) -> (PacketStatus, usize) {
    let next_shell_id = current_shell_id as i64 + delta_shell;
    if next_shell_id >= no_of_shells as i64 {
        (PacketStatus::Emitted, current_shell_id)
    } else if next_shell_id < 0 {
        (PacketStatus::Reabsorbed, current_shell_id)
    } else {
        (PacketStatus::InProcess, next_shell_id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIGMA_THOMSON;
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

    fn opacity(tau: f64, electron_density: f64) -> OpacityState {
        OpacityState::new(
            vec![1.0e15, 0.99e15, 0.5e15],
            Array2::from_elem((3, 2), tau),
            array![electron_density, electron_density],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_ejecta_reaches_boundary() {
        let mut packet = RPacket::new(1.5e14, 1.0, 2e15, 1.0, 0);
        let mut estimators = Estimators::new(2, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = MonteCarloConfiguration::default();
        let result = trace_packet(
            &mut packet,
            &geometry(),
            &opacity(0.0, 0.0),
            &mut estimators,
            &config,
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.interaction_type, InteractionType::Boundary);
        assert_eq!(result.delta_shell, 1);
        assert_relative_eq!(result.distance, 0.5e14);
    }

    #[test]
    fn test_opaque_line_interacts() {
        // Comoving frequency just bluewards of the first line
        let mut packet = RPacket::new(1.5e14, 1.0, 1.0e15, 1.0, 0);
        let d = get_doppler_factor(packet.r, packet.mu, 1e6, false);
        packet.nu = 1.0001e15 / d;
        let mut estimators = Estimators::new(2, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let result = trace_packet(
            &mut packet,
            &geometry(),
            &opacity(1e6, 0.0),
            &mut estimators,
            &MonteCarloConfiguration::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.interaction_type, InteractionType::Line);
        assert_eq!(packet.next_line_id, 0);
        assert_eq!(packet.last_line_interaction_in_id, Some(0));
        assert!(estimators.j_blue_estimator.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transparent_lines_update_estimators() {
        let mut packet = RPacket::new(1.5e14, 1.0, 1.0e15, 1.0, 0);
        let d = get_doppler_factor(packet.r, packet.mu, 1e6, false);
        packet.nu = 1.0001e15 / d;
        let mut estimators = Estimators::new(2, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = trace_packet(
            &mut packet,
            &geometry(),
            &opacity(0.0, 0.0),
            &mut estimators,
            &MonteCarloConfiguration::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.interaction_type, InteractionType::Boundary);
        // Line 0 is passed inside the shell, line 1 lies beyond the boundary
        assert!(estimators.edotlu_estimator[[0, 0]] > 0.0);
        assert_eq!(estimators.edotlu_estimator[[1, 0]], 0.0);
        assert_eq!(packet.next_line_id, 1);
    }

    #[test]
    fn test_last_line_passed() {
        let mut packet = RPacket::new(1.5e14, 1.0, 1.0e15, 1.0, 0);
        packet.next_line_id = 3;
        let mut estimators = Estimators::new(2, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = trace_packet(
            &mut packet,
            &geometry(),
            &opacity(0.0, 0.0),
            &mut estimators,
            &MonteCarloConfiguration::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.interaction_type, InteractionType::Boundary);
        assert_eq!(packet.next_line_id, 3);
    }

    #[test]
    fn test_dense_electrons_scatter() {
        let mut packet = RPacket::new(1.5e14, 1.0, 2e15, 1.0, 0);
        let mut estimators = Estimators::new(2, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n_e = 1e3 / (SIGMA_THOMSON * 1e14);
        let result = trace_packet(
            &mut packet,
            &geometry(),
            &opacity(0.0, n_e),
            &mut estimators,
            &MonteCarloConfiguration::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.interaction_type, InteractionType::EScattering);
        assert!(result.distance < 0.5e14);
    }

    #[test]
    fn test_move_packet() {
        let mut packet = RPacket::new(1e14, 0.0, 1e15, 1.0, 0);
        let mut estimators = Estimators::new(2, 0);
        move_r_packet(&mut packet, 1e14, 1e6, &mut estimators, false);
        assert_relative_eq!(packet.r, 2f64.sqrt() * 1e14);
        assert_relative_eq!(packet.mu, 1.0 / 2f64.sqrt());
        assert_relative_eq!(estimators.j_estimator[0], 1e14);
        assert_relative_eq!(estimators.nu_bar_estimator[0], 1e29);
    }

    #[test]
    fn test_move_across_boundary() {
        let mut packet = RPacket::new(1e14, 1.0, 1e15, 1.0, 0);
        move_packet_across_shell_boundary(&mut packet, 1, 2);
        assert_eq!(packet.current_shell_id, 1);
        assert_eq!(packet.status, PacketStatus::InProcess);
        move_packet_across_shell_boundary(&mut packet, 1, 2);
        assert_eq!(packet.status, PacketStatus::Emitted);

        let mut packet = RPacket::new(1e14, -1.0, 1e15, 1.0, 0);
        move_packet_across_shell_boundary(&mut packet, -1, 2);
        assert_eq!(packet.status, PacketStatus::Reabsorbed);
    }
}
