//! The Monte Carlo packet loop.

use super::configuration::MonteCarloConfiguration;
use super::estimators::Estimators;
use super::frame::{angle_aberration_cmf_to_lf, get_inverse_doppler_factor};
use super::interaction::{line_scatter, thomson_scatter};
use super::opacity::OpacityState;
use super::packet::{InteractionType, PacketCollection, PacketStatus, RPacket};
use super::trace::{move_packet_across_shell_boundary, move_r_packet, trace_packet};
use super::tracker::{LastInteraction, RPacketTracker};
use super::vpacket::{trace_vpacket_volley, VPacketCollection};
use crate::errors::{RadTransError, RadTransResult};
use crate::geometry::GeometryState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

/// Everything the packet loop produces in one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOutput {
    /// Lab frequency of every packet when it left the ejecta [Hz]
    pub output_nus: Vec<f64>,
    /// Packet energies, negative for reabsorbed packets
    pub output_energies: Vec<f64>,
    pub estimators: Estimators,
    pub last_interactions: Vec<LastInteraction>,
    pub vpackets: VPacketCollection,
    /// One entry per packet when tracking is enabled
    pub trackers: Vec<RPacketTracker>,
}

impl TransportOutput {
    pub fn no_of_emitted(&self) -> usize {
        self.output_energies.iter().filter(|e| **e >= 0.0).count()
    }

    pub fn no_of_reabsorbed(&self) -> usize {
        self.output_energies.iter().filter(|e| **e < 0.0).count()
    }
}

/// Per-thread accumulator of the packet loop
struct LocalTransport {
    estimators: Estimators,
    vpackets: VPacketCollection,
    packets: Vec<(usize, f64, f64, LastInteraction)>,
    trackers: Vec<RPacketTracker>,
}

impl LocalTransport {
    fn new(no_of_shells: usize, no_of_lines: usize) -> Self {
        Self {
            estimators: Estimators::new(no_of_shells, no_of_lines),
            vpackets: VPacketCollection::default(),
            packets: Vec::new(),
            trackers: Vec::new(),
        }
    }

    fn merge(mut self, other: LocalTransport) -> Self {
        self.estimators += &other.estimators;
        self.vpackets.extend(other.vpackets);
        self.packets.extend(other.packets);
        self.trackers.extend(other.trackers);
        self
    }
}

/// Random stream of packet `index`, independent of how packets are split over threads.
pub fn packet_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}

/// Transforms the injected packet from the comoving frame of the photosphere to the lab frame.
fn set_packet_props(packet: &mut RPacket, time_explosion: f64, full_relativity: bool) {
    let inverse_doppler_factor =
        get_inverse_doppler_factor(packet.r, packet.mu, time_explosion, full_relativity);
    packet.nu *= inverse_doppler_factor;
    packet.energy *= inverse_doppler_factor;
    if full_relativity {
        packet.mu = angle_aberration_cmf_to_lf(packet.r, packet.mu, time_explosion);
    }
}

/// Follows a single packet until it is emitted or reabsorbed.
#[allow(clippy::too_many_arguments)]
pub fn single_packet_loop<R: Rng + ?Sized>(
    packet: &mut RPacket,
    geometry: &GeometryState,
    opacity: &OpacityState,
    estimators: &mut Estimators,
    vpackets: &mut VPacketCollection,
    mut tracker: Option<&mut RPacketTracker>,
    config: &MonteCarloConfiguration,
    rng: &mut R,
) -> RadTransResult<()> {
    let time_explosion = geometry.time_explosion;
    let full_relativity = config.full_relativity;

    set_packet_props(packet, time_explosion, full_relativity);
    packet.initialize_line_id(&opacity.line_list_nu, time_explosion, full_relativity);
    trace_vpacket_volley(packet, vpackets, geometry, opacity, config, rng)?;

    if let Some(tracker) = tracker.as_deref_mut() {
        tracker.track(packet, None);
    }

    while packet.status == PacketStatus::InProcess {
        let trace = trace_packet(packet, geometry, opacity, estimators, config, rng)?;
        match trace.interaction_type {
            InteractionType::Boundary => {
                move_r_packet(packet, trace.distance, time_explosion, estimators, full_relativity);
                move_packet_across_shell_boundary(packet, trace.delta_shell, geometry.no_of_shells());
            }
            InteractionType::Line => {
                packet.last_interaction_type = Some(InteractionType::Line);
                move_r_packet(packet, trace.distance, time_explosion, estimators, full_relativity);
                line_scatter(packet, time_explosion, opacity, config, rng)?;
                trace_vpacket_volley(packet, vpackets, geometry, opacity, config, rng)?;
            }
            InteractionType::EScattering => {
                packet.last_interaction_type = Some(InteractionType::EScattering);
                move_r_packet(packet, trace.distance, time_explosion, estimators, full_relativity);
                thomson_scatter(packet, time_explosion, full_relativity, rng);
                trace_vpacket_volley(packet, vpackets, geometry, opacity, config, rng)?;
            }
        }
        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.track(packet, Some(trace.interaction_type));
        }
    }
    Ok(())
}

/// Propagates every packet through the ejecta in parallel.
///
/// Packet `i` draws from stream `i` of a generator seeded with `seed`, so the
/// packet histories do not depend on the number of threads.
pub fn montecarlo_main_loop(
    packets: &PacketCollection,
    geometry: &GeometryState,
    opacity: &OpacityState,
    config: &MonteCarloConfiguration,
    seed: u64,
) -> RadTransResult<TransportOutput> {
    if opacity.no_of_shells() != geometry.no_of_shells() {
        return Err(RadTransError::PlasmaShape {
            name: "electron_density".to_string(),
            expected: geometry.no_of_shells().to_string(),
            found: opacity.no_of_shells().to_string(),
        });
    }
    let no_of_packets = packets.len();
    let no_of_shells = geometry.no_of_shells();
    let no_of_lines = opacity.no_of_lines();
    info!(no_of_packets, no_of_shells, no_of_lines, "Running Monte Carlo transport");

    let run = || {
        (0..no_of_packets)
            .into_par_iter()
            .try_fold(
                || LocalTransport::new(no_of_shells, no_of_lines),
                |mut local, index| -> RadTransResult<LocalTransport> {
                    let mut rng = packet_rng(seed, index);
                    let mut packet = packets.packet(index);
                    let mut tracker = config.tracking.then(|| RPacketTracker::new(index));
                    single_packet_loop(
                        &mut packet,
                        geometry,
                        opacity,
                        &mut local.estimators,
                        &mut local.vpackets,
                        tracker.as_mut(),
                        config,
                        &mut rng,
                    )?;
                    let energy = match packet.status {
                        PacketStatus::Reabsorbed => -packet.energy,
                        _ => packet.energy,
                    };
                    local
                        .packets
                        .push((index, packet.nu, energy, LastInteraction::from(&packet)));
                    local.trackers.extend(tracker);
                    Ok(local)
                },
            )
            .try_reduce(
                || LocalTransport::new(no_of_shells, no_of_lines),
                |a, b| Ok(a.merge(b)),
            )
    };

    let local = if config.no_of_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.no_of_threads)
            .build()
            .map_err(|e| RadTransError::MonteCarlo(format!("cannot build thread pool: {e}")))?
            .install(run)?
    } else {
        run()?
    };

    let mut output_nus = vec![0.0; no_of_packets];
    let mut output_energies = vec![0.0; no_of_packets];
    let mut last_interactions = vec![LastInteraction::default(); no_of_packets];
    for (index, nu, energy, last) in local.packets {
        output_nus[index] = nu;
        output_energies[index] = energy;
        last_interactions[index] = last;
    }
    let mut trackers = local.trackers;
    trackers.sort_by_key(|tracker| tracker.index);

    let output = TransportOutput {
        output_nus,
        output_energies,
        estimators: local.estimators,
        last_interactions,
        vpackets: local.vpackets,
        trackers,
    };
    debug!(
        emitted = output.no_of_emitted(),
        reabsorbed = output.no_of_reabsorbed(),
        virtual_packets = output.vpackets.len(),
        "Monte Carlo transport finished"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::configuration::LineInteractionType;
    use crate::transport::source::BlackBodySimpleSource;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn geometry() -> GeometryState {
        GeometryState {
            r_inner: array![1e14, 2e14],
            r_outer: array![2e14, 3e14],
            v_inner: array![1e8, 2e8],
            v_outer: array![2e8, 3e8],
            time_explosion: 1e6,
        }
    }

    fn empty_opacity() -> OpacityState {
        OpacityState::new(vec![], Array2::zeros((0, 2)), array![0.0, 0.0], None).unwrap()
    }

    #[test]
    fn test_empty_ejecta_emit_everything() {
        let packets = BlackBodySimpleSource::new(1).create_packets(10_000.0, 200, 1e14, 0);
        let config = MonteCarloConfiguration {
            line_interaction_type: LineInteractionType::Scatter,
            ..Default::default()
        };
        let output = montecarlo_main_loop(&packets, &geometry(), &empty_opacity(), &config, 5).unwrap();
        assert_eq!(output.no_of_emitted(), 200);
        assert_eq!(output.no_of_reabsorbed(), 0);
        assert!(output.estimators.j_estimator.iter().all(|j| *j > 0.0));
        assert!(output.last_interactions.iter().all(|l| l.interaction_type.is_none()));
    }

    #[test]
    fn test_results_independent_of_threads() {
        let packets = BlackBodySimpleSource::new(1).create_packets(10_000.0, 100, 1e14, 0);
        let opacity = OpacityState::new(vec![], Array2::zeros((0, 2)), array![5e10, 5e10], None).unwrap();
        let mut config = MonteCarloConfiguration {
            tracking: true,
            no_of_threads: 1,
            ..Default::default()
        };
        let serial = montecarlo_main_loop(&packets, &geometry(), &opacity, &config, 9).unwrap();
        config.no_of_threads = 4;
        let parallel = montecarlo_main_loop(&packets, &geometry(), &opacity, &config, 9).unwrap();

        assert_eq!(serial.output_nus, parallel.output_nus);
        assert_eq!(serial.output_energies, parallel.output_energies);
        assert_eq!(serial.trackers, parallel.trackers);
        assert_relative_eq!(
            serial.estimators.j_estimator[0],
            parallel.estimators.j_estimator[0],
            max_relative = 1e-10
        );
        assert!(serial.no_of_reabsorbed() > 0);
        assert!(serial.trackers.iter().all(|t| t.steps.len() >= 2));
    }

    #[test]
    fn test_shape_mismatch() {
        let packets = BlackBodySimpleSource::new(1).create_packets(10_000.0, 10, 1e14, 0);
        let opacity = OpacityState::new(vec![], Array2::zeros((0, 1)), array![0.0], None).unwrap();
        assert!(montecarlo_main_loop(
            &packets,
            &geometry(),
            &opacity,
            &MonteCarloConfiguration::default(),
            1
        )
        .is_err());
    }
}
