//! Scattering and line interaction events of real packets.

use super::configuration::{LineInteractionType, MonteCarloConfiguration};
use super::frame::{angle_aberration_cmf_to_lf, get_doppler_factor, get_inverse_doppler_factor};
use super::macro_atom::macro_atom;
use super::opacity::OpacityState;
use super::packet::RPacket;
use crate::errors::{RadTransError, RadTransResult};
use rand::Rng;

/// Isotropic direction cosine
pub fn get_random_mu<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    2.0 * rng.gen::<f64>() - 1.0
}

/// Redirects the packet isotropically in the comoving frame.
///
/// Comoving frequency and energy are conserved, the lab frame values change
/// with the new direction.
fn scatter_isotropically<R: Rng + ?Sized>(
    packet: &mut RPacket,
    time_explosion: f64,
    full_relativity: bool,
    rng: &mut R,
) -> f64 {
    let old_doppler_factor = get_doppler_factor(packet.r, packet.mu, time_explosion, full_relativity);
    let comov_nu = packet.nu * old_doppler_factor;
    let comov_energy = packet.energy * old_doppler_factor;

    packet.mu = get_random_mu(rng);
    let inverse_new_doppler_factor =
        get_inverse_doppler_factor(packet.r, packet.mu, time_explosion, full_relativity);
    packet.energy = comov_energy * inverse_new_doppler_factor;
    if full_relativity {
        packet.mu = angle_aberration_cmf_to_lf(packet.r, packet.mu, time_explosion);
    }
    comov_nu * inverse_new_doppler_factor
}

/// Thomson scattering off a free electron.
pub fn thomson_scatter<R: Rng + ?Sized>(
    packet: &mut RPacket,
    time_explosion: f64,
    full_relativity: bool,
    rng: &mut R,
) {
    packet.nu = scatter_isotropically(packet, time_explosion, full_relativity, rng);
}

/// Absorption in line `next_line_id` followed by re-emission.
///
/// Depending on the line interaction type the packet is re-emitted in the
/// same line, in an emission line of the upper level or in the line the
/// macro atom ends its cascade in.
pub fn line_scatter<R: Rng + ?Sized>(
    packet: &mut RPacket,
    time_explosion: f64,
    opacity: &OpacityState,
    config: &MonteCarloConfiguration,
    rng: &mut R,
) -> RadTransResult<()> {
    scatter_isotropically(packet, time_explosion, config.full_relativity, rng);

    let emission_line_id = match config.line_interaction_type {
        LineInteractionType::Scatter => packet.next_line_id,
        LineInteractionType::Downbranch | LineInteractionType::Macroatom => {
            let state = opacity.macro_atom.as_ref().ok_or_else(|| {
                RadTransError::MonteCarlo(
                    "macro atom data is required for downbranch and macroatom line interaction"
                        .to_string(),
                )
            })?;
            let activation_level_id = state.line2macro_level_upper[packet.next_line_id];
            let (line_id, _) = macro_atom(
                activation_level_id,
                packet.current_shell_id,
                state,
                config.max_macro_atom_jumps,
                rng,
            )?;
            line_id
        }
    };
    line_emission(
        packet,
        emission_line_id,
        time_explosion,
        &opacity.line_list_nu,
        config.full_relativity,
    );
    Ok(())
}

/// Sets the lab frequency to that of `emission_line_id` in the current direction.
pub fn line_emission(
    packet: &mut RPacket,
    emission_line_id: usize,
    time_explosion: f64,
    line_list_nu: &[f64],
    full_relativity: bool,
) {
    let doppler_factor = get_doppler_factor(packet.r, packet.mu, time_explosion, full_relativity);
    packet.nu = line_list_nu[emission_line_id] / doppler_factor;
    packet.next_line_id = emission_line_id + 1;
    packet.last_line_interaction_out_id = Some(emission_line_id);
}
