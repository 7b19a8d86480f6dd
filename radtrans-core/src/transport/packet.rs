//! Real packets: indivisible energy parcels followed through the ejecta.

use super::frame::get_doppler_factor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketStatus {
    InProcess,
    /// Left through the outer boundary
    Emitted,
    /// Returned into the photosphere through the inner boundary
    Reabsorbed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    Boundary,
    Line,
    EScattering,
}

impl InteractionType {
    /// Integer code written to the interaction history.
    pub fn code(&self) -> i64 {
        match self {
            InteractionType::Boundary => 1,
            InteractionType::Line => 2,
            InteractionType::EScattering => 3,
        }
    }
}

/// A Monte Carlo packet in the lab frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RPacket {
    /// Radius [cm]
    pub r: f64,
    /// Cosine of the angle between the direction of flight and the radial direction
    pub mu: f64,
    /// Frequency [Hz]
    pub nu: f64,
    /// Energy in units of the total packet energy
    pub energy: f64,
    /// Index of the next line (in descending frequency order) the packet can come into resonance with
    pub next_line_id: usize,
    pub current_shell_id: usize,
    pub status: PacketStatus,
    pub index: usize,
    pub last_interaction_type: Option<InteractionType>,
    pub last_interaction_in_nu: f64,
    pub last_line_interaction_in_id: Option<usize>,
    pub last_line_interaction_out_id: Option<usize>,
    pub last_line_interaction_shell_id: Option<usize>,
}

impl RPacket {
    pub fn new(r: f64, mu: f64, nu: f64, energy: f64, index: usize) -> Self {
        Self {
            r,
            mu,
            nu,
            energy,
            next_line_id: 0,
            current_shell_id: 0,
            status: PacketStatus::InProcess,
            index,
            last_interaction_type: None,
            last_interaction_in_nu: 0.0,
            last_line_interaction_in_id: None,
            last_line_interaction_out_id: None,
            last_line_interaction_shell_id: None,
        }
    }

    /// Finds the first line strictly redwards of the packet's comoving frequency.
    ///
    /// `line_list_nu` is sorted in descending order. A line exactly at the
    /// comoving frequency counts as already passed.
    pub fn initialize_line_id(
        &mut self,
        line_list_nu: &[f64],
        time_explosion: f64,
        full_relativity: bool,
    ) {
        let doppler_factor = get_doppler_factor(self.r, self.mu, time_explosion, full_relativity);
        let comov_nu = self.nu * doppler_factor;
        self.next_line_id = line_list_nu.partition_point(|nu_line| *nu_line >= comov_nu);
    }
}

/// Initial properties of the packets injected at the inner boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PacketCollection {
    pub radii: Vec<f64>,
    pub nus: Vec<f64>,
    pub mus: Vec<f64>,
    pub energies: Vec<f64>,
}

impl PacketCollection {
    pub fn len(&self) -> usize {
        self.nus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nus.is_empty()
    }

    pub fn packet(&self, index: usize) -> RPacket {
        RPacket::new(
            self.radii[index],
            self.mus[index],
            self.nus[index],
            self.energies[index],
            index,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_line_id() {
        let lines = [5.0e15, 4.0e15, 3.0e15, 2.0e15];
        // At r = 0 the comoving and lab frequencies coincide
        let mut packet = RPacket::new(0.0, 0.5, 3.5e15, 1.0, 0);
        packet.initialize_line_id(&lines, 1.0, false);
        assert_eq!(packet.next_line_id, 2);

        let mut packet = RPacket::new(0.0, 0.5, 1.0e15, 1.0, 0);
        packet.initialize_line_id(&lines, 1.0, false);
        assert_eq!(packet.next_line_id, 4);

        let mut packet = RPacket::new(0.0, 0.5, 6.0e15, 1.0, 0);
        packet.initialize_line_id(&lines, 1.0, false);
        assert_eq!(packet.next_line_id, 0);
    }

    #[test]
    fn test_line_at_comoving_frequency_is_skipped() {
        let lines = [5.0e15, 4.0e15, 3.0e15];
        let mut packet = RPacket::new(0.0, 0.5, 4.0e15, 1.0, 0);
        packet.initialize_line_id(&lines, 1.0, false);
        assert_eq!(packet.next_line_id, 2);
    }
}
