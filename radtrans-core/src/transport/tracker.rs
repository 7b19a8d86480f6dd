//! Interaction history of real packets.

use super::packet::{InteractionType, PacketStatus, RPacket};
use serde::{Deserialize, Serialize};

/// Last interaction of a packet before it left the ejecta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LastInteraction {
    pub interaction_type: Option<InteractionType>,
    /// Lab frequency before the last line absorption [Hz]
    pub in_nu: f64,
    pub line_in_id: Option<usize>,
    pub line_out_id: Option<usize>,
    pub line_shell_id: Option<usize>,
}

impl From<&RPacket> for LastInteraction {
    fn from(packet: &RPacket) -> Self {
        Self {
            interaction_type: packet.last_interaction_type,
            in_nu: packet.last_interaction_in_nu,
            line_in_id: packet.last_line_interaction_in_id,
            line_out_id: packet.last_line_interaction_out_id,
            line_shell_id: packet.last_line_interaction_shell_id,
        }
    }
}

/// Snapshot of a packet after one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketSnapshot {
    pub status: PacketStatus,
    pub r: f64,
    pub nu: f64,
    pub mu: f64,
    pub energy: f64,
    pub shell_id: usize,
    pub interaction_type: Option<InteractionType>,
}

/// Every state a single packet passed through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RPacketTracker {
    pub index: usize,
    pub steps: Vec<PacketSnapshot>,
}

impl RPacketTracker {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            steps: Vec::new(),
        }
    }

    /// Records the packet after an event, `None` at injection.
    pub fn track(&mut self, packet: &RPacket, interaction_type: Option<InteractionType>) {
        self.steps.push(PacketSnapshot {
            status: packet.status,
            r: packet.r,
            nu: packet.nu,
            mu: packet.mu,
            energy: packet.energy,
            shell_id: packet.current_shell_id,
            interaction_type,
        });
    }

    pub fn no_of_interactions(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| {
                matches!(
                    step.interaction_type,
                    Some(InteractionType::Line | InteractionType::EScattering)
                )
            })
            .count()
    }
}
