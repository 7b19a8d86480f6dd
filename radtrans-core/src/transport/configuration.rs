//! Settings of a single Monte Carlo transport run.

use serde::{Deserialize, Serialize};

/// How a packet interacts with a line it comes into resonance with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineInteractionType {
    /// Resonant scattering, the packet is re-emitted in the same line.
    Scatter,
    /// The upper level de-excites directly through one of its emission lines.
    Downbranch,
    /// Full macro-atom cascade including internal transitions.
    #[default]
    Macroatom,
}

/// Virtual packet settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualPacketConfiguration {
    /// Number of virtual packets spawned per interaction
    pub no_of_virtual_packets: usize,
    /// Lower limit of real packet frequencies that spawn virtual packets [Hz]
    pub spawn_start_frequency: f64,
    /// Upper limit of real packet frequencies that spawn virtual packets [Hz]
    pub spawn_end_frequency: f64,
}

impl Default for VirtualPacketConfiguration {
    fn default() -> Self {
        Self {
            no_of_virtual_packets: 0,
            spawn_start_frequency: 0.0,
            spawn_end_frequency: f64::INFINITY,
        }
    }
}

/// Settings that change how packets are propagated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfiguration {
    pub line_interaction_type: LineInteractionType,
    /// Use the full special relativistic frame transformations
    pub full_relativity: bool,
    pub disable_electron_scattering: bool,
    pub disable_line_scattering: bool,
    pub virtual_packets: VirtualPacketConfiguration,
    /// Record every step of every real packet
    pub tracking: bool,
    /// Upper bound on macro-atom jumps before the packet is declared lost
    pub max_macro_atom_jumps: usize,
    /// Worker threads for the packet loop, 0 uses the rayon default
    pub no_of_threads: usize,
}

impl Default for MonteCarloConfiguration {
    fn default() -> Self {
        Self {
            line_interaction_type: LineInteractionType::default(),
            full_relativity: false,
            disable_electron_scattering: false,
            disable_line_scattering: false,
            virtual_packets: VirtualPacketConfiguration::default(),
            tracking: false,
            max_macro_atom_jumps: 10_000,
            no_of_threads: 0,
        }
    }
}
