//! Monte Carlo radiative transfer through homologously expanding shells.
//!
//! Packets are injected at the photosphere by [`source::BlackBodySimpleSource`],
//! traced through the shells by [`main_loop::montecarlo_main_loop`] and
//! interact with free electrons and with lines in the Sobolev approximation.
//! The loop returns the escaping packets together with the radiation field
//! estimators used to update the plasma.

pub mod configuration;
pub mod distance;
pub mod estimators;
pub mod frame;
pub mod interaction;
pub mod macro_atom;
pub mod main_loop;
pub mod opacity;
pub mod packet;
pub mod source;
pub mod trace;
pub mod tracker;
pub mod vpacket;

pub use configuration::{LineInteractionType, MonteCarloConfiguration, VirtualPacketConfiguration};
pub use estimators::Estimators;
pub use main_loop::{montecarlo_main_loop, TransportOutput};
pub use opacity::{MacroAtomState, OpacityState};
pub use packet::{InteractionType, PacketCollection, PacketStatus, RPacket};
pub use source::{time_of_simulation, BlackBodySimpleSource};
pub use vpacket::VPacketCollection;
