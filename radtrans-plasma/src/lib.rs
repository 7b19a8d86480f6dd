//! Concrete plasma properties for radtrans.
//!
//! The properties in [`properties`] compute the thermal state, ionization and
//! excitation balance and line opacities of every shell. [`collections`]
//! assembles them into a plasma according to [`PlasmaSettings`].

pub mod collections;
pub mod properties;

pub use collections::{
    ExcitationMode, HeliumTreatment, IonizationMode, NlteSettings, Plasma, PlasmaInputs,
    PlasmaSettings,
};
