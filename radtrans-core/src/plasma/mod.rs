//! Dependency graph of plasma properties.
//!
//! A plasma is assembled from [`PlasmaProperty`] implementations with a
//! [`PlasmaBuilder`]. The builder links each property to the producers of its
//! inputs and the resulting [`BasePlasma`] keeps every derived value up to
//! date as inputs change.

pub mod builder;
pub mod property;
pub mod runtime;
pub mod variables;

pub use builder::{PlasmaBuilder, PlasmaNode};
pub use property::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState, PlasmaValue};
pub use runtime::BasePlasma;
