//! Names of the quantities exchanged between plasma properties.
//!
//! Shapes follow the atomic data indexing: per-shell quantities are 1D arrays,
//! per-species quantities are tables with one row per element, ion, level,
//! line or macro-atom transition and one column per shell.

// ============================================================================
// Inputs
// ============================================================================

/// Radiation temperature [K], per shell
pub const T_RAD: &str = "t_rad";
/// Dilution factor, per shell
pub const DILUTION_FACTOR: &str = "dilution_factor";
/// Mass density [g / cm^3], per shell
pub const DENSITY: &str = "density";
/// Mass fractions, elements x shells
pub const ABUNDANCE: &str = "abundance";
/// Time since explosion [s], scalar
pub const TIME_EXPLOSION: &str = "time_explosion";
/// Ratio of electron to radiation temperature, scalar
pub const LINK_T_RAD_T_ELECTRON: &str = "link_t_rad_t_electron";
/// Mean intensities from the Monte Carlo `j_blue` estimator, lines x shells
pub const J_BLUES_ESTIMATOR: &str = "j_blues_estimator";
/// Sobolev escape probabilities of the previous iteration, lines x shells
pub const PREVIOUS_BETA_SOBOLEV: &str = "previous_beta_sobolev";

// ============================================================================
// Thermal state
// ============================================================================

pub const BETA_RADIATION: &str = "beta_rad";
/// Electron temperature [K], per shell
pub const T_ELECTRONS: &str = "t_electrons";
pub const BETA_ELECTRON: &str = "beta_electron";

// ============================================================================
// Populations
// ============================================================================

/// Element number densities [1 / cm^3], elements x shells
pub const NUMBER_DENSITY: &str = "number_density";
/// `g exp(-E beta)` with optional dilution, levels x shells
pub const LEVEL_BOLTZMANN_FACTOR: &str = "level_boltzmann_factor";
/// Ions x shells
pub const PARTITION_FUNCTION: &str = "partition_function";
/// Saha factor `n_{j+1} n_e / n_j` stored in the row of ion `j+1`, ions x shells
pub const PHI: &str = "phi";
/// Radiation field correction of the nebular approximation, ions x shells
pub const DELTA: &str = "delta";
/// Ion number densities [1 / cm^3], ions x shells
pub const ION_NUMBER_DENSITY: &str = "ion_number_density";
/// Free electron density [1 / cm^3], per shell
pub const ELECTRON_DENSITIES: &str = "electron_densities";
/// Helium level populations from the recombination approximation, He levels x shells
pub const HELIUM_POPULATION: &str = "helium_population";
/// Level populations before the rate equations are solved, levels x shells
pub const LTE_LEVEL_NUMBER_DENSITY: &str = "lte_level_number_density";
/// Level number densities [1 / cm^3], levels x shells
pub const LEVEL_NUMBER_DENSITY: &str = "level_number_density";

// ============================================================================
// Line opacities
// ============================================================================

/// Lines x shells
pub const STIMULATED_EMISSION_FACTOR: &str = "stimulated_emission_factor";
/// Sobolev optical depths, lines x shells
pub const TAU_SOBOLEV: &str = "tau_sobolev";
/// Sobolev escape probabilities, lines x shells
pub const BETA_SOBOLEV: &str = "beta_sobolev";
/// Mean intensity in the blue wing of each line, lines x shells
pub const J_BLUES: &str = "j_blues";
/// Normalised macro-atom transition probabilities, transitions x shells
pub const TRANSITION_PROBABILITIES: &str = "transition_probabilities";
