//! Assembling plasmas from settings.
//!
//! [`PlasmaSettings`] selects the approximations used for ionization,
//! excitation, helium and the radiation field in lines, and turns them into
//! the list of properties of a [`BasePlasma`]. [`Plasma`] wraps the result
//! with the updates performed between Monte Carlo iterations.

use crate::properties::{
    BetaElectron, BetaRadiation, BetaSobolev, ElectronTemperature, HeliumNlte, IonNumberDensity,
    IonNumberDensitySolver, JBlues, JBluesMode, LevelBoltzmannFactorDiluteLte,
    LevelBoltzmannFactorLte, LevelNumberDensity, LevelNumberDensityHeNlte,
    LevelNumberDensityNlte, NumberDensity, PartitionFunction, PhiSahaLte, PhiSahaNebular,
    RadiationFieldCorrection, StimulatedEmissionFactor, TauSobolev, TransitionProbabilities,
};
use ndarray::{Array1, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::constants::EV;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::builder::P;
use radtrans_core::plasma::variables::{
    ABUNDANCE, BETA_SOBOLEV, DENSITY, DILUTION_FACTOR, ELECTRON_DENSITIES, J_BLUES_ESTIMATOR,
    LEVEL_NUMBER_DENSITY, LINK_T_RAD_T_ELECTRON, LTE_LEVEL_NUMBER_DENSITY,
    PREVIOUS_BETA_SOBOLEV, TAU_SOBOLEV, TIME_EXPLOSION, TRANSITION_PROBABILITIES, T_RAD,
};
use radtrans_core::plasma::{BasePlasma, PlasmaBuilder, PlasmaValue};
use radtrans_core::transport::{LineInteractionType, MacroAtomState, OpacityState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IonizationMode {
    Lte,
    #[default]
    Nebular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExcitationMode {
    Lte,
    #[default]
    DiluteLte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeliumTreatment {
    #[default]
    None,
    RecombNlte,
}

/// Ions whose level populations come from the rate equations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NlteSettings {
    /// `(atomic number, ion number)` pairs
    pub species: Vec<(u32, u32)>,
    pub include_collisions: bool,
}

impl NlteSettings {
    pub fn is_enabled(&self) -> bool {
        !self.species.is_empty()
    }
}

/// Approximations used by the plasma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlasmaSettings {
    pub ionization: IonizationMode,
    pub excitation: ExcitationMode,
    pub helium_treatment: HeliumTreatment,
    pub radiative_rates_type: JBluesMode,
    pub line_interaction_type: LineInteractionType,
    /// `T_e / T_rad`
    pub link_t_rad_t_electron: f64,
    /// Departure coefficient of the radiation field correction, `1 / W` when unset
    pub delta_treatment: Option<f64>,
    /// Ionization energy of the reference ion of the radiation field correction [eV]
    pub chi_0_ev: f64,
    pub nlte: NlteSettings,
    pub ion_number_density: IonNumberDensitySolver,
}

impl Default for PlasmaSettings {
    fn default() -> Self {
        Self {
            ionization: IonizationMode::default(),
            excitation: ExcitationMode::default(),
            helium_treatment: HeliumTreatment::default(),
            radiative_rates_type: JBluesMode::default(),
            line_interaction_type: LineInteractionType::default(),
            link_t_rad_t_electron: 0.9,
            delta_treatment: None,
            chi_0_ev: 11.871,
            nlte: NlteSettings::default(),
            ion_number_density: IonNumberDensitySolver::default(),
        }
    }
}

/// Values from the model and the radiation field needed to build a plasma.
#[derive(Debug, Clone, PartialEq)]
pub struct PlasmaInputs {
    /// [K]
    pub t_rad: Array1<f64>,
    pub dilution_factor: Array1<f64>,
    /// [g / cm^3]
    pub density: Array1<f64>,
    /// Mass fractions, one row per element of the atomic data
    pub abundance: Array2<f64>,
    /// [s]
    pub time_explosion: f64,
}

impl PlasmaSettings {
    fn needs_macro_atom(&self) -> bool {
        self.line_interaction_type != LineInteractionType::Scatter
    }

    fn needs_j_blues(&self) -> bool {
        self.needs_macro_atom() || self.nlte.is_enabled()
    }

    fn radiation_field_correction(&self) -> RadiationFieldCorrection {
        RadiationFieldCorrection {
            chi_0: self.chi_0_ev * EV,
            departure_coefficient: self.delta_treatment,
        }
    }

    /// Properties making up a plasma with these settings.
    pub fn properties(&self) -> Vec<P> {
        let mut properties: Vec<P> = vec![
            Arc::new(BetaRadiation),
            Arc::new(ElectronTemperature),
            Arc::new(BetaElectron),
            Arc::new(NumberDensity),
            Arc::new(PartitionFunction),
            Arc::new(IonNumberDensity::new(self.ion_number_density)),
            Arc::new(StimulatedEmissionFactor),
            Arc::new(TauSobolev),
            Arc::new(BetaSobolev),
        ];

        match self.excitation {
            ExcitationMode::Lte => properties.push(Arc::new(LevelBoltzmannFactorLte)),
            ExcitationMode::DiluteLte => properties.push(Arc::new(LevelBoltzmannFactorDiluteLte)),
        }

        let needs_delta = self.ionization == IonizationMode::Nebular
            || self.helium_treatment == HeliumTreatment::RecombNlte;
        if needs_delta {
            properties.push(Arc::new(self.radiation_field_correction()));
        }
        match self.ionization {
            IonizationMode::Lte => properties.push(Arc::new(PhiSahaLte)),
            IonizationMode::Nebular => properties.push(Arc::new(PhiSahaNebular)),
        }

        let populations_output = if self.nlte.is_enabled() {
            LTE_LEVEL_NUMBER_DENSITY
        } else {
            LEVEL_NUMBER_DENSITY
        };
        match self.helium_treatment {
            HeliumTreatment::None => properties.push(Arc::new(if self.nlte.is_enabled() {
                LevelNumberDensity::before_nlte()
            } else {
                LevelNumberDensity::default()
            })),
            HeliumTreatment::RecombNlte => {
                properties.push(Arc::new(HeliumNlte));
                properties.push(Arc::new(LevelNumberDensityHeNlte::with_output(
                    populations_output,
                )));
            }
        }
        if self.nlte.is_enabled() {
            properties.push(Arc::new(LevelNumberDensityNlte::new(
                self.nlte.species.clone(),
                self.nlte.include_collisions,
            )));
        }

        if self.needs_j_blues() {
            properties.push(Arc::new(JBlues::new(self.radiative_rates_type)));
        }
        if self.needs_macro_atom() {
            properties.push(Arc::new(TransitionProbabilities::new(
                self.line_interaction_type == LineInteractionType::Downbranch,
            )));
        }
        properties
    }

    /// Builds a plasma and computes its initial state.
    pub fn build(&self, atomic_data: Arc<AtomicData>, inputs: PlasmaInputs) -> RadTransResult<Plasma> {
        let no_of_shells = inputs.t_rad.len();
        for (name, len) in [
            (DILUTION_FACTOR, inputs.dilution_factor.len()),
            (DENSITY, inputs.density.len()),
            (ABUNDANCE, inputs.abundance.ncols()),
        ] {
            if len != no_of_shells {
                return Err(RadTransError::PlasmaShape {
                    name: name.to_string(),
                    expected: format!("{no_of_shells} shells"),
                    found: format!("{len} shells"),
                });
            }
        }

        let n_lines = atomic_data.n_lines();
        let mut builder = PlasmaBuilder::new(Arc::clone(&atomic_data));
        builder
            .with_input(T_RAD, inputs.t_rad.into())
            .with_input(DILUTION_FACTOR, inputs.dilution_factor.into())
            .with_input(DENSITY, inputs.density.into())
            .with_input(ABUNDANCE, inputs.abundance.into())
            .with_input(TIME_EXPLOSION, inputs.time_explosion.into())
            .with_input(LINK_T_RAD_T_ELECTRON, self.link_t_rad_t_electron.into());
        if self.needs_j_blues() && self.radiative_rates_type == JBluesMode::Detailed {
            builder.with_input(
                J_BLUES_ESTIMATOR,
                Array2::<f64>::zeros((n_lines, no_of_shells)).into(),
            );
        }
        if self.nlte.is_enabled() {
            builder.with_input(
                PREVIOUS_BETA_SOBOLEV,
                Array2::<f64>::ones((n_lines, no_of_shells)).into(),
            );
        }
        for property in self.properties() {
            builder.with_property(property);
        }

        let base = builder.build()?;
        info!(
            properties = base.property_names().len(),
            shells = no_of_shells,
            "Built plasma"
        );
        Ok(Plasma {
            base,
            settings: self.clone(),
        })
    }

    /// Flattens the opacities of `plasma` for the transport.
    pub fn to_opacity_state(&self, plasma: &BasePlasma) -> RadTransResult<OpacityState> {
        let atomic_data = plasma.atomic_data();
        let macro_atom = if self.needs_macro_atom() {
            Some(MacroAtomState::from_atomic_data(
                atomic_data,
                plasma.get_table(TRANSITION_PROBABILITIES)?.clone(),
                self.line_interaction_type == LineInteractionType::Downbranch,
            )?)
        } else {
            None
        };
        OpacityState::new(
            atomic_data.line_list_nu(),
            plasma.get_table(TAU_SOBOLEV)?.clone(),
            plasma.get_shells(ELECTRON_DENSITIES)?.clone(),
            macro_atom,
        )
    }
}

/// A plasma together with the settings it was built from.
#[derive(Debug)]
pub struct Plasma {
    base: BasePlasma,
    settings: PlasmaSettings,
}

impl Plasma {
    pub fn base(&self) -> &BasePlasma {
        &self.base
    }

    pub fn settings(&self) -> &PlasmaSettings {
        &self.settings
    }

    pub fn get(&self, name: &str) -> RadTransResult<&PlasmaValue> {
        self.base.get(name)
    }

    pub fn t_rad(&self) -> RadTransResult<&Array1<f64>> {
        self.base.get_shells(T_RAD)
    }

    pub fn dilution_factor(&self) -> RadTransResult<&Array1<f64>> {
        self.base.get_shells(DILUTION_FACTOR)
    }

    pub fn electron_densities(&self) -> RadTransResult<&Array1<f64>> {
        self.base.get_shells(ELECTRON_DENSITIES)
    }

    pub fn level_number_density(&self) -> RadTransResult<&Array2<f64>> {
        self.base.get_table(LEVEL_NUMBER_DENSITY)
    }

    /// Replaces the radiation field and recomputes the dependent properties.
    ///
    /// The `j_blue` estimate is only used when the mean intensities in lines
    /// come from the Monte Carlo estimators. Escape probabilities of the
    /// current state are carried over to the rate equations.
    pub fn update_radiation_field(
        &mut self,
        t_rad: Array1<f64>,
        dilution_factor: Array1<f64>,
        j_blues_estimate: Option<Array2<f64>>,
    ) -> RadTransResult<()> {
        let mut changes: Vec<(String, PlasmaValue)> = vec![
            (T_RAD.to_string(), t_rad.into()),
            (DILUTION_FACTOR.to_string(), dilution_factor.into()),
        ];
        if self.settings.needs_j_blues() && self.settings.radiative_rates_type == JBluesMode::Detailed {
            if let Some(estimate) = j_blues_estimate {
                changes.push((J_BLUES_ESTIMATOR.to_string(), estimate.into()));
            }
        }
        if self.settings.nlte.is_enabled() {
            let previous = self.base.get_table(BETA_SOBOLEV)?.clone();
            changes.push((PREVIOUS_BETA_SOBOLEV.to_string(), previous.into()));
        }
        debug!(changes = changes.len(), "Updating plasma");
        self.base.update(changes)
    }

    pub fn to_opacity_state(&self) -> RadTransResult<OpacityState> {
        self.settings.to_opacity_state(&self.base)
    }
}
