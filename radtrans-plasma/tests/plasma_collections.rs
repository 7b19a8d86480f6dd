use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::composition::{Composition, DensityProfile};
use radtrans_core::constants::DAY;
use radtrans_core::geometry::{GeometryState, HomologousRadial1DMesh};
use radtrans_core::plasma::variables::{
    BETA_RADIATION, ELECTRON_DENSITIES, HELIUM_POPULATION, ION_NUMBER_DENSITY,
    LEVEL_NUMBER_DENSITY, TAU_SOBOLEV, TRANSITION_PROBABILITIES,
};
use radtrans_core::radiation_field::{DilutePlanckianRadiationField, DEFAULT_T_RADIATIVE};
use radtrans_core::testing::small_atomic_data;
use radtrans_core::transport::LineInteractionType;
use radtrans_plasma::properties::JBluesMode;
use radtrans_plasma::{
    ExcitationMode, HeliumTreatment, IonizationMode, NlteSettings, PlasmaInputs, PlasmaSettings,
};
use std::sync::Arc;

fn geometry() -> GeometryState {
    HomologousRadial1DMesh::linspace(1.1e9, 2.0e9, 5, 13.0 * DAY)
        .unwrap()
        .geometry()
}

fn inputs(atomic: &AtomicData) -> PlasmaInputs {
    let geometry = geometry();
    let field = DilutePlanckianRadiationField::from_geometry(&geometry, DEFAULT_T_RADIATIVE);
    let density = DensityProfile::Branch85W7.calculate_density(&geometry).unwrap();
    let composition = Composition::uniform(&[(1, 0.7), (2, 0.3)], geometry.no_of_shells()).unwrap();
    let mut abundance = Array2::zeros((atomic.elements.len(), geometry.no_of_shells()));
    for (row, z) in composition.atomic_numbers.iter().enumerate() {
        let index = atomic.element_index(*z).unwrap();
        abundance.row_mut(index).assign(&composition.mass_fractions.row(row));
    }
    PlasmaInputs {
        t_rad: field.t_rad,
        dilution_factor: field.w,
        density,
        abundance,
        time_explosion: geometry.time_explosion,
    }
}

fn atomic() -> Arc<AtomicData> {
    Arc::new(small_atomic_data().unwrap())
}

#[test]
fn test_default_plasma_builds_opacities() {
    let atomic = atomic();
    let settings = PlasmaSettings::default();
    let plasma = settings.build(Arc::clone(&atomic), inputs(&atomic)).unwrap();

    let n_e = plasma.electron_densities().unwrap();
    assert_eq!(n_e.len(), 5);
    assert!(n_e.iter().all(|n| *n > 0.0));

    let opacity = plasma.to_opacity_state().unwrap();
    assert_eq!(opacity.no_of_lines(), atomic.n_lines());
    assert_eq!(opacity.no_of_shells(), 5);
    let macro_atom = opacity.macro_atom.expect("macro atom data");
    assert_eq!(macro_atom.transition_probabilities.nrows(), atomic.macro_atom.len());
    assert!(opacity.tau_sobolev.iter().all(|tau| tau.is_finite()));
}

#[test]
fn test_update_recomputes_dependent_values() {
    let atomic = atomic();
    let mut plasma = PlasmaSettings::default()
        .build(Arc::clone(&atomic), inputs(&atomic))
        .unwrap();
    let tau_before = plasma.base().get_table(TAU_SOBOLEV).unwrap().clone();
    let n_e_before = plasma.electron_densities().unwrap().clone();

    let t_rad = Array1::from_elem(5, 12_000.0);
    let w = plasma.dilution_factor().unwrap().clone();
    plasma.update_radiation_field(t_rad, w, None).unwrap();

    let beta = plasma.base().get_shells(BETA_RADIATION).unwrap();
    assert_relative_eq!(beta[0], 1.0 / (radtrans_core::constants::K_B * 12_000.0));
    assert_ne!(plasma.base().get_table(TAU_SOBOLEV).unwrap(), &tau_before);
    assert!(plasma.electron_densities().unwrap()[0] > n_e_before[0]);
}

#[test]
fn test_scatter_plasma_has_no_macro_atom() {
    let atomic = atomic();
    let settings = PlasmaSettings {
        line_interaction_type: LineInteractionType::Scatter,
        ..Default::default()
    };
    let plasma = settings.build(Arc::clone(&atomic), inputs(&atomic)).unwrap();
    assert!(plasma.base().get(TRANSITION_PROBABILITIES).is_err());
    assert!(plasma.to_opacity_state().unwrap().macro_atom.is_none());
}

#[test]
fn test_lte_plasma_matches_level_sums() {
    let atomic = atomic();
    let settings = PlasmaSettings {
        ionization: IonizationMode::Lte,
        excitation: ExcitationMode::Lte,
        line_interaction_type: LineInteractionType::Downbranch,
        ..Default::default()
    };
    let plasma = settings.build(Arc::clone(&atomic), inputs(&atomic)).unwrap();
    let ions = plasma.base().get_table(ION_NUMBER_DENSITY).unwrap();
    let levels = plasma.level_number_density().unwrap();
    for (ion_index, ion) in atomic.ions.iter().enumerate() {
        let total: f64 = ion.levels.clone().map(|l| levels[[l, 2]]).sum();
        assert_relative_eq!(total, ions[[ion_index, 2]], max_relative = 1e-10);
    }
    let opacity = plasma.to_opacity_state().unwrap();
    assert_eq!(
        opacity.macro_atom.unwrap().transition_type.len(),
        atomic.downbranch.len()
    );
}

#[test]
fn test_helium_nlte_plasma() {
    let atomic = atomic();
    let settings = PlasmaSettings {
        helium_treatment: HeliumTreatment::RecombNlte,
        ..Default::default()
    };
    let plasma = settings.build(Arc::clone(&atomic), inputs(&atomic)).unwrap();
    let helium = plasma.base().get_table(HELIUM_POPULATION).unwrap();
    let levels = plasma.base().get_table(LEVEL_NUMBER_DENSITY).unwrap();
    let offset = atomic.level_index(2, 0, 0).unwrap();
    assert_eq!(levels[[offset, 0]], 0.0);
    assert_eq!(levels[[offset + 3, 1]], helium[[3, 1]]);
}

#[test]
fn test_nlte_plasma_with_estimated_j_blues() {
    let atomic = atomic();
    let settings = PlasmaSettings {
        radiative_rates_type: JBluesMode::Detailed,
        helium_treatment: HeliumTreatment::RecombNlte,
        nlte: NlteSettings {
            species: vec![(1, 0)],
            include_collisions: true,
        },
        ..Default::default()
    };
    let mut plasma = settings.build(Arc::clone(&atomic), inputs(&atomic)).unwrap();
    let levels = plasma.level_number_density().unwrap();
    let ions = plasma.base().get_table(ION_NUMBER_DENSITY).unwrap();
    let total: f64 = (0..3).map(|l| levels[[l, 0]]).sum();
    assert_relative_eq!(total, ions[[0, 0]], max_relative = 1e-8);

    let estimate = Array2::from_elem((atomic.n_lines(), 5), 1e-6);
    let t_rad = plasma.t_rad().unwrap().clone();
    let w = plasma.dilution_factor().unwrap().clone();
    plasma
        .update_radiation_field(t_rad, w, Some(estimate))
        .unwrap();
    assert!(plasma.base().get_shells(ELECTRON_DENSITIES).is_ok());
    assert!(plasma.to_opacity_state().is_ok());
}

#[test]
fn test_graph_export() {
    let atomic = atomic();
    let plasma = PlasmaSettings::default()
        .build(Arc::clone(&atomic), inputs(&atomic))
        .unwrap();
    let dot = plasma.base().to_dot();
    assert!(dot.contains("IonNumberDensity"));
    assert!(dot.contains("PhiSahaNebular"));
    assert!(dot.contains("t_rad"));
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let atomic = atomic();
    let mut inputs = inputs(&atomic);
    inputs.density = Array1::zeros(3);
    assert!(PlasmaSettings::default().build(atomic, inputs).is_err());
}
