//! Reference results for regression testing.
//!
//! A [`ReferenceData`] file holds the quantities of a finished run that are
//! compared between versions. Files live in an external directory so that
//! they can be regenerated without touching the repository. Integration tests
//! read the directory from `RADTRANS_REFERENCE_PATH` and regenerate the files
//! when `RADTRANS_GENERATE_REFERENCE` is set; without a reference path the
//! comparison is skipped.

use crate::simulation::SimulationResult;
use ndarray::Array1;
use radtrans_core::errors::{RadTransError, RadTransResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const REFERENCE_PATH_VAR: &str = "RADTRANS_REFERENCE_PATH";
pub const GENERATE_REFERENCE_VAR: &str = "RADTRANS_GENERATE_REFERENCE";

pub const DEFAULT_RTOL: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    /// [K]
    pub t_inner: f64,
    /// [K]
    pub t_rad: Array1<f64>,
    pub w: Array1<f64>,
    /// [1 / cm^3]
    pub electron_densities: Array1<f64>,
    /// Bin edges of the spectra [Hz]
    pub frequency_bins: Array1<f64>,
    /// [erg / s]
    pub luminosity: Array1<f64>,
    /// [erg / s]
    pub virtual_luminosity: Option<Array1<f64>>,
}

impl From<&SimulationResult> for ReferenceData {
    fn from(result: &SimulationResult) -> Self {
        Self {
            t_inner: result.t_inner,
            t_rad: result.t_rad.clone(),
            w: result.w.clone(),
            electron_densities: result.electron_densities.clone(),
            frequency_bins: result.spectrum.emitted.frequency_bins.clone(),
            luminosity: result.spectrum.emitted.luminosity.clone(),
            virtual_luminosity: result
                .spectrum
                .virtual_spectrum
                .as_ref()
                .map(|s| s.luminosity.clone()),
        }
    }
}

impl ReferenceData {
    pub fn read(path: impl AsRef<Path>) -> RadTransResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> RadTransResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Path of the reference called `name` inside `directory`.
    pub fn path_in(directory: impl AsRef<Path>, name: &str) -> PathBuf {
        directory.as_ref().join(format!("{name}.json"))
    }

    /// Fails with the first field that differs by more than `rtol` from `expected`.
    pub fn compare(&self, expected: &ReferenceData, rtol: f64) -> RadTransResult<()> {
        compare_values("t_inner", &[self.t_inner], &[expected.t_inner], rtol)?;
        compare_arrays("t_rad", &self.t_rad, &expected.t_rad, rtol)?;
        compare_arrays("w", &self.w, &expected.w, rtol)?;
        compare_arrays(
            "electron_densities",
            &self.electron_densities,
            &expected.electron_densities,
            rtol,
        )?;
        compare_arrays(
            "frequency_bins",
            &self.frequency_bins,
            &expected.frequency_bins,
            rtol,
        )?;
        compare_arrays("luminosity", &self.luminosity, &expected.luminosity, rtol)?;
        match (&self.virtual_luminosity, &expected.virtual_luminosity) {
            (Some(actual), Some(expected)) => {
                compare_arrays("virtual_luminosity", actual, expected, rtol)
            }
            (None, None) => Ok(()),
            _ => Err(RadTransError::ReferenceMismatch {
                field: "virtual_luminosity".to_string(),
                message: "present in only one of the results".to_string(),
            }),
        }
    }
}

fn compare_arrays(
    field: &str,
    actual: &Array1<f64>,
    expected: &Array1<f64>,
    rtol: f64,
) -> RadTransResult<()> {
    compare_values(field, &actual.to_vec(), &expected.to_vec(), rtol)
}

fn compare_values(field: &str, actual: &[f64], expected: &[f64], rtol: f64) -> RadTransResult<()> {
    if actual.len() != expected.len() {
        return Err(RadTransError::ReferenceMismatch {
            field: field.to_string(),
            message: format!("length {} differs from {}", actual.len(), expected.len()),
        });
    }
    let worst = actual
        .iter()
        .zip(expected)
        .enumerate()
        .filter(|(_, (a, e))| (*a - *e).abs() > rtol * e.abs())
        .max_by(|(_, (a1, e1)), (_, (a2, e2))| {
            let d1 = (*a1 - *e1).abs();
            let d2 = (*a2 - *e2).abs();
            d1.total_cmp(&d2)
        });
    match worst {
        Some((index, (a, e))) => Err(RadTransError::ReferenceMismatch {
            field: field.to_string(),
            message: format!("index {index}: {a:e} differs from reference {e:e} (rtol {rtol:e})"),
        }),
        None => Ok(()),
    }
}

/// What a reference check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOutcome {
    Generated,
    Compared,
    Skipped,
}

/// Reference directory and mode, usually taken from the environment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceSettings {
    pub path: Option<PathBuf>,
    pub generate: bool,
    pub rtol: f64,
}

impl ReferenceSettings {
    pub fn from_env() -> Self {
        let generate = std::env::var(GENERATE_REFERENCE_VAR)
            .map(|v| !matches!(v.as_str(), "" | "0" | "false"))
            .unwrap_or(false);
        Self {
            path: std::env::var_os(REFERENCE_PATH_VAR).map(PathBuf::from),
            generate,
            rtol: DEFAULT_RTOL,
        }
    }

    /// Writes or compares the reference called `name`.
    pub fn check(&self, name: &str, actual: &ReferenceData) -> RadTransResult<ReferenceOutcome> {
        let Some(directory) = &self.path else {
            if self.generate {
                warn!("{GENERATE_REFERENCE_VAR} is set without {REFERENCE_PATH_VAR}, nothing written");
            }
            return Ok(ReferenceOutcome::Skipped);
        };
        let path = ReferenceData::path_in(directory, name);
        if self.generate {
            actual.write(&path)?;
            info!(path = %path.display(), "Wrote reference data");
            return Ok(ReferenceOutcome::Generated);
        }
        let expected = ReferenceData::read(&path)?;
        actual.compare(&expected, self.rtol)?;
        info!(path = %path.display(), "Matched reference data");
        Ok(ReferenceOutcome::Compared)
    }
}
