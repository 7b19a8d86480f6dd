//! Spectra binned from escaping packets.

use crate::constants::{ANGSTROM, C};
use crate::errors::{RadTransError, RadTransResult};
use crate::transport::{TransportOutput, VPacketCollection};
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};

/// Luminosity per frequency bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin edges in ascending frequency [Hz]
    pub frequency_bins: Array1<f64>,
    /// Luminosity in each bin [erg / s]
    pub luminosity: Array1<f64>,
}

impl Spectrum {
    pub fn new(frequency_bins: Array1<f64>, luminosity: Array1<f64>) -> RadTransResult<Self> {
        if frequency_bins.len() != luminosity.len() + 1 {
            return Err(RadTransError::Error(format!(
                "a spectrum with {} bins needs {} edges, got {}",
                luminosity.len(),
                luminosity.len() + 1,
                frequency_bins.len()
            )));
        }
        Ok(Self {
            frequency_bins,
            luminosity,
        })
    }

    /// Bin centres [Hz]
    pub fn frequency(&self) -> Array1<f64> {
        let lower = self.frequency_bins.slice(s![..-1]);
        let upper = self.frequency_bins.slice(s![1..]);
        (&lower + &upper) * 0.5
    }

    pub fn delta_frequency(&self) -> Array1<f64> {
        let lower = self.frequency_bins.slice(s![..-1]);
        let upper = self.frequency_bins.slice(s![1..]);
        &upper - &lower
    }

    /// Wavelengths of the bin centres [Angstrom]
    pub fn wavelength(&self) -> Array1<f64> {
        self.frequency().mapv(|nu| C / nu / ANGSTROM)
    }

    /// [erg / s / Hz]
    pub fn luminosity_density_nu(&self) -> Array1<f64> {
        &self.luminosity / &self.delta_frequency()
    }

    /// [erg / s / Angstrom]
    pub fn luminosity_density_lambda(&self) -> Array1<f64> {
        let nu = self.frequency();
        let l_nu = self.luminosity_density_nu();
        (&l_nu * &nu.mapv(|nu| nu * nu / C)) * ANGSTROM
    }

    pub fn total_luminosity(&self) -> f64 {
        self.luminosity.sum()
    }
}

/// Spectra of one transport run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSet {
    pub emitted: Spectrum,
    pub reabsorbed: Spectrum,
    /// Only present if virtual packets were traced
    pub virtual_spectrum: Option<Spectrum>,
}

/// Bins packets onto a fixed frequency grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSolver {
    frequency_bins: Array1<f64>,
    edges: Vec<f64>,
}

impl SpectrumSolver {
    pub fn new(frequency_bins: Array1<f64>) -> RadTransResult<Self> {
        if frequency_bins.len() < 2
            || frequency_bins
                .iter()
                .zip(frequency_bins.iter().skip(1))
                .any(|(a, b)| b <= a)
        {
            return Err(RadTransError::Config(
                "spectrum frequency bins must be strictly increasing with at least two edges"
                    .to_string(),
            ));
        }
        Ok(Self {
            edges: frequency_bins.to_vec(),
            frequency_bins,
        })
    }

    /// `num` bins evenly spaced in frequency between two wavelengths [cm].
    pub fn from_wavelength_range(start: f64, end: f64, num: usize) -> RadTransResult<Self> {
        if num == 0 || start <= 0.0 || end <= start {
            return Err(RadTransError::Config(format!(
                "invalid spectrum range: start={start}, end={end}, num={num}"
            )));
        }
        Self::new(Array1::linspace(C / end, C / start, num + 1))
    }

    pub fn frequency_bins(&self) -> &Array1<f64> {
        &self.frequency_bins
    }

    /// Lowest and highest frequency of the grid [Hz]
    pub fn frequency_range(&self) -> (f64, f64) {
        (
            self.frequency_bins[0],
            self.frequency_bins[self.frequency_bins.len() - 1],
        )
    }

    /// Weighted histogram of `(nu, weight)` samples, the last bin is closed on the right.
    fn histogram(&self, samples: impl Iterator<Item = (f64, f64)>) -> Array1<f64> {
        let no_of_bins = self.edges.len() - 1;
        let (low, high) = self.frequency_range();
        let mut hist = Array1::zeros(no_of_bins);
        for (nu, weight) in samples {
            if !(low..=high).contains(&nu) {
                continue;
            }
            let upper = self.edges.partition_point(|edge| *edge <= nu);
            let bin = (upper - 1).min(no_of_bins - 1);
            hist[bin] += weight;
        }
        hist
    }

    fn spectrum(&self, luminosity: Array1<f64>) -> Spectrum {
        Spectrum {
            frequency_bins: self.frequency_bins.clone(),
            luminosity,
        }
    }

    /// Spectrum of packets leaving through the outer boundary.
    pub fn emitted(&self, nus: &[f64], energies: &[f64], time_of_simulation: f64) -> Spectrum {
        let samples = nus
            .iter()
            .zip(energies)
            .filter(|(_, e)| **e >= 0.0)
            .map(|(nu, e)| (*nu, e / time_of_simulation));
        self.spectrum(self.histogram(samples))
    }

    /// Spectrum of packets returned into the photosphere.
    pub fn reabsorbed(&self, nus: &[f64], energies: &[f64], time_of_simulation: f64) -> Spectrum {
        let samples = nus
            .iter()
            .zip(energies)
            .filter(|(_, e)| **e < 0.0)
            .map(|(nu, e)| (*nu, -e / time_of_simulation));
        self.spectrum(self.histogram(samples))
    }

    pub fn virtual_spectrum(&self, vpackets: &VPacketCollection, time_of_simulation: f64) -> Spectrum {
        let samples = vpackets
            .nus
            .iter()
            .zip(&vpackets.energies)
            .map(|(nu, e)| (*nu, e / time_of_simulation));
        self.spectrum(self.histogram(samples))
    }

    pub fn solve(
        &self,
        output: &TransportOutput,
        time_of_simulation: f64,
        with_virtual: bool,
    ) -> SpectrumSet {
        SpectrumSet {
            emitted: self.emitted(&output.output_nus, &output.output_energies, time_of_simulation),
            reabsorbed: self.reabsorbed(
                &output.output_nus,
                &output.output_energies,
                time_of_simulation,
            ),
            virtual_spectrum: with_virtual
                .then(|| self.virtual_spectrum(&output.vpackets, time_of_simulation)),
        }
    }
}

/// Luminosity of emitted packets with `nu_start < nu < nu_end` [erg / s].
pub fn calculate_emitted_luminosity(
    nus: &[f64],
    energies: &[f64],
    time_of_simulation: f64,
    nu_start: f64,
    nu_end: f64,
) -> f64 {
    nus.iter()
        .zip(energies)
        .filter(|(nu, e)| **e >= 0.0 && **nu > nu_start && **nu < nu_end)
        .map(|(_, e)| e)
        .sum::<f64>()
        / time_of_simulation
}

/// Luminosity of reabsorbed packets with `nu_start < nu < nu_end` [erg / s].
pub fn calculate_reabsorbed_luminosity(
    nus: &[f64],
    energies: &[f64],
    time_of_simulation: f64,
    nu_start: f64,
    nu_end: f64,
) -> f64 {
    -nus.iter()
        .zip(energies)
        .filter(|(nu, e)| **e < 0.0 && **nu > nu_start && **nu < nu_end)
        .map(|(_, e)| e)
        .sum::<f64>()
        / time_of_simulation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn solver() -> SpectrumSolver {
        SpectrumSolver::new(array![1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    #[test]
    fn test_histogram_edges() {
        let nus = [1.0, 1.5, 2.0, 4.0, 4.5, 0.5];
        let energies = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let spectrum = solver().emitted(&nus, &energies, 2.0);
        // The last edge belongs to the last bin, values outside the grid are dropped
        assert_eq!(spectrum.luminosity, array![1.0, 0.5, 0.5]);
    }

    #[test]
    fn test_emitted_and_reabsorbed_split() {
        let nus = [1.5, 2.5, 3.5];
        let energies = [0.2, -0.3, 0.5];
        let solver = solver();
        let emitted = solver.emitted(&nus, &energies, 1.0);
        let reabsorbed = solver.reabsorbed(&nus, &energies, 1.0);
        assert_eq!(emitted.luminosity, array![0.2, 0.0, 0.5]);
        assert_eq!(reabsorbed.luminosity, array![0.0, 0.3, 0.0]);
    }

    #[test]
    fn test_luminosity_in_range() {
        let nus = [1.0, 1.5, 2.5, 3.0];
        let energies = [1.0, 2.0, -4.0, 8.0];
        assert_relative_eq!(calculate_emitted_luminosity(&nus, &energies, 2.0, 1.0, 3.0), 1.0);
        assert_relative_eq!(calculate_reabsorbed_luminosity(&nus, &energies, 2.0, 1.0, 3.0), 2.0);
    }

    #[test]
    fn test_from_wavelength_range() {
        let solver = SpectrumSolver::from_wavelength_range(500.0 * ANGSTROM, 20_000.0 * ANGSTROM, 10)
            .unwrap();
        assert_eq!(solver.frequency_bins().len(), 11);
        let (low, high) = solver.frequency_range();
        assert_relative_eq!(low, C / (20_000.0 * ANGSTROM));
        assert_relative_eq!(high, C / (500.0 * ANGSTROM));
    }

    #[test]
    fn test_luminosity_densities() {
        let spectrum = Spectrum::new(array![1e15, 2e15], array![1e40]).unwrap();
        assert_relative_eq!(spectrum.luminosity_density_nu()[0], 1e25);
        let nu: f64 = 1.5e15;
        assert_relative_eq!(
            spectrum.luminosity_density_lambda()[0],
            1e25 * nu * nu / C * ANGSTROM
        );
        assert_relative_eq!(spectrum.wavelength()[0], C / nu / ANGSTROM);
        assert!(Spectrum::new(array![1.0], array![1.0]).is_err());
    }
}
