//! Radial shell geometry of homologously expanding ejecta.
//!
//! A model is a set of concentric spherical shells. Shells are described by
//! their interface velocities; at a given time since explosion `t` the
//! interface radii are `r = v t`.

use crate::errors::{RadTransError, RadTransResult};
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Where a quantity lives on a radial mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscretizationLocation {
    CellCenter,
    Interface,
}

/// A 1D radial mesh defined by the radii of its interfaces [cm].
#[derive(Debug, Clone, PartialEq)]
pub struct Radial1DMesh {
    radius: Array1<f64>,
}

impl Radial1DMesh {
    pub fn new(radius: Array1<f64>) -> RadTransResult<Self> {
        validate_interfaces("radius", &radius)?;
        Ok(Self { radius })
    }

    /// Location of the primary coordinates.
    pub fn location(&self) -> DiscretizationLocation {
        DiscretizationLocation::Interface
    }

    pub fn coordinates(&self, location: DiscretizationLocation) -> Array1<f64> {
        match location {
            DiscretizationLocation::Interface => self.radius.clone(),
            DiscretizationLocation::CellCenter => {
                let inner = self.radius.slice(s![..-1]);
                let outer = self.radius.slice(s![1..]);
                (&inner + &outer) * 0.5
            }
        }
    }

    pub fn no_of_cells(&self) -> usize {
        self.radius.len() - 1
    }
}

/// A mesh defined by interface velocities at a given time since explosion.
#[derive(Debug, Clone, PartialEq)]
pub struct HomologousRadial1DMesh {
    /// Interface velocities [cm/s]
    pub velocity: Array1<f64>,
    /// Time since explosion [s]
    pub time_explosion: f64,
}

impl HomologousRadial1DMesh {
    pub fn new(velocity: Array1<f64>, time_explosion: f64) -> RadTransResult<Self> {
        validate_interfaces("velocity", &velocity)?;
        if time_explosion <= 0.0 {
            return Err(RadTransError::Config(format!(
                "time of explosion must be positive, got {time_explosion}"
            )));
        }
        Ok(Self {
            velocity,
            time_explosion,
        })
    }

    /// Evenly spaced interfaces from `start` to `stop` giving `no_of_shells` shells.
    pub fn linspace(
        start: f64,
        stop: f64,
        no_of_shells: usize,
        time_explosion: f64,
    ) -> RadTransResult<Self> {
        if no_of_shells == 0 {
            return Err(RadTransError::Config(
                "a model needs at least one shell".to_string(),
            ));
        }
        Self::new(
            Array1::linspace(start, stop, no_of_shells + 1),
            time_explosion,
        )
    }

    pub fn location(&self) -> DiscretizationLocation {
        DiscretizationLocation::Interface
    }

    /// Splits into the spatial mesh at `time_explosion` and the interface velocities.
    pub fn to_spatial(&self) -> RadTransResult<(Radial1DMesh, Array1<f64>)> {
        let mesh = Radial1DMesh::new(&self.velocity * self.time_explosion)?;
        Ok((mesh, self.velocity.clone()))
    }

    pub fn geometry(&self) -> GeometryState {
        let v_inner = self.velocity.slice(s![..-1]).to_owned();
        let v_outer = self.velocity.slice(s![1..]).to_owned();
        GeometryState {
            r_inner: &v_inner * self.time_explosion,
            r_outer: &v_outer * self.time_explosion,
            v_inner,
            v_outer,
            time_explosion: self.time_explosion,
        }
    }
}

fn validate_interfaces(name: &str, values: &Array1<f64>) -> RadTransResult<()> {
    if values.len() < 2 {
        return Err(RadTransError::Config(format!(
            "{name} needs at least two interfaces"
        )));
    }
    if values.iter().any(|v| *v < 0.0) {
        return Err(RadTransError::Config(format!("{name} must be non-negative")));
    }
    if values.iter().zip(values.iter().skip(1)).any(|(a, b)| b <= a) {
        return Err(RadTransError::Config(format!(
            "{name} must be strictly increasing"
        )));
    }
    Ok(())
}

/// Shell geometry as consumed by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryState {
    /// [cm]
    pub r_inner: Array1<f64>,
    /// [cm]
    pub r_outer: Array1<f64>,
    /// [cm/s]
    pub v_inner: Array1<f64>,
    /// [cm/s]
    pub v_outer: Array1<f64>,
    /// [s]
    pub time_explosion: f64,
}

impl GeometryState {
    pub fn no_of_shells(&self) -> usize {
        self.r_inner.len()
    }

    /// Shell volumes [cm^3].
    pub fn volume(&self) -> Array1<f64> {
        (&self.r_outer.mapv(|r| r.powi(3)) - &self.r_inner.mapv(|r| r.powi(3))) * (4.0 / 3.0 * PI)
    }

    /// Shell centre radii [cm].
    pub fn r_middle(&self) -> Array1<f64> {
        (&self.r_inner + &self.r_outer) * 0.5
    }

    /// Shell centre velocities [cm/s].
    pub fn v_middle(&self) -> Array1<f64> {
        (&self.v_inner + &self.v_outer) * 0.5
    }

    /// Innermost radius, the photosphere of the model [cm].
    pub fn r_photosphere(&self) -> f64 {
        self.r_inner[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DAY;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_cell_centres() {
        let mesh = Radial1DMesh::new(array![1.0, 2.0, 4.0]).unwrap();
        assert_eq!(mesh.location(), DiscretizationLocation::Interface);
        assert_eq!(
            mesh.coordinates(DiscretizationLocation::CellCenter),
            array![1.5, 3.0]
        );
        assert_eq!(mesh.no_of_cells(), 2);
    }

    #[test]
    fn test_to_spatial() {
        let mesh = HomologousRadial1DMesh::new(array![1e9, 2e9], 10.0).unwrap();
        let (spatial, velocity) = mesh.to_spatial().unwrap();
        assert_eq!(
            spatial.coordinates(DiscretizationLocation::Interface),
            array![1e10, 2e10]
        );
        assert_eq!(velocity, array![1e9, 2e9]);
    }

    #[test]
    fn test_non_monotonic_rejected() {
        assert!(Radial1DMesh::new(array![2.0, 1.0]).is_err());
        assert!(HomologousRadial1DMesh::new(array![1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_volume_of_verysimple_model() {
        // 20 shells between 11000 and 20000 km/s at 13 days
        let mesh = HomologousRadial1DMesh::linspace(1.1e9, 2.0e9, 20, 13.0 * DAY).unwrap();
        let geometry = mesh.geometry();
        assert_eq!(geometry.no_of_shells(), 20);
        let volume = geometry.volume();
        assert_relative_eq!(volume[0], 1.00977478e45, max_relative = 1e-6);
        assert_relative_eq!(volume[10], 1.98154804e45, max_relative = 1e-6);
        assert_relative_eq!(volume[19], 3.13361319e45, max_relative = 1e-6);
    }
}
