//! Antenna array configurations and baseline geometry.

use std::f64::consts::{PI, TAU};

use ndarray::prelude::*;

use crate::error::ArlError;

/// Golden angle in radians, used to lay out synthetic station cores.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Geodetic position of an array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// East longitude \[degrees\].
    pub longitude: f64,
    /// Latitude \[degrees\].
    pub latitude: f64,
    /// Height above the ellipsoid \[metres\].
    pub height: f64,
}

/// Antenna mount type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    AltAz,
    Xy,
}

/// An interferometer: where it is and where its antennas are.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub name: String,
    pub location: Location,
    /// Antenna positions \[metres\], shape `[nant, 3]`, in the local frame
    /// rotated to the array latitude (x east, z towards the celestial pole).
    pub xyz: Array2<f64>,
    /// Effective antenna or station diameter \[metres\].
    pub diameter: f64,
    pub mount: Mount,
}

impl Configuration {
    /// Number of antennas.
    #[inline]
    pub fn nant(&self) -> usize {
        self.xyz.nrows()
    }

    /// Number of cross-correlation baselines.
    #[inline]
    pub fn nbases(&self) -> usize {
        num_baselines(self.nant())
    }

    /// The antenna pairs `(a1, a2)` with `a1 < a2`, in lexicographic order.
    pub fn baselines(&self) -> Vec<(usize, usize)> {
        baseline_pairs(self.nant())
    }

    /// Positions of all antennas projected onto the (u, v, w) frame for the
    /// given hour angle and declination (both radians). Shape `[nant, 3]`.
    pub fn antenna_uvw(&self, ha: f64, dec: f64) -> Array2<f64> {
        let mut out = Array2::zeros((self.nant(), 3));
        for (row, mut out_row) in self.xyz.outer_iter().zip(out.outer_iter_mut()) {
            let uvw = xyz_to_uvw([row[0], row[1], row[2]], ha, dec);
            out_row.assign(&ArrayView1::from(&uvw));
        }
        out
    }
}

/// Number of cross-correlation baselines formed by `nant` antennas.
#[inline]
pub fn num_baselines(nant: usize) -> usize {
    nant * nant.saturating_sub(1) / 2
}

/// Antenna pairs `(a1, a2)` with `a1 < a2`, in lexicographic order.
pub fn baseline_pairs(nant: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(num_baselines(nant));
    for a1 in 0..nant {
        for a2 in a1 + 1..nant {
            pairs.push((a1, a2));
        }
    }
    pairs
}

/// Rotate local horizon coordinates (east, north, up) to the frame used
/// for baseline projection at the given latitude \[radians\].
pub fn xyz_at_latitude(local: [f64; 3], latitude: f64) -> [f64; 3] {
    let [x, y, z] = local;
    let colatitude = PI / 2.0 - latitude;
    let (s, c) = colatitude.sin_cos();
    [x, -z * s + y * c, z * c + y * s]
}

/// Project a position onto (u, v, w) for hour angle `ha` and declination
/// `dec` (radians).
///
/// Two rotations: by `ha` about the z axis, then by `90 - dec` about the u
/// axis.
pub fn xyz_to_uvw(xyz: [f64; 3], ha: f64, dec: f64) -> [f64; 3] {
    let [x, y, z] = xyz;
    let (s_ha, c_ha) = ha.sin_cos();
    let (s_dec, c_dec) = dec.sin_cos();
    let u = x * c_ha - y * s_ha;
    let v0 = x * s_ha + y * c_ha;
    let w = z * s_dec - v0 * c_dec;
    let v = z * c_dec + v0 * s_dec;
    [u, v, w]
}

/// Standard configurations.
///
/// Station layouts are synthesised deterministically to match each array's
/// antenna count, extent and site:
///
/// | name         | antennas | site            |
/// |--------------|----------|-----------------|
/// | `LOWBD2`     | 512      | SKA-Low         |
/// | `LOWBD2-CORE`| 166      | SKA-Low         |
/// | `VLAA`       | 27       | VLA             |
/// | `VLAA_north` | 27       | VLA, moved to the pole |
///
/// If `rmax` is given, only antennas within `rmax` metres of the array
/// centroid are kept.
pub fn create_named_configuration(
    name: &str,
    rmax: Option<f64>,
) -> Result<Configuration, ArlError> {
    let low_site = Location {
        longitude: 116.4999,
        latitude: -26.7,
        height: 300.0,
    };
    let vla_site = Location {
        longitude: -107.6184,
        latitude: 34.0784,
        height: 2124.0,
    };

    let (location, local, diameter, mount) = match name {
        "LOWBD2" => (low_site, low_layout(166, 346), 35.0, Mount::Xy),
        "LOWBD2-CORE" => (low_site, low_layout(166, 0), 35.0, Mount::Xy),
        "VLAA" => (vla_site, vla_layout(), 25.0, Mount::AltAz),
        "VLAA_north" => (
            Location {
                latitude: 90.0,
                ..vla_site
            },
            vla_layout(),
            25.0,
            Mount::AltAz,
        ),
        other => return Err(ArlError::UnknownConfiguration(other.to_string())),
    };

    let latitude = location.latitude.to_radians();
    let mut positions: Vec<[f64; 3]> = local
        .into_iter()
        .map(|p| xyz_at_latitude(p, latitude))
        .collect();

    if let Some(rmax) = rmax {
        let n = positions.len() as f64;
        let centroid = positions.iter().fold([0.0; 3], |acc, p| {
            [acc[0] + p[0] / n, acc[1] + p[1] / n, acc[2] + p[2] / n]
        });
        positions.retain(|p| {
            let dx = p[0] - centroid[0];
            let dy = p[1] - centroid[1];
            let dz = p[2] - centroid[2];
            (dx * dx + dy * dy + dz * dz).sqrt() < rmax
        });
        log::debug!(
            "create_named_configuration: maximum radius {rmax:.1} m includes {} antennas/stations",
            positions.len()
        );
    }

    let mut xyz = Array2::zeros((positions.len(), 3));
    for (mut row, p) in xyz.outer_iter_mut().zip(positions.iter()) {
        row.assign(&ArrayView1::from(p));
    }

    Ok(Configuration {
        name: name.to_string(),
        location,
        xyz,
        diameter,
        mount,
    })
}

/// A centrally condensed core (sunflower pattern, 500 m radius) plus
/// stations on three logarithmic spiral arms reaching 40 km.
fn low_layout(ncore: usize, nouter: usize) -> Vec<[f64; 3]> {
    const CORE_RADIUS: f64 = 500.0;
    const ARM_START: f64 = 600.0;
    const ARM_END: f64 = 40_000.0;

    let mut stations = Vec::with_capacity(ncore + nouter);
    for k in 0..ncore {
        let r = CORE_RADIUS * ((k as f64 + 0.5) / ncore as f64).sqrt();
        let theta = k as f64 * GOLDEN_ANGLE;
        stations.push([r * theta.cos(), r * theta.sin(), 0.0]);
    }

    let per_arm = nouter.div_ceil(3).max(2);
    for k in 0..nouter {
        let arm = k % 3;
        let i = k / 3;
        let t = i as f64 / (per_arm - 1) as f64;
        let r = ARM_START * (ARM_END / ARM_START).powf(t);
        let theta = arm as f64 * TAU / 3.0 + 1.2 * (r / ARM_START).ln();
        stations.push([r * theta.cos(), r * theta.sin(), 0.0]);
    }
    stations
}

/// Three arms of nine antennas in the VLA A-configuration pattern.
fn vla_layout() -> Vec<[f64; 3]> {
    const ARM_LENGTH: f64 = 21_000.0;
    const ARM_AZIMUTHS: [f64; 3] = [355.0, 115.0, 235.0];

    let mut antennas = Vec::with_capacity(27);
    for az in ARM_AZIMUTHS {
        let (s, c) = az.to_radians().sin_cos();
        for i in 1..=9 {
            let r = ARM_LENGTH * (i as f64 / 9.0).powf(1.716);
            antennas.push([r * s, r * c, 0.0]);
        }
    }
    antennas
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_named_configuration_counts() {
        assert_eq!(create_named_configuration("LOWBD2", None).unwrap().nant(), 512);
        let core = create_named_configuration("LOWBD2-CORE", None).unwrap();
        assert_eq!(core.nant(), 166);
        assert_eq!(core.nbases(), 166 * 165 / 2);
        assert_eq!(create_named_configuration("VLAA", None).unwrap().nant(), 27);
        assert!(matches!(
            create_named_configuration("ATCA", None),
            Err(ArlError::UnknownConfiguration(_))
        ));
    }

    #[test]
    fn test_rmax_filter() {
        let full = create_named_configuration("LOWBD2", None).unwrap();
        let cut = create_named_configuration("LOWBD2", Some(1000.0)).unwrap();
        assert!(cut.nant() < full.nant());
        assert!(cut.nant() >= 166);
    }

    #[test]
    fn test_baseline_pairs_order() {
        let pairs = baseline_pairs(4);
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(num_baselines(0), 0);
        assert_eq!(num_baselines(1), 0);
    }

    #[test]
    fn test_uvw_at_zero_hour_angle_pole() {
        // At dec = 90 deg and ha = 0, (u, v) is just (x, y) and w is z.
        let uvw = xyz_to_uvw([10.0, 20.0, 30.0], 0.0, PI / 2.0);
        assert_abs_diff_eq!(uvw[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(uvw[1], 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(uvw[2], 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uvw_preserves_length() {
        let xyz = [123.0, -45.0, 6.0];
        let uvw = xyz_to_uvw(xyz, 0.3, -0.6);
        let len = |v: [f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert_abs_diff_eq!(len(xyz), len(uvw), epsilon = 1e-9);
    }
}
