//! Phase centres and world coordinate systems.
//!
//! Both are exchanged through the C boundary as NUL-terminated JSON text in
//! caller-owned byte buffers, so they derive `serde` traits.

use serde::{Deserialize, Serialize};

use crate::error::ArlError;

/// A sky direction used as the phase reference of an observation.
///
/// Both coordinates are in degrees (ICRS, J2000).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseCentre {
    pub ra: f64,
    pub dec: f64,
}

impl PhaseCentre {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Declination in radians.
    pub fn dec_rad(&self) -> f64 {
        self.dec.to_radians()
    }

    /// Direction cosines `[l, m, n]` of this direction in the SIN projection
    /// about `centre`. `n` is negative behind the tangent plane.
    pub fn lmn_relative_to(&self, centre: &PhaseCentre) -> [f64; 3] {
        let (dec, dec0) = (self.dec.to_radians(), centre.dec.to_radians());
        let (sin_dra, cos_dra) = (self.ra - centre.ra).to_radians().sin_cos();
        let l = dec.cos() * sin_dra;
        let m = dec.sin() * dec0.cos() - dec.cos() * dec0.sin() * cos_dra;
        let n = dec.sin() * dec0.sin() + dec.cos() * dec0.cos() * cos_dra;
        [l, m, n]
    }

    /// The direction with cosines `(l, m)` about this one, or `None` if
    /// `l^2 + m^2 > 1`.
    pub fn offset_by_lm(&self, l: f64, m: f64) -> Option<PhaseCentre> {
        let r2 = l * l + m * m;
        if r2 > 1.0 {
            return None;
        }
        let n = (1.0 - r2).sqrt();
        let (sin_dec0, cos_dec0) = self.dec_rad().sin_cos();
        let dec = (m * cos_dec0 + n * sin_dec0).clamp(-1.0, 1.0).asin();
        let dra = l.atan2(n * cos_dec0 - m * sin_dec0);
        Some(PhaseCentre::new(
            (self.ra + dra.to_degrees()).rem_euclid(360.0),
            dec.to_degrees(),
        ))
    }

    pub fn to_json(&self) -> String {
        // Serialising a struct of two floats cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(s: &str) -> Result<Self, ArlError> {
        serde_json::from_str(s).map_err(|source| ArlError::Descriptor {
            what: "phase centre",
            source,
        })
    }
}

/// A four-axis FITS-style world coordinate system for image cubes.
///
/// The axes are (RA, Dec, Stokes, frequency), the reverse of the array
/// order `[nchan, npol, ny, nx]`. `crpix` is 1-relative and `cdelt` is in
/// degrees for the sky axes and Hz for the frequency axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wcs {
    pub ctype: [String; 4],
    pub crval: [f64; 4],
    pub crpix: [f64; 4],
    pub cdelt: [f64; 4],
    pub radesys: String,
    pub equinox: f64,
}

impl Wcs {
    /// Create a sky WCS centred on `phase_centre` for an `npixel` square
    /// image with `cellsize` radians per pixel.
    pub fn new(
        phase_centre: PhaseCentre,
        cellsize: f64,
        npixel: usize,
        reference_frequency: f64,
        channel_width: f64,
    ) -> Self {
        let cell_deg = cellsize.to_degrees();
        let centre = (npixel / 2 + 1) as f64;
        Self {
            ctype: [
                "RA---SIN".to_string(),
                "DEC--SIN".to_string(),
                "STOKES".to_string(),
                "FREQ".to_string(),
            ],
            // The negation in the longitude is needed by definition of RA.
            cdelt: [-cell_deg, cell_deg, 1.0, channel_width],
            crpix: [centre, centre, 1.0, 1.0],
            crval: [phase_centre.ra, phase_centre.dec, 1.0, reference_frequency],
            radesys: "ICRS".to_string(),
            equinox: 2000.0,
        }
    }

    /// Pixel size in radians.
    pub fn cellsize(&self) -> f64 {
        self.cdelt[0].abs().to_radians()
    }

    /// The direction of the reference pixel.
    pub fn phase_centre(&self) -> PhaseCentre {
        PhaseCentre::new(self.crval[0], self.crval[1])
    }

    /// 0-relative reference pixel as `(x, y)`.
    pub fn reference_pixel(&self) -> (f64, f64) {
        (self.crpix[0] - 1.0, self.crpix[1] - 1.0)
    }

    /// 0-relative pixel `(x, y)` of `direction`, or `None` if it lies behind
    /// the tangent plane.
    pub fn sky_to_pixel(&self, direction: &PhaseCentre) -> Option<(f64, f64)> {
        let [l, m, n] = direction.lmn_relative_to(&self.phase_centre());
        if n <= 0.0 {
            return None;
        }
        let (x0, y0) = self.reference_pixel();
        Some((x0 + l.to_degrees() / self.cdelt[0], y0 + m.to_degrees() / self.cdelt[1]))
    }

    /// Sky direction of the 0-relative pixel `(x, y)`, or `None` beyond the
    /// horizon of the projection.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> Option<PhaseCentre> {
        let (x0, y0) = self.reference_pixel();
        let l = ((x - x0) * self.cdelt[0]).to_radians();
        let m = ((y - y0) * self.cdelt[1]).to_radians();
        self.phase_centre().offset_by_lm(l, m)
    }

    /// Frequency of channel `chan` \[Hz\].
    pub fn channel_frequency(&self, chan: usize) -> f64 {
        self.crval[3] + (chan as f64 + 1.0 - self.crpix[3]) * self.cdelt[3]
    }

    /// The channel nearest to `freq`, clamped into `0..nchan`.
    pub fn nearest_channel(&self, freq: f64, nchan: usize) -> usize {
        if nchan <= 1 || self.cdelt[3] == 0.0 {
            return 0;
        }
        let chan = ((freq - self.crval[3]) / self.cdelt[3] + self.crpix[3] - 1.0).round();
        chan.clamp(0.0, (nchan - 1) as f64) as usize
    }

    /// Set the pixel size, keeping the RA axis negative.
    pub fn set_cellsize(&mut self, cellsize: f64) {
        let cell_deg = cellsize.to_degrees();
        self.cdelt[0] = -cell_deg;
        self.cdelt[1] = cell_deg;
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(s: &str) -> Result<Self, ArlError> {
        serde_json::from_str(s).map_err(|source| ArlError::Descriptor { what: "WCS", source })
    }
}
