//! Polarisation frames and conversions between them.

use num_complex::Complex64;

use crate::error::ArlError;

/// The polarisation basis of an image or a set of visibilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolarisationFrame {
    /// Total intensity only.
    StokesI,
    /// Full Stokes: I, Q, U, V.
    StokesIQUV,
    /// Linear feeds: XX, XY, YX, YY.
    Linear,
    /// Linear feeds, parallel hands only: XX, YY.
    LinearNp,
    /// Circular feeds: RR, RL, LR, LL.
    Circular,
    /// Circular feeds, parallel hands only: RR, LL.
    CircularNp,
}

impl PolarisationFrame {
    /// Get the string name of this frame.
    pub fn name(&self) -> &'static str {
        match self {
            PolarisationFrame::StokesI => "stokesI",
            PolarisationFrame::StokesIQUV => "stokesIQUV",
            PolarisationFrame::Linear => "linear",
            PolarisationFrame::LinearNp => "linearnp",
            PolarisationFrame::Circular => "circular",
            PolarisationFrame::CircularNp => "circularnp",
        }
    }

    /// Parse a frame from its name.
    pub fn from_name(name: &str) -> Result<Self, ArlError> {
        match name.trim() {
            "stokesI" => Ok(PolarisationFrame::StokesI),
            "stokesIQUV" => Ok(PolarisationFrame::StokesIQUV),
            "linear" => Ok(PolarisationFrame::Linear),
            "linearnp" => Ok(PolarisationFrame::LinearNp),
            "circular" => Ok(PolarisationFrame::Circular),
            "circularnp" => Ok(PolarisationFrame::CircularNp),
            other => Err(ArlError::UnknownPolarisationFrame(other.to_string())),
        }
    }

    /// Number of polarisation products in this frame.
    pub fn npol(&self) -> usize {
        match self {
            PolarisationFrame::StokesI => 1,
            PolarisationFrame::LinearNp | PolarisationFrame::CircularNp => 2,
            PolarisationFrame::StokesIQUV
            | PolarisationFrame::Linear
            | PolarisationFrame::Circular => 4,
        }
    }

    /// The frame assumed for visibilities that only declare a polarisation
    /// count.
    pub fn for_visibility_npol(npol: i32) -> Result<Self, ArlError> {
        match npol {
            1 => Ok(PolarisationFrame::StokesI),
            2 => Ok(PolarisationFrame::LinearNp),
            4 => Ok(PolarisationFrame::Linear),
            n => Err(ArlError::InvalidPolarisationCount(n)),
        }
    }

    /// Indices of the parallel-hand products (XX/YY, RR/LL or I).
    pub fn parallel_hands(&self) -> &'static [usize] {
        match self {
            PolarisationFrame::StokesI => &[0],
            PolarisationFrame::StokesIQUV => &[0],
            PolarisationFrame::LinearNp | PolarisationFrame::CircularNp => &[0, 1],
            PolarisationFrame::Linear | PolarisationFrame::Circular => &[0, 3],
        }
    }

    /// Receptor indices `(r1, r2)` of each product, for frames built from
    /// receptor pairs. Stokes frames are treated as a single receptor.
    pub fn receptor_pairs(&self) -> &'static [(usize, usize)] {
        match self {
            PolarisationFrame::StokesI => &[(0, 0)],
            PolarisationFrame::StokesIQUV => &[(0, 0), (0, 0), (0, 0), (0, 0)],
            PolarisationFrame::LinearNp | PolarisationFrame::CircularNp => &[(0, 0), (1, 1)],
            PolarisationFrame::Linear | PolarisationFrame::Circular => {
                &[(0, 0), (0, 1), (1, 0), (1, 1)]
            }
        }
    }

    /// Number of receptors needed to describe gains in this frame.
    pub fn nrec(&self) -> usize {
        match self {
            PolarisationFrame::StokesI | PolarisationFrame::StokesIQUV => 1,
            _ => 2,
        }
    }

    fn is_stokes(&self) -> bool {
        matches!(
            self,
            PolarisationFrame::StokesI | PolarisationFrame::StokesIQUV
        )
    }
}

impl std::fmt::Display for PolarisationFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert one pixel's (or one sample's) polarisation products from one frame
/// to another.
///
/// Conversions between Stokes and linear or circular products use the
/// standard relations, e.g. XX = I + Q, XY = U + iV, YX = U - iV, YY = I - Q.
/// Stokes I maps to both parallel hands, and back to I as their mean.
pub fn convert_polarisation(
    from: PolarisationFrame,
    to: PolarisationFrame,
    values: &[Complex64],
) -> Result<Vec<Complex64>, ArlError> {
    use PolarisationFrame::*;

    if values.len() != from.npol() {
        return Err(ArlError::ShapeMismatch(format!(
            "{} products supplied for frame {from}",
            values.len()
        )));
    }
    if from == to {
        return Ok(values.to_vec());
    }

    let zero = Complex64::new(0.0, 0.0);
    let j = Complex64::new(0.0, 1.0);

    let out = match (from, to) {
        (StokesI, _) => {
            let mut out = vec![zero; to.npol()];
            for &p in to.parallel_hands() {
                out[p] = values[0];
            }
            out
        }
        (_, StokesI) if !from.is_stokes() => {
            let hands = from.parallel_hands();
            let sum: Complex64 = hands.iter().map(|&p| values[p]).sum();
            vec![sum / hands.len() as f64]
        }
        (StokesIQUV, StokesI) => vec![values[0]],
        (StokesIQUV, Linear) => {
            let (i, q, u, v) = (values[0], values[1], values[2], values[3]);
            vec![i + q, u + j * v, u - j * v, i - q]
        }
        (StokesIQUV, Circular) => {
            let (i, q, u, v) = (values[0], values[1], values[2], values[3]);
            vec![i + v, q + j * u, q - j * u, i - v]
        }
        (Linear, StokesIQUV) => {
            let (xx, xy, yx, yy) = (values[0], values[1], values[2], values[3]);
            vec![
                (xx + yy) * 0.5,
                (xx - yy) * 0.5,
                (xy + yx) * 0.5,
                -j * (xy - yx) * 0.5,
            ]
        }
        (Circular, StokesIQUV) => {
            let (rr, rl, lr, ll) = (values[0], values[1], values[2], values[3]);
            vec![
                (rr + ll) * 0.5,
                (rl + lr) * 0.5,
                -j * (rl - lr) * 0.5,
                (rr - ll) * 0.5,
            ]
        }
        (StokesIQUV, LinearNp) => vec![values[0] + values[1], values[0] - values[1]],
        (StokesIQUV, CircularNp) => vec![values[0] + values[3], values[0] - values[3]],
        (LinearNp, StokesIQUV) => {
            let (xx, yy) = (values[0], values[1]);
            vec![(xx + yy) * 0.5, (xx - yy) * 0.5, zero, zero]
        }
        (CircularNp, StokesIQUV) => {
            let (rr, ll) = (values[0], values[1]);
            vec![(rr + ll) * 0.5, zero, zero, (rr - ll) * 0.5]
        }
        (from, to) => {
            // Same feed type, different product subsets: copy the matching
            // parallel hands and leave the rest empty.
            let same_feed = matches!(
                (from, to),
                (Linear, LinearNp) | (LinearNp, Linear) | (Circular, CircularNp) | (CircularNp, Circular)
            );
            if !same_feed {
                return Err(ArlError::InvalidArgument(format!(
                    "cannot convert polarisation frame {from} to {to}"
                )));
            }
            let mut out = vec![zero; to.npol()];
            for (&pf, &pt) in from.parallel_hands().iter().zip(to.parallel_hands()) {
                out[pt] = values[pf];
            }
            out
        }
    };

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_names_round_trip() {
        for frame in [
            PolarisationFrame::StokesI,
            PolarisationFrame::StokesIQUV,
            PolarisationFrame::Linear,
            PolarisationFrame::LinearNp,
            PolarisationFrame::Circular,
            PolarisationFrame::CircularNp,
        ] {
            assert_eq!(PolarisationFrame::from_name(frame.name()).unwrap(), frame);
        }
        assert!(PolarisationFrame::from_name("bogus").is_err());
    }

    #[test]
    fn test_visibility_frame_from_npol() {
        assert_eq!(
            PolarisationFrame::for_visibility_npol(4).unwrap(),
            PolarisationFrame::Linear
        );
        assert!(matches!(
            PolarisationFrame::for_visibility_npol(3),
            Err(ArlError::InvalidPolarisationCount(3))
        ));
    }

    #[test]
    fn test_stokes_i_to_linear_fills_parallel_hands() {
        let out = convert_polarisation(
            PolarisationFrame::StokesI,
            PolarisationFrame::Linear,
            &[c(2.0, 0.0)],
        )
        .unwrap();
        assert_eq!(out, vec![c(2.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(2.0, 0.0)]);
    }

    #[test]
    fn test_stokes_linear_round_trip() {
        let iquv = [c(1.0, 0.0), c(0.2, 0.0), c(-0.1, 0.0), c(0.05, 0.0)];
        let linear =
            convert_polarisation(PolarisationFrame::StokesIQUV, PolarisationFrame::Linear, &iquv)
                .unwrap();
        let back =
            convert_polarisation(PolarisationFrame::Linear, PolarisationFrame::StokesIQUV, &linear)
                .unwrap();
        for (a, b) in iquv.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stokes_circular_round_trip() {
        let iquv = [c(1.0, 0.0), c(0.3, 0.0), c(0.1, 0.0), c(-0.2, 0.0)];
        let circ = convert_polarisation(
            PolarisationFrame::StokesIQUV,
            PolarisationFrame::Circular,
            &iquv,
        )
        .unwrap();
        let back = convert_polarisation(
            PolarisationFrame::Circular,
            PolarisationFrame::StokesIQUV,
            &circ,
        )
        .unwrap();
        for (a, b) in iquv.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wrong_length_rejected() {
        let result = convert_polarisation(
            PolarisationFrame::Linear,
            PolarisationFrame::StokesI,
            &[c(1.0, 0.0)],
        );
        assert!(matches!(result, Err(ArlError::ShapeMismatch(_))));
    }
}
