//! The 24 parameters of the gene regulatory network.
//!
//! The sampler explores a flat vector of 24 reals, whereas the model reads
//! named matrices. The conversion happens once, at the boundary, with
//! [`GrnParameters::try_from`], and everything downstream uses the named
//! fields.
//!
//! Flat layout:
//!
//! | indices | field | order |
//! |---|---|---|
//! | 0..9 | [`GrnParameters::weights`] | row-major, `w_ij` is the effect of gene j on gene i |
//! | 9..12 | [`GrnParameters::production`] | gene |
//! | 12..15 | [`GrnParameters::decay`] | gene |
//! | 15..21 | [`GrnParameters::external`] | signal-major: Wnt on g1, g2, g3, then FGF on g1, g2, g3 |
//! | 21..24 | [`GrnParameters::bias`] | gene |
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Number of genes in the network.
pub const NB_GENES: usize = 3;
/// Number of external boundary signals.
pub const NB_SIGNALS: usize = 2;
/// Dimension of the parameter space explored by the sampler.
pub const NB_PARAMETERS: usize = 24;

const WEIGHTS: usize = 0;
const PRODUCTION: usize = 9;
const DECAY: usize = 12;
const EXTERNAL: usize = 15;
const BIAS: usize = 21;

/// Names of the parameters, in the order of the flat vector.
pub const PARAMETER_NAMES: [&str; NB_PARAMETERS] = [
    "w11", "w12", "w13", "w21", "w22", "w23", "w31", "w32", "w33", "r1", "r2",
    "r3", "lambda1", "lambda2", "lambda3", "e1_wnt", "e2_wnt", "e3_wnt",
    "e1_fgf", "e2_fgf", "e3_fgf", "h1", "h2", "h3",
];

/// Position of the parameter `name` in the flat vector.
pub fn parameter_index(name: &str) -> Option<usize> {
    PARAMETER_NAMES.iter().position(|&n| n == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gene {
    G1,
    G2,
    G3,
}

impl Gene {
    pub const ALL: [Gene; NB_GENES] = [Gene::G1, Gene::G2, Gene::G3];

    pub fn index(&self) -> usize {
        match self {
            Gene::G1 => 0,
            Gene::G2 => 1,
            Gene::G3 => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Gene::G1 => "g1",
            Gene::G2 => "g2",
            Gene::G3 => "g3",
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// The boundary signals perturbing the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Wnt,
    Fgf,
}

impl Signal {
    pub const ALL: [Signal; NB_SIGNALS] = [Signal::Wnt, Signal::Fgf];

    pub fn index(&self) -> usize {
        match self {
            Signal::Wnt => 0,
            Signal::Fgf => 1,
        }
    }
}

/// The parameters of the network, with named fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrnParameters {
    /// Regulatory weights among genes: `weights[i][j]` is the effect of gene
    /// `j` on gene `i`.
    pub weights: [[f64; NB_GENES]; NB_GENES],
    /// Production rates.
    pub production: [f64; NB_GENES],
    /// First-order decay rates.
    pub decay: [f64; NB_GENES],
    /// Weights of the boundary signals: `external[i][k]` is the effect of
    /// signal `k` (see [`Signal::index`]) on gene `i`.
    pub external: [[f64; NB_SIGNALS]; NB_GENES],
    /// Per-gene bias of the regulatory potential.
    pub bias: [f64; NB_GENES],
}

impl GrnParameters {
    pub fn zeros() -> Self {
        GrnParameters {
            weights: [[0.; NB_GENES]; NB_GENES],
            production: [0.; NB_GENES],
            decay: [0.; NB_GENES],
            external: [[0.; NB_SIGNALS]; NB_GENES],
            bias: [0.; NB_GENES],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        //! The flat vector, inverse of [`GrnParameters::try_from`].
        let mut flat = vec![0.; NB_PARAMETERS];
        for i in 0..NB_GENES {
            for j in 0..NB_GENES {
                flat[WEIGHTS + NB_GENES * i + j] = self.weights[i][j];
            }
            flat[PRODUCTION + i] = self.production[i];
            flat[DECAY + i] = self.decay[i];
            for k in 0..NB_SIGNALS {
                flat[EXTERNAL + NB_GENES * k + i] = self.external[i][k];
            }
            flat[BIAS + i] = self.bias[i];
        }
        flat
    }
}

impl TryFrom<&[f64]> for GrnParameters {
    type Error = ParameterError;

    fn try_from(flat: &[f64]) -> Result<Self, Self::Error> {
        if flat.len() != NB_PARAMETERS {
            return Err(ParameterError::Dimension {
                expected: NB_PARAMETERS,
                found: flat.len(),
            });
        }
        let mut parameters = GrnParameters::zeros();
        for i in 0..NB_GENES {
            for j in 0..NB_GENES {
                parameters.weights[i][j] = flat[WEIGHTS + NB_GENES * i + j];
            }
            parameters.production[i] = flat[PRODUCTION + i];
            parameters.decay[i] = flat[DECAY + i];
            for k in 0..NB_SIGNALS {
                parameters.external[i][k] = flat[EXTERNAL + NB_GENES * k + i];
            }
            parameters.bias[i] = flat[BIAS + i];
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn names_are_unique_test() {
        for (i, name) in PARAMETER_NAMES.iter().enumerate() {
            assert_eq!(parameter_index(name), Some(i));
        }
    }

    #[test]
    fn layout_test() {
        let flat: Vec<f64> = (0..NB_PARAMETERS).map(|i| i as f64).collect();
        let parameters = GrnParameters::try_from(flat.as_slice()).unwrap();

        assert_eq!(parameters.weights[0], [0., 1., 2.]);
        assert_eq!(parameters.weights[2][1], 7.);
        assert_eq!(parameters.production, [9., 10., 11.]);
        assert_eq!(parameters.decay, [12., 13., 14.]);
        // signal-major storage of the external weights
        assert_eq!(parameters.external[0], [15., 18.]);
        assert_eq!(parameters.external[1], [16., 19.]);
        assert_eq!(parameters.external[2], [17., 20.]);
        assert_eq!(parameters.bias, [21., 22., 23.]);
        assert_eq!(
            parameters.external[1][Signal::Fgf.index()],
            flat[parameter_index("e2_fgf").unwrap()]
        );
    }

    #[quickcheck]
    fn flat_roundtrip_test(values: Vec<f64>) -> bool {
        let mut flat = values;
        flat.resize(NB_PARAMETERS, 1.);
        let parameters = GrnParameters::try_from(flat.as_slice()).unwrap();
        // compare bits to accept NaN
        parameters
            .to_vec()
            .iter()
            .zip(flat.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    #[test]
    fn wrong_dimension_test() {
        assert_eq!(
            GrnParameters::try_from([0.; 23].as_slice()),
            Err(ParameterError::Dimension { expected: 24, found: 23 })
        );
        assert!(GrnParameters::try_from([0.; 25].as_slice()).is_err());
    }
}
