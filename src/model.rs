//! The rate of change of the three-gene network.
//!
//! Each gene `i` is produced at a rate `R_i g(u_i)` and decays at a rate
//! `lambda_i s_i`, where the regulatory potential `u_i` sums the contributions
//! of the genes, of the boundary signals and of the bias:
//!
//! `u_i = sum_j W_ij s_j + sum_k E_ik B_k + h_i`.
use ode_solvers::{System, Vector3};

use crate::parameters::{GrnParameters, NB_GENES, NB_SIGNALS};

/// The expression levels of the three genes.
pub type State = Vector3<f64>;

/// Saturating activation mapping any real potential into `(0, 1)`:
/// `g(x) = 0.5 (x / sqrt(x^2 + 1) + 1)`.
///
/// For negative `x` the equivalent form `0.5 / (h (h - x))`, with
/// `h = sqrt(x^2 + 1)`, avoids the cancellation of `1 + x / h`. For positive
/// `x`, `x / h` is computed as `1 / sqrt(1 / x^2 + 1)` which stays finite at
/// infinity.
pub fn squash(x: f64) -> f64 {
    if x >= 0. {
        0.5 * (1. + 1. / x.recip().hypot(1.))
    } else {
        let h = x.hypot(1.);
        0.5 / (h * (h - x))
    }
}

/// The boundary signals, constant between two observations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundaryInputs {
    pub wnt: f64,
    pub fgf: f64,
}

impl BoundaryInputs {
    pub fn new(wnt: f64, fgf: f64) -> Self {
        BoundaryInputs { wnt, fgf }
    }

    fn as_array(&self) -> [f64; NB_SIGNALS] {
        [self.wnt, self.fgf]
    }
}

/// The network under fixed boundary inputs, an autonomous system.
#[derive(Debug, Clone, Copy)]
pub struct GrnSystem<'a> {
    parameters: &'a GrnParameters,
    inputs: BoundaryInputs,
}

impl<'a> GrnSystem<'a> {
    pub fn new(parameters: &'a GrnParameters, inputs: BoundaryInputs) -> Self {
        GrnSystem { parameters, inputs }
    }

    pub fn potential(&self, state: &State) -> [f64; NB_GENES] {
        let signals = self.inputs.as_array();
        let mut potential = self.parameters.bias;
        for (i, u) in potential.iter_mut().enumerate() {
            for j in 0..NB_GENES {
                *u += self.parameters.weights[i][j] * state[j];
            }
            for (k, signal) in signals.iter().enumerate() {
                *u += self.parameters.external[i][k] * signal;
            }
        }
        potential
    }

    pub fn derivative(&self, state: &State) -> State {
        let potential = self.potential(state);
        State::from_fn(|i, _| {
            self.parameters.production[i] * squash(potential[i])
                - self.parameters.decay[i] * state[i]
        })
    }
}

impl System<f64, State> for GrnSystem<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        *dy = self.derivative(y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ModerateReal;
    use quickcheck_macros::quickcheck;

    #[test]
    fn squash_at_zero_test() {
        assert_eq!(squash(0.), 0.5);
    }

    #[test]
    fn squash_limits_test() {
        assert!((squash(1e6) - 1.).abs() < 1e-12);
        assert!(squash(-1e6) < 1e-12);
        assert!(squash(-1e6) >= 0.);
        assert_eq!(squash(f64::MAX), 1.);
        assert_eq!(squash(f64::MIN), 0.);
        assert_eq!(squash(f64::INFINITY), 1.);
        assert_eq!(squash(f64::NEG_INFINITY), 0.);
    }

    #[test]
    fn squash_is_odd_around_one_half_test() {
        for x in [0.1, 0.5, 1., 3., 42.] {
            assert!((squash(x) + squash(-x) - 1.).abs() < 1e-15);
        }
    }

    #[quickcheck]
    fn squash_bounded_test(x: ModerateReal) -> bool {
        let y = squash(x.0);
        0. < y && y < 1.
    }

    #[quickcheck]
    fn squash_monotone_test(x: ModerateReal, delta: u16) -> bool {
        let y = x.0 + 1e-3 * (delta as f64 + 1.);
        squash(x.0) < squash(y)
    }

    #[quickcheck]
    fn squash_defined_everywhere_test(x: f64) -> bool {
        x.is_nan() || (0. ..=1.).contains(&squash(x))
    }

    #[test]
    fn derivative_test() {
        let mut parameters = GrnParameters::zeros();
        parameters.production = [1., 2., 3.];
        parameters.decay = [0.5, 1., 2.];
        parameters.weights =
            [[0.5, 1., -0.25], [2., -0.5, 0.125], [-1., 0.25, 0.5]];
        parameters.external = [[1., 0.], [0., -2.], [0.5, 0.5]];
        parameters.bias = [0.25, -0.5, 0.];
        let system = GrnSystem::new(&parameters, BoundaryInputs::new(0.5, 0.25));
        let state = State::new(1., 2., 4.);

        // u0 = 0.25 + (0.5 + 2 - 1) + 0.5
        // u1 = -0.5 + (2 - 1 + 0.5) - 0.5
        // u2 = 0 + (-1 + 0.5 + 2) + (0.25 + 0.125)
        assert_eq!(system.potential(&state), [2.25, 0.5, 1.875]);
        let dy = system.derivative(&state);
        assert_eq!(dy[0], 1. * squash(2.25) - 0.5 * 1.);
        assert_eq!(dy[1], 2. * squash(0.5) - 1. * 2.);
        assert_eq!(dy[2], 3. * squash(1.875) - 2. * 4.);
    }

    #[test]
    fn weight_couples_row_gene_to_column_gene_test() {
        let state = State::new(1., 2., 4.);
        for i in 0..NB_GENES {
            for j in 0..NB_GENES {
                let mut parameters = GrnParameters::zeros();
                parameters.weights[i][j] = 1.;
                let system =
                    GrnSystem::new(&parameters, BoundaryInputs::new(3., 5.));
                let mut expected = [0.; NB_GENES];
                expected[i] = state[j];
                assert_eq!(system.potential(&state), expected, "W[{}][{}]", i, j);
            }
        }
    }

    #[test]
    fn derivative_tolerates_extreme_states_test() {
        let mut parameters = GrnParameters::zeros();
        parameters.weights = [[5., -3., 2.], [1., 1., 1.], [-8., 0., 9.]];
        parameters.production = [1., 1., 1.];
        parameters.decay = [1., 1., 1.];
        let system = GrnSystem::new(&parameters, BoundaryInputs::default());
        let dy = system.derivative(&State::new(-1e200, 1e200, -3.));
        // production is bounded, the decay term dominates
        assert!(dy[0] > 0.);
        assert!(dy[1] < 0.);
        assert!(dy.iter().all(|d| !d.is_nan()));
    }

    #[test]
    fn system_matches_derivative_test() {
        let mut parameters = GrnParameters::zeros();
        parameters.production = [1., 1., 1.];
        parameters.decay = [0.1, 0.2, 0.3];
        let system = GrnSystem::new(&parameters, BoundaryInputs::new(1., 1.));
        let state = State::new(0.2, 0.4, 0.6);
        let mut dy = State::zeros();
        system.system(0., &state, &mut dy);
        assert_eq!(dy, system.derivative(&state));
    }
}
