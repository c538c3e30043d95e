//! Piecewise forward simulation of the network along the observation grid of
//! each track.
//!
//! Between observations `i` and `i + 1` the boundary signals are held at
//! their values at `i`, and the network is integrated over the biological
//! time interval with `steps_per_unit * gap` fixed Runge-Kutta steps, where
//! `gap` is the number of `Time` units elapsed (more than one when
//! observations are missing). The state reached at the end of the interval is
//! the simulated expression at `i + 1`.
use std::fs;
use std::path::Path;

use anyhow::Context;
use ode_solvers::rk4::Rk4;
use serde::{Deserialize, Serialize};

use crate::dataset::{Track, TrackDataset};
use crate::error::SimulationError;
use crate::model::{GrnSystem, State};
use crate::parameters::{GrnParameters, NB_GENES};

/// Default number of internal integration steps per `Time` unit.
pub const STEPS_PER_UNIT: usize = 10;

/// A track together with its simulated expression, aligned 1:1 with the
/// observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrack<'a> {
    pub track: &'a Track,
    /// Simulated g1, g2, g3 for each observation, the first entry being the
    /// observed initial condition.
    pub simulated: Vec<[f64; NB_GENES]>,
}

impl SimulatedTrack<'_> {
    pub fn residuals(&self) -> impl Iterator<Item = [f64; NB_GENES]> + '_ {
        //! Simulated minus observed expression, for each observation.
        self.simulated.iter().zip(self.track.observations()).map(
            |(sim, obs)| {
                [
                    sim[0] - obs.expression[0],
                    sim[1] - obs.expression[1],
                    sim[2] - obs.expression[2],
                ]
            },
        )
    }
}

/// Simulate the tracks for a parameter vector.
///
/// The posterior is generic over this trait such that the simulator can be
/// replaced, e.g. by a stub in the tests.
pub trait Simulate: Sync {
    fn simulate_track<'a>(
        &self,
        track: &'a Track,
        parameters: &GrnParameters,
    ) -> Result<SimulatedTrack<'a>, SimulationError>;

    fn simulate_dataset<'a>(
        &self,
        dataset: &'a TrackDataset,
        parameters: &GrnParameters,
    ) -> Result<Vec<SimulatedTrack<'a>>, SimulationError> {
        //! Simulate each track independently, in the order of the dataset.
        //! Stops at the first track that fails.
        dataset
            .tracks()
            .iter()
            .map(|track| self.simulate_track(track, parameters))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSimulator {
    steps_per_unit: usize,
}

impl Default for TrackSimulator {
    fn default() -> Self {
        TrackSimulator { steps_per_unit: STEPS_PER_UNIT }
    }
}

impl TrackSimulator {
    pub fn new(steps_per_unit: usize) -> Self {
        TrackSimulator { steps_per_unit: steps_per_unit.max(1) }
    }

    pub fn steps_per_unit(&self) -> usize {
        self.steps_per_unit
    }

    fn integrate_interval(
        &self,
        track: &Track,
        i: usize,
        state: State,
        parameters: &GrnParameters,
    ) -> Result<State, SimulationError> {
        //! Advance `state` from observation `i` to `i + 1`.
        let observations = track.observations();
        let system = GrnSystem::new(parameters, observations[i].inputs);
        let failure = |reason: String| SimulationError::Integration {
            track: track.id().to_string(),
            observation: i,
            reason,
        };
        let nb_steps =
            self.steps_per_unit.checked_mul(track.gap(i)).ok_or_else(|| {
                failure(format!(
                    "{} steps per unit over a gap of {} overflows",
                    self.steps_per_unit,
                    track.gap(i)
                ))
            })?;
        let step =
            (observations[i + 1].bio_time - observations[i].bio_time)
                / nb_steps as f64;
        if !(step.is_finite() && step > 0.) {
            return Err(failure(format!("invalid step size {}", step)));
        }

        // The system is autonomous between two observations, hence each
        // internal step is integrated over [0, step] which gives exactly one
        // Runge-Kutta step.
        let mut state = state;
        for _ in 0..nb_steps {
            let mut stepper = Rk4::new(system, 0., state, step, step);
            stepper.integrate().map_err(|e| failure(e.to_string()))?;
            state = *stepper.y_out().last().ok_or_else(|| {
                failure("the integrator returned no state".to_string())
            })?;
        }
        Ok(state)
    }
}

impl Simulate for TrackSimulator {
    fn simulate_track<'a>(
        &self,
        track: &'a Track,
        parameters: &GrnParameters,
    ) -> Result<SimulatedTrack<'a>, SimulationError> {
        let mut state = track.initial_state();
        let mut simulated = Vec::with_capacity(track.len());
        simulated.push([state[0], state[1], state[2]]);

        for i in 0..track.len() - 1 {
            state = self.integrate_interval(track, i, state, parameters)?;
            if state.iter().any(|s| !s.is_finite()) {
                return Err(SimulationError::NonFinite {
                    track: track.id().to_string(),
                    observation: i + 1,
                    bio_time: track.observations()[i + 1].bio_time,
                    state: [state[0], state[1], state[2]],
                });
            }
            simulated.push([state[0], state[1], state[2]]);
        }
        Ok(SimulatedTrack { track, simulated })
    }
}

/// One row of the csv with the simulated tracks.
#[derive(Debug, Serialize)]
struct SimulatedRecord<'a> {
    track: &'a str,
    #[serde(rename = "Time")]
    time: f64,
    #[serde(rename = "BioTime")]
    bio_time: f64,
    #[serde(rename = "Wnt")]
    wnt: f64,
    #[serde(rename = "FGF")]
    fgf: f64,
    g1: f64,
    g2: f64,
    g3: f64,
    g1_sim: f64,
    g2_sim: f64,
    g3_sim: f64,
}

pub fn save_simulated(
    simulated: &[SimulatedTrack],
    path2file: &Path,
) -> anyhow::Result<()> {
    //! Write the observed and simulated tracks in the long csv format.
    if let Some(parent) = path2file.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Cannot create dir {:#?}", parent)
        })?;
    }
    let mut wtr = csv::Writer::from_path(path2file)
        .with_context(|| format!("Cannot create {:#?}", path2file))?;
    for sim in simulated {
        for (obs, values) in sim.track.observations().iter().zip(&sim.simulated)
        {
            wtr.serialize(SimulatedRecord {
                track: sim.track.id(),
                time: obs.time,
                bio_time: obs.bio_time,
                wnt: obs.inputs.wnt,
                fgf: obs.inputs.fgf,
                g1: obs.expression[0],
                g2: obs.expression[1],
                g3: obs.expression[2],
                g1_sim: values[0],
                g2_sim: values[1],
                g3_sim: values[2],
            })
            .with_context(|| {
                format!("Cannot serialize track {}", sim.track.id())
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}
