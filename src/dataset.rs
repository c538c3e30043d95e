//! The observed expression tracks used both as fitting target and as
//! simulation input (initial condition and boundary signals).
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::model::{BoundaryInputs, State};
use crate::parameters::NB_GENES;

/// Largest number of `Time` units allowed between two consecutive
/// observations.
pub const MAX_GAP: usize = 1 << 20;

/// Monotone map from the observation index `Time` to the biological time used
/// by the integrator: `bio_time = offset + factor * time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeScale {
    pub factor: f64,
    pub offset: f64,
}

impl Default for TimeScale {
    fn default() -> Self {
        TimeScale { factor: 1., offset: 0. }
    }
}

impl TimeScale {
    pub fn bio_time(&self, time: f64) -> f64 {
        self.offset + self.factor * time
    }
}

/// The tracks to keep from the loaded pool: `offset..offset + count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Selection {
    pub offset: usize,
    pub count: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Selection { offset: 10, count: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub time: f64,
    pub bio_time: f64,
    pub inputs: BoundaryInputs,
    /// Observed expression of g1, g2, g3.
    pub expression: [f64; NB_GENES],
}

/// The observations of one cell lineage, sorted by strictly increasing time.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: String,
    observations: Vec<Observation>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        observations: Vec<Observation>,
    ) -> Result<Self, DatasetError> {
        //! Fails when the track is empty, when a value is not finite, when
        //! the times are not strictly increasing or when two consecutive
        //! observations are more than [`MAX_GAP`] units apart.
        let id = id.into();
        let invalid = |reason: String| DatasetError::Invalid {
            track: id.clone(),
            reason,
        };
        if observations.is_empty() {
            return Err(invalid("no observations".to_string()));
        }
        for (i, obs) in observations.iter().enumerate() {
            let values = [
                obs.time,
                obs.bio_time,
                obs.inputs.wnt,
                obs.inputs.fgf,
                obs.expression[0],
                obs.expression[1],
                obs.expression[2],
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(invalid(format!(
                    "non-finite value at observation {}",
                    i
                )));
            }
        }
        for (i, pair) in observations.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(invalid(format!(
                    "Time is not increasing between observations {} and {}",
                    i,
                    i + 1
                )));
            }
            if pair[1].bio_time <= pair[0].bio_time {
                return Err(invalid(format!(
                    "BioTime is not increasing between observations {} and {}",
                    i,
                    i + 1
                )));
            }
            if (pair[1].time - pair[0].time).round() > MAX_GAP as f64 {
                return Err(invalid(format!(
                    "more than {} Time units between observations {} and {}",
                    MAX_GAP,
                    i,
                    i + 1
                )));
            }
            if !(pair[1].bio_time - pair[0].bio_time).is_finite() {
                return Err(invalid(format!(
                    "BioTime interval overflows between observations {} and {}",
                    i,
                    i + 1
                )));
            }
        }
        Ok(Track { id, observations })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The observed expression at the first observation, the anchor of the
    /// simulation.
    pub fn initial_state(&self) -> State {
        let [g1, g2, g3] = self.observations[0].expression;
        State::new(g1, g2, g3)
    }

    pub fn gap(&self, i: usize) -> usize {
        //! Number of `Time` units between observations `i` and `i + 1`, more
        //! than one when observations are missing.
        let elapsed =
            self.observations[i + 1].time - self.observations[i].time;
        (elapsed.round() as usize).max(1)
    }
}

/// The selected tracks, read-only for the whole inference.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDataset {
    tracks: Vec<Track>,
}

impl TrackDataset {
    pub fn new(tracks: Vec<Track>) -> Self {
        TrackDataset { tracks }
    }

    pub fn load(
        path2file: &Path,
        time_scale: &TimeScale,
    ) -> Result<Self, DatasetError> {
        //! Load the whole pool of tracks. The format is chosen by extension:
        //! a long csv with a `track` column, or a json list of column tables.
        let extension = path2file
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| DatasetError::Extension(path2file.to_owned()))?;
        let tracks = match extension {
            "csv" => read_csv(path2file, time_scale)?,
            "json" => {
                let content = fs::read_to_string(path2file).map_err(
                    |source| DatasetError::Io {
                        path: path2file.to_owned(),
                        source,
                    },
                )?;
                let tables: Vec<TrackTable> = serde_json::from_str(&content)?;
                tables
                    .into_iter()
                    .enumerate()
                    .map(|(idx, table)| table.into_track(idx, time_scale))
                    .collect::<Result<Vec<Track>, DatasetError>>()?
            }
            _ => return Err(DatasetError::Extension(path2file.to_owned())),
        };
        log::debug!("loaded {} tracks from {:?}", tracks.len(), path2file);
        Ok(TrackDataset { tracks })
    }

    pub fn select(self, selection: &Selection) -> Result<Self, DatasetError> {
        //! Keep the contiguous slice of tracks given by `selection`.
        let end = selection.offset + selection.count;
        if end > self.tracks.len() {
            return Err(DatasetError::NotEnoughTracks {
                found: self.tracks.len(),
                offset: selection.offset,
                end,
            });
        }
        let tracks = self
            .tracks
            .into_iter()
            .skip(selection.offset)
            .take(selection.count)
            .collect();
        Ok(TrackDataset { tracks })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn nb_observations(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }
}

/// One row of the long csv format.
#[derive(Debug, Deserialize)]
struct Record {
    track: String,
    #[serde(rename = "Time")]
    time: f64,
    #[serde(rename = "BioTime", default)]
    bio_time: Option<f64>,
    #[serde(rename = "Wnt")]
    wnt: f64,
    #[serde(rename = "FGF")]
    fgf: f64,
    g1: f64,
    g2: f64,
    g3: f64,
}

fn read_csv(
    path2file: &Path,
    time_scale: &TimeScale,
) -> Result<Vec<Track>, DatasetError> {
    let mut reader = csv::Reader::from_path(path2file)?;
    // tracks in order of first appearance
    let mut ids: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut observations: Vec<Vec<Observation>> = Vec::new();

    for record in reader.deserialize() {
        let record: Record = record?;
        let idx = *positions.entry(record.track.clone()).or_insert_with(|| {
            ids.push(record.track.clone());
            observations.push(Vec::new());
            ids.len() - 1
        });
        observations[idx].push(Observation {
            time: record.time,
            bio_time: record
                .bio_time
                .unwrap_or_else(|| time_scale.bio_time(record.time)),
            inputs: BoundaryInputs::new(record.wnt, record.fgf),
            expression: [record.g1, record.g2, record.g3],
        });
    }

    ids.into_iter()
        .zip(observations)
        .map(|(id, observations)| Track::new(id, observations))
        .collect()
}

/// One track of the json format, stored by column.
#[derive(Debug, Deserialize)]
struct TrackTable {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "Time")]
    time: Vec<f64>,
    #[serde(rename = "BioTime", default)]
    bio_time: Option<Vec<f64>>,
    #[serde(rename = "Wnt")]
    wnt: Vec<f64>,
    #[serde(rename = "FGF")]
    fgf: Vec<f64>,
    g1: Vec<f64>,
    g2: Vec<f64>,
    g3: Vec<f64>,
}

impl TrackTable {
    fn into_track(
        self,
        idx: usize,
        time_scale: &TimeScale,
    ) -> Result<Track, DatasetError> {
        let id = self.id.unwrap_or_else(|| idx.to_string());
        let n = self.time.len();
        let mut lengths = vec![
            self.wnt.len(),
            self.fgf.len(),
            self.g1.len(),
            self.g2.len(),
            self.g3.len(),
        ];
        if let Some(bio_time) = &self.bio_time {
            lengths.push(bio_time.len());
        }
        if lengths.iter().any(|&len| len != n) {
            return Err(DatasetError::Invalid {
                track: id,
                reason: format!(
                    "columns of different lengths, Time has {} rows",
                    n
                ),
            });
        }

        let observations = (0..n)
            .map(|i| Observation {
                time: self.time[i],
                bio_time: match &self.bio_time {
                    Some(bio_time) => bio_time[i],
                    None => time_scale.bio_time(self.time[i]),
                },
                inputs: BoundaryInputs::new(self.wnt[i], self.fgf[i]),
                expression: [self.g1[i], self.g2[i], self.g3[i]],
            })
            .collect();
        Track::new(id, observations)
    }
}
