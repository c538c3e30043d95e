//! The model configuration, read from a TOML file.
//!
//! Every entry is optional: missing entries keep their default value, and the
//! `[prior]` and `[noise]` tables override only the parameters they name.
//!
//! ```toml
//! steps_per_unit = 20
//!
//! [selection]
//! offset = 0
//! count = 5
//!
//! [time_scale]
//! factor = 0.5
//! offset = 1.0
//!
//! [prior]
//! r3 = [0.0, 50.0]
//!
//! [noise]
//! g3 = 0.05
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::dataset::{Selection, TimeScale};
use crate::error::ConfigError;
use crate::posterior::{default_bounds, default_noise, NoiseModel, Prior};
use crate::simulation::{TrackSimulator, STEPS_PER_UNIT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Number of integration steps per unit of `Time`.
    pub steps_per_unit: usize,
    pub selection: Selection,
    pub time_scale: TimeScale,
    /// Open interval of the uniform prior of each parameter.
    pub prior: BTreeMap<String, (f64, f64)>,
    /// Standard deviation of the observation noise of each gene.
    pub noise: BTreeMap<String, f64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            steps_per_unit: STEPS_PER_UNIT,
            selection: Selection::default(),
            time_scale: TimeScale::default(),
            prior: default_bounds(),
            noise: default_noise(),
        }
    }
}

/// The file content, where everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    selection: Option<Selection>,
    time_scale: Option<TimeScale>,
    steps_per_unit: Option<usize>,
    prior: BTreeMap<String, (f64, f64)>,
    noise: BTreeMap<String, f64>,
}

impl InferenceConfig {
    pub fn load(path2file: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path2file).map_err(|source| {
            ConfigError::Io { path: path2file.to_owned(), source }
        })?;
        let config = Self::from_toml(&content)?;
        log::debug!("loaded configuration {:#?}", config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        //! Merge the entries found in `content` onto the defaults and check
        //! that the prior and the noise model are valid and that there is at
        //! least one integration step per `Time` unit.
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = InferenceConfig::default();
        if let Some(selection) = file.selection {
            config.selection = selection;
        }
        if let Some(time_scale) = file.time_scale {
            config.time_scale = time_scale;
        }
        if let Some(steps) = file.steps_per_unit {
            if steps == 0 {
                return Err(ConfigError::NoSteps);
            }
            config.steps_per_unit = steps;
        }
        config.prior.extend(file.prior);
        config.noise.extend(file.noise);

        config.prior()?;
        config.noise()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn prior(&self) -> Result<Prior, ConfigError> {
        Ok(Prior::try_from(&self.prior)?)
    }

    pub fn noise(&self) -> Result<NoiseModel, ConfigError> {
        Ok(NoiseModel::try_from(&self.noise)?)
    }

    pub fn simulator(&self) -> TrackSimulator {
        TrackSimulator::new(self.steps_per_unit)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ParameterError;
    use crate::parameters::{parameter_index, Gene};
    use crate::posterior::Bounds;

    #[test]
    fn empty_file_is_default_test() {
        assert_eq!(
            InferenceConfig::from_toml("").unwrap(),
            InferenceConfig::default()
        );
    }

    #[test]
    fn partial_override_test() {
        let config = InferenceConfig::from_toml(
            r#"
            steps_per_unit = 20

            [selection]
            offset = 0
            count = 5

            [prior]
            r3 = [0.0, 50.0]

            [noise]
            g3 = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(config.steps_per_unit, 20);
        assert_eq!(config.simulator().steps_per_unit(), 20);
        assert_eq!(config.selection, Selection { offset: 0, count: 5 });
        assert_eq!(config.time_scale, TimeScale::default());

        let prior = config.prior().unwrap();
        assert_eq!(
            prior.bounds()[parameter_index("r3").unwrap()],
            Bounds::new(0., 50.)
        );
        assert_eq!(
            prior.bounds()[parameter_index("r1").unwrap()],
            Bounds::new(0., 10.)
        );
        let noise = config.noise().unwrap();
        assert_eq!(noise.sigma(Gene::G3), 0.05);
        assert_eq!(noise.sigma(Gene::G1), 0.2);
    }

    #[test]
    fn unknown_parameter_test() {
        let err = InferenceConfig::from_toml("[prior]\nfoo = [0.0, 1.0]\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Parameters(ParameterError::Unknown(name)) if name == "foo"
        ));
    }

    #[test]
    fn invalid_noise_test() {
        assert!(matches!(
            InferenceConfig::from_toml("[noise]\ng1 = -1.0\n"),
            Err(ConfigError::Parameters(ParameterError::NoiseScale { .. }))
        ));
    }

    #[test]
    fn zero_steps_per_unit_test() {
        assert!(matches!(
            InferenceConfig::from_toml("steps_per_unit = 0\n"),
            Err(ConfigError::NoSteps)
        ));
        assert_eq!(
            InferenceConfig::from_toml("steps_per_unit = 1\n")
                .unwrap()
                .simulator()
                .steps_per_unit(),
            1
        );
    }

    #[test]
    fn unknown_entry_test() {
        assert!(matches!(
            InferenceConfig::from_toml("walkers = 3\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_test() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[time_scale]\nfactor = 0.5\noffset = 1.0\n")
            .unwrap();
        let config = InferenceConfig::load(file.path()).unwrap();
        assert_eq!(config.time_scale, TimeScale { factor: 0.5, offset: 1. });
        assert!(InferenceConfig::load(Path::new("/no/such/config.toml"))
            .is_err());
    }

    #[test]
    fn toml_roundtrip_test() {
        let config = InferenceConfig::default();
        let content = config.to_toml().unwrap();
        assert_eq!(InferenceConfig::from_toml(&content).unwrap(), config);
    }
}
