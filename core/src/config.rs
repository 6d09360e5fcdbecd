//! Configuration for a divide job.
//!
//! `LmConfig` names one input model and the weight its unseen tokens score.
//! `DivideConfig` describes a whole job and can be stored as TOML:
//!
//! ```toml
//! weight_numerator = 0.4
//! weight_denominator = 0.2
//! output = "divided.arpa"
//!
//! [numerator]
//! model_path = "4gram.arpa"
//!
//! [denominator]
//! model_path = "2gram.arpa"
//! unknown_weight = { log_prob = -100.0, log_backoff = 0.0 }
//! ```
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::arpa::Weight;
use crate::error::{DivideError, Result};

/// One input language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmConfig {
    /// Path of the ARPA file.
    pub model_path: PathBuf,

    /// Weight used when a single unseen token is scored.
    #[serde(default)]
    pub unknown_weight: Weight,
}

impl LmConfig {
    /// Build a config, checking that `model_path` is an existing file.
    pub fn new<P: Into<PathBuf>>(model_path: P, unknown_weight: Weight) -> Result<Self> {
        let config = Self {
            model_path: model_path.into(),
            unknown_weight,
        };
        config.check_exists()?;
        Ok(config)
    }

    /// Fail with `DivideError::File` if the model path is not a regular file.
    pub fn check_exists(&self) -> Result<()> {
        if self.model_path.is_file() {
            Ok(())
        } else {
            Err(DivideError::file(
                &self.model_path,
                io::Error::new(io::ErrorKind::NotFound, "no such model file"),
            ))
        }
    }
}

/// A complete divide job: `weight_numerator * numerator - weight_denominator * denominator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivideConfig {
    pub weight_numerator: f64,
    pub weight_denominator: f64,

    /// Where to write the divided model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Keep the divided model in memory and return it.
    #[serde(default)]
    pub return_model: bool,

    pub numerator: LmConfig,
    pub denominator: LmConfig,
}

impl DivideConfig {
    /// Check everything that can be checked without reading a model:
    /// an output is requested, both weights are positive and both inputs exist.
    pub fn validate(&self) -> Result<()> {
        if self.output.is_none() && !self.return_model {
            return Err(DivideError::NoOutputRequested);
        }
        check_weight("weight_numerator", self.weight_numerator)?;
        check_weight("weight_denominator", self.weight_denominator)?;
        self.numerator.check_exists()?;
        self.denominator.check_exists()?;
        Ok(())
    }

    /// Load a job from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DivideError::file(path, e))?;
        let mut config = Self::from_toml_str(&content)?;
        // model paths in the file are relative to the file itself
        if let Some(dir) = path.parent() {
            config.resolve_relative_to(dir);
        }
        Ok(config)
    }

    /// Save the job to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn resolve_relative_to(&mut self, dir: &Path) {
        for path in [
            &mut self.numerator.model_path,
            &mut self.denominator.model_path,
        ] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
        if let Some(output) = self.output.as_mut() {
            if output.is_relative() {
                *output = dir.join(&*output);
            }
        }
    }
}

/// Reject weights that are not strictly positive finite numbers.
pub fn check_weight(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DivideError::invalid_weight(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
weight_numerator = 0.4
weight_denominator = 0.2
output = "out/divided.arpa"

[numerator]
model_path = "4gram.arpa"

[denominator]
model_path = "/models/2gram.arpa"
unknown_weight = { log_prob = -20.0 }
"#;

    #[test]
    fn parses_job_with_defaults() {
        let config = DivideConfig::from_toml_str(JOB).unwrap();
        assert_eq!(config.weight_numerator, 0.4);
        assert_eq!(config.numerator.unknown_weight, Weight::UNKNOWN);
        assert_eq!(config.denominator.unknown_weight, Weight::new(-20.0, 0.0));
        assert_eq!(config.output, Some(PathBuf::from("out/divided.arpa")));
        assert!(!config.return_model);
    }

    #[test]
    fn toml_round_trip() {
        let config = DivideConfig::from_toml_str(JOB).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(DivideConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn saved_job_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        let mut config = DivideConfig::from_toml_str(JOB).unwrap();
        config.resolve_relative_to(dir.path());
        config.return_model = true;
        config.save_toml(&path).unwrap();
        assert_eq!(DivideConfig::load_toml(&path).unwrap(), config);
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let mut config = DivideConfig::from_toml_str(JOB).unwrap();
        config.resolve_relative_to(Path::new("/jobs"));
        assert_eq!(config.numerator.model_path, PathBuf::from("/jobs/4gram.arpa"));
        assert_eq!(
            config.denominator.model_path,
            PathBuf::from("/models/2gram.arpa")
        );
        assert_eq!(
            config.output,
            Some(PathBuf::from("/jobs/out/divided.arpa"))
        );
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            DivideConfig::from_toml_str("weight_numerator = "),
            Err(DivideError::Config(_))
        ));
    }

    #[test]
    fn weights_must_be_positive() {
        assert!(check_weight("w", 0.5).is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                check_weight("w", bad),
                Err(DivideError::InvalidWeight(_))
            ));
        }
    }

    #[test]
    fn validate_checks_output_before_weights() {
        let mut config = DivideConfig::from_toml_str(JOB).unwrap();
        config.output = None;
        config.weight_numerator = -1.0;
        assert!(matches!(
            config.validate(),
            Err(DivideError::NoOutputRequested)
        ));
        config.return_model = true;
        assert!(matches!(
            config.validate(),
            Err(DivideError::InvalidWeight(_))
        ));
        config.weight_numerator = 1.0;
        assert!(matches!(config.validate(), Err(DivideError::File(_))));
    }

    #[test]
    fn lm_config_requires_existing_file() {
        assert!(matches!(
            LmConfig::new("/nonexistent/lm.arpa", Weight::UNKNOWN),
            Err(DivideError::File(_))
        ));
    }
}
