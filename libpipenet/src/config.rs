use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::FEATURE_WIDTH;
use super::error::{ConfigError, SlotError};
use super::slot::SlotLayout;

/// Which kind of network the generator builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TreeVariant {
    /// Bounded-branching tree with slot addressed pipe names
    #[default]
    SlotTree,
    /// Random recursive tree over a drawn pipe count, with scattered receivers
    RecursiveTree,
    /// Add one emitter to a fixed base network
    EmitterInjection,
}

/// How the root flow is spread over the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowPolicy {
    /// Every pipe carries the configured flow
    #[default]
    Uniform,
    /// Children split their parent's flow in proportion to their radii
    Proportional,
}

/// Shape of the receiver attached to every leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeafReceiver {
    #[default]
    Ring,
    Sphere,
}

/// What the extractor does with a pipe whose slot does not fit in the tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotOverflow {
    /// Log and drop the pipe, keep the run
    #[default]
    Skip,
    /// Fail the run
    Fail,
}

fn read_yaml<T: for<'de> Deserialize<'de>>(config_path: &Path) -> Result<T, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
    }

    let yaml_str = std::fs::read_to_string(config_path)?;

    Ok(serde_yaml::from_str::<T>(&yaml_str)?)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    if min > max {
        return Err(invalid(field, format!("minimum {min} exceeds maximum {max}")));
    }
    Ok(())
}

/// Structure representing the network generator configuration.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub output_path: PathBuf,
    pub n_networks: usize,
    pub seed: Option<u64>,
    pub variant: TreeVariant,
    pub max_branches: usize,
    pub max_depth: usize,
    pub min_pipe_count: usize,
    pub max_pipe_count: usize,
    pub min_pipe_radius: f64,
    pub max_pipe_radius: f64,
    pub min_pipe_length: f64,
    pub max_pipe_length: f64,
    pub flow_value: f64,
    pub flow_policy: FlowPolicy,
    pub min_particle_count: u64,
    pub max_particle_count: u64,
    pub receiver_thickness: f64,
    pub leaf_receiver: LeafReceiver,
    pub random_receivers: bool,
    pub base_network_path: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    /// Generate a new GeneratorConfig with the standard tree dataset settings
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("None"),
            n_networks: 1000,
            seed: None,
            variant: TreeVariant::SlotTree,
            max_branches: 4,
            max_depth: 5,
            min_pipe_count: 10,
            max_pipe_count: 20,
            min_pipe_radius: 0.0001,
            max_pipe_radius: 0.0005,
            min_pipe_length: 0.002,
            max_pipe_length: 0.005,
            flow_value: 0.0002,
            flow_policy: FlowPolicy::Uniform,
            min_particle_count: 1000,
            max_particle_count: 2000,
            receiver_thickness: 0.0005,
            leaf_receiver: LeafReceiver::Ring,
            random_receivers: true,
            base_network_path: None,
        }
    }
}

impl GeneratorConfig {
    /// Read the configuration in a YAML file
    /// Returns a GeneratorConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        read_yaml(config_path)
    }

    /// Check that every range and bound is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_branches < 2 {
            return Err(invalid("max_branches", "must be at least 2"));
        }
        check_range("pipe_radius", self.min_pipe_radius, self.max_pipe_radius)?;
        check_range("pipe_length", self.min_pipe_length, self.max_pipe_length)?;
        check_range(
            "particle_count",
            self.min_particle_count,
            self.max_particle_count,
        )?;
        if self.min_pipe_radius <= 0.0 || self.min_pipe_length <= 0.0 {
            return Err(invalid("pipe dimensions", "must be positive"));
        }
        if self.flow_value < 0.0 {
            return Err(invalid("flow_value", "must not be negative"));
        }
        if self.receiver_thickness < 0.0 {
            return Err(invalid("receiver_thickness", "must not be negative"));
        }
        match self.variant {
            TreeVariant::SlotTree => {
                self.slot_layout()
                    .map_err(|e| invalid("max_depth", e.to_string()))?;
            }
            TreeVariant::RecursiveTree => {
                if self.min_pipe_count == 0 {
                    return Err(invalid("min_pipe_count", "must be at least 1"));
                }
                check_range("pipe_count", self.min_pipe_count, self.max_pipe_count)?;
            }
            TreeVariant::EmitterInjection => {
                if self.base_network_path.is_none() {
                    return Err(invalid(
                        "base_network_path",
                        "is required for emitter_injection",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn slot_layout(&self) -> Result<SlotLayout, SlotError> {
        SlotLayout::new(self.max_branches, self.max_depth)
    }

    /// Get the path to the n-th generated network file
    pub fn get_network_file_name(&self, index: usize) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join(format!("network_config_{index}.yaml")))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }
}

/// Structure representing the extraction configuration.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub data_path: PathBuf,
    pub hdf_path: PathBuf,
    pub max_branches: usize,
    pub max_depth: usize,
    pub l_max: f64,
    pub r_max: f64,
    pub derive_maxima: bool,
    pub compression_window: usize,
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub seed: u64,
    pub slot_overflow: SlotOverflow,
    pub n_threads: i32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            hdf_path: PathBuf::from("None"),
            max_branches: 4,
            max_depth: 5,
            l_max: 0.005,
            r_max: 0.0005,
            derive_maxima: false,
            compression_window: 10,
            train_ratio: 0.7,
            val_ratio: 0.15,
            test_ratio: 0.15,
            seed: 42,
            slot_overflow: SlotOverflow::Skip,
            n_threads: 1,
        }
    }
}

impl ExtractorConfig {
    /// Read the configuration in a YAML file
    /// Returns an ExtractorConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        read_yaml(config_path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.slot_layout()
            .map_err(|e| invalid("max_branches", e.to_string()))?;
        if self.l_max <= 0.0 || self.r_max <= 0.0 {
            return Err(invalid("l_max/r_max", "must be positive"));
        }
        if self.compression_window == 0 {
            return Err(invalid("compression_window", "must be at least 1"));
        }
        if !self.are_ratios_valid() {
            return Err(invalid(
                "train_ratio/val_ratio/test_ratio",
                "must be non-negative and sum to 1",
            ));
        }
        if !self.is_n_threads_valid() {
            return Err(invalid("n_threads", "must be at least 1"));
        }
        Ok(())
    }

    pub fn slot_layout(&self) -> Result<SlotLayout, SlotError> {
        SlotLayout::new(self.max_branches, self.max_depth)
    }

    /// Shape of one sample's feature tensor
    pub fn feature_shape(&self) -> Result<(usize, usize), SlotError> {
        Ok((self.slot_layout()?.capacity(), FEATURE_WIDTH))
    }

    /// Get every run directory in the data path, sorted by name. Hidden directories are ignored.
    pub fn get_run_directories(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.data_path.exists() {
            return Err(ConfigError::BadFilePath(self.data_path.clone()));
        }
        let mut runs = Vec::new();
        for item in self.data_path.read_dir()? {
            let item = item?;
            let is_hidden = item.file_name().to_string_lossy().starts_with('.');
            if item.file_type()?.is_dir() && !is_hidden {
                runs.push(item.path());
            }
        }
        runs.sort();
        Ok(runs)
    }

    /// Get the path to the output hdf5 file
    pub fn get_hdf_file_name(&self) -> Result<PathBuf, ConfigError> {
        match self.hdf_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.exists() => {
                Ok(self.hdf_path.clone())
            }
            _ => Err(ConfigError::BadFilePath(self.hdf_path.clone())),
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn are_ratios_valid(&self) -> bool {
        let ratios = [self.train_ratio, self.val_ratio, self.test_ratio];
        ratios.iter().all(|r| *r >= 0.0) && (ratios.iter().sum::<f64>() - 1.0).abs() < 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
        assert!(ExtractorConfig::default().validate().is_ok());
        assert_eq!(ExtractorConfig::default().feature_shape().unwrap(), (1365, 7));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = GeneratorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("variant: slot_tree"));
        assert!(yaml.contains("flow_policy: uniform"));
        let parsed: GeneratorConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.max_branches, 4);
        assert_eq!(parsed.leaf_receiver, LeafReceiver::Ring);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = GeneratorConfig {
            max_branches: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "max_branches",
                ..
            })
        ));
        config.max_branches = 4;
        config.variant = TreeVariant::EmitterInjection;
        assert!(config.validate().is_err());

        let extractor = ExtractorConfig {
            train_ratio: 0.9,
            ..Default::default()
        };
        assert!(!extractor.are_ratios_valid());
        assert!(extractor.validate().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let result = ExtractorConfig::read_config_file(Path::new("/does/not/exist.yml"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }

    #[test]
    fn test_run_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run_b")).unwrap();
        std::fs::create_dir(dir.path().join("run_a")).unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let config = ExtractorConfig {
            data_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        let runs = config.get_run_directories().unwrap();
        assert_eq!(
            runs,
            vec![dir.path().join("run_a"), dir.path().join("run_b")]
        );
    }
}
