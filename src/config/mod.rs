//! TOML configuration of the batch compiler.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::channel::ChannelDefinition;
use crate::error::ConfigError;
use crate::registry::ChannelRegistry;


fn default_mod_directory() -> PathBuf {
    PathBuf::from("mechanisms")
}

fn default_cpp_directory() -> PathBuf {
    PathBuf::from("cpp")
}

fn default_include_builtin() -> bool {
    true
}

/// Where and how generated sources are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// One `I<name>.mod` file per channel
    #[serde(default = "default_mod_directory")]
    pub mod_directory: PathBuf,
    /// `Ionchannels.h` and `Ionchannels.cc`
    #[serde(default = "default_cpp_directory")]
    pub cpp_directory: PathBuf,
    /// Maximal conductance in uS/cm2 written into every mechanism
    #[serde(default)]
    pub conductance: f64,
    /// Generate the built-in channels before the configured ones
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            mod_directory: default_mod_directory(),
            cpp_directory: default_cpp_directory(),
            conductance: 0.,
            include_builtin: default_include_builtin(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub channels: Vec<ChannelDefinition>,
}

impl CompilerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::TomlParse(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_to_string(path)
            .map_err(|e| ConfigError::FileRead(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "read configuration");

        CompilerConfig::from_toml_str(&text)
    }

    /// Built-in channels (when enabled) followed by the configured ones,
    /// names must be unique across both
    pub fn registry(&self) -> Result<ChannelRegistry, ConfigError> {
        let mut registry = if self.output.include_builtin {
            ChannelRegistry::builtin()?
        } else {
            ChannelRegistry::new()
        };

        for definition in self.channels.iter() {
            registry.register(definition.clone())?;
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Ion;
    use crate::channel::Concentrations;

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let config = CompilerConfig::from_toml_str("")?;

        assert_eq!(config.output, OutputConfig::default());
        assert!(config.channels.is_empty());
        assert_eq!(config.registry()?.len(), 5);

        Ok(())
    }

    #[test]
    fn test_channel_table() -> Result<(), ConfigError> {
        let text = r#"
            [output]
            mod_directory = "out/mod"
            conductance = 100.0
            include_builtin = false

            [[channels]]
            name = "CaHVA"
            ion = "ca"
            open_probability = "m**2 * h"
            concentrations = { ca = 0.0001 }
            [channels.alpha]
            m = "-0.055 * (v + 27.) / (exp(-(v + 27.) / 3.8) - 1.)"
            [channels.beta]
            m = "0.94 * exp(-(v + 75.) / 17.)"
            [channels.asymptotic_value]
            h = "1. / (1. + exp((v + 13.) / 12.))"
            [channels.time_constant]
            h = "1000."
        "#;

        let config = CompilerConfig::from_toml_str(text)?;
        assert_eq!(config.output.mod_directory, PathBuf::from("out/mod"));
        assert_eq!(config.output.cpp_directory, PathBuf::from("cpp"));

        let definition = &config.channels[0];
        assert_eq!(definition.ion, Some(Ion::Ca));
        assert!(matches!(&definition.concentrations, Some(Concentrations::Values(values)) if values["ca"] == 0.0001));

        let registry = config.registry()?;
        assert_eq!(registry.names(), vec!["CaHVA"]);

        Ok(())
    }

    #[test]
    fn test_duplicate_of_builtin() -> Result<(), ConfigError> {
        let text = r#"
            [[channels]]
            name = "SK"
            open_probability = "z"
            [channels.asymptotic_value]
            z = "1."
            [channels.time_constant]
            z = "1."
        "#;

        let config = CompilerConfig::from_toml_str(text)?;
        assert!(matches!(config.registry(), Err(ConfigError::DuplicateChannel(_))));

        Ok(())
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(CompilerConfig::from_toml_str("[output"), Err(ConfigError::TomlParse(_))));
    }
}
