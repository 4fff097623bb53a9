//! Built-in channel table and the registry the batch driver walks.

use crate::channel::{ChannelDefinition, IonChannel};
use crate::constants::Ion;
use crate::error::{ConfigError, IonChannelError};


/// Transient sodium channel, rate form with removable singularities at
/// -38 and -66 mV
fn nata() -> ChannelDefinition {
    ChannelDefinition::new("NaTa", "h * m**3")
        .with_ion(Ion::Na)
        .with_rates(
            "m",
            "0.182 * (v + 38.) / (1. - exp(-(v + 38.) / 6.))",
            "0.124 * (-v - 38.) / (1. - exp((v + 38.) / 6.))",
        )
        .with_rates(
            "h",
            "-0.015 * (v + 66.) / (1. - exp((v + 66.) / 6.))",
            "-0.015 * (-v - 66.) / (1. - exp(-(v + 66.) / 6.))",
        )
        .with_temperature_factor("2.95")
}

/// Fast delayed rectifier, asymptotic form
fn kv3_1() -> ChannelDefinition {
    ChannelDefinition::new("Kv3_1", "m")
        .with_ion(Ion::K)
        .with_asymptotic(
            "m",
            "1. / (1. + exp(-(v - 18.7) / 9.7))",
            "4. / (1. + exp(-(v + 46.56) / 44.14))",
        )
}

/// Muscarinic potassium channel with a temperature dependent rate factor
fn km() -> ChannelDefinition {
    ChannelDefinition::new("Km", "m")
        .with_ion(Ion::K)
        .with_rates(
            "m",
            "3.3e-3 * exp(2.5 * 0.04 * (v + 35.))",
            "3.3e-3 * exp(-2.5 * 0.04 * (v + 35.))",
        )
        .with_temperature_factor("2.3**((temp - 21.) / 10.)")
}

/// Calcium activated potassium channel
fn sk() -> ChannelDefinition {
    ChannelDefinition::new("SK", "z")
        .with_ion(Ion::K)
        .with_asymptotic("z", "1. / (1. + (0.00043 / ca)**4.8)", "1.")
        .with_concentrations(&["ca"])
}

/// Hyperpolarization activated cation channel with a fast and a slow component
fn h() -> ChannelDefinition {
    ChannelDefinition::new("h", "0.8 * hf + 0.2 * hs")
        .with_asymptotic("hf", "1. / (1. + exp((v + 82.) / 7.))", "40.")
        .with_asymptotic("hs", "1. / (1. + exp((v + 82.) / 7.))", "300.")
        .with_reversal(-43.)
}

/// Built-in channels in the order they are generated
pub static BUILTIN_CHANNELS: &[(&str, fn() -> ChannelDefinition)] = &[
    ("NaTa", nata),
    ("Kv3_1", kv3_1),
    ("Km", km),
    ("SK", sk),
    ("h", h),
];

pub fn builtin_definition(name: &str) -> Result<ChannelDefinition, ConfigError> {
    BUILTIN_CHANNELS.iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, constructor)| constructor())
        .ok_or_else(|| ConfigError::UnknownChannel(String::from(name)))
}

/// Ordered set of channel definitions with unique names, filled once and
/// only read afterwards
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    definitions: Vec<ChannelDefinition>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        ChannelRegistry::default()
    }

    /// Registry holding every built-in channel
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut registry = ChannelRegistry::new();
        for (_, constructor) in BUILTIN_CHANNELS {
            registry.register(constructor())?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, definition: ChannelDefinition) -> Result<(), ConfigError> {
        if self.get(&definition.name).is_some() {
            return Err(ConfigError::DuplicateChannel(definition.name));
        }
        self.definitions.push(definition);

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ChannelDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    /// Builds the channel registered under `name`
    pub fn build(&self, name: &str) -> Result<IonChannel, IonChannelError> {
        let definition = self.get(name)
            .ok_or_else(|| ConfigError::UnknownChannel(String::from(name)))?;

        IonChannel::new(definition)
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|definition| definition.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
