use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::constants::Ion;
use crate::error::ChannelDefinitionError;
use super::model::ChannelModel;


/// Concentrations a channel depends on, either by name (physiological
/// defaults are used) or with explicit default values in mM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Concentrations {
    Names(Vec<String>),
    Values(BTreeMap<String, f64>),
}

/// Declarative description of a channel, the same struct is read from TOML,
/// JSON or assembled with the builder methods
///
/// Every state variable of the open probability needs either an entry in
/// `alpha` and `beta` or one in `asymptotic_value` and `time_constant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub name: String,
    #[serde(default)]
    pub ion: Option<Ion>,
    pub open_probability: String,
    #[serde(default)]
    pub alpha: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub beta: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub asymptotic_value: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub time_constant: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub concentrations: Option<Concentrations>,
    /// Divides every time constant, may depend on one temperature symbol
    #[serde(default)]
    pub temperature_factor: Option<String>,
    /// Temperature in degrees Celsius
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Reversal potential in mV, defaults to the reversal of `ion`
    #[serde(default)]
    pub reversal: Option<f64>,
    /// Removable singularities in addition to the ones found automatically
    #[serde(default)]
    pub singular_voltages: Vec<f64>,
    /// State variables the generated C++ may treat as instantaneous,
    /// defaults to `m` when present
    #[serde(default)]
    pub fast_variables: Option<Vec<String>>,
}

fn insert(map: &mut Option<BTreeMap<String, String>>, key: &str, value: &str) {
    map.get_or_insert_with(BTreeMap::new)
        .insert(String::from(key), String::from(value));
}

impl ChannelDefinition {
    pub fn new(name: &str, open_probability: &str) -> Self {
        ChannelDefinition {
            name: String::from(name),
            ion: None,
            open_probability: String::from(open_probability),
            alpha: None,
            beta: None,
            asymptotic_value: None,
            time_constant: None,
            concentrations: None,
            temperature_factor: None,
            temperature: None,
            reversal: None,
            singular_voltages: vec![],
            fast_variables: None,
        }
    }

    pub fn with_ion(mut self, ion: Ion) -> Self {
        self.ion = Some(ion);

        self
    }

    /// Rate constant form for one state variable, rates in 1/ms
    pub fn with_rates(mut self, state: &str, alpha: &str, beta: &str) -> Self {
        insert(&mut self.alpha, state, alpha);
        insert(&mut self.beta, state, beta);

        self
    }

    /// Asymptotic value and time constant (ms) for one state variable
    pub fn with_asymptotic(mut self, state: &str, asymptotic_value: &str, time_constant: &str) -> Self {
        insert(&mut self.asymptotic_value, state, asymptotic_value);
        insert(&mut self.time_constant, state, time_constant);

        self
    }

    pub fn with_concentrations(mut self, names: &[&str]) -> Self {
        self.concentrations = Some(Concentrations::Names(names.iter().map(|n| String::from(*n)).collect()));

        self
    }

    pub fn with_concentration_values(mut self, values: &[(&str, f64)]) -> Self {
        self.concentrations = Some(Concentrations::Values(
            values.iter().map(|(n, v)| (String::from(*n), *v)).collect()
        ));

        self
    }

    pub fn with_temperature_factor(mut self, factor: &str) -> Self {
        self.temperature_factor = Some(String::from(factor));

        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);

        self
    }

    pub fn with_reversal(mut self, reversal: f64) -> Self {
        self.reversal = Some(reversal);

        self
    }

    pub fn with_singular_voltages(mut self, voltages: &[f64]) -> Self {
        self.singular_voltages = voltages.to_vec();

        self
    }

    pub fn with_fast_variables(mut self, names: &[&str]) -> Self {
        self.fast_variables = Some(names.iter().map(|n| String::from(*n)).collect());

        self
    }

    /// Validates the definition and normalizes it into a [`ChannelModel`]
    pub fn build(&self) -> Result<ChannelModel, ChannelDefinitionError> {
        ChannelModel::from_definition(self)
    }
}
