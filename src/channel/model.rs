use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::constants::{
    Ion, DEFAULT_TEMPERATURE, DEFAULT_TEMPERATURE_SYMBOL, VOLTAGE_SYMBOL, default_concentration,
};
use crate::error::ChannelDefinitionError;
use crate::symbolic::{self, Expr, div, number, sub, symbol};
use super::definition::{ChannelDefinition, Concentrations};


/// Canonical kinetics of one state variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateKinetics {
    /// Function of voltage and concentrations
    pub asymptotic_value: Expr,
    /// Function of voltage and concentrations, already divided by the temperature factor
    pub time_constant: Expr,
    /// `(asymptotic_value - x) / time_constant`
    pub rate_of_change: Expr,
}

/// Parameters substituted when specializing, they can be overridden
/// without touching the symbolic model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultParameters {
    pub temperature: f64,
    pub reversal: Option<f64>,
}

/// Normalized channel: one asymptotic value, time constant and rate of
/// change per state variable regardless of how the kinetics were defined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelModel {
    name: String,
    ion: Option<Ion>,
    open_probability: Expr,
    temperature_factor: Expr,
    temperature_symbol: String,
    /// Sorted by name
    state_variables: Vec<String>,
    /// Name to symbolic handle, built once
    state_symbols: BTreeMap<String, Expr>,
    kinetics: BTreeMap<String, StateKinetics>,
    concentrations: BTreeMap<String, f64>,
    default_parameters: DefaultParameters,
    singular_voltages: Vec<f64>,
    fast_variables: Vec<String>,
}

fn parse_field(field: &str, text: &str) -> Result<Expr, ChannelDefinitionError> {
    symbolic::parse(text).map_err(|error| ChannelDefinitionError::InvalidExpression {
        field: String::from(field),
        error,
    })
}

fn warn_unused_keys(
    channel: &str,
    field: &str,
    map: &Option<BTreeMap<String, String>>,
    states: &BTreeSet<String>,
) {
    if let Some(map) = map {
        for key in map.keys().filter(|key| !states.contains(*key)) {
            warn!(channel, field, key = key.as_str(), "kinetics defined for a symbol that is not a state variable");
        }
    }
}

fn lookup<'a>(map: &'a Option<BTreeMap<String, String>>, key: &str) -> Option<&'a String> {
    map.as_ref().and_then(|m| m.get(key))
}

impl ChannelModel {
    /// Normalizes a definition, every validation happens here
    pub fn from_definition(definition: &ChannelDefinition) -> Result<Self, ChannelDefinitionError> {
        let open_probability = parse_field("open_probability", &definition.open_probability)?;

        let temperature_factor = match &definition.temperature_factor {
            Some(text) => parse_field("temperature_factor", text)?,
            None => number(1.),
        };
        let temperature_symbols = temperature_factor.free_symbols();
        if temperature_symbols.len() > 1 {
            return Err(ChannelDefinitionError::TemperatureFactorHasMultipleSymbols(
                temperature_symbols.into_iter().collect()
            ));
        }
        let temperature_symbol = temperature_symbols.into_iter()
            .next()
            .unwrap_or_else(|| String::from(DEFAULT_TEMPERATURE_SYMBOL));

        let states = open_probability.free_symbols();
        if states.is_empty() {
            return Err(ChannelDefinitionError::NoStateVariables);
        }

        warn_unused_keys(&definition.name, "alpha", &definition.alpha, &states);
        warn_unused_keys(&definition.name, "beta", &definition.beta, &states);
        warn_unused_keys(&definition.name, "asymptotic_value", &definition.asymptotic_value, &states);
        warn_unused_keys(&definition.name, "time_constant", &definition.time_constant, &states);

        let mut kinetics = BTreeMap::new();
        let mut missing = vec![];
        for state in states.iter() {
            let rates = (lookup(&definition.alpha, state), lookup(&definition.beta, state));
            let asymptotic = (lookup(&definition.asymptotic_value, state), lookup(&definition.time_constant, state));

            let (asymptotic_value, time_constant) = match (rates, asymptotic) {
                ((Some(alpha), Some(beta)), _) => {
                    let alpha = parse_field(&format!("alpha.{}", state), alpha)?;
                    let beta = parse_field(&format!("beta.{}", state), beta)?;
                    let total = symbolic::add(vec![alpha.clone(), beta]);

                    (
                        div(alpha, total.clone()),
                        div(div(number(1.), temperature_factor.clone()), total),
                    )
                },
                (_, (Some(value), Some(tau))) => (
                    parse_field(&format!("asymptotic_value.{}", state), value)?,
                    div(
                        parse_field(&format!("time_constant.{}", state), tau)?,
                        temperature_factor.clone(),
                    ),
                ),
                _ => {
                    missing.push(state.clone());
                    continue;
                },
            };

            let rate_of_change = div(
                sub(asymptotic_value.clone(), symbol(state)),
                time_constant.clone(),
            );

            kinetics.insert(state.clone(), StateKinetics { asymptotic_value, time_constant, rate_of_change });
        }

        if !missing.is_empty() {
            return Err(ChannelDefinitionError::MissingKinetics(missing));
        }

        let mut excluded: BTreeSet<String> = states.clone();
        excluded.insert(String::from(VOLTAGE_SYMBOL));
        excluded.insert(temperature_symbol.clone());

        let mut used: BTreeSet<String> = BTreeSet::new();
        for state_kinetics in kinetics.values() {
            used.extend(state_kinetics.rate_of_change.free_symbols());
            used.extend(state_kinetics.asymptotic_value.free_symbols());
            used.extend(state_kinetics.time_constant.free_symbols());
        }
        let candidates: BTreeSet<String> = used.difference(&excluded).cloned().collect();

        let concentrations: BTreeMap<String, f64> = match &definition.concentrations {
            Some(Concentrations::Values(values)) => values.clone(),
            Some(Concentrations::Names(names)) => names.iter()
                .map(|name| match default_concentration(name) {
                    Some(value) => Ok((name.clone(), value)),
                    None => Err(ChannelDefinitionError::NoDefaultConcentration(name.clone())),
                })
                .collect::<Result<_, _>>()?,
            None => {
                let unknown: Vec<String> = candidates.iter()
                    .filter(|name| default_concentration(name).is_none())
                    .cloned()
                    .collect();
                if !unknown.is_empty() {
                    return Err(ChannelDefinitionError::UnboundSymbols(unknown));
                }

                candidates.iter()
                    .filter_map(|name| default_concentration(name).map(|value| (name.clone(), value)))
                    .collect()
            },
        };

        let unbound: Vec<String> = candidates.iter()
            .filter(|name| !concentrations.contains_key(*name))
            .cloned()
            .collect();
        if !unbound.is_empty() {
            return Err(ChannelDefinitionError::UnboundSymbols(unbound));
        }

        let state_variables: Vec<String> = states.iter().cloned().collect();
        let fast_variables = match &definition.fast_variables {
            Some(names) => {
                if let Some(unknown) = names.iter().find(|name| !states.contains(*name)) {
                    return Err(ChannelDefinitionError::UnknownFastVariable(unknown.clone()));
                }

                names.clone()
            },
            None => state_variables.iter().filter(|name| name.as_str() == "m").cloned().collect(),
        };

        let reversal = definition.reversal.or(definition.ion.map(|ion| ion.default_reversal()));
        if reversal.is_none() {
            warn!(channel = definition.name.as_str(), "no default reversal potential defined");
        }

        Ok(ChannelModel {
            name: definition.name.clone(),
            ion: definition.ion,
            open_probability,
            temperature_factor,
            temperature_symbol,
            state_symbols: state_variables.iter().map(|name| (name.clone(), symbol(name))).collect(),
            state_variables,
            kinetics,
            concentrations,
            default_parameters: DefaultParameters {
                temperature: definition.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                reversal,
            },
            singular_voltages: definition.singular_voltages.clone(),
            fast_variables,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ion(&self) -> Option<Ion> {
        self.ion
    }

    pub fn open_probability(&self) -> &Expr {
        &self.open_probability
    }

    pub fn temperature_factor(&self) -> &Expr {
        &self.temperature_factor
    }

    pub fn temperature_symbol(&self) -> &str {
        &self.temperature_symbol
    }

    pub fn state_variables(&self) -> &[String] {
        &self.state_variables
    }

    /// Symbolic handle of a state variable
    pub fn state_symbol(&self, name: &str) -> Option<&Expr> {
        self.state_symbols.get(name)
    }

    pub fn kinetics(&self, state: &str) -> Option<&StateKinetics> {
        self.kinetics.get(state)
    }

    pub fn all_kinetics(&self) -> &BTreeMap<String, StateKinetics> {
        &self.kinetics
    }

    /// Concentration names with their default values, sorted by name
    pub fn concentrations(&self) -> &BTreeMap<String, f64> {
        &self.concentrations
    }

    pub fn concentration_names(&self) -> Vec<String> {
        self.concentrations.keys().cloned().collect()
    }

    pub fn default_parameters(&self) -> DefaultParameters {
        self.default_parameters
    }

    pub fn reversal(&self) -> Option<f64> {
        self.default_parameters.reversal
    }

    pub fn singular_voltages(&self) -> &[f64] {
        &self.singular_voltages
    }

    pub fn fast_variables(&self) -> &[String] {
        &self.fast_variables
    }

    pub fn is_fast(&self, state: &str) -> bool {
        self.fast_variables.iter().any(|name| name == state)
    }

    /// Overrides default parameters, the symbolic kinetics are unchanged
    pub fn set_default_parameters(&mut self, temperature: Option<f64>, reversal: Option<f64>) {
        if let Some(temperature) = temperature {
            self.default_parameters.temperature = temperature;
        }
        if reversal.is_some() {
            self.default_parameters.reversal = reversal;
        }
    }

    /// Temperature substitution applied before specialization
    pub fn parameter_substitutions(&self) -> BTreeMap<String, Expr> {
        let mut substitutions = BTreeMap::new();
        substitutions.insert(self.temperature_symbol.clone(), number(self.default_parameters.temperature));

        substitutions
    }

    /// Concentration defaults as substitutions, used where concentrations are held constant
    pub fn concentration_substitutions(&self) -> BTreeMap<String, Expr> {
        self.concentrations.iter()
            .map(|(name, value)| (name.clone(), number(*value)))
            .collect()
    }

    pub fn substitute_defaults(&self, expr: &Expr) -> Expr {
        expr.subs_all(&self.parameter_substitutions())
    }
}
