use std::collections::BTreeMap;
use tracing::debug;
use crate::constants::{TRAP_TOLERANCE, VOLTAGE_SYMBOL};
use crate::error::ExpressionError;
use crate::numeric::{ChannelFunction, find_singular_points};
use crate::symbolic::Expr;
use super::derivatives::derive;
use super::model::ChannelModel;


/// Numeric closures of a model with default parameters substituted.
///
/// Closures taking states have arguments `[v, states..., concentrations...]`,
/// asymptotic values and time constants take `[v, concentrations...]`.
#[derive(Debug, Clone)]
pub struct ChannelFunctions {
    pub open_probability: ChannelFunction,
    pub asymptotic_value: BTreeMap<String, ChannelFunction>,
    pub time_constant: BTreeMap<String, ChannelFunction>,
    pub rate_of_change: BTreeMap<String, ChannelFunction>,
    pub dp_dx: BTreeMap<String, ChannelFunction>,
    pub df_dv: BTreeMap<String, ChannelFunction>,
    pub df_dx: BTreeMap<String, ChannelFunction>,
    pub df_dc: BTreeMap<String, BTreeMap<String, ChannelFunction>>,
}

fn merge_points(found: Vec<f64>, declared: &[f64]) -> Vec<f64> {
    let mut points = found;
    for point in declared {
        if !points.iter().any(|p| (p - point).abs() < TRAP_TOLERANCE) {
            points.push(*point);
        }
    }
    points.sort_by(|a, b| a.total_cmp(b));

    points
}

impl ChannelFunctions {
    pub fn specialize(model: &ChannelModel) -> Result<Self, ExpressionError> {
        debug!(channel = model.name(), "specializing channel closures");

        let concentrations = model.concentration_names();
        let mut full_arguments = vec![String::from(VOLTAGE_SYMBOL)];
        full_arguments.extend(model.state_variables().iter().cloned());
        full_arguments.extend(concentrations.iter().cloned());
        let mut short_arguments = vec![String::from(VOLTAGE_SYMBOL)];
        short_arguments.extend(concentrations.iter().cloned());

        let constant_concentrations = model.concentration_substitutions();
        let bundle = derive(model);

        let open_probability = ChannelFunction::compile(
            &model.substitute_defaults(model.open_probability()),
            &full_arguments,
        )?;

        let mut functions = ChannelFunctions {
            open_probability,
            asymptotic_value: BTreeMap::new(),
            time_constant: BTreeMap::new(),
            rate_of_change: BTreeMap::new(),
            dp_dx: BTreeMap::new(),
            df_dv: BTreeMap::new(),
            df_dx: BTreeMap::new(),
            df_dc: BTreeMap::new(),
        };

        for (state, kinetics) in model.all_kinetics() {
            let asymptotic_value = model.substitute_defaults(&kinetics.asymptotic_value);
            let time_constant = model.substitute_defaults(&kinetics.time_constant);

            let points = merge_points(
                find_singular_points(
                    &[asymptotic_value.clone(), time_constant.clone()],
                    VOLTAGE_SYMBOL,
                    &constant_concentrations,
                ),
                model.singular_voltages(),
            );
            if !points.is_empty() {
                debug!(channel = model.name(), state = state.as_str(), ?points, "dispatching near singular voltages");
            }

            let full = |expr: &Expr| -> Result<ChannelFunction, ExpressionError> {
                Ok(ChannelFunction::compile(&model.substitute_defaults(expr), &full_arguments)?
                    .with_singular_points(&points))
            };
            let short = |expr: &Expr| -> Result<ChannelFunction, ExpressionError> {
                Ok(ChannelFunction::compile(expr, &short_arguments)?.with_singular_points(&points))
            };

            let derivatives = match bundle.get(state) {
                Some(derivatives) => derivatives,
                None => continue,
            };

            functions.asymptotic_value.insert(state.clone(), short(&asymptotic_value)?);
            functions.time_constant.insert(state.clone(), short(&time_constant)?);
            functions.rate_of_change.insert(state.clone(), full(&kinetics.rate_of_change)?);
            functions.dp_dx.insert(state.clone(), full(&derivatives.dp_dx)?);
            functions.df_dv.insert(state.clone(), full(&derivatives.df_dv)?);
            functions.df_dx.insert(state.clone(), full(&derivatives.df_dx)?);

            let mut df_dc = BTreeMap::new();
            for (concentration, expr) in derivatives.df_dc.iter() {
                df_dc.insert(concentration.clone(), full(expr)?);
            }
            functions.df_dc.insert(state.clone(), df_dc);
        }

        Ok(functions)
    }
}
