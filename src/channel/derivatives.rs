use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::constants::VOLTAGE_SYMBOL;
use crate::symbolic::Expr;
use super::model::ChannelModel;


/// Exact partial derivatives of one state variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDerivatives {
    /// d(open probability)/dx
    pub dp_dx: Expr,
    /// d(x')/dv
    pub df_dv: Expr,
    /// d(x')/dx
    pub df_dx: Expr,
    /// d(x')/dc for every concentration
    pub df_dc: BTreeMap<String, Expr>,
}

/// Derivative bundle of a model keyed by state variable.
///
/// Taken before any default parameter is substituted so the same bundle
/// serves every parameter override.
pub fn derive(model: &ChannelModel) -> BTreeMap<String, StateDerivatives> {
    let concentrations = model.concentration_names();

    model.all_kinetics()
        .iter()
        .map(|(state, kinetics)| {
            let rate_of_change = &kinetics.rate_of_change;
            let derivatives = StateDerivatives {
                dp_dx: model.open_probability().diff(state),
                df_dv: rate_of_change.diff(VOLTAGE_SYMBOL),
                df_dx: rate_of_change.diff(state),
                df_dc: concentrations.iter()
                    .map(|c| (c.clone(), rate_of_change.diff(c)))
                    .collect(),
            };

            (state.clone(), derivatives)
        })
        .collect()
}
