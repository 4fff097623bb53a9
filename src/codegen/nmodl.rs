use crate::channel::ChannelModel;
use crate::error::CodeGenerationError;
use crate::symbolic::CodePrinter;
use tracing::warn;
use super::join_with;


/// Generated NEURON mechanism
#[derive(Debug, Clone, PartialEq)]
pub struct ModFile {
    /// `I<name>.mod`
    pub file_name: String,
    pub text: String,
}

fn concentration_variable(name: &str) -> String {
    format!("{}i", name)
}

fn current_variable(model: &ChannelModel) -> String {
    match model.ion() {
        Some(ion) => format!("i{}", ion.symbol()),
        None => String::from("i"),
    }
}

fn binds_temperature(model: &ChannelModel) -> bool {
    model.temperature_symbol() != "celsius"
}

/// State variables and concentrations may not reuse a name the mechanism
/// declares on its own
fn check_names(model: &ChannelModel) -> Result<(), CodeGenerationError> {
    let states = model.state_variables();
    let concentrations = model.concentration_names();

    let mut generated = vec![
        String::from("v"),
        String::from("e"),
        String::from("g"),
        String::from("celsius"),
        current_variable(model),
        String::from(model.temperature_symbol()),
    ];
    for state in states {
        generated.push(format!("{}_inf", state));
        generated.push(format!("tau_{}", state));
    }
    generated.extend(concentrations.iter().map(|c| concentration_variable(c)));

    match states.iter().chain(concentrations.iter()).find(|name| generated.contains(*name)) {
        Some(name) => Err(CodeGenerationError::ReservedName(name.clone())),
        None => Ok(()),
    }
}

fn neuron_block(model: &ChannelModel) -> String {
    let states = model.state_variables();
    let mut lines = vec![format!("    SUFFIX I{}", model.name())];

    let concentrations = model.concentration_names();
    match model.ion() {
        Some(ion) => {
            if concentrations.iter().any(|c| c == ion.symbol()) {
                lines.push(format!(
                    "    USEION {} READ {} WRITE i{}",
                    ion.symbol(), concentration_variable(ion.symbol()), ion.symbol(),
                ));
            } else {
                lines.push(format!("    USEION {} WRITE i{}", ion.symbol(), ion.symbol()));
            }
        },
        None => lines.push(String::from("    NONSPECIFIC_CURRENT i")),
    }
    for concentration in concentrations.iter() {
        if model.ion().map(|ion| ion.symbol() == concentration).unwrap_or(false) {
            continue;
        }
        lines.push(format!("    USEION {} READ {}", concentration, concentration_variable(concentration)));
    }

    lines.push(String::from("    RANGE g, e"));
    lines.push(format!(
        "    GLOBAL {}, {}",
        join_with(states, ", ", |x| format!("{}_inf", x)),
        join_with(states, ", ", |x| format!("tau_{}", x)),
    ));
    lines.push(String::from("    THREADSAFE"));

    format!("NEURON {{\n{}\n}}\n", lines.join("\n"))
}

fn parameter_block(model: &ChannelModel, conductance: f64) -> String {
    let mut lines = vec![
        format!("    g = {:?} (S/cm2)", conductance * 1e-6),
        format!("    e = {:?} (mV)", model.reversal().unwrap_or(0.)),
    ];
    for concentration in model.concentration_names() {
        lines.push(format!("    {} (mM)", concentration_variable(&concentration)));
    }
    lines.push(String::from("    celsius (degC)"));

    format!("PARAMETER {{\n{}\n}}\n", lines.join("\n"))
}

fn units_block() -> String {
    String::from("UNITS {\n    (mA) = (milliamp)\n    (mV) = (millivolt)\n    (mM) = (milli/liter)\n}\n")
}

fn assigned_block(model: &ChannelModel) -> String {
    let mut lines = vec![format!("    {} (mA/cm2)", current_variable(model))];
    for state in model.state_variables() {
        lines.push(format!("    {}_inf", state));
        lines.push(format!("    tau_{} (ms)", state));
    }
    lines.push(String::from("    v (mV)"));
    if binds_temperature(model) {
        lines.push(format!("    {} (degC)", model.temperature_symbol()));
    }

    format!("ASSIGNED {{\n{}\n}}\n", lines.join("\n"))
}

fn state_block(model: &ChannelModel) -> String {
    format!(
        "STATE {{\n{}\n}}\n",
        join_with(model.state_variables(), "\n", |x| format!("    {}", x)),
    )
}

fn rates_arguments(model: &ChannelModel) -> String {
    let mut arguments = vec![String::from("v")];
    arguments.extend(model.concentration_names().iter().map(|c| concentration_variable(c)));

    arguments.join(", ")
}

fn printer(model: &ChannelModel) -> CodePrinter {
    model.concentration_names()
        .iter()
        .fold(CodePrinter::new(), |printer, c| printer.with_rename(c, &concentration_variable(c)))
}

fn rates_procedure(model: &ChannelModel) -> Result<String, CodeGenerationError> {
    let printer = printer(model);
    let mut lines = vec![];
    if binds_temperature(model) {
        lines.push(format!("    {} = celsius", model.temperature_symbol()));
    }

    for (state, kinetics) in model.all_kinetics() {
        lines.push(format!("    {}_inf = {}", state, printer.print(&kinetics.asymptotic_value)?));
        lines.push(format!("    tau_{} = {}", state, printer.print(&kinetics.time_constant)?));
    }

    Ok(format!("PROCEDURE rates({}) {{\n{}\n}}\n", rates_arguments(model), lines.join("\n")))
}

/// Generates the NEURON mechanism of a model, `conductance` is in uS/cm2.
///
/// The temperature stays symbolic and is bound to `celsius` when rates are
/// computed, concentrations are read from NEURON's `<ion>i` variables.
/// A channel without a default reversal gets `e = 0.0`. State variables or
/// concentrations named like a generated variable are rejected.
pub fn generate_mod_file(model: &ChannelModel, conductance: f64) -> Result<ModFile, CodeGenerationError> {
    check_names(model)?;
    if model.reversal().is_none() {
        warn!(channel = model.name(), "no reversal potential, mechanism uses e = 0");
    }

    let states = model.state_variables();

    let breakpoint = format!(
        "BREAKPOINT {{\n    SOLVE states METHOD cnexp\n    {} = g * ({}) * (v - e)\n}}\n",
        current_variable(model),
        printer(model).print(model.open_probability())?,
    );
    let initial = format!(
        "INITIAL {{\n    rates({})\n{}\n}}\n",
        rates_arguments(model),
        join_with(states, "\n", |x| format!("    {} = {}_inf", x, x)),
    );
    let derivative = format!(
        "DERIVATIVE states {{\n    rates({})\n{}\n}}\n",
        rates_arguments(model),
        join_with(states, "\n", |x| format!("    {}' = ({}_inf - {}) / tau_{}", x, x, x, x)),
    );

    let blocks = vec![
        format!(": Generated by {} for channel {}\n", env!("CARGO_PKG_NAME"), model.name()),
        neuron_block(model),
        parameter_block(model, conductance),
        units_block(),
        assigned_block(model),
        state_block(model),
        breakpoint,
        initial,
        derivative,
        rates_procedure(model)?,
    ];

    Ok(ModFile {
        file_name: format!("I{}.mod", model.name()),
        text: blocks.join("\n"),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::ChannelDefinition;
    use crate::constants::Ion;
    use crate::error::IonChannelError;

    #[test]
    fn test_concentration_reads() -> Result<(), IonChannelError> {
        let model = ChannelDefinition::new("CaDep", "z")
            .with_ion(Ion::Ca)
            .with_asymptotic("z", "1 / (1 + (0.00043 / ca)**4.8)", "1.")
            .with_concentrations(&["ca"])
            .build()?;

        let mod_file = generate_mod_file(&model, 0.)?;

        assert_eq!(mod_file.file_name, "ICaDep.mod");
        assert!(mod_file.text.contains("    USEION ca READ cai WRITE ica\n"));
        assert!(!mod_file.text.contains("    USEION ca READ cai\n"));
        assert!(mod_file.text.contains("PROCEDURE rates(v, cai) {"));
        assert!(mod_file.text.contains("cai"));
        assert!(!mod_file.text.contains("/ca)"));

        Ok(())
    }

    #[test]
    fn test_nonspecific_current() -> Result<(), IonChannelError> {
        let model = ChannelDefinition::new("Leak", "q")
            .with_asymptotic("q", "1 / (1 + exp(v))", "5.")
            .with_reversal(-70.)
            .build()?;

        let text = generate_mod_file(&model, 10.)?.text;

        assert!(text.contains("    NONSPECIFIC_CURRENT i\n"));
        assert!(text.contains("    i = g * (q) * (v - e)\n"));
        assert!(text.contains("    e = -70.0 (mV)\n"));
        assert!(text.contains("    GLOBAL q_inf, tau_q\n"));

        Ok(())
    }

    #[test]
    fn test_celsius_temperature_factor() -> Result<(), IonChannelError> {
        let model = ChannelDefinition::new("Celsius", "m")
            .with_asymptotic("m", "1. / (1. + exp(-v))", "2.")
            .with_temperature_factor("3**((celsius - 20) / 10)")
            .with_reversal(-80.)
            .build()?;

        let text = generate_mod_file(&model, 0.)?.text;

        assert_eq!(text.matches("    celsius (degC)\n").count(), 1);
        assert!(!text.contains("celsius = celsius"));
        assert!(text.contains("PROCEDURE rates(v) {\n    m_inf = "));

        Ok(())
    }

    #[test]
    fn test_colliding_names_are_rejected() -> Result<(), IonChannelError> {
        let current = ChannelDefinition::new("Current", "i")
            .with_asymptotic("i", "1. / (1. + exp(-v))", "2.")
            .with_reversal(-70.)
            .build()?;
        assert!(matches!(
            generate_mod_file(&current, 0.),
            Err(CodeGenerationError::ReservedName(name)) if name == "i"
        ));

        let shadowed = ChannelDefinition::new("Shadowed", "x * x_inf")
            .with_asymptotic("x", "1. / (1. + exp(-v))", "2.")
            .with_asymptotic("x_inf", "1. / (1. + exp(v))", "3.")
            .with_reversal(-70.)
            .build()?;
        assert!(matches!(
            generate_mod_file(&shadowed, 0.),
            Err(CodeGenerationError::ReservedName(name)) if name == "x_inf"
        ));

        let sodium = ChannelDefinition::new("Sodium", "i")
            .with_ion(Ion::Na)
            .with_asymptotic("i", "1. / (1. + exp(-v))", "2.")
            .build()?;
        assert!(generate_mod_file(&sodium, 0.)?.text.contains("    ina = g * (i) * (v - e)\n"));

        Ok(())
    }

    #[test]
    fn test_missing_reversal_defaults_to_zero() -> Result<(), IonChannelError> {
        let model = ChannelDefinition::new("Unknown", "q")
            .with_asymptotic("q", "1. / (1. + exp(-v))", "2.")
            .build()?;
        assert_eq!(model.reversal(), None);

        let text = generate_mod_file(&model, 0.)?.text;
        assert!(text.contains("    e = 0.0 (mV)\n"));

        Ok(())
    }
}
