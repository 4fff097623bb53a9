use tracing::warn;
use crate::channel::ChannelModel;
use crate::constants::{INSTANTANEOUS_TIME_CONSTANT, VOLTAGE_SYMBOL};
use crate::error::CodeGenerationError;
use crate::symbolic::{CodePrinter, Expr, symbol};
use super::join_with;


pub const HEADER_FILE_NAME: &str = "Ionchannels.h";
pub const SOURCE_FILE_NAME: &str = "Ionchannels.cc";

/// Virtual methods every generated class overrides, as `(return type, name, arguments)`
pub const VIRTUAL_METHODS: [(&str, &str, &str); 12] = [
    ("void", "calcFunStatevar", "double v"),
    ("double", "calcPOpen", ""),
    ("void", "setPOpen", ""),
    ("void", "setPOpenEQ", "double v"),
    ("void", "advance", "double dt"),
    ("double", "getCond", ""),
    ("double", "getCondNewton", ""),
    ("double", "f", "double v"),
    ("double", "DfDv", "double v"),
    ("void", "setfNewtonConstant", "double* vs, int v_size"),
    ("double", "fNewton", "double v"),
    ("double", "DfDvNewton", "double v"),
];

/// Class declaration for the header and method definitions for the source file
#[derive(Debug, Clone, PartialEq)]
pub struct CppChannel {
    pub name: String,
    pub declaration: String,
    pub definitions: String,
}

/// Includes and the abstract `IonChannel` base class
pub fn header_preamble() -> String {
    let includes = [
        "iostream", "string", "vector", "list", "map", "complex",
        "string.h", "stdlib.h", "algorithm", "math.h", "time.h", "stdexcept",
    ];
    let virtuals = join_with(&VIRTUAL_METHODS, "\n", |(ret, name, args)| {
        format!("    virtual {} {}({}) = 0;", ret, name, args)
    });

    format!(
        "// Generated by {}\n{}\nusing namespace std;\n\n\
        class IonChannel{{\n\
        protected:\n    double m_g_bar = 0.0, m_e_rev = 50.0;\n    bool m_instantaneous = false;\n\
        public:\n    virtual ~IonChannel(){{}};\n\
        \x20   void init(double g_bar, double e_rev){{m_g_bar = g_bar; m_e_rev = e_rev;}};\n\
        \x20   void setInstantaneous(bool b){{m_instantaneous = b;}};\n\
        {}\n}};\n\n",
        env!("CARGO_PKG_NAME"),
        join_with(&includes, "\n", |name| format!("#include <{}>", name)),
        virtuals,
    )
}

pub fn source_preamble() -> String {
    format!("#include \"{}\"\n\n", HEADER_FILE_NAME)
}

/// Factory mapping channel names to their classes
pub fn channel_creator(names: &[String]) -> String {
    let branches = join_with(names, "\n", |name| {
        format!("        if(channel_name == \"{}\"){{\n            return new {}();\n        }}", name, name)
    });

    format!(
        "class ChannelCreator{{\npublic:\n    IonChannel* createInstance(string channel_name){{\n{}\n        return nullptr;\n    }};\n}};\n",
        branches,
    )
}

/// Expression with default temperature and constant concentrations substituted
fn with_constants(model: &ChannelModel, expr: &Expr) -> Expr {
    model.substitute_defaults(expr).subs_all(&model.concentration_substitutions())
}

fn member_printer(model: &ChannelModel, suffix: &str) -> CodePrinter {
    model.state_variables()
        .iter()
        .fold(CodePrinter::new(), |printer, x| printer.with_rename(x, &format!("m_{}{}", x, suffix)))
}

fn declaration(model: &ChannelModel) -> String {
    let name = model.name();
    let states = model.state_variables();

    let constructor = match model.reversal() {
        Some(reversal) => format!("    {}(){{m_e_rev = {:?};}};\n", name, reversal),
        None => String::new(),
    };
    let overrides = join_with(&VIRTUAL_METHODS, "\n", |(ret, method, args)| {
        format!("    {} {}({}) override;", ret, method, args)
    });

    format!(
        "class {}: public IonChannel{{\nprivate:\n{}\n{}\n{}\n    double m_p_open_eq = 0.0, m_p_open = 0.0;\npublic:\n{}{}\n}};\n",
        name,
        join_with(states, "\n", |x| format!("    double m_{};", x)),
        join_with(states, "\n", |x| format!("    double m_{}_inf, m_tau_{};", x, x)),
        join_with(states, "\n", |x| format!("    double m_v_{} = 10000.;", x)),
        constructor,
        overrides,
    )
}

fn method(class: &str, ret: &str, name: &str, args: &str, body: &[String]) -> String {
    format!("{} {}::{}({}){{\n{}\n}}\n", ret, class, name, args, body.join("\n"))
}

/// Local `v_<x>` holding either the iteration voltage or the voltage fixed
/// by `setfNewtonConstant`
fn newton_voltage(state: &str, derivative: Option<&str>) -> Vec<String> {
    let mut lines = vec![format!("    double v_{};", state)];
    if derivative.is_some() {
        lines.push(format!("    double d{}_dv;", state));
    }
    lines.push(format!("    if(m_v_{} > 1000.){{", state));
    lines.push(format!("        v_{} = v;", state));
    if let Some(derivative) = derivative {
        lines.push(format!("        d{}_dv = {};", state, derivative));
    }
    lines.push(String::from("    } else{"));
    lines.push(format!("        v_{} = m_v_{};", state, state));
    if derivative.is_some() {
        lines.push(format!("        d{}_dv = 0;", state));
    }
    lines.push(String::from("    }"));

    lines
}

fn definitions(model: &ChannelModel) -> Result<String, CodeGenerationError> {
    let class = model.name();
    let states = model.state_variables();
    let plain = CodePrinter::new();
    let p_open = model.open_probability();

    let mut statevar = vec![];
    for (state, kinetics) in model.all_kinetics() {
        let asymptotic_value = plain.print(&with_constants(model, &kinetics.asymptotic_value))?;
        let time_constant = plain.print(&with_constants(model, &kinetics.time_constant))?;

        statevar.push(format!("    m_{}_inf = {};", state, asymptotic_value));
        if model.is_fast(state) {
            statevar.push(String::from("    if(m_instantaneous)"));
            statevar.push(format!("        m_tau_{} = {:?};", state, INSTANTANEOUS_TIME_CONSTANT));
            statevar.push(String::from("    else"));
            statevar.push(format!("        m_tau_{} = {};", state, time_constant));
        } else {
            statevar.push(format!("    m_tau_{} = {};", state, time_constant));
        }
    }

    let mut eq = states.iter().map(|x| format!("    m_{} = m_{}_inf;", x, x)).collect::<Vec<String>>();
    eq.push(format!("    m_p_open_eq = {};", member_printer(model, "_inf").print(p_open)?));

    let mut advance = vec![];
    for x in states {
        advance.push(format!("    double p0_{} = exp(-dt / m_tau_{});", x, x));
        advance.push(format!("    m_{} *= p0_{};", x, x));
        advance.push(format!("    m_{} += (1. - p0_{}) * m_{}_inf;", x, x, x));
    }

    let mut constant = vec![
        format!("    if(v_size != {})", states.len()),
        String::from(
            "        throw invalid_argument(\"input arg [vs] has incorrect size, should have same size as number of channel state variables\");"
        ),
    ];
    constant.extend(states.iter().enumerate().map(|(n, x)| format!("    m_v_{} = vs[{}];", x, n)));

    let mut newton = vec![];
    let mut newton_derivative = vec![];
    let mut chain = vec![];
    for (state, kinetics) in model.all_kinetics() {
        let local_voltage = format!("v_{}", state);
        let asymptotic_value = with_constants(model, &kinetics.asymptotic_value);
        let shifted = asymptotic_value.subs(VOLTAGE_SYMBOL, &symbol(&local_voltage));
        let derivative = asymptotic_value.diff(VOLTAGE_SYMBOL).subs(VOLTAGE_SYMBOL, &symbol(&local_voltage));
        let local_value = format!("    double {} = {};", state, plain.print(&shifted)?);

        newton.extend(newton_voltage(state, None));
        newton.push(local_value.clone());

        newton_derivative.extend(newton_voltage(state, Some(plain.print(&derivative)?.as_str())));
        newton_derivative.push(local_value);

        chain.push(format!("({}) * d{}_dv", plain.print(&p_open.diff(state))?, state));
    }
    let p_open_text = plain.print(p_open)?;
    newton.push(format!("    return (m_e_rev - v) * ({} - m_p_open_eq);", p_open_text));
    newton_derivative.push(format!(
        "    return -1. * ({} - m_p_open_eq) + ({}) * (m_e_rev - v);",
        p_open_text,
        chain.join(" + "),
    ));

    let methods = vec![
        method(class, "void", "calcFunStatevar", "double v", &statevar),
        method(class, "double", "calcPOpen", "", &[format!("    return {};", member_printer(model, "").print(p_open)?)]),
        method(class, "void", "setPOpen", "", &[String::from("    m_p_open = calcPOpen();")]),
        method(class, "void", "setPOpenEQ", "double v", &{
            let mut body = vec![String::from("    calcFunStatevar(v);")];
            body.extend(eq);
            body
        }),
        method(class, "void", "advance", "double dt", &advance),
        method(class, "double", "getCond", "", &[String::from("    return m_g_bar * (m_p_open - m_p_open_eq);")]),
        method(class, "double", "getCondNewton", "", &[String::from("    return m_g_bar;")]),
        method(class, "double", "f", "double v", &[String::from("    return (m_e_rev - v);")]),
        method(class, "double", "DfDv", "double v", &[String::from("    return -1.;")]),
        method(class, "void", "setfNewtonConstant", "double* vs, int v_size", &constant),
        method(class, "double", "fNewton", "double v", &newton),
        method(class, "double", "DfDvNewton", "double v", &newton_derivative),
    ];

    Ok(methods.join(""))
}

/// Generates the C++ class of a model.
///
/// Default temperature and concentrations are substituted, the generated
/// class has no concentration inputs.
pub fn generate_cpp_channel(model: &ChannelModel) -> Result<CppChannel, CodeGenerationError> {
    if !model.concentrations().is_empty() {
        warn!(
            channel = model.name(),
            concentrations = ?model.concentration_names(),
            "concentrations are held at their defaults in generated C++",
        );
    }

    Ok(CppChannel {
        name: String::from(model.name()),
        declaration: declaration(model),
        definitions: definitions(model)?,
    })
}
