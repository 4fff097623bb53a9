use std::fmt::{Display, Debug, Formatter, Result};


/// Error set for parsing and compiling symbolic expressions
pub enum ExpressionError {
    /// Expression text could not be parsed, contains the parser message
    ParseFailure(String),
    /// Function name is not one of the supported functions
    UnknownFunction(String),
    /// Function was called with the wrong number of arguments
    WrongArgumentCount { function: String, expected: usize, found: usize },
    /// Symbol is not part of the argument list an expression is compiled against
    UnboundSymbol(String),
}

impl Display for ExpressionError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ExpressionError::ParseFailure(msg) => write!(f, "Could not parse expression: {}", msg),
            ExpressionError::UnknownFunction(name) => write!(f, "Unknown function: {}", name),
            ExpressionError::WrongArgumentCount { function, expected, found } => write!(
                f, "Function {} expects {} argument(s), found {}", function, expected, found
            ),
            ExpressionError::UnboundSymbol(name) => write!(f, "Symbol is not bound to an argument: {}", name),
        }
    }
}

impl Debug for ExpressionError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// Error set for invalid channel definitions, raised once when a model is built
pub enum ChannelDefinitionError {
    /// Neither rate constants nor asymptotic value and time constant were
    /// given for the listed state variables
    MissingKinetics(Vec<String>),
    /// Temperature factor may depend on at most one symbol
    TemperatureFactorHasMultipleSymbols(Vec<String>),
    /// Open probability does not depend on any state variable
    NoStateVariables,
    /// No physiological default concentration exists for the ion
    NoDefaultConcentration(String),
    /// Kinetics reference symbols that are neither voltage, temperature,
    /// state variables nor concentrations
    UnboundSymbols(Vec<String>),
    /// Variable marked as fast is not a state variable
    UnknownFastVariable(String),
    /// A field of the definition holds an invalid expression
    InvalidExpression { field: String, error: ExpressionError },
}

impl Display for ChannelDefinitionError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ChannelDefinitionError::MissingKinetics(names) => write!(
                f,
                "Define either `alpha` and `beta` or `asymptotic_value` and `time_constant` for state variable(s): {}",
                names.join(", "),
            ),
            ChannelDefinitionError::TemperatureFactorHasMultipleSymbols(names) => write!(
                f, "Temperature factor must contain at most one symbol, found: {}", names.join(", ")
            ),
            ChannelDefinitionError::NoStateVariables => write!(f, "Open probability must contain at least one state variable"),
            ChannelDefinitionError::NoDefaultConcentration(ion) => write!(f, "No default concentration for: {}", ion),
            ChannelDefinitionError::UnboundSymbols(names) => write!(f, "Unbound symbol(s) in kinetics: {}", names.join(", ")),
            ChannelDefinitionError::UnknownFastVariable(name) => write!(f, "Fast variable is not a state variable: {}", name),
            ChannelDefinitionError::InvalidExpression { field, error } => write!(f, "Invalid expression in `{}`: {}", field, error),
        }
    }
}

impl Debug for ChannelDefinitionError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// Error set for numeric evaluation of a channel
pub enum EvaluationError {
    /// No reversal potential was given and the channel has no default
    MissingReversal(String),
    /// Override name is neither a state variable nor a concentration
    UnknownOverride(String),
    /// Concentration is not a dependency of the channel
    UnknownConcentration(String),
    /// Argument shapes cannot be broadcast together
    IncompatibleShapes(Vec<usize>, Vec<usize>),
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            EvaluationError::MissingReversal(name) => write!(
                f, "No default reversal defined for channel {}, provide a value for `reversal`", name
            ),
            EvaluationError::UnknownOverride(name) => write!(f, "Override is not a state variable or concentration: {}", name),
            EvaluationError::UnknownConcentration(name) => write!(f, "Channel does not depend on concentration: {}", name),
            EvaluationError::IncompatibleShapes(lhs, rhs) => write!(
                f, "Shapes {:?} and {:?} cannot be broadcast together", lhs, rhs
            ),
        }
    }
}

impl Debug for EvaluationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// Error set for generating NMODL or C++ source text
pub enum CodeGenerationError {
    /// Expression contains a value that has no source code representation
    NonPrintableExpression(String),
    /// Generated artifact could not be written
    WriteFailure(String),
    /// Model symbol collides with a name the generated code declares itself
    ReservedName(String),
}

impl Display for CodeGenerationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            CodeGenerationError::NonPrintableExpression(expr) => write!(f, "Expression cannot be printed as code: {}", expr),
            CodeGenerationError::WriteFailure(msg) => write!(f, "Could not write generated code: {}", msg),
            CodeGenerationError::ReservedName(name) => write!(f, "Symbol collides with a generated name: {}", name),
        }
    }
}

impl Debug for CodeGenerationError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// Error set for configuration files and persisted models
pub enum ConfigError {
    /// Configuration file cannot be read
    FileRead(String),
    /// Configuration is not valid TOML for the expected layout
    TomlParse(String),
    /// Model could not be encoded as JSON
    JsonEncode(String),
    /// JSON does not hold a valid model
    JsonDecode(String),
    /// Channel names must be unique within a registry
    DuplicateChannel(String),
    /// Channel name is not in the built-in table
    UnknownChannel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            ConfigError::FileRead(msg) => write!(f, "Cannot read configuration: {}", msg),
            ConfigError::TomlParse(msg) => write!(f, "Cannot parse configuration: {}", msg),
            ConfigError::JsonEncode(msg) => write!(f, "Cannot encode model: {}", msg),
            ConfigError::JsonDecode(msg) => write!(f, "Cannot decode model: {}", msg),
            ConfigError::DuplicateChannel(name) => write!(f, "Channel already registered: {}", name),
            ConfigError::UnknownChannel(name) => write!(f, "Channel not found: {}", name),
        }
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

/// A set of errors that may occur when using the library
pub enum IonChannelError {
    /// Errors related to expressions
    ExpressionRelatedError(ExpressionError),
    /// Errors related to channel definitions
    DefinitionRelatedError(ChannelDefinitionError),
    /// Errors related to numeric evaluation
    EvaluationRelatedError(EvaluationError),
    /// Errors related to code generation
    CodeGenerationRelatedError(CodeGenerationError),
    /// Errors related to configuration and persistence
    ConfigRelatedError(ConfigError),
}

impl Display for IonChannelError {
    fn fmt(&self, f: &mut Formatter) -> Result {
        match self {
            IonChannelError::ExpressionRelatedError(err) => write!(f, "{}", err),
            IonChannelError::DefinitionRelatedError(err) => write!(f, "{}", err),
            IonChannelError::EvaluationRelatedError(err) => write!(f, "{}", err),
            IonChannelError::CodeGenerationRelatedError(err) => write!(f, "{}", err),
            IonChannelError::ConfigRelatedError(err) => write!(f, "{}", err),
        }
    }
}

impl Debug for IonChannelError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "file: {}, line: {}, error: {}", file!(), line!(), self)
    }
}

impl std::error::Error for IonChannelError {}

impl From<ExpressionError> for IonChannelError {
    fn from(err: ExpressionError) -> IonChannelError {
        IonChannelError::ExpressionRelatedError(err)
    }
}

impl From<ChannelDefinitionError> for IonChannelError {
    fn from(err: ChannelDefinitionError) -> IonChannelError {
        IonChannelError::DefinitionRelatedError(err)
    }
}

impl From<EvaluationError> for IonChannelError {
    fn from(err: EvaluationError) -> IonChannelError {
        IonChannelError::EvaluationRelatedError(err)
    }
}

impl From<CodeGenerationError> for IonChannelError {
    fn from(err: CodeGenerationError) -> IonChannelError {
        IonChannelError::CodeGenerationRelatedError(err)
    }
}

impl From<ConfigError> for IonChannelError {
    fn from(err: ConfigError) -> IonChannelError {
        IonChannelError::ConfigRelatedError(err)
    }
}
