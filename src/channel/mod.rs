//! Channel definitions, their normalized models and the evaluation API.
//!
//! An [`IonChannel`] owns a [`ChannelModel`] and a lazily built cache of
//! numeric closures. Only the model is persisted, the cache is rebuilt on
//! first use after loading and whenever default parameters change.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use ndarray::{Array, Array1, ArrayD, ArrayViewD, Dimension, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::constants::FREQUENCY_SCALE;
use crate::error::{ConfigError, EvaluationError, IonChannelError};
use crate::numeric::broadcast_shape;

pub mod definition;
pub mod model;
pub mod derivatives;
pub mod functions;

pub use definition::{ChannelDefinition, Concentrations};
pub use model::{ChannelModel, DefaultParameters, StateKinetics};
pub use derivatives::{StateDerivatives, derive};
pub use functions::ChannelFunctions;


/// Conversion of scalars, vectors and arrays into the dynamic arrays the
/// evaluator works on, scalars become zero dimensional arrays
pub trait IntoValues<T> {
    fn into_values(self) -> ArrayD<T>;
}

macro_rules! impl_into_values {
    ($from:ty, $to:ty, $convert:expr) => {
        impl IntoValues<$to> for $from {
            fn into_values(self) -> ArrayD<$to> {
                ArrayD::from_elem(IxDyn(&[]), $convert(self))
            }
        }

        impl IntoValues<$to> for Vec<$from> {
            fn into_values(self) -> ArrayD<$to> {
                Array1::from(self.into_iter().map($convert).collect::<Vec<$to>>()).into_dyn()
            }
        }

        impl IntoValues<$to> for &[$from] {
            fn into_values(self) -> ArrayD<$to> {
                Array1::from(self.iter().copied().map($convert).collect::<Vec<$to>>()).into_dyn()
            }
        }

        impl<D: Dimension> IntoValues<$to> for Array<$from, D> {
            fn into_values(self) -> ArrayD<$to> {
                self.mapv($convert).into_dyn()
            }
        }

        impl<D: Dimension> IntoValues<$to> for &Array<$from, D> {
            fn into_values(self) -> ArrayD<$to> {
                self.mapv($convert).into_dyn()
            }
        }
    };
}

impl_into_values!(f64, f64, |x: f64| x);
impl_into_values!(f64, Complex64, |x: f64| Complex64::new(x, 0.));
impl_into_values!(Complex64, Complex64, |x: Complex64| x);

/// Values for state variables and concentrations that replace their
/// defaults, each broadcastable against the voltage
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: BTreeMap<String, ArrayD<f64>>,
}

impl Overrides {
    pub fn new() -> Self {
        Overrides::default()
    }

    pub fn with<V: IntoValues<f64>>(mut self, name: &str, values: V) -> Self {
        self.values.insert(String::from(name), values.into_values());

        self
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// Partial derivatives per state variable
#[derive(Debug, Clone)]
pub struct Derivatives {
    pub dp_dx: BTreeMap<String, ArrayD<f64>>,
    pub df_dv: BTreeMap<String, ArrayD<f64>>,
    pub df_dx: BTreeMap<String, ArrayD<f64>>,
}

/// Channel model with its evaluation API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IonChannel {
    model: ChannelModel,
    #[serde(skip)]
    functions: OnceCell<ChannelFunctions>,
}

fn views(args: &[ArrayD<f64>]) -> Vec<ArrayViewD<'_, f64>> {
    args.iter().map(|a| a.view()).collect()
}

fn broadcast_values(values: &ArrayD<f64>, shape: &[usize]) -> Result<Vec<f64>, EvaluationError> {
    values.broadcast(IxDyn(shape))
        .map(|view| view.iter().copied().collect())
        .ok_or_else(|| EvaluationError::IncompatibleShapes(values.shape().to_vec(), shape.to_vec()))
}

/// Sums `dp_dx * drive / (f - df_dx)` over state variables for every
/// frequency, rates are scaled from 1/ms to 1/s. The result has the shape of
/// `frequencies` followed by the shape of the derivatives.
fn accumulate_admittance(
    frequencies: &ArrayD<Complex64>,
    dp_dx: &BTreeMap<String, ArrayD<f64>>,
    drive: &BTreeMap<String, ArrayD<f64>>,
    df_dx: &BTreeMap<String, ArrayD<f64>>,
) -> Result<ArrayD<Complex64>, EvaluationError> {
    let shapes: Vec<&[usize]> = dp_dx.values()
        .chain(drive.values())
        .chain(df_dx.values())
        .map(|a| a.shape())
        .collect();
    let shape = broadcast_shape(&shapes)?;
    let size: usize = shape.iter().product();

    let mut terms = vec![];
    for (state, dp) in dp_dx.iter() {
        let (drive, dx) = match (drive.get(state), df_dx.get(state)) {
            (Some(drive), Some(dx)) => (drive, dx),
            _ => continue,
        };
        terms.push((
            broadcast_values(dp, &shape)?,
            broadcast_values(drive, &shape)?,
            broadcast_values(dx, &shape)?,
        ));
    }

    let mut values = Vec::with_capacity(frequencies.len() * size);
    for frequency in frequencies.iter() {
        for n in 0..size {
            let mut total = Complex64::new(0., 0.);
            for (dp, drive, dx) in terms.iter() {
                total += (*frequency - dx[n] * FREQUENCY_SCALE).inv() * (dp[n] * drive[n] * FREQUENCY_SCALE);
            }
            values.push(total);
        }
    }

    let mut full_shape = frequencies.shape().to_vec();
    full_shape.extend(shape.iter());

    ArrayD::from_shape_vec(IxDyn(&full_shape), values)
        .map_err(|_| EvaluationError::IncompatibleShapes(frequencies.shape().to_vec(), shape))
}

/// `(reversal - v) * admittance - open_probability` elementwise, the leading
/// `frequency_dims` dimensions of `admittance` belong to the frequencies
fn combine_current(
    reversal: f64,
    voltage: &ArrayD<f64>,
    admittance: &ArrayD<Complex64>,
    frequency_dims: usize,
    open_probability: Option<&ArrayD<f64>>,
) -> Result<ArrayD<Complex64>, EvaluationError> {
    let shape = admittance.shape()[frequency_dims.min(admittance.ndim())..].to_vec();
    let size: usize = shape.iter().product();

    let voltage = broadcast_values(voltage, &shape)?;
    let open_probability = match open_probability {
        Some(p) => broadcast_values(p, &shape)?,
        None => vec![0.; size],
    };

    let values: Vec<Complex64> = admittance.iter()
        .enumerate()
        .map(|(n, lin)| {
            let m = if size == 0 { 0 } else { n % size };
            *lin * (reversal - voltage[m]) - open_probability[m]
        })
        .collect();

    ArrayD::from_shape_vec(admittance.raw_dim(), values)
        .map_err(|_| EvaluationError::IncompatibleShapes(admittance.shape().to_vec(), shape))
}

impl IonChannel {
    pub fn new(definition: &ChannelDefinition) -> Result<Self, IonChannelError> {
        Ok(IonChannel::from_model(definition.build()?))
    }

    pub fn from_model(model: ChannelModel) -> Self {
        IonChannel { model, functions: OnceCell::new() }
    }

    pub fn model(&self) -> &ChannelModel {
        &self.model
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Whether the closure cache is currently built
    pub fn is_specialized(&self) -> bool {
        self.functions.get().is_some()
    }

    fn functions(&self) -> Result<&ChannelFunctions, IonChannelError> {
        if let Some(functions) = self.functions.get() {
            return Ok(functions);
        }

        let functions = ChannelFunctions::specialize(&self.model)?;

        Ok(self.functions.get_or_init(|| functions))
    }

    /// Changes default temperature and reversal, invalidating the closure cache
    pub fn set_default_parameters(&mut self, temperature: Option<f64>, reversal: Option<f64>) {
        self.model.set_default_parameters(temperature, reversal);
        self.functions = OnceCell::new();

        debug!(channel = self.model.name(), ?temperature, ?reversal, "default parameters changed");
    }

    fn reversal(&self, reversal: Option<f64>) -> Result<f64, EvaluationError> {
        reversal.or(self.model.reversal())
            .ok_or_else(|| EvaluationError::MissingReversal(String::from(self.model.name())))
    }

    fn check_overrides(&self, overrides: &Overrides) -> Result<(), EvaluationError> {
        for name in overrides.names() {
            let is_state = self.model.state_symbol(name).is_some();
            let is_concentration = self.model.concentrations().contains_key(name);
            if !is_state && !is_concentration {
                return Err(EvaluationError::UnknownOverride(name.clone()));
            }
        }

        Ok(())
    }

    fn concentration_arguments(&self, overrides: &Overrides) -> Vec<ArrayD<f64>> {
        self.model.concentrations()
            .iter()
            .map(|(name, default)| match overrides.get(name) {
                Some(values) => values.clone(),
                None => ArrayD::from_elem(IxDyn(&[]), *default),
            })
            .collect()
    }

    /// `[v, states..., concentrations...]`, states default to their
    /// asymptotic value at `v`
    fn full_arguments(&self, voltage: ArrayD<f64>, overrides: &Overrides) -> Result<Vec<ArrayD<f64>>, IonChannelError> {
        self.check_overrides(overrides)?;
        let functions = self.functions()?;

        let concentrations = self.concentration_arguments(overrides);
        let mut short = vec![voltage];
        short.extend(concentrations.iter().cloned());

        let mut args = vec![short[0].clone()];
        for state in self.model.state_variables() {
            match overrides.get(state) {
                Some(values) => args.push(values.clone()),
                None => {
                    let function = functions.asymptotic_value.get(state)
                        .ok_or_else(|| EvaluationError::UnknownOverride(state.clone()))?;
                    args.push(function.evaluate(&views(&short))?);
                },
            }
        }
        args.extend(concentrations);

        Ok(args)
    }

    fn evaluate_map(
        functions: &BTreeMap<String, crate::numeric::ChannelFunction>,
        args: &[ArrayD<f64>],
    ) -> Result<BTreeMap<String, ArrayD<f64>>, EvaluationError> {
        let views = views(args);
        functions.iter()
            .map(|(name, function)| Ok((name.clone(), function.evaluate(&views)?)))
            .collect()
    }

    /// Open probability, states not overridden sit at their asymptotic value
    pub fn compute_open_probability<V: IntoValues<f64>>(
        &self,
        voltage: V,
        overrides: &Overrides,
    ) -> Result<ArrayD<f64>, IonChannelError> {
        let args = self.full_arguments(voltage.into_values(), overrides)?;

        Ok(self.functions()?.open_probability.evaluate(&views(&args))?)
    }

    /// `dp/dx`, `dx'/dv` and `dx'/dx` per state variable
    pub fn compute_derivatives<V: IntoValues<f64>>(
        &self,
        voltage: V,
        overrides: &Overrides,
    ) -> Result<Derivatives, IonChannelError> {
        let args = self.full_arguments(voltage.into_values(), overrides)?;
        let functions = self.functions()?;

        Ok(Derivatives {
            dp_dx: IonChannel::evaluate_map(&functions.dp_dx, &args)?,
            df_dv: IonChannel::evaluate_map(&functions.df_dv, &args)?,
            df_dx: IonChannel::evaluate_map(&functions.df_dx, &args)?,
        })
    }

    /// `dx'/dc` per state variable and concentration
    pub fn compute_derivatives_concentration<V: IntoValues<f64>>(
        &self,
        voltage: V,
        overrides: &Overrides,
    ) -> Result<BTreeMap<String, BTreeMap<String, ArrayD<f64>>>, IonChannelError> {
        let args = self.full_arguments(voltage.into_values(), overrides)?;
        let functions = self.functions()?;

        let mut result = BTreeMap::new();
        for (state, per_concentration) in functions.df_dc.iter() {
            result.insert(state.clone(), IonChannel::evaluate_map(per_concentration, &args)?);
        }

        Ok(result)
    }

    /// Right hand side `x'` of every state variable
    pub fn compute_rate_of_change<V: IntoValues<f64>>(
        &self,
        voltage: V,
        overrides: &Overrides,
    ) -> Result<BTreeMap<String, ArrayD<f64>>, IonChannelError> {
        let args = self.full_arguments(voltage.into_values(), overrides)?;

        Ok(IonChannel::evaluate_map(&self.functions()?.rate_of_change, &args)?)
    }

    fn short_arguments(&self, voltage: ArrayD<f64>) -> Vec<ArrayD<f64>> {
        let mut args = vec![voltage];
        args.extend(self.concentration_arguments(&Overrides::new()));

        args
    }

    /// Asymptotic value of every state variable at default concentrations
    pub fn compute_asymptotic_value<V: IntoValues<f64>>(&self, voltage: V) -> Result<BTreeMap<String, ArrayD<f64>>, IonChannelError> {
        let args = self.short_arguments(voltage.into_values());

        Ok(IonChannel::evaluate_map(&self.functions()?.asymptotic_value, &args)?)
    }

    /// Time constant (ms) of every state variable at default concentrations
    pub fn compute_time_constant<V: IntoValues<f64>>(&self, voltage: V) -> Result<BTreeMap<String, ArrayD<f64>>, IonChannelError> {
        let args = self.short_arguments(voltage.into_values());

        Ok(IonChannel::evaluate_map(&self.functions()?.time_constant, &args)?)
    }

    /// Linearized contribution of the gating dynamics to the channel
    /// admittance, shaped as `frequencies` followed by `voltage`
    pub fn compute_linear_admittance<V: IntoValues<f64>, F: IntoValues<Complex64>>(
        &self,
        voltage: V,
        frequencies: F,
        overrides: &Overrides,
    ) -> Result<ArrayD<Complex64>, IonChannelError> {
        let derivatives = self.compute_derivatives(voltage, overrides)?;

        Ok(accumulate_admittance(
            &frequencies.into_values(),
            &derivatives.dp_dx,
            &derivatives.df_dv,
            &derivatives.df_dx,
        )?)
    }

    /// Same as [`IonChannel::compute_linear_admittance`] but driven by a
    /// concentration instead of the voltage
    pub fn compute_linear_admittance_concentration<V: IntoValues<f64>, F: IntoValues<Complex64>>(
        &self,
        voltage: V,
        frequencies: F,
        concentration: &str,
        overrides: &Overrides,
    ) -> Result<ArrayD<Complex64>, IonChannelError> {
        if !self.model.concentrations().contains_key(concentration) {
            return Err(EvaluationError::UnknownConcentration(String::from(concentration)).into());
        }

        let voltage = voltage.into_values();
        let derivatives = self.compute_derivatives(voltage.clone(), overrides)?;
        let df_dc = self.compute_derivatives_concentration(voltage, overrides)?;

        let drive: BTreeMap<String, ArrayD<f64>> = df_dc.into_iter()
            .filter_map(|(state, mut per_concentration)| {
                per_concentration.remove(concentration).map(|values| (state, values))
            })
            .collect();

        Ok(accumulate_admittance(
            &frequencies.into_values(),
            &derivatives.dp_dx,
            &drive,
            &derivatives.df_dx,
        )?)
    }

    /// `(reversal - v) * admittance - open_probability`, `reversal` defaults
    /// to the channel's default reversal
    pub fn compute_linear_current_sum<V: IntoValues<f64>, F: IntoValues<Complex64>>(
        &self,
        voltage: V,
        frequencies: F,
        reversal: Option<f64>,
        overrides: &Overrides,
    ) -> Result<ArrayD<Complex64>, IonChannelError> {
        let reversal = self.reversal(reversal)?;
        let voltage = voltage.into_values();
        let frequencies = frequencies.into_values();
        let frequency_dims = frequencies.ndim();

        let admittance = self.compute_linear_admittance(voltage.clone(), frequencies, overrides)?;
        let open_probability = self.compute_open_probability(voltage.clone(), overrides)?;

        Ok(combine_current(reversal, &voltage, &admittance, frequency_dims, Some(&open_probability))?)
    }

    /// `(reversal - v) * concentration admittance`
    pub fn compute_linear_current_concentration<V: IntoValues<f64>, F: IntoValues<Complex64>>(
        &self,
        voltage: V,
        frequencies: F,
        concentration: &str,
        reversal: Option<f64>,
        overrides: &Overrides,
    ) -> Result<ArrayD<Complex64>, IonChannelError> {
        let reversal = self.reversal(reversal)?;
        let voltage = voltage.into_values();
        let frequencies = frequencies.into_values();
        let frequency_dims = frequencies.ndim();

        let admittance = self.compute_linear_admittance_concentration(
            voltage.clone(), frequencies, concentration, overrides,
        )?;

        Ok(combine_current(reversal, &voltage, &admittance, frequency_dims, None)?)
    }

    /// Serializes the symbolic model, the closure cache is not included
    pub fn to_json(&self) -> Result<String, IonChannelError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::JsonEncode(e.to_string()).into())
    }

    pub fn from_json(text: &str) -> Result<Self, IonChannelError> {
        serde_json::from_str(text)
            .map_err(|e| ConfigError::JsonDecode(e.to_string()).into())
    }
}
