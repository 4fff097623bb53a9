use std::collections::BTreeMap;
use ndarray::{ArrayD, ArrayViewD};
use tracing::debug;
use super::{CompiledExpression, Laurent, Scalar, map_broadcast};
use crate::constants::TRAP_TOLERANCE;
use crate::error::{EvaluationError, ExpressionError};
use crate::symbolic::{Expr, Function};


/// Compiled closure with voltage as first argument that switches to the
/// limit formula within [`TRAP_TOLERANCE`] of a removable singularity.
///
/// Scalars and arrays go through the same elementwise path, a scalar is a
/// zero dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFunction {
    regular: CompiledExpression,
    singular_points: Vec<f64>,
}

impl ChannelFunction {
    pub fn compile(expr: &Expr, arguments: &[String]) -> Result<Self, ExpressionError> {
        Ok(ChannelFunction {
            regular: CompiledExpression::compile(expr, arguments)?,
            singular_points: vec![],
        })
    }

    pub fn with_singular_points(mut self, points: &[f64]) -> Self {
        self.singular_points = points.to_vec();

        self
    }

    pub fn singular_points(&self) -> &[f64] {
        &self.singular_points
    }

    pub fn arity(&self) -> usize {
        self.regular.arity()
    }

    /// Singular point the voltage selects, strictly closer than the tolerance
    pub fn selected_point(&self, voltage: f64) -> Option<f64> {
        self.singular_points.iter()
            .copied()
            .find(|point| (voltage - point).abs() < TRAP_TOLERANCE)
    }

    pub fn call(&self, args: &[f64]) -> f64 {
        let voltage = args.first().copied().unwrap_or(f64::NAN);

        match self.selected_point(voltage) {
            Some(point) => self.limit(args, point),
            None => self.regular.eval(args),
        }
    }

    /// Limit formula around `point`, valid at the point itself
    pub fn limit(&self, args: &[f64], point: f64) -> f64 {
        let mut series: Vec<Laurent> = args.iter().map(|a| Laurent::constant(*a)).collect();
        let offset = match series.first_mut() {
            Some(first) => {
                *first = Laurent::variable(point);
                args[0] - point
            },
            None => 0.,
        };

        self.regular.eval(&series).evaluate(offset)
    }

    pub fn evaluate(&self, args: &[ArrayViewD<f64>]) -> Result<ArrayD<f64>, EvaluationError> {
        map_broadcast(args, |row| self.call(row))
    }
}

/// Arguments of `exp` factors in the terms of a sum or product
fn exponential_arguments(expr: &Expr, found: &mut Vec<Expr>) {
    match expr {
        Expr::Call(Function::Exp, argument) => found.push(argument.as_ref().clone()),
        Expr::Add(operands) | Expr::Mul(operands) => {
            for operand in operands {
                exponential_arguments(operand, found);
            }
        },
        _ => {},
    }
}

fn root_candidates(denominator: &Expr, voltage: &str) -> Vec<f64> {
    let mut candidates = vec![];

    if let Some((slope, intercept)) = denominator.as_linear(voltage) {
        if slope != 0. {
            candidates.push(-intercept / slope);
        }
    }

    let mut arguments = vec![];
    exponential_arguments(denominator, &mut arguments);
    for argument in arguments {
        if let Some((slope, intercept)) = argument.as_linear(voltage) {
            if slope != 0. {
                candidates.push(-intercept / slope);
            }
        }
    }

    candidates
}

fn is_removable(exprs: &[Expr], voltage: &str, point: f64) -> bool {
    let arguments = [String::from(voltage)];
    exprs.iter().all(|expr| match CompiledExpression::compile(expr, &arguments) {
        Ok(compiled) => compiled.eval(&[Laurent::variable(point)]).evaluate(0.).is_finite(),
        Err(_) => false,
    })
}

/// Voltages where a denominator of one of `exprs` vanishes while every
/// expression keeps a finite limit, after substituting `parameters` for all
/// other symbols. Linear denominators and `exp(a * v + b)` terms are scanned.
pub fn find_singular_points(exprs: &[Expr], voltage: &str, parameters: &BTreeMap<String, Expr>) -> Vec<f64> {
    let exprs: Vec<Expr> = exprs.iter().map(|e| e.subs_all(parameters)).collect();
    let arguments = [String::from(voltage)];

    let mut points: Vec<f64> = vec![];
    for expr in exprs.iter() {
        for denominator in expr.denominators() {
            let compiled = match CompiledExpression::compile(&denominator, &arguments) {
                Ok(compiled) => compiled,
                Err(_) => continue,
            };

            for candidate in root_candidates(&denominator, voltage) {
                let scale = denominator.subs(voltage, &Expr::Number(candidate + 1.))
                    .as_number()
                    .map(f64::abs)
                    .unwrap_or(1.)
                    .max(1.);
                let vanishes = compiled.eval(&[candidate]).abs() < 1e-9 * scale;

                if vanishes && is_removable(&exprs, voltage, candidate) {
                    points.push(candidate);
                }
            }
        }
    }

    points.sort_by(|a, b| a.total_cmp(b));
    points.dedup_by(|a, b| (*a - *b).abs() < TRAP_TOLERANCE);

    for point in points.iter() {
        debug!(point, "found removable singularity");
    }

    points
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{arr0, arr1};
    use crate::symbolic::parse;
    use crate::error::IonChannelError;

    fn alpha_m() -> Result<Expr, ExpressionError> {
        parse("0.182 * (v + 38.) / (1. - exp(-(v + 38.) / 6.))")
    }

    #[test]
    fn test_finds_singular_point() -> Result<(), IonChannelError> {
        let points = find_singular_points(&[alpha_m()?], "v", &BTreeMap::new());
        assert_eq!(points.len(), 1);
        assert!((points[0] + 38.).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_ignores_regular_denominators() -> Result<(), IonChannelError> {
        let expr = parse("1 / (1 + exp((v - 18.7) / (-9.7)))")?;
        assert!(find_singular_points(&[expr], "v", &BTreeMap::new()).is_empty());

        // a true pole is not removable
        let expr = parse("1 / (v + 10)")?;
        assert!(find_singular_points(&[expr], "v", &BTreeMap::new()).is_empty());

        Ok(())
    }

    #[test]
    fn test_dispatch_is_finite_at_point() -> Result<(), IonChannelError> {
        let args = vec![String::from("v")];
        let function = ChannelFunction::compile(&alpha_m()?, &args)?.with_singular_points(&[-38.]);

        let at_point = function.call(&[-38.]);
        assert!(at_point.is_finite());
        assert!((at_point - 0.182 * 6.).abs() < 1e-9);

        let near = function.call(&[-38. + 5e-5]);
        let outside = function.call(&[-38. + 1e-3]);
        assert!((near - at_point).abs() < 1e-4);
        assert!((outside - at_point).abs() < 1e-3);

        Ok(())
    }

    #[test]
    fn test_tolerance_is_strict() -> Result<(), IonChannelError> {
        let args = vec![String::from("v")];
        let function = ChannelFunction::compile(&parse("v")?, &args)?.with_singular_points(&[0.]);

        assert_eq!(function.selected_point(0.5 * TRAP_TOLERANCE), Some(0.));
        assert_eq!(function.selected_point(TRAP_TOLERANCE), None);
        assert_eq!(function.selected_point(-TRAP_TOLERANCE), None);

        Ok(())
    }

    #[test]
    fn test_scalar_and_array_paths_agree() -> Result<(), IonChannelError> {
        let args = vec![String::from("v")];
        let function = ChannelFunction::compile(&alpha_m()?, &args)?.with_singular_points(&[-38.]);

        let voltages = arr1(&[-40., -38., -38. + 2e-5, -37.9, 0.]).into_dyn();
        let array_result = function.evaluate(&[voltages.view()])?;

        for (v, value) in voltages.iter().zip(array_result.iter()) {
            let scalar = arr0(*v).into_dyn();
            let scalar_result = function.evaluate(&[scalar.view()])?;
            assert_eq!(scalar_result.ndim(), 0);
            assert_eq!(scalar_result.sum(), *value);
            assert!(value.is_finite());
        }

        Ok(())
    }
}
