//! Numeric specialization of symbolic expressions.
//!
//! A [`CompiledExpression`] is a flattened tree bound to a fixed positional
//! argument list. It can be evaluated with any [`Scalar`], which is how the
//! same code evaluates plain floats and the truncated Laurent series used
//! to take limits at removable singularities.

use std::ops::{Add, Div, Mul, Neg, Sub};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use crate::error::{EvaluationError, ExpressionError};
use crate::symbolic::{Expr, Function};

pub mod series;
pub mod dispatch;

pub use series::Laurent;
pub use dispatch::{ChannelFunction, find_singular_points};


/// Number-like type a compiled expression can be evaluated with
pub trait Scalar:
    Clone + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self> + Neg<Output = Self>
{
    fn constant(value: f64) -> Self;
    fn exp(&self) -> Self;
    fn ln(&self) -> Self;
    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn tan(&self) -> Self;
    fn sinh(&self) -> Self;
    fn cosh(&self) -> Self;
    fn tanh(&self) -> Self;
    fn powi(&self, n: i32) -> Self;
    fn powf(&self, exponent: &Self) -> Self;

    fn apply(&self, function: Function) -> Self {
        match function {
            Function::Exp => self.exp(),
            Function::Log => self.ln(),
            Function::Sin => self.sin(),
            Function::Cos => self.cos(),
            Function::Tan => self.tan(),
            Function::Sinh => self.sinh(),
            Function::Cosh => self.cosh(),
            Function::Tanh => self.tanh(),
        }
    }
}

impl Scalar for f64 {
    fn constant(value: f64) -> Self { value }
    fn exp(&self) -> Self { f64::exp(*self) }
    fn ln(&self) -> Self { f64::ln(*self) }
    fn sin(&self) -> Self { f64::sin(*self) }
    fn cos(&self) -> Self { f64::cos(*self) }
    fn tan(&self) -> Self { f64::tan(*self) }
    fn sinh(&self) -> Self { f64::sinh(*self) }
    fn cosh(&self) -> Self { f64::cosh(*self) }
    fn tanh(&self) -> Self { f64::tanh(*self) }
    fn powi(&self, n: i32) -> Self { f64::powi(*self, n) }
    fn powf(&self, exponent: &Self) -> Self { f64::powf(*self, *exponent) }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Arg(usize),
    Add(Vec<Node>),
    Mul(Vec<Node>),
    PowInt(Box<Node>, i32),
    Pow(Box<Node>, Box<Node>),
    Call(Function, Box<Node>),
}

impl Node {
    fn eval<S: Scalar>(&self, args: &[S]) -> S {
        match self {
            Node::Const(value) => S::constant(*value),
            Node::Arg(index) => match args.get(*index) {
                Some(value) => value.clone(),
                None => S::constant(f64::NAN),
            },
            Node::Add(terms) => {
                let mut terms = terms.iter();
                let first = match terms.next() {
                    Some(term) => term.eval(args),
                    None => return S::constant(0.),
                };

                terms.fold(first, |acc, term| acc + term.eval(args))
            },
            Node::Mul(factors) => {
                let mut factors = factors.iter();
                let first = match factors.next() {
                    Some(factor) => factor.eval(args),
                    None => return S::constant(1.),
                };

                factors.fold(first, |acc, factor| acc * factor.eval(args))
            },
            Node::PowInt(base, n) => base.eval(args).powi(*n),
            Node::Pow(base, exponent) => base.eval(args).powf(&exponent.eval(args)),
            Node::Call(function, argument) => argument.eval(args).apply(*function),
        }
    }
}

/// Expression bound to a positional argument list
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    arguments: Vec<String>,
    root: Node,
}

fn compile_node(expr: &Expr, arguments: &[String]) -> Result<Node, ExpressionError> {
    match expr {
        Expr::Number(value) => Ok(Node::Const(*value)),
        Expr::Symbol(name) => arguments.iter()
            .position(|arg| arg == name)
            .map(Node::Arg)
            .ok_or_else(|| ExpressionError::UnboundSymbol(name.clone())),
        Expr::Add(terms) => Ok(Node::Add(
            terms.iter().map(|t| compile_node(t, arguments)).collect::<Result<Vec<Node>, _>>()?
        )),
        Expr::Mul(factors) => Ok(Node::Mul(
            factors.iter().map(|f| compile_node(f, arguments)).collect::<Result<Vec<Node>, _>>()?
        )),
        Expr::Pow(base, exponent) => {
            let base = Box::new(compile_node(base, arguments)?);
            match exponent.as_ref() {
                Expr::Number(e) if e.fract() == 0. && e.abs() <= i32::MAX as f64 => {
                    Ok(Node::PowInt(base, *e as i32))
                },
                exponent => Ok(Node::Pow(base, Box::new(compile_node(exponent, arguments)?))),
            }
        },
        Expr::Call(function, argument) => Ok(Node::Call(*function, Box::new(compile_node(argument, arguments)?))),
    }
}

impl CompiledExpression {
    /// Compiles `expr` against `arguments`, every free symbol must be one of them
    pub fn compile(expr: &Expr, arguments: &[String]) -> Result<Self, ExpressionError> {
        Ok(CompiledExpression {
            arguments: arguments.to_vec(),
            root: compile_node(expr, arguments)?,
        })
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    pub fn eval<S: Scalar>(&self, args: &[S]) -> S {
        self.root.eval(args)
    }
}

/// Shape all given shapes broadcast to, aligning trailing dimensions
pub fn broadcast_shape(shapes: &[&[usize]]) -> Result<Vec<usize>, EvaluationError> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut result = vec![1; ndim];

    for shape in shapes {
        let offset = ndim - shape.len();
        for (n, dim) in shape.iter().enumerate() {
            let current = result[offset + n];
            if current == 1 {
                result[offset + n] = *dim;
            } else if *dim != 1 && *dim != current {
                return Err(EvaluationError::IncompatibleShapes(result.clone(), shape.to_vec()));
            }
        }
    }

    Ok(result)
}

/// Broadcasts every argument to a common shape and applies `f` elementwise,
/// zero dimensional arrays stand in for scalars
pub fn map_broadcast<T, F>(args: &[ArrayViewD<f64>], f: F) -> Result<ArrayD<T>, EvaluationError>
where
    F: Fn(&[f64]) -> T,
{
    let shapes: Vec<&[usize]> = args.iter().map(|a| a.shape()).collect();
    let shape = broadcast_shape(&shapes)?;

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(args.len());
    for arg in args {
        let view = arg.broadcast(IxDyn(&shape))
            .ok_or_else(|| EvaluationError::IncompatibleShapes(arg.shape().to_vec(), shape.clone()))?;
        columns.push(view.iter().cloned().collect());
    }

    let size: usize = shape.iter().product();
    let mut row = vec![0.; args.len()];
    let mut values = Vec::with_capacity(size);
    for n in 0..size {
        for (slot, column) in row.iter_mut().zip(columns.iter()) {
            *slot = column[n];
        }
        values.push(f(&row));
    }

    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|_| EvaluationError::IncompatibleShapes(shape.clone(), vec![size]))
}
