//! Exact symbolic expressions used to describe channel kinetics.
//!
//! Every [`Expr`] is kept in a canonical form by the constructor functions in
//! this module ([`add`], [`mul`], [`pow`], [`call`] and the helpers built on
//! them). Operands of sums and products are flattened, numeric constants are
//! folded, like terms and equal bases are collected and operands are sorted
//! by a fixed total order. Two expressions that only differ by these
//! rearrangements are therefore structurally equal, so `a - a` reduces to `0`
//! and identities can be checked with [`Expr::is_zero_identity`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

pub mod parser;
pub mod printer;

pub use parser::parse;
pub use printer::CodePrinter;


/// Elementary functions that can appear in kinetics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Function {
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
}

impl Function {
    /// Name used both when parsing and when printing code
    pub fn name(&self) -> &'static str {
        match self {
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
        }
    }

    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "exp" => Some(Function::Exp),
            "log" => Some(Function::Log),
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "sinh" => Some(Function::Sinh),
            "cosh" => Some(Function::Cosh),
            "tanh" => Some(Function::Tanh),
            _ => None,
        }
    }

    /// Evaluates the function on a float
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Sinh => x.sinh(),
            Function::Cosh => x.cosh(),
            Function::Tanh => x.tanh(),
        }
    }
}

/// Symbolic expression tree, see the module documentation for the canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    Symbol(String),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

fn rank(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(_) => 0,
        Expr::Symbol(_) => 1,
        Expr::Call(_, _) => 2,
        Expr::Pow(_, _) => 3,
        Expr::Mul(_) => 4,
        Expr::Add(_) => 5,
    }
}

fn cmp_slices(lhs: &[Expr], rhs: &[Expr]) -> Ordering {
    for (l, r) in lhs.iter().zip(rhs.iter()) {
        let ordering = cmp_expr(l, r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    lhs.len().cmp(&rhs.len())
}

/// Total order on expressions used to sort operands
pub fn cmp_expr(lhs: &Expr, rhs: &Expr) -> Ordering {
    match (lhs, rhs) {
        (Expr::Number(a), Expr::Number(b)) => a.total_cmp(b),
        (Expr::Symbol(a), Expr::Symbol(b)) => a.cmp(b),
        (Expr::Call(f, a), Expr::Call(g, b)) => f.cmp(g).then_with(|| cmp_expr(a, b)),
        (Expr::Pow(b1, e1), Expr::Pow(b2, e2)) => cmp_expr(b1, b2).then_with(|| cmp_expr(e1, e2)),
        (Expr::Mul(a), Expr::Mul(b)) => cmp_slices(a, b),
        (Expr::Add(a), Expr::Add(b)) => cmp_slices(a, b),
        _ => rank(lhs).cmp(&rank(rhs)),
    }
}

fn is_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.
}

/// Splits a term into its numeric coefficient and the remaining product
fn split_coefficient(term: Expr) -> (f64, Expr) {
    match term {
        Expr::Number(value) => (value, Expr::Number(1.)),
        Expr::Mul(mut factors) => {
            if let Some(Expr::Number(coefficient)) = factors.first() {
                let coefficient = *coefficient;
                factors.remove(0);
                let rest = if factors.len() == 1 {
                    factors.remove(0)
                } else {
                    Expr::Mul(factors)
                };

                (coefficient, rest)
            } else {
                (1., Expr::Mul(factors))
            }
        },
        other => (1., other),
    }
}

/// Multiplies an already canonical non numeric term by a coefficient
fn scale(coefficient: f64, term: Expr) -> Expr {
    if coefficient == 1. {
        return term;
    }

    match term {
        Expr::Number(value) => Expr::Number(coefficient * value),
        Expr::Mul(mut factors) => {
            factors.insert(0, Expr::Number(coefficient));
            Expr::Mul(factors)
        },
        Expr::Add(terms) => add(terms.into_iter().map(|t| mul(vec![Expr::Number(coefficient), t])).collect()),
        other => Expr::Mul(vec![Expr::Number(coefficient), other]),
    }
}

/// Canonical n-ary sum
pub fn add(terms: Vec<Expr>) -> Expr {
    let mut constant = 0.;
    let mut collected: Vec<(Expr, f64)> = Vec::new();

    let mut stack = terms;
    while let Some(term) = stack.pop() {
        match term {
            Expr::Add(inner) => stack.extend(inner),
            Expr::Number(value) => constant += value,
            other => {
                let (coefficient, rest) = split_coefficient(other);
                collected.push((rest, coefficient));
            },
        }
    }

    collected.sort_by(|a, b| cmp_expr(&a.0, &b.0));

    let mut merged: Vec<(Expr, f64)> = Vec::with_capacity(collected.len());
    for (rest, coefficient) in collected {
        match merged.last_mut() {
            Some((last, total)) if *last == rest => *total += coefficient,
            _ => merged.push((rest, coefficient)),
        }
    }

    let mut result: Vec<Expr> = Vec::with_capacity(merged.len() + 1);
    let mut distributed: Vec<Expr> = Vec::new();
    for (rest, coefficient) in merged {
        if coefficient == 0. {
            continue;
        }
        match scale(coefficient, rest) {
            Expr::Add(inner) => distributed.extend(inner),
            term => result.push(term),
        }
    }

    if !distributed.is_empty() {
        result.extend(distributed);
        result.push(Expr::Number(constant));
        return add(result);
    }

    if constant != 0. || result.is_empty() {
        result.push(Expr::Number(constant));
    }

    result.sort_by(cmp_expr);

    if result.len() == 1 {
        result.remove(0)
    } else {
        Expr::Add(result)
    }
}

/// Splits a factor into base and exponent
fn split_power(factor: Expr) -> (Expr, Expr) {
    match factor {
        Expr::Pow(base, exponent) => (*base, *exponent),
        other => (other, Expr::Number(1.)),
    }
}

/// Canonical n-ary product
pub fn mul(factors: Vec<Expr>) -> Expr {
    let mut coefficient = 1.;
    let mut collected: Vec<(Expr, Expr)> = Vec::new();

    let mut stack = factors;
    while let Some(factor) = stack.pop() {
        match factor {
            Expr::Mul(inner) => stack.extend(inner),
            Expr::Number(value) => coefficient *= value,
            other => collected.push(split_power(other)),
        }
    }

    if coefficient == 0. {
        return Expr::Number(0.);
    }

    collected.sort_by(|a, b| cmp_expr(&a.0, &b.0));

    let mut merged: Vec<(Expr, Vec<Expr>)> = Vec::with_capacity(collected.len());
    for (base, exponent) in collected {
        match merged.last_mut() {
            Some((last, exponents)) if *last == base => exponents.push(exponent),
            _ => merged.push((base, vec![exponent])),
        }
    }

    let mut result: Vec<Expr> = Vec::with_capacity(merged.len());
    let mut needs_flattening = false;
    for (base, exponents) in merged {
        let exponent = if exponents.len() == 1 {
            exponents.into_iter().next().unwrap_or(Expr::Number(1.))
        } else {
            add(exponents)
        };

        match pow(base, exponent) {
            Expr::Number(value) => coefficient *= value,
            factor @ Expr::Mul(_) => {
                needs_flattening = true;
                result.push(factor);
            },
            factor => result.push(factor),
        }
    }

    if needs_flattening {
        result.push(Expr::Number(coefficient));
        return mul(result);
    }

    if coefficient == 0. {
        return Expr::Number(0.);
    }

    result.sort_by(cmp_expr);

    match result.len() {
        0 => Expr::Number(coefficient),
        1 => scale(coefficient, result.remove(0)),
        _ => {
            if coefficient != 1. {
                result.insert(0, Expr::Number(coefficient));
            }

            Expr::Mul(result)
        }
    }
}

/// Canonical power
pub fn pow(base: Expr, exponent: Expr) -> Expr {
    if let Expr::Number(e) = &exponent {
        if *e == 0. {
            return Expr::Number(1.);
        }
        if *e == 1. {
            return base;
        }
    }

    match (base, exponent) {
        (Expr::Number(b), Expr::Number(e)) => {
            let value = b.powf(e);
            if value.is_finite() && (b > 0. || is_integer(e)) {
                Expr::Number(value)
            } else {
                Expr::Pow(Box::new(Expr::Number(b)), Box::new(Expr::Number(e)))
            }
        },
        (Expr::Number(b), _) if b == 1. => Expr::Number(1.),
        (Expr::Pow(inner_base, inner_exponent), Expr::Number(e)) if is_integer(e) => {
            pow(*inner_base, mul(vec![*inner_exponent, Expr::Number(e)]))
        },
        (Expr::Mul(factors), Expr::Number(e)) if is_integer(e) => {
            mul(factors.into_iter().map(|f| pow(f, Expr::Number(e))).collect())
        },
        (Expr::Call(Function::Exp, argument), Expr::Number(e)) => {
            call(Function::Exp, mul(vec![Expr::Number(e), *argument]))
        },
        (base, exponent) => Expr::Pow(Box::new(base), Box::new(exponent)),
    }
}

/// Canonical function application, folds numeric arguments
pub fn call(function: Function, argument: Expr) -> Expr {
    match (function, argument) {
        (function, Expr::Number(x)) => {
            let value = function.apply(x);
            if value.is_finite() {
                Expr::Number(value)
            } else {
                Expr::Call(function, Box::new(Expr::Number(x)))
            }
        },
        (Function::Log, Expr::Call(Function::Exp, inner)) => *inner,
        (function, argument) => Expr::Call(function, Box::new(argument)),
    }
}

pub fn number(value: f64) -> Expr {
    Expr::Number(value)
}

pub fn symbol(name: &str) -> Expr {
    Expr::Symbol(String::from(name))
}

pub fn neg(expr: Expr) -> Expr {
    mul(vec![Expr::Number(-1.), expr])
}

pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
    add(vec![lhs, neg(rhs)])
}

pub fn div(lhs: Expr, rhs: Expr) -> Expr {
    mul(vec![lhs, pow(rhs, Expr::Number(-1.))])
}

pub fn exp(argument: Expr) -> Expr {
    call(Function::Exp, argument)
}

pub fn log(argument: Expr) -> Expr {
    call(Function::Log, argument)
}

impl Expr {
    /// Returns the value if the expression is a numeric constant
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(value) if *value == 0.)
    }

    /// All symbols the expression depends on, in sorted order
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.collect_symbols(&mut symbols);

        symbols
    }

    fn collect_symbols(&self, symbols: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {},
            Expr::Symbol(name) => { symbols.insert(name.clone()); },
            Expr::Add(operands) | Expr::Mul(operands) => {
                for operand in operands {
                    operand.collect_symbols(symbols);
                }
            },
            Expr::Pow(base, exponent) => {
                base.collect_symbols(symbols);
                exponent.collect_symbols(symbols);
            },
            Expr::Call(_, argument) => argument.collect_symbols(symbols),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Symbol(symbol) => symbol == name,
            Expr::Add(operands) | Expr::Mul(operands) => operands.iter().any(|o| o.contains(name)),
            Expr::Pow(base, exponent) => base.contains(name) || exponent.contains(name),
            Expr::Call(_, argument) => argument.contains(name),
        }
    }

    /// Replaces a symbol and recanonicalizes the result
    pub fn subs(&self, name: &str, value: &Expr) -> Expr {
        let mut replacements = BTreeMap::new();
        replacements.insert(String::from(name), value.clone());

        self.subs_all(&replacements)
    }

    /// Replaces several symbols simultaneously
    pub fn subs_all(&self, replacements: &BTreeMap<String, Expr>) -> Expr {
        match self {
            Expr::Number(_) => self.clone(),
            Expr::Symbol(name) => match replacements.get(name) {
                Some(value) => value.clone(),
                None => self.clone(),
            },
            Expr::Add(terms) => add(terms.iter().map(|t| t.subs_all(replacements)).collect()),
            Expr::Mul(factors) => mul(factors.iter().map(|f| f.subs_all(replacements)).collect()),
            Expr::Pow(base, exponent) => pow(base.subs_all(replacements), exponent.subs_all(replacements)),
            Expr::Call(function, argument) => call(*function, argument.subs_all(replacements)),
        }
    }

    /// Exact derivative with respect to a symbol
    pub fn diff(&self, name: &str) -> Expr {
        if !self.contains(name) {
            return Expr::Number(0.);
        }

        match self {
            Expr::Number(_) => Expr::Number(0.),
            Expr::Symbol(symbol) => Expr::Number(if symbol == name { 1. } else { 0. }),
            Expr::Add(terms) => add(terms.iter().map(|t| t.diff(name)).collect()),
            Expr::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (n, factor) in factors.iter().enumerate() {
                    if !factor.contains(name) {
                        continue;
                    }
                    let mut product: Vec<Expr> = factors.clone();
                    product[n] = factor.diff(name);
                    terms.push(mul(product));
                }

                add(terms)
            },
            Expr::Pow(base, exponent) => {
                let base = base.as_ref().clone();
                let exponent = exponent.as_ref().clone();

                if !exponent.contains(name) {
                    // n * b^(n - 1) * b'
                    mul(vec![
                        exponent.clone(),
                        pow(base.clone(), add(vec![exponent, Expr::Number(-1.)])),
                        base.diff(name),
                    ])
                } else if !base.contains(name) {
                    // b^e * log(b) * e'
                    mul(vec![
                        pow(base.clone(), exponent.clone()),
                        log(base),
                        exponent.diff(name),
                    ])
                } else {
                    mul(vec![
                        pow(base.clone(), exponent.clone()),
                        add(vec![
                            mul(vec![exponent.diff(name), log(base.clone())]),
                            mul(vec![exponent, base.diff(name), pow(base, Expr::Number(-1.))]),
                        ]),
                    ])
                }
            },
            Expr::Call(function, argument) => {
                let argument = argument.as_ref().clone();
                let outer = match function {
                    Function::Exp => exp(argument.clone()),
                    Function::Log => pow(argument.clone(), Expr::Number(-1.)),
                    Function::Sin => call(Function::Cos, argument.clone()),
                    Function::Cos => neg(call(Function::Sin, argument.clone())),
                    Function::Tan => pow(call(Function::Cos, argument.clone()), Expr::Number(-2.)),
                    Function::Sinh => call(Function::Cosh, argument.clone()),
                    Function::Cosh => call(Function::Sinh, argument.clone()),
                    Function::Tanh => sub(
                        Expr::Number(1.),
                        pow(call(Function::Tanh, argument.clone()), Expr::Number(2.)),
                    ),
                };

                mul(vec![outer, argument.diff(name)])
            },
        }
    }

    /// Whether `lhs - rhs` reduces to zero under canonicalization
    pub fn is_zero_identity(lhs: &Expr, rhs: &Expr) -> bool {
        sub(lhs.clone(), rhs.clone()).is_zero()
    }

    /// Factors that appear with a negative constant exponent, returned as
    /// the positive power, e.g. the `1 - exp(x)` in `a / (1 - exp(x))`
    pub fn denominators(&self) -> Vec<Expr> {
        let mut found = Vec::new();
        self.collect_denominators(&mut found);

        found
    }

    fn collect_denominators(&self, found: &mut Vec<Expr>) {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => {},
            Expr::Add(operands) | Expr::Mul(operands) => {
                for operand in operands {
                    operand.collect_denominators(found);
                }
            },
            Expr::Pow(base, exponent) => {
                if let Expr::Number(e) = exponent.as_ref() {
                    if *e < 0. && !found.contains(base) {
                        found.push(base.as_ref().clone());
                    }
                }
                base.collect_denominators(found);
                exponent.collect_denominators(found);
            },
            Expr::Call(_, argument) => argument.collect_denominators(found),
        }
    }

    /// Coefficients `(a, b)` if the expression equals `a * name + b`
    pub fn as_linear(&self, name: &str) -> Option<(f64, f64)> {
        let slope = self.diff(name).as_number()?;
        let intercept = self.subs(name, &Expr::Number(0.)).as_number()?;

        Some((slope, intercept))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Expr {
        Expr::Number(value)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match CodePrinter::new().print(self) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn x() -> Expr { symbol("x") }
    fn y() -> Expr { symbol("y") }

    #[test]
    fn test_like_terms_cancel() {
        let expr = sub(mul(vec![number(2.), x(), y()]), mul(vec![y(), x(), number(2.)]));
        assert_eq!(expr, number(0.));

        let expr = add(vec![x(), x(), number(1.), number(2.)]);
        assert_eq!(expr, add(vec![mul(vec![number(2.), x()]), number(3.)]));
    }

    #[test]
    fn test_equal_bases_collect() {
        let expr = mul(vec![x(), x(), pow(x(), number(-2.))]);
        assert_eq!(expr, number(1.));

        let expr = mul(vec![pow(x(), number(3.)), x()]);
        assert_eq!(expr, pow(x(), number(4.)));
    }

    #[test]
    fn test_order_does_not_matter() {
        let lhs = add(vec![exp(x()), y(), number(1.)]);
        let rhs = add(vec![number(1.), y(), exp(x())]);
        assert_eq!(lhs, rhs);
        assert!(Expr::is_zero_identity(&lhs, &rhs));
    }

    #[test]
    fn test_numeric_folding() {
        assert_eq!(exp(number(0.)), number(1.));
        assert_eq!(log(number(1.)), number(0.));
        assert_eq!(pow(number(2.), number(3.)), number(8.));
        assert_eq!(div(number(1.), number(4.)), number(0.25));
    }

    #[test]
    fn test_diff_rules() {
        // d/dx x^3 = 3 x^2
        let expr = pow(x(), number(3.));
        assert_eq!(expr.diff("x"), mul(vec![number(3.), pow(x(), number(2.))]));

        // d/dx exp(2x) = 2 exp(2x)
        let expr = exp(mul(vec![number(2.), x()]));
        assert_eq!(expr.diff("x"), mul(vec![number(2.), expr.clone()]));

        // d/dx (x * y) = y
        assert_eq!(mul(vec![x(), y()]).diff("x"), y());

        // d/dx 1/x = -1/x^2
        let expr = div(number(1.), x());
        assert_eq!(expr.diff("x"), neg(pow(x(), number(-2.))));

        assert_eq!(y().diff("x"), number(0.));
    }

    #[test]
    fn test_quotient_rule_identity() {
        // (a / (a + b))' computed two ways
        let a = exp(x());
        let b = pow(x(), number(2.));
        let quotient = div(a.clone(), add(vec![a.clone(), b.clone()]));

        let da = a.diff("x");
        let db = b.diff("x");
        let denominator = add(vec![a.clone(), b.clone()]);
        let expected = div(
            sub(
                mul(vec![da.clone(), denominator.clone()]),
                mul(vec![a.clone(), add(vec![da, db])]),
            ),
            pow(denominator, number(2.)),
        );

        let difference = sub(quotient.diff("x"), expected);
        let at = |value: f64| difference.subs("x", &number(value)).as_number();

        for value in [-1.5, 0.3, 2.] {
            let residual = at(value).unwrap_or(f64::NAN);
            assert!(residual.abs() < 1e-12, "residual {} at {}", residual, value);
        }
    }

    #[test]
    fn test_substitution() {
        let expr = add(vec![mul(vec![number(2.), x()]), y()]);
        let substituted = expr.subs("x", &number(3.));
        assert_eq!(substituted, add(vec![y(), number(6.)]));
        assert_eq!(substituted.free_symbols().into_iter().collect::<Vec<_>>(), vec![String::from("y")]);
    }

    #[test]
    fn test_denominators_and_linear() {
        let expr = div(x(), sub(number(1.), exp(div(add(vec![x(), number(38.)]), number(-6.)))));
        let denominators = expr.denominators();
        assert_eq!(denominators.len(), 1);

        match &denominators[0] {
            Expr::Add(terms) => {
                let exponential = terms.iter().find_map(|t| match t {
                    Expr::Mul(factors) => factors.iter().find_map(|f| match f {
                        Expr::Call(Function::Exp, argument) => Some(argument.as_ref().clone()),
                        _ => None,
                    }),
                    _ => None,
                });
                let argument = exponential.unwrap_or(number(f64::NAN));
                let (a, b) = argument.as_linear("x").unwrap_or((f64::NAN, f64::NAN));
                assert!((-b / a + 38.).abs() < 1e-12);
            },
            other => panic!("unexpected denominator {:?}", other),
        }
    }
}
