use std::collections::BTreeMap;
use super::{Expr, pow};
use crate::error::CodeGenerationError;


const PRECEDENCE_ADD: u8 = 1;
const PRECEDENCE_MUL: u8 = 2;
const PRECEDENCE_ATOM: u8 = 4;

/// Prints expressions as C code, the same text is valid in NMODL
#[derive(Debug, Clone, Default)]
pub struct CodePrinter {
    renames: BTreeMap<String, String>,
}

impl CodePrinter {
    pub fn new() -> Self {
        CodePrinter::default()
    }

    /// Prints `from` as `to` wherever the symbol occurs
    pub fn with_rename(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(String::from(from), String::from(to));

        self
    }

    pub fn print(&self, expr: &Expr) -> Result<String, CodeGenerationError> {
        Ok(self.print_with_precedence(expr)?.0)
    }

    fn print_number(&self, value: f64) -> Result<String, CodeGenerationError> {
        if !value.is_finite() {
            return Err(CodeGenerationError::NonPrintableExpression(format!("{:?}", value)));
        }

        // shortest representation that reads back to the same double
        Ok(format!("{:?}", value))
    }

    fn parenthesize(&self, expr: &Expr, minimum: u8) -> Result<String, CodeGenerationError> {
        let (text, precedence) = self.print_with_precedence(expr)?;
        if precedence < minimum {
            Ok(format!("({})", text))
        } else {
            Ok(text)
        }
    }

    fn is_negative(expr: &Expr) -> bool {
        match expr {
            Expr::Number(value) => *value < 0.,
            Expr::Mul(factors) => matches!(factors.first(), Some(Expr::Number(value)) if *value < 0.),
            _ => false,
        }
    }

    fn negate(expr: &Expr) -> Expr {
        match expr {
            Expr::Number(value) => Expr::Number(-value),
            Expr::Mul(factors) => {
                let mut factors = factors.clone();
                if let Some(Expr::Number(value)) = factors.first().cloned() {
                    if value == -1. {
                        factors.remove(0);
                    } else {
                        factors[0] = Expr::Number(-value);
                    }
                }
                if factors.len() == 1 {
                    factors.remove(0)
                } else {
                    Expr::Mul(factors)
                }
            },
            other => other.clone(),
        }
    }

    fn print_with_precedence(&self, expr: &Expr) -> Result<(String, u8), CodeGenerationError> {
        match expr {
            Expr::Number(value) => {
                let precedence = if *value < 0. { PRECEDENCE_MUL } else { PRECEDENCE_ATOM };
                Ok((self.print_number(*value)?, precedence))
            },
            Expr::Symbol(name) => {
                let name = self.renames.get(name).unwrap_or(name);
                Ok((name.clone(), PRECEDENCE_ATOM))
            },
            Expr::Call(function, argument) => {
                Ok((format!("{}({})", function.name(), self.print(argument)?), PRECEDENCE_ATOM))
            },
            Expr::Add(terms) => {
                // constants go last, as in `exp(v) + 1.0`
                let ordered = terms.iter()
                    .filter(|t| !matches!(t, Expr::Number(_)))
                    .chain(terms.iter().filter(|t| matches!(t, Expr::Number(_))));

                let mut text = String::new();
                for (n, term) in ordered.enumerate() {
                    if n == 0 {
                        text.push_str(&self.parenthesize(term, PRECEDENCE_ADD)?);
                    } else if CodePrinter::is_negative(term) {
                        text.push_str(" - ");
                        text.push_str(&self.parenthesize(&CodePrinter::negate(term), PRECEDENCE_MUL)?);
                    } else {
                        text.push_str(" + ");
                        text.push_str(&self.parenthesize(term, PRECEDENCE_ADD)?);
                    }
                }

                Ok((text, PRECEDENCE_ADD))
            },
            Expr::Mul(factors) => self.print_product(factors),
            Expr::Pow(base, exponent) => self.print_power(base, exponent),
        }
    }

    fn print_product(&self, factors: &[Expr]) -> Result<(String, u8), CodeGenerationError> {
        let mut coefficient = 1.;
        let mut numerator: Vec<&Expr> = vec![];
        let mut denominator: Vec<Expr> = vec![];

        for factor in factors {
            match factor {
                Expr::Number(value) => coefficient *= value,
                Expr::Pow(base, exponent) if matches!(exponent.as_ref(), Expr::Number(e) if *e < 0.) => {
                    let e = exponent.as_number().unwrap_or(-1.);
                    denominator.push(pow(base.as_ref().clone(), Expr::Number(-e)));
                },
                other => numerator.push(other),
            }
        }

        let mut parts: Vec<String> = vec![];
        let mut sign = "";
        if coefficient == -1. && !numerator.is_empty() {
            sign = "-";
        } else if coefficient != 1. || numerator.is_empty() {
            parts.push(self.print_number(coefficient.abs())?);
            if coefficient < 0. {
                sign = "-";
            }
        }
        for factor in numerator {
            parts.push(self.parenthesize(factor, PRECEDENCE_MUL)?);
        }

        let mut text = format!("{}{}", sign, parts.join("*"));

        if !denominator.is_empty() {
            let denominator_text = if denominator.len() == 1 {
                self.parenthesize(&denominator[0], PRECEDENCE_ATOM)?
            } else {
                let printed = denominator.iter()
                    .map(|d| self.parenthesize(d, PRECEDENCE_MUL))
                    .collect::<Result<Vec<String>, CodeGenerationError>>()?;

                format!("({})", printed.join("*"))
            };
            text = format!("{}/{}", text, denominator_text);
        }

        Ok((text, PRECEDENCE_MUL))
    }

    fn print_power(&self, base: &Expr, exponent: &Expr) -> Result<(String, u8), CodeGenerationError> {
        if let Expr::Number(e) = exponent {
            if *e < 0. {
                let positive = pow(base.clone(), Expr::Number(-e));
                return Ok((
                    format!("1.0/{}", self.parenthesize(&positive, PRECEDENCE_ATOM)?),
                    PRECEDENCE_MUL,
                ));
            }
            if *e == 0.5 {
                return Ok((format!("sqrt({})", self.print(base)?), PRECEDENCE_ATOM));
            }
            if e.fract() == 0. && e.abs() < 1e15 {
                return Ok((format!("pow({}, {})", self.print(base)?, *e as i64), PRECEDENCE_ATOM));
            }
        }

        Ok((format!("pow({}, {})", self.print(base)?, self.print(exponent)?), PRECEDENCE_ATOM))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbolic::parse;
    use crate::error::IonChannelError;

    fn print(text: &str) -> Result<String, IonChannelError> {
        Ok(CodePrinter::new().print(&parse(text)?)?)
    }

    #[test]
    fn test_basic_printing() -> Result<(), IonChannelError> {
        assert_eq!(print("x + 1")?, "x + 1.0");
        assert_eq!(print("x - y")?, "x - y");
        assert_eq!(print("2 * x")?, "2.0*x");
        assert_eq!(print("-x")?, "-x");
        assert_eq!(print("x / y")?, "x/y");
        assert_eq!(print("1 / (x + y)")?, "1.0/(x + y)");
        assert_eq!(print("x**3")?, "pow(x, 3)");
        assert_eq!(print("sqrt(x)")?, "sqrt(x)");
        assert_eq!(print("exp(-x)")?, "exp(-x)");
        assert_eq!(print("x**y")?, "pow(x, y)");

        Ok(())
    }

    #[test]
    fn test_parentheses() -> Result<(), IonChannelError> {
        assert_eq!(print("(x + 1) * y")?, "y*(x + 1.0)");
        assert_eq!(print("x / (y * z)")?, "x/(y*z)");
        assert_eq!(print("x - (y + z)")?, "x - y - z");

        Ok(())
    }

    #[test]
    fn test_renames() -> Result<(), IonChannelError> {
        let printer = CodePrinter::new().with_rename("ca", "cai");
        let expr = parse("1 / (1 + (0.00043 / ca)**4.8)")?;
        let text = printer.print(&expr)?;

        assert!(text.contains("cai"));
        assert!(!text.contains("ca)"));

        Ok(())
    }

    #[test]
    fn test_non_finite_is_error() {
        let printer = CodePrinter::new();
        assert!(printer.print(&Expr::Number(f64::INFINITY)).is_err());
        assert!(printer.print(&Expr::Number(f64::NAN)).is_err());
    }
}
