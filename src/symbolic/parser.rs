use pest::Parser;
use pest::iterators::Pairs;
use pest::pratt_parser::PrattParser;
use super::{Expr, Function, add, call, div, mul, neg, number, pow, sub};
use crate::error::ExpressionError;


#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" }

number = @{
    (ASCII_DIGIT+ ~ ("." ~ ASCII_DIGIT*)? | "." ~ ASCII_DIGIT+) ~
    (^"e" ~ ("+" | "-")? ~ ASCII_DIGIT+)?
}
name = @{ (ASCII_ALPHA | "_") ~ (ASCII_ALPHANUMERIC | "_")* }

args = { expr ~ ("," ~ expr)* }
function = { name ~ "(" ~ args ~ ")" }

unary_minus = { "-" }
primary = _{ function | number | name | "(" ~ expr ~ ")" }
atom = _{ unary_minus* ~ primary }

bin_op = _{ add | subtract | power | multiply | divide }
	add = { "+" }
	subtract = { "-" }
	power = { "**" | "^" }
	multiply = { "*" }
	divide = { "/" }

expr = { atom ~ (bin_op ~ atom)* }

full = _{ SOI ~ expr ~ EOI }
"#]
pub struct ExpressionParser;

lazy_static::lazy_static! {
    pub static ref PRATT_PARSER: PrattParser<Rule> = {
        use pest::pratt_parser::{Assoc::*, Op};
        use Rule::*;

        PrattParser::new()
            .op(Op::infix(add, Left) | Op::infix(subtract, Left))
            .op(Op::infix(multiply, Left) | Op::infix(divide, Left))
            .op(Op::prefix(unary_minus))
            .op(Op::infix(power, Right))
    };
}

fn parse_number(text: &str) -> Result<Expr, ExpressionError> {
    text.parse::<f64>()
        .map(number)
        .map_err(|_| ExpressionError::ParseFailure(format!("invalid number `{}`", text)))
}

fn parse_name(text: &str) -> Expr {
    match text {
        "pi" => number(std::f64::consts::PI),
        _ => Expr::Symbol(String::from(text)),
    }
}

fn parse_function(name: &str, mut args: Vec<Expr>) -> Result<Expr, ExpressionError> {
    let expected = if name == "pow" { 2 } else { 1 };
    if args.len() != expected {
        return Err(ExpressionError::WrongArgumentCount {
            function: String::from(name),
            expected,
            found: args.len(),
        });
    }

    match name {
        "pow" => {
            let exponent = args.remove(1);
            let base = args.remove(0);

            Ok(pow(base, exponent))
        },
        "sqrt" => Ok(pow(args.remove(0), number(0.5))),
        _ => match Function::from_name(name) {
            Some(function) => Ok(call(function, args.remove(0))),
            None => Err(ExpressionError::UnknownFunction(String::from(name))),
        }
    }
}

fn parse_expr(pairs: Pairs<Rule>) -> Result<Expr, ExpressionError> {
    PRATT_PARSER
        .map_primary(|primary| match primary.as_rule() {
            Rule::number => parse_number(primary.as_str()),
            Rule::name => Ok(parse_name(primary.as_str())),
            Rule::expr => parse_expr(primary.into_inner()),
            Rule::function => {
                let mut inner_rules = primary.into_inner();

                let name = inner_rules.next()
                    .map(|pair| String::from(pair.as_str()))
                    .ok_or_else(|| ExpressionError::ParseFailure(String::from("missing function name")))?;

                let args = match inner_rules.next() {
                    Some(args) => args.into_inner()
                        .map(|i| parse_expr(i.into_inner()))
                        .collect::<Result<Vec<Expr>, ExpressionError>>()?,
                    None => vec![],
                };

                parse_function(&name, args)
            },
            rule => Err(ExpressionError::ParseFailure(format!("expected atom, found {:?}", rule))),
        })
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (lhs?, rhs?);

            match op.as_rule() {
                Rule::add => Ok(add(vec![lhs, rhs])),
                Rule::subtract => Ok(sub(lhs, rhs)),
                Rule::multiply => Ok(mul(vec![lhs, rhs])),
                Rule::divide => Ok(div(lhs, rhs)),
                Rule::power => Ok(pow(lhs, rhs)),
                rule => Err(ExpressionError::ParseFailure(format!("expected infix operation, found {:?}", rule))),
            }
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::unary_minus => Ok(neg(rhs?)),
            rule => Err(ExpressionError::ParseFailure(format!("expected prefix operation, found {:?}", rule))),
        })
        .parse(pairs)
}

/// Parses expression text such as `0.182 * (v + 38.) / (1. - exp(-(v + 38.) / 6.))`
/// into a canonical [`Expr`]
pub fn parse(text: &str) -> Result<Expr, ExpressionError> {
    let pairs = ExpressionParser::parse(Rule::full, text)
        .map_err(|e| ExpressionError::ParseFailure(e.to_string()))?;

    match pairs.into_iter().find(|pair| pair.as_rule() == Rule::expr) {
        Some(expr) => parse_expr(expr.into_inner()),
        None => Err(ExpressionError::ParseFailure(format!("no expression found in `{}`", text))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symbolic::{symbol, exp};

    #[test]
    fn test_precedence() -> Result<(), ExpressionError> {
        assert_eq!(parse("1 + 2 * 3")?, number(7.));
        assert_eq!(parse("2 ** 3 ** 2")?, number(512.));
        assert_eq!(parse("-2 ** 2")?, number(-4.));
        assert_eq!(parse("2 ^ -1")?, number(0.5));
        assert_eq!(parse("(1 + 2) * 3")?, number(9.));
        assert_eq!(parse("8 / 4 / 2")?, number(1.));

        Ok(())
    }

    #[test]
    fn test_number_formats() -> Result<(), ExpressionError> {
        assert_eq!(parse("1.")?, number(1.));
        assert_eq!(parse(".5")?, number(0.5));
        assert_eq!(parse("3.3e-3")?, number(3.3e-3));
        assert_eq!(parse("2E2")?, number(200.));

        Ok(())
    }

    #[test]
    fn test_functions_and_symbols() -> Result<(), ExpressionError> {
        let v = symbol("v");
        assert_eq!(parse("exp(-v)")?, exp(neg(v.clone())));
        assert_eq!(parse("sqrt(v)")?, pow(v.clone(), number(0.5)));
        assert_eq!(parse("pow(v, 2)")?, pow(v.clone(), number(2.)));
        assert_eq!(parse("h * m**3")?, mul(vec![symbol("h"), pow(symbol("m"), number(3.))]));
        assert_eq!(parse("pi")?, number(std::f64::consts::PI));

        Ok(())
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(parse("1 +"), Err(ExpressionError::ParseFailure(_))));
        assert!(matches!(parse("erf(v)"), Err(ExpressionError::UnknownFunction(_))));
        assert!(matches!(
            parse("pow(v)"),
            Err(ExpressionError::WrongArgumentCount { expected: 2, found: 1, .. })
        ));
        assert!(matches!(parse(""), Err(ExpressionError::ParseFailure(_))));
    }
}
