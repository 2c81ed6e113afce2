//! MSBuild condition parser and evaluator.
//!
//! `.vcxproj` files gate their `<PropertyGroup>` and `<ItemDefinitionGroup>`
//! elements on conditions such as:
//!
//! - `'$(Configuration)|$(Platform)'=='Debug|Win32'`
//! - `'$(Configuration)' == 'Release' and '$(Platform)' != 'x64'`
//! - `!Exists('$(UserRootDir)\Microsoft.Cpp.$(Platform).user.props')`
//!
//! ## Grammar (case-insensitive keywords)
//!
//! ```text
//! expr       = and_expr ('or' and_expr)*
//! and_expr   = unary ('and' unary)*
//! unary      = '!'* atom
//! atom       = exists | comparison | '(' expr ')'
//! comparison = operand ('==' | '!=') operand
//! exists     = 'Exists' '(' operand ')'
//! operand    = "'" chars "'" | bare
//! ```
//!
//! A bare operand is a run of `$(Name)` tokens and characters other than
//! blanks, quotes, parentheses and operator characters, e.g.
//! `$(Configuration)==Debug`. String comparison ignores ASCII case, as
//! MSBuild does.

use chumsky::prelude::*;
use std::collections::HashMap;

use crate::error::VcprojError;
use crate::variables::expand_tokens;

type Extra<'a> = extra::Err<Simple<'a, char>>;

// ═══════════════════════════════════════════════════════════════════════════════
//  AST
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed MSBuild condition. Operands keep their `$(Name)` tokens until
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Compare {
        lhs: String,
        op: CompareOp,
        rhs: String,
    },
    /// `Exists('path')`. Evaluated without touching the filesystem.
    Exists(String),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parser
// ═══════════════════════════════════════════════════════════════════════════════

fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, &'a str, Extra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .to_slice()
        .filter(move |s: &&str| s.eq_ignore_ascii_case(word))
}

/// Quoted or bare operand, as its raw template text.
fn operand<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> + Clone {
    let quoted = none_of('\'')
        .repeated()
        .to_slice()
        .delimited_by(just('\''), just('\''));

    let variable = just("$(")
        .then(none_of(')').repeated())
        .then(just(')'))
        .ignored();
    let plain = none_of(" \t\r\n'=!<>()").ignored();
    let bare = variable.or(plain).repeated().at_least(1).to_slice();

    quoted.or(bare).map(|s: &str| s.to_string())
}

fn compare_op<'a>() -> impl Parser<'a, &'a str, CompareOp, Extra<'a>> + Clone {
    choice((
        just("==").to(CompareOp::Equal),
        just("!=").to(CompareOp::NotEqual),
    ))
}

fn condition_parser<'a>() -> impl Parser<'a, &'a str, Expression, Extra<'a>> {
    recursive(|expr| {
        let exists = keyword("exists")
            .ignore_then(operand().padded().delimited_by(just('('), just(')')))
            .map(Expression::Exists);

        let comparison = operand()
            .then(compare_op().padded())
            .then(operand())
            .map(|((lhs, op), rhs)| Expression::Compare { lhs, op, rhs });

        let group = expr.delimited_by(just('('), just(')'));

        let atom = choice((exists, comparison, group)).padded();

        let unary = just('!')
            .padded()
            .repeated()
            .foldr(atom, |_, e| Expression::Not(Box::new(e)));

        let and_expr = unary.clone().foldl(
            keyword("and").padded().ignore_then(unary).repeated(),
            |lhs, rhs| Expression::And(Box::new(lhs), Box::new(rhs)),
        );

        and_expr.clone().foldl(
            keyword("or").padded().ignore_then(and_expr).repeated(),
            |lhs, rhs| Expression::Or(Box::new(lhs), Box::new(rhs)),
        )
    })
}

/// Parse a `Condition` attribute.
pub fn parse_condition(input: &str) -> Result<Expression, VcprojError> {
    condition_parser()
        .parse(input)
        .into_result()
        .map_err(|errs| VcprojError::Condition {
            input: input.to_string(),
            message: errs
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

fn expand(template: &str, vars: &HashMap<String, String>) -> String {
    expand_tokens(template, |name| vars.get(name).cloned().unwrap_or_default())
}

/// Evaluate against variable bindings; unknown variables are empty.
///
/// `Exists(..)` is true when its expanded argument is non-empty.
pub fn evaluate(expr: &Expression, vars: &HashMap<String, String>) -> bool {
    match expr {
        Expression::Compare { lhs, op, rhs } => {
            let equal = expand(lhs, vars).eq_ignore_ascii_case(&expand(rhs, vars));
            match op {
                CompareOp::Equal => equal,
                CompareOp::NotEqual => !equal,
            }
        }
        Expression::Exists(path) => !expand(path, vars).trim().is_empty(),
        Expression::Not(e) => !evaluate(e, vars),
        Expression::And(a, b) => evaluate(a, vars) && evaluate(b, vars),
        Expression::Or(a, b) => evaluate(a, vars) || evaluate(b, vars),
    }
}

/// Parse and evaluate in one step. An absent or blank condition holds.
pub fn holds(condition: Option<&str>, vars: &HashMap<String, String>) -> Result<bool, VcprojError> {
    match condition.map(str::trim) {
        None | Some("") => Ok(true),
        Some(text) => Ok(evaluate(&parse_condition(text)?, vars)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
