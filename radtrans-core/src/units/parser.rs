//! Unit string parser.
//!
//! Handles the usual syntactic variations found in configuration files:
//!
//! - Exponents: `cm^3`, `cm**3`, `cm3`
//! - Multiplication: `g cm`, `g*cm`
//! - Division: `g/cm^3`, `g cm^-3`
//! - Parentheses: `erg / (s cm^2)`
//!
//! # Grammar
//!
//! ```text
//! unit_expr  = term ('/' term)*
//! term       = factor (('*' | ' ') factor)*
//! factor     = '(' unit_expr ')' exponent? | base_unit exponent?
//! base_unit  = [a-zA-Z_]+
//! exponent   = ('^' | '**')? '-'? [0-9]+
//! ```

use super::dimension::Dimension;
use super::registry::UNIT_REGISTRY;
use std::collections::BTreeMap;

/// A parsed unit expression: a product of base unit symbols with integer exponents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedUnit {
    components: BTreeMap<String, i32>,
}

impl ParsedUnit {
    fn single(symbol: String, exp: i32) -> Self {
        let mut components = BTreeMap::new();
        components.insert(symbol, exp);
        Self::from_components(components)
    }

    fn from_components(components: BTreeMap<String, i32>) -> Self {
        let components = components
            .into_iter()
            .filter(|(_, exp)| *exp != 0)
            .collect();
        Self { components }
    }

    /// Parses a unit string.
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() || input == "1" || input.eq_ignore_ascii_case("dimensionless") {
            return Ok(Self::default());
        }
        let mut parser = UnitParser::new(input);
        let unit = parser.parse_expression()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(format!("unexpected character '{c}'"));
        }
        Ok(unit)
    }

    fn multiply(&self, other: &Self) -> Self {
        let mut components = self.components.clone();
        for (symbol, exp) in &other.components {
            *components.entry(symbol.clone()).or_insert(0) += exp;
        }
        Self::from_components(components)
    }

    fn divide(&self, other: &Self) -> Self {
        self.multiply(&other.pow(-1))
    }

    fn pow(&self, exp: i32) -> Self {
        Self::from_components(
            self.components
                .iter()
                .map(|(k, v)| (k.clone(), v * exp))
                .collect(),
        )
    }

    /// Overall dimension of the unit.
    pub fn dimension(&self) -> Result<Dimension, String> {
        self.components
            .iter()
            .try_fold(Dimension::DIMENSIONLESS, |acc, (symbol, &exp)| {
                let info = UNIT_REGISTRY
                    .lookup(symbol)
                    .ok_or_else(|| format!("unknown unit '{symbol}'"))?;
                Ok(acc + info.dimension.pow(exp as i8))
            })
    }

    /// Multiplier converting a value in this unit to CGS.
    pub fn to_cgs_factor(&self) -> Result<f64, String> {
        self.components.iter().try_fold(1.0, |acc, (symbol, &exp)| {
            let info = UNIT_REGISTRY
                .lookup(symbol)
                .ok_or_else(|| format!("unknown unit '{symbol}'"))?;
            Ok(acc * info.to_cgs_factor.powi(exp))
        })
    }
}

struct UnitParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> UnitParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn parse_expression(&mut self) -> Result<ParsedUnit, String> {
        self.skip_whitespace();
        let mut result = self.parse_term()?;
        loop {
            self.skip_whitespace();
            if self.peek() == Some('/') {
                self.advance();
                let divisor = self.parse_term()?;
                result = result.divide(&divisor);
            } else {
                break;
            }
        }
        Ok(result)
    }

    fn parse_term(&mut self) -> Result<ParsedUnit, String> {
        let mut result = self.parse_factor()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('*') if !self.input[self.pos..].starts_with("**") => {
                    self.advance();
                    let factor = self.parse_factor()?;
                    result = result.multiply(&factor);
                }
                Some(c) if c.is_ascii_alphabetic() || c == '(' => {
                    let factor = self.parse_factor()?;
                    result = result.multiply(&factor);
                }
                _ => break,
            }
        }
        Ok(result)
    }

    fn parse_factor(&mut self) -> Result<ParsedUnit, String> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_expression()?;
            self.skip_whitespace();
            if self.peek() != Some(')') {
                return Err("missing closing parenthesis".to_string());
            }
            self.advance();
            let exp = self.parse_optional_exponent()?;
            return Ok(inner.pow(exp));
        }

        let symbol = self.parse_symbol()?;
        let exp = self.parse_optional_exponent()?;
        Ok(ParsedUnit::single(symbol, exp))
    }

    fn parse_symbol(&mut self) -> Result<String, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            self.advance();
        }
        if self.pos == start {
            return Err(format!(
                "expected unit symbol at '{}'",
                &self.input[self.pos..]
            ));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_optional_exponent(&mut self) -> Result<i32, String> {
        if self.input[self.pos..].starts_with("**") {
            self.pos += 2;
        } else if self.peek() == Some('^') {
            self.advance();
        }

        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        if text.is_empty() {
            return Ok(1);
        }
        text.parse::<i32>()
            .map_err(|_| format!("invalid exponent '{text}'"))
    }
}
