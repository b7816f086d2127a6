//! Compiler for textual resolution formulas such as
//! `(abs(eta) <= 3.2) * sqrt(energy^2*0.0017^2 + energy*0.101^2)`.
//!
//! Variables are `pt`, `eta`, `phi`, `energy` (or `x`, `y`, `z`, `t`).
//! Comparisons and logical operators evaluate to `1` or `0`.

use super::ResolutionFunction;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("resolution formula is empty")]
    Empty,
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { position: usize, found: char },
    #[error("invalid number '{text}' at position {position}")]
    InvalidNumber { position: usize, text: String },
    #[error("unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: &'static str,
    },
    #[error("unknown variable '{name}' at position {position}")]
    UnknownVariable { position: usize, name: String },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { position: usize, name: String },
    #[error("function '{name}' takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    Pt,
    Eta,
    Phi,
    Energy,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pt" | "x" => Some(Self::Pt),
            "eta" | "y" => Some(Self::Eta),
            "phi" | "z" => Some(Self::Phi),
            "energy" | "t" => Some(Self::Energy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Min,
    Max,
    Pow,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "abs" | "fabs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            _ => return None,
        };
        Some(function)
    }

    const fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max | Self::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Abs => args[0].abs(),
            Self::Sqrt => args[0].sqrt(),
            Self::Exp => args[0].exp(),
            Self::Log => args[0].ln(),
            Self::Log10 => args[0].log10(),
            Self::Sin => args[0].sin(),
            Self::Cos => args[0].cos(),
            Self::Tan => args[0].tan(),
            Self::Sinh => args[0].sinh(),
            Self::Cosh => args[0].cosh(),
            Self::Tanh => args[0].tanh(),
            Self::Min => args[0].min(args[1]),
            Self::Max => args[0].max(args[1]),
            Self::Pow => args[0].powf(args[1]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |value: bool| if value { 1.0 } else { 0.0 };
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
            Self::Pow => lhs.powf(rhs),
            Self::Less => truth(lhs < rhs),
            Self::LessEqual => truth(lhs <= rhs),
            Self::Greater => truth(lhs > rhs),
            Self::GreaterEqual => truth(lhs >= rhs),
            Self::Equal => truth(lhs == rhs),
            Self::NotEqual => truth(lhs != rhs),
            Self::And => truth(lhs != 0.0 && rhs != 0.0),
            Self::Or => truth(lhs != 0.0 || rhs != 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(Variable),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy)]
struct Arguments {
    pt: f64,
    eta: f64,
    phi: f64,
    energy: f64,
}

impl Expr {
    fn eval(&self, args: &Arguments) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::Variable(Variable::Pt) => args.pt,
            Self::Variable(Variable::Eta) => args.eta,
            Self::Variable(Variable::Phi) => args.phi,
            Self::Variable(Variable::Energy) => args.energy,
            Self::Negate(inner) => -inner.eval(args),
            Self::Not(inner) => {
                if inner.eval(args) == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Binary(op, lhs, rhs) => op.apply(lhs.eval(args), rhs.eval(args)),
            Self::Call(function, call_args) => {
                let values = call_args
                    .iter()
                    .map(|arg| arg.eval(args))
                    .collect::<Vec<_>>();
                function.apply(&values)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LeftParen,
    RightParen,
    Comma,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "number {value}"),
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Op(op) => write!(f, "operator '{op}'"),
            Self::LeftParen => f.write_str("'('"),
            Self::RightParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
        }
    }
}

const OPERATORS: [&str; 16] = [
    "**", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "^", "<", ">", "!", "=",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut position = 0;

    while position < bytes.len() {
        let current = bytes[position] as char;
        if current.is_ascii_whitespace() {
            position += 1;
            continue;
        }

        if current.is_ascii_digit() || current == '.' {
            let start = position;
            while position < bytes.len() {
                let c = bytes[position] as char;
                let exponent_sign = (c == '+' || c == '-')
                    && position > start
                    && matches!(bytes[position - 1] as char, 'e' | 'E');
                if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                    position += 1;
                } else {
                    break;
                }
            }
            let text = &source[start..position];
            let value = text.parse::<f64>().map_err(|_| FormulaError::InvalidNumber {
                position: start,
                text: text.to_string(),
            })?;
            tokens.push((start, Token::Number(value)));
            continue;
        }

        if current.is_ascii_alphabetic() || current == '_' {
            let start = position;
            while position < bytes.len() {
                let c = bytes[position] as char;
                if c.is_ascii_alphanumeric() || c == '_' {
                    position += 1;
                } else {
                    break;
                }
            }
            tokens.push((start, Token::Ident(source[start..position].to_string())));
            continue;
        }

        match current {
            '(' => tokens.push((position, Token::LeftParen)),
            ')' => tokens.push((position, Token::RightParen)),
            ',' => tokens.push((position, Token::Comma)),
            _ => {
                let rest = &source[position..];
                let Some(&op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    let found = rest.chars().next().unwrap_or(current);
                    return Err(FormulaError::UnexpectedCharacter { position, found });
                };
                tokens.push((position, Token::Op(if op == "=" { "==" } else { op })));
                position += op.len();
                continue;
            }
        }
        position += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, token)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map_or(self.end, |(position, _)| *position)
    }

    fn unexpected(&self, expected: &'static str) -> FormulaError {
        let found = self
            .peek()
            .map_or_else(|| "end of formula".to_string(), ToString::to_string);
        FormulaError::UnexpectedToken {
            position: self.position(),
            found,
            expected,
        }
    }

    fn eat_op(&mut self, candidates: &[&'static str]) -> Option<&'static str> {
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if candidates.contains(&op) {
                self.cursor += 1;
                return Some(op);
            }
        }
        None
    }

    fn binary_level(
        &mut self,
        operators: &[&'static str],
        next: fn(&mut Self) -> Result<Expr, FormulaError>,
    ) -> Result<Expr, FormulaError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(operators) {
            let rhs = next(self)?;
            lhs = Expr::Binary(binary_op(op), Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&["||"], Self::and)
    }

    fn and(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&["&&"], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&["<", "<=", ">", ">=", "==", "!="], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&["+", "-"], Self::term)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&["*", "/"], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.eat_op(&["-", "+", "!"]) {
            Some("-") => Ok(Expr::Negate(Box::new(self.unary()?))),
            Some("!") => Ok(Expr::Not(Box::new(self.unary()?))),
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.primary()?;
        if self.eat_op(&["^", "**"]).is_some() {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let position = self.position();
        match self.peek().cloned() {
            Some(Token::Number(value)) => {
                self.cursor += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::LeftParen) => {
                self.cursor += 1;
                let inner = self.or()?;
                self.expect_right_paren()?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                self.cursor += 1;
                if matches!(self.peek(), Some(Token::LeftParen)) {
                    self.cursor += 1;
                    return self.call(name, position);
                }
                if name == "pi" {
                    return Ok(Expr::Number(std::f64::consts::PI));
                }
                Variable::from_name(&name)
                    .map(Expr::Variable)
                    .ok_or(FormulaError::UnknownVariable { position, name })
            }
            _ => Err(self.unexpected("a number, variable, function or '('")),
        }
    }

    fn call(&mut self, name: String, position: usize) -> Result<Expr, FormulaError> {
        let Some(function) = Function::from_name(&name) else {
            return Err(FormulaError::UnknownFunction { position, name });
        };

        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RightParen)) {
            self.cursor += 1;
        } else {
            loop {
                args.push(self.or()?);
                match self.peek() {
                    Some(Token::Comma) => self.cursor += 1,
                    Some(Token::RightParen) => {
                        self.cursor += 1;
                        break;
                    }
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }

        if args.len() != function.arity() {
            return Err(FormulaError::ArgumentCount {
                name,
                expected: function.arity(),
                actual: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }

    fn expect_right_paren(&mut self) -> Result<(), FormulaError> {
        if matches!(self.peek(), Some(Token::RightParen)) {
            self.cursor += 1;
            Ok(())
        } else {
            Err(self.unexpected("')'"))
        }
    }
}

fn binary_op(op: &str) -> BinaryOp {
    match op {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "<" => BinaryOp::Less,
        "<=" => BinaryOp::LessEqual,
        ">" => BinaryOp::Greater,
        ">=" => BinaryOp::GreaterEqual,
        "==" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        "&&" => BinaryOp::And,
        "||" => BinaryOp::Or,
        _ => BinaryOp::Pow,
    }
}

/// Compiled resolution formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn compile(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }

        let mut parser = Parser {
            tokens,
            cursor: 0,
            end: source.len(),
        };
        let expr = parser.or()?;
        if parser.peek().is_some() {
            return Err(parser.unexpected("end of formula"));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, pt: f64, eta: f64, phi: f64, energy: f64) -> f64 {
        self.expr.eval(&Arguments {
            pt,
            eta,
            phi,
            energy,
        })
    }
}

impl ResolutionFunction for Formula {
    fn sigma(&self, eta: f64, energy: f64) -> f64 {
        self.eval(0.0, eta, 0.0, energy)
    }
}
