//! expr.rs
//! A small arithmetic expression language for equations written in model files.

use super::Equation;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,
    #[error("Unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("Unexpected '{found}' at offset {pos}")]
    UnexpectedToken { pos: usize, found: String },
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' takes {expected} argument(s), got {found}")]
    FunctionArity { name: String, expected: usize, found: usize },
    #[error("Identifier '{0}' is not a declared argument")]
    UndeclaredArgument(String),
    #[error("Expected {expected} argument value(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Exp,
    Ln,
    Log10,
    Sqrt,
    Abs,
    Tanh,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "tanh" => Func::Tanh,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }

    fn apply(self, a: &[f64]) -> f64 {
        match self {
            Func::Exp => a[0].exp(),
            Func::Ln => a[0].ln(),
            Func::Log10 => a[0].log10(),
            Func::Sqrt => a[0].sqrt(),
            Func::Abs => a[0].abs(),
            Func::Tanh => a[0].tanh(),
            Func::Min => a[0].min(a[1]),
            Func::Max => a[0].max(a[1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    Arg(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, args: &[f64]) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::Arg(i) => args[*i],
            Node::Neg(inner) => -inner.eval(args),
            Node::Binary(op, lhs, rhs) => {
                let (l, r) = (lhs.eval(args), rhs.eval(args));
                match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Pow => l.powf(r),
                }
            }
            Node::Call(func, params) => {
                let values: Vec<f64> = params.iter().map(|p| p.eval(args)).collect();
                func.apply(&values)
            }
        }
    }
}

/// A parsed expression equation.
///
/// Formal arguments are either declared explicitly or, by default, the free
/// identifiers of the expression in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    arguments: Vec<String>,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Self::build(source, None)
    }

    /// Parses with a fixed argument list. Every identifier must be declared;
    /// declared arguments the body never reads are kept.
    pub fn with_arguments(arguments: Vec<String>, source: &str) -> Result<Self, ExpressionError> {
        Self::build(source, Some(arguments))
    }

    fn build(source: &str, declared: Option<Vec<String>>) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let fixed = declared.is_some();
        let mut parser = Parser { tokens, pos: 0, arguments: declared.unwrap_or_default(), fixed };
        let root = parser.expression()?;
        if let Some((pos, tok)) = parser.tokens.get(parser.pos) {
            return Err(ExpressionError::UnexpectedToken { pos: *pos, found: tok.describe() });
        }
        Ok(Self { source: source.trim().to_string(), arguments: parser.arguments, root })
    }
}

impl Equation for Expression {
    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn evaluate(&self, args: &[f64]) -> Result<f64, ExpressionError> {
        if args.len() != self.arguments.len() {
            return Err(ExpressionError::ArgumentCount { expected: self.arguments.len(), found: args.len() });
        }
        Ok(self.root.eval(args))
    }

    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }
}

// --- Lexing ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => v.to_string(),
            Token::Ident(s) => s.clone(),
            Token::Op(c) => c.to_string(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push((pos, Token::Op(ch)));
                i += 1;
            }
            '(' => { tokens.push((pos, Token::LParen)); i += 1; }
            ')' => { tokens.push((pos, Token::RParen)); i += 1; }
            ',' => { tokens.push((pos, Token::Comma)); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                // Scientific notation: 1e-3, 2.5E+4
                if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].1.is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let value = text.parse::<f64>().map_err(|_| ExpressionError::UnexpectedToken { pos, found: text.clone() })?;
                tokens.push((pos, Token::Number(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                tokens.push((pos, Token::Ident(text)));
            }
            _ => return Err(ExpressionError::UnexpectedChar { pos, ch }),
        }
    }
    Ok(tokens)
}

// --- Parsing (recursive descent) ---

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    arguments: Vec<String>,
    fixed: bool,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<(usize, Token), ExpressionError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let (pos, tok) = self.next()?;
        if tok == expected {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken { pos, found: tok.describe() })
        }
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            let op = if c == '+' { BinOp::Add } else { BinOp::Sub };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            let op = if c == '*' { BinOp::Mul } else { BinOp::Div };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// unary := '-' unary | power
    fn unary(&mut self) -> Result<Node, ExpressionError> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            return Ok(Node::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    /// power := atom ('^' unary)?   (right associative)
    fn power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node, ExpressionError> {
        let (pos, tok) = self.next()?;
        match tok {
            Token::Number(v) => Ok(Node::Const(v)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => self.call(name),
            Token::Ident(name) => self.argument(name).map(Node::Arg),
            other => Err(ExpressionError::UnexpectedToken { pos, found: other.describe() }),
        }
    }

    fn call(&mut self, name: String) -> Result<Node, ExpressionError> {
        let func = Func::lookup(&name).ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            params.push(self.expression()?);
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                params.push(self.expression()?);
            }
        }
        self.expect(Token::RParen)?;
        if params.len() != func.arity() {
            return Err(ExpressionError::FunctionArity { name, expected: func.arity(), found: params.len() });
        }
        Ok(Node::Call(func, params))
    }

    fn argument(&mut self, name: String) -> Result<usize, ExpressionError> {
        if let Some(idx) = self.arguments.iter().position(|a| *a == name) {
            return Ok(idx);
        }
        if self.fixed {
            return Err(ExpressionError::UndeclaredArgument(name));
        }
        self.arguments.push(name);
        Ok(self.arguments.len() - 1)
    }
}
