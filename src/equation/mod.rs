//! Equations attached to computed fields.
//!
//! The composition pipeline never calls an equation; it only asks for its
//! ordered formal argument names, which drive dependency classification.
//! Evaluation is exposed for the integrator that consumes the composed pool.

mod expr;

pub use expr::{Expression, ExpressionError};

use std::fmt;
use std::sync::Arc;

/// A pure function of named arguments.
pub trait Equation: fmt::Debug + Send + Sync {
    /// The formal argument names, in the order `evaluate` expects their values.
    fn arguments(&self) -> &[String];

    /// Evaluates the equation for scalar arguments given in `arguments()` order.
    fn evaluate(&self, args: &[f64]) -> Result<f64, ExpressionError>;

    /// Human-readable source, when the equation has one.
    fn source(&self) -> Option<&str> {
        None
    }
}

/// A shared handle to an equation.
///
/// Two handles are equal when they point at the same equation, or when both
/// carry identical source text over identical arguments.
#[derive(Clone)]
pub struct EquationRef(Arc<dyn Equation>);

impl EquationRef {
    pub fn new(equation: impl Equation + 'static) -> Self {
        Self(Arc::new(equation))
    }

    /// Wraps a closure whose formal arguments are declared up front.
    pub fn from_fn<I, S, F>(arguments: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(FnEquation::new(arguments, body))
    }

    /// Parses an expression whose arguments are its free identifiers.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self::new(Expression::parse(source)?))
    }

    pub fn arguments(&self) -> &[String] {
        self.0.arguments()
    }

    pub fn evaluate(&self, args: &[f64]) -> Result<f64, ExpressionError> {
        self.0.evaluate(args)
    }

    pub fn source(&self) -> Option<&str> {
        self.0.source()
    }
}

impl PartialEq for EquationRef {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.source(), other.source()) {
            (Some(a), Some(b)) => a == b && self.arguments() == other.arguments(),
            _ => false,
        }
    }
}

impl fmt::Debug for EquationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            Some(src) => write!(f, "Equation({:?} = {})", self.arguments(), src),
            None => write!(f, "Equation({:?})", self.arguments()),
        }
    }
}

/// A closure-backed equation for models defined in Rust.
pub struct FnEquation {
    arguments: Vec<String>,
    body: Box<dyn Fn(&[f64]) -> f64 + Send + Sync>,
}

impl FnEquation {
    pub fn new<I, S, F>(arguments: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            arguments: arguments.into_iter().map(Into::into).collect(),
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for FnEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEquation").field("arguments", &self.arguments).finish_non_exhaustive()
    }
}

impl Equation for FnEquation {
    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn evaluate(&self, args: &[f64]) -> Result<f64, ExpressionError> {
        if args.len() != self.arguments.len() {
            return Err(ExpressionError::ArgumentCount { expected: self.arguments.len(), found: args.len() });
        }
        Ok((self.body)(args))
    }
}
