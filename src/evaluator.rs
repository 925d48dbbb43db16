use crate::environment::{EnvError, Environment};
use crate::frame::Frame;
use crate::primitives;
use crate::types::{Cell, Operator, Procedure};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// How many operands a form accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Between(min, max) => write!(f, "between {} and {}", min, max),
        }
    }
}

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("Cannot evaluate an empty expression")]
    EmptyExpression,
    #[error("Expected an operator or procedure, but got: {found}")]
    NotCallable { found: String },
    #[error("'{operator}' expects a pair, but got a {found}")]
    NotAPair {
        operator: &'static str,
        found: &'static str,
    },
    #[error("'{operator}' was given an empty list")]
    EmptyOperand { operator: &'static str },
    #[error("'{operator}' expects {expected} operands, got {found}")]
    ArityMismatch {
        operator: &'static str,
        expected: Arity,
        found: usize,
    },
    #[error("Division by zero")]
    DivideByZero,
    #[error("'{operator}' expects {expected}, but got a {found}")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'if' test was false and there is no else branch")]
    MissingElseBranch,
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl EvalError {
    pub fn is_unbound_symbol(&self) -> bool {
        matches!(self, EvalError::Env(EnvError::UnboundSymbol(_)))
    }

    pub fn is_reserved_name(&self) -> bool {
        matches!(self, EvalError::Env(EnvError::ReservedName(_)))
    }

    pub fn is_duplicate_definition(&self) -> bool {
        matches!(self, EvalError::Env(EnvError::DuplicateDefinition(_)))
    }
}

// Result type alias for convenience
pub type EvalResult<T = Cell> = Result<T, EvalError>;

// Checks the number of operands
macro_rules! check_arity {
    // Variant for minimum number of operands
    ($args:expr, min $expected:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err($crate::evaluator::EvalError::ArityMismatch {
                operator: $name,
                expected: $crate::evaluator::Arity::AtLeast($expected),
                found: $args.len(),
            });
        }
    };
    // Variant for range of operands (inclusive)
    ($args:expr, $min:expr, $max:expr, $name:expr) => {
        if !($min..=$max).contains(&$args.len()) {
            return Err($crate::evaluator::EvalError::ArityMismatch {
                operator: $name,
                expected: $crate::evaluator::Arity::Between($min, $max),
                found: $args.len(),
            });
        }
    };
    ($args:expr, $expected:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err($crate::evaluator::EvalError::ArityMismatch {
                operator: $name,
                expected: $crate::evaluator::Arity::Exactly($expected),
                found: $args.len(),
            });
        }
    };
}

pub(crate) use check_arity;

/// Collects the elements of an operand list, which must be nil or a proper
/// chain of pairs.
pub(crate) fn operands<'a>(args: &'a Cell, operator: &'static str) -> EvalResult<Vec<&'a Cell>> {
    let mut items = args.iter();
    let collected: Vec<&Cell> = items.by_ref().collect();
    match items.tail() {
        Cell::Nil => Ok(collected),
        tail => Err(EvalError::NotAPair {
            operator,
            found: tail.type_name(),
        }),
    }
}

/// Operators are dispatch tags, not data: they may pass through an
/// expression but never land in a frame or a pair.
pub(crate) fn check_storable(value: &Cell, operator: &'static str) -> EvalResult<()> {
    match value {
        Cell::Operator(_) => Err(EvalError::TypeMismatch {
            operator,
            expected: "a storable value",
            found: value.type_name(),
        }),
        _ => Ok(()),
    }
}

// --- Evaluate Function ---

/// Evaluates a top-level expression within the given environment.
///
/// Nil is rejected here: at an entry point there is no operation to dispatch.
/// Everywhere else nil is an ordinary value.
pub fn evaluate<F: Frame>(expr: &Cell, env: &mut Environment<F>) -> EvalResult {
    match expr {
        Cell::Nil => Err(EvalError::EmptyExpression),
        _ => eval_operand(expr, env),
    }
}

/// Evaluates an expression in operand position.
pub(crate) fn eval_operand<F: Frame>(expr: &Cell, env: &mut Environment<F>) -> EvalResult {
    trace!(kind = expr.type_name(), depth = env.depth(), "evaluate");

    match expr {
        // 1. Self-evaluating values
        Cell::Nil
        | Cell::Integer(_)
        | Cell::Double(_)
        | Cell::Operator(_)
        | Cell::Procedure(_) => Ok(expr.clone()),

        // 2. Symbols: reserved names become operators, the rest are looked up
        Cell::Symbol(name) => match Operator::from_name(name) {
            Some(op) => Ok(Cell::Operator(op)),
            None => Ok(env.lookup(name)?),
        },

        // 3. Pairs are call forms; the operands go to the callee unevaluated
        Cell::Pair(head, rest) => {
            let callee = evaluate(head, env)?;
            call(&callee, rest, env)
        }
    }
}

fn call<F: Frame>(callee: &Cell, args: &Cell, env: &mut Environment<F>) -> EvalResult {
    match callee {
        Cell::Operator(op) => primitives::dispatch(*op, args, env),
        Cell::Procedure(procedure) => apply_procedure(procedure, Arguments::Unevaluated(args), env),
        other => Err(EvalError::NotCallable {
            found: other.to_string(),
        }),
    }
}

/// What a procedure is being applied to.
pub(crate) enum Arguments<'a> {
    /// Operand expressions, evaluated in the caller's environment before the
    /// procedure's frame is pushed.
    Unevaluated(&'a Cell),
    /// Values that are bound as they are (the `apply` path).
    Evaluated(Vec<Cell>),
}

impl Arguments<'_> {
    fn len(&self) -> EvalResult<usize> {
        match self {
            Arguments::Unevaluated(args) => Ok(operands(args, "procedure")?.len()),
            Arguments::Evaluated(values) => Ok(values.len()),
        }
    }

    fn into_values<F: Frame>(self, env: &mut Environment<F>) -> EvalResult<Vec<Cell>> {
        match self {
            Arguments::Unevaluated(args) => operands(args, "procedure")?
                .into_iter()
                .map(|arg| eval_operand(arg, env))
                .collect(),
            Arguments::Evaluated(values) => Ok(values),
        }
    }
}

/// Applies a procedure: binds its formals into a fresh frame, evaluates the
/// body in order inside that frame and returns the last value.
pub(crate) fn apply_procedure<F: Frame>(
    procedure: &Procedure,
    args: Arguments<'_>,
    env: &mut Environment<F>,
) -> EvalResult {
    let frame = bind_formals(&procedure.formals, args, env)?;
    debug!(bindings = frame.len(), depth = env.depth(), "applying procedure");

    let mut scope = env.push_frame(frame);
    let mut result = Cell::Nil;
    for expr in &procedure.body {
        result = eval_operand(expr, &mut *scope)?;
    }
    Ok(result)
}

fn bind_formals<F: Frame>(
    formals: &Cell,
    args: Arguments<'_>,
    env: &mut Environment<F>,
) -> EvalResult<F> {
    let mut frame = F::default();
    match formals {
        Cell::Nil => {
            let found = args.len()?;
            if found != 0 {
                return Err(EvalError::ArityMismatch {
                    operator: "procedure",
                    expected: Arity::Exactly(0),
                    found,
                });
            }
        }
        // Variadic: the whole argument list under one name
        Cell::Symbol(name) => {
            check_formal_name(name)?;
            let values = args.into_values(env)?;
            for value in &values {
                check_storable(value, "procedure")?;
            }
            frame.insert(name.clone(), Cell::list(values));
        }
        Cell::Pair(_, _) => {
            let names = formal_names(formals)?;
            let found = args.len()?;
            if names.len() != found {
                return Err(EvalError::ArityMismatch {
                    operator: "procedure",
                    expected: Arity::Exactly(names.len()),
                    found,
                });
            }
            let values = args.into_values(env)?;
            for (name, value) in names.into_iter().zip(values) {
                check_storable(&value, "procedure")?;
                frame.insert(name.to_string(), value);
            }
        }
        other => {
            return Err(EvalError::TypeMismatch {
                operator: "lambda",
                expected: "nil, a symbol or a list of symbols as formals",
                found: other.type_name(),
            });
        }
    }
    Ok(frame)
}

fn formal_names(formals: &Cell) -> EvalResult<Vec<&str>> {
    let mut names: Vec<&str> = Vec::new();
    for formal in operands(formals, "lambda")? {
        let name = match formal {
            Cell::Symbol(name) => name.as_str(),
            other => {
                return Err(EvalError::TypeMismatch {
                    operator: "lambda",
                    expected: "a symbol as formal",
                    found: other.type_name(),
                });
            }
        };
        check_formal_name(name)?;
        if names.contains(&name) {
            return Err(EnvError::DuplicateDefinition(name.to_string()).into());
        }
        names.push(name);
    }
    Ok(names)
}

fn check_formal_name(name: &str) -> EvalResult<()> {
    if Operator::is_reserved(name) {
        return Err(EnvError::ReservedName(name.to_string()).into());
    }
    Ok(())
}
