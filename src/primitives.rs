use crate::evaluator::{
    Arguments, apply_procedure, check_arity, check_storable, eval_operand, evaluate, operands,
};
use crate::{Cell, Environment, EvalError, EvalResult, Frame, Operator, Procedure};

/// Runs the builtin `operator` on its unevaluated operand list.
///
/// Each builtin decides for itself which operands to evaluate and when,
/// which is what lets `quote`, `if`, `define`, `lambda` and `let` work.
pub fn dispatch<F: Frame>(operator: Operator, args: &Cell, env: &mut Environment<F>) -> EvalResult {
    match operator {
        Operator::Add => prim_add(args, env),
        Operator::Sub => prim_sub(args, env),
        Operator::Mul => prim_mul(args, env),
        Operator::Div => prim_div(args, env),
        Operator::If => prim_if(args, env),
        Operator::Ceiling => prim_ceiling(args, env),
        Operator::Floor => prim_floor(args, env),
        Operator::Quote => prim_quote(args),
        Operator::Cons => prim_cons(args, env),
        Operator::Car => prim_car(args, env),
        Operator::Cdr => prim_cdr(args, env),
        Operator::Nullp => prim_is_null(args, env),
        Operator::Define => prim_define(args, env),
        Operator::LessThan => prim_less_than(args, env),
        Operator::Not => prim_not(args, env),
        Operator::Print => prim_print(args, env),
        Operator::Eval => prim_eval(args, env),
        Operator::Lambda => prim_lambda(args),
        Operator::Apply => prim_apply(args, env),
        Operator::Let => prim_let(args, env),
        Operator::Intp => prim_is_int(args, env),
        Operator::Doublep => prim_is_double(args, env),
        Operator::Symbolp => prim_is_symbol(args, env),
        Operator::Listp => prim_is_list(args, env),
    }
}

// --- Numbers ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }

    // Integer op Integer stays exact; a double on either side wins
    fn combine(self, other: Number, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(int_op(a, b)),
            _ => Number::Float(float_op(self.as_f64(), other.as_f64())),
        }
    }

    fn less_than(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a < b,
            _ => self.as_f64() < other.as_f64(),
        }
    }
}

impl From<Number> for Cell {
    fn from(number: Number) -> Self {
        match number {
            Number::Int(i) => Cell::Integer(i),
            Number::Float(f) => Cell::Double(f),
        }
    }
}

fn as_number(value: &Cell) -> Option<Number> {
    match value {
        Cell::Integer(i) => Some(Number::Int(*i)),
        Cell::Double(d) => Some(Number::Float(*d)),
        _ => None,
    }
}

fn expect_number(value: &Cell, operator: &'static str) -> EvalResult<Number> {
    as_number(value).ok_or(EvalError::TypeMismatch {
        operator,
        expected: "a number",
        found: value.type_name(),
    })
}

fn eval_number<F: Frame>(
    expr: &Cell,
    env: &mut Environment<F>,
    operator: &'static str,
) -> EvalResult<Number> {
    let value = eval_operand(expr, env)?;
    expect_number(&value, operator)
}

// Evaluates operands left to right, folding each into the accumulator as it arrives
fn fold_numbers<F: Frame>(
    start: Number,
    rest: &[&Cell],
    env: &mut Environment<F>,
    operator: &'static str,
    step: impl Fn(Number, Number) -> EvalResult<Number>,
) -> EvalResult {
    let mut acc = start;
    for expr in rest {
        let next = eval_number(expr, env, operator)?;
        acc = step(acc, next)?;
    }
    Ok(acc.into())
}

fn add(acc: Number, next: Number) -> EvalResult<Number> {
    Ok(acc.combine(next, i64::wrapping_add, |a, b| a + b))
}

fn sub(acc: Number, next: Number) -> EvalResult<Number> {
    Ok(acc.combine(next, i64::wrapping_sub, |a, b| a - b))
}

fn mul(acc: Number, next: Number) -> EvalResult<Number> {
    Ok(acc.combine(next, i64::wrapping_mul, |a, b| a * b))
}

fn div(acc: Number, next: Number) -> EvalResult<Number> {
    if next.is_zero() {
        return Err(EvalError::DivideByZero);
    }
    Ok(acc.combine(next, i64::wrapping_div, |a, b| a / b))
}

pub fn prim_add<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    let ops = operands(args, "+")?;
    fold_numbers(Number::Int(0), &ops, env, "+", add)
}

pub fn prim_mul<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (*) -> 1
    // (* 1 2 3) -> 6
    let ops = operands(args, "*")?;
    fold_numbers(Number::Int(1), &ops, env, "*", mul)
}

pub fn prim_sub<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (- x) -> -x
    // (- x y z) -> x - y - z
    let ops = operands(args, "-")?;
    check_arity!(ops, min 1, "-");
    let first = eval_number(ops[0], env, "-")?;
    if ops.len() == 1 {
        return Ok(match first {
            Number::Int(i) => Cell::Integer(i.wrapping_neg()),
            Number::Float(f) => Cell::Double(-f),
        });
    }
    fold_numbers(first, &ops[1..], env, "-", sub)
}

pub fn prim_div<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (/ x) -> 1/x, always a double
    // (/ x y z) -> x / y / z
    let ops = operands(args, "/")?;
    check_arity!(ops, min 1, "/");
    let first = eval_number(ops[0], env, "/")?;
    if ops.len() == 1 {
        if first.is_zero() {
            return Err(EvalError::DivideByZero);
        }
        return Ok(Cell::Double(1.0 / first.as_f64()));
    }
    fold_numbers(first, &ops[1..], env, "/", div)
}

pub fn prim_less_than<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (<) and (< x) are vacuously true; stops at the first non-increasing pair
    let ops = operands(args, "<")?;
    let Some((first, rest)) = ops.split_first() else {
        return Ok(Cell::Integer(1));
    };
    let mut previous = eval_number(first, env, "<")?;
    for expr in rest {
        let next = eval_number(expr, env, "<")?;
        if !previous.less_than(next) {
            return Ok(Cell::Integer(0));
        }
        previous = next;
    }
    Ok(Cell::Integer(1))
}

fn prim_round<F: Frame>(
    args: &Cell,
    env: &mut Environment<F>,
    operator: &'static str,
    round: fn(f64) -> f64,
) -> EvalResult {
    let ops = operands(args, operator)?;
    check_arity!(ops, 1, operator);
    match eval_number(ops[0], env, operator)? {
        Number::Int(i) => Ok(Cell::Integer(i)),
        Number::Float(f) => Ok(Cell::Integer(round(f) as i64)),
    }
}

pub fn prim_ceiling<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_round(args, env, "ceiling", f64::ceil)
}

pub fn prim_floor<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_round(args, env, "floor", f64::floor)
}

pub fn prim_not<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // Anything that is not a number counts as "not zero"
    let ops = operands(args, "not")?;
    check_arity!(ops, 1, "not");
    let value = eval_operand(ops[0], env)?;
    let is_zero = as_number(&value).is_some_and(Number::is_zero);
    Ok(Cell::Integer(is_zero as i64))
}

// --- Control ---

fn is_truthy(value: &Cell) -> EvalResult<bool> {
    match value {
        Cell::Integer(i) => Ok(*i != 0),
        Cell::Double(d) => Ok(*d != 0.0),
        Cell::Symbol(s) => Ok(!s.is_empty()),
        other => Err(EvalError::TypeMismatch {
            operator: "if",
            expected: "a number or symbol as test",
            found: other.type_name(),
        }),
    }
}

pub fn prim_if<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    let ops = operands(args, "if")?;
    check_arity!(ops, 2, 3, "if");
    let test = eval_operand(ops[0], env)?;
    if is_truthy(&test)? {
        eval_operand(ops[1], env)
    } else if let Some(alternate) = ops.get(2) {
        eval_operand(alternate, env)
    } else {
        Err(EvalError::MissingElseBranch)
    }
}

pub fn prim_quote(args: &Cell) -> EvalResult {
    // The operand comes back as written, never evaluated
    let ops = operands(args, "quote")?;
    check_arity!(ops, 1, "quote");
    Ok(ops[0].clone())
}

pub fn prim_eval<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (eval x): evaluate x, then run the result as code
    let ops = operands(args, "eval")?;
    check_arity!(ops, 1, "eval");
    let code = eval_operand(ops[0], env)?;
    evaluate(&code, env)
}

pub fn prim_print<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    let ops = operands(args, "print")?;
    check_arity!(ops, 1, "print");
    let value = eval_operand(ops[0], env)?;
    writeln!(env.output(), "{}", value).map_err(|e| EvalError::Output(e.to_string()))?;
    Ok(Cell::Nil)
}

// --- List Primitives ---

pub fn prim_cons<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (cons a b) -> (a . b)
    let ops = operands(args, "cons")?;
    check_arity!(ops, 2, "cons");
    let car = eval_operand(ops[0], env)?;
    let cdr = eval_operand(ops[1], env)?;
    check_storable(&car, "cons")?;
    check_storable(&cdr, "cons")?;
    Ok(Cell::cons(car, cdr))
}

fn eval_pair<F: Frame>(
    args: &Cell,
    env: &mut Environment<F>,
    operator: &'static str,
) -> EvalResult<(Cell, Cell)> {
    let ops = operands(args, operator)?;
    check_arity!(ops, 1, operator);
    let mut value = eval_operand(ops[0], env)?;
    match &mut value {
        Cell::Pair(car, cdr) => Ok((std::mem::take(&mut **car), std::mem::take(&mut **cdr))),
        Cell::Nil => Err(EvalError::EmptyOperand { operator }),
        other => Err(EvalError::NotAPair {
            operator,
            found: other.type_name(),
        }),
    }
}

pub fn prim_car<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    eval_pair(args, env, "car").map(|(car, _)| car)
}

pub fn prim_cdr<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    eval_pair(args, env, "cdr").map(|(_, cdr)| cdr)
}

// --- Type Predicates ---

fn prim_predicate<F: Frame>(
    args: &Cell,
    env: &mut Environment<F>,
    operator: &'static str,
    predicate: fn(&Cell) -> bool,
) -> EvalResult {
    let ops = operands(args, operator)?;
    check_arity!(ops, 1, operator);
    let value = eval_operand(ops[0], env)?;
    Ok(Cell::Integer(predicate(&value) as i64))
}

pub fn prim_is_null<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // Only the canonical nil is null; a pair of nils is still a pair
    prim_predicate(args, env, "nullp", Cell::is_nil)
}

pub fn prim_is_int<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_predicate(args, env, "intp", |value| matches!(value, Cell::Integer(_)))
}

pub fn prim_is_double<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_predicate(args, env, "doublep", |value| matches!(value, Cell::Double(_)))
}

pub fn prim_is_symbol<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_predicate(args, env, "symbolp", |value| matches!(value, Cell::Symbol(_)))
}

pub fn prim_is_list<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    prim_predicate(args, env, "listp", |value| {
        matches!(value, Cell::Nil | Cell::Pair(_, _))
    })
}

// --- Binding Forms ---

pub fn prim_define<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (define name expr): name is not evaluated, the binding is always global
    let ops = operands(args, "define")?;
    check_arity!(ops, 2, "define");
    let name = match ops[0] {
        Cell::Symbol(name) => name,
        other => {
            return Err(EvalError::TypeMismatch {
                operator: "define",
                expected: "a symbol as name",
                found: other.type_name(),
            });
        }
    };
    if Operator::is_reserved(name) {
        return Err(crate::EnvError::ReservedName(name.clone()).into());
    }
    if env.is_globally_bound(name) {
        return Err(crate::EnvError::DuplicateDefinition(name.clone()).into());
    }

    let value = eval_operand(ops[1], env)?;
    check_storable(&value, "define")?;
    env.define_global(name, value)?;
    Ok(Cell::Nil)
}

pub fn prim_lambda(args: &Cell) -> EvalResult {
    // (lambda formals body...): nothing is evaluated until the call
    let ops = operands(args, "lambda")?;
    check_arity!(ops, min 2, "lambda");
    let body = ops[1..].iter().map(|expr| (*expr).clone()).collect();
    Ok(Cell::procedure(ops[0].clone(), body))
}

// Symbols and pairs would be run as code by the builtin, so they go in quoted
fn quote_value(value: Cell) -> Cell {
    match value {
        Cell::Symbol(_) | Cell::Pair(_, _) => Cell::list([Cell::symbol("quote"), value]),
        other => other,
    }
}

pub fn prim_apply<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (apply f list): list elements are passed as values, not re-evaluated
    let ops = operands(args, "apply")?;
    check_arity!(ops, 2, "apply");
    let callee = eval_operand(ops[0], env)?;
    let arg_list = eval_operand(ops[1], env)?;
    let values: Vec<Cell> = operands(&arg_list, "apply")?
        .into_iter()
        .cloned()
        .collect();

    match &callee {
        Cell::Procedure(procedure) => {
            apply_procedure(procedure, Arguments::Evaluated(values), env)
        }
        // These read their operands as syntax, which a value list cannot supply
        Cell::Operator(op) if op.takes_syntax() => Err(EvalError::TypeMismatch {
            operator: "apply",
            expected: "a procedure or an operator that takes values",
            found: op.name(),
        }),
        Cell::Operator(op) => {
            let quoted = Cell::list(values.into_iter().map(quote_value));
            dispatch(*op, &quoted, env)
        }
        other => Err(EvalError::NotCallable {
            found: other.to_string(),
        }),
    }
}

pub fn prim_let<F: Frame>(args: &Cell, env: &mut Environment<F>) -> EvalResult {
    // (let ((name expr) ...) body...) == ((lambda (name ...) body...) expr ...)
    let ops = operands(args, "let")?;
    check_arity!(ops, min 1, "let");

    let mut names = Vec::new();
    let mut exprs = Vec::new();
    for binding in operands(ops[0], "let")? {
        let parts = operands(binding, "let")?;
        check_arity!(parts, 2, "let");
        names.push(parts[0].clone());
        exprs.push(parts[1].clone());
    }

    let body = ops[1..].iter().map(|expr| (*expr).clone()).collect();
    let procedure = Procedure::new(Cell::list(names), body);
    let exprs = Cell::list(exprs);
    apply_procedure(&procedure, Arguments::Unevaluated(&exprs), env)
}
