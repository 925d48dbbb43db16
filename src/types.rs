use std::fmt; // For custom display formatting

/// The reserved primitive forms.
///
/// A symbol whose name matches one of these evaluates to the operator itself
/// instead of being resolved in the environment, so these names can never be
/// bound by `define`, `let` or a procedure's formals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    If,
    Ceiling,
    Sub,
    Mul,
    Div,
    Floor,
    Quote,
    Cons,
    Car,
    Cdr,
    Nullp,
    Define,
    LessThan,
    Not,
    Print,
    Eval,
    Lambda,
    Apply,
    Let,
    Intp,
    Doublep,
    Symbolp,
    Listp,
}

impl Operator {
    pub const ALL: [Operator; 24] = [
        Operator::Add,
        Operator::If,
        Operator::Ceiling,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Floor,
        Operator::Quote,
        Operator::Cons,
        Operator::Car,
        Operator::Cdr,
        Operator::Nullp,
        Operator::Define,
        Operator::LessThan,
        Operator::Not,
        Operator::Print,
        Operator::Eval,
        Operator::Lambda,
        Operator::Apply,
        Operator::Let,
        Operator::Intp,
        Operator::Doublep,
        Operator::Symbolp,
        Operator::Listp,
    ];

    /// The keyword this operator is spelled with.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::If => "if",
            Operator::Ceiling => "ceiling",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Floor => "floor",
            Operator::Quote => "quote",
            Operator::Cons => "cons",
            Operator::Car => "car",
            Operator::Cdr => "cdr",
            Operator::Nullp => "nullp",
            Operator::Define => "define",
            Operator::LessThan => "<",
            Operator::Not => "not",
            Operator::Print => "print",
            Operator::Eval => "eval",
            Operator::Lambda => "lambda",
            Operator::Apply => "apply",
            Operator::Let => "let",
            Operator::Intp => "intp",
            Operator::Doublep => "doublep",
            Operator::Symbolp => "symbolp",
            Operator::Listp => "listp",
        }
    }

    /// Looks up the operator spelled `name`, if it is a reserved keyword.
    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn is_reserved(name: &str) -> bool {
        Operator::from_name(name).is_some()
    }

    /// Forms that read some operands as unevaluated syntax (names, formals,
    /// binding lists, quoted data). These cannot be handed a list of values.
    pub fn takes_syntax(self) -> bool {
        matches!(
            self,
            Operator::Quote | Operator::Define | Operator::Lambda | Operator::Let
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A user-defined procedure: formals plus a body evaluated in order.
///
/// `formals` is nil (no parameters), a single symbol (bound to the whole
/// argument list) or a list of symbols (bound positionally).
#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub formals: Cell,
    pub body: Vec<Cell>,
}

impl Procedure {
    pub fn new(formals: Cell, body: Vec<Cell>) -> Self {
        Procedure { formals, body }
    }
}

/// The universal value type: every piece of code and data is a `Cell`.
///
/// Pairs own their children, so `clone` is a deep copy and a cloned value can
/// never alias the binding it was read from.
///
/// `Clone`, `PartialEq` and `Drop` walk the cdr spine in a loop and only
/// recurse into cars, so list length does not grow the call stack.
#[derive(Debug, Default)]
pub enum Cell {
    /// The empty list. There is exactly one way to spell it.
    #[default]
    Nil,
    Integer(i64),
    Double(f64),
    Symbol(String),
    Operator(Operator),
    Pair(Box<Cell>, Box<Cell>),
    Procedure(Box<Procedure>),
}

impl Cell {
    pub fn symbol(name: impl Into<String>) -> Self {
        Cell::Symbol(name.into())
    }

    pub fn cons(car: Cell, cdr: Cell) -> Self {
        Cell::Pair(Box::new(car), Box::new(cdr))
    }

    /// Builds a proper list, right-nested and terminated by nil.
    pub fn list(items: impl IntoIterator<Item = Cell>) -> Self {
        let items: Vec<Cell> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Cell::Nil, |tail, item| Cell::cons(item, tail))
    }

    pub fn procedure(formals: Cell, body: Vec<Cell>) -> Self {
        Cell::Procedure(Box::new(Procedure::new(formals, body)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Cell::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Cell::Pair(_, _))
    }

    pub fn car(&self) -> Option<&Cell> {
        match self {
            Cell::Pair(car, _) => Some(car),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Cell> {
        match self {
            Cell::Pair(_, cdr) => Some(cdr),
            _ => None,
        }
    }

    /// Iterates the cars of a pair chain. Once exhausted, `ListIter::tail`
    /// holds whatever ended the chain (nil for a proper list).
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Nil => "nil",
            Cell::Integer(_) => "integer",
            Cell::Double(_) => "double",
            Cell::Symbol(_) => "symbol",
            Cell::Operator(_) => "operator",
            Cell::Pair(_, _) => "pair",
            Cell::Procedure(_) => "procedure",
        }
    }
}

pub struct ListIter<'a> {
    current: &'a Cell,
}

impl<'a> ListIter<'a> {
    pub fn tail(&self) -> &'a Cell {
        self.current
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Cell;

    fn next(&mut self) -> Option<&'a Cell> {
        match self.current {
            Cell::Pair(car, cdr) => {
                self.current = cdr;
                Some(car)
            }
            _ => None,
        }
    }
}

impl Clone for Cell {
    fn clone(&self) -> Self {
        match self {
            Cell::Nil => Cell::Nil,
            Cell::Integer(i) => Cell::Integer(*i),
            Cell::Double(d) => Cell::Double(*d),
            Cell::Symbol(s) => Cell::Symbol(s.clone()),
            Cell::Operator(op) => Cell::Operator(*op),
            Cell::Procedure(procedure) => Cell::Procedure(procedure.clone()),
            Cell::Pair(_, _) => {
                let mut items = self.iter();
                let cars: Vec<Cell> = items.by_ref().cloned().collect();
                // The tail is never a pair here
                let tail = items.tail().clone();
                cars.into_iter()
                    .rev()
                    .fold(tail, |cdr, car| Cell::cons(car, cdr))
            }
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            match (left, right) {
                (Cell::Pair(left_car, left_cdr), Cell::Pair(right_car, right_cdr)) => {
                    if left_car != right_car {
                        return false;
                    }
                    left = &**left_cdr;
                    right = &**right_cdr;
                }
                (Cell::Nil, Cell::Nil) => return true,
                (Cell::Integer(a), Cell::Integer(b)) => return a == b,
                (Cell::Double(a), Cell::Double(b)) => return a == b,
                (Cell::Symbol(a), Cell::Symbol(b)) => return a == b,
                (Cell::Operator(a), Cell::Operator(b)) => return a == b,
                (Cell::Procedure(a), Cell::Procedure(b)) => return a == b,
                _ => return false,
            }
        }
    }
}

impl Drop for Cell {
    fn drop(&mut self) {
        let Cell::Pair(_, cdr) = self else {
            return;
        };
        // Detach the spine one pair at a time; each dropped pair has a nil cdr
        let mut next = std::mem::take(&mut **cdr);
        while let Cell::Pair(_, cdr) = &mut next {
            let rest = std::mem::take(&mut **cdr);
            next = rest;
        }
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Integer(value.into())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Double(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::symbol(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Symbol(value)
    }
}

impl From<Operator> for Cell {
    fn from(value: Operator) -> Self {
        Cell::Operator(value)
    }
}

impl From<Procedure> for Cell {
    fn from(value: Procedure) -> Self {
        Cell::Procedure(Box::new(value))
    }
}

// s-expression notation, as written by `print`
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Nil => write!(f, "()"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Double(d) => write!(f, "{:.5}", d),
            Cell::Symbol(s) => write!(f, "{}", s),
            Cell::Operator(op) => write!(f, "#<operator:{}>", op),
            Cell::Procedure(_) => write!(f, "#<procedure>"),
            Cell::Pair(_, _) => {
                write!(f, "(")?;
                let mut items = self.iter();
                let mut first = true;
                for item in items.by_ref() {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                    first = false;
                }
                if !items.tail().is_nil() {
                    write!(f, " . {}", items.tail())?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Builds a `Cell` from s-expression shaped tokens.
///
/// Parenthesised groups become proper lists, `()` is nil, numeric literals
/// become integers or doubles, and every other token (identifiers as well as
/// `+`, `<` and friends) becomes a symbol. Negative numbers and dotted pairs
/// are not expressible inside a group; build those with `Cell::from` and
/// `Cell::cons`.
///
/// ```
/// use cellar::{cell, Cell};
///
/// let expr = cell!((+ 1 (* 2 3.5)));
/// assert_eq!(expr.to_string(), "(+ 1 (* 2 3.50000))");
/// assert_eq!(cell!(()), Cell::Nil);
/// ```
#[macro_export]
macro_rules! cell {
    (()) => {
        $crate::types::Cell::Nil
    };
    (( $($item:tt)+ )) => {
        $crate::types::Cell::list([$($crate::cell!($item)),+])
    };
    // A lone `-` would otherwise start a negative literal
    (-) => {
        $crate::types::Cell::symbol("-")
    };
    ($lit:literal) => {
        $crate::types::Cell::from($lit)
    };
    ($other:tt) => {
        $crate::types::Cell::symbol(stringify!($other))
    };
}
