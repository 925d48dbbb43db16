//! A small evaluator for fully parenthesised prefix expressions held as
//! cons cells.
//!
//! Programs are built as [`Cell`] trees (the [`cell!`] macro helps) and run
//! with [`evaluate`] against an [`Environment`].

pub mod environment;
pub mod evaluator;
pub mod frame;
pub mod primitives;
pub mod types;

pub use environment::{EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, evaluate};
pub use frame::{Frame, HashFrame, OrderedFrame};
pub use types::{Cell, Operator, Procedure};
