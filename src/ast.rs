//! # tagql — Abstract Syntax Tree
//!
//! Types shared across the lexing/parsing/composition pipeline:
//!
//! - **[tokens]** - Lexical tokens and their context-expression
//!   re-classification
//! - **[expressions]** - Context-expression tree nodes
//! - **[statements]** - Statement and definition nodes, plus canonical
//!   serialization
//!
//! ## Core concepts
//!
//! A statement selects modules with a context expression and applies one
//! of four operations:
//!
//! ```text
//! in a & b new @none as c, d is json {"k": 1} end has { new @none as e; };
//! ```
//!
//! The `in` clause is evaluated against each module's *context* — the
//! ordered tag-sets from the store's top level down to the module. A
//! module is selected only when the match is *final*, i.e. it terminates
//! at the deepest level of that context: `a` alone selects module `a`,
//! `a/b` selects `b` underneath it.

pub mod expressions;
pub mod statements;
pub mod tokens;

pub use expressions::{BinaryKind, CompareKind, ExprNode, SpecialKind, ValueKind};
pub use statements::{DataFormat, Definition, OperationKind, Payload, Statement};
pub use tokens::{ContextOp, ContextToken, Terminal, Token, TokenKind};
