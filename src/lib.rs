//! # tagql
//!
//! A query and definition language for hierarchical, tag-addressed data.
//!
//! Modules are stored in a single in-memory tree. Each module carries a
//! set of tags, an optional payload and a list of nested modules. A
//! statement selects modules by matching a context expression against
//! the tag-sets on the path from the store's top level down to each
//! module, then creates, edits, prints or deletes the selected ones.
//!
//! ```no_run
//! use tagql::Composer;
//!
//! let mut composer = Composer::new();
//! composer.compose(
//!     "new garage; \
//!      in garage new car as red is json {\"wheels\": 4} end; \
//!      in garage/car get;",
//!     false,
//! ).unwrap();
//! ```
//!
//! Input can arrive in arbitrary chunks: [`Composer::compose`] with
//! `accept_carry` keeps an incomplete trailing statement and finishes it
//! on the next call, so a REPL or a socket can feed text as it comes.
//!
//! The crate is organized as a pipeline:
//!
//! - [`lexer`] — characters to tokens, with carry-over between chunks
//! - [`context`] — context-expression tokens to an operator tree
//! - [`parser`] — token streams to statement ASTs
//! - [`composer`] — ASTs interpreted against the module tree
//!
//! with [`value`] and [`tree`] providing the data model underneath.

pub mod ast;
pub mod composer;
pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod tree;
pub mod value;

pub use ast::{
    BinaryKind, CompareKind, ContextOp, ContextToken, DataFormat, Definition, ExprNode,
    OperationKind, Payload, SpecialKind, Statement, Terminal, Token, TokenKind, ValueKind,
};
pub use composer::Composer;
pub use error::{Error, Position, Result};
pub use lexer::{Lexer, Scan, StatementLexer};
pub use parser::{from_value, from_values, Parser};
pub use tree::{Step, Tree};
pub use value::Value;
