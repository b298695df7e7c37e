//! Glogg – a small declarative fact language with a reactive runtime.
//!
//! A Glogg program is a sequence of queries over tagged records with named,
//! typed attributes and logic variables. Unconditional `commit` blocks
//! assert facts; `search` blocks followed by `bind`/`commit` describe rules
//! that fire whenever the fact set changes, joining their search patterns
//! against the full working set and producing new records — optionally
//! routed to a named integration such as the terminal sink.
//!
//! ## Modules
//! * [`parse`] – the backtracking parser-combinator engine (primitives,
//!   sequencing, alternation with longest-partial-match errors, repetition,
//!   the kept side-channel and zero-width lookahead).
//! * [`grammar`] – atoms, records and queries built on the engine, plus the
//!   whole-program driver.
//! * [`ast`] – the query AST and its source formatting.
//! * [`codegen`] – the compiler lowering queries to a versioned imperative
//!   IR, and the pluggable renderers (JavaScript today).
//! * [`runtime`] – the fact store (commit with structural dedup, change
//!   listeners settled round-by-round to a fixed point), integrations, and
//!   the in-process evaluator for compiled programs.
//! * [`persist`] – the SQLite store that keeps parsed queries and the
//!   integration registry so a program can be edited and remade.
//!
//! ## Quick Start
//! ```
//! use glogg::runtime::{self, FactStore};
//! use glogg::{codegen, grammar};
//!
//! let queries = grammar::parse_program(
//!     r#"commit: [ #person name: "Robin" role: "developer" ]"#,
//! ).unwrap();
//! let program = codegen::compile(&queries, &[]).unwrap();
//! let mut store = FactStore::new();
//! runtime::run(&program, &mut store).unwrap();
//! assert_eq!(store.facts().len(), 1);
//! ```

pub mod ast;
pub mod codegen;
pub mod error;
pub mod grammar;
pub mod parse;
pub mod persist;
pub mod runtime;
