//! The compiler targeting the fuzzer's intermediate language.
//!
//! This crate lowers a JavaScript syntax tree (produced by an external
//! parser, see `librjsil_syntax`) into a flat sequence of IL instructions
//! suitable for mutation by the downstream fuzzing engine. The pipeline is
//! a single pass: a hoisting analysis runs over every function body just
//! before that body is translated, and the translator emits instructions
//! in one forward sweep. There is no optimization and no serialization
//! here; the finished [`program::Program`] is handed to an external
//! serializer.

extern crate bit_set;
extern crate bit_vec;
extern crate librjsil_syntax;
#[macro_use]
extern crate log;

#[macro_use]
mod error;

pub mod builtins;
pub mod hoisting;
pub mod il;
pub mod program;
pub mod tracker;
pub mod translator;
pub mod validate;

pub use self::error::{CompileError, CompileResult};
pub use self::tracker::CompilerOptions;
pub use self::translator::{compile_program, compile_statements};
