//! A Java class-file decompiler: bytes in, Java-like source out.
//!
//! The pipeline runs class-file parsing (the `jloader` crate), bytecode
//! decoding ([`ops`]), symbolic lifting to expression trees ([`lift`]),
//! control-flow structuring ([`cfg`], [`structure`]), and pretty-printing
//! ([`emit`]), orchestrated per class by [`decompiler`].

/// Typed model of the recovered source.
pub mod ast;
/// Basic blocks, dominators, and loops over decoded bytecode.
pub mod cfg;
/// Driver, options, and the result document.
pub mod decompiler;
/// AST to Java text.
pub mod emit;
pub mod errors;
/// Stack-machine bytecode to expression trees.
pub mod lift;
/// [Instruction Set](https://docs.oracle.com/javase/specs/jvms/se17/jvms17.pdf#page=563)
pub mod ops;
/// Region recovery: `if`/`else`, loops, `switch`, `try`/`catch`.
pub mod structure;

pub use decompiler::{decompile_bytes, decompile_file, Diagnostic, Document, Options, Severity, Stats};
pub use errors::decompile::{DecompileCause, DecompileError};
