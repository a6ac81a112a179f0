//! Core of the SIMC Simula compiler.
//!
//! This crate holds the parts of the compiler that outlive a single run:
//!
//!   declaration tree (arena of kind-tagged nodes)
//!     -> checker    (prefixes, hidden/protected pairing, types)
//!     -> attribute file (object-graph codec over big-endian primitives)
//!     -> packaging + incremental class loading (hierarchy order)
//!
//! Separately compiled classes and procedures are read back from their
//! attribute files through [`session::CompilationSession`]. Front ends
//! and inspection tools (the `simc` CLI) depend on this crate rather than
//! on the file format.

// ---------------------------------------------------------------------
// Error handling, diagnostics and options
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;
pub mod options;

// ---------------------------------------------------------------------
// Declaration tree
// ---------------------------------------------------------------------

pub mod kind;
pub mod tree;
pub mod decl;
pub mod stmt;
pub mod expr;

// ---------------------------------------------------------------------
// Semantic layers: types, meaning resolution, checking
// ---------------------------------------------------------------------

pub mod types;
pub mod meaning;
pub mod checker;

// ---------------------------------------------------------------------
// Attribute files: primitives, object graph, file layout
// ---------------------------------------------------------------------

pub mod codec;
pub mod object_codec;
pub mod attribute_file;

// ---------------------------------------------------------------------
// Generated classes: hierarchy, loading, packaging, execution
// ---------------------------------------------------------------------

pub mod hierarchy;
pub mod loader;
pub mod library;
pub mod exec;

// ---------------------------------------------------------------------
// Session orchestration and tooling
// ---------------------------------------------------------------------

pub mod session;
pub mod pretty;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use attribute_file::{LoadedModule, read_attribute_file, write_attribute_file};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{CoreError, Result};
pub use hierarchy::{ClassHierarchy, ClassIdentity};
pub use kind::Kind;
pub use library::{AttributeDirectory, AttributeLibrary, MemoryPackage, Packager};
pub use options::CompilerOptions;
pub use session::CompilationSession;
pub use tree::{NodeData, NodeId, SyntaxTree};
pub use types::Type;
