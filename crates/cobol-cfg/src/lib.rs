//! COBOL Control Flow Graphs
//!
//! This crate turns the statements of a COBOL procedure division into a
//! graph of basic blocks:
//! - **Builder**: event-driven construction from Enter/Exit notifications (`builder` module)
//! - **Graph**: arena of blocks and a shared edge pool (`graph` module)
//! - **Export**: Graphviz DOT and a plain text dump (`export` module)
//! - **Report**: static CALL report as CSV (`report` module)
//!
//! # Example
//!
//! ```rust
//! use cobol_cfg::{drive, CfgBuilder, CfgConfig, SourceTree};
//!
//! let tree = SourceTree::from_json(r#"{
//!     "programs": [{
//!         "name": "HELLO",
//!         "procedure_division": {
//!             "sentences": [[{ "kind": "statement", "verb": "display" }, { "kind": "stop_run" }]]
//!         }
//!     }]
//! }"#).unwrap();
//!
//! let mut builder = CfgBuilder::new(CfgConfig::default());
//! drive(&tree, &mut builder);
//! let programs = builder.finish();
//!
//! assert!(programs[0].diagnostics.is_empty());
//! assert!(cobol_cfg::to_dot(&programs[0].graph).starts_with("digraph Cfg {"));
//! ```

#![warn(rust_2018_idioms)]

/// Statement nodes and their classification
pub mod node;

/// Basic blocks, groups and the graph container
pub mod graph;

/// Section, paragraph and sentence catalog
pub mod procedure;

/// The graph builder
pub mod builder;

/// Build options
pub mod config;

/// Error types
pub mod error;

/// Diagnostic rendering
pub mod diagnostic;

/// Graph serializers
pub mod export;

/// Static call report
pub mod report;

/// Serialized statement trees
pub mod tree;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{CfgBuilder, ProgramCfg, ScopeKind};
pub use config::{BuildMode, CfgConfig, ConfigError, Lowering};
pub use error::{CfgError, GraphError};
pub use export::{dump, to_dot, DotWriter};
pub use graph::{BasicBlock, BlockFlags, BlockId, ControlFlowGraph};
pub use report::CallReport;
pub use tree::{drive, SourceTree};
