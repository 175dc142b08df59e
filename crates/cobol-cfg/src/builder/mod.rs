//! CFG Builder
//!
//! [`CfgBuilder`] listens to Enter/Exit notifications in source order and
//! builds one [`ControlFlowGraph`] per program or function. Nested and
//! stacked programs each get their own per-program builder; a nested
//! builder records its parent and hands control back to it on exit.
//!
//! # Example
//!
//! ```rust
//! use cobol_cfg::builder::CfgBuilder;
//! use cobol_cfg::config::CfgConfig;
//! use cobol_cfg::node::{Node, NodeId, NodeKind, Verb};
//!
//! let program = Node::new(NodeId(0), NodeKind::Program { name: "HELLO".into() });
//! let division = Node::new(NodeId(1), NodeKind::ProcedureDivision);
//! let display = Node::new(NodeId(2), NodeKind::Statement(Verb::Display));
//!
//! let mut builder = CfgBuilder::new(CfgConfig::default());
//! builder.enter(&program);
//! builder.enter(&division);
//! builder.enter(&display);
//! builder.exit(&display);
//! builder.end_sentence();
//! builder.exit(&division);
//! builder.exit(&program);
//!
//! let programs = builder.finish();
//! assert_eq!(programs[0].name, "HELLO");
//! assert!(programs[0].graph.is_initialized());
//! ```

mod branch;
mod decision;
mod graft;
mod program;
mod resolve;

pub use branch::{DeclarativesContext, MultiBranchContext};

use tracing::debug;

use crate::config::CfgConfig;
use crate::error::CfgError;
use crate::graph::ControlFlowGraph;
use crate::node::{Node, NodeKind};
use crate::procedure::ProcedureRegistry;
use program::ProgramBuilder;

/// Kind of scope owning a procedure division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
}

/// Finished graph of one program or function
#[derive(Debug, Clone)]
pub struct ProgramCfg {
    pub name: String,
    pub kind: ScopeKind,
    /// Index of the enclosing program in the builder's output
    pub parent: Option<usize>,
    pub graph: ControlFlowGraph,
    pub procedures: ProcedureRegistry,
    pub diagnostics: Vec<CfgError>,
}

/// Event-driven CFG builder for a compilation unit
pub struct CfgBuilder {
    config: CfgConfig,
    scopes: Vec<ProgramBuilder>,
    finished: Vec<Option<ProgramCfg>>,
}

impl CfgBuilder {
    pub fn new(config: CfgConfig) -> Self {
        Self {
            config,
            scopes: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn config(&self) -> &CfgConfig {
        &self.config
    }

    /// Notification before a node's children
    pub fn enter(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Program { name } => self.open_scope(name.clone(), ScopeKind::Program),
            NodeKind::Function { name } => self.open_scope(name.clone(), ScopeKind::Function),
            kind => {
                if self.scopes.is_empty() && *kind == NodeKind::ProcedureDivision {
                    self.open_scope(String::new(), ScopeKind::Program);
                }
                if let Some(scope) = self.scopes.last_mut() {
                    scope.enter(node);
                }
            }
        }
    }

    /// Notification after a node's children
    pub fn exit(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Program { .. } | NodeKind::Function { .. } => self.close_scope(),
            _ => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.exit(node);
                }
            }
        }
    }

    /// A period closed the current sentence
    pub fn end_sentence(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.end_sentence();
        }
    }

    /// All WHEN conditions of an EVALUATE clause have been entered
    pub fn start_when_condition_clause(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.start_when_condition_clause();
        }
    }

    /// The WHEN OTHER condition of an EVALUATE has been entered
    pub fn start_when_other_clause(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.start_when_other_clause();
        }
    }

    /// A WHEN (or, with `at_end`, the AT END) clause of a SEARCH begins
    pub fn start_when_search_condition_clause(&mut self, at_end: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.start_when_search_condition_clause(at_end);
        }
    }

    /// Close any open scope and return every program's graph in the order
    /// the programs were entered
    pub fn finish(mut self) -> Vec<ProgramCfg> {
        while !self.scopes.is_empty() {
            self.close_scope();
        }
        self.finished.into_iter().flatten().collect()
    }

    fn open_scope(&mut self, name: String, kind: ScopeKind) {
        let slot = self.finished.len();
        let parent = self.scopes.last().map(|s| s.slot);
        debug!(program = %name, ?kind, ?parent, "enter scope");
        self.finished.push(None);
        self.scopes.push(ProgramBuilder::new(name, kind, slot, parent, self.config.clone()));
    }

    fn close_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            debug_assert!(false, "scope exit without matching enter");
            return;
        };
        let slot = scope.slot;
        self.finished[slot] = Some(scope.into_program_cfg());
    }
}
