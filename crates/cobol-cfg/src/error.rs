//! Error types for graph construction
//!
//! [`CfgError`] values are diagnostics: the builder records them and keeps
//! going with a partial graph. [`GraphError`] reports a structurally broken
//! graph and is only produced by [`ControlFlowGraph::validate`](crate::graph::ControlFlowGraph::validate).

use crate::node::Span;
use thiserror::Error;

/// Semantic problems found while building a procedure division's graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfgError {
    /// Reference to a section or paragraph that does not exist
    #[error("Unknown section or paragraph '{name}'")]
    UnknownProcedure {
        /// Reference as written
        name: String,
        /// Location of the referencing statement
        span: Span,
    },

    /// Reference matching several sections or paragraphs
    #[error("Ambiguous reference to section or paragraph '{name}' ({candidates} candidates)")]
    AmbiguousProcedure {
        /// Reference as written
        name: String,
        /// Number of declarations it matches
        candidates: usize,
        /// Location of the referencing statement
        span: Span,
    },

    /// `PERFORM A THRU B` where B is declared before A
    #[error("PERFORM {from} THRU {through}: '{through}' is declared before '{from}'")]
    InvalidPerformRange {
        /// First procedure of the range
        from: String,
        /// Last procedure of the range
        through: String,
        /// Location of the PERFORM statement
        span: Span,
    },

    /// A performed range reaches the same block twice
    #[error("Recursive PERFORM of '{procedure}': block {block} is already part of the range")]
    RecursivePerform {
        /// Performed range
        procedure: String,
        /// Block met twice
        block: u32,
        /// Location of the PERFORM statement
        span: Span,
    },

    /// A block inside a performed range, other than the last one, jumps out of it
    #[error("PERFORM {procedure}: block {block} of '{tag}' branches outside the performed range")]
    BranchOutOfRange {
        /// Performed range
        procedure: String,
        /// Paragraph or section owning the offending block
        tag: String,
        /// Offending block
        block: u32,
        /// Location of the PERFORM statement
        span: Span,
    },

    /// `ALTER L ...` where L does not start with a simple GO TO
    #[error("ALTER of '{paragraph}': its first statement is not a simple GO TO")]
    MalformedAlter {
        /// Altered paragraph
        paragraph: String,
        /// Location of the ALTER statement
        span: Span,
    },
}

impl CfgError {
    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            CfgError::UnknownProcedure { .. } => "CFG001",
            CfgError::AmbiguousProcedure { .. } => "CFG002",
            CfgError::InvalidPerformRange { .. } => "CFG003",
            CfgError::RecursivePerform { .. } => "CFG004",
            CfgError::BranchOutOfRange { .. } => "CFG005",
            CfgError::MalformedAlter { .. } => "CFG006",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            CfgError::UnknownProcedure { span, .. }
            | CfgError::AmbiguousProcedure { span, .. }
            | CfgError::InvalidPerformRange { span, .. }
            | CfgError::RecursivePerform { span, .. }
            | CfgError::BranchOutOfRange { span, .. }
            | CfgError::MalformedAlter { span, .. } => *span,
        }
    }
}

/// Structural violations reported by graph validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("block {block} is stored at index {index}")]
    MisplacedBlock { block: u32, index: usize },

    #[error("block {block} refers to missing edge slot {edge}")]
    InvalidEdge { block: u32, edge: u32 },

    #[error("edge slot {edge} points at missing block {target}")]
    InvalidTarget { edge: u32, target: u32 },

    #[error("block {block} belongs to missing group {group}")]
    InvalidGroup { block: u32, group: u32 },

    #[error("root block {block} does not exist")]
    InvalidRoot { block: u32 },

    #[error("group {group} lists missing block {block}")]
    InvalidGroupMember { group: u32, block: u32 },
}
