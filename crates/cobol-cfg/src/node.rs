//! Statement Nodes
//!
//! The builder is driven by Enter/Exit notifications over statement and
//! header nodes. A node carries a [`NodeKind`] with the payload the graph
//! needs (GOTO targets, PERFORM ranges, ALTER clauses); blocks only keep a
//! [`NodeTag`], the payload-free classification of that kind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Node identifier, unique within one compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Source location of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset past the last character
    pub end: usize,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A reference to a section or paragraph, with its IN/OF qualifier chain.
///
/// Qualifiers are ordered innermost first: `P IN S` has name `P` and
/// qualifiers `[S]`. Comparison is case-insensitive, as in COBOL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<String>,
}

impl SymbolRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualifiers: Vec::new(),
        }
    }

    /// Add an enclosing qualifier (`self IN qualifier`)
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    pub fn is_qualified(&self) -> bool {
        !self.qualifiers.is_empty()
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for qualifier in &self.qualifiers {
            write!(f, " IN {}", qualifier)?;
        }
        Ok(())
    }
}

/// One `ALTER altered TO PROCEED TO target` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterClause {
    pub altered: SymbolRef,
    pub target: SymbolRef,
}

/// Shape of a GO TO statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Goto {
    /// `GO TO L`; ALTER may add further targets later
    Simple { target: SymbolRef },
    /// `GO TO L1 L2 ... DEPENDING ON X`; falls through when no target applies
    Conditional { targets: Vec<SymbolRef> },
}

impl Goto {
    pub fn is_simple(&self) -> bool {
        matches!(self, Goto::Simple { .. })
    }
}

/// How an in-line PERFORM repeats its body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Iteration {
    /// Bare `PERFORM ... END-PERFORM`: body runs once
    #[default]
    Once,
    /// `PERFORM n TIMES`
    Times,
    /// `PERFORM UNTIL cond`
    Until,
    /// `PERFORM VARYING ...`
    Varying,
}

impl Iteration {
    pub fn is_iterative(&self) -> bool {
        !matches!(self, Iteration::Once)
    }
}

/// Statements that end the run unit or program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingKind {
    StopRun,
    ExitProgram,
    ExitMethod,
    Goback,
}

/// Exception condition clauses attached to I/O and arithmetic statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    AtEnd,
    NotAtEnd,
    AtEndOfPage,
    NotAtEndOfPage,
    OnException,
    NotOnException,
    OnOverflow,
    NotOnOverflow,
    InvalidKey,
    NotInvalidKey,
    OnSizeError,
    NotOnSizeError,
}

/// Ordinary verbs: no effect on control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Accept,
    Add,
    Cancel,
    Close,
    Compute,
    Continue,
    Delete,
    Display,
    Divide,
    Entry,
    Exec,
    Initialize,
    Inspect,
    Invoke,
    Merge,
    Move,
    Multiply,
    Open,
    Read,
    Release,
    Return,
    Rewrite,
    Set,
    Sort,
    Start,
    String,
    Subtract,
    Unstring,
    Use,
    Write,
    XmlGenerate,
    XmlParse,
}

/// Every node kind the builder reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Program { name: String },
    Function { name: String },
    ProcedureDivision,
    Declaratives,
    Section { name: String },
    Paragraph { name: String },

    If,
    Else,
    Evaluate,
    When,
    WhenOther,
    Search,
    WhenSearch,

    Alter { clauses: Vec<AlterClause> },
    Exit,
    Goto(Goto),
    NextSentence,
    PerformProcedure {
        procedure: SymbolRef,
        through: Option<SymbolRef>,
    },
    PerformLoop {
        iteration: Iteration,
        test_after: bool,
    },

    Ending(EndingKind),
    Condition(ConditionKind),

    Call { program: Option<String> },
    Statement(Verb),
}

impl NodeKind {
    /// Payload-free classification stored in blocks
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Program { .. } => NodeTag::Program,
            NodeKind::Function { .. } => NodeTag::Function,
            NodeKind::ProcedureDivision => NodeTag::ProcedureDivision,
            NodeKind::Declaratives => NodeTag::Declaratives,
            NodeKind::Section { .. } => NodeTag::Section,
            NodeKind::Paragraph { .. } => NodeTag::Paragraph,
            NodeKind::If => NodeTag::If,
            NodeKind::Else => NodeTag::Else,
            NodeKind::Evaluate => NodeTag::Evaluate,
            NodeKind::When => NodeTag::When,
            NodeKind::WhenOther => NodeTag::WhenOther,
            NodeKind::Search => NodeTag::Search,
            NodeKind::WhenSearch => NodeTag::WhenSearch,
            NodeKind::Alter { .. } => NodeTag::Alter,
            NodeKind::Exit => NodeTag::Exit,
            NodeKind::Goto(Goto::Simple { .. }) => NodeTag::GotoSimple,
            NodeKind::Goto(Goto::Conditional { .. }) => NodeTag::GotoConditional,
            NodeKind::NextSentence => NodeTag::NextSentence,
            NodeKind::PerformProcedure { .. } => NodeTag::PerformProcedure,
            NodeKind::PerformLoop { .. } => NodeTag::PerformLoop,
            NodeKind::Ending(kind) => NodeTag::Ending(*kind),
            NodeKind::Condition(kind) => NodeTag::Condition(*kind),
            NodeKind::Call { .. } => NodeTag::Call,
            NodeKind::Statement(verb) => NodeTag::Statement(*verb),
        }
    }
}

/// Coarse role of a node in control flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    /// Opens a multi-branch construct
    Decision,
    /// Transfers control to a named procedure or sentence
    ProcedureBranching,
    /// Terminates the program
    Ending,
    /// Appends to the current block
    Ordinary,
    /// Clause of an enclosing decision or statement
    Clause,
    /// Program, division, section or paragraph header
    Header,
}

/// Kind of an instruction, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Program,
    Function,
    ProcedureDivision,
    Declaratives,
    Section,
    Paragraph,
    If,
    Else,
    Evaluate,
    When,
    WhenOther,
    Search,
    WhenSearch,
    Alter,
    Exit,
    GotoSimple,
    GotoConditional,
    NextSentence,
    PerformProcedure,
    PerformLoop,
    Ending(EndingKind),
    Condition(ConditionKind),
    Call,
    Statement(Verb),
}

impl NodeTag {
    pub fn class(&self) -> StatementClass {
        use NodeTag::*;

        match self {
            Program | Function | ProcedureDivision | Declaratives | Section | Paragraph => {
                StatementClass::Header
            }
            If | Evaluate | Search | PerformLoop => StatementClass::Decision,
            Alter | Exit | GotoSimple | GotoConditional | NextSentence | PerformProcedure => {
                StatementClass::ProcedureBranching
            }
            Ending(_) => StatementClass::Ending,
            Else | When | WhenOther | WhenSearch | Condition(_) => StatementClass::Clause,
            Call | Statement(_) => StatementClass::Ordinary,
        }
    }

    /// Whether this node opens a sentence when none is open.
    ///
    /// ELSE counts as a statement; WHEN clauses and exception conditions
    /// do not, since they never appear at the head of a sentence.
    pub fn is_statement(&self) -> bool {
        match self.class() {
            StatementClass::Decision
            | StatementClass::ProcedureBranching
            | StatementClass::Ending
            | StatementClass::Ordinary => true,
            StatementClass::Clause => matches!(self, NodeTag::Else),
            StatementClass::Header => false,
        }
    }

    /// Display name used by the exporters
    pub fn name(&self) -> &'static str {
        use NodeTag::*;

        match self {
            Program => "Program",
            Function => "Function",
            ProcedureDivision => "ProcedureDivision",
            Declaratives => "Declaratives",
            Section => "Section",
            Paragraph => "Paragraph",
            If => "If",
            Else => "Else",
            Evaluate => "Evaluate",
            When => "When",
            WhenOther => "WhenOther",
            Search => "Search",
            WhenSearch => "WhenSearch",
            Alter => "Alter",
            Exit => "Exit",
            GotoSimple | GotoConditional => "Goto",
            NextSentence => "NextSentence",
            PerformProcedure => "PerformProcedure",
            PerformLoop => "Perform",
            Ending(EndingKind::StopRun) => "Stop",
            Ending(EndingKind::ExitProgram) => "ExitProgram",
            Ending(EndingKind::ExitMethod) => "ExitMethod",
            Ending(EndingKind::Goback) => "Goback",
            Condition(ConditionKind::AtEnd) => "AtEnd",
            Condition(ConditionKind::NotAtEnd) => "NotAtEnd",
            Condition(ConditionKind::AtEndOfPage) => "AtEndOfPage",
            Condition(ConditionKind::NotAtEndOfPage) => "NotAtEndOfPage",
            Condition(ConditionKind::OnException) => "OnException",
            Condition(ConditionKind::NotOnException) => "NotOnException",
            Condition(ConditionKind::OnOverflow) => "OnOverflow",
            Condition(ConditionKind::NotOnOverflow) => "NotOnOverflow",
            Condition(ConditionKind::InvalidKey) => "InvalidKey",
            Condition(ConditionKind::NotInvalidKey) => "NotInvalidKey",
            Condition(ConditionKind::OnSizeError) => "OnSizeError",
            Condition(ConditionKind::NotOnSizeError) => "NotOnSizeError",
            Call => "Call",
            Statement(verb) => verb.name(),
        }
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Verb {
    pub fn name(&self) -> &'static str {
        match self {
            Verb::Accept => "Accept",
            Verb::Add => "Add",
            Verb::Cancel => "Cancel",
            Verb::Close => "Close",
            Verb::Compute => "Compute",
            Verb::Continue => "Continue",
            Verb::Delete => "Delete",
            Verb::Display => "Display",
            Verb::Divide => "Divide",
            Verb::Entry => "Entry",
            Verb::Exec => "Exec",
            Verb::Initialize => "Initialize",
            Verb::Inspect => "Inspect",
            Verb::Invoke => "Invoke",
            Verb::Merge => "Merge",
            Verb::Move => "Move",
            Verb::Multiply => "Multiply",
            Verb::Open => "Open",
            Verb::Read => "Read",
            Verb::Release => "Release",
            Verb::Return => "Return",
            Verb::Rewrite => "Rewrite",
            Verb::Set => "Set",
            Verb::Sort => "Sort",
            Verb::Start => "Start",
            Verb::String => "String",
            Verb::Subtract => "Subtract",
            Verb::Unstring => "Unstring",
            Verb::Use => "Use",
            Verb::Write => "Write",
            Verb::XmlGenerate => "XmlGenerate",
            Verb::XmlParse => "XmlParse",
        }
    }
}

/// A node as seen by the builder
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: Span,
    /// Source text, used by full-instruction export
    pub text: Option<String>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            span: Span::default(),
            text: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_predicate() {
        assert!(NodeTag::If.is_statement());
        assert!(NodeTag::Else.is_statement());
        assert!(NodeTag::GotoSimple.is_statement());
        assert!(NodeTag::Statement(Verb::Move).is_statement());
        assert!(NodeTag::Ending(EndingKind::Goback).is_statement());

        assert!(!NodeTag::When.is_statement());
        assert!(!NodeTag::WhenSearch.is_statement());
        assert!(!NodeTag::Condition(ConditionKind::AtEnd).is_statement());
        assert!(!NodeTag::Paragraph.is_statement());
    }

    #[test]
    fn test_statement_classes() {
        assert_eq!(NodeTag::PerformProcedure.class(), StatementClass::ProcedureBranching);
        assert_eq!(NodeTag::Ending(EndingKind::StopRun).class(), StatementClass::Ending);
        assert_eq!(NodeTag::Call.class(), StatementClass::Ordinary);
        assert_eq!(NodeTag::Statement(Verb::Display).class(), StatementClass::Ordinary);
    }

    #[test]
    fn test_goto_tags() {
        let simple = NodeKind::Goto(Goto::Simple {
            target: SymbolRef::new("L"),
        });
        let conditional = NodeKind::Goto(Goto::Conditional {
            targets: vec![SymbolRef::new("A"), SymbolRef::new("B")],
        });
        assert_eq!(simple.tag(), NodeTag::GotoSimple);
        assert_eq!(conditional.tag(), NodeTag::GotoConditional);
        assert_eq!(conditional.tag().name(), "Goto");
    }

    #[test]
    fn test_symbol_ref_display() {
        let sym = SymbolRef::new("PARA-1").qualified("SECT-A");
        assert_eq!(sym.to_string(), "PARA-1 IN SECT-A");
        assert!(sym.is_qualified());
    }
}
