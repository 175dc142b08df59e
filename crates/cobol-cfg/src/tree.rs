//! Statement tree input
//!
//! A serialized description of the procedure divisions of a compilation
//! unit, and [`drive`], which replays it into a [`CfgBuilder`] the way a
//! parser would: Enter/Exit around every node in source order, the WHEN
//! clause notifications, and a sentence end after every sentence.
//!
//! ```json
//! { "programs": [ { "name": "HELLO", "procedure_division": {
//!     "sentences": [ [ { "kind": "statement", "verb": "display" } ] ] } } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::builder::CfgBuilder;
use crate::node::{
    AlterClause, ConditionKind, EndingKind, Goto, Iteration, Node, NodeId, NodeKind, Span, SymbolRef,
    Verb,
};

/// A compilation unit: programs and functions in source order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTree {
    #[serde(default)]
    pub programs: Vec<ProgramDef>,
}

impl SourceTree {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    #[default]
    Program,
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDef {
    pub name: String,
    #[serde(default)]
    pub kind: ProgramKind,
    #[serde(default)]
    pub procedure_division: Option<DivisionDef>,
    /// Programs contained in this one
    #[serde(default)]
    pub nested: Vec<ProgramDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DivisionDef {
    #[serde(default)]
    pub declaratives: Vec<SectionDef>,
    /// Sentences before the first header
    #[serde(default)]
    pub sentences: Vec<Vec<StmtNode>>,
    /// Paragraphs before the first section
    #[serde(default)]
    pub paragraphs: Vec<ParagraphDef>,
    #[serde(default)]
    pub sections: Vec<SectionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub sentences: Vec<Vec<StmtNode>>,
    #[serde(default)]
    pub paragraphs: Vec<ParagraphDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphDef {
    pub name: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub sentences: Vec<Vec<StmtNode>>,
}

/// A statement with its optional source text and location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StmtNode {
    #[serde(flatten)]
    pub stmt: Stmt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub span: Span,
}

impl From<Stmt> for StmtNode {
    fn from(stmt: Stmt) -> Self {
        Self {
            stmt,
            text: None,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    If {
        then: Vec<StmtNode>,
        #[serde(rename = "else", default)]
        otherwise: Option<Vec<StmtNode>>,
    },
    Evaluate {
        #[serde(default)]
        whens: Vec<WhenDef>,
        #[serde(default)]
        other: Option<Vec<StmtNode>>,
    },
    Search {
        #[serde(default)]
        at_end: Option<Vec<StmtNode>>,
        #[serde(default)]
        whens: Vec<WhenDef>,
    },
    Alter {
        clauses: Vec<AlterClause>,
    },
    Exit,
    /// `GO TO`; several targets or `depending` make it conditional
    GoTo {
        targets: Vec<SymbolRef>,
        #[serde(default)]
        depending: bool,
    },
    NextSentence,
    Perform {
        procedure: SymbolRef,
        #[serde(default)]
        through: Option<SymbolRef>,
    },
    PerformLoop {
        #[serde(default)]
        iteration: Iteration,
        #[serde(default)]
        test_after: bool,
        #[serde(default)]
        body: Vec<StmtNode>,
    },
    StopRun,
    ExitProgram,
    ExitMethod,
    Goback,
    Call {
        #[serde(default)]
        program: Option<String>,
        #[serde(default)]
        conditions: Vec<ConditionDef>,
    },
    Statement {
        verb: Verb,
        #[serde(default)]
        conditions: Vec<ConditionDef>,
    },
}

/// One WHEN clause; stacked WHEN phrases share a body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhenDef {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub body: Vec<StmtNode>,
}

/// An exception phrase such as `AT END` with its statements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    pub condition: ConditionKind,
    #[serde(default)]
    pub body: Vec<StmtNode>,
}

/// Replay `tree` into `builder`
pub fn drive(tree: &SourceTree, builder: &mut CfgBuilder) {
    let mut driver = Driver { builder, next_id: 0 };
    for program in &tree.programs {
        driver.program(program);
    }
}

struct Driver<'a> {
    builder: &'a mut CfgBuilder,
    next_id: u32,
}

impl Driver<'_> {
    fn node(&mut self, kind: NodeKind, span: Span, text: Option<&str>) -> Node {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let node = Node::new(id, kind).with_span(span);
        match text {
            Some(text) => node.with_text(text),
            None => node,
        }
    }

    /// Enter `kind`, run `children`, exit
    fn wrap<F>(&mut self, kind: NodeKind, span: Span, text: Option<&str>, children: F)
    where
        F: FnOnce(&mut Self),
    {
        let node = self.node(kind, span, text);
        self.builder.enter(&node);
        children(self);
        self.builder.exit(&node);
    }

    fn leaf(&mut self, kind: NodeKind, text: Option<&str>) {
        self.wrap(kind, Span::default(), text, |_| {});
    }

    fn program(&mut self, program: &ProgramDef) {
        let kind = match program.kind {
            ProgramKind::Program => NodeKind::Program { name: program.name.clone() },
            ProgramKind::Function => NodeKind::Function { name: program.name.clone() },
        };
        self.wrap(kind, Span::default(), None, |d| {
            if let Some(division) = &program.procedure_division {
                d.division(division);
            }
            for nested in &program.nested {
                d.program(nested);
            }
        });
    }

    fn division(&mut self, division: &DivisionDef) {
        self.wrap(NodeKind::ProcedureDivision, Span::default(), None, |d| {
            if !division.declaratives.is_empty() {
                d.wrap(NodeKind::Declaratives, Span::default(), None, |d| {
                    for section in &division.declaratives {
                        d.section(section);
                    }
                });
            }
            d.sentences(&division.sentences);
            for paragraph in &division.paragraphs {
                d.paragraph(paragraph);
            }
            for section in &division.sections {
                d.section(section);
            }
        });
    }

    fn section(&mut self, section: &SectionDef) {
        let kind = NodeKind::Section { name: section.name.clone() };
        self.wrap(kind, section.span, None, |d| {
            d.sentences(&section.sentences);
            for paragraph in &section.paragraphs {
                d.paragraph(paragraph);
            }
        });
    }

    fn paragraph(&mut self, paragraph: &ParagraphDef) {
        let kind = NodeKind::Paragraph { name: paragraph.name.clone() };
        self.wrap(kind, paragraph.span, None, |d| d.sentences(&paragraph.sentences));
    }

    fn sentences(&mut self, sentences: &[Vec<StmtNode>]) {
        for sentence in sentences {
            self.statements(sentence);
            self.builder.end_sentence();
        }
    }

    fn statements(&mut self, statements: &[StmtNode]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, node: &StmtNode) {
        let span = node.span;
        let text = node.text.as_deref();
        match &node.stmt {
            Stmt::If { then, otherwise } => self.wrap(NodeKind::If, span, text, |d| {
                d.statements(then);
                if let Some(otherwise) = otherwise {
                    d.wrap(NodeKind::Else, Span::default(), None, |d| d.statements(otherwise));
                }
            }),

            Stmt::Evaluate { whens, other } => self.wrap(NodeKind::Evaluate, span, text, |d| {
                for when in whens {
                    d.when_phrases(NodeKind::When, when);
                    d.builder.start_when_condition_clause();
                    d.statements(&when.body);
                }
                if let Some(other) = other {
                    d.leaf(NodeKind::WhenOther, None);
                    d.builder.start_when_other_clause();
                    d.statements(other);
                }
            }),

            Stmt::Search { at_end, whens } => self.wrap(NodeKind::Search, span, text, |d| {
                if let Some(at_end) = at_end {
                    let kind = NodeKind::Condition(ConditionKind::AtEnd);
                    d.wrap(kind, Span::default(), None, |d| d.statements(at_end));
                }
                for when in whens {
                    d.when_phrases(NodeKind::WhenSearch, when);
                    d.builder.start_when_search_condition_clause(false);
                    d.statements(&when.body);
                }
            }),

            Stmt::Alter { clauses } => {
                let kind = NodeKind::Alter { clauses: clauses.clone() };
                self.wrap(kind, span, text, |_| {});
            }

            Stmt::GoTo { targets, depending } => {
                let goto = match targets.as_slice() {
                    [target] if !depending => Goto::Simple { target: target.clone() },
                    _ => Goto::Conditional { targets: targets.clone() },
                };
                self.wrap(NodeKind::Goto(goto), span, text, |_| {});
            }

            Stmt::Perform { procedure, through } => {
                let kind = NodeKind::PerformProcedure {
                    procedure: procedure.clone(),
                    through: through.clone(),
                };
                self.wrap(kind, span, text, |_| {});
            }

            Stmt::PerformLoop {
                iteration,
                test_after,
                body,
            } => {
                let kind = NodeKind::PerformLoop {
                    iteration: *iteration,
                    test_after: *test_after,
                };
                self.wrap(kind, span, text, |d| d.statements(body));
            }

            Stmt::Exit => self.wrap(NodeKind::Exit, span, text, |_| {}),
            Stmt::NextSentence => self.wrap(NodeKind::NextSentence, span, text, |_| {}),
            Stmt::StopRun => self.ending(EndingKind::StopRun, span, text),
            Stmt::ExitProgram => self.ending(EndingKind::ExitProgram, span, text),
            Stmt::ExitMethod => self.ending(EndingKind::ExitMethod, span, text),
            Stmt::Goback => self.ending(EndingKind::Goback, span, text),

            Stmt::Call { program, conditions } => {
                let kind = NodeKind::Call { program: program.clone() };
                self.wrap(kind, span, text, |d| d.conditions(conditions));
            }

            Stmt::Statement { verb, conditions } => {
                self.wrap(NodeKind::Statement(*verb), span, text, |d| d.conditions(conditions));
            }
        }
    }

    fn ending(&mut self, kind: EndingKind, span: Span, text: Option<&str>) {
        self.wrap(NodeKind::Ending(kind), span, text, |_| {});
    }

    fn when_phrases(&mut self, kind: NodeKind, when: &WhenDef) {
        if when.conditions.is_empty() {
            self.leaf(kind, None);
            return;
        }
        for condition in &when.conditions {
            self.leaf(kind.clone(), Some(condition));
        }
    }

    fn conditions(&mut self, conditions: &[ConditionDef]) {
        for clause in conditions {
            let kind = NodeKind::Condition(clause.condition);
            self.wrap(kind, Span::default(), None, |d| d.statements(&clause.body));
        }
    }
}
