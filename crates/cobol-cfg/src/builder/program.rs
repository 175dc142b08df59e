//! Per-program builder state
//!
//! One [`ProgramBuilder`] exists for every program or function being
//! traversed. It owns the graph under construction, the procedure
//! registry, the decision-context stack and the pending-resolution queues.

use std::mem;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::branch::{DeclarativesContext, MultiBranchContext};
use super::{ProgramCfg, ScopeKind};
use crate::config::CfgConfig;
use crate::error::CfgError;
use crate::graph::{BlockFlags, BlockId, CfgFlags, ControlFlowGraph, GroupId, Instruction};
use crate::node::{AlterClause, Goto, Node, NodeId, NodeKind, NodeTag, Span, SymbolRef};
use crate::procedure::{ProcId, ProcedureRegistry, SentenceId};

/// A GO TO waiting for its targets
#[derive(Debug, Clone)]
pub(super) struct PendingGoto {
    pub node: NodeId,
    pub span: Span,
    pub goto: Goto,
    pub block: BlockId,
}

/// An ALTER waiting for its paragraphs
#[derive(Debug, Clone)]
pub(super) struct PendingAlter {
    pub span: Span,
    pub clauses: Vec<AlterClause>,
}

/// An out-of-line PERFORM waiting for its range
#[derive(Debug, Clone)]
pub(super) struct PendingPerform {
    pub span: Span,
    pub procedure: SymbolRef,
    pub through: Option<SymbolRef>,
    pub group: GroupId,
}

/// A NEXT SENTENCE waiting for the following sentence
#[derive(Debug, Clone, Copy)]
pub(super) struct PendingNextSentence {
    pub block: BlockId,
    pub sentence: SentenceId,
}

/// Worklists drained at the end of the procedure division
#[derive(Debug, Default)]
pub(super) struct Pending {
    pub gotos: Vec<PendingGoto>,
    pub alters: Vec<PendingAlter>,
    pub performs: Vec<PendingPerform>,
    pub next_sentences: Vec<PendingNextSentence>,
    /// Extra targets given to simple GO TOs by ALTER, in ALTER order
    pub altered_gotos: FxHashMap<NodeId, Vec<SymbolRef>>,
}

pub(crate) struct ProgramBuilder {
    pub(super) name: String,
    pub(super) kind: ScopeKind,
    pub(super) slot: usize,
    pub(super) parent: Option<usize>,
    pub(super) config: CfgConfig,
    pub(super) cfg: ControlFlowGraph,
    pub(super) registry: ProcedureRegistry,
    pub(super) diagnostics: Vec<CfgError>,
    pub(super) in_procedure: bool,
    pub(super) current_block: Option<BlockId>,
    pub(super) current_sentence: Option<SentenceId>,
    pub(super) current_section: Option<ProcId>,
    pub(super) current_paragraph: Option<ProcId>,
    pub(super) contexts: Vec<MultiBranchContext>,
    pub(super) declaratives: Option<DeclarativesContext>,
    /// Next sentence opens a USE procedure: a root, not a fall-through
    pub(super) declarative_entry: bool,
    /// Tags of the nodes currently entered, outermost first
    pub(super) parents: Vec<NodeTag>,
    pub(super) pending: Pending,
}

impl ProgramBuilder {
    pub(super) fn new(
        name: String,
        kind: ScopeKind,
        slot: usize,
        parent: Option<usize>,
        config: CfgConfig,
    ) -> Self {
        let registry = ProcedureRegistry::new((!name.is_empty()).then(|| name.clone()));
        Self {
            name,
            kind,
            slot,
            parent,
            config,
            cfg: ControlFlowGraph::new(),
            registry,
            diagnostics: Vec::new(),
            in_procedure: false,
            current_block: None,
            current_sentence: None,
            current_section: None,
            current_paragraph: None,
            contexts: Vec::new(),
            declaratives: None,
            declarative_entry: false,
            parents: Vec::new(),
            pending: Pending::default(),
        }
    }

    pub(super) fn into_program_cfg(self) -> ProgramCfg {
        ProgramCfg {
            name: self.name,
            kind: self.kind,
            parent: self.parent,
            graph: self.cfg,
            procedures: self.registry,
            diagnostics: self.diagnostics,
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    pub(super) fn enter(&mut self, node: &Node) {
        let tag = node.tag();
        if tag == NodeTag::ProcedureDivision {
            self.start_cfg(node);
        } else if self.in_procedure {
            self.enter_statement(node, tag);
        }
        self.parents.push(tag);
    }

    pub(super) fn exit(&mut self, node: &Node) {
        self.parents.pop();
        if !self.in_procedure {
            return;
        }
        match &node.kind {
            NodeKind::ProcedureDivision => self.end_cfg(),
            NodeKind::Declaratives => self.leave_declaratives(),
            NodeKind::If => self.leave_if(),
            NodeKind::Evaluate => self.leave_evaluate(),
            NodeKind::Search => self.leave_search(),
            NodeKind::PerformLoop { iteration, .. } => self.leave_perform_loop(*iteration),
            NodeKind::Condition(kind) => self.leave_exception_condition(*kind),
            _ => {}
        }
    }

    fn enter_statement(&mut self, node: &Node, tag: NodeTag) {
        self.cfg.record_node(node);
        if tag.is_statement() {
            self.check_start_sentence();
        }
        let instr = Instruction::new(node.id, tag);
        match &node.kind {
            NodeKind::Program { .. } | NodeKind::Function { .. } | NodeKind::ProcedureDivision => {}
            NodeKind::Declaratives => self.enter_declaratives(),
            NodeKind::Section { name } => self.enter_section(name, node.span),
            NodeKind::Paragraph { name } => self.enter_paragraph(name, node.span),

            NodeKind::If => self.enter_if(instr),
            NodeKind::Else => self.enter_else(Some(instr)),
            NodeKind::Evaluate => self.enter_evaluate(instr),
            NodeKind::When | NodeKind::WhenOther | NodeKind::WhenSearch => {
                self.buffer_condition(instr)
            }
            NodeKind::Search => self.enter_search(instr),

            NodeKind::Alter { clauses } => self.enter_alter(instr, node.span, clauses),
            NodeKind::Goto(goto) => self.enter_goto(instr, node.span, goto),
            NodeKind::NextSentence => self.enter_next_sentence(instr),
            NodeKind::PerformProcedure { procedure, through } => {
                self.enter_perform_procedure(instr, node.span, procedure, through.as_ref())
            }
            NodeKind::PerformLoop { test_after, .. } => self.enter_perform_loop(instr, *test_after),
            NodeKind::Ending(_) => self.enter_ending(instr),
            NodeKind::Condition(kind) => self.enter_exception_condition(instr, *kind),

            NodeKind::Exit | NodeKind::Call { .. } | NodeKind::Statement(_) => {
                self.add_instruction(instr)
            }
        }
    }

    // ------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------

    /// Create a block, optionally holding a leading instruction and
    /// belonging to the open sentence
    pub(super) fn new_block(&mut self, leading: Option<Instruction>, attach: bool) -> BlockId {
        let id = self.cfg.add_block();
        let tag = self.current_tag();
        let in_declaratives = self.declaratives.is_some();
        let block = self.cfg.block_mut(id);
        block.tag = tag;
        if in_declaratives {
            block.set_flag(BlockFlags::DECLARATIVES);
        }
        if let Some(instr) = leading {
            block.instructions.push(instr);
            self.cfg.set_block_for(instr.node, id);
        }
        if attach {
            if let Some(sentence) = self.current_sentence {
                self.registry.sentence_mut(sentence).blocks.push(id);
            }
        }
        trace!(block = id.as_u32(), "new block");
        id
    }

    pub(super) fn current(&self) -> Option<BlockId> {
        debug_assert!(self.current_block.is_some(), "no current block");
        self.current_block
    }

    pub(super) fn add_instruction(&mut self, instr: Instruction) {
        if let Some(block) = self.current() {
            self.cfg.block_mut(block).instructions.push(instr);
            self.cfg.set_block_for(instr.node, block);
        }
    }

    fn flag_current(&mut self, flag: BlockFlags) {
        if let Some(block) = self.current() {
            self.cfg.block_mut(block).set_flag(flag);
        }
    }

    /// Name of the innermost user procedure
    fn current_tag(&self) -> Option<String> {
        self.current_paragraph
            .or(self.current_section)
            .filter(|&id| !self.registry.is_root(id))
            .map(|id| self.registry.procedure(id).name.clone())
    }

    // ------------------------------------------------------------------
    // Division, sections, sentences
    // ------------------------------------------------------------------

    fn start_cfg(&mut self, node: &Node) {
        debug!(program = %self.name, "procedure division start");
        self.in_procedure = true;
        self.cfg.initialize(node.id);
        self.cfg.record_node(node);
        let root = self.registry.root_section();
        self.current_section = Some(root);
        self.start_block_sentence();
        if let Some(start) = self.current_block {
            self.cfg.block_mut(start).set_flag(BlockFlags::START);
            self.cfg.add_root(start);
            self.cfg.set_block_for(node.id, start);
        }
    }

    fn end_cfg(&mut self) {
        self.current_sentence = None;
        let end = self.cfg.add_block();
        self.cfg.block_mut(end).set_flag(BlockFlags::END);
        if let Some(last) = self.current_block {
            self.cfg.add_edge(last, end);
        }
        self.current_block = Some(end);
        self.resolve_pending();
        self.in_procedure = false;
        debug!(
            program = %self.name,
            blocks = self.cfg.len(),
            diagnostics = self.diagnostics.len(),
            "procedure division end"
        );
    }

    fn check_start_sentence(&mut self) {
        if self.current_sentence.is_none() {
            self.start_block_sentence();
        }
    }

    fn start_block_sentence(&mut self) {
        let owner = self.current_paragraph.or(self.current_section);
        let sentence = self
            .registry
            .add_sentence(owner, self.declaratives.is_some());
        self.current_sentence = Some(sentence);
        let block = self.new_block(None, true);
        if mem::take(&mut self.declarative_entry) {
            self.cfg.add_root(block);
        } else if let Some(previous) = self.current_block {
            let edge = self.cfg.add_edge(previous, block);
            self.registry.sentence_mut(sentence).first_edge = Some(edge);
        }
        self.current_block = Some(block);
    }

    pub(super) fn end_sentence(&mut self) {
        if !self.in_procedure {
            return;
        }
        if self.current_sentence.is_none() {
            self.start_block_sentence();
        }
        self.current_sentence = None;
    }

    fn enter_section(&mut self, name: &str, span: Span) {
        let in_declaratives = self.declaratives.is_some();
        let id = self.registry.add_section(name, in_declaratives, span);
        self.current_section = Some(id);
        self.current_paragraph = None;
        self.current_sentence = None;
        if in_declaratives {
            self.declarative_entry = true;
        }
    }

    fn enter_paragraph(&mut self, name: &str, span: Span) {
        let id = self.registry.add_paragraph(
            name,
            self.current_section,
            self.declaratives.is_some(),
            span,
        );
        self.current_paragraph = Some(id);
        self.current_sentence = None;
    }

    fn enter_declaratives(&mut self) {
        debug_assert!(self.declaratives.is_none(), "nested DECLARATIVES");
        if let Some(origin) = self.current_block {
            self.declaratives = Some(DeclarativesContext::start(origin));
        }
    }

    fn leave_declaratives(&mut self) {
        self.declarative_entry = false;
        self.current_section = Some(self.registry.root_section());
        self.current_paragraph = None;
        if let Some(ctx) = self.declaratives.take() {
            let next = self.new_block(None, true);
            ctx.end(&mut self.cfg, next);
            self.current_block = Some(next);
        }
    }

    // ------------------------------------------------------------------
    // Procedure branching and ending statements
    // ------------------------------------------------------------------

    fn enter_goto(&mut self, instr: Instruction, span: Span, goto: &Goto) {
        let Some(block) = self.current() else { return };
        self.pending.gotos.push(PendingGoto {
            node: instr.node,
            span,
            goto: goto.clone(),
            block,
        });
        self.add_instruction(instr);
        if goto.is_simple() {
            self.flag_current(BlockFlags::ENDING);
        }
        let next = self.new_block(None, true);
        if !goto.is_simple() {
            self.cfg.add_edge(block, next);
        }
        self.current_block = Some(next);
    }

    fn enter_ending(&mut self, instr: Instruction) {
        self.add_instruction(instr);
        self.flag_current(BlockFlags::ENDING);
        let next = self.new_block(None, true);
        self.current_block = Some(next);
    }

    fn enter_next_sentence(&mut self, instr: Instruction) {
        let Some(block) = self.current() else { return };
        self.add_instruction(instr);
        self.flag_current(BlockFlags::ENDING);
        if let Some(sentence) = self.current_sentence {
            self.pending
                .next_sentences
                .push(PendingNextSentence { block, sentence });
        }
        let next = self.new_block(None, true);
        self.current_block = Some(next);
    }

    fn enter_alter(&mut self, instr: Instruction, span: Span, clauses: &[AlterClause]) {
        self.add_instruction(instr);
        self.pending.alters.push(PendingAlter {
            span,
            clauses: clauses.to_vec(),
        });
    }

    fn enter_perform_procedure(
        &mut self,
        instr: Instruction,
        span: Span,
        procedure: &SymbolRef,
        through: Option<&SymbolRef>,
    ) {
        let Some(origin) = self.current() else { return };
        let call_site = self.new_block(Some(instr), true);
        let range = match through {
            Some(through) => format!("{} THRU {}", procedure, through),
            None => procedure.to_string(),
        };
        let group = self.cfg.add_group(call_site, instr.node, range);
        self.cfg.set_flag(CfgFlags::COMPOUND);
        self.cfg.add_edge(origin, call_site);
        let next = self.new_block(None, true);
        self.cfg.add_edge(call_site, next);
        self.current_block = Some(next);
        self.pending.performs.push(PendingPerform {
            span,
            procedure: procedure.clone(),
            through: through.cloned(),
            group,
        });
    }
}
