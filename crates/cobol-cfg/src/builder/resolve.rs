//! Deferred resolution
//!
//! Runs once when the procedure division closes, in this order:
//! NEXT SENTENCE, ALTER, GO TO, out-of-line PERFORM, then grafting in
//! extended mode. ALTER must run before GO TO because it adds GO TO
//! targets; PERFORM runs after GO TO so captured ranges see every jump.

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::program::{PendingPerform, ProgramBuilder};
use crate::error::CfgError;
use crate::graph::{BlockId, EdgeId, GroupId};
use crate::node::{Goto, NodeTag, Span, SymbolRef};
use crate::procedure::{ProcId, ProcedureKind, Resolution, SentenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Pending,
    Resolving,
    Resolved,
    Failed,
}

impl ProgramBuilder {
    pub(super) fn resolve_pending(&mut self) {
        debug!(
            next_sentences = self.pending.next_sentences.len(),
            alters = self.pending.alters.len(),
            gotos = self.pending.gotos.len(),
            performs = self.pending.performs.len(),
            "resolving deferred branches"
        );
        self.resolve_next_sentences();
        self.resolve_alters();
        self.resolve_gotos();
        self.resolve_performs();
        if self.config.is_extended() {
            self.graft_groups();
        }
        self.pending.altered_gotos.clear();
    }

    pub(super) fn report(&mut self, error: CfgError) {
        warn!(code = error.code(), program = %self.name, "{}", error);
        self.diagnostics.push(error);
    }

    /// Resolve a procedure name, recording a diagnostic on failure
    fn lookup(&mut self, symbol: &SymbolRef, span: Span) -> Option<ProcId> {
        match self.registry.resolve(symbol) {
            Resolution::Unique(id) => Some(id),
            Resolution::Empty => {
                self.report(CfgError::UnknownProcedure {
                    name: symbol.to_string(),
                    span,
                });
                None
            }
            Resolution::Ambiguous(candidates) => {
                self.report(CfgError::AmbiguousProcedure {
                    name: symbol.to_string(),
                    candidates,
                    span,
                });
                None
            }
        }
    }

    /// Edge slot entering a sentence's first block, created on demand
    fn sentence_entry(&mut self, sentence: SentenceId) -> Option<EdgeId> {
        let entry = self.registry.sentence(sentence);
        if let Some(edge) = entry.first_edge {
            return Some(edge);
        }
        let first = entry.first_block()?;
        let edge = self.cfg.new_edge(first);
        self.registry.sentence_mut(sentence).first_edge = Some(edge);
        Some(edge)
    }

    fn resolve_next_sentences(&mut self) {
        for pending in mem::take(&mut self.pending.next_sentences) {
            let Some(next) = self.registry.sentence_after(pending.sentence) else {
                continue;
            };
            if let Some(edge) = self.sentence_entry(next) {
                self.cfg.link(pending.block, edge);
            }
        }
    }

    fn resolve_alters(&mut self) {
        for alter in mem::take(&mut self.pending.alters) {
            for clause in &alter.clauses {
                let Some(altered) = self.lookup(&clause.altered, alter.span) else {
                    continue;
                };
                if self.lookup(&clause.target, alter.span).is_none() {
                    continue;
                }
                let goto = self
                    .registry
                    .first_sentence(altered)
                    .and_then(|s| self.registry.sentence(s).first_block())
                    .and_then(|b| self.cfg.block(b).first_instruction().copied())
                    .filter(|i| i.tag == NodeTag::GotoSimple);
                match goto {
                    Some(goto) => self
                        .pending
                        .altered_gotos
                        .entry(goto.node)
                        .or_default()
                        .push(clause.target.clone()),
                    None => {
                        let paragraph = self.registry.procedure(altered).name.clone();
                        self.report(CfgError::MalformedAlter {
                            paragraph,
                            span: alter.span,
                        });
                    }
                }
            }
        }
    }

    fn resolve_gotos(&mut self) {
        for pending in mem::take(&mut self.pending.gotos) {
            let targets: Vec<SymbolRef> = match &pending.goto {
                Goto::Simple { target } => {
                    let mut targets = vec![target.clone()];
                    if let Some(altered) = self.pending.altered_gotos.get(&pending.node) {
                        targets.extend(altered.iter().cloned());
                    }
                    targets
                }
                Goto::Conditional { targets } => targets.clone(),
            };
            let mut seen = FxHashSet::default();
            for target in &targets {
                let Some(proc) = self.lookup(target, pending.span) else {
                    continue;
                };
                if !seen.insert(proc) {
                    continue;
                }
                let Some(sentence) = self.registry.first_sentence(proc) else {
                    continue;
                };
                if let Some(edge) = self.sentence_entry(sentence) {
                    self.cfg.link(pending.block, edge);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Out-of-line PERFORM
    // ------------------------------------------------------------------

    fn resolve_performs(&mut self) {
        let performs = mem::take(&mut self.pending.performs);
        let index: FxHashMap<GroupId, usize> = performs
            .iter()
            .enumerate()
            .map(|(i, p)| (p.group, i))
            .collect();
        let mut states = vec![GroupState::Pending; performs.len()];
        for i in 0..performs.len() {
            self.resolve_perform(i, &performs, &index, &mut states);
        }
    }

    fn resolve_perform(
        &mut self,
        i: usize,
        performs: &[PendingPerform],
        index: &FxHashMap<GroupId, usize>,
        states: &mut [GroupState],
    ) {
        if states[i] != GroupState::Pending {
            return;
        }
        states[i] = GroupState::Resolving;
        let perform = &performs[i];

        let Some((first, last)) = self.perform_range(perform) else {
            states[i] = GroupState::Failed;
            return;
        };
        let range = self.cfg.group(perform.group).range.clone();

        let mut collected = Vec::new();
        let mut seen = FxHashSet::default();
        for proc in self.procedures_in_range(first, last) {
            for sentence in self.registry.sentences_of(proc) {
                let blocks = self.registry.sentence(sentence).blocks.clone();
                for block in blocks {
                    if !seen.insert(block) {
                        self.report(CfgError::RecursivePerform {
                            procedure: range.clone(),
                            block: block.as_u32(),
                            span: perform.span,
                        });
                        continue;
                    }
                    if let Some(nested) = self.cfg.block(block).group {
                        if let Some(&j) = index.get(&nested) {
                            match states[j] {
                                GroupState::Pending => self.resolve_perform(j, performs, index, states),
                                GroupState::Resolving => {
                                    self.report(CfgError::RecursivePerform {
                                        procedure: range.clone(),
                                        block: block.as_u32(),
                                        span: perform.span,
                                    });
                                    self.cfg.group_mut(nested).recursive = true;
                                }
                                GroupState::Resolved | GroupState::Failed => {}
                            }
                        }
                    }
                    collected.push(block);
                }
            }
        }

        self.relocate(perform, &range, &collected);
        states[i] = GroupState::Resolved;
    }

    /// First and last procedure of a PERFORM, checked for order
    fn perform_range(&mut self, perform: &PendingPerform) -> Option<(ProcId, ProcId)> {
        let first = self.lookup(&perform.procedure, perform.span)?;
        let last = match &perform.through {
            Some(through) => self.lookup(through, perform.span)?,
            None => first,
        };
        let from = self.registry.procedure(first);
        let to = self.registry.procedure(last);
        if from.declaration_number > to.declaration_number {
            let error = CfgError::InvalidPerformRange {
                from: from.name.clone(),
                through: to.name.clone(),
                span: perform.span,
            };
            self.report(error);
            return None;
        }
        Some((first, last))
    }

    /// Procedures from `first` to `last` in declaration order. A paragraph
    /// is skipped when its section is already part of the range.
    fn procedures_in_range(&self, first: ProcId, last: ProcId) -> Vec<ProcId> {
        let in_range = |id: ProcId| id >= first && id <= last;
        (first.0..=last.0)
            .map(ProcId)
            .filter(|&id| {
                let proc = self.registry.procedure(id);
                match (proc.kind, proc.section) {
                    (ProcedureKind::Paragraph, Some(section)) => !in_range(section),
                    _ => true,
                }
            })
            .collect()
    }

    /// Give the group private copies of the collected blocks. Edges between
    /// collected blocks are redirected to the copies; an edge leaving the
    /// range is dropped from the last block and kept, with a diagnostic,
    /// from any other block.
    fn relocate(&mut self, perform: &PendingPerform, range: &str, collected: &[BlockId]) {
        let mut copies: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        let mut members = Vec::with_capacity(collected.len());
        for &block in collected {
            let copy = self.cfg.clone_block(block);
            copies.insert(block, copy);
            members.push(copy);
        }

        let last = collected.last().copied();
        let mut relocated: FxHashMap<EdgeId, EdgeId> = FxHashMap::default();
        for &block in collected {
            let successors = self.cfg.block(block).successors.clone();
            let mut edges = Vec::with_capacity(successors.len());
            for edge in successors {
                if let Some(&moved) = relocated.get(&edge) {
                    edges.push(moved);
                    continue;
                }
                let target = self.cfg.target(edge);
                if let Some(&copy) = copies.get(&target) {
                    let moved = self.cfg.new_edge(copy);
                    relocated.insert(edge, moved);
                    edges.push(moved);
                } else if Some(block) != last {
                    let tag = self.cfg.block(block).tag.clone().unwrap_or_default();
                    self.report(CfgError::BranchOutOfRange {
                        procedure: range.to_string(),
                        tag,
                        block: block.as_u32(),
                        span: perform.span,
                    });
                    edges.push(edge);
                }
            }
            self.cfg.block_mut(copies[&block]).successors = edges;
        }

        let terminals = self.cfg.terminal_blocks_within(&members);
        let group = self.cfg.group_mut(perform.group);
        group.members = members;
        group.terminal_blocks = terminals;
    }
}
