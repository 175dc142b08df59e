//! Procedure Registry
//!
//! Sections, paragraphs and sentences of one procedure division, in
//! declaration order. Used to resolve procedure names and to walk the
//! blocks a named procedure owns.

use rustc_hash::FxHashMap;

use crate::graph::{BlockId, EdgeId};
use crate::node::{Span, SymbolRef};

/// Name of the implicit section holding statements written before any header
pub const ROOT_SECTION: &str = "<< RootSection >>";

/// Procedure identifier; equal to its declaration number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(pub u32);

impl ProcId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Sentence identifier; equal to its number within the division
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SentenceId(pub u32);

impl SentenceId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Section,
    Paragraph,
}

/// An element of a procedure's body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Sentence(SentenceId),
    Paragraph(ProcId),
}

/// A section or paragraph
#[derive(Debug, Clone)]
pub struct Procedure {
    pub id: ProcId,
    pub name: String,
    pub kind: ProcedureKind,
    /// Strictly increasing in source order
    pub declaration_number: u32,
    /// Owning section of a paragraph
    pub section: Option<ProcId>,
    pub parts: Vec<Part>,
    pub declaratives: bool,
    pub span: Span,
}

/// One period-terminated sentence
#[derive(Debug, Clone)]
pub struct Sentence {
    pub id: SentenceId,
    pub owner: Option<ProcId>,
    /// Edge that falls into the sentence's first block, when one exists
    pub first_edge: Option<EdgeId>,
    /// Blocks created while the sentence was open, first block first
    pub blocks: Vec<BlockId>,
    pub declaratives: bool,
}

impl Sentence {
    pub fn number(&self) -> u32 {
        self.id.0
    }

    pub fn first_block(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

/// Outcome of a procedure lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unique(ProcId),
    Empty,
    Ambiguous(usize),
}

/// Ordered catalog of procedures and sentences
#[derive(Debug, Clone, Default)]
pub struct ProcedureRegistry {
    program: Option<String>,
    procedures: Vec<Procedure>,
    by_name: FxHashMap<String, Vec<ProcId>>,
    sentences: Vec<Sentence>,
}

impl ProcedureRegistry {
    pub fn new(program: Option<String>) -> Self {
        Self {
            program,
            ..Self::default()
        }
    }

    /// The implicit root section, created on first use
    pub fn root_section(&mut self) -> ProcId {
        if let Some(root) = self.procedures.first() {
            return root.id;
        }
        self.push(ROOT_SECTION.to_string(), ProcedureKind::Section, None, false, Span::default())
    }

    pub fn is_root(&self, id: ProcId) -> bool {
        self.procedures[id.index()].name == ROOT_SECTION
    }

    pub fn add_section(&mut self, name: &str, declaratives: bool, span: Span) -> ProcId {
        let id = self.push(name.to_string(), ProcedureKind::Section, None, declaratives, span);
        self.by_name.entry(key(name)).or_default().push(id);
        id
    }

    pub fn add_paragraph(
        &mut self,
        name: &str,
        section: Option<ProcId>,
        declaratives: bool,
        span: Span,
    ) -> ProcId {
        let id = self.push(name.to_string(), ProcedureKind::Paragraph, section, declaratives, span);
        if let Some(section) = section {
            self.procedures[section.index()].parts.push(Part::Paragraph(id));
        }
        self.by_name.entry(key(name)).or_default().push(id);
        id
    }

    fn push(
        &mut self,
        name: String,
        kind: ProcedureKind,
        section: Option<ProcId>,
        declaratives: bool,
        span: Span,
    ) -> ProcId {
        let id = ProcId(self.procedures.len() as u32);
        self.procedures.push(Procedure {
            id,
            name,
            kind,
            declaration_number: id.0,
            section,
            parts: Vec::new(),
            declaratives,
            span,
        });
        id
    }

    /// Open a new sentence owned by `owner`
    pub fn add_sentence(&mut self, owner: Option<ProcId>, declaratives: bool) -> SentenceId {
        let id = SentenceId(self.sentences.len() as u32);
        self.sentences.push(Sentence {
            id,
            owner,
            first_edge: None,
            blocks: Vec::new(),
            declaratives,
        });
        if let Some(owner) = owner {
            self.procedures[owner.index()].parts.push(Part::Sentence(id));
        }
        id
    }

    pub fn procedure(&self, id: ProcId) -> &Procedure {
        &self.procedures[id.index()]
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn sentence(&self, id: SentenceId) -> &Sentence {
        &self.sentences[id.index()]
    }

    pub fn sentence_mut(&mut self, id: SentenceId) -> &mut Sentence {
        &mut self.sentences[id.index()]
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// The sentence declared right after `id`
    pub fn sentence_after(&self, id: SentenceId) -> Option<SentenceId> {
        let next = id.index() + 1;
        (next < self.sentences.len()).then(|| SentenceId(next as u32))
    }

    /// Every sentence of a procedure in declaration order, paragraphs of a
    /// section included
    pub fn sentences_of(&self, id: ProcId) -> Vec<SentenceId> {
        let mut out = Vec::new();
        self.collect_sentences(id, &mut out);
        out
    }

    fn collect_sentences(&self, id: ProcId, out: &mut Vec<SentenceId>) {
        for part in &self.procedures[id.index()].parts {
            match *part {
                Part::Sentence(sentence) => out.push(sentence),
                Part::Paragraph(paragraph) => self.collect_sentences(paragraph, out),
            }
        }
    }

    pub fn first_sentence(&self, id: ProcId) -> Option<SentenceId> {
        for part in &self.procedures[id.index()].parts {
            match *part {
                Part::Sentence(sentence) => return Some(sentence),
                Part::Paragraph(paragraph) => {
                    if let Some(sentence) = self.first_sentence(paragraph) {
                        return Some(sentence);
                    }
                }
            }
        }
        None
    }

    /// Resolve a procedure reference.
    ///
    /// Candidates are filtered by simple name, then by the qualifier chain:
    /// each qualifier must name an enclosing section or the program, in
    /// order from the innermost outwards.
    pub fn resolve(&self, symbol: &SymbolRef) -> Resolution {
        let Some(candidates) = self.by_name.get(&key(&symbol.name)) else {
            return Resolution::Empty;
        };
        let matches: Vec<ProcId> = candidates
            .iter()
            .copied()
            .filter(|&id| self.qualifiers_match(id, &symbol.qualifiers))
            .collect();
        match matches.as_slice() {
            [] => Resolution::Empty,
            [only] => Resolution::Unique(*only),
            many => Resolution::Ambiguous(many.len()),
        }
    }

    fn qualifiers_match(&self, id: ProcId, qualifiers: &[String]) -> bool {
        let mut wanted = qualifiers.iter().peekable();
        for ancestor in self.ancestors(id) {
            if let Some(q) = wanted.peek() {
                if q.eq_ignore_ascii_case(ancestor) {
                    wanted.next();
                }
            }
        }
        wanted.peek().is_none()
    }

    fn ancestors(&self, id: ProcId) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(section) = self.procedures[id.index()].section {
            if !self.is_root(section) {
                names.push(self.procedures[section.index()].name.as_str());
            }
        }
        if let Some(program) = &self.program {
            names.push(program.as_str());
        }
        names
    }
}

fn key(name: &str) -> String {
    name.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProcedureRegistry {
        let mut reg = ProcedureRegistry::new(Some("PGM".into()));
        reg.root_section();
        let s1 = reg.add_section("S1", false, Span::default());
        reg.add_paragraph("P", Some(s1), false, Span::default());
        let s2 = reg.add_section("S2", false, Span::default());
        reg.add_paragraph("P", Some(s2), false, Span::default());
        reg.add_paragraph("Q", Some(s2), false, Span::default());
        reg
    }

    #[test]
    fn test_declaration_numbers_increase() {
        let reg = registry();
        let numbers: Vec<u32> = reg.procedures().iter().map(|p| p.declaration_number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_resolve_unique_and_empty() {
        let reg = registry();
        assert_eq!(reg.resolve(&SymbolRef::new("q")), Resolution::Unique(ProcId(5)));
        assert_eq!(reg.resolve(&SymbolRef::new("MISSING")), Resolution::Empty);
    }

    #[test]
    fn test_resolve_qualified() {
        let reg = registry();
        assert_eq!(reg.resolve(&SymbolRef::new("P")), Resolution::Ambiguous(2));
        assert_eq!(
            reg.resolve(&SymbolRef::new("P").qualified("S2")),
            Resolution::Unique(ProcId(4))
        );
        assert_eq!(
            reg.resolve(&SymbolRef::new("P").qualified("S1").qualified("PGM")),
            Resolution::Unique(ProcId(2))
        );
        assert_eq!(
            reg.resolve(&SymbolRef::new("Q").qualified("S1")),
            Resolution::Empty
        );
    }

    #[test]
    fn test_section_sentences_include_paragraphs() {
        let mut reg = ProcedureRegistry::new(None);
        reg.root_section();
        let s = reg.add_section("S", false, Span::default());
        let first = reg.add_sentence(Some(s), false);
        let p = reg.add_paragraph("P", Some(s), false, Span::default());
        let second = reg.add_sentence(Some(p), false);
        let third = reg.add_sentence(Some(p), false);

        assert_eq!(reg.sentences_of(s), vec![first, second, third]);
        assert_eq!(reg.sentences_of(p), vec![second, third]);
        assert_eq!(reg.first_sentence(p), Some(second));
        assert_eq!(reg.sentence_after(second), Some(third));
        assert_eq!(reg.sentence_after(third), None);
    }
}
