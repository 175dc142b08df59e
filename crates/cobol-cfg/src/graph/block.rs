//! Basic Blocks
//!
//! A block holds an ordered run of instructions and a list of successor
//! edges. Successors are indices into the graph's shared edge pool rather
//! than block ids, so a later pass can retarget an edge slot without
//! touching every block that uses it.

use std::fmt;

use crate::node::{NodeId, NodeTag};

/// Basic block identifier (dense index into the graph's block arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block{}", self.0)
    }
}

/// Edge slot identifier (index into the graph's edge pool)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Out-of-line PERFORM group identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl GroupId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockFlags(u8);

impl BlockFlags {
    pub const NONE: Self = Self(0x00);
    /// Entry block of the procedure division
    pub const START: Self = Self(0x01);
    /// Exit block of the procedure division
    pub const END: Self = Self(0x02);
    /// Block ends with an unconditional transfer (GOTO, STOP RUN, ...)
    pub const ENDING: Self = Self(0x04);
    /// WHEN OTHER / AT END branch
    pub const DEFAULT: Self = Self(0x08);
    /// Created inside DECLARATIVES
    pub const DECLARATIVES: Self = Self(0x10);
    /// Group whose members were inlined as a clone
    pub const GROUP_GRAFTED: Self = Self(0x20);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for BlockFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Opaque handle to a statement, as stored in a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub node: NodeId,
    pub tag: NodeTag,
}

impl Instruction {
    pub fn new(node: NodeId, tag: NodeTag) -> Self {
        Self { node, tag }
    }
}

/// A basic block
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Index in the graph's block arena
    pub id: BlockId,
    /// Statements in execution order
    pub instructions: Vec<Instruction>,
    /// Indices into the graph's edge pool
    pub successors: Vec<EdgeId>,
    pub flags: BlockFlags,
    /// Enclosing paragraph or section name
    pub tag: Option<String>,
    /// Set when this block is an out-of-line PERFORM call site
    pub group: Option<GroupId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            successors: Vec::new(),
            flags: BlockFlags::NONE,
            tag: None,
            group: None,
        }
    }

    pub fn has_flag(&self, flag: BlockFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: BlockFlags) {
        self.flags.insert(flag);
    }

    pub fn is_group(&self) -> bool {
        self.group.is_some()
    }

    pub fn first_instruction(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    /// A copy of this block under a new id, keeping instructions, flags,
    /// tag and group, with an empty successor list
    pub fn detached_copy(&self, id: BlockId) -> Self {
        Self {
            id,
            instructions: self.instructions.clone(),
            successors: Vec::new(),
            flags: self.flags,
            tag: self.tag.clone(),
            group: self.group,
        }
    }
}

/// The member list of an out-of-line PERFORM call site
#[derive(Debug, Clone)]
pub struct BlockGroup {
    pub id: GroupId,
    /// Block holding the PERFORM statement
    pub call_site: BlockId,
    /// The PERFORM statement
    pub node: NodeId,
    /// Performed range, e.g. `P` or `P THRU Q`
    pub range: String,
    /// Private copies of the performed blocks, in declaration order
    pub members: Vec<BlockId>,
    /// Members with no successor left inside the group
    pub terminal_blocks: Vec<BlockId>,
    /// The range reaches its own call site
    pub recursive: bool,
    /// Grafting stopped at the depth limit; the group has no members
    pub truncated: bool,
}

impl BlockGroup {
    pub fn new(id: GroupId, call_site: BlockId, node: NodeId, range: String) -> Self {
        Self {
            id,
            call_site,
            node,
            range,
            members: Vec::new(),
            terminal_blocks: Vec::new(),
            recursive: false,
            truncated: false,
        }
    }

    pub fn first(&self) -> Option<BlockId> {
        self.members.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
