//! Construction of readahead, readback and reduce tables.
//!
//! The constructor runs as a fixed sequence of phases:
//!
//! ```text
//! relations -> readahead -> semantic extraction
//!   -> scanner: bridge
//!   -> parser:  readback (+ lookback) -> reduce alternates
//!   -> conflict check
//! ```

pub mod conflict;
pub mod emit;
mod readahead;
mod readback;

pub use self::{
    conflict::Conflict,
    emit::{SymbolSet, TableRow},
};

use crate::{
    fsm::StateID,
    grammar::{Grammar, GrammarKind, ProductionID},
    label::Label,
    relation::Relation,
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

/// An FSM state of some production body.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub production: ProductionID,
    pub state: StateID,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}.{:?}", self.production, self.state)
    }
}

macro_rules! table_ids {
    ($($name:ident => $prefix:literal),*$(,)?) => {$(
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const fn into_raw(self) -> u32 {
                self.0
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{:03}"), self.0)
            }
        }
    )*};
}

table_ids! {
    ReadaheadID => "RA",
    ReadbackID => "RB",
    ReduceID => "RD",
    SemanticID => "SM",
}

/// A key that tracks a symbol or an FSM state together with the readahead
/// state it was reached in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pairing {
    Label(Label, ReadaheadID),
    State(Item, ReadaheadID),
}

impl Pairing {
    pub fn readahead(&self) -> ReadaheadID {
        match self {
            Self::Label(_, ra) | Self::State(_, ra) => *ra,
        }
    }

    pub fn item(&self) -> Option<Item> {
        match self {
            Self::State(item, _) => Some(*item),
            Self::Label(..) => None,
        }
    }
}

/// Where a transition leads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Readahead(ReadaheadID),
    Readback(ReadbackID),
    Reduce(ReduceID),
    Semantic(SemanticID),
    Accept,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ReadaheadState {
    /// The sorted items this state was created from.
    pub initial_items: Vec<Item>,
    /// `initial_items` closed over nonterminal expansion.
    pub final_items: Set<Item>,
    /// The symbols that may appear next in this state.
    pub follow: Set<String>,
    pub transitions: Vec<(Label, Target)>,
    /// Entered by consuming input, hence pushed on the parse stack.
    pub stackable: bool,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ReadbackState {
    pub left_part: String,
    pub initial_items: Vec<Pairing>,
    pub final_items: Set<Pairing>,
    /// Keyed by `Pairing::Label(symbol on the stack, state on the stack)`.
    pub transitions: Vec<(Pairing, Target)>,
}

/// How to resume after reducing: with `from` on top of the stack, push `to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Restart {
    pub from: ReadaheadID,
    pub label: Label,
    pub to: ReadaheadID,
}

#[derive(Debug)]
#[non_exhaustive]
pub struct ReduceState {
    pub nonterminal: String,
    pub restarts: Vec<Restart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticState {
    /// Always a [`Label::Action`].
    pub action: Label,
    pub goto: ReadaheadID,
}

/// The deterministic automaton derived from a grammar.
#[derive(Debug)]
#[non_exhaustive]
pub struct Tables {
    pub kind: GrammarKind,
    /// One readahead state per goal production, in declaration order.
    pub initial_states: Vec<ReadaheadID>,
    pub readaheads: Vec<ReadaheadState>,
    pub readbacks: Vec<ReadbackState>,
    pub reduces: Vec<ReduceState>,
    pub semantics: Vec<SemanticState>,
    pub has_accept: bool,
    pub conflicts: Vec<Conflict>,
}

impl Tables {
    pub fn readahead(&self, id: ReadaheadID) -> &ReadaheadState {
        &self.readaheads[id.index()]
    }

    pub fn readback(&self, id: ReadbackID) -> &ReadbackState {
        &self.readbacks[id.index()]
    }

    pub fn reduce(&self, id: ReduceID) -> &ReduceState {
        &self.reduces[id.index()]
    }

    pub fn semantic(&self, id: SemanticID) -> &SemanticState {
        &self.semantics[id.index()]
    }

    pub fn readahead_ids(&self) -> impl Iterator<Item = ReadaheadID> {
        (0..self.readaheads.len() as u32).map(ReadaheadID)
    }

    pub fn reduce_for(&self, nonterminal: &str) -> Option<ReduceID> {
        self.reduces
            .iter()
            .position(|r| r.nonterminal == nonterminal)
            .map(|i| ReduceID(i as u32))
    }

    /// Render the tables into rows understood by the table-driven runtime.
    pub fn emit(&self) -> Vec<TableRow> {
        emit::emit(self)
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            for row in self.emit() {
                writeln!(f, "{}", row)?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    #[error("the grammar has no goal production")]
    MissingGoal,
}

/// Compile the analyzed grammar into tables.
///
/// Conflicts do not abort construction; they are logged and returned in
/// [`Tables::conflicts`].
#[tracing::instrument(skip_all, fields(kind = ?g.kind))]
pub fn construct(g: &Grammar) -> Result<Tables, ConstructError> {
    if g.goals().next().is_none() {
        return Err(ConstructError::MissingGoal);
    }

    let mut c = Constructor::new(g);
    c.build_relations();
    c.build_readaheads();
    c.extract_semantic_states();
    if g.kind.is_scanner() {
        c.bridge_scanner_follows();
    } else {
        c.split_left();
        c.build_readbacks();
        c.build_reduce_alternates();
    }

    let mut tables = Tables {
        kind: g.kind,
        initial_states: c.seeds.iter().map(|(ra, _)| *ra).collect(),
        readaheads: c.readaheads,
        readbacks: c.readbacks,
        reduces: c.reduces,
        semantics: c.semantics.into_iter().collect(),
        has_accept: c.has_accept,
        conflicts: vec![],
    };
    tables.conflicts = conflict::detect(&tables);

    tracing::debug!(
        readaheads = tables.readaheads.len(),
        readbacks = tables.readbacks.len(),
        reduces = tables.reduces.len(),
        semantics = tables.semantics.len(),
        conflicts = tables.conflicts.len(),
        "tables constructed"
    );
    Ok(tables)
}

struct Constructor<'g> {
    g: &'g Grammar,

    /// item --symbol--> item, within a production body.
    right: Relation<Item, Label>,
    /// item --nonterminal--> initial items of that nonterminal's body.
    down: Relation<Item, Label>,
    /// Inverse of `down`, per readahead state.
    up: Relation<Pairing, Label>,
    /// Inverse of `right`, per pair of readahead states.
    left: Relation<Pairing, Label>,
    visible_left: Relation<Pairing, Label>,
    invisible_left: Relation<Pairing, Label>,
    /// Readahead state --label--> predecessor, for transitions that do not
    /// consume input.
    invisible_states: Relation<ReadaheadID, Label>,

    seeds: Vec<(ReadaheadID, ProductionID)>,
    readaheads: Vec<ReadaheadState>,
    readahead_kernels: Map<Vec<Item>, ReadaheadID>,
    readbacks: Vec<ReadbackState>,
    readback_kernels: Map<Vec<Pairing>, ReadbackID>,
    reduces: Vec<ReduceState>,
    semantics: Set<SemanticState>,
    has_accept: bool,
}

impl<'g> Constructor<'g> {
    fn new(g: &'g Grammar) -> Self {
        Self {
            g,
            right: Relation::new(),
            down: Relation::new(),
            up: Relation::new(),
            left: Relation::new(),
            visible_left: Relation::new(),
            invisible_left: Relation::new(),
            invisible_states: Relation::new(),
            seeds: vec![],
            readaheads: vec![],
            readahead_kernels: Map::default(),
            readbacks: vec![],
            readback_kernels: Map::default(),
            reduces: vec![],
            semantics: Set::default(),
            has_accept: false,
        }
    }

    fn readahead(&self, id: ReadaheadID) -> &ReadaheadState {
        &self.readaheads[id.index()]
    }

    fn readahead_mut(&mut self, id: ReadaheadID) -> &mut ReadaheadState {
        &mut self.readaheads[id.index()]
    }

    fn is_final_item(&self, item: Item) -> bool {
        self.g.production(item.production).fsm.state(item.state).is_final
    }

    fn is_initial_item(&self, item: Item) -> bool {
        self.g.production(item.production).fsm.state(item.state).is_initial
    }
}

#[cfg(test)]
mod tests;
