//! Table rows in the form consumed by the table-driven runtime.
//!
//! Every state gets a global number, starting from 1, in the order
//! readahead, readback, reduce, semantic and finally the accept state.

use super::{Pairing, Tables, Target};
use crate::{
    label::{ActionParam, Label},
    types::Map,
    util::write_quoted,
};
use std::fmt;

/// The symbols of a grouped scanner transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSet {
    /// Single printable characters, rendered as one string literal.
    Text(String),
    /// Single characters with at least one non-printable, rendered as codes.
    Codes(Vec<u32>),
    /// Longer symbols, as read by a super scanner.
    Names(Vec<String>),
}

impl SymbolSet {
    fn from_names(names: Vec<String>) -> Self {
        let chars: Option<Vec<char>> = names
            .iter()
            .map(|name| {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some(ch),
                    _ => None,
                }
            })
            .collect();
        match chars {
            Some(chars) if chars.iter().all(|ch| !ch.is_control()) => {
                Self::Text(chars.into_iter().collect())
            }
            Some(chars) => Self::Codes(chars.into_iter().map(u32::from).collect()),
            None => Self::Names(names),
        }
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write_quoted(f, text),
            Self::Codes(codes) => write!(f, "{:?}", codes),
            Self::Names(names) => {
                f.write_str("[")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, name)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// One emitted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRow {
    /// `(symbols, attributes, goto)`
    ScannerReadahead {
        id: usize,
        transitions: Vec<(SymbolSet, String, usize)>,
    },
    /// `(symbol, attributes, goto)`
    Readahead {
        id: usize,
        transitions: Vec<(String, String, usize)>,
    },
    /// `((symbol, stacked state), attributes, goto)`
    Readback {
        id: usize,
        transitions: Vec<((String, usize), String, usize)>,
    },
    /// `(stacked state, attributes, goto)`
    Reduce {
        id: usize,
        nonterminal: String,
        restarts: Vec<(usize, String, usize)>,
    },
    Semantic {
        id: usize,
        action: String,
        params: Vec<ActionParam>,
        goto: usize,
    },
    Accept {
        id: usize,
    },
}

impl TableRow {
    pub fn id(&self) -> usize {
        match self {
            Self::ScannerReadahead { id, .. }
            | Self::Readahead { id, .. }
            | Self::Readback { id, .. }
            | Self::Reduce { id, .. }
            | Self::Semantic { id, .. }
            | Self::Accept { id } => *id,
        }
    }
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScannerReadahead { id, transitions } => {
                write!(f, "[\"ScannerReadaheadTable\", {}", id)?;
                for (symbols, attributes, goto) in transitions {
                    write!(f, ", ({}, \"{}\", {})", symbols, attributes, goto)?;
                }
            }
            Self::Readahead { id, transitions } => {
                write!(f, "[\"ReadaheadTable\", {}", id)?;
                for (symbol, attributes, goto) in transitions {
                    f.write_str(", (")?;
                    write_quoted(f, symbol)?;
                    write!(f, ", \"{}\", {})", attributes, goto)?;
                }
            }
            Self::Readback { id, transitions } => {
                write!(f, "[\"ReadbackTable\", {}", id)?;
                for ((symbol, stacked), attributes, goto) in transitions {
                    f.write_str(", ((")?;
                    write_quoted(f, symbol)?;
                    write!(f, ", {}), \"{}\", {})", stacked, attributes, goto)?;
                }
            }
            Self::Reduce {
                id,
                nonterminal,
                restarts,
            } => {
                write!(f, "[\"ReduceTable\", {}, ", id)?;
                write_quoted(f, nonterminal)?;
                for (stacked, attributes, goto) in restarts {
                    write!(f, ", ({}, \"{}\", {})", stacked, attributes, goto)?;
                }
            }
            Self::Semantic {
                id,
                action,
                params,
                goto,
            } => {
                write!(f, "[\"SemanticTable\", {}, ", id)?;
                write_quoted(f, action)?;
                f.write_str(", [")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, "], {}", goto)?;
            }
            Self::Accept { id } => write!(f, "[\"AcceptTable\", {}", id)?,
        }
        f.write_str("]")
    }
}

struct Numbering {
    readbacks: usize,
    reduces: usize,
    semantics: usize,
    accept: usize,
}

impl Numbering {
    fn new(tables: &Tables) -> Self {
        let readbacks = 1 + tables.readaheads.len();
        let reduces = readbacks + tables.readbacks.len();
        let semantics = reduces + tables.reduces.len();
        let accept = semantics + tables.semantics.len();
        Self {
            readbacks,
            reduces,
            semantics,
            accept,
        }
    }

    fn of(&self, target: Target) -> usize {
        match target {
            Target::Readahead(id) => 1 + id.index(),
            Target::Readback(id) => self.readbacks + id.index(),
            Target::Reduce(id) => self.reduces + id.index(),
            Target::Semantic(id) => self.semantics + id.index(),
            Target::Accept => self.accept,
        }
    }
}

#[tracing::instrument(skip_all)]
pub(super) fn emit(tables: &Tables) -> Vec<TableRow> {
    let n = Numbering::new(tables);
    let mut rows = vec![];

    for (id, state) in tables.readahead_ids().zip(&tables.readaheads) {
        let id = n.of(Target::Readahead(id));
        if tables.kind.is_scanner() {
            // Group by (attributes, goto) in order of first appearance.
            let mut groups = Map::<(String, usize), Vec<String>>::default();
            for (label, target) in &state.transitions {
                groups
                    .entry((label.attribute_string(), n.of(*target)))
                    .or_default()
                    .push(label.name().to_owned());
            }
            let transitions = groups
                .into_iter()
                .map(|((attributes, goto), names)| (SymbolSet::from_names(names), attributes, goto))
                .collect();
            rows.push(TableRow::ScannerReadahead { id, transitions });
        } else {
            let transitions = state
                .transitions
                .iter()
                .map(|(label, target)| {
                    (label.name().to_owned(), label.attribute_string(), n.of(*target))
                })
                .collect();
            rows.push(TableRow::Readahead { id, transitions });
        }
    }

    for (i, state) in tables.readbacks.iter().enumerate() {
        let transitions = state
            .transitions
            .iter()
            .filter_map(|(key, target)| match key {
                Pairing::Label(label, stacked) => Some((
                    (label.name().to_owned(), n.of(Target::Readahead(*stacked))),
                    label.attribute_string(),
                    n.of(*target),
                )),
                Pairing::State(..) => None,
            })
            .collect();
        rows.push(TableRow::Readback {
            id: n.readbacks + i,
            transitions,
        });
    }

    for (i, state) in tables.reduces.iter().enumerate() {
        let restarts = state
            .restarts
            .iter()
            .map(|r| {
                (
                    n.of(Target::Readahead(r.from)),
                    r.label.attribute_string(),
                    n.of(Target::Readahead(r.to)),
                )
            })
            .collect();
        rows.push(TableRow::Reduce {
            id: n.reduces + i,
            nonterminal: state.nonterminal.clone(),
            restarts,
        });
    }

    for (i, state) in tables.semantics.iter().enumerate() {
        let params = match &state.action {
            Label::Action { params, .. } => params.clone(),
            Label::Symbol { .. } => vec![],
        };
        rows.push(TableRow::Semantic {
            id: n.semantics + i,
            action: state.action.name().to_owned(),
            params,
            goto: n.of(Target::Readahead(state.goto)),
        });
    }

    if tables.has_accept {
        rows.push(TableRow::Accept { id: n.accept });
    }

    rows
}
