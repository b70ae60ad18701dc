//! Detection of nondeterministic states.

use super::{ReadaheadID, ReduceID, Restart, Tables, Target};
use crate::types::Map;
use std::fmt;

/// A state whose next move is not determined by its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// More than one transition on the same symbol.
    Readahead {
        state: ReadaheadID,
        symbols: Vec<(String, Vec<Target>)>,
    },
    /// More than one restart from the same stack top.
    Reduce {
        state: ReduceID,
        nonterminal: String,
        sources: Vec<(ReadaheadID, Vec<ReadaheadID>)>,
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readahead { state, symbols } => {
                write!(f, "readahead state {:?} is ambiguous on", state)?;
                for (i, (name, targets)) in symbols.iter().enumerate() {
                    f.write_str(if i > 0 { ", " } else { " " })?;
                    write!(f, "{:?} => {:?}", name, targets)?;
                }
                Ok(())
            }
            Self::Reduce {
                state,
                nonterminal,
                sources,
            } => {
                write!(f, "reduce state {:?} ({}) restarts ambiguously from", state, nonterminal)?;
                for (i, (from, tos)) in sources.iter().enumerate() {
                    f.write_str(if i > 0 { ", " } else { " " })?;
                    write!(f, "{:?} => {:?}", from, tos)?;
                }
                Ok(())
            }
        }
    }
}

/// Report at most one conflict per state.
#[tracing::instrument(skip_all)]
pub(super) fn detect(tables: &Tables) -> Vec<Conflict> {
    let mut conflicts = vec![];

    for (id, state) in tables.readahead_ids().zip(&tables.readaheads) {
        let mut by_name = Map::<&str, Vec<Target>>::default();
        for (label, target) in &state.transitions {
            by_name.entry(label.name()).or_default().push(*target);
        }
        let symbols: Vec<_> = by_name
            .into_iter()
            .filter(|(_, targets)| targets.len() > 1)
            .map(|(name, targets)| (name.to_owned(), targets))
            .collect();
        if !symbols.is_empty() {
            conflicts.push(Conflict::Readahead { state: id, symbols });
        }
    }

    for (i, state) in tables.reduces.iter().enumerate() {
        let mut by_source = Map::<ReadaheadID, Vec<ReadaheadID>>::default();
        for Restart { from, to, .. } in &state.restarts {
            by_source.entry(*from).or_default().push(*to);
        }
        let sources: Vec<_> = by_source
            .into_iter()
            .filter(|(_, tos)| tos.len() > 1)
            .collect();
        if !sources.is_empty() {
            conflicts.push(Conflict::Reduce {
                state: ReduceID(i as u32),
                nonterminal: state.nonterminal.clone(),
                sources,
            });
        }
    }

    for conflict in &conflicts {
        match conflict {
            Conflict::Readahead { state, symbols } => {
                tracing::warn!(?state, ?symbols, "readahead conflict")
            }
            Conflict::Reduce {
                state,
                nonterminal,
                sources,
            } => tracing::warn!(?state, %nonterminal, ?sources, "restart conflict"),
        }
    }
    conflicts
}
