//! Finite-state machines and their algebra.
//!
//! An [`Fsm`] owns its states in an arena indexed by [`StateID`]. All of the
//! operators below consume or copy their operands, so subexpression automata
//! are never aliased, and leave the result in its reduced form: every state is
//! reachable from some initial state and reaches some final state.

use crate::{
    label::{ActionParam, Attributes, Label},
    relation::Relation,
    types::{Map, Queue, Set},
    util::display_fn,
};
use bit_set::BitSet;
use std::{fmt, ops::RangeInclusive};

#[derive(Debug, thiserror::Error)]
pub enum AlgebraError {
    #[error("`{operation}' requires at least one operand")]
    EmptyOperands { operation: &'static str },

    #[error("`{operation}' is undefined for automata containing semantic actions")]
    IncompatibleAlphabets { operation: &'static str },

    #[error("{code:#x} is not a valid character code")]
    InvalidCode { code: u32 },
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);

/// A pair of state sets, one from each operand of a product construction.
type Dual = (Vec<StateID>, Vec<StateID>);

impl StateID {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    pub label: Label,
    pub target: StateID,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub is_initial: bool,
    pub is_final: bool,
    /// The nonterminal whose body this state belongs to, once registered.
    pub left_part: Option<String>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fsm {
    states: Vec<State>,
}

impl Fsm {
    /// Recognizes only the empty string.
    pub fn empty() -> Self {
        let mut fsm = Self::default();
        fsm.add_state(true, true);
        fsm
    }

    /// Recognizes a single symbol with the given label.
    pub fn for_symbol(label: Label) -> Self {
        let mut fsm = Self::default();
        let from = fsm.add_state(true, false);
        let to = fsm.add_state(false, true);
        fsm.add_transition(from, label, to);
        fsm
    }

    pub fn for_action(name: impl Into<String>, params: Vec<ActionParam>, tree_building: bool) -> Self {
        Self::for_symbol(Label::action(name, params, tree_building))
    }

    /// One symbol transition per character of `s`, in sequence.
    pub fn for_string(s: &str, attributes: Attributes) -> Self {
        let mut fsm = Self::default();
        let mut current = fsm.add_state(true, s.is_empty());
        let mut chars = s.chars().peekable();
        while let Some(ch) = chars.next() {
            let next = fsm.add_state(false, chars.peek().is_none());
            fsm.add_transition(current, Label::symbol(ch, attributes), next);
            current = next;
        }
        fsm
    }

    pub fn for_integer(code: u32, attributes: Attributes) -> Result<Self, AlgebraError> {
        Self::for_integers(code..=code, attributes)
    }

    /// One transition per code point in `codes`, all between the same pair of
    /// states.
    pub fn for_integers(codes: RangeInclusive<u32>, attributes: Attributes) -> Result<Self, AlgebraError> {
        if codes.is_empty() {
            return Err(AlgebraError::EmptyOperands {
                operation: "for_integers",
            });
        }
        let mut fsm = Self::default();
        let from = fsm.add_state(true, false);
        let to = fsm.add_state(false, true);
        for code in codes {
            let name = symbol_for_code(code)?;
            fsm.add_transition(from, Label::symbol(name, attributes), to);
        }
        Ok(fsm)
    }

    pub fn for_characters(chars: RangeInclusive<char>, attributes: Attributes) -> Result<Self, AlgebraError> {
        Self::for_integers(u32::from(*chars.start())..=u32::from(*chars.end()), attributes)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.index()]
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (StateID(i as u32), state))
    }

    pub fn transitions(&self) -> impl Iterator<Item = (StateID, &Transition)> + '_ {
        self.states()
            .flat_map(|(id, state)| state.transitions.iter().map(move |t| (id, t)))
    }

    pub fn initial_states(&self) -> Vec<StateID> {
        self.states()
            .filter_map(|(id, s)| s.is_initial.then_some(id))
            .collect()
    }

    pub fn final_states(&self) -> Vec<StateID> {
        self.states()
            .filter_map(|(id, s)| s.is_final.then_some(id))
            .collect()
    }

    /// Whether some state is both initial and final.
    pub fn accepts_empty(&self) -> bool {
        self.states.iter().any(|s| s.is_initial && s.is_final)
    }

    pub fn add_state(&mut self, is_initial: bool, is_final: bool) -> StateID {
        let id = StateID(self.states.len() as u32);
        self.states.push(State {
            is_initial,
            is_final,
            ..Default::default()
        });
        id
    }

    /// Add a transition unless an identical one already exists.
    pub fn add_transition(&mut self, from: StateID, label: Label, target: StateID) {
        let transition = Transition { label, target };
        let transitions = &mut self.states[from.index()].transitions;
        if !transitions.contains(&transition) {
            transitions.push(transition);
        }
    }

    pub fn set_left_part(&mut self, name: &str) {
        for state in &mut self.states {
            state.left_part = Some(name.to_owned());
        }
    }

    /// A deep copy with the same state numbering.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Move the states of `other` behind those of `self`, returning the offset
    /// applied to `other`'s state ids.
    fn append(&mut self, other: Fsm) -> u32 {
        let offset = self.states.len() as u32;
        self.states.extend(other.states.into_iter().map(|mut state| {
            for t in &mut state.transitions {
                t.target = StateID(t.target.0 + offset);
            }
            state
        }));
        offset
    }

    fn initial_transitions(&self) -> Vec<Transition> {
        self.states
            .iter()
            .filter(|s| s.is_initial)
            .flat_map(|s| s.transitions.iter().cloned())
            .collect()
    }

    /// Disjoint union; initial and final states are kept from both operands.
    pub fn union(mut self, other: Fsm) -> Self {
        self.append(other);
        self
    }

    pub fn or_all(fsms: impl IntoIterator<Item = Fsm>) -> Result<Self, AlgebraError> {
        fsms.into_iter()
            .reduce(Fsm::union)
            .ok_or(AlgebraError::EmptyOperands { operation: "or_all" })
    }

    pub fn concatenate(mut self, other: Fsm) -> Self {
        let left_empty = self.accepts_empty();
        let right_empty = other.accepts_empty();
        let left_finals = self.final_states();

        let offset = self.append(other);
        let right_initials: Vec<_> = self
            .initial_states()
            .into_iter()
            .filter(|s| s.0 >= offset)
            .collect();
        let bridges: Vec<Transition> = right_initials
            .iter()
            .flat_map(|s| self.state(*s).transitions.iter().cloned())
            .collect();

        for &state in &left_finals {
            for t in &bridges {
                self.add_transition(state, t.label.clone(), t.target);
            }
            if !right_empty {
                self.states[state.index()].is_final = false;
            }
        }
        if !left_empty {
            for state in right_initials {
                self.states[state.index()].is_initial = false;
            }
        }

        self.reduce();
        self
    }

    pub fn concatenate_all(fsms: impl IntoIterator<Item = Fsm>) -> Result<Self, AlgebraError> {
        fsms.into_iter()
            .reduce(Fsm::concatenate)
            .ok_or(AlgebraError::EmptyOperands {
                operation: "concatenate_all",
            })
    }

    /// One or more repetitions.
    pub fn plus(mut self) -> Self {
        let loops = self.initial_transitions();
        for state in self.final_states() {
            for t in &loops {
                self.add_transition(state, t.label.clone(), t.target);
            }
        }
        self
    }

    /// Zero or more repetitions.
    pub fn star(self) -> Self {
        self.plus().union(Fsm::empty())
    }

    pub fn optional(self) -> Self {
        if self.accepts_empty() {
            self
        } else {
            self.union(Fsm::empty())
        }
    }

    /// Rewrite every label with `f`.
    pub fn map_labels(mut self, mut f: impl FnMut(&Label) -> Label) -> Self {
        for state in &mut self.states {
            for t in &mut state.transitions {
                t.label = f(&t.label);
            }
            dedup_transitions(&mut state.transitions);
        }
        self
    }

    /// Turn every symbol transition into a zero-width lookahead.
    pub fn look(self) -> Self {
        self.map_labels(|label| match label {
            Label::Symbol { .. } => label.as_look(),
            Label::Action { .. } => label.clone(),
        })
    }

    /// Fold `tokens` over the attributes of every symbol transition.
    ///
    /// Returns the first unknown token on failure.
    pub fn with_attributes<'a>(mut self, tokens: &[&'a str]) -> Result<Self, &'a str> {
        for state in &mut self.states {
            for t in &mut state.transitions {
                if let Label::Symbol { attributes, .. } = &mut t.label {
                    *attributes = attributes.apply(tokens.iter().copied())?;
                }
            }
            dedup_transitions(&mut state.transitions);
        }
        Ok(self)
    }

    pub fn intersect(&self, other: &Fsm) -> Result<Self, AlgebraError> {
        self.product(
            other,
            "intersect",
            |left, right| !left.is_empty() && !right.is_empty(),
            |left, right| left && right,
        )
    }

    pub fn difference(&self, other: &Fsm) -> Result<Self, AlgebraError> {
        self.product(
            other,
            "difference",
            |left, _| !left.is_empty(),
            |left, right| left && !right,
        )
    }

    /// Subset-product construction over pairs of state sets.
    ///
    /// Product state `i` is the `i`-th entry of `duals`.
    fn product(
        &self,
        other: &Fsm,
        operation: &'static str,
        is_live: impl Fn(&[StateID], &[StateID]) -> bool,
        is_final: impl Fn(bool, bool) -> bool,
    ) -> Result<Self, AlgebraError> {
        let has_action = |fsm: &Fsm| fsm.transitions().any(|(_, t)| t.label.is_action());
        if has_action(self) || has_action(other) {
            return Err(AlgebraError::IncompatibleAlphabets { operation });
        }

        let mut product = Fsm::default();
        let mut duals = Map::<Dual, StateID>::default();
        let mut pending = Queue::<StateID>::default();

        let start = (self.initial_states(), other.initial_states());
        if !is_live(&start.0, &start.1) {
            return Ok(product);
        }
        let accepting = is_final(self.any_final(&start.0), other.any_final(&start.1));
        let id = product.add_state(true, accepting);
        duals.insert(start, id);
        pending.push(id);

        while let Some(current) = pending.pop() {
            let (left, right) = match duals.get_index(current.index()) {
                Some((dual, _)) => dual.clone(),
                None => break,
            };

            let mut labels = Set::<&Label>::default();
            labels.extend(self.labels_from(&left));
            labels.extend(other.labels_from(&right));

            for label in labels {
                let next = (self.successors(&left, label), other.successors(&right, label));
                if !is_live(&next.0, &next.1) {
                    continue;
                }
                let target = match duals.get(&next) {
                    Some(id) => *id,
                    None => {
                        let accepting =
                            is_final(self.any_final(&next.0), other.any_final(&next.1));
                        let id = product.add_state(false, accepting);
                        duals.insert(next, id);
                        pending.push(id);
                        id
                    }
                };
                product.add_transition(current, label.clone(), target);
            }
        }

        product.reduce();
        Ok(product)
    }

    fn any_final(&self, states: &[StateID]) -> bool {
        states.iter().any(|s| self.state(*s).is_final)
    }

    fn labels_from<'a>(&'a self, states: &'a [StateID]) -> impl Iterator<Item = &'a Label> + 'a {
        states
            .iter()
            .flat_map(|s| self.state(*s).transitions.iter().map(|t| &t.label))
    }

    fn successors(&self, states: &[StateID], label: &Label) -> Vec<StateID> {
        let mut next: Vec<_> = states
            .iter()
            .flat_map(|s| self.state(*s).transitions.iter())
            .filter(|t| t.label == *label)
            .map(|t| t.target)
            .collect();
        next.sort();
        next.dedup();
        next
    }

    /// Discard every state that is not both reachable from an initial state and
    /// co-reachable to a final state.
    pub fn reduce(&mut self) {
        let edges: Relation<StateID, ()> = self
            .transitions()
            .map(|(from, t)| (from, (), t.target))
            .collect();

        let initials = self.initial_states();
        let finals = self.final_states();
        let mut useful: BitSet = edges
            .perform_star(&initials)
            .into_iter()
            .map(StateID::index)
            .collect();
        let backward: BitSet = edges
            .inverted()
            .perform_star(&finals)
            .into_iter()
            .map(StateID::index)
            .collect();
        useful.intersect_with(&backward);

        if useful.len() == self.states.len() {
            return;
        }

        let mut renumber = vec![None; self.states.len()];
        for (new, old) in useful.iter().enumerate() {
            renumber[old] = Some(StateID(new as u32));
        }

        let states = std::mem::take(&mut self.states);
        self.states = states
            .into_iter()
            .enumerate()
            .filter(|(i, _)| useful.contains(*i))
            .map(|(_, mut state)| {
                state.transitions = state
                    .transitions
                    .into_iter()
                    .filter_map(|t| {
                        renumber[t.target.index()].map(|target| Transition { target, ..t })
                    })
                    .collect();
                state
            })
            .collect();
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            for (id, state) in self.states() {
                write!(f, "{:?}", id)?;
                if state.is_initial {
                    f.write_str(" (initial)")?;
                }
                if state.is_final {
                    f.write_str(" (final)")?;
                }
                writeln!(f)?;
                for t in &state.transitions {
                    writeln!(f, "  {} -> {:?}", t.label, t.target)?;
                }
            }
            Ok(())
        })
    }
}

/// Drop repeated transitions, keeping the first occurrence of each.
fn dedup_transitions(transitions: &mut Vec<Transition>) {
    let mut seen = Set::default();
    transitions.retain(|t| seen.insert(t.clone()));
}

/// The terminal name of a character code.
pub fn symbol_for_code(code: u32) -> Result<String, AlgebraError> {
    char::from_u32(code)
        .map(String::from)
        .ok_or(AlgebraError::InvalidCode { code })
}
