//! Epsilon-generation, First and Follow sets.
//!
//! All three are monotone set-union fixed points: the sets only grow, and the
//! loops stop as soon as one full pass over the productions adds nothing.

use crate::{
    fsm::{Fsm, StateID},
    grammar::Grammar,
    label::Label,
    types::{Map, Set},
};

/// Whether `label` can be traversed without consuming input: a semantic
/// action, a zero-width look, or a nonterminal in `nullables`.
pub fn is_epsilon_like(label: &Label, nullables: &Set<String>) -> bool {
    match label {
        Label::Action { .. } => true,
        Label::Symbol { name, attributes } => !attributes.read || nullables.contains(name),
    }
}

/// The epsilon closure of `states` within `fsm`.
pub fn e_successors(
    fsm: &Fsm,
    states: impl IntoIterator<Item = StateID>,
    nullables: &Set<String>,
) -> Set<StateID> {
    let mut closure: Set<StateID> = states.into_iter().collect();
    let mut i = 0;
    while let Some(&state) = closure.get_index(i) {
        for t in &fsm.state(state).transitions {
            if is_epsilon_like(&t.label, nullables) {
                closure.insert(t.target);
            }
        }
        i += 1;
    }
    closure
}

/// Compute and store the analysis results of every production.
#[tracing::instrument(skip_all)]
pub fn analyze(g: &mut Grammar) {
    let nullables = nullables(g);
    let first_sets = first_sets(g, &nullables);
    let follow_sets = follow_sets(g, &nullables, &first_sets);

    for production in g.productions.values_mut() {
        let left = &production.left;
        production.generates_e = nullables.contains(left);
        production.first_set = first_sets.get(left).cloned().unwrap_or_default();
        production.follow_set = follow_sets.get(left).cloned().unwrap_or_default();
    }
    g.nullables = nullables;

    tracing::debug!(
        nullables = g.nullables.len(),
        productions = g.productions.len(),
        "grammar analyzed"
    );
}

fn nullables(g: &Grammar) -> Set<String> {
    let mut nullables = Set::default();
    loop {
        let mut changed = false;
        for p in g.productions.values() {
            if nullables.contains(&p.left) {
                continue;
            }
            let closure = e_successors(&p.fsm, p.fsm.initial_states(), &nullables);
            if closure.iter().any(|s| p.fsm.state(*s).is_final) {
                changed |= nullables.insert(p.left.clone());
            }
        }
        if !changed {
            break;
        }
    }
    nullables
}

fn first_sets(g: &Grammar, nullables: &Set<String>) -> Map<String, Set<String>> {
    let mut first = Map::<String, Set<String>>::default();
    for p in g.productions.values() {
        first.entry(p.left.clone()).or_default();
    }

    loop {
        let mut changed = false;
        for p in g.productions.values() {
            let mut added = Set::default();
            for state in e_successors(&p.fsm, p.fsm.initial_states(), nullables) {
                for t in &p.fsm.state(state).transitions {
                    if g.is_nonterminal_label(&t.label) {
                        if let Some(sub) = first.get(t.label.name()) {
                            added.extend(sub.iter().cloned());
                        }
                    } else if g.is_read_terminal(&t.label) {
                        added.insert(t.label.name().to_owned());
                    }
                }
            }
            let slot = first.entry(p.left.clone()).or_default();
            let before = slot.len();
            slot.extend(added);
            changed |= slot.len() != before;
        }
        if !changed {
            break;
        }
    }
    first
}

fn follow_sets(
    g: &Grammar,
    nullables: &Set<String>,
    first: &Map<String, Set<String>>,
) -> Map<String, Set<String>> {
    let mut follow = Map::<String, Set<String>>::default();
    for n in &g.nonterminals {
        follow.insert(n.clone(), Set::default());
    }
    for (_, goal) in g.goals() {
        if let Some(lookahead) = &goal.lookahead {
            follow[&goal.left].extend(lookahead.iter().cloned());
        }
    }

    loop {
        let mut changed = false;
        for p in g.productions.values() {
            for (_, t) in p.fsm.transitions() {
                if !g.is_nonterminal_label(&t.label) {
                    continue;
                }
                let mut added = Set::default();
                for r in e_successors(&p.fsm, Some(t.target), nullables) {
                    let r_state = p.fsm.state(r);
                    for u in &r_state.transitions {
                        if g.is_nonterminal_label(&u.label) {
                            if let Some(sub) = first.get(u.label.name()) {
                                added.extend(sub.iter().cloned());
                            }
                        } else if g.is_read_terminal(&u.label) {
                            added.insert(u.label.name().to_owned());
                        }
                    }
                    if r_state.is_final {
                        added.extend(follow[&p.left].iter().cloned());
                    }
                }
                let slot = follow.entry(t.label.name().to_owned()).or_default();
                let before = slot.len();
                slot.extend(added);
                changed |= slot.len() != before;
            }
        }
        if !changed {
            break;
        }
    }
    follow
}
