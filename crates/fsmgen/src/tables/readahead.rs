//! Readahead subset construction and the phases that only touch readahead
//! states.

use super::{Constructor, Item, Pairing, ReadaheadID, ReadaheadState, SemanticState, Target};
use crate::{
    grammar::ProductionID,
    label::{Attributes, Label},
    types::Set,
};

impl Constructor<'_> {
    /// Collect `right` and `down` over every production body.
    #[tracing::instrument(skip_all)]
    pub(super) fn build_relations(&mut self) {
        let g = self.g;
        for (&production, p) in &g.productions {
            for (from, t) in p.fsm.transitions() {
                let from = Item {
                    production,
                    state: from,
                };
                self.right.add(
                    from,
                    t.label.clone(),
                    Item {
                        production,
                        state: t.target,
                    },
                );

                if !g.is_nonterminal_label(&t.label) {
                    continue;
                }
                if let Some((callee, body)) = g.production_for(t.label.name()) {
                    for state in body.fsm.initial_states() {
                        self.down.add(
                            from,
                            t.label.clone(),
                            Item {
                                production: callee,
                                state,
                            },
                        );
                    }
                }
            }
        }
        tracing::trace!(right = self.right.len(), down = self.down.len());
    }

    /// Look up or create the readahead state for the given items.
    fn readahead_for(&mut self, items: impl IntoIterator<Item = Item>) -> ReadaheadID {
        let mut kernel: Vec<Item> = items.into_iter().collect();
        kernel.sort();
        kernel.dedup();
        if let Some(&id) = self.readahead_kernels.get(&kernel) {
            return id;
        }
        let id = ReadaheadID(self.readaheads.len() as u32);
        self.readahead_kernels.insert(kernel.clone(), id);
        self.readaheads.push(ReadaheadState {
            initial_items: kernel,
            final_items: Set::default(),
            follow: Set::default(),
            transitions: vec![],
            stackable: false,
        });
        id
    }

    #[tracing::instrument(skip_all)]
    pub(super) fn build_readaheads(&mut self) {
        let g = self.g;
        let seeds: Vec<(ReadaheadID, ProductionID)> = g
            .goals()
            .map(|(production, p)| {
                let items = p
                    .fsm
                    .initial_states()
                    .into_iter()
                    .map(|state| Item { production, state });
                (self.readahead_for(items), production)
            })
            .collect();
        for (id, _) in &seeds {
            self.readahead_mut(*id).stackable = true;
        }
        self.seeds = seeds;

        // States are appended as they are discovered.
        let mut current = 0;
        while current < self.readaheads.len() {
            let id = ReadaheadID(current as u32);
            current += 1;

            let closure = self.down.perform_star(&self.readahead(id).initial_items);
            for item in &closure {
                for (label, to) in self.down.from(item) {
                    self.up.add(
                        Pairing::State(*to, id),
                        label.clone(),
                        Pairing::State(*item, id),
                    );
                }
            }

            let mut transitions = vec![];
            for (label, successors) in self.right.partition_by_relationship(&closure) {
                if g.kind.is_scanner() && g.is_nonterminal_label(&label) {
                    continue;
                }
                let next = self.readahead_for(successors);
                for pred in &closure {
                    for succ in self.right.perform_once_on(Some(pred), &label) {
                        self.left.add(
                            Pairing::State(succ, next),
                            label.clone(),
                            Pairing::State(*pred, id),
                        );
                    }
                }
                if label.is_read() {
                    self.readahead_mut(next).stackable = true;
                } else {
                    self.invisible_states.add(next, label.clone(), id);
                }
                transitions.push((label, Target::Readahead(next)));
            }

            let follow = self.follow_of(&closure);
            let state = self.readahead_mut(id);
            state.final_items = closure;
            state.transitions = transitions;
            state.follow = follow;
        }

        tracing::debug!(readaheads = self.readaheads.len());
    }

    /// The terminals that may be consumed or looked at next from `items`.
    fn follow_of(&self, items: &Set<Item>) -> Set<String> {
        let g = self.g;
        let mut follow = Set::default();
        for item in items {
            let p = g.production(item.production);
            for state in g.e_successors(item.production, Some(item.state)) {
                let state = p.fsm.state(state);
                for t in &state.transitions {
                    match &t.label {
                        Label::Action { .. } => (),
                        label if g.is_nonterminal_label(label) => {
                            if let Some(first) = g.first(label.name()) {
                                follow.extend(first.iter().cloned());
                            }
                        }
                        label => {
                            follow.insert(label.name().to_owned());
                        }
                    }
                }
                if state.is_final {
                    follow.extend(p.follow_set.iter().cloned());
                }
            }
        }
        follow
    }

    /// Replace each action transition by lookahead transitions into a
    /// semantic state that fires the action and then enters the original
    /// successor.
    #[tracing::instrument(skip_all)]
    pub(super) fn extract_semantic_states(&mut self) {
        for current in 0..self.readaheads.len() {
            let id = ReadaheadID(current as u32);
            let transitions = std::mem::take(&mut self.readahead_mut(id).transitions);
            let mut extracted = Vec::with_capacity(transitions.len());
            for (label, target) in transitions {
                let goto = match target {
                    Target::Readahead(goto) if label.is_action() => goto,
                    _ => {
                        extracted.push((label, target));
                        continue;
                    }
                };
                let (index, _) = self.semantics.insert_full(SemanticState {
                    action: label,
                    goto,
                });
                let semantic = super::SemanticID(index as u32);
                for name in &self.readahead(goto).follow {
                    extracted.push((
                        Label::symbol(name.clone(), Attributes::LOOK),
                        Target::Semantic(semantic),
                    ));
                }
            }
            self.readahead_mut(id).transitions = extracted;
        }
        tracing::debug!(semantics = self.semantics.len());
    }

    /// Let a scanner restart from its initial state once a token is complete,
    /// by looking at what may follow the token.
    ///
    /// A symbol the state can already move on is left alone, so the longest
    /// token wins.
    #[tracing::instrument(skip_all)]
    pub(super) fn bridge_scanner_follows(&mut self) {
        let g = self.g;
        let Some(&(fallback, _)) = self.seeds.first() else {
            return;
        };
        for current in 0..self.readaheads.len() {
            let id = ReadaheadID(current as u32);
            let mut names: Set<String> = self
                .readahead(id)
                .transitions
                .iter()
                .map(|(label, _)| label.name().to_owned())
                .collect();
            let mut bridges = vec![];
            for item in &self.readahead(id).final_items {
                if !self.is_final_item(*item) {
                    continue;
                }
                let p = g.production(item.production);
                let restart = self
                    .seeds
                    .iter()
                    .find(|(_, production)| *production == item.production)
                    .map_or(fallback, |(seed, _)| *seed);
                if restart == id {
                    continue;
                }
                for name in &p.follow_set {
                    if names.insert(name.clone()) {
                        bridges.push((
                            Label::symbol(name.clone(), Attributes::LOOK),
                            Target::Readahead(restart),
                        ));
                    }
                }
            }
            self.readahead_mut(id).transitions.extend(bridges);
        }
    }
}
