//! Readback states, lookback and reduce states.
//!
//! A readback state walks the parse stack backwards over the right part of a
//! single nonterminal. Stack entries are keyed by `(symbol, readahead
//! state)`, which is exactly a [`Pairing::Label`].

use super::{
    Constructor, Pairing, ReadaheadID, ReadbackID, ReadbackState, ReduceID, ReduceState, Restart,
    Target,
};
use crate::{
    grammar::Grammar,
    label::{Attributes, Label},
    types::{Map, Queue, Set},
};

impl Constructor<'_> {
    /// Split `left` into the edges that consumed input and those that did not.
    #[tracing::instrument(skip_all)]
    pub(super) fn split_left(&mut self) {
        self.visible_left = self.left.filtered(|label| label.is_read());
        self.invisible_left = self.left.filtered(|label| !label.is_read());
        tracing::trace!(
            visible = self.visible_left.len(),
            invisible = self.invisible_left.len()
        );
    }

    fn readback_for(&mut self, left_part: &str, items: impl IntoIterator<Item = Pairing>) -> ReadbackID {
        let mut kernel: Vec<Pairing> = items.into_iter().collect();
        kernel.sort();
        kernel.dedup();
        if let Some(&id) = self.readback_kernels.get(&kernel) {
            return id;
        }
        let id = ReadbackID(self.readbacks.len() as u32);
        self.readback_kernels.insert(kernel.clone(), id);
        self.readbacks.push(ReadbackState {
            left_part: left_part.to_owned(),
            initial_items: kernel,
            final_items: Set::default(),
            transitions: vec![],
        });
        id
    }

    fn reduce_for(&self, nonterminal: &str) -> Option<ReduceID> {
        self.reduces
            .iter()
            .position(|r| r.nonterminal == nonterminal)
            .map(|i| ReduceID(i as u32))
    }

    /// Wire every completed right part to either the accept state or a
    /// readback state, then build the readback states themselves.
    #[tracing::instrument(skip_all)]
    pub(super) fn build_readbacks(&mut self) {
        let g = self.g;

        self.reduces = g
            .productions
            .values()
            .filter(|p| !p.is_goal())
            .map(|p| ReduceState {
                nonterminal: p.left.clone(),
                restarts: vec![],
            })
            .collect();

        for current in 0..self.readaheads.len() {
            let id = ReadaheadID(current as u32);

            let mut completed = Map::<String, Vec<Pairing>>::default();
            for item in &self.readahead(id).final_items {
                let state = g.production(item.production).fsm.state(item.state);
                if let (true, Some(left_part)) = (state.is_final, &state.left_part) {
                    completed
                        .entry(left_part.clone())
                        .or_default()
                        .push(Pairing::State(*item, id));
                }
            }

            let mut transitions = vec![];
            for (left_part, pairings) in completed {
                let Some((_, p)) = g.production_for(&left_part) else {
                    continue;
                };
                if let Some(lookahead) = &p.lookahead {
                    self.has_accept = true;
                    for name in lookahead {
                        transitions.push((Label::symbol(name.clone(), Attributes::LOOK), Target::Accept));
                    }
                    continue;
                }
                let readback = self.readback_for(&left_part, pairings);
                for name in &p.follow_set {
                    transitions.push((
                        Label::symbol(name.clone(), Attributes::LOOK),
                        Target::Readback(readback),
                    ));
                }
            }
            self.readahead_mut(id).transitions.extend(transitions);
        }

        let mut current = 0;
        while current < self.readbacks.len() {
            let id = ReadbackID(current as u32);
            current += 1;

            let closure = self
                .invisible_left
                .perform_star(&self.readbacks[id.index()].initial_items);

            let mut partition = Map::<Pairing, Set<Pairing>>::default();
            for pairing in &closure {
                for (label, pred) in self.visible_left.from(pairing) {
                    partition
                        .entry(Pairing::Label(label.clone(), pairing.readahead()))
                        .or_default()
                        .insert(pred.clone());
                }
            }

            let left_part = self.readbacks[id.index()].left_part.clone();
            let mut transitions = vec![];
            for (key, preds) in partition {
                let next = self.readback_for(&left_part, preds);
                transitions.push((key, Target::Readback(next)));
            }

            let starts: Vec<Pairing> = closure
                .iter()
                .filter(|pairing| pairing.item().map_or(false, |item| self.is_initial_item(item)))
                .cloned()
                .collect();
            if !starts.is_empty() {
                if let Some(reduce) = self.reduce_for(&left_part) {
                    for key in self.lookback(&starts) {
                        transitions.push((key, Target::Reduce(reduce)));
                    }
                }
            }

            let state = &mut self.readbacks[id.index()];
            state.final_items = closure;
            state.transitions = transitions;
        }

        tracing::debug!(readbacks = self.readbacks.len());
    }

    /// The stack entries that may lie directly below a right part starting at
    /// `starts`.
    fn lookback(&self, starts: &[Pairing]) -> Set<Pairing> {
        let mut callers = Set::<Pairing>::default();
        let mut queue: Queue<Pairing> = self.up.perform_once(starts).into_iter().collect();
        while let Some(pairing) = queue.pop() {
            if !callers.insert(pairing.clone()) {
                continue;
            }
            queue.extend(
                self.up
                    .from(&pairing)
                    .chain(self.invisible_left.from(&pairing))
                    .map(|(_, to)| to)
                    .filter(|to| !callers.contains(*to))
                    .cloned(),
            );
        }

        let mut keys = Set::default();
        for pairing in &callers {
            let ra = pairing.readahead();
            for (label, _) in self.visible_left.from(pairing) {
                keys.insert(Pairing::Label(label.as_look(), ra));
            }
            let is_seed_kernel = self.seeds.iter().any(|(seed, _)| *seed == ra)
                && pairing
                    .item()
                    .map_or(false, |item| self.readahead(ra).initial_items.contains(&item));
            if is_seed_kernel {
                keys.insert(Pairing::Label(
                    Label::symbol(Grammar::END_OF_INPUT, Attributes::LOOK),
                    ra,
                ));
            }
        }
        keys
    }

    /// Move every nonterminal transition of the readahead states into the
    /// restarts of the corresponding reduce state.
    ///
    /// A restart also applies to each stackable state the source can be
    /// reached from without consuming input, since that is what the stack
    /// holds after the reduction.
    #[tracing::instrument(skip_all)]
    pub(super) fn build_reduce_alternates(&mut self) {
        let g = self.g;
        for current in 0..self.readaheads.len() {
            let id = ReadaheadID(current as u32);
            let transitions = std::mem::take(&mut self.readahead_mut(id).transitions);
            let mut kept = Vec::with_capacity(transitions.len());
            for (label, target) in transitions {
                match (g.is_nonterminal_label(&label), target) {
                    (true, Target::Readahead(to)) => {
                        if let Some(reduce) = self.reduce_for(label.name()) {
                            self.reduces[reduce.index()].restarts.push(Restart {
                                from: id,
                                label,
                                to,
                            });
                        }
                    }
                    _ => kept.push((label, target)),
                }
            }
            self.readahead_mut(id).transitions = kept;
        }

        for current in 0..self.reduces.len() {
            let mut restarts: Set<Restart> = self.reduces[current].restarts.drain(..).collect();
            let direct: Vec<Restart> = restarts.iter().cloned().collect();
            for restart in direct {
                for from in self.invisible_states.perform_star(Some(&restart.from)) {
                    if from != restart.from && self.readahead(from).stackable {
                        restarts.insert(Restart {
                            from,
                            label: restart.label.clone(),
                            to: restart.to,
                        });
                    }
                }
            }
            self.reduces[current].restarts = restarts.into_iter().collect();
        }

        tracing::debug!(
            restarts = self.reduces.iter().map(|r| r.restarts.len()).sum::<usize>()
        );
    }
}
