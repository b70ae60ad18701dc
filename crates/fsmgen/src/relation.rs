//! Labeled binary relations and their closures.
//!
//! A [`Relation`] stores `(from, relationship, to)` triples over an item type
//! `I` and a relationship type `R`. It has no grammar semantics of its own;
//! the FSM reduction and the table constructor express their reachability
//! computations in terms of it.

use crate::types::{Map, Set};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct Relation<I, R> {
    edges: Map<I, Map<R, Set<I>>>,
    len: usize,
}

impl<I, R> Default for Relation<I, R> {
    fn default() -> Self {
        Self {
            edges: Map::default(),
            len: 0,
        }
    }
}

impl<I, R> Relation<I, R>
where
    I: Clone + Eq + Hash,
    R: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple. Returns `false` if it was already present.
    pub fn add(&mut self, from: I, relationship: R, to: I) -> bool {
        let added = self
            .edges
            .entry(from)
            .or_default()
            .entry(relationship)
            .or_default()
            .insert(to);
        if added {
            self.len += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, from: &I, relationship: &R, to: &I) -> bool {
        self.edges
            .get(from)
            .and_then(|rels| rels.get(relationship))
            .map_or(false, |tos| tos.contains(to))
    }

    /// The outgoing `(relationship, to)` pairs of `item`.
    pub fn from<'r>(&'r self, item: &I) -> impl Iterator<Item = (&'r R, &'r I)> + 'r {
        self.edges
            .get(item)
            .into_iter()
            .flat_map(|rels| rels.iter())
            .flat_map(|(rel, tos)| tos.iter().map(move |to| (rel, to)))
    }

    pub fn triples(&self) -> impl Iterator<Item = (&I, &R, &I)> + '_ {
        self.edges.iter().flat_map(|(from, rels)| {
            rels.iter()
                .flat_map(move |(rel, tos)| tos.iter().map(move |to| (from, rel, to)))
        })
    }

    /// One step along any relationship.
    pub fn perform_once<'a>(&self, items: impl IntoIterator<Item = &'a I>) -> Set<I>
    where
        I: 'a,
    {
        let mut result = Set::default();
        for item in items {
            result.extend(self.from(item).map(|(_, to)| to.clone()));
        }
        result
    }

    /// One step along `relationship` only.
    pub fn perform_once_on<'a>(
        &self,
        items: impl IntoIterator<Item = &'a I>,
        relationship: &R,
    ) -> Set<I>
    where
        I: 'a,
    {
        let mut result = Set::default();
        for item in items {
            if let Some(tos) = self.edges.get(item).and_then(|rels| rels.get(relationship)) {
                result.extend(tos.iter().cloned());
            }
        }
        result
    }

    /// The reflexive transitive closure of `items`.
    pub fn perform_star<'a>(&self, items: impl IntoIterator<Item = &'a I>) -> Set<I>
    where
        I: 'a,
    {
        let mut result: Set<I> = items.into_iter().cloned().collect();
        let mut i = 0;
        while let Some(item) = result.get_index(i).cloned() {
            for (_, to) in self.from(&item) {
                if !result.contains(to) {
                    result.insert(to.clone());
                }
            }
            i += 1;
        }
        result
    }

    /// Group the successors of `items` by the relationship that leads to them.
    pub fn partition_by_relationship<'a>(
        &self,
        items: impl IntoIterator<Item = &'a I>,
    ) -> Map<R, Set<I>>
    where
        I: 'a,
    {
        let mut partition = Map::<R, Set<I>>::default();
        for item in items {
            for (rel, to) in self.from(item) {
                partition.entry(rel.clone()).or_default().insert(to.clone());
            }
        }
        partition
    }

    /// The same relation with every triple reversed.
    pub fn inverted(&self) -> Self {
        self.triples()
            .map(|(from, rel, to)| (to.clone(), rel.clone(), from.clone()))
            .collect()
    }

    /// The triples whose relationship satisfies `pred`.
    pub fn filtered(&self, mut pred: impl FnMut(&R) -> bool) -> Self {
        self.triples()
            .filter(|(_, rel, _)| pred(rel))
            .map(|(from, rel, to)| (from.clone(), rel.clone(), to.clone()))
            .collect()
    }
}

impl<I, R> Extend<(I, R, I)> for Relation<I, R>
where
    I: Clone + Eq + Hash,
    R: Clone + Eq + Hash,
{
    fn extend<T: IntoIterator<Item = (I, R, I)>>(&mut self, iter: T) {
        for (from, rel, to) in iter {
            self.add(from, rel, to);
        }
    }
}

impl<I, R> FromIterator<(I, R, I)> for Relation<I, R>
where
    I: Clone + Eq + Hash,
    R: Clone + Eq + Hash,
{
    fn from_iter<T: IntoIterator<Item = (I, R, I)>>(iter: T) -> Self {
        let mut relation = Self::new();
        relation.extend(iter);
        relation
    }
}
