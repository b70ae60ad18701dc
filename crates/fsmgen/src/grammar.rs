//! Grammar types.

use crate::{
    analysis,
    fsm::{AlgebraError, Fsm, StateID},
    label::{ActionParam, Attributes, Label},
    types::{Map, Set},
    util::{display_fn, verify_ident},
};
use std::fmt;

/// Selects the default attribute bundles and the table constructor path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    Scanner,
    Parser,
    /// A scanner whose terminals are whole strings rather than characters.
    SuperScanner,
}

impl GrammarKind {
    pub fn is_scanner(self) -> bool {
        matches!(self, Self::Scanner | Self::SuperScanner)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionID(u16);

impl ProductionID {
    pub const fn into_raw(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P#{:03}", self.0)
    }
}

/// A nonterminal together with its regular right part.
///
/// Alternatives declared for the same nonterminal are merged into one body,
/// so a grammar has exactly one production per nonterminal.
#[derive(Debug)]
#[non_exhaustive]
pub struct Production {
    pub left: String,
    pub fsm: Fsm,
    /// Present only for goal productions.
    pub lookahead: Option<Set<String>>,
    pub generates_e: bool,
    pub first_set: Set<String>,
    pub follow_set: Set<String>,
}

impl Production {
    pub fn is_goal(&self) -> bool {
        self.lookahead.is_some()
    }
}

/// The grammar definition used to derive the tables.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub kind: GrammarKind,
    pub nonterminals: Set<String>,
    pub keywords: Set<String>,
    pub productions: Map<ProductionID, Production>,
    /// Nonterminals known to generate the empty string.
    pub nullables: Set<String>,
}

impl Grammar {
    /// The conventional end-of-input marker.
    pub const END_OF_INPUT: &'static str = "-|";

    /// Define and analyze a grammar using the specified function.
    pub fn define<F>(kind: GrammarKind, f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef::new(kind);
        f(&mut def)?;
        def.end()
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    pub fn production_for(&self, nonterminal: &str) -> Option<(ProductionID, &Production)> {
        self.productions
            .iter()
            .find(|(_, p)| p.left == nonterminal)
            .map(|(id, p)| (*id, p))
    }

    pub fn goals(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions
            .iter()
            .filter(|(_, p)| p.is_goal())
            .map(|(id, p)| (*id, p))
    }

    pub fn is_nonterminal(&self, name: &str) -> bool {
        self.nonterminals.contains(name)
    }

    /// Whether `label` reads a terminal symbol.
    pub fn is_read_terminal(&self, label: &Label) -> bool {
        label.is_read() && !self.is_nonterminal(label.name())
    }

    /// Whether `label` names a nonterminal.
    pub fn is_nonterminal_label(&self, label: &Label) -> bool {
        matches!(label, Label::Symbol { name, .. } if self.is_nonterminal(name))
    }

    pub fn generates_e(&self, nonterminal: &str) -> bool {
        self.nullables.contains(nonterminal)
    }

    pub fn first(&self, nonterminal: &str) -> Option<&Set<String>> {
        self.production_for(nonterminal).map(|(_, p)| &p.first_set)
    }

    pub fn follow(&self, nonterminal: &str) -> Option<&Set<String>> {
        self.production_for(nonterminal).map(|(_, p)| &p.follow_set)
    }

    /// The states reachable from `states` in the body of `production` without
    /// consuming input.
    pub fn e_successors(
        &self,
        production: ProductionID,
        states: impl IntoIterator<Item = StateID>,
    ) -> Set<StateID> {
        analysis::e_successors(&self.production(production).fsm, states, &self.nullables)
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            writeln!(f, "## kind: {:?}", self.kind)?;
            if !self.keywords.is_empty() {
                let keywords: Vec<_> = self.keywords.iter().map(String::as_str).collect();
                writeln!(f, "## keywords: {}", keywords.join(" "))?;
            }
            for (id, p) in &self.productions {
                write!(f, "\n## {:?} {}", id, p.left)?;
                if let Some(lookahead) = &p.lookahead {
                    write!(f, " (goal, lookahead = {})", display_set(lookahead))?;
                }
                writeln!(f)?;
                writeln!(f, "generates_e: {}", p.generates_e)?;
                writeln!(f, "first: {}", display_set(&p.first_set))?;
                writeln!(f, "follow: {}", display_set(&p.follow_set))?;
                write!(f, "{}", p.fsm.display())?;
            }
            Ok(())
        })
    }
}

fn display_set(set: &Set<String>) -> impl fmt::Display + '_ {
    display_fn(move |f| {
        f.write_str("{")?;
        for (i, s) in set.iter().enumerate() {
            f.write_str(if i > 0 { ", " } else { " " })?;
            f.write_str(s)?;
        }
        f.write_str(" }")
    })
}

/// The contextual values for building a [`Grammar`].
#[derive(Debug)]
pub struct GrammarDef {
    kind: GrammarKind,
    nonterminals: Set<String>,
    keywords: Set<String>,
    macros: Map<String, Fsm>,
    productions: Map<String, (Fsm, Option<Set<String>>)>,
}

impl GrammarDef {
    pub fn new(kind: GrammarKind) -> Self {
        Self {
            kind,
            nonterminals: Set::default(),
            keywords: Set::default(),
            macros: Map::default(),
            productions: Map::default(),
        }
    }

    pub fn kind(&self) -> GrammarKind {
        self.kind
    }

    pub fn is_nonterminal(&self, name: &str) -> bool {
        self.nonterminals.contains(name)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<(), GrammarError> {
        if !verify_ident(name) {
            return Err(GrammarError::InvalidName { name: name.into() });
        }
        if self.macros.contains_key(name) {
            return Err(format!("`{}' is already defined as a macro", name).into());
        }
        self.nonterminals.insert(name.to_owned());
        Ok(())
    }

    /// Declare a keyword. Keywords are recorded for downstream consumers only.
    pub fn keyword(&mut self, name: &str) {
        self.keywords.insert(name.to_owned());
    }

    /// A label for `name` carrying the default attributes of this grammar.
    pub fn label(&self, name: &str) -> Label {
        Label::symbol(
            name,
            Attributes::default_for(self.kind, self.is_nonterminal(name)),
        )
    }

    /// An FSM recognizing the single symbol `name`.
    pub fn symbol(&self, name: &str) -> Fsm {
        Fsm::for_symbol(self.label(name))
    }

    /// An FSM firing the semantic action `name`.
    pub fn action(
        &self,
        name: &str,
        params: Vec<ActionParam>,
        tree_building: bool,
    ) -> Result<Fsm, GrammarError> {
        if !verify_ident(name) {
            return Err(GrammarError::InvalidName { name: name.into() });
        }
        Ok(Fsm::for_action(name, params, tree_building))
    }

    /// Define a macro, a named FSM that is copied into every use site.
    pub fn define_macro(&mut self, name: &str, fsm: Fsm) -> Result<(), GrammarError> {
        if self.macros.contains_key(name) {
            return Err(GrammarError::DuplicateMacro { name: name.into() });
        }
        if self.is_nonterminal(name) {
            return Err(format!("`{}' is already declared as a nonterminal", name).into());
        }
        self.macros.insert(name.to_owned(), fsm);
        Ok(())
    }

    /// A private copy of the macro `name`.
    pub fn expand_macro(&self, name: &str) -> Result<Fsm, GrammarError> {
        self.macros
            .get(name)
            .map(Fsm::copy)
            .ok_or_else(|| GrammarError::UndefinedMacro { name: name.into() })
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Add an alternative right part for `left`.
    pub fn production(&mut self, left: &str, fsm: Fsm) -> Result<(), GrammarError> {
        self.nonterminal(left)?;
        match self.productions.get_mut(left) {
            Some((body, _)) => *body = std::mem::take(body).union(fsm),
            None => {
                self.productions.insert(left.to_owned(), (fsm, None));
            }
        }
        Ok(())
    }

    /// Add an alternative right part for `left` and mark it as a goal that
    /// is accepted when followed by one of `lookahead`.
    pub fn goal<I>(&mut self, left: &str, fsm: Fsm, lookahead: I) -> Result<(), GrammarError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let lookahead: Set<String> = lookahead.into_iter().map(Into::into).collect();
        if lookahead.is_empty() {
            return Err(GrammarError::EmptyLookahead { name: left.into() });
        }
        self.production(left, fsm)?;
        if let Some((_, slot)) = self.productions.get_mut(left) {
            slot.get_or_insert_with(Set::default).extend(lookahead);
        }
        Ok(())
    }

    /// Demote every parser goal that also appears in a right part to an
    /// ordinary production, accepted through a synthesized goal `left'` that
    /// derives only it.
    fn wrap_referenced_goals(&mut self) {
        let referenced: Set<String> = self
            .productions
            .values()
            .flat_map(|(fsm, _)| fsm.transitions())
            .filter(|(_, t)| !t.label.is_action())
            .map(|(_, t)| t.label.name().to_owned())
            .collect();

        for (left, (fsm, lookahead)) in std::mem::take(&mut self.productions) {
            match lookahead {
                Some(lookahead) if referenced.contains(&left) => {
                    let wrapper = format!("{}'", left);
                    tracing::debug!(goal = %left, %wrapper, "wrapping a referenced goal");
                    let body = self.symbol(&left);
                    self.nonterminals.insert(wrapper.clone());
                    self.productions.insert(left, (fsm, None));
                    self.productions.insert(wrapper, (body, Some(lookahead)));
                }
                lookahead => {
                    self.productions.insert(left, (fsm, lookahead));
                }
            }
        }
    }

    /// Register the collected productions and analyze the grammar.
    pub fn end(mut self) -> Result<Grammar, GrammarError> {
        if self.productions.values().all(|(_, lookahead)| lookahead.is_none()) {
            return Err(GrammarError::MissingGoal);
        }
        if self.kind == GrammarKind::Parser {
            self.wrap_referenced_goals();
        }

        let mut productions = Map::default();
        for (i, (left, (mut fsm, lookahead))) in self.productions.into_iter().enumerate() {
            fsm.reduce();
            if fsm.is_empty() {
                return Err(GrammarError::EmptyProduction { name: left });
            }
            fsm.set_left_part(&left);
            productions.insert(
                ProductionID(i as u16),
                Production {
                    left,
                    fsm,
                    lookahead,
                    generates_e: false,
                    first_set: Set::default(),
                    follow_set: Set::default(),
                },
            );
        }

        let mut grammar = Grammar {
            kind: self.kind,
            nonterminals: self.nonterminals,
            keywords: self.keywords,
            productions,
            nullables: Set::default(),
        };

        let undefined: Vec<_> = grammar
            .nonterminals
            .iter()
            .filter(|n| grammar.production_for(n).is_none())
            .collect();
        if !undefined.is_empty() {
            tracing::warn!(
                ?undefined,
                "some nonterminals have no associated production"
            );
        }

        analysis::analyze(&mut grammar);
        Ok(grammar)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("invalid name: `{name}'")]
    InvalidName { name: String },

    #[error("the macro `{name}' has already been defined")]
    DuplicateMacro { name: String },

    #[error("undefined macro: `{name}'")]
    UndefinedMacro { name: String },

    #[error("the production for `{name}' recognizes nothing")]
    EmptyProduction { name: String },

    #[error("the grammar has no goal production")]
    MissingGoal,

    #[error("the goal `{name}' has an empty lookahead set")]
    EmptyLookahead { name: String },

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error("Other error: {}", msg)]
    Other { msg: String },
}

impl From<&str> for GrammarError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}

impl From<String> for GrammarError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}
