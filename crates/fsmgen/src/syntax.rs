//! Grammar construct trees and the walker that builds automata from them.
//!
//! A front end parses a grammar file into [`Definition`]s whose right parts
//! are [`Expr`] trees; [`define`] walks them into an analyzed [`Grammar`].

use crate::{
    fsm::{AlgebraError, Fsm},
    grammar::{Grammar, GrammarDef, GrammarError, GrammarKind},
    label::{ActionParam, Attributes, Label},
};

/// A regular right-part expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A terminal, a nonterminal or a macro, by name.
    Symbol(String),
    /// A quoted character or string.
    Literal(String),
    /// A character given by its code.
    Integer(u32),
    /// `lower..upper`, both bounds being literals or both integers.
    Range(Box<Expr>, Box<Expr>),
    Sequence(Vec<Expr>),
    Alternation(Vec<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    Optional(Box<Expr>),
    Intersection(Box<Expr>, Box<Expr>),
    Difference(Box<Expr>, Box<Expr>),
    /// `expr [look]`, `expr [noStack keep]` ...
    Attributed(Box<Expr>, Vec<String>),
    Action {
        name: String,
        params: Vec<ActionParam>,
        tree_building: bool,
    },
    /// A reference that must resolve to a macro.
    Macro(String),
    Empty,
}

/// A top-level grammar declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Nonterminals(Vec<String>),
    Keywords(Vec<String>),
    Macro { name: String, body: Expr },
    Production { left: String, body: Expr },
    Goal {
        left: String,
        body: Expr,
        lookahead: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("undefined macro: `{name}'")]
    UndefinedMacro { name: String },

    #[error("range bounds must both be single characters or both be integers")]
    InvalidRangeBound,

    #[error("reversed range: {lower:#x}..{upper:#x}")]
    ReversedRange { lower: u32, upper: u32 },

    #[error("unknown attribute: `{name}'")]
    UnknownAttribute { name: String },

    #[error("attributes cannot be applied to the semantic action `{name}'")]
    AttributesOnAction { name: String },

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

/// Walk every definition into a grammar of the given kind.
///
/// Nonterminals are collected before any right part is walked, so a symbol
/// gets its nonterminal attributes regardless of declaration order.
#[tracing::instrument(skip_all, fields(kind = ?kind))]
pub fn define<I>(kind: GrammarKind, definitions: I) -> Result<Grammar, SyntaxError>
where
    I: IntoIterator<Item = Definition>,
{
    let definitions: Vec<Definition> = definitions.into_iter().collect();
    let mut def = GrammarDef::new(kind);

    for definition in &definitions {
        match definition {
            Definition::Nonterminals(names) => {
                for name in names {
                    def.nonterminal(name)?;
                }
            }
            Definition::Production { left, .. } | Definition::Goal { left, .. } => {
                def.nonterminal(left)?;
            }
            _ => (),
        }
    }

    for definition in definitions {
        match definition {
            Definition::Nonterminals(..) => (),
            Definition::Keywords(names) => {
                for name in &names {
                    def.keyword(name);
                }
            }
            Definition::Macro { name, body } => {
                let fsm = Walker::new(&def).walk(&body)?;
                def.define_macro(&name, fsm)?;
            }
            Definition::Production { left, body } => {
                let fsm = Walker::new(&def).walk(&body)?;
                def.production(&left, fsm)?;
            }
            Definition::Goal {
                left,
                body,
                lookahead,
            } => {
                let fsm = Walker::new(&def).walk(&body)?;
                def.goal(&left, fsm, lookahead)?;
            }
        }
    }

    Ok(def.end()?)
}

/// Builds automata from [`Expr`] trees in the context of a grammar under
/// definition.
#[derive(Debug)]
pub struct Walker<'d> {
    def: &'d GrammarDef,
}

impl<'d> Walker<'d> {
    pub fn new(def: &'d GrammarDef) -> Self {
        Self { def }
    }

    fn terminal_attributes(&self) -> Attributes {
        Attributes::default_for(self.def.kind(), false)
    }

    pub fn walk(&self, expr: &Expr) -> Result<Fsm, SyntaxError> {
        Ok(match expr {
            Expr::Symbol(name) if self.def.has_macro(name) => self.def.expand_macro(name)?,
            Expr::Symbol(name) => self.def.symbol(name),
            Expr::Macro(name) => self
                .def
                .expand_macro(name)
                .map_err(|_| SyntaxError::UndefinedMacro { name: name.clone() })?,

            // Only a scanner reads characters one at a time.
            Expr::Literal(s) if self.def.kind() == GrammarKind::Scanner => {
                Fsm::for_string(s, self.terminal_attributes())
            }
            Expr::Literal(s) => Fsm::for_symbol(Label::symbol(s.as_str(), self.terminal_attributes())),
            Expr::Integer(code) => Fsm::for_integer(*code, self.terminal_attributes())?,
            Expr::Range(lower, upper) => {
                let (lower, upper) = range_bounds(lower, upper)?;
                if lower > upper {
                    return Err(SyntaxError::ReversedRange { lower, upper });
                }
                Fsm::for_integers(lower..=upper, self.terminal_attributes())?
            }

            Expr::Sequence(exprs) => Fsm::concatenate_all(self.walk_all(exprs)?)?,
            Expr::Alternation(exprs) => Fsm::or_all(self.walk_all(exprs)?)?,
            Expr::Star(expr) => self.walk(expr)?.star(),
            Expr::Plus(expr) => self.walk(expr)?.plus(),
            Expr::Optional(expr) => self.walk(expr)?.optional(),
            Expr::Intersection(a, b) => self.walk(a)?.intersect(&self.walk(b)?)?,
            Expr::Difference(a, b) => self.walk(a)?.difference(&self.walk(b)?)?,

            Expr::Attributed(expr, tokens) => {
                let fsm = self.walk(expr)?;
                if let Some((_, t)) = fsm.transitions().find(|(_, t)| t.label.is_action()) {
                    return Err(SyntaxError::AttributesOnAction {
                        name: t.label.name().to_owned(),
                    });
                }
                let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
                fsm.with_attributes(&tokens)
                    .map_err(|name| SyntaxError::UnknownAttribute { name: name.into() })?
            }
            Expr::Action {
                name,
                params,
                tree_building,
            } => self.def.action(name, params.clone(), *tree_building)?,
            Expr::Empty => Fsm::empty(),
        })
    }

    fn walk_all(&self, exprs: &[Expr]) -> Result<Vec<Fsm>, SyntaxError> {
        exprs.iter().map(|expr| self.walk(expr)).collect()
    }
}

fn range_bounds(lower: &Expr, upper: &Expr) -> Result<(u32, u32), SyntaxError> {
    fn single_char(s: &str) -> Option<u32> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Some(u32::from(ch)),
            _ => None,
        }
    }
    match (lower, upper) {
        (Expr::Integer(lower), Expr::Integer(upper)) => Ok((*lower, *upper)),
        (Expr::Literal(lower), Expr::Literal(upper)) => single_char(lower)
            .zip(single_char(upper))
            .ok_or(SyntaxError::InvalidRangeBound),
        _ => Err(SyntaxError::InvalidRangeBound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::tests::accepts;

    fn sym(name: &str) -> Expr {
        Expr::Symbol(name.into())
    }

    fn lit(s: &str) -> Expr {
        Expr::Literal(s.into())
    }

    fn scanner(definitions: Vec<Definition>) -> Result<Grammar, SyntaxError> {
        define(GrammarKind::Scanner, definitions)
    }

    #[test]
    fn macros_are_expanded_by_copy() {
        let g = scanner(vec![
            Definition::Macro {
                name: "Digit".into(),
                body: Expr::Range(Box::new(lit("0")), Box::new(lit("9"))),
            },
            Definition::Goal {
                left: "Number".into(),
                body: Expr::Sequence(vec![
                    Expr::Plus(Box::new(sym("Digit"))),
                    Expr::Optional(Box::new(Expr::Sequence(vec![
                        lit("."),
                        Expr::Plus(Box::new(Expr::Macro("Digit".into()))),
                    ]))),
                ]),
                lookahead: vec![Grammar::END_OF_INPUT.into()],
            },
        ])
        .unwrap();

        let (_, number) = g.production_for("Number").unwrap();
        assert!(accepts(&number.fsm, &["4", "2"]));
        assert!(accepts(&number.fsm, &["3", ".", "1", "4"]));
        assert!(!accepts(&number.fsm, &["3", "."]));
        assert!(!accepts(&number.fsm, &[]));
    }

    #[test]
    fn attribute_overrides() {
        let g = define(
            GrammarKind::Parser,
            vec![Definition::Goal {
                left: "G".into(),
                body: Expr::Sequence(vec![
                    sym("x"),
                    Expr::Attributed(Box::new(sym("y")), vec!["look".into()]),
                    Expr::Attributed(Box::new(sym("z")), vec!["keep".into(), "noStack".into()]),
                ]),
                lookahead: vec![Grammar::END_OF_INPUT.into()],
            }],
        )
        .unwrap();

        let (_, goal) = g.production_for("G").unwrap();
        let attributes = |name: &str| {
            goal.fsm
                .transitions()
                .find(|(_, t)| t.label.name() == name)
                .and_then(|(_, t)| t.label.attributes())
                .unwrap()
                .to_string()
        };
        assert_eq!(attributes("x"), "RS");
        assert_eq!(attributes("y"), "L");
        assert_eq!(attributes("z"), "RK");
    }

    #[test]
    fn parser_literals_are_single_symbols() {
        let g = define(
            GrammarKind::Parser,
            vec![Definition::Goal {
                left: "G".into(),
                body: Expr::Sequence(vec![lit("begin"), lit("end")]),
                lookahead: vec![Grammar::END_OF_INPUT.into()],
            }],
        )
        .unwrap();
        let (_, goal) = g.production_for("G").unwrap();
        assert!(accepts(&goal.fsm, &["begin", "end"]));
    }

    #[test]
    fn nonterminals_declared_later_get_nonterminal_attributes() {
        let g = define(
            GrammarKind::Parser,
            vec![
                Definition::Goal {
                    left: "G".into(),
                    body: sym("E"),
                    lookahead: vec![Grammar::END_OF_INPUT.into()],
                },
                Definition::Production {
                    left: "E".into(),
                    body: sym("x"),
                },
            ],
        )
        .unwrap();
        let (_, goal) = g.production_for("G").unwrap();
        let (_, t) = goal.fsm.transitions().next().unwrap();
        assert_eq!(t.label.attribute_string(), "RSN");
    }

    #[test]
    fn malformed_trees() {
        let goal = |body| {
            scanner(vec![Definition::Goal {
                left: "T".into(),
                body,
                lookahead: vec![],
            }])
        };

        assert!(matches!(
            goal(Expr::Macro("Letter".into())),
            Err(SyntaxError::UndefinedMacro { name }) if name == "Letter"
        ));
        assert!(matches!(
            goal(Expr::Range(Box::new(lit("a")), Box::new(Expr::Integer(122)))),
            Err(SyntaxError::InvalidRangeBound)
        ));
        assert!(matches!(
            goal(Expr::Range(Box::new(lit("ab")), Box::new(lit("z")))),
            Err(SyntaxError::InvalidRangeBound)
        ));
        assert!(matches!(
            goal(Expr::Range(Box::new(lit("z")), Box::new(lit("a")))),
            Err(SyntaxError::ReversedRange { lower: 0x7a, upper: 0x61 })
        ));
        assert!(matches!(
            goal(Expr::Attributed(Box::new(lit("a")), vec!["fast".into()])),
            Err(SyntaxError::UnknownAttribute { name }) if name == "fast"
        ));
        assert!(matches!(
            goal(Expr::Attributed(
                Box::new(Expr::Action {
                    name: "emit".into(),
                    params: vec![],
                    tree_building: false,
                }),
                vec!["look".into()],
            )),
            Err(SyntaxError::AttributesOnAction { name }) if name == "emit"
        ));
        assert!(matches!(
            goal(Expr::Alternation(vec![])),
            Err(SyntaxError::Algebra(AlgebraError::EmptyOperands { .. }))
        ));
        assert!(matches!(
            goal(Expr::Intersection(
                Box::new(Expr::Action {
                    name: "emit".into(),
                    params: vec![],
                    tree_building: false,
                }),
                Box::new(lit("a")),
            )),
            Err(SyntaxError::Algebra(AlgebraError::IncompatibleAlphabets { .. }))
        ));
        assert!(matches!(
            goal(lit("a")),
            Err(SyntaxError::Grammar(GrammarError::EmptyLookahead { name })) if name == "T"
        ));
    }

    #[test]
    fn set_operations() {
        let g = scanner(vec![
            Definition::Macro {
                name: "Letter".into(),
                body: Expr::Range(Box::new(lit("a")), Box::new(lit("z"))),
            },
            Definition::Goal {
                left: "Consonant".into(),
                body: Expr::Difference(
                    Box::new(sym("Letter")),
                    Box::new(Expr::Alternation(vec![
                        lit("a"),
                        lit("e"),
                        lit("i"),
                        lit("o"),
                        lit("u"),
                    ])),
                ),
                lookahead: vec![Grammar::END_OF_INPUT.into()],
            },
        ])
        .unwrap();
        let (_, consonant) = g.production_for("Consonant").unwrap();
        assert!(accepts(&consonant.fsm, &["b"]));
        assert!(!accepts(&consonant.fsm, &["e"]));
        assert!(!accepts(&consonant.fsm, &["b", "c"]));
    }
}
