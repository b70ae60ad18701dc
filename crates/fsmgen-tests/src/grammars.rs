//! Grammar definitions for integration tests.

use fsmgen::{
    fsm::Fsm,
    grammar::{Grammar, GrammarError, GrammarKind},
    label::ActionParam,
    syntax::{self, Definition, Expr, SyntaxError},
};

fn sym(name: &str) -> Expr {
    Expr::Symbol(name.into())
}

fn lit(s: &str) -> Expr {
    Expr::Literal(s.into())
}

fn end_of_input() -> Vec<String> {
    vec![Grammar::END_OF_INPUT.into()]
}

/// `S -> 'a' S | ;` with `S` as the goal.
pub fn right_recursive_list() -> Result<Grammar, GrammarError> {
    Grammar::define(GrammarKind::Parser, |g| {
        g.nonterminal("S")?;
        let body = g.symbol("a").concatenate(g.symbol("S"));
        g.goal("S", body, [Grammar::END_OF_INPUT])?;
        g.goal("S", Fsm::empty(), [Grammar::END_OF_INPUT])?;
        Ok(())
    })
}

/// `Digit = '0'..'9' ; Number -> Digit+ ;`
pub fn numbers() -> Result<Grammar, SyntaxError> {
    syntax::define(
        GrammarKind::Scanner,
        [
            Definition::Macro {
                name: "Digit".into(),
                body: Expr::Range(Box::new(lit("0")), Box::new(lit("9"))),
            },
            Definition::Goal {
                left: "Number".into(),
                body: Expr::Plus(Box::new(sym("Digit"))),
                lookahead: end_of_input(),
            },
        ],
    )
}

/// `Token -> 'x' {buildToken: A} | 'y' {buildToken: B} ;`
pub fn tokens() -> Result<Grammar, SyntaxError> {
    let build = |token: &str| Expr::Action {
        name: "buildToken".into(),
        params: vec![ActionParam::Str(token.into())],
        tree_building: false,
    };
    syntax::define(
        GrammarKind::Scanner,
        [
            Definition::Goal {
                left: "Token".into(),
                body: Expr::Sequence(vec![lit("x"), build("A")]),
                lookahead: end_of_input(),
            },
            Definition::Goal {
                left: "Token".into(),
                body: Expr::Sequence(vec![lit("y"), build("B")]),
                lookahead: end_of_input(),
            },
        ],
    )
}

/// `G -> S ; S -> A 'b' ; A -> 'a' | 'a' 'b' ;`
///
/// After `a`, a `b` may be read or may follow a completed `A`.
pub fn shift_conflict() -> Result<Grammar, GrammarError> {
    Grammar::define(GrammarKind::Parser, |g| {
        g.nonterminal("S")?;
        g.nonterminal("A")?;
        let ab = g.symbol("A").concatenate(g.symbol("b"));
        g.production("S", ab)?;
        let a = g.symbol("a");
        g.production("A", a)?;
        let ab = g.symbol("a").concatenate(g.symbol("b"));
        g.production("A", ab)?;
        let s = g.symbol("S");
        g.goal("G", s, [Grammar::END_OF_INPUT])?;
        Ok(())
    })
}

/// ```text
/// G -> E ;
/// E -> T ('+' T)* ;
/// T -> F ('*' F)* ;
/// F -> 'x' | '(' E ')' ;
/// ```
pub fn expressions() -> Result<Grammar, SyntaxError> {
    let repeated = |operand: &str, operator: &str| {
        Expr::Sequence(vec![
            sym(operand),
            Expr::Star(Box::new(Expr::Sequence(vec![lit(operator), sym(operand)]))),
        ])
    };
    syntax::define(
        GrammarKind::Parser,
        [
            Definition::Goal {
                left: "G".into(),
                body: sym("E"),
                lookahead: end_of_input(),
            },
            Definition::Production {
                left: "E".into(),
                body: repeated("T", "+"),
            },
            Definition::Production {
                left: "T".into(),
                body: repeated("F", "*"),
            },
            Definition::Production {
                left: "F".into(),
                body: Expr::Alternation(vec![
                    lit("x"),
                    Expr::Sequence(vec![lit("("), sym("E"), lit(")")]),
                ]),
            },
        ],
    )
}

/// A scanner for identifiers, integers and blanks with attribute overrides.
///
/// ```text
/// Letter = 'a'..'z' | 'A'..'Z' ;
/// Digit = '0'..'9' ;
/// Token -> Letter (Letter | Digit)* {buildToken: Identifier}
///        | Digit+ {buildToken: Integer}
///        | (' ' | 9 | 10)+ [noKeep] ;
/// ```
pub fn identifiers() -> Result<Grammar, SyntaxError> {
    let range = |lower: &str, upper: &str| Expr::Range(Box::new(lit(lower)), Box::new(lit(upper)));
    let build = |token: &str| Expr::Action {
        name: "buildToken".into(),
        params: vec![ActionParam::Str(token.into())],
        tree_building: false,
    };
    syntax::define(
        GrammarKind::Scanner,
        [
            Definition::Keywords(vec!["if".into(), "then".into()]),
            Definition::Macro {
                name: "Letter".into(),
                body: Expr::Alternation(vec![range("a", "z"), range("A", "Z")]),
            },
            Definition::Macro {
                name: "Digit".into(),
                body: range("0", "9"),
            },
            Definition::Goal {
                left: "Token".into(),
                body: Expr::Alternation(vec![
                    Expr::Sequence(vec![
                        sym("Letter"),
                        Expr::Star(Box::new(Expr::Alternation(vec![sym("Letter"), sym("Digit")]))),
                        build("Identifier"),
                    ]),
                    Expr::Sequence(vec![Expr::Plus(Box::new(sym("Digit"))), build("Integer")]),
                    Expr::Attributed(
                        Box::new(Expr::Plus(Box::new(Expr::Alternation(vec![
                            lit(" "),
                            Expr::Integer(9),
                            Expr::Integer(10),
                        ])))),
                        vec!["noKeep".into()],
                    ),
                ]),
                lookahead: end_of_input(),
            },
        ],
    )
}
