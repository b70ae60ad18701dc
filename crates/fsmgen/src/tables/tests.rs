use super::*;
use crate::{
    fsm::Fsm,
    label::{ActionParam, Attributes},
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn readahead_goto(tables: &Tables, from: ReadaheadID, name: &str) -> Option<ReadaheadID> {
    tables
        .readahead(from)
        .transitions
        .iter()
        .find_map(|(label, target)| match target {
            Target::Readahead(to) if label.name() == name && label.is_read() => Some(*to),
            _ => None,
        })
}

/// Drive parser tables over `input`, returning the names of the fired
/// actions once the input is accepted.
///
/// The stack holds `(symbol, readahead state)` entries, with the end marker
/// and the initial state at the bottom.
fn run<'a>(tables: &'a Tables, input: &[&'a str]) -> Result<Vec<&'a str>, String> {
    let initial = tables.initial_states[0];
    let mut stack: Vec<(&str, ReadaheadID)> = vec![(Grammar::END_OF_INPUT, initial)];
    let mut tokens = input.iter().copied().chain(Some(Grammar::END_OF_INPUT)).peekable();
    let mut state = initial;
    let mut actions = vec![];

    for _ in 0..1000 {
        let token = *tokens.peek().ok_or("ran past the end of input")?;
        let (label, target) = tables
            .readahead(state)
            .transitions
            .iter()
            .find(|(label, _)| label.name() == token)
            .ok_or_else(|| format!("{:?} has no move on {:?}", state, token))?;
        match *target {
            Target::Readahead(next) => {
                if label.is_read() {
                    tokens.next();
                    stack.push((token, next));
                }
                state = next;
            }
            Target::Semantic(id) => {
                let semantic = tables.semantic(id);
                actions.push(semantic.action.name());
                state = semantic.goto;
            }
            Target::Readback(mut readback) => {
                let mut depth = stack.len() - 1;
                let reduce = loop {
                    let (name, at) = stack[depth];
                    let (_, next) = tables
                        .readback(readback)
                        .transitions
                        .iter()
                        .find(|(key, _)| {
                            matches!(key, Pairing::Label(label, ra) if label.name() == name && *ra == at)
                        })
                        .ok_or_else(|| format!("{:?} has no move on {:?}", readback, stack[depth]))?;
                    match *next {
                        Target::Readback(next) => {
                            readback = next;
                            depth = depth.checked_sub(1).ok_or("read back past the stack bottom")?;
                        }
                        Target::Reduce(reduce) => break tables.reduce(reduce),
                        next => return Err(format!("{:?} moves to {:?}", readback, next)),
                    }
                };
                stack.truncate(depth + 1);
                let from = stack[depth].1;
                let restart = reduce
                    .restarts
                    .iter()
                    .find(|r| r.from == from)
                    .ok_or_else(|| format!("{} cannot restart from {:?}", reduce.nonterminal, from))?;
                stack.push((reduce.nonterminal.as_str(), restart.to));
                state = restart.to;
            }
            Target::Reduce(..) => return Err(format!("{:?} reduces without reading back", state)),
            Target::Accept => return Ok(actions),
        }
    }
    Err("no progress".into())
}

/// G -> E ; E -> E '+' T | T ; T -> 'x'
fn left_recursive_sum() -> Grammar {
    Grammar::define(GrammarKind::Parser, |g| {
        g.nonterminal("E")?;
        g.nonterminal("T")?;
        let sum = Fsm::concatenate_all([g.symbol("E"), g.symbol("+"), g.symbol("T")])?;
        g.production("E", sum)?;
        let t = g.symbol("T");
        g.production("E", t)?;
        let x = g.symbol("x");
        g.production("T", x)?;
        let e = g.symbol("E");
        g.goal("G", e, [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap()
}

#[test]
fn left_recursive_parser() {
    init_tracing();
    let tables = construct(&left_recursive_sum()).unwrap();

    assert!(tables.conflicts.is_empty(), "{:?}", tables.conflicts);
    assert!(tables.has_accept);
    assert_eq!(tables.initial_states, [ReadaheadID(0)]);
    assert_eq!(tables.reduces.len(), 2);

    let rows = tables.emit();
    assert_eq!(rows[0].to_string(), r#"["ReadaheadTable", 1, ("x", "RS", 4)]"#);
    assert!(matches!(rows.last(), Some(TableRow::Accept { .. })));

    // Nonterminal moves only survive as restarts.
    for state in &tables.readaheads {
        assert!(state.transitions.iter().all(|(label, _)| label.name() != "E" && label.name() != "T"));
    }
    let e = tables.reduce(tables.reduce_for("E").unwrap());
    assert_eq!(e.restarts.len(), 1);
    assert_eq!(e.restarts[0].from, ReadaheadID(0));
    let t = tables.reduce(tables.reduce_for("T").unwrap());
    assert_eq!(t.restarts.len(), 2);

    // The only way to accept is to look at the end of input.
    let accepting: Vec<_> = tables
        .readaheads
        .iter()
        .flat_map(|state| &state.transitions)
        .filter(|(_, target)| *target == Target::Accept)
        .map(|(label, _)| label.clone())
        .collect();
    assert_eq!(accepting, [Label::symbol(Grammar::END_OF_INPUT, Attributes::LOOK)]);
}

#[test]
fn left_recursive_parser_runs() {
    let tables = construct(&left_recursive_sum()).unwrap();
    for input in [&["x"][..], &["x", "+", "x"], &["x", "+", "x", "+", "x"]] {
        assert_eq!(run(&tables, input), Ok(vec![]), "{:?}", input);
    }
    for input in [&["+"][..], &[], &["x", "+"], &["x", "x"], &["x", "+", "+", "x"]] {
        assert!(run(&tables, input).is_err(), "{:?}", input);
    }
}

#[test]
fn lookback_reaches_the_bottom_of_the_stack() {
    let tables = construct(&left_recursive_sum()).unwrap();
    let reduce_e = tables.reduce_for("E").unwrap();

    // Reducing E always happens on top of the initial state.
    let keys: Vec<_> = tables
        .readbacks
        .iter()
        .flat_map(|state| &state.transitions)
        .filter(|(_, target)| *target == Target::Reduce(reduce_e))
        .map(|(key, _)| key.clone())
        .collect();
    assert!(!keys.is_empty());
    for key in keys {
        assert_eq!(
            key,
            Pairing::Label(
                Label::symbol(Grammar::END_OF_INPUT, Attributes::LOOK),
                ReadaheadID(0)
            )
        );
    }
}

#[test]
fn construction_is_deterministic() {
    let first = construct(&left_recursive_sum()).unwrap().display().to_string();
    let second = construct(&left_recursive_sum()).unwrap().display().to_string();
    assert_eq!(first, second);
}

#[test]
fn ambiguous_parser_reports_one_conflict() {
    init_tracing();
    // G -> S ; S -> X 'b' | Y 'b' ; X -> 'a' ; Y -> 'a'
    let g = Grammar::define(GrammarKind::Parser, |g| {
        for name in ["S", "X", "Y"] {
            g.nonterminal(name)?;
        }
        let xb = g.symbol("X").concatenate(g.symbol("b"));
        g.production("S", xb)?;
        let yb = g.symbol("Y").concatenate(g.symbol("b"));
        g.production("S", yb)?;
        let a = g.symbol("a");
        g.production("X", a)?;
        let a = g.symbol("a");
        g.production("Y", a)?;
        let s = g.symbol("S");
        g.goal("G", s, [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap();

    let tables = construct(&g).unwrap();
    assert_eq!(tables.conflicts.len(), 1, "{:?}", tables.conflicts);

    let after_a = readahead_goto(&tables, ReadaheadID(0), "a").unwrap();
    match &tables.conflicts[0] {
        Conflict::Readahead { state, symbols } => {
            assert_eq!(*state, after_a);
            assert_eq!(symbols.len(), 1);
            assert_eq!(symbols[0].0, "b");
            assert_eq!(symbols[0].1.len(), 2);
        }
        c => panic!("unexpected conflict: {:?}", c),
    }
}

#[test]
fn semantic_action_in_parser() {
    // G -> L ; L -> 'a' {mark} L | ;
    let g = Grammar::define(GrammarKind::Parser, |g| {
        g.nonterminal("L")?;
        let body = Fsm::concatenate_all([g.symbol("a"), g.action("mark", vec![], true)?, g.symbol("L")])?;
        g.production("L", body)?;
        g.production("L", Fsm::empty())?;
        let l = g.symbol("L");
        g.goal("G", l, [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap();

    let tables = construct(&g).unwrap();
    assert!(tables.conflicts.is_empty(), "{:?}", tables.conflicts);

    assert_eq!(tables.semantics.len(), 1);
    let semantic = &tables.semantics[0];
    assert_eq!(semantic.action.name(), "mark");
    assert!(!tables.readahead(semantic.goto).stackable);

    // Reading 'a' is followed by the action, whatever comes next.
    let after_a = readahead_goto(&tables, ReadaheadID(0), "a").unwrap();
    let state = tables.readahead(after_a);
    assert!(state.stackable);
    let mut names: Vec<_> = state.transitions.iter().map(|(label, _)| label.name()).collect();
    names.sort();
    assert_eq!(names, ["-|", "a"]);
    assert!(state
        .transitions
        .iter()
        .all(|(label, target)| !label.is_read() && *target == Target::Semantic(SemanticID(0))));

    // The action does not push, so reducing L may find 'a' on top.
    let l = tables.reduce(tables.reduce_for("L").unwrap());
    let from_semantic = l.restarts.iter().find(|r| r.from == semantic.goto).unwrap();
    assert!(l
        .restarts
        .iter()
        .any(|r| r.from == after_a && r.to == from_semantic.to));
    assert!(l.restarts.iter().any(|r| r.from == ReadaheadID(0)));
    assert_eq!(l.restarts.len(), 3);

    assert_eq!(run(&tables, &[]), Ok(vec![]));
    assert_eq!(run(&tables, &["a"]), Ok(vec!["mark"]));
    assert_eq!(run(&tables, &["a", "a", "a"]), Ok(vec!["mark"; 3]));
    assert!(run(&tables, &["b"]).is_err());
}

#[test]
fn scanner_semantic_rows() {
    init_tracing();
    // Token -> 'x' {buildToken: A} | 'y' {buildToken: B}
    let g = Grammar::define(GrammarKind::Scanner, |g| {
        let param = |name: &str| vec![ActionParam::Str(name.into())];
        let a = g.symbol("x").concatenate(g.action("buildToken", param("A"), false)?);
        let b = g.symbol("y").concatenate(g.action("buildToken", param("B"), false)?);
        g.goal("Token", a.union(b), [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap();

    let tables = construct(&g).unwrap();
    assert!(tables.conflicts.is_empty(), "{:?}", tables.conflicts);
    assert!(!tables.has_accept);
    assert!(tables.readbacks.is_empty());
    assert!(tables.reduces.is_empty());

    let params: Vec<_> = tables
        .semantics
        .iter()
        .map(|s| match &s.action {
            Label::Action { name, params, .. } => format!("{} {:?}", name, params),
            label => panic!("not an action: {}", label),
        })
        .collect();
    assert_eq!(params, [r#"buildToken [Str("A")]"#, r#"buildToken [Str("B")]"#]);

    // After each token the scanner restarts from the initial state.
    for semantic in &tables.semantics {
        let end = tables.readahead(semantic.goto);
        assert_eq!(
            end.transitions,
            [(
                Label::symbol(Grammar::END_OF_INPUT, Attributes::LOOK),
                Target::Readahead(ReadaheadID(0))
            )]
        );
    }

    let text = tables.display().to_string();
    assert!(text.contains(r#""buildToken", ["A"]"#), "{}", text);
    assert!(text.contains(r#""buildToken", ["B"]"#), "{}", text);
    assert!(text.starts_with(r#"["ScannerReadaheadTable", 1, ("x", "RK", 2), ("y", "RK", 3)]"#), "{}", text);
}

#[test]
fn scanner_prefers_the_longest_token() {
    // Word -> 'a'+ , followed by another word or the end of input.
    let g = Grammar::define(GrammarKind::Scanner, |g| {
        let word = g.symbol("a").plus();
        g.goal("Word", word, [Grammar::END_OF_INPUT, "a"])?;
        Ok(())
    })
    .unwrap();

    let tables = construct(&g).unwrap();
    assert!(tables.conflicts.is_empty(), "{:?}", tables.conflicts);

    for id in tables.readahead_ids().skip(1) {
        let state = tables.readahead(id);
        let on_a: Vec<_> = state.transitions.iter().filter(|(l, _)| l.name() == "a").collect();
        assert_eq!(on_a.len(), 1);
        assert!(on_a[0].0.is_read());
        assert!(state.transitions.contains(&(
            Label::symbol(Grammar::END_OF_INPUT, Attributes::LOOK),
            Target::Readahead(ReadaheadID(0))
        )));
    }
}

#[test]
fn super_scanner_rows_list_whole_symbols() {
    let g = Grammar::define(GrammarKind::SuperScanner, |g| {
        let keyword = g.symbol("if").union(g.symbol("then"));
        g.goal("Keyword", keyword, [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap();

    let rows = construct(&g).unwrap().emit();
    assert_eq!(
        rows[0].to_string(),
        r#"["ScannerReadaheadTable", 1, (["if"], "RK", 2), (["then"], "RK", 3)]"#
    );
    assert_eq!(rows[1].to_string(), r#"["ScannerReadaheadTable", 2, (["-|"], "L", 1)]"#);
}

#[test]
fn referenced_parser_goal_runs_through_its_wrapper() {
    init_tracing();
    // S -> 'a' S | ;
    let g = Grammar::define(GrammarKind::Parser, |g| {
        g.nonterminal("S")?;
        let body = g.symbol("a").concatenate(g.symbol("S"));
        g.goal("S", body, [Grammar::END_OF_INPUT])?;
        g.goal("S", Fsm::empty(), [Grammar::END_OF_INPUT])?;
        Ok(())
    })
    .unwrap();

    let tables = construct(&g).unwrap();
    assert!(tables.conflicts.is_empty(), "{:?}", tables.conflicts);
    assert!(tables.has_accept);
    assert_eq!(tables.reduces.len(), 1);
    assert!(tables.reduce_for("S").is_some());

    for input in [&["a"][..], &[], &["a", "a", "a"]] {
        assert_eq!(run(&tables, input), Ok(vec![]), "{:?}", input);
    }
    assert!(run(&tables, &["b"]).is_err());
    assert!(run(&tables, &["a", "b"]).is_err());
}
