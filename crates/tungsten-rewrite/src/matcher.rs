//! Backtracking structural matcher.
//!
//! A pattern is matched against a run of sibling candidates, not a single
//! expression, so sequence patterns can absorb consecutive leaves. The
//! search is lazy: binding sets are produced one at a time through an accept
//! continuation, and the search stops as soon as the continuation accepts
//! one. Rule application only ever pulls the first.
//!
//! Guard constraints (`PatternTest`, `Condition`) re-enter the evaluator.
//! That capability is passed in explicitly as a [`MatchHost`], keeping the
//! matcher a pure function of its inputs.

use std::collections::HashMap;

use tungsten_core::{system, Expr};

use crate::rule::Rule;

pub type Bindings = HashMap<String, Expr>;

/// Evaluator capability handed into the matcher.
pub trait MatchHost {
    /// `PatternTest`: apply `test` to the matched candidate, accept on the
    /// literal truth value.
    fn pattern_test(&mut self, test: &Expr, candidate: &Expr) -> bool;

    /// `Condition`: evaluate `guard` with bindings substituted in, accept on
    /// the literal truth value.
    fn condition(&mut self, guard: &Expr, binds: &Bindings) -> bool;

    /// Whether expressions headed by `symbol` match order-insensitively.
    fn is_orderless(&self, _symbol: &str) -> bool {
        false
    }

    /// Registered `Default[symbol]` value, for `Optional` patterns without
    /// an explicit default.
    fn default_value(&self, _symbol: &str) -> Option<Expr> {
        None
    }
}

/// Host with no evaluator behind it: conditions pass only when substitution
/// alone already yields the literal `True`, pattern tests never pass.
pub struct NoEval;

impl MatchHost for NoEval {
    fn pattern_test(&mut self, _test: &Expr, _candidate: &Expr) -> bool {
        false
    }

    fn condition(&mut self, guard: &Expr, binds: &Bindings) -> bool {
        substitute(guard, binds).is_true()
    }
}

type Cont<'a> = &'a mut dyn FnMut(&mut dyn MatchHost, Bindings) -> bool;

/// First binding set for `pattern` against a single candidate expression.
pub fn first_match(
    pattern: &Expr,
    candidate: &Expr,
    host: &mut dyn MatchHost,
) -> Option<Bindings> {
    let mut out = None;
    match_elem(pattern, candidate, Bindings::new(), host, &mut |_, b| {
        out = Some(b);
        true
    });
    out
}

/// Visits binding sets lazily until `visit` returns true. Returns whether
/// the search was stopped by the visitor.
pub fn for_each_match(
    pattern: &Expr,
    candidate: &Expr,
    host: &mut dyn MatchHost,
    visit: &mut dyn FnMut(&Bindings) -> bool,
) -> bool {
    match_elem(pattern, candidate, Bindings::new(), host, &mut |_, b| {
        visit(&b)
    })
}

/// First binding set for a pattern run against a candidate run.
pub fn match_run(
    patterns: &[Expr],
    candidates: &[Expr],
    head: Option<&str>,
    orderless: bool,
    host: &mut dyn MatchHost,
) -> Option<Bindings> {
    let env = SeqEnv { head: head.map(|s| s.to_string()), orderless };
    let mut out = None;
    match_seq(patterns, candidates, &env, Bindings::new(), host, &mut |_, b| {
        out = Some(b);
        true
    });
    out
}

/// Matches a rule's pattern and checks its guard, yielding the bindings to
/// substitute into the replacement.
pub fn match_rule(rule: &Rule, expr: &Expr, host: &mut dyn MatchHost) -> Option<Bindings> {
    let mut out = None;
    match_elem(&rule.pattern, expr, Bindings::new(), host, &mut |host, b| {
        if let Some(guard) = &rule.guard {
            if !host.condition(guard, &b) {
                return false;
            }
        }
        out = Some(b);
        true
    });
    out
}

/// Replaces bound pattern variables, splicing `Sequence` bindings into
/// surrounding leaf lists.
pub fn substitute(expr: &Expr, binds: &Bindings) -> Expr {
    match expr {
        Expr::Symbol(s) => binds.get(s).cloned().unwrap_or_else(|| expr.clone()),
        Expr::Normal(n) => {
            let head = substitute(n.head(), binds);
            let mut leaves = Vec::with_capacity(n.len());
            for leaf in n.leaves() {
                let r = substitute(leaf, binds);
                if let Some(items) = r.leaves_of(system::SEQUENCE) {
                    leaves.extend(items.iter().cloned());
                } else {
                    leaves.push(r);
                }
            }
            Expr::normal(head, leaves)
        }
        other => other.clone(),
    }
}

struct SeqEnv {
    head: Option<String>,
    orderless: bool,
}

fn match_elem(
    pat: &Expr,
    cand: &Expr,
    binds: Bindings,
    host: &mut dyn MatchHost,
    k: Cont,
) -> bool {
    if let Expr::Normal(pn) = pat {
        if let Some(ph) = pn.head().as_symbol() {
            match ph {
                system::BLANK => {
                    return head_filter_ok(pn.leaves().first(), cand) && k(host, binds);
                }
                // In single-candidate position a sequence blank absorbs
                // exactly this candidate.
                system::BLANK_SEQUENCE | system::BLANK_NULL_SEQUENCE => {
                    return head_filter_ok(pn.leaves().first(), cand) && k(host, binds);
                }
                system::PATTERN if pn.len() == 2 => {
                    let Some(name) = pn.leaves()[0].as_symbol() else {
                        return false;
                    };
                    let sub = &pn.leaves()[1];
                    return match_elem(sub, cand, binds, host, &mut |host, b| {
                        match bind_value(b, name, cand.clone()) {
                            Some(b2) => k(host, b2),
                            None => false,
                        }
                    });
                }
                system::PATTERN_TEST if pn.len() == 2 => {
                    let sub = &pn.leaves()[0];
                    let test = &pn.leaves()[1];
                    return match_elem(sub, cand, binds, host, &mut |host, b| {
                        host.pattern_test(test, cand) && k(host, b)
                    });
                }
                system::CONDITION if pn.len() == 2 => {
                    let sub = &pn.leaves()[0];
                    let guard = &pn.leaves()[1];
                    return match_elem(sub, cand, binds, host, &mut |host, b| {
                        host.condition(guard, &b) && k(host, b)
                    });
                }
                // First success wins; a downstream failure backtracks into
                // the remaining alternatives.
                system::ALTERNATIVES => {
                    for alt in pn.leaves() {
                        if match_elem(alt, cand, binds.clone(), host, &mut *k) {
                            return true;
                        }
                    }
                    return false;
                }
                system::EXCEPT if pn.len() == 1 => {
                    let sub = &pn.leaves()[0];
                    if first_match(sub, cand, host).is_some() {
                        return false;
                    }
                    return k(host, binds);
                }
                // One-candidate position: Optional behaves as its subject;
                // the zero-width branch lives in the sequence search.
                system::OPTIONAL if !pn.is_empty() => {
                    return match_elem(&pn.leaves()[0], cand, binds, host, k);
                }
                _ => {}
            }
        }
        // Generic compound: heads first, then the leaf runs.
        let Expr::Normal(cn) = cand else { return false };
        let orderless = cn
            .head()
            .as_symbol()
            .map(|s| host.is_orderless(s))
            .unwrap_or(false);
        let env = SeqEnv {
            head: cn.head().as_symbol().map(|s| s.to_string()),
            orderless,
        };
        let (pleaves, cleaves) = (pn.leaves(), cn.leaves());
        return match_elem(pn.head(), cn.head(), binds, host, &mut |host, b| {
            match_seq(pleaves, cleaves, &env, b, host, &mut *k)
        });
    }
    // Literal atom: structural equality.
    pat == cand && k(host, binds)
}

fn match_seq(
    pats: &[Expr],
    cands: &[Expr],
    env: &SeqEnv,
    binds: Bindings,
    host: &mut dyn MatchHost,
    k: Cont,
) -> bool {
    if env.orderless {
        orderless_match(pats, cands, env, binds, host, k)
    } else {
        ordered_match(pats, cands, env, binds, host, k)
    }
}

/// Shape of one pattern element in sequence position.
enum Elem<'p> {
    /// Sequence blank absorbing `min`-or-more candidates, together with the
    /// tests and guards of the wrappers peeled on the way down to it.
    Seq {
        min: usize,
        head: Option<&'p Expr>,
        name: Option<&'p str>,
        tests: Vec<&'p Expr>,
        guards: Vec<&'p Expr>,
    },
    /// Zero-or-one candidate.
    Opt {
        sub: &'p Expr,
        default: Option<&'p Expr>,
    },
    /// Exactly one candidate.
    One(&'p Expr),
    /// Alternatives with a multi-candidate branch, expanded to per-branch
    /// patterns tried in order.
    Alt(Vec<Expr>),
}

fn classify(p: &Expr) -> Elem<'_> {
    if let Expr::Normal(n) = p {
        if n.head().as_symbol() == Some(system::OPTIONAL) && (n.len() == 1 || n.len() == 2) {
            return Elem::Opt { sub: &n.leaves()[0], default: n.leaves().get(1) };
        }
    }
    peel(p, p, None, Vec::new(), Vec::new())
}

/// Walks through `Pattern`/`Condition`/`PatternTest` wrappers so a sequence
/// blank underneath keeps its multi-candidate shape. A chain ending in a
/// single-width subject reports the original pattern untouched.
fn peel<'p>(
    orig: &'p Expr,
    p: &'p Expr,
    name: Option<&'p str>,
    mut tests: Vec<&'p Expr>,
    mut guards: Vec<&'p Expr>,
) -> Elem<'p> {
    if let Expr::Normal(n) = p {
        match n.head().as_symbol() {
            Some(system::BLANK_SEQUENCE) => {
                return Elem::Seq { min: 1, head: n.leaves().first(), name, tests, guards };
            }
            Some(system::BLANK_NULL_SEQUENCE) => {
                return Elem::Seq { min: 0, head: n.leaves().first(), name, tests, guards };
            }
            Some(system::PATTERN) if n.len() == 2 => {
                if let Some(nm) = n.leaves()[0].as_symbol() {
                    return peel(orig, &n.leaves()[1], name.or(Some(nm)), tests, guards);
                }
            }
            Some(system::CONDITION) if n.len() == 2 => {
                guards.push(&n.leaves()[1]);
                return peel(orig, &n.leaves()[0], name, tests, guards);
            }
            Some(system::PATTERN_TEST) if n.len() == 2 => {
                tests.push(&n.leaves()[1]);
                return peel(orig, &n.leaves()[0], name, tests, guards);
            }
            Some(system::ALTERNATIVES) => {
                if n.leaves().iter().any(|b| !matches!(classify(b), Elem::One(_))) {
                    let branches = n
                        .leaves()
                        .iter()
                        .map(|b| rewrap(b.clone(), name, &tests, &guards))
                        .collect();
                    return Elem::Alt(branches);
                }
            }
            _ => {}
        }
    }
    Elem::One(orig)
}

/// Rebuilds the peeled wrapper chain around one alternatives branch.
fn rewrap(branch: Expr, name: Option<&str>, tests: &[&Expr], guards: &[&Expr]) -> Expr {
    let mut out = branch;
    for t in tests.iter().rev() {
        out = Expr::call(system::PATTERN_TEST, vec![out, (*t).clone()]);
    }
    for g in guards.iter().rev() {
        out = Expr::call(system::CONDITION, vec![out, (*g).clone()]);
    }
    if let Some(nm) = name {
        out = Expr::call(system::PATTERN, vec![Expr::symbol(nm), out]);
    }
    out
}

fn min_required(pats: &[Expr]) -> usize {
    pats.iter()
        .map(|p| match classify(p) {
            Elem::Seq { min, .. } => min,
            Elem::Opt { .. } => 0,
            Elem::One(_) => 1,
            Elem::Alt(branches) => branches
                .iter()
                .map(|b| min_required(std::slice::from_ref(b)))
                .min()
                .unwrap_or(0),
        })
        .sum()
}

fn ordered_match(
    pats: &[Expr],
    cands: &[Expr],
    env: &SeqEnv,
    binds: Bindings,
    host: &mut dyn MatchHost,
    k: Cont,
) -> bool {
    let Some(p0) = pats.first() else {
        return cands.is_empty() && k(host, binds);
    };
    let rest = &pats[1..];
    match classify(p0) {
        Elem::Seq { min, head, name, tests, guards } => {
            let rem_min = min_required(rest);
            if cands.len() < rem_min + min {
                return false;
            }
            let max_take = cands.len() - rem_min;
            // Shortest split first, backtracking on downstream failure.
            for take in min..=max_take {
                let run = &cands[..take];
                if let Some(h) = head {
                    if !run.iter().all(|c| head_filter_ok(Some(h), c)) {
                        // Longer runs contain the same offender.
                        break;
                    }
                }
                // A test applies to each absorbed candidate.
                if !tests.is_empty()
                    && !run
                        .iter()
                        .all(|c| tests.iter().all(|t| host.pattern_test(t, c)))
                {
                    break;
                }
                let mut b2 = binds.clone();
                if let Some(nm) = name {
                    let seq = Expr::sequence(run.to_vec());
                    match bind_value(b2, nm, seq) {
                        Some(nb) => b2 = nb,
                        None => continue,
                    }
                }
                // Guards see the run's bindings; a longer run may still pass.
                if !guards.iter().all(|g| host.condition(g, &b2)) {
                    continue;
                }
                if ordered_match(rest, &cands[take..], env, b2, host, &mut *k) {
                    return true;
                }
            }
            false
        }
        Elem::Alt(branches) => {
            for branch in branches {
                let mut sub = Vec::with_capacity(rest.len() + 1);
                sub.push(branch);
                sub.extend_from_slice(rest);
                if ordered_match(&sub, cands, env, binds.clone(), host, &mut *k) {
                    return true;
                }
            }
            false
        }
        Elem::Opt { sub, default } => {
            if !cands.is_empty()
                && match_elem(sub, &cands[0], binds.clone(), host, &mut |host, b| {
                    ordered_match(rest, &cands[1..], env, b, host, &mut *k)
                })
            {
                return true;
            }
            // Zero-width: the subject matches the default instead.
            let fallback = default
                .cloned()
                .or_else(|| env.head.as_deref().and_then(|h| host.default_value(h)));
            match fallback {
                Some(d) => match_elem(sub, &d, binds, host, &mut |host, b| {
                    ordered_match(rest, cands, env, b, host, &mut *k)
                }),
                None => false,
            }
        }
        Elem::One(p) => {
            if cands.is_empty() {
                return false;
            }
            match_elem(p, &cands[0], binds, host, &mut |host, b| {
                ordered_match(rest, &cands[1..], env, b, host, &mut *k)
            })
        }
    }
}

/// Orderless search: fixed-size patterns are placed by elimination over all
/// order-compatible assignments; sequence patterns then absorb whatever
/// remains, in the candidates' canonical order. Equal neighbouring
/// candidates prune symmetric permutations.
fn orderless_match(
    pats: &[Expr],
    cands: &[Expr],
    env: &SeqEnv,
    binds: Bindings,
    host: &mut dyn MatchHost,
    k: Cont,
) -> bool {
    let mut fixed: Vec<&Expr> = Vec::new();
    let mut tail: Vec<Expr> = Vec::new();
    for p in pats {
        match classify(p) {
            Elem::One(_) => fixed.push(p),
            _ => tail.push(p.clone()),
        }
    }
    let used = vec![false; cands.len()];
    place_fixed(&fixed, 0, &tail, cands, env, used, binds, host, k)
}

#[allow(clippy::too_many_arguments)]
fn place_fixed(
    fixed: &[&Expr],
    fi: usize,
    tail: &[Expr],
    cands: &[Expr],
    env: &SeqEnv,
    used: Vec<bool>,
    binds: Bindings,
    host: &mut dyn MatchHost,
    k: Cont,
) -> bool {
    if fi == fixed.len() {
        let remaining: Vec<Expr> = cands
            .iter()
            .zip(&used)
            .filter(|(_, u)| !**u)
            .map(|(c, _)| c.clone())
            .collect();
        let inner = SeqEnv { head: env.head.clone(), orderless: false };
        return ordered_match(tail, &remaining, &inner, binds, host, k);
    }
    for i in 0..cands.len() {
        if used[i] {
            continue;
        }
        if i > 0 && !used[i - 1] && cands[i] == cands[i - 1] {
            continue;
        }
        let mut used2 = used.clone();
        used2[i] = true;
        let stopped = match_elem(fixed[fi], &cands[i], binds.clone(), host, &mut |host, b| {
            place_fixed(fixed, fi + 1, tail, cands, env, used2.clone(), b, host, &mut *k)
        });
        if stopped {
            return true;
        }
    }
    false
}

fn head_filter_ok(filter: Option<&Expr>, cand: &Expr) -> bool {
    match filter {
        None => true,
        Some(Expr::Symbol(want)) => cand.head_symbol() == Some(want.as_str()),
        Some(other) => &cand.head_expr() == other,
    }
}

/// A variable bound twice in one match must bind structurally equal values.
fn bind_value(mut binds: Bindings, name: &str, value: Expr) -> Option<Bindings> {
    match binds.get(name) {
        Some(prev) if *prev != value => None,
        Some(_) => Some(binds),
        None => {
            binds.insert(name.to_string(), value);
            Some(binds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Expr {
        Expr::call(system::BLANK, vec![])
    }

    fn named(name: &str, sub: Expr) -> Expr {
        Expr::call(system::PATTERN, vec![Expr::symbol(name), sub])
    }

    #[test]
    fn blank_matches_exactly_one() {
        let mut host = NoEval;
        assert!(first_match(&blank(), &Expr::integer(5), &mut host).is_some());
        let typed = Expr::call(system::BLANK, vec![Expr::symbol(system::INTEGER)]);
        assert!(first_match(&typed, &Expr::integer(5), &mut host).is_some());
        assert!(first_match(&typed, &Expr::symbol("x"), &mut host).is_none());
    }

    #[test]
    fn named_pattern_binds_and_requires_consistency() {
        let mut host = NoEval;
        // f[x_, x_] matches f[1, 1] but not f[1, 2]
        let pat = Expr::call("f", vec![named("x", blank()), named("x", blank())]);
        let same = Expr::call("f", vec![Expr::integer(1), Expr::integer(1)]);
        let diff = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let b = first_match(&pat, &same, &mut host).unwrap();
        assert_eq!(b.get("x"), Some(&Expr::integer(1)));
        assert!(first_match(&pat, &diff, &mut host).is_none());
    }

    #[test]
    fn sequence_split_binds_run() {
        let mut host = NoEval;
        // f[x_, y___] against f[1,2,3]: x -> 1, y -> Sequence[2, 3]
        let pat = Expr::call(
            "f",
            vec![
                named("x", blank()),
                named("y", Expr::call(system::BLANK_NULL_SEQUENCE, vec![])),
            ],
        );
        let expr = Expr::call(
            "f",
            vec![Expr::integer(1), Expr::integer(2), Expr::integer(3)],
        );
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(b.get("x"), Some(&Expr::integer(1)));
        assert_eq!(
            b.get("y"),
            Some(&Expr::sequence(vec![Expr::integer(2), Expr::integer(3)]))
        );
    }

    #[test]
    fn blank_sequence_needs_one_null_sequence_does_not() {
        let mut host = NoEval;
        let one_plus = Expr::call("f", vec![Expr::call(system::BLANK_SEQUENCE, vec![])]);
        let zero_plus = Expr::call("f", vec![Expr::call(system::BLANK_NULL_SEQUENCE, vec![])]);
        let empty = Expr::call("f", vec![]);
        let full = Expr::call("f", vec![Expr::integer(1)]);
        assert!(first_match(&one_plus, &empty, &mut host).is_none());
        assert!(first_match(&one_plus, &full, &mut host).is_some());
        assert!(first_match(&zero_plus, &empty, &mut host).is_some());
        assert!(first_match(&zero_plus, &full, &mut host).is_some());
    }

    #[test]
    fn typed_sequence_filters_heads() {
        let mut host = NoEval;
        let pat = Expr::call(
            "f",
            vec![Expr::call(
                system::BLANK_SEQUENCE,
                vec![Expr::symbol(system::INTEGER)],
            )],
        );
        let ints = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let mixed = Expr::call("f", vec![Expr::integer(1), Expr::symbol("x")]);
        assert!(first_match(&pat, &ints, &mut host).is_some());
        assert!(first_match(&pat, &mixed, &mut host).is_none());
    }

    #[test]
    fn shortest_split_wins_first() {
        let mut host = NoEval;
        // f[a__, b__] against f[1,2,3]: a should take the shortest run.
        let pat = Expr::call(
            "f",
            vec![
                named("a", Expr::call(system::BLANK_SEQUENCE, vec![])),
                named("b", Expr::call(system::BLANK_SEQUENCE, vec![])),
            ],
        );
        let expr = Expr::call(
            "f",
            vec![Expr::integer(1), Expr::integer(2), Expr::integer(3)],
        );
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(b.get("a"), Some(&Expr::sequence(vec![Expr::integer(1)])));
        assert_eq!(
            b.get("b"),
            Some(&Expr::sequence(vec![Expr::integer(2), Expr::integer(3)]))
        );
    }

    #[test]
    fn guarded_sequence_absorbs_a_run() {
        let mut host = NoEval;
        // f[y__ /; True] against f[1, 2]: the guard wraps the whole run.
        let pat = Expr::call(
            "f",
            vec![Expr::call(
                system::CONDITION,
                vec![
                    named("y", Expr::call(system::BLANK_SEQUENCE, vec![])),
                    Expr::bool(true),
                ],
            )],
        );
        let expr = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(
            b.get("y"),
            Some(&Expr::sequence(vec![Expr::integer(1), Expr::integer(2)]))
        );

        let never = Expr::call(
            "f",
            vec![Expr::call(
                system::CONDITION,
                vec![
                    named("y", Expr::call(system::BLANK_SEQUENCE, vec![])),
                    Expr::bool(false),
                ],
            )],
        );
        assert!(first_match(&never, &expr, &mut host).is_none());
    }

    struct IntQHost;

    impl MatchHost for IntQHost {
        fn pattern_test(&mut self, test: &Expr, candidate: &Expr) -> bool {
            test.as_symbol() == Some("intQ") && matches!(candidate, Expr::Integer(_))
        }
        fn condition(&mut self, guard: &Expr, binds: &Bindings) -> bool {
            substitute(guard, binds).is_true()
        }
    }

    #[test]
    fn tested_sequence_checks_each_element() {
        let mut host = IntQHost;
        // f[y__?intQ]: the test applies to every absorbed candidate.
        let pat = Expr::call(
            "f",
            vec![Expr::call(
                system::PATTERN_TEST,
                vec![
                    named("y", Expr::call(system::BLANK_SEQUENCE, vec![])),
                    Expr::symbol("intQ"),
                ],
            )],
        );
        let ints = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let b = first_match(&pat, &ints, &mut host).unwrap();
        assert_eq!(
            b.get("y"),
            Some(&Expr::sequence(vec![Expr::integer(1), Expr::integer(2)]))
        );
        let mixed = Expr::call("f", vec![Expr::integer(1), Expr::symbol("x")]);
        assert!(first_match(&pat, &mixed, &mut host).is_none());
    }

    #[test]
    fn alternatives_with_a_sequence_branch_absorb_runs() {
        let mut host = NoEval;
        // f[y : (_Symbol | __)]: the single-symbol branch loses against a
        // run of integers, the sequence branch takes the whole run.
        let pat = Expr::call(
            "f",
            vec![named(
                "y",
                Expr::call(
                    system::ALTERNATIVES,
                    vec![
                        Expr::call(system::BLANK, vec![Expr::symbol(system::SYMBOL)]),
                        Expr::call(system::BLANK_SEQUENCE, vec![]),
                    ],
                ),
            )],
        );
        let expr = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(
            b.get("y"),
            Some(&Expr::sequence(vec![Expr::integer(1), Expr::integer(2)]))
        );

        let single = Expr::call("f", vec![Expr::symbol("a")]);
        let b = first_match(&pat, &single, &mut host).unwrap();
        assert_eq!(b.get("y"), Some(&Expr::symbol("a")));
    }

    #[test]
    fn alternatives_try_in_order_and_backtrack() {
        let mut host = NoEval;
        let alt = Expr::call(
            system::ALTERNATIVES,
            vec![Expr::symbol("a"), Expr::symbol("b")],
        );
        assert!(first_match(&alt, &Expr::symbol("a"), &mut host).is_some());
        assert!(first_match(&alt, &Expr::symbol("b"), &mut host).is_some());
        assert!(first_match(&alt, &Expr::symbol("c"), &mut host).is_none());

        // A downstream failure re-enters the alternatives: the sequence
        // branch greedily fails, the single-blank branch succeeds.
        let pat = Expr::call(
            "f",
            vec![
                Expr::call(
                    system::ALTERNATIVES,
                    vec![
                        Expr::call(system::BLANK, vec![Expr::symbol(system::SYMBOL)]),
                        Expr::call(system::BLANK, vec![Expr::symbol(system::INTEGER)]),
                    ],
                ),
                named("z", blank()),
            ],
        );
        let expr = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        assert!(first_match(&pat, &expr, &mut host).is_some());
    }

    #[test]
    fn except_succeeds_on_non_match() {
        let mut host = NoEval;
        let pat = Expr::call(system::EXCEPT, vec![Expr::integer(0)]);
        assert!(first_match(&pat, &Expr::integer(1), &mut host).is_some());
        assert!(first_match(&pat, &Expr::integer(0), &mut host).is_none());
    }

    #[test]
    fn optional_consumes_zero_or_one() {
        let mut host = NoEval;
        // f[x_, Optional[y_, 0]] matches f[1, 2] and f[1] (y -> 0).
        let pat = Expr::call(
            "f",
            vec![
                named("x", blank()),
                Expr::call(
                    system::OPTIONAL,
                    vec![named("y", blank()), Expr::integer(0)],
                ),
            ],
        );
        let two = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let one = Expr::call("f", vec![Expr::integer(1)]);
        let b2 = first_match(&pat, &two, &mut host).unwrap();
        assert_eq!(b2.get("y"), Some(&Expr::integer(2)));
        let b1 = first_match(&pat, &one, &mut host).unwrap();
        assert_eq!(b1.get("y"), Some(&Expr::integer(0)));
    }

    #[test]
    fn optional_without_default_needs_a_candidate() {
        let mut host = NoEval;
        let pat = Expr::call(
            "f",
            vec![Expr::call(system::OPTIONAL, vec![named("y", blank())])],
        );
        assert!(first_match(&pat, &Expr::call("f", vec![]), &mut host).is_none());
        assert!(first_match(&pat, &Expr::call("f", vec![Expr::integer(1)]), &mut host).is_some());
    }

    struct OrderlessF;

    impl MatchHost for OrderlessF {
        fn pattern_test(&mut self, _: &Expr, _: &Expr) -> bool {
            false
        }
        fn condition(&mut self, guard: &Expr, binds: &Bindings) -> bool {
            substitute(guard, binds).is_true()
        }
        fn is_orderless(&self, symbol: &str) -> bool {
            symbol == "f"
        }
        fn default_value(&self, symbol: &str) -> Option<Expr> {
            (symbol == "f").then(|| Expr::integer(7))
        }
    }

    #[test]
    fn orderless_head_matches_any_order() {
        let mut host = OrderlessF;
        // f[1, x_] against f[2, 1]: the literal 1 eliminates a candidate
        // regardless of position.
        let pat = Expr::call("f", vec![Expr::integer(1), named("x", blank())]);
        let expr = Expr::call("f", vec![Expr::integer(2), Expr::integer(1)]);
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(b.get("x"), Some(&Expr::integer(2)));
    }

    #[test]
    fn orderless_sequence_absorbs_remainder() {
        let mut host = OrderlessF;
        let pat = Expr::call(
            "f",
            vec![
                Expr::integer(3),
                named("r", Expr::call(system::BLANK_SEQUENCE, vec![])),
            ],
        );
        let expr = Expr::call(
            "f",
            vec![Expr::integer(1), Expr::integer(3), Expr::integer(2)],
        );
        let b = first_match(&pat, &expr, &mut host).unwrap();
        assert_eq!(
            b.get("r"),
            Some(&Expr::sequence(vec![Expr::integer(1), Expr::integer(2)]))
        );
    }

    #[test]
    fn registered_default_feeds_bare_optional() {
        let mut host = OrderlessF;
        let pat = Expr::call(
            "g",
            vec![Expr::call(system::OPTIONAL, vec![named("y", blank())])],
        );
        // g has no registered default, f does.
        assert!(first_match(&pat, &Expr::call("g", vec![]), &mut host).is_none());
        let pat_f = Expr::call(
            "f",
            vec![
                Expr::integer(1),
                Expr::call(system::OPTIONAL, vec![named("y", blank())]),
            ],
        );
        let b = first_match(&pat_f, &Expr::call("f", vec![Expr::integer(1)]), &mut host).unwrap();
        assert_eq!(b.get("y"), Some(&Expr::integer(7)));
    }

    #[test]
    fn condition_checks_substituted_guard() {
        let mut host = NoEval;
        // x_ /; x  against True: guard substitutes to True.
        let pat = Expr::call(
            system::CONDITION,
            vec![named("x", blank()), Expr::symbol("x")],
        );
        assert!(first_match(&pat, &Expr::bool(true), &mut host).is_some());
        assert!(first_match(&pat, &Expr::integer(3), &mut host).is_none());
    }

    #[test]
    fn substitution_splices_sequences() {
        let mut binds = Bindings::new();
        binds.insert(
            "y".into(),
            Expr::sequence(vec![Expr::integer(2), Expr::integer(3)]),
        );
        let rhs = Expr::call("g", vec![Expr::symbol("y"), Expr::integer(9)]);
        let out = substitute(&rhs, &binds);
        assert_eq!(
            out,
            Expr::call(
                "g",
                vec![Expr::integer(2), Expr::integer(3), Expr::integer(9)]
            )
        );
    }

    #[test]
    fn lazy_enumeration_stops_on_accept() {
        let mut host = NoEval;
        let pat = Expr::call(
            "f",
            vec![
                named("a", Expr::call(system::BLANK_NULL_SEQUENCE, vec![])),
                named("b", Expr::call(system::BLANK_NULL_SEQUENCE, vec![])),
            ],
        );
        let expr = Expr::call("f", vec![Expr::integer(1), Expr::integer(2)]);
        let mut seen = 0;
        let stopped = for_each_match(&pat, &expr, &mut host, &mut |_| {
            seen += 1;
            seen == 2
        });
        assert!(stopped);
        assert_eq!(seen, 2);
    }
}
