use proptest::prelude::*;

use regula::{Binding, BindingMap, Bindings, ScopeId, Term, Var};

const VAR_COUNT: usize = 6;
const NAME_COUNT: usize = 24;

fn scalar() -> impl Strategy<Value = Term> {
    prop_oneof![
        any::<bool>().prop_map(Term::Bool),
        (-1000_i64..1000).prop_map(Term::number),
        "[a-z]{0,6}".prop_map(Term::string),
        Just(Term::Null),
    ]
}

fn var_name() -> impl Strategy<Value = String> {
    (0..VAR_COUNT).prop_map(|i| format!("x{i}"))
}

/// Terms mixing scalars, variables and collections of both.
fn term() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![scalar(), var_name().prop_map(Term::var)];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Term::array),
            prop::collection::vec((scalar(), inner), 0..4).prop_map(Term::object),
        ]
    })
}

/// Binds `x{i}` either to a term or to a later variable, so chains never cycle.
fn bind_all(assignments: &[(bool, Term)]) -> Bindings {
    let mut bindings = Bindings::new();
    for (i, (alias, value)) in assignments.iter().enumerate() {
        let var = Var::new(format!("x{i}"));
        let value = if *alias && i + 1 < assignments.len() {
            Term::var(format!("x{}", i + 1))
        } else {
            // Values may only mention later variables.
            strip_vars_before(value, i)
        };
        bindings.put(&var, ScopeId::ROOT, value, ScopeId::ROOT);
    }
    bindings
}

fn strip_vars_before(term: &Term, index: usize) -> Term {
    match term {
        Term::Var(v) => {
            let n: usize = v.name()[1..].parse().unwrap_or(0);
            if n <= index {
                Term::number(n)
            } else {
                term.clone()
            }
        }
        Term::Array(items) => Term::array(items.iter().map(|t| strip_vars_before(t, index))),
        Term::Object(pairs) => Term::object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), strip_vars_before(v, index))),
        ),
        other => other.clone(),
    }
}

#[derive(Debug, Clone)]
enum MapOp {
    Put(String, i64),
    Delete(String),
}

fn map_op() -> impl Strategy<Value = MapOp> {
    let name = (0..NAME_COUNT).prop_map(|i| format!("v{i}"));
    prop_oneof![
        3 => (name.clone(), any::<i64>()).prop_map(|(n, v)| MapOp::Put(n, v)),
        1 => name.prop_map(MapOp::Delete),
    ]
}

proptest! {
    #[test]
    fn plug_is_idempotent(
        assignments in prop::collection::vec((any::<bool>(), term()), VAR_COUNT),
        query in term(),
    ) {
        let bindings = bind_all(&assignments);
        let once = bindings.plug(&query, ScopeId::ROOT);
        let twice = bindings.plug(&once, ScopeId::ROOT);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn undo_restores_every_binding(
        before in prop::collection::vec(scalar(), VAR_COUNT),
        after in prop::collection::vec(scalar(), VAR_COUNT),
        query in term(),
    ) {
        let mut bindings = Bindings::new();
        for (i, value) in before.iter().enumerate().take(VAR_COUNT / 2) {
            bindings.put(&Var::new(format!("x{i}")), ScopeId::ROOT, value.clone(), ScopeId::ROOT);
        }
        let expected = bindings.plug(&query, ScopeId::ROOT);
        let mark = bindings.mark();
        for (i, value) in after.iter().enumerate() {
            bindings.put(&Var::new(format!("x{i}")), ScopeId::ROOT, value.clone(), ScopeId::ROOT);
        }
        bindings.undo(mark);
        prop_assert_eq!(bindings.plug(&query, ScopeId::ROOT), expected);
    }

    #[test]
    fn binding_map_representations_agree(ops in prop::collection::vec(map_op(), 0..64)) {
        let mut linear = BindingMap::new();
        let mut hashed = BindingMap::hashed();
        for op in &ops {
            match op {
                MapOp::Put(name, value) => {
                    let binding = Binding { value: Term::number(*value), scope: ScopeId::ROOT };
                    let a = linear.put(Var::new(name), binding.clone());
                    let b = hashed.put(Var::new(name), binding);
                    prop_assert_eq!(a, b);
                }
                MapOp::Delete(name) => {
                    prop_assert_eq!(linear.delete(&Var::new(name)), hashed.delete(&Var::new(name)));
                }
            }
            prop_assert_eq!(linear.len(), hashed.len());
            for name in (0..NAME_COUNT).map(|i| Var::new(format!("v{i}"))) {
                prop_assert_eq!(linear.get(&name), hashed.get(&name));
            }
            prop_assert_eq!(linear.iter(), hashed.iter());
        }
    }
}
