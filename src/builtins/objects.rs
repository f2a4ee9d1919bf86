use std::collections::BTreeMap;

use crate::builtins::{Builtin, BuiltinContext, BuiltinError, BuiltinRegistry};
use crate::term::Term;

fn object_operand<'a>(
    name: &str,
    operand: usize,
    term: &'a Term,
) -> Result<&'a BTreeMap<Term, Term>, BuiltinError> {
    term.as_object()
        .ok_or_else(|| BuiltinError::type_error(name, operand, "object", term))
}

/// Recursive merge; on conflicting non-object values `b` wins.
fn merge(a: &BTreeMap<Term, Term>, b: &BTreeMap<Term, Term>) -> BTreeMap<Term, Term> {
    let mut out = a.clone();
    for (key, b_value) in b {
        let merged = match (out.get(key).and_then(Term::as_object), b_value.as_object()) {
            (Some(a_obj), Some(b_obj)) => Term::object(merge(a_obj, b_obj)),
            _ => b_value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

fn union(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let a = object_operand("object.union", 1, &args[0])?;
    let b = object_operand("object.union", 2, &args[1])?;
    Ok(Some(Term::object(merge(a, b))))
}

fn union_n(ctx: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let objects = args[0]
        .as_array()
        .ok_or_else(|| BuiltinError::type_error("object.union_n", 1, "array", &args[0]))?;
    let mut acc = BTreeMap::new();
    for item in objects {
        ctx.check_cancelled()?;
        let obj = object_operand("object.union_n", 1, item)?;
        acc = merge(&acc, obj);
    }
    Ok(Some(Term::object(acc)))
}

/// `object.get(obj, key, default)`; an array key is a path into nested values.
fn get(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    object_operand("object.get", 1, &args[0])?;
    let found = match &args[1] {
        Term::Array(path) => args[0].find(path),
        key => args[0].get(key),
    };
    Ok(Some(found.unwrap_or_else(|| args[2].clone())))
}

fn keys(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let obj = object_operand("object.keys", 1, &args[0])?;
    Ok(Some(Term::set(obj.keys().cloned())))
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(Builtin::simple("object.union", 2, union));
    registry.register(Builtin::simple("object.union_n", 1, union_n));
    registry.register(Builtin::simple("object.get", 3, get));
    registry.register(Builtin::simple("object.keys", 1, keys));
}

#[cfg(test)]
mod tests {
    use crate::builtins::{call, BuiltinError};
    use crate::term::Term;

    fn json(v: serde_json::Value) -> Term {
        Term::from_json(&v)
    }

    #[test]
    fn union_merges_recursively() {
        let a = json(serde_json::json!({"a": {"x": 1, "y": 2}, "b": 1}));
        let b = json(serde_json::json!({"a": {"y": 3}, "b": {"z": 1}}));
        let out = call("object.union", &[a, b]).unwrap();
        assert_eq!(
            out,
            Some(json(serde_json::json!({"a": {"x": 1, "y": 3}, "b": {"z": 1}})))
        );
    }

    #[test]
    fn union_n_applies_left_to_right() {
        let objs = json(serde_json::json!([{"a": 1}, {"a": 2, "b": 1}, {"c": 3}]));
        let out = call("object.union_n", &[objs]).unwrap();
        assert_eq!(out, Some(json(serde_json::json!({"a": 2, "b": 1, "c": 3}))));
    }

    #[test]
    fn get_with_default_and_path() {
        let obj = json(serde_json::json!({"a": {"b": [10, 20]}}));
        let path = json(serde_json::json!(["a", "b", 1]));
        assert_eq!(
            call("object.get", &[obj.clone(), path, Term::Null]).unwrap(),
            Some(Term::number(20))
        );
        assert_eq!(
            call("object.get", &[obj.clone(), Term::string("missing"), Term::number(0)]).unwrap(),
            Some(Term::number(0))
        );
        assert!(matches!(
            call("object.get", &[Term::number(1), Term::string("a"), Term::Null]),
            Err(BuiltinError::Type { operand: 1, .. })
        ));
    }

    #[test]
    fn keys_returns_a_set() {
        let obj = json(serde_json::json!({"b": 1, "a": 2}));
        assert_eq!(
            call("object.keys", &[obj]).unwrap(),
            Some(Term::set(vec![Term::string("a"), Term::string("b")]))
        );
    }
}
