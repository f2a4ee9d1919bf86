use std::collections::BTreeSet;

use crate::builtins::{Builtin, BuiltinContext, BuiltinError, BuiltinRegistry};
use crate::term::Term;

fn set_operand<'a>(name: &str, operand: usize, term: &'a Term) -> Result<&'a BTreeSet<Term>, BuiltinError> {
    term.as_set()
        .ok_or_else(|| BuiltinError::type_error(name, operand, "set", term))
}

fn and(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let a = set_operand("and", 1, &args[0])?;
    let b = set_operand("and", 2, &args[1])?;
    Ok(Some(Term::set(a.intersection(b).cloned())))
}

fn or(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let a = set_operand("or", 1, &args[0])?;
    let b = set_operand("or", 2, &args[1])?;
    Ok(Some(Term::set(a.union(b).cloned())))
}

fn intersection(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let sets = set_operand("intersection", 1, &args[0])?;
    let mut members = sets.iter();
    let Some(first) = members.next() else {
        return Ok(Some(Term::set(Vec::new())));
    };
    let mut acc = set_operand("intersection", 1, first)?.clone();
    for member in members {
        let s = set_operand("intersection", 1, member)?;
        acc.retain(|t| s.contains(t));
    }
    Ok(Some(Term::set(acc)))
}

fn union(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let sets = set_operand("union", 1, &args[0])?;
    let mut acc = BTreeSet::new();
    for member in sets {
        acc.extend(set_operand("union", 1, member)?.iter().cloned());
    }
    Ok(Some(Term::set(acc)))
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(Builtin::simple("and", 2, and));
    registry.register(Builtin::simple("or", 2, or));
    registry.register(Builtin::simple("intersection", 1, intersection));
    registry.register(Builtin::simple("union", 1, union));
}

#[cfg(test)]
mod tests {
    use crate::builtins::{call, BuiltinError};
    use crate::term::Term;

    fn set(values: &[&str]) -> Term {
        Term::set(values.iter().map(|v| Term::string(*v)))
    }

    #[test]
    fn binary_set_operations() {
        let a = set(&["x", "y"]);
        let b = set(&["y", "z"]);
        assert_eq!(call("and", &[a.clone(), b.clone()]).unwrap(), Some(set(&["y"])));
        assert_eq!(call("or", &[a, b]).unwrap(), Some(set(&["x", "y", "z"])));
    }

    #[test]
    fn n_ary_set_operations() {
        let sets = Term::set(vec![set(&["a", "b", "c"]), set(&["b", "c"]), set(&["c", "d"])]);
        assert_eq!(call("intersection", &[sets.clone()]).unwrap(), Some(set(&["c"])));
        assert_eq!(call("union", &[sets]).unwrap(), Some(set(&["a", "b", "c", "d"])));
        assert_eq!(call("intersection", &[Term::set(Vec::new())]).unwrap(), Some(set(&[])));
    }

    #[test]
    fn arrays_are_not_sets() {
        let err = call("and", &[set(&["a"]), Term::array(Vec::new())]).unwrap_err();
        assert!(matches!(err, BuiltinError::Type { operand: 2, .. }));
    }
}
