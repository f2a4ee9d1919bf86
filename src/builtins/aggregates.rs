use crate::builtins::{Builtin, BuiltinContext, BuiltinError, BuiltinRegistry};
use crate::term::Term;

fn count(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let n = match &args[0] {
        Term::Array(items) => items.len(),
        Term::Set(items) => items.len(),
        Term::Object(map) => map.len(),
        Term::String(s) => s.chars().count(),
        other => return Err(BuiltinError::type_error("count", 1, "collection or string", other)),
    };
    Ok(Some(Term::number(n)))
}

fn elements<'a>(name: &str, term: &'a Term) -> Result<Box<dyn Iterator<Item = &'a Term> + 'a>, BuiltinError> {
    match term {
        Term::Array(items) => Ok(Box::new(items.iter())),
        Term::Set(items) => Ok(Box::new(items.iter())),
        other => Err(BuiltinError::type_error(name, 1, "array or set", other)),
    }
}

fn sum(ctx: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let mut total = 0.0;
    for item in elements("sum", &args[0])? {
        ctx.check_cancelled()?;
        let n = item
            .as_number()
            .ok_or_else(|| BuiltinError::type_error("sum", 1, "collection of numbers", &args[0]))?;
        total += n.value();
    }
    Ok(Some(Term::number(total)))
}

fn max(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    Ok(elements("max", &args[0])?.max().cloned())
}

fn min(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    Ok(elements("min", &args[0])?.min().cloned())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(Builtin::simple("count", 1, count));
    registry.register(Builtin::simple("sum", 1, sum));
    registry.register(Builtin::simple("max", 1, max));
    registry.register(Builtin::simple("min", 1, min));
}

#[cfg(test)]
mod tests {
    use crate::builtins::{call, BuiltinError};
    use crate::term::Term;

    fn nums(values: &[i64]) -> Vec<Term> {
        values.iter().map(|v| Term::number(*v)).collect()
    }

    #[test]
    fn count_covers_collections_and_strings() {
        assert_eq!(call("count", &[Term::array(nums(&[1, 2, 3]))]).unwrap(), Some(Term::number(3)));
        assert_eq!(call("count", &[Term::string("héllo")]).unwrap(), Some(Term::number(5)));
        assert!(matches!(
            call("count", &[Term::number(1)]),
            Err(BuiltinError::Type { operand: 1, .. })
        ));
    }

    #[test]
    fn sum_max_min() {
        let xs = Term::set(nums(&[4, 1, 9]));
        assert_eq!(call("sum", &[xs.clone()]).unwrap(), Some(Term::number(14)));
        assert_eq!(call("max", &[xs.clone()]).unwrap(), Some(Term::number(9)));
        assert_eq!(call("min", &[xs]).unwrap(), Some(Term::number(1)));
    }

    #[test]
    fn max_of_empty_is_undefined() {
        assert_eq!(call("max", &[Term::array(Vec::new())]).unwrap(), None);
    }

    #[test]
    fn sum_rejects_non_numbers() {
        let xs = Term::array(vec![Term::number(1), Term::string("x")]);
        assert!(matches!(call("sum", &[xs]), Err(BuiltinError::Type { .. })));
    }
}
