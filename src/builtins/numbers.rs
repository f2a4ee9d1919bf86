use crate::builtins::{number_operand, Builtin, BuiltinContext, BuiltinError, BuiltinRegistry};
use crate::error::EvalResult;
use crate::term::Term;
use crate::topdown::Flow;

fn arithmetic(name: &'static str, op: fn(f64, f64) -> f64) -> Builtin {
    Builtin::simple(name, 2, move |_, args| {
        let a = number_operand(name, 1, &args[0])?;
        let b = number_operand(name, 2, &args[1])?;
        Ok(Some(Term::number(op(a.value(), b.value()))))
    })
}

fn minus(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    match (&args[0], &args[1]) {
        (Term::Number(a), Term::Number(b)) => Ok(Some(Term::number(a.value() - b.value()))),
        (Term::Set(a), Term::Set(b)) => Ok(Some(Term::set(a.difference(b).cloned()))),
        (Term::Number(_) | Term::Set(_), other) => {
            Err(BuiltinError::type_error("minus", 2, "number or set", other))
        }
        (other, _) => Err(BuiltinError::type_error("minus", 1, "number or set", other)),
    }
}

fn div(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let a = number_operand("div", 1, &args[0])?;
    let b = number_operand("div", 2, &args[1])?;
    if b.value() == 0.0 {
        return Err(BuiltinError::failed("div", "divide by zero"));
    }
    Ok(Some(Term::number(a.value() / b.value())))
}

fn rem(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let a = number_operand("rem", 1, &args[0])?;
    let b = number_operand("rem", 2, &args[1])?;
    let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) else {
        return Err(BuiltinError::failed("rem", "modulo on floating-point number"));
    };
    if b == 0 {
        return Err(BuiltinError::failed("rem", "modulo by zero"));
    }
    Ok(Some(Term::number(a % b)))
}

fn integer_bounds(name: &str, args: &[Term]) -> Result<(i64, i64), BuiltinError> {
    let lo = number_operand(name, 1, &args[0])?;
    let hi = number_operand(name, 2, &args[1])?;
    let lo = lo
        .as_i64()
        .ok_or_else(|| BuiltinError::failed(name, "operand 1 must be an integer"))?;
    let hi = hi
        .as_i64()
        .ok_or_else(|| BuiltinError::failed(name, "operand 2 must be an integer"))?;
    Ok((lo, hi))
}

/// Inclusive range in either direction.
fn range_iter(lo: i64, hi: i64) -> Box<dyn Iterator<Item = i64>> {
    if lo <= hi {
        Box::new(lo..=hi)
    } else {
        Box::new((hi..=lo).rev())
    }
}

fn range(ctx: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let (lo, hi) = integer_bounds("numbers.range", args)?;
    let mut items = Vec::new();
    for i in range_iter(lo, hi) {
        ctx.check_cancelled()?;
        items.push(Term::number(i));
    }
    Ok(Some(Term::array(items)))
}

/// Emits every integer of the inclusive range, one result per integer.
fn each(ctx: &BuiltinContext, args: &[Term], emit: &mut dyn FnMut(Term) -> EvalResult<Flow>) -> EvalResult<Flow> {
    let (lo, hi) = integer_bounds("numbers.each", args)?;
    for i in range_iter(lo, hi) {
        ctx.check_cancelled()?;
        if emit(Term::number(i))? == Flow::Halt {
            return Ok(Flow::Halt);
        }
    }
    Ok(Flow::Continue)
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(arithmetic("plus", |a, b| a + b));
    registry.register(arithmetic("mul", |a, b| a * b));
    registry.register(Builtin::simple("minus", 2, minus));
    registry.register(Builtin::simple("div", 2, div));
    registry.register(Builtin::simple("rem", 2, rem));
    registry.register(Builtin::simple("numbers.range", 2, range));
    registry.register(Builtin::iter("numbers.each", 2, each));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{call, test_context};

    #[test]
    fn arithmetic_on_numbers() {
        let out = call("plus", &[Term::number(1), Term::number(2.5)]).unwrap();
        assert_eq!(out, Some(Term::number(3.5)));
        let out = call("rem", &[Term::number(7), Term::number(3)]).unwrap();
        assert_eq!(out, Some(Term::number(1)));
    }

    #[test]
    fn minus_is_set_difference_on_sets() {
        let a = Term::set(vec![Term::number(1), Term::number(2), Term::number(3)]);
        let b = Term::set(vec![Term::number(2)]);
        let out = call("minus", &[a, b]).unwrap();
        assert_eq!(out, Some(Term::set(vec![Term::number(1), Term::number(3)])));
    }

    #[test]
    fn type_errors_name_the_operand() {
        let err = call("plus", &[Term::number(1), Term::string("x")]).unwrap_err();
        assert!(matches!(err, BuiltinError::Type { operand: 2, .. }));
        let err = call("minus", &[Term::string("x"), Term::number(1)]).unwrap_err();
        assert!(matches!(err, BuiltinError::Type { operand: 1, .. }));
    }

    #[test]
    fn division_by_zero_is_a_failure_not_a_type_error() {
        let err = call("div", &[Term::number(1), Term::number(0)]).unwrap_err();
        assert!(matches!(err, BuiltinError::Failed { .. }));
    }

    #[test]
    fn range_counts_down_when_reversed() {
        let out = call("numbers.range", &[Term::number(3), Term::number(1)]).unwrap();
        assert_eq!(
            out,
            Some(Term::array(vec![Term::number(3), Term::number(2), Term::number(1)]))
        );
    }

    #[test]
    fn each_stops_on_halt() {
        let ctx = test_context();
        let mut seen = Vec::new();
        let flow = each(&ctx, &[Term::number(1), Term::number(100)], &mut |t| {
            seen.push(t);
            Ok(if seen.len() == 3 { Flow::Halt } else { Flow::Continue })
        })
        .unwrap();
        assert_eq!(flow, Flow::Halt);
        assert_eq!(seen.len(), 3);
    }
}
