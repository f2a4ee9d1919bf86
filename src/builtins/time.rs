use crate::builtins::{Builtin, BuiltinRegistry};
use crate::term::Term;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    // Frozen at query start so every call within one evaluation agrees.
    #[allow(clippy::cast_precision_loss)]
    registry.register(Builtin::simple("time.now_ns", 0, |ctx, _| {
        Ok(Some(Term::number(ctx.time_ns() as f64)))
    }));
}

#[cfg(test)]
mod tests {
    use crate::builtins::{BuiltinContext, BuiltinFn, BuiltinRegistry};
    use crate::cancel::CancelSignal;
    use crate::term::Term;

    #[test]
    fn now_ns_returns_the_frozen_clock() {
        let ctx = BuiltinContext::new(CancelSignal::new(), None, 1_700_000_000, 0, 1);
        let registry = BuiltinRegistry::standard();
        let Some(BuiltinFn::Simple(f)) = registry.get("time.now_ns").map(|b| b.func.clone()) else {
            panic!("time.now_ns must be simple");
        };
        assert_eq!(f(&ctx, &[]).unwrap(), Some(Term::number(1_700_000_000)));
        assert_eq!(f(&ctx, &[]).unwrap(), f(&ctx, &[]).unwrap());
    }
}
