use std::cmp::Ordering;

use crate::builtins::{Builtin, BuiltinRegistry};
use crate::term::Term;

fn comparison(name: &'static str, accept: fn(Ordering) -> bool) -> Builtin {
    Builtin::simple(name, 2, move |_, args| {
        Ok(Some(Term::Bool(accept(args[0].cmp(&args[1])))))
    })
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(comparison("equal", Ordering::is_eq));
    registry.register(comparison("neq", Ordering::is_ne));
    registry.register(comparison("lt", Ordering::is_lt));
    registry.register(comparison("lte", Ordering::is_le));
    registry.register(comparison("gt", Ordering::is_gt));
    registry.register(comparison("gte", Ordering::is_ge));
}
