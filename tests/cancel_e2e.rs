use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regula::{Builtin, BuiltinRegistry, CancelSignal, EvalConfig, EvalError, Expr, QueryBuilder, Term};

const CANCEL_AT: usize = 100;

fn observing_registry(cancel: &CancelSignal, calls: &Arc<AtomicUsize>) -> BuiltinRegistry {
    let mut builtins = BuiltinRegistry::standard();
    let signal = cancel.clone();
    let counter = Arc::clone(calls);
    builtins.register(Builtin::simple("test.observe", 1, move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) + 1 == CANCEL_AT {
            signal.cancel();
        }
        Ok(Some(Term::Bool(true)))
    }));
    builtins
}

#[test]
fn cancellation_stops_a_long_enumeration() {
    let cancel = CancelSignal::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = EvalConfig {
        cancel_check_interval: 64,
        ..EvalConfig::default()
    };

    let err = QueryBuilder::new()
        .builtins(Arc::new(observing_registry(&cancel, &calls)))
        .cancel(cancel.clone())
        .config(config)
        .expr(Expr::call_output(
            "numbers.each",
            vec![Term::number(0), Term::number(1_000_000)],
            Term::var("x"),
        ))
        .expr(Expr::call("test.observe", vec![Term::var("x")]))
        .expr(Expr::unify(Term::var("x"), Term::number(-1)))
        .build()
        .unwrap()
        .run()
        .unwrap_err();

    assert!(matches!(err, EvalError::Cancelled));
    let seen = calls.load(Ordering::SeqCst);
    assert!(seen >= CANCEL_AT);
    assert!(seen < CANCEL_AT + 2 * 64, "observed {seen} solutions after cancel");
}

#[test]
fn cancelled_before_start_never_evaluates() {
    let cancel = CancelSignal::new();
    let calls = Arc::new(AtomicUsize::new(0));
    cancel.cancel();

    let err = QueryBuilder::new()
        .builtins(Arc::new(observing_registry(&cancel, &calls)))
        .cancel(cancel)
        .expr(Expr::call("test.observe", vec![Term::number(1)]))
        .build()
        .unwrap()
        .run()
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn queries_without_a_cancel_request_finish() {
    let cancel = CancelSignal::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let results = QueryBuilder::new()
        .builtins(Arc::new(observing_registry(&CancelSignal::new(), &calls)))
        .cancel(cancel)
        .expr(Expr::call_output(
            "numbers.each",
            vec![Term::number(1), Term::number(10)],
            Term::var("x"),
        ))
        .expr(Expr::call("test.observe", vec![Term::var("x")]))
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(results.len(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}
