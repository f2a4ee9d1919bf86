use std::sync::Arc;

use serde_json::json;

use regula::{Expr, QueryBuilder, Rule, RuleSet, Term, WithTarget};

fn authz_rules() -> Arc<RuleSet> {
    Arc::new(
        RuleSet::new(vec![
            Rule::default_value(&["authz", "allow"], false),
            Rule::boolean(
                &["authz", "allow"],
                vec![Expr::unify(Term::input_ref(&["user", "role"]), Term::string("admin"))],
            ),
            Rule::function(
                &["lib", "tag"],
                vec![Term::var("x")],
                Term::var("y"),
                vec![Expr::call_output("plus", vec![Term::var("x"), Term::number(1)], Term::var("y"))],
            ),
            Rule::function(
                &["lib", "tag10"],
                vec![Term::var("x")],
                Term::var("y"),
                vec![Expr::call_output("plus", vec![Term::var("x"), Term::number(10)], Term::var("y"))],
            ),
            Rule::complete(
                &["lib", "tagged"],
                Term::var("t"),
                vec![Expr::call_output("data.lib.tag", vec![Term::number(1)], Term::var("t"))],
            ),
        ])
        .unwrap(),
    )
}

fn guest_input() -> Term {
    Term::from_json(&json!({"user": {"name": "bob", "role": "guest"}}))
}

#[test]
fn input_override_is_scoped_to_the_expression() {
    let results = QueryBuilder::new()
        .rules(authz_rules())
        .input(guest_input())
        .expr(Expr::unify(Term::var("before"), Term::data_ref(&["authz", "allow"])))
        .expr(
            Expr::unify(Term::var("during"), Term::data_ref(&["authz", "allow"])).with(
                WithTarget::Input(vec![Term::string("user"), Term::string("role")]),
                "admin",
            ),
        )
        .expr(Expr::unify(Term::var("after"), Term::data_ref(&["authz", "allow"])))
        .expr(Expr::unify(Term::var("name"), Term::input_ref(&["user", "name"])))
        .build()
        .unwrap()
        .run()
        .unwrap();

    let row = &results.rows()[0];
    assert_eq!(row.get("before"), Some(&Term::Bool(false)));
    assert_eq!(row.get("during"), Some(&Term::Bool(true)));
    assert_eq!(row.get("after"), Some(&Term::Bool(false)));
    assert_eq!(row.get("name"), Some(&Term::string("bob")));
}

#[test]
fn whole_input_can_be_replaced() {
    let results = QueryBuilder::new()
        .rules(authz_rules())
        .expr(
            Expr::term(Term::data_ref(&["authz", "allow"])).with(
                WithTarget::Input(Vec::new()),
                Term::from_json(&json!({"user": {"role": "admin"}})),
            ),
        )
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert!(results.is_defined());
}

#[test]
fn builtin_mocked_by_value_and_by_function() {
    let xs = Term::from_json(&json!([1, 2, 3]));
    let results = QueryBuilder::new()
        .expr(
            Expr::call_output("count", vec![xs.clone()], Term::var("mocked"))
                .with(WithTarget::Function("count".to_string()), 99),
        )
        .expr(
            Expr::call_output("count", vec![xs.clone()], Term::var("replaced"))
                .with(WithTarget::Function("count".to_string()), Term::var("sum")),
        )
        .expr(Expr::call_output("count", vec![xs], Term::var("real")))
        .build()
        .unwrap()
        .run()
        .unwrap();

    let row = &results.rows()[0];
    assert_eq!(row.get("mocked"), Some(&Term::number(99)));
    assert_eq!(row.get("replaced"), Some(&Term::number(6)));
    assert_eq!(row.get("real"), Some(&Term::number(3)));
}

#[test]
fn user_function_mock_reaches_nested_calls() {
    let results = QueryBuilder::new()
        .rules(authz_rules())
        .expr(Expr::unify(Term::var("plain"), Term::data_ref(&["lib", "tagged"])))
        .expr(
            Expr::unify(Term::var("swapped"), Term::data_ref(&["lib", "tagged"])).with(
                WithTarget::Function("data.lib.tag".to_string()),
                Term::data_ref(&["lib", "tag10"]),
            ),
        )
        .build()
        .unwrap()
        .run()
        .unwrap();

    let row = &results.rows()[0];
    assert_eq!(row.get("plain"), Some(&Term::number(2)));
    assert_eq!(row.get("swapped"), Some(&Term::number(11)));
}

#[test]
fn overriding_data_documents_is_rejected() {
    let err = QueryBuilder::new()
        .rules(authz_rules())
        .expr(
            Expr::term(Term::data_ref(&["authz", "allow"]))
                .with(WithTarget::Function("data.authz.allow".to_string()), true),
        )
        .build()
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, regula::EvalError::Validation { .. }));
}

#[test]
fn with_target_from_reference() {
    let input = WithTarget::from_ref(&regula::Ref::input(&["user", "role"])).unwrap();
    assert_eq!(
        input,
        WithTarget::Input(vec![Term::string("user"), Term::string("role")])
    );
    let func = WithTarget::from_ref(&regula::Ref::data(&["lib", "tag"])).unwrap();
    assert_eq!(func, WithTarget::Function("data.lib.tag".to_string()));
}
