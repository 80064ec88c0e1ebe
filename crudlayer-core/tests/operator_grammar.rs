//! Operator grammar and query fragment tests.

use bson::doc;
use crudlayer_core::{
    definition::DocumentState,
    error::CrudError,
    grammar::{Grammar, GrammarKind, Token, tokens},
    query::{Expr, FieldOp, StateFilter, build_filter, parse_query_filter},
};
use pretty_assertions::assert_eq;

fn fields() -> Vec<String> {
    ["_id", "title", "pages", "__STATE__"].iter().map(|f| f.to_string()).collect()
}

fn no_fields(_: &str) -> bool {
    false
}

// =============================================================================
// Tokenizer Tests
// =============================================================================

#[test]
fn test_tokens_distinguish_operators_and_variables() {
    let found = tokens(r#"{"$add": ["$price", "$$ROOT", "$$$CURRENT"]}"#).collect::<Vec<_>>();

    assert_eq!(
        found,
        vec![
            Token::Dollar("$add"),
            Token::Dollar("$price"),
            Token::Variable("ROOT"),
            Token::Variable("CURRENT"),
        ],
    );
}

#[test]
fn test_lone_dollars_are_not_tokens() {
    assert_eq!(tokens("costs 5 $ or $.").count(), 0);
}

// =============================================================================
// Grammar Tests
// =============================================================================

#[test]
fn test_projection_grammar_allow_list() {
    let grammar = Grammar::projection();

    assert_eq!(grammar.kind(), GrammarKind::Projection);
    assert!(grammar.is_allowed_operator("$concat"));
    assert!(grammar.is_allowed_operator("$cond"));
    assert!(!grammar.is_allowed_operator("$where"));
    assert!(!grammar.is_allowed_operator("$regex"));
}

#[test]
fn test_query_grammar_extends_projection_grammar() {
    let grammar = Grammar::query();

    assert!(grammar.is_allowed_operator("$regex"));
    assert!(grammar.is_allowed_operator("$expr"));
    assert!(grammar.is_allowed_operator("$concat"));
    assert!(!grammar.is_allowed_operator("$where"));
    assert!(!grammar.is_allowed_operator("$function"));
    assert!(!grammar.is_allowed_operator("$accumulator"));
}

#[test]
fn test_validate_str_uses_the_readable_predicate() {
    let grammar = Grammar::projection();
    let readable = |name: &str| name == "title";

    assert!(grammar.validate_str("$title", &readable).is_ok());
    assert!(grammar.validate_str("$pages", &readable).is_err());
    assert!(grammar.validate_str("$toUpper", &no_fields).is_ok());
}

#[test]
fn test_every_system_variable_is_rejected() {
    let grammar = Grammar::query();

    for variable in crudlayer_core::grammar::SYSTEM_VARIABLES {
        let err = grammar.validate_str(&format!("$${variable}"), &no_fields).unwrap_err();
        assert!(err.is_request_error());
        assert!(err.to_string().contains("system variable"));
    }
}

// =============================================================================
// Query Fragment Tests
// =============================================================================

#[test]
fn test_query_filter_is_parsed_into_a_document() {
    let filter = parse_query_filter(
        r#"{ "pages": { "$gte": 100 }, "title": { "$regex": "^D", "$options": "i" } }"#,
        &fields(),
    )
    .unwrap();

    assert_eq!(filter, doc! { "pages": { "$gte": 100 }, "title": { "$regex": "^D", "$options": "i" } });
}

#[test]
fn test_query_expr_may_reference_known_fields() {
    let filter = parse_query_filter(r#"{ "$expr": { "$gt": ["$pages", 10] } }"#, &fields());

    assert!(filter.is_ok());
}

#[test]
fn test_query_filter_rejects_server_side_code_and_variables() {
    for text in [
        r#"{ "$where": "this.pages > 1" }"#,
        r#"{ "$expr": { "$function": { "body": "x", "args": [], "lang": "js" } } }"#,
        r#"{ "$expr": { "$eq": ["$$ROOT", {}] } }"#,
        r#"{ "$expr": { "$gt": ["$secret", 1] } }"#,
    ] {
        let err = parse_query_filter(text, &fields()).unwrap_err();
        assert!(matches!(err, CrudError::InvalidRequest(_)), "{text}");
    }
}

#[test]
fn test_query_filter_must_be_an_object() {
    assert!(parse_query_filter("[]", &fields()).is_err());
    assert!(parse_query_filter("{", &fields()).is_err());
}

// =============================================================================
// State Filter Tests
// =============================================================================

#[test]
fn test_state_filter_defaults_to_public() {
    assert_eq!(StateFilter::parse(None).unwrap().states(), &[DocumentState::Public]);
    assert_eq!(StateFilter::parse(Some(" ")).unwrap(), StateFilter::default());
}

#[test]
fn test_state_filter_parsing() {
    let states = StateFilter::parse(Some("DRAFT, PUBLIC,DRAFT")).unwrap();

    assert_eq!(states.states(), &[DocumentState::Draft, DocumentState::Public]);
    assert_eq!(states.to_filter(), doc! { "__STATE__": { "$in": ["DRAFT", "PUBLIC"] } });
}

#[test]
fn test_unknown_state_is_a_request_error() {
    let err = StateFilter::parse(Some("PUBLIC,ARCHIVED")).unwrap_err();

    assert!(err.is_request_error());
    assert!(err.to_string().contains("ARCHIVED"));
}

#[test]
fn test_build_filter_combines_query_and_states() {
    let states = StateFilter::default();

    assert_eq!(
        build_filter(Some(doc! { "pages": 1 }), &states),
        doc! { "$and": [{ "pages": 1 }, { "__STATE__": { "$in": ["PUBLIC"] } }] },
    );
    assert_eq!(build_filter(None, &states), doc! { "__STATE__": { "$in": ["PUBLIC"] } });
    assert_eq!(build_filter(Some(doc! {}), &states), states.to_filter());
}

// =============================================================================
// Filter Lowering Tests
// =============================================================================

#[test]
fn test_filter_lowering() {
    let expr = Expr::from_filter(&doc! {
        "title": "Dune",
        "pages": { "$gt": 10, "$exists": true },
        "$or": [{ "a": 1 }],
    })
    .unwrap();

    assert_eq!(
        expr,
        Expr::And(vec![
            Expr::Field { field: "title".into(), op: FieldOp::Eq, value: "Dune".into() },
            Expr::And(vec![
                Expr::Field { field: "pages".into(), op: FieldOp::Gt, value: 10.into() },
                Expr::Exists("pages".into(), true),
            ]),
            Expr::Or(vec![Expr::Field { field: "a".into(), op: FieldOp::Eq, value: 1.into() }]),
        ]),
    );
}

#[test]
fn test_filter_lowering_rejects_unsupported_operators() {
    assert!(matches!(Expr::from_filter(&doc! { "$expr": {} }), Err(CrudError::Backend(_))));
    assert!(matches!(
        Expr::from_filter(&doc! { "title": { "$regex": "x" } }),
        Err(CrudError::Backend(_)),
    ));
}
