//! Interest expression parsing and per-source translation.

use proptest::prelude::*;

use paper_scout::QueryError;
use paper_scout::models::{DegradationPolicy, Source};
use paper_scout::query::{Expr, QueryPlan, TranslationWarning, translate};

const MIXED: &str = "(A) AND (B OR C) AND NOT (D)";

#[test]
fn test_mixed_expression_degrades_for_biorxiv() {
    let expr = Expr::parse(MIXED).unwrap();
    let query = translate(&expr, Source::BioRxiv, DegradationPolicy::Union);

    let terms = query.any_of();
    for term in ["A", "B", "C"] {
        assert!(terms.iter().any(|t| t == term), "missing {term} in {terms:?}");
    }
    assert!(!terms.iter().any(|t| t == "D"));
    assert!(matches!(
        &query.warnings[..],
        [TranslationWarning::Degraded { source: Source::BioRxiv, dropped_negations, .. }]
            if dropped_negations == &["D".to_string()]
    ));
}

#[test]
fn test_mixed_expression_unchanged_for_boolean_sources() {
    let expr = Expr::parse(MIXED).unwrap();

    for source in [Source::PubMed, Source::ArXiv] {
        let query = translate(&expr, source, DegradationPolicy::Union);
        assert_eq!(query.plan, QueryPlan::Boolean(expr.clone()));
        assert!(query.warnings.is_empty(), "{source}: {:?}", query.warnings);
    }

    let pubmed = translate(&expr, Source::PubMed, DegradationPolicy::Union);
    assert_eq!(
        pubmed.text,
        r#""A"[tiab] AND ("B"[tiab] OR "C"[tiab]) NOT "D"[tiab]"#
    );
}

#[test]
fn test_strict_policy_skips_biorxiv() {
    let expr = Expr::parse(MIXED).unwrap();
    let query = translate(&expr, Source::BioRxiv, DegradationPolicy::Strict);

    assert!(query.is_empty());
    assert_eq!(query.warnings, vec![TranslationWarning::Refused { source: Source::BioRxiv }]);
}

#[test]
fn test_pure_disjunction_has_no_warning() {
    let expr = Expr::parse("[single cell] OR [spatial transcriptomics]").unwrap();
    let query = translate(&expr, Source::BioRxiv, DegradationPolicy::Strict);

    assert_eq!(query.any_of(), ["single cell", "spatial transcriptomics"]);
    assert!(query.warnings.is_empty());
}

#[test]
fn test_parse_errors() {
    assert_eq!(Expr::parse("   "), Err(QueryError::Empty));
    assert!(matches!(Expr::parse("(A OR B"), Err(QueryError::UnbalancedParen { offset: 0 })));
    assert!(matches!(Expr::parse("A AND"), Err(QueryError::DanglingOperator { .. })));
    assert!(matches!(Expr::parse("[open"), Err(QueryError::UnterminatedTerm { offset: 0 })));
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = "[a-z]{1,8}( [a-z]{1,8})?".prop_map(Expr::term);
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::and),
            prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::or),
            inner.prop_map(Expr::not),
        ]
    })
}

proptest! {
    /// Rendering an expression and parsing it back yields the same tree.
    #[test]
    fn display_parses_back(expr in arb_expr()) {
        let text = expr.to_string();
        prop_assert_eq!(Expr::parse(&text), Ok(expr));
    }

    /// Translation never fails and never widens boolean sources.
    #[test]
    fn translate_is_total(expr in arb_expr()) {
        for source in Source::ALL {
            for policy in [DegradationPolicy::Union, DegradationPolicy::Strict] {
                let query = translate(&expr, source, policy);
                if matches!(source, Source::PubMed | Source::ArXiv) {
                    prop_assert_eq!(&query.plan, &QueryPlan::Boolean(expr.clone()));
                }
            }
        }
    }
}
