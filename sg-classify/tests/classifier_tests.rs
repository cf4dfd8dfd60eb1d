//! Classification scenarios with a scripted knowledge search
//!
//! Covers direct registry hits, the three positional triggers, the two-language
//! fallback and its failure modes.

mod helpers;

use helpers::{fallback_config, test_registry, StubResponse, StubSearch};
use sg_classify::fallback::{FallbackResolver, SearchError};
use sg_classify::tokenizer::tokenize_name;
use sg_classify::{Classifier, Resolution, Trigger};
use sg_common::Gender;
use std::sync::Arc;

fn classifier_with(search: Arc<StubSearch>) -> Classifier {
    let registry = test_registry();
    let resolver = FallbackResolver::new(search, Arc::clone(&registry), &fallback_config());
    Classifier::new(registry, Arc::new(resolver))
}

fn tokens(name: &str) -> Vec<String> {
    tokenize_name(Some(name))
}

#[tokio::test]
async fn test_rue_pasteur_unresolved_is_neutral() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Rue Pasteur")).await;

    assert_eq!(result.gender, Gender::Neutral);
    assert_eq!(
        result.resolution,
        Resolution::Unresolved {
            trigger: Some(Trigger::TwoTokens)
        }
    );
    // Primary then secondary language
    assert_eq!(
        search.calls(),
        vec![
            ("pasteur".to_string(), "en".to_string()),
            ("pasteur".to_string(), "fr".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_rue_pasteur_resolved_from_titles() {
    let search = Arc::new(StubSearch::new().with_titles(
        "pasteur",
        "en",
        &["Louis Pasteur", "Pasteur Institute", "Pasteurization"],
    ));
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Rue Pasteur")).await;

    assert_eq!(result.gender, Gender::Masculine);
    assert_eq!(
        result.resolution,
        Resolution::Fallback {
            trigger: Trigger::TwoTokens,
            query: "pasteur".to_string(),
            matched: "louis".to_string(),
            language: "en".to_string(),
        }
    );
    assert_eq!(search.calls().len(), 1);
}

#[tokio::test]
async fn test_rue_de_rivoli_queries_rivoli() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Rue de Rivoli")).await;

    assert_eq!(result.gender, Gender::Neutral);
    assert_eq!(search.queries_for("rivoli"), 2);
    assert!(search.calls().iter().all(|(q, _)| q == "rivoli"));
}

#[tokio::test]
async fn test_general_leclerc_hits_override_without_search() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Avenue du Général Leclerc")).await;

    assert_eq!(result.gender, Gender::Masculine);
    assert_eq!(
        result.resolution,
        Resolution::Registry {
            token: "general".to_string()
        }
    );
    assert!(search.calls().is_empty());
}

#[tokio::test]
async fn test_qualified_name_queries_second_token() {
    // Documented quirk: the qualified shape queries token[1], unlike the
    // linked shape which queries token[2]
    let search = Arc::new(StubSearch::new().with_titles(
        "hachette",
        "en",
        &["Jeanne Hachette"],
    ));
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Rue Hachette de la Bastille")).await;

    assert_eq!(result.gender, Gender::Feminine);
    match result.resolution {
        Resolution::Fallback { trigger, query, .. } => {
            assert_eq!(trigger, Trigger::QualifiedName);
            assert_eq!(query, "hachette");
        }
        other => panic!("expected fallback resolution, got {:?}", other),
    }
    assert_eq!(search.queries_for("bastille"), 0);
}

#[tokio::test]
async fn test_first_token_hit_wins() {
    let classifier = classifier_with(Arc::new(StubSearch::new()));

    // "sainte" (override) precedes "marie" and "louis" (statistical)
    let result = classifier.classify(&tokens("Rue Sainte Louis Marie")).await;
    assert_eq!(result.gender, Gender::Feminine);

    let result = classifier.classify(&tokens("Place Louis Marie")).await;
    assert_eq!(result.gender, Gender::Masculine);
}

#[tokio::test]
async fn test_override_beats_statistics_and_exclusions_win() {
    let classifier = classifier_with(Arc::new(StubSearch::new()));

    // INSEE says feminine; the override table says masculine
    let result = classifier.classify(&tokens("Rue Camille Desmoulins")).await;
    assert_eq!(result.gender, Gender::Masculine);

    // "france" is in INSEE but excluded, so "Rue de France" goes to fallback
    assert_eq!(classifier.registry().lookup("france"), None);
}

#[tokio::test]
async fn test_shape_without_trigger_never_searches() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    for name in ["Boulevard Saint-Germain-des-Prés", "Rue des Lilas", "Impasse", "Rue du Bac"] {
        let t = tokens(name);
        let result = classifier.classify(&t).await;
        if result.gender == Gender::Neutral {
            assert_eq!(result.resolution, Resolution::Unresolved { trigger: None }, "{}", name);
        }
    }
    assert!(search.calls().is_empty());
}

#[tokio::test]
async fn test_missing_name_is_neutral() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokenize_name(None)).await;

    assert_eq!(result.gender, Gender::Neutral);
    assert!(search.calls().is_empty());
}

#[tokio::test]
async fn test_transport_errors_degrade_to_secondary_then_neutral() {
    let search = Arc::new(
        StubSearch::new()
            .with_response("curie", "en", StubResponse::Fail(SearchError::RateLimited))
            .with_response(
                "curie",
                "fr",
                StubResponse::Fail(SearchError::Network("connection reset".to_string())),
            )
            .with_response("rivoli", "en", StubResponse::Fail(SearchError::Api(500, "boom".to_string())))
            .with_titles("rivoli", "fr", &["Victor Rivoli"]),
    );
    let registry = test_registry();
    let resolver = Arc::new(FallbackResolver::new(
        search.clone(),
        Arc::clone(&registry),
        &fallback_config(),
    ));
    let classifier = Classifier::new(registry, Arc::clone(&resolver));

    let result = classifier.classify(&tokens("Rue Curie")).await;
    assert_eq!(result.gender, Gender::Neutral);

    let result = classifier.classify(&tokens("Rue de Rivoli")).await;
    assert_eq!(result.gender, Gender::Masculine);

    let stats = resolver.stats();
    assert_eq!(stats.queries, 2);
    assert_eq!(stats.searches, 4);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_search_times_out_as_no_candidate() {
    let search = Arc::new(
        StubSearch::new()
            .with_response("hugo", "en", StubResponse::Hang)
            .with_titles("hugo", "fr", &["Victor Hugo"]),
    );
    let classifier = classifier_with(search.clone());

    let result = classifier.classify(&tokens("Rue Hugo")).await;

    assert_eq!(result.gender, Gender::Masculine);
    assert_eq!(classifier.fallback().unwrap().stats().failures, 1);
}

#[tokio::test]
async fn test_same_query_searched_once_across_names() {
    let search = Arc::new(StubSearch::new());
    let classifier = classifier_with(search.clone());

    // Two different names share the query token "rivoli"
    classifier.classify(&tokens("Rue de Rivoli")).await;
    classifier.classify(&tokens("Quai Rivoli")).await;
    classifier.classify(&tokens("Rue de Rivoli")).await;

    assert_eq!(search.queries_for("rivoli"), 2);
}
