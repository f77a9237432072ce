#[path = "common/mod.rs"]
mod common;

use common::*;
use rcsent::{
    build_posts_all, curated_collection, is_scorable, monthly_stats, monthly_stats_top_posts,
    score_month, Analyzer, CollectionWriter, DocumentStore, JsonlStore, PatternModel,
    SentimentModel, VaderModel,
};
use serde_json::{json, Value};
use std::str::FromStr;

fn write_curated(store: &JsonlStore, month: &str, docs: &[Value]) {
    let mut w = store.writer(&curated_collection(month)).unwrap();
    for d in docs {
        w.append(d).unwrap();
    }
    w.commit().unwrap();
}

#[test]
fn analyzer_names_parse_and_reject() {
    assert_eq!(Analyzer::from_str("vader").unwrap(), Analyzer::Vader);
    assert_eq!(Analyzer::from_str(" TextBlob ").unwrap(), Analyzer::TextBlob);
    assert!(Analyzer::from_str("bert").is_err());
    assert!(Analyzer::from_str("").is_err());
}

#[test]
fn model_polarity_signs() {
    let vader = VaderModel;
    assert!(vader.polarity("I love this, it is great") > 0.0);
    assert!(vader.polarity("this is terrible and awful") < 0.0);
    // Negation flips a positive term.
    assert!(vader.polarity("this is not good") < 0.0);
    // No lexicon hit scores neutral.
    assert_eq!(vader.polarity("the quantum chromodynamics lattice"), 0.0);

    let blob = PatternModel;
    assert!(blob.polarity("wonderful fantastic") > 0.0);
    assert!(blob.polarity("worst garbage") < 0.0);
    assert_eq!(blob.polarity("the quantum chromodynamics lattice"), 0.0);

    for text in ["love love love love love", "worst worst worst worst"] {
        assert!(vader.polarity(text).abs() <= 1.0);
        assert!(blob.polarity(text).abs() <= 1.0);
    }
}

#[test]
fn scoring_predicate_excludes_removed_and_unpopular() {
    assert!(is_scorable(&json!({"body": "fine", "score": 1})));
    assert!(!is_scorable(&json!({"body": "[deleted]", "score": 5})));
    assert!(!is_scorable(&json!({"body": "fine", "score": 0})));
    assert!(!is_scorable(&json!({"body": "fine", "score": -2})));
    assert!(!is_scorable(&json!({"score": 3})));
}

#[test]
fn scoring_writes_only_the_selected_analyzer_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let month = "2020-01";
    write_curated(
        &store,
        month,
        &[
            raw_comment("a", "politics", "this is great", "t3_p1", "t3_p1", 5),
            raw_comment("b", "politics", "[deleted]", "t3_p1", "t3_p1", 5),
            raw_comment("c", "politics", "awful take", "t3_p1", "t3_p1", 0),
        ],
    );

    let scored = score_month(&store, month, Analyzer::Vader, false).unwrap();
    assert_eq!(scored, 1);

    let docs = read_collection(dir.path(), &curated_collection(month));
    let a = docs.iter().find(|d| d["id"] == "a").unwrap();
    assert!(a.get("vader_sentiment").and_then(|v| v.as_f64()).unwrap() > 0.0);
    assert!(a.get("textblob_sentiment").is_none());
    // Ineligible records stay unscored rather than scored neutral.
    for id in ["b", "c"] {
        let d = docs.iter().find(|d| d["id"] == id).unwrap();
        assert!(d.get("vader_sentiment").is_none());
    }

    // A second pass with the other analyzer adds its own field and leaves
    // the first analyzer's values alone.
    score_month(&store, month, Analyzer::TextBlob, false).unwrap();
    let docs = read_collection(dir.path(), &curated_collection(month));
    let a2 = docs.iter().find(|d| d["id"] == "a").unwrap();
    assert_eq!(a.get("vader_sentiment"), a2.get("vader_sentiment"));
    assert!(a2.get("textblob_sentiment").is_some());
}

#[test]
fn stats_for_an_absent_month_are_all_undefined() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    let stats = monthly_stats(&store, "1999-01", None, Analyzer::Vader).unwrap();
    assert_eq!(stats.comment_count, 0);
    assert_eq!(stats.avg_abs_pol, None);
    assert_eq!(stats.avg_abs_wght_pol, None);
    assert_eq!(stats.avg_wordcount, None);
}

#[test]
fn stats_average_only_the_scored_eligible_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let month = "2020-01";
    write_curated(
        &store,
        month,
        &[
            json!({
                "id": "a", "body": "four words of text", "score": 10,
                "link_id": "t3_p1", "parent_id": "t3_p1", "subreddit": "politics",
                "vader_sentiment": 0.5
            }),
            // score == 0 fails the scoring predicate, so it never counts.
            json!({
                "id": "b", "body": "ignored", "score": 0,
                "link_id": "t3_p1", "parent_id": "t3_p1", "subreddit": "politics",
                "vader_sentiment": 0.9
            }),
        ],
    );

    let stats = monthly_stats(&store, month, None, Analyzer::Vader).unwrap();
    assert_eq!(stats.comment_count, 1);
    assert_eq!(stats.avg_abs_pol, Some(0.5));
    assert_eq!(stats.avg_abs_wght_pol, Some(0.5)); // (10 * 0.5) / 10
    assert_eq!(stats.avg_wordcount, Some(4.0));
}

#[test]
fn a_scored_record_without_a_body_counts_as_zero_words() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let month = "2020-01";
    write_curated(
        &store,
        month,
        &[
            json!({"id": "a", "score": 2, "subreddit": "politics",
                   "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.5}),
            json!({"id": "b", "body": "[deleted]", "score": 2, "subreddit": "politics",
                   "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.9}),
        ],
    );

    let stats = monthly_stats(&store, month, None, Analyzer::Vader).unwrap();
    // The body-less record still aggregates; the removed one never does.
    assert_eq!(stats.comment_count, 1);
    assert_eq!(stats.avg_abs_pol, Some(0.5));
    assert_eq!(stats.avg_wordcount, Some(0.0));
}

#[test]
fn stats_category_restriction() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let month = "2020-01";
    write_curated(
        &store,
        month,
        &[
            json!({"id": "a", "body": "x", "score": 2, "subreddit": "politics",
                   "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.4}),
            json!({"id": "b", "body": "x", "score": 2, "subreddit": "sports",
                   "link_id": "t3_p2", "parent_id": "t3_p2", "vader_sentiment": -0.8}),
        ],
    );

    let all = monthly_stats(&store, month, None, Analyzer::Vader).unwrap();
    assert_eq!(all.comment_count, 2);
    let politics = monthly_stats(&store, month, Some("politics"), Analyzer::Vader).unwrap();
    assert_eq!(politics.comment_count, 1);
    assert_eq!(politics.avg_abs_pol, Some(0.4));
}

fn post(link_id: &str, sub: &str, score: i64) -> Value {
    json!({
        "link_id": link_id, "title": format!("post {link_id}"), "score": score,
        "is_self": false, "datetime": 1.0, "sub": sub, "permalink": "/x"
    })
}

#[test]
fn top_posts_stats_follow_the_ranked_subset() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let months = vec!["2020-01".to_string(), "2020-02".to_string()];

    // Per-month parent tables: p1 outranks p2; p3 belongs to another sub.
    let mut w = store.writer("posts-2020-01").unwrap();
    w.append(&post("p1", "politics", 500)).unwrap();
    w.append(&post("p2", "politics", 100)).unwrap();
    w.append(&post("p3", "sports", 900)).unwrap();
    w.commit().unwrap();
    let merged = build_posts_all(&store, &months).unwrap();
    assert_eq!(merged, 3);

    // Comments across two months; only t3_p1 comments should aggregate.
    write_curated(
        &store,
        "2020-01",
        &[json!({"id": "a", "body": "one two", "score": 4, "subreddit": "politics",
                 "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.5}),
          json!({"id": "b", "body": "x", "score": 4, "subreddit": "politics",
                 "link_id": "t3_p2", "parent_id": "t3_p2", "vader_sentiment": 1.0})],
    );
    write_curated(
        &store,
        "2020-02",
        &[json!({"id": "c", "body": "three words here", "score": 2, "subreddit": "politics",
                 "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.25})],
    );

    let stats =
        monthly_stats_top_posts(&store, &months, "politics", 1, Analyzer::Vader).unwrap();
    assert_eq!(stats.comment_count, 2);
    assert_eq!(stats.avg_abs_pol, Some(0.375));
    // (4*0.5 + 2*0.25) / 6
    assert_eq!(stats.avg_abs_wght_pol, Some(2.5 / 6.0));
    assert_eq!(stats.avg_wordcount, Some(2.5));
}

#[test]
fn zero_post_limit_aggregates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let months = vec!["2020-01".to_string()];

    let mut w = store.writer("posts-2020-01").unwrap();
    w.append(&post("p1", "politics", 500)).unwrap();
    w.commit().unwrap();
    build_posts_all(&store, &months).unwrap();
    write_curated(
        &store,
        "2020-01",
        &[json!({"id": "a", "body": "x", "score": 4, "subreddit": "politics",
                 "link_id": "t3_p1", "parent_id": "t3_p1", "vader_sentiment": 0.5})],
    );

    let stats = monthly_stats_top_posts(&store, &months, "politics", 0, Analyzer::Vader).unwrap();
    assert_eq!(stats.comment_count, 0);
    assert_eq!(stats.avg_abs_pol, None);
    assert_eq!(stats.avg_abs_wght_pol, None);
    assert_eq!(stats.avg_wordcount, None);
}

#[test]
fn rebuilding_the_aggregate_posts_table_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();
    let months = vec!["2020-01".to_string()];

    let mut w = store.writer("posts-2020-01").unwrap();
    w.append(&post("p1", "politics", 500)).unwrap();
    w.append(&post("p2", "politics", 100)).unwrap();
    w.commit().unwrap();

    assert_eq!(build_posts_all(&store, &months).unwrap(), 2);
    assert_eq!(build_posts_all(&store, &months).unwrap(), 2);
    let all = read_collection(dir.path(), "posts-all");
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|d| d["yearmonth"] == "2020-01"));
}

#[test]
fn score_ties_rank_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::open(dir.path()).unwrap();

    let mut w = store.writer("posts-all").unwrap();
    for (id, score) in [("pz", 100), ("pa", 100), ("pm", 100)] {
        let mut doc = post(id, "politics", score);
        doc["yearmonth"] = Value::from("2020-01");
        w.append(&doc).unwrap();
    }
    w.commit().unwrap();

    let top = store
        .top_by_score("posts-all", &mut |d| d["sub"] == "politics", 2)
        .unwrap();
    let ids: Vec<&str> = top.iter().map(|d| d["link_id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["pa", "pm"]);
}
