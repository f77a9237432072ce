//! Sentiment scoring: stream a month's curated comments through one of two
//! interchangeable analyzers and write the polarity back onto each record.
//! The analyzers are alternative strategies, never blended; the field name
//! records which one produced the value.

use crate::error::PipelineError;
use crate::progress::make_count_progress;
use crate::store::{curated_collection, DocumentStore, FieldUpdate};
use anyhow::Result;
use rayon::prelude::*;
use serde_json::Value;
use std::str::FromStr;
use std::time::Instant;

/// Analyzer selector. Parsing rejects anything outside the supported set
/// before any record is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Analyzer {
    Vader,
    TextBlob,
}

impl Analyzer {
    /// The per-record field this analyzer writes.
    pub fn field(&self) -> &'static str {
        match self {
            Analyzer::Vader => "vader_sentiment",
            Analyzer::TextBlob => "textblob_sentiment",
        }
    }

    pub fn model(&self) -> Box<dyn SentimentModel> {
        match self {
            Analyzer::Vader => Box::new(VaderModel),
            Analyzer::TextBlob => Box::new(PatternModel),
        }
    }
}

impl FromStr for Analyzer {
    type Err = PipelineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vader" => Ok(Analyzer::Vader),
            "textblob" => Ok(Analyzer::TextBlob),
            other => Err(PipelineError::InvalidAnalyzer(other.to_string())),
        }
    }
}

/// One text body in, one compound polarity in [-1, 1] out. No cross-record
/// state, so scoring can fan out across records freely.
pub trait SentimentModel: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}

/// Valence lexicon shared by both models, VADER-style scale (-4..=4).
/// A compact hand-curated cut of the usual high-frequency entries.
static LEXICON: &[(&str, f64)] = &[
    ("abysmal", -3.1), ("admire", 2.2), ("adore", 2.9), ("afraid", -2.0),
    ("amazing", 2.8), ("angry", -2.3), ("annoying", -1.9), ("awesome", 3.1),
    ("awful", -2.9), ("bad", -2.5), ("beautiful", 2.6), ("best", 3.2),
    ("better", 1.9), ("boring", -1.6), ("brilliant", 2.8), ("broken", -1.7),
    ("calm", 1.3), ("careless", -1.5), ("charming", 2.1), ("cheat", -2.4),
    ("comfort", 1.7), ("corrupt", -2.8), ("crazy", -1.1), ("cruel", -2.7),
    ("damn", -1.6), ("dead", -2.6), ("delight", 2.5), ("destroy", -2.5),
    ("disaster", -3.1), ("disgusting", -2.9), ("dishonest", -2.4), ("dumb", -2.1),
    ("easy", 1.2), ("elegant", 2.1), ("enjoy", 2.2), ("evil", -3.2),
    ("excellent", 3.0), ("excited", 2.2), ("fail", -2.3), ("failure", -2.5),
    ("fair", 1.4), ("fake", -1.8), ("fantastic", 2.9), ("fear", -2.2),
    ("fine", 1.1), ("fraud", -2.8), ("free", 1.5), ("fun", 2.3),
    ("garbage", -2.2), ("glad", 2.0), ("good", 1.9), ("great", 3.1),
    ("happy", 2.7), ("hate", -2.7), ("hell", -2.4), ("helpful", 1.9),
    ("honest", 2.3), ("horrible", -2.9), ("hurt", -2.1), ("idiot", -2.6),
    ("ignorant", -2.0), ("impressive", 2.4), ("incredible", 2.7), ("inspiring", 2.5),
    ("insult", -2.2), ("interesting", 1.6), ("joy", 2.8), ("kill", -3.0),
    ("kind", 2.0), ("lame", -1.6), ("lie", -2.3), ("lose", -1.8),
    ("loser", -2.3), ("love", 3.2), ("lovely", 2.8), ("mediocre", -1.2),
    ("mess", -1.5), ("miserable", -2.7), ("nice", 1.8), ("pathetic", -2.5),
    ("peace", 2.5), ("perfect", 3.1), ("pleasant", 2.1), ("poor", -1.9),
    ("praise", 2.4), ("pretty", 1.7), ("proud", 2.2), ("ridiculous", -2.0),
    ("right", 1.3), ("rotten", -2.4), ("sad", -2.1), ("scam", -2.7),
    ("scared", -2.2), ("sick", -1.9), ("smart", 2.1), ("solid", 1.5),
    ("stupid", -2.5), ("succeed", 2.3), ("success", 2.6), ("sucks", -2.3),
    ("super", 2.8), ("terrible", -3.0), ("terrific", 2.9), ("thank", 1.9),
    ("thanks", 1.9), ("trash", -2.1), ("ugly", -2.3), ("useless", -2.2),
    ("victory", 2.7), ("vile", -3.0), ("warm", 1.6), ("waste", -1.9),
    ("weak", -1.6), ("welcome", 1.9), ("win", 2.6), ("winner", 2.8),
    ("wonderful", 3.0), ("worse", -2.4), ("worst", -3.2), ("wrong", -1.9),
];

static NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor",
    "cannot", "cant", "dont", "doesnt", "didnt", "wont", "wouldnt", "isnt",
    "arent", "wasnt", "werent", "aint", "hardly", "barely", "without",
];

static BOOSTERS: &[&str] = &[
    "very", "really", "extremely", "absolutely", "completely", "totally",
    "incredibly", "so", "super", "utterly",
];

fn lexicon_valence(word: &str) -> Option<f64> {
    LEXICON
        .binary_search_by(|(w, _)| w.cmp(&word))
        .ok()
        .map(|i| LEXICON[i].1)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.trim_matches('\'').to_ascii_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Does any of the up-to-three preceding tokens negate `idx`?
fn negated(tokens: &[String], idx: usize) -> bool {
    let lo = idx.saturating_sub(3);
    tokens[lo..idx].iter().any(|t| NEGATORS.contains(&t.as_str()))
}

/// VADER-style analyzer: valence lexicon with booster weighting and negation
/// damping, normalized to a compound score.
pub struct VaderModel;

// Empirical constants from the published VADER analyzer.
const BOOST_SCALAR: f64 = 0.293;
const NEGATION_SCALAR: f64 = -0.74;

impl SentimentModel for VaderModel {
    fn polarity(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut sum = 0.0f64;
        for (i, tok) in tokens.iter().enumerate() {
            let Some(mut valence) = lexicon_valence(tok) else { continue };
            if i > 0 && BOOSTERS.contains(&tokens[i - 1].as_str()) {
                valence += BOOST_SCALAR * valence.signum();
            }
            if negated(&tokens, i) {
                valence *= NEGATION_SCALAR;
            }
            sum += valence;
        }
        // Compound normalization maps the unbounded sum into [-1, 1].
        let compound = sum / (sum * sum + 15.0).sqrt();
        compound.clamp(-1.0, 1.0)
    }
}

/// Pattern-style analyzer: mean token valence on a [-1, 1] scale with a
/// simple negation flip. The counterpart to TextBlob's polarity.
pub struct PatternModel;

impl SentimentModel for PatternModel {
    fn polarity(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut sum = 0.0f64;
        let mut hits = 0u32;
        for (i, tok) in tokens.iter().enumerate() {
            let Some(valence) = lexicon_valence(tok) else { continue };
            let mut p = valence / 4.0;
            if negated(&tokens, i) {
                p *= -0.5;
            }
            sum += p;
            hits += 1;
        }
        if hits == 0 {
            0.0
        } else {
            (sum / hits as f64).clamp(-1.0, 1.0)
        }
    }
}

/// True when a curated comment is eligible for scoring: non-removed body and
/// positive community approval. Ineligible records are left unset so "not
/// scored" stays distinct from "neutral".
pub fn is_scorable(doc: &Value) -> bool {
    let body_ok = doc
        .get("body")
        .and_then(|v| v.as_str())
        .map(|b| b != "[deleted]")
        .unwrap_or(false);
    let score_ok = doc.get("score").and_then(|v| v.as_i64()).map(|s| s > 0).unwrap_or(false);
    body_ok && score_ok
}

/// Score one month's curated comments with `analyzer`, writing a single
/// analyzer-named polarity field per eligible record. Scoring has no
/// cross-record state, so the polarity computation fans out across records.
/// Returns the number of records scored.
pub fn score_month(
    store: &dyn DocumentStore,
    month: &str,
    analyzer: Analyzer,
    progress: bool,
) -> Result<u64> {
    let collection = curated_collection(month);
    tracing::info!(month, analyzer = ?analyzer, "Scoring sentiment");
    let started = Instant::now();

    let mut eligible: Vec<(String, String)> = Vec::new();
    store.for_each(&collection, &mut |doc| {
        if !is_scorable(doc) {
            return Ok(());
        }
        let (Some(id), Some(body)) = (
            doc.get("id").and_then(|v| v.as_str()),
            doc.get("body").and_then(|v| v.as_str()),
        ) else {
            return Ok(());
        };
        eligible.push((id.to_string(), body.to_string()));
        Ok(())
    })?;

    let pb = if progress {
        Some(make_count_progress(eligible.len() as u64, "Scoring"))
    } else {
        None
    };

    let model = analyzer.model();
    let field = analyzer.field();
    let updates: Vec<FieldUpdate> = eligible
        .par_iter()
        .map(|(id, body)| {
            let polarity = model.polarity(body);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            FieldUpdate {
                id: id.clone(),
                field: field.to_string(),
                value: Value::from(polarity),
            }
        })
        .collect();
    if let Some(pb) = pb {
        pb.finish_with_message("scoring done");
    }

    let scored = store.update_set(&collection, &updates)?;
    tracing::info!(
        month,
        scored,
        elapsed_s = started.elapsed().as_secs_f64(),
        "Sentiment scoring complete"
    );
    Ok(scored)
}
