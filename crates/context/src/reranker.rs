//! Code-aware reranking with token-budget selection.
//!
//! # Scoring
//!
//! For each passage, over a fixed vocabulary of code/domain terms:
//!
//! - `density   = min(keyword_hits / total_words * 100, 1.0)` (repeats count)
//! - `diversity = min(distinct_keywords / 10, 0.5)`
//! - `code      = density + diversity`
//! - `adjusted  = base * (1 + code * boost_factor)`
//!
//! The boost is multiplicative so it only amplifies passages the retriever
//! already found relevant.
//!
//! # Selection
//!
//! Walk the ranking, accepting whole passages while they fit. The first
//! passage that overflows is truncated into the remaining budget if more
//! than `min_truncation_tokens` remain; either way selection stops there.
//! Lower-ranked passages are never used to pack leftover budget.

use std::borrow::Cow;

use contextkeeper_config::RerankerConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keywords::DEFAULT_CODE_KEYWORDS;
use crate::token::{estimate_tokens, CHARS_PER_TOKEN};

const DENSITY_SCALE: f64 = 100.0;
const DENSITY_CAP: f64 = 1.0;
const DIVERSITY_DIVISOR: f64 = 10.0;
const DIVERSITY_CAP: f64 = 0.5;

/// A sentence cut is only taken when it keeps more than this share of the
/// allowed characters.
const SENTENCE_CUT_RATIO: f64 = 0.7;
const ELLIPSIS: &str = "...";

// ── Types ─────────────────────────────────────────────────────────────────

/// A retrieved unit of text with a baseline relevance score.
///
/// `content()` may be computed on demand; the reranker calls it once per
/// passage and never mutates the source.
pub trait RetrievedPassage {
    fn content(&self) -> Cow<'_, str>;
    fn base_score(&self) -> f64;
}

/// A plain retrieved passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Passage {
    pub fn new(content: impl Into<String>, score: f64) -> Self {
        Self {
            id: None,
            content: content.into(),
            score,
            source: None,
        }
    }
}

impl RetrievedPassage for Passage {
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.content)
    }

    fn base_score(&self) -> f64 {
        self.score
    }
}

/// How code-like a passage reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeRelevance {
    pub keyword_hits: usize,
    pub distinct_keywords: usize,
    pub total_words: usize,
    pub density_score: f64,
    pub diversity_bonus: f64,
}

impl CodeRelevance {
    pub fn score(&self) -> f64 {
        self.density_score + self.diversity_bonus
    }
}

/// A scored view over a retrieved passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPassage {
    /// Position of the source passage in the input slice.
    pub index: usize,
    /// Passage text, possibly truncated by budget selection.
    pub content: String,
    pub base_score: f64,
    pub relevance: CodeRelevance,
    pub code_relevance: f64,
    pub adjusted_score: f64,
    pub truncated: bool,
}

impl RankedPassage {
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Per-passage score breakdown in [`RerankStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub index: usize,
    pub base_score: f64,
    pub density_score: f64,
    pub diversity_bonus: f64,
    pub code_relevance: f64,
    pub adjusted_score: f64,
    pub tokens: usize,
    pub truncated: bool,
}

/// Diagnostics for one rerank call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankStats {
    pub original_count: usize,
    pub reranked_count: usize,
    pub total_tokens: usize,
    pub max_tokens: usize,
    pub truncated_count: usize,
    pub average_code_relevance: f64,
    pub top: Vec<ScoreBreakdown>,
}

/// Reranker settings.
#[derive(Debug, Clone)]
pub struct RerankerOptions {
    pub keywords: Vec<String>,
    pub boost_factor: f64,
    pub max_tokens: usize,
    pub min_truncation_tokens: usize,
    pub top_n: usize,
}

impl Default for RerankerOptions {
    fn default() -> Self {
        Self::from(&RerankerConfig::default())
    }
}

impl From<&RerankerConfig> for RerankerOptions {
    fn from(config: &RerankerConfig) -> Self {
        let keywords = match &config.keywords {
            Some(list) => list.clone(),
            None => DEFAULT_CODE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };
        Self {
            keywords,
            boost_factor: config.boost_factor,
            max_tokens: config.max_tokens,
            min_truncation_tokens: config.min_truncation_tokens,
            top_n: config.top_n,
        }
    }
}

// ── Reranker ──────────────────────────────────────────────────────────────

/// Stateless after construction; safe to share across threads.
#[derive(Debug, Clone)]
pub struct CodeReranker {
    options: RerankerOptions,
}

impl CodeReranker {
    pub fn new(mut options: RerankerOptions) -> Self {
        options.keywords = options
            .keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        options.keywords.sort();
        options.keywords.dedup();
        Self { options }
    }

    pub fn from_config(config: &RerankerConfig) -> Self {
        Self::new(RerankerOptions::from(config))
    }

    pub fn options(&self) -> &RerankerOptions {
        &self.options
    }

    /// Score, sort and select within the token budget.
    pub fn rerank<P: RetrievedPassage>(&self, passages: &[P]) -> Vec<RankedPassage> {
        let ranked = self.rank(passages);
        self.select_within_budget(ranked)
    }

    /// Score every passage and sort by descending adjusted score.
    ///
    /// The sort is stable: equal scores keep their input order.
    pub fn rank<P: RetrievedPassage>(&self, passages: &[P]) -> Vec<RankedPassage> {
        let mut ranked: Vec<RankedPassage> = passages
            .iter()
            .enumerate()
            .map(|(index, passage)| {
                let content = passage.content().into_owned();
                let base_score = sanitize(passage.base_score());
                let relevance = self.relevance(&content);
                let code_relevance = relevance.score();
                let adjusted_score =
                    boost(base_score, 1.0 + code_relevance * self.options.boost_factor);
                RankedPassage {
                    index,
                    content,
                    base_score,
                    relevance,
                    code_relevance,
                    adjusted_score,
                    truncated: false,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.adjusted_score.total_cmp(&a.adjusted_score));
        ranked
    }

    /// Take a prefix of `ranked` that fits the token budget.
    pub fn select_within_budget(&self, ranked: Vec<RankedPassage>) -> Vec<RankedPassage> {
        let max_tokens = self.options.max_tokens;
        let available = ranked.len();
        let mut used = 0;
        let mut selected = Vec::new();

        for mut passage in ranked {
            let cost = passage.estimated_tokens();
            if used + cost <= max_tokens {
                used += cost;
                selected.push(passage);
                continue;
            }

            let remaining = max_tokens - used;
            if remaining > self.options.min_truncation_tokens {
                let cut = truncate_to_tokens(&passage.content, remaining);
                if !cut.is_empty() {
                    used += estimate_tokens(&cut);
                    passage.content = cut;
                    passage.truncated = true;
                    selected.push(passage);
                }
            } else {
                debug!(
                    remaining,
                    needed = cost,
                    "Remaining budget below truncation threshold"
                );
            }
            break;
        }

        debug!(
            available,
            selected = selected.len(),
            tokens = used,
            budget = max_tokens,
            "Selected passages within token budget"
        );
        selected
    }

    /// Code relevance of a piece of text.
    pub fn relevance(&self, content: &str) -> CodeRelevance {
        let lower = content.to_lowercase();
        let total_words = lower.split_whitespace().count();
        if total_words == 0 {
            return CodeRelevance::default();
        }

        let mut keyword_hits = 0;
        let mut distinct_keywords = 0;
        for keyword in &self.options.keywords {
            let hits = lower.matches(keyword.as_str()).count();
            if hits > 0 {
                distinct_keywords += 1;
                keyword_hits += hits;
            }
        }

        let density_score =
            (keyword_hits as f64 / total_words as f64 * DENSITY_SCALE).min(DENSITY_CAP);
        let diversity_bonus = (distinct_keywords as f64 / DIVERSITY_DIVISOR).min(DIVERSITY_CAP);

        CodeRelevance {
            keyword_hits,
            distinct_keywords,
            total_words,
            density_score,
            diversity_bonus,
        }
    }

    /// Diagnostics over an input slice and its rerank result.
    pub fn stats<P: RetrievedPassage>(
        &self,
        original: &[P],
        reranked: &[RankedPassage],
    ) -> RerankStats {
        let total_tokens = reranked.iter().map(|p| p.estimated_tokens()).sum();
        let average_code_relevance = if reranked.is_empty() {
            0.0
        } else {
            reranked.iter().map(|p| p.code_relevance).sum::<f64>() / reranked.len() as f64
        };

        let top = reranked
            .iter()
            .take(self.options.top_n)
            .map(|p| ScoreBreakdown {
                index: p.index,
                base_score: p.base_score,
                density_score: p.relevance.density_score,
                diversity_bonus: p.relevance.diversity_bonus,
                code_relevance: p.code_relevance,
                adjusted_score: p.adjusted_score,
                tokens: p.estimated_tokens(),
                truncated: p.truncated,
            })
            .collect();

        RerankStats {
            original_count: original.len(),
            reranked_count: reranked.len(),
            total_tokens,
            max_tokens: self.options.max_tokens,
            truncated_count: reranked.iter().filter(|p| p.truncated).count(),
            average_code_relevance,
            top,
        }
    }
}

impl Default for CodeReranker {
    fn default() -> Self {
        Self::new(RerankerOptions::default())
    }
}

/// Apply a multiplier of at least 1 so that the result never decreases as
/// the multiplier grows. Negative scores move toward zero instead of away.
fn boost(base_score: f64, multiplier: f64) -> f64 {
    if base_score < 0.0 {
        base_score / multiplier
    } else {
        base_score * multiplier
    }
}

/// NaN scores rank as zero.
fn sanitize(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score }
}

/// Cut `text` so that its estimate is at most `max_tokens`.
///
/// Prefers the last `.` past 70% of the allowed characters; otherwise
/// hard-cuts and appends an ellipsis that fits inside the allowance.
fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix = take_chars(text, max_chars);
    if let Some(dot) = prefix.rfind('.') {
        let dot_pos = prefix[..dot].chars().count();
        if dot_pos as f64 > max_chars as f64 * SENTENCE_CUT_RATIO {
            return prefix[..=dot].to_string();
        }
    }

    let hard = take_chars(text, max_chars.saturating_sub(ELLIPSIS.len()));
    format!("{hard}{ELLIPSIS}")
}

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
