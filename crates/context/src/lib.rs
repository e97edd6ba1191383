//! Retrieved-passage reranking under a hard token ceiling.
//!
//! Retrieved passages arrive with a baseline relevance score. The
//! [`CodeReranker`] boosts passages that read like implementation material,
//! sorts them, and walks the sorted list filling a token budget, truncating
//! the boundary passage rather than dropping it when enough budget remains.
//!
//! | Step | Input | Output |
//! |------|-------|--------|
//! | Score | passage content | density + diversity over a code vocabulary |
//! | Rank | base score × boost | stable descending order |
//! | Select | ranked list, budget | prefix of the ranking, last entry possibly truncated |

pub mod keywords;
pub mod reranker;
pub mod token;

pub use keywords::DEFAULT_CODE_KEYWORDS;
pub use reranker::{
    CodeRelevance, CodeReranker, Passage, RankedPassage, RerankStats, RerankerOptions,
    RetrievedPassage, ScoreBreakdown,
};
pub use token::estimate_tokens;
