//! `contextkeeper rerank`: Rerank passages under a token budget.

use std::path::Path;

use contextkeeper_config::RerankerConfig;
use contextkeeper_context::{CodeReranker, Passage, RankedPassage, RerankStats};

use super::{load_config, read_input};

pub async fn run(
    input: &Path,
    max_tokens: Option<usize>,
    boost: Option<f64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let raw = read_input(input)?;
    let passages: Vec<Passage> =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid passage JSON: {e}"))?;

    let (ranked, stats) = rerank(&config.reranker, &passages, max_tokens, boost);

    if json {
        let out = serde_json::json!({ "passages": ranked, "stats": stats });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "Selected {} of {} passages, ~{} / {} tokens ({} truncated)",
        stats.reranked_count,
        stats.original_count,
        stats.total_tokens,
        stats.max_tokens,
        stats.truncated_count
    );
    println!("Average code relevance: {:.3}", stats.average_code_relevance);
    println!();
    for (rank, p) in ranked.iter().enumerate() {
        let label = passages[p.index]
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", p.index));
        println!(
            "{:>3}. {label}  base={:.3} code={:.3} adjusted={:.3} tokens={}{}",
            rank + 1,
            p.base_score,
            p.code_relevance,
            p.adjusted_score,
            p.estimated_tokens(),
            if p.truncated { " (truncated)" } else { "" }
        );
        let preview: String = p.content.chars().take(100).collect();
        println!("     {}", preview.replace('\n', " "));
    }

    Ok(())
}

fn rerank(
    config: &RerankerConfig,
    passages: &[Passage],
    max_tokens: Option<usize>,
    boost: Option<f64>,
) -> (Vec<RankedPassage>, RerankStats) {
    let mut config = config.clone();
    if let Some(max_tokens) = max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(boost) = boost {
        config.boost_factor = boost;
    }
    let reranker = CodeReranker::from_config(&config);
    let ranked = reranker.rerank(passages);
    let stats = reranker.stats(passages, &ranked);
    (ranked, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply() {
        let passages: Vec<Passage> = serde_json::from_str(
            r#"[
                {"id": "a", "content": "Opening remarks about the weather.", "score": 0.9},
                {"id": "b", "content": "The algorithm has linear complexity and a simple interface.", "score": 0.8}
            ]"#,
        )
        .unwrap();

        let (ranked, stats) = rerank(&RerankerConfig::default(), &passages, Some(200), None);
        assert_eq!(stats.max_tokens, 200);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 1);
        assert!(stats.total_tokens <= 200);

        let (ranked, _) = rerank(&RerankerConfig::default(), &passages, None, Some(0.0));
        assert_eq!(ranked[0].index, 0);
    }
}
