//! Filepath: src/core/tokens.rs
//! Advisory token estimates per model family.
//!
//! OpenAI-style models are counted with tiktoken BPE over short
//! whitespace-led chunks cached by xxhash; other families use a
//! character/word ratio. Estimates never decrease when text is
//! appended.

use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, get_bpe_from_model, o200k_base};
use xxhash_rust::xxh64::Xxh64;

/// Model families with distinct counting strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// BPE via tiktoken
    OpenAi,
    /// chars / 3.5
    Anthropic,
    /// chars / 4
    Gemini,
    /// max(chars / 3.8, 1.3 × words)
    OpenWeights,
    /// max(chars / 4, words)
    Generic,
}

const OPENAI_MARKERS: [&str; 6] = ["gpt", "o1", "o3", "o4", "chatgpt", "text-embedding"];
const OPEN_WEIGHT_MARKERS: [&str; 10] = [
    "llama",
    "mistral",
    "magistral",
    "codestral",
    "devstral",
    "qwen",
    "qwq",
    "deepseek",
    "falcon",
    "mixtral",
];

impl ModelFamily {
    /// Detect the family from a model identifier, case-insensitively.
    pub fn detect(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.contains("claude") {
            ModelFamily::Anthropic
        } else if lower.contains("gemini") {
            ModelFamily::Gemini
        } else if OPEN_WEIGHT_MARKERS.iter().any(|m| lower.contains(m)) {
            ModelFamily::OpenWeights
        } else if OPENAI_MARKERS.iter().any(|m| lower.starts_with(m) || lower.contains(&format!("/{m}"))) {
            ModelFamily::OpenAi
        } else {
            ModelFamily::Generic
        }
    }
}

enum Strategy {
    Bpe(CoreBPE),
    Heuristic(ModelFamily),
}

/// Advisory token estimator for one target model.
///
/// Estimates never fail: a model without a known tokenizer uses a
/// character/word heuristic. For every family
/// `estimate(a + b) >= estimate(a)`.
pub struct TokenEstimator {
    family: ModelFamily,
    strategy: Strategy,

    /// BPE counts per chunk, keyed by xxhash64 of the chunk
    cache: Cache<u64, usize>,
}

impl TokenEstimator {
    pub fn new(target_model: &str) -> Self {
        let family = ModelFamily::detect(target_model);
        let lower = target_model.to_ascii_lowercase();

        let strategy = match family {
            ModelFamily::OpenAi => match get_bpe_from_model(&lower).or_else(|_| o200k_base()) {
                Ok(bpe) => Strategy::Bpe(bpe),
                Err(e) => {
                    tracing::warn!(model = target_model, error = %e, "BPE unavailable, using heuristic");
                    Strategy::Heuristic(ModelFamily::Generic)
                }
            },
            other => Strategy::Heuristic(other),
        };

        Self {
            family,
            strategy,
            cache: Cache::new(100_000),
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Estimate the token count of `text`. Empty text is zero.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match &self.strategy {
            Strategy::Bpe(bpe) => self.bpe_estimate(bpe, text),
            Strategy::Heuristic(family) => heuristic(*family, text),
        }
    }

    /// Sum of BPE counts over whitespace-led chunks. The last chunk
    /// may still grow if more text is appended, so it counts as one.
    fn bpe_estimate(&self, bpe: &CoreBPE, text: &str) -> usize {
        let chunks = chunks(text);
        let Some((open, closed)) = chunks.split_last() else {
            return 0;
        };
        debug_assert!(!open.is_empty());

        closed.iter().map(|c| self.count_chunk(bpe, c)).sum::<usize>() + 1
    }

    fn count_chunk(&self, bpe: &CoreBPE, chunk: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(chunk.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        // A non-empty chunk is at least one token
        let t = bpe.encode_ordinary(chunk).len().max(1);
        self.cache.insert(key, t);
        t
    }
}

/// Longest chunk handed to the BPE; long unbroken runs (minified
/// code, base64) are split into windows of this many chars.
const MAX_CHUNK_CHARS: usize = 32;

/// Split into `<whitespace><word>` chunks. A new chunk starts at each
/// whitespace character that follows a non-whitespace one, and after
/// every `MAX_CHUNK_CHARS` chars. Boundaries depend only on the text
/// before them, so appending never moves an earlier boundary.
fn chunks(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_ws = true;
    let mut len = 0;

    for (i, ch) in text.char_indices() {
        let ws = ch.is_whitespace();
        if i > start && ((ws && !prev_ws) || len == MAX_CHUNK_CHARS) {
            out.push(&text[start..i]);
            start = i;
            len = 0;
        }
        prev_ws = ws;
        len += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn heuristic(family: ModelFamily, text: &str) -> usize {
    let chars = text.chars().count() as f64;
    let words = text.split_whitespace().count() as f64;

    let estimate = match family {
        ModelFamily::Anthropic => (chars / 3.5).ceil(),
        ModelFamily::Gemini => (chars / 4.0).ceil(),
        ModelFamily::OpenWeights => (chars / 3.8).ceil().max((words * 1.3).ceil()),
        ModelFamily::Generic | ModelFamily::OpenAi => (chars / 4.0).ceil().max(words),
    };
    estimate as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_detection() {
        assert_eq!(ModelFamily::detect("gpt-4o"), ModelFamily::OpenAi);
        assert_eq!(ModelFamily::detect("o3-mini"), ModelFamily::OpenAi);
        assert_eq!(ModelFamily::detect("Claude-3-5-Sonnet"), ModelFamily::Anthropic);
        assert_eq!(ModelFamily::detect("gemini-1.5-pro"), ModelFamily::Gemini);
        assert_eq!(ModelFamily::detect("meta-llama/Llama-3-70b"), ModelFamily::OpenWeights);
        assert_eq!(ModelFamily::detect("qwen2.5-coder"), ModelFamily::OpenWeights);
        assert_eq!(ModelFamily::detect("something-else"), ModelFamily::Generic);
    }

    #[test]
    fn empty_is_zero_for_all_families() {
        for m in ["gpt-4o", "claude-3", "gemini-pro", "llama-3", "unknown"] {
            assert_eq!(TokenEstimator::new(m).estimate(""), 0, "{m}");
        }
    }

    #[test]
    fn heuristics_match_their_ratios() {
        let text = "abcdefg"; // 7 chars, 1 word
        assert_eq!(TokenEstimator::new("claude-3").estimate(text), 2);
        assert_eq!(TokenEstimator::new("gemini").estimate(text), 2);
        assert_eq!(TokenEstimator::new("mistral-large").estimate(text), 2);
        assert_eq!(TokenEstimator::new("unknown").estimate("a b c d e"), 5);
    }

    #[test]
    fn chunks_keep_leading_whitespace() {
        assert_eq!(chunks("  foo bar\nbaz "), vec!["  foo", " bar", "\nbaz", " "]);
        assert_eq!(chunks("x"), vec!["x"]);
    }

    #[test]
    fn bpe_is_monotone_under_append() {
        let est = TokenEstimator::new("gpt-4o");
        let a = "fn main() { println!(\"hello\"); }";
        let base = est.estimate(a);
        assert!(base > 0);
        for b in ["x", " ", "\n", "abc def", "😀"] {
            assert!(est.estimate(&format!("{a}{b}")) >= base, "{b:?}");
        }
    }

    #[test]
    fn long_runs_are_windowed() {
        let run = "x".repeat(70);
        let parts = chunks(&run);
        assert_eq!(parts.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![32, 32, 6]);

        let spaced = format!(" {}", "y".repeat(40));
        assert_eq!(chunks(&spaced)[0].len(), 32);
    }

    #[test]
    fn unbroken_json_is_not_one_token() {
        let est = TokenEstimator::new("gpt-4o");
        let body = "abcdefghij".repeat(10_000);
        let json = format!("{{\"k\":\"{body}\"}}");
        assert!(est.estimate(&json) >= json.len() / MAX_CHUNK_CHARS);
    }

    #[test]
    fn bpe_cache_is_consistent() {
        let est = TokenEstimator::new("gpt-4o");
        let text = "the same words the same words again";
        assert_eq!(est.estimate(text), est.estimate(text));
    }
}
