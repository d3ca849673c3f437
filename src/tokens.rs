//! Rough token accounting for rendered responses.
//!
//! The estimate is biased upward on purpose: `chars / 4` is a fair guess for
//! Latin prose, and the 1.3 margin covers CJK text, source code and URLs,
//! which tokenize much denser. Undershooting means an oversized response.

pub const CHARS_PER_TOKEN: f64 = 4.0;
pub const SAFETY_MARGIN: f64 = 1.3;

/// Default input price used for the informational cost figure (USD / 1M tokens).
pub const DEFAULT_PRICE_PER_MILLION: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenEstimate {
    pub character_count: usize,
    pub word_count: usize,
    pub estimated_tokens: usize,
}

pub fn estimate(text: &str) -> TokenEstimate {
    let character_count = text.chars().count();
    let word_count = text.split_whitespace().count();
    let estimated_tokens =
        (character_count as f64 / CHARS_PER_TOKEN * SAFETY_MARGIN).ceil() as usize;

    TokenEstimate {
        character_count,
        word_count,
        estimated_tokens,
    }
}

pub fn estimate_cost(tokens: usize, price_per_million: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * price_per_million
}

#[test]
fn test_estimate_empty() {
    let est = estimate("");
    assert_eq!(est, TokenEstimate::default());
}

#[test]
fn test_estimate_never_below_base_heuristic() {
    let samples = [
        "a",
        "hello world",
        "fn main() { println!(\"{}\", 42); }",
        "https://example.com/a/b/c?d=e&f=g",
        "東京は日本の首都です",
        &"lorem ipsum dolor sit amet ".repeat(200),
    ];
    for text in samples {
        let est = estimate(text);
        assert!(
            est.estimated_tokens as f64 >= est.character_count as f64 / CHARS_PER_TOKEN,
            "underestimated {text:?}"
        );
    }
}

#[test]
fn test_estimate_counts() {
    let est = estimate("one two  three\nfour");
    assert_eq!(est.character_count, 19);
    assert_eq!(est.word_count, 4);
    // 19 / 4 * 1.3 = 6.175
    assert_eq!(est.estimated_tokens, 7);
}

#[test]
fn test_estimate_counts_chars_not_bytes() {
    let est = estimate("日本語");
    assert_eq!(est.character_count, 3);
    assert_eq!(est.estimated_tokens, 1);
}

#[test]
fn test_estimate_cost_is_linear() {
    assert_eq!(estimate_cost(0, 3.0), 0.0);
    assert!((estimate_cost(1_000_000, 3.0) - 3.0).abs() < f64::EPSILON);
    assert!((estimate_cost(500_000, 2.0) - 1.0).abs() < f64::EPSILON);
}
