//! Text processing utilities used by the chunker.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Maximum number of keywords attached to a chunk.
pub const MAX_KEYWORDS: usize = 5;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid blank line pattern"));
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])\s*([A-Z])").expect("valid sentence pattern"));
static TRIPLE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid triple break pattern"));
static LEADING_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.!?;:,\s]+").expect("valid leading separator pattern"));

static STRUCTURE_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^\d+\.",   // 1. numbered items
        r"(?m)^[A-Z]\.", // A. section markers
        r"(?m)^-\s",     // - bullets
        r"(?m)^\*\s",    // * bullets
        r"(?m)^\w+:\s",  // Label: content
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid structure pattern"))
    .collect()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-zA-ZàâäéèêëïîôöùûüÿçÀÂÄÉÈÊËÏÎÔÖÙÛÜŸÇ]{3,}\b").expect("valid word pattern")
});

/// French and English stop words ignored during keyword extraction.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "à", "dans", "sur", "pour",
        "par", "avec", "sans", "sous", "que", "qui", "quoi", "dont", "où", "ce", "cette", "ces",
        "est", "sont", "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of",
        "with", "by", "is", "are",
    ]
    .into_iter()
    .collect()
});

/// Normalize raw text before splitting.
///
/// Whitespace runs collapse to a single space, and a line break is inserted
/// between sentence punctuation and a following capital letter so sentences
/// start on their own line.
pub fn preprocess(text: &str) -> String {
    let text = WHITESPACE_RUN.replace_all(text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = SENTENCE_BREAK.replace_all(&text, "${1}\n${2}");
    text.trim().to_string()
}

/// Clean a chunk after splitting.
pub fn clean_chunk(chunk: &str) -> String {
    let chunk = chunk.trim();
    let chunk = TRIPLE_BREAK.replace_all(chunk, "\n\n");
    LEADING_SEPARATOR.replace(&chunk, "").into_owned()
}

/// Whether any line of the chunk starts with a structural marker
/// (numbering, section letter, bullet or `Label:`).
pub fn has_structure_markers(chunk: &str) -> bool {
    STRUCTURE_MARKERS.iter().any(|re| re.is_match(chunk))
}

/// Extract up to [`MAX_KEYWORDS`] keywords ranked by frequency.
///
/// Ties keep the order in which words first appear.
pub fn extract_keywords(chunk: &str) -> Vec<String> {
    let lowered = chunk.to_lowercase();
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for word in WORD.find_iter(&lowered).map(|m| m.as_str()) {
        if STOP_WORDS.contains(word) {
            continue;
        }
        match index.get(word) {
            Some(&slot) => order[slot].1 += 1,
            None => {
                index.insert(word, order.len());
                order.push((word, 1));
            }
        }
    }

    // sort_by is stable: equal counts stay in first-seen order
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word.to_string())
        .collect()
}
