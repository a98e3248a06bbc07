//! Keyword-based document type detection.

use crate::models::DocumentType;

/// Minimum number of distinct keyword hits for a non-default type.
pub const MIN_KEYWORD_HITS: usize = 2;

const ACADEMIC_KEYWORDS: &[&str] = &[
    "abstract",
    "résumé",
    "introduction",
    "conclusion",
    "références",
    "bibliographie",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api",
    "fonction",
    "class",
    "def ",
    "import",
    "documentation",
    "manuel",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "article",
    "clause",
    "alinéa",
    "considérant",
    "attendu",
    "arrêté",
];

/// Classifies raw text into a [`DocumentType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeDetector;

impl TypeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the document type of `text`.
    ///
    /// Each keyword counts once no matter how often it occurs. A tie for the
    /// best score, or a best score under [`MIN_KEYWORD_HITS`], yields
    /// [`DocumentType::Default`].
    pub fn detect(&self, text: &str) -> DocumentType {
        let lowered = text.to_lowercase();

        let scores = [
            (DocumentType::Academic, hits(&lowered, ACADEMIC_KEYWORDS)),
            (DocumentType::Technical, hits(&lowered, TECHNICAL_KEYWORDS)),
            (DocumentType::Legal, hits(&lowered, LEGAL_KEYWORDS)),
        ];

        let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
        if best < MIN_KEYWORD_HITS {
            return DocumentType::Default;
        }

        let mut leaders = scores.iter().filter(|(_, score)| *score == best);
        match (leaders.next(), leaders.next()) {
            (Some((doc_type, _)), None) => *doc_type,
            _ => DocumentType::Default,
        }
    }
}

fn hits(lowered: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lowered.contains(*k)).count()
}
