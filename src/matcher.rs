//! Best-match selection over a knowledge snapshot.
//!
//! The query and every corpus question are vectorized in a single batch so
//! they share one vocabulary and one IDF table; recomputing IDF per
//! comparison would score each pair against a different weighting and is
//! deliberately avoided. The knowledge snapshot is an explicit parameter:
//! the caller reads it fresh from the store once per request, and the
//! scoring here stays pure and independently testable.

use crate::models::{KnowledgeEntry, MatchResult};
use crate::tfidf::{build_vectors, cosine_similarity};

/// Default minimum cosine score for an entry to count as a candidate at
/// all. Coarser than the policy's accept floor: a weak-but-present match
/// is still returned so callers can inspect it.
pub const DEFAULT_CANDIDATE_FLOOR: f64 = 0.2;

/// Find the knowledge entry whose question best matches the query.
///
/// Returns `None` for an empty corpus or when no entry scores strictly
/// above `candidate_floor`. Ties keep the first corpus entry encountered
/// (strict greater-than scan in corpus order).
pub fn find_best_match(
    query: &str,
    knowledge: &[KnowledgeEntry],
    candidate_floor: f64,
) -> Option<MatchResult> {
    if knowledge.is_empty() {
        return None;
    }

    // One batch: corpus questions in order, query last.
    let mut documents: Vec<String> = knowledge.iter().map(|e| e.question.clone()).collect();
    documents.push(query.to_string());

    let batch = build_vectors(&documents);
    let query_vector = batch.vectors.last()?;

    let mut best_score = f64::MIN;
    let mut best_index: Option<usize> = None;

    for (i, vector) in batch.vectors[..knowledge.len()].iter().enumerate() {
        let score = cosine_similarity(query_vector, vector);
        if score > best_score {
            best_score = score;
            best_index = Some(i);
        }
    }

    let index = best_index?;
    if best_score > candidate_floor {
        let entry = &knowledge[index];
        Some(MatchResult {
            answer: entry.answer.clone(),
            question: entry.question.clone(),
            confidence: best_score,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, answer: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: format!("kb-{}", answer),
            question: question.to_string(),
            answer: answer.to_string(),
            category: "general".to_string(),
            confidence: 0.9,
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_empty_corpus_returns_none() {
        assert!(find_best_match("fever", &[], DEFAULT_CANDIDATE_FLOOR).is_none());
    }

    #[test]
    fn test_identical_question_scores_one_and_wins() {
        let corpus = vec![
            entry("How many hours of sleep do I need?", "sleep"),
            entry("I have a fever. What should I do?", "fever"),
            entry("What helps against a sore throat?", "throat"),
        ];
        let result =
            find_best_match("I have a fever. What should I do?", &corpus, DEFAULT_CANDIDATE_FLOOR)
                .unwrap();
        assert_eq!(result.answer, "fever");
        assert_eq!(result.question, "I have a fever. What should I do?");
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!(result.confidence <= 1.0);
    }

    #[test]
    fn test_punctuation_and_case_variants_still_match() {
        let corpus = vec![
            entry("I have a fever. What should I do?", "fever"),
            entry("How can I treat a cold at home?", "cold"),
            entry("Why does my stomach hurt after eating?", "stomach"),
        ];
        let result =
            find_best_match("i have a fever, what should i do", &corpus, DEFAULT_CANDIDATE_FLOOR)
                .unwrap();
        assert_eq!(result.answer, "fever");
        assert!(result.confidence > 0.4);
    }

    #[test]
    fn test_no_lexical_overlap_returns_none() {
        let corpus = vec![
            entry("I have a fever. What should I do?", "fever"),
            entry("How can I treat a cold at home?", "cold"),
        ];
        // Shares no token with any corpus question.
        let result = find_best_match(
            "quasar luminosity redshift",
            &corpus,
            DEFAULT_CANDIDATE_FLOOR,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_query_returns_none() {
        let corpus = vec![entry("I have a fever. What should I do?", "fever")];
        assert!(find_best_match("", &corpus, DEFAULT_CANDIDATE_FLOOR).is_none());
    }

    #[test]
    fn test_confidence_is_maximum_over_corpus() {
        let corpus = vec![
            entry("completely unrelated text about taxes", "taxes"),
            entry("fever and high temperature at night", "fever"),
            entry("sore throat and coughing", "throat"),
        ];
        let result = find_best_match(
            "fever high temperature",
            &corpus,
            DEFAULT_CANDIDATE_FLOOR,
        )
        .unwrap();
        assert_eq!(result.answer, "fever");
    }

    #[test]
    fn test_tie_break_keeps_first_corpus_entry() {
        // Two identical questions: strict greater-than keeps index 0.
        let corpus = vec![
            entry("what helps against fever", "first"),
            entry("what helps against fever", "second"),
        ];
        let result =
            find_best_match("what helps against fever", &corpus, DEFAULT_CANDIDATE_FLOOR).unwrap();
        assert_eq!(result.answer, "first");
    }

    #[test]
    fn test_candidate_floor_is_exclusive() {
        let corpus = vec![entry("a b c d e", "x")];
        // A perfect match passes any floor below 1.0 but not one at 1.0.
        let q = "a b c d e";
        assert!(find_best_match(q, &corpus, 0.999).is_some());
        assert!(find_best_match(q, &corpus, 1.0).is_none());
    }
}
