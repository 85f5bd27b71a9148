//! TF-IDF batch vectorizer and cosine similarity.
//!
//! [`build_vectors`] turns an ordered batch of documents into weighted term
//! vectors over a single shared vocabulary. All vectors produced from one
//! batch have identical length and term ordering, the invariant
//! [`cosine_similarity`] depends on. Vocabulary and IDF are computed per
//! batch and never cached across requests, so the weights always reflect
//! the corpus snapshot the query is scored against.
//!
//! # Weighting
//!
//! ```text
//! tf(t, d)  = count(t in d) / len(d)        (0 for an empty document)
//! idf(t)    = ln(N / (df(t) + 1))
//! w(t, d)   = tf(t, d) × idf(t)
//! ```
//!
//! The smoothed IDF goes negative for terms present in nearly every
//! document. That is standard and intentional; it is not clamped.

use std::collections::HashMap;

use crate::tokenize::tokenize;

/// Vectors and vocabulary produced from one document batch.
///
/// Invariant: `vectors[i].len() == vocabulary.len()` for every `i`, and
/// component `j` of every vector refers to `vocabulary[j]`.
#[derive(Debug, Clone)]
pub struct TfidfBatch {
    /// Distinct terms across the batch, in first-occurrence order.
    pub vocabulary: Vec<String>,
    /// One weighted term vector per input document, in input order.
    pub vectors: Vec<Vec<f64>>,
}

/// Build TF-IDF vectors for an ordered batch of documents.
///
/// Deterministic: the same batch always yields bit-identical vectors.
/// An empty batch yields an empty vocabulary and no vectors.
pub fn build_vectors(documents: &[String]) -> TfidfBatch {
    let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

    // Vocabulary in first-occurrence order, shared by every vector.
    let mut vocabulary: Vec<String> = Vec::new();
    let mut term_index: HashMap<String, usize> = HashMap::new();
    for tokens in &tokenized {
        for t in tokens {
            if !term_index.contains_key(t) {
                term_index.insert(t.clone(), vocabulary.len());
                vocabulary.push(t.clone());
            }
        }
    }

    // Document frequency: number of documents containing each term.
    let mut df = vec![0usize; vocabulary.len()];
    for tokens in &tokenized {
        let mut seen: Vec<bool> = vec![false; vocabulary.len()];
        for t in tokens {
            let i = term_index[t.as_str()];
            if !seen[i] {
                seen[i] = true;
                df[i] += 1;
            }
        }
    }

    let n = documents.len() as f64;
    let idf: Vec<f64> = df.iter().map(|&d| (n / (d as f64 + 1.0)).ln()).collect();

    let vectors: Vec<Vec<f64>> = tokenized
        .iter()
        .map(|tokens| {
            let mut vector = vec![0.0; vocabulary.len()];
            if tokens.is_empty() {
                // tf is defined as 0 everywhere for an empty document.
                return vector;
            }
            let total = tokens.len() as f64;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for t in tokens {
                *counts.entry(t.as_str()).or_insert(0) += 1;
            }
            for (t, c) in counts {
                let i = term_index[t];
                vector[i] = (c as f64 / total) * idf[i];
            }
            vector
        })
        .collect();

    TfidfBatch { vocabulary, vectors }
}

/// Compute cosine similarity between two term vectors from the same batch.
///
/// Returns a value in `[-1.0, 1.0]`, clamped so floating-point
/// accumulation never pushes a perfect match past 1.0. Returns `0.0`
/// for empty vectors, mismatched lengths, or a zero-norm operand;
/// degenerate vectors score as "no similarity" rather than producing
/// NaN or a division fault.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    // Accumulation error can push the quotient a few ulps past 1.0.
    (dot / denom).clamp(-1.0, 1.0)
}
