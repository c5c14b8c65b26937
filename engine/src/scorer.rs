//! Cosine similarity between a query text and every indexed document.
//!
//! For each document the comparison runs over the union of query and
//! document terms. Terms that appear on only one side contribute to that
//! side's norm and nothing to the dot product, so the sums below are taken
//! sparsely instead of materialising the union vectors.

use crate::index::{DocId, DocRef, TermId, TermIndex, TermProfile};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub doc: DocId,
    pub score: f32,
}

/// Score `query` against every document in `index`.
///
/// Sorted by descending score; equal scores keep index (insertion) order.
pub fn rank(index: &TermIndex, query: &str) -> Vec<Ranked> {
    let profile = TermProfile::from_text(query);
    rank_profile(index, &profile)
}

pub fn rank_profile(index: &TermIndex, query: &TermProfile) -> Vec<Ranked> {
    // Query side: weights of terms the corpus knows, plus the norm over all
    // query terms (unknown terms still have a query-side weight).
    // Sums run in f64 so an identical text lands on exactly 1.0 after the
    // final cast, whatever order the terms were visited in.
    let mut q_known: HashMap<TermId, f64> = HashMap::with_capacity(query.counts.len());
    let mut q_norm_sq = 0.0f64;
    for term in query.counts.keys() {
        let w = f64::from(index.weight(term, DocRef::Query(query)));
        q_norm_sq += w * w;
        if let Some(tid) = index.term_id(term) {
            q_known.insert(tid, w);
        }
    }
    let q_norm = q_norm_sq.sqrt();

    let mut scored: Vec<Ranked> = (0..index.len() as DocId)
        .map(|doc| {
            let mut dot = 0.0f64;
            let mut d_norm_sq = 0.0f64;
            for (tid, tf) in index.doc_terms(doc) {
                let w = f64::from(tf as f32 * index.idf_by_id(tid));
                d_norm_sq += w * w;
                if let Some(qw) = q_known.get(&tid) {
                    dot += qw * w;
                }
            }
            Ranked { doc, score: cosine(dot, q_norm, d_norm_sq.sqrt()) }
        })
        .collect();

    // stable sort keeps insertion order for ties
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Cosine from a precomputed dot product and norms, clamped to `[0, 1]`.
/// A zero vector on either side scores 0 rather than NaN.
pub fn cosine(dot: f64, norm_a: f64, norm_b: f64) -> f32 {
    let denom = norm_a * norm_b;
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let score = dot / denom;
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(docs: &[(&str, &str)]) -> TermIndex {
        TermIndex::rebuild(docs.iter().map(|(i, t)| (*i, *t))).unwrap()
    }

    /// Straight union-vector cosine, used to check the sparse version.
    fn union_cosine(index: &TermIndex, query: &str, doc: DocId) -> f32 {
        let q = TermProfile::from_text(query);
        let d = index.profile(doc).unwrap();
        let mut terms: Vec<&String> = q.counts.keys().chain(d.counts.keys()).collect();
        terms.sort();
        terms.dedup();
        let qv: Vec<f64> = terms.iter().map(|t| f64::from(index.weight(t, DocRef::Query(&q)))).collect();
        let dv: Vec<f64> = terms.iter().map(|t| f64::from(index.weight(t, DocRef::Indexed(doc)))).collect();
        let dot: f64 = qv.iter().zip(&dv).map(|(a, b)| a * b).sum();
        let na = qv.iter().map(|a| a * a).sum::<f64>().sqrt();
        let nb = dv.iter().map(|b| b * b).sum::<f64>().sqrt();
        cosine(dot, na, nb)
    }

    #[test]
    fn sparse_matches_union_vectors() {
        let index = index_of(&[
            ("1", "install the plugin from settings"),
            ("2", "the plugin crashes on startup"),
            ("3", "reset my password please"),
        ]);
        let query = "how to install the plugin plugin";
        for r in rank(&index, query) {
            assert!((r.score - union_cosine(&index, query, r.doc)).abs() < 1e-5);
        }
    }

    #[test]
    fn identical_text_scores_exactly_one() {
        let texts = [
            "how do I reset my password",
            "install the plugin from settings",
            "the plugin fails to load after update",
            "my theme breaks the mobile layout on small screens",
            "error error error code 500 when saving",
        ];
        for text in texts {
            let index = index_of(&[("a", "unrelated filler words"), ("id1", text), ("b", "the settings page")]);
            let ranked = rank(&index, text);
            assert_eq!(ranked[0].doc, 1);
            assert_eq!(ranked[0].score, 1.0, "{text}");
        }
    }

    #[test]
    fn disjoint_vocabulary_scores_zero() {
        let index = index_of(&[("id1", "banana apple")]);
        assert_eq!(rank(&index, "car truck")[0].score, 0.0);
    }

    #[test]
    fn empty_query_scores_zero_everywhere() {
        let index = index_of(&[("1", "one"), ("2", "two words"), ("3", "")]);
        let ranked = rank(&index, "");
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|r| r.score == 0.0 && !r.score.is_nan()));
        // all tied, so insertion order
        assert_eq!(ranked.iter().map(|r| r.doc).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = index_of(&[("1", "alpha beta"), ("2", "gamma"), ("3", "alpha beta")]);
        let ranked = rank(&index, "alpha beta");
        assert_eq!(ranked[0].doc, 0);
        assert_eq!(ranked[1].doc, 2);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[2].doc, 1);
    }

    #[test]
    fn partial_overlap_scores_between_zero_and_one() {
        let index = index_of(&[("id1", "install the plugin from settings")]);
        let score = rank(&index, "how to install the plugin")[0].score;
        assert!(score > 0.3 && score < 0.8, "score was {score}");
    }

    #[test]
    fn empty_index_ranks_nothing() {
        assert!(rank(&TermIndex::new(), "anything").is_empty());
    }
}
