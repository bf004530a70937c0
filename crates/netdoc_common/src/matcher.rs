//! Relevance Matcher
//!
//! Ranks catalog entries against a free-text query by cosine similarity of
//! embeddings. Without embeddings (no provider, indexing failed, query
//! embedding failed) it falls back to the first entries in registration
//! order. It never fails.

use crate::catalog::{Catalog, CatalogEntry};
use crate::llm::{EmbeddingProvider, LlmError};
use crate::retry::RetryPolicy;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Entries returned when the caller has no preference
pub const DEFAULT_TOP_N: usize = 3;

/// `dot(a, b) / (|a| * |b|)`. None for empty, zero-norm or length-mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let score = dot / denom;
    score.is_finite().then_some(score)
}

pub struct RelevanceMatcher {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    retry: RetryPolicy,
}

impl RelevanceMatcher {
    pub fn new(embedder: Option<Arc<dyn EmbeddingProvider>>, retry: RetryPolicy) -> Self {
        Self { embedder, retry }
    }

    /// Static ordering only
    pub fn degraded() -> Self {
        Self::new(None, RetryPolicy::none())
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Embed every entry in one batched call and attach the vectors.
    /// On failure nothing is attached. Returns the number of entries indexed.
    pub async fn index_catalog(&self, catalog: &mut Catalog) -> Result<usize, LlmError> {
        let Some(embedder) = &self.embedder else {
            return Ok(0);
        };

        let texts: Vec<String> = catalog.entries().iter().map(|e| e.embedding_text()).collect();
        let names: Vec<String> = catalog.entries().iter().map(|e| e.name().to_string()).collect();

        let vectors = match self.retry.run("embed_catalog", || embedder.embed(&texts)).await {
            Ok(v) if v.len() == texts.len() => v,
            Ok(v) => {
                let e = LlmError::CountMismatch {
                    expected: texts.len(),
                    got: v.len(),
                };
                warn!(error = %e, "Catalog indexing failed, using static ordering");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "Catalog indexing failed, using static ordering");
                return Err(e);
            }
        };

        let mut indexed = 0;
        for (name, vector) in names.iter().zip(vectors) {
            if catalog.attach_embedding(name, vector) {
                indexed += 1;
            }
        }
        info!(entries = indexed, "Catalog indexed");
        Ok(indexed)
    }

    /// Most relevant entries first, at most `top_n`
    pub async fn find_relevant<'c>(
        &self,
        catalog: &'c Catalog,
        query: &str,
        top_n: usize,
    ) -> Vec<&'c CatalogEntry> {
        let (Some(embedder), true) = (&self.embedder, catalog.has_embeddings()) else {
            return static_order(catalog, top_n);
        };

        let input = vec![query.to_string()];
        let query_vector = match self.retry.run("embed_query", || embedder.embed(&input)).await {
            Ok(mut v) if v.len() == 1 => v.remove(0),
            Ok(v) => {
                warn!(got = v.len(), "Query embedding returned wrong count, using static ordering");
                return static_order(catalog, top_n);
            }
            Err(e) => {
                warn!(error = %e, "Query embedding failed, using static ordering");
                return static_order(catalog, top_n);
            }
        };

        rank(catalog, &query_vector, top_n)
    }
}

/// First `min(top_n, len)` entries in registration order
fn static_order(catalog: &Catalog, top_n: usize) -> Vec<&CatalogEntry> {
    catalog.entries().iter().take(top_n).collect()
}

/// Stable descending sort by similarity; unscored entries rank last
fn rank<'c>(catalog: &'c Catalog, query: &[f32], top_n: usize) -> Vec<&'c CatalogEntry> {
    let mut scored: Vec<(Option<f32>, &CatalogEntry)> = catalog
        .entries()
        .iter()
        .map(|e| (e.embedding().and_then(|v| cosine_similarity(query, v)), e))
        .collect();

    scored.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    scored.into_iter().take(top_n).map(|(_, e)| e).collect()
}
