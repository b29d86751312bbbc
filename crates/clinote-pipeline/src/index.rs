//! Search index boundary and an in-memory reference index.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use clinote_llm::cosine_similarity;
use clinote_types::Id;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index backend error: {0}")]
    Backend(String),
}

/// One searchable record for a processed note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// The extraction result this entry points at.
    pub id: Id,
    pub session_id: Id,
    pub text: String,
    /// Empty when no embedder is configured.
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub session_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Id,
    pub session_id: Id,
    pub score: f32,
    pub text: String,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, document: IndexDocument) -> Result<(), IndexError>;

    /// Ranked hits, best first.
    async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;
}

pub type SharedIndex = Arc<dyn SearchIndex>;

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Index
// ─────────────────────────────────────────────────────────────────────────────

/// Brute-force index: cosine similarity when both sides have vectors,
/// case-insensitive substring match otherwise.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<Id, IndexDocument>>,
    dimensions: Option<usize>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject embeddings that are not exactly `dimensions` long.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            dimensions: Some(dimensions),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn get(&self, id: Id) -> Option<IndexDocument> {
        self.documents.read().get(&id).cloned()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, document: IndexDocument) -> Result<(), IndexError> {
        if let Some(expected) = self.dimensions
            && !document.embedding.is_empty()
            && document.embedding.len() != expected
        {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: document.embedding.len(),
            });
        }
        self.documents.write().insert(document.id, document);
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        filter: Option<&SearchFilter>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let needle = query_text.trim().to_lowercase();
        let session = filter.and_then(|f| f.session_id);

        let mut hits: Vec<SearchHit> = self
            .documents
            .read()
            .values()
            .filter(|doc| session.is_none_or(|id| doc.session_id == id))
            .filter_map(|doc| {
                let score = if !query_vector.is_empty() && !doc.embedding.is_empty() {
                    cosine_similarity(query_vector, &doc.embedding)
                } else if !needle.is_empty() && doc.text.to_lowercase().contains(&needle) {
                    1.0
                } else {
                    return None;
                };
                Some(SearchHit {
                    id: doc.id,
                    session_id: doc.session_id,
                    score,
                    text: doc.text.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinote_types::new_id;
    use serde_json::json;

    fn doc(session_id: Id, text: &str, embedding: Vec<f32>) -> IndexDocument {
        IndexDocument {
            id: new_id(),
            session_id,
            text: text.to_string(),
            embedding,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_similarity() {
        let index = InMemorySearchIndex::with_dimensions(2);
        let session = new_id();
        index.upsert(doc(session, "close", vec![1.0, 0.0])).await.unwrap();
        index.upsert(doc(session, "far", vec![0.0, 1.0])).await.unwrap();

        let hits = index.search("", &[0.9, 0.1], None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "close");
    }

    #[tokio::test]
    async fn test_text_fallback_and_session_filter() {
        let index = InMemorySearchIndex::new();
        let a = new_id();
        let b = new_id();
        index.upsert(doc(a, "Client reports passive SI", vec![])).await.unwrap();
        index.upsert(doc(b, "Passive SI, safety plan reviewed", vec![])).await.unwrap();
        index.upsert(doc(b, "Work stress only", vec![])).await.unwrap();

        let hits = index.search("passive si", &[], None, 10).await.unwrap();
        assert_eq!(hits.len(), 2);

        let filter = SearchFilter { session_id: Some(b) };
        let hits = index.search("passive si", &[], Some(&filter), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, b);

        assert_eq!(index.search("passive", &[], None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = InMemorySearchIndex::with_dimensions(3);
        let err = index.upsert(doc(new_id(), "x", vec![1.0])).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(index.is_empty());
    }
}
