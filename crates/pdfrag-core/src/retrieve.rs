//! Filtered similarity retrieval.
//!
//! The retriever owns no state: it embeds the query with the same
//! [`Embedder`] used at ingestion, builds a conjunctive metadata
//! [`Filter`](crate::filter::Filter), and asks the [`VectorStore`] for the
//! `top_k` nearest records. Ranking and tie-breaking are the store's.

use crate::embedding::{embed_checked, Embedder};
use crate::error::{RagError, RagResult};
use crate::filter::build_filter;
use crate::models::RetrievedResult;
use crate::store::VectorStore;

pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, store: &'a dyn VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Return at most `top_k` results for `query_text`, best match first.
    ///
    /// - `project_id` restricts to records with exactly that project.
    /// - `tags` restricts to records sharing at least one tag (ContainsAny).
    /// - Both given → both must hold.
    ///
    /// `top_k == 0` returns an empty list without touching the embedder or
    /// the store. No matching records is an empty list, not an error. A
    /// filter the store cannot apply is a [`RagError::Query`].
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
        project_id: Option<&str>,
        tags: Option<&[String]>,
    ) -> RagResult<Vec<RetrievedResult>> {
        if query_text.trim().is_empty() {
            return Err(RagError::validation("question must not be empty"));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let filter = build_filter(project_id, tags);
        if let Some(f) = &filter {
            f.validate()?;
        }
        tracing::debug!(top_k, filter = ?filter, store = self.store.name(), "retrieving");

        let vector = embed_checked(self.embedder, query_text).await?;
        let mut matches = self.store.near_vector(&vector, top_k, filter.as_ref()).await?;
        matches.truncate(top_k);

        Ok(matches
            .into_iter()
            .enumerate()
            .map(|(rank, m)| RetrievedResult::from_match(rank, m))
            .collect())
    }
}
