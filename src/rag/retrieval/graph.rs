//! Graph-augmented retrieval
//!
//! `Global` answers from community summaries: communities are ranked by the
//! similarity of their centroid to the query and each contributes one
//! synthetic chunk naming its entities plus its best-matching passages.
//! `Local` seeds on the nearest chunks, walks one hop through the entity
//! graph and ranks the neighbourhood, crediting chunks that share entities
//! with the seeds.
//!
//! Backends without a graph fall back to plain similarity.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::errors::Result;
use crate::rag::retrieval::{Query, RetrievalStrategy};
use crate::store::{
    cosine_similarity, sort_by_score, Community, KnowledgeGraph, ScoredChunk, StoredChunk,
    VectorStore,
};

/// Passages quoted per community summary
const SUMMARY_PASSAGES: usize = 2;

/// Seeds taken for local expansion
const LOCAL_SEEDS: usize = 3;

/// Score credit per entity shared with a seed
const ENTITY_BONUS: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphTraversal {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphStrategy {
    traversal: GraphTraversal,
}

impl GraphStrategy {
    pub fn new(traversal: GraphTraversal) -> Self {
        Self { traversal }
    }
}

#[async_trait]
impl RetrievalStrategy for GraphStrategy {
    fn name(&self) -> &'static str {
        match self.traversal {
            GraphTraversal::Global => "graph-global",
            GraphTraversal::Local => "graph-local",
        }
    }

    async fn retrieve(
        &self,
        store: &dyn VectorStore,
        query: &Query,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let Some(graph) = store.graph().await? else {
            warn!(
                backend = store.backend(),
                mode = self.name(),
                "Store has no entity graph, using similarity search"
            );
            return store.search(&query.embedding, k).await;
        };

        let results = match self.traversal {
            GraphTraversal::Global => global_search(&graph, &query.embedding, k),
            GraphTraversal::Local => local_search(&graph, &query.embedding, k),
        };

        if results.is_empty() && !graph.chunks().is_empty() {
            // Corpus without recognisable entities
            return store.search(&query.embedding, k).await;
        }
        Ok(results)
    }
}

/// Community summaries ranked by centroid similarity
pub fn global_search(graph: &KnowledgeGraph, query: &[f32], k: usize) -> Vec<ScoredChunk> {
    let mut ranked: Vec<(&Community, f32)> = graph
        .communities()
        .iter()
        .filter(|c| !c.centroid.is_empty())
        .map(|c| (c, cosine_similarity(query, &c.centroid)))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .into_iter()
        .take(k)
        .map(|(community, score)| ScoredChunk {
            chunk: summarize(graph, community, query),
            score,
        })
        .collect()
}

fn summarize(graph: &KnowledgeGraph, community: &Community, query: &[f32]) -> StoredChunk {
    let mut members: Vec<(&StoredChunk, f32)> = community
        .chunk_ids
        .iter()
        .filter_map(|id| graph.chunk(id))
        .map(|c| (c, cosine_similarity(query, &c.embedding)))
        .collect();
    members.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut sources: Vec<&str> = Vec::new();
    let passages: Vec<&str> = members
        .iter()
        .take(SUMMARY_PASSAGES)
        .map(|(c, _)| {
            if !sources.contains(&c.source.as_str()) {
                sources.push(c.source.as_str());
            }
            c.text.as_str()
        })
        .collect();

    let text = format!(
        "Topic: {} ({} passages)\nEntities: {}\n\n{}",
        community.title(),
        community.chunk_ids.len(),
        community.entities.join(", "),
        passages.join("\n\n")
    );

    StoredChunk {
        id: format!("community-{}", community.id),
        document_id: String::new(),
        source: sources.join(", "),
        chunk_index: 0,
        text,
        embedding: community.centroid.clone(),
        metadata: HashMap::new(),
    }
}

/// Seed chunks expanded one hop through their entities
pub fn local_search(graph: &KnowledgeGraph, query: &[f32], k: usize) -> Vec<ScoredChunk> {
    let mut seeds: Vec<(&StoredChunk, f32)> = graph
        .chunks()
        .iter()
        .map(|c| (c, cosine_similarity(query, &c.embedding)))
        .collect();
    seeds.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    seeds.truncate(LOCAL_SEEDS.min(k).max(1));

    let seed_entities: HashSet<&str> = seeds
        .iter()
        .flat_map(|(c, _)| graph.entities_of(&c.id).iter().map(|e| e.as_str()))
        .collect();
    if seed_entities.is_empty() {
        return Vec::new();
    }

    let mut neighbourhood: HashSet<&str> = seed_entities.clone();
    for entity in &seed_entities {
        neighbourhood.extend(graph.neighbors(entity).into_iter().map(|(n, _)| n));
    }

    let mut candidate_ids: HashSet<&str> = seeds.iter().map(|(c, _)| c.id.as_str()).collect();
    for entity in &neighbourhood {
        if let Some(e) = graph.entity(entity) {
            candidate_ids.extend(e.chunk_ids.iter().map(|id| id.as_str()));
        }
    }

    let mut results: Vec<ScoredChunk> = candidate_ids
        .into_iter()
        .filter_map(|id| graph.chunk(id))
        .map(|chunk| {
            let shared = graph
                .entities_of(&chunk.id)
                .iter()
                .filter(|e| seed_entities.contains(e.as_str()))
                .count();
            ScoredChunk {
                score: cosine_similarity(query, &chunk.embedding) + ENTITY_BONUS * shared as f32,
                chunk: chunk.clone(),
            }
        })
        .collect();

    // HashSet order is arbitrary; break score ties by id
    results.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
    sort_by_score(&mut results);
    results.truncate(k);
    results
}
