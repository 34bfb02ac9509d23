//! Qdrant-backed vector store
//!
//! Chunk text and metadata travel in the point payload; vectors are returned
//! with search hits so the re-ranking modes can compare candidates. The
//! collection is created with cosine distance on first connect. The
//! completion marker lives in the local store directory.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, vectors::VectorsOptions, CountPointsBuilder, CreateCollectionBuilder, Distance,
    PointStruct, ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

use crate::errors::{RagError, Result};
use crate::store::marker::CompletionMarker;
use crate::store::{ScoredChunk, StoredChunk, VectorStore};

const TEXT_KEY: &str = "text";
const DOCUMENT_KEY: &str = "document_id";
const SOURCE_KEY: &str = "source";
const INDEX_KEY: &str = "chunk_index";

/// Points per scroll page when listing sources
const SCROLL_PAGE: u32 = 256;

/// Qdrant collection handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    marker: CompletionMarker,
}

impl QdrantStore {
    /// Connect and make sure the collection exists
    pub async fn connect(
        url: &str,
        collection: &str,
        dimension: u64,
        marker_dir: &Path,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| unavailable(&format!("cannot create client for {}", url), e))?;

        let exists = client
            .collection_exists(collection)
            .await
            .map_err(|e| unavailable(&format!("cannot reach Qdrant at {}", url), e))?;

        if !exists {
            client
                .create_collection(
                    CreateCollectionBuilder::new(collection)
                        .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
                )
                .await
                .map_err(|e| {
                    unavailable(&format!("cannot create collection '{}'", collection), e)
                })?;
            info!(collection, dimension, "Created Qdrant collection");
        }

        Ok(Self {
            client,
            collection: collection.to_string(),
            marker: CompletionMarker::new(marker_dir, "qdrant", collection),
        })
    }
}

fn unavailable(context: &str, error: impl std::fmt::Display) -> RagError {
    RagError::StoreUnavailable(format!("{}: {}", context, error))
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| unavailable("count failed", e))?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn upsert(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks.into_iter().map(to_point).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| unavailable("upsert failed", e))?;

        Ok(())
    }

    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding.to_vec(), limit as u64)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| unavailable("search failed", e))?;

        Ok(response.result.into_iter().map(from_point).collect())
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        let mut sources = BTreeSet::new();
        let mut offset = None;

        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(id) = offset.take() {
                request = request.offset(id);
            }

            let response = self
                .client
                .scroll(request)
                .await
                .map_err(|e| unavailable("scroll failed", e))?;

            for point in response.result {
                if let Some(source) = point.payload.get(SOURCE_KEY).and_then(qdrant_value_to_string)
                {
                    sources.insert(source);
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(sources)
    }

    async fn is_complete(&self) -> Result<bool> {
        self.marker.is_set().await
    }

    async fn set_complete(&self, complete: bool) -> Result<()> {
        self.marker.set(complete).await
    }
}

fn to_point(chunk: StoredChunk) -> PointStruct {
    let mut payload: HashMap<String, QdrantValue> = chunk
        .metadata
        .into_iter()
        .map(|(k, v)| (k, json_to_qdrant_value(v)))
        .collect();
    payload.insert(TEXT_KEY.to_string(), QdrantValue::from(chunk.text));
    payload.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(chunk.document_id));
    payload.insert(SOURCE_KEY.to_string(), QdrantValue::from(chunk.source));
    payload.insert(
        INDEX_KEY.to_string(),
        QdrantValue::from(chunk.chunk_index as i64),
    );

    PointStruct::new(chunk.id, chunk.embedding, Payload::from(payload))
}

fn from_point(point: ScoredPoint) -> ScoredChunk {
    let id = point_id_to_string(&point.id);
    let embedding = match point.vectors.and_then(|v| v.vectors_options) {
        Some(VectorsOptions::Vector(vector)) => vector.data,
        _ => Vec::new(),
    };

    let mut text = String::new();
    let mut document_id = String::new();
    let mut source = String::new();
    let mut chunk_index = 0;
    let mut metadata = HashMap::new();

    for (key, value) in point.payload {
        match key.as_str() {
            TEXT_KEY => text = qdrant_value_to_string(&value).unwrap_or_default(),
            DOCUMENT_KEY => document_id = qdrant_value_to_string(&value).unwrap_or_default(),
            SOURCE_KEY => source = qdrant_value_to_string(&value).unwrap_or_default(),
            INDEX_KEY => {
                if let Some(Kind::IntegerValue(i)) = value.kind {
                    chunk_index = i.max(0) as usize;
                }
            }
            _ => {
                if let Some(json) = qdrant_to_json_value(&value) {
                    metadata.insert(key, json);
                }
            }
        }
    }

    ScoredChunk {
        score: point.score,
        chunk: StoredChunk {
            id,
            document_id,
            source,
            chunk_index,
            text,
            embedding,
            metadata,
        },
    }
}

fn json_to_qdrant_value(json: JsonValue) -> QdrantValue {
    match json {
        JsonValue::String(s) => QdrantValue::from(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                QdrantValue::from(i)
            } else {
                QdrantValue::from(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::Bool(b) => QdrantValue::from(b),
        other => QdrantValue::from(other.to_string()),
    }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        _ => None,
    }
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;

    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "unknown".to_string(),
    }
}
