//! Entity graph over stored chunks
//!
//! Entities are pulled from chunk text with surface heuristics (multi-word
//! Title Case phrases, capitalised words away from sentence starts, CamelCase
//! identifiers, acronyms). Entities that co-occur in a chunk are linked, with
//! the edge weight counting shared chunks. Communities come from weighted
//! label propagation and carry the mean embedding of their member chunks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::store::StoredChunk;

/// Entities mentioned fewer times across the corpus are dropped
pub const MIN_ENTITY_MENTIONS: usize = 2;

const MAX_PROPAGATION_ROUNDS: usize = 20;

/// Capitalised words that are never entities on their own
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "he", "her", "his",
    "i", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our",
    "she", "so", "that", "the", "their", "then", "there", "these", "they", "this", "those", "to",
    "was", "we", "were", "what", "when", "where", "which", "who", "why", "with", "you", "your",
];

/// A named entity and where it is mentioned
#[derive(Debug, Clone)]
pub struct Entity {
    /// Lowercased name
    pub name: String,
    pub mentions: usize,
    /// Ids of chunks mentioning the entity, sorted
    pub chunk_ids: Vec<String>,
}

/// Cluster of related entities
#[derive(Debug, Clone)]
pub struct Community {
    pub id: usize,
    /// Member entity names, most mentioned first
    pub entities: Vec<String>,
    /// Chunks mentioning any member, sorted
    pub chunk_ids: Vec<String>,
    /// Mean embedding of member chunks
    pub centroid: Vec<f32>,
}

impl Community {
    /// Short label from the leading entities
    pub fn title(&self) -> String {
        self.entities
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Entity co-occurrence graph with communities
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    chunks: Vec<StoredChunk>,
    chunk_positions: HashMap<String, usize>,
    entities: BTreeMap<String, Entity>,
    /// entity -> neighbour -> shared chunk count
    edges: HashMap<String, BTreeMap<String, usize>>,
    chunk_entities: HashMap<String, Vec<String>>,
    communities: Vec<Community>,
}

impl KnowledgeGraph {
    /// Build the graph from a snapshot of stored chunks
    pub fn build(chunks: Vec<StoredChunk>) -> Self {
        let mut candidates: BTreeMap<String, (usize, BTreeSet<String>)> = BTreeMap::new();
        let mut raw_chunk_entities: Vec<(String, Vec<String>)> = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let found = extract_entities(&chunk.text);
            for (name, count) in &found {
                let entry = candidates
                    .entry(name.clone())
                    .or_insert_with(|| (0, BTreeSet::new()));
                entry.0 += count;
                entry.1.insert(chunk.id.clone());
            }
            raw_chunk_entities.push((
                chunk.id.clone(),
                found.into_iter().map(|(name, _)| name).collect(),
            ));
        }

        let entities: BTreeMap<String, Entity> = candidates
            .into_iter()
            .filter(|(_, (mentions, _))| *mentions >= MIN_ENTITY_MENTIONS)
            .map(|(name, (mentions, ids))| {
                let entity = Entity {
                    name: name.clone(),
                    mentions,
                    chunk_ids: ids.into_iter().collect(),
                };
                (name, entity)
            })
            .collect();

        let mut chunk_entities: HashMap<String, Vec<String>> = HashMap::new();
        let mut edges: HashMap<String, BTreeMap<String, usize>> = HashMap::new();
        for (chunk_id, names) in raw_chunk_entities {
            let present: Vec<String> = names
                .into_iter()
                .filter(|n| entities.contains_key(n))
                .collect();

            for (i, a) in present.iter().enumerate() {
                for b in present.iter().skip(i + 1) {
                    *edges.entry(a.clone()).or_default().entry(b.clone()).or_insert(0) += 1;
                    *edges.entry(b.clone()).or_default().entry(a.clone()).or_insert(0) += 1;
                }
            }

            if !present.is_empty() {
                chunk_entities.insert(chunk_id, present);
            }
        }

        let chunk_positions = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut graph = Self {
            chunks,
            chunk_positions,
            entities,
            edges,
            chunk_entities,
            communities: Vec::new(),
        };
        graph.communities = graph.detect_communities();
        graph
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn chunks(&self) -> &[StoredChunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&StoredChunk> {
        self.chunk_positions.get(id).map(|&i| &self.chunks[i])
    }

    /// Entities mentioned by a chunk
    pub fn entities_of(&self, chunk_id: &str) -> &[String] {
        self.chunk_entities
            .get(chunk_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Linked entities with their shared-chunk weight
    pub fn neighbors(&self, entity: &str) -> Vec<(&str, usize)> {
        self.edges
            .get(entity)
            .map(|m| m.iter().map(|(n, w)| (n.as_str(), *w)).collect())
            .unwrap_or_default()
    }

    /// Weighted label propagation, visiting entities in name order
    fn detect_communities(&self) -> Vec<Community> {
        let names: Vec<&String> = self.entities.keys().collect();
        let index: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut labels: Vec<usize> = (0..names.len()).collect();

        for _ in 0..MAX_PROPAGATION_ROUNDS {
            let mut changed = false;
            for (i, name) in names.iter().enumerate() {
                let Some(neighbours) = self.edges.get(name.as_str()) else {
                    continue;
                };

                let mut tally: BTreeMap<usize, usize> = BTreeMap::new();
                for (neighbour, weight) in neighbours {
                    if let Some(&j) = index.get(neighbour.as_str()) {
                        *tally.entry(labels[j]).or_insert(0) += weight;
                    }
                }

                // Highest weight, smallest label on ties
                let best = tally
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(label, _)| *label);

                if let Some(best) = best {
                    if best != labels[i] {
                        labels[i] = best;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut groups: BTreeMap<usize, Vec<&String>> = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            groups.entry(labels[i]).or_default().push(*name);
        }

        groups
            .into_values()
            .enumerate()
            .map(|(id, members)| self.community_from(id, members))
            .collect()
    }

    fn community_from(&self, id: usize, members: Vec<&String>) -> Community {
        let mut entities: Vec<&Entity> = members
            .iter()
            .filter_map(|n| self.entities.get(n.as_str()))
            .collect();
        entities.sort_by(|a, b| b.mentions.cmp(&a.mentions).then(a.name.cmp(&b.name)));

        let chunk_ids: BTreeSet<String> = entities
            .iter()
            .flat_map(|e| e.chunk_ids.iter().cloned())
            .collect();

        let embeddings: Vec<&[f32]> = chunk_ids
            .iter()
            .filter_map(|id| self.chunk(id))
            .map(|c| c.embedding.as_slice())
            .collect();

        Community {
            id,
            entities: entities.iter().map(|e| e.name.clone()).collect(),
            chunk_ids: chunk_ids.into_iter().collect(),
            centroid: mean_vector(&embeddings),
        }
    }
}

/// Component-wise mean; empty when the inputs disagree on length
fn mean_vector(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return Vec::new();
    }

    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    sum
}

/// Entity names in `text` with their occurrence counts
pub fn extract_entities(text: &str) -> Vec<(String, usize)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut add = |name: String| {
        if name.chars().count() < 2 || name.chars().all(|c| c.is_ascii_digit()) {
            return;
        }
        let entry = counts.entry(name.clone()).or_insert(0);
        if *entry == 0 {
            order.push(name);
        }
        *entry += 1;
    };

    let mut sentence_start = true;
    let mut i = 0;
    while i < words.len() {
        let word = clean(words[i]);

        if is_camel_case(word) {
            add(word.to_lowercase());
        } else if is_acronym(word) {
            add(word.to_lowercase());
        } else if starts_upper(word) {
            let mut j = i + 1;
            while j < words.len() && starts_upper(clean(words[j])) && !ends_sentence(words[j - 1])
            {
                j += 1;
            }

            let phrase: Vec<&str> = words[i..j].iter().map(|w| clean(w)).collect();
            let leading = phrase
                .iter()
                .take_while(|w| STOPWORDS.contains(&w.to_lowercase().as_str()))
                .count();
            let kept = &phrase[leading..];
            let at_start = sentence_start && leading == 0;
            match kept.len() {
                0 => {}
                1 if at_start => {}
                _ => add(kept.join(" ").to_lowercase()),
            }

            sentence_start = ends_sentence(words[j - 1]);
            i = j;
            continue;
        }

        sentence_start = ends_sentence(words[i]);
        i += 1;
    }

    order
        .into_iter()
        .map(|name| {
            let count = counts.get(&name).copied().unwrap_or(1);
            (name, count)
        })
        .collect()
}

fn clean(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(|c: char| c == '"' || c == '\'' || c == ')');
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
}

fn is_acronym(word: &str) -> bool {
    let len = word.chars().count();
    (2..=5).contains(&len) && word.chars().all(|c| c.is_ascii_uppercase())
}

fn is_camel_case(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    chars.len() >= 3
        && chars[0].is_alphabetic()
        && chars.iter().all(|c| c.is_alphanumeric() || *c == '_')
        && chars.iter().any(|c| c.is_lowercase())
        && chars[1..].iter().any(|c| c.is_uppercase())
}

/// Distinct entity names in `text`
pub fn entity_names(text: &str) -> HashSet<String> {
    extract_entities(text).into_iter().map(|(n, _)| n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            source: "doc.txt".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_extracts_phrases_and_proper_nouns() {
        let names = entity_names("The ghost visited Ebenezer Scrooge at night. Then Marley left.");
        assert!(names.contains("ebenezer scrooge"));
        assert!(!names.contains("the"));
        // Sentence-initial single words are ignored
        assert!(!names.contains("then"));
    }

    #[test]
    fn test_extracts_acronyms_and_camel_case() {
        let names = entity_names("we call the HTTP API from the QueryEngine type");
        assert!(names.contains("http"));
        assert!(names.contains("api"));
        assert!(names.contains("queryengine"));
    }

    #[test]
    fn test_counts_repeated_mentions() {
        let found = extract_entities("we met Alice and later Alice again");
        assert_eq!(found, vec![("alice".to_string(), 2)]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = KnowledgeGraph::build(Vec::new());
        assert_eq!(graph.entity_count(), 0);
        assert!(graph.communities().is_empty());
    }

    #[test]
    fn test_disconnected_topics_form_separate_communities() {
        let chunks = vec![
            chunk("1", "we saw Alice with Bob at the market", vec![1.0, 0.0]),
            chunk("2", "later Alice and Bob went home", vec![0.9, 0.1]),
            chunk("3", "the Rust compiler uses LLVM for codegen", vec![0.0, 1.0]),
            chunk("4", "building Rust code invokes LLVM passes", vec![0.1, 0.9]),
        ];
        let graph = KnowledgeGraph::build(chunks);

        assert_eq!(graph.entity_count(), 4);
        assert_eq!(graph.communities().len(), 2);

        let people = graph
            .communities()
            .iter()
            .find(|c| c.entities.contains(&"alice".to_string()))
            .unwrap();
        assert!(people.entities.contains(&"bob".to_string()));
        assert_eq!(people.chunk_ids, vec!["1".to_string(), "2".to_string()]);
        assert!((people.centroid[0] - 0.95).abs() < 1e-6);

        assert_eq!(graph.neighbors("alice"), vec![("bob", 2)]);
        assert_eq!(graph.entities_of("3"), &["rust".to_string(), "llvm".to_string()]);
    }

    #[test]
    fn test_single_mentions_are_filtered() {
        let graph = KnowledgeGraph::build(vec![chunk("1", "only Zed once here", vec![1.0])]);
        assert_eq!(graph.entity_count(), 0);
        assert!(graph.entities_of("1").is_empty());
    }
}
