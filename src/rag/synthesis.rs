//! Answer synthesis
//!
//! `Compact` packs retrieved passages into as few prompts as the model's
//! context window allows. With one batch a single call answers the query;
//! otherwise each further batch refines the previous answer. Only the last
//! call may stream. `Simple` makes one call with the context cut to fit.
//!
//! When nothing was retrieved the prompt says so and the model answers
//! without document context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::models::Generator;
use crate::rag::context::ContextBuilder;
use crate::rag::QueryResult;
use crate::store::ScoredChunk;

/// Tokens kept free for the answer, as a fraction of the window
const ANSWER_RESERVE_DIVISOR: usize = 4;

/// Smallest context budget handed to a batch, in tokens
const MIN_CONTEXT_BUDGET: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Pack context into as few calls as possible, refining across calls
    #[default]
    Compact,
    /// One call, context truncated to fit
    Simple,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Compact => f.write_str("compact"),
            ResponseMode::Simple => f.write_str("simple"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(ResponseMode::Compact),
            "simple" => Ok(ResponseMode::Simple),
            other => Err(RagError::ConfigError(format!(
                "unknown response mode '{}' (expected compact or simple)",
                other
            ))),
        }
    }
}

pub fn qa_prompt(query: &str, context: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {}\n\
         Answer: ",
        context, query
    )
}

pub fn refine_prompt(query: &str, existing_answer: &str, context: &str) -> String {
    format!(
        "The original query is as follows: {}\n\
         We have provided an existing answer: {}\n\
         We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
         ------------\n\
         {}\n\
         ------------\n\
         Given the new context, refine the original answer to better answer the query. \
         If the context isn't useful, return the original answer.\n\
         Refined Answer: ",
        query, existing_answer, context
    )
}

pub fn no_context_prompt(query: &str) -> String {
    format!(
        "No relevant context was found in the knowledge base for this query.\n\
         Say so briefly, then answer from general knowledge if you can, \
         making clear the answer does not come from the indexed documents.\n\
         Query: {}\n\
         Answer: ",
        query
    )
}

/// Turns retrieved chunks into an answer
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    context: ContextBuilder,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            context: ContextBuilder::new(),
        }
    }

    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Prompt tokens available before the answer reserve
    fn prompt_budget(&self) -> usize {
        let window = self.generator.context_window().max(1);
        window - window / ANSWER_RESERVE_DIVISOR
    }

    /// Context budget left once `template` (the prompt without context) is paid for
    fn context_budget(&self, template: &str) -> usize {
        let overhead = self.context.counter().upper_bound(template);
        self.prompt_budget()
            .saturating_sub(overhead)
            .max(MIN_CONTEXT_BUDGET)
    }

    /// Produce the answer for `query` from `chunks`
    pub async fn synthesize(
        &self,
        query: &str,
        chunks: &[ScoredChunk],
        mode: ResponseMode,
        streaming: bool,
    ) -> Result<QueryResult> {
        if chunks.is_empty() {
            debug!("No context retrieved");
            return self.finish(&no_context_prompt(query), streaming).await;
        }

        let mut passages = self.context.passages(chunks);

        let prompt = match mode {
            ResponseMode::Simple => {
                let budget = self.context_budget(&qa_prompt(query, ""));
                let context = self.context.truncate(&self.context.join(&passages), budget);
                qa_prompt(query, &context)
            }
            ResponseMode::Compact => {
                let budget = self.context_budget(&qa_prompt(query, ""));
                let first = self.context.take_batch(&mut passages, budget);
                let mut prompt = qa_prompt(query, &first);
                let mut calls = 1;

                while !passages.is_empty() {
                    let partial = self.generator.complete(&prompt).await?;
                    let budget = self.context_budget(&refine_prompt(query, &partial, ""));
                    let batch = self.context.take_batch(&mut passages, budget);
                    prompt = refine_prompt(query, &partial, &batch);
                    calls += 1;
                }

                debug!(calls, "Compact synthesis planned");
                prompt
            }
        };

        self.finish(&prompt, streaming).await
    }

    async fn finish(&self, prompt: &str, streaming: bool) -> Result<QueryResult> {
        if streaming && self.generator.supports_streaming() {
            Ok(QueryResult::Streaming(
                self.generator.complete_stream(prompt).await?,
            ))
        } else {
            Ok(QueryResult::Complete(self.generator.complete(prompt).await?))
        }
    }
}
