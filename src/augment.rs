//! Chunk augmentation agents.
//!
//! After splitting, chunk text can optionally be enriched through the
//! completion capability to make each chunk self-contained for retrieval.
//! Four strategies:
//!
//! - `none`      — chunks pass through untouched
//! - `summary`   — one document-level summary is generated and appended to
//!   every chunk
//! - `iterative` — each chunk is rewritten with a running digest of the
//!   document so far, so later chunks keep earlier context
//! - `combined`  — summary step followed by the iterative step
//!
//! Augmentation is best-effort: a failed completion leaves the affected
//! chunk's text in place. Chunk count and order never change.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AugmentStrategy;
use crate::error::ProcessError;
use crate::traits::CompletionService;

const DOC_SUMMARY_SYSTEM: &str = "Summarize the document in at most five sentences. \
    Keep the names, terms, and numbers a reader needs to place an excerpt in context. \
    Return only the summary.";

const ITERATIVE_SYSTEM: &str = "You rewrite document excerpts so they stand alone, \
    using the provided digest of the document so far to resolve references. \
    Preserve every fact, name, and number. Return only the rewritten text.";

const DIGEST_SYSTEM: &str = "Summarize the following text in at most five sentences, \
    keeping the names and terms needed to understand what comes after it.";

/// Rewrites an ordered list of chunk texts, given the full document text
/// for context. Output has the same length and order as the input.
#[async_trait]
pub trait Augmenter: Send + Sync {
    async fn augment(&self, chunks: Vec<String>, full_text: &str) -> Vec<String>;
}

/// `none`: identity.
pub struct NullAugmenter;

#[async_trait]
impl Augmenter for NullAugmenter {
    async fn augment(&self, chunks: Vec<String>, _full_text: &str) -> Vec<String> {
        chunks
    }
}

/// `summary`: one document-level summary appended to every chunk. When the
/// summary call fails, chunks pass through untouched.
pub struct SummaryAugmenter {
    completion: Arc<dyn CompletionService>,
}

#[async_trait]
impl Augmenter for SummaryAugmenter {
    async fn augment(&self, chunks: Vec<String>, full_text: &str) -> Vec<String> {
        let summary = self
            .completion
            .complete(DOC_SUMMARY_SYSTEM, full_text)
            .await
            .ok()
            .filter(|s| !s.trim().is_empty());

        match summary {
            Some(summary) => chunks
                .into_iter()
                .map(|c| format!("{}\n\n{}", c, summary))
                .collect(),
            None => chunks,
        }
    }
}

/// `iterative`: rewrite each chunk with a running digest of what preceded
/// it. The digest is extended from the original text after every chunk, so
/// one failed rewrite does not poison the rest of the document.
pub struct IterativeAugmenter {
    completion: Arc<dyn CompletionService>,
}

impl IterativeAugmenter {
    async fn rewrite(&self, digest: &str, chunk: &str) -> Option<String> {
        let user = if digest.is_empty() {
            chunk.to_string()
        } else {
            format!(
                "Document so far:\n{}\n\nExcerpt to rewrite:\n{}",
                digest, chunk
            )
        };
        self.completion
            .complete(ITERATIVE_SYSTEM, &user)
            .await
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    async fn extend_digest(&self, digest: &str, chunk: &str) -> String {
        let user = format!("{}\n{}", digest, chunk);
        self.completion
            .complete(DIGEST_SYSTEM, &user)
            .await
            .unwrap_or_else(|_| digest.to_string())
    }
}

#[async_trait]
impl Augmenter for IterativeAugmenter {
    async fn augment(&self, chunks: Vec<String>, _full_text: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(chunks.len());
        let mut digest = String::new();
        for chunk in chunks {
            out.push(
                self.rewrite(&digest, &chunk)
                    .await
                    .unwrap_or_else(|| chunk.clone()),
            );
            digest = self.extend_digest(&digest, &chunk).await;
        }
        out
    }
}

/// `combined`: summary pass, then the iterative pass over its output.
pub struct CombinedAugmenter {
    summary: SummaryAugmenter,
    iterative: IterativeAugmenter,
}

#[async_trait]
impl Augmenter for CombinedAugmenter {
    async fn augment(&self, chunks: Vec<String>, full_text: &str) -> Vec<String> {
        let with_summary = self.summary.augment(chunks, full_text).await;
        self.iterative.augment(with_summary, full_text).await
    }
}

/// Build the augmenter selected by configuration. Strategies other than
/// `none` need the completion capability.
pub fn create_augmenter(
    strategy: AugmentStrategy,
    completion: Option<Arc<dyn CompletionService>>,
) -> Result<Box<dyn Augmenter>, ProcessError> {
    if strategy == AugmentStrategy::None {
        return Ok(Box::new(NullAugmenter));
    }
    let completion = completion.ok_or_else(|| {
        ProcessError::InvalidConfig(format!(
            "augmentation strategy {:?} requires services.completion",
            strategy
        ))
    })?;
    Ok(match strategy {
        AugmentStrategy::None => unreachable!(),
        AugmentStrategy::Summary => Box::new(SummaryAugmenter { completion }),
        AugmentStrategy::Iterative => Box::new(IterativeAugmenter { completion }),
        AugmentStrategy::Combined => Box::new(CombinedAugmenter {
            summary: SummaryAugmenter {
                completion: completion.clone(),
            },
            iterative: IterativeAugmenter { completion },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedCompletion {
        /// Error on calls whose 0-based index is in this list.
        fail_on: Vec<usize>,
        calls: Mutex<usize>,
    }

    impl ScriptedCompletion {
        fn new(fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                fail_on,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(&self, system: &str, _user: &str) -> anyhow::Result<String> {
            let mut calls = self.calls.lock().unwrap();
            let n = *calls;
            *calls += 1;
            if self.fail_on.contains(&n) {
                anyhow::bail!("completion unavailable");
            }
            if system == DOC_SUMMARY_SYSTEM {
                Ok("the document summary".to_string())
            } else {
                Ok(format!("rewritten #{}", n))
            }
        }
    }

    fn chunks() -> Vec<String> {
        vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]
    }

    #[tokio::test]
    async fn null_augmenter_is_identity() {
        let out = NullAugmenter.augment(chunks(), "alpha beta gamma").await;
        assert_eq!(out, chunks());
    }

    #[tokio::test]
    async fn summary_appends_one_document_summary_to_every_chunk() {
        let augmenter = SummaryAugmenter {
            completion: ScriptedCompletion::new(vec![]),
        };
        let out = augmenter.augment(chunks(), "alpha beta gamma").await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "alpha\n\nthe document summary");
        assert_eq!(out[2], "gamma\n\nthe document summary");
    }

    #[tokio::test]
    async fn failed_summary_keeps_chunks_untouched() {
        let augmenter = SummaryAugmenter {
            completion: ScriptedCompletion::new(vec![0]),
        };
        let out = augmenter.augment(chunks(), "alpha beta gamma").await;
        assert_eq!(out, chunks());
    }

    #[tokio::test]
    async fn iterative_preserves_count_and_order_under_failures() {
        // Calls alternate rewrite/digest; chunk 0's rewrite fails.
        let augmenter = IterativeAugmenter {
            completion: ScriptedCompletion::new(vec![0]),
        };
        let out = augmenter.augment(chunks(), "alpha beta gamma").await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "alpha");
        assert!(out[1].starts_with("rewritten"));
    }

    #[tokio::test]
    async fn non_null_strategy_without_completion_is_invalid() {
        let result = create_augmenter(AugmentStrategy::Summary, None);
        assert!(matches!(result, Err(ProcessError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn null_strategy_needs_no_completion() {
        let augmenter = create_augmenter(AugmentStrategy::None, None).unwrap();
        assert_eq!(augmenter.augment(chunks(), "").await, chunks());
    }
}
