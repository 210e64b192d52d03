//! Keyword generation for chunk records.
//!
//! Asks the completion capability for a JSON array of four to six
//! retrieval keywords per chunk. Keyword generation never fails a file:
//! any error, unparseable response, wrong keyword count, or overlong
//! keyword yields an empty list.

use std::sync::Arc;

use crate::traits::CompletionService;

const KEYWORD_SYSTEM: &str = "Extract between four and six search keywords from the text. \
    Respond with only a JSON array of strings, nothing else.";

const MIN_KEYWORDS: usize = 4;
const MAX_KEYWORDS: usize = 6;
const MAX_KEYWORD_CHARS: usize = 40;

pub struct KeywordGenerator {
    completion: Arc<dyn CompletionService>,
}

impl KeywordGenerator {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    pub async fn keywords(&self, text: &str) -> Vec<String> {
        let response = match self.completion.complete(KEYWORD_SYSTEM, text).await {
            Ok(response) => response,
            Err(_) => return Vec::new(),
        };
        parse_keywords(&response)
    }
}

/// Parse the model response, tolerating code fences around the array.
///
/// Responses with fewer than four or more than six keywords, or any
/// keyword over forty characters, are discarded wholesale.
fn parse_keywords(response: &str) -> Vec<String> {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: Vec<String> = match serde_json::from_str(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => return Vec::new(),
    };

    let keywords: Vec<String> = parsed
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    let count_ok = (MIN_KEYWORDS..=MAX_KEYWORDS).contains(&keywords.len());
    let lengths_ok = keywords.iter().all(|k| k.chars().count() <= MAX_KEYWORD_CHARS);
    if !count_ok || !lengths_ok {
        return Vec::new();
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedCompletion(anyhow::Result<&'static str>);

    #[async_trait]
    impl CompletionService for CannedCompletion {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.to_string()),
                Err(_) => anyhow::bail!("completion unavailable"),
            }
        }
    }

    async fn run(result: anyhow::Result<&'static str>) -> Vec<String> {
        KeywordGenerator::new(Arc::new(CannedCompletion(result)))
            .keywords("some chunk text")
            .await
    }

    #[tokio::test]
    async fn parses_json_array() {
        let kw = run(Ok(r#"["rust", "etl", "chunking", "index"]"#)).await;
        assert_eq!(kw, vec!["rust", "etl", "chunking", "index"]);
    }

    #[tokio::test]
    async fn tolerates_code_fences() {
        let kw = run(Ok("```json\n[\"alpha\", \"beta\", \"gamma\", \"delta\"]\n```")).await;
        assert_eq!(kw.len(), 4);
    }

    #[tokio::test]
    async fn too_many_keywords_are_rejected() {
        let kw = run(Ok(r#"["a","b","c","d","e","f","g","h"]"#)).await;
        assert!(kw.is_empty());
    }

    #[tokio::test]
    async fn too_few_keywords_are_rejected() {
        let kw = run(Ok(r#"["alpha", "beta"]"#)).await;
        assert!(kw.is_empty());
    }

    #[test]
    fn overlong_keyword_rejects_the_whole_set() {
        let long = "x".repeat(80);
        let response = format!(r#"["one", "two", "three", "{long}"]"#);
        assert!(parse_keywords(&response).is_empty());
    }

    #[test]
    fn forty_char_keyword_is_accepted() {
        let edge = "y".repeat(40);
        let response = format!(r#"["one", "two", "three", "{edge}"]"#);
        assert_eq!(parse_keywords(&response).len(), 4);
    }

    #[tokio::test]
    async fn service_error_yields_empty_list() {
        assert!(run(Err(anyhow::anyhow!("down"))).await.is_empty());
    }

    #[tokio::test]
    async fn garbage_response_yields_empty_list() {
        assert!(run(Ok("keywords: rust, etl")).await.is_empty());
    }
}
