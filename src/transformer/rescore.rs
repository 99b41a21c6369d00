// Remote-index rescore ranking backend

use crate::error::{Error, Result};
use crate::model::{RequestParameters, ResultSet};
use crate::transformer::{
    reorder_by_ranking, FailureMode, RankedItem, ResultTransformer, TransformerConfiguration,
    TransformerConfigurationFactory,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const TYPE_NAME: &str = "rescore_ranking";

fn default_title_field() -> String {
    "title".to_string()
}

fn default_body_field() -> String {
    "body".to_string()
}

fn default_doc_limit() -> usize {
    25
}

/// Settings of one rescore-ranking transformer inside a search
/// configuration: the rescore execution plan to call and the source
/// fields the backend scores against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescoreConfiguration {
    pub plan_id: String,
    pub endpoint: String,
    #[serde(default = "default_title_field")]
    pub title_field: String,
    #[serde(default = "default_body_field")]
    pub body_field: String,
    #[serde(default = "default_doc_limit")]
    pub doc_limit: usize,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl TransformerConfiguration for RescoreConfiguration {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct RescoreConfigurationFactory;

impl TransformerConfigurationFactory for RescoreConfigurationFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn parse(&self, body: &serde_json::Value) -> Result<Box<dyn TransformerConfiguration>> {
        let config: RescoreConfiguration = serde_json::from_value(body.clone())
            .map_err(|e| Error::Configuration(format!("{}: {}", TYPE_NAME, e)))?;
        if config.plan_id.is_empty() {
            return Err(Error::Configuration(format!(
                "{}: plan_id must not be empty",
                TYPE_NAME
            )));
        }
        if config.doc_limit == 0 {
            return Err(Error::Configuration(format!(
                "{}: doc_limit must be positive",
                TYPE_NAME
            )));
        }
        Ok(Box::new(config))
    }
}

/// One document sent to the rescore backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescoreDocument {
    pub id: String,
    pub title: String,
    pub body: String,
    pub original_score: f32,
}

/// Call contract against the rescore backend. The HTTP implementation is
/// `HttpRescoreClient`; tests substitute a mock.
#[async_trait::async_trait]
pub trait RescoreClient: Send + Sync {
    async fn rescore(
        &self,
        endpoint: &str,
        plan_id: &str,
        query: &str,
        documents: &[RescoreDocument],
    ) -> Result<Vec<RankedItem>>;
}

#[derive(Serialize)]
struct RescoreRequestBody<'a> {
    query: &'a str,
    documents: &'a [RescoreDocument],
}

#[derive(Deserialize)]
struct RescoreResponseBody {
    items: Vec<RankedItem>,
}

/// reqwest-backed rescore client. The request timeout is set on the
/// client so no call can outlive it; there are no retries.
pub struct HttpRescoreClient {
    http: reqwest::Client,
}

impl HttpRescoreClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl RescoreClient for HttpRescoreClient {
    async fn rescore(
        &self,
        endpoint: &str,
        plan_id: &str,
        query: &str,
        documents: &[RescoreDocument],
    ) -> Result<Vec<RankedItem>> {
        let url = format!(
            "{}/rescore-execution-plans/{}/rescore",
            endpoint.trim_end_matches('/'),
            plan_id
        );
        let body = RescoreRequestBody { query, documents };
        let response = self.http.post(&url).json(&body).send().await?;
        let response = response.error_for_status()?;
        let parsed: RescoreResponseBody = response.json().await?;
        Ok(parsed.items)
    }
}

/// Reorders results using a remote rescore execution plan.
pub struct RescoreRanker {
    client: Arc<dyn RescoreClient>,
}

impl RescoreRanker {
    pub fn new(client: Arc<dyn RescoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResultTransformer for RescoreRanker {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    async fn rerank(
        &self,
        config: &dyn TransformerConfiguration,
        results: ResultSet,
        params: &RequestParameters,
    ) -> Result<ResultSet> {
        let config = config
            .as_any()
            .downcast_ref::<RescoreConfiguration>()
            .ok_or_else(|| {
                Error::Configuration(format!("{}: mismatched configuration type", TYPE_NAME))
            })?;

        if results.is_empty() {
            return Ok(results);
        }
        let query = match params.query.as_deref() {
            Some(q) if !q.is_empty() => q,
            _ => {
                warn!(transformer = TYPE_NAME, "no query text; passing results through");
                return Ok(results);
            }
        };

        let documents: Vec<RescoreDocument> = results
            .iter()
            .take(config.doc_limit)
            .map(|doc| RescoreDocument {
                id: doc.id.clone(),
                title: doc.source_str(&config.title_field).unwrap_or("").to_string(),
                body: doc.source_str(&config.body_field).unwrap_or("").to_string(),
                original_score: doc.score,
            })
            .collect();

        let ranking = self
            .client
            .rescore(&config.endpoint, &config.plan_id, query, &documents)
            .await?;
        debug!(
            transformer = TYPE_NAME,
            plan_id = %config.plan_id,
            sent = documents.len(),
            ranked = ranking.len(),
            "rescore backend responded"
        );
        Ok(reorder_by_ranking(results, &ranking))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{result_ids, ScoredDocument};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockRescoreClient {
        ranking: Vec<RankedItem>,
        calls: AtomicUsize,
    }

    impl MockRescoreClient {
        fn new(ranking: Vec<RankedItem>) -> Self {
            Self {
                ranking,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl RescoreClient for MockRescoreClient {
        async fn rescore(
            &self,
            _endpoint: &str,
            _plan_id: &str,
            _query: &str,
            _documents: &[RescoreDocument],
        ) -> Result<Vec<RankedItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ranking.clone())
        }
    }

    fn config() -> RescoreConfiguration {
        RescoreConfiguration {
            plan_id: "plan-1".to_string(),
            endpoint: "http://rescore.local".to_string(),
            title_field: default_title_field(),
            body_field: default_body_field(),
            doc_limit: default_doc_limit(),
            failure_mode: FailureMode::BestEffort,
        }
    }

    fn hits(n: usize) -> ResultSet {
        (0..n)
            .map(|i| {
                let mut doc = ScoredDocument::new(format!("doc{}", i), (n - i) as f32);
                doc.source.insert("title".into(), json!(format!("Title {}", i)));
                doc.source.insert("body".into(), json!(format!("Body {}", i)));
                doc
            })
            .collect()
    }

    fn params() -> RequestParameters {
        RequestParameters {
            query: Some("rust".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rerank_applies_backend_order() {
        let client = Arc::new(MockRescoreClient::new(vec![
            RankedItem { id: "doc2".into(), score: 0.9 },
            RankedItem { id: "doc0".into(), score: 0.5 },
            RankedItem { id: "doc1".into(), score: 0.1 },
        ]));
        let ranker = RescoreRanker::new(client.clone());
        let out = ranker.rerank(&config(), hits(3), &params()).await.unwrap();
        assert_eq!(result_ids(&out), vec!["doc2", "doc0", "doc1"]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rerank_empty_skips_backend() {
        let client = Arc::new(MockRescoreClient::new(vec![]));
        let ranker = RescoreRanker::new(client.clone());
        let out = ranker.rerank(&config(), Vec::new(), &params()).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerank_without_query_passes_through() {
        let client = Arc::new(MockRescoreClient::new(vec![RankedItem {
            id: "doc0".into(),
            score: 1.0,
        }]));
        let ranker = RescoreRanker::new(client.clone());
        let input = hits(3);
        let expected = result_ids(&input)
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let out = ranker
            .rerank(&config(), input, &RequestParameters::default())
            .await
            .unwrap();
        assert_eq!(result_ids(&out), expected);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerank_length_and_id_set_unchanged() {
        let client = Arc::new(MockRescoreClient::new(vec![RankedItem {
            id: "doc5".into(),
            score: 2.0,
        }]));
        let ranker = RescoreRanker::new(client);
        let out = ranker.rerank(&config(), hits(10), &params()).await.unwrap();
        assert_eq!(out.len(), 10);
        let mut ids: Vec<_> = result_ids(&out);
        ids.sort();
        let mut expected: Vec<String> = (0..10).map(|i| format!("doc{}", i)).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_factory_parse_defaults() {
        let body = json!({"plan_id": "p", "endpoint": "http://x"});
        let parsed = RescoreConfigurationFactory.parse(&body).unwrap();
        let config = parsed
            .as_any()
            .downcast_ref::<RescoreConfiguration>()
            .unwrap();
        assert_eq!(config.title_field, "title");
        assert_eq!(config.body_field, "body");
        assert_eq!(config.doc_limit, 25);
        assert_eq!(config.failure_mode, FailureMode::BestEffort);
    }

    #[test]
    fn test_factory_rejects_empty_plan_id() {
        let body = json!({"plan_id": "", "endpoint": "http://x"});
        assert!(RescoreConfigurationFactory.parse(&body).is_err());
    }

    #[test]
    fn test_factory_rejects_missing_fields() {
        assert!(RescoreConfigurationFactory.parse(&json!({})).is_err());
    }
}
