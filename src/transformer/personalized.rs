// Personalization ranking backend keyed by a recommendation campaign

use crate::error::{Error, Result};
use crate::model::{RequestParameters, ResultSet};
use crate::transformer::{
    FailureMode, RankedItem, ResultTransformer, TransformerConfiguration,
    TransformerConfigurationFactory,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const TYPE_NAME: &str = "personalized_ranking";

fn default_weight() -> f32 {
    0.25
}

/// Settings of one personalized-ranking transformer: the recommendation
/// campaign to call, which source field carries the campaign's item id
/// (empty means the document id itself), and how strongly the campaign's
/// ranking outweighs the retrieval score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedConfiguration {
    pub campaign: String,
    pub endpoint: String,
    #[serde(default)]
    pub item_id_field: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl TransformerConfiguration for PersonalizedConfiguration {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct PersonalizedConfigurationFactory;

impl TransformerConfigurationFactory for PersonalizedConfigurationFactory {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn parse(&self, body: &Value) -> Result<Box<dyn TransformerConfiguration>> {
        let config: PersonalizedConfiguration = serde_json::from_value(body.clone())
            .map_err(|e| Error::Configuration(format!("{}: {}", TYPE_NAME, e)))?;
        if config.campaign.is_empty() {
            return Err(Error::Configuration(format!(
                "{}: campaign must not be empty",
                TYPE_NAME
            )));
        }
        if !(0.0..=1.0).contains(&config.weight) {
            return Err(Error::Configuration(format!(
                "{}: weight must be within [0.0, 1.0], got {}",
                TYPE_NAME, config.weight
            )));
        }
        Ok(Box::new(config))
    }
}

/// Call contract against the personalization backend. The HTTP
/// implementation is `HttpPersonalizeClient`; tests substitute a mock.
#[async_trait::async_trait]
pub trait PersonalizeClient: Send + Sync {
    async fn personalized_ranking(
        &self,
        endpoint: &str,
        campaign: &str,
        user_id: &str,
        item_ids: &[String],
        context: &Map<String, Value>,
    ) -> Result<Vec<RankedItem>>;
}

#[derive(Serialize)]
struct PersonalizeRequestBody<'a> {
    user_id: &'a str,
    item_ids: &'a [String],
    context: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct PersonalizeResponseBody {
    ranking: Vec<RankedItem>,
}

/// reqwest-backed personalization client with a per-client timeout and no
/// retries.
pub struct HttpPersonalizeClient {
    http: reqwest::Client,
}

impl HttpPersonalizeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl PersonalizeClient for HttpPersonalizeClient {
    async fn personalized_ranking(
        &self,
        endpoint: &str,
        campaign: &str,
        user_id: &str,
        item_ids: &[String],
        context: &Map<String, Value>,
    ) -> Result<Vec<RankedItem>> {
        let url = format!(
            "{}/campaigns/{}/personalized-ranking",
            endpoint.trim_end_matches('/'),
            campaign
        );
        let body = PersonalizeRequestBody {
            user_id,
            item_ids,
            context,
        };
        let response = self.http.post(&url).json(&body).send().await?;
        let response = response.error_for_status()?;
        let parsed: PersonalizeResponseBody = response.json().await?;
        Ok(parsed.ranking)
    }
}

/// Reorders results by blending the campaign's per-user ranking with the
/// retrieval score.
pub struct PersonalizedRanker {
    client: Arc<dyn PersonalizeClient>,
}

impl PersonalizedRanker {
    pub fn new(client: Arc<dyn PersonalizeClient>) -> Self {
        Self { client }
    }

    fn item_id(config: &PersonalizedConfiguration, doc: &crate::model::ScoredDocument) -> String {
        if config.item_id_field.is_empty() {
            return doc.id.clone();
        }
        match doc.source_str(&config.item_id_field) {
            Some(value) => value.to_string(),
            None => doc.id.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ResultTransformer for PersonalizedRanker {
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
            .downcast_ref::<PersonalizedConfiguration>()
            .ok_or_else(|| {
                Error::Configuration(format!("{}: mismatched configuration type", TYPE_NAME))
            })?;

        if results.is_empty() {
            return Ok(results);
        }
        let user_id = match params.user_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                warn!(transformer = TYPE_NAME, "no user id; passing results through");
                return Ok(results);
            }
        };

        let item_ids: Vec<String> = results
            .iter()
            .map(|doc| Self::item_id(config, doc))
            .collect();
        let context = params.sanitized_context();

        let ranking = self
            .client
            .personalized_ranking(&config.endpoint, &config.campaign, user_id, &item_ids, &context)
            .await?;
        debug!(
            transformer = TYPE_NAME,
            campaign = %config.campaign,
            items = item_ids.len(),
            ranked = ranking.len(),
            "personalization backend responded"
        );

        let backend_score: HashMap<&str, f32> = ranking
            .iter()
            .map(|item| (item.id.as_str(), item.score))
            .collect();
        let max_original = results
            .iter()
            .map(|d| d.score.abs())
            .fold(0.0f32, f32::max);

        // Blend: weight goes to the campaign's score, the remainder to the
        // (max-normalized) retrieval score. Items the campaign did not rank
        // keep a zero campaign component.
        let mut blended: Vec<(crate::model::ScoredDocument, f32)> = results
            .into_iter()
            .zip(item_ids.iter())
            .map(|(doc, item_id)| {
                let campaign_score = backend_score.get(item_id.as_str()).copied().unwrap_or(0.0);
                let normalized = if max_original > 0.0 {
                    doc.score / max_original
                } else {
                    0.0
                };
                let combined =
                    config.weight * campaign_score + (1.0 - config.weight) * normalized;
                (doc, combined)
            })
            .collect();
        // Stable sort: ties keep the retrieval order.
        blended.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(blended
            .into_iter()
            .map(|(mut doc, combined)| {
                doc.score = combined;
                doc
            })
            .collect())
    }
}
