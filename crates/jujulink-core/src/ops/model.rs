use std::sync::Arc;

use jujulink_api::params::user_tag;
use jujulink_api::protocol::{CreatedModel, ModelDetails, ModelSummary};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelInfoResult {
    pub err: Option<String>,
    /// One entry per requested tag, in request order.
    pub models: Vec<ModelDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelConfigResult {
    pub err: Option<String>,
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelListResult {
    pub err: Option<String>,
    pub models: Vec<ModelSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateModelResult {
    pub err: Option<String>,
    pub model: Option<CreatedModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestroyedModel {
    pub tag: String,
    pub err: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestroyModelsResult {
    pub err: Option<String>,
    pub results: Vec<DestroyedModel>,
}

/// Model details joined with the owner's last connection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelWithInfo {
    #[serde(flatten)]
    pub details: ModelDetails,
    pub last_connection: Option<String>,
}

impl Session {
    pub fn model_info_for(&self, tags: Vec<String>) -> Reply<ModelInfoResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.model_info(&tags);
        self.call(built, move |resp| {
            let parsed = match resp.error {
                Some(err) => Err(err),
                None => protocol.parse_model_info(&resp.response, &tags),
            };
            match parsed {
                Ok(models) => ModelInfoResult { err: None, models },
                Err(err) => ModelInfoResult {
                    err: Some(err),
                    models: Vec::new(),
                },
            }
        })
    }

    /// Configuration of the connected model, with plain values.
    pub fn model_get(&self) -> Reply<ModelConfigResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.model_get();
        self.call(built, move |resp| match resp.error {
            Some(err) => ModelConfigResult {
                err: Some(err),
                config: Map::new(),
            },
            None => ModelConfigResult {
                err: None,
                config: protocol.parse_model_config(&resp.response),
            },
        })
    }

    /// Models visible to `user` (a name or a `user-` tag).
    pub fn list_models(&self, user: &str) -> Reply<ModelListResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.list_models(&user_tag(user));
        self.call(built, move |resp| match resp.error {
            Some(err) => ModelListResult {
                err: Some(err),
                models: Vec::new(),
            },
            None => ModelListResult {
                err: None,
                models: protocol.parse_model_list(&resp.response),
            },
        })
    }

    /// List the current user's models, then fetch details for all of them.
    pub async fn list_models_with_info(&self) -> Result<Vec<ModelWithInfo>, CoreError> {
        let user = self
            .credentials()
            .and_then(|c| c.user().map(str::to_owned))
            .ok_or_else(|| CoreError::ValidationFailed {
                message: "called without credentials".into(),
            })?;

        let listed = self.list_models(&user).await?;
        if let Some(message) = listed.err {
            return Err(CoreError::OperationFailed { message });
        }
        if listed.models.is_empty() {
            return Ok(Vec::new());
        }

        let tags = listed.models.iter().map(|m| m.tag.clone()).collect();
        let info = self.model_info_for(tags).await?;
        if let Some(message) = info.err {
            return Err(CoreError::OperationFailed { message });
        }
        Ok(info
            .models
            .into_iter()
            .zip(listed.models)
            .map(|(details, summary)| ModelWithInfo {
                last_connection: details.err.is_none().then_some(summary.last_connection).flatten(),
                details,
            })
            .collect())
    }

    /// Create a model owned by `owner`.
    pub fn create_model(&self, name: &str, owner: &str) -> Reply<CreateModelResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.create_model(name, &user_tag(owner));
        self.call(built, move |resp| match resp.error {
            Some(err) => CreateModelResult {
                err: Some(err),
                model: None,
            },
            None => CreateModelResult {
                err: None,
                model: Some(protocol.parse_created_model(&resp.response)),
            },
        })
    }

    pub fn destroy_models(&self, tags: Vec<String>) -> Reply<DestroyModelsResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.destroy_models(&tags);
        self.call(built, move |resp| {
            if let Some(err) = resp.error {
                return DestroyModelsResult {
                    err: Some(err),
                    results: Vec::new(),
                };
            }
            let results = protocol
                .parse_destroyed_models(&resp.response, &tags)
                .into_iter()
                .map(|(tag, err)| DestroyedModel { tag, err })
                .collect();
            DestroyModelsResult { err: None, results }
        })
    }
}
