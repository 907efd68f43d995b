//! Protocol generations.
//!
//! Two controller API generations are spoken: the modern one (kebab-case
//! field names, `Application` facade, model terminology) and the legacy
//! one (PascalCase field names, `Client.Service*` calls, environment
//! terminology). Each generation is a [`Protocol`] strategy that frames
//! requests, decodes responses, and builds/parses the payload of every
//! domain operation. The session layer never branches on generation.

mod legacy;
mod modern;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::delta::DeltaRecord;
use crate::error::Error;
use crate::facade::{self, FacadeTable};
use crate::params::{
    AddUnitsRequest, DeployRequest, LoginRequest, MachineSpec, OfferRequest, RelationEndpoint,
    UpdateApplicationRequest,
};
use crate::rpc::{Operation, RpcResponse};

pub use legacy::LegacyProtocol;
pub use modern::ModernProtocol;

/// Watcher error returned for a `Next` that raced a `Stop`.
pub const ERR_STOP_WATCHER: &str = "watcher was stopped";

// ── Generation selector ─────────────────────────────────────────────

/// Which API generation a controller speaks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProtocolGeneration {
    #[default]
    Modern,
    Legacy,
}

impl ProtocolGeneration {
    /// Instantiate the strategy for this generation.
    pub fn protocol(self) -> std::sync::Arc<dyn Protocol> {
        match self {
            Self::Modern => std::sync::Arc::new(ModernProtocol),
            Self::Legacy => std::sync::Arc::new(LegacyProtocol),
        }
    }
}

// ── Parsed responses ────────────────────────────────────────────────

/// What a successful login tells us.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginResponse {
    pub facades: FacadeTable,
    pub read_only: bool,
    pub model_tag: Option<String>,
    /// Authenticated identity (macaroon logins).
    pub identity: Option<String>,
    /// Macaroon the client must get discharged before retrying.
    pub discharge_required: Option<Value>,
    /// Credentials issued in exchange for a one-time token.
    pub issued_credentials: Option<(String, String)>,
    pub server_version: Option<String>,
}

/// Outcome for one machine in an add-machines batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineOutcome {
    pub name: Option<String>,
    pub err: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplicationConfig {
    pub config: Map<String, Value>,
    pub constraints: Value,
    pub series: Option<String>,
}

/// Normalized model information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelDetails {
    pub tag: String,
    pub name: String,
    pub series: Option<String>,
    pub provider: Option<String>,
    pub uuid: Option<String>,
    pub controller_uuid: Option<String>,
    pub owner_tag: Option<String>,
    pub life: Option<String>,
    pub is_alive: bool,
    pub is_admin: bool,
    pub err: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub owner: String,
    pub tag: String,
    pub uuid: String,
    pub last_connection: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatedModel {
    pub name: String,
    pub uuid: String,
    pub owner: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OfferEndpoint {
    pub name: String,
    pub interface: String,
    pub role: String,
}

/// A remote application offered from some model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OfferDetails {
    pub err: Option<String>,
    pub application_name: String,
    pub url: String,
    pub charm: Option<String>,
    pub description: Option<String>,
    pub source_name: Option<String>,
    pub source_id: Option<String>,
    pub endpoints: Vec<OfferEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CharmOption {
    #[serde(rename = "type")]
    pub option_type: Option<String>,
    pub description: Option<String>,
    pub default: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharmRelation {
    pub interface: String,
    pub name: String,
    pub role: String,
    pub scope: String,
    pub limit: Option<i64>,
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CharmDetails {
    pub url: String,
    pub revision: Option<i64>,
    pub name: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub subordinate: bool,
    pub min_juju_version: Option<String>,
    pub options: std::collections::BTreeMap<String, CharmOption>,
    pub peers: std::collections::BTreeMap<String, CharmRelation>,
    pub provides: std::collections::BTreeMap<String, CharmRelation>,
    pub requires: std::collections::BTreeMap<String, CharmRelation>,
    pub tags: Vec<String>,
    pub series: Vec<String>,
    pub terms: Vec<String>,
    pub metrics: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BundleChanges {
    pub errors: Vec<String>,
    pub changes: Vec<Value>,
}

// ── Protocol ────────────────────────────────────────────────────────

/// Payload builder/parser strategy for one API generation.
///
/// Builders return `Err(UnsupportedOperation)` when the generation has no
/// way to express the call; the defaults below cover operations only the
/// modern generation offers.
pub trait Protocol: Send + Sync {
    fn generation(&self) -> ProtocolGeneration;

    // ── Framing ──

    /// Serialize `op` with its assigned request id.
    fn encode(&self, op: &Operation, request_id: u64) -> Result<String, Error>;

    /// Parse an incoming frame.
    fn decode(&self, frame: &str) -> Result<RpcResponse, Error>;

    /// Facade version to put on the wire, or `None` if unsupported.
    fn resolve_facade(
        &self,
        table: Option<&FacadeTable>,
        facade_name: &str,
        desired: Option<u32>,
    ) -> Option<u32> {
        facade::resolve(table, facade_name, desired)
    }

    // ── Session ──

    fn login(&self, request: &LoginRequest) -> Result<Operation, Error>;
    fn parse_login(&self, response: &Value) -> LoginResponse;
    fn ping(&self) -> Operation;
    fn watch_all(&self) -> Operation;
    fn watcher_next(&self, watcher_id: &str) -> Operation;
    fn watcher_stop(&self, watcher_id: &str) -> Operation;
    fn parse_watcher_id(&self, response: &Value) -> Option<String>;
    fn parse_deltas(&self, response: &Value) -> Result<Vec<DeltaRecord>, Error>;

    // ── Applications ──

    fn deploy(&self, request: &DeployRequest) -> Result<Operation, Error>;
    /// Error for a deploy, which may sit inside the per-application results.
    fn deploy_error(&self, response: &RpcResponse) -> Option<String>;
    fn add_units(&self, request: &AddUnitsRequest) -> Result<Operation, Error>;
    fn parse_added_units(&self, response: &Value) -> Vec<String>;
    fn destroy_units(&self, unit_names: &[String]) -> Result<Operation, Error>;
    fn expose(&self, application: &str) -> Result<Operation, Error>;
    fn unexpose(&self, application: &str) -> Result<Operation, Error>;
    fn destroy_application(&self, application: &str) -> Result<Operation, Error>;
    fn update_application(&self, request: &UpdateApplicationRequest) -> Result<Operation, Error>;
    fn get_application_config(&self, application: &str) -> Result<Operation, Error>;
    fn parse_application_config(&self, response: &Value) -> ApplicationConfig;
    fn resolved(&self, unit_name: &str, retry: bool) -> Result<Operation, Error>;
    fn add_charm(&self, url: &str, macaroon: Option<&Value>) -> Result<Operation, Error>;

    fn set_metric_credentials(
        &self,
        application: &str,
        _macaroon: &Value,
    ) -> Result<Operation, Error> {
        Err(unsupported("Application", "SetMetricCredentials", application))
    }

    // ── Machines ──

    fn add_machines(&self, specs: &[MachineSpec]) -> Result<Operation, Error>;
    fn parse_added_machines(&self, response: &Value) -> Vec<MachineOutcome>;
    fn destroy_machines(&self, names: &[String], force: bool) -> Result<Operation, Error>;

    // ── Relations ──

    fn add_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error>;
    /// Endpoints reported back for a new relation, keyed by application.
    fn parse_relation_endpoints(&self, response: &Value) -> Vec<RelationEndpoint>;
    fn destroy_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error>;

    // ── Annotations ──

    /// Tag for an annotated entity, e.g. `application-django`.
    fn annotation_tag(&self, entity: &str, kind: &str) -> String {
        crate::params::entity_tag(kind, entity)
    }
    fn set_annotations(&self, tag: &str, pairs: &Map<String, Value>) -> Result<Operation, Error>;
    fn set_annotations_error(&self, response: &Value) -> Option<String>;
    fn get_annotations(&self, tag: &str) -> Result<Operation, Error>;
    fn parse_annotations(&self, response: &Value) -> Result<Map<String, Value>, String>;

    // ── Models ──

    fn model_info(&self, tags: &[String]) -> Result<Operation, Error>;
    fn parse_model_info(&self, response: &Value, tags: &[String])
    -> Result<Vec<ModelDetails>, String>;
    fn model_get(&self) -> Result<Operation, Error>;
    /// Model configuration with plain values.
    fn parse_model_config(&self, response: &Value) -> Map<String, Value>;
    fn list_models(&self, user_tag: &str) -> Result<Operation, Error>;
    fn parse_model_list(&self, response: &Value) -> Vec<ModelSummary>;

    fn create_model(&self, name: &str, _owner_tag: &str) -> Result<Operation, Error> {
        Err(unsupported("ModelManager", "CreateModel", name))
    }

    fn parse_created_model(&self, _response: &Value) -> CreatedModel {
        CreatedModel::default()
    }

    fn destroy_models(&self, tags: &[String]) -> Result<Operation, Error> {
        Err(unsupported("ModelManager", "DestroyModels", &tags.join(",")))
    }

    /// Per-tag error for a destroy-models batch.
    fn parse_destroyed_models(&self, _response: &Value, _tags: &[String]) -> Vec<(String, Option<String>)> {
        Vec::new()
    }

    // ── Cross-model offers ──

    fn offer(&self, request: &OfferRequest) -> Result<Operation, Error> {
        Err(unsupported("CrossModelRelations", "Offer", &request.application_name))
    }

    fn offer_error(&self, _response: &Value) -> Option<String> {
        None
    }

    fn list_offers(&self) -> Result<Operation, Error> {
        Err(unsupported("CrossModelRelations", "ListOffers", ""))
    }

    fn parse_offer_list(&self, _response: &Value) -> Vec<OfferDetails> {
        Vec::new()
    }

    fn get_offer(&self, url: &str) -> Result<Operation, Error> {
        Err(unsupported("CrossModelRelations", "ApplicationOffers", url))
    }

    fn parse_offer(&self, _response: &Value) -> Result<OfferDetails, String> {
        Err("offers are not available".to_owned())
    }

    // ── Charms and bundles ──

    fn charm_info(&self, url: &str) -> Result<Operation, Error>;
    fn parse_charm_info(&self, response: &Value) -> CharmDetails;
    fn bundle_changes(&self, yaml: Option<&str>, token: Option<&str>) -> Result<Operation, Error>;
    fn parse_bundle_changes(&self, response: &RpcResponse) -> BundleChanges;
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Build the error for an operation a generation cannot express.
pub(crate) fn unsupported(facade_name: &str, request: &str, subject: &str) -> Error {
    let description = serde_json::json!({
        "type": facade_name,
        "request": request,
        "subject": subject,
    });
    Error::unsupported(description.to_string())
}

/// Extract a message from an error slot that may be a string or an
/// `{message, code}` object.
pub(crate) fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("Message"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        other => Some(other.to_string()),
    }
}

/// Message plus an optional `(code N)` suffix.
pub(crate) fn error_with_code(message: Option<&str>, code: Option<&Value>) -> Option<String> {
    let message = message?;
    match code {
        Some(Value::String(c)) if !c.is_empty() => Some(format!("{message} (code {c})")),
        Some(Value::Number(n)) => Some(format!("{message} (code {n})")),
        _ => Some(message.to_owned()),
    }
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generation_parses_case_insensitively() {
        assert_eq!("Legacy".parse::<ProtocolGeneration>().unwrap(), ProtocolGeneration::Legacy);
        assert_eq!(ProtocolGeneration::Modern.to_string(), "modern");
        assert_eq!(
            ProtocolGeneration::Legacy.protocol().generation(),
            ProtocolGeneration::Legacy
        );
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(error_message(&json!(null)), None);
        assert_eq!(error_message(&json!("boom")), Some("boom".into()));
        assert_eq!(
            error_message(&json!({"message": "nope", "code": "not found"})),
            Some("nope".into())
        );
    }

    #[test]
    fn error_code_suffix() {
        assert_eq!(
            error_with_code(Some("machine 42 not found"), Some(&json!("47"))),
            Some("machine 42 not found (code 47)".into())
        );
        assert_eq!(
            error_with_code(Some("bad"), Some(&json!(""))),
            Some("bad".into())
        );
        assert_eq!(error_with_code(None, Some(&json!("1"))), None);
    }
}
