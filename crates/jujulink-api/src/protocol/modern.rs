// Modern API generation: kebab-case fields, `Application` facade, models.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::{
    ApplicationConfig, BundleChanges, CharmDetails, CharmOption, CharmRelation, CreatedModel,
    LoginResponse, MachineOutcome, ModelDetails, ModelSummary, OfferDetails, OfferEndpoint,
    Protocol, ProtocolGeneration, error_message, error_with_code, str_field, string_list,
    unsupported,
};
use crate::delta::{DeltaRecord, EntityKind};
use crate::error::Error;
use crate::facade::{ADMIN_FACADE, ADMIN_FACADE_VERSION, FacadeTable};
use crate::params::{
    AddUnitsRequest, DeployRequest, JOB_HOST_UNITS, LoginRequest, MachineSpec, OfferRequest,
    RelationEndpoint, UpdateApplicationRequest, parse_placement, stringify_values,
};
use crate::rpc::{Operation, RpcResponse};

/// Placeholder key sent on model creation; the controller insists on one.
const PLACEHOLDER_AUTHORIZED_KEYS: &str = "ssh-rsa INVALID (set by jujulink)";

/// Strategy for controllers speaking the modern API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModernProtocol;

/// First element of `response.results`, or `Null`.
fn first_result(response: &Value) -> &Value {
    response
        .get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .unwrap_or(&Value::Null)
}

fn entities(tags: &[String]) -> Value {
    Value::Array(tags.iter().map(|tag| json!({ "tag": tag })).collect())
}

fn charm_relations(value: Option<&Value>) -> BTreeMap<String, CharmRelation> {
    let Some(Value::Object(relations)) = value else {
        return BTreeMap::new();
    };
    relations
        .iter()
        .map(|(key, rel)| {
            let relation = CharmRelation {
                interface: str_field(rel, "interface").unwrap_or_default(),
                name: str_field(rel, "name").unwrap_or_default(),
                role: str_field(rel, "role").unwrap_or_default(),
                scope: str_field(rel, "scope").unwrap_or_default(),
                limit: rel.get("limit").and_then(Value::as_i64),
                optional: rel.get("optional").and_then(Value::as_bool).unwrap_or(false),
            };
            (key.clone(), relation)
        })
        .collect()
}

fn offer_endpoints(value: Option<&Value>) -> Vec<OfferEndpoint> {
    value
        .and_then(Value::as_array)
        .map(|eps| {
            eps.iter()
                .map(|ep| OfferEndpoint {
                    name: str_field(ep, "name").unwrap_or_default(),
                    interface: str_field(ep, "interface").unwrap_or_default(),
                    role: str_field(ep, "role").unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl Protocol for ModernProtocol {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Modern
    }

    // ── Framing ─────────────────────────────────────────────────────

    fn encode(&self, op: &Operation, request_id: u64) -> Result<String, Error> {
        let mut frame = Map::new();
        frame.insert("type".into(), Value::String(op.facade.clone()));
        frame.insert("request".into(), Value::String(op.request.clone()));
        frame.insert("version".into(), Value::from(op.version.unwrap_or(0)));
        frame.insert("params".into(), op.wire_params());
        frame.insert("request-id".into(), Value::from(request_id));
        if let Some(id) = &op.id {
            frame.insert("id".into(), Value::String(id.clone()));
        }
        Ok(serde_json::to_string(&frame)?)
    }

    fn decode(&self, frame: &str) -> Result<RpcResponse, Error> {
        let value: Value = serde_json::from_str(frame)?;
        let request_id = value
            .get("request-id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::malformed("frame has no request-id"))?;
        Ok(RpcResponse {
            request_id,
            response: value.get("response").cloned().unwrap_or(Value::Null),
            error: value.get("error").and_then(error_message),
            error_code: str_field(&value, "error-code"),
        })
    }

    // ── Session ─────────────────────────────────────────────────────

    fn login(&self, request: &LoginRequest) -> Result<Operation, Error> {
        let op = Operation::new(ADMIN_FACADE, "Login").with_version(ADMIN_FACADE_VERSION);
        match request {
            LoginRequest::Password { user_tag, password } => Ok(op.with_params(json!({
                "auth-tag": user_tag,
                "credentials": password,
            }))),
            LoginRequest::Macaroons(Some(macaroons)) => {
                Ok(op.with_params(json!({ "macaroons": [macaroons] })))
            }
            LoginRequest::Macaroons(None) => Ok(op),
            LoginRequest::Token(_) => Err(unsupported("GUIToken", "Login", "")),
        }
    }

    fn parse_login(&self, response: &Value) -> LoginResponse {
        let facades: FacadeTable = response
            .get("facades")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|f| {
                        let name = f.get("name")?.as_str()?.to_owned();
                        let versions = f
                            .get("versions")?
                            .as_array()?
                            .iter()
                            .filter_map(Value::as_u64)
                            .filter_map(|v| u32::try_from(v).ok())
                            .collect();
                        Some((name, versions))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let user_info = response.get("user-info").unwrap_or(&Value::Null);
        LoginResponse {
            facades,
            read_only: user_info
                .get("read-only")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            model_tag: str_field(response, "model-tag"),
            identity: str_field(user_info, "identity"),
            discharge_required: response
                .get("discharge-required")
                .filter(|m| !m.is_null())
                .cloned(),
            issued_credentials: None,
            server_version: str_field(response, "server-version"),
        }
    }

    fn ping(&self) -> Operation {
        Operation::new("Pinger", "Ping")
    }

    fn watch_all(&self) -> Operation {
        Operation::new("Client", "WatchAll")
    }

    fn watcher_next(&self, watcher_id: &str) -> Operation {
        Operation::new("AllWatcher", "Next").with_id(watcher_id)
    }

    fn watcher_stop(&self, watcher_id: &str) -> Operation {
        Operation::new("AllWatcher", "Stop").with_id(watcher_id)
    }

    fn parse_watcher_id(&self, response: &Value) -> Option<String> {
        match response.get("watcher-id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    fn parse_deltas(&self, response: &Value) -> Result<Vec<DeltaRecord>, Error> {
        let deltas = response
            .get("deltas")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("watcher response has no deltas"))?;
        Ok(deltas
            .iter()
            .filter_map(|raw| {
                let record = DeltaRecord::from_triple(raw, EntityKind::from_wire);
                if record.is_none() {
                    tracing::warn!(delta = %raw, "skipping malformed delta");
                }
                record
            })
            .collect())
    }

    // ── Applications ────────────────────────────────────────────────

    fn deploy(&self, request: &DeployRequest) -> Result<Operation, Error> {
        let mut app = json!({
            "application": request.application_name,
            "charm-url": request.charm_url,
            "config": stringify_values(&request.config),
            "config-yaml": request.config_yaml,
            "constraints": request.constraints,
            "num-units": request.num_units,
        });
        if let Some(series) = request.series.as_deref().filter(|s| !s.is_empty()) {
            app["series"] = json!(series);
        }
        if let Some(placement) = request.to_machine.as_deref().and_then(parse_placement) {
            app["placement"] = json!([placement]);
        }
        Ok(Operation::new("Application", "Deploy").with_params(json!({ "applications": [app] })))
    }

    fn deploy_error(&self, response: &RpcResponse) -> Option<String> {
        response.error.clone().or_else(|| {
            first_result(&response.response)
                .get("error")
                .and_then(error_message)
        })
    }

    fn add_units(&self, request: &AddUnitsRequest) -> Result<Operation, Error> {
        let placement = request.to_machine.as_deref().and_then(parse_placement);
        Ok(Operation::new("Application", "AddUnits").with_params(json!({
            "application": request.application_name,
            "num-units": request.num_units,
            "placement": [placement],
        })))
    }

    fn parse_added_units(&self, response: &Value) -> Vec<String> {
        string_list(response.get("units"))
    }

    fn destroy_units(&self, unit_names: &[String]) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "DestroyUnits")
            .with_params(json!({ "unit-names": unit_names })))
    }

    fn expose(&self, application: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "Expose").with_params(json!({ "application": application })))
    }

    fn unexpose(&self, application: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "Unexpose")
            .with_params(json!({ "application": application })))
    }

    fn destroy_application(&self, application: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "Destroy")
            .with_params(json!({ "application": application })))
    }

    fn update_application(&self, request: &UpdateApplicationRequest) -> Result<Operation, Error> {
        let mut params = Map::new();
        params.insert("application".into(), json!(request.application_name));
        if let Some(url) = &request.charm_url {
            params.insert("charm-url".into(), json!(url));
            params.insert("force-charm-url".into(), json!(request.force_units));
            params.insert("force-series".into(), json!(request.force_series));
        }
        if let Some(settings) = &request.settings {
            params.insert("settings".into(), Value::Object(stringify_values(settings)));
        }
        if let Some(constraints) = &request.constraints {
            params.insert("constraints".into(), json!(constraints));
        }
        if let Some(min_units) = request.min_units.filter(|n| *n > 0) {
            params.insert("min-units".into(), json!(min_units));
        }
        Ok(Operation::new("Application", "Update").with_params(Value::Object(params)))
    }

    fn get_application_config(&self, application: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "Get").with_params(json!({ "application": application })))
    }

    fn parse_application_config(&self, response: &Value) -> ApplicationConfig {
        let config = response
            .get("config")
            .and_then(Value::as_object)
            .map(|cfg| {
                cfg.iter()
                    .map(|(k, v)| (k.clone(), v.get("value").cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .unwrap_or_default();
        ApplicationConfig {
            config,
            constraints: response.get("constraints").cloned().unwrap_or(Value::Null),
            series: str_field(response, "series"),
        }
    }

    fn resolved(&self, unit_name: &str, retry: bool) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "Resolved")
            .with_params(json!({ "unit-name": unit_name, "retry": retry })))
    }

    fn add_charm(&self, url: &str, macaroon: Option<&Value>) -> Result<Operation, Error> {
        Ok(match macaroon {
            Some(m) => Operation::new("Client", "AddCharmWithAuthorization")
                .with_params(json!({ "url": url, "macaroon": m })),
            None => Operation::new("Client", "AddCharm").with_params(json!({ "url": url })),
        })
    }

    fn set_metric_credentials(
        &self,
        application: &str,
        macaroon: &Value,
    ) -> Result<Operation, Error> {
        Ok(
            Operation::new("Application", "SetMetricCredentials").with_params(json!({
                "creds": [{ "application": application, "metrics-credentials": macaroon }],
            })),
        )
    }

    // ── Machines ────────────────────────────────────────────────────

    fn add_machines(&self, specs: &[MachineSpec]) -> Result<Operation, Error> {
        let params: Vec<Value> = specs
            .iter()
            .map(|spec| {
                let mut machine = Map::new();
                let jobs = if spec.jobs.is_empty() {
                    vec![JOB_HOST_UNITS.to_owned()]
                } else {
                    spec.jobs.clone()
                };
                machine.insert("jobs".into(), json!(jobs));
                if let Some(series) = &spec.series {
                    machine.insert("series".into(), json!(series));
                }
                if let Some(parent) = &spec.parent_id {
                    machine.insert("parent-id".into(), json!(parent));
                }
                if let Some(container) = &spec.container_type {
                    machine.insert("container-type".into(), json!(container));
                }
                if !spec.constraints.is_empty() {
                    machine.insert("constraints".into(), json!(spec.constraints));
                }
                Value::Object(machine)
            })
            .collect();
        Ok(Operation::new("Client", "AddMachines").with_params(json!({ "params": params })))
    }

    fn parse_added_machines(&self, response: &Value) -> Vec<MachineOutcome> {
        response
            .get("machines")
            .and_then(Value::as_array)
            .map(|machines| {
                machines
                    .iter()
                    .map(|m| {
                        let err = m.get("error").filter(|e| !e.is_null());
                        MachineOutcome {
                            name: str_field(m, "machine"),
                            err: err.and_then(|e| {
                                error_with_code(
                                    e.get("message").and_then(Value::as_str),
                                    e.get("code"),
                                )
                            }),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn destroy_machines(&self, names: &[String], force: bool) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "DestroyMachines")
            .with_params(json!({ "machine-names": names, "force": force })))
    }

    // ── Relations ───────────────────────────────────────────────────

    fn add_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "AddRelation")
            .with_params(json!({ "endpoints": [endpoint_a, endpoint_b] })))
    }

    fn parse_relation_endpoints(&self, response: &Value) -> Vec<RelationEndpoint> {
        let Some(Value::Object(endpoints)) = response.get("endpoints") else {
            return Vec::new();
        };
        endpoints
            .iter()
            .map(|(app, ep)| RelationEndpoint {
                application: app.clone(),
                name: str_field(ep, "name").unwrap_or_default(),
                interface: str_field(ep, "interface").unwrap_or_default(),
                scope: str_field(ep, "scope").unwrap_or_default(),
                role: str_field(ep, "role").unwrap_or_default(),
            })
            .collect()
    }

    fn destroy_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Application", "DestroyRelation")
            .with_params(json!({ "endpoints": [endpoint_a, endpoint_b] })))
    }

    // ── Annotations ─────────────────────────────────────────────────

    fn set_annotations(&self, tag: &str, pairs: &Map<String, Value>) -> Result<Operation, Error> {
        Ok(Operation::new("Annotations", "Set").with_params(json!({
            "annotations": [{ "entity": tag, "annotations": stringify_values(pairs) }],
        })))
    }

    fn set_annotations_error(&self, response: &Value) -> Option<String> {
        first_result(response).get("error").and_then(error_message)
    }

    fn get_annotations(&self, tag: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Annotations", "Get").with_params(json!({ "entities": [{ "tag": tag }] })))
    }

    fn parse_annotations(&self, response: &Value) -> Result<Map<String, Value>, String> {
        let result = first_result(response);
        if let Some(err) = result.get("error").and_then(error_message) {
            return Err(err);
        }
        Ok(result
            .get("annotations")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default())
    }

    // ── Models ──────────────────────────────────────────────────────

    fn model_info(&self, tags: &[String]) -> Result<Operation, Error> {
        Ok(Operation::new("ModelManager", "ModelInfo")
            .with_params(json!({ "entities": entities(tags) })))
    }

    fn parse_model_info(
        &self,
        response: &Value,
        tags: &[String],
    ) -> Result<Vec<ModelDetails>, String> {
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if results.len() != tags.len() {
            return Err(format!(
                "unexpected results: {}",
                Value::Array(results)
            ));
        }
        Ok(results
            .iter()
            .zip(tags)
            .map(|(result, tag)| {
                if let Some(err) = result.get("error").and_then(error_message) {
                    return ModelDetails {
                        tag: tag.clone(),
                        err: Some(err),
                        ..ModelDetails::default()
                    };
                }
                let info = result.get("result").unwrap_or(&Value::Null);
                let uuid = str_field(info, "uuid");
                let controller_uuid = str_field(info, "controller-uuid");
                let life = str_field(info, "life");
                ModelDetails {
                    tag: tag.clone(),
                    name: str_field(info, "name").unwrap_or_default(),
                    series: str_field(info, "default-series"),
                    provider: str_field(info, "provider-type"),
                    is_alive: life.as_deref() == Some("alive"),
                    is_admin: uuid.is_some() && uuid == controller_uuid,
                    uuid,
                    controller_uuid,
                    owner_tag: str_field(info, "owner-tag"),
                    life,
                    err: None,
                }
            })
            .collect())
    }

    fn model_get(&self) -> Result<Operation, Error> {
        Ok(Operation::new("ModelConfig", "ModelGet"))
    }

    fn parse_model_config(&self, response: &Value) -> Map<String, Value> {
        response
            .get("config")
            .and_then(Value::as_object)
            .map(|cfg| {
                cfg.iter()
                    .map(|(k, v)| (k.clone(), v.get("value").cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn list_models(&self, user_tag: &str) -> Result<Operation, Error> {
        Ok(Operation::new("ModelManager", "ListModels").with_params(json!({ "tag": user_tag })))
    }

    fn parse_model_list(&self, response: &Value) -> Vec<ModelSummary> {
        response
            .get("user-models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .map(|entry| {
                        let model = entry.get("model").unwrap_or(&Value::Null);
                        let uuid = str_field(model, "uuid").unwrap_or_default();
                        ModelSummary {
                            name: str_field(model, "name").unwrap_or_default(),
                            owner: str_field(model, "owner-tag").unwrap_or_default(),
                            tag: format!("model-{uuid}"),
                            uuid,
                            last_connection: str_field(entry, "last-connection"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn create_model(&self, name: &str, owner_tag: &str) -> Result<Operation, Error> {
        let owner = if owner_tag.contains('@') {
            owner_tag.to_owned()
        } else {
            format!("{owner_tag}@local")
        };
        Ok(Operation::new("ModelManager", "CreateModel").with_params(json!({
            "name": name,
            "owner-tag": owner,
            "config": { "authorized-keys": PLACEHOLDER_AUTHORIZED_KEYS },
        })))
    }

    fn parse_created_model(&self, response: &Value) -> CreatedModel {
        CreatedModel {
            name: str_field(response, "name").unwrap_or_default(),
            uuid: str_field(response, "uuid").unwrap_or_default(),
            owner: str_field(response, "owner-tag").unwrap_or_default(),
            region: str_field(response, "cloud-region"),
        }
    }

    fn destroy_models(&self, tags: &[String]) -> Result<Operation, Error> {
        Ok(Operation::new("ModelManager", "DestroyModels")
            .with_params(json!({ "entities": entities(tags) })))
    }

    fn parse_destroyed_models(
        &self,
        response: &Value,
        tags: &[String],
    ) -> Vec<(String, Option<String>)> {
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        tags.iter()
            .zip(results)
            .map(|(tag, result)| {
                (
                    tag.clone(),
                    result.get("error").and_then(error_message),
                )
            })
            .collect()
    }

    // ── Cross-model offers ──────────────────────────────────────────

    fn offer(&self, request: &OfferRequest) -> Result<Operation, Error> {
        Ok(
            Operation::new("CrossModelRelations", "Offer").with_params(json!({
                "offers": [{
                    "applicationname": request.application_name,
                    "endpoints": request.endpoints,
                    "applicationurl": request.resolved_url(),
                    "allowedusers": request.allowed_user_tags(),
                    "applicationdescription": request.description,
                }],
            })),
        )
    }

    fn offer_error(&self, response: &Value) -> Option<String> {
        first_result(response).get("error").and_then(error_message)
    }

    fn list_offers(&self) -> Result<Operation, Error> {
        Ok(Operation::new("CrossModelRelations", "ListOffers")
            .with_params(json!({ "filters": [{ "filter-terms": [] }] })))
    }

    fn parse_offer_list(&self, response: &Value) -> Vec<OfferDetails> {
        first_result(response)
            .get("result")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        if let Some(err) = item.get("error").and_then(error_message) {
                            return OfferDetails {
                                err: Some(err),
                                ..OfferDetails::default()
                            };
                        }
                        let offer = item.get("result").unwrap_or(&Value::Null);
                        OfferDetails {
                            application_name: str_field(offer, "applicationname")
                                .unwrap_or_default(),
                            url: str_field(offer, "applicationurl").unwrap_or_default(),
                            charm: str_field(offer, "charmname"),
                            endpoints: offer_endpoints(offer.get("endpoints")),
                            ..OfferDetails::default()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_offer(&self, url: &str) -> Result<Operation, Error> {
        Ok(Operation::new("CrossModelRelations", "ApplicationOffers")
            .with_params(json!({ "applicationurls": [url] })))
    }

    fn parse_offer(&self, response: &Value) -> Result<OfferDetails, String> {
        let result = first_result(response);
        if let Some(err) = result.get("error").and_then(error_message) {
            return Err(err);
        }
        let offer = result.get("result").unwrap_or(&Value::Null);
        Ok(OfferDetails {
            err: None,
            application_name: str_field(offer, "applicationname").unwrap_or_default(),
            url: str_field(offer, "applicationurl").unwrap_or_default(),
            charm: None,
            description: str_field(offer, "applicationdescription"),
            source_name: str_field(offer, "sourcelabel"),
            source_id: str_field(offer, "sourceenviron")
                .map(|s| s.strip_prefix("environment-").unwrap_or(&s).to_owned()),
            endpoints: offer_endpoints(offer.get("endpoints")),
        })
    }

    // ── Charms and bundles ──────────────────────────────────────────

    fn charm_info(&self, url: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Charms", "CharmInfo").with_params(json!({ "url": url })))
    }

    fn parse_charm_info(&self, response: &Value) -> CharmDetails {
        let meta = response.get("meta").unwrap_or(&Value::Null);
        let options = response
            .get("config")
            .and_then(Value::as_object)
            .map(|cfg| {
                cfg.iter()
                    .map(|(k, v)| {
                        let option = CharmOption {
                            option_type: str_field(v, "type"),
                            description: str_field(v, "description"),
                            default: v.get("default").cloned().unwrap_or(Value::Null),
                        };
                        (k.clone(), option)
                    })
                    .collect()
            })
            .unwrap_or_default();
        CharmDetails {
            url: str_field(response, "url").unwrap_or_default(),
            revision: response.get("revision").and_then(Value::as_i64),
            name: str_field(meta, "name").unwrap_or_default(),
            summary: str_field(meta, "summary"),
            description: str_field(meta, "description"),
            subordinate: meta
                .get("subordinate")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            min_juju_version: str_field(meta, "min-juju-version"),
            options,
            peers: charm_relations(meta.get("peers")),
            provides: charm_relations(meta.get("provides")),
            requires: charm_relations(meta.get("requires")),
            tags: string_list(meta.get("tags")),
            series: string_list(meta.get("series")),
            terms: string_list(meta.get("terms")),
            metrics: response.get("metrics").cloned().unwrap_or(Value::Null),
        }
    }

    fn bundle_changes(&self, yaml: Option<&str>, _token: Option<&str>) -> Result<Operation, Error> {
        let yaml = yaml.ok_or_else(|| unsupported("Client", "GetBundleChanges", "token"))?;
        Ok(Operation::new("Client", "GetBundleChanges").with_params(json!({ "yaml": yaml })))
    }

    fn parse_bundle_changes(&self, response: &RpcResponse) -> BundleChanges {
        let errors = match &response.error {
            Some(err) => vec![err.clone()],
            None => string_list(response.response.get("errors")),
        };
        let changes = response
            .response
            .get("changes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        BundleChanges { errors, changes }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::params::{Constraints, RawConstraints, prepare_constraints};

    fn encoded(op: &Operation, id: u64) -> Value {
        serde_json::from_str(&ModernProtocol.encode(op, id).unwrap()).unwrap()
    }

    #[test]
    fn frames_use_kebab_case_envelope() {
        let op = ModernProtocol.watcher_next("7").with_version(1);
        assert_eq!(
            encoded(&op, 12),
            json!({
                "type": "AllWatcher",
                "request": "Next",
                "version": 1,
                "params": {},
                "request-id": 12,
                "id": "7",
            })
        );
    }

    #[test]
    fn decode_reads_error_and_response() {
        let resp = ModernProtocol
            .decode(r#"{"request-id": 3, "error": "boom", "error-code": "not found"}"#)
            .unwrap();
        assert_eq!(resp.request_id, 3);
        assert_eq!(resp.error.as_deref(), Some("boom"));
        assert_eq!(resp.error_code.as_deref(), Some("not found"));
        assert!(ModernProtocol.decode(r#"{"response": {}}"#).is_err());
    }

    #[test]
    fn password_login_payload() {
        let op = ModernProtocol
            .login(&LoginRequest::Password {
                user_tag: "user-admin".into(),
                password: "sekrit".into(),
            })
            .unwrap();
        assert_eq!(op.facade, "Admin");
        assert_eq!(op.version, Some(3));
        assert_eq!(
            op.params,
            Some(json!({"auth-tag": "user-admin", "credentials": "sekrit"}))
        );
        assert!(ModernProtocol.login(&LoginRequest::Token("t".into())).is_err());
    }

    #[test]
    fn login_response_builds_facade_table() {
        let parsed = ModernProtocol.parse_login(&json!({
            "facades": [
                {"name": "Application", "versions": [1, 2]},
                {"name": "Pinger", "versions": [1]},
            ],
            "user-info": {"read-only": true, "identity": "user-bob@external"},
            "model-tag": "model-5bea955d",
        }));
        assert_eq!(parsed.facades.resolve("Application", None), Some(2));
        assert!(parsed.read_only);
        assert_eq!(parsed.model_tag.as_deref(), Some("model-5bea955d"));
        assert_eq!(parsed.identity.as_deref(), Some("user-bob@external"));
        assert!(parsed.discharge_required.is_none());
    }

    #[test]
    fn deploy_payload_stringifies_config() {
        let mut config = Map::new();
        config.insert("debug".into(), json!(true));
        config.insert("port".into(), json!(8080));
        let request = DeployRequest {
            charm_url: "cs:trusty/django-42".into(),
            application_name: "django".into(),
            series: Some("trusty".into()),
            config,
            num_units: 2,
            constraints: prepare_constraints(&RawConstraints::from("mem=2048")),
            ..DeployRequest::default()
        };
        let op = ModernProtocol.deploy(&request).unwrap();
        assert_eq!(
            op.params.unwrap(),
            json!({"applications": [{
                "application": "django",
                "charm-url": "cs:trusty/django-42",
                "config": {"debug": "true", "port": "8080"},
                "config-yaml": null,
                "constraints": {"mem": 2048},
                "num-units": 2,
                "series": "trusty",
            }]})
        );
    }

    #[test]
    fn deploy_error_reads_first_result() {
        let resp = RpcResponse {
            request_id: 1,
            response: json!({"results": [{"error": {"message": "charm not found", "code": ""}}]}),
            error: None,
            error_code: None,
        };
        assert_eq!(
            ModernProtocol.deploy_error(&resp).as_deref(),
            Some("charm not found")
        );
    }

    #[test]
    fn add_units_sends_parsed_placement() {
        let op = ModernProtocol
            .add_units(&AddUnitsRequest {
                application_name: "django".into(),
                num_units: 1,
                to_machine: Some("lxc:2".into()),
            })
            .unwrap();
        assert_eq!(
            op.params.unwrap()["placement"],
            json!([{"scope": "lxc", "directive": "2"}])
        );
    }

    #[test]
    fn add_machines_defaults_jobs_and_omits_absent_fields() {
        let op = ModernProtocol
            .add_machines(&[
                MachineSpec::default(),
                MachineSpec {
                    container_type: Some("lxc".into()),
                    parent_id: Some("1".into()),
                    constraints: Constraints::new(),
                    ..MachineSpec::default()
                },
            ])
            .unwrap();
        assert_eq!(
            op.params.unwrap(),
            json!({"params": [
                {"jobs": ["JobHostUnits"]},
                {"jobs": ["JobHostUnits"], "parent-id": "1", "container-type": "lxc"},
            ]})
        );
    }

    #[test]
    fn added_machines_carry_error_codes() {
        let outcomes = ModernProtocol.parse_added_machines(&json!({"machines": [
            {"machine": "42", "error": null},
            {"machine": "", "error": {"message": "bad series", "code": "47"}},
        ]}));
        assert_eq!(outcomes[0].err, None);
        assert_eq!(outcomes[1].err.as_deref(), Some("bad series (code 47)"));
    }

    #[test]
    fn model_info_mismatch_is_an_error() {
        let tags = vec!["model-a".to_owned(), "model-b".to_owned()];
        let err = ModernProtocol
            .parse_model_info(&json!({"results": [{"result": {}}]}), &tags)
            .unwrap_err();
        assert!(err.starts_with("unexpected results: "));
    }

    #[test]
    fn model_info_flags() {
        let tags = vec!["model-u1".to_owned()];
        let models = ModernProtocol
            .parse_model_info(
                &json!({"results": [{"result": {
                    "name": "controller",
                    "default-series": "xenial",
                    "provider-type": "maas",
                    "uuid": "u1",
                    "controller-uuid": "u1",
                    "owner-tag": "user-admin@local",
                    "life": "alive",
                }}]}),
                &tags,
            )
            .unwrap();
        assert!(models[0].is_alive);
        assert!(models[0].is_admin);
        assert_eq!(models[0].provider.as_deref(), Some("maas"));
    }

    #[test]
    fn create_model_appends_local_domain() {
        let op = ModernProtocol.create_model("dev", "user-who").unwrap();
        assert_eq!(op.params.unwrap()["owner-tag"], "user-who@local");
        let op = ModernProtocol.create_model("dev", "user-who@external").unwrap();
        assert_eq!(op.params.unwrap()["owner-tag"], "user-who@external");
    }

    #[test]
    fn offer_source_id_strips_prefix() {
        let offer = ModernProtocol
            .parse_offer(&json!({"results": [{"result": {
                "applicationname": "mysql",
                "applicationurl": "local:/u/admin/ec2/mysql",
                "sourceenviron": "environment-1234",
                "sourcelabel": "ec2",
                "endpoints": [{"name": "db", "interface": "mysql", "role": "provider", "limit": 0}],
            }}]}))
            .unwrap();
        assert_eq!(offer.source_id.as_deref(), Some("1234"));
        assert_eq!(offer.endpoints[0].interface, "mysql");
    }

    #[test]
    fn deltas_parse_and_skip_garbage() {
        let deltas = ModernProtocol
            .parse_deltas(&json!({"deltas": [
                ["application", "change", {"name": "django"}],
                "nonsense",
            ]}))
            .unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].info_name(), "applicationInfo");
    }
}
