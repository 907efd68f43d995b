// Legacy API generation: PascalCase fields, `Client.Service*` calls,
// environments instead of models.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::{Map, Value, json};

use super::{
    ApplicationConfig, BundleChanges, CharmDetails, CharmOption, CharmRelation, LoginResponse,
    MachineOutcome, ModelDetails, ModelSummary, Protocol, ProtocolGeneration, error_message,
    error_with_code, str_field, string_list, unsupported,
};
use crate::delta::{DeltaRecord, EntityKind};
use crate::error::Error;
use crate::facade::{self, ADMIN_FACADE, FacadeTable};
use crate::params::{
    AddUnitsRequest, DeployRequest, JOB_HOST_UNITS, LoginRequest, MachineSpec, RelationEndpoint,
    UpdateApplicationRequest, stringify_values,
};
use crate::rpc::{Operation, RpcResponse};

/// Facades assumed when a legacy controller advertises none.
static DEFAULT_FACADES: LazyLock<FacadeTable> = LazyLock::new(|| {
    [
        ("AllWatcher", vec![0]),
        ("ChangeSet", vec![0]),
        ("Client", vec![0]),
        ("EnvironmentManager", vec![1]),
        ("GUIToken", vec![0]),
        ("Pinger", vec![0]),
    ]
    .into_iter()
    .collect()
});

/// Strategy for controllers speaking the legacy API.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyProtocol;

fn service_op(request: &str, service: &str) -> Operation {
    Operation::new("Client", request).with_params(json!({ "ServiceName": service }))
}

fn charm_relations(value: Option<&Value>) -> BTreeMap<String, CharmRelation> {
    let Some(Value::Object(relations)) = value else {
        return BTreeMap::new();
    };
    relations
        .iter()
        .map(|(key, rel)| {
            let relation = CharmRelation {
                interface: str_field(rel, "Interface").unwrap_or_default(),
                name: str_field(rel, "Name").unwrap_or_default(),
                role: str_field(rel, "Role").unwrap_or_default(),
                scope: str_field(rel, "Scope").unwrap_or_default(),
                limit: rel.get("Limit").and_then(Value::as_i64),
                optional: rel.get("Optional").and_then(Value::as_bool).unwrap_or(false),
            };
            (key.clone(), relation)
        })
        .collect()
}

impl Protocol for LegacyProtocol {
    fn generation(&self) -> ProtocolGeneration {
        ProtocolGeneration::Legacy
    }

    // ── Framing ─────────────────────────────────────────────────────

    fn encode(&self, op: &Operation, request_id: u64) -> Result<String, Error> {
        let mut frame = Map::new();
        frame.insert("Type".into(), Value::String(op.facade.clone()));
        frame.insert("Request".into(), Value::String(op.request.clone()));
        frame.insert("Version".into(), Value::from(op.version.unwrap_or(0)));
        frame.insert("Params".into(), op.wire_params());
        frame.insert("RequestId".into(), Value::from(request_id));
        if let Some(id) = &op.id {
            frame.insert("Id".into(), Value::String(id.clone()));
        }
        Ok(serde_json::to_string(&frame)?)
    }

    fn decode(&self, frame: &str) -> Result<RpcResponse, Error> {
        let value: Value = serde_json::from_str(frame)?;
        let request_id = value
            .get("RequestId")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::malformed("frame has no RequestId"))?;
        Ok(RpcResponse {
            request_id,
            response: value.get("Response").cloned().unwrap_or(Value::Null),
            error: value.get("Error").and_then(error_message),
            error_code: str_field(&value, "ErrorCode"),
        })
    }

    fn resolve_facade(
        &self,
        table: Option<&FacadeTable>,
        facade_name: &str,
        desired: Option<u32>,
    ) -> Option<u32> {
        match table {
            Some(t) if t.is_empty() => DEFAULT_FACADES.resolve(facade_name, desired),
            other => facade::resolve(other, facade_name, desired),
        }
    }

    // ── Session ─────────────────────────────────────────────────────

    fn login(&self, request: &LoginRequest) -> Result<Operation, Error> {
        match request {
            LoginRequest::Password { user_tag, password } => {
                Ok(Operation::new(ADMIN_FACADE, "Login")
                    .with_version(0)
                    .with_params(json!({ "AuthTag": user_tag, "Password": password })))
            }
            LoginRequest::Token(token) => Ok(Operation::new("GUIToken", "Login")
                .with_version(0)
                .with_params(json!({ "Token": token }))),
            LoginRequest::Macaroons(_) => Err(unsupported(ADMIN_FACADE, "Login", "macaroons")),
        }
    }

    fn parse_login(&self, response: &Value) -> LoginResponse {
        let facades = response
            .get("Facades")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|f| {
                        let name = f.get("Name")?.as_str()?.to_owned();
                        let versions = f
                            .get("Versions")?
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

        let issued_credentials = match (
            str_field(response, "AuthTag"),
            str_field(response, "Password"),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        LoginResponse {
            facades,
            read_only: false,
            model_tag: str_field(response, "EnvironTag"),
            identity: None,
            discharge_required: None,
            issued_credentials,
            server_version: str_field(response, "ServerVersion"),
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
        match response.get("AllWatcherId")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    fn parse_deltas(&self, response: &Value) -> Result<Vec<DeltaRecord>, Error> {
        let deltas = response
            .get("Deltas")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::malformed("watcher response has no Deltas"))?;
        Ok(deltas
            .iter()
            .filter_map(|raw| {
                let record = DeltaRecord::from_triple(raw, EntityKind::from_legacy_wire);
                if record.is_none() {
                    tracing::warn!(delta = %raw, "skipping malformed delta");
                }
                record
            })
            .collect())
    }

    // ── Applications (services) ─────────────────────────────────────

    fn deploy(&self, request: &DeployRequest) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "ServiceDeploy").with_params(json!({
            "ServiceName": request.application_name,
            "ConfigYAML": request.config_yaml,
            "Config": stringify_values(&request.config),
            "Constraints": request.constraints,
            "CharmUrl": request.charm_url,
            "NumUnits": request.num_units,
            "ToMachineSpec": request.to_machine,
        })))
    }

    fn deploy_error(&self, response: &RpcResponse) -> Option<String> {
        response.error.clone()
    }

    fn add_units(&self, request: &AddUnitsRequest) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "AddServiceUnits").with_params(json!({
            "ServiceName": request.application_name,
            "NumUnits": request.num_units,
            "ToMachineSpec": request.to_machine,
        })))
    }

    fn parse_added_units(&self, response: &Value) -> Vec<String> {
        string_list(response.get("Units"))
    }

    fn destroy_units(&self, unit_names: &[String]) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "DestroyServiceUnits")
            .with_params(json!({ "UnitNames": unit_names })))
    }

    fn expose(&self, application: &str) -> Result<Operation, Error> {
        Ok(service_op("ServiceExpose", application))
    }

    fn unexpose(&self, application: &str) -> Result<Operation, Error> {
        Ok(service_op("ServiceUnexpose", application))
    }

    fn destroy_application(&self, application: &str) -> Result<Operation, Error> {
        Ok(service_op("ServiceDestroy", application))
    }

    fn update_application(&self, request: &UpdateApplicationRequest) -> Result<Operation, Error> {
        let mut params = Map::new();
        params.insert("ServiceName".into(), json!(request.application_name));
        if let Some(url) = &request.charm_url {
            params.insert("CharmUrl".into(), json!(url));
            params.insert(
                "ForceCharmUrl".into(),
                json!(request.force_units || request.force_series),
            );
        }
        if let Some(settings) = &request.settings {
            params.insert(
                "SettingsStrings".into(),
                Value::Object(stringify_values(settings)),
            );
        }
        if let Some(constraints) = &request.constraints {
            params.insert("Constraints".into(), json!(constraints));
        }
        if let Some(min_units) = request.min_units.filter(|n| *n > 0) {
            params.insert("MinUnits".into(), json!(min_units));
        }
        Ok(Operation::new("Client", "ServiceUpdate").with_params(Value::Object(params)))
    }

    fn get_application_config(&self, application: &str) -> Result<Operation, Error> {
        Ok(service_op("ServiceGet", application))
    }

    fn parse_application_config(&self, response: &Value) -> ApplicationConfig {
        let config = response
            .get("Config")
            .and_then(Value::as_object)
            .map(|cfg| {
                cfg.iter()
                    .map(|(k, v)| (k.clone(), v.get("value").cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .unwrap_or_default();
        ApplicationConfig {
            config,
            constraints: response.get("Constraints").cloned().unwrap_or(Value::Null),
            series: None,
        }
    }

    fn resolved(&self, unit_name: &str, retry: bool) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "Resolved")
            .with_params(json!({ "UnitName": unit_name, "Retry": retry })))
    }

    fn add_charm(&self, url: &str, macaroon: Option<&Value>) -> Result<Operation, Error> {
        Ok(match macaroon {
            Some(m) => Operation::new("Client", "AddCharmWithAuthorization")
                .with_params(json!({ "URL": url, "CharmStoreMacaroon": m })),
            None => Operation::new("Client", "AddCharm").with_params(json!({ "URL": url })),
        })
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
                machine.insert("Jobs".into(), json!(jobs));
                if let Some(series) = &spec.series {
                    machine.insert("Series".into(), json!(series));
                }
                if let Some(parent) = &spec.parent_id {
                    machine.insert("ParentId".into(), json!(parent));
                }
                if let Some(container) = &spec.container_type {
                    machine.insert("ContainerType".into(), json!(container));
                }
                if !spec.constraints.is_empty() {
                    machine.insert("Constraints".into(), json!(spec.constraints));
                }
                Value::Object(machine)
            })
            .collect();
        Ok(Operation::new("Client", "AddMachines").with_params(json!({ "MachineParams": params })))
    }

    fn parse_added_machines(&self, response: &Value) -> Vec<MachineOutcome> {
        response
            .get("Machines")
            .and_then(Value::as_array)
            .map(|machines| {
                machines
                    .iter()
                    .map(|m| {
                        let err = m.get("Error").filter(|e| !e.is_null());
                        MachineOutcome {
                            name: str_field(m, "Machine"),
                            err: err.and_then(|e| {
                                error_with_code(
                                    e.get("Message").and_then(Value::as_str),
                                    e.get("Code"),
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
            .with_params(json!({ "MachineNames": names, "Force": force })))
    }

    // ── Relations ───────────────────────────────────────────────────

    fn add_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "AddRelation")
            .with_params(json!({ "Endpoints": [endpoint_a, endpoint_b] })))
    }

    fn parse_relation_endpoints(&self, response: &Value) -> Vec<RelationEndpoint> {
        let Some(Value::Object(endpoints)) = response.get("Endpoints") else {
            return Vec::new();
        };
        endpoints
            .iter()
            .map(|(app, ep)| RelationEndpoint {
                application: app.clone(),
                name: str_field(ep, "Name").unwrap_or_default(),
                interface: str_field(ep, "Interface").unwrap_or_default(),
                scope: str_field(ep, "Scope").unwrap_or_default(),
                role: str_field(ep, "Role").unwrap_or_default(),
            })
            .collect()
    }

    fn destroy_relation(&self, endpoint_a: &str, endpoint_b: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "DestroyRelation")
            .with_params(json!({ "Endpoints": [endpoint_a, endpoint_b] })))
    }

    // ── Annotations ─────────────────────────────────────────────────

    fn annotation_tag(&self, entity: &str, kind: &str) -> String {
        let kind = if kind == "application" { "service" } else { kind };
        crate::params::entity_tag(kind, entity)
    }

    fn set_annotations(&self, tag: &str, pairs: &Map<String, Value>) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "SetAnnotations")
            .with_params(json!({ "Tag": tag, "Pairs": stringify_values(pairs) })))
    }

    fn set_annotations_error(&self, _response: &Value) -> Option<String> {
        None
    }

    fn get_annotations(&self, tag: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "GetAnnotations").with_params(json!({ "Tag": tag })))
    }

    fn parse_annotations(&self, response: &Value) -> Result<Map<String, Value>, String> {
        Ok(response
            .get("Annotations")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default())
    }

    // ── Models (environments) ───────────────────────────────────────

    fn model_info(&self, tags: &[String]) -> Result<Operation, Error> {
        if tags.len() > 1 {
            return Err(unsupported("Client", "EnvironmentInfo", &tags.join(",")));
        }
        Ok(Operation::new("Client", "EnvironmentInfo"))
    }

    fn parse_model_info(
        &self,
        response: &Value,
        tags: &[String],
    ) -> Result<Vec<ModelDetails>, String> {
        let uuid = str_field(response, "UUID");
        let controller_uuid = str_field(response, "ServerUUID");
        let life = str_field(response, "Life");
        let tag = tags
            .first()
            .cloned()
            .or_else(|| uuid.as_ref().map(|u| format!("environment-{u}")))
            .unwrap_or_default();
        Ok(vec![ModelDetails {
            tag,
            name: str_field(response, "Name").unwrap_or_default(),
            series: str_field(response, "DefaultSeries"),
            provider: str_field(response, "ProviderType"),
            is_alive: life.as_deref().is_none_or(|l| l == "alive"),
            is_admin: uuid.is_some() && uuid == controller_uuid,
            uuid,
            controller_uuid,
            owner_tag: str_field(response, "OwnerTag"),
            life,
            err: None,
        }])
    }

    fn model_get(&self) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "EnvironmentGet"))
    }

    fn parse_model_config(&self, response: &Value) -> Map<String, Value> {
        response
            .get("Config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn list_models(&self, user_tag: &str) -> Result<Operation, Error> {
        Ok(Operation::new("EnvironmentManager", "ListEnvironments")
            .with_params(json!({ "Tag": user_tag })))
    }

    fn parse_model_list(&self, response: &Value) -> Vec<ModelSummary> {
        response
            .get("UserEnvironments")
            .and_then(Value::as_array)
            .map(|envs| {
                envs.iter()
                    .map(|env| {
                        let uuid = str_field(env, "UUID").unwrap_or_default();
                        ModelSummary {
                            name: str_field(env, "Name").unwrap_or_default(),
                            owner: str_field(env, "OwnerTag").unwrap_or_default(),
                            tag: format!("environment-{uuid}"),
                            uuid,
                            last_connection: str_field(env, "LastConnection"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Charms and bundles ──────────────────────────────────────────

    fn charm_info(&self, url: &str) -> Result<Operation, Error> {
        Ok(Operation::new("Client", "CharmInfo").with_params(json!({ "CharmURL": url })))
    }

    fn parse_charm_info(&self, response: &Value) -> CharmDetails {
        let meta = response.get("Meta").unwrap_or(&Value::Null);
        let options = response
            .get("Config")
            .and_then(|c| c.get("Options"))
            .and_then(Value::as_object)
            .map(|opts| {
                opts.iter()
                    .map(|(k, v)| {
                        let option = CharmOption {
                            option_type: str_field(v, "Type"),
                            description: str_field(v, "Description"),
                            default: v.get("Default").cloned().unwrap_or(Value::Null),
                        };
                        (k.clone(), option)
                    })
                    .collect()
            })
            .unwrap_or_default();
        CharmDetails {
            url: str_field(response, "URL").unwrap_or_default(),
            revision: response.get("Revision").and_then(Value::as_i64),
            name: str_field(meta, "Name").unwrap_or_default(),
            summary: str_field(meta, "Summary"),
            description: str_field(meta, "Description"),
            subordinate: meta
                .get("Subordinate")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            min_juju_version: None,
            options,
            peers: charm_relations(meta.get("Peers")),
            provides: charm_relations(meta.get("Provides")),
            requires: charm_relations(meta.get("Requires")),
            tags: string_list(meta.get("Tags")),
            series: string_list(meta.get("Series")),
            terms: string_list(meta.get("Terms")),
            metrics: response.get("Metrics").cloned().unwrap_or(Value::Null),
        }
    }

    fn bundle_changes(&self, yaml: Option<&str>, token: Option<&str>) -> Result<Operation, Error> {
        let params = match (yaml, token) {
            (Some(yaml), _) => json!({ "YAML": yaml }),
            (None, Some(token)) => json!({ "Token": token }),
            (None, None) => return Err(unsupported("ChangeSet", "GetChanges", "")),
        };
        Ok(Operation::new("ChangeSet", "GetChanges").with_params(params))
    }

    fn parse_bundle_changes(&self, response: &RpcResponse) -> BundleChanges {
        let errors = match &response.error {
            Some(err) => vec![err.clone()],
            None => string_list(response.response.get("Errors")),
        };
        let changes = response
            .response
            .get("Changes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        BundleChanges { errors, changes }
    }
}
