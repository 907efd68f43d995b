use std::sync::Arc;

use jujulink_api::params::{AddUnitsRequest, DeployRequest, UpdateApplicationRequest};
use jujulink_api::protocol::ApplicationConfig;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::queue::QueuedOperation;
use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub err: Option<String>,
    pub application_name: String,
    pub charm_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddUnitsResult {
    pub err: Option<String>,
    pub application_name: String,
    pub num_units: u32,
    /// Names of the units the controller created.
    pub units: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveUnitsResult {
    pub err: Option<String>,
    pub unit_names: Vec<String>,
}

/// Result of an operation that names a single application (expose,
/// unexpose, destroy, set metric credentials).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationResult {
    pub err: Option<String>,
    pub application_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateApplicationResult {
    pub err: Option<String>,
    pub request: UpdateApplicationRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetConfigResult {
    pub err: Option<String>,
    pub application_name: String,
    pub new_values: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetCharmResult {
    pub err: Option<String>,
    pub application_name: String,
    pub charm_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationConfigResult {
    pub err: Option<String>,
    pub application_name: String,
    #[serde(flatten)]
    pub config: ApplicationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedResult {
    pub err: Option<String>,
    pub unit_name: String,
}

impl Session {
    // ── Deploy ───────────────────────────────────────────────────

    pub fn deploy_now(&self, request: DeployRequest) -> Reply<DeployResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.deploy(&request);
        self.call(built, move |resp| DeployResult {
            err: protocol.deploy_error(&resp),
            application_name: request.application_name,
            charm_url: request.charm_url,
        })
    }

    pub fn enqueue_deploy(&self, request: DeployRequest) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::Deploy(request))
    }

    // ── Units ────────────────────────────────────────────────────

    pub fn add_units_now(&self, request: AddUnitsRequest) -> Reply<AddUnitsResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.add_units(&request);
        self.call(built, move |resp| {
            let units = if resp.error.is_none() {
                protocol.parse_added_units(&resp.response)
            } else {
                Vec::new()
            };
            AddUnitsResult {
                err: resp.error,
                application_name: request.application_name,
                num_units: request.num_units,
                units,
            }
        })
    }

    pub fn enqueue_add_units(&self, request: AddUnitsRequest) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::AddUnits(request))
    }

    pub fn remove_units_now(&self, unit_names: Vec<String>) -> Reply<RemoveUnitsResult> {
        let built = self.protocol().destroy_units(&unit_names);
        self.call(built, move |resp| RemoveUnitsResult {
            err: resp.error,
            unit_names,
        })
    }

    pub fn enqueue_remove_units(&self, unit_names: Vec<String>) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::RemoveUnits(unit_names))
    }

    /// Mark a unit's error as resolved, optionally retrying the failed hook.
    pub fn resolved(&self, unit_name: &str, retry: bool) -> Reply<ResolvedResult> {
        let built = self.protocol().resolved(unit_name, retry);
        let unit_name = unit_name.to_owned();
        self.call(built, move |resp| ResolvedResult {
            err: resp.error,
            unit_name,
        })
    }

    // ── Expose / destroy ─────────────────────────────────────────

    pub fn expose_now(&self, application: &str) -> Reply<ApplicationResult> {
        let built = self.protocol().expose(application);
        self.application_call(built, application)
    }

    pub fn enqueue_expose(&self, application: &str) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::Expose(application.to_owned()))
    }

    pub fn unexpose_now(&self, application: &str) -> Reply<ApplicationResult> {
        let built = self.protocol().unexpose(application);
        self.application_call(built, application)
    }

    pub fn enqueue_unexpose(&self, application: &str) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::Unexpose(application.to_owned()))
    }

    pub fn destroy_application_now(&self, application: &str) -> Reply<ApplicationResult> {
        let built = self.protocol().destroy_application(application);
        self.application_call(built, application)
    }

    pub fn enqueue_destroy_application(&self, application: &str) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::DestroyApplication(application.to_owned()))
    }

    pub(crate) fn application_call(
        &self,
        built: Result<jujulink_api::Operation, jujulink_api::Error>,
        application: &str,
    ) -> Reply<ApplicationResult> {
        let application_name = application.to_owned();
        self.call(built, move |resp| ApplicationResult {
            err: resp.error,
            application_name,
        })
    }

    // ── Update / config / charm ──────────────────────────────────

    pub fn update_application_now(
        &self,
        request: UpdateApplicationRequest,
    ) -> Reply<UpdateApplicationResult> {
        let built = self.protocol().update_application(&request);
        self.call(built, move |resp| UpdateApplicationResult {
            err: resp.error,
            request,
        })
    }

    pub fn enqueue_update_application(
        &self,
        request: UpdateApplicationRequest,
    ) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::UpdateApplication(request))
    }

    /// Change application settings. Values are sent in string form.
    ///
    /// Refused for applications that so far only exist in the change-set
    /// queue; use [`enqueue_set_config`](Self::enqueue_set_config) there.
    pub fn set_config_now(
        &self,
        application: &str,
        config: Map<String, Value>,
    ) -> Reply<SetConfigResult> {
        if self.is_queued(application) {
            return Reply::failed(CoreError::ValidationFailed {
                message: "You cannot immediately set config on a queued application".into(),
            });
        }
        let request = UpdateApplicationRequest {
            application_name: application.to_owned(),
            settings: Some(config.clone()),
            ..UpdateApplicationRequest::default()
        };
        let built = self.protocol().update_application(&request);
        self.call(built, move |resp| SetConfigResult {
            err: resp.error,
            application_name: request.application_name,
            new_values: config,
        })
    }

    pub fn enqueue_set_config(
        &self,
        application: &str,
        config: Map<String, Value>,
    ) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::SetConfig {
            application: application.to_owned(),
            config,
        })
    }

    /// Upgrade (or crossgrade) an application's charm.
    pub fn set_charm(
        &self,
        application: &str,
        charm_url: &str,
        force_units: bool,
        force_series: bool,
    ) -> Reply<SetCharmResult> {
        let request = UpdateApplicationRequest {
            application_name: application.to_owned(),
            charm_url: Some(charm_url.to_owned()),
            force_units,
            force_series,
            ..UpdateApplicationRequest::default()
        };
        let built = self.protocol().update_application(&request);
        let charm_url = charm_url.to_owned();
        self.call(built, move |resp| SetCharmResult {
            err: resp.error,
            application_name: request.application_name,
            charm_url,
        })
    }

    pub fn get_application_config(&self, application: &str) -> Reply<ApplicationConfigResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.get_application_config(application);
        let application_name = application.to_owned();
        self.call(built, move |resp| {
            let config = if resp.error.is_none() {
                protocol.parse_application_config(&resp.response)
            } else {
                ApplicationConfig::default()
            };
            ApplicationConfigResult {
                err: resp.error,
                application_name,
                config,
            }
        })
    }
}
