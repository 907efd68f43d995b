use std::sync::Arc;

use jujulink_api::protocol::{BundleChanges, CharmDetails};
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::ops::ApplicationResult;
use crate::queue::QueuedOperation;
use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddCharmResult {
    pub err: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharmInfoResult {
    pub err: Option<String>,
    pub charm: Option<CharmDetails>,
}

impl Session {
    /// Make a store charm available to the model. With a macaroon the
    /// authorized variant is used.
    pub fn add_charm_now(&self, url: &str, macaroon: Option<&Value>) -> Reply<AddCharmResult> {
        let built = self.protocol().add_charm(url, macaroon);
        let url = url.to_owned();
        self.call(built, move |resp| AddCharmResult {
            err: resp.error,
            url,
        })
    }

    pub fn enqueue_add_charm(
        &self,
        url: &str,
        macaroon: Option<Value>,
    ) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::AddCharm {
            url: url.to_owned(),
            macaroon,
        })
    }

    pub fn charm_info(&self, url: &str) -> Reply<CharmInfoResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.charm_info(url);
        self.call(built, move |resp| match resp.error {
            Some(err) => CharmInfoResult {
                err: Some(err),
                charm: None,
            },
            None => CharmInfoResult {
                err: None,
                charm: Some(protocol.parse_charm_info(&resp.response)),
            },
        })
    }

    /// Ask the controller how to deploy a bundle, from its YAML or (legacy
    /// only) from a previously uploaded change-set token.
    pub fn bundle_changes(&self, yaml: Option<&str>, token: Option<&str>) -> Reply<BundleChanges> {
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.bundle_changes(yaml, token);
        self.call(built, move |resp| protocol.parse_bundle_changes(&resp))
    }

    pub fn set_metric_credentials(
        &self,
        application: &str,
        macaroon: &Value,
    ) -> Reply<ApplicationResult> {
        let built = self.protocol().set_metric_credentials(application, macaroon);
        self.application_call(built, application)
    }
}
