use std::sync::Arc;

use jujulink_api::params::MachineSpec;
use jujulink_api::protocol::MachineOutcome;
use serde::Serialize;

use crate::error::CoreError;
use crate::queue::QueuedOperation;
use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddMachinesResult {
    pub err: Option<String>,
    /// One entry per requested machine, in request order.
    pub machines: Vec<MachineOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestroyMachinesResult {
    pub err: Option<String>,
    pub names: Vec<String>,
}

impl Session {
    /// Add machines or containers. An empty batch sends nothing.
    pub fn add_machines_now(&self, specs: Vec<MachineSpec>) -> Reply<AddMachinesResult> {
        if specs.is_empty() {
            return Reply::ready(AddMachinesResult::default());
        }
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.add_machines(&specs);
        self.call(built, move |resp| match resp.error {
            Some(err) => AddMachinesResult {
                err: Some(err),
                machines: Vec::new(),
            },
            None => AddMachinesResult {
                err: None,
                machines: protocol.parse_added_machines(&resp.response),
            },
        })
    }

    pub fn enqueue_add_machines(&self, specs: Vec<MachineSpec>) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::AddMachines(specs))
    }

    /// Destroy machines, optionally forcing removal of their units. An
    /// empty batch sends nothing.
    pub fn destroy_machines_now(
        &self,
        names: Vec<String>,
        force: bool,
    ) -> Reply<DestroyMachinesResult> {
        if names.is_empty() {
            return Reply::ready(DestroyMachinesResult::default());
        }
        let built = self.protocol().destroy_machines(&names, force);
        self.call(built, move |resp| DestroyMachinesResult {
            err: resp.error,
            names,
        })
    }

    pub fn enqueue_destroy_machines(
        &self,
        names: Vec<String>,
        force: bool,
    ) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::DestroyMachines { names, force })
    }
}
