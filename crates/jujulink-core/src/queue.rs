// ── Change-set queue seam ──
//
// Deferrable operations can be handed to an external change-set queue
// instead of being sent immediately. The queue owns batching, ordering
// and commit; this crate only produces the records and, on commit,
// executes them through `Session::run_queued`.

use jujulink_api::params::{
    AddUnitsRequest, DeployRequest, Endpoint, MachineSpec, UpdateApplicationRequest,
};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A deferred operation, with the arguments of its immediate counterpart.
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum QueuedOperation {
    AddCharm {
        url: String,
        macaroon: Option<Value>,
    },
    Deploy(DeployRequest),
    AddUnits(AddUnitsRequest),
    RemoveUnits(Vec<String>),
    Expose(String),
    Unexpose(String),
    SetConfig {
        application: String,
        config: Map<String, Value>,
    },
    UpdateApplication(UpdateApplicationRequest),
    DestroyApplication(String),
    AddMachines(Vec<MachineSpec>),
    DestroyMachines {
        names: Vec<String>,
        force: bool,
    },
    AddRelation(Endpoint, Endpoint),
    RemoveRelation(Endpoint, Endpoint),
}

impl QueuedOperation {
    /// Short method name, e.g. `"deploy"` or `"add_relation"`.
    pub fn method(&self) -> &'static str {
        self.into()
    }
}

/// External collaborator that batches deferred operations.
pub trait ChangeSetQueue: Send + Sync {
    /// Record `op`; returns the key under which it was queued.
    fn enqueue(&self, op: QueuedOperation) -> Result<String, CoreError>;

    /// Whether `key` names an entity that only exists in the queue
    /// (e.g. an application that has not been deployed yet).
    fn contains(&self, key: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_snake_case() {
        assert_eq!(QueuedOperation::Expose("django".into()).method(), "expose");
        assert_eq!(
            QueuedOperation::DestroyMachines {
                names: vec!["1".into()],
                force: false
            }
            .method(),
            "destroy_machines"
        );
    }
}
