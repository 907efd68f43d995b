//! Domain operations.
//!
//! Each operation builds its payload through the session's [`Protocol`],
//! sends it, and resolves a [`Reply`](crate::Reply) with a result struct.
//! Server-reported failures land in the result's `err` field; only local
//! conditions (no queue attached, not authenticated, ...) surface as
//! [`CoreError`].
//!
//! Operations with deferrable side effects come in pairs: `*_now` sends
//! immediately, `enqueue_*` hands the request to the attached
//! [`ChangeSetQueue`](crate::ChangeSetQueue) and returns its key.
//!
//! [`Protocol`]: jujulink_api::Protocol

mod annotation;
mod application;
mod charm;
mod local_charm;
mod machine;
mod model;
mod offer;
mod relation;

pub use annotation::{AnnotationResult, AnnotationsResult};
pub use application::{
    AddUnitsResult, ApplicationConfigResult, ApplicationResult, DeployResult, RemoveUnitsResult,
    ResolvedResult, SetCharmResult, SetConfigResult, UpdateApplicationResult,
};
pub use charm::{AddCharmResult, CharmInfoResult};
pub use local_charm::UploadedCharm;
pub use machine::{AddMachinesResult, DestroyMachinesResult};
pub use model::{
    CreateModelResult, DestroyModelsResult, DestroyedModel, ModelConfigResult, ModelInfoResult,
    ModelListResult, ModelWithInfo,
};
pub use offer::{OfferListResult, OfferResult, SingleOfferResult};
pub use relation::{AddRelationResult, RelationInfo, RemoveRelationResult};

use tracing::debug;

use crate::error::CoreError;
use crate::queue::QueuedOperation;
use crate::session::Session;

/// The outcome of replaying one queued operation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedOutcome {
    AddCharm(AddCharmResult),
    Deploy(DeployResult),
    AddUnits(AddUnitsResult),
    RemoveUnits(RemoveUnitsResult),
    Application(ApplicationResult),
    SetConfig(SetConfigResult),
    UpdateApplication(UpdateApplicationResult),
    AddMachines(AddMachinesResult),
    DestroyMachines(DestroyMachinesResult),
    AddRelation(AddRelationResult),
    RemoveRelation(RemoveRelationResult),
}

impl QueuedOutcome {
    /// Server error carried by the wrapped result, if any.
    pub fn err(&self) -> Option<&str> {
        match self {
            Self::AddCharm(r) => r.err.as_deref(),
            Self::Deploy(r) => r.err.as_deref(),
            Self::AddUnits(r) => r.err.as_deref(),
            Self::RemoveUnits(r) => r.err.as_deref(),
            Self::Application(r) => r.err.as_deref(),
            Self::SetConfig(r) => r.err.as_deref(),
            Self::UpdateApplication(r) => r.err.as_deref(),
            Self::AddMachines(r) => r.err.as_deref(),
            Self::DestroyMachines(r) => r.err.as_deref(),
            Self::AddRelation(r) => r.err.as_deref(),
            Self::RemoveRelation(r) => r.err.as_deref(),
        }
    }
}

impl Session {
    /// Hand `op` to the attached change-set queue.
    pub(crate) fn enqueue(&self, op: QueuedOperation) -> Result<String, CoreError> {
        let queue = self.inner.queue.as_ref().ok_or(CoreError::NoChangeSetQueue)?;
        debug!(method = op.method(), "queueing operation");
        queue.enqueue(op)
    }

    /// Whether `key` only exists in the change-set queue.
    pub(crate) fn is_queued(&self, key: &str) -> bool {
        self.inner.queue.as_ref().is_some_and(|q| q.contains(key))
    }

    /// Execute a queued operation immediately, as the queue does on commit.
    pub async fn run_queued(&self, op: QueuedOperation) -> Result<QueuedOutcome, CoreError> {
        debug!(method = op.method(), "running queued operation");
        let outcome = match op {
            QueuedOperation::AddCharm { url, macaroon } => {
                QueuedOutcome::AddCharm(self.add_charm_now(&url, macaroon.as_ref()).await?)
            }
            QueuedOperation::Deploy(request) => {
                QueuedOutcome::Deploy(self.deploy_now(request).await?)
            }
            QueuedOperation::AddUnits(request) => {
                QueuedOutcome::AddUnits(self.add_units_now(request).await?)
            }
            QueuedOperation::RemoveUnits(names) => {
                QueuedOutcome::RemoveUnits(self.remove_units_now(names).await?)
            }
            QueuedOperation::Expose(application) => {
                QueuedOutcome::Application(self.expose_now(&application).await?)
            }
            QueuedOperation::Unexpose(application) => {
                QueuedOutcome::Application(self.unexpose_now(&application).await?)
            }
            QueuedOperation::SetConfig {
                application,
                config,
            } => QueuedOutcome::SetConfig(self.set_config_now(&application, config).await?),
            QueuedOperation::UpdateApplication(request) => {
                QueuedOutcome::UpdateApplication(self.update_application_now(request).await?)
            }
            QueuedOperation::DestroyApplication(application) => {
                QueuedOutcome::Application(self.destroy_application_now(&application).await?)
            }
            QueuedOperation::AddMachines(specs) => {
                QueuedOutcome::AddMachines(self.add_machines_now(specs).await?)
            }
            QueuedOperation::DestroyMachines { names, force } => {
                QueuedOutcome::DestroyMachines(self.destroy_machines_now(names, force).await?)
            }
            QueuedOperation::AddRelation(a, b) => {
                QueuedOutcome::AddRelation(self.add_relation_now(&a, &b).await?)
            }
            QueuedOperation::RemoveRelation(a, b) => {
                QueuedOutcome::RemoveRelation(self.remove_relation_now(&a, &b).await?)
            }
        };
        Ok(outcome)
    }
}
