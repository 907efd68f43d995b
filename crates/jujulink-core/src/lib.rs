// jujulink-core: Controller session, change stream and domain operations on top of jujulink-api.

pub mod config;
pub mod delta;
pub mod error;
pub mod event;
pub mod ops;
pub mod queue;
pub mod reply;
pub mod session;
mod watcher;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credentials, SessionConfig, TlsVerification};
pub use delta::sort_deltas;
pub use error::CoreError;
pub use event::{EventStream, SessionEvent};
pub use ops::QueuedOutcome;
pub use queue::{ChangeSetQueue, QueuedOperation};
pub use reply::Reply;
pub use session::{
    AuthState, DischargeCallback, Discharger, ModelInfo, Session, SessionBuilder,
};

// Wire-level types callers need to build requests and read deltas.
pub use jujulink_api::http::ProgressFn;
pub use jujulink_api::params::{
    AddUnitsRequest, DeployRequest, Endpoint, MachineSpec, OfferRequest, RawConstraints,
    UpdateApplicationRequest, prepare_constraints,
};
pub use jujulink_api::protocol::{ModelDetails, OfferDetails, OfferEndpoint};
pub use jujulink_api::{DeltaOp, DeltaRecord, EntityKind, FacadeTable, ProtocolGeneration};
