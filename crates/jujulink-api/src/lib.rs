// jujulink-api: Async Rust client for the Juju controller API (modern + legacy RPC)

pub mod delta;
pub mod error;
pub mod facade;
pub mod http;
pub mod params;
pub mod protocol;
pub mod rpc;
pub mod transport;
pub mod websocket;

pub use delta::{DeltaOp, DeltaRecord, EntityKind};
pub use error::Error;
pub use facade::FacadeTable;
pub use protocol::{LegacyProtocol, ModernProtocol, Protocol, ProtocolGeneration};
pub use rpc::{Multiplexer, Operation, ResponseHandler, RpcResponse};
pub use transport::{ReadyState, Transport};
