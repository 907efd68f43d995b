use std::sync::Arc;

use jujulink_api::params::{Endpoint, RelationEndpoint, relation_key};
use serde::Serialize;

use crate::error::CoreError;
use crate::queue::QueuedOperation;
use crate::reply::Reply;
use crate::session::Session;

/// A relation as the controller created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationInfo {
    pub endpoints: Vec<RelationEndpoint>,
    /// `"<requirer app:name> <provider app:name>"`.
    pub id: String,
    pub interface: String,
    pub scope: String,
}

impl RelationInfo {
    fn from_endpoints(endpoints: Vec<RelationEndpoint>) -> Self {
        let (interface, scope) = endpoints
            .first()
            .map(|ep| (ep.interface.clone(), ep.scope.clone()))
            .unwrap_or_default();
        Self {
            id: relation_key(&endpoints),
            interface,
            scope,
            endpoints,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddRelationResult {
    pub err: Option<String>,
    pub endpoint_a: String,
    pub endpoint_b: String,
    pub result: Option<RelationInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveRelationResult {
    pub err: Option<String>,
    pub endpoint_a: String,
    pub endpoint_b: String,
}

impl Session {
    pub fn add_relation_now(&self, a: &Endpoint, b: &Endpoint) -> Reply<AddRelationResult> {
        let (endpoint_a, endpoint_b) = (a.wire_name(), b.wire_name());
        let protocol = Arc::clone(&self.inner.protocol);
        let built = protocol.add_relation(&endpoint_a, &endpoint_b);
        self.call(built, move |resp| {
            let result = match resp.error {
                Some(_) => None,
                None => Some(RelationInfo::from_endpoints(
                    protocol.parse_relation_endpoints(&resp.response),
                )),
            };
            AddRelationResult {
                err: resp.error,
                endpoint_a,
                endpoint_b,
                result,
            }
        })
    }

    pub fn enqueue_add_relation(&self, a: Endpoint, b: Endpoint) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::AddRelation(a, b))
    }

    pub fn remove_relation_now(&self, a: &Endpoint, b: &Endpoint) -> Reply<RemoveRelationResult> {
        let (endpoint_a, endpoint_b) = (a.wire_name(), b.wire_name());
        let built = self.protocol().destroy_relation(&endpoint_a, &endpoint_b);
        self.call(built, move |resp| RemoveRelationResult {
            err: resp.error,
            endpoint_a,
            endpoint_b,
        })
    }

    pub fn enqueue_remove_relation(&self, a: Endpoint, b: Endpoint) -> Result<String, CoreError> {
        self.enqueue(QueuedOperation::RemoveRelation(a, b))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn endpoint(application: &str, name: &str, role: &str) -> RelationEndpoint {
        RelationEndpoint {
            application: application.into(),
            name: name.into(),
            interface: "mysql".into(),
            scope: "global".into(),
            role: role.into(),
        }
    }

    #[test]
    fn relation_info_takes_interface_from_first_endpoint() {
        let info = RelationInfo::from_endpoints(vec![
            endpoint("mysql", "db", "provider"),
            endpoint("wordpress", "db", "requirer"),
        ]);
        assert_eq!(info.id, "wordpress:db mysql:db");
        assert_eq!(info.interface, "mysql");
        assert_eq!(info.scope, "global");
    }

    #[test]
    fn empty_endpoint_list_yields_blank_info() {
        let info = RelationInfo::from_endpoints(Vec::new());
        assert_eq!(info.id, " ");
        assert!(info.interface.is_empty());
    }
}
