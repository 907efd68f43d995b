use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::reply::Reply;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationResult {
    pub err: Option<String>,
    /// The entity tag the annotations belong to.
    pub entity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationsResult {
    pub err: Option<String>,
    pub entity: String,
    pub annotations: Map<String, Value>,
}

impl Session {
    /// Set annotations on `entity` of the given `kind` (`application`,
    /// `unit`, `machine`, `model`). Values are stored as strings.
    pub fn set_annotations(
        &self,
        entity: &str,
        kind: &str,
        pairs: &Map<String, Value>,
    ) -> Reply<AnnotationResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let tag = protocol.annotation_tag(entity, kind);
        let built = protocol.set_annotations(&tag, pairs);
        self.call(built, move |resp| AnnotationResult {
            err: resp
                .error
                .or_else(|| protocol.set_annotations_error(&resp.response)),
            entity: tag,
        })
    }

    /// Remove annotation keys; the controller deletes keys set to `""`.
    pub fn remove_annotations(
        &self,
        entity: &str,
        kind: &str,
        keys: &[String],
    ) -> Reply<AnnotationResult> {
        let pairs: Map<String, Value> = keys
            .iter()
            .map(|key| (key.clone(), Value::String(String::new())))
            .collect();
        self.set_annotations(entity, kind, &pairs)
    }

    pub fn get_annotations(&self, entity: &str, kind: &str) -> Reply<AnnotationsResult> {
        let protocol = Arc::clone(&self.inner.protocol);
        let tag = protocol.annotation_tag(entity, kind);
        let built = protocol.get_annotations(&tag);
        self.call(built, move |resp| {
            let parsed = match resp.error {
                Some(err) => Err(err),
                None => protocol.parse_annotations(&resp.response),
            };
            match parsed {
                Ok(annotations) => AnnotationsResult {
                    err: None,
                    entity: tag,
                    annotations,
                },
                Err(err) => AnnotationsResult {
                    err: Some(err),
                    entity: tag,
                    annotations: Map::new(),
                },
            }
        })
    }
}
