// Batch ordering for mega-watcher deltas.
//
// Entities are applied in dependency order: applications before the
// relations and units that refer to them, machines after units. Removals
// sort ahead of every change so that dependants are torn down first.

use jujulink_api::DeltaRecord;

/// Sort key: known kinds by (negated-on-remove) priority, unknown kinds last.
fn order_key(record: &DeltaRecord) -> (u8, i32) {
    match record.kind.priority() {
        Some(priority) if record.op.is_remove() => (0, -priority),
        Some(priority) => (0, priority),
        None => (1, 0),
    }
}

/// Order a batch in place. The sort is stable: records with equal keys
/// keep their arrival order.
pub fn sort_deltas(batch: &mut [DeltaRecord]) {
    batch.sort_by_key(order_key);
}

#[cfg(test)]
mod tests {
    use jujulink_api::{DeltaOp, EntityKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn record(kind: EntityKind, op: DeltaOp, id: &str) -> DeltaRecord {
        DeltaRecord {
            kind,
            op,
            entity: json!({ "id": id }),
        }
    }

    fn ids(batch: &[DeltaRecord]) -> Vec<&str> {
        batch
            .iter()
            .map(|r| r.entity["id"].as_str().unwrap_or_default())
            .collect()
    }

    #[test]
    fn changes_follow_dependency_order() {
        let mut batch = vec![
            record(EntityKind::Machine, DeltaOp::Change, "m"),
            record(EntityKind::Unit, DeltaOp::Change, "u"),
            record(EntityKind::Relation, DeltaOp::Change, "r"),
            record(EntityKind::Application, DeltaOp::Change, "a"),
            record(EntityKind::Annotation, DeltaOp::Change, "n"),
        ];
        sort_deltas(&mut batch);
        assert_eq!(ids(&batch), ["a", "r", "u", "m", "n"]);
    }

    #[test]
    fn mixed_batch_puts_removals_first_and_unknown_last() {
        let mut batch = vec![
            record(EntityKind::Other("action".into()), DeltaOp::Change, "x"),
            record(EntityKind::Unit, DeltaOp::Change, "u1"),
            record(EntityKind::Application, DeltaOp::Remove, "a-gone"),
            record(EntityKind::Machine, DeltaOp::Remove, "m-gone"),
            record(EntityKind::RemoteApplication, DeltaOp::Change, "remote"),
            record(EntityKind::Application, DeltaOp::Change, "a1"),
            record(EntityKind::Unit, DeltaOp::Change, "u2"),
        ];
        sort_deltas(&mut batch);
        assert_eq!(
            ids(&batch),
            ["m-gone", "a-gone", "a1", "u1", "u2", "remote", "x"]
        );
    }

    #[test]
    fn unknown_ops_sort_like_changes() {
        let mut batch = vec![
            record(EntityKind::Unit, DeltaOp::Other("refresh".into()), "u"),
            record(EntityKind::Application, DeltaOp::Change, "a"),
        ];
        sort_deltas(&mut batch);
        assert_eq!(ids(&batch), ["a", "u"]);
    }
}
