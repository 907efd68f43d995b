use futures_util::StreamExt;
use serde_json::Value;

use jujulink_core::{DeltaRecord, SessionEvent};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::commands::util::{self, within};
use crate::error::CliError;
use crate::output;

/// Fields that identify an entity, in lookup order.
const ID_FIELDS: &[&str] = &["name", "key", "id", "tag", "application-name", "Name", "Key", "Id"];

fn normalize_kind(kind: &str) -> String {
    kind.to_ascii_lowercase().replace(['-', '_'], "")
}

fn entity_id(entity: &Value) -> String {
    ID_FIELDS
        .iter()
        .find_map(|field| match entity.get(*field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "-".into())
}

fn keep(record: &DeltaRecord, kinds: &[String]) -> bool {
    kinds.is_empty() || kinds.iter().any(|k| normalize_kind(k) == record.kind.as_str())
}

fn render_record(
    record: &DeltaRecord,
    format: &OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let op = format!("{:<7}", record.op.as_str());
            Ok(format!(
                "{} {:<18} {}",
                output::status(&op, !record.op.is_remove(), color),
                record.kind.as_str(),
                entity_id(&record.entity)
            ))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(record, true),
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(record)?)),
        OutputFormat::Plain => Ok(format!(
            "{} {} {}",
            record.kind.as_str(),
            record.op.as_str(),
            entity_id(&record.entity)
        )),
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, resolved) = util::connect(global).await?;
    let mut events = session.events();
    let color = output::should_color(&global.color);
    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!(
            "{}",
            output::dim(
                &format!("watching {} (ctrl-c to stop)", resolved.session.url),
                color
            )
        );
    }

    let mut seen = 0usize;
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => event,
        };
        match event {
            Some(SessionEvent::Deltas(batch)) => {
                for record in batch.iter().filter(|r| keep(r, &args.kinds)) {
                    output::print_output(&render_record(record, &global.output, color)?, global.quiet);
                }
                seen += 1;
                if args.batches.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            Some(SessionEvent::LoginCompleted { .. }) => {}
            None => return Err(CliError::Disconnected),
        }
    }

    tracing::debug!(batches = seen, "stopping watcher");
    within(global, session.stop_watching()).await?;
    util::close(&session, global).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use jujulink_core::{DeltaOp, EntityKind};
    use serde_json::json;

    use super::*;

    fn record(kind: EntityKind, op: DeltaOp, entity: Value) -> DeltaRecord {
        DeltaRecord { kind, op, entity }
    }

    #[test]
    fn entity_id_prefers_name() {
        assert_eq!(entity_id(&json!({"name": "mysql", "id": "1"})), "mysql");
        assert_eq!(entity_id(&json!({"id": 3})), "3");
        assert_eq!(entity_id(&json!({"Name": "legacy"})), "legacy");
        assert_eq!(entity_id(&json!({})), "-");
    }

    #[test]
    fn kind_filter_ignores_dashes() {
        let r = record(EntityKind::RemoteApplication, DeltaOp::Change, json!({}));
        assert!(keep(&r, &["remote-application".into()]));
        assert!(!keep(&r, &["unit".into()]));
        assert!(keep(&r, &[]));
    }

    #[test]
    fn plain_line_is_kind_op_id() {
        let r = record(EntityKind::Unit, DeltaOp::Remove, json!({"name": "mysql/0"}));
        let line = render_record(&r, &OutputFormat::Plain, false).unwrap();
        assert_eq!(line, "unit remove mysql/0");
    }

    #[test]
    fn json_line_is_compact() {
        let r = record(EntityKind::Machine, DeltaOp::Change, json!({"id": "0"}));
        let line = render_record(&r, &OutputFormat::Json, false).unwrap();
        assert_eq!(line, r#"{"kind":"machine","op":"change","entity":{"id":"0"}}"#);
    }
}
