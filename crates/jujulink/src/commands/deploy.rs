use std::sync::Arc;

use bytes::Bytes;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};

use jujulink_core::{DeployRequest, ProgressFn, RawConstraints, Session, prepare_constraints};

use crate::cli::{DeployArgs, GlobalOpts};
use crate::commands::util::{self, within};
use crate::error::CliError;
use crate::output;

const UPLOAD_TEMPLATE: &str = "{spinner} uploading [{bar:40}] {bytes}/{total_bytes}";

/// Application name implied by a charm URL: `cs:xenial/mysql-55` gives `mysql`.
fn charm_name(url: &str) -> String {
    let tail = url.rsplit('/').next().unwrap_or(url);
    let tail = tail.rsplit(':').next().unwrap_or(tail);
    match tail.rsplit_once('-') {
        Some((name, rev)) if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) => {
            name.to_owned()
        }
        _ => tail.to_owned(),
    }
}

/// `KEY=VALUE` pairs; booleans and integers keep their type.
fn parse_config(pairs: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut config = Map::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| CliError::Validation {
            field: "config".into(),
            reason: format!("expected KEY=VALUE, got '{pair}'"),
        })?;
        let value = match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw
                .parse::<i64>()
                .map_or_else(|_| Value::String(raw.to_owned()), Value::from),
        };
        config.insert(key.to_owned(), value);
    }
    Ok(config)
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(UPLOAD_TEMPLATE) {
        bar.set_style(style);
    }
    bar
}

/// Upload a zipped charm and return the URL the controller assigned.
async fn upload(
    session: &Session,
    args: &DeployArgs,
    global: &GlobalOpts,
) -> Result<Option<String>, CliError> {
    let Some(ref path) = args.archive else {
        return Ok(None);
    };
    let series = args.series.as_deref().unwrap_or_default();
    let archive = tokio::fs::read(path).await?;
    tracing::debug!(path = %path.display(), size = archive.len(), "read charm archive");

    let bar = progress_bar(global.quiet);
    let progress: ProgressFn = {
        let bar = bar.clone();
        Arc::new(move |sent, total| {
            if let Some(total) = total {
                bar.set_length(total);
            }
            bar.set_position(sent);
        })
    };
    let uploaded = session
        .upload_local_charm(Bytes::from(archive), series, Some(progress))
        .await;
    bar.finish_and_clear();
    Ok(Some(uploaded?.charm_url))
}

pub async fn handle(args: DeployArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _) = util::connect(global).await?;

    let charm_url = match upload(&session, &args, global).await? {
        Some(url) => url,
        None => {
            let url = args.charm.clone().ok_or_else(|| CliError::Validation {
                field: "charm".into(),
                reason: "a charm URL or --archive is required".into(),
            })?;
            let added = within(global, session.add_charm_now(&url, None)).await?;
            util::check(added.err)?;
            url
        }
    };

    let request = DeployRequest {
        application_name: args
            .application
            .clone()
            .unwrap_or_else(|| charm_name(&charm_url)),
        charm_url,
        series: args.series.clone(),
        config: parse_config(&args.config)?,
        config_yaml: None,
        num_units: args.num_units,
        constraints: args
            .constraints
            .as_deref()
            .map(|c| prepare_constraints(&RawConstraints::from(c)))
            .unwrap_or_default(),
        to_machine: args.to.clone(),
    };
    tracing::info!(application = %request.application_name, charm = %request.charm_url, "deploying");

    let result = within(global, session.deploy_now(request)).await?;
    util::check(result.err.clone())?;

    let out = output::render_single(
        &global.output,
        &result,
        |r| format!("Deployed {} from {}", r.application_name, r.charm_url),
        |r| r.application_name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    util::close(&session, global).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charm_name_drops_series_and_revision() {
        assert_eq!(charm_name("cs:xenial/mysql-55"), "mysql");
        assert_eq!(charm_name("cs:haproxy"), "haproxy");
        assert_eq!(charm_name("local:trusty/django-0"), "django");
        assert_eq!(charm_name("cs:~user/xenial/my-app"), "my-app");
    }

    #[test]
    fn config_values_keep_simple_types() {
        let config = parse_config(&[
            "port=8080".into(),
            "debug=true".into(),
            "name=blog".into(),
        ])
        .unwrap();
        assert_eq!(config["port"], Value::from(8080));
        assert_eq!(config["debug"], Value::Bool(true));
        assert_eq!(config["name"], Value::String("blog".into()));
    }

    #[test]
    fn config_without_equals_is_rejected() {
        assert!(matches!(
            parse_config(&["oops".into()]),
            Err(CliError::Validation { .. })
        ));
    }
}
