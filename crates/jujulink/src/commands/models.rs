use chrono::{DateTime, Utc};
use tabled::Tabled;

use jujulink_core::ops::ModelWithInfo;

use crate::cli::GlobalOpts;
use crate::commands::util::{self, untag, within};
use crate::error::CliError;
use crate::output::{self, cell};

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "OWNER")]
    owner: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "PROVIDER")]
    provider: String,
    #[tabled(rename = "SERIES")]
    series: String,
    #[tabled(rename = "LIFE")]
    life: String,
    #[tabled(rename = "LAST CONNECTION")]
    last_connection: String,
}

/// RFC 3339 timestamps shortened for the table; anything else verbatim.
fn format_time(raw: Option<&str>) -> String {
    match raw {
        None => "never".into(),
        Some(s) => DateTime::parse_from_rfc3339(s).map_or_else(
            |_| s.to_owned(),
            |t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string(),
        ),
    }
}

fn to_row(m: &ModelWithInfo) -> ModelRow {
    let d = &m.details;
    ModelRow {
        name: d.name.clone(),
        owner: cell(d.owner_tag.as_deref().map(untag)),
        uuid: cell(d.uuid.as_deref()),
        provider: cell(d.provider.as_deref()),
        series: cell(d.series.as_deref()),
        life: match d.err {
            Some(ref err) => format!("error: {err}"),
            None => cell(d.life.as_deref()),
        },
        last_connection: format_time(m.last_connection.as_deref()),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _) = util::connect(global).await?;
    let models = within(global, session.list_models_with_info()).await?;
    tracing::debug!(count = models.len(), "listed models");

    let out = output::render_list(&global.output, &models, to_row, |m| m.details.name.clone())?;
    output::print_output(&out, global.quiet);
    util::close(&session, global).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use jujulink_core::ModelDetails;

    use super::*;

    #[test]
    fn timestamps_are_shortened() {
        assert_eq!(
            format_time(Some("2017-01-12T16:04:24.587Z")),
            "2017-01-12 16:04 UTC"
        );
        assert_eq!(format_time(Some("yesterday")), "yesterday");
        assert_eq!(format_time(None), "never");
    }

    #[test]
    fn failed_model_shows_error_in_life_column() {
        let row = to_row(&ModelWithInfo {
            details: ModelDetails {
                name: "broken".into(),
                owner_tag: Some("user-admin".into()),
                err: Some("permission denied".into()),
                ..ModelDetails::default()
            },
            last_connection: None,
        });
        assert_eq!(row.owner, "admin");
        assert_eq!(row.life, "error: permission denied");
        assert_eq!(row.uuid, "-");
    }
}
