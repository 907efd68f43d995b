use tabled::Tabled;

use jujulink_core::{OfferDetails, OfferRequest};

use crate::cli::{GlobalOpts, OffersArgs, OffersCommand};
use crate::commands::util::{self, within};
use crate::error::CliError;
use crate::output::{self, cell};

#[derive(Tabled)]
struct OfferRow {
    #[tabled(rename = "APPLICATION")]
    application: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "CHARM")]
    charm: String,
    #[tabled(rename = "ENDPOINTS")]
    endpoints: String,
}

fn endpoint_list(o: &OfferDetails) -> String {
    o.endpoints
        .iter()
        .map(|e| format!("{}:{}", e.name, e.interface))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_row(o: &OfferDetails) -> OfferRow {
    OfferRow {
        application: o.application_name.clone(),
        url: o.url.clone(),
        charm: cell(o.charm.as_deref()),
        endpoints: endpoint_list(o),
    }
}

fn detail(o: &OfferDetails) -> String {
    let mut lines = vec![
        format!("Offer:       {}", o.url),
        format!("Application: {}", o.application_name),
        format!("Charm:       {}", cell(o.charm.as_deref())),
    ];
    if let Some(ref description) = o.description {
        lines.push(format!("Description: {description}"));
    }
    lines.push("Endpoints:".into());
    for e in &o.endpoints {
        lines.push(format!("  {:<16} {:<16} {}", e.name, e.interface, e.role));
    }
    lines.join("\n")
}

pub async fn handle(args: OffersArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _) = util::connect(global).await?;

    let out = match args.command {
        OffersCommand::List => {
            let listed = within(global, session.list_offers()).await?;
            util::check(listed.err)?;
            output::render_list(&global.output, &listed.offers, to_row, |o| o.url.clone())?
        }

        OffersCommand::Show { url } => {
            let found = within(global, session.get_offer(&url)).await?;
            util::check(found.err)?;
            let offer = found.offer.ok_or_else(|| CliError::NotFound {
                resource_type: "offer".into(),
                identifier: url.clone(),
                list_command: "offers list".into(),
            })?;
            output::render_single(&global.output, &offer, detail, |o| o.url.clone())?
        }

        OffersCommand::Create {
            application,
            endpoints,
            url,
            description,
            allowed_users,
        } => {
            // The default offer URL needs the model name.
            util::wait_for_model(&session, global).await?;
            let request = OfferRequest {
                application_name: application,
                endpoints,
                url,
                description,
                allowed_users,
                ..OfferRequest::default()
            };
            let result = within(global, session.offer(request)).await?;
            util::check(result.err.clone())?;
            output::render_single(
                &global.output,
                &result,
                |r| format!("Offered {} as {}", r.endpoints.join(", "), r.url),
                |r| r.url.clone(),
            )?
        }
    };

    output::print_output(&out, global.quiet);
    util::close(&session, global).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use jujulink_core::OfferEndpoint;

    use super::*;

    fn offer() -> OfferDetails {
        OfferDetails {
            application_name: "mysql".into(),
            url: "local:/u/admin/default/mysql".into(),
            endpoints: vec![OfferEndpoint {
                name: "db".into(),
                interface: "mysql".into(),
                role: "provider".into(),
            }],
            ..OfferDetails::default()
        }
    }

    #[test]
    fn row_joins_endpoints() {
        let row = to_row(&offer());
        assert_eq!(row.endpoints, "db:mysql");
        assert_eq!(row.charm, "-");
    }

    #[test]
    fn detail_lists_each_endpoint() {
        let text = detail(&offer());
        assert!(text.starts_with("Offer:       local:/u/admin/default/mysql"));
        assert!(text.contains("db"));
        assert!(text.contains("provider"));
    }
}
