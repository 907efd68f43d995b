//! Config subcommand handlers. None of these touch a controller.

use serde::Serialize;
use tabled::Tabled;

use jujulink_core::ProtocolGeneration;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, cell};

const MASK: &str = "****";

#[derive(Debug, Serialize)]
struct ProfileEntry {
    name: String,
    default: bool,
    controller: String,
    model_uuid: Option<String>,
    protocol: ProtocolGeneration,
    username: Option<String>,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "CONTROLLER")]
    controller: String,
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "PROTOCOL")]
    protocol: String,
    #[tabled(rename = "USER")]
    user: String,
}

fn to_row(e: &ProfileEntry) -> ProfileRow {
    ProfileRow {
        marker: if e.default { "*" } else { "" },
        name: e.name.clone(),
        controller: e.controller.clone(),
        model: cell(e.model_uuid.as_deref()),
        protocol: e.protocol.to_string(),
        user: cell(e.username.as_deref()),
    }
}

/// Mask plaintext passwords before display.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    cfg
}

fn entries(cfg: &Config) -> Vec<ProfileEntry> {
    let mut entries: Vec<ProfileEntry> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileEntry {
            name: name.clone(),
            default: cfg.default_profile.as_deref() == Some(name.as_str()),
            controller: p.controller.clone(),
            model_uuid: p.model_uuid.clone(),
            protocol: p.protocol,
            username: p.username.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(config::load_config_or_default());
            toml::to_string_pretty(&cfg).map_err(|e| CliError::Render(e.to_string()))?
        }
        ConfigCommand::Path => config::config_path().display().to_string(),
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            output::render_list(&global.output, &entries(&cfg), to_row, |e| e.name.clone())?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
