use secrecy::SecretString;
use serde::Serialize;

use jujulink_core::{Credentials, FacadeTable, ProtocolGeneration};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::commands::util::{self, untag, within};
use crate::config::{self, Resolved};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct LoginSummary {
    profile: String,
    controller: String,
    user: Option<String>,
    model: Option<String>,
    generation: ProtocolGeneration,
    read_only: bool,
    facades: usize,
}

fn detail(s: &LoginSummary) -> String {
    let mut lines = vec![format!(
        "Logged in to {} as {}",
        s.controller,
        s.user.as_deref().unwrap_or("(token)")
    )];
    if let Some(ref model) = s.model {
        lines.push(format!("Model:    {model}"));
    }
    lines.push(format!("Protocol: {}", s.generation));
    lines.push(format!("Facades:  {}", s.facades));
    if s.read_only {
        lines.push("Access:   read-only".into());
    }
    lines.join("\n")
}

pub async fn handle(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let (name, profile) = config::effective_profile(global, &cfg)?;
    let mut session_config =
        jujulink_config::profile_to_session_config(&profile, &name, &cfg.defaults)?;

    let mut prompted = None;
    if args.token.is_none()
        && !session_config
            .credentials
            .as_ref()
            .is_some_and(Credentials::is_complete_password)
    {
        let user = profile.username.clone().ok_or_else(|| CliError::Validation {
            field: "user".into(),
            reason: "pass --user or set username in the profile".into(),
        })?;
        let password = rpassword::prompt_password(format!("Password for {user}: "))?;
        session_config.credentials = Some(Credentials::password(user, password.clone()));
        prompted = Some(SecretString::from(password));
    }

    let resolved = Resolved {
        name,
        profile,
        session: session_config,
    };
    let session = util::open(global, &resolved).await?;
    let login = match args.token {
        Some(ref token) => within(global, session.token_login(token)).await,
        None => within(global, session.login()).await,
    };
    login.map_err(|e| e.for_profile(&resolved.name))?;
    tracing::info!(profile = %resolved.name, "login succeeded");

    if args.save {
        save_profile(&resolved, prompted.as_ref())?;
    }

    let model = util::wait_for_model(&session, global)
        .await
        .ok()
        .map(|m| m.name);
    let summary = LoginSummary {
        profile: resolved.name.clone(),
        controller: resolved.session.url.to_string(),
        user: session
            .credentials()
            .and_then(|c| c.user().map(|u| untag(u).to_owned())),
        model,
        generation: session.generation(),
        read_only: session.read_only(),
        facades: session.facades().as_ref().map_or(0, FacadeTable::len),
    };
    let out = output::render_single(&global.output, &summary, detail, |s| s.profile.clone())?;
    output::print_output(&out, global.quiet);

    util::close(&session, global).await;
    Ok(())
}

/// Persist the profile (without its password) and keep the password in the keyring.
fn save_profile(resolved: &Resolved, password: Option<&SecretString>) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let mut saved = resolved.profile.clone();
    saved.password = None;
    saved.timeout = cfg.profiles.get(&resolved.name).and_then(|p| p.timeout);
    cfg.profiles.insert(resolved.name.clone(), saved);
    if cfg.default_profile.is_none() {
        cfg.default_profile = Some(resolved.name.clone());
    }
    config::save_config(&cfg)?;

    if let Some(password) = password {
        jujulink_config::store_password(&resolved.name, password)?;
    }
    tracing::debug!(profile = %resolved.name, "profile saved");
    Ok(())
}
