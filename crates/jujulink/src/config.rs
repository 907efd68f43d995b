//! CLI configuration: thin wrapper around `jujulink_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--controller, --model, --user, ...).

use jujulink_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use jujulink_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// A profile with CLI overrides applied, ready to connect.
#[derive(Debug)]
pub struct Resolved {
    pub name: String,
    pub profile: Profile,
    pub session: SessionConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Overlay CLI flags on a profile. Flags win over profile values.
pub fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref controller) = global.controller {
        profile.controller.clone_from(controller);
    }
    if let Some(ref model) = global.model {
        profile.model_uuid = Some(model.clone());
    }
    if let Some(ref user) = global.user {
        profile.username = Some(user.clone());
    }
    if let Some(protocol) = global.protocol {
        profile.protocol = protocol.into();
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    profile.timeout = Some(global.timeout);
    profile
}

/// The effective profile: the configured one, or one built from flags
/// alone when no profile exists and `--controller` was given.
pub fn effective_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);
    let base = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.controller.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };
    Ok((name, apply_overrides(base, global)))
}

/// Build the `SessionConfig` for the active profile.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = effective_profile(global, &cfg)?;
    let session = jujulink_config::profile_to_session_config(&profile, &name, &cfg.defaults)?;
    tracing::debug!(profile = %name, url = %session.url, generation = %session.protocol, "resolved profile");
    Ok(Resolved {
        name,
        profile,
        session,
    })
}
