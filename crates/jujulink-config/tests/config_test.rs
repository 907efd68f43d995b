#![allow(clippy::unwrap_used)]

use std::path::Path;

use figment::providers::{Format, Toml};
use figment::{Figment, Jail};
use jujulink_config::{
    Config, ConfigError, Profile, figment as provider_stack, load_config_from, save_config_to,
};
use jujulink_core::ProtocolGeneration;
use pretty_assertions::assert_eq;

const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
output = "json"
timeout = 12

[profiles.lab]
controller = "10.0.0.2:17070"
model_uuid = "5bea955d"
username = "admin"

[profiles.old]
controller = "wss://10.0.0.9:17070"
model_uuid = "e1f2"
protocol = "legacy"
insecure = true
"#;

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn file_profiles_are_loaded() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", SAMPLE)?;
        let cfg = load_config_from(Path::new("config.toml")).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.ping_interval, 10);

        let (name, lab) = cfg.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(lab.protocol, ProtocolGeneration::Modern);

        let (_, old) = cfg.profile(Some("old")).unwrap();
        assert_eq!(old.protocol, ProtocolGeneration::Legacy);
        assert_eq!(
            old.api_url().unwrap().as_str(),
            "wss://10.0.0.9:17070/environment/e1f2/api"
        );
        Ok(())
    });
}

#[test]
fn env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", SAMPLE)?;
        jail.set_env("JUJULINK_DEFAULTS__OUTPUT", "yaml");
        jail.set_env("JUJULINK_PROFILES__LAB__MODEL_UUID", "ffff");

        let cfg: Config = provider_stack(Path::new("config.toml")).extract()?;
        assert_eq!(cfg.defaults.output, "yaml");
        assert_eq!(cfg.profiles["lab"].model_uuid.as_deref(), Some("ffff"));
        Ok(())
    });
}

#[test]
fn missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load_config_from(Path::new("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.output, "table");
        assert!(cfg.profiles.is_empty());
        Ok(())
    });
}

#[test]
fn unknown_profile_is_reported() {
    let cfg = Config::default();
    let err = cfg.profile(Some("nope")).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProfile { ref name } if name == "nope"));
}

// ── Saving ──────────────────────────────────────────────────────────

#[test]
fn saved_config_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.profiles.insert(
        "default".into(),
        Profile {
            controller: "ctrl.example:17070".into(),
            username: Some("bob".into()),
            protocol: ProtocolGeneration::Legacy,
            ..Profile::default()
        },
    );
    save_config_to(&cfg, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("protocol = \"legacy\""));

    let reloaded: Config = Figment::new()
        .merge(Toml::file(&path))
        .extract()
        .unwrap();
    let profile = &reloaded.profiles["default"];
    assert_eq!(profile.username.as_deref(), Some("bob"));
    assert_eq!(profile.protocol, ProtocolGeneration::Legacy);
}
