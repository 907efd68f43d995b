//! Shared helpers for command handlers.

use std::future::Future;
use std::time::Duration;

use jujulink_core::{CoreError, ModelInfo, Session};

use crate::cli::GlobalOpts;
use crate::config::{self, Resolved};
use crate::error::CliError;

const MODEL_POLL: Duration = Duration::from_millis(50);

/// Await a controller call, bounded by `--timeout`.
pub async fn within<T>(
    global: &GlobalOpts,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CliError> {
    match tokio::time::timeout(Duration::from_secs(global.timeout), fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CliError::Timeout {
            seconds: global.timeout,
        }),
    }
}

/// Connect to the active profile's controller and log in.
pub async fn connect(global: &GlobalOpts) -> Result<(Session, Resolved), CliError> {
    let resolved = config::resolve(global)?;
    if resolved.session.credentials.is_none() {
        return Err(CliError::NoCredentials {
            profile: resolved.name,
        });
    }
    let session = open(global, &resolved).await?;
    within(global, session.login())
        .await
        .map_err(|e| e.for_profile(&resolved.name))?;
    Ok((session, resolved))
}

/// Open the WebSocket without logging in.
pub async fn open(global: &GlobalOpts, resolved: &Resolved) -> Result<Session, CliError> {
    within(global, Session::connect(resolved.session.clone())).await
}

/// Wait for the post-login bootstrap to learn the model details.
pub async fn wait_for_model(session: &Session, global: &GlobalOpts) -> Result<ModelInfo, CliError> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(global.timeout);
    loop {
        if let Some(info) = session.model_info() {
            return Ok(info);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CliError::Timeout {
                seconds: global.timeout,
            });
        }
        tokio::time::sleep(MODEL_POLL).await;
    }
}

/// Orderly shutdown, bounded by `--timeout`. Returns `false` when the
/// controller never acknowledged the teardown; the socket goes away with
/// the last session handle either way.
pub async fn close(session: &Session, global: &GlobalOpts) -> bool {
    let limit = Duration::from_secs(global.timeout);
    if tokio::time::timeout(limit, session.close()).await.is_ok() {
        return true;
    }
    tracing::warn!(seconds = global.timeout, "controller did not acknowledge shutdown");
    false
}

/// Turn a server-reported `err` field into a CLI error.
pub fn check(err: Option<String>) -> Result<(), CliError> {
    match err {
        Some(message) => Err(CliError::ApiError { message }),
        None => Ok(()),
    }
}

/// Strip the `user-` tag prefix for display.
pub fn untag(tag: &str) -> &str {
    tag.split_once('-').map_or(tag, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use jujulink_api::{Error, ReadyState, Transport};
    use jujulink_core::SessionConfig;
    use url::Url;

    use super::*;
    use crate::cli::Cli;

    /// Accepts every frame and never answers.
    struct SilentController;

    impl Transport for SilentController {
        fn ready_state(&self) -> ReadyState {
            ReadyState::Open
        }

        fn send(&self, _frame: String) -> Result<(), Error> {
            Ok(())
        }

        fn close(&self) {}
    }

    fn silent_session() -> Session {
        let url = Url::parse("wss://10.0.0.2:17070/model/5bea955d/api").unwrap();
        Session::builder(SessionConfig::new(url)).build(Arc::new(SilentController))
    }

    fn global(timeout: &str) -> GlobalOpts {
        Cli::try_parse_from(["jujulink", "--timeout", timeout, "models"])
            .unwrap()
            .global
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_watcher_is_immediate() {
        assert!(close(&silent_session(), &global("2")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn close_gives_up_when_teardown_is_never_acknowledged() {
        let session = silent_session();
        session.start_watching();
        assert!(!close(&session, &global("2")).await);
    }

    #[test]
    fn untag_strips_kind() {
        assert_eq!(untag("user-admin"), "admin");
        assert_eq!(untag("admin"), "admin");
        assert_eq!(untag("model-5bea-955d"), "5bea-955d");
    }

    #[test]
    fn server_errors_become_api_errors() {
        assert!(check(None).is_ok());
        let err = check(Some("application already exists".into())).unwrap_err();
        assert_eq!(err.to_string(), "Controller error: application already exists");
    }
}
