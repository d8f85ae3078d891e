//! Parley watchdog.
//!
//! Periodic scan over unpaused projects: a project whose oldest pending
//! message has been stuck longer than the stall timeout is paused with
//! code `stall`; a project idle longer than the idle timeout is paused
//! with code `idle`. The watchdog never touches message content - its
//! only write is the pause.

mod config;

use backend_client::BackendClient;
use tracing::{error, info, warn};

use crate::config::WatchdogConfig;

/// Why a project gets paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseReason {
    Stall,
    Idle,
}

impl PauseReason {
    fn code(self) -> &'static str {
        match self {
            PauseReason::Stall => "stall",
            PauseReason::Idle => "idle",
        }
    }

    fn message(self, seconds: i64) -> String {
        match self {
            PauseReason::Stall => format!(
                "Project stalled: oldest pending message stuck for {} seconds. Pausing.",
                seconds
            ),
            PauseReason::Idle => {
                format!("Project idle for {} seconds. Pausing.", seconds)
            }
        }
    }
}

/// Pure pause decision for one project. The stall check wins over the
/// idle check, matching the scan order.
fn decide(
    pending_age_seconds: Option<i64>,
    idle_seconds: i64,
    config: &WatchdogConfig,
) -> Option<(PauseReason, i64)> {
    if let Some(age) = pending_age_seconds {
        if age > config.stall_timeout.as_secs() as i64 {
            return Some((PauseReason::Stall, age));
        }
    }

    if idle_seconds > config.idle_timeout.as_secs() as i64 {
        return Some((PauseReason::Idle, idle_seconds));
    }

    None
}

/// One scan over all active projects. Per-project failures are logged and
/// never abort the rest of the scan.
async fn scan(api: &BackendClient, config: &WatchdogConfig) {
    let projects = match api.active_projects().await {
        Ok(projects) => projects,
        Err(err) => {
            error!(error = %err, "could not list active projects");
            return;
        }
    };

    if projects.is_empty() {
        info!("no active projects");
        return;
    }

    for project in projects {
        let pending_age = match api.oldest_pending(project.id).await {
            Ok(pending) => pending.map(|p| p.age_seconds),
            Err(err) => {
                warn!(project_id = project.id, error = %err, "stall check failed");
                continue;
            }
        };

        let Some((reason, seconds)) = decide(pending_age, project.idle_seconds, config) else {
            continue;
        };

        warn!(
            project_id = project.id,
            code = reason.code(),
            seconds,
            "pausing project"
        );
        if let Err(err) = api
            .pause_project(project.id, reason.code(), &reason.message(seconds))
            .await
        {
            warn!(project_id = project.id, error = %err, "pause failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = WatchdogConfig::from_env()?;
    let api = BackendClient::new(&config.backend_api_url, &config.brain_api_key)?;

    info!(
        interval_secs = config.interval.as_secs(),
        stall_secs = config.stall_timeout.as_secs(),
        idle_secs = config.idle_timeout.as_secs(),
        "watchdog started"
    );

    let mut ticker = tokio::time::interval(config.interval);
    loop {
        ticker.tick().await;
        scan(&api, &config).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> WatchdogConfig {
        WatchdogConfig {
            backend_api_url: String::new(),
            brain_api_key: String::new(),
            interval: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(90),
            idle_timeout: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_stuck_pending_message_stalls() {
        let config = test_config();
        assert_eq!(
            decide(Some(120), 0, &config),
            Some((PauseReason::Stall, 120))
        );
        assert_eq!(decide(Some(30), 0, &config), None);
    }

    #[test]
    fn test_idle_without_pending() {
        let config = test_config();
        assert_eq!(decide(None, 200, &config), Some((PauseReason::Idle, 200)));
        assert_eq!(decide(None, 30, &config), None);
    }

    #[test]
    fn test_stall_wins_over_idle() {
        let config = test_config();
        assert_eq!(
            decide(Some(120), 500, &config),
            Some((PauseReason::Stall, 120))
        );
    }

    #[test]
    fn test_boundary_is_strictly_greater() {
        let config = test_config();
        assert_eq!(decide(Some(90), 90, &config), None);
        assert_eq!(decide(Some(91), 0, &config), Some((PauseReason::Stall, 91)));
    }
}
