use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::services::SessionService;

const JOB_NAME: &str = "sweep_sessions";

/// Periodically deletes expired sessions.
pub struct SessionSweeper {
    sessions: Arc<dyn SessionService>,
    config: SessionConfig,
    running: Arc<RwLock<bool>>,
    /// Latched by [`stop`](Self::stop); a stop issued before `start` is kept.
    shutdown: watch::Sender<bool>,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<dyn SessionService>, config: SessionConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sessions,
            config,
            running: Arc::new(RwLock::new(false)),
            shutdown,
        }
    }

    /// Runs until [`stop`](Self::stop) is called. Returns immediately when
    /// neither a cron expression nor an interval is configured, or when the
    /// sweeper was already stopped.
    pub async fn start(&self) -> Result<()> {
        if self.config.sweep_cron.is_none() && self.config.sweep_interval_minutes == 0 {
            info!("Session sweeper is disabled in config");
            return Ok(());
        }

        if *self.shutdown.borrow() {
            info!("Session sweeper stopped before it started");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting session sweeper");

        let result = if let Some(cron_expr) = &self.config.sweep_cron {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        };

        *self.running.write().await = false;
        result
    }

    async fn wait_for_stop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        // The sender lives in `self`, so this only returns once stopped.
        shutdown.wait_for(|stopped| *stopped).await.ok();
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let sessions = Arc::clone(&self.sessions);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let sessions = Arc::clone(&sessions);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                sweep(sessions.as_ref()).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;
        info!("Session sweeper running with cron: {}", cron_expr);

        self.wait_for_stop().await;

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.sweep_interval_minutes.max(1);
        info!("Session sweeper running every {}m", interval_mins);

        let mut sweep_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let stop = self.wait_for_stop();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                () = &mut stop => break,
                _ = sweep_interval.tick() => sweep(self.sessions.as_ref()).await,
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping session sweeper...");
        self.shutdown.send_replace(true);
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn run_once(&self) -> Result<u64> {
        Ok(self.sessions.sweep_expired().await?)
    }
}

async fn sweep(sessions: &dyn SessionService) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = JOB_NAME, "Sweeping expired sessions");

    match sessions.sweep_expired().await {
        Ok(removed) => info!(
            event = "job_finished",
            job_name = JOB_NAME,
            removed,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Expired session sweep finished"
        ),
        Err(e) => error!(
            event = "job_failed",
            job_name = JOB_NAME,
            error = %e,
            "Expired session sweep failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::services::SeaOrmSessionService;

    async fn sessions(lifetime: chrono::Duration) -> (Store, Arc<dyn SessionService>) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let sessions: Arc<dyn SessionService> =
            Arc::new(SeaOrmSessionService::new(store.clone(), lifetime, 16));
        (store, sessions)
    }

    #[tokio::test]
    async fn test_disabled_sweeper_returns_immediately() {
        let (_store, sessions) = sessions(chrono::Duration::hours(1)).await;
        let config = SessionConfig {
            sweep_interval_minutes: 0,
            sweep_cron: None,
            ..SessionConfig::default()
        };

        let sweeper = SessionSweeper::new(sessions, config);
        sweeper.start().await.unwrap();
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_run_once_removes_expired() {
        let (store, sessions) = sessions(chrono::Duration::seconds(-1)).await;
        let user = store.create_user("sweep", "s@example.com", "h").await.unwrap();
        sessions.create_session(user.id).await.unwrap();
        sessions.create_session(user.id).await.unwrap();

        let sweeper = SessionSweeper::new(sessions, SessionConfig::default());
        assert_eq!(sweeper.run_once().await.unwrap(), 2);
        assert_eq!(sweeper.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interval_sweeper_stops() {
        let (_store, sessions) = sessions(chrono::Duration::hours(1)).await;
        let sweeper = Arc::new(SessionSweeper::new(sessions, SessionConfig::default()));

        let handle = {
            let sweeper = Arc::clone(&sweeper);
            tokio::spawn(async move { sweeper.start().await })
        };

        while !sweeper.is_running().await {
            tokio::task::yield_now().await;
        }
        sweeper.stop().await;

        handle.await.unwrap().unwrap();
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_not_lost() {
        let (_store, sessions) = sessions(chrono::Duration::hours(1)).await;
        let sweeper = SessionSweeper::new(sessions, SessionConfig::default());

        sweeper.stop().await;
        tokio::time::timeout(Duration::from_secs(5), sweeper.start())
            .await
            .expect("start should return after an earlier stop")
            .unwrap();
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test]
    async fn test_cron_sweeper_stops() {
        let (_store, sessions) = sessions(chrono::Duration::hours(1)).await;
        let config = SessionConfig {
            sweep_cron: Some("0 0 * * * *".to_string()),
            ..SessionConfig::default()
        };
        let sweeper = Arc::new(SessionSweeper::new(sessions, config));

        let handle = {
            let sweeper = Arc::clone(&sweeper);
            tokio::spawn(async move { sweeper.start().await })
        };

        while !sweeper.is_running().await {
            tokio::task::yield_now().await;
        }
        sweeper.stop().await;

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("cron sweeper should stop")
            .unwrap()
            .unwrap();
    }
}
