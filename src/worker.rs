//! Background worker: cron-driven proactive runs.
//!
//! Three fixed jobs (morning digest, afternoon digest, staleness check) fire
//! on schedules from config. A due job inside quiet hours is skipped, not
//! deferred; it fires again at its next scheduled time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use croner::Cron;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::proactive::{WorkflowKind, WorkflowRunner};
use crate::traits::RecordStore;

const TICK_INTERVAL: Duration = Duration::from_secs(30);

struct Job {
    name: &'static str,
    kind: WorkflowKind,
    cron: Cron,
    next_run: DateTime<Utc>,
}

pub struct Worker {
    runner: WorkflowRunner,
    store: Arc<dyn RecordStore>,
    cfg: WorkerConfig,
}

impl Worker {
    pub fn new(runner: WorkflowRunner, store: Arc<dyn RecordStore>, cfg: WorkerConfig) -> Self {
        Self { runner, store, cfg }
    }

    /// Spawn the tick loop as a background task. Fails only on unparseable
    /// cron expressions in config.
    pub fn spawn(self) -> anyhow::Result<()> {
        if !self.cfg.enabled {
            info!("worker disabled by config");
            return Ok(());
        }

        let mut jobs = vec![
            make_job("morning_digest", WorkflowKind::MorningDigest, &self.cfg.morning_digest_cron)?,
            make_job("afternoon_digest", WorkflowKind::GmailDigest, &self.cfg.afternoon_digest_cron)?,
            make_job("staleness_check", WorkflowKind::StalenessOnly, &self.cfg.staleness_cron)?,
        ];

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(TICK_INTERVAL).await;
                self.tick(&mut jobs).await;
            }
        });

        info!("worker spawned");
        Ok(())
    }

    async fn tick(&self, jobs: &mut [Job]) {
        let now = Utc::now();
        for job in jobs.iter_mut() {
            if now < job.next_run {
                continue;
            }
            job.next_run = match compute_next_run(&job.cron) {
                Ok(next) => next,
                Err(e) => {
                    error!(job = job.name, "failed to compute next run: {e}");
                    continue;
                }
            };

            let hour = Local::now().hour();
            if in_quiet_hours(self.cfg.quiet_start_hour, self.cfg.quiet_end_hour, hour) {
                info!(job = job.name, hour, "skipping run inside quiet hours");
                continue;
            }

            info!(job = job.name, "firing proactive run");
            for payload in self.runner.run(job.kind).await {
                if let Err(e) = self
                    .store
                    .create_notification(&payload.kind, &payload.content)
                    .await
                {
                    warn!(job = job.name, "failed to persist notification: {e}");
                }
            }
        }
    }
}

fn make_job(name: &'static str, kind: WorkflowKind, expr: &str) -> anyhow::Result<Job> {
    // Cron::new alone does not parse the pattern; only the Cron returned by
    // parse() can search for occurrences.
    let cron = Cron::new(expr)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid cron '{expr}' for {name}: {e}"))?;
    let next_run = compute_next_run(&cron)?;
    Ok(Job {
        name,
        kind,
        cron,
        next_run,
    })
}

fn compute_next_run(cron: &Cron) -> anyhow::Result<DateTime<Utc>> {
    cron.find_next_occurrence(&Utc::now(), false)
        .map_err(|e| anyhow::anyhow!("no next occurrence: {e}"))
}

/// Whether `hour` falls inside the [start, end) quiet window. The window may
/// wrap past midnight; start == end means no quiet hours at all.
pub fn in_quiet_hours(start: u32, end: u32, hour: u32) -> bool {
    if start == end {
        return false;
    }
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;

    #[test]
    fn quiet_window_within_one_day() {
        assert!(in_quiet_hours(13, 15, 13));
        assert!(in_quiet_hours(13, 15, 14));
        assert!(!in_quiet_hours(13, 15, 15));
        assert!(!in_quiet_hours(13, 15, 12));
    }

    #[test]
    fn quiet_window_wraps_midnight() {
        assert!(in_quiet_hours(22, 7, 23));
        assert!(in_quiet_hours(22, 7, 0));
        assert!(in_quiet_hours(22, 7, 6));
        assert!(!in_quiet_hours(22, 7, 7));
        assert!(!in_quiet_hours(22, 7, 12));
    }

    #[test]
    fn equal_bounds_mean_never_quiet() {
        for hour in 0..24 {
            assert!(!in_quiet_hours(9, 9, hour));
        }
    }

    #[test]
    fn default_schedules_parse_and_advance() {
        let cfg = WorkerConfig::default();
        for expr in [
            &cfg.morning_digest_cron,
            &cfg.afternoon_digest_cron,
            &cfg.staleness_cron,
        ] {
            let cron = Cron::new(expr).parse().unwrap();
            assert!(compute_next_run(&cron).unwrap() > Utc::now());
        }
    }

    #[test]
    fn jobs_built_from_defaults_have_a_future_next_run() {
        let cfg = WorkerConfig::default();
        let job = make_job("morning_digest", WorkflowKind::MorningDigest, &cfg.morning_digest_cron)
            .unwrap();
        assert!(job.next_run > Utc::now());
    }

    #[test]
    fn garbage_cron_is_rejected() {
        assert!(make_job("bad", WorkflowKind::GmailDigest, "not a cron").is_err());
    }
}
