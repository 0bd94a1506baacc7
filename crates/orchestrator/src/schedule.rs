//! Cron cadences and the scheduler loop.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Utc};
use tokio::task::JoinSet;

use stockflow_core::{Config, Error, Profile, ResourceConfig, Result, RunConfig, RunReport};
use stockflow_pipeline::{CancelToken, Runner};

use crate::execute_run;
use crate::partitions::PartitionSet;

/// Upper bound on the minute/hour/day steps scanned for the next
/// occurrence, a few decades of day skips.
const MAX_SEARCH_STEPS: usize = 10_000;

/// A five-field cron expression (minute, hour, day-of-month, month,
/// day-of-week) with the usual `*`, lists, ranges and `/step` forms.
///
/// Day-of-week accepts 0-7 with both 0 and 7 meaning Sunday. When both
/// day fields are restricted (neither is `*`), a day matching either one
/// counts, as in vixie cron.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// First cadence boundary strictly after `after`, if one exists.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after.with_second(0)?.with_nanosecond(0)? + chrono::Duration::minutes(1);
        for _ in 0..MAX_SEARCH_STEPS {
            if self.months & (1 << t.month()) == 0 || !self.day_matches(t) {
                t = t.date().succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }
            if self.hours & (1 << t.hour()) == 0 {
                t = t.with_minute(0)? + chrono::Duration::hours(1);
                continue;
            }
            if self.minutes & (1 << t.minute()) == 0 {
                t += chrono::Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }

    fn day_matches(&self, t: NaiveDateTime) -> bool {
        let dom = self.days_of_month & (1 << t.day()) != 0;
        let dow = self.days_of_week & (1 << t.weekday().num_days_from_sunday()) != 0;
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }
}

impl FromStr for CronSchedule {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::config(format!(
                "cron {expr:?}: expected 5 fields, got {}",
                fields.len()
            )));
        }

        let minutes = parse_field(fields[0], 0, 59)?;
        let hours = parse_field(fields[1], 0, 23)?;
        let days_of_month = parse_field(fields[2], 1, 31)?;
        let months = parse_field(fields[3], 1, 12)?;
        let mut days_of_week = parse_field(fields[4], 0, 7)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expr: expr.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<u64> {
    let mut mask = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| {
                    Error::config(format!("cron field {field:?}: bad step {step:?}"))
                })?;
                if step == 0 {
                    return Err(Error::config(format!(
                        "cron field {field:?}: step must be positive"
                    )));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (
                parse_value(lo, min, max, field)?,
                parse_value(hi, min, max, field)?,
            )
        } else {
            let value = parse_value(range, min, max, field)?;
            // a bare value with a step means "from the value on"
            match step {
                Some(_) => (value, max),
                None => (value, value),
            }
        };

        if lo > hi {
            return Err(Error::config(format!(
                "cron field {field:?}: range {lo}-{hi} is inverted"
            )));
        }

        let step = step.unwrap_or(1);
        let mut value = lo;
        while value <= hi {
            mask |= 1 << value;
            value += step;
        }
    }
    Ok(mask)
}

fn parse_value(raw: &str, min: u32, max: u32, field: &str) -> Result<u32> {
    let value: u32 = raw
        .parse()
        .map_err(|_| Error::config(format!("cron field {field:?}: bad value {raw:?}")))?;
    if value < min || value > max {
        return Err(Error::config(format!(
            "cron field {field:?}: {value} out of range {min}-{max}"
        )));
    }
    Ok(value)
}

/// What one cadence boundary executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickMode {
    /// One unpartitioned run against a fixed object key.
    Single { object_key: String },
    /// One run per partition in the declared set.
    FanOut,
}

/// Fires pipeline runs at cadence boundaries.
///
/// Boundaries are computed in UTC. The loop dispatches runs as detached
/// tasks, so a run still in its retry backoff never holds up the next
/// boundary. Missed boundaries are never backfilled.
pub struct Scheduler {
    cron: CronSchedule,
    mode: TickMode,
    profile: Profile,
    resources: ResourceConfig,
    partitions: PartitionSet,
    runner: Arc<Runner>,
    cancel: CancelToken,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cron: CronSchedule,
        mode: TickMode,
        profile: Profile,
        resources: ResourceConfig,
        partitions: PartitionSet,
        runner: Arc<Runner>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            cron,
            mode,
            profile,
            resources,
            partitions,
            runner,
            cancel,
        }
    }

    /// Build the profile's named schedule: the frequent single-run cadence
    /// for `local`, the hourly partition fan-out for `production`.
    ///
    /// Both configured expressions are parsed here, so a bad cadence is
    /// rejected at startup no matter which profile is active.
    pub fn from_config(config: &Config, runner: Arc<Runner>, cancel: CancelToken) -> Result<Self> {
        let local: CronSchedule = config.schedule.local_cron.parse()?;
        let production: CronSchedule = config.schedule.production_cron.parse()?;

        let (cron, mode) = if config.profile.is_local() {
            (
                local,
                TickMode::Single {
                    object_key: config.source.local_object_key.clone(),
                },
            )
        } else {
            (production, TickMode::FanOut)
        };
        Ok(Self::new(
            cron,
            mode,
            config.profile,
            config.resources.clone(),
            PartitionSet::new(&config.source.prefix),
            runner,
            cancel,
        ))
    }

    pub fn cron(&self) -> &CronSchedule {
        &self.cron
    }

    pub fn mode(&self) -> &TickMode {
        &self.mode
    }

    /// Resolved run configurations for one cadence boundary.
    fn boundary_configs(&self) -> Vec<RunConfig> {
        match &self.mode {
            TickMode::Single { object_key } => vec![RunConfig::for_object_key(
                object_key.clone(),
                self.resources.clone(),
            )],
            TickMode::FanOut => self.partitions.resolve_all(&self.resources),
        }
    }

    /// Execute one cadence boundary now and wait for its runs.
    ///
    /// Fan-out runs execute concurrently, one task each; reports come back
    /// in partition declaration order.
    pub async fn tick(&self) -> Vec<RunReport> {
        let configs = self.boundary_configs();
        tracing::info!(schedule = %self.cron, runs = configs.len(), "schedule tick firing");

        let handles: Vec<_> = configs
            .into_iter()
            .map(|config| {
                let runner = self.runner.clone();
                let profile = self.profile;
                let run_key = config.label().to_string();
                let handle =
                    tokio::spawn(async move { execute_run(profile, &runner, config).await });
                (run_key, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (run_key, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    tracing::info!(%report, "scheduled run finished");
                    reports.push(report);
                }
                Ok(Err(error)) => {
                    tracing::error!(%run_key, %error, "scheduled run could not start")
                }
                Err(error) => tracing::error!(%run_key, %error, "scheduled run task failed"),
            }
        }
        reports
    }

    /// Dispatch one cadence boundary's runs without waiting for them.
    fn fire(&self, runs: &mut JoinSet<()>) {
        let configs = self.boundary_configs();
        tracing::info!(schedule = %self.cron, runs = configs.len(), "schedule tick firing");
        for config in configs {
            let runner = self.runner.clone();
            let profile = self.profile;
            runs.spawn(async move {
                let run_key = config.label().to_string();
                match execute_run(profile, &runner, config).await {
                    Ok(report) => tracing::info!(%report, "scheduled run finished"),
                    Err(error) => {
                        tracing::error!(%run_key, %error, "scheduled run could not start")
                    }
                }
            });
        }
    }

    /// Sleep until the boundary while reaping finished runs.
    ///
    /// Returns false when cancelled.
    async fn sleep_through(&self, wait: Duration, runs: &mut JoinSet<()>) -> bool {
        let sleep = tokio::time::sleep(wait);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                _ = self.cancel.cancelled() => return false,
                Some(joined) = runs.join_next() => {
                    if let Err(error) = joined {
                        tracing::error!(%error, "scheduled run task failed");
                    }
                }
            }
        }
    }

    /// Sleep-and-fire until cancelled.
    ///
    /// Boundary runs are dispatched without being awaited, so a long or
    /// retrying run from one boundary cannot push back the next.
    pub async fn run_loop(&self) {
        tracing::info!(schedule = %self.cron, mode = ?self.mode, "scheduler started");
        let mut runs = JoinSet::new();
        loop {
            let now = Utc::now().naive_utc();
            let Some(next) = self.cron.next_after(now) else {
                tracing::error!(schedule = %self.cron, "cadence has no future occurrence, scheduler stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, wait_secs = wait.as_secs(), "sleeping until next cadence boundary");

            if !self.sleep_through(wait, &mut runs).await {
                tracing::info!("scheduler stopping");
                break;
            }
            self.fire(&mut runs);
        }
        // In-flight runs observe the cancel token at their next stage
        // boundary; wait for them rather than aborting mid-stage.
        while let Some(joined) = runs.join_next().await {
            if let Err(error) = joined {
                tracing::error!(%error, "scheduled run task failed");
            }
        }
    }
}
