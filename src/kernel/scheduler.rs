use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::ChatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Job {
    DailySummary,
    DailyQuestionSummary,
}

/// Work for the delivery side. The reactor never touches the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Reply { chat_id: ChatId, text: String },
    /// Goes to the configured broadcast destination.
    Broadcast { job: Job, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub job: Job,
    pub next_fire: DateTime<Utc>,
}

/// Daily timers keyed to absolute instants.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    timers: Vec<TimerEntry>,
}

pub const PERIOD_HOURS: i64 = 24;

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job in `jobs` fires daily at `at` (UTC), starting with the first
    /// occurrence strictly after `now`.
    pub fn daily(at: NaiveTime, jobs: &[Job], now: DateTime<Utc>) -> Self {
        let mut scheduler = Self::new();
        for job in jobs {
            scheduler.add(*job, first_fire_after(at, now));
        }
        scheduler
    }

    pub fn add(&mut self, job: Job, next_fire: DateTime<Utc>) {
        self.timers.push(TimerEntry { job, next_fire });
    }

    pub fn timers(&self) -> &[TimerEntry] {
        &self.timers
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.timers.iter().map(|t| t.next_fire).min()
    }

    /// Jobs due at `now`, in registration order. Each returned timer is
    /// already moved past `now` in whole periods, so a job fires at most
    /// once per call even after a long pause.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let period = Duration::hours(PERIOD_HOURS);
        let mut fired = Vec::new();
        for timer in self.timers.iter_mut() {
            if now < timer.next_fire {
                continue;
            }
            fired.push(timer.job);
            while timer.next_fire <= now {
                timer.next_fire += period;
            }
        }
        fired
    }
}

fn first_fire_after(at: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::hours(PERIOD_HOURS)
    }
}
