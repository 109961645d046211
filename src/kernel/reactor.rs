use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::{classify, locate};
use super::dedup::DedupGuard;
use super::event::{Command, CommandOutcome, Event, InboundMessage};
use super::scheduler::{Job, Scheduler, SideEffect};
use super::telemetry::event::TelemetryEvent;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::{Clock, Period};
use crate::records::store::{RecordStore, StoreError};
use crate::records::types::{InsertOutcome, QuestionRecord, RecordKind, StatusRecord, UserId};
use crate::reports::generator::ReportGenerator;

#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Longest the loop sleeps before re-checking timers.
    pub idle_cap: Duration,
    /// This bot's username. When set, commands suffixed with another
    /// bot's name are ignored.
    pub bot_username: Option<String>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            idle_cap: Duration::from_secs(1),
            bot_username: None,
        }
    }
}

/// Serializes inbound events and due timers into side effects.
///
/// `handle_event` and `fire_due` do all the work synchronously and return
/// what should be sent; `run` is the async driver around them.
pub struct Reactor {
    pub receiver: mpsc::Receiver<Event>,
    pub scheduler: Scheduler,
    pub telemetry: TelemetryRecorder,
    guard: DedupGuard,
    reports: ReportGenerator,
    clock: Arc<dyn Clock>,
    config: ReactorConfig,
}

impl Reactor {
    pub fn new(
        receiver: mpsc::Receiver<Event>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        scheduler: Scheduler,
        config: ReactorConfig,
    ) -> Self {
        Self {
            receiver,
            scheduler,
            telemetry: TelemetryRecorder::new(),
            guard: DedupGuard::new(store.clone()),
            reports: ReportGenerator::new(store),
            clock,
            config,
        }
    }

    pub fn handle_event(&mut self, event: Event) -> Vec<SideEffect> {
        match event {
            Event::Inbound(msg) => {
                let outcome = self.dispatch(&msg);
                outcome
                    .reply_text()
                    .map(|text| SideEffect::Reply { chat_id: msg.chat_id, text })
                    .into_iter()
                    .collect()
            }
        }
    }

    pub fn dispatch(&mut self, msg: &InboundMessage) -> CommandOutcome {
        let now = self.clock.now();
        match Command::parse_addressed(&msg.text, self.config.bot_username.as_deref()) {
            None => self.observe_status(msg.user_id, &msg.text, now),
            Some(Command::Start) => CommandOutcome::Welcome,
            Some(Command::Help) => CommandOutcome::Help,
            Some(Command::Ask(question)) => self.ask(msg.user_id, &question, now),
            Some(Command::Report) => match self.reports.monthly_report(&Period::month_of(now)) {
                Ok(text) => CommandOutcome::Report(text),
                Err(e) => self.storage_failure("report", e),
            },
            Some(Command::Stats) => CommandOutcome::Unimplemented("stats"),
            Some(Command::History(_)) => CommandOutcome::Unimplemented("history"),
            Some(Command::Unknown(name)) => {
                debug!(command = %name, "ignoring unknown command");
                CommandOutcome::Ignored
            }
            Some(Command::ForOtherBot(target)) => {
                debug!(%target, "command addressed to another bot");
                CommandOutcome::Ignored
            }
        }
    }

    fn observe_status(&mut self, user_id: UserId, text: &str, now: DateTime<Utc>) -> CommandOutcome {
        let tags = classify(text);
        self.telemetry.record(TelemetryEvent::Classified {
            status: tags.status,
            location: tags.location,
        });
        if !tags.is_complete() {
            return CommandOutcome::Unclassified;
        }

        let record = StatusRecord::new(user_id, tags.status, tags.location).at(now);
        match self.guard.record_status(record, &Period::month_of(now)) {
            Ok(InsertOutcome::Inserted(id)) => {
                info!(id, user_id, status = %tags.status, location = %tags.location, "status recorded");
                self.telemetry.record(TelemetryEvent::Recorded { kind: RecordKind::Status });
                CommandOutcome::StatusRecorded {
                    status: tags.status,
                    location: tags.location,
                }
            }
            Ok(InsertOutcome::Duplicate) => {
                self.telemetry.record(TelemetryEvent::DuplicateRejected { kind: RecordKind::Status });
                CommandOutcome::StatusDuplicate
            }
            Err(e) => self.storage_failure("status", e),
        }
    }

    fn ask(&mut self, user_id: UserId, question: &str, now: DateTime<Utc>) -> CommandOutcome {
        let question = question.trim();
        if question.is_empty() {
            self.telemetry.record(TelemetryEvent::ValidationFailed);
            return CommandOutcome::MissingQuestion;
        }

        let record = QuestionRecord::new(user_id, question, locate(question)).at(now);
        match self.guard.record_question(record, &Period::month_of(now)) {
            Ok(InsertOutcome::Inserted(id)) => {
                info!(id, user_id, "question logged");
                self.telemetry.record(TelemetryEvent::Recorded { kind: RecordKind::Question });
                CommandOutcome::QuestionLogged
            }
            Ok(InsertOutcome::Duplicate) => {
                self.telemetry.record(TelemetryEvent::DuplicateRejected { kind: RecordKind::Question });
                CommandOutcome::AlreadyAsked
            }
            Err(e) => self.storage_failure("question", e),
        }
    }

    fn storage_failure(&mut self, context: &str, e: StoreError) -> CommandOutcome {
        error!(context, error = %e, "record store failure");
        self.telemetry.record(TelemetryEvent::StorageFailed);
        CommandOutcome::StorageFailure
    }

    /// Runs every due job. A failing job is logged and skipped; its timer has
    /// already moved to the next day and the remaining jobs still run.
    pub fn fire_due(&mut self) -> Vec<SideEffect> {
        let now = self.clock.now();
        let mut effects = Vec::new();
        for job in self.scheduler.due(now) {
            match self.render_job(job, now) {
                Ok(text) => {
                    info!(?job, "scheduled job fired");
                    self.telemetry.record(TelemetryEvent::JobFired { job });
                    effects.push(SideEffect::Broadcast { job, text });
                }
                Err(e) => {
                    error!(?job, error = %e, "scheduled job failed");
                    self.telemetry.record(TelemetryEvent::JobFailed { job });
                }
            }
        }
        effects
    }

    pub fn render_job(&self, job: Job, now: DateTime<Utc>) -> Result<String, StoreError> {
        let today = Period::day_of(now);
        match job {
            Job::DailySummary => self.reports.daily_summary(&today),
            Job::DailyQuestionSummary => self.reports.daily_question_summary(&today),
        }
    }

    /// Time until the next timer, never longer than `idle_cap`.
    fn idle_wait(&self) -> Duration {
        let cap = self.config.idle_cap;
        match self.scheduler.next_fire() {
            Some(at) => (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO).min(cap),
            None => cap,
        }
    }

    /// Async driver loop. Side effects go to `outbound`; the loop stops when
    /// `shutdown` fires or the inbound channel closes.
    pub async fn run(&mut self, outbound: mpsc::Sender<SideEffect>, shutdown: CancellationToken) {
        info!(timers = self.scheduler.timers().len(), "reactor started");

        loop {
            let wait = self.idle_wait();
            let effects = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("inbound channel closed");
                        break;
                    }
                },
                _ = tokio::time::sleep(wait) => Vec::new(),
            };

            for effect in effects.into_iter().chain(self.fire_due()) {
                if outbound.send(effect).await.is_err() {
                    warn!("delivery channel closed; dropping side effect");
                }
            }
        }

        info!("reactor stopped");
    }
}
