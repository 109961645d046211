use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use visa_tracker::kernel::event::{CommandOutcome, Event, InboundMessage};
use visa_tracker::kernel::scheduler::{Job, Scheduler, SideEffect};
use visa_tracker::kernel::time::{Clock, ManualClock, Period};
use visa_tracker::records::store::{RecordStore, SqliteRecordStore, StoreError};
use visa_tracker::records::types::{
    InsertOutcome, Location, QuestionRecord, RecordKind, StatusCount, StatusRecord, UserId, VisaStatus,
};
use visa_tracker::reports::NO_QUESTIONS_TODAY;
use visa_tracker::{Reactor, ReactorConfig};

const CHAT: i64 = -100;

fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

fn msg(user_id: UserId, text: &str) -> InboundMessage {
    InboundMessage::new(CHAT, user_id, text)
}

fn daily_scheduler(now: DateTime<Utc>) -> Scheduler {
    Scheduler::daily(
        NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        &[Job::DailySummary, Job::DailyQuestionSummary],
        now,
    )
}

fn build(store: Arc<dyn RecordStore>, clock: &ManualClock) -> (Reactor, mpsc::Sender<Event>) {
    let (tx, rx) = mpsc::channel(100);
    let scheduler = daily_scheduler(clock.now());
    let reactor = Reactor::new(rx, store, Arc::new(clock.clone()), scheduler, ReactorConfig::default());
    (reactor, tx)
}

fn setup() -> (Reactor, Arc<SqliteRecordStore>, ManualClock) {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let (reactor, _tx) = build(store.clone(), &clock);
    (reactor, store, clock)
}

/// Fails every call, or only the per-day aggregate when `only_daily` is set.
struct FailingStore {
    inner: SqliteRecordStore,
    only_daily: bool,
    broken: AtomicBool,
}

impl FailingStore {
    fn new(only_daily: bool) -> Self {
        Self {
            inner: SqliteRecordStore::open_in_memory().unwrap(),
            only_daily,
            broken: AtomicBool::new(true),
        }
    }

    fn check(&self, daily: bool) -> Result<(), StoreError> {
        let fails = self.broken.load(Ordering::SeqCst) && (daily || !self.only_daily);
        if fails {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FailingStore {
    fn insert_status(&self, record: StatusRecord) -> Result<InsertOutcome, StoreError> {
        self.check(false)?;
        self.inner.insert_status(record)
    }
    fn insert_question(&self, record: QuestionRecord) -> Result<InsertOutcome, StoreError> {
        self.check(false)?;
        self.inner.insert_question(record)
    }
    fn has_record(&self, kind: RecordKind, user_id: UserId, period: &Period) -> Result<bool, StoreError> {
        self.check(false)?;
        self.inner.has_record(kind, user_id, period)
    }
    fn count_status(&self, location: Location, status: VisaStatus, period: &Period) -> Result<u64, StoreError> {
        self.check(false)?;
        self.inner.count_status(location, status, period)
    }
    fn list_questions(&self, location: Location, period: &Period) -> Result<Vec<String>, StoreError> {
        self.check(false)?;
        self.inner.list_questions(location, period)
    }
    fn count_by_location_and_status(&self, period: &Period) -> Result<Vec<StatusCount>, StoreError> {
        self.check(true)?;
        self.inner.count_by_location_and_status(period)
    }
}

#[tokio::test]
async fn test_ask_twice_in_one_month() {
    let (mut reactor, store, clock) = setup();
    let may = Period::month_of(at(2024, 5, 1, 0, 0));

    // 1. First question is logged
    let effects = reactor.handle_event(Event::Inbound(msg(1, "/ask Is Delhi slow this month?")));
    assert_eq!(
        effects,
        vec![SideEffect::Reply { chat_id: CHAT, text: "Question logged.".to_string() }]
    );
    assert!(store.has_record(RecordKind::Question, 1, &may).unwrap());

    // 2. Second question later the same month is rejected
    clock.advance(Duration::days(5));
    let outcome = reactor.dispatch(&msg(1, "/ask What about Mumbai?"));
    assert_eq!(outcome, CommandOutcome::AlreadyAsked);
    assert_eq!(
        outcome.reply_text().as_deref(),
        Some("You have already asked a question this month.")
    );
    assert_eq!(store.list_questions(Location::Delhi, &may).unwrap().len(), 1);
    assert!(store.list_questions(Location::Mumbai, &may).unwrap().is_empty());

    // 3. Next month is allowed again
    clock.set(at(2024, 6, 1, 0, 0));
    assert_eq!(reactor.dispatch(&msg(1, "/ask What about Mumbai?")), CommandOutcome::QuestionLogged);

    let snap = reactor.telemetry.snapshot();
    assert_eq!(snap.write_stats.questions_recorded, 2);
    assert_eq!(snap.write_stats.question_duplicates, 1);
}

#[tokio::test]
async fn test_empty_ask_is_rejected() {
    let (mut reactor, store, _clock) = setup();
    let may = Period::month_of(at(2024, 5, 1, 0, 0));

    assert_eq!(reactor.dispatch(&msg(1, "/ask")), CommandOutcome::MissingQuestion);
    assert_eq!(reactor.dispatch(&msg(1, "/ask     ")), CommandOutcome::MissingQuestion);
    assert!(!store.has_record(RecordKind::Question, 1, &may).unwrap());

    let effects = reactor.handle_event(Event::Inbound(msg(1, "/ask")));
    assert_eq!(
        effects,
        vec![SideEffect::Reply { chat_id: CHAT, text: "Please provide a question.".to_string() }]
    );
    assert_eq!(reactor.telemetry.snapshot().write_stats.validation_failures, 3);
}

#[tokio::test]
async fn test_question_location_tagging() {
    let (mut reactor, store, _clock) = setup();
    let may = Period::month_of(at(2024, 5, 1, 0, 0));

    reactor.dispatch(&msg(1, "/ask Any news from chennai?"));
    reactor.dispatch(&msg(2, "/ask General documents question"));

    assert_eq!(store.list_questions(Location::Chennai, &may).unwrap(), vec!["Any news from chennai?"]);
    assert_eq!(store.list_questions(Location::Unknown, &may).unwrap(), vec!["General documents question"]);
}

#[tokio::test]
async fn test_status_message_recorded_silently() {
    let (mut reactor, store, _clock) = setup();
    let may = Period::month_of(at(2024, 5, 1, 0, 0));

    let effects = reactor.handle_event(Event::Inbound(msg(1, "Hyderabad Approved my visa")));
    assert!(effects.is_empty(), "Status messages get no reply");
    assert_eq!(store.count_status(Location::Hyderabad, VisaStatus::Approved, &may).unwrap(), 1);

    // Same user, same month: nothing new.
    let outcome = reactor.dispatch(&msg(1, "Delhi rejected"));
    assert_eq!(outcome, CommandOutcome::StatusDuplicate);
    assert_eq!(store.count_status(Location::Delhi, VisaStatus::Rejected, &may).unwrap(), 0);

    // Another user is independent.
    let outcome = reactor.dispatch(&msg(2, "delhi REJECTED again"));
    assert_eq!(
        outcome,
        CommandOutcome::StatusRecorded { status: VisaStatus::Rejected, location: Location::Delhi }
    );
}

#[tokio::test]
async fn test_incomplete_message_not_recorded() {
    let (mut reactor, store, _clock) = setup();
    let may = Period::month_of(at(2024, 5, 1, 0, 0));

    assert_eq!(reactor.dispatch(&msg(1, "approved!!")), CommandOutcome::Unclassified);
    assert_eq!(reactor.dispatch(&msg(1, "interview in Mumbai tomorrow")), CommandOutcome::Unclassified);
    assert!(!store.has_record(RecordKind::Status, 1, &may).unwrap());

    let snap = reactor.telemetry.snapshot();
    assert_eq!(snap.classifier_stats.messages, 2);
    assert_eq!(snap.classifier_stats.complete, 0);
}

#[tokio::test]
async fn test_report_command() {
    let (mut reactor, _store, _clock) = setup();
    reactor.dispatch(&msg(1, "Delhi approved"));

    match reactor.dispatch(&msg(2, "/report")) {
        CommandOutcome::Report(text) => {
            assert!(text.starts_with("Monthly Report for 2024-05:"));
            assert!(text.contains("Delhi - Approved: 1, Rejected: 0"));
        }
        other => panic!("expected report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_static_and_stub_commands() {
    let (mut reactor, _store, _clock) = setup();

    assert_eq!(reactor.dispatch(&msg(1, "/start")), CommandOutcome::Welcome);
    assert_eq!(reactor.dispatch(&msg(1, "/help@VisaBot")), CommandOutcome::Help);
    assert_eq!(reactor.dispatch(&msg(1, "/stats")), CommandOutcome::Unimplemented("stats"));
    assert_eq!(reactor.dispatch(&msg(1, "/history 05/2024")), CommandOutcome::Unimplemented("history"));

    let effects = reactor.handle_event(Event::Inbound(msg(1, "/stats")));
    assert_eq!(
        effects,
        vec![SideEffect::Reply { chat_id: CHAT, text: "This feature is under development.".to_string() }]
    );

    let help = CommandOutcome::Help.reply_text().unwrap();
    assert!(help.contains("/ask [question] - Log a question"));
}

#[tokio::test]
async fn test_unknown_command_ignored() {
    let (mut reactor, _store, _clock) = setup();
    let effects = reactor.handle_event(Event::Inbound(msg(1, "/approved delhi")));
    assert!(effects.is_empty());
    assert!(reactor.telemetry.is_empty(), "Unknown commands never reach the classifier");
}

#[tokio::test]
async fn test_scheduled_jobs_broadcast() {
    let (mut reactor, _store, clock) = setup();
    reactor.dispatch(&msg(1, "Mumbai approved"));

    assert!(reactor.fire_due().is_empty(), "Nothing due at 09:00");

    clock.set(at(2024, 5, 17, 13, 0));
    let effects = reactor.fire_due();
    assert_eq!(effects.len(), 2);

    match &effects[0] {
        SideEffect::Broadcast { job: Job::DailySummary, text } => {
            assert_eq!(text, "Daily Visa Analysis:\n\nMumbai - Approved: 1\n");
        }
        other => panic!("unexpected effect {:?}", other),
    }
    match &effects[1] {
        SideEffect::Broadcast { job: Job::DailyQuestionSummary, text } => {
            assert_eq!(text.matches(NO_QUESTIONS_TODAY).count(), 5);
        }
        other => panic!("unexpected effect {:?}", other),
    }

    assert!(reactor.fire_due().is_empty(), "Rescheduled for tomorrow");
    assert_eq!(reactor.scheduler.next_fire(), Some(at(2024, 5, 18, 13, 0)));
}

#[tokio::test]
async fn test_storage_failure_is_reported_not_fatal() {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(FailingStore::new(false));
    let (mut reactor, _tx) = build(store.clone(), &clock);

    assert_eq!(reactor.dispatch(&msg(1, "/ask anything")), CommandOutcome::StorageFailure);
    assert_eq!(reactor.dispatch(&msg(1, "/report")), CommandOutcome::StorageFailure);
    assert_eq!(reactor.dispatch(&msg(1, "Delhi approved")), CommandOutcome::StorageFailure);
    assert_eq!(
        CommandOutcome::StorageFailure.reply_text().as_deref(),
        Some("Sorry, something went wrong. Please try again later.")
    );

    // Store recovers; the reactor carries on.
    store.broken.store(false, Ordering::SeqCst);
    assert_eq!(reactor.dispatch(&msg(1, "/ask anything")), CommandOutcome::QuestionLogged);
    assert_eq!(reactor.telemetry.snapshot().write_stats.storage_failures, 3);
}

#[tokio::test]
async fn test_failed_job_does_not_block_others() {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(FailingStore::new(true));
    let (mut reactor, _tx) = build(store.clone(), &clock);

    clock.set(at(2024, 5, 17, 13, 0));
    let effects = reactor.fire_due();
    assert_eq!(effects.len(), 1, "Question summary still goes out");
    assert!(matches!(effects[0], SideEffect::Broadcast { job: Job::DailyQuestionSummary, .. }));

    let snap = reactor.telemetry.snapshot();
    assert_eq!(snap.job_stats.fired, 1);
    assert_eq!(snap.job_stats.failed, 1);

    // The failed timer was still rescheduled and fires tomorrow once healthy.
    store.broken.store(false, Ordering::SeqCst);
    clock.set(at(2024, 5, 18, 13, 0));
    let effects = reactor.fire_due();
    assert_eq!(effects.len(), 2);
}

#[tokio::test]
async fn test_run_loop_drains_and_stops() {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let (mut reactor, tx) = build(store, &clock);
    let (out_tx, mut out_rx) = mpsc::channel(100);

    tx.send(Event::Inbound(msg(1, "/start"))).await.unwrap();
    tx.send(Event::Inbound(msg(1, "Kolkata approved"))).await.unwrap();
    tx.send(Event::Inbound(msg(1, "/ask Kolkata wait?"))).await.unwrap();
    drop(tx);

    reactor.run(out_tx, CancellationToken::new()).await;

    let mut replies = Vec::new();
    while let Some(effect) = out_rx.recv().await {
        replies.push(effect);
    }
    assert_eq!(
        replies,
        vec![
            SideEffect::Reply { chat_id: CHAT, text: "Welcome! Use /help to see available commands.".to_string() },
            SideEffect::Reply { chat_id: CHAT, text: "Question logged.".to_string() },
        ]
    );
}

#[tokio::test]
async fn test_run_loop_honours_shutdown() {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let (mut reactor, _tx) = build(store, &clock);
    let (out_tx, _out_rx) = mpsc::channel(100);

    let token = CancellationToken::new();
    token.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), reactor.run(out_tx, token))
        .await
        .expect("reactor should stop on shutdown");
}

#[tokio::test]
async fn test_run_loop_fires_timers() {
    let clock = ManualClock::new(at(2024, 5, 17, 12, 59));
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let (_tx, rx) = mpsc::channel(100);
    let config = ReactorConfig {
        idle_cap: std::time::Duration::from_millis(20),
        ..ReactorConfig::default()
    };
    let mut reactor = Reactor::new(rx, store, Arc::new(clock.clone()), daily_scheduler(clock.now()), config);
    let (out_tx, mut out_rx) = mpsc::channel(100);

    // 1. Timer comes due while the loop is idle
    clock.set(at(2024, 5, 17, 13, 0));

    // 2. Collect both broadcasts, then stop the loop
    let token = CancellationToken::new();
    let stopper = token.clone();
    let collect = async move {
        let mut jobs = Vec::new();
        while jobs.len() < 2 {
            match out_rx.recv().await {
                Some(SideEffect::Broadcast { job, .. }) => jobs.push(job),
                Some(other) => panic!("unexpected effect {:?}", other),
                None => break,
            }
        }
        stopper.cancel();
        jobs
    };

    let (_, jobs) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        async { tokio::join!(reactor.run(out_tx, token), collect) },
    )
    .await
    .expect("timers should fire from the run loop");

    assert_eq!(jobs, vec![Job::DailySummary, Job::DailyQuestionSummary]);
    assert_eq!(reactor.scheduler.next_fire(), Some(at(2024, 5, 18, 13, 0)));
}

#[tokio::test]
async fn test_commands_for_other_bots_ignored() {
    let clock = ManualClock::new(at(2024, 5, 17, 9, 0));
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let (_tx, rx) = mpsc::channel(100);
    let config = ReactorConfig {
        bot_username: Some("VisaTrackerBot".to_string()),
        ..ReactorConfig::default()
    };
    let mut reactor = Reactor::new(rx, store, Arc::new(clock.clone()), daily_scheduler(clock.now()), config);

    let effects = reactor.handle_event(Event::Inbound(msg(1, "/report@SomeOtherBot")));
    assert!(effects.is_empty());
    assert_eq!(reactor.dispatch(&msg(1, "/ask@SomeOtherBot Delhi?")), CommandOutcome::Ignored);

    assert!(matches!(reactor.dispatch(&msg(1, "/report@visatrackerbot")), CommandOutcome::Report(_)));
    assert_eq!(reactor.dispatch(&msg(1, "/help")), CommandOutcome::Help);
    assert_eq!(reactor.dispatch(&msg(1, "/ask@VisaTrackerBot Delhi?")), CommandOutcome::QuestionLogged);
}
