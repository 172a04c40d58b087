#![allow(dead_code)]

use guess_core::{
    Answer, Clock, Delivery, EventSink, GameSession, QuestionPool, QuestionRecord, Scheduler,
    SessionConfig, Timer, TimerHandle,
};
use guess_types::{ConnectionId, ServerMessage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Clock that only moves when a test moves it.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn set(&self, instant: Instant) {
        *self.offset.lock().unwrap() = instant.saturating_duration_since(self.base);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

/// Event collector for asserting on what the session sent.
#[derive(Clone)]
pub struct RecordingSink {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            deliveries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.deliveries.lock().unwrap().clear();
    }

    pub fn messages(&self) -> Vec<ServerMessage> {
        self.deliveries()
            .iter()
            .map(|delivery| delivery.message().clone())
            .collect()
    }

    /// Everything `id` would have received, in order.
    pub fn messages_for(&self, id: ConnectionId) -> Vec<ServerMessage> {
        self.deliveries()
            .iter()
            .filter(|delivery| delivery.reaches(id))
            .map(|delivery| delivery.message().clone())
            .collect()
    }

    pub fn count(&self, check_fn: impl Fn(&ServerMessage) -> bool) -> usize {
        self.messages().iter().filter(|m| check_fn(m)).count()
    }

    pub fn timer_updates(&self) -> Vec<u32> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::TimerUpdate { seconds_remaining } => Some(seconds_remaining),
                _ => None,
            })
            .collect()
    }

    pub fn round_ends(&self) -> Vec<(String, Vec<String>)> {
        self.messages()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::RoundEnd {
                    answer,
                    correct_guessers,
                } => Some((answer, correct_guessers)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&mut self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }
}

struct ScheduledTimer {
    handle: TimerHandle,
    due: Instant,
    timer: Timer,
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    pending: Vec<ScheduledTimer>,
}

/// Scheduler whose timers fire only when the harness advances the clock.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    state: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    pub fn pending(&self) -> Vec<Timer> {
        self.state
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|scheduled| scheduled.timer)
            .collect()
    }

    /// Remove and return the earliest timer due at or before `until`.
    fn pop_due(&self, until: Instant) -> Option<(Instant, Timer)> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due <= until)
            .min_by_key(|(_, scheduled)| (scheduled.due, scheduled.handle.0))
            .map(|(index, _)| index)?;
        let scheduled = state.pending.remove(index);
        Some((scheduled.due, scheduled.timer))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        let mut state = self.state.lock().unwrap();
        let handle = TimerHandle(state.next_id);
        state.next_id += 1;
        state.pending.push(ScheduledTimer {
            handle,
            due: self.clock.now() + delay,
            timer,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut state = self.state.lock().unwrap();
        state.pending.retain(|scheduled| scheduled.handle != handle);
    }
}

pub fn question(id: u32, answer: &str) -> QuestionRecord {
    QuestionRecord {
        id,
        image_url: format!("/images/{}.jpg", id),
        question: format!("What is shown in picture {}?", id),
        answer: Answer::Text(answer.to_string()),
    }
}

pub fn standard_questions() -> Vec<QuestionRecord> {
    vec![
        question(1, "Otter"),
        question(2, "Lighthouse"),
        QuestionRecord {
            id: 3,
            image_url: "/images/3.jpg".to_string(),
            question: "How many balloons?".to_string(),
            answer: Answer::Number(12.0),
        },
    ]
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        round_duration: Duration::from_secs(45),
        intermission: Duration::from_secs(5),
        early_end_grace: Duration::from_secs(1),
        question_retry_delay: Duration::from_secs(2),
        grace_window: Duration::from_secs(30),
        ..SessionConfig::default()
    }
}

/// A session wired to a manual clock, recording sink and manual scheduler.
pub struct Harness {
    pub session: GameSession,
    pub clock: Arc<ManualClock>,
    pub sink: RecordingSink,
    pub timers: ManualScheduler,
}

impl Harness {
    pub fn new(config: SessionConfig, questions: Vec<QuestionRecord>) -> Self {
        let clock = ManualClock::new();
        let sink = RecordingSink::new();
        let timers = ManualScheduler::new(clock.clone());
        let pool = QuestionPool::with_rng(questions, StdRng::seed_from_u64(11));

        let session = GameSession::new(
            config,
            pool,
            clock.clone(),
            Box::new(sink.clone()),
            Box::new(timers.clone()),
        );

        Self {
            session,
            clock,
            sink,
            timers,
        }
    }

    pub fn standard() -> Self {
        Self::new(test_config(), standard_questions())
    }

    pub fn join(&mut self, name: &str) -> ConnectionId {
        let id = ConnectionId::new();
        self.session.join(id, name, None);
        id
    }

    /// Move the clock forward, firing every timer that comes due on the way.
    pub fn advance(&mut self, by: Duration) {
        let target = self.clock.now() + by;
        while let Some((due, timer)) = self.timers.pop_due(target) {
            self.clock.set(due);
            self.session.handle_timer(timer);
        }
        self.clock.set(target);
    }

    pub fn advance_secs(&mut self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn current_answer(&self) -> String {
        self.session
            .current_round()
            .expect("no active round")
            .question
            .answer
            .to_string()
    }

    pub fn score(&self, id: ConnectionId) -> i32 {
        self.session.player(&id).expect("unknown player").score
    }
}
