use guess_types::{
    ConnectionId, PlayerStatus, PlayerView, RoundPhaseKind, RoundSnapshot, ServerMessage,
    SessionStatus,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    Clock, DisconnectCleanup, EventSink, GuessValidator, JoinOutcome, Player, PlayerRegistry,
    QuestionPool, QuestionRecord, Scheduler, SessionConfig, Timer, TimerHandle,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const FALLBACK_NAME: &str = "Guest";
const SHUTDOWN_NOTICE: &str = "Server is shutting down";

#[derive(Debug)]
pub struct ActiveRound {
    pub number: u64,
    pub question: Arc<QuestionRecord>,
    pub started_at: Instant,
    pub duration: Duration,
    /// Connected correct guessers in the order they answered.
    pub correct_guessers: Vec<ConnectionId>,
    /// Correct answers accepted so far, including players who have since
    /// left. Ranks come from here so a departure never frees up rank 1.
    pub correct_count: u32,
    countdown: Option<TimerHandle>,
    early_end: Option<TimerHandle>,
}

impl ActiveRound {
    /// Whole seconds left, rounded the way the countdown displays them.
    pub fn time_remaining(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs();
        let remaining = self.duration.as_secs().saturating_sub(elapsed);
        u32::try_from(remaining).unwrap_or(u32::MAX)
    }

    pub fn snapshot(&self, now: Instant) -> RoundSnapshot {
        RoundSnapshot {
            round_number: self.number,
            question: self.question.question.clone(),
            image_url: self.question.image_url.clone(),
            time_remaining: self.time_remaining(now),
        }
    }

    pub fn is_ending_early(&self) -> bool {
        self.early_end.is_some()
    }
}

#[derive(Debug)]
pub enum RoundPhase {
    Idle,
    Active(ActiveRound),
    Ending { round_number: u64 },
}

impl RoundPhase {
    pub fn kind(&self) -> RoundPhaseKind {
        match self {
            RoundPhase::Idle => RoundPhaseKind::Idle,
            RoundPhase::Active(_) => RoundPhaseKind::Active,
            RoundPhase::Ending { .. } => RoundPhaseKind::Ending,
        }
    }
}

/// The single game shared by every connected player.
///
/// All state changes go through `&mut self` methods, one event at a time.
/// Nothing here performs I/O: outbound messages go to the `EventSink` and
/// deferred work goes to the `Scheduler`, which hands `Timer`s back through
/// `handle_timer`.
pub struct GameSession {
    config: SessionConfig,
    pool: QuestionPool,
    registry: PlayerRegistry,
    cleanup: DisconnectCleanup,
    phase: RoundPhase,
    round_counter: u64,
    pending_start: Option<TimerHandle>,
    shut_down: bool,
    clock: Arc<dyn Clock>,
    sink: Box<dyn EventSink>,
    scheduler: Box<dyn Scheduler>,
}

impl GameSession {
    pub fn new(
        config: SessionConfig,
        pool: QuestionPool,
        clock: Arc<dyn Clock>,
        sink: Box<dyn EventSink>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let cleanup = DisconnectCleanup::new(config.grace_window);
        Self {
            config,
            pool,
            registry: PlayerRegistry::new(),
            cleanup,
            phase: RoundPhase::Idle,
            round_counter: 0,
            pending_start: None,
            shut_down: false,
            clock,
            sink,
            scheduler,
        }
    }

    pub fn join(
        &mut self,
        id: ConnectionId,
        name: &str,
        reconnect_token: Option<&str>,
    ) -> JoinOutcome {
        if self.shut_down {
            return JoinOutcome::AlreadyJoined;
        }

        let now = self.clock.now();
        let name = self.sanitize_name(name);
        let outcome = self.registry.register(
            id,
            name.clone(),
            reconnect_token,
            self.config.reconnect_policy,
            now,
        );
        if outcome == JoinOutcome::New {
            info!("Player '{}' joined as {}", name, id);
        }

        let players = self.registry.views();
        let token = self
            .registry
            .get(&id)
            .map(|player| player.reconnect_token.clone())
            .unwrap_or_default();

        self.sink.send_to(
            id,
            ServerMessage::PlayerJoined {
                player_id: id,
                reconnect_token: token,
                players: players.clone(),
            },
        );
        self.sink
            .broadcast_except(id, ServerMessage::PlayerListUpdate { players });

        match &self.phase {
            RoundPhase::Active(round) => {
                let snapshot = round.snapshot(now);
                self.sink.send_to(id, ServerMessage::RoundStart(snapshot));
            }
            RoundPhase::Idle if self.pending_start.is_none() => self.start_round(),
            _ => {}
        }

        outcome
    }

    pub fn submit_guess(&mut self, id: ConnectionId, guess: &str) {
        let now = self.clock.now();

        let round = match &mut self.phase {
            RoundPhase::Active(round) => round,
            _ => {
                debug!("Dropping guess from {}: no active round", id);
                return;
            }
        };

        let player = match self.registry.get_mut(&id) {
            Some(player) if player.is_present() => player,
            _ => {
                debug!("Dropping guess from unknown connection {}", id);
                return;
            }
        };
        player.last_seen = now;

        if player.has_submitted {
            self.sink.send_to(
                id,
                ServerMessage::AlreadyAnswered {
                    message: "You have already answered this round".to_string(),
                },
            );
            return;
        }
        // Set before validating so a burst of guesses counts once.
        player.has_submitted = true;

        if !GuessValidator::is_correct(guess, &round.question.answer) {
            let player_name = player.name.clone();
            self.sink.broadcast(ServerMessage::ChatMessage {
                player_name,
                message: guess.to_string(),
                is_wrong: true,
            });
            return;
        }

        round.correct_count += 1;
        round.correct_guessers.push(id);
        let rank = round.correct_count;
        let points = self.config.scoring.points_for_rank(rank);

        player.status = PlayerStatus::Answered;
        player.answered_this_round = true;
        player.score += points;
        let name = player.name.clone();
        let score = player.score;

        info!(
            "Round {}: '{}' answered correctly (rank {}, +{} points)",
            round.number, name, rank, points
        );

        self.sink
            .send_to(id, ServerMessage::CorrectGuessSelf { points, rank, score });
        self.sink.broadcast_except(
            id,
            ServerMessage::CorrectGuessOthers { name, points, rank },
        );
        self.broadcast_player_list();
        self.check_early_end();
    }

    pub fn heartbeat(&mut self, id: ConnectionId) {
        let now = self.clock.now();
        self.registry.touch(&id, now);
    }

    pub fn disconnect(&mut self, id: ConnectionId) {
        let now = self.clock.now();
        if !self.registry.mark_disconnected(&id, now) {
            return;
        }

        if let RoundPhase::Active(round) = &mut self.phase {
            round.correct_guessers.retain(|guesser| *guesser != id);
        }

        if let Some(player) = self.registry.get(&id) {
            info!(
                "Player '{}' ({}) disconnected, holding score {} for {:?}",
                player.name, id, player.score, self.config.grace_window
            );
        }

        // A round with no one left keeps running until its timer expires.
        self.broadcast_player_list();
        self.check_early_end();
    }

    pub fn handle_timer(&mut self, timer: Timer) {
        if self.shut_down {
            return;
        }

        match timer {
            Timer::CountdownTick { round_number } => self.on_countdown_tick(round_number),
            Timer::EarlyEnd { round_number } => {
                if self.active_round_number() == Some(round_number) {
                    self.end_round();
                } else {
                    debug!("Ignoring early end for finished round {}", round_number);
                }
            }
            Timer::NextRound => {
                self.pending_start = None;
                self.start_round();
            }
        }
    }

    /// Purge players past their grace window. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let purged = self.cleanup.purge_expired(&mut self.registry, now);
        if !purged.is_empty() {
            self.broadcast_player_list();
        }
        purged.len()
    }

    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(handle) = self.pending_start.take() {
            self.scheduler.cancel(handle);
        }
        if let RoundPhase::Active(round) = &mut self.phase {
            for handle in [round.countdown.take(), round.early_end.take()]
                .into_iter()
                .flatten()
            {
                self.scheduler.cancel(handle);
            }
        }
        self.phase = RoundPhase::Idle;

        info!("Session shutting down, notifying {} players", self.registry.present_count());
        self.sink.broadcast(ServerMessage::ServerShutdown {
            message: SHUTDOWN_NOTICE.to_string(),
        });
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            player_count: self.registry.present_count(),
            round_number: self.round_counter,
            phase: self.phase.kind(),
        }
    }

    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    pub fn current_round(&self) -> Option<&ActiveRound> {
        match &self.phase {
            RoundPhase::Active(round) => Some(round),
            _ => None,
        }
    }

    pub fn player(&self, id: &ConnectionId) -> Option<&Player> {
        self.registry.get(id)
    }

    pub fn players(&self) -> Vec<PlayerView> {
        self.registry.views()
    }

    pub fn is_start_pending(&self) -> bool {
        self.pending_start.is_some()
    }

    fn start_round(&mut self) {
        if self.shut_down {
            return;
        }
        if let RoundPhase::Active(round) = &self.phase {
            warn!("Round {} is still active, not starting another", round.number);
            return;
        }
        if let Some(handle) = self.pending_start.take() {
            self.scheduler.cancel(handle);
        }

        if self.registry.present_count() == 0 {
            info!("No active players, session going idle");
            self.phase = RoundPhase::Idle;
            return;
        }

        let question = match self.pool.next() {
            Some(question) => question,
            None => {
                error!(
                    "Failed to get a question for round {}, retrying in {:?}",
                    self.round_counter + 1,
                    self.config.question_retry_delay
                );
                self.phase = RoundPhase::Idle;
                self.pending_start = Some(
                    self.scheduler
                        .schedule(self.config.question_retry_delay, Timer::NextRound),
                );
                return;
            }
        };

        self.round_counter += 1;
        self.registry.reset_for_new_round();

        let now = self.clock.now();
        let number = self.round_counter;
        let countdown = self
            .scheduler
            .schedule(TICK_INTERVAL, Timer::CountdownTick { round_number: number });

        let round = ActiveRound {
            number,
            question,
            started_at: now,
            duration: self.config.round_duration,
            correct_guessers: Vec::new(),
            correct_count: 0,
            countdown: Some(countdown),
            early_end: None,
        };
        let snapshot = round.snapshot(now);
        info!(
            "Round {} started with question {} ({} players)",
            number,
            round.question.id,
            self.registry.present_count()
        );

        self.phase = RoundPhase::Active(round);
        self.sink.broadcast(ServerMessage::RoundStart(snapshot));
    }

    fn on_countdown_tick(&mut self, round_number: u64) {
        let now = self.clock.now();
        let remaining = match &mut self.phase {
            RoundPhase::Active(round) if round.number == round_number => {
                round.countdown = None;
                round.time_remaining(now)
            }
            _ => {
                debug!("Ignoring stale countdown tick for round {}", round_number);
                return;
            }
        };

        self.sink.broadcast(ServerMessage::TimerUpdate {
            seconds_remaining: remaining,
        });

        if remaining == 0 {
            self.end_round();
            return;
        }

        let handle = self
            .scheduler
            .schedule(TICK_INTERVAL, Timer::CountdownTick { round_number });
        if let RoundPhase::Active(round) = &mut self.phase {
            round.countdown = Some(handle);
        }
    }

    fn end_round(&mut self) {
        let round = match std::mem::replace(&mut self.phase, RoundPhase::Idle) {
            RoundPhase::Active(round) => round,
            other => {
                self.phase = other;
                return;
            }
        };

        for handle in [round.countdown, round.early_end].into_iter().flatten() {
            self.scheduler.cancel(handle);
        }

        let correct_guessers: Vec<String> = round
            .correct_guessers
            .iter()
            .map(|id| {
                self.registry
                    .get(id)
                    .map(|player| player.name.clone())
                    .unwrap_or_else(|| "Anonymous".to_string())
            })
            .collect();

        info!(
            "Round {} ended, answer '{}', {} correct",
            round.number,
            round.question.answer,
            correct_guessers.len()
        );

        self.sink.broadcast(ServerMessage::RoundEnd {
            answer: round.question.answer.to_string(),
            correct_guessers,
        });

        self.registry.settle_round();
        self.broadcast_player_list();

        self.phase = RoundPhase::Ending {
            round_number: round.number,
        };
        self.pending_start = Some(
            self.scheduler
                .schedule(self.config.intermission, Timer::NextRound),
        );
    }

    fn check_early_end(&mut self) {
        if !self.registry.all_present_answered() {
            return;
        }

        let grace = self.config.early_end_grace;
        if let RoundPhase::Active(round) = &mut self.phase {
            if round.early_end.is_none() {
                info!("Everyone answered round {}, ending early", round.number);
                round.early_end = Some(self.scheduler.schedule(
                    grace,
                    Timer::EarlyEnd {
                        round_number: round.number,
                    },
                ));
            }
        }
    }

    fn active_round_number(&self) -> Option<u64> {
        self.current_round().map(|round| round.number)
    }

    fn broadcast_player_list(&mut self) {
        let players = self.registry.views();
        self.sink
            .broadcast(ServerMessage::PlayerListUpdate { players });
    }

    fn sanitize_name(&self, name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return FALLBACK_NAME.to_string();
        }
        trimmed.chars().take(self.config.max_name_length).collect()
    }
}
