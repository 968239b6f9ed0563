//! Game session: one authoritative world, its scheduler and its player
//!
//! Everything for a session happens on one task: timers and inbound
//! events interleave but never overlap, which is why the world can be
//! mutated without locks. `advance(now)` is the synchronous driving entry
//! point; `run` is the real-time wrapper around it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{AuthBackend, User};
use crate::ws::protocol::{
    DiffEnvelope, EntityDelete, EntityId, EntityKind, EntityUpdate, GameOverReport, MoveDir,
    PlayerEvent, ServerMsg,
};

use super::collision;
use super::diff;
use super::scheduler::{Action, Scheduler};
use super::tuning::GameConfig;
use super::world::World;

/// Control messages delivered to a running session task
#[derive(Debug)]
pub enum SessionCommand {
    /// Player input; overwrites the buffered slot
    Input(PlayerEvent),
    /// Deliberate replacement: stop, persist the score, but send no
    /// terminal announcement
    Shutdown,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub username: String,
    pub command_tx: mpsc::Sender<SessionCommand>,
}

/// Registry of all active sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// One player's authoritative simulation
pub struct GameSession {
    pub id: Uuid,
    user: User,
    config: Arc<GameConfig>,
    pub world: World,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
    /// Single buffered input slot, last-write-wins
    input: PlayerEvent,
    out_tx: mpsc::UnboundedSender<ServerMsg>,
}

impl GameSession {
    /// Create the world, emit the full snapshot and arm the initial timers
    pub fn new(
        id: Uuid,
        user: User,
        config: Arc<GameConfig>,
        seed: u64,
        out_tx: mpsc::UnboundedSender<ServerMsg>,
    ) -> Self {
        let world = World::new(&config);
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(config.game.startup_delay_ms, Action::WorldTick);
        scheduler.schedule_at(formation_interval_ms(world.enemy_speed), Action::FormationTick);

        let session = Self {
            id,
            user,
            config,
            world,
            scheduler,
            rng: ChaCha8Rng::seed_from_u64(seed),
            input: PlayerEvent::default(),
            out_tx,
        };
        session.send(ServerMsg::GameAction(diff::full_snapshot(&session.world)));
        session
    }

    /// Overwrite the buffered input; a superseded event is never replayed
    pub fn handle_event(&mut self, event: PlayerEvent) {
        self.input = event;
    }

    /// Earliest pending deadline in session time (ms)
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Drain and apply every action due at or before `now`.
    /// Rescheduling uses each action's own fire time, so cadence does not
    /// drift when the driver wakes up late.
    pub fn advance(&mut self, now: u64) {
        while let Some((fired_at, action)) = self.scheduler.pop_due(now) {
            self.apply(action, fired_at);
        }
    }

    fn apply(&mut self, action: Action, now: u64) {
        match action {
            Action::WorldTick => self.world_tick(now),
            Action::FormationTick => self.formation_tick(now),
            Action::UnlockCannon => self.world.player.cannon_locked = false,
            Action::RemoveEnemy(enemy_id) => self.remove_enemy(enemy_id),
            Action::HideUfo => self.world.ufo.hide(),
            Action::RebirthPlayer => self.world.player.rebirth(),
            Action::EndGame(reason) => self.end_game(&reason),
        }
    }

    /// Deferred purge of a dead enemy. The enemy may already be gone if a
    /// wave transition rebuilt the group in the meantime; that is a no-op.
    fn remove_enemy(&mut self, enemy_id: EntityId) {
        if self.world.enemies.members.remove(&enemy_id).is_some() {
            let mut envelope = DiffEnvelope::default();
            envelope.delete.push(EntityDelete {
                kind: EntityKind::Enemy,
                id: enemy_id,
            });
            self.send(ServerMsg::GameAction(envelope));
        }
    }

    /// Open the formation gate and reschedule at the current speed, so a
    /// speed change takes effect on the very next firing.
    fn formation_tick(&mut self, now: u64) {
        self.world.enemies.grant_moving();
        if self.world.game_over {
            return;
        }
        self.scheduler.schedule_after(
            now,
            formation_interval_ms(self.world.enemy_speed),
            Action::FormationTick,
        );
    }

    fn world_tick(&mut self, now: u64) {
        if self.world.game_over {
            return;
        }
        self.scheduler
            .schedule_after(now, self.config.game.tick_interval_ms(), Action::WorldTick);

        // Frozen world while the death animation plays client-side
        if self.world.player.is_dead() {
            return;
        }

        if self.world.enemies.members.is_empty() {
            self.wave_transition();
            return;
        }

        let mut envelope = DiffEnvelope::default();

        // Player shoot; a locked cannon keeps the request buffered
        if self.input.player_shoot && !self.world.player.cannon_locked {
            self.input.player_shoot = false;
            let bullet_id = self.world.spawn_player_bullet(&self.config);
            envelope
                .create
                .push(diff::bullet_record(&self.world.bullets[&bullet_id]));
            self.world.player.cannon_locked = true;
            self.scheduler
                .schedule_after(now, self.config.player.shoot_delay_ms, Action::UnlockCannon);
        }

        // Probabilistic enemy shot from a random live enemy
        if self.rng.gen_bool(self.config.enemy.shoot_probability) {
            let shooters: Vec<EntityId> = self
                .world
                .enemies
                .members
                .values()
                .filter(|e| !e.is_dead())
                .map(|e| e.id)
                .collect();
            if !shooters.is_empty() {
                let shooter = shooters[self.rng.gen_range(0..shooters.len())];
                if let Some(bullet_id) = self.world.spawn_enemy_bullet(shooter, &self.config) {
                    envelope
                        .create
                        .push(diff::bullet_record(&self.world.bullets[&bullet_id]));
                    debug!(enemy = shooter.0, "enemy shoots");
                }
            }
        }

        // Movement phase
        self.world.player.apply_move(self.input.player_direction);
        self.input.player_direction = MoveDir::Stay;
        for bullet in self.world.bullets.values_mut() {
            bullet.advance();
        }
        let formation_step = self
            .world
            .enemies
            .step(self.config.game.display_size.0, &self.config.enemy);
        self.world.ufo.advance(self.config.enemy.ufo_speed);

        // Collision resolution; deferred consequences go on the scheduler
        let effects = collision::resolve(&mut self.world, &self.config);
        for deferred in effects.deferred {
            self.scheduler
                .schedule_after(now, deferred.delay_ms, deferred.action);
        }
        envelope.update.extend(effects.updates);
        envelope.delete.extend(effects.deletes);

        envelope.update.push(EntityUpdate::BulletGroup);
        envelope.update.push(diff::player_update(&self.world.player));
        if let Some((dx, dy)) = formation_step {
            envelope.update.push(EntityUpdate::EnemyGroup {
                id: self.world.enemies.id,
                coordinates: [dx, dy],
            });
        }
        envelope.update.push(diff::ufo_update(&self.world.ufo));

        // Probabilistic UFO takeoff while inactive
        if self.world.ufo.is_dead() && self.rng.gen_bool(self.config.enemy.ufo_probability) {
            self.world.ufo.activate(self.config.enemy.health);
            envelope.update.push(diff::ufo_update(&self.world.ufo));
            debug!("UFO created");
        }

        self.send(ServerMsg::GameAction(envelope));
    }

    /// The enemy set emptied: load the next wave, or end the game once the
    /// final wave is cleared. The partial diff carries only the fresh
    /// creations and the bullet purge.
    fn wave_transition(&mut self) {
        if self.world.current_wave >= self.config.game.max_waves {
            self.end_game("All waves cleared");
            return;
        }

        let mut envelope = DiffEnvelope::default();
        envelope.delete = self
            .world
            .bullets
            .keys()
            .map(|&id| EntityDelete {
                kind: EntityKind::Bullet,
                id,
            })
            .collect();

        info!(
            session_id = %self.id,
            wave = self.world.current_wave,
            score = self.world.player.score,
            "wave passed"
        );
        self.world.advance_wave(&self.config);

        envelope
            .create
            .push(diff::enemy_group_record(&self.world.enemies));
        envelope
            .create
            .push(diff::platform_group_record(&self.world.platforms));
        self.send(ServerMsg::GameAction(envelope));
    }

    /// Terminal: announce the result and raise the game-over flag so every
    /// periodic driver stops rescheduling itself.
    fn end_game(&mut self, reason: &str) {
        if self.world.game_over {
            return;
        }
        self.world.game_over = true;
        info!(
            session_id = %self.id,
            username = %self.user.username,
            score = self.world.player.score,
            reason,
            "game over"
        );
        self.send(ServerMsg::GameOver(GameOverReport {
            player_score: self.world.player.score,
            reason: reason.to_string(),
        }));
    }

    /// Outbound sends are fire-and-forget; a gone client is detected by
    /// the reader side and ends the session there.
    fn send(&self, msg: ServerMsg) {
        let _ = self.out_tx.send(msg);
    }

    pub fn is_over(&self) -> bool {
        self.world.game_over
    }

    pub fn final_score(&self) -> u32 {
        self.world.player.score
    }

    /// Real-time driver: sleep to the next deadline or take a command,
    /// whichever comes first. Returns once the game is over, the session
    /// is superseded, or the client is gone. A supersede stops quietly;
    /// `game_over` is reserved for genuine terminal states.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>, backend: AuthBackend) {
        info!(session_id = %self.id, username = %self.user.username, "session started");
        let started = tokio::time::Instant::now();

        loop {
            if self.world.game_over {
                break;
            }
            let Some(next_due) = self.scheduler.next_due() else {
                break;
            };
            let deadline = started + Duration::from_millis(next_due);

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let now = started.elapsed().as_millis() as u64;
                    self.advance(now);
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Input(event)) => self.handle_event(event),
                    Some(SessionCommand::Shutdown) => {
                        info!(session_id = %self.id, "session superseded");
                        break;
                    }
                    None => {
                        self.end_game("Game was crashed unexpectedly");
                        break;
                    }
                }
            }
        }

        let score = self.world.player.score;
        if let Err(e) = backend.update_highscore(&self.user, score).await {
            warn!(
                session_id = %self.id,
                username = %self.user.username,
                error = %e,
                "failed to persist highscore"
            );
        }
        info!(session_id = %self.id, score, "session ended");
    }
}

/// Formation timer period for a given speed in steps per second
fn formation_interval_ms(speed: f32) -> u64 {
    (1_000.0 / speed.max(0.001)).round() as u64
}
