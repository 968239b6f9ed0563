//! End-to-end simulation scenarios driven through the public session API
//! with a virtual clock, plus a client-side replica that replays the diff
//! stream and must converge on the authoritative state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use invaders_server::game::world::{Bullet, Faction};
use invaders_server::game::{GameConfig, GameSession, SessionCommand};
use invaders_server::store::{AuthBackend, User};
use invaders_server::ws::protocol::{
    BulletDir, DiffEnvelope, EntityRecord, EntityUpdate, MoveDir, PlayerEvent, ServerMsg,
};

/// Config with randomness disabled so every scenario is reproducible
fn quiet_config() -> Arc<GameConfig> {
    let mut config = GameConfig::default();
    config.enemy.shoot_probability = 0.0;
    config.enemy.ufo_probability = 0.0;
    Arc::new(config)
}

fn start_session(config: Arc<GameConfig>) -> (GameSession, mpsc::UnboundedReceiver<ServerMsg>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let user = User {
        username: "pilot".to_string(),
    };
    let session = GameSession::new(Uuid::new_v4(), user, config, 42, out_tx);
    (session, out_rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[test]
fn clearing_the_last_enemy_advances_the_wave() {
    let config = quiet_config();
    let (mut session, mut rx) = start_session(config.clone());
    drain(&mut rx);

    // A stray bullet that must be purged by the transition
    let bullet_id = session.world.spawn_player_bullet(&config);
    session.world.enemies.members.clear();
    session.world.enemy_speed = 5.0;
    session.world.destroyed_in_wave = 13;

    session.advance(config.game.startup_delay_ms);

    assert_eq!(session.world.current_wave, 2);
    assert_eq!(session.world.enemy_speed, config.enemy.base_speed);
    assert_eq!(session.world.destroyed_in_wave, 0);
    assert!(session.world.bullets.is_empty());
    assert!(!session.world.enemies.members.is_empty());

    let transition = drain(&mut rx)
        .into_iter()
        .find_map(|msg| match msg {
            ServerMsg::GameAction(diff) if !diff.create.is_empty() => Some(diff),
            _ => None,
        })
        .expect("no wave transition diff emitted");

    assert!(transition.delete.iter().any(|d| d.id == bullet_id));
    assert!(transition
        .create
        .iter()
        .any(|r| matches!(r, EntityRecord::EnemyGroup { .. })));
    assert!(transition
        .create
        .iter()
        .any(|r| matches!(r, EntityRecord::PlatformGroup { .. })));
}

#[test]
fn losing_the_last_life_ends_the_game() {
    let config = quiet_config();
    let (mut session, mut rx) = start_session(config.clone());
    drain(&mut rx);

    session.world.player.lives = 1;
    session.world.player.health = 1;
    session.world.player.score = 310;

    // A hovering invader bullet right on top of the cannon
    let id = session.world.ids.alloc();
    session.world.bullets.insert(
        id,
        Bullet {
            id,
            rect: session.world.player.rect,
            speed: 0,
            strength: 1,
            direction: BulletDir::Down,
            faction: Faction::Invader,
        },
    );

    let first_tick = config.game.startup_delay_ms;
    session.advance(first_tick);
    assert!(session.world.player.is_dead());
    assert_eq!(session.world.player.lives, 0);
    assert!(!session.is_over());

    // Termination is delayed so the client can play the explosion
    session.advance(first_tick + config.game.game_over_delay_ms);
    assert!(session.is_over());
    assert_eq!(session.final_score(), 310);

    let report = drain(&mut rx)
        .into_iter()
        .find_map(|msg| match msg {
            ServerMsg::GameOver(report) => Some(report),
            _ => None,
        })
        .expect("no game over message");
    assert_eq!(report.reason, "All cannons were destroyed");
    assert_eq!(report.player_score, 310);

    // Every periodic driver has stopped rescheduling itself
    session.advance(first_tick + 120_000);
    assert!(session.next_deadline().is_none());
}

#[test]
fn destroying_the_ufo_awards_points_and_rehides_it() {
    let config = quiet_config();
    let (mut session, mut rx) = start_session(config.clone());
    drain(&mut rx);

    session.world.ufo.activate(config.enemy.health);
    session.world.ufo.rect.x = 300;
    session.world.ufo.rect.y = 40;

    let id = session.world.ids.alloc();
    session.world.bullets.insert(
        id,
        Bullet {
            id,
            rect: session.world.ufo.rect,
            speed: 0,
            strength: config.enemy.health,
            direction: BulletDir::Up,
            faction: Faction::Cannon,
        },
    );

    let first_tick = config.game.startup_delay_ms;
    session.advance(first_tick);

    assert!(session.world.ufo.is_dead());
    assert_eq!(session.world.player.score, config.enemy.ufo_points);
    // Not yet back home; the hide is deferred
    assert_ne!(
        (session.world.ufo.rect.x, session.world.ufo.rect.y),
        session.world.ufo.home
    );

    session.advance(first_tick + config.enemy.ufo_hide_delay_ms);
    assert_eq!(
        (session.world.ufo.rect.x, session.world.ufo.rect.y),
        session.world.ufo.home
    );

    let saw_ufo_update = drain(&mut rx).into_iter().any(|msg| match msg {
        ServerMsg::GameAction(diff) => diff
            .update
            .iter()
            .any(|u| matches!(u, EntityUpdate::Ufo { health, .. } if *health <= 0)),
        _ => false,
    });
    assert!(saw_ufo_update);
}

// Nothing listens on this port; highscore persistence fails fast and is
// only logged.
fn unreachable_backend() -> AuthBackend {
    AuthBackend::with_base_url("http://127.0.0.1:9")
}

#[tokio::test]
async fn superseded_session_skips_the_terminal_announcement() {
    let (mut session, mut rx) = start_session(quiet_config());
    session.world.player.score = 150;

    let (command_tx, command_rx) = mpsc::channel(8);
    command_tx
        .send(SessionCommand::Shutdown)
        .await
        .expect("session command channel closed");
    session.run(command_rx, unreachable_backend()).await;

    // The opening snapshot is the only traffic; a deliberately replaced
    // session must not race a game_over against the next world's snapshot
    let msgs = drain(&mut rx);
    assert!(matches!(msgs.first(), Some(ServerMsg::GameAction(_))));
    assert!(msgs
        .iter()
        .all(|msg| !matches!(msg, ServerMsg::GameOver(_))));
}

#[tokio::test]
async fn lost_connection_reports_a_crashed_game() {
    let (session, mut rx) = start_session(quiet_config());

    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(8);
    drop(command_tx);
    session.run(command_rx, unreachable_backend()).await;

    let report = drain(&mut rx)
        .into_iter()
        .find_map(|msg| match msg {
            ServerMsg::GameOver(report) => Some(report),
            _ => None,
        })
        .expect("no game over message");
    assert_eq!(report.reason, "Game was crashed unexpectedly");
}

/// Minimal client-side mirror that applies the diff stream
#[derive(Default)]
struct Replica {
    player: Option<([i32; 2], i32, u32, u32)>,
    enemies: BTreeMap<u64, ([i32; 2], i32)>,
    bullets: BTreeMap<u64, ([i32; 2], i32, BulletDir)>,
    platforms: BTreeMap<u64, i32>,
    ufo: Option<([i32; 2], i32)>,
}

impl Replica {
    fn apply_record(&mut self, record: &EntityRecord) {
        match record {
            EntityRecord::Player {
                coordinates,
                health,
                score,
                lives,
                ..
            } => self.player = Some((*coordinates, *health, *score, *lives)),
            EntityRecord::Enemy {
                id,
                coordinates,
                health,
                ..
            } => {
                self.enemies.insert(id.0, (*coordinates, *health));
            }
            EntityRecord::Ufo {
                coordinates,
                health,
                ..
            } => self.ufo = Some((*coordinates, *health)),
            EntityRecord::Platform { id, health, .. } => {
                self.platforms.insert(id.0, *health);
            }
            EntityRecord::EnemyGroup { objects, .. }
            | EntityRecord::PlatformGroup { objects, .. } => {
                for inner in objects {
                    self.apply_record(inner);
                }
            }
            EntityRecord::Bullet {
                id,
                coordinates,
                speed,
                direction,
            } => {
                self.bullets.insert(id.0, (*coordinates, *speed, *direction));
            }
        }
    }

    fn apply(&mut self, diff: &DiffEnvelope) {
        // On a fresh snapshot the groups replace whatever was there
        for record in &diff.create {
            match record {
                EntityRecord::EnemyGroup { .. } => self.enemies.clear(),
                EntityRecord::PlatformGroup { .. } => self.platforms.clear(),
                _ => {}
            }
            self.apply_record(record);
        }

        for update in &diff.update {
            match update {
                EntityUpdate::Player {
                    coordinates,
                    health,
                    score,
                    lives,
                    ..
                } => self.player = Some((*coordinates, *health, *score, *lives)),
                EntityUpdate::Enemy { id, health } => {
                    if let Some(entry) = self.enemies.get_mut(&id.0) {
                        entry.1 = *health;
                    }
                }
                EntityUpdate::Ufo {
                    coordinates,
                    health,
                    ..
                } => self.ufo = Some((*coordinates, *health)),
                EntityUpdate::Platform { id, health } => {
                    if let Some(entry) = self.platforms.get_mut(&id.0) {
                        *entry = *health;
                    }
                }
                EntityUpdate::EnemyGroup { coordinates, .. } => {
                    let [dx, dy] = coordinates;
                    for (pos, _) in self.enemies.values_mut() {
                        pos[0] += dx;
                        pos[1] += dy;
                    }
                }
                EntityUpdate::BulletGroup => {
                    for (pos, speed, direction) in self.bullets.values_mut() {
                        match direction {
                            BulletDir::Up => pos[1] -= *speed,
                            BulletDir::Down => pos[1] += *speed,
                        }
                    }
                }
            }
        }

        // Deleting an already-deleted entity is a no-op
        for delete in &diff.delete {
            self.enemies.remove(&delete.id.0);
            self.bullets.remove(&delete.id.0);
            self.platforms.remove(&delete.id.0);
        }
    }
}

#[test]
fn diff_stream_replica_matches_authoritative_state() {
    let config = quiet_config();
    let (mut session, mut rx) = start_session(config.clone());
    let mut replica = Replica::default();

    let mut apply_pending = |replica: &mut Replica, rx: &mut mpsc::UnboundedReceiver<ServerMsg>| {
        for msg in drain(rx) {
            if let ServerMsg::GameAction(diff) = msg {
                replica.apply(&diff);
            }
        }
    };
    apply_pending(&mut replica, &mut rx);

    // A couple dozen ticks of movement and shooting
    let tick = config.game.tick_interval_ms();
    let mut now = config.game.startup_delay_ms;
    for step in 0..24u64 {
        session.handle_event(PlayerEvent {
            player_shoot: step % 5 == 0,
            player_direction: if step % 2 == 0 {
                MoveDir::Right
            } else {
                MoveDir::Left
            },
        });
        session.advance(now);
        apply_pending(&mut replica, &mut rx);
        now += tick;
    }

    let (coords, health, score, lives) = replica.player.expect("replica never saw the player");
    assert_eq!(coords, [session.world.player.rect.x, session.world.player.rect.y]);
    assert_eq!(health, session.world.player.health);
    assert_eq!(score, session.world.player.score);
    assert_eq!(lives, session.world.player.lives);

    // Dead enemies collapse to zero-size placeholders server-side while
    // the wire only carries their health, so only live entities are
    // position-consistent.
    let authoritative_enemies: Vec<(u64, [i32; 2], i32)> = session
        .world
        .enemies
        .members
        .values()
        .filter(|e| !e.is_dead())
        .map(|e| (e.id.0, [e.rect.x, e.rect.y], e.health))
        .collect();
    let replica_enemies: Vec<(u64, [i32; 2], i32)> = replica
        .enemies
        .iter()
        .filter(|(_, &(_, health))| health > 0)
        .map(|(&id, &(pos, health))| (id, pos, health))
        .collect();
    assert_eq!(replica_enemies, authoritative_enemies);

    let authoritative_bullets: Vec<(u64, [i32; 2])> = session
        .world
        .bullets
        .values()
        .map(|b| (b.id.0, [b.rect.x, b.rect.y]))
        .collect();
    let replica_bullets: Vec<(u64, [i32; 2])> = replica
        .bullets
        .iter()
        .map(|(&id, &(pos, _, _))| (id, pos))
        .collect();
    assert_eq!(replica_bullets, authoritative_bullets);

    let (ufo_coords, ufo_health) = replica.ufo.expect("replica never saw the UFO");
    assert_eq!(
        ufo_coords,
        [session.world.ufo.rect.x, session.world.ufo.rect.y]
    );
    assert_eq!(ufo_health, session.world.ufo.health);
}

#[test]
fn reapplying_a_delete_is_a_noop() {
    let config = quiet_config();
    let (mut session, mut rx) = start_session(config.clone());
    let mut replica = Replica::default();
    for msg in drain(&mut rx) {
        if let ServerMsg::GameAction(diff) = msg {
            replica.apply(&diff);
        }
    }

    // A bullet flying off the top of the screen produces a delete diff
    let bullet_id = session.world.spawn_player_bullet(&config);
    if let Some(bullet) = session.world.bullets.get_mut(&bullet_id) {
        bullet.rect.y = -100;
    }
    session.advance(config.game.startup_delay_ms);

    let mut delete_diff = None;
    for msg in drain(&mut rx) {
        if let ServerMsg::GameAction(diff) = msg {
            if diff.delete.iter().any(|d| d.id == bullet_id) {
                delete_diff = Some(diff.clone());
            }
            replica.apply(&diff);
        }
    }
    let delete_diff = delete_diff.expect("no delete diff for the off-screen bullet");
    assert!(!replica.bullets.contains_key(&bullet_id.0));

    // Replaying just the deletes must change nothing the second time
    let replay = DiffEnvelope {
        delete: delete_diff.delete.clone(),
        ..DiffEnvelope::default()
    };
    let enemies_before = replica.enemies.clone();
    let bullets_before = replica.bullets.clone();
    replica.apply(&replay);
    assert_eq!(replica.enemies, enemies_before);
    assert_eq!(replica.bullets, bullets_before);
}
