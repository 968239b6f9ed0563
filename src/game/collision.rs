//! Collision and damage resolution for one world tick
//!
//! `resolve` mutates the world and reports what changed; delayed
//! consequences (death-animation removal, UFO re-hide, respawn,
//! termination) come back as deferred actions for the session to
//! schedule. Per bullet the checks run in a fixed priority order and the
//! first match wins, so a bullet is never resolved twice in one tick.

use tracing::debug;

use crate::ws::protocol::{EntityDelete, EntityKind, EntityUpdate};

use super::scheduler::Action;
use super::tuning::GameConfig;
use super::world::{Faction, World};

/// A one-shot to register on the session scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub delay_ms: u64,
    pub action: Action,
}

/// Changeset produced by one resolution pass
#[derive(Debug, Default)]
pub struct TickEffects {
    pub updates: Vec<EntityUpdate>,
    pub deletes: Vec<EntityDelete>,
    pub deferred: Vec<Deferred>,
}

pub fn resolve(world: &mut World, config: &GameConfig) -> TickEffects {
    let mut effects = TickEffects::default();
    let (display_width, display_height) = config.game.display_size;

    // UFO past the right edge counts as destroyed: back to the home
    // offset, indistinguishable from never having spawned.
    if world.ufo.rect.x > display_width {
        world.ufo.health = 0;
        world.ufo.hide();
        effects.updates.push(EntityUpdate::Ufo {
            id: world.ufo.id,
            coordinates: [world.ufo.rect.x, world.ufo.rect.y],
            health: world.ufo.health,
        });
        debug!("UFO out of screen");
    }

    // The player wraps around the horizontal edges
    if world.player.rect.x > display_width {
        world.player.rect.x = -world.player.rect.w;
    } else if world.player.rect.right() < 0 {
        world.player.rect.x = display_width;
    }

    let bullet_ids: Vec<_> = world.bullets.keys().copied().collect();
    for bullet_id in bullet_ids {
        let Some(bullet) = world.bullets.get(&bullet_id) else {
            continue;
        };
        let rect = bullet.rect;
        let strength = bullet.strength;
        let faction = bullet.faction;

        // Off the top or bottom of the playfield
        if rect.y > display_height || rect.bottom() < 0 {
            world.bullets.remove(&bullet_id);
            effects.deletes.push(EntityDelete {
                kind: EntityKind::Bullet,
                id: bullet_id,
            });
            debug!(bullet = bullet_id.0, "bullet out of screen");
            continue;
        }

        // Platforms shield both sides
        let hit_platform = world
            .platforms
            .members
            .values()
            .find(|p| p.rect.intersects(&rect))
            .map(|p| p.id);
        if let Some(platform_id) = hit_platform {
            let mut destroyed = false;
            if let Some(platform) = world.platforms.members.get_mut(&platform_id) {
                platform.hit(strength);
                effects.updates.push(EntityUpdate::Platform {
                    id: platform_id,
                    health: platform.health,
                });
                destroyed = platform.is_dead();
            }
            debug!(platform = platform_id.0, bullet = bullet_id.0, "platform hit");
            if destroyed {
                world.platforms.members.remove(&platform_id);
                effects.deletes.push(EntityDelete {
                    kind: EntityKind::Platform,
                    id: platform_id,
                });
            }
            world.bullets.remove(&bullet_id);
            effects.deletes.push(EntityDelete {
                kind: EntityKind::Bullet,
                id: bullet_id,
            });
            continue;
        }

        // UFO, cannon fire only
        if faction == Faction::Cannon && !world.ufo.is_dead() && rect.intersects(&world.ufo.rect) {
            world.ufo.hit(strength);
            world.player.score += world.ufo.points;
            effects.updates.push(EntityUpdate::Ufo {
                id: world.ufo.id,
                coordinates: [world.ufo.rect.x, world.ufo.rect.y],
                health: world.ufo.health,
            });
            effects.deferred.push(Deferred {
                delay_ms: config.enemy.ufo_hide_delay_ms,
                action: Action::HideUfo,
            });
            world.bullets.remove(&bullet_id);
            effects.deletes.push(EntityDelete {
                kind: EntityKind::Bullet,
                id: bullet_id,
            });
            debug!("UFO hit");
            continue;
        }

        // Enemies, cannon fire only; dead placeholders are already
        // zero-size and cannot match
        if faction == Faction::Cannon {
            let hit_enemy = world
                .enemies
                .members
                .values()
                .find(|e| !e.is_dead() && e.rect.intersects(&rect))
                .map(|e| e.id);
            if let Some(enemy_id) = hit_enemy {
                let mut killed_points = None;
                if let Some(enemy) = world.enemies.members.get_mut(&enemy_id) {
                    enemy.hit(strength);
                    effects.updates.push(EntityUpdate::Enemy {
                        id: enemy_id,
                        health: enemy.health,
                    });
                    if enemy.is_dead() {
                        killed_points = Some(enemy.points);
                    }
                }
                debug!(enemy = enemy_id.0, "enemy hit");
                if let Some(points) = killed_points {
                    world.player.score += points;
                    world.destroyed_in_wave += 1;
                    world.recompute_enemy_speed(&config.enemy);
                    effects.deferred.push(Deferred {
                        delay_ms: config.enemy.death_delay_ms,
                        action: Action::RemoveEnemy(enemy_id),
                    });
                }
                world.bullets.remove(&bullet_id);
                effects.deletes.push(EntityDelete {
                    kind: EntityKind::Bullet,
                    id: bullet_id,
                });
                continue;
            }
        }

        // The player, invader fire only
        if faction == Faction::Invader && rect.intersects(&world.player.rect) {
            world.player.hit(strength);
            world.bullets.remove(&bullet_id);
            effects.deletes.push(EntityDelete {
                kind: EntityKind::Bullet,
                id: bullet_id,
            });
            debug!(health = world.player.health, "player hit");
            if world.player.is_dead() {
                if world.player.lives > 0 {
                    effects.deferred.push(Deferred {
                        delay_ms: config.player.rebirth_delay_ms,
                        action: Action::RebirthPlayer,
                    });
                } else {
                    effects.deferred.push(Deferred {
                        delay_ms: config.game.game_over_delay_ms,
                        action: Action::EndGame("All cannons were destroyed".to_string()),
                    });
                }
            }
        }
    }

    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tuning::GameConfig;
    use crate::game::world::{Bullet, Faction, Rect, World};
    use crate::ws::protocol::BulletDir;

    fn config() -> GameConfig {
        GameConfig::default()
    }

    fn world() -> World {
        World::new(&config())
    }

    fn place_bullet(world: &mut World, rect: Rect, faction: Faction, strength: i32) -> crate::ws::protocol::EntityId {
        let id = world.ids.alloc();
        world.bullets.insert(
            id,
            Bullet {
                id,
                rect,
                speed: 10,
                strength,
                direction: match faction {
                    Faction::Cannon => BulletDir::Up,
                    Faction::Invader => BulletDir::Down,
                },
                faction,
            },
        );
        id
    }

    #[test]
    fn bullets_never_damage_their_own_faction() {
        let cfg = config();
        let mut w = world();
        // Clear platforms so nothing shields the shots
        w.platforms.members.clear();

        // Cannon bullet sitting on the player
        let player_rect = w.player.rect;
        place_bullet(&mut w, player_rect, Faction::Cannon, 100);
        // Invader bullet sitting on an enemy
        let enemy_rect = w.enemies.members.values().next().unwrap().rect;
        place_bullet(&mut w, enemy_rect, Faction::Invader, 100);

        let health_before = w.player.health;
        resolve(&mut w, &cfg);

        assert_eq!(w.player.health, health_before);
        assert!(w.enemies.members.values().all(|e| !e.is_dead()));
    }

    #[test]
    fn a_bullet_resolves_at_most_once_per_tick() {
        let cfg = config();
        let mut w = world();

        // Overlap a platform and the player simultaneously; platform has
        // higher priority, so the player must stay unharmed.
        let platform_rect = w.platforms.members.values().next().unwrap().rect;
        w.player.rect = platform_rect;
        let bullet_id = place_bullet(&mut w, platform_rect, Faction::Invader, 10);

        let health_before = w.player.health;
        let effects = resolve(&mut w, &cfg);

        assert!(w.bullets.get(&bullet_id).is_none());
        assert_eq!(w.player.health, health_before);
        let bullet_deletes = effects
            .deletes
            .iter()
            .filter(|d| d.kind == EntityKind::Bullet)
            .count();
        assert_eq!(bullet_deletes, 1);
    }

    #[test]
    fn offscreen_bullets_are_deleted() {
        let cfg = config();
        let mut w = world();
        let id = place_bullet(
            &mut w,
            Rect::new(100, -40, 3, 20),
            Faction::Cannon,
            100,
        );

        let effects = resolve(&mut w, &cfg);
        assert!(w.bullets.is_empty());
        assert!(effects
            .deletes
            .contains(&EntityDelete { kind: EntityKind::Bullet, id }));
    }

    #[test]
    fn killing_an_enemy_awards_points_and_defers_removal() {
        let cfg = config();
        let mut w = world();
        let enemy_id = *w.enemies.members.keys().next().unwrap();
        let enemy_rect = w.enemies.members[&enemy_id].rect;
        let points = w.enemies.members[&enemy_id].points;

        place_bullet(&mut w, enemy_rect, Faction::Cannon, cfg.enemy.health);
        let speed_before = w.enemy_speed;
        let effects = resolve(&mut w, &cfg);

        assert_eq!(w.player.score, points);
        assert_eq!(w.destroyed_in_wave, 1);
        assert!(w.enemy_speed > speed_before);
        // Still present, zero-size, awaiting deferred removal
        assert!(w.enemies.members[&enemy_id].is_dead());
        assert!(effects.deferred.contains(&Deferred {
            delay_ms: cfg.enemy.death_delay_ms,
            action: Action::RemoveEnemy(enemy_id),
        }));
    }

    #[test]
    fn live_ufo_hit_awards_points_and_defers_hide() {
        let cfg = config();
        let mut w = world();
        w.ufo.activate(cfg.enemy.health);
        w.ufo.rect.x = 300;
        w.ufo.rect.y = 40;

        let ufo_rect = w.ufo.rect;
        place_bullet(&mut w, ufo_rect, Faction::Cannon, cfg.enemy.health);
        let effects = resolve(&mut w, &cfg);

        assert!(w.ufo.is_dead());
        assert_eq!(w.player.score, cfg.enemy.ufo_points);
        assert!(effects.deferred.contains(&Deferred {
            delay_ms: cfg.enemy.ufo_hide_delay_ms,
            action: Action::HideUfo,
        }));
    }

    #[test]
    fn ufo_leaving_the_screen_counts_as_destroyed() {
        let cfg = config();
        let mut w = world();
        w.ufo.activate(cfg.enemy.health);
        w.ufo.rect.x = cfg.game.display_size.0 + 1;

        resolve(&mut w, &cfg);
        assert!(w.ufo.is_dead());
        assert_eq!((w.ufo.rect.x, w.ufo.rect.y), w.ufo.home);
    }

    #[test]
    fn fatal_hit_with_no_lives_left_schedules_termination() {
        let cfg = config();
        let mut w = world();
        w.player.lives = 1;
        w.player.health = 1;

        let player_rect = w.player.rect;
        place_bullet(&mut w, player_rect, Faction::Invader, 1);
        let effects = resolve(&mut w, &cfg);

        assert!(w.player.is_dead());
        assert_eq!(w.player.lives, 0);
        assert!(effects.deferred.contains(&Deferred {
            delay_ms: cfg.game.game_over_delay_ms,
            action: Action::EndGame("All cannons were destroyed".to_string()),
        }));
    }

    #[test]
    fn fatal_hit_with_lives_remaining_schedules_rebirth() {
        let cfg = config();
        let mut w = world();
        w.player.health = 1;

        let player_rect = w.player.rect;
        place_bullet(&mut w, player_rect, Faction::Invader, 1);
        let effects = resolve(&mut w, &cfg);

        assert!(w.player.is_dead());
        assert!(effects.deferred.contains(&Deferred {
            delay_ms: cfg.player.rebirth_delay_ms,
            action: Action::RebirthPlayer,
        }));
    }

    #[test]
    fn player_wraps_around_horizontal_edges() {
        let cfg = config();
        let mut w = world();

        w.player.rect.x = cfg.game.display_size.0 + 5;
        resolve(&mut w, &cfg);
        assert_eq!(w.player.rect.x, -w.player.rect.w);

        w.player.rect.x = -w.player.rect.w - 5;
        resolve(&mut w, &cfg);
        assert_eq!(w.player.rect.x, cfg.game.display_size.0);
    }
}
