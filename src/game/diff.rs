//! Diff encoding: world state to wire records
//!
//! The encoder is stateless; it snapshots entities into `EntityRecord`s
//! for `Create` members and partial `EntityUpdate`s for `Update` members.
//! Stable entity ids are the correlation keys on both sides.

use crate::ws::protocol::{DiffEnvelope, EntityRecord, EntityUpdate};

use super::world::{Bullet, Enemy, EnemyGroup, Platform, PlatformGroup, Player, Ufo, World};

pub fn player_record(player: &Player) -> EntityRecord {
    EntityRecord::Player {
        id: player.id,
        coordinates: [player.rect.x, player.rect.y],
        health: player.health,
        score: player.score,
        lives: player.lives,
    }
}

pub fn enemy_record(enemy: &Enemy) -> EntityRecord {
    EntityRecord::Enemy {
        id: enemy.id,
        kind: enemy.kind,
        coordinates: [enemy.rect.x, enemy.rect.y],
        health: enemy.health,
    }
}

pub fn enemy_group_record(group: &EnemyGroup) -> EntityRecord {
    EntityRecord::EnemyGroup {
        id: group.id,
        objects: group.members.values().map(enemy_record).collect(),
    }
}

pub fn ufo_record(ufo: &Ufo) -> EntityRecord {
    EntityRecord::Ufo {
        id: ufo.id,
        coordinates: [ufo.rect.x, ufo.rect.y],
        health: ufo.health,
    }
}

pub fn platform_record(platform: &Platform) -> EntityRecord {
    EntityRecord::Platform {
        id: platform.id,
        coordinates: [platform.rect.x, platform.rect.y],
        health: platform.health,
    }
}

pub fn platform_group_record(group: &PlatformGroup) -> EntityRecord {
    EntityRecord::PlatformGroup {
        id: group.id,
        objects: group.members.values().map(platform_record).collect(),
    }
}

pub fn bullet_record(bullet: &Bullet) -> EntityRecord {
    EntityRecord::Bullet {
        id: bullet.id,
        coordinates: [bullet.rect.x, bullet.rect.y],
        speed: bullet.speed,
        direction: bullet.direction,
    }
}

pub fn player_update(player: &Player) -> EntityUpdate {
    EntityUpdate::Player {
        id: player.id,
        coordinates: [player.rect.x, player.rect.y],
        health: player.health,
        score: player.score,
        lives: player.lives,
    }
}

pub fn ufo_update(ufo: &Ufo) -> EntityUpdate {
    EntityUpdate::Ufo {
        id: ufo.id,
        coordinates: [ufo.rect.x, ufo.rect.y],
        health: ufo.health,
    }
}

/// Full `Create` snapshot sent once per world (re)creation
pub fn full_snapshot(world: &World) -> DiffEnvelope {
    DiffEnvelope {
        create: vec![
            player_record(&world.player),
            enemy_group_record(&world.enemies),
            ufo_record(&world.ufo),
            platform_group_record(&world.platforms),
        ],
        ..DiffEnvelope::default()
    }
}
