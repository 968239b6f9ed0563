//! World model: entities, groups and wave loading
//!
//! Entities are plain structs over a shared `Rect`; diff-visible
//! collections are maps keyed by stable `EntityId`. All behavior here is
//! local mutation; cross-entity resolution lives in `collision`.

use std::collections::BTreeMap;

use crate::ws::protocol::{BulletDir, EnemyKind, EntityId, MoveDir};

use super::tuning::{EnemyTuning, GameConfig, WaveLayout};

/// Integer pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.x += dx;
        self.y += dy;
    }

    /// Axis-aligned overlap test; zero-size rects never intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.w > 0
            && self.h > 0
            && other.w > 0
            && other.h > 0
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Monotonic identity source for one session; ids are never reused
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn alloc(&mut self) -> EntityId {
        self.next += 1;
        EntityId(self.next)
    }
}

/// Which side fired a bullet; bullets never damage their own faction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Cannon,
    Invader,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: EntityId,
    pub rect: Rect,
    pub speed: i32,
    pub health: i32,
    pub max_health: i32,
    pub lives: u32,
    pub score: u32,
    pub cannon_locked: bool,
}

impl Player {
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn apply_move(&mut self, direction: MoveDir) {
        match direction {
            MoveDir::Left => self.rect.x -= self.speed,
            MoveDir::Right => self.rect.x += self.speed,
            MoveDir::Stay => {}
        }
    }

    /// A lethal hit also costs one life
    pub fn hit(&mut self, strength: i32) {
        self.health -= strength;
        if self.is_dead() {
            self.lives = self.lives.saturating_sub(1);
        }
    }

    /// Respawn at full health with an unlocked cannon; lives are untouched
    pub fn rebirth(&mut self) {
        self.health = self.max_health;
        self.cannon_locked = false;
    }
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: EntityId,
    pub rect: Rect,
    pub speed: i32,
    pub strength: i32,
    pub direction: BulletDir,
    pub faction: Faction,
}

impl Bullet {
    pub const SIZE: (i32, i32) = (3, 20);

    /// Fired upward from the top center of the firer
    pub fn fired_up(id: EntityId, from: &Rect, speed: i32, strength: i32, faction: Faction) -> Self {
        let (cx, _) = from.center();
        Self {
            id,
            rect: Rect::new(cx - Self::SIZE.0 / 2, from.y - Self::SIZE.1, Self::SIZE.0, Self::SIZE.1),
            speed,
            strength,
            direction: BulletDir::Up,
            faction,
        }
    }

    /// Fired downward from the bottom center of the firer
    pub fn fired_down(
        id: EntityId,
        from: &Rect,
        speed: i32,
        strength: i32,
        faction: Faction,
    ) -> Self {
        let (cx, _) = from.center();
        Self {
            id,
            rect: Rect::new(cx - Self::SIZE.0 / 2, from.bottom(), Self::SIZE.0, Self::SIZE.1),
            speed,
            strength,
            direction: BulletDir::Down,
            faction,
        }
    }

    pub fn advance(&mut self) {
        match self.direction {
            BulletDir::Up => self.rect.y -= self.speed,
            BulletDir::Down => self.rect.y += self.speed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub rect: Rect,
    pub kind: EnemyKind,
    pub health: i32,
    pub points: u32,
}

impl Enemy {
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// On death the rect collapses to a zero-size placeholder at the death
    /// position, so the corpse keeps its identity for the client's death
    /// animation but no longer participates in collisions.
    pub fn hit(&mut self, strength: i32) {
        self.health -= strength;
        if self.is_dead() {
            let (cx, cy) = self.rect.center();
            self.rect = Rect::new(cx, cy, 0, 0);
        }
    }
}

/// Shared horizontal direction of the enemy formation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationDir {
    Right,
    Left,
}

#[derive(Debug)]
pub struct EnemyGroup {
    pub id: EntityId,
    pub direction: FormationDir,
    /// Gate opened by the formation timer; collapses bursts into one step
    pub moving: bool,
    pub members: BTreeMap<EntityId, Enemy>,
}

impl EnemyGroup {
    pub fn load(ids: &mut IdAllocator, layout: &WaveLayout, tuning: &EnemyTuning) -> Self {
        let id = ids.alloc();
        let mut members = BTreeMap::new();
        for row in &layout.rows {
            let (w, h) = tuning.size_of(row.kind);
            let (base_x, base_y) = row.base_offset;
            for i in 0..row.count as i32 {
                let enemy_id = ids.alloc();
                members.insert(
                    enemy_id,
                    Enemy {
                        id: enemy_id,
                        rect: Rect::new(base_x + i * (w + row.distance), base_y, w, h),
                        kind: row.kind,
                        health: tuning.health,
                        points: tuning.points_of(row.kind),
                    },
                );
            }
        }
        Self {
            id,
            direction: FormationDir::Right,
            moving: true,
            members,
        }
    }

    /// Open the movement gate; the next world tick performs one shared step
    pub fn grant_moving(&mut self) {
        self.moving = true;
    }

    /// Perform at most one group-wide translation and close the gate.
    /// Returns the applied (dx, dy) delta, or None when the gate was shut
    /// or the formation is empty.
    pub fn step(&mut self, display_width: i32, tuning: &EnemyTuning) -> Option<(i32, i32)> {
        if !self.moving {
            return None;
        }
        self.moving = false;
        if self.members.is_empty() {
            return None;
        }

        let left = self.members.values().map(|e| e.rect.x).min()?;
        let right = self.members.values().map(|e| e.rect.right()).max()?;
        let bottom = self.members.values().map(|e| e.rect.bottom()).max()?;

        // Project the next horizontal step to detect an edge bounce
        let (next_left, next_right) = match self.direction {
            FormationDir::Right => (left + tuning.step_x, right + tuning.step_x),
            FormationDir::Left => (left - tuning.step_x, right - tuning.step_x),
        };

        let mut descend = false;
        if next_left < 0 || next_right > display_width {
            self.direction = match self.direction {
                FormationDir::Right => FormationDir::Left,
                FormationDir::Left => FormationDir::Right,
            };
            if bottom < tuning.max_y {
                descend = true;
            }
        }

        let delta = if descend {
            (0, tuning.step_y)
        } else {
            match self.direction {
                FormationDir::Right => (tuning.step_x, 0),
                FormationDir::Left => (-tuning.step_x, 0),
            }
        };

        for enemy in self.members.values_mut() {
            enemy.rect.translate(delta.0, delta.1);
        }
        Some(delta)
    }
}

#[derive(Debug, Clone)]
pub struct Platform {
    pub id: EntityId,
    pub rect: Rect,
    pub health: i32,
}

impl Platform {
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn hit(&mut self, strength: i32) {
        self.health -= strength;
    }
}

#[derive(Debug)]
pub struct PlatformGroup {
    pub id: EntityId,
    pub members: BTreeMap<EntityId, Platform>,
}

impl PlatformGroup {
    /// Platforms are spread evenly across the playfield width
    pub fn load(ids: &mut IdAllocator, config: &GameConfig) -> Self {
        let id = ids.alloc();
        let (display_width, _) = config.game.display_size;
        let (w, h) = config.platform.size;
        let count = config.layout.platform_count as i32;
        let gap = (display_width - count * w) / (count + 1);

        let mut members = BTreeMap::new();
        for i in 0..count {
            let platform_id = ids.alloc();
            members.insert(
                platform_id,
                Platform {
                    id: platform_id,
                    rect: Rect::new(gap + i * (gap + w), config.platform.y_position, w, h),
                    health: config.platform.health,
                },
            );
        }
        Self { id, members }
    }
}

/// Singleton bonus saucer. "Inactive" and "destroyed" share one
/// representation: health <= 0, distinguished only by position (home
/// offset vs last flight position).
#[derive(Debug, Clone)]
pub struct Ufo {
    pub id: EntityId,
    pub rect: Rect,
    pub home: (i32, i32),
    pub health: i32,
    pub points: u32,
}

impl Ufo {
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Take off from the home offset; only fires while dead/inactive
    pub fn activate(&mut self, health: i32) {
        if self.is_dead() {
            self.rect.x = self.home.0;
            self.rect.y = self.home.1;
            self.health = health;
        }
    }

    pub fn advance(&mut self, speed: i32) {
        if !self.is_dead() {
            self.rect.x += speed;
        }
    }

    pub fn hide(&mut self) {
        self.rect.x = self.home.0;
        self.rect.y = self.home.1;
    }

    pub fn hit(&mut self, strength: i32) {
        self.health -= strength;
    }
}

/// The authoritative world owned by one session
#[derive(Debug)]
pub struct World {
    pub ids: IdAllocator,
    pub player: Player,
    pub ufo: Ufo,
    pub enemies: EnemyGroup,
    pub platforms: PlatformGroup,
    pub bullets: BTreeMap<EntityId, Bullet>,
    pub enemy_speed: f32,
    pub current_wave: u32,
    pub base_enemy_count: usize,
    pub destroyed_in_wave: usize,
    pub game_over: bool,
}

impl World {
    pub fn new(config: &GameConfig) -> Self {
        let mut ids = IdAllocator::default();

        let player_id = ids.alloc();
        let (pw, ph) = config.player.size;
        let player = Player {
            id: player_id,
            rect: Rect::new(config.layout.player_offset.0, config.layout.player_offset.1, pw, ph),
            speed: config.player.speed,
            health: config.player.max_health,
            max_health: config.player.max_health,
            lives: config.player.lives,
            score: 0,
            cannon_locked: false,
        };

        let enemies = EnemyGroup::load(&mut ids, &config.layout, &config.enemy);
        let base_enemy_count = enemies.members.len();

        let ufo_id = ids.alloc();
        let (uw, uh) = config.enemy.ufo_size;
        let ufo = Ufo {
            id: ufo_id,
            rect: Rect::new(config.layout.ufo_offset.0, config.layout.ufo_offset.1, uw, uh),
            home: config.layout.ufo_offset,
            health: 0,
            points: config.enemy.ufo_points,
        };

        let platforms = PlatformGroup::load(&mut ids, config);

        Self {
            ids,
            player,
            ufo,
            enemies,
            platforms,
            bullets: BTreeMap::new(),
            enemy_speed: config.enemy.base_speed,
            current_wave: 1,
            base_enemy_count,
            destroyed_in_wave: 0,
            game_over: false,
        }
    }

    /// Reload enemies and platforms for the next wave; bullets are cleared,
    /// formation speed resets to base. The player and UFO persist.
    pub fn advance_wave(&mut self, config: &GameConfig) {
        self.enemies = EnemyGroup::load(&mut self.ids, &config.layout, &config.enemy);
        self.platforms = PlatformGroup::load(&mut self.ids, config);
        self.bullets.clear();
        self.base_enemy_count = self.enemies.members.len();
        self.destroyed_in_wave = 0;
        self.enemy_speed = config.enemy.base_speed;
        self.current_wave += 1;
    }

    /// Formation speed grows with the square of the destroyed fraction,
    /// from the base speed up to a ceiling scaled by the wave number.
    pub fn recompute_enemy_speed(&mut self, tuning: &EnemyTuning) {
        let fraction = self.destroyed_in_wave as f32 / self.base_enemy_count.max(1) as f32;
        let max_speed = tuning.max_speed * self.current_wave as f32;
        let delta = max_speed - tuning.base_speed;
        self.enemy_speed = (tuning.base_speed + fraction * fraction * delta)
            .clamp(tuning.base_speed, max_speed);
    }

    pub fn spawn_player_bullet(&mut self, config: &GameConfig) -> EntityId {
        let id = self.ids.alloc();
        let bullet = Bullet::fired_up(
            id,
            &self.player.rect,
            config.player.bullet_speed,
            config.player.bullet_strength,
            Faction::Cannon,
        );
        self.bullets.insert(id, bullet);
        id
    }

    pub fn spawn_enemy_bullet(&mut self, shooter: EntityId, config: &GameConfig) -> Option<EntityId> {
        let from = self.enemies.members.get(&shooter)?.rect;
        let id = self.ids.alloc();
        let bullet = Bullet::fired_down(
            id,
            &from,
            config.enemy.bullet_speed,
            config.enemy.bullet_strength,
            Faction::Invader,
        );
        self.bullets.insert(id, bullet);
        Some(id)
    }
}
