//! Gameplay tuning tables and wave layout
//!
//! All values are authoritative server constants; the client only renders
//! what the diffs describe.

use crate::ws::protocol::EnemyKind;

/// Playfield and tick cadence
#[derive(Debug, Clone)]
pub struct GameTuning {
    /// Playfield size in pixels (width, height)
    pub display_size: (i32, i32),
    /// World simulation ticks per second
    pub tick_rate: u32,
    /// Delay before the first world tick after world creation (ms)
    pub startup_delay_ms: u64,
    /// Clearing this wave ends the game as a win
    pub max_waves: u32,
    /// Delay between the fatal hit and session termination (ms)
    pub game_over_delay_ms: u64,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            display_size: (800, 600),
            tick_rate: 30,
            startup_delay_ms: 1_000,
            max_waves: 30,
            game_over_delay_ms: 1_000,
        }
    }
}

impl GameTuning {
    /// World tick period in milliseconds
    pub fn tick_interval_ms(&self) -> u64 {
        1_000 / self.tick_rate as u64
    }
}

/// Player cannon tuning
#[derive(Debug, Clone)]
pub struct PlayerTuning {
    pub size: (i32, i32),
    /// Horizontal movement per tick (pixels)
    pub speed: i32,
    pub max_health: i32,
    pub lives: u32,
    pub bullet_speed: i32,
    pub bullet_strength: i32,
    /// Cannon lock duration after a shot (ms)
    pub shoot_delay_ms: u64,
    /// Time between death and respawn (ms)
    pub rebirth_delay_ms: u64,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            size: (52, 32),
            speed: 8,
            max_health: 100,
            lives: 3,
            bullet_speed: 12,
            bullet_strength: 100,
            shoot_delay_ms: 700,
            rebirth_delay_ms: 1_000,
        }
    }
}

/// Enemy formation and UFO tuning
#[derive(Debug, Clone)]
pub struct EnemyTuning {
    pub health: i32,
    /// Horizontal formation step (pixels)
    pub step_x: i32,
    /// Descent per edge bounce (pixels)
    pub step_y: i32,
    /// Formation stops descending once its bottom reaches this line
    pub max_y: i32,
    /// Formation steps per second at wave start
    pub base_speed: f32,
    /// Speed ceiling for wave 1; scales linearly with the wave number
    pub max_speed: f32,
    /// Chance per world tick that some enemy fires
    pub shoot_probability: f64,
    pub bullet_speed: i32,
    pub bullet_strength: i32,
    /// Dead enemies linger this long before removal (death animation)
    pub death_delay_ms: u64,

    pub ufo_size: (i32, i32),
    /// UFO horizontal movement per tick (pixels)
    pub ufo_speed: i32,
    pub ufo_points: u32,
    /// Chance per world tick that an inactive UFO takes off
    pub ufo_probability: f64,
    /// Delay before a destroyed UFO returns to its home offset (ms)
    pub ufo_hide_delay_ms: u64,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            health: 100,
            step_x: 10,
            step_y: 24,
            max_y: 440,
            base_speed: 1.0,
            max_speed: 8.0,
            shoot_probability: 0.02,
            bullet_speed: 8,
            bullet_strength: 34,
            death_delay_ms: 500,
            ufo_size: (64, 28),
            ufo_speed: 6,
            ufo_points: 200,
            ufo_probability: 0.005,
            ufo_hide_delay_ms: 500,
        }
    }
}

impl EnemyTuning {
    /// Sprite size for an enemy category
    pub fn size_of(&self, kind: EnemyKind) -> (i32, i32) {
        match kind {
            EnemyKind::Squid => (32, 32),
            EnemyKind::Crab => (44, 32),
            EnemyKind::Octopus => (48, 32),
        }
    }

    /// Point value for destroying an enemy of this category
    pub fn points_of(&self, kind: EnemyKind) -> u32 {
        match kind {
            EnemyKind::Squid => 30,
            EnemyKind::Crab => 20,
            EnemyKind::Octopus => 10,
        }
    }
}

/// Defensive platform tuning
#[derive(Debug, Clone)]
pub struct PlatformTuning {
    pub size: (i32, i32),
    pub health: i32,
    /// Vertical position of every platform
    pub y_position: i32,
}

impl Default for PlatformTuning {
    fn default() -> Self {
        Self {
            size: (88, 48),
            health: 300,
            y_position: 460,
        }
    }
}

/// One row of the enemy formation
#[derive(Debug, Clone)]
pub struct EnemyRow {
    pub kind: EnemyKind,
    pub count: u32,
    /// Top-left of the first enemy in the row
    pub base_offset: (i32, i32),
    /// Horizontal gap between adjacent enemies
    pub distance: i32,
}

/// Static description of one wave: enemy formation, platforms, UFO lane
#[derive(Debug, Clone)]
pub struct WaveLayout {
    pub player_offset: (i32, i32),
    pub rows: Vec<EnemyRow>,
    pub platform_count: u32,
    /// UFO home offset; it flies in from off-screen left
    pub ufo_offset: (i32, i32),
}

impl Default for WaveLayout {
    fn default() -> Self {
        Self {
            player_offset: (374, 540),
            rows: vec![
                EnemyRow {
                    kind: EnemyKind::Squid,
                    count: 8,
                    base_offset: (68, 80),
                    distance: 28,
                },
                EnemyRow {
                    kind: EnemyKind::Crab,
                    count: 8,
                    base_offset: (62, 128),
                    distance: 16,
                },
                EnemyRow {
                    kind: EnemyKind::Crab,
                    count: 8,
                    base_offset: (62, 176),
                    distance: 16,
                },
                EnemyRow {
                    kind: EnemyKind::Octopus,
                    count: 8,
                    base_offset: (60, 224),
                    distance: 12,
                },
                EnemyRow {
                    kind: EnemyKind::Octopus,
                    count: 8,
                    base_offset: (60, 272),
                    distance: 12,
                },
            ],
            platform_count: 4,
            ufo_offset: (-64, 40),
        }
    }
}

/// Complete gameplay configuration for one session
#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    pub game: GameTuning,
    pub player: PlayerTuning,
    pub enemy: EnemyTuning,
    pub platform: PlatformTuning,
    pub layout: WaveLayout,
}
