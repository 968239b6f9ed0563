//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

/// Stable wire identity of a diff-visible entity.
///
/// Allocated per session, monotonically increasing, never reused, so the
/// client can correlate updates and deletes for the lifetime of an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

/// Enemy categories, each with a distinct sprite size and point value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyKind {
    Squid,
    Crab,
    Octopus,
}

/// Horizontal movement requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MoveDir {
    #[default]
    Stay,
    Right,
    Left,
}

impl TryFrom<u8> for MoveDir {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MoveDir::Stay),
            1 => Ok(MoveDir::Right),
            2 => Ok(MoveDir::Left),
            other => Err(format!("invalid player_direction: {}", other)),
        }
    }
}

impl From<MoveDir> for u8 {
    fn from(dir: MoveDir) -> u8 {
        match dir {
            MoveDir::Stay => 0,
            MoveDir::Right => 1,
            MoveDir::Left => 2,
        }
    }
}

/// Vertical bullet direction (3 = up, 4 = down on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BulletDir {
    Up,
    Down,
}

impl TryFrom<u8> for BulletDir {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(BulletDir::Up),
            4 => Ok(BulletDir::Down),
            other => Err(format!("invalid bullet direction: {}", other)),
        }
    }
}

impl From<BulletDir> for u8 {
    fn from(dir: BulletDir) -> u8 {
        match dir {
            BulletDir::Up => 3,
            BulletDir::Down => 4,
        }
    }
}

/// Login / registration credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Buffered player intent for one tick
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlayerEvent {
    pub player_shoot: bool,
    pub player_direction: MoveDir,
}

/// Messages sent from client to server. Auth messages carry their
/// credentials flat beside the tag; player events nest theirs under
/// `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Authenticate against the score backend and start a session
    Login(Credentials),

    /// Create an account, then start a session
    Registration(Credentials),

    /// Player input; overwrites the previous buffered event
    PlayerEvent { message: PlayerEvent },

    /// Discard the current world and start a fresh one
    NewGame,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Authentication failed; no session was created
    AuthError(String),

    /// Simulation diff for one tick (or a full snapshot on world creation)
    GameAction(DiffEnvelope),

    /// Terminal notification; the session is over
    GameOver(GameOverReport),
}

/// Final score and the reason the game ended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverReport {
    pub player_score: u32,
    pub reason: String,
}

/// Incremental world changes since the previous tick.
/// Empty members are omitted from the wire representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffEnvelope {
    #[serde(rename = "Create", default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<EntityRecord>,

    #[serde(rename = "Update", default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<EntityUpdate>,

    #[serde(rename = "Delete", default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<EntityDelete>,
}

impl DiffEnvelope {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Full entity state, sent on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityRecord {
    Player {
        id: EntityId,
        coordinates: [i32; 2],
        health: i32,
        score: u32,
        lives: u32,
    },
    Enemy {
        id: EntityId,
        kind: EnemyKind,
        coordinates: [i32; 2],
        health: i32,
    },
    #[serde(rename = "UFO")]
    Ufo {
        id: EntityId,
        coordinates: [i32; 2],
        health: i32,
    },
    Platform {
        id: EntityId,
        coordinates: [i32; 2],
        health: i32,
    },
    EnemyGroup {
        id: EntityId,
        objects: Vec<EntityRecord>,
    },
    PlatformGroup {
        id: EntityId,
        objects: Vec<EntityRecord>,
    },
    Bullet {
        id: EntityId,
        coordinates: [i32; 2],
        speed: i32,
        direction: BulletDir,
    },
}

/// Partial entity state, sent when an existing entity changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityUpdate {
    Player {
        id: EntityId,
        coordinates: [i32; 2],
        health: i32,
        score: u32,
        lives: u32,
    },
    Enemy {
        id: EntityId,
        health: i32,
    },
    #[serde(rename = "UFO")]
    Ufo {
        id: EntityId,
        coordinates: [i32; 2],
        health: i32,
    },
    Platform {
        id: EntityId,
        health: i32,
    },
    /// Shared formation translation: coordinates carry the (dx, dy) delta
    EnemyGroup {
        id: EntityId,
        coordinates: [i32; 2],
    },
    /// Marker that all live bullets advanced by their own speed this tick
    BulletGroup,
}

/// Entity kinds referenced by delete records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Enemy,
    #[serde(rename = "UFO")]
    Ufo,
    Platform,
    EnemyGroup,
    PlatformGroup,
    Bullet,
    BulletGroup,
}

/// Removal of an entity from the authoritative set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDelete {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: EntityId,
}
