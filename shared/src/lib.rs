use serde::{Deserialize, Serialize};

pub const WORLD_SIZE: f32 = 2000.0;
pub const SPAWN_MIN: f32 = 200.0;
pub const SPAWN_MAX: f32 = 1800.0;
pub const THRUST: f32 = 0.3;
pub const BOOST_THRUST: f32 = 0.5;
pub const FRICTION: f32 = 0.98;
pub const MAX_SPEED: f32 = 12.0;
pub const BULLET_SPEED: f32 = 15.0;
pub const BULLET_INHERITANCE: f32 = 0.3;
pub const MUZZLE_OFFSET: f32 = 30.0;
pub const BULLET_LIFE_TICKS: i32 = 100;
pub const BULLET_MARGIN: f32 = 100.0;
pub const FIRE_COOLDOWN_MS: u64 = 200;
pub const HIT_RADIUS: f32 = 25.0;
pub const HIT_DAMAGE: i32 = 15;
pub const MAX_HEALTH: i32 = 100;
pub const KILL_SCORE: u32 = 100;
pub const MAX_NAME_LEN: usize = 15;
pub const DEFAULT_NAME: &str = "Pilot";
pub const DEFAULT_TICK_RATE: u32 = 30;

/// Ship colors handed out round-robin as players join. Departed players do
/// not return their color, so duplicates appear once the index wraps.
pub const COLORS: [&str; 8] = [
    "#ff5252", "#40c4ff", "#69f062", "#ffd740", "#ff4dff", "#4dffd2", "#ff9e40", "#b388ff",
];

/// Messages a client may send, discriminated by the `type` field.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        name: Option<String>,
    },
    Input {
        #[serde(default)]
        keys: InputKeys,
        #[serde(default)]
        angle: Option<f32>,
    },
    Shoot,
}

/// Messages the server emits, discriminated by the `type` field.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once to a joining session only.
    Init {
        id: String,
        player: Player,
        players: Vec<Player>,
    },
    /// Full world snapshot, broadcast every tick and on membership changes.
    Update {
        players: Vec<Player>,
        bullets: Vec<Bullet>,
    },
    Hit {
        x: f32,
        y: f32,
    },
    Kill {
        killer: String,
        victim: String,
        x: f32,
        y: f32,
    },
}

/// Held directional keys from a client input message. Missing keys
/// deserialize as released.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct InputKeys {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub boost: bool,
}

/// A session's most recent input snapshot, stored verbatim and consumed on
/// the next simulation tick.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub keys: InputKeys,
    pub angle: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub health: i32,
    pub score: u32,
    pub kills: u32,
    pub color: String,
    pub thrusting: bool,
}

impl Player {
    pub fn new(id: &str, name: &str, x: f32, y: f32, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            health: MAX_HEALTH,
            score: 0,
            kills: 0,
            color: color.to_string(),
            thrusting: false,
        }
    }

    /// Current speed (velocity magnitude).
    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Bullet {
    pub id: u64,
    pub owner: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: i32,
}

/// Rescales a velocity to `max` magnitude if it exceeds it, preserving
/// direction.
pub fn clamp_speed(vx: f32, vy: f32, max: f32) -> (f32, f32) {
    let speed = (vx * vx + vy * vy).sqrt();
    if speed > max {
        (vx / speed * max, vy / speed * max)
    } else {
        (vx, vy)
    }
}
