use log::info;
use rand::Rng;
use shared::{
    clamp_speed, Bullet, InputState, Player, ServerMessage, BOOST_THRUST, BULLET_INHERITANCE,
    BULLET_LIFE_TICKS, BULLET_MARGIN, BULLET_SPEED, COLORS, DEFAULT_NAME, FIRE_COOLDOWN_MS,
    FRICTION, HIT_DAMAGE, HIT_RADIUS, KILL_SCORE, MAX_HEALTH, MAX_NAME_LEN, MAX_SPEED,
    MUZZLE_OFFSET, SPAWN_MAX, SPAWN_MIN, THRUST, WORLD_SIZE,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Simulation events raised while stepping the world, broadcast to every
/// session alongside the per-tick state update.
#[derive(Debug, Clone)]
pub enum GameEvent {
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

impl From<GameEvent> for ServerMessage {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::Hit { x, y } => ServerMessage::Hit { x, y },
            GameEvent::Kill {
                killer,
                victim,
                x,
                y,
            } => ServerMessage::Kill {
                killer,
                victim,
                x,
                y,
            },
        }
    }
}

/// Authoritative world state for one room: every live player and bullet,
/// plus the bookkeeping needed to assign colors, bullet ids and enforce the
/// fire cooldown.
#[derive(Debug, Clone)]
pub struct GameState {
    pub players: HashMap<String, Player>,
    pub bullets: Vec<Bullet>,
    last_shot: HashMap<String, Instant>,
    next_bullet_id: u64,
    next_color: usize,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            bullets: Vec::new(),
            last_shot: HashMap::new(),
            next_bullet_id: 1,
            next_color: 0,
        }
    }

    /// Spawns a player at a random point in the arena interior and returns a
    /// copy of the new record. Names are truncated to the display limit;
    /// empty or missing names get the default.
    pub fn add_player(&mut self, id: &str, requested_name: Option<&str>) -> Player {
        let (x, y) = random_spawn_point();
        let color = COLORS[self.next_color % COLORS.len()];
        self.next_color += 1;

        let name = sanitize_name(requested_name);
        let player = Player::new(id, &name, x, y, color);

        info!(
            "Player {} ({}) joined at ({:.0}, {:.0})",
            id, player.name, x, y
        );
        self.players.insert(id.to_string(), player.clone());
        player
    }

    /// Removes a player and its cooldown state. Bullets the player already
    /// fired keep flying; their kill credit is skipped if they land.
    pub fn remove_player(&mut self, id: &str) {
        if self.players.remove(id).is_some() {
            info!("Player {} removed", id);
        }
        self.last_shot.remove(id);
    }

    /// Fires a bullet from the given player's ship. Requests inside the
    /// cooldown window are dropped silently; unknown players are ignored.
    pub fn fire(&mut self, id: &str, now: Instant) {
        let player = match self.players.get(id) {
            Some(player) => player,
            None => return,
        };

        if let Some(last) = self.last_shot.get(id) {
            if now.duration_since(*last) < Duration::from_millis(FIRE_COOLDOWN_MS) {
                return;
            }
        }

        let (dir_x, dir_y) = (player.angle.cos(), player.angle.sin());
        let bullet = Bullet {
            id: self.next_bullet_id,
            owner: id.to_string(),
            x: player.x + MUZZLE_OFFSET * dir_x,
            y: player.y + MUZZLE_OFFSET * dir_y,
            // Bullets inherit part of the ship's momentum.
            vx: BULLET_SPEED * dir_x + BULLET_INHERITANCE * player.vx,
            vy: BULLET_SPEED * dir_y + BULLET_INHERITANCE * player.vy,
            life: BULLET_LIFE_TICKS,
        };

        self.next_bullet_id += 1;
        self.bullets.push(bullet);
        self.last_shot.insert(id.to_string(), now);
    }

    /// Advances the world by one fixed tick: applies the latest input
    /// snapshot per player, integrates ships and bullets, then resolves
    /// bullet hits, deaths and respawns. Returns the events to broadcast.
    pub fn step(&mut self, inputs: &HashMap<String, InputState>) -> Vec<GameEvent> {
        self.step_players(inputs);
        self.step_bullets();
        self.resolve_collisions()
    }

    fn step_players(&mut self, inputs: &HashMap<String, InputState>) {
        for (id, player) in &mut self.players {
            let input = inputs.get(id);

            if let Some(input) = input {
                player.angle = input.angle.unwrap_or(0.0);
            }

            player.thrusting = false;
            let keys = input.map(|input| input.keys).unwrap_or_default();
            if keys.up {
                player.vy -= THRUST;
                player.thrusting = true;
            }
            if keys.down {
                player.vy += THRUST;
            }
            if keys.left {
                player.vx -= THRUST;
            }
            if keys.right {
                player.vx += THRUST;
            }
            if keys.boost {
                player.vx += BOOST_THRUST * player.angle.cos();
                player.vy += BOOST_THRUST * player.angle.sin();
                player.thrusting = true;
            }

            player.vx *= FRICTION;
            player.vy *= FRICTION;
            let (vx, vy) = clamp_speed(player.vx, player.vy, MAX_SPEED);
            player.vx = vx;
            player.vy = vy;

            player.x = (player.x + player.vx).clamp(0.0, WORLD_SIZE);
            player.y = (player.y + player.vy).clamp(0.0, WORLD_SIZE);
        }
    }

    fn step_bullets(&mut self) {
        for bullet in &mut self.bullets {
            bullet.x += bullet.vx;
            bullet.y += bullet.vy;
            bullet.life -= 1;
        }

        self.bullets.retain(|bullet| {
            bullet.life > 0
                && bullet.x >= -BULLET_MARGIN
                && bullet.x <= WORLD_SIZE + BULLET_MARGIN
                && bullet.y >= -BULLET_MARGIN
                && bullet.y <= WORLD_SIZE + BULLET_MARGIN
        });
    }

    /// Quadratic bullet-vs-player scan; fine for room-sized populations.
    fn resolve_collisions(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();

        let mut index = 0;
        while index < self.bullets.len() {
            let bullet = &self.bullets[index];

            // First matching player wins; a bullet hits at most one ship.
            let victim_id = self
                .players
                .iter()
                .find(|(id, player)| {
                    **id != bullet.owner && distance(bullet.x, bullet.y, player.x, player.y) < HIT_RADIUS
                })
                .map(|(id, _)| id.clone());

            let victim_id = match victim_id {
                Some(victim_id) => victim_id,
                None => {
                    index += 1;
                    continue;
                }
            };

            let bullet = self.bullets.swap_remove(index);
            events.push(GameEvent::Hit {
                x: bullet.x,
                y: bullet.y,
            });

            let lethal = match self.players.get_mut(&victim_id) {
                Some(victim) => {
                    victim.health -= HIT_DAMAGE;
                    victim.health <= 0
                }
                None => false,
            };

            if lethal {
                events.push(self.resolve_kill(&bullet.owner, &victim_id));
            }
        }

        events
    }

    /// Credits the shooter if it is still connected, then respawns the
    /// victim in place so negative health never survives the tick.
    fn resolve_kill(&mut self, killer_id: &str, victim_id: &str) -> GameEvent {
        let (death_x, death_y) = self
            .players
            .get(victim_id)
            .map(|victim| (victim.x, victim.y))
            .unwrap_or_default();

        if let Some(killer) = self.players.get_mut(killer_id) {
            killer.kills += 1;
            killer.score += KILL_SCORE;
        }

        if let Some(victim) = self.players.get_mut(victim_id) {
            let (x, y) = random_spawn_point();
            victim.x = x;
            victim.y = y;
            victim.vx = 0.0;
            victim.vy = 0.0;
            victim.health = MAX_HEALTH;
        }

        info!("Player {} destroyed {}", killer_id, victim_id);
        GameEvent::Kill {
            killer: killer_id.to_string(),
            victim: victim_id.to_string(),
            x: death_x,
            y: death_y,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform spawn point in the arena's central sub-region, kept away from the
/// walls.
fn random_spawn_point() -> (f32, f32) {
    let mut rng = rand::thread_rng();
    (
        rng.gen_range(SPAWN_MIN..SPAWN_MAX),
        rng.gen_range(SPAWN_MIN..SPAWN_MAX),
    )
}

fn sanitize_name(requested: Option<&str>) -> String {
    let name = requested.unwrap_or("").trim();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name.chars().take(MAX_NAME_LEN).collect()
    }
}

fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}
