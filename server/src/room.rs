//! The room: one exclusively-owned unit of simulation state.
//!
//! Every socket task forwards its parsed events into the room's channel; the
//! room task drains them in arrival order and interleaves simulation ticks,
//! so message handling and ticks never run concurrently and the state needs
//! no locking. The tick loop arms on the first join and disarms when the
//! last session is gone, re-arming on the next join.

use crate::game::GameState;
use crate::session::{Session, SessionRegistry};
use log::{debug, info, warn};
use shared::{ClientMessage, InputState, ServerMessage};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

/// Events from connection tasks to the room's event loop.
#[derive(Debug)]
pub enum RoomEvent {
    Connect {
        id: String,
        tx: mpsc::UnboundedSender<Message>,
    },
    Message {
        id: String,
        message: ClientMessage,
    },
    Disconnect {
        id: String,
    },
}

/// Room state: the session registry and the authoritative world.
pub struct Room {
    sessions: SessionRegistry,
    world: GameState,
    tick_duration: Duration,
}

impl Room {
    pub fn new(tick_duration: Duration) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            world: GameState::new(),
            tick_duration,
        }
    }

    /// Drives the room until every event sender is dropped. While idle the
    /// loop blocks on the event channel alone; while running it also ticks
    /// the simulation at the configured cadence.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<RoomEvent>) {
        let mut ticker: Option<Interval> = None;

        loop {
            if let Some(interval) = ticker.as_mut() {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => {
                            self.handle_event(event);
                        }
                        None => break,
                    },
                    _ = interval.tick() => {
                        if !self.tick() {
                            info!("Room empty, pausing simulation");
                            ticker = None;
                        }
                    }
                }
            } else {
                match events.recv().await {
                    Some(event) => {
                        if self.handle_event(event) {
                            info!("Starting simulation loop");
                            ticker = Some(self.new_ticker());
                        }
                    }
                    None => break,
                }
            }
        }
    }

    /// One interval per running phase. `Delay` schedules each tick relative
    /// to the previous one's completion, so a slow tick lowers the effective
    /// rate instead of producing a catch-up burst.
    fn new_ticker(&self) -> Interval {
        let mut interval = interval_at(
            tokio::time::Instant::now() + self.tick_duration,
            self.tick_duration,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    /// Applies one inbound event. Returns true when the tick loop must be
    /// running afterwards (a player joined).
    fn handle_event(&mut self, event: RoomEvent) -> bool {
        match event {
            RoomEvent::Connect { id, tx } => {
                info!("Session {} connected", id);
                self.sessions.register(Session::new(id, tx));
                false
            }
            RoomEvent::Disconnect { id } => {
                if self.sessions.unregister(&id) {
                    self.world.remove_player(&id);
                    info!(
                        "Session {} disconnected ({} remaining)",
                        id,
                        self.sessions.len()
                    );
                    let update = self.update_message();
                    self.broadcast(&update);
                }
                false
            }
            RoomEvent::Message { id, message } => self.route(&id, message),
        }
    }

    /// Dispatches one validated message. Messages from sessions no longer
    /// in the registry are dropped silently.
    fn route(&mut self, id: &str, message: ClientMessage) -> bool {
        if !self.sessions.contains(id) {
            debug!("Dropping message from unknown session {}", id);
            return false;
        }

        match message {
            ClientMessage::Join { name } => self.handle_join(id, name.as_deref()),
            ClientMessage::Input { keys, angle } => {
                self.sessions.set_input(id, InputState { keys, angle });
                false
            }
            ClientMessage::Shoot => {
                // Fires immediately, not deferred to the tick boundary.
                self.world.fire(id, Instant::now());
                false
            }
        }
    }

    /// Creates the session's player, answers with `init`, and announces the
    /// membership change. A second join on the same session is a no-op.
    fn handle_join(&mut self, id: &str, name: Option<&str>) -> bool {
        if self.world.players.contains_key(id) {
            return false;
        }

        let player = self.world.add_player(id, name);
        let init = ServerMessage::Init {
            id: id.to_string(),
            player,
            players: self.world.players.values().cloned().collect(),
        };
        self.send_to(id, &init);

        let update = self.update_message();
        self.broadcast(&update);
        true
    }

    /// One simulation step plus its broadcasts. Returns false once the room
    /// is empty and the loop should disarm.
    fn tick(&mut self) -> bool {
        if self.sessions.is_empty() {
            return false;
        }

        let inputs = self.sessions.inputs();
        for event in self.world.step(&inputs) {
            self.broadcast(&event.into());
        }

        let update = self.update_message();
        self.broadcast(&update);
        true
    }

    fn update_message(&self) -> ServerMessage {
        ServerMessage::Update {
            players: self.world.players.values().cloned().collect(),
            bullets: self.world.bullets.clone(),
        }
    }

    /// Serializes once and fans out to every session. A failed send means
    /// the recipient's writer task is gone; it never affects the others.
    fn broadcast(&self, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize broadcast: {}", e);
                return;
            }
        };

        for session in self.sessions.iter() {
            if session.tx.send(Message::Text(payload.clone())).is_err() {
                debug!("Dropping payload for closed session {}", session.id);
            }
        }
    }

    fn send_to(&self, id: &str, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                return;
            }
        };

        if let Some(session) = self.sessions.get(id) {
            if session.tx.send(Message::Text(payload)).is_err() {
                debug!("Dropping payload for closed session {}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::InputKeys;

    fn connect(room: &mut Room, id: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        room.handle_event(RoomEvent::Connect {
            id: id.to_string(),
            tx,
        });
        rx
    }

    fn join(room: &mut Room, id: &str) -> bool {
        room.handle_event(RoomEvent::Message {
            id: id.to_string(),
            message: ClientMessage::Join {
                name: Some(id.to_string()),
            },
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let text = frame.into_text().unwrap();
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    fn test_room() -> Room {
        Room::new(Duration::from_millis(33))
    }

    #[test]
    fn test_join_sends_init_then_update() {
        let mut room = test_room();
        let mut rx = connect(&mut room, "s1");

        assert!(join(&mut room, "s1"));

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            ServerMessage::Init { id, player, players } => {
                assert_eq!(id, "s1");
                assert_eq!(player.id, "s1");
                assert_eq!(players.len(), 1);
            }
            other => panic!("Expected init, got {:?}", other),
        }
        assert!(matches!(messages[1], ServerMessage::Update { .. }));
    }

    #[test]
    fn test_second_join_is_noop() {
        let mut room = test_room();
        let mut rx = connect(&mut room, "s1");
        assert!(join(&mut room, "s1"));
        drain(&mut rx);

        assert!(!join(&mut room, "s1"));
        // No init resent, no membership update.
        assert!(drain(&mut rx).is_empty());
        assert_eq!(room.world.players.len(), 1);
    }

    #[test]
    fn test_join_broadcasts_to_existing_sessions() {
        let mut room = test_room();
        let mut rx1 = connect(&mut room, "s1");
        join(&mut room, "s1");
        drain(&mut rx1);

        let _rx2 = connect(&mut room, "s2");
        join(&mut room, "s2");

        let messages = drain(&mut rx1);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::Update { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_input_is_stored_for_next_tick() {
        let mut room = test_room();
        let _rx = connect(&mut room, "s1");
        join(&mut room, "s1");

        let armed = room.handle_event(RoomEvent::Message {
            id: "s1".to_string(),
            message: ClientMessage::Input {
                keys: InputKeys {
                    up: true,
                    ..Default::default()
                },
                angle: Some(2.0),
            },
        });
        assert!(!armed);

        let input = room.sessions.latest_input("s1").unwrap();
        assert!(input.keys.up);
        assert_eq!(input.angle, Some(2.0));
    }

    #[test]
    fn test_shoot_spawns_bullet_immediately() {
        let mut room = test_room();
        let _rx = connect(&mut room, "s1");
        join(&mut room, "s1");

        room.handle_event(RoomEvent::Message {
            id: "s1".to_string(),
            message: ClientMessage::Shoot,
        });
        assert_eq!(room.world.bullets.len(), 1);
    }

    #[test]
    fn test_message_from_unknown_session_ignored() {
        let mut room = test_room();
        assert!(!join(&mut room, "ghost"));
        assert!(room.world.players.is_empty());

        room.handle_event(RoomEvent::Message {
            id: "ghost".to_string(),
            message: ClientMessage::Shoot,
        });
        assert!(room.world.bullets.is_empty());
    }

    #[test]
    fn test_disconnect_removes_player_and_broadcasts() {
        let mut room = test_room();
        let mut rx1 = connect(&mut room, "s1");
        join(&mut room, "s1");
        let _rx2 = connect(&mut room, "s2");
        join(&mut room, "s2");
        drain(&mut rx1);

        room.handle_event(RoomEvent::Disconnect {
            id: "s2".to_string(),
        });

        assert!(!room.world.players.contains_key("s2"));
        let messages = drain(&mut rx1);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::Update { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, "s1");
            }
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_tick_broadcasts_update() {
        let mut room = test_room();
        let mut rx = connect(&mut room, "s1");
        join(&mut room, "s1");
        drain(&mut rx);

        assert!(room.tick());
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ServerMessage::Update { .. }));
    }

    #[test]
    fn test_tick_reports_empty_room() {
        let mut room = test_room();
        assert!(!room.tick());

        // A connected session that never joined still keeps the loop alive.
        let _rx = connect(&mut room, "s1");
        assert!(room.tick());
    }

    #[test]
    fn test_hit_event_broadcast_alongside_update() {
        let mut room = test_room();
        let mut rx = connect(&mut room, "shooter");
        join(&mut room, "shooter");
        let _rx2 = connect(&mut room, "victim");
        join(&mut room, "victim");
        drain(&mut rx);

        // Park a bullet on the victim and step.
        let (x, y) = {
            let victim = &room.world.players["victim"];
            (victim.x, victim.y)
        };
        room.world.bullets.push(shared::Bullet {
            id: 99,
            owner: "shooter".to_string(),
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            life: 10,
        });
        room.tick();

        let messages = drain(&mut rx);
        assert!(messages
            .iter()
            .any(|message| matches!(message, ServerMessage::Hit { .. })));
        assert!(matches!(
            messages.last().unwrap(),
            ServerMessage::Update { .. }
        ));
    }
}
