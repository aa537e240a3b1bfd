//! Session registry: live connections and their most recent input snapshot.
//!
//! Pure storage. Input content is never validated here and no game state is
//! touched; the room routes messages and the simulation consumes the
//! snapshots at tick time.

use shared::InputState;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// One live socket connection: its identity, the send handle feeding the
/// connection's writer task, and the last input received (none until the
/// client sends its first input message).
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub tx: mpsc::UnboundedSender<Message>,
    pub input: Option<InputState>,
}

impl Session {
    pub fn new(id: String, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            tx,
            input: None,
        }
    }
}

/// All sessions of one room, keyed by session identity.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Identities are freshly generated per connection, so
    /// an existing entry cannot be displaced in practice.
    pub fn register(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Removes a session and its input state. Returns false if it was
    /// already gone.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Stores an input snapshot verbatim. Returns false for unknown ids.
    pub fn set_input(&mut self, id: &str, input: InputState) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.input = Some(input);
                true
            }
            None => false,
        }
    }

    /// The last input received from a session, if any ever arrived.
    pub fn latest_input(&self, id: &str) -> Option<&InputState> {
        self.sessions.get(id).and_then(|session| session.input.as_ref())
    }

    /// Snapshot of every session's latest input, consumed by the tick.
    /// Sessions that never sent input are absent (treated as idle).
    pub fn inputs(&self) -> HashMap<String, InputState> {
        self.sessions
            .iter()
            .filter_map(|(id, session)| {
                session.input.clone().map(|input| (id.clone(), input))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
