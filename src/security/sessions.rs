use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn is_idle(&self, now: DateTime<Utc>, idle_timeout: TimeDelta) -> bool {
        now - self.last_activity > idle_timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDecision {
    Created,
    /// The id was already live for this address; its activity was refreshed.
    Refreshed,
    Denied { reason: String },
}

impl SessionDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, SessionDecision::Denied { .. })
    }
}

#[derive(Debug)]
pub(crate) enum Touch {
    Refreshed,
    Expired(Session),
    Unknown,
}

/// Session id → owning address and activity times.
///
/// The per-address set of live ids is kept on the rate limit entry; the limiter
/// keeps both sides in step under its lock.
#[derive(Debug)]
pub(crate) struct SessionRegistry {
    sessions: HashMap<String, Session>,
    idle_timeout: TimeDelta,
}

impl SessionRegistry {
    pub(crate) fn new(idle_timeout: TimeDelta) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub(crate) fn is_live(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|session| !session.is_idle(now, self.idle_timeout))
    }

    pub(crate) fn insert(&mut self, session_id: &str, ip: &str, now: DateTime<Utc>) {
        self.sessions.insert(
            session_id.to_string(),
            Session {
                ip: ip.to_string(),
                created_at: now,
                last_activity: now,
            },
        );
    }

    pub(crate) fn touch(&mut self, session_id: &str, now: DateTime<Utc>) -> Touch {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return Touch::Unknown;
        };

        if session.is_idle(now, self.idle_timeout) {
            return match self.sessions.remove(session_id) {
                Some(expired) => Touch::Expired(expired),
                None => Touch::Unknown,
            };
        }

        session.last_activity = now;
        Touch::Refreshed
    }

    pub(crate) fn remove(&mut self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    /// Drops every idle session and returns them with their ids.
    pub(crate) fn expire_idle(&mut self, now: DateTime<Utc>) -> Vec<(String, Session)> {
        let idle_timeout = self.idle_timeout;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_idle(now, idle_timeout))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|session| (id, session)))
            .collect()
    }
}
