use crate::protocol::DecodedEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Lifecycle of the supervised backend process.
///
/// Transitions:
///   NotStarted -> Running -> Exited
///   Exited -> Running            (explicit restart only, a fresh process)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BackendHealth {
    /// Never launched, or launch failed.
    #[default]
    NotStarted,
    Running,
    /// Process exited or its stdout closed.  Terminal for that instance.
    Exited,
}

/// Everything known about playback, as last reported by the backend.
/// `rev` is bumped on every change so pollers can cheaply detect updates.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlaybackSnapshot {
    #[serde(default)]
    pub rev: u64,
    /// Filename from the last now-playing line; empty before the first one.
    pub current_track: String,
    /// Backend playlist index from the same line, when it was numeric.
    pub current_index: Option<u32>,
    pub current_title: Option<String>,
    #[serde(default)]
    pub backend: BackendHealth,
}

/// Shared playback state.  Written by the reader task, read by any number of
/// request handlers.  Every update happens under one write lock so readers
/// never observe a half-applied now-playing event.
pub struct PlaybackState {
    state: RwLock<PlaybackSnapshot>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PlaybackSnapshot::default()),
        }
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.state.read().await.clone()
    }

    pub async fn current_track(&self) -> String {
        self.state.read().await.current_track.clone()
    }

    pub async fn backend(&self) -> BackendHealth {
        self.state.read().await.backend
    }

    /// Fold a decoded line into the state.  Returns true if anything changed.
    pub async fn apply(&self, event: &DecodedEvent) -> bool {
        let DecodedEvent::NowPlaying {
            index,
            filename,
            title,
            ..
        } = event
        else {
            return false;
        };

        let mut state = self.state.write().await;
        state.current_track = filename.clone();
        state.current_index = *index;
        state.current_title = title.clone();
        state.rev += 1;
        true
    }

    pub async fn set_backend(&self, health: BackendHealth) {
        let mut state = self.state.write().await;
        if state.backend != health {
            state.backend = health;
            state.rev += 1;
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    #[tokio::test]
    async fn test_default_is_empty() {
        let state = PlaybackState::new();
        assert_eq!(state.current_track().await, "");
        assert_eq!(state.backend().await, BackendHealth::NotStarted);
    }

    #[tokio::test]
    async fn test_now_playing_updates_track() {
        let state = PlaybackState::new();
        let event = decode("NOW_PLAYING|2|track7.mp3").unwrap();
        assert!(state.apply(&event).await);
        assert_eq!(state.current_track().await, "track7.mp3");

        let snap = state.snapshot().await;
        assert_eq!(snap.current_index, Some(2));
        assert_eq!(snap.rev, 1);
    }

    #[tokio::test]
    async fn test_short_or_plain_lines_leave_state() {
        let state = PlaybackState::new();
        state.apply(&decode("NOW_PLAYING|1|first.mp3|First").unwrap()).await;

        assert!(!state.apply(&decode("NOW_PLAYING|2").unwrap()).await);
        assert!(!state.apply(&decode("ACTION: Paused").unwrap()).await);

        let snap = state.snapshot().await;
        assert_eq!(snap.current_track, "first.mp3");
        assert_eq!(snap.current_title.as_deref(), Some("First"));
        assert_eq!(snap.rev, 1);
    }

    #[tokio::test]
    async fn test_last_event_wins() {
        let state = PlaybackState::new();
        for i in 0..10 {
            let line = format!("NOW_PLAYING|{}|song{}.mp3", i, i);
            state.apply(&decode(&line).unwrap()).await;
        }
        assert_eq!(state.current_track().await, "song9.mp3");
    }

    #[tokio::test]
    async fn test_backend_transitions_bump_rev_once() {
        let state = PlaybackState::new();
        state.set_backend(BackendHealth::Running).await;
        state.set_backend(BackendHealth::Running).await;
        state.set_backend(BackendHealth::Exited).await;
        let snap = state.snapshot().await;
        assert_eq!(snap.backend, BackendHealth::Exited);
        assert_eq!(snap.rev, 2);
    }
}
