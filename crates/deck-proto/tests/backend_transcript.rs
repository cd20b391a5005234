//! Replays a captured backend session through the decoder, line channel and
//! playback state, the way the daemon's reader task does.
use deck_proto::channel::LineChannel;
use deck_proto::protocol::{decode, Command, DecodedEvent};
use deck_proto::state::PlaybackState;

const TRANSCRIPT: &str = "\
SYSTEM: C Backend V3.0 Initializing...
SYSTEM: Ready. Loaded 3 unique songs.
NOW_PLAYING|0|intro.mp3|Intro

ACTION: Skipped Next
NOW_PLAYING|1|so what.mp3|So What
ACTION: Database Reloaded. Count: 3
LIBRARY_START
LIB|1|Intro
LIB|2|So What
LIB|3|Blue in Green
LIBRARY_END
NOW_PLAYING|2
ERROR: Song ID 9 not found.
";

async fn replay(channel: &LineChannel, state: &PlaybackState) -> Vec<DecodedEvent> {
    let mut events = Vec::new();
    for raw in TRANSCRIPT.split_inclusive('\n') {
        if let Some(event) = decode(raw) {
            state.apply(&event).await;
            channel.enqueue(event.line().to_string());
            events.push(event);
        }
    }
    events
}

#[tokio::test]
async fn transcript_drains_in_order_and_tracks_last_song() {
    let channel = LineChannel::new();
    let state = PlaybackState::new();
    let events = replay(&channel, &state).await;

    let lines = channel.drain_all().await;
    let expected: Vec<&str> = TRANSCRIPT.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, expected);
    assert!(channel.drain_all().await.is_empty());

    // The short NOW_PLAYING line near the end must not clobber the track.
    let snap = state.snapshot().await;
    assert_eq!(snap.current_track, "so what.mp3");
    assert_eq!(snap.current_index, Some(1));
    assert_eq!(snap.current_title.as_deref(), Some("So What"));

    let library: Vec<(u32, &str)> = events
        .iter()
        .filter_map(|e| match e {
            DecodedEvent::LibraryEntry { id, title, .. } => Some((*id, title.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(library, vec![(1, "Intro"), (2, "So What"), (3, "Blue in Green")]);
    assert!(matches!(events.last(), Some(DecodedEvent::Error(_))));
}

#[test]
fn collaborator_commands_render_exactly() {
    assert_eq!(Command::Delete { id: 5 }.to_wire().unwrap(), "12 5\n");
    assert_eq!(Command::Reload.to_wire().unwrap(), "8\n");
    assert_eq!(Command::parse("5").unwrap().to_wire().unwrap(), "5\n");
}
