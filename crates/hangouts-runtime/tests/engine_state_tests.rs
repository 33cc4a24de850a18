//! Engine state tests
//!
//! Drive the engine state machine directly, one command or event at a time,
//! and check the durable store and the projection after every step.

use std::sync::Arc;

use hangouts_core::{
    Command, Effect, Event, FeatureRoute, HangoutError, HangoutRepository, HangoutState,
    Identity, ManualTimeSource, RecordingStore, ServerConfig,
};
use hangouts_runtime::{EngineState, Navigation, Session};
use serde_json::json;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

struct Harness {
    state: EngineState,
    memory: RecordingStore,
    time: Arc<ManualTimeSource>,
}

impl Harness {
    fn new() -> Self {
        Self::with_memory(RecordingStore::new())
    }

    fn with_memory(memory: RecordingStore) -> Self {
        let time = Arc::new(ManualTimeSource::new(1_000));
        let repository = HangoutRepository::new("alice".into(), Box::new(memory.clone()));
        let state = EngineState::new(
            Session::new("alice"),
            ServerConfig::default(),
            repository,
            time.clone(),
        );
        Self {
            state,
            memory,
            time,
        }
    }

    fn command(&mut self, command: Command) -> hangouts_runtime::Step {
        self.state.handle_command(command).expect("command should apply")
    }

    fn event(&mut self, event: Event) -> hangouts_runtime::Step {
        self.state.handle_event(event).expect("event should apply")
    }

    fn connect(&mut self) -> u64 {
        let step = self.command(Command::Connect);
        match step.effects.as_slice() {
            [Effect::Connect { connection_id, url }] => {
                assert_eq!(url, "ws://localhost:3000/hangouts/?username=alice");
                *connection_id
            }
            other => panic!("expected a connect effect, got {other:?}"),
        }
    }

    fn open(&mut self) -> Vec<Effect> {
        let connection_id = self.connect();
        self.event(Event::ChannelOpened { connection_id }).effects
    }

    fn frame(&mut self, frame: serde_json::Value) -> hangouts_runtime::Step {
        let connection_id = self.state.lifecycle.connection_id();
        self.event(Event::FrameReceived {
            connection_id,
            frame: frame.to_string(),
        })
    }

    fn submit(&mut self, peer: &str, command: HangoutState, text: Option<&str>) -> Vec<Effect> {
        self.command(Command::SubmitIntent {
            peer: peer.into(),
            command,
            email: None,
            text: text.map(str::to_string),
        })
        .effects
    }

    fn open_conversation(&mut self, peer: &str) {
        self.command(Command::OpenConversation { peer: peer.into() });
    }

    /// Durable store and projection agree on everything the projection mirrors
    fn assert_in_sync(&self) {
        let synced = &self.state.synced;
        let projection = synced.state();
        assert_eq!(projection.hangouts, synced.hangouts().unwrap());
        assert_eq!(projection.unread, synced.unread().unwrap());
        assert_eq!(projection.queued, synced.offline().unwrap().len());
        if let Some(peer) = projection.focused_peer() {
            assert_eq!(projection.messages, synced.messages(peer).unwrap());
        }
        for unread in &projection.unread {
            assert!(projection.hangouts.iter().any(|h| h.peer == unread.peer));
        }
    }
}

fn sent_frames(effects: &[Effect]) -> Vec<serde_json::Value> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Send { frame, .. } => Some(serde_json::from_str(frame).unwrap()),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Offline send and replay
// ----------------------------------------------------------------------------

#[test]
fn test_offline_send_then_reconnect() {
    let mut harness = Harness::new();
    harness.command(Command::Load);

    let effects = harness.submit("bob", HangoutState::Messanger, Some("hi"));
    assert!(effects.is_empty());

    let projection = harness.state.projection();
    assert!(projection.sending);
    assert_eq!(projection.queued, 1);
    let bob = projection.find(&"bob".into()).unwrap();
    assert!(!bob.delivered);
    harness.assert_in_sync();

    let effects = harness.open();
    let frames = sent_frames(&effects);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["offline"], json!(true));
    assert_eq!(frames[0]["username"], json!("bob"));
    assert_eq!(frames[0]["command"], json!("MESSANGER"));
    assert_eq!(frames[0]["message"]["text"], json!("hi"));
    assert!(harness.state.synced.offline().unwrap().is_empty());
    assert!(!harness.state.projection().sending);

    harness.frame(json!({
        "type": "ACKHOWLEDGEMENT",
        "hangout": {
            "username": "bob",
            "state": "MESSAGED",
            "timestamp": 1_000,
            "message": { "text": "hi", "timestamp": 1_000 }
        }
    }));

    let bob = harness.state.projection().find(&"bob".into()).unwrap().clone();
    assert!(bob.delivered);
    assert_eq!(bob.state, HangoutState::Messaged);
    let log = harness.state.synced.messages(&"bob".into()).unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].delivered);
    harness.assert_in_sync();
    assert_eq!(harness.state.stats.intents_replayed, 1);
}

#[test]
fn test_reopen_with_empty_buffer_sends_nothing() {
    let mut harness = Harness::new();
    harness.submit("bob", HangoutState::Inviter, None);
    assert_eq!(sent_frames(&harness.open()).len(), 1);

    let connection_id = harness.state.lifecycle.connection_id();
    harness.event(Event::ChannelClosed {
        connection_id,
        reason: Some("network".to_string()),
    });
    assert!(sent_frames(&harness.open()).is_empty());
}

#[test]
fn test_entries_buffered_across_reconnects_are_sent_once_each() {
    let mut harness = Harness::new();
    harness.submit("bob", HangoutState::Inviter, None);
    harness.time.advance(10);
    harness.submit("carol", HangoutState::Inviter, None);

    let connection_id = harness.connect();
    // dropped before it ever opened
    harness.event(Event::ChannelClosed {
        connection_id,
        reason: None,
    });
    assert_eq!(harness.state.synced.offline().unwrap().len(), 2);

    let frames = sent_frames(&harness.open());
    let peers: Vec<_> = frames.iter().map(|f| f["username"].clone()).collect();
    assert_eq!(peers, vec![json!("bob"), json!("carol")]);
}

#[test]
fn test_send_while_open_is_not_buffered() {
    let mut harness = Harness::new();
    harness.open();
    let frames = sent_frames(&harness.submit("bob", HangoutState::Messanger, Some("yo")));
    assert_eq!(frames.len(), 1);
    assert!(frames[0].get("offline").is_none());
    assert_eq!(harness.state.projection().queued, 0);
    harness.assert_in_sync();
}

// ----------------------------------------------------------------------------
// Inbound reconciliation
// ----------------------------------------------------------------------------

#[test]
fn test_message_in_focused_conversation_is_read() {
    let mut harness = Harness::new();
    harness.open();
    harness.submit("carol", HangoutState::Messanger, Some("hello"));
    harness.open_conversation("carol");

    let step = harness.frame(json!({
        "type": "HANGOUT",
        "hangout": {
            "username": "carol",
            "state": "MESSANGER",
            "timestamp": 2_000,
            "message": { "text": "hey alice", "timestamp": 2_000 }
        }
    }));

    assert!(step.navigation.is_none());
    let projection = harness.state.projection();
    assert!(projection.unread.is_empty());
    let last = projection.messages.last().unwrap();
    assert_eq!(last.text, "hey alice");
    assert_eq!(last.author, "carol");
    assert!(last.read);
    harness.assert_in_sync();
}

#[test]
fn test_invite_from_unfocused_peer_goes_to_unread() {
    let mut harness = Harness::new();
    harness.open();

    let step = harness.frame(json!({
        "type": "HANGOUT",
        "hangout": { "username": "dave", "state": "INVITER", "timestamp": 5 }
    }));

    assert!(step.navigation.is_none());
    let projection = harness.state.projection();
    assert_eq!(projection.unread.len(), 1);
    assert_eq!(projection.unread[0].peer, "dave");
    assert!(!projection.find(&"dave".into()).unwrap().read);
    harness.assert_in_sync();

    // opening the conversation clears it everywhere
    harness.open_conversation("dave");
    assert!(harness.state.projection().unread.is_empty());
    assert!(harness.state.projection().find(&"dave".into()).unwrap().read);
    harness.assert_in_sync();
}

#[test]
fn test_decline_for_focused_peer_navigates() {
    let mut harness = Harness::new();
    harness.open();
    harness.submit("dave", HangoutState::Inviter, None);
    harness.open_conversation("dave");

    let step = harness.frame(json!({
        "type": "HANGOUT",
        "hangout": { "username": "dave", "state": "DECLINER", "timestamp": 9 }
    }));

    assert_eq!(
        step.navigation,
        Some(Navigation {
            peer: "dave".into(),
            route: FeatureRoute::Declined,
        })
    );
}

#[test]
fn test_block_ack_synthesizes_notice() {
    let mut harness = Harness::new();
    harness.open();
    harness.submit("eve", HangoutState::Blocker, None);
    harness.open_conversation("eve");
    harness.time.set(4_000);

    let step = harness.frame(json!({
        "type": "ACKHOWLEDGEMENT",
        "hangout": { "username": "eve", "state": "BLOCKED", "timestamp": 1_000 }
    }));

    assert_eq!(
        step.navigation,
        Some(Navigation {
            peer: "eve".into(),
            route: FeatureRoute::Unblock,
        })
    );
    let messages = &harness.state.projection().messages;
    assert_eq!(messages.iter().filter(|m| m.system).count(), 1);
    assert_eq!(messages[0].timestamp.as_millis(), 4_000);
    harness.assert_in_sync();
}

#[test]
fn test_unread_batch_on_reconnect() {
    let mut harness = Harness::new();
    harness.open();
    harness.frame(json!({
        "type": "UNREAD_HANGOUTS",
        "hangouts": [
            { "username": "dave", "state": "INVITER", "timestamp": 1 },
            { "username": "zoe", "state": "MESSANGER", "timestamp": 2,
              "message": { "text": "ping", "timestamp": 2 } }
        ]
    }));

    let projection = harness.state.projection();
    assert_eq!(projection.hangouts.len(), 2);
    assert_eq!(projection.unread.len(), 2);
    assert_eq!(harness.state.synced.messages(&"zoe".into()).unwrap().len(), 1);
    harness.assert_in_sync();
}

#[test]
fn test_offline_ack_removes_buffered_entry() {
    let mut harness = Harness::new();
    harness.submit("bob", HangoutState::Inviter, None);
    harness.time.advance(5);
    harness.submit("carol", HangoutState::Inviter, None);

    // the replay already drained the buffer; write a stale entry back to check cleanup
    let pending = harness.state.synced.offline().unwrap();
    harness.open();
    harness.state.synced.commit_offline(pending).unwrap();

    harness.frame(json!({
        "type": "OFFLINE_ACKN",
        "hangout": { "username": "bob", "state": "INVITED", "timestamp": 1_000 }
    }));

    let remaining = harness.state.synced.offline().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].peer, "carol");
    assert!(harness.state.projection().find(&"bob".into()).unwrap().delivered);
    harness.assert_in_sync();
}

// ----------------------------------------------------------------------------
// Failure handling
// ----------------------------------------------------------------------------

#[test]
fn test_malformed_frame_changes_nothing() {
    let mut harness = Harness::new();
    harness.open();
    harness.frame(json!({
        "type": "HANGOUT",
        "hangout": { "username": "dave", "state": "INVITER", "timestamp": 5 }
    }));
    harness.memory.clear_write_log();
    let before = harness.state.projection().clone();
    let connection_id = harness.state.lifecycle.connection_id();

    for frame in [
        "not json".to_string(),
        json!({ "type": "HANGOUT", "hangout": { "username": "dave" } }).to_string(),
        json!({ "type": "MYSTERY", "hangout": {} }).to_string(),
        json!({ "type": "HANGOUT", "hangout": { "username": "", "state": "INVITER", "timestamp": 1 } })
            .to_string(),
    ] {
        let result = harness.state.handle_event(Event::FrameReceived {
            connection_id,
            frame,
        });
        assert!(matches!(result, Err(HangoutError::Reconcile(_))));
    }

    assert!(harness.memory.write_log().is_empty());
    assert_eq!(harness.state.projection(), &before);
    assert_eq!(harness.state.stats.frames_rejected, 4);
}

#[test]
fn test_storage_failure_aborts_frame_without_writes() {
    let mut harness = Harness::new();
    harness.open();
    harness.memory.fail_writes_to("alice-dave-messages");
    harness.memory.clear_write_log();
    let before = harness.state.projection().clone();
    let connection_id = harness.state.lifecycle.connection_id();

    let result = harness.state.handle_event(Event::FrameReceived {
        connection_id,
        frame: json!({
            "type": "HANGOUT",
            "hangout": { "username": "dave", "state": "MESSANGER", "timestamp": 5,
                         "message": { "text": "yo", "timestamp": 5 } }
        })
        .to_string(),
    });

    assert!(matches!(result, Err(HangoutError::Storage(_))));
    let synced = &harness.state.synced;
    assert!(synced.hangouts().unwrap().is_empty());
    assert!(synced.unread().unwrap().is_empty());
    assert!(synced.messages(&"dave".into()).unwrap().is_empty());
    assert_eq!(harness.state.projection().hangouts, before.hangouts);
    assert_eq!(harness.state.projection().unread, before.unread);
    harness.assert_in_sync();

    // the next frame goes through once the store recovers
    harness.memory.heal();
    harness.frame(json!({
        "type": "HANGOUT",
        "hangout": { "username": "erin", "state": "INVITER", "timestamp": 6 }
    }));
    assert_eq!(harness.state.projection().unread.len(), 1);
    harness.assert_in_sync();
}

#[test]
fn test_storage_failure_undoes_optimistic_intent() {
    let mut harness = Harness::new();
    harness.command(Command::Load);
    harness.memory.fail_writes_to("alice-offline-hangouts");

    let result = harness.state.handle_command(Command::SubmitIntent {
        peer: "bob".into(),
        command: HangoutState::Messanger,
        email: None,
        text: Some("hi".to_string()),
    });

    assert!(matches!(result, Err(HangoutError::Storage(_))));
    assert!(harness.state.synced.hangouts().unwrap().is_empty());
    assert!(harness.state.synced.messages(&"bob".into()).unwrap().is_empty());
    assert_eq!(harness.state.projection().queued, 0);
    harness.assert_in_sync();
}

#[test]
fn test_corrupt_store_fails_load_until_repaired() {
    let mut harness = Harness::new();
    harness.submit("bob", HangoutState::Inviter, None);
    harness.memory.fail_reads_of("alice-hangouts");

    let result = harness.state.handle_command(Command::Load);
    assert!(matches!(result, Err(HangoutError::Storage(_))));
    assert!(!harness.state.projection().loaded);

    harness.memory.heal();
    harness.command(Command::Load);
    assert!(harness.state.projection().loaded);
    assert_eq!(harness.state.projection().hangouts.len(), 1);
}

#[test]
fn test_events_from_replaced_connection_are_ignored() {
    let mut harness = Harness::new();
    let first = harness.connect();
    let second = harness.connect();
    assert_ne!(first, second);

    let step = harness.event(Event::ChannelOpened {
        connection_id: first,
    });
    assert!(step.effects.is_empty());
    assert!(!harness.state.lifecycle.is_open());

    harness.event(Event::FrameReceived {
        connection_id: first,
        frame: json!({
            "type": "HANGOUT",
            "hangout": { "username": "dave", "state": "INVITER", "timestamp": 5 }
        })
        .to_string(),
    });
    assert!(harness.state.projection().hangouts.is_empty());
    assert_eq!(harness.state.stats.stale_events, 2);

    harness.event(Event::ChannelOpened {
        connection_id: second,
    });
    assert!(harness.state.projection().ready());
}

#[test]
fn test_channel_error_is_flagged() {
    let mut harness = Harness::new();
    let connection_id = harness.connect();
    harness.event(Event::ChannelError {
        connection_id,
        error: "refused".to_string(),
    });
    harness.event(Event::ChannelClosed {
        connection_id,
        reason: Some("refused".to_string()),
    });

    let projection = harness.state.projection();
    assert_eq!(projection.channel_error.as_deref(), Some("refused"));
    assert!(!projection.ready());
}

#[test]
fn test_disconnect_closes_live_connection() {
    let mut harness = Harness::new();
    harness.open();
    let connection_id = harness.state.lifecycle.connection_id();

    let step = harness.command(Command::Disconnect);
    assert_eq!(step.effects, vec![Effect::Close { connection_id }]);
    harness.event(Event::ChannelClosed {
        connection_id,
        reason: None,
    });
    assert!(!harness.state.projection().ready());

    // intents now go to the buffer
    harness.submit("bob", HangoutState::Inviter, None);
    assert_eq!(harness.state.projection().queued, 1);
}

// ----------------------------------------------------------------------------
// Load, search and drafts
// ----------------------------------------------------------------------------

#[test]
fn test_load_hydrates_from_durable_store() {
    let memory = RecordingStore::new();
    {
        let mut harness = Harness::with_memory(memory.clone());
        harness.open();
        harness.frame(json!({
            "type": "HANGOUT",
            "hangout": { "username": "dave", "state": "INVITER", "timestamp": 5 }
        }));
        harness.command(Command::Disconnect);
        harness.submit("bob", HangoutState::Inviter, None);
    }

    let repository = HangoutRepository::new("alice".into(), Box::new(memory));
    let mut state = EngineState::new(
        Session::new("alice"),
        ServerConfig::default(),
        repository,
        Arc::new(ManualTimeSource::new(0)),
    );
    state.handle_command(Command::Load).unwrap();

    let projection = state.projection();
    assert_eq!(projection.hangouts.len(), 2);
    assert_eq!(projection.unread.len(), 1);
    assert_eq!(projection.queued, 1);
    assert!(projection.sending);
}

#[test]
fn test_search_prefers_local_hangouts() {
    let mut harness = Harness::new();
    harness.submit("bobby", HangoutState::Inviter, None);

    let step = harness.command(Command::Search {
        query: "BOB".to_string(),
    });
    assert!(step.search.is_none());
    assert_eq!(harness.state.projection().search_results.len(), 1);

    let step = harness.command(Command::Search {
        query: "zed".to_string(),
    });
    assert_eq!(step.search.as_deref(), Some("zed"));
    assert!(harness.state.projection().loading);

    // a result for an older query is dropped
    harness.event(Event::SearchCompleted {
        query: "BOB".to_string(),
        result: Ok(Vec::new()),
    });
    assert!(harness.state.projection().loading);

    harness.event(Event::SearchCompleted {
        query: "zed".to_string(),
        result: Err("status 500".to_string()),
    });
    let projection = harness.state.projection();
    assert!(!projection.loading);
    assert_eq!(projection.error.as_deref(), Some("status 500"));
}

#[test]
fn test_intents_to_self_or_nobody_are_dropped() {
    let mut harness = Harness::new();
    harness.submit("alice", HangoutState::Inviter, None);
    harness.submit("  ", HangoutState::Inviter, None);
    assert!(harness.state.projection().hangouts.is_empty());
    assert!(harness.memory.write_log().is_empty());
}

#[test]
fn test_draft_text_is_cleared_on_submit() {
    let mut harness = Harness::new();
    harness.command(Command::MessageTextChanged {
        text: "half a thought".to_string(),
    });
    assert_eq!(harness.state.projection().message_text, "half a thought");
    harness.submit("bob", HangoutState::Messanger, Some("half a thought"));
    assert!(harness.state.projection().message_text.is_empty());
    assert_eq!(
        harness
            .state
            .projection()
            .last_intent
            .as_ref()
            .map(|i| i.peer.clone()),
        Some(Identity::new("bob"))
    );
}
