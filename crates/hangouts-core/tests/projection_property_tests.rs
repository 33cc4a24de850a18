//! Property-based tests for the projection reducer
//!
//! Channel and fetch actions must never touch conversation data, and the
//! focused conversation only follows writes for its own peer.

use hangouts_core::{
    Action, Hangout, HangoutState, HangoutStore, Identity, Message, Projection, Timestamp,
};
use proptest::prelude::*;

fn arb_peer() -> impl Strategy<Value = Identity> {
    prop::sample::select(vec!["bob", "carol", "dave", "erin"]).prop_map(Identity::new)
}

fn arb_state() -> impl Strategy<Value = HangoutState> {
    prop::sample::select(HangoutState::ALL.to_vec())
}

fn arb_hangout() -> impl Strategy<Value = Hangout> {
    (arb_peer(), arb_state(), 0u64..1_000)
        .prop_map(|(peer, state, millis)| Hangout::new(peer, state, Timestamp::new(millis)))
}

fn arb_hangouts() -> impl Strategy<Value = Vec<Hangout>> {
    prop::collection::vec(arb_hangout(), 0..6)
}

fn arb_messages(author: Identity) -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(
        ("[a-z ]{1,12}", 0u64..1_000).prop_map(move |(text, millis)| Message {
            text,
            timestamp: Timestamp::new(millis),
            author: author.clone(),
            delivered: true,
            read: false,
            system: false,
        }),
        0..4,
    )
}

/// Actions that only concern the channel or the search box
fn arb_transient_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::ChannelConnecting),
        Just(Action::ChannelOpened),
        Just(Action::ChannelClosing),
        Just(Action::ChannelClosed),
        "[a-z ]{0,20}".prop_map(|error| Action::ChannelError { error }),
        Just(Action::FetchStarted),
        "[a-z ]{0,20}".prop_map(|error| Action::FetchFailed { error }),
        arb_hangouts().prop_map(|hangouts| Action::FetchSucceeded { hangouts }),
        "[a-z]{0,8}".prop_map(|text| Action::SearchChanged { text }),
        Just(Action::SendingFulfilled),
        (0usize..5).prop_map(|queued| Action::OfflineUpdated { queued }),
    ]
}

fn loaded(hangouts: Vec<Hangout>, unread: Vec<Hangout>) -> HangoutStore {
    let mut store = HangoutStore::new();
    store.dispatch(Action::Loaded {
        hangouts,
        unread,
        queued: 0,
    });
    store
}

fn conversation_data(state: &Projection) -> (Vec<Hangout>, Vec<Hangout>, Option<Hangout>, Vec<Message>) {
    (
        state.hangouts.clone(),
        state.unread.clone(),
        state.hangout.clone(),
        state.messages.clone(),
    )
}

proptest! {
    /// Property: channel, fetch and search actions leave conversation data alone
    #[test]
    fn transient_actions_keep_conversations(
        hangouts in arb_hangouts(),
        unread in arb_hangouts(),
        actions in prop::collection::vec(arb_transient_action(), 1..20),
    ) {
        let mut store = loaded(hangouts, unread);
        let before = conversation_data(store.state());

        for action in actions {
            store.dispatch(action);
        }

        prop_assert_eq!(conversation_data(store.state()), before);
    }

    /// Property: message writes for another peer never replace the focused log
    #[test]
    fn focused_log_follows_its_own_peer(
        focused in arb_peer(),
        other in arb_peer(),
        (focused_log, other_log) in arb_peer().prop_flat_map(|author| {
            (arb_messages(author.clone()), arb_messages(author))
        }),
    ) {
        let mut store = loaded(Vec::new(), Vec::new());
        store.dispatch(Action::HangoutSelected {
            hangout: Hangout::new(focused.clone(), HangoutState::Messanger, Timestamp::new(1)),
            messages: focused_log.clone(),
        });

        store.dispatch(Action::MessagesUpdated {
            peer: other.clone(),
            messages: other_log.clone(),
        });

        let expected = if other == focused { other_log } else { focused_log };
        prop_assert_eq!(&store.state().messages, &expected);
    }

    /// Property: a hangouts write refreshes the focused hangout when it carries that peer
    #[test]
    fn hangouts_write_refreshes_focus(hangouts in arb_hangouts(), focused in arb_peer()) {
        let mut store = loaded(Vec::new(), Vec::new());
        let selected = Hangout::new(focused.clone(), HangoutState::Inviter, Timestamp::new(0));
        store.dispatch(Action::HangoutSelected {
            hangout: selected.clone(),
            messages: Vec::new(),
        });

        store.dispatch(Action::HangoutsUpdated { hangouts: hangouts.clone() });

        let state = store.state();
        prop_assert_eq!(&state.hangouts, &hangouts);
        let expected = hangouts
            .iter()
            .find(|h| h.peer == focused)
            .cloned()
            .unwrap_or(selected);
        prop_assert_eq!(state.hangout.as_ref(), Some(&expected));
    }
}
