//! Unread tracking
//!
//! The unread set holds at most one entry per peer, and every entry has a
//! matching hangout record.

use hangouts_core::{Hangout, Identity, Result};
use tracing::debug;

use crate::sync::SyncedStore;

pub struct UnreadTracker;

impl UnreadTracker {
    /// Record an inbound hangout from a peer that is not focused
    pub fn add(unread: &mut Vec<Hangout>, hangout: &Hangout) {
        let mut entry = hangout.clone();
        entry.read = false;
        match unread.iter_mut().find(|h| h.peer == entry.peer) {
            Some(existing) => *existing = entry,
            None => unread.push(entry),
        }
    }

    /// Mark everything from `peer` read, in the durable store and the projection.
    /// Returns whether anything changed.
    pub fn clear(synced: &mut SyncedStore, peer: &Identity) -> Result<bool> {
        let mut changed = false;

        let mut unread = synced.unread()?;
        let before = unread.len();
        unread.retain(|h| &h.peer != peer);
        if unread.len() != before {
            synced.commit_unread(unread)?;
            changed = true;
        }

        let mut hangouts = synced.hangouts()?;
        if let Some(hangout) = hangouts.iter_mut().find(|h| &h.peer == peer && !h.read) {
            hangout.read = true;
            synced.commit_hangouts(hangouts)?;
            changed = true;
        }

        let mut messages = synced.messages(peer)?;
        if messages.iter().any(|m| !m.read) {
            messages.iter_mut().for_each(|m| m.read = true);
            synced.commit_messages(peer.clone(), messages)?;
            changed = true;
        }

        if changed {
            debug!(%peer, "conversation marked read");
        }
        Ok(changed)
    }

    /// Drop entries whose peer has no hangout record
    pub fn retain_known(unread: &mut Vec<Hangout>, hangouts: &[Hangout]) -> usize {
        let before = unread.len();
        unread.retain(|u| hangouts.iter().any(|h| h.peer == u.peer));
        before - unread.len()
    }

    pub fn is_subset(unread: &[Hangout], hangouts: &[Hangout]) -> bool {
        unread
            .iter()
            .all(|u| hangouts.iter().any(|h| h.peer == u.peer))
    }
}
