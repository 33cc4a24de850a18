//! Inbound reconciliation
//!
//! Folds one decoded server frame into the durable store and the projection.
//! A frame is first planned against copies of the affected records, then the
//! plan is committed as one store transaction: if any write fails, the
//! records already written are restored and the frame leaves nothing behind.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hangouts_core::{
    FeatureRoute, Hangout, HangoutState, InboundFrame, Identity, Intent, Message, Result,
    TimeSource,
};
use tracing::{debug, info};

use crate::sync::SyncedStore;
use crate::unread::UnreadTracker;

// ----------------------------------------------------------------------------
// Outcome
// ----------------------------------------------------------------------------

/// Route change requested by a frame for the focused peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub peer: Identity,
    pub route: FeatureRoute,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Peers whose hangout was upserted
    pub peers: Vec<Identity>,
    pub navigation: Option<Navigation>,
    /// Peers added to (or refreshed in) the unread set
    pub unread: Vec<Identity>,
    /// Offline entries confirmed and removed from the buffer
    pub offline_cleared: usize,
}

// ----------------------------------------------------------------------------
// Plan
// ----------------------------------------------------------------------------

/// Staged copies of every record a frame touches
struct ReconcilePlan {
    hangouts: Vec<Hangout>,
    unread: Vec<Hangout>,
    unread_changed: bool,
    logs: BTreeMap<Identity, Vec<Message>>,
    dirty_logs: BTreeSet<Identity>,
    offline: Option<Vec<Intent>>,
    outcome: ReconcileOutcome,
}

impl ReconcilePlan {
    fn load(synced: &SyncedStore) -> Result<Self> {
        Ok(Self {
            hangouts: synced.hangouts()?,
            unread: synced.unread()?,
            unread_changed: false,
            logs: BTreeMap::new(),
            dirty_logs: BTreeSet::new(),
            offline: None,
            outcome: ReconcileOutcome::default(),
        })
    }

    fn find(&self, peer: &Identity) -> Option<&Hangout> {
        self.hangouts.iter().find(|h| &h.peer == peer)
    }

    fn upsert(&mut self, hangout: Hangout) {
        self.outcome.peers.push(hangout.peer.clone());
        match self.hangouts.iter_mut().find(|h| h.peer == hangout.peer) {
            Some(existing) => *existing = hangout,
            None => self.hangouts.push(hangout),
        }
    }

    fn log_mut(&mut self, synced: &SyncedStore, peer: &Identity) -> Result<&mut Vec<Message>> {
        match self.logs.entry(peer.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(synced.messages(peer)?)),
        }
    }

    fn mark_unread(&mut self, hangout: &Hangout) {
        UnreadTracker::add(&mut self.unread, hangout);
        self.unread_changed = true;
        self.outcome.unread.push(hangout.peer.clone());
    }
}

// ----------------------------------------------------------------------------
// Reconciler
// ----------------------------------------------------------------------------

pub struct Reconciler {
    time_source: Arc<dyn TimeSource>,
}

impl Reconciler {
    pub fn new(time_source: Arc<dyn TimeSource>) -> Self {
        Self { time_source }
    }

    /// Apply one frame. On error nothing has been written.
    pub fn reconcile(
        &self,
        synced: &mut SyncedStore,
        frame: InboundFrame,
    ) -> Result<ReconcileOutcome> {
        let kind = frame.kind();
        let outcome = synced.transaction(|synced| {
            let plan = self.plan(synced, frame)?;
            Self::commit(synced, plan)
        })?;
        info!(
            kind,
            peers = outcome.peers.len(),
            unread = outcome.unread.len(),
            "frame reconciled"
        );
        Ok(outcome)
    }

    fn plan(&self, synced: &SyncedStore, frame: InboundFrame) -> Result<ReconcilePlan> {
        let mut plan = ReconcilePlan::load(synced)?;
        match frame {
            InboundFrame::Hangout { hangout } => {
                self.stage_push(&mut plan, synced, hangout)?;
            }
            // the last qualifying entry decides the route
            InboundFrame::UnreadBatch { hangouts } => {
                for hangout in hangouts {
                    self.stage_push(&mut plan, synced, hangout)?;
                }
            }
            InboundFrame::Acknowledgement { hangout } => {
                self.stage_ack(&mut plan, synced, hangout)?;
            }
            InboundFrame::OfflineAcknowledgement { hangout } => {
                Self::stage_offline_cleanup(&mut plan, synced, &hangout)?;
                self.stage_ack(&mut plan, synced, hangout)?;
            }
        }
        Ok(plan)
    }

    /// A relationship change or message initiated by the peer
    fn stage_push(
        &self,
        plan: &mut ReconcilePlan,
        synced: &SyncedStore,
        mut hangout: Hangout,
    ) -> Result<()> {
        let read = synced.focused_peer() == Some(&hangout.peer);
        hangout.read = read;

        if let Some(body) = &hangout.message {
            let message = Message::from_body(body, hangout.peer.clone(), read);
            let log = plan.log_mut(synced, &hangout.peer)?;
            // duplicated pushes must not grow the log
            if !log.iter().any(|m| {
                m.author == message.author
                    && m.timestamp == message.timestamp
                    && m.text == message.text
            }) {
                log.push(message);
                plan.dirty_logs.insert(hangout.peer.clone());
            }
        }

        self.stage_common(plan, synced, hangout, read)
    }

    /// The server confirmed one of our intents
    fn stage_ack(
        &self,
        plan: &mut ReconcilePlan,
        synced: &SyncedStore,
        mut hangout: Hangout,
    ) -> Result<()> {
        let me = synced.identity().clone();
        let read = synced.focused_peer() == Some(&hangout.peer);
        hangout.delivered = true;
        hangout.read = read;

        if let Some(body) = &hangout.message {
            let log = plan.log_mut(synced, &hangout.peer)?;
            let sent = log
                .iter_mut()
                .find(|m| !m.system && m.author == me && m.timestamp == body.timestamp);
            match sent {
                Some(message) if message.delivered => {}
                Some(message) => {
                    message.delivered = true;
                    plan.dirty_logs.insert(hangout.peer.clone());
                }
                None => {
                    log.push(Message {
                        text: body.text.clone(),
                        timestamp: body.timestamp,
                        author: me.clone(),
                        delivered: true,
                        read: true,
                        system: false,
                    });
                    plan.dirty_logs.insert(hangout.peer.clone());
                }
            }
        }

        self.stage_common(plan, synced, hangout, read)
    }

    /// Block notice, unread bookkeeping, navigation and upsert, shared by
    /// every frame kind
    fn stage_common(
        &self,
        plan: &mut ReconcilePlan,
        synced: &SyncedStore,
        hangout: Hangout,
        read: bool,
    ) -> Result<()> {
        // a repeated Blocked record (same state and timestamp) already has its notice
        let repeated = plan.find(&hangout.peer).is_some_and(|existing| {
            existing.state == hangout.state && existing.timestamp == hangout.timestamp
        });
        if hangout.state == HangoutState::Blocked && !repeated {
            let notice = Message::system(
                format!("{} is blocked", hangout.peer),
                synced.identity().clone(),
                self.time_source.now(),
            );
            plan.log_mut(synced, &hangout.peer)?.push(notice);
            plan.dirty_logs.insert(hangout.peer.clone());
        }

        if !read {
            plan.mark_unread(&hangout);
        } else if !hangout.state.is_messaging() {
            plan.outcome.navigation = Some(Navigation {
                peer: hangout.peer.clone(),
                route: hangout.state.route(),
            });
        }
        plan.upsert(hangout);
        Ok(())
    }

    /// Remove buffered intents the server reports as delivered
    fn stage_offline_cleanup(
        plan: &mut ReconcilePlan,
        synced: &SyncedStore,
        hangout: &Hangout,
    ) -> Result<()> {
        let mut offline = synced.offline()?;
        let before = offline.len();
        offline.retain(|intent| {
            !(intent.peer == hangout.peer && intent.timestamp == hangout.timestamp)
        });
        let cleared = before - offline.len();
        if cleared > 0 {
            plan.outcome.offline_cleared = cleared;
            plan.offline = Some(offline);
        }
        Ok(())
    }

    /// Hangouts go first so a message log never outlives its hangout record
    fn commit(synced: &mut SyncedStore, mut plan: ReconcilePlan) -> Result<ReconcileOutcome> {
        synced.commit_hangouts(plan.hangouts)?;
        if plan.unread_changed {
            synced.commit_unread(plan.unread)?;
        }
        for peer in &plan.dirty_logs {
            if let Some(log) = plan.logs.remove(peer) {
                synced.commit_messages(peer.clone(), log)?;
            }
        }
        if let Some(offline) = plan.offline {
            debug!(cleared = plan.outcome.offline_cleared, "offline entries confirmed");
            synced.commit_offline(offline)?;
        }
        Ok(plan.outcome)
    }
}
