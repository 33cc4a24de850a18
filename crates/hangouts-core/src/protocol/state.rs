//! Relationship State Vocabulary
//!
//! Each side of a hangout tracks one state value. Two mirrored vocabularies
//! exist: roles the peer took (as pushed to us) and acknowledgements of roles
//! we took. Events overwrite the stored value without any guard.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship state of a hangout (the `command` / `state` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HangoutState {
    Inviter,
    Accepter,
    Decliner,
    Blocker,
    Unblocker,
    Messanger,
    Invited,
    Accepted,
    Declined,
    Blocked,
    Unblocked,
    Messaged,
}

impl HangoutState {
    pub const ALL: [HangoutState; 12] = [
        HangoutState::Inviter,
        HangoutState::Accepter,
        HangoutState::Decliner,
        HangoutState::Blocker,
        HangoutState::Unblocker,
        HangoutState::Messanger,
        HangoutState::Invited,
        HangoutState::Accepted,
        HangoutState::Declined,
        HangoutState::Blocked,
        HangoutState::Unblocked,
        HangoutState::Messaged,
    ];

    /// Wire name of the state
    pub fn name(&self) -> &'static str {
        match self {
            HangoutState::Inviter => "INVITER",
            HangoutState::Accepter => "ACCEPTER",
            HangoutState::Decliner => "DECLINER",
            HangoutState::Blocker => "BLOCKER",
            HangoutState::Unblocker => "UNBLOCKER",
            HangoutState::Messanger => "MESSANGER",
            HangoutState::Invited => "INVITED",
            HangoutState::Accepted => "ACCEPTED",
            HangoutState::Declined => "DECLINED",
            HangoutState::Blocked => "BLOCKED",
            HangoutState::Unblocked => "UNBLOCKED",
            HangoutState::Messaged => "MESSAGED",
        }
    }

    /// Whether this is a peer-confirmed acknowledgement
    pub fn is_acknowledgement(&self) -> bool {
        matches!(
            self,
            HangoutState::Invited
                | HangoutState::Accepted
                | HangoutState::Declined
                | HangoutState::Blocked
                | HangoutState::Unblocked
                | HangoutState::Messaged
        )
    }

    /// Ongoing messaging, in either vocabulary
    pub fn is_messaging(&self) -> bool {
        matches!(self, HangoutState::Messanger | HangoutState::Messaged)
    }

    /// Acknowledgement that confirms this role (identity for acknowledgements)
    pub fn acknowledged(&self) -> HangoutState {
        match self {
            HangoutState::Inviter => HangoutState::Invited,
            HangoutState::Accepter => HangoutState::Accepted,
            HangoutState::Decliner => HangoutState::Declined,
            HangoutState::Blocker => HangoutState::Blocked,
            HangoutState::Unblocker => HangoutState::Unblocked,
            HangoutState::Messanger => HangoutState::Messaged,
            ack => *ack,
        }
    }

    /// Feature route the UI shows for a hangout in this state
    pub fn route(&self) -> FeatureRoute {
        match self {
            HangoutState::Inviter => FeatureRoute::Invitee,
            HangoutState::Invited => FeatureRoute::Inviter,
            HangoutState::Decliner | HangoutState::Declined => FeatureRoute::Declined,
            HangoutState::Blocker => FeatureRoute::Blocked,
            HangoutState::Blocked => FeatureRoute::Unblock,
            HangoutState::Accepter
            | HangoutState::Accepted
            | HangoutState::Unblocker
            | HangoutState::Unblocked
            | HangoutState::Messanger
            | HangoutState::Messaged => FeatureRoute::Hangchat,
        }
    }
}

impl fmt::Display for HangoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HangoutState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HangoutState::ALL
            .iter()
            .copied()
            .find(|state| state.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown hangout state: {}", s))
    }
}

// ----------------------------------------------------------------------------
// Feature Routes
// ----------------------------------------------------------------------------

/// Feature screens the navigation collaborator can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureRoute {
    /// Someone invited us; accept or decline
    Invitee,
    /// Our invite is pending
    Inviter,
    Hangchat,
    Declined,
    /// The peer blocked us
    Blocked,
    /// We blocked the peer
    Unblock,
}

impl FeatureRoute {
    pub fn path(&self) -> &'static str {
        match self {
            FeatureRoute::Invitee => "/hangouts/invitee",
            FeatureRoute::Inviter => "/hangouts/inviter",
            FeatureRoute::Hangchat => "/hangouts/hangchat",
            FeatureRoute::Declined => "/hangouts/declined",
            FeatureRoute::Blocked => "/hangouts/blocked",
            FeatureRoute::Unblock => "/hangouts/unblock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip_through_serde() {
        for state in HangoutState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.name()));
            assert_eq!(state.name().parse::<HangoutState>().unwrap(), state);
        }
        assert!("FRIEND".parse::<HangoutState>().is_err());
    }

    #[test]
    fn test_every_role_maps_to_an_acknowledgement() {
        for state in HangoutState::ALL {
            assert!(state.acknowledged().is_acknowledgement());
        }
        assert_eq!(HangoutState::Blocker.acknowledged(), HangoutState::Blocked);
        assert_eq!(HangoutState::Blocked.acknowledged(), HangoutState::Blocked);
    }

    #[test]
    fn test_messaging_variants_route_to_chat() {
        assert!(HangoutState::Messanger.is_messaging());
        assert!(HangoutState::Messaged.is_messaging());
        assert!(!HangoutState::Inviter.is_messaging());
        assert_eq!(HangoutState::Messanger.route(), FeatureRoute::Hangchat);
        assert_eq!(HangoutState::Inviter.route().path(), "/hangouts/invitee");
    }
}
