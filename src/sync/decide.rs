//! Three-way decision engine.
//!
//! A pure function over (local record, peer record, baseline, mode); no
//! component state, no I/O. Expressed as a closed variant set so every
//! combination of inputs maps to exactly one action.

use crate::types::{FileRec, PeerMode};

/// Sync action for one (note, peer) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    NoOp,
    Pull,
    Push,
    Conflict,
    DeleteLocal,
    DeletePeer,
    CreatePeer,
    CreateLocal,
    RenamePeer,
    RenameLocal,
}

impl SyncDecision {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Conflict => "conflict",
            Self::DeleteLocal => "delete_local",
            Self::DeletePeer => "delete_peer",
            Self::CreatePeer => "create_peer",
            Self::CreateLocal => "create_local",
            Self::RenamePeer => "rename_peer",
            Self::RenameLocal => "rename_local",
        }
    }
}

/// Inputs for one decision.
#[derive(Debug, Clone, Copy)]
pub struct DecideInput<'a> {
    pub local: Option<&'a FileRec>,
    pub peer: Option<&'a FileRec>,
    /// Last-agreed digest for this (cast-id, peer) pair.
    pub baseline: Option<&'a str>,
    /// The peer's declared mode.
    pub mode: PeerMode,
    /// Whether every peer the local note declares is watch-only. Decides the
    /// fallback direction of a rename.
    pub all_watch: bool,
}

/// Decide the action for one (note, peer) pair.
#[must_use]
pub fn decide(input: &DecideInput<'_>) -> SyncDecision {
    match (input.local, input.peer) {
        (Some(local), None) => match input.baseline {
            // First contact with an absent peer copy.
            None => {
                if input.mode.is_live() {
                    SyncDecision::CreatePeer
                } else {
                    SyncDecision::NoOp
                }
            }
            // The pair synced before, so the peer copy was deleted there.
            Some(baseline) if local.digest == baseline => SyncDecision::DeleteLocal,
            Some(_) => SyncDecision::Conflict,
        },
        (Some(local), Some(peer)) => decide_both(input, local, peer),
        (None, Some(peer)) => match input.baseline {
            Some(baseline) if peer.digest == baseline => {
                // Accept the local deletion; watch never originates.
                if input.mode.is_live() {
                    SyncDecision::DeletePeer
                } else {
                    SyncDecision::NoOp
                }
            }
            Some(_) => SyncDecision::Conflict,
            // Adoption: a peer note declared for this vault, never synced.
            None => SyncDecision::CreateLocal,
        },
        (None, None) => SyncDecision::NoOp,
    }
}

fn decide_both(input: &DecideInput<'_>, local: &FileRec, peer: &FileRec) -> SyncDecision {
    let Some(baseline) = input.baseline else {
        // First contact, both copies exist.
        return if local.digest == peer.digest {
            first_contact_rename(input, local, peer)
        } else {
            SyncDecision::Conflict
        };
    };

    if local.digest == baseline && peer.digest != baseline {
        SyncDecision::Pull
    } else if peer.digest == baseline && local.digest != baseline {
        if input.mode.is_live() {
            SyncDecision::Push
        } else {
            SyncDecision::NoOp
        }
    } else if local.digest != baseline && peer.digest != baseline && local.digest != peer.digest {
        SyncDecision::Conflict
    } else {
        aligned_rename(input, local, peer)
    }
}

/// First contact with identical content at different relpaths. Live mode
/// imposes the local path on the peer; the peer's path is adopted only when
/// every declared peer is watch.
fn first_contact_rename(input: &DecideInput<'_>, local: &FileRec, peer: &FileRec) -> SyncDecision {
    if local.relpath == peer.relpath {
        return SyncDecision::NoOp;
    }
    if input.mode.is_live() {
        SyncDecision::RenamePeer
    } else if input.all_watch {
        SyncDecision::RenameLocal
    } else {
        SyncDecision::NoOp
    }
}

/// Baseline established, digests aligned, paths disagreeing: the rename
/// direction follows the mode alone.
fn aligned_rename(input: &DecideInput<'_>, local: &FileRec, peer: &FileRec) -> SyncDecision {
    if local.relpath == peer.relpath {
        return SyncDecision::NoOp;
    }
    if input.mode.is_live() { SyncDecision::RenamePeer } else { SyncDecision::RenameLocal }
}
