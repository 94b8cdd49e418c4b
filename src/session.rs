//! External collaborators and lifecycle events
//!
//! The host owns process detection, the entity model and the local player.
//! This crate only sees them through the traits below and the
//! [`SessionEvent`] channel.

use crate::platform::Address;

/// Process-state signals consumed by acquisition and refresh
pub trait SessionProbe: Send + Sync {
    /// Whether the host considers a session active in the target
    fn is_session_active(&self) -> bool;

    /// Whether the round itself has started and its state is trustworthy
    ///
    /// Enables the at-origin validation check.
    fn is_in_round(&self) -> bool {
        self.is_session_active()
    }

    /// Address of the remote camera list, read fresh each attempt
    fn camera_list_address(&self) -> Option<Address>;
}

/// The local player, as seen by the per-tick updater
pub trait LocalViewer {
    /// Whether the player is aiming down sights
    fn is_aiming(&self) -> bool;

    /// Zoom component of the equipped optic, if any
    fn optic_component(&self) -> Option<Address>;
}

/// Lifecycle notifications delivered by the host
///
/// | Event | Clears |
/// |---|---|
/// | `Begin` | nothing; starts acquisition if idle |
/// | `End` | handles, matrix addresses, snapshot (to identity), scalars, overlay flag |
/// | `ProcessStopped` | everything `End` clears, then stops the worker and parks in `Idle` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session (round) started
    Begin,
    /// The session ended
    End,
    /// The target process exited
    ProcessStopped,
}
