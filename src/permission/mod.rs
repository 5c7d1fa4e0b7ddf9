//! Authorization for organizer actions.
//!
//! The original data layer guarded every table with "only the event's creator
//! may touch its rows". Here that rule lives at the application layer: each
//! management handler asks [`crate::events::Event::check_user_has_permission`]
//! whether the logged-in user is an organizer of the event before doing
//! anything. Judges are deliberately outside this system; their only
//! credential is the access token in their dashboard URL.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageEvent,
    ManageParticipants,
    ManageScoring,
}
