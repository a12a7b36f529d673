//! Post status state machine.
//!
//! Three states: draft, scheduled, published. Two user-driven
//! resolutions live here as pure functions; the third transition
//! (scheduled -> published once `scheduled_at` passes) belongs to the
//! publisher sweep and is expressed as a conditional bulk update in
//! `jobs::publisher`, never through these functions.

use time::OffsetDateTime;

use crate::domain::post::PostStatus;

/// Resolve the status a new post is created with.
///
/// A `scheduled_at` strictly in the future forces `scheduled` no matter
/// what the caller asked for. Anything else (absent or already passed)
/// leaves the requested status in charge, defaulting to `draft`. A past
/// `scheduled_at` deliberately falls through: a post created with
/// `status = published` and an old timestamp is published immediately.
pub fn status_on_create(
    requested: Option<PostStatus>,
    scheduled_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> PostStatus {
    if scheduled_at.is_some_and(|at| at > now) {
        return PostStatus::Scheduled;
    }
    requested.unwrap_or(PostStatus::Draft)
}

/// Resolve the status after a partial update.
///
/// `published` is terminal for this machine: the forcing rule never
/// fires on a published post, so rescheduling `scheduled_at` on one
/// does not pull it back to `scheduled`. An explicit status in the
/// patch is still honored there as a direct user edit, outside the
/// machine.
///
/// For draft/scheduled posts the create-time rule is re-applied
/// whenever the caller touched `scheduled_at`: a new future time wins
/// over any requested status.
pub fn status_on_update(
    current: PostStatus,
    requested: Option<PostStatus>,
    scheduled_at_changed: bool,
    new_scheduled_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> PostStatus {
    if current == PostStatus::Published {
        return requested.unwrap_or(current);
    }
    if scheduled_at_changed && new_scheduled_at.is_some_and(|at| at > now) {
        return PostStatus::Scheduled;
    }
    requested.unwrap_or(current)
}
