//! Invalidation Rules
//!
//! Static table mapping each mutation kind to the key prefixes it invalidates.

use std::borrow::Cow;
use std::fmt;

use url::form_urlencoded;

/// Placeholder substituted with the mutation target's id.
const ID_PLACEHOLDER: &str = "{id}";

// == Invalidation Scope ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Mark matching entries stale; they refetch on next access
    MarkStale,
    /// Mark stale and immediately refetch entries that have subscribers
    MarkStaleAndRefetchVisible,
}

impl InvalidationScope {
    pub fn refetches_visible(&self) -> bool {
        matches!(self, InvalidationScope::MarkStaleAndRefetchVisible)
    }
}

// == Invalidation Rule ==
/// A key prefix plus what to do with matching entries.
///
/// Static rules may contain an `{id}` placeholder, filled from the mutation
/// target rather than from the mutation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRule {
    pub prefix: Cow<'static, str>,
    pub scope: InvalidationScope,
}

impl InvalidationRule {
    pub const fn mark_stale(prefix: &'static str) -> Self {
        Self {
            prefix: Cow::Borrowed(prefix),
            scope: InvalidationScope::MarkStale,
        }
    }

    pub const fn refetch(prefix: &'static str) -> Self {
        Self {
            prefix: Cow::Borrowed(prefix),
            scope: InvalidationScope::MarkStaleAndRefetchVisible,
        }
    }

    pub fn new(prefix: impl Into<String>, scope: InvalidationScope) -> Self {
        Self {
            prefix: Cow::Owned(prefix.into()),
            scope,
        }
    }

    /// Substitutes the `{id}` placeholder.
    ///
    /// Without an id the prefix is cut at the placeholder, which widens the
    /// rule to every record under the same segment.
    pub fn resolve(&self, id: Option<&str>) -> InvalidationRule {
        let Some(at) = self.prefix.find(ID_PLACEHOLDER) else {
            return self.clone();
        };
        let prefix = match id {
            Some(id) => {
                let encoded: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
                self.prefix.replacen(ID_PLACEHOLDER, &encoded, 1)
            }
            None => self.prefix[..at].to_string(),
        };
        InvalidationRule::new(prefix, self.scope)
    }
}

// == Mutation Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateFeature,
    UpdateFeature,
    CreatePanel,
    UpdatePanel,
    CreateSession,
    UpdateSession,
    MarkNotificationRead,
    MarkAllNotificationsRead,
}

static CREATE_FEATURE: &[InvalidationRule] = &[InvalidationRule::refetch("features/list")];
static UPDATE_FEATURE: &[InvalidationRule] = &[
    InvalidationRule::refetch("features/detail/{id}"),
    InvalidationRule::refetch("features/list"),
];
static CREATE_PANEL: &[InvalidationRule] = &[InvalidationRule::refetch("panels/list")];
static UPDATE_PANEL: &[InvalidationRule] = &[
    InvalidationRule::refetch("panels/detail/{id}"),
    InvalidationRule::refetch("panels/list"),
];
static CREATE_SESSION: &[InvalidationRule] = &[InvalidationRule::refetch("sessions/list")];
static UPDATE_SESSION: &[InvalidationRule] = &[
    InvalidationRule::refetch("sessions/detail/{id}"),
    InvalidationRule::refetch("sessions/list"),
];
static MARK_NOTIFICATION_READ: &[InvalidationRule] = &[
    InvalidationRule::refetch("notifications/detail/{id}"),
    InvalidationRule::refetch("notifications/list"),
    InvalidationRule::refetch("notifications/unread-count"),
];
static MARK_ALL_NOTIFICATIONS_READ: &[InvalidationRule] =
    &[InvalidationRule::refetch("notifications/")];

impl MutationKind {
    pub const ALL: [MutationKind; 8] = [
        MutationKind::CreateFeature,
        MutationKind::UpdateFeature,
        MutationKind::CreatePanel,
        MutationKind::UpdatePanel,
        MutationKind::CreateSession,
        MutationKind::UpdateSession,
        MutationKind::MarkNotificationRead,
        MutationKind::MarkAllNotificationsRead,
    ];

    /// The fixed prefix set this mutation invalidates on success.
    pub fn rules(&self) -> &'static [InvalidationRule] {
        match self {
            MutationKind::CreateFeature => CREATE_FEATURE,
            MutationKind::UpdateFeature => UPDATE_FEATURE,
            MutationKind::CreatePanel => CREATE_PANEL,
            MutationKind::UpdatePanel => UPDATE_PANEL,
            MutationKind::CreateSession => CREATE_SESSION,
            MutationKind::UpdateSession => UPDATE_SESSION,
            MutationKind::MarkNotificationRead => MARK_NOTIFICATION_READ,
            MutationKind::MarkAllNotificationsRead => MARK_ALL_NOTIFICATIONS_READ,
        }
    }

    /// Rules with the target id substituted.
    pub fn resolved_rules(&self, target: Option<&str>) -> Vec<InvalidationRule> {
        self.rules().iter().map(|rule| rule.resolve(target)).collect()
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::CreateFeature => "create-feature",
            MutationKind::UpdateFeature => "update-feature",
            MutationKind::CreatePanel => "create-panel",
            MutationKind::UpdatePanel => "update-panel",
            MutationKind::CreateSession => "create-session",
            MutationKind::UpdateSession => "update-session",
            MutationKind::MarkNotificationRead => "mark-notification-read",
            MutationKind::MarkAllNotificationsRead => "mark-all-notifications-read",
        };
        f.write_str(name)
    }
}
