//! The acting principal whose permissions are evaluated.
//!
//! Authentication lives with the host application. This module only defines
//! what the resolver needs to know about a subject, plus two small
//! implementations for hosts without their own user type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an individual subject (user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a group of subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the resolver needs to know about the acting principal.
pub trait Subject {
    /// Identity of the subject, or `None` for an anonymous one.
    fn id(&self) -> Option<SubjectId>;

    /// Inactive subjects are never granted anything by the backend.
    fn is_active(&self) -> bool;

    /// Whether the subject is anonymous.
    fn is_anonymous(&self) -> bool {
        self.id().is_none()
    }

    /// Superusers hold every declared permission when enumerating.
    fn is_superuser(&self) -> bool;

    /// Groups the subject belongs to.
    fn groups(&self) -> &[GroupId];
}

/// A plain authenticated user.
///
/// # Example
///
/// ```rust
/// use rowguard_core::{GroupId, Subject, User};
///
/// let mike = User::new(1).with_groups([GroupId(10)]);
/// assert!(mike.is_active());
/// assert!(!mike.is_anonymous());
/// assert_eq!(mike.groups(), &[GroupId(10)]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: SubjectId,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    superuser: bool,
    #[serde(default)]
    groups: Vec<GroupId>,
}

fn default_active() -> bool {
    true
}

impl User {
    /// An active, non-superuser user with no groups.
    pub fn new(id: i64) -> Self {
        Self {
            id: SubjectId(id),
            active: true,
            superuser: false,
            groups: Vec::new(),
        }
    }

    /// Set the group memberships.
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    /// Mark the user as a superuser.
    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    /// Mark the user as inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Add a group membership if not already present.
    pub fn join(&mut self, group: GroupId) {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
    }

    /// Remove a group membership.
    pub fn leave(&mut self, group: GroupId) {
        self.groups.retain(|g| *g != group);
    }

    pub fn subject_id(&self) -> SubjectId {
        self.id
    }
}

impl Subject for User {
    fn id(&self) -> Option<SubjectId> {
        Some(self.id)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_superuser(&self) -> bool {
        self.superuser
    }

    fn groups(&self) -> &[GroupId] {
        &self.groups
    }
}

/// An unauthenticated visitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymousUser;

impl Subject for AnonymousUser {
    fn id(&self) -> Option<SubjectId> {
        None
    }

    fn is_active(&self) -> bool {
        true
    }

    fn is_superuser(&self) -> bool {
        false
    }

    fn groups(&self) -> &[GroupId] {
        &[]
    }
}
