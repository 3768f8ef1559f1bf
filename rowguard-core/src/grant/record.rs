//! Persisted grant records.
//!
//! A record stores one decision set for a (target object, holder) pair, where
//! the holder is either a single subject or a group. Each governed permission
//! is tri-state: a missing entry means the record has no opinion.

use crate::subject::{GroupId, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a permission-checkable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a grant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub i64);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a grant record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantHolder {
    /// Assigned to one subject directly.
    Subject(SubjectId),
    /// Inherited by every member of a group.
    Group(GroupId),
}

impl GrantHolder {
    pub fn subject(&self) -> Option<SubjectId> {
        match self {
            GrantHolder::Subject(id) => Some(*id),
            GrantHolder::Group(_) => None,
        }
    }

    pub fn group(&self) -> Option<GroupId> {
        match self {
            GrantHolder::Group(id) => Some(*id),
            GrantHolder::Subject(_) => None,
        }
    }
}

impl fmt::Display for GrantHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantHolder::Subject(id) => write!(f, "subject {}", id),
            GrantHolder::Group(id) => write!(f, "group {}", id),
        }
    }
}

/// One stored decision set.
///
/// # Example
///
/// ```rust
/// use rowguard_core::{GrantRecord, ObjectId, SubjectId};
///
/// let record = GrantRecord::for_subject(ObjectId(1), SubjectId(7))
///     .allow("create")
///     .deny("read");
///
/// assert_eq!(record.value("create"), Some(true));
/// assert_eq!(record.value("read"), Some(false));
/// assert_eq!(record.value("delete"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GrantId>,

    pub object: ObjectId,

    pub holder: GrantHolder,

    /// Decisions keyed by bare permission name. Absent means unset.
    #[serde(default)]
    pub values: BTreeMap<String, bool>,
}

impl GrantRecord {
    /// A record assigned directly to a subject.
    pub fn for_subject(object: ObjectId, subject: SubjectId) -> Self {
        Self {
            id: None,
            object,
            holder: GrantHolder::Subject(subject),
            values: BTreeMap::new(),
        }
    }

    /// A record inherited through group membership.
    pub fn for_group(object: ObjectId, group: GroupId) -> Self {
        Self {
            id: None,
            object,
            holder: GrantHolder::Group(group),
            values: BTreeMap::new(),
        }
    }

    pub fn allow(self, permission: impl Into<String>) -> Self {
        self.with_value(permission, Some(true))
    }

    pub fn deny(self, permission: impl Into<String>) -> Self {
        self.with_value(permission, Some(false))
    }

    /// Set or clear the decision for one permission.
    pub fn with_value(mut self, permission: impl Into<String>, value: Option<bool>) -> Self {
        self.set_value(permission, value);
        self
    }

    pub fn set_value(&mut self, permission: impl Into<String>, value: Option<bool>) {
        let permission = permission.into();
        match value {
            Some(v) => {
                self.values.insert(permission, v);
            }
            None => {
                self.values.remove(&permission);
            }
        }
    }

    /// The decision this record holds for `permission`, if any.
    pub fn value(&self, permission: &str) -> Option<bool> {
        self.values.get(permission).copied()
    }

    pub fn subject(&self) -> Option<SubjectId> {
        self.holder.subject()
    }

    pub fn group(&self) -> Option<GroupId> {
        self.holder.group()
    }

    /// Sort key used by every store when returning records: group records
    /// first, then direct records by ascending subject id.
    pub fn load_order(&self) -> (Option<SubjectId>, Option<GroupId>, Option<GrantId>) {
        (self.subject(), self.group(), self.id)
    }
}

/// A permission column in the grant store schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionColumn {
    pub name: String,

    /// Declared column default; `None` when the column defaults to unset.
    #[serde(default)]
    pub default: Option<bool>,
}

impl PermissionColumn {
    pub fn new(name: impl Into<String>, default: Option<bool>) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }

    /// A column with no declared default.
    pub fn nullable(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }
}

/// Selects the records relevant to one subject on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantQuery {
    pub object: ObjectId,
    pub subject: SubjectId,
    pub groups: Vec<GroupId>,
}

impl GrantQuery {
    pub fn new(object: ObjectId, subject: SubjectId, groups: &[GroupId]) -> Self {
        Self {
            object,
            subject,
            groups: groups.to_vec(),
        }
    }

    /// Whether `record` belongs in the result of this query.
    pub fn matches(&self, record: &GrantRecord) -> bool {
        if record.object != self.object {
            return false;
        }
        match record.holder {
            GrantHolder::Subject(id) => id == self.subject,
            GrantHolder::Group(id) => self.groups.contains(&id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_subject() {
        let record = GrantRecord::for_subject(ObjectId(1), SubjectId(2));
        assert_eq!(record.subject(), Some(SubjectId(2)));
        assert_eq!(record.group(), None);
        assert!(record.values.is_empty());
        assert!(record.id.is_none());
    }

    #[test]
    fn test_for_group() {
        let record = GrantRecord::for_group(ObjectId(1), GroupId(3));
        assert_eq!(record.subject(), None);
        assert_eq!(record.group(), Some(GroupId(3)));
    }

    #[test]
    fn test_with_value_clears_on_none() {
        let record = GrantRecord::for_subject(ObjectId(1), SubjectId(2))
            .allow("read")
            .with_value("read", None);
        assert_eq!(record.value("read"), None);
    }

    #[test]
    fn test_load_order_puts_groups_first() {
        let mut records = vec![
            GrantRecord::for_subject(ObjectId(1), SubjectId(9)),
            GrantRecord::for_group(ObjectId(1), GroupId(5)),
            GrantRecord::for_subject(ObjectId(1), SubjectId(2)),
            GrantRecord::for_group(ObjectId(1), GroupId(1)),
        ];
        records.sort_by_key(GrantRecord::load_order);

        let holders: Vec<_> = records.iter().map(|r| r.holder).collect();
        assert_eq!(
            holders,
            vec![
                GrantHolder::Group(GroupId(1)),
                GrantHolder::Group(GroupId(5)),
                GrantHolder::Subject(SubjectId(2)),
                GrantHolder::Subject(SubjectId(9)),
            ]
        );
    }

    #[test]
    fn test_query_matches() {
        let query = GrantQuery::new(ObjectId(1), SubjectId(2), &[GroupId(3)]);

        assert!(query.matches(&GrantRecord::for_subject(ObjectId(1), SubjectId(2))));
        assert!(query.matches(&GrantRecord::for_group(ObjectId(1), GroupId(3))));

        assert!(!query.matches(&GrantRecord::for_subject(ObjectId(1), SubjectId(4))));
        assert!(!query.matches(&GrantRecord::for_group(ObjectId(1), GroupId(4))));
        assert!(!query.matches(&GrantRecord::for_subject(ObjectId(2), SubjectId(2))));
    }

    #[test]
    fn test_record_serialization() {
        let record = GrantRecord::for_group(ObjectId(4), GroupId(8)).allow("update");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["holder"]["group"], 8);
        assert_eq!(json["values"]["update"], true);

        let parsed: GrantRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_holder_display() {
        assert_eq!(GrantHolder::Subject(SubjectId(1)).to_string(), "subject 1");
        assert_eq!(GrantHolder::Group(GroupId(2)).to_string(), "group 2");
    }
}
