//! Family-scoped resource model.
//!
//! # Responsibility
//! - Define the one persisted shape shared by all six resource kinds.
//! - Expose the two attributes the permission engine reads through the
//!   `Resource` capability trait.
//!
//! # Invariants
//! - `visibility` defaults to `Public` on creation.
//! - `created_by` is set once at creation and never rewritten.
//! - `updated_by`/`updated_at` are provenance only; the engine never reads them.
//!
//! # See also
//! - docs/architecture/permissions.md

use crate::model::family::GroupId;
use crate::model::ActorId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one family-scoped resource.
pub type ResourceId = Uuid;

const TITLE_MAX_CHARS: usize = 200;

/// Capability read by the permission engine.
///
/// Every resource kind satisfies this through its two shared fields, so the
/// decision logic is written once for all of them.
pub trait Resource {
    /// Identity token of the creator, `None` for legacy/system rows.
    fn created_by(&self) -> Option<&str>;
    fn visibility(&self) -> Visibility;
}

impl<T: Resource + ?Sized> Resource for &T {
    fn created_by(&self) -> Option<&str> {
        (**self).created_by()
    }

    fn visibility(&self) -> Visibility {
        (**self).visibility()
    }
}

/// Per-resource edit mode, settable only by group owners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the creator (and owners) may modify.
    Private,
    /// Any member may modify; deletion still requires authorship.
    #[default]
    Public,
}

impl Visibility {
    pub const ALL: [Visibility; 2] = [Visibility::Private, Visibility::Public];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource category. All kinds share one permission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Note,
    Card,
    Document,
    Event,
    List,
    Subscription,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Note,
        ResourceKind::Card,
        ResourceKind::Document,
        ResourceKind::Event,
        ResourceKind::List,
        ResourceKind::Subscription,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Card => "card",
            Self::Document => "document",
            Self::Event => "event",
            Self::List => "list",
            Self::Subscription => "subscription",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "note" => Some(Self::Note),
            "card" => Some(Self::Card),
            "document" => Some(Self::Document),
            "event" => Some(Self::Event),
            "list" => Some(Self::List),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bare ownership/visibility pair for callers that hold nothing else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    pub created_by: Option<ActorId>,
    pub visibility: Visibility,
}

impl ResourceAttributes {
    pub fn new(created_by: Option<&str>, visibility: Visibility) -> Self {
        Self {
            created_by: created_by.map(str::to_string),
            visibility,
        }
    }
}

impl Resource for ResourceAttributes {
    fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }
}

/// Canonical persisted record for every family-scoped resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub group_id: GroupId,
    pub kind: ResourceKind,
    pub title: String,
    /// Free-form body (markdown, list items, event details).
    pub body: String,
    pub created_by: Option<ActorId>,
    pub visibility: Visibility,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub updated_by: Option<ActorId>,
    /// Unix epoch milliseconds of the latest mutation.
    pub updated_at: Option<i64>,
}

impl ResourceRecord {
    /// Creates a new public resource with a generated stable ID.
    pub fn new(
        group_id: GroupId,
        kind: ResourceKind,
        title: impl Into<String>,
        created_by: impl Into<ActorId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            kind,
            title: title.into(),
            body: String::new(),
            created_by: Some(created_by.into()),
            visibility: Visibility::default(),
            created_at: 0,
            updated_by: None,
            updated_at: None,
        }
    }

    /// Validates user-editable fields before persistence.
    pub fn validate(&self) -> Result<(), ResourceValidationError> {
        validate_title(&self.title)
    }
}

impl Resource for ResourceRecord {
    fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }
}

/// Validates one resource title.
pub fn validate_title(title: &str) -> Result<(), ResourceValidationError> {
    if title.trim().is_empty() {
        return Err(ResourceValidationError::EmptyTitle);
    }
    let chars = title.chars().count();
    if chars > TITLE_MAX_CHARS {
        return Err(ResourceValidationError::TitleTooLong {
            max_chars: TITLE_MAX_CHARS,
            actual_chars: chars,
        });
    }
    Ok(())
}

/// Field validation errors for resource writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValidationError {
    EmptyTitle,
    TitleTooLong { max_chars: usize, actual_chars: usize },
}

impl Display for ResourceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "resource title must not be empty"),
            Self::TitleTooLong {
                max_chars,
                actual_chars,
            } => write!(
                f,
                "resource title is {actual_chars} chars; at most {max_chars} allowed"
            ),
        }
    }
}

impl Error for ResourceValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        validate_title, Resource, ResourceKind, ResourceRecord,
        ResourceValidationError, Visibility,
    };
    use uuid::Uuid;

    #[test]
    fn new_record_defaults_to_public_with_creator() {
        let record = ResourceRecord::new(Uuid::new_v4(), ResourceKind::List, "groceries", "u1");
        assert_eq!(record.visibility, Visibility::Public);
        assert_eq!(record.created_by(), Some("u1"));
        assert!(record.updated_by.is_none());
    }

    #[test]
    fn title_validation_rejects_blank_and_oversized() {
        assert_eq!(validate_title("   "), Err(ResourceValidationError::EmptyTitle));
        let long = "x".repeat(201);
        assert!(matches!(
            validate_title(&long),
            Err(ResourceValidationError::TitleTooLong { actual_chars: 201, .. })
        ));
        validate_title("Dentist").expect("plain title is valid");
    }

    #[test]
    fn kinds_and_visibility_parse_their_own_labels() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        for visibility in Visibility::ALL {
            assert_eq!(Visibility::parse(visibility.as_str()), Some(visibility));
        }
        assert_eq!(Visibility::parse("PUBLIC"), None);
    }
}
