//! Core data models for the citation network.
//!
//! This module contains the catalog entities (texts, authors, organizations,
//! keywords, fields of study, tags, citations and users) together with the
//! input shapes accepted when creating them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named catalog entry that is unique by name.
///
/// Organizations, keywords, fields of study and tags all share this shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Named {
    /// Unique identifier
    pub id: Uuid,

    /// Display name (unique within its kind)
    pub name: String,
}

/// Organization an author is affiliated with.
pub type Org = Named;

/// Free-form keyword attached to a text.
pub type Keyword = Named;

/// Field of study attached to a text.
pub type Fos = Named;

/// Tag attached to a text (usually predicted by the classifier).
pub type Tag = Named;

/// Reference to a named entry when creating texts or authors.
///
/// Entries are matched by name; `id` is only used when a new entry has to be
/// created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

impl NamedInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// An author with their organizations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    /// Unique identifier
    pub id: Uuid,

    /// Full name of the author
    pub name: String,

    /// Affiliated organizations
    pub orgs: Vec<Org>,
}

/// Author payload for create and update requests.
///
/// When `id` names an existing author, that author is reused as-is while
/// linking texts; otherwise a new author is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub orgs: Vec<NamedInput>,
}

impl AuthorInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            orgs: Vec::new(),
        }
    }
}

/// A publication in the citation network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Text {
    /// Unique identifier
    pub id: Uuid,

    /// Publication title
    pub title: String,

    /// Year of publication, when known
    pub year: Option<i32>,

    /// Number of recorded citations of this text
    pub n_citation: i64,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Venue (journal or conference) name
    pub venue_name: String,

    pub keywords: Vec<Keyword>,
    pub authors: Vec<Author>,
    pub fos: Vec<Fos>,
    pub tags: Vec<Tag>,
}

/// Payload for creating a text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewText {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub n_citation: i64,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub venue_name: String,
    #[serde(default)]
    pub keywords: Vec<NamedInput>,
    #[serde(default)]
    pub authors: Vec<AuthorInput>,
    #[serde(default)]
    pub fos: Vec<NamedInput>,
    #[serde(default)]
    pub tags: Vec<NamedInput>,
}

/// A directed citation: `text_id_from` cites `text_id_to`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    pub text_id_from: Uuid,
    pub text_id_to: Uuid,
}

/// A registered user.
///
/// The password hash is kept for verification but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email: String,
    #[serde(default)]
    pub author_id: Option<Uuid>,
}

/// Registration payload for new users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistration {
    pub login: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub author_id: Option<Uuid>,
}

/// Authors of a single text, as used by the co-authorship graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorship {
    pub text_id: Uuid,
    pub year: Option<i32>,
    pub author_ids: Vec<Uuid>,
}
