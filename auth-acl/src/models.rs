use crate::error::{AclError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relation names the permission layer itself refers to. Any other relation
/// defined by the authorization model is passed through as an opaque string.
pub mod relations {
    pub const OWNER: &str = "owner";
    pub const ADMIN: &str = "admin";
    pub const WRITER: &str = "writer";
    pub const EXECUTOR: &str = "executor";
    pub const READER: &str = "reader";
    pub const MEMBER: &str = "member";

    /// Roles revoked when a subject's access to a resource is removed
    pub const STANDARD_ROLES: [&str; 4] = [ADMIN, WRITER, EXECUTOR, READER];
}

/// Subject types with a fixed meaning in this layer
pub mod subject_types {
    pub const USER: &str = "user";
    pub const VISITOR: &str = "visitor";
    pub const ORGANIZATION: &str = "organization";
    pub const LINK_CODE: &str = "code";
    pub const SHARE_LINK: &str = "share_link";
}

pub const WILDCARD: &str = "*";

/// A protected resource, rendered as `type:id` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: &str, object_id: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
        }
    }

    /// Parse a `type:id` object string as returned by the engine
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once(':') {
            Some((object_type, object_id)) if !object_type.is_empty() && !object_id.is_empty() => {
                Ok(Self::new(object_type, object_id))
            }
            _ => Err(AclError::MalformedSubject(format!(
                "object '{}' is not of the form type:id",
                raw
            ))),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// A subject parsed out of a `type:id` or `type:id#relation` token.
///
/// `type:*` is the wildcard for every subject of that type and
/// `group:g1#member` refers to the set of subjects holding `member` on
/// `group:g1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: Option<String>,
}

impl SubjectRef {
    pub fn new(subject_type: &str, subject_id: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            relation: None,
        }
    }

    pub fn user(user_id: &str) -> Self {
        Self::new(subject_types::USER, user_id)
    }

    pub fn visitor(visitor_id: &str) -> Self {
        Self::new(subject_types::VISITOR, visitor_id)
    }

    /// `type:*`, every subject of the given type
    pub fn wildcard(subject_type: &str) -> Self {
        Self::new(subject_type, WILDCARD)
    }

    pub fn link_code(code: &str) -> Self {
        Self::new(subject_types::LINK_CODE, code)
    }

    pub fn share_link(token: &str) -> Self {
        Self::new(subject_types::SHARE_LINK, token)
    }

    /// `type:id#relation`
    pub fn userset(subject_type: &str, subject_id: &str, relation: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            relation: Some(relation.to_string()),
        }
    }

    /// Parse an opaque subject token
    pub fn parse(token: &str) -> Result<Self> {
        let malformed = || {
            AclError::MalformedSubject(format!(
                "subject '{}' is not of the form type:id[#relation]",
                token
            ))
        };

        let (subject_type, rest) = token.split_once(':').ok_or_else(malformed)?;
        if subject_type.is_empty() || rest.is_empty() {
            return Err(malformed());
        }

        match rest.split_once('#') {
            Some((subject_id, relation)) => {
                if subject_id.is_empty() || relation.is_empty() {
                    return Err(malformed());
                }
                Ok(Self::userset(subject_type, subject_id, relation))
            }
            None => Ok(Self::new(subject_type, rest)),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.subject_id == WILDCARD
    }

    pub fn is_userset(&self) -> bool {
        self.relation.is_some()
    }

    /// The identifier used for consistency pinning. A userset pins the id of
    /// the subject it hangs off (`g1` for `group:g1#member`); wildcards don't
    /// name a subject and are never pinned.
    pub fn pin_id(&self) -> Option<&str> {
        if self.is_wildcard() {
            None
        } else {
            Some(&self.subject_id)
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Some(ref relation) => {
                write!(f, "{}:{}#{}", self.subject_type, self.subject_id, relation)
            }
            None => write!(f, "{}:{}", self.subject_type, self.subject_id),
        }
    }
}

/// A relationship tuple in the engine's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleKey {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl TupleKey {
    pub fn new(subject: &SubjectRef, relation: &str, object: &ObjectRef) -> Self {
        Self {
            user: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        }
    }

    pub fn subject(&self) -> Result<SubjectRef> {
        SubjectRef::parse(&self.user)
    }
}

impl fmt::Display for TupleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.user, self.relation, self.object)
    }
}

/// Partial tuple used to read stored relationships. The object is required
/// by the engine; subject and relation narrow the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    pub object: String,
}

impl TupleFilter {
    pub fn object(object: &ObjectRef) -> Self {
        Self {
            user: None,
            relation: None,
            object: object.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: &SubjectRef) -> Self {
        self.user = Some(subject.to_string());
        self
    }

    pub fn with_relation(mut self, relation: &str) -> Self {
        self.relation = Some(relation.to_string());
        self
    }

    pub fn matches(&self, key: &TupleKey) -> bool {
        if key.object != self.object {
            return false;
        }
        if let Some(ref user) = self.user {
            if key.user != *user {
                return false;
            }
        }
        if let Some(ref relation) = self.relation {
            if key.relation != *relation {
                return false;
            }
        }
        true
    }
}

/// Consistency preference sent with read requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Consistency {
    #[default]
    Unspecified,
    /// Skip the engine's internal query cache
    HigherConsistency,
}

/// A store known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Store and model identifiers resolved once when the client is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationModel {
    pub store_id: String,
    pub model_id: String,
}

/// The owner of a resource as recorded by its `owner` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub owner_type: String,
    pub owner_id: String,
}

/// Collapse a plural collection name onto its singular type ("users" -> "user")
pub fn singular_type(raw: &str) -> &str {
    match raw.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_subject() {
        let subject = SubjectRef::parse("user:u1").unwrap();
        assert_eq!(subject, SubjectRef::user("u1"));
        assert_eq!(subject.pin_id(), Some("u1"));
        assert_eq!(subject.to_string(), "user:u1");
    }

    #[test]
    fn test_parse_userset_and_wildcard() {
        let group = SubjectRef::parse("group:g1#member").unwrap();
        assert_eq!(group.subject_type, "group");
        assert_eq!(group.subject_id, "g1");
        assert_eq!(group.relation.as_deref(), Some("member"));
        assert_eq!(group.pin_id(), Some("g1"));
        assert_eq!(group.to_string(), "group:g1#member");

        let public = SubjectRef::parse("visitor:*").unwrap();
        assert!(public.is_wildcard());
        assert_eq!(public.pin_id(), None);
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        for token in ["", "user", "user:", ":u1", "group:g1#", "group:#member"] {
            let err = SubjectRef::parse(token).unwrap_err();
            assert!(matches!(err, AclError::MalformedSubject(_)), "token {:?}", token);
        }
    }

    #[test]
    fn test_filter_matching() {
        let object = ObjectRef::new("pipeline", "p1");
        let key = TupleKey::new(&SubjectRef::user("u1"), relations::READER, &object);

        assert!(TupleFilter::object(&object).matches(&key));
        assert!(TupleFilter::object(&object)
            .with_subject(&SubjectRef::user("u1"))
            .with_relation(relations::READER)
            .matches(&key));
        assert!(!TupleFilter::object(&object).with_relation(relations::WRITER).matches(&key));
        assert!(!TupleFilter::object(&ObjectRef::new("pipeline", "p2")).matches(&key));
    }

    #[test]
    fn test_singular_type() {
        assert_eq!(singular_type("users"), "user");
        assert_eq!(singular_type("organizations"), "organization");
        assert_eq!(singular_type("user"), "user");
        assert_eq!(singular_type("s"), "s");
    }

    #[test]
    fn test_consistency_wire_names() {
        assert_eq!(
            serde_json::to_string(&Consistency::HigherConsistency).unwrap(),
            "\"HIGHER_CONSISTENCY\""
        );
        assert_eq!(serde_json::to_string(&Consistency::Unspecified).unwrap(), "\"UNSPECIFIED\"");
    }
}
