use crate::{
    config::HeaderConfig,
    error::{AclError, Result},
    models::SubjectRef,
};
use http::HeaderMap;
use std::str::FromStr;

/// How the caller was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    User,
    Visitor,
}

impl FromStr for AuthType {
    type Err = AclError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(AuthType::User),
            "visitor" => Ok(AuthType::Visitor),
            other => Err(AclError::Unauthenticated(format!("unknown auth type '{}'", other))),
        }
    }
}

/// Caller identity extracted from request metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub auth_type: Option<AuthType>,
    pub user_uid: Option<String>,
    pub visitor_uid: Option<String>,
    /// Namespace the user asks to act as (organization impersonation)
    pub requester_uid: Option<String>,
    /// Shareable-link code presented with the request
    pub share_code: Option<String>,
    /// Share token presented with the request
    pub share_token: Option<String>,
}

impl RequestContext {
    /// A context with no identity at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_uid: &str) -> Self {
        Self {
            auth_type: Some(AuthType::User),
            user_uid: Some(user_uid.to_string()),
            ..Self::default()
        }
    }

    pub fn visitor(visitor_uid: &str) -> Self {
        Self {
            auth_type: Some(AuthType::Visitor),
            visitor_uid: Some(visitor_uid.to_string()),
            ..Self::default()
        }
    }

    pub fn with_requester(mut self, requester_uid: &str) -> Self {
        self.requester_uid = Some(requester_uid.to_string());
        self
    }

    pub fn with_share_code(mut self, code: &str) -> Self {
        self.share_code = Some(code.to_string());
        self
    }

    pub fn with_share_token(mut self, token: &str) -> Self {
        self.share_token = Some(token.to_string());
        self
    }

    /// Read identity headers. Blank values count as absent; an unknown auth
    /// type is dropped and identity falls back to whichever uid is present.
    pub fn from_headers(headers: &HeaderMap, names: &HeaderConfig) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            auth_type: header(&names.auth_type).and_then(|raw| raw.parse().ok()),
            user_uid: header(&names.user_uid),
            visitor_uid: header(&names.visitor_uid),
            requester_uid: header(&names.requester_uid),
            share_code: header(&names.share_code),
            share_token: header(&names.share_token),
        }
    }

    /// The subject permission checks are evaluated for
    pub fn acting_subject(&self) -> Result<SubjectRef> {
        let user = self.user_uid.as_deref().map(SubjectRef::user);
        let visitor = self.visitor_uid.as_deref().map(SubjectRef::visitor);

        let subject = match self.auth_type {
            Some(AuthType::User) => user,
            Some(AuthType::Visitor) => visitor,
            None => user.or(visitor),
        };
        subject.ok_or_else(|| {
            AclError::Unauthenticated("no user or visitor identity in request".to_string())
        })
    }

    /// Id whose pin decides read routing for this request, if any
    pub fn routing_id(&self) -> Option<&str> {
        match self.auth_type {
            Some(AuthType::Visitor) => self.visitor_uid.as_deref(),
            _ => self.user_uid.as_deref().or(self.visitor_uid.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_from_headers() {
        let names = HeaderConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-type", HeaderValue::from_static("user"));
        headers.insert("x-user-uid", HeaderValue::from_static("u1"));
        headers.insert("x-requester-uid", HeaderValue::from_static("org1"));
        headers.insert("x-share-code", HeaderValue::from_static("  "));

        let ctx = RequestContext::from_headers(&headers, &names);
        assert_eq!(ctx.auth_type, Some(AuthType::User));
        assert_eq!(ctx.user_uid.as_deref(), Some("u1"));
        assert_eq!(ctx.requester_uid.as_deref(), Some("org1"));
        assert_eq!(ctx.share_code, None);
        assert_eq!(ctx.acting_subject().unwrap(), SubjectRef::user("u1"));
    }

    #[test]
    fn test_visitor_identity() {
        let ctx = RequestContext::visitor("v1");
        assert_eq!(ctx.acting_subject().unwrap(), SubjectRef::visitor("v1"));
        assert_eq!(ctx.routing_id(), Some("v1"));
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        assert!(RequestContext::anonymous().acting_subject().unwrap_err().is_unauthenticated());

        // Declared user without a uid
        let ctx = RequestContext {
            auth_type: Some(AuthType::User),
            visitor_uid: Some("v1".to_string()),
            ..RequestContext::default()
        };
        assert!(ctx.acting_subject().is_err());
    }
}
