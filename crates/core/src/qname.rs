//! Qualified backend entity names: `/namespace/[package/]entity`.

use thiserror::Error;

/// Namespace placeholder resolved by the backend to the caller's own namespace.
pub const DEFAULT_NAMESPACE: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualifiedNameError {
    #[error("empty name")]
    Empty,
    #[error("'{0}' is not qualified (expect /namespace/entity or package/entity)")]
    Unqualified(String),
    #[error("'{0}' has an empty or '.' segment")]
    BadSegment(String),
    #[error("'{0}' has too many segments")]
    TooManySegments(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub namespace: String,
    /// `entity` or `package/entity`
    pub entity: String,
}

impl QualifiedName {
    /// Parse a qualified name; `default_ns` fills in names of the form `package/entity`.
    ///
    /// A name without any `/` is rejected: a bare entity does not identify a namespace.
    pub fn parse(name: &str, default_ns: &str) -> Result<Self, QualifiedNameError> {
        if name.is_empty() {
            return Err(QualifiedNameError::Empty);
        }
        let (explicit_ns, body) = match name.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let parts: Vec<&str> = body.split('/').collect();
        if parts.iter().any(|p| p.is_empty() || *p == ".") {
            return Err(QualifiedNameError::BadSegment(name.to_string()));
        }
        match (explicit_ns, parts.as_slice()) {
            (_, [_]) => Err(QualifiedNameError::Unqualified(name.to_string())),
            (true, [ns, rest @ ..]) if rest.len() <= 2 => Ok(Self { namespace: (*ns).to_string(), entity: rest.join("/") }),
            // ns/pkg/entity: leading slash implied
            (false, [ns, pkg, entity]) => Ok(Self { namespace: (*ns).to_string(), entity: format!("{}/{}", pkg, entity) }),
            (false, [pkg, entity]) => Ok(Self { namespace: default_ns.to_string(), entity: format!("{}/{}", pkg, entity) }),
            _ => Err(QualifiedNameError::TooManySegments(name.to_string())),
        }
    }

    /// Backend form: `/namespace/entity`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.namespace, self.entity)
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}
