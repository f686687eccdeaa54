//! Principal identities and references.
//!
//! Identifiers arrive from configuration and callers either as JSON strings
//! or integers. They are normalised once, at decode time, into canonical
//! strings so that `12` and `"12"` always refer to the same principal.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Normalise a JSON identifier into its canonical string form.
///
/// Strings are trimmed, integers are printed in base 10, and floats with no
/// fractional part are printed as integers. Everything else has no
/// canonical form.
#[must_use]
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                #[allow(clippy::cast_possible_truncation)]
                let whole = (f.is_finite() && f.fract() == 0.0).then(|| (f as i64).to_string());
                whole
            }
        },
        _ => None,
    }
}

fn de_ident<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    canonical_id(&value).ok_or_else(|| {
        de::Error::custom(format!(
            "expected a string or integer identifier, found {value}"
        ))
    })
}

fn de_opt_ident<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => canonical_id(&value).map(Some).ok_or_else(|| {
            de::Error::custom(format!(
                "expected a string or integer identifier, found {value}"
            ))
        }),
    }
}

/// Identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(#[serde(deserialize_with = "de_ident")] String);

impl PrincipalId {
    /// Create an identifier from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_owned())
    }

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// The acting user, as seen by the evaluator.
///
/// The named fields and the free-form `attributes` together form the
/// `user.*` namespace of a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// User identifier.
    pub id: PrincipalId,
    /// Department the user belongs to.
    #[serde(default, deserialize_with = "de_opt_ident", skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    /// Position (job title) the user holds.
    #[serde(default, deserialize_with = "de_opt_ident", skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    /// System privilege level.
    #[serde(default, deserialize_with = "de_opt_ident", skip_serializing_if = "Option::is_none")]
    pub system_level: Option<String>,
    /// Any further attributes exposed to conditions.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl Principal {
    /// Create a principal with only an identifier.
    #[must_use]
    pub fn new(id: impl Into<PrincipalId>) -> Self {
        Self {
            id: id.into(),
            department_id: None,
            position_id: None,
            system_level: None,
            attributes: Map::new(),
        }
    }

    /// Set the department.
    #[must_use]
    pub fn with_department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = Some(department_id.into());
        self
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, position_id: impl Into<String>) -> Self {
        self.position_id = Some(position_id.into());
        self
    }

    /// Set the system level.
    #[must_use]
    pub fn with_system_level(mut self, level: impl Into<String>) -> Self {
        self.system_level = Some(level.into());
        self
    }

    /// Add a free-form attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Render the `user.*` namespace.
    ///
    /// Named fields win over attributes with the same key.
    #[must_use]
    pub fn to_namespace(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert("id".to_owned(), Value::String(self.id.as_str().to_owned()));
        for (key, field) in [
            ("department_id", &self.department_id),
            ("position_id", &self.position_id),
            ("system_level", &self.system_level),
        ] {
            if let Some(v) = field {
                map.insert(key.to_owned(), Value::String(v.clone()));
            }
        }
        Value::Object(map)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// What a [`PrincipalRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// Everyone at a given system level.
    SystemLevel,
    /// Everyone in a department.
    Department,
    /// Everyone holding a position.
    Position,
    /// One specific user.
    User,
}

impl PrincipalKind {
    /// The wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemLevel => "system_level",
            Self::Department => "department",
            Self::Position => "position",
            Self::User => "user",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static reference to one or more principals, e.g. `position = 3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalRef {
    /// What the value identifies.
    #[serde(rename = "type")]
    pub kind: PrincipalKind,
    /// Canonical identifier of the referenced user, department, position or level.
    #[serde(deserialize_with = "de_ident")]
    pub value: String,
}

impl PrincipalRef {
    /// Create a reference.
    #[must_use]
    pub fn new(kind: PrincipalKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into().trim().to_owned(),
        }
    }

    /// Reference one user.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::User, id)
    }

    /// Reference a department.
    #[must_use]
    pub fn department(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Department, id)
    }

    /// Reference a position.
    #[must_use]
    pub fn position(id: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Position, id)
    }

    /// Reference a system level.
    #[must_use]
    pub fn system_level(level: impl Into<String>) -> Self {
        Self::new(PrincipalKind::SystemLevel, level)
    }

    /// Whether `principal` is covered by this reference.
    #[must_use]
    pub fn matches(&self, principal: &Principal) -> bool {
        let attribute = match self.kind {
            PrincipalKind::User => Some(principal.id.as_str()),
            PrincipalKind::Department => principal.department_id.as_deref(),
            PrincipalKind::Position => principal.position_id.as_deref(),
            PrincipalKind::SystemLevel => principal.system_level.as_deref(),
        };
        attribute == Some(self.value.as_str())
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}
