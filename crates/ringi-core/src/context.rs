//! Read-only evaluation context.
//!
//! A [`Context`] exposes four fixed namespaces to the condition evaluator:
//!
//! | Namespace | Contents |
//! |-----------|----------|
//! | `user.*` | the acting [`Principal`] |
//! | `data.*` | the business record under evaluation |
//! | `current_time.*` | the injected instant, broken into calendar fields |
//! | `request.*` | caller-supplied request metadata |
//!
//! Contexts are built once per evaluation and never mutated afterwards.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConditionError, ConditionResult};
use crate::types::Principal;

/// One of the four top-level namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The acting user.
    User,
    /// The business record.
    Data,
    /// The evaluation instant.
    CurrentTime,
    /// Request metadata.
    Request,
}

impl Namespace {
    /// All namespaces, in display order.
    pub const ALL: [Self; 4] = [Self::User, Self::Data, Self::CurrentTime, Self::Request];

    /// The wire prefix of this namespace.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Data => "data",
            Self::CurrentTime => "current_time",
            Self::Request => "request",
        }
    }

    /// Look up a namespace by its prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == prefix)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dotted attribute reference such as `data.vendor.is_new`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrPath {
    namespace: Namespace,
    segments: Vec<String>,
}

impl AttrPath {
    /// Parse a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::InvalidPath`] if the namespace is unknown,
    /// no attribute follows it, or a segment is empty.
    pub fn parse(raw: &str) -> ConditionResult<Self> {
        let invalid = |reason: &str| ConditionError::InvalidPath {
            path: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = raw.split('.');
        let prefix = parts.next().unwrap_or_default();
        let namespace = Namespace::from_prefix(prefix)
            .ok_or_else(|| invalid("namespace must be one of user, data, current_time, request"))?;

        let segments: Vec<String> = parts.map(str::to_owned).collect();
        if segments.is_empty() {
            return Err(invalid("path must name an attribute after the namespace"));
        }
        if segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(invalid("path segments must be non-empty and contain no whitespace"));
        }

        Ok(Self {
            namespace,
            segments,
        })
    }

    /// Whether a string operand should be read as a path rather than a literal.
    ///
    /// True iff the string parses as a path.
    #[must_use]
    pub fn looks_like_path(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// The namespace this path starts in.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The attribute segments after the namespace.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl FromStr for AttrPath {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace.as_str())?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for AttrPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttrPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Immutable attribute view handed to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    user: Value,
    data: Value,
    current_time: Value,
    request: Value,
}

impl Context {
    /// Start building a context.
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// A context in which every path is missing.
    #[must_use]
    pub fn empty() -> Self {
        ContextBuilder::default().build()
    }

    /// The raw value of a namespace.
    #[must_use]
    pub fn namespace(&self, namespace: Namespace) -> &Value {
        match namespace {
            Namespace::User => &self.user,
            Namespace::Data => &self.data,
            Namespace::CurrentTime => &self.current_time,
            Namespace::Request => &self.request,
        }
    }

    /// Resolve a path. `None` means the attribute is missing.
    ///
    /// Objects are descended by key and arrays by numeric index. JSON `null`
    /// counts as missing.
    #[must_use]
    pub fn resolve(&self, path: &AttrPath) -> Option<&Value> {
        let mut current = self.namespace(path.namespace());
        for segment in path.segments() {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }
}

/// Builder for [`Context`].
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    user: Option<Value>,
    data: Option<Value>,
    current_time: Option<Value>,
    request: Option<Value>,
}

impl ContextBuilder {
    /// Set the acting user.
    #[must_use]
    pub fn user(mut self, principal: &Principal) -> Self {
        self.user = Some(principal.to_namespace());
        self
    }

    /// Set the `user.*` namespace from raw JSON.
    #[must_use]
    pub fn user_value(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the business record.
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set request metadata.
    #[must_use]
    pub fn request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the evaluation instant in a specific local offset.
    #[must_use]
    pub fn current_time(mut self, at: DateTime<FixedOffset>) -> Self {
        self.current_time = Some(time_namespace(at));
        self
    }

    /// Set the evaluation instant from UTC plus the local offset.
    #[must_use]
    pub fn at(self, at: DateTime<Utc>, offset: FixedOffset) -> Self {
        self.current_time(at.with_timezone(&offset))
    }

    /// Finish the context.
    #[must_use]
    pub fn build(self) -> Context {
        let empty = || Value::Object(Map::new());
        Context {
            user: self.user.unwrap_or_else(empty),
            data: self.data.unwrap_or_else(empty),
            current_time: self.current_time.unwrap_or_else(empty),
            request: self.request.unwrap_or_else(empty),
        }
    }
}

/// Break an instant into the fields exposed under `current_time.*`.
#[must_use]
pub fn time_namespace(at: DateTime<FixedOffset>) -> Value {
    let hhmm = at.hour().saturating_mul(100).saturating_add(at.minute());
    json!({
        "timestamp": at.timestamp(),
        "year": at.year(),
        "month": at.month(),
        "day": at.day(),
        "hour": at.hour(),
        "minute": at.minute(),
        "weekday": at.weekday().number_from_monday(),
        "hhmm": hhmm,
        "date": at.format("%Y-%m-%d").to_string(),
        "iso": at.to_rfc3339(),
    })
}
