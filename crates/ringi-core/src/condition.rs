//! Condition trees and their evaluator.
//!
//! A [`ConditionNode`] is either a leaf predicate over one attribute or an
//! `and` / `or` / `not` group of child nodes. The same trees drive policy
//! conditions and conditional approvers.
//!
//! # Wire format
//!
//! ```json
//! {"operator": "and", "rules": [
//!     {"field": "user.position_id", "operator": "in", "value": [1, 2, 3]},
//!     {"field": "data.amount", "operator": "gt", "value": 1000000}
//! ]}
//! ```
//!
//! A string `value` that parses as an [`AttrPath`] is read as a reference
//! to another attribute, which is how cross-attribute comparisons such as
//! `user.id ne data.created_by` are written.
//!
//! # Fail-closed evaluation
//!
//! Evaluation never errors. A missing field, a missing right-hand path, or
//! operands that cannot be compared make the leaf `false`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::context::{AttrPath, Context};
use crate::error::{ConditionError, ConditionResult};

/// Maximum nesting depth accepted when decoding a tree.
pub const MAX_CONDITION_DEPTH: usize = 32;

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupOperator {
    /// All children hold (vacuously true when empty).
    And,
    /// Any child holds (false when empty).
    Or,
    /// The single child does not hold.
    Not,
}

impl GroupOperator {
    /// The wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }
}

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Numerically greater than.
    Gt,
    /// Numerically greater than or equal.
    Gte,
    /// Numerically less than.
    Lt,
    /// Numerically less than or equal.
    Lte,
    /// Member of a list.
    In,
    /// The field resolves to a non-null value.
    Exists,
}

impl LeafOperator {
    /// The wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Exists => "exists",
        }
    }
}

impl fmt::Display for LeafOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum ParsedOperator {
    Group(GroupOperator),
    Leaf(LeafOperator),
}

fn parse_operator(raw: &str) -> ConditionResult<ParsedOperator> {
    Ok(match raw {
        "and" => ParsedOperator::Group(GroupOperator::And),
        "or" => ParsedOperator::Group(GroupOperator::Or),
        "not" => ParsedOperator::Group(GroupOperator::Not),
        "eq" => ParsedOperator::Leaf(LeafOperator::Eq),
        "ne" => ParsedOperator::Leaf(LeafOperator::Ne),
        "gt" => ParsedOperator::Leaf(LeafOperator::Gt),
        "gte" => ParsedOperator::Leaf(LeafOperator::Gte),
        "lt" => ParsedOperator::Leaf(LeafOperator::Lt),
        "lte" => ParsedOperator::Leaf(LeafOperator::Lte),
        "in" => ParsedOperator::Leaf(LeafOperator::In),
        "exists" => ParsedOperator::Leaf(LeafOperator::Exists),
        other => return Err(ConditionError::UnknownOperator(other.to_owned())),
    })
}

/// Right-hand side of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A constant.
    Literal(Value),
    /// Another attribute, resolved against the same context.
    Path(AttrPath),
}

impl Operand {
    /// Decode a wire value, treating path-like strings as paths.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if let Value::String(s) = &value
            && let Ok(path) = AttrPath::parse(s)
        {
            return Self::Path(path);
        }
        Self::Literal(value)
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Path(p) => Value::String(p.to_string()),
        }
    }
}

/// A node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// A single predicate.
    Leaf {
        /// Attribute under test.
        field: AttrPath,
        /// Comparison.
        operator: LeafOperator,
        /// Right-hand side (ignored by `exists`).
        value: Operand,
    },
    /// A boolean combination of children.
    Group {
        /// Combinator.
        operator: GroupOperator,
        /// Children.
        rules: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    /// A tree that always holds (`and` over no rules).
    #[must_use]
    pub fn always() -> Self {
        Self::Group {
            operator: GroupOperator::And,
            rules: Vec::new(),
        }
    }

    /// Build a leaf, decoding `value` the same way the wire format does.
    ///
    /// # Errors
    ///
    /// Returns an error if `field` is not a valid path.
    pub fn leaf(field: &str, operator: LeafOperator, value: Value) -> ConditionResult<Self> {
        Ok(Self::Leaf {
            field: AttrPath::parse(field)?,
            operator,
            value: Operand::from_value(value),
        })
    }

    /// Build an `exists` leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if `field` is not a valid path.
    pub fn exists(field: &str) -> ConditionResult<Self> {
        Self::leaf(field, LeafOperator::Exists, Value::Null)
    }

    /// `and` over `rules`.
    #[must_use]
    pub fn and(rules: Vec<Self>) -> Self {
        Self::Group {
            operator: GroupOperator::And,
            rules,
        }
    }

    /// `or` over `rules`.
    #[must_use]
    pub fn or(rules: Vec<Self>) -> Self {
        Self::Group {
            operator: GroupOperator::Or,
            rules,
        }
    }

    /// Negation of `rule`.
    #[must_use]
    pub fn not(rule: Self) -> Self {
        Self::Group {
            operator: GroupOperator::Not,
            rules: vec![rule],
        }
    }

    /// Whether this is the trivially-true empty `and`.
    #[must_use]
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Group { operator: GroupOperator::And, rules } if rules.is_empty())
    }

    /// Nesting depth; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::Group { rules, .. } => rules
                .iter()
                .map(Self::depth)
                .max()
                .unwrap_or(0)
                .saturating_add(1),
        }
    }

    /// Evaluate against `ctx`.
    #[must_use]
    pub fn evaluate(&self, ctx: &Context) -> bool {
        match self {
            Self::Group {
                operator: GroupOperator::And,
                rules,
            } => rules.iter().all(|r| r.evaluate(ctx)),
            Self::Group {
                operator: GroupOperator::Or,
                rules,
            } => rules.iter().any(|r| r.evaluate(ctx)),
            // A `not` built without exactly one child cannot be decoded; if
            // one is constructed by hand it fails closed.
            Self::Group {
                operator: GroupOperator::Not,
                rules,
            } => match rules.as_slice() {
                [only] => !only.evaluate(ctx),
                _ => false,
            },
            Self::Leaf {
                field,
                operator,
                value,
            } => evaluate_leaf(field, *operator, value, ctx),
        }
    }

    fn from_raw(raw: RawCondition, depth: usize) -> ConditionResult<Self> {
        if depth > MAX_CONDITION_DEPTH {
            return Err(ConditionError::TooDeep {
                max: MAX_CONDITION_DEPTH,
            });
        }

        match parse_operator(&raw.operator)? {
            ParsedOperator::Group(operator) => {
                let rules = raw.rules.ok_or_else(|| ConditionError::MissingRules {
                    operator: raw.operator.clone(),
                })?;
                if operator == GroupOperator::Not && rules.len() != 1 {
                    return Err(ConditionError::NotArity { found: rules.len() });
                }
                let child_depth = depth.saturating_add(1);
                let rules = rules
                    .into_iter()
                    .map(|r| Self::from_raw(r, child_depth))
                    .collect::<ConditionResult<Vec<_>>>()?;
                Ok(Self::Group { operator, rules })
            },
            ParsedOperator::Leaf(operator) => {
                let field = raw.field.ok_or_else(|| ConditionError::MissingField {
                    operator: raw.operator.clone(),
                })?;
                let field = AttrPath::parse(&field)?;
                let value = match (operator, raw.value) {
                    (LeafOperator::Exists, v) => Operand::Literal(v.unwrap_or(Value::Null)),
                    (_, Some(v)) => Operand::from_value(v),
                    (_, None) => {
                        return Err(ConditionError::MissingValue {
                            operator: raw.operator,
                        });
                    },
                };
                Ok(Self::Leaf {
                    field,
                    operator,
                    value,
                })
            },
        }
    }

    fn to_raw(&self) -> RawCondition {
        match self {
            Self::Leaf {
                field,
                operator,
                value,
            } => RawCondition {
                field: Some(field.to_string()),
                operator: operator.as_str().to_owned(),
                value: match (operator, value) {
                    (LeafOperator::Exists, Operand::Literal(Value::Null)) => None,
                    _ => Some(value.to_value()),
                },
                rules: None,
            },
            Self::Group { operator, rules } => RawCondition {
                field: None,
                operator: operator.as_str().to_owned(),
                value: None,
                rules: Some(rules.iter().map(Self::to_raw).collect()),
            },
        }
    }
}

impl Default for ConditionNode {
    fn default() -> Self {
        Self::always()
    }
}

/// Untyped wire shape, decoded once into [`ConditionNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rules: Option<Vec<RawCondition>>,
}

impl<'de> Deserialize<'de> for ConditionNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawCondition::deserialize(deserializer)?;
        Self::from_raw(raw, 1).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ConditionNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

fn evaluate_leaf(field: &AttrPath, operator: LeafOperator, value: &Operand, ctx: &Context) -> bool {
    let Some(lhs) = ctx.resolve(field) else {
        tracing::debug!(%field, %operator, "condition field is missing; predicate is false");
        return false;
    };

    if operator == LeafOperator::Exists {
        return true;
    }

    let rhs = match value {
        Operand::Literal(v) => v,
        Operand::Path(path) => {
            let Some(v) = ctx.resolve(path) else {
                tracing::debug!(%field, %operator, value = %path, "condition operand path is missing; predicate is false");
                return false;
            };
            v
        },
    };

    let outcome = match operator {
        LeafOperator::Eq => loose_eq(lhs, rhs),
        LeafOperator::Ne => loose_eq(lhs, rhs).map(|eq| !eq),
        LeafOperator::Gt => compare(lhs, rhs).map(Ordering::is_gt),
        LeafOperator::Gte => compare(lhs, rhs).map(Ordering::is_ge),
        LeafOperator::Lt => compare(lhs, rhs).map(Ordering::is_lt),
        LeafOperator::Lte => compare(lhs, rhs).map(Ordering::is_le),
        LeafOperator::In => match rhs {
            Value::Array(items) => Some(items.iter().any(|item| loose_eq(lhs, item) == Some(true))),
            _ => None,
        },
        LeafOperator::Exists => Some(true),
    };

    outcome.unwrap_or_else(|| {
        tracing::debug!(%field, %operator, "condition operands are not comparable; predicate is false");
        false
    })
}

/// Coerce a JSON value to a finite number.
///
/// Numbers coerce directly; strings coerce when they parse as a number.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Exact integer view of a JSON number or an all-digit string.
fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

/// Equality with numeric coercion. `None` means the operands have no
/// common type to compare in.
///
/// Two strings compare as text. Integers compare exactly; `f64` is only
/// used once a fractional value is involved.
fn loose_eq(a: &Value, b: &Value) -> Option<bool> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x == y);
    }
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return Some(x == y);
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return Some(x.partial_cmp(&y) == Some(Ordering::Equal));
    }
    match (a, b) {
        (Value::Bool(_), Value::Bool(_))
        | (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_)) => Some(a == b),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return Some(x.cmp(&y));
    }
    as_number(a)?.partial_cmp(&as_number(b)?)
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
