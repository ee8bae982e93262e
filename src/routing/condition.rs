//! Atomic rule conditions and their evaluation against a visit context.
//!
//! Conditions are validated when a rule is written (`validate`), so the
//! evaluator itself is infallible: anything malformed that slipped through
//! simply evaluates to `false`. One bad condition must never take down
//! redirection for the whole link.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::VisitContext;

/// Which visit attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Country,
    Region,
    City,
    Device,
    Os,
    Browser,
    Language,
    Referer,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    Time,
    DayOfWeek,
}

impl ConditionField {
    /// Time and day-of-week match on numbers, everything else on strings.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ConditionField::Time | ConditionField::DayOfWeek)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Between,
    Before,
    After,
}

/// Condition payload. Untagged so the wire format stays a plain string,
/// array, number, or `{start, end}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(i64),
    Text(String),
    List(Vec<String>),
    Range { start: i64, end: i64 },
}

/// One atomic predicate: field, operator, value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionItem {
    #[serde(rename = "type")]
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CombineOperator {
    #[default]
    And,
    Or,
}

/// The full condition set of one routing rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingConditions {
    #[serde(default)]
    pub operator: CombineOperator,
    #[serde(default)]
    pub items: Vec<ConditionItem>,
}

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("operator `{operator:?}` is not valid for field `{field:?}`")]
    IncompatibleOperator {
        field: ConditionField,
        operator: ConditionOperator,
    },
    #[error("operator `{operator:?}` expects a {expected} value")]
    WrongValueShape {
        operator: ConditionOperator,
        expected: &'static str,
    },
    #[error("{field:?} value {value} is outside 0..={max}")]
    OutOfRange {
        field: ConditionField,
        value: i64,
        max: i64,
    },
}

impl ConditionItem {
    /// Write-time validation: operator compatible with field, value shape
    /// compatible with operator, temporal bounds sane.
    pub fn validate(&self) -> Result<(), ConditionError> {
        use ConditionOperator::*;

        let incompatible = || ConditionError::IncompatibleOperator {
            field: self.field,
            operator: self.operator,
        };

        if self.field.is_temporal() {
            let max = match self.field {
                ConditionField::DayOfWeek => 6,
                _ => 1439,
            };
            let check_bounds = |value: i64| {
                if (0..=max).contains(&value) {
                    Ok(())
                } else {
                    Err(ConditionError::OutOfRange {
                        field: self.field,
                        value,
                        max,
                    })
                }
            };
            return match self.operator {
                Between => match self.value {
                    ConditionValue::Range { start, end } => {
                        check_bounds(start)?;
                        check_bounds(end)
                    }
                    _ => Err(ConditionError::WrongValueShape {
                        operator: self.operator,
                        expected: "{start, end} range",
                    }),
                },
                Before | After => match self.value {
                    ConditionValue::Number(n) => check_bounds(n),
                    _ => Err(ConditionError::WrongValueShape {
                        operator: self.operator,
                        expected: "numeric",
                    }),
                },
                _ => Err(incompatible()),
            };
        }

        match self.operator {
            Between | Before | After => Err(incompatible()),
            In | NotIn => match self.value {
                ConditionValue::List(_) => Ok(()),
                _ => Err(ConditionError::WrongValueShape {
                    operator: self.operator,
                    expected: "list",
                }),
            },
            _ => match self.value {
                ConditionValue::Text(_) => Ok(()),
                _ => Err(ConditionError::WrongValueShape {
                    operator: self.operator,
                    expected: "string",
                }),
            },
        }
    }

    /// Evaluate this condition against a visit. Never panics; malformed
    /// combinations evaluate to `false`.
    pub fn matches(&self, ctx: &VisitContext) -> bool {
        match self.field {
            ConditionField::Time => self.matches_number(i64::from(ctx.time_of_day)),
            ConditionField::DayOfWeek => self.matches_number(i64::from(ctx.day_of_week)),
            _ => self.matches_text(field_text(self.field, ctx)),
        }
    }

    fn matches_number(&self, actual: i64) -> bool {
        use ConditionOperator::*;
        match (self.operator, &self.value) {
            // Inclusive on both ends; start > end means the window wraps
            // past midnight (e.g. 22:00..06:00).
            (Between, ConditionValue::Range { start, end }) => {
                if start <= end {
                    actual >= *start && actual <= *end
                } else {
                    actual >= *start || actual <= *end
                }
            }
            (Before, value) => threshold(value).is_some_and(|t| actual < t),
            (After, value) => threshold(value).is_some_and(|t| actual > t),
            _ => false,
        }
    }

    fn matches_text(&self, actual: Option<&str>) -> bool {
        use ConditionOperator::*;

        // An absent attribute satisfies negative predicates and nothing else.
        let Some(actual) = actual else {
            return matches!(self.operator, NotEquals | NotContains);
        };
        let actual = actual.to_lowercase();

        match (self.operator, &self.value) {
            (Equals, ConditionValue::Text(v)) => actual == v.to_lowercase(),
            (NotEquals, ConditionValue::Text(v)) => actual != v.to_lowercase(),
            (Contains, ConditionValue::Text(v)) => actual.contains(&v.to_lowercase()),
            (NotContains, ConditionValue::Text(v)) => !actual.contains(&v.to_lowercase()),
            (StartsWith, ConditionValue::Text(v)) => actual.starts_with(&v.to_lowercase()),
            (EndsWith, ConditionValue::Text(v)) => actual.ends_with(&v.to_lowercase()),
            (In, ConditionValue::List(vs)) => vs.iter().any(|v| v.to_lowercase() == actual),
            (NotIn, ConditionValue::List(vs)) => !vs.iter().any(|v| v.to_lowercase() == actual),
            _ => false,
        }
    }
}

fn threshold(value: &ConditionValue) -> Option<i64> {
    match value {
        ConditionValue::Number(n) => Some(*n),
        ConditionValue::Text(s) => s.parse().ok(),
        _ => None,
    }
}

fn field_text(field: ConditionField, ctx: &VisitContext) -> Option<&str> {
    match field {
        ConditionField::Country => ctx.country.as_deref(),
        ConditionField::Region => ctx.region.as_deref(),
        ConditionField::City => ctx.city.as_deref(),
        ConditionField::Device => Some(ctx.device_type.as_str()),
        ConditionField::Os => ctx.os.as_deref(),
        ConditionField::Browser => ctx.browser.as_deref(),
        ConditionField::Language => ctx.language.as_deref(),
        ConditionField::Referer => ctx.referer.as_deref(),
        ConditionField::UtmSource => ctx.utm_source.as_deref(),
        ConditionField::UtmMedium => ctx.utm_medium.as_deref(),
        ConditionField::UtmCampaign => ctx.utm_campaign.as_deref(),
        ConditionField::Time | ConditionField::DayOfWeek => None,
    }
}

impl RoutingConditions {
    /// Validate every condition in the set.
    pub fn validate(&self) -> Result<(), ConditionError> {
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }

    /// Combine the conditions per the set's operator. An empty set always
    /// matches, so a rule without conditions acts as a catch-all.
    pub fn matches(&self, ctx: &VisitContext) -> bool {
        if self.items.is_empty() {
            return true;
        }
        match self.operator {
            CombineOperator::And => self.items.iter().all(|c| c.matches(ctx)),
            CombineOperator::Or => self.items.iter().any(|c| c.matches(ctx)),
        }
    }
}
