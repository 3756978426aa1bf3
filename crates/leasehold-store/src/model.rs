//! Record and condition model for the store adapter

use serde_json::Value;

/// A stored item: a flat map of short field names to JSON values
pub type Record = serde_json::Map<String, Value>;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The condition held and the write was applied
    Applied,
    /// The condition did not hold; nothing was written
    ConditionFailed,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Predicate evaluated against the current record (or its absence) before a
/// conditional write
///
/// Field predicates never match an absent record.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Always holds
    Always,
    /// Holds iff no record exists at the key
    NotExists,
    /// Holds iff the field exists and equals `value`
    FieldEquals { field: String, value: Value },
    /// Holds iff the field is an integer no greater than `bound`
    FieldAtMost { field: String, bound: i64 },
    /// Holds iff every nested condition holds
    And(Vec<Condition>),
    /// Holds iff any nested condition holds
    Or(Vec<Condition>),
}

impl Condition {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field_at_most(field: impl Into<String>, bound: i64) -> Self {
        Self::FieldAtMost {
            field: field.into(),
            bound,
        }
    }

    /// Evaluate the condition against the current record
    pub fn matches(&self, current: Option<&Record>) -> bool {
        match self {
            Self::Always => true,
            Self::NotExists => current.is_none(),
            Self::FieldEquals { field, value } => current
                .and_then(|record| record.get(field))
                .is_some_and(|stored| stored == value),
            Self::FieldAtMost { field, bound } => current
                .and_then(|record| record.get(field))
                .and_then(Value::as_i64)
                .is_some_and(|stored| stored <= *bound),
            Self::And(conditions) => conditions.iter().all(|c| c.matches(current)),
            Self::Or(conditions) => conditions.iter().any(|c| c.matches(current)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_field_predicates_never_match_absent_record() {
        assert!(!Condition::field_equals("w", "owner").matches(None));
        assert!(!Condition::field_at_most("e", i64::MAX).matches(None));
        assert!(Condition::NotExists.matches(None));
        assert!(Condition::Always.matches(None));
    }

    #[test]
    fn test_field_at_most_requires_integer() {
        let current = record(json!({ "e": "100" }));
        assert!(!Condition::field_at_most("e", 200).matches(Some(&current)));

        let current = record(json!({ "e": 100 }));
        assert!(Condition::field_at_most("e", 100).matches(Some(&current)));
        assert!(!Condition::field_at_most("e", 99).matches(Some(&current)));
    }

    #[test]
    fn test_lease_takeover_condition() {
        // absent OR same owner OR expired
        let condition = |now: i64| {
            Condition::Or(vec![
                Condition::NotExists,
                Condition::field_equals("w", "me"),
                Condition::field_at_most("e", now),
            ])
        };
        let held = record(json!({ "w": "other", "lid": "t1", "e": 150 }));

        assert!(condition(100).matches(None));
        assert!(!condition(100).matches(Some(&held)));
        assert!(condition(150).matches(Some(&held)));

        let mine = record(json!({ "w": "me", "lid": "t0", "e": 150 }));
        assert!(condition(100).matches(Some(&mine)));
    }

    #[test]
    fn test_and_requires_every_field() {
        let condition = Condition::And(vec![
            Condition::field_equals("w", "me"),
            Condition::field_equals("lid", "t1"),
        ]);
        let current = record(json!({ "w": "me", "lid": "t2", "e": 1 }));
        assert!(!condition.matches(Some(&current)));

        let current = record(json!({ "w": "me", "lid": "t1", "e": 1 }));
        assert!(condition.matches(Some(&current)));
    }

    #[test]
    fn test_empty_composites() {
        assert!(Condition::And(vec![]).matches(None));
        assert!(!Condition::Or(vec![]).matches(None));
    }
}
