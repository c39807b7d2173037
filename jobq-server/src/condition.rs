//! A small predicate combinator over `WorkloadCondition` lists.
//!
//! The Status Deriver and the Workload Model's derived booleans all reduce to "does any condition
//! in this list match a {type, reason, status} facet combination". Materialising that as a
//! builder keeps the rule tables in `k8s::status` declarative instead of repeating
//! `conditions.iter().any(|c| ...)` closures with ad hoc field comparisons.

use crate::k8s::types::{ConditionStatus, WorkloadCondition};

#[derive(Debug, Clone, Default)]
pub struct ConditionQuery<'a> {
    r#type: Option<&'a str>,
    reason: Option<&'a str>,
    message: Option<&'a str>,
    status: Option<bool>,
}

impl<'a> ConditionQuery<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, r#type: &'a str) -> Self {
        self.r#type = Some(r#type);
        self
    }

    pub fn with_reason(mut self, reason: &'a str) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_message(mut self, message: &'a str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_status(mut self, status: bool) -> Self {
        self.status = Some(status);
        self
    }

    /// Every facet set on the query must match; facets left unset are ignored. Extra, unrelated
    /// conditions in the list never cause a match to fail.
    pub fn matches(&self, condition: &WorkloadCondition) -> bool {
        if let Some(expected_type) = self.r#type {
            if condition.r#type != expected_type {
                return false;
            }
        }
        if let Some(expected_reason) = self.reason {
            if condition.reason.as_deref() != Some(expected_reason) {
                return false;
            }
        }
        if let Some(expected_message) = self.message {
            if condition.message.as_deref() != Some(expected_message) {
                return false;
            }
        }
        if let Some(expected_status) = self.status {
            let actual = match condition.status {
                ConditionStatus::True => true,
                ConditionStatus::False => false,
                ConditionStatus::Unknown => return false,
            };
            if actual != expected_status {
                return false;
            }
        }
        true
    }

    pub fn any_match<'c>(&self, conditions: impl IntoIterator<Item = &'c WorkloadCondition>) -> bool {
        conditions.into_iter().any(|c| self.matches(c))
    }

    pub fn find_latest<'c>(
        &self,
        conditions: impl IntoIterator<Item = &'c WorkloadCondition>,
    ) -> Option<&'c WorkloadCondition> {
        conditions
            .into_iter()
            .filter(|c| self.matches(c))
            .max_by_key(|c| c.last_transition_time)
    }
}

pub fn query<'a>() -> ConditionQuery<'a> {
    ConditionQuery::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(r#type: &str, status: ConditionStatus, reason: Option<&str>) -> WorkloadCondition {
        WorkloadCondition {
            r#type: r#type.to_string(),
            status,
            reason: reason.map(str::to_string),
            message: None,
            last_transition_time: None,
        }
    }

    #[test]
    fn message_facet_must_match_exactly() {
        let conditions = vec![WorkloadCondition {
            message: Some("quota exceeded".to_string()),
            ..condition("QuotaReserved", ConditionStatus::False, Some("Inadmissible"))
        }];
        assert!(query().with_message("quota exceeded").any_match(&conditions));
        assert!(!query().with_message("something else").any_match(&conditions));
    }

    #[test]
    fn matches_on_every_set_facet() {
        let conditions = vec![condition("QuotaReserved", ConditionStatus::False, Some("Inadmissible"))];
        assert!(query()
            .with_type("QuotaReserved")
            .with_status(false)
            .with_reason("Inadmissible")
            .any_match(&conditions));
    }

    #[test]
    fn ignores_unrelated_conditions() {
        let conditions = vec![
            condition("Evicted", ConditionStatus::True, None),
            condition("Admitted", ConditionStatus::True, None),
        ];
        assert!(query().with_type("Admitted").with_status(true).any_match(&conditions));
    }

    #[test]
    fn unknown_status_never_matches_a_boolean_query() {
        let conditions = vec![condition("Admitted", ConditionStatus::Unknown, None)];
        assert!(!query().with_type("Admitted").with_status(true).any_match(&conditions));
        assert!(!query().with_type("Admitted").with_status(false).any_match(&conditions));
    }

    #[test]
    fn reason_mismatch_excludes_the_condition() {
        let conditions = vec![condition("Failed", ConditionStatus::True, Some("PodFailure"))];
        assert!(!query().with_type("Failed").with_reason("Succeeded").any_match(&conditions));
    }
}
