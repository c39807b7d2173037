//! The Status Deriver: a pure function mapping a Workload's condition list to the single
//! externally visible `JobStatus`, plus the derived booleans and timestamps that ride alongside
//! it in `WorkloadMetadata`. This is the single source of truth for workload lifecycle; every
//! other component reads status through here rather than inspecting conditions directly.

use crate::condition::query;
use crate::k8s::types::WorkloadCondition;
use crate::model::JobStatus;

/// Rule precedence, evaluated in order; the first matching rule wins.
///
/// 1. Any condition with `reason = "Succeeded"` -> `succeeded`.
/// 2. Else any condition with `reason = "Failed"` -> `failed`.
/// 3. Else any condition with `type = "Admitted", status = true` -> `executing`.
/// 4. Else any condition with `type = "QuotaReserved", status = false, reason = "Inadmissible"` ->
///    `inadmissible`.
/// 5. Else -> `pending`.
pub fn derive(conditions: &[WorkloadCondition]) -> JobStatus {
    if query().with_reason("Succeeded").any_match(conditions) {
        return JobStatus::Succeeded;
    }
    if query().with_reason("Failed").any_match(conditions) {
        return JobStatus::Failed;
    }
    if query()
        .with_type("Admitted")
        .with_status(true)
        .any_match(conditions)
    {
        return JobStatus::Executing;
    }
    if query()
        .with_type("QuotaReserved")
        .with_status(false)
        .with_reason("Inadmissible")
        .any_match(conditions)
    {
        return JobStatus::Inadmissible;
    }
    JobStatus::Pending
}

pub fn was_evicted(conditions: &[WorkloadCondition]) -> bool {
    query().with_type("Evicted").any_match(conditions)
}

pub fn was_inadmissible(conditions: &[WorkloadCondition]) -> bool {
    query()
        .with_type("QuotaReserved")
        .with_status(false)
        .with_reason("Inadmissible")
        .any_match(conditions)
}

pub fn has_failed_pods(conditions: &[WorkloadCondition]) -> bool {
    query().with_reason("FailedPods").any_match(conditions)
}

/// `lastTransitionTime` of the most recent `Admitted=true` condition, or `None` if the workload
/// was never admitted.
pub fn last_admission_timestamp(conditions: &[WorkloadCondition]) -> Option<time::OffsetDateTime> {
    query()
        .with_type("Admitted")
        .with_status(true)
        .find_latest(conditions)
        .and_then(|c| c.last_transition_time)
}

/// `lastTransitionTime` of the `Finished` condition, or `None` while the workload is still live.
/// Deliberately distinct from "finished at epoch zero" in the wire format.
pub fn termination_timestamp(conditions: &[WorkloadCondition]) -> Option<time::OffsetDateTime> {
    query()
        .with_type("Finished")
        .find_latest(conditions)
        .and_then(|c| c.last_transition_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::types::ConditionStatus;

    fn cond(r#type: &str, status: ConditionStatus, reason: Option<&str>) -> WorkloadCondition {
        WorkloadCondition {
            r#type: r#type.to_string(),
            status,
            reason: reason.map(str::to_string),
            message: None,
            last_transition_time: None,
        }
    }

    #[test]
    fn no_conditions_is_pending() {
        assert_eq!(derive(&[]), JobStatus::Pending);
    }

    #[test]
    fn admitted_true_is_executing() {
        let conditions = vec![cond("Admitted", ConditionStatus::True, None)];
        assert_eq!(derive(&conditions), JobStatus::Executing);
    }

    #[test]
    fn quota_reserved_false_inadmissible_is_inadmissible() {
        let conditions = vec![cond("QuotaReserved", ConditionStatus::False, Some("Inadmissible"))];
        assert_eq!(derive(&conditions), JobStatus::Inadmissible);
    }

    #[test]
    fn succeeded_reason_wins_over_admitted() {
        let conditions = vec![
            cond("Admitted", ConditionStatus::True, None),
            cond("Finished", ConditionStatus::True, Some("Succeeded")),
        ];
        assert_eq!(derive(&conditions), JobStatus::Succeeded);
    }

    #[test]
    fn failed_reason_wins_over_admitted_but_not_over_succeeded() {
        let conditions = vec![
            cond("Admitted", ConditionStatus::True, None),
            cond("Finished", ConditionStatus::True, Some("Failed")),
        ];
        assert_eq!(derive(&conditions), JobStatus::Failed);
    }

    #[test]
    fn unknown_condition_types_are_ignored() {
        let conditions = vec![cond("SomeFutureCondition", ConditionStatus::True, Some("Whatever"))];
        assert_eq!(derive(&conditions), JobStatus::Pending);
    }

    #[test]
    fn derived_booleans_read_independently_of_status() {
        let conditions = vec![
            cond("Evicted", ConditionStatus::True, None),
            cond("QuotaReserved", ConditionStatus::False, Some("Inadmissible")),
            cond("PodFailed", ConditionStatus::True, Some("FailedPods")),
        ];
        assert!(was_evicted(&conditions));
        assert!(was_inadmissible(&conditions));
        assert!(has_failed_pods(&conditions));
    }

    #[test]
    fn last_admission_timestamp_picks_the_most_recent_admitted_true() {
        use time::macros::datetime;
        let earlier = datetime!(2026-01-01 00:00 UTC);
        let later = datetime!(2026-01-02 00:00 UTC);
        let conditions = vec![
            WorkloadCondition {
                last_transition_time: Some(earlier),
                ..cond("Admitted", ConditionStatus::True, None)
            },
            WorkloadCondition {
                last_transition_time: Some(later),
                ..cond("Admitted", ConditionStatus::True, None)
            },
        ];
        assert_eq!(last_admission_timestamp(&conditions), Some(later));
    }

    #[test]
    fn termination_timestamp_is_none_while_unfinished() {
        let conditions = vec![cond("Admitted", ConditionStatus::True, None)];
        assert_eq!(termination_timestamp(&conditions), None);
    }
}
