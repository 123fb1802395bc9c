//! Pure per-task state transitions.
//!
//! One scan tick maps a persisted record plus the current time to a new
//! record, a decision, and an optional fire effect. Nothing here touches the
//! filesystem — the service applies the outcome, so every rule is testable
//! with plain values.

use crate::store::types::{TaskRecord, TaskTiming, REMAIN_UNBOUNDED};

/// What the scheduler should do with the record after this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Task is scheduled in the future; nothing changes.
    NoOp,
    /// Countdown converted to an absolute start time. Not an execution.
    Activated,
    /// Task fired and loops on; persist the record with the new start time.
    RescheduleAt(i64),
    /// Remove the record from the store.
    Terminal(TerminalReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// Non-looping task: fire once, then delete regardless of `remain`.
    OneShot,
    /// Finite loop whose last firing just brought `remain` to 0.
    Completed,
    /// `remain` was already 0 at scan time; deleted without firing.
    Exhausted,
    /// `remain < -1`; deleted without firing.
    InvalidRepeatState,
}

/// The action payload, annotated with a progress label, ready to be handed
/// to the consumer as if it were freshly typed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEffect {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Updated record to persist. Present exactly for `Activated` and
    /// `RescheduleAt`.
    pub record: Option<TaskRecord>,
    pub decision: TickDecision,
    pub fire: Option<FireEffect>,
}

/// Evaluate one task for one scan tick at time `now` (epoch seconds).
pub fn plan_tick(record: &TaskRecord, now: i64) -> TickOutcome {
    let start_time = match record.timing {
        TaskTiming::PendingCountdown { countdown } => {
            // First observation: stamp the absolute start time and the
            // execution counter. Happens exactly once per task.
            let mut activated = record.clone();
            activated.timing = TaskTiming::Scheduled {
                start_time: now + countdown,
            };
            activated.repeat.exec_count = 0;
            return TickOutcome {
                record: Some(activated),
                decision: TickDecision::Activated,
                fire: None,
            };
        }
        TaskTiming::Scheduled { start_time } => start_time,
    };

    if now < start_time {
        return TickOutcome {
            record: None,
            decision: TickDecision::NoOp,
            fire: None,
        };
    }

    let repeat = &record.repeat;
    if repeat.remain == 0 {
        return TickOutcome {
            record: None,
            decision: TickDecision::Terminal(TerminalReason::Exhausted),
            fire: None,
        };
    }
    if repeat.remain < REMAIN_UNBOUNDED {
        return TickOutcome {
            record: None,
            decision: TickDecision::Terminal(TerminalReason::InvalidRepeatState),
            fire: None,
        };
    }

    // Fire. The label reflects the counters before the bookkeeping update.
    let fire = Some(FireEffect {
        message: format!("Scheduled Task {}:\n{}", progress_label(record), record.action),
    });

    let mut fired = record.clone();
    fired.repeat.exec_count += 1;
    if fired.repeat.remain > 0 {
        fired.repeat.remain -= 1;
    }

    if !fired.repeat.enable {
        // Fired-once semantics, whatever remain says
        return TickOutcome {
            record: None,
            decision: TickDecision::Terminal(TerminalReason::OneShot),
            fire,
        };
    }
    if fired.repeat.remain == 0 {
        // Last finite firing: delete now rather than leaving a record that
        // can only be reaped on a later scan
        return TickOutcome {
            record: None,
            decision: TickDecision::Terminal(TerminalReason::Completed),
            fire,
        };
    }

    // An externally written file can carry an interval beyond i64; saturate
    // rather than wrapping the reschedule into the past
    let next = now.saturating_add(i64::try_from(fired.repeat.interval).unwrap_or(i64::MAX));
    fired.timing = TaskTiming::Scheduled { start_time: next };
    TickOutcome {
        record: Some(fired),
        decision: TickDecision::RescheduleAt(next),
        fire,
    }
}

/// Human-readable progress for the consumer: `(Once)`,
/// `(N/Total) Per I seconds`, or `(Infinite) Per I seconds`.
fn progress_label(record: &TaskRecord) -> String {
    let repeat = &record.repeat;
    if !repeat.enable {
        return "(Once)".to_string();
    }
    if repeat.remain == REMAIN_UNBOUNDED {
        return format!("(Infinite) Per {} seconds", repeat.interval);
    }
    let total = repeat.exec_count as i64 + repeat.remain;
    format!(
        "({}/{}) Per {} seconds",
        repeat.exec_count + 1,
        total,
        repeat.interval
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::RepeatSpec;

    fn scheduled(start_time: i64, enable: bool, interval: u64, remain: i64) -> TaskRecord {
        TaskRecord {
            timing: TaskTiming::Scheduled { start_time },
            action: "do the thing".into(),
            repeat: RepeatSpec {
                enable,
                interval,
                remain,
                exec_count: 0,
            },
        }
    }

    #[test]
    fn test_countdown_activates_without_firing() {
        let record = TaskRecord::new(
            5,
            "do the thing".into(),
            RepeatSpec {
                enable: false,
                interval: 60,
                remain: 1,
                exec_count: 0,
            },
        );
        let outcome = plan_tick(&record, 100);
        assert_eq!(outcome.decision, TickDecision::Activated);
        assert!(outcome.fire.is_none());
        let activated = outcome.record.unwrap();
        assert_eq!(activated.start_time(), Some(105));
        assert_eq!(activated.repeat.exec_count, 0);
    }

    #[test]
    fn test_not_due_is_noop_and_idempotent() {
        let record = scheduled(200, true, 60, 3);
        for _ in 0..2 {
            let outcome = plan_tick(&record, 150);
            assert_eq!(outcome.decision, TickDecision::NoOp);
            assert!(outcome.record.is_none());
            assert!(outcome.fire.is_none());
        }
    }

    #[test]
    fn test_one_shot_fires_and_terminates() {
        let record = scheduled(100, false, 60, 5);
        let outcome = plan_tick(&record, 100);
        assert_eq!(
            outcome.decision,
            TickDecision::Terminal(TerminalReason::OneShot)
        );
        let fire = outcome.fire.unwrap();
        assert_eq!(fire.message, "Scheduled Task (Once):\ndo the thing");
        assert!(outcome.record.is_none());
    }

    #[test]
    fn test_finite_loop_decrements_and_reschedules() {
        let record = scheduled(100, true, 300, 3);
        let outcome = plan_tick(&record, 120);
        assert_eq!(outcome.decision, TickDecision::RescheduleAt(420));
        let fired = outcome.record.unwrap();
        assert_eq!(fired.repeat.remain, 2);
        assert_eq!(fired.repeat.exec_count, 1);
        assert_eq!(fired.start_time(), Some(420));
        assert_eq!(
            outcome.fire.unwrap().message,
            "Scheduled Task (1/3) Per 300 seconds:\ndo the thing"
        );
    }

    #[test]
    fn test_label_counts_completed_runs() {
        let mut record = scheduled(100, true, 60, 2);
        record.repeat.exec_count = 3;
        let outcome = plan_tick(&record, 100);
        // 3 done + 2 remaining = 5 total, this is run 4
        assert_eq!(
            outcome.fire.unwrap().message,
            "Scheduled Task (4/5) Per 60 seconds:\ndo the thing"
        );
    }

    #[test]
    fn test_last_finite_firing_terminates_immediately() {
        let record = scheduled(100, true, 60, 1);
        let outcome = plan_tick(&record, 100);
        assert_eq!(
            outcome.decision,
            TickDecision::Terminal(TerminalReason::Completed)
        );
        assert!(outcome.fire.is_some());
        assert!(outcome.record.is_none());
    }

    #[test]
    fn test_unbounded_loop_never_decrements() {
        let mut record = scheduled(100, true, 60, -1);
        record.repeat.exec_count = 41;
        let outcome = plan_tick(&record, 100);
        assert_eq!(outcome.decision, TickDecision::RescheduleAt(160));
        let fired = outcome.record.unwrap();
        assert_eq!(fired.repeat.remain, -1);
        assert_eq!(fired.repeat.exec_count, 42);
        assert_eq!(
            outcome.fire.unwrap().message,
            "Scheduled Task (Infinite) Per 60 seconds:\ndo the thing"
        );
    }

    #[test]
    fn test_huge_interval_saturates_instead_of_wrapping() {
        // u64 interval beyond i64 range must not reschedule into the past
        let record = scheduled(100, true, u64::MAX, -1);
        let outcome = plan_tick(&record, 100);
        assert_eq!(outcome.decision, TickDecision::RescheduleAt(i64::MAX));
        assert_eq!(outcome.record.unwrap().start_time(), Some(i64::MAX));
    }

    #[test]
    fn test_exhausted_deletes_without_firing() {
        let record = scheduled(100, true, 60, 0);
        let outcome = plan_tick(&record, 100);
        assert_eq!(
            outcome.decision,
            TickDecision::Terminal(TerminalReason::Exhausted)
        );
        assert!(outcome.fire.is_none());
    }

    #[test]
    fn test_invalid_remain_deletes_without_firing() {
        let record = scheduled(100, true, 60, -2);
        let outcome = plan_tick(&record, 100);
        assert_eq!(
            outcome.decision,
            TickDecision::Terminal(TerminalReason::InvalidRepeatState)
        );
        assert!(outcome.fire.is_none());
    }

    #[test]
    fn test_disabled_loop_with_zero_remain_is_exhausted() {
        // remain=0 wins over the one-shot path: no firing at all
        let record = scheduled(100, false, 60, 0);
        let outcome = plan_tick(&record, 100);
        assert_eq!(
            outcome.decision,
            TickDecision::Terminal(TerminalReason::Exhausted)
        );
        assert!(outcome.fire.is_none());
    }
}
