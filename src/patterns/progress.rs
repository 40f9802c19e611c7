use std::collections::HashMap;

use crate::patterns::types::{GoalPattern, RetryPolicy, StepCommand, StepPattern};

/// What the executor should do after the current step failed verification.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDirective<'a> {
    /// Run this command again, then re-verify the same step.
    RetryAction(&'a StepCommand),
    /// The cursor has been rewound; continue from this step.
    RestartFrom(&'a StepPattern),
    GiveUp,
}

/// Walks a goal pattern step by step and interprets its retry metadata.
///
/// `max_attempts` counts every attempt of the declaring step, the first one
/// included, so a policy with `max_attempts: 1` never retries. Failure counts
/// survive restarts; otherwise a `restart_from` loop would never terminate.
pub struct PatternRun<'a> {
    pattern: &'a GoalPattern,
    cursor: usize,
    failures: HashMap<usize, u32>,
}

impl<'a> PatternRun<'a> {
    pub fn new(pattern: &'a GoalPattern) -> Self {
        Self {
            pattern,
            cursor: 0,
            failures: HashMap::new(),
        }
    }

    pub fn pattern(&self) -> &'a GoalPattern {
        self.pattern
    }

    pub fn current(&self) -> Option<&'a StepPattern> {
        self.pattern.steps.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.pattern.steps.len()
    }

    /// Marks the current step verified and moves on.
    pub fn advance(&mut self) -> Option<&'a StepPattern> {
        if let Some(step) = self.current() {
            tracing::debug!(
                goal_type = %self.pattern.goal_type,
                step = %step.name,
                index = self.cursor,
                "step verified"
            );
            self.cursor += 1;
        }
        self.current()
    }

    pub fn failures_of(&self, step_name: &str) -> u32 {
        self.pattern
            .position(step_name)
            .and_then(|idx| self.failures.get(&idx).copied())
            .unwrap_or(0)
    }

    pub fn on_failure(&mut self) -> RetryDirective<'a> {
        let Some(step) = self.current() else {
            return RetryDirective::GiveUp;
        };

        let count = self.failures.entry(self.cursor).or_insert(0);
        *count += 1;
        let failures = *count;

        let Some(policy) = step.retry_if_failed.as_ref() else {
            tracing::warn!(step = %step.name, "step failed with no retry policy");
            return RetryDirective::GiveUp;
        };

        if failures >= policy.max_attempts() {
            tracing::warn!(
                step = %step.name,
                failures,
                max_attempts = policy.max_attempts(),
                "retry attempts exhausted"
            );
            return RetryDirective::GiveUp;
        }

        match policy {
            RetryPolicy::RepeatAction { action, .. } => {
                tracing::info!(step = %step.name, failures, action = %action, "retrying action");
                RetryDirective::RetryAction(action)
            }
            RetryPolicy::RestartFrom { restart_from, .. } => {
                match self.pattern.position(restart_from) {
                    Some(target) => {
                        tracing::info!(
                            step = %step.name,
                            failures,
                            restart_from = %restart_from,
                            "restarting pattern"
                        );
                        self.cursor = target;
                        RetryDirective::RestartFrom(&self.pattern.steps[target])
                    }
                    None => {
                        tracing::error!(
                            step = %step.name,
                            restart_from = %restart_from,
                            "restart target missing"
                        );
                        RetryDirective::GiveUp
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::store::PatternStore;

    #[test]
    fn advances_through_every_step() {
        let store = PatternStore::builtin().unwrap();
        let house = store.get("draw_house").unwrap();
        let mut run = PatternRun::new(house);

        let mut visited = vec![run.current().unwrap().name.clone()];
        while let Some(step) = run.advance() {
            visited.push(step.name.clone());
        }
        assert!(run.is_finished());
        assert_eq!(visited.len(), 7);
        assert_eq!(visited.first().unwrap(), "open_run_dialog");
        assert_eq!(visited.last().unwrap(), "verify_paint_canvas");
    }

    #[test]
    fn repeat_action_until_attempts_run_out() {
        let store = PatternStore::builtin().unwrap();
        let mut run = PatternRun::new(store.get("draw_house").unwrap());

        // open_run_dialog: {"action": "PRESS win+r", "max_attempts": 3}
        let press = StepCommand::Press { keys: "win+r".into() };
        assert_eq!(run.on_failure(), RetryDirective::RetryAction(&press));
        assert_eq!(run.on_failure(), RetryDirective::RetryAction(&press));
        assert_eq!(run.on_failure(), RetryDirective::GiveUp);
        assert_eq!(run.failures_of("open_run_dialog"), 3);
    }

    #[test]
    fn restart_rewinds_cursor_and_keeps_counting() {
        let store = PatternStore::builtin().unwrap();
        let house = store.get("draw_house").unwrap();
        let mut run = PatternRun::new(house);

        let wait_idx = house.position("wait_for_paint").unwrap();
        for _ in 0..wait_idx {
            run.advance();
        }
        assert_eq!(run.current().unwrap().name, "wait_for_paint");

        match run.on_failure() {
            RetryDirective::RestartFrom(step) => assert_eq!(step.name, "open_run_dialog"),
            other => panic!("expected restart, got {other:?}"),
        }
        assert_eq!(run.cursor(), 0);

        for _ in 0..wait_idx {
            run.advance();
        }
        assert_eq!(run.on_failure(), RetryDirective::GiveUp);
    }

    #[test]
    fn step_without_policy_gives_up() {
        let store = PatternStore::builtin().unwrap();
        let house = store.get("draw_house").unwrap();
        let mut run = PatternRun::new(house);
        run.advance();
        assert_eq!(run.current().unwrap().name, "type_paint_command");
        assert_eq!(run.on_failure(), RetryDirective::GiveUp);
    }

    #[test]
    fn finished_run_gives_up() {
        let store = PatternStore::builtin().unwrap();
        let mut run = PatternRun::new(store.get("draw_house").unwrap());
        while run.advance().is_some() {}
        assert!(run.current().is_none());
        assert_eq!(run.on_failure(), RetryDirective::GiveUp);
    }
}
