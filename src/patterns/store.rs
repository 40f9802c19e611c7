use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::patterns::types::{
    GoalPattern, RetryPolicy, StepCommand, StepPattern, Verification, VerificationKind,
};

/// Sample pattern set shipped with the crate, embedded at compile time.
const BUILTIN_PATTERNS: &str = include_str!("../../patterns/success_patterns.json");

#[derive(Debug, Deserialize)]
struct RawPatternFile {
    patterns: Vec<RawGoalPattern>,
}

#[derive(Debug, Deserialize)]
struct RawGoalPattern {
    goal_type: String,
    keywords: Vec<String>,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    name: String,
    #[serde(default)]
    description: String,
    verification: VerificationKind,
    #[serde(default)]
    params: BTreeMap<String, String>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    required_state: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default)]
    retry_if_failed: Option<RawRetry>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    restart_from: Option<String>,
    max_attempts: u32,
}

/// Read-only set of goal patterns, validated when loaded.
#[derive(Debug, Clone)]
pub struct PatternStore {
    patterns: Vec<GoalPattern>,
}

impl PatternStore {
    pub fn load(path: &Path) -> DeskPilotResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "pattern file unreadable");
            DeskPilotError::Pattern(format!("{}: {e}", path.display()))
        })?;

        let patterns = parse_document(&content).map_err(|reason| {
            tracing::error!(path = %path.display(), %reason, "pattern file rejected");
            DeskPilotError::Pattern(format!("{}: {reason}", path.display()))
        })?;

        tracing::info!(
            path = %path.display(),
            goals = patterns.len(),
            "pattern file loaded"
        );
        Ok(Self { patterns })
    }

    pub fn from_json(content: &str) -> DeskPilotResult<Self> {
        let patterns = parse_document(content).map_err(DeskPilotError::Pattern)?;
        Ok(Self { patterns })
    }

    pub fn builtin() -> DeskPilotResult<Self> {
        Self::from_json(BUILTIN_PATTERNS)
            .map_err(|e| DeskPilotError::Pattern(format!("builtin patterns: {e}")))
    }

    pub fn goal_patterns(&self) -> &[GoalPattern] {
        &self.patterns
    }

    pub fn get(&self, goal_type: &str) -> Option<&GoalPattern> {
        self.patterns.iter().find(|p| p.goal_type == goal_type)
    }

    /// Picks the pattern whose keywords all occur in `goal`.
    /// More keywords wins; ties keep file order.
    pub fn find_for_goal(&self, goal: &str) -> Option<&GoalPattern> {
        let mut best: Option<&GoalPattern> = None;
        for pattern in self.patterns.iter().filter(|p| p.matches(goal)) {
            match best {
                Some(current) if current.keywords.len() >= pattern.keywords.len() => {}
                _ => best = Some(pattern),
            }
        }
        match best {
            Some(p) => {
                tracing::debug!(goal = %goal, goal_type = %p.goal_type, "goal matched pattern")
            }
            None => tracing::debug!(goal = %goal, "no pattern matches goal"),
        }
        best
    }
}

fn parse_document(content: &str) -> Result<Vec<GoalPattern>, String> {
    let raw: RawPatternFile =
        serde_json::from_str(content).map_err(|e| format!("invalid pattern JSON: {e}"))?;

    let mut seen_goals = HashSet::new();
    let mut patterns = Vec::with_capacity(raw.patterns.len());
    for goal in raw.patterns {
        if !seen_goals.insert(goal.goal_type.clone()) {
            return Err(format!("duplicate goal_type '{}'", goal.goal_type));
        }
        patterns.push(validate_goal(goal)?);
    }
    Ok(patterns)
}

fn validate_goal(raw: RawGoalPattern) -> Result<GoalPattern, String> {
    let goal_type = raw.goal_type.trim().to_string();
    if goal_type.is_empty() {
        return Err("goal_type must not be empty".into());
    }

    let mut keywords: Vec<String> = Vec::new();
    for keyword in raw.keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    if keywords.is_empty() {
        return Err(format!("goal '{goal_type}' has no keywords"));
    }
    if raw.steps.is_empty() {
        return Err(format!("goal '{goal_type}' has no steps"));
    }

    let mut steps: Vec<StepPattern> = Vec::with_capacity(raw.steps.len());
    for raw_step in raw.steps {
        let step = validate_step(raw_step, &steps)
            .map_err(|reason| format!("goal '{goal_type}': {reason}"))?;
        steps.push(step);
    }

    Ok(GoalPattern {
        goal_type,
        keywords,
        steps,
    })
}

/// `earlier` holds the steps already accepted for the same goal.
fn validate_step(raw: RawStep, earlier: &[StepPattern]) -> Result<StepPattern, String> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err("step name must not be empty".into());
    }
    if earlier.iter().any(|s| s.name == name) {
        return Err(format!("duplicate step name '{name}'"));
    }

    let verification = Verification::from_params(raw.verification, &raw.params)
        .map_err(|reason| format!("step '{name}': {reason}"))?;

    let actions = raw
        .actions
        .iter()
        .map(|a| a.parse::<StepCommand>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| format!("step '{name}': {reason}"))?;

    if let Some(timeout) = raw.timeout {
        if !timeout.is_finite() || timeout < 0.0 {
            return Err(format!("step '{name}': timeout must be a non-negative number"));
        }
        if Duration::try_from_secs_f64(timeout).is_err() {
            return Err(format!("step '{name}': timeout {timeout} is out of range"));
        }
    }

    let retry_if_failed = raw
        .retry_if_failed
        .map(|retry| validate_retry(&name, retry, earlier))
        .transpose()?;

    Ok(StepPattern {
        name,
        description: raw.description,
        verification,
        params: raw.params,
        actions,
        required_state: raw.required_state,
        timeout: raw.timeout,
        retry_if_failed,
    })
}

fn validate_retry(
    step_name: &str,
    raw: RawRetry,
    earlier: &[StepPattern],
) -> Result<RetryPolicy, String> {
    if raw.max_attempts == 0 {
        return Err(format!("step '{step_name}': max_attempts must be at least 1"));
    }

    match (raw.action, raw.restart_from) {
        (Some(action), None) => {
            let action = action
                .parse::<StepCommand>()
                .map_err(|reason| format!("step '{step_name}': retry {reason}"))?;
            Ok(RetryPolicy::RepeatAction {
                action,
                max_attempts: raw.max_attempts,
            })
        }
        (None, Some(target)) => {
            let target = target.trim().to_string();
            if target != step_name && !earlier.iter().any(|s| s.name == target) {
                return Err(format!(
                    "step '{step_name}': restart_from '{target}' is not this step or an earlier one"
                ));
            }
            Ok(RetryPolicy::RestartFrom {
                restart_from: target,
                max_attempts: raw.max_attempts,
            })
        }
        (Some(_), Some(_)) => Err(format!(
            "step '{step_name}': retry_if_failed takes either 'action' or 'restart_from', not both"
        )),
        (None, None) => Err(format!(
            "step '{step_name}': retry_if_failed needs 'action' or 'restart_from'"
        )),
    }
}
