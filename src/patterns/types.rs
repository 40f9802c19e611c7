use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category of check the executor runs to confirm a step succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    WindowActive,
    TextEntered,
    CommandSent,
    ProgramRunning,
    UiElementExists,
}

impl VerificationKind {
    /// The `params` key each kind needs to be checkable.
    pub fn required_param(self) -> &'static str {
        match self {
            VerificationKind::WindowActive => "window_title",
            VerificationKind::TextEntered => "text",
            VerificationKind::CommandSent => "command",
            VerificationKind::ProgramRunning => "program",
            VerificationKind::UiElementExists => "element",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationKind::WindowActive => "window_active",
            VerificationKind::TextEntered => "text_entered",
            VerificationKind::CommandSent => "command_sent",
            VerificationKind::ProgramRunning => "program_running",
            VerificationKind::UiElementExists => "ui_element_exists",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verification {
    WindowActive { window_title: String },
    TextEntered { text: String },
    CommandSent { command: String },
    ProgramRunning { program: String },
    UiElementExists { element: String },
}

impl Verification {
    /// Builds the typed check from a step's loose `params` map.
    pub fn from_params(
        kind: VerificationKind,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, String> {
        let key = kind.required_param();
        let value = params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("verification '{kind}' requires a non-empty '{key}' param"))?
            .to_string();

        Ok(match kind {
            VerificationKind::WindowActive => Verification::WindowActive { window_title: value },
            VerificationKind::TextEntered => Verification::TextEntered { text: value },
            VerificationKind::CommandSent => Verification::CommandSent { command: value },
            VerificationKind::ProgramRunning => Verification::ProgramRunning { program: value },
            VerificationKind::UiElementExists => Verification::UiElementExists { element: value },
        })
    }

    pub fn kind(&self) -> VerificationKind {
        match self {
            Verification::WindowActive { .. } => VerificationKind::WindowActive,
            Verification::TextEntered { .. } => VerificationKind::TextEntered,
            Verification::CommandSent { .. } => VerificationKind::CommandSent,
            Verification::ProgramRunning { .. } => VerificationKind::ProgramRunning,
            Verification::UiElementExists { .. } => VerificationKind::UiElementExists,
        }
    }
}

/// One entry of a step's `actions` list, e.g. `PRESS win+r` or `CLICK 250,80`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StepCommand {
    Press { keys: String },
    Type { text: String },
    Click { x: i32, y: i32 },
    Wait { seconds: f64 },
}

fn command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(press|type|click|wait)\s+(.+)$").expect("static regex is valid")
    })
}

impl FromStr for StepCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let caps = command_regex()
            .captures(line)
            .ok_or_else(|| format!("unrecognised step command '{line}'"))?;
        let verb = caps[1].to_ascii_uppercase();
        let arg = caps[2].trim();

        match verb.as_str() {
            "PRESS" => Ok(StepCommand::Press { keys: arg.to_string() }),
            "TYPE" => Ok(StepCommand::Type { text: arg.to_string() }),
            "CLICK" => {
                let (x, y) = arg
                    .split_once(',')
                    .ok_or_else(|| format!("CLICK expects 'x,y', got '{arg}'"))?;
                let x = x
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| format!("CLICK x coordinate '{}': {e}", x.trim()))?;
                let y = y
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| format!("CLICK y coordinate '{}': {e}", y.trim()))?;
                Ok(StepCommand::Click { x, y })
            }
            "WAIT" => {
                let seconds = arg
                    .parse::<f64>()
                    .map_err(|e| format!("WAIT seconds '{arg}': {e}"))?;
                if Duration::try_from_secs_f64(seconds).is_err() {
                    return Err(format!("WAIT seconds must be a non-negative number, got '{arg}'"));
                }
                Ok(StepCommand::Wait { seconds })
            }
            _ => Err(format!("unrecognised step command '{line}'")),
        }
    }
}

impl TryFrom<String> for StepCommand {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StepCommand> for String {
    fn from(cmd: StepCommand) -> Self {
        cmd.to_string()
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCommand::Press { keys } => write!(f, "PRESS {keys}"),
            StepCommand::Type { text } => write!(f, "TYPE {text}"),
            StepCommand::Click { x, y } => write!(f, "CLICK {x},{y}"),
            StepCommand::Wait { seconds } => write!(f, "WAIT {seconds}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetryPolicy {
    RepeatAction { action: StepCommand, max_attempts: u32 },
    RestartFrom { restart_from: String, max_attempts: u32 },
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::RepeatAction { max_attempts, .. }
            | RetryPolicy::RestartFrom { max_attempts, .. } => *max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPattern {
    pub name: String,
    pub description: String,
    pub verification: Verification,
    pub params: BTreeMap<String, String>,
    pub actions: Vec<StepCommand>,
    pub required_state: BTreeMap<String, serde_json::Value>,
    /// Seconds. Consumed by the executor; nothing here enforces it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_if_failed: Option<RetryPolicy>,
}

impl StepPattern {
    /// `None` when unset or not representable as a `Duration`.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPattern {
    pub goal_type: String,
    /// Lowercased, deduplicated.
    pub keywords: Vec<String>,
    pub steps: Vec<StepPattern>,
}

impl GoalPattern {
    /// True when every keyword occurs somewhere in the goal text.
    pub fn matches(&self, goal: &str) -> bool {
        let goal = goal.to_lowercase();
        self.keywords.iter().all(|k| goal.contains(k.as_str()))
    }

    pub fn position(&self, step_name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == step_name)
    }

    pub fn step(&self, step_name: &str) -> Option<&StepPattern> {
        self.steps.iter().find(|s| s.name == step_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_verbs_case_insensitively() {
        assert_eq!(
            "PRESS win+r".parse::<StepCommand>().unwrap(),
            StepCommand::Press { keys: "win+r".into() }
        );
        assert_eq!(
            "type  hello world".parse::<StepCommand>().unwrap(),
            StepCommand::Type { text: "hello world".into() }
        );
        assert_eq!(
            "Click 250, 80".parse::<StepCommand>().unwrap(),
            StepCommand::Click { x: 250, y: 80 }
        );
        assert_eq!(
            "WAIT 1.5".parse::<StepCommand>().unwrap(),
            StepCommand::Wait { seconds: 1.5 }
        );
        assert!("WAIT 1e20".parse::<StepCommand>().is_err());
        assert!("WAIT -1".parse::<StepCommand>().is_err());
    }

    #[test]
    fn rejects_unknown_or_malformed_commands() {
        assert!("SCROLL down".parse::<StepCommand>().is_err());
        assert!("PRESS".parse::<StepCommand>().is_err());
        assert!("CLICK 250".parse::<StepCommand>().is_err());
        assert!("CLICK a,b".parse::<StepCommand>().is_err());
        assert!("WAIT -1".parse::<StepCommand>().is_err());
    }

    #[test]
    fn command_renders_back_to_vocabulary() {
        let cmd: StepCommand = "click 10,20".parse().unwrap();
        assert_eq!(cmd.to_string(), "CLICK 10,20");
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, "\"CLICK 10,20\"");
    }

    #[test]
    fn verification_requires_its_param() {
        let mut params = BTreeMap::new();
        assert!(Verification::from_params(VerificationKind::WindowActive, &params).is_err());

        params.insert("window_title".to_string(), "Paint".to_string());
        let v = Verification::from_params(VerificationKind::WindowActive, &params).unwrap();
        assert_eq!(v, Verification::WindowActive { window_title: "Paint".into() });
        assert_eq!(v.kind(), VerificationKind::WindowActive);
    }

    #[test]
    fn retry_policy_shapes_are_distinguished() {
        let repeat: RetryPolicy =
            serde_json::from_str(r#"{"action": "PRESS win+r", "max_attempts": 3}"#).unwrap();
        assert!(matches!(repeat, RetryPolicy::RepeatAction { max_attempts: 3, .. }));

        let restart: RetryPolicy =
            serde_json::from_str(r#"{"restart_from": "open_run_dialog", "max_attempts": 2}"#)
                .unwrap();
        assert_eq!(restart.max_attempts(), 2);
        assert!(matches!(restart, RetryPolicy::RestartFrom { .. }));
    }

    #[test]
    fn unrepresentable_timeout_yields_none() {
        let mut step = StepPattern {
            name: "wait_for_paint".into(),
            description: String::new(),
            verification: Verification::ProgramRunning { program: "mspaint.exe".into() },
            params: BTreeMap::new(),
            actions: Vec::new(),
            required_state: BTreeMap::new(),
            timeout: Some(1e20),
            retry_if_failed: None,
        };
        assert_eq!(step.timeout_duration(), None);

        step.timeout = Some(2.5);
        assert_eq!(step.timeout_duration(), Some(Duration::from_millis(2500)));
    }
}
