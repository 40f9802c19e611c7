use crate::perception::types::{ScreenState, VisionInfo};
use crate::planner::history::{ConversationTurn, Role};

const AGENT_PREAMBLE: &str = "\
You are DeskPilot, a desktop automation agent controlling a Windows PC with mouse and keyboard.
Decide the single next action that moves the desktop closer to the goal.";

const REPLY_FORMAT: &str = "\
Available actions: click, type, press, move, drag, wait, focus_window, stop.
Reply with the next action only, no explanation.
First line: the action name.
Each following line: one parameter as `key: value`.
Example:
press
key: win+r";

pub fn build_prompt<'a>(
    goal: &str,
    state: &ScreenState,
    vision: &VisionInfo,
    recent: impl Iterator<Item = &'a ConversationTurn>,
) -> String {
    let description = vision.description.trim();
    let description = if description.is_empty() {
        "(no description available)"
    } else {
        description
    };

    let history: Vec<String> = recent
        .map(|turn| format!("- {}: {}", role_label(turn.role), one_line(&turn.content)))
        .collect();
    let history = if history.is_empty() {
        "(none yet)".to_string()
    } else {
        history.join("\n")
    };

    format!(
        "{AGENT_PREAMBLE}\n\n\
         Goal: {goal}\n\n\
         Current state:\n{state}\n\n\
         Screen description:\n{description}\n\n\
         Recent history:\n{history}\n\n\
         {REPLY_FORMAT}",
        goal = goal.trim(),
        state = state.summary(),
    )
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

/// Multi-line replies are folded so each history entry stays on one line.
fn one_line(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}
