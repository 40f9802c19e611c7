use std::sync::Arc;

use base64::Engine as _;

use crate::errors::DeskPilotResult;
use crate::llm::provider::LlmProvider;
use crate::llm::types::GenerateRequest;
use crate::perception::types::{ScreenState, VisionInfo};
use crate::planner::history::{Role, Session};
use crate::planner::parser;
use crate::planner::prompt::build_prompt;
use crate::planner::state::{ActionResult, ParsedAction};

/// Turns of history replayed into each prompt.
const PROMPT_HISTORY_TURNS: usize = 10;

/// Chooses the next UI action by asking the model.
///
/// Failures are logged and returned; nothing is retried here.
pub struct ActionPlanner {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl ActionPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fixed opening move for Paint goals, decided without the model.
    pub fn initial_action(goal: &str) -> Option<ParsedAction> {
        if goal.to_lowercase().contains("paint") {
            tracing::info!(goal = %goal, "paint goal, opening run dialog without model");
            Some(ParsedAction::new("press").with_param("key", "win+r"))
        } else {
            None
        }
    }

    pub async fn plan(
        &self,
        session: &mut Session,
        goal: &str,
        state: &ScreenState,
        vision: &VisionInfo,
    ) -> DeskPilotResult<ParsedAction> {
        let prompt = build_prompt(goal, state, vision, session.recent(PROMPT_HISTORY_TURNS));

        let mut request = GenerateRequest::new(self.model.clone(), prompt);
        if let Some(png) = &vision.screenshot_png {
            request
                .images
                .push(base64::engine::general_purpose::STANDARD.encode(png));
        }

        tracing::info!(
            goal = %goal,
            provider = %self.provider.name(),
            model = %self.model,
            history = session.len(),
            "planning next action"
        );

        let reply = match self.provider.generate(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "model request failed");
                return Err(e);
            }
        };
        let reply = reply.trim();

        match parser::parse(reply) {
            Ok(action) => {
                tracing::info!(
                    action = %action.function_name,
                    params = action.parameters.len(),
                    "model reply parsed"
                );
                session.push(Role::Assistant, reply);
                Ok(action)
            }
            Err(e) => {
                tracing::warn!(error = %e, "model reply unusable");
                Err(e.into())
            }
        }
    }

    /// Feeds an executed action's outcome back into the conversation.
    pub fn record_result(&self, session: &mut Session, result: &ActionResult) {
        if result.success {
            tracing::info!(action = %result.function_name, "action succeeded");
        } else {
            tracing::warn!(
                action = %result.function_name,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "action failed"
            );
        }
        let payload = serde_json::to_string(result).unwrap_or_default();
        session.push(Role::System, format!("Action_Response: {payload}"));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::DeskPilotError;
    use crate::planner::parser::ParseError;
    use crate::planner::state::ParamValue;

    /// Replays canned replies and remembers what it was asked.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<DeskPilotResult<String>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<DeskPilotResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: GenerateRequest) -> DeskPilotResult<String> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn paint_state() -> ScreenState {
        ScreenState {
            active_window: Some("Untitled - Paint".into()),
            mouse_position: (100, 200),
            screen_size: (1920, 1080),
        }
    }

    #[tokio::test]
    async fn plan_parses_reply_and_records_assistant_turn() {
        let provider = ScriptedProvider::new(vec![Ok("  CLICK\nx: 250\ny: 80\n".into())]);
        let planner = ActionPlanner::new(provider.clone(), "llama3.2-vision");
        let mut session = Session::new(20);

        let action = planner
            .plan(&mut session, "draw a house", &paint_state(), &VisionInfo::default())
            .await
            .unwrap();

        assert_eq!(action.function_name, "click");
        assert_eq!(action.param("x"), Some(&ParamValue::Int(250)));
        assert_eq!(session.len(), 1);
        let turn = session.turns().next().unwrap();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "CLICK\nx: 250\ny: 80");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "llama3.2-vision");
        assert!(!requests[0].stream);
        assert!(requests[0].prompt.contains("Goal: draw a house"));
        assert!(requests[0].images.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_an_error_and_not_recorded() {
        let provider = ScriptedProvider::new(vec![Ok("   \n ".into())]);
        let planner = ActionPlanner::new(provider, "m");
        let mut session = Session::new(20);

        let err = planner
            .plan(&mut session, "draw a house", &paint_state(), &VisionInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DeskPilotError::Parse(ParseError::EmptyResponse)));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_error() {
        let provider = ScriptedProvider::new(vec![Err(DeskPilotError::LlmProvider(
            "503 Service Unavailable".into(),
        ))]);
        let planner = ActionPlanner::new(provider.clone(), "m");
        let mut session = Session::new(20);

        let err = planner
            .plan(&mut session, "draw a house", &paint_state(), &VisionInfo::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(provider.calls(), 1);
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn screenshot_is_sent_as_base64_image() {
        let provider = ScriptedProvider::new(vec![Ok("wait\nseconds: 1".into())]);
        let planner = ActionPlanner::new(provider.clone(), "m");
        let mut session = Session::new(20);
        let vision = VisionInfo::from_description("desktop").with_screenshot(vec![1, 2, 3]);

        planner
            .plan(&mut session, "open notepad", &ScreenState::default(), &vision)
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].images, vec!["AQID".to_string()]);
    }

    #[tokio::test]
    async fn paired_plan_and_result_doubles_history() {
        let n = 4;
        let replies = (0..n).map(|i| Ok(format!("move\nx: {i}"))).collect();
        let provider = ScriptedProvider::new(replies);
        let planner = ActionPlanner::new(provider, "m");
        let mut session = Session::new(100);

        for _ in 0..n {
            let action = planner
                .plan(&mut session, "draw a house", &paint_state(), &VisionInfo::default())
                .await
                .unwrap();
            planner.record_result(&mut session, &ActionResult::succeeded(&action));
        }

        assert_eq!(session.len(), n * 2);
        let roles: Vec<Role> = session.turns().map(|t| t.role).collect();
        for pair in roles.chunks(2) {
            assert_eq!(pair, [Role::Assistant, Role::System]);
        }
        let last = session.turns().last().unwrap();
        assert!(last.content.starts_with("Action_Response: "));
        assert!(last.content.contains("\"success\":true"));
    }

    #[tokio::test]
    async fn later_prompts_replay_history() {
        let provider = ScriptedProvider::new(vec![
            Ok("press\nkey: win+r".into()),
            Ok("type\ntext: mspaint".into()),
        ]);
        let planner = ActionPlanner::new(provider.clone(), "m");
        let mut session = Session::new(100);

        let first = planner
            .plan(&mut session, "open paint", &ScreenState::default(), &VisionInfo::default())
            .await
            .unwrap();
        planner.record_result(&mut session, &ActionResult::failed(&first, "dialog did not open"));
        planner
            .plan(&mut session, "open paint", &ScreenState::default(), &VisionInfo::default())
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(requests[1].prompt.contains("- assistant: press | key: win+r"));
        assert!(requests[1].prompt.contains("dialog did not open"));
    }

    #[test]
    fn paint_goal_short_circuits() {
        for goal in ["Open Paint", "draw a house in PAINT", "paint something"] {
            let action = ActionPlanner::initial_action(goal).unwrap();
            assert_eq!(action.function_name, "press");
            assert_eq!(action.param("key"), Some(&ParamValue::Text("win+r".into())));
        }
        assert!(ActionPlanner::initial_action("draw a house").is_none());
    }
}
