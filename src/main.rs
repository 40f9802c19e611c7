//! DeskPilot CLI.
//!
//! Commands:
//! - `patterns`: list the loaded success patterns
//! - `match`: show which pattern a goal maps to
//! - `plan`: ask the model for the next action
//! - `models`: list models installed on the endpoint

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use deskpilot_lib::llm::providers::ollama::OllamaProvider;
use deskpilot_lib::patterns::types::GoalPattern;
use deskpilot_lib::perception::types::{ScreenState, VisionInfo};
use deskpilot_lib::planner::engine::ActionPlanner;
use deskpilot_lib::planner::history::Session;

#[derive(Parser)]
#[command(
    name = "deskpilot",
    about = "DeskPilot: vision-guided desktop automation planner",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List goal patterns and their steps
    Patterns {
        /// Pattern file to load instead of the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show the pattern matching a goal
    Match {
        goal: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Plan the next action for a goal
    Plan {
        goal: String,
        /// Title of the active window
        #[arg(long)]
        window: Option<String>,
        /// Mouse position as X,Y
        #[arg(long, value_parser = parse_pair::<i32>, default_value = "0,0")]
        mouse: (i32, i32),
        /// Screen size as WxH
        #[arg(long, value_parser = parse_size, default_value = "1920x1080")]
        screen: (u32, u32),
        /// Screen description from the vision layer
        #[arg(long, default_value = "")]
        describe: String,
        /// PNG screenshot to attach for vision models
        #[arg(long)]
        screenshot: Option<PathBuf>,
        /// Always ask the model, even for goals with a fixed opening move
        #[arg(long)]
        no_shortcut: bool,
    },

    /// List models available at the endpoint
    Models,
}

fn parse_pair<T: std::str::FromStr>(s: &str) -> Result<(T, T), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let a = a.trim().parse().map_err(|_| format!("invalid number '{a}'"))?;
    let b = b.trim().parse().map_err(|_| format!("invalid number '{b}'"))?;
    Ok((a, b))
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    parse_pair(&s.to_lowercase().replace('x', ","))
}

fn print_pattern(pattern: &GoalPattern) {
    println!("{} (keywords: {})", pattern.goal_type, pattern.keywords.join(", "));
    for (i, step) in pattern.steps.iter().enumerate() {
        let actions: Vec<String> = step.actions.iter().map(|a| a.to_string()).collect();
        println!(
            "  {:>2}. {:<24} [{}] {}",
            i + 1,
            step.name,
            step.verification.kind(),
            actions.join("; ")
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    deskpilot_lib::init_tracing(if cli.verbose { "debug" } else { "info" });

    let cfg = deskpilot_lib::load_app_config(cli.config.as_deref());

    match cli.command {
        Commands::Patterns { file } => {
            let store = match deskpilot_lib::load_patterns(&cfg, file.as_deref()) {
                Ok(store) => store,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            for pattern in store.goal_patterns() {
                print_pattern(pattern);
            }
        }

        Commands::Match { goal, file } => {
            let store = match deskpilot_lib::load_patterns(&cfg, file.as_deref()) {
                Ok(store) => store,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match store.find_for_goal(&goal) {
                Some(pattern) => print_pattern(pattern),
                None => {
                    println!("no pattern matches '{goal}'");
                    return ExitCode::FAILURE;
                }
            }
        }

        Commands::Plan {
            goal,
            window,
            mouse,
            screen,
            describe,
            screenshot,
            no_shortcut,
        } => {
            if !no_shortcut {
                if let Some(action) = ActionPlanner::initial_action(&goal) {
                    println!("{}", serde_json::to_string_pretty(&action).unwrap_or_default());
                    return ExitCode::SUCCESS;
                }
            }

            let provider = match OllamaProvider::from_config(&cfg.llm) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            let planner = ActionPlanner::new(Arc::new(provider), cfg.llm.model.clone());
            let mut session = Session::from_config(&cfg.session);

            let state = ScreenState {
                active_window: window,
                mouse_position: mouse,
                screen_size: screen,
            };
            let mut vision = VisionInfo::from_description(describe);
            if let Some(path) = screenshot {
                match std::fs::read(&path) {
                    Ok(png) => vision = vision.with_screenshot(png),
                    Err(e) => {
                        eprintln!("cannot read {}: {e}", path.display());
                        return ExitCode::FAILURE;
                    }
                }
            }

            match planner.plan(&mut session, &goal, &state, &vision).await {
                Ok(action) => {
                    println!("{}", serde_json::to_string_pretty(&action).unwrap_or_default());
                }
                Err(e) => {
                    println!("{}", serde_json::json!({ "error": e }));
                    return ExitCode::FAILURE;
                }
            }
        }

        Commands::Models => {
            let provider = match OllamaProvider::from_config(&cfg.llm) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            match provider.list_models().await {
                Ok(models) => {
                    let wanted = cfg.llm.model.split(':').next().unwrap_or_default();
                    for name in &models {
                        let marker = if name.split(':').next() == Some(wanted) {
                            "*"
                        } else {
                            " "
                        };
                        println!("{marker} {name}");
                    }
                    if !models.iter().any(|m| m.split(':').next() == Some(wanted)) {
                        eprintln!(
                            "configured model '{}' is not installed at {}",
                            cfg.llm.model,
                            provider.api_base()
                        );
                        return ExitCode::FAILURE;
                    }
                }
                Err(e) => {
                    eprintln!("endpoint {} unreachable: {e}", provider.api_base());
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
