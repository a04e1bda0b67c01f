//! `screenpilot` - vision-model driven screen automation
//!
//! Wires the control loop together: screen capture, the oracle client, the
//! command dispatcher, and the loop controller, plus the operator-facing
//! goal prompt and interrupt handling. The loop itself lives in
//! `screenpilot-core`.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use screenpilot_core::{
    CommandRegistry, Config, Dispatcher, Effector, FailurePolicy, HttpTransport, LoggingEffector,
    LoopController, LoopExit, OracleClient, PromptBuilder, ResponseExtractor, ShellCapture,
    ShellEffector,
};

use crate::cli::Cli;

mod cli;

/// Reserved token that ends the session at the goal prompt.
const QUIT_TOKEN: &str = "quit";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.oracle.base_url = base_url.clone();
    }
    if let Some(model) = &cli.model {
        config.oracle.model = model.clone();
    }

    // Cancellation is global and immediate: the controller observes it at
    // the top of every iteration and during every sleep.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                cancel.cancel();
            }
        });
    }

    let effector: Arc<dyn Effector> = if cli.dry_run {
        Arc::new(LoggingEffector::new())
    } else {
        match ShellEffector::detect().await {
            Ok(effector) => Arc::new(effector),
            Err(e) => return Err(e),
        }
    };

    let registry = Arc::new(CommandRegistry::standard());
    let transport = Arc::new(HttpTransport::new(&config.oracle)?);
    let mut controller = LoopController::new(
        Arc::new(ShellCapture::new(config.capture.command.clone())),
        OracleClient::new(transport, &config.oracle),
        ResponseExtractor::new(),
        Dispatcher::new(
            registry.clone(),
            effector.clone(),
            config.timing.settle_delay(),
            cancel.clone(),
        ),
        PromptBuilder::new(&registry),
        effector,
        config.timing.clone(),
        cancel.clone(),
    )
    .with_failure_policy(if cli.confirm {
        FailurePolicy::Pause
    } else {
        FailurePolicy::Continue
    });

    let cyan = Style::new().cyan().bold();
    println!(
        "{} watching {} with model '{}'. Ctrl+C to stop.",
        cyan.apply_to("screenpilot"),
        config.oracle.base_url,
        config.oracle.model
    );

    let goal = match &cli.goal {
        Some(goal) => goal.clone(),
        None => read_goal()?,
    };
    if goal.trim().eq_ignore_ascii_case(QUIT_TOKEN) || goal.trim().is_empty() {
        return Ok(());
    }

    loop {
        match controller.run(&goal).await {
            LoopExit::Cancelled => break,
            LoopExit::ActionFailed(outcome) => {
                let yellow = Style::new().yellow();
                println!(
                    "{} action '{}' failed",
                    yellow.apply_to("!"),
                    outcome.action
                );
                if cancel.is_cancelled() {
                    break;
                }
                let retry = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Try again?")
                    .default(true)
                    .interact()?;
                if !retry {
                    break;
                }
            }
        }
    }

    let green = Style::new().green();
    println!("{}", green.apply_to("fail-safe restored; session ended."));
    Ok(())
}

/// One line of goal text from the operator.
fn read_goal() -> Result<String> {
    let goal: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("What should I do ('quit' to exit)")
        .allow_empty(true)
        .interact_text()?;
    Ok(goal)
}

/// Dev diagnostics via `RUST_LOG`, output to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
