//! `pix2code` -- generate front-end code from a text description.
//!
//! Connects to the generation backend, streams every variant into the
//! version graph, and prints the results. Ctrl-C cancels the generation.
//!
//! ```text
//! pix2code <description...>
//! ```
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                       |
//! |------------------------|----------|-------------------------|-----------------------------------|
//! | `WS_BACKEND_URL`       | no       | `ws://127.0.0.1:7001`   | Generation backend WebSocket URL  |
//! | `HTTP_BACKEND_URL`     | no       | `http://127.0.0.1:7001` | Backend REST URL                  |
//! | `CONNECT_TIMEOUT_SECS` | no       | `10`                    | Bound on opening the channel      |
//! | `IS_RUNNING_ON_CLOUD`  | no       | `false`                 | Hosted deployment wording         |
//! | `PIX2CODE_USER_ID`     | no       | --                      | User charged for the generation   |

use anyhow::Context;
use pix2code_stream::api::Pix2CodeApi;
use pix2code_stream::config::ClientConfig;
use pix2code_stream::request::GenerationSettings;
use pix2code_workspace::controller::Workspace;
use pix2code_workspace::notify::{Notification, NotificationLevel};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pix2code=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let description = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if description.trim().is_empty() {
        anyhow::bail!("usage: pix2code <description...>");
    }

    let config = ClientConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        ws_url = %config.ws_backend_url,
        http_url = %config.http_backend_url,
        "Starting pix2code",
    );

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Notification>();
    tokio::spawn(async move {
        while let Some(n) = notify_rx.recv().await {
            match n.level {
                NotificationLevel::Error => tracing::error!("{}", n.message),
                NotificationLevel::Info | NotificationLevel::Success => {
                    tracing::info!("{}", n.message)
                }
            }
        }
    });

    let mut workspace = Workspace::from_config(&config, GenerationSettings::default(), notify_tx);

    if let Some(user_id) = &config.user_id {
        let api = Pix2CodeApi::new(&config.http_backend_url);
        match api.credit_summary(user_id).await {
            Ok(summary) => {
                tracing::info!(credits = summary.credits_remaining, plan = %summary.plan, "Credit balance");
                workspace.set_credits(Some(summary.credits_remaining));
            }
            Err(e) => tracing::warn!(error = %e, "Could not load credit balance"),
        }
    }

    workspace.create_from_text(&description)?;

    if let Some(cancel) = workspace.cancel_handle() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Cancelling generation");
                cancel.cancel();
            }
        });
    }

    let outcome = workspace.drive().await?;
    tracing::info!(?outcome, "Generation finished");

    if let Some(commit) = workspace.store().head_commit() {
        for (index, variant) in commit.variants.iter().enumerate() {
            println!("===== variant {index} ({:?}) =====", variant.status);
            match &variant.error_message {
                Some(error) => println!("error: {error}"),
                None => println!("{}", variant.code),
            }
        }
    }

    if let Some(balance) = workspace.credits() {
        tracing::info!(credits = balance, "Remaining credits");
    }
    Ok(())
}
