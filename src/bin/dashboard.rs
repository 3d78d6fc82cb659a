//! Headless dashboard: keeps the analytics table in sync and shortens URLs
//! typed on stdin.
//!
//! Input lines:
//! - a URL            shorten it
//! - `:copy`          copy the last short URL
//! - `:refresh`       refresh analytics now
//! - `:quit`          exit

use std::sync::Arc;

use linkpulse_dashboard::{
    client::build_http_client, DashboardConfig, HttpAnalyticsSource, HttpLinkCreator,
    SubmissionFlow, SubmissionState, SyncEngine, SyncState, SyncStatus, SystemClipboard,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so they don't interleave with the table on stdout.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkpulse_dashboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = DashboardConfig::from_env()?;
    tracing::info!("Analytics source: {}", config.analytics_url);
    tracing::info!("Shortener API: {}", config.api_url);

    let client = build_http_client(config.request_timeout)?;
    let source = HttpAnalyticsSource::new(
        client.clone(),
        config.analytics_url.clone(),
        config.analytics_method,
    );
    let engine = SyncEngine::new(Arc::new(source), config.poll_interval);
    let flow = SubmissionFlow::new(
        Arc::new(HttpLinkCreator::new(client, &config.api_url)),
        Arc::new(engine.clone()),
        Arc::new(SystemClipboard),
    );

    let mut analytics = WatchStream::new(engine.subscribe());
    let mut submissions = WatchStream::from_changes(flow.subscribe());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    engine.start();

    loop {
        tokio::select! {
            Some(state) = analytics.next() => {
                print!("{}", render_analytics(&state, &config.api_url));
            }
            Some(state) = submissions.next() => {
                if let Some(line) = render_submission(&state) {
                    println!("{line}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    ":quit" => break,
                    ":refresh" => {
                        engine.refresh_now();
                    }
                    ":copy" => {
                        if let Err(e) = flow.copy_short_url().await {
                            println!("! {e}");
                        }
                    }
                    url => {
                        let flow = flow.clone();
                        let url = url.to_owned();
                        tokio::spawn(async move {
                            // Network failures are already reflected in the
                            // submission state; only report rejected input here.
                            if let Err(e) = flow.submit(&url).await {
                                if !e.is_network() {
                                    println!("! {e}");
                                }
                            }
                        });
                    }
                }
            }
        }
    }

    engine.stop();
    Ok(())
}

fn render_analytics(state: &SyncState, short_base: &str) -> String {
    match &state.status {
        SyncStatus::Loading => "Loading analytics...\n".to_owned(),
        SyncStatus::Error(message) => format!("Error: {message}\n"),
        SyncStatus::Ready => {
            let mut out = String::from("\nShort Link\tOriginal URL\tClicks\n");
            for row in &state.snapshot {
                out.push_str(&format!(
                    "{}\t{}\t{}\n",
                    row.short_link(short_base),
                    row.long_url,
                    row.click_count
                ));
            }
            out
        }
    }
}

fn render_submission(state: &SubmissionState) -> Option<String> {
    if state.pending {
        return Some("Shortening...".to_owned());
    }
    if let Some(message) = &state.error_message {
        return Some(format!("! {message}"));
    }
    if state.copied {
        return Some("Copied!".to_owned());
    }
    state
        .last_created_url
        .as_ref()
        .map(|url| format!("Your short URL: {url}"))
}
