use anyhow::Result;
use sifr::config::{self, AppConfig};
use sifr::{Client, ClientBuilder, Error, Message, User};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// How a session ended.
enum Outcome {
    /// The user asked us to leave.
    Quit,
    Lost(Error),
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::config_path);

    let cfg = config::load_config_from(&path)?;
    if !path.exists() {
        // Persist the defaults so the generated nickname survives restarts.
        config::save_config_to(&cfg, &path)?;
    }

    sifr::logging::init(&cfg.logging);
    info!(config = %path.display(), server = %cfg.server.address(), "starting sifr");

    loop {
        match run_session(&cfg).await {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Lost(err)) => warn!(error = %err, "session lost"),
            Err(e) => error!(error = %e, "could not start session"),
        }

        if !cfg.behavior.reconnect {
            break;
        }
        let delay = Duration::from_secs(cfg.behavior.reconnect_delay_secs);
        info!(?delay, "reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn run_session(cfg: &AppConfig) -> sifr::Result<Outcome> {
    let (client, mut errors) = ClientBuilder::new(User::from(&cfg.server))
        .config(cfg)
        .handler("PRIVMSG", log_message)
        .handler("NOTICE", log_message)
        .connect(&cfg.server.address())
        .await?;

    loop {
        tokio::select! {
            report = errors.recv() => match report {
                Some(err) if err.is_fatal() => {
                    client.closed().await;
                    return Ok(Outcome::Lost(err));
                }
                Some(err) => warn!(error = %err, "protocol error"),
                None => return Ok(Outcome::Lost(Error::Closed)),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, quitting");
                if let Err(e) = client.quit(&cfg.behavior.quit_message) {
                    warn!(error = %e, "could not send QUIT");
                }
                client.closed().await;
                return Ok(Outcome::Quit);
            }
        }
    }
}

fn log_message(_client: &Client, msg: &Message) {
    info!(
        action = %msg.action,
        from = %msg.from,
        to = %msg.to,
        "{}",
        msg.body
    );
}
