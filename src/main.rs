use domain::credentials;
use domain::error::Error;
use domain::{PublishOutcome, SkipReason};
use log::*;
use service::config::{Command, Config};
use service::logging::Logger;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }
    debug!("{:?}", config);

    let result = match &config.command {
        Command::Authorize {
            state,
            show_verifier,
        } => authorize(&config, state.clone(), *show_verifier),
        Command::Exchange { code, state } => exchange(&config, code, state.as_deref()).await,
        Command::Refresh => refresh(&config).await,
    };

    if let Err(e) = result {
        error!("{} failed: {}", config.command.name(), e);
        std::process::exit(1);
    }
}

fn authorize(config: &Config, state: Option<String>, show_verifier: bool) -> Result<(), Error> {
    let request = credentials::authorize(config, state)?;

    println!("Open this URL, approve the app, then run `exchange <code> --state {}`:", request.state);
    println!("{}", request.url);
    if show_verifier {
        println!("code_verifier: {}", request.pkce.verifier().as_str());
    }
    Ok(())
}

async fn exchange(config: &Config, code: &str, state: Option<&str>) -> Result<(), Error> {
    let report = credentials::exchange_code(config, code, state).await?;

    if report.tokens.refresh_token.is_none() {
        warn!("No refresh token was issued; request the offline.access scope to enable refresh");
    }
    report_rotation(config, &report.rotation);
    Ok(())
}

async fn refresh(config: &Config) -> Result<(), Error> {
    let rotation = credentials::refresh(config).await?;
    report_rotation(config, &rotation);
    Ok(())
}

fn report_rotation(config: &Config, rotation: &PublishOutcome) {
    let secret = config.refresh_token_secret_name();
    match rotation {
        PublishOutcome::Published { key_id, status } => {
            info!("Refresh token stored in secret {} ({:?}, key {})", secret, status, key_id)
        }
        PublishOutcome::Skipped(SkipReason::NotRotated) => {
            info!("Refresh token unchanged; secret {} left as is", secret)
        }
        PublishOutcome::Skipped(SkipReason::DryRun) => warn!(
            "Dry run: the new refresh token was NOT stored in secret {}; the stored one may already be invalid",
            secret
        ),
        PublishOutcome::Failed { reason, .. } => warn!(
            "Refresh token could not be stored in secret {}: {}. Re-run `exchange` before the next run",
            secret, reason
        ),
    }
}
