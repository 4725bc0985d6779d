//! Wiring & DI. Entry point: bootstrap adapters, inject into services, start the poll job and the bot.
//! No business logic here.

use dotenv::dotenv;
use outlay_bot::adapters::mail::{GmailGateway, GoogleTokenProvider, MockMailGateway};
use outlay_bot::adapters::persistence::SqliteRepo;
use outlay_bot::adapters::telegram::{TelegramChat, run_dispatcher};
use outlay_bot::ports::{ChatPort, CommandPort, CredentialProvider, MailGateway, TransactionRepo};
use outlay_bot::shared::config::AppConfig;
use outlay_bot::usecases::{ChatCommandResponder, NotificationHandshake, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {}", e))?;
    let Some(token) = cfg.telegram_token.clone().filter(|t| !t.is_empty()) else {
        anyhow::bail!("Set OUTLAY_TELEGRAM_TOKEN (env or .env). Get one from @BotFather");
    };
    let Some(chat_id) = cfg.telegram_chat_id else {
        anyhow::bail!("Set OUTLAY_TELEGRAM_CHAT_ID to the chat that receives notifications");
    };

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    let repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    info!(path = %repo.db_path().display(), "database ready");

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| anyhow::anyhow!("HTTP client: {}", e))?;

    // --- Mail: Gmail when credentials are present, otherwise the demo mailbox ---
    let mail: Arc<dyn MailGateway> = if cfg.is_gmail_configured() {
        let credentials: Arc<dyn CredentialProvider> = Arc::new(GoogleTokenProvider::new(
            http.clone(),
            cfg.oauth_token_url_or_default(),
            cfg.gmail_client_id.clone().unwrap_or_default(),
            cfg.gmail_client_secret.clone().unwrap_or_default(),
            cfg.gmail_refresh_token.clone(),
            repo.clone(),
        ));
        info!(sender = %cfg.mail_filter().sender, "using Gmail");
        Arc::new(GmailGateway::new(
            http,
            cfg.gmail_api_url_or_default(),
            credentials,
        ))
    } else {
        warn!("Gmail credentials not set; using the demo mailbox");
        Arc::new(MockMailGateway::demo())
    };

    // --- Chat ---
    let bot = Bot::new(token);
    let chat: Arc<dyn ChatPort> = Arc::new(TelegramChat::new(bot.clone()));
    let transactions: Arc<dyn TransactionRepo> = repo.clone();

    // --- Services ---
    let policy = cfg.resend_policy_or_default();
    let handshake = Arc::new(NotificationHandshake::new(
        mail,
        transactions.clone(),
        chat,
        chat_id,
        cfg.mail_filter(),
        policy,
    ));
    let responder: Arc<dyn CommandPort> = Arc::new(ChatCommandResponder::new(
        handshake.clone(),
        transactions,
        chat_id,
    ));

    let poll_secs = cfg.poll_interval_secs_or_default();
    info!(poll_secs, ?policy, chat_id, "starting");
    let jobs = Scheduler::new()
        .every("mail-poll", Duration::from_secs(poll_secs), move || {
            let handshake = handshake.clone();
            async move { handshake.poll_once().await }
        })
        .start();

    run_dispatcher(bot, responder).await;

    for job in jobs {
        job.abort();
    }
    info!("stopped");
    Ok(())
}
