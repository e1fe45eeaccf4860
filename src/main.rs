use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use tokio::time::sleep;

use hr_survey_bot::api::{self, ApiState};
use hr_survey_bot::cli::{Cli, Commands};
use hr_survey_bot::conversation::ConversationEngine;
use hr_survey_bot::core::{config, logging::init_logger};
use hr_survey_bot::storage::conversation::ConversationStore;
use hr_survey_bot::storage::surveys::SqliteSurveyStore;
use hr_survey_bot::storage::{create_pool, DbPool};
use hr_survey_bot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, NotificationService};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log dispatcher panics instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;
    let _ = dotenv();

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::InitDb) => {
            create_pool(&config::DATABASE_PATH)
                .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
            log::info!("Database initialized at {}", &*config::DATABASE_PATH);
            Ok(())
        }
        None => {
            log::info!("No command specified, running bot in polling mode");
            run_bot(false).await
        }
    }
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting bot...");

    let bot = create_bot()?;

    // Retry while the Bot API is still coming up
    let bot_info = {
        let startup_max_retries = 12;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    startup_retry += 1;
                    if startup_retry >= startup_max_retries {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }
                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        e
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    setup_bot_commands(&bot).await?;

    let db_pool = create_pool(&config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;

    let notifier = Arc::new(NotificationService::new(bot.clone(), Arc::clone(&db_pool)));
    let engine = Arc::new(ConversationEngine::new(
        ConversationStore::new(Arc::clone(&db_pool)),
        Arc::new(SqliteSurveyStore::new(Arc::clone(&db_pool))),
        Arc::clone(&notifier),
        config::HR_TELEGRAM_IDS.clone(),
    ));

    spawn_api_server(Arc::clone(&db_pool), Arc::clone(&notifier));

    if config::HR_TELEGRAM_IDS.is_empty() {
        log::warn!("HR_TELEGRAM_IDS is not set; completion notices will go nowhere");
    }

    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool), engine, bot_info.id);
    let handler = schema(handler_deps);

    if use_webhook {
        let Some(webhook_url) = config::WEBHOOK_URL.clone() else {
            return Err(anyhow::anyhow!("webhook mode requested but WEBHOOK_URL is not set"));
        };
        run_webhook_dispatcher(bot, handler, &webhook_url).await
    } else {
        run_polling_dispatcher(bot, handler).await
    }
}

fn spawn_api_server(db_pool: Arc<DbPool>, notifier: Arc<NotificationService>) {
    let port = *config::API_PORT;
    tokio::spawn(async move {
        let app = api::router(ApiState { db_pool, notifier });
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        log::info!("REST API listening on {}", addr);

        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    log::error!("REST API server error: {}", e);
                }
            }
            Err(e) => log::error!("Failed to bind REST API port {}: {}", port, e),
        }
    });
}

async fn run_webhook_dispatcher(
    bot: Bot,
    handler: teloxide::dispatching::UpdateHandler<hr_survey_bot::telegram::HandlerError>,
    webhook_url: &str,
) -> Result<()> {
    use teloxide::update_listeners::webhooks;

    let addr = SocketAddr::from(([0, 0, 0, 0], *config::WEBHOOK_PORT));
    let url = url::Url::parse(webhook_url)?;
    log::info!("Starting bot in webhook mode at {}", url);

    let listener = webhooks::axum(bot.clone(), webhooks::Options::new(addr, url)).await?;

    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    Ok(())
}

async fn run_polling_dispatcher(
    bot: Bot,
    handler: teloxide::dispatching::UpdateHandler<hr_survey_bot::telegram::HandlerError>,
) -> Result<()> {
    log::info!("Starting bot in long polling mode");

    let mut retry_count = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Run each dispatcher in its own task so a panic is caught via the
        // JoinHandle and the loop can reconnect.
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                retry_count += 1;
                if retry_count > config::dispatcher::MAX_RETRIES {
                    log::error!("Max dispatcher retries reached. Exiting...");
                    break;
                }
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    config::dispatcher::MAX_RETRIES
                );
                sleep(config::dispatcher::restart_delay(retry_count)).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}
