use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use teloxide::prelude::*;

mod bot;
mod services;
mod state;

use kiosk_core::l10n::Localizer;
use kiosk_core::nav::Navigator;
use kiosk_db::repositories::{BuyRepository, PgAllocator, PgCatalog, RestockRepository};

use crate::services::restock_service::RestockService;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Kiosk Bot...");

    let token = env::var("BOT_TOKEN").expect("BOT_TOKEN is not set");
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set");
    let admin_id: i64 = env::var("ADMIN_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let page_size: u32 = env::var("PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let language = env::var("BOT_LANGUAGE").unwrap_or_else(|_| "en".to_string());

    let pool = kiosk_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    let l10n = Arc::new(
        Localizer::load(format!("l10n/{language}.json")).expect("Failed to load localization"),
    );
    let navigator = Arc::new(Navigator::new(
        Arc::new(PgCatalog::new(pool.clone())),
        Arc::new(PgAllocator::new(pool.clone())),
        page_size,
    ));

    let state = AppState {
        navigator,
        l10n,
        buys: BuyRepository::new(pool.clone()),
        restock: RestockService::new(RestockRepository::new(pool)),
        admin_id,
    };

    let bot = Bot::new(token);

    let (_tx, rx) = tokio::sync::broadcast::channel(1);

    bot::run_bot(bot, rx, state).await;
}
