use chrono::{Duration, Utc};
use teloxide::prelude::*;
use tracing::{error, info};

use kiosk_core::l10n::{Area, TextSpec};
use kiosk_core::models::format_minor;
use kiosk_core::nav::{CatalogToken, ProfileToken, Session};

use crate::bot::handlers::callback::profile_screen;
use crate::bot::keyboards::{main_menu, screen_markup};
use crate::state::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received message: {:?}", msg.text());
    // The sender's user id, not the chat id: the two differ outside private
    // chats, and both the admin gate and the buyer identity key on the user.
    let Some(tg_id) = sender_id(&msg) else {
        return Ok(());
    };

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with("/start") {
        let _ = bot
            .send_message(msg.chat.id, state.l10n.get(Area::User, "start_message"))
            .reply_markup(main_menu(&state.l10n))
            .await;
        return Ok(());
    }

    if text == state.l10n.get(Area::User, "catalog_menu_button") {
        let session = Session { buyer_id: tg_id };
        match state
            .navigator
            .dispatch(&session, &CatalogToken::root())
            .await
        {
            Ok(screen) => {
                let _ = bot
                    .send_message(msg.chat.id, state.l10n.render(&screen.text))
                    .reply_markup(screen_markup(&screen, &state.l10n))
                    .await;
            }
            Err(e) => {
                error!("Failed to render category list: {}", e);
                let _ = bot
                    .send_message(msg.chat.id, state.l10n.get(Area::Common, "try_again"))
                    .await;
            }
        }
        return Ok(());
    }

    if text == state.l10n.get(Area::User, "profile_menu_button") {
        match profile_screen(&state, tg_id, &ProfileToken::new(0, "menu")).await {
            Ok((text, markup)) => {
                let _ = bot
                    .send_message(msg.chat.id, text)
                    .reply_markup(markup)
                    .await;
            }
            Err(e) => {
                error!("Failed to render profile: {}", e);
                let _ = bot
                    .send_message(msg.chat.id, state.l10n.get(Area::Common, "try_again"))
                    .await;
            }
        }
        return Ok(());
    }

    if state.is_admin(tg_id) {
        if let Some(path) = text.strip_prefix("/restock ") {
            return restock(&bot, &msg, &state, path.trim()).await;
        }
        if let Some(window) = text.strip_prefix("/stats") {
            return stats(&bot, &msg, &state, window.trim()).await;
        }
        if text == "/reload_l10n" {
            let reply = match state.l10n.reload() {
                Ok(()) => state.l10n.get(Area::Admin, "l10n_reloaded"),
                Err(e) => {
                    error!("Localization reload failed: {}", e);
                    state.l10n.get(Area::Common, "try_again")
                }
            };
            let _ = bot.send_message(msg.chat.id, reply).await;
            return Ok(());
        }
    }

    Ok(())
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

async fn restock(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    path: &str,
) -> Result<(), teloxide::RequestError> {
    match state.restock.ingest_from_file(path).await {
        Ok(outcome) => {
            let mut announcement = state.l10n.render(
                &TextSpec::new(Area::Admin, "restock_header")
                    .arg("count", outcome.count)
                    .arg("date", Utc::now().format("%Y-%m-%d").to_string()),
            );
            for ((category, subcategory), count) in &outcome.by_bucket {
                announcement.push('\n');
                announcement.push_str(&state.l10n.render(
                    &TextSpec::new(Area::Admin, "restock_line")
                        .arg("category_name", category)
                        .arg("subcategory_name", subcategory)
                        .arg("count", count),
                ));
            }
            let _ = bot.send_message(msg.chat.id, announcement).await;
        }
        Err(e) => {
            error!("Restock ingestion failed: {}", e);
            let _ = bot
                .send_message(
                    msg.chat.id,
                    state.l10n.render(
                        &TextSpec::new(Area::Admin, "restock_failed").arg("error", e.to_string()),
                    ),
                )
                .await;
        }
    }
    Ok(())
}

async fn stats(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    window: &str,
) -> Result<(), teloxide::RequestError> {
    let (days, label) = match window {
        "week" => (7, "week"),
        "month" => (30, "month"),
        _ => (1, "day"),
    };
    match state
        .buys
        .stats_since(Utc::now() - Duration::days(days))
        .await
    {
        Ok(stats) => {
            let text = state.l10n.render(
                &TextSpec::new(Area::Admin, "sales_stats")
                    .arg("window", label)
                    .arg("buys", stats.buys)
                    .arg("items_sold", stats.items_sold)
                    .arg("revenue", format_minor(stats.revenue)),
            );
            let _ = bot.send_message(msg.chat.id, text).await;
        }
        Err(e) => {
            error!("Stats query failed: {}", e);
            let _ = bot
                .send_message(msg.chat.id, state.l10n.get(Area::Common, "try_again"))
                .await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_id_is_the_user_not_the_chat() {
        // Group chat: chat.id and from.id diverge.
        let msg: Message = serde_json::from_str(
            r#"{
                "message_id": 1,
                "date": 1724572800,
                "chat": {"id": -1001234567890, "type": "supergroup", "title": "buyers"},
                "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
                "text": "/stats"
            }"#,
        )
        .expect("valid message payload");
        assert_eq!(sender_id(&msg), Some(42));
        assert_ne!(sender_id(&msg), Some(msg.chat.id.0));
    }

    #[test]
    fn channel_posts_have_no_sender() {
        let msg: Message = serde_json::from_str(
            r#"{
                "message_id": 2,
                "date": 1724572800,
                "chat": {"id": -1009876543210, "type": "channel", "title": "announcements"},
                "text": "restocked"
            }"#,
        )
        .expect("valid message payload");
        assert_eq!(sender_id(&msg), None);
    }
}
