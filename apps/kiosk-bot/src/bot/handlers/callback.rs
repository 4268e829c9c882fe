use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info};

use kiosk_core::l10n::{Area, Localizer};
use kiosk_core::models::format_minor;
use kiosk_core::nav::machine::NOOP_TOKEN;
use kiosk_core::nav::{CatalogToken, ProfileToken, Session};
use kiosk_core::StoreError;

use crate::bot::keyboards::screen_markup;
use crate::state::AppState;

/// Rows per page of the purchase history list.
const HISTORY_PAGE_SIZE: u32 = 10;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let buyer_id = q.from.id.0 as i64;

    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    if data == NOOP_TOKEN {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    }

    if CatalogToken::matches(&data) {
        match CatalogToken::decode(&data) {
            Ok(token) => {
                handle_catalog(&bot, &q, &state, buyer_id, token).await;
            }
            Err(e) => {
                info!("Rejected callback payload: {}", e);
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text(state.l10n.get(Area::Common, "restart_navigation"))
                    .show_alert(true)
                    .await;
            }
        }
    } else if ProfileToken::matches(&data) {
        match ProfileToken::decode(&data) {
            Ok(token) => {
                handle_profile(&bot, &q, &state, buyer_id, token).await;
            }
            Err(e) => {
                info!("Rejected callback payload: {}", e);
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text(state.l10n.get(Area::Common, "restart_navigation"))
                    .show_alert(true)
                    .await;
            }
        }
    } else {
        info!("Unhandled callback payload: {}", data);
        let _ = bot.answer_callback_query(callback_id).await;
    }

    Ok(())
}

async fn handle_catalog(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    buyer_id: i64,
    token: CatalogToken,
) {
    let session = Session { buyer_id };
    match state.navigator.dispatch(&session, &token).await {
        Ok(screen) => {
            let _ = bot.answer_callback_query(q.id.clone()).await;
            edit_with(bot, q, state.l10n.render(&screen.text), screen_markup(&screen, &state.l10n)).await;
        }
        Err(StoreError::NotFound) => {
            // Bucket emptied between screens: tell the user and fall back to
            // the parent list.
            let _ = bot
                .answer_callback_query(q.id.clone())
                .text(state.l10n.get(Area::User, "item_sold_out"))
                .show_alert(true)
                .await;
            if let Ok(parent) = token.back() {
                if let Ok(screen) = state.navigator.dispatch(&session, &parent).await {
                    edit_with(bot, q, state.l10n.render(&screen.text), screen_markup(&screen, &state.l10n)).await;
                }
            }
        }
        Err(e @ (StoreError::MalformedToken(_)
        | StoreError::UnknownLevel(_)
        | StoreError::Precondition(_))) => {
            info!("Navigation rejected: {}", e);
            let _ = bot
                .answer_callback_query(q.id.clone())
                .text(state.l10n.get(Area::Common, "restart_navigation"))
                .show_alert(true)
                .await;
        }
        Err(e) => {
            error!("Navigation failed: {}", e);
            let _ = bot
                .answer_callback_query(q.id.clone())
                .text(state.l10n.get(Area::Common, "try_again"))
                .show_alert(true)
                .await;
        }
    }
}

async fn handle_profile(
    bot: &Bot,
    q: &CallbackQuery,
    state: &AppState,
    buyer_id: i64,
    token: ProfileToken,
) {
    let _ = bot.answer_callback_query(q.id.clone()).await;
    match profile_screen(state, buyer_id, &token).await {
        Ok((text, markup)) => edit_with(bot, q, text, markup).await,
        Err(e) => {
            error!("Profile screen failed: {}", e);
            let _ = bot
                .answer_callback_query(q.id.clone())
                .text(state.l10n.get(Area::Common, "try_again"))
                .show_alert(true)
                .await;
        }
    }
}

/// Profile flow: 0 = menu, 1 = purchase history, 2 = one past buy with its
/// delivered items. Same level-keyed dispatch as the catalog flow.
pub async fn profile_screen(
    state: &AppState,
    buyer_id: i64,
    token: &ProfileToken,
) -> anyhow::Result<(String, InlineKeyboardMarkup)> {
    match token.level {
        0 => {
            let history = ProfileToken::new(1, "history");
            let rows = vec![vec![InlineKeyboardButton::callback(
                state.l10n.get(Area::User, "purchase_history_button"),
                history.encode().map_err(anyhow::Error::from)?,
            )]];
            Ok((
                state.l10n.get(Area::User, "my_profile"),
                InlineKeyboardMarkup::new(rows),
            ))
        }
        1 => {
            let max = state
                .buys
                .max_history_page(buyer_id, HISTORY_PAGE_SIZE)
                .await?;
            let page = token.page.min(max);
            let buys = state
                .buys
                .history_for_buyer(buyer_id, page, HISTORY_PAGE_SIZE)
                .await?;
            let mut rows = Vec::new();
            for buy in buys {
                let mut entry = ProfileToken::new(2, "buy");
                entry.arg = buy.id;
                rows.push(vec![InlineKeyboardButton::callback(
                    format!(
                        "#{} | {} x {}",
                        buy.id,
                        buy.quantity,
                        format_minor(buy.total_price)
                    ),
                    entry.encode().map_err(anyhow::Error::from)?,
                )]);
            }
            if max > 0 {
                rows.push(history_pager(token, page, max, &state.l10n)?);
            }
            rows.push(back_row(state, token)?);
            Ok((
                state.l10n.get(Area::User, "purchase_history"),
                InlineKeyboardMarkup::new(rows),
            ))
        }
        2 => {
            let items = state.buys.items_by_buy(token.arg).await?;
            let delivered = items
                .iter()
                .map(|i| i.private_data.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let text = state
                .l10n
                .render(
                    &kiosk_core::l10n::TextSpec::new(Area::User, "purchased_items")
                        .arg("private_data", delivered),
                );
            let rows = vec![back_row(state, token)?];
            Ok((text, InlineKeyboardMarkup::new(rows)))
        }
        other => Err(StoreError::UnknownLevel(other as i32).into()),
    }
}

/// Prev / indicator / next row for the history list, mirroring the catalog
/// screens. `page` must already be clamped into `[0, max_page]`.
fn history_pager(
    token: &ProfileToken,
    page: u32,
    max_page: u32,
    l10n: &Localizer,
) -> anyhow::Result<Vec<InlineKeyboardButton>> {
    let mut row = Vec::new();
    if page > 0 {
        let prev = ProfileToken {
            page: page - 1,
            ..token.clone()
        };
        row.push(InlineKeyboardButton::callback(
            l10n.get(Area::Common, "prev_page"),
            prev.encode().map_err(anyhow::Error::from)?,
        ));
    }
    row.push(InlineKeyboardButton::callback(
        format!("{}/{}", page + 1, max_page + 1),
        NOOP_TOKEN,
    ));
    if page < max_page {
        let next = ProfileToken {
            page: page + 1,
            ..token.clone()
        };
        row.push(InlineKeyboardButton::callback(
            l10n.get(Area::Common, "next_page"),
            next.encode().map_err(anyhow::Error::from)?,
        ));
    }
    Ok(row)
}

fn back_row(state: &AppState, token: &ProfileToken) -> anyhow::Result<Vec<InlineKeyboardButton>> {
    let back = token.back().map_err(anyhow::Error::from)?;
    Ok(vec![InlineKeyboardButton::callback(
        state.l10n.get(Area::Common, "back"),
        back.encode().map_err(anyhow::Error::from)?,
    )])
}

async fn edit_with(bot: &Bot, q: &CallbackQuery, text: String, markup: InlineKeyboardMarkup) {
    if let Some(msg) = &q.message {
        let _ = bot
            .edit_message_text(msg.chat().id, msg.id(), text)
            .reply_markup(markup)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    fn l10n() -> Localizer {
        Localizer::from_json_str(r#"{"common": {"prev_page": "<", "next_page": ">"}}"#)
            .expect("valid l10n sample")
    }

    fn payload(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            other => panic!("not a callback button: {other:?}"),
        }
    }

    #[test]
    fn history_pager_walks_pages_through_the_token() {
        let mut token = ProfileToken::new(1, "history");
        token.page = 2;
        let row = history_pager(&token, 2, 4, &l10n()).unwrap();
        assert_eq!(row.len(), 3);

        let prev = ProfileToken::decode(payload(&row[0])).unwrap();
        assert_eq!(prev.page, 1);
        assert_eq!(prev.level, 1);
        assert_eq!(prev.action, "history");

        assert_eq!(row[1].text, "3/5");
        assert_eq!(payload(&row[1]), NOOP_TOKEN);

        let next = ProfileToken::decode(payload(&row[2])).unwrap();
        assert_eq!(next.page, 3);
        assert_eq!(next.action, "history");
    }

    #[test]
    fn history_pager_trims_edges() {
        let token = ProfileToken::new(1, "history");
        let first = history_pager(&token, 0, 3, &l10n()).unwrap();
        assert_eq!(first.len(), 2, "no prev on the first page");
        assert_eq!(first[0].text, "1/4");

        let mut token = ProfileToken::new(1, "history");
        token.page = 3;
        let last = history_pager(&token, 3, 3, &l10n()).unwrap();
        assert_eq!(last.len(), 2, "no next on the last page");
        assert_eq!(payload(&last[1]), NOOP_TOKEN);
    }
}
