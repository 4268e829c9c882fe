use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use kiosk_core::l10n::{Area, Localizer};
use kiosk_core::nav::{Label, Screen};

pub fn main_menu(l10n: &Localizer) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(l10n.get(Area::User, "catalog_menu_button")),
        KeyboardButton::new(l10n.get(Area::User, "profile_menu_button")),
    ]])
    .resize_keyboard()
}

/// Turn a core [`Screen`] into an inline keyboard: rows map one-to-one,
/// labels are resolved through the localization table.
pub fn screen_markup(screen: &Screen, l10n: &Localizer) -> InlineKeyboardMarkup {
    let rows = screen
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    let label = match &button.label {
                        Label::Literal(text) => text.clone(),
                        Label::Text(spec) => l10n.render(spec),
                    };
                    InlineKeyboardButton::callback(label, button.token.clone())
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}
