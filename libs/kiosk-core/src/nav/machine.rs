//! Navigation state machine for the purchase flow.
//!
//! Stateless and request-scoped: each incoming token is interpreted against
//! the catalog read model and produces the next screen, with fresh tokens
//! attached to every button. Dispatch consults only `token.level`, through an
//! explicit handler table; unknown levels are a routing error, never a
//! silent default.

use std::sync::Arc;

use tracing::warn;

use crate::catalog::{CatalogStore, InventoryAllocator};
use crate::error::{StoreError, StoreResult};
use crate::l10n::{Area, TextSpec};
use crate::models::format_minor;
use crate::nav::token::CatalogToken;

pub const LEVEL_CATEGORIES: u8 = 0;
pub const LEVEL_SUBCATEGORIES: u8 = 1;
pub const LEVEL_QUANTITY: u8 = 2;
pub const LEVEL_CONFIRM: u8 = 3;
pub const LEVEL_PURCHASE: u8 = 4;

/// Quantity buttons offered on the quantity-select screen.
const QUANTITY_CHOICES: std::ops::RangeInclusive<u16> = 1..=10;

/// Callback payload for buttons that should do nothing when tapped.
pub const NOOP_TOKEN: &str = "noop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Already-final text, e.g. a category name or a digit.
    Literal(String),
    /// Semantic key resolved by the localization boundary.
    Text(TextSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: Label,
    /// Encoded navigation token carried in the button payload.
    pub token: String,
}

impl Button {
    fn literal(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: Label::Literal(label.into()),
            token: token.into(),
        }
    }

    fn text(spec: TextSpec, token: impl Into<String>) -> Self {
        Self {
            label: Label::Text(spec),
            token: token.into(),
        }
    }
}

/// What the transport layer renders: a localizable text plus button rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: TextSpec,
    pub rows: Vec<Vec<Button>>,
}

impl Screen {
    fn new(text: TextSpec) -> Self {
        Self {
            text,
            rows: Vec::new(),
        }
    }

    fn push_chunked(&mut self, buttons: Vec<Button>, columns: usize) {
        let mut buttons = buttons;
        while !buttons.is_empty() {
            let rest = buttons.split_off(buttons.len().min(columns));
            self.rows.push(buttons);
            buttons = rest;
        }
    }
}

/// Per-interaction context, passed to every handler whether it needs it or
/// not; only the purchase handler consumes it today.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub buyer_id: i64,
}

pub struct Navigator {
    catalog: Arc<dyn CatalogStore>,
    allocator: Arc<dyn InventoryAllocator>,
    page_size: u32,
}

impl Navigator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        allocator: Arc<dyn InventoryAllocator>,
        page_size: u32,
    ) -> Self {
        Self {
            catalog,
            allocator,
            page_size,
        }
    }

    /// Handler table: level is the sole dispatch key.
    pub async fn dispatch(&self, session: &Session, token: &CatalogToken) -> StoreResult<Screen> {
        match token.level {
            LEVEL_CATEGORIES => self.category_list(session, token).await,
            LEVEL_SUBCATEGORIES => self.subcategory_list(session, token).await,
            LEVEL_QUANTITY => self.quantity_select(session, token).await,
            LEVEL_CONFIRM => self.confirm(session, token).await,
            LEVEL_PURCHASE => self.purchase(session, token).await,
            other => Err(StoreError::UnknownLevel(other as i32)),
        }
    }

    async fn category_list(&self, _session: &Session, token: &CatalogToken) -> StoreResult<Screen> {
        let max = self.catalog.max_category_page(self.page_size).await?;
        let page = token.page.min(max);
        let categories = self.catalog.stocked_categories(page, self.page_size).await?;

        let mut screen = Screen::new(TextSpec::new(Area::User, "all_categories"));
        for category in categories {
            let next = CatalogToken {
                level: LEVEL_SUBCATEGORIES,
                category_id: category.id,
                ..CatalogToken::root()
            };
            screen
                .rows
                .push(vec![Button::literal(category.name, next.encode()?)]);
        }
        self.push_pagination(&mut screen, token, page, max)?;
        Ok(screen)
    }

    async fn subcategory_list(
        &self,
        _session: &Session,
        token: &CatalogToken,
    ) -> StoreResult<Screen> {
        if token.category_id < 0 {
            return Err(StoreError::Precondition("category not selected"));
        }
        let max = self
            .catalog
            .max_subcategory_page(token.category_id, self.page_size)
            .await?;
        let page = token.page.min(max);
        let category = self.catalog.category(token.category_id).await?;
        let subcategories = self
            .catalog
            .stocked_subcategories(token.category_id, page, self.page_size)
            .await?;

        let mut screen = Screen::new(
            TextSpec::new(Area::User, "choose_subcategory").arg("category_name", &category.name),
        );
        for subcategory in subcategories {
            // The listing and the price lookup run against different
            // snapshots; a bucket that sold out in between is just skipped.
            let price = match self
                .catalog
                .price_of(token.category_id, subcategory.id)
                .await
            {
                Ok(price) => price,
                Err(StoreError::NotFound) => {
                    warn!(
                        subcategory_id = subcategory.id,
                        "subcategory sold out while rendering list"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            let available = self
                .catalog
                .available_quantity(token.category_id, subcategory.id)
                .await?;
            let next = CatalogToken {
                level: LEVEL_QUANTITY,
                category_id: token.category_id,
                subcategory_id: subcategory.id,
                unit_price: price,
                ..CatalogToken::root()
            };
            let label = TextSpec::new(Area::User, "subcategory_button")
                .arg("subcategory_name", &subcategory.name)
                .arg("price", format_minor(price))
                .arg("available_quantity", available);
            screen.rows.push(vec![Button::text(label, next.encode()?)]);
        }
        self.push_pagination(&mut screen, token, page, max)?;
        self.push_back(&mut screen, token)?;
        Ok(screen)
    }

    async fn quantity_select(
        &self,
        _session: &Session,
        token: &CatalogToken,
    ) -> StoreResult<Screen> {
        if token.category_id < 0 || token.subcategory_id < 0 {
            return Err(StoreError::Precondition("bucket not selected"));
        }
        // NotFound here means the last item sold between screens; the caller
        // answers "no longer available" and re-renders the parent list.
        let item = self
            .catalog
            .first_unsold(token.category_id, token.subcategory_id)
            .await?;
        let category = self.catalog.category(token.category_id).await?;
        let subcategory = self.catalog.subcategory(token.subcategory_id).await?;
        let available = self
            .catalog
            .available_quantity(token.category_id, token.subcategory_id)
            .await?;

        let mut screen = Screen::new(
            TextSpec::new(Area::User, "select_quantity")
                .arg("category_name", &category.name)
                .arg("subcategory_name", &subcategory.name)
                .arg("price", format_minor(token.unit_price))
                .arg("description", &item.description)
                .arg("available_quantity", available),
        );
        let mut quantity_buttons = Vec::new();
        for quantity in QUANTITY_CHOICES {
            // The token's price field is client-supplied; a hostile magnitude
            // must fail cleanly, not wrap.
            let total_price = token
                .unit_price
                .checked_mul(quantity as i64)
                .ok_or_else(|| StoreError::MalformedToken("total price overflow".into()))?;
            let next = CatalogToken {
                level: LEVEL_CONFIRM,
                quantity,
                total_price,
                ..*token
            };
            quantity_buttons.push(Button::literal(quantity.to_string(), next.encode()?));
        }
        screen.push_chunked(quantity_buttons, 3);
        self.push_back(&mut screen, token)?;
        Ok(screen)
    }

    async fn confirm(&self, _session: &Session, token: &CatalogToken) -> StoreResult<Screen> {
        if token.quantity == 0 {
            return Err(StoreError::Precondition("quantity not selected"));
        }
        self.confirm_screen(token, "buy_confirmation", None).await
    }

    /// Terminal level of the flow: run the allocator. A lost race is retried
    /// once after re-checking availability; stock shortage re-renders the
    /// confirmation screen with the fresh count instead of failing.
    async fn purchase(&self, session: &Session, token: &CatalogToken) -> StoreResult<Screen> {
        if !token.confirmed {
            return Err(StoreError::Precondition("purchase not confirmed"));
        }
        if token.quantity == 0 {
            return Err(StoreError::Precondition("quantity not selected"));
        }
        match self.try_allocate(session, token).await {
            Ok(screen) => Ok(screen),
            Err(StoreError::InsufficientStock { available }) => {
                self.stock_changed_screen(token, available).await
            }
            Err(StoreError::ConcurrentAllocation) => {
                let available = self
                    .catalog
                    .available_quantity(token.category_id, token.subcategory_id)
                    .await?;
                if available < token.quantity as i64 {
                    return self.stock_changed_screen(token, available).await;
                }
                match self.try_allocate(session, token).await {
                    Ok(screen) => Ok(screen),
                    Err(StoreError::InsufficientStock { available }) => {
                        self.stock_changed_screen(token, available).await
                    }
                    Err(StoreError::ConcurrentAllocation) => {
                        self.confirm_screen(token, "stock_contention", None).await
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn try_allocate(&self, session: &Session, token: &CatalogToken) -> StoreResult<Screen> {
        let allocation = self
            .allocator
            .allocate(
                session.buyer_id,
                token.category_id,
                token.subcategory_id,
                token.quantity as i64,
            )
            .await?;
        let delivered = allocation
            .items
            .iter()
            .map(|item| item.private_data.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut screen = Screen::new(
            TextSpec::new(Area::User, "purchase_success")
                .arg("quantity", token.quantity)
                .arg("total_price", format_minor(allocation.total_price))
                .arg("private_data", delivered),
        );
        screen.rows.push(vec![Button::text(
            TextSpec::new(Area::User, "back_to_catalog"),
            CatalogToken::root().encode()?,
        )]);
        Ok(screen)
    }

    async fn stock_changed_screen(
        &self,
        token: &CatalogToken,
        available: i64,
    ) -> StoreResult<Screen> {
        self.confirm_screen(token, "buy_confirmation_stock_changed", Some(available))
            .await
    }

    async fn confirm_screen(
        &self,
        token: &CatalogToken,
        text_key: &'static str,
        available: Option<i64>,
    ) -> StoreResult<Screen> {
        let category = self.catalog.category(token.category_id).await?;
        let subcategory = self.catalog.subcategory(token.subcategory_id).await?;

        let mut text = TextSpec::new(Area::User, text_key)
            .arg("category_name", &category.name)
            .arg("subcategory_name", &subcategory.name)
            .arg("price", format_minor(token.unit_price))
            .arg("quantity", token.quantity)
            .arg("total_price", format_minor(token.total_price));
        if let Some(available) = available {
            text = text.arg("available_quantity", available);
        }

        let confirm_token = CatalogToken {
            level: LEVEL_PURCHASE,
            confirmed: true,
            ..*token
        };
        // Cancel intentionally resets to the subcategory list with only the
        // category kept: quantity and price are dropped, unlike back which
        // preserves every field.
        let cancel_token = CatalogToken {
            level: LEVEL_SUBCATEGORIES,
            category_id: token.category_id,
            ..CatalogToken::root()
        };

        let mut screen = Screen::new(text);
        screen.rows.push(vec![
            Button::text(
                TextSpec::new(Area::Common, "confirm"),
                confirm_token.encode()?,
            ),
            Button::text(TextSpec::new(Area::Common, "cancel"), cancel_token.encode()?),
        ]);
        let back_token = CatalogToken {
            level: LEVEL_CONFIRM,
            confirmed: false,
            ..*token
        };
        self.push_back(&mut screen, &back_token)?;
        Ok(screen)
    }

    fn push_pagination(
        &self,
        screen: &mut Screen,
        token: &CatalogToken,
        page: u32,
        max: u32,
    ) -> StoreResult<()> {
        if max == 0 {
            return Ok(());
        }
        let mut row = Vec::new();
        if page > 0 {
            let prev = CatalogToken {
                page: page - 1,
                ..*token
            };
            row.push(Button::text(
                TextSpec::new(Area::Common, "prev_page"),
                prev.encode()?,
            ));
        }
        row.push(Button::literal(
            format!("{}/{}", page + 1, max + 1),
            NOOP_TOKEN,
        ));
        if page < max {
            let next = CatalogToken {
                page: page + 1,
                ..*token
            };
            row.push(Button::text(
                TextSpec::new(Area::Common, "next_page"),
                next.encode()?,
            ));
        }
        screen.rows.push(row);
        Ok(())
    }

    fn push_back(&self, screen: &mut Screen, token: &CatalogToken) -> StoreResult<()> {
        let back = token.back()?;
        screen.rows.push(vec![Button::text(
            TextSpec::new(Area::Common, "back"),
            back.encode()?,
        )]);
        Ok(())
    }
}
