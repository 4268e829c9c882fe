use std::sync::Arc;

use kiosk_core::l10n::Localizer;
use kiosk_core::nav::Navigator;
use kiosk_db::repositories::BuyRepository;

use crate::services::restock_service::RestockService;

#[derive(Clone)]
pub struct AppState {
    pub navigator: Arc<Navigator>,
    pub l10n: Arc<Localizer>,
    pub buys: BuyRepository,
    pub restock: RestockService,
    pub admin_id: i64,
}

impl AppState {
    pub fn is_admin(&self, tg_id: i64) -> bool {
        self.admin_id != 0 && tg_id == self.admin_id
    }
}
