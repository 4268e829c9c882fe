pub mod catalog;
pub mod error;
pub mod l10n;
pub mod memory;
pub mod models;
pub mod nav;
pub mod pagination;

pub use error::{StoreError, StoreResult};
