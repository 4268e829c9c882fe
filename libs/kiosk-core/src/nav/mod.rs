pub mod machine;
pub mod token;

pub use machine::{Button, Label, Navigator, Screen, Session};
pub use token::{CatalogToken, ProfileToken, MAX_TOKEN_BYTES};
