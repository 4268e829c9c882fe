//! Callback token codec.
//!
//! All navigation state lives in the button payload, not in server memory: a
//! token is encoded into every inline button and decoded on the next
//! interaction. Each screen kind carries its own versioned tag (`c1`, `p1`)
//! so tokens can never be cross-decoded, and the format must stay stable
//! across restarts; changing it invalidates every button already rendered.

use crate::error::{StoreError, StoreResult};

/// Telegram caps callback payloads at 64 bytes.
pub const MAX_TOKEN_BYTES: usize = 64;

/// Upper bound on any price a token may carry, in minor units. Payloads are
/// client-supplied, so magnitudes beyond anything the catalog could produce
/// are rejected at decode rather than trusted downstream.
pub const MAX_PRICE_MINOR: i64 = 1_000_000_000_000;

const CATALOG_TAG: &str = "c1";
const PROFILE_TAG: &str = "p1";
const SEP: char = ':';

/// Navigation state for the catalog purchase flow.
///
/// Immutable value type: every transition builds a new token. `level` is the
/// sole dispatch key; the remaining fields are payload meaningful only at
/// specific levels. `-1` marks an unset id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogToken {
    pub level: u8,
    pub category_id: i64,
    pub subcategory_id: i64,
    /// Unit price in minor units; populated when a subcategory is selected.
    pub unit_price: i64,
    pub quantity: u16,
    pub total_price: i64,
    pub confirmed: bool,
    pub page: u32,
}

impl CatalogToken {
    /// Entry point of the flow: the category list.
    pub fn root() -> Self {
        Self {
            level: 0,
            category_id: -1,
            subcategory_id: -1,
            unit_price: 0,
            quantity: 0,
            total_price: 0,
            confirmed: false,
            page: 0,
        }
    }

    pub fn matches(data: &str) -> bool {
        data.split(SEP).next() == Some(CATALOG_TAG)
    }

    pub fn encode(&self) -> StoreResult<String> {
        self.validate()?;
        let token = format!(
            "{CATALOG_TAG}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.level,
            self.category_id,
            self.subcategory_id,
            self.unit_price,
            self.quantity,
            self.total_price,
            self.confirmed as u8,
            self.page,
        );
        if token.len() > MAX_TOKEN_BYTES {
            return Err(StoreError::MalformedToken(format!(
                "encoded token exceeds {MAX_TOKEN_BYTES} bytes"
            )));
        }
        Ok(token)
    }

    pub fn decode(data: &str) -> StoreResult<Self> {
        let malformed = |why: &str| StoreError::MalformedToken(format!("{why}: {data}"));
        // The byte cap is part of the format: decode accepts exactly what
        // encode can produce.
        if data.len() > MAX_TOKEN_BYTES {
            return Err(malformed("over length cap"));
        }
        let mut parts = data.split(SEP);
        if parts.next() != Some(CATALOG_TAG) {
            return Err(malformed("wrong tag"));
        }
        let fields: Vec<&str> = parts.collect();
        if fields.len() != 8 {
            return Err(malformed("wrong field count"));
        }
        let token = Self {
            level: fields[0].parse().map_err(|_| malformed("bad level"))?,
            category_id: fields[1].parse().map_err(|_| malformed("bad category"))?,
            subcategory_id: fields[2]
                .parse()
                .map_err(|_| malformed("bad subcategory"))?,
            unit_price: fields[3].parse().map_err(|_| malformed("bad price"))?,
            quantity: fields[4].parse().map_err(|_| malformed("bad quantity"))?,
            total_price: fields[5].parse().map_err(|_| malformed("bad total"))?,
            confirmed: match fields[6] {
                "0" => false,
                "1" => true,
                _ => return Err(malformed("bad confirmation flag")),
            },
            page: fields[7].parse().map_err(|_| malformed("bad page"))?,
        };
        token.validate()?;
        Ok(token)
    }

    /// The universal back transition: one level up, every other field kept
    /// verbatim. Undefined at the root; callers guard before rendering a
    /// back button there.
    pub fn back(&self) -> StoreResult<Self> {
        if self.level == 0 {
            return Err(StoreError::Precondition("cannot go back from level 0"));
        }
        Ok(Self {
            level: self.level - 1,
            ..*self
        })
    }

    fn validate(&self) -> StoreResult<()> {
        if self.category_id < -1 || self.subcategory_id < -1 {
            return Err(StoreError::MalformedToken("id below -1".into()));
        }
        if self.unit_price < 0 || self.total_price < 0 {
            return Err(StoreError::MalformedToken("negative price".into()));
        }
        if self.unit_price > MAX_PRICE_MINOR || self.total_price > MAX_PRICE_MINOR {
            return Err(StoreError::MalformedToken("price above ceiling".into()));
        }
        Ok(())
    }
}

/// Navigation state for the profile flow (purchase history and friends).
/// Deliberately a separate kind with its own tag: a profile button can never
/// be fed to the catalog handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileToken {
    pub level: u8,
    pub action: String,
    pub arg: i64,
    pub page: u32,
}

impl ProfileToken {
    pub fn new(level: u8, action: impl Into<String>) -> Self {
        Self {
            level,
            action: action.into(),
            arg: -1,
            page: 0,
        }
    }

    pub fn matches(data: &str) -> bool {
        data.split(SEP).next() == Some(PROFILE_TAG)
    }

    pub fn encode(&self) -> StoreResult<String> {
        if self.action.contains(SEP) {
            return Err(StoreError::MalformedToken(
                "action must not contain the separator".into(),
            ));
        }
        let token = format!(
            "{PROFILE_TAG}:{}:{}:{}:{}",
            self.level, self.action, self.arg, self.page
        );
        if token.len() > MAX_TOKEN_BYTES {
            return Err(StoreError::MalformedToken(format!(
                "encoded token exceeds {MAX_TOKEN_BYTES} bytes"
            )));
        }
        Ok(token)
    }

    pub fn decode(data: &str) -> StoreResult<Self> {
        let malformed = |why: &str| StoreError::MalformedToken(format!("{why}: {data}"));
        if data.len() > MAX_TOKEN_BYTES {
            return Err(malformed("over length cap"));
        }
        let mut parts = data.split(SEP);
        if parts.next() != Some(PROFILE_TAG) {
            return Err(malformed("wrong tag"));
        }
        let fields: Vec<&str> = parts.collect();
        if fields.len() != 4 {
            return Err(malformed("wrong field count"));
        }
        Ok(Self {
            level: fields[0].parse().map_err(|_| malformed("bad level"))?,
            action: fields[1].to_string(),
            arg: fields[2].parse().map_err(|_| malformed("bad arg"))?,
            page: fields[3].parse().map_err(|_| malformed("bad page"))?,
        })
    }

    pub fn back(&self) -> StoreResult<Self> {
        if self.level == 0 {
            return Err(StoreError::Precondition("cannot go back from level 0"));
        }
        Ok(Self {
            level: self.level - 1,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CatalogToken {
        CatalogToken {
            level: 3,
            category_id: 12,
            subcategory_id: 345,
            unit_price: 1050,
            quantity: 7,
            total_price: 7350,
            confirmed: true,
            page: 2,
        }
    }

    #[test]
    fn round_trips_all_field_combinations() {
        for level in [0u8, 1, 2, 3, 4] {
            for (cat, sub) in [(-1i64, -1i64), (0, 0), (7, 31), (9999, 12345)] {
                for confirmed in [false, true] {
                    let token = CatalogToken {
                        level,
                        category_id: cat,
                        subcategory_id: sub,
                        unit_price: 1999,
                        quantity: 10,
                        total_price: 19990,
                        confirmed,
                        page: 3,
                    };
                    let encoded = token.encode().unwrap();
                    assert_eq!(CatalogToken::decode(&encoded).unwrap(), token);
                }
            }
        }
    }

    #[test]
    fn stays_within_payload_cap() {
        let token = CatalogToken {
            level: 255,
            category_id: 99_999_999,
            subcategory_id: 99_999_999,
            unit_price: 9_999_999,
            quantity: u16::MAX,
            total_price: 99_999_999,
            confirmed: true,
            page: 9999,
        };
        assert!(token.encode().unwrap().len() <= MAX_TOKEN_BYTES);
    }

    #[test]
    fn rejects_foreign_and_garbled_payloads() {
        let encoded = sample().encode().unwrap();
        assert!(matches!(
            CatalogToken::decode(&encoded.replacen("c1", "p1", 1)),
            Err(StoreError::MalformedToken(_))
        ));
        assert!(matches!(
            CatalogToken::decode("c1:1:2"),
            Err(StoreError::MalformedToken(_))
        ));
        assert!(matches!(
            CatalogToken::decode("c1:x:2:3:4:5:6:0:0"),
            Err(StoreError::MalformedToken(_))
        ));
        // Confirmation flag only accepts 0/1.
        assert!(matches!(
            CatalogToken::decode("c1:3:1:2:10:1:10:2:0"),
            Err(StoreError::MalformedToken(_))
        ));
        // Negative prices fail range validation.
        assert!(matches!(
            CatalogToken::decode("c1:3:1:2:-10:1:10:0:0"),
            Err(StoreError::MalformedToken(_))
        ));
        assert!(matches!(
            CatalogToken::decode(""),
            Err(StoreError::MalformedToken(_))
        ));
    }

    #[test]
    fn rejects_prices_above_the_ceiling() {
        // Decode-side: a forged payload with a near-i64::MAX price must not
        // make it into the flow.
        assert!(matches!(
            CatalogToken::decode("c1:2:1:1:922337203685477581:0:0:0:0"),
            Err(StoreError::MalformedToken(_))
        ));
        assert!(matches!(
            CatalogToken::decode("c1:3:1:1:100:2:922337203685477581:1:0"),
            Err(StoreError::MalformedToken(_))
        ));
        // Encode-side: the same bound holds.
        let token = CatalogToken {
            unit_price: MAX_PRICE_MINOR + 1,
            ..sample()
        };
        assert!(token.encode().is_err());
        // The ceiling itself is still a valid price.
        let token = CatalogToken {
            unit_price: MAX_PRICE_MINOR,
            total_price: MAX_PRICE_MINOR,
            ..sample()
        };
        assert_eq!(
            CatalogToken::decode(&token.encode().unwrap()).unwrap(),
            token
        );
    }

    #[test]
    fn rejects_over_long_payloads() {
        // Every field parses on its own; only the total length is wrong.
        let long = "c1:4:123456789012345678:123456789012345678:999999999999:10:999999999999:1:5";
        assert!(long.len() > MAX_TOKEN_BYTES);
        assert!(matches!(
            CatalogToken::decode(long),
            Err(StoreError::MalformedToken(_))
        ));
        let long = format!("p1:1:{}:1:0", "a".repeat(MAX_TOKEN_BYTES));
        assert!(matches!(
            ProfileToken::decode(&long),
            Err(StoreError::MalformedToken(_))
        ));
    }

    #[test]
    fn profile_tokens_cannot_cross_decode() {
        let profile = ProfileToken::new(1, "history").encode().unwrap();
        assert!(CatalogToken::decode(&profile).is_err());
        let catalog = sample().encode().unwrap();
        assert!(ProfileToken::decode(&catalog).is_err());
        assert!(ProfileToken::matches(&profile));
        assert!(!ProfileToken::matches(&catalog));
    }

    #[test]
    fn back_decrements_level_and_keeps_payload() {
        let token = sample();
        let back = token.back().unwrap();
        assert_eq!(back.level, token.level - 1);
        assert_eq!(
            CatalogToken {
                level: token.level,
                ..back
            },
            token
        );
    }

    #[test]
    fn back_is_rejected_at_root() {
        assert!(matches!(
            CatalogToken::root().back(),
            Err(StoreError::Precondition(_))
        ));
        assert!(ProfileToken::new(0, "menu").back().is_err());
    }

    #[test]
    fn profile_round_trip() {
        let token = ProfileToken {
            level: 2,
            action: "history".into(),
            arg: 42,
            page: 5,
        };
        let encoded = token.encode().unwrap();
        assert_eq!(ProfileToken::decode(&encoded).unwrap(), token);
    }

    #[test]
    fn profile_action_must_not_contain_separator() {
        assert!(ProfileToken::new(1, "a:b").encode().is_err());
    }
}
