//! Localization table: a JSON file with `user` / `admin` / `common` areas,
//! loaded once into memory and replaced only on an explicit reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    User,
    Admin,
    Common,
}

/// Semantic text reference produced by the core: an area + key into the
/// localization table plus placeholder values. The core never emits raw
/// display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpec {
    pub area: Area,
    pub key: &'static str,
    pub args: Vec<(&'static str, String)>,
}

impl TextSpec {
    pub fn new(area: Area, key: &'static str) -> Self {
        Self {
            area,
            key,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, name: &'static str, value: impl ToString) -> Self {
        self.args.push((name, value.to_string()));
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct Tables {
    #[serde(default)]
    user: HashMap<String, String>,
    #[serde(default)]
    admin: HashMap<String, String>,
    #[serde(default)]
    common: HashMap<String, String>,
}

#[derive(Debug)]
pub struct Localizer {
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Localizer {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read localization file {}", path.display()))?;
        let tables: Tables = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse localization file {}", path.display()))?;
        Ok(Self {
            path: Some(path),
            tables: RwLock::new(tables),
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let tables: Tables = serde_json::from_str(raw).context("Failed to parse localization")?;
        Ok(Self {
            path: None,
            tables: RwLock::new(tables),
        })
    }

    /// Re-read the backing file. The old table stays in place on failure.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read localization file {}", path.display()))?;
        let fresh: Tables = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse localization file {}", path.display()))?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| anyhow::anyhow!("localization table lock poisoned"))?;
        *tables = fresh;
        Ok(())
    }

    /// Template for `(area, key)`. Missing keys render as the key itself so a
    /// hole in the l10n file degrades visibly instead of panicking.
    pub fn get(&self, area: Area, key: &str) -> String {
        let tables = match self.tables.read() {
            Ok(t) => t,
            Err(_) => return key.to_string(),
        };
        let table = match area {
            Area::User => &tables.user,
            Area::Admin => &tables.admin,
            Area::Common => &tables.common,
        };
        match table.get(key) {
            Some(text) => text.clone(),
            None => {
                warn!("Missing localization key {:?}/{}", area, key);
                key.to_string()
            }
        }
    }

    /// Resolve a [`TextSpec`]: look the template up, substitute `{name}`
    /// placeholders, then fill `{currency}` from the common area.
    pub fn render(&self, spec: &TextSpec) -> String {
        let mut text = self.get(spec.area, spec.key);
        for (name, value) in &spec.args {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        if text.contains("{currency}") {
            text = text.replace("{currency}", &self.get(Area::Common, "currency"));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::{Area, Localizer, TextSpec};

    const SAMPLE: &str = r#"{
        "user": { "greeting": "Hello, {name}!", "price_line": "{currency}{price}" },
        "admin": { "menu": "Admin menu" },
        "common": { "currency": "$", "confirm": "Confirm" }
    }"#;

    #[test]
    fn looks_up_by_area() {
        let l10n = Localizer::from_json_str(SAMPLE).unwrap();
        assert_eq!(l10n.get(Area::Admin, "menu"), "Admin menu");
        assert_eq!(l10n.get(Area::Common, "confirm"), "Confirm");
    }

    #[test]
    fn substitutes_placeholders_and_currency() {
        let l10n = Localizer::from_json_str(SAMPLE).unwrap();
        let spec = TextSpec::new(Area::User, "greeting").arg("name", "Ada");
        assert_eq!(l10n.render(&spec), "Hello, Ada!");
        let spec = TextSpec::new(Area::User, "price_line").arg("price", "19.99");
        assert_eq!(l10n.render(&spec), "$19.99");
    }

    #[test]
    fn missing_key_renders_as_key() {
        let l10n = Localizer::from_json_str(SAMPLE).unwrap();
        assert_eq!(l10n.get(Area::User, "nope"), "nope");
    }
}
