//! Bot configuration: defaults, then an optional TOML file, then `STARAPP_*` environment
//! variables (nested keys use `__`, e.g. `STARAPP_NOTIFY__WEBHOOK_URL`). A bare `PORT`
//! variable overrides the listen port, as hosting platforms set it.

use crate::cards::{CardStyle, IconSet};
use crate::notify::NotifyConfig;
use crate::store::{JsonFileStore, OutcomeStore, SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CONFIG_PATH: &str = "config/starapp.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Sqlite,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub storage: StorageKind,
    pub database_path: PathBuf,
    pub json_path: PathBuf,
    /// Target of the "Go to Star App" button.
    pub app_url: String,
    pub quote: String,
    #[serde(default)]
    pub icons: IconSet,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl BotConfig {
    /// Load from `STARAPP_CONFIG` (or `config/starapp.toml`) plus the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("STARAPP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Same as [`BotConfig::load`] with an explicit file path; a missing file is skipped.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let style = CardStyle::default();
        let builder = config::Config::builder()
            .set_default("app_name", "StarApp Bot")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080_i64)?
            .set_default("storage", "sqlite")?
            .set_default("database_path", "./data/starapp.db")?
            .set_default("json_path", "./data/starapp.json")?
            .set_default("app_url", style.app_url)?
            .set_default("quote", style.quote)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse::<i64>().ok());

        let built = builder
            .add_source(
                config::Environment::with_prefix("STARAPP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("port", port)?
            .build()?;

        built.try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn card_style(&self) -> CardStyle {
        CardStyle {
            app_url: self.app_url.clone(),
            quote: self.quote.clone(),
            icons: self.icons.clone(),
        }
    }

    /// Open the configured backend. Called once at startup; the handle is shared.
    pub fn open_store(&self) -> Result<Arc<dyn OutcomeStore>, StoreError> {
        let store: Arc<dyn OutcomeStore> = match self.storage {
            StorageKind::Sqlite => {
                ensure_parent(&self.database_path)?;
                Arc::new(SqliteStore::open(&self.database_path)?)
            }
            StorageKind::Json => {
                ensure_parent(&self.json_path)?;
                Arc::new(JsonFileStore::open(&self.json_path)?)
            }
        };
        tracing::info!(storage = ?self.storage, "outcome store opened");
        Ok(store)
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(std::fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_and_nested_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("starapp.toml");
        let mut f = std::fs::File::create(&path).expect("create");
        writeln!(
            f,
            r#"
storage = "json"
json_path = "/tmp/bot.json"
app_url = "https://star.example.org"

[icons]
happy = "https://cdn.example.org/happy.png"

[notify]
enabled = true
morning_hour = 8
"#
        )
        .expect("write");

        let cfg = BotConfig::load_from(&path).expect("load");
        assert_eq!(cfg.storage, StorageKind::Json);
        assert_eq!(cfg.json_path, PathBuf::from("/tmp/bot.json"));
        assert_eq!(cfg.app_url, "https://star.example.org");
        assert_eq!(cfg.icons.happy, "https://cdn.example.org/happy.png");
        assert_eq!(cfg.icons.sad, IconSet::default().sad);
        assert!(cfg.notify.enabled);
        assert_eq!(cfg.notify.morning_hour, 8);
        assert_eq!(cfg.notify.evening_hour, 17);
        assert_eq!(cfg.card_style().app_url, "https://star.example.org");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = BotConfig::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(cfg.app_name, "StarApp Bot");
        assert_eq!(cfg.storage, StorageKind::Sqlite);
        assert!(!cfg.notify.enabled);
    }

    #[test]
    fn open_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cfg = BotConfig::load_from(&dir.path().join("absent.toml")).expect("load");
        cfg.storage = StorageKind::Json;
        cfg.json_path = dir.path().join("nested/data/bot.json");
        let store = cfg.open_store().expect("open");
        assert!(!store.list_outcomes(1).expect("outcomes").is_empty());
        assert!(cfg.json_path.exists());
    }

    #[test]
    fn printable_as_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = BotConfig::load_from(&dir.path().join("absent.toml")).expect("load");
        let text = cfg.to_toml().expect("toml");
        assert!(text.contains("storage = \"sqlite\""));
        assert!(text.contains("[notify]"));
    }
}
