use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::inbox::IdScheme;
use crate::ledger::DEFAULT_KEY;
use crate::review::DEFAULT_FADE_DELAY;

const SETTINGS_FILE: &str = "link_triage.toml";
const ENV_PREFIX: &str = "LINK_TRIAGE";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite file holding the ledger.
    pub database: PathBuf,
    pub storage_key: String,
    pub export_dir: PathBuf,
    pub fade_delay_secs: u64,
    pub id_scheme: IdScheme,
}

impl Settings {
    /// Defaults, then `link_triage.toml` if present, then `LINK_TRIAGE_*`.
    pub fn load() -> Result<Self> {
        Self::build(Some(Path::new(SETTINGS_FILE)), Environment::with_prefix(ENV_PREFIX))
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database", "data/link_triage.sqlite")?
            .set_default("storage_key", DEFAULT_KEY)?
            .set_default("export_dir", ".")?
            .set_default("fade_delay_secs", DEFAULT_FADE_DELAY.as_secs())?
            .set_default("id_scheme", "content")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn fade_delay(&self) -> Duration {
        Duration::from_secs(self.fade_delay_secs)
    }
}
