//! Engine configuration and the persistence mode it carries
use anyhow::Context;
use parking_lot::RwLock;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Shared server-side store.
    #[default]
    Primary,
    /// Single-process store used once the primary has denied access.
    Local,
}

impl std::str::FromStr for PersistenceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(PersistenceMode::Primary),
            "local" => Ok(PersistenceMode::Local),
            other => Err(anyhow::anyhow!("unknown persistence mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    pub persistence_mode: PersistenceMode,
    pub blob_url_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("leads.db"),
            persistence_mode: PersistenceMode::Primary,
            blob_url_prefix: "blob://".to_string(),
        }
    }
}

impl EngineConfig {
    /// Reads `LEADS_DB_PATH`, `LEADS_PERSISTENCE_MODE` and `LEADS_BLOB_URL_PREFIX`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup("LEADS_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(mode) = lookup("LEADS_PERSISTENCE_MODE") {
            config.persistence_mode = mode
                .parse()
                .context("LEADS_PERSISTENCE_MODE must be `primary` or `local`")?;
        }
        if let Some(prefix) = lookup("LEADS_BLOB_URL_PREFIX") {
            config.blob_url_prefix = prefix;
        }
        Ok(config)
    }

    pub fn persistence_context(&self) -> PersistenceContext {
        PersistenceContext::new(self.persistence_mode)
    }
}

/// Holds the session's persistence mode. The only transition is the one-way
/// flip from `Primary` to `Local`.
#[derive(Debug, Default)]
pub struct PersistenceContext {
    mode: RwLock<PersistenceMode>,
}

impl PersistenceContext {
    pub fn new(mode: PersistenceMode) -> Self {
        Self {
            mode: RwLock::new(mode),
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        *self.mode.read()
    }

    pub fn is_degraded(&self) -> bool {
        self.mode() == PersistenceMode::Local
    }

    /// Switch to local persistence. Returns `true` only for the call that
    /// performed the flip.
    pub fn degrade(&self) -> bool {
        let mut mode = self.mode.write();
        if *mode == PersistenceMode::Local {
            return false;
        }
        *mode = PersistenceMode::Local;
        warn!("primary store denied access, switching to local persistence for this session");
        true
    }
}
