use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::nsrdb_service::NsrdbClient;

/// Immutable per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub nsrdb: NsrdbClient,
}

impl AppState {
    pub fn new(config: Config) -> AppResult<Self> {
        let nsrdb = NsrdbClient::new(&config.nsrdb)?;
        Ok(Self {
            config: Arc::new(config),
            nsrdb,
        })
    }
}
