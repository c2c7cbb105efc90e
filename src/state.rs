use crate::config::ProxyConfig;
use crate::upstream::GoodxUpstream;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub upstream: GoodxUpstream,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let upstream = GoodxUpstream::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
        })
    }
}
