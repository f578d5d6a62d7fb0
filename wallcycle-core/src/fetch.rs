use std::io::Read;
use std::time::Duration;

pub const USER_AGENT: &str = "WallCycle/1.0";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Service trait for fetching image bytes from a source URL.
///
/// Any non-2xx status or transport error is an `Err` carrying a short
/// human-readable reason.
pub trait HttpFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, String>;
}

/// Blocking fetcher backed by attohttpc.
pub struct AttoFetcher {
    timeout: Duration,
    user_agent: String,
}

impl AttoFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        Self {
            timeout,
            user_agent: user_agent.to_string(),
        }
    }
}

impl Default for AttoFetcher {
    fn default() -> Self {
        Self::new(FETCH_TIMEOUT, USER_AGENT)
    }
}

impl HttpFetcher for AttoFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, String> {
        let response = attohttpc::get(url)
            .header(attohttpc::header::USER_AGENT, self.user_agent.as_str())
            .timeout(self.timeout)
            .send()
            .map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }

        let (_, _, reader) = response.split();
        Ok(Box::new(reader))
    }
}
