use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = "fabric-server-updater/0.1.0";

/// Metadata/registry requests are small; 20s mirrors what operators expect from a CLI.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(20);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .timeout(timeout)
        .build()
}
