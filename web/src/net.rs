use shinkei_core::{CatalogError, Fetch, Result};

/// [`Fetch`] backed by the browser's fetch API.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BrowserFetch;

impl Fetch for BrowserFetch {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = gloo::net::http::Request::get(url)
            .send()
            .await
            .map_err(|err| CatalogError::Network(err.to_string()))?;
        if !response.ok() {
            return Err(CatalogError::Network(format!(
                "http status {} from {url}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| CatalogError::Parse(err.to_string()))
    }
}
