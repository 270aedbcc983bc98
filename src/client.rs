use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

#[derive(Serialize)]
struct AskRequest {
    query: String,
}

#[derive(Deserialize)]
struct AskResponse {
    response: String,
}

/// HTTP client for the answering service.
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    base_url: String,
}

impl AskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a query and return the service's answer text.
    pub async fn ask(&self, query: &str) -> Result<String> {
        let url = format!("{}/ask", self.base_url);

        let request = AskRequest {
            query: query.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "ask request failed with status: {}",
                response.status()
            ));
        }

        let body: AskResponse = response.json().await?;
        Ok(body.response)
    }
}
