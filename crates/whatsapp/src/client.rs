//! Cloud API outbound client.

use {
    anyhow::Context,
    async_trait::async_trait,
    serde_json::json,
    tracing::debug,
};

use confab_common::OutboundSender;

/// Sends messages through `POST {api_base}/{phone_number_id}/messages`.
pub struct CloudApiClient {
    http: reqwest::Client,
    api_base: String,
    phone_number_id: String,
    access_token: String,
}

impl CloudApiClient {
    pub fn new(api_base: &str, phone_number_id: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl OutboundSender for CloudApiClient {
    async fn send_text(&self, user_id: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": user_id,
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .context("cloud api request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("cloud api returned {status}: {detail}");
        }

        debug!(user_id, "outbound text delivered");
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_text_posts_to_the_messages_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/1555/messages")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"wamid.OUT"}]}"#)
            .create_async()
            .await;

        let client = CloudApiClient::new(&server.url(), "1555", "token-1");
        client.send_text("263770000000", "hello").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_surfaces_with_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/1555/messages")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad token"}}"#)
            .create_async()
            .await;

        let client = CloudApiClient::new(&server.url(), "1555", "expired");
        let err = client.send_text("263770000000", "hello").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
