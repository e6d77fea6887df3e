//! Push notification collaborator (§4.3.1). Posts a form body to a
//! fixed push service; errors are always logged and discarded, never
//! propagated to the caller, matching §7's notification propagation
//! policy.

const DEFAULT_PUSH_URL: &str = "https://push.i-i.me";

pub struct PushNotifier {
  client: reqwest::Client,
  base_url: String,
}

impl PushNotifier {
  pub fn new(client: reqwest::Client) -> Self {
    Self { client, base_url: DEFAULT_PUSH_URL.to_string() }
  }

  pub async fn send(&self, push_key: &str, title: &str, content: &str) -> anyhow::Result<()> {
    if push_key.is_empty() {
      anyhow::bail!("push key is empty");
    }
    let response = self
      .client
      .post(&self.base_url)
      .form(&[("push_key", push_key), ("title", title), ("content", content)])
      .send()
      .await?
      .error_for_status()?;
    let body = response.text().await?;
    if body != "success" {
      anyhow::bail!("push service returned: {body}");
    }
    Ok(())
  }
}
