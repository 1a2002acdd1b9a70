use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::PlateEventPayload;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote collector boundary. An `Ok` return is an acknowledged delivery.
pub trait Collector: Send {
    fn push(&mut self, event: &PlateEventPayload) -> Result<()>;
}

/// HTTP collector client POSTing JSON to `<base_url>/push`.
///
/// Success is any 2xx status; non-2xx and transport errors are returned
/// to the retry loop in the delivery pipeline.
pub struct HttpCollector {
    push_url: String,
    agent: ureq::Agent,
}

impl HttpCollector {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parse collector base url")?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "collector base url must be http(s), got {}",
                parsed.scheme()
            ));
        }
        let push_url = format!("{}/push", base_url.trim_end_matches('/'));
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
        Ok(Self { push_url, agent })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }
}

impl Collector for HttpCollector {
    fn push(&mut self, event: &PlateEventPayload) -> Result<()> {
        let body = serde_json::to_string(event).context("serialize event payload")?;
        match self
            .agent
            .post(&self.push_url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => {
                Err(anyhow!("collector returned status {}", code))
            }
            Err(e) => Err(anyhow!("collector transport error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_url_appends_endpoint() {
        let collector = HttpCollector::new("http://collector.example:8093").expect("client");
        assert_eq!(collector.push_url(), "http://collector.example:8093/push");

        let collector = HttpCollector::new("http://collector.example:8093/").expect("client");
        assert_eq!(collector.push_url(), "http://collector.example:8093/push");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(HttpCollector::new("ftp://collector.example").is_err());
        assert!(HttpCollector::new("not a url").is_err());
    }
}
