use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use url::Url;

use crate::domain::post::RawPost;
use crate::error::{Error, Result};
use crate::source::{TimelineQuery, TimelineSource};

const USER_TIMELINE_PATH: &str = "1.1/statuses/user_timeline.json";

/// Blocking client for the v1.1 `user_timeline` endpoint using app-only auth.
pub struct TwitterClient {
    http: Client,
    endpoint: Url,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(api_base: &str, bearer_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint_url(api_base, USER_TIMELINE_PATH)?,
            bearer_token: bearer_token.into(),
        })
    }
}

/// Resolve `path` against the configured API base, keeping any base path prefix.
pub fn endpoint_url(api_base: &str, path: &str) -> Result<Url> {
    let mut base = api_base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .and_then(|u| u.join(path))
        .map_err(|e| Error::config(format!("invalid api_base '{api_base}': {e}")))
}

fn query_params(q: &TimelineQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("screen_name", q.handle.clone()),
        ("count", q.count.to_string()),
        ("exclude_replies", q.exclude_replies.to_string()),
        ("include_rts", q.include_retweets.to_string()),
        ("trim_user", q.trim_user.to_string()),
        ("tweet_mode", "extended".to_string()),
    ];
    if let Some(since) = q.since_id {
        params.push(("since_id", since.to_string()));
    }
    if let Some(max) = q.max_id {
        params.push(("max_id", max.to_string()));
    }
    params
}

impl TimelineSource for TwitterClient {
    fn fetch_timeline(&self, query: &TimelineQuery) -> Result<Vec<RawPost>> {
        let params = query_params(query);
        debug!("GET {} {:?}", self.endpoint, params);

        let resp = self
            .http
            .get(self.endpoint.clone())
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .map_err(|e| Error::transient(format!("timeline request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = resp
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok());
            return Err(Error::RateLimited { reset_at });
        }
        if status.is_server_error() {
            return Err(Error::transient(format!("timeline returned {status}")));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::unavailable(format!(
                "timeline returned {status}: {}",
                body.trim()
            )));
        }

        resp.json::<Vec<RawPost>>()
            .map_err(|e| Error::unavailable(format!("malformed timeline response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_prefix() {
        let url = endpoint_url("http://127.0.0.1:9000/proxy", USER_TIMELINE_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/proxy/1.1/statuses/user_timeline.json"
        );
        let url = endpoint_url("https://api.twitter.com", USER_TIMELINE_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.twitter.com/1.1/statuses/user_timeline.json"
        );
    }

    #[test]
    fn bad_base_is_configuration_error() {
        assert!(matches!(
            endpoint_url("not a url", USER_TIMELINE_PATH),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn bounds_only_sent_when_present() {
        let mut q = TimelineQuery {
            handle: "alice".into(),
            count: 200,
            since_id: None,
            max_id: None,
            exclude_replies: true,
            include_retweets: false,
            trim_user: true,
        };
        let keys: Vec<_> = query_params(&q).into_iter().map(|(k, _)| k).collect();
        assert!(!keys.contains(&"since_id") && !keys.contains(&"max_id"));

        q.max_id = Some(99);
        let params = query_params(&q);
        assert!(params.contains(&("max_id", "99".to_string())));
        assert!(params.contains(&("include_rts", "false".to_string())));
    }
}
