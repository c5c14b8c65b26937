//! Flarum JSON:API client: login, discussion listing, posts and replies.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use engine::{Discussion, Document, FetchError, ForumSource, ReplyError, ReplySink};
use reqwest::{header, Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ListDocument {
    data: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct DiscussionDocument {
    #[serde(default)]
    included: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    attributes: Value,
}

pub struct FlarumClient {
    http: Client,
    base: Url,
    token: Option<String>,
    discussion_limit: usize,
    signature: String,
}

impl FlarumClient {
    pub fn new(base: Url, timeout: Duration, discussion_limit: usize, signature: impl Into<String>) -> Result<Self> {
        let signature = signature.into();
        if signature.trim().is_empty() {
            bail!("reply signature must not be blank");
        }
        let http = Client::builder()
            .user_agent(concat!("forum-reply-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self { http, base, token: None, discussion_limit, signature })
    }

    /// Exchange credentials for an API token used on every later request.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint("api/token")?;
        let resp = self
            .http
            .post(url)
            .json(&json!({ "identification": username, "password": password }))
            .send()
            .await
            .context("send login request")?
            .error_for_status()
            .context("login rejected")?;
        let body: TokenResponse = resp.json().await.context("decode login response")?;
        self.token = Some(body.token);
        tracing::info!(user = username, "logged in");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // keep a forum hosted under a sub-path, e.g. https://host/forum/
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(path).with_context(|| format!("build url for {path}"))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header(header::AUTHORIZATION, format!("Token {token}")),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .authorized(self.http.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        Ok(resp.json().await.with_context(|| format!("decode {url}"))?)
    }

    async fn list_discussions(&self) -> Result<Vec<Discussion>> {
        let mut url = self.endpoint("api/discussions")?;
        url.query_pairs_mut().append_pair("page[limit]", &self.discussion_limit.to_string());
        let doc: ListDocument = self.get_json(url).await?;
        Ok(discussions_from(doc.data))
    }

    async fn discussion_posts(&self, discussion_id: &str) -> Result<Vec<Document>> {
        let url = self.endpoint(&format!("api/discussions/{discussion_id}"))?;
        let doc: DiscussionDocument = self.get_json(url).await?;
        Ok(posts_from(discussion_id, doc.included))
    }

    async fn create_post(&self, discussion_id: &str, text: &str) -> Result<()> {
        let url = self.endpoint("api/posts")?;
        let body = reply_payload(discussion_id, &reply_content(text, &self.signature));
        self.authorized(self.http.post(url))
            .header(header::CONTENT_TYPE, "application/vnd.api+json")
            .body(body.to_string())
            .send()
            .await
            .context("send reply")?
            .error_for_status()
            .map_err(|e| anyhow!("reply rejected: {e}"))?;
        Ok(())
    }
}

#[async_trait]
impl ForumSource for FlarumClient {
    async fn fetch_recent_discussions(&self) -> Result<Vec<Discussion>, FetchError> {
        self.list_discussions().await.map_err(FetchError::new)
    }

    async fn fetch_posts(&self, discussion_id: &str) -> Result<Vec<Document>, FetchError> {
        self.discussion_posts(discussion_id).await.map_err(FetchError::new)
    }
}

#[async_trait]
impl ReplySink for FlarumClient {
    async fn emit_reply(&self, discussion_id: &str, text: &str) -> Result<(), ReplyError> {
        self.create_post(discussion_id, text).await.map_err(ReplyError::new)
    }
}

/// Logs what would have been posted.
pub struct DryRunSink;

#[async_trait]
impl ReplySink for DryRunSink {
    async fn emit_reply(&self, discussion_id: &str, text: &str) -> Result<(), ReplyError> {
        tracing::info!(discussion = discussion_id, reply = text, "dry run, not posting");
        Ok(())
    }
}

fn discussions_from(data: Vec<Resource>) -> Vec<Discussion> {
    data.into_iter()
        .filter(|r| r.kind == "discussions")
        .map(|r| Discussion {
            title: r.attributes.get("title").and_then(Value::as_str).map(str::to_string),
            id: r.id,
        })
        .collect()
}

/// Comment posts from a discussion's `included` list, oldest first.
///
/// Event posts (renames, stickies) carry no `content` and are dropped.
fn posts_from(discussion_id: &str, included: Vec<Resource>) -> Vec<Document> {
    let mut posts: Vec<(u64, Document)> = included
        .into_iter()
        .filter(|r| r.kind == "posts")
        .filter_map(|r| {
            let text = r.attributes.get("content").and_then(Value::as_str)?.to_string();
            let number = r.attributes.get("number").and_then(Value::as_u64).unwrap_or(u64::MAX);
            Some((number, Document { id: r.id, text, discussion_id: discussion_id.to_string() }))
        })
        .collect();
    posts.sort_by_key(|(number, _)| *number);
    posts.into_iter().map(|(_, doc)| doc).collect()
}

/// A signed reply never equals the post it was copied from.
fn reply_content(text: &str, signature: &str) -> String {
    format!("{text}\n\n{signature}")
}

fn reply_payload(discussion_id: &str, content: &str) -> Value {
    json!({
        "data": {
            "type": "posts",
            "attributes": { "content": content },
            "relationships": {
                "discussion": { "data": { "type": "discussions", "id": discussion_id } }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources(v: Value) -> Vec<Resource> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn posts_are_filtered_and_ordered_by_number() {
        let included = resources(json!([
            { "type": "users", "id": "1", "attributes": { "username": "alice" } },
            { "type": "posts", "id": "12", "attributes": { "number": 2, "contentType": "comment", "content": "second" } },
            { "type": "posts", "id": "11", "attributes": { "number": 1, "contentType": "comment", "content": "first" } },
            { "type": "posts", "id": "13", "attributes": { "number": 3, "contentType": "discussionRenamed" } }
        ]));
        let posts = posts_from("7", included);
        assert_eq!(posts, vec![Document::new("11", "first", "7"), Document::new("12", "second", "7")]);
    }

    #[test]
    fn discussions_keep_id_and_title() {
        let data = resources(json!([
            { "type": "discussions", "id": "3", "attributes": { "title": "Plugin help" } },
            { "type": "discussions", "id": "4" }
        ]));
        let list = discussions_from(data);
        assert_eq!(list[0], Discussion { id: "3".into(), title: Some("Plugin help".into()) });
        assert_eq!(list[1], Discussion::new("4"));
    }

    #[test]
    fn reply_carries_signature_and_discussion() {
        let body = reply_payload("9", &reply_content("Try clearing the cache.", "SENT BY A BOT"));
        assert_eq!(body["data"]["attributes"]["content"], "Try clearing the cache.\n\nSENT BY A BOT");
        assert_eq!(body["data"]["relationships"]["discussion"]["data"]["id"], "9");
        assert_ne!(reply_content("Try clearing the cache.", "SENT BY A BOT"), "Try clearing the cache.");
    }

    #[test]
    fn blank_signature_is_refused() {
        let base = Url::parse("https://example.com").unwrap();
        assert!(FlarumClient::new(base.clone(), Duration::from_secs(1), 10, "").is_err());
        assert!(FlarumClient::new(base, Duration::from_secs(1), 10, " \n ").is_err());
    }

    #[test]
    fn endpoint_respects_sub_path() {
        let client = FlarumClient::new(
            Url::parse("https://example.com/forum").unwrap(),
            Duration::from_secs(1),
            10,
            "SENT BY A BOT",
        )
        .unwrap();
        assert_eq!(client.endpoint("api/posts").unwrap().as_str(), "https://example.com/forum/api/posts");
    }
}
