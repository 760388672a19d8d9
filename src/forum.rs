use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::{Client, IntoUrl, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::collect::ordered_fan_out;
use crate::error::ShuiyuanError;
use crate::post::{PostReference, SummaryResponse, TopicResponse, UserActionsResponse};

lazy_static! {
    /// The forum all endpoints are resolved against unless configured otherwise.
    pub static ref DEFAULT_BASE_URL: Url = Url::parse("https://shuiyuan.sjtu.edu.cn/").unwrap();
}

/// Read the session cookie from the credential file.
///
/// The content is trimmed and passed verbatim as `Cookie` header.
pub fn read_cookie<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(cookie) => Ok(cookie.trim().to_string()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(ShuiyuanError::ResourceNotFound {
                kind: "cookie file",
                path: path.to_path_buf(),
            }
            .into())
        }
        Err(err) => Err(err).context(format!("Failed to read cookie file {}", path.display())),
    }
}

/// Client for the three json endpoints of the forum.
#[derive(Debug, Clone)]
pub struct Forum {
    /// The [`reqwest::Client`] that drives requests.
    client: Client,
    /// Endpoint locations, headers and fan-out limits.
    config: Config,
}

impl Forum {
    pub fn new(config: Config) -> Result<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(anyhow!("url {:?} can not be a base url", config.base_url));
        }

        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh-Hans;q=0.9"));
        headers.insert(
            USER_AGENT,
            config
                .browser_user_agent
                .parse()
                .context("Failed to parse user agent header.")?,
        );
        if let Some(cookie) = &config.cookie {
            headers.insert(
                COOKIE,
                cookie.parse().context("Failed to parse cookie header.")?,
            );
        }

        let mut client = Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            client = client.timeout(timeout);
        }

        Ok(Self {
            client: client.build()?,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GET `url` and decode the json body.
    pub async fn fetch(&self, url: Url) -> Result<Value> {
        self.fetch_json(url).await
    }

    /// GET `url` and decode the json body into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(ShuiyuanError::from)
            .with_context(|| format!("Failed to fetch {}", url))?;

        if self.config.http_success_only && !resp.status().is_success() {
            let msg = format!("Unsuccessful request to {}", url);
            return Err(ShuiyuanError::NoHttpSuccess {
                status: resp.status(),
                url,
            })
            .context(msg);
        }

        let body = resp.bytes().await.map_err(ShuiyuanError::from)?;
        serde_json::from_slice(&body).map_err(|err| {
            ShuiyuanError::MalformedResponse {
                url,
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// Append `segments` to the configured base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("url {:?} can not be a base url", self.config.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn summary_url(&self, username: &str) -> Result<Url> {
        self.endpoint(&["u", username, "summary.json"])
    }

    pub fn user_actions_url(&self, username: &str, offset: u64) -> Result<Url> {
        let mut url = self.endpoint(&["user_actions.json"])?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("username", username)
            // new topics and replies
            .append_pair("filter", "4,5");
        Ok(url)
    }

    pub fn topic_url(&self, reference: PostReference) -> Result<Url> {
        self.endpoint(&[
            "t",
            "topic",
            &reference.topic_id.to_string(),
            &format!("{}.json", reference.post_number),
        ])
    }

    /// The number of posts the summary of `username` declares.
    pub async fn post_count(&self, username: &str) -> Result<u64> {
        let summary: SummaryResponse = self.fetch_json(self.summary_url(username)?).await?;
        Ok(summary.user_summary.post_count)
    }

    /// One page of the action log starting at `offset`.
    pub async fn user_actions(&self, username: &str, offset: u64) -> Result<Vec<PostReference>> {
        let page: UserActionsResponse = self
            .fetch_json(self.user_actions_url(username, offset)?)
            .await?;
        Ok(page.user_actions.iter().map(PostReference::from).collect())
    }

    /// The raw html body of a single post.
    ///
    /// Fails with [`ShuiyuanError::MissingResource`] if the topic is gone or
    /// the post is not part of the topic's stream anymore.
    pub async fn fetch_post(&self, reference: PostReference) -> Result<String> {
        let missing = || ShuiyuanError::MissingResource {
            topic_id: reference.topic_id,
            post_number: reference.post_number,
        };
        let topic: TopicResponse = match self.fetch_json(self.topic_url(reference)?).await {
            Ok(topic) => topic,
            Err(err) => {
                if let Some(ShuiyuanError::NoHttpSuccess { status, .. }) = err.downcast_ref() {
                    if ShuiyuanError::is_missing_status(*status) {
                        debug!("topic of {} answered {}", reference, status);
                        return Err(missing().into());
                    }
                }
                return Err(err);
            }
        };

        topic
            .cooked(reference.post_number)
            .map(str::to_string)
            .ok_or_else(|| missing().into())
    }

    /// Fetch the bodies of all `references` with at most `post_workers`
    /// requests in flight. The result is in the order of `references`,
    /// posts that no longer exist are `None`.
    pub async fn fetch_posts(
        &self,
        references: &[PostReference],
    ) -> Result<Vec<(PostReference, Option<String>)>> {
        ordered_fan_out(
            references.iter().copied(),
            self.config.post_workers,
            |reference| async move {
                match self.fetch_post(reference).await {
                    Ok(body) => Ok((reference, Some(body))),
                    Err(err) if ShuiyuanError::is_missing_resource(&err) => {
                        debug!("skipping: {}", err);
                        Ok((reference, None))
                    }
                    Err(err) => Err(err),
                }
            },
        )
        .await
    }
}

/// The number of threads the machine can run in parallel.
pub(crate) fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the forum, all endpoints are resolved against it.
    pub(crate) base_url: Url,
    /// Session cookie sent with every request.
    pub(crate) cookie: Option<String>,
    /// The user-agent used for requests.
    pub(crate) browser_user_agent: String,
    /// Number of actions the forum returns per page.
    pub(crate) page_size: u64,
    /// Added to the declared post count to also reach deleted posts.
    pub(crate) deleted_posts_slack: u64,
    /// Max. concurrent requests while paging through the action log.
    pub(crate) id_workers: usize,
    /// Max. concurrent requests while fetching post bodies.
    pub(crate) post_workers: usize,
    /// Timeout for requests.
    pub(crate) request_timeout: Option<Duration>,
    /// Whether to treat non 2XX responses as errors.
    pub(crate) http_success_only: bool,
    /// Whether to fetch a post referenced multiple times only once. Off by
    /// default, every reference is fetched and counted.
    pub(crate) dedup_post_refs: bool,
}

impl Config {
    /// Default timeout for requests.
    pub const DEFAULT_REQ_TIMEOUT_SEC: u64 = 30;

    /// The action log of the forum returns 30 entries per page.
    pub const DEFAULT_PAGE_SIZE: u64 = 30;

    pub const DEFAULT_DELETED_POSTS_SLACK: u64 = 100;

    /// Default user agent, a desktop browser as the forum rejects unknown
    /// clients.
    pub const DEFAULT_USER_AGENT: &'static str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15";

    /// Convenience method to create a [`ConfigBuilder`]
    #[inline]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn deleted_posts_slack(&self) -> u64 {
        self.deleted_posts_slack
    }

    pub fn id_workers(&self) -> usize {
        self.id_workers
    }

    pub fn post_workers(&self) -> usize {
        self.post_workers
    }

    pub fn dedup_post_refs(&self) -> bool {
        self.dedup_post_refs
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base_url: Option<Url>,
    cookie: Option<String>,
    browser_user_agent: Option<String>,
    page_size: Option<u64>,
    deleted_posts_slack: Option<u64>,
    id_workers: Option<usize>,
    post_workers: Option<usize>,
    request_timeout: Option<Option<Duration>>,
    http_success_only: Option<bool>,
    dedup_post_refs: Option<bool>,
}

impl ConfigBuilder {
    pub fn base_url<T: IntoUrl>(mut self, base_url: T) -> Result<Self> {
        self.base_url = Some(base_url.into_url()?);
        Ok(self)
    }

    pub fn cookie<T: ToString>(mut self, cookie: T) -> Self {
        self.cookie = Some(cookie.to_string());
        self
    }

    pub fn browser_user_agent<T: ToString>(mut self, browser_user_agent: T) -> Self {
        self.browser_user_agent = Some(browser_user_agent.to_string());
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn deleted_posts_slack(mut self, deleted_posts_slack: u64) -> Self {
        self.deleted_posts_slack = Some(deleted_posts_slack);
        self
    }

    pub fn id_workers(mut self, id_workers: usize) -> Self {
        self.id_workers = Some(id_workers);
        self
    }

    pub fn post_workers(mut self, post_workers: usize) -> Self {
        self.post_workers = Some(post_workers);
        self
    }

    /// `None` disables the timeout.
    pub fn request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    pub fn http_success_only(mut self, http_success_only: bool) -> Self {
        self.http_success_only = Some(http_success_only);
        self
    }

    pub fn dedup_post_refs(mut self, dedup_post_refs: bool) -> Self {
        self.dedup_post_refs = Some(dedup_post_refs);
        self
    }

    pub fn build(self) -> Config {
        let cpus = available_parallelism();
        Config {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.clone()),
            cookie: self.cookie,
            browser_user_agent: self
                .browser_user_agent
                .unwrap_or_else(|| Config::DEFAULT_USER_AGENT.to_string()),
            page_size: self.page_size.unwrap_or(Config::DEFAULT_PAGE_SIZE).max(1),
            deleted_posts_slack: self
                .deleted_posts_slack
                .unwrap_or(Config::DEFAULT_DELETED_POSTS_SLACK),
            id_workers: self.id_workers.unwrap_or(cpus).max(1),
            post_workers: self.post_workers.unwrap_or_else(|| cpus.max(12)).max(1),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Some(Duration::from_secs(Config::DEFAULT_REQ_TIMEOUT_SEC))),
            http_success_only: self.http_success_only.unwrap_or(true),
            dedup_post_refs: self.dedup_post_refs.unwrap_or(false),
        }
    }
}
