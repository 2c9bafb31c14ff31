use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use super::structs::FeedItem;

/// RSS 源的抽象。生产环境走 HTTP，测试里换成假的。
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>>;
}

pub struct GoogleNewsFeed {
    client: Client,
}

impl GoogleNewsFeed {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for GoogleNewsFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        let resp = self.client.get(url).send().await
            .with_context(|| format!("Feed request failed: {}", url))?;

        if !resp.status().is_success() {
            return Err(anyhow!("Feed returned status {}", resp.status()));
        }

        let body = resp.bytes().await.context("Failed to read feed body")?;
        parse_feed(&body)
    }
}

/// RSS 2.0 -> FeedItem，保持 feed 原始顺序
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let channel = rss::Channel::read_from(bytes).map_err(|e| anyhow!("Failed to parse RSS: {}", e))?;

    let items = channel
        .items()
        .iter()
        .map(|item| FeedItem {
            title: non_empty(item.title()),
            link: non_empty(item.link()),
            snippet: item.description().map(strip_html).filter(|s| !s.is_empty()),
            published_at: item.pub_date().and_then(parse_pub_date),
        })
        .collect();

    Ok(items)
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// description 是 HTML 片段，去掉标签、解常见实体、压缩空白
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
