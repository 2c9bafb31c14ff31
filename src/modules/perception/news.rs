use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use url::Url;

use super::feed::FeedSource;
use super::structs::{FeedPlan, Instrument, Language};
use crate::database::models::NewNews;

const GOOGLE_NEWS_SEARCH: &str = "https://news.google.com/rss/search";

/// Google News 搜索 RSS 地址
pub fn build_feed_url(query: &str, language: Language) -> Result<Url> {
    let (hl, gl, ceid) = language.locale();
    let mut url = Url::parse(GOOGLE_NEWS_SEARCH)?;
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("hl", hl)
        .append_pair("gl", gl)
        .append_pair("ceid", ceid);
    Ok(url)
}

/// 按字符截断，保证不会切在 UTF-8 中间
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub struct NewsFetcher {
    feed: Arc<dyn FeedSource>,
    max_description_len: usize,
}

impl NewsFetcher {
    pub fn new(feed: Arc<dyn FeedSource>, max_description_len: usize) -> Self {
        Self { feed, max_description_len }
    }

    /// 抓一个 (标的, 语言) 的候选新闻。返回 Ok(空) 表示该语言没有关键词。
    /// 网络/解析失败原样上抛，由调用方记录为该步骤的错误。
    pub async fn collect(&self, instrument: &Instrument, plan: &FeedPlan) -> Result<Vec<NewNews>> {
        let keyword = match instrument.primary_keyword(plan.language) {
            Some(k) => k,
            None => return Ok(vec![]),
        };

        let url = build_feed_url(keyword, plan.language)?;
        let items = self.feed.fetch(url.as_str()).await?;

        // 先截前 K 条再过滤缺 title/link 的，和线上行为保持一致
        let candidates = items
            .into_iter()
            .take(plan.max_items)
            .filter_map(|item| {
                let title = item.title?;
                let link = item.link?;
                let description = item
                    .snippet
                    .map(|s| truncate_chars(&s, self.max_description_len))
                    .filter(|s| !s.is_empty());

                Some(NewNews {
                    stock_code: instrument.code.to_string(),
                    title,
                    description,
                    url: link,
                    source: plan.language.source_name().to_string(),
                    language: plan.language,
                    published_at: item.published_at.unwrap_or_else(Utc::now),
                })
            })
            .collect();

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::perception::structs::{FeedItem, Market};
    use crate::testing::StaticFeed;

    const INST: Instrument = Instrument {
        code: "005930",
        name_ko: "삼성전자",
        name_en: "Samsung Electronics",
        sector: "전자/반도체",
        market: Market::Kospi,
        keywords_ko: &["삼성전자", "삼성 반도체"],
        keywords_en: &["Samsung Electronics"],
    };

    fn item(n: usize) -> FeedItem {
        FeedItem {
            title: Some(format!("title {}", n)),
            link: Some(format!("https://example.com/{}", n)),
            snippet: Some("x".repeat(800)),
            published_at: None,
        }
    }

    #[test]
    fn feed_url_is_localized_and_encoded() {
        let ko = build_feed_url("삼성전자", Language::Ko).unwrap();
        assert!(ko.as_str().starts_with("https://news.google.com/rss/search?q=%EC%82%BC"));
        assert!(ko.as_str().ends_with("&hl=ko&gl=KR&ceid=KR%3Ako"));

        let en = build_feed_url("Samsung C&T", Language::En).unwrap();
        assert_eq!(
            en.as_str(),
            "https://news.google.com/rss/search?q=Samsung+C%26T&hl=en&gl=US&ceid=US%3Aen"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn caps_items_then_drops_incomplete_ones() {
        let mut items: Vec<FeedItem> = (0..8).map(item).collect();
        items[1].link = None;
        let url = build_feed_url("삼성전자", Language::Ko).unwrap().to_string();
        let feed = Arc::new(StaticFeed::new().with_items(&url, items));

        let fetcher = NewsFetcher::new(feed.clone(), 500);
        let plan = Market::Kospi.feed_plan()[0];
        let news = fetcher.collect(&INST, &plan).await.unwrap();

        // 取前 5 条，其中一条缺 link
        assert_eq!(news.len(), 4);
        assert!(news.iter().all(|n| n.description.as_ref().unwrap().chars().count() == 500));
        assert!(news.iter().all(|n| n.source == "Google News KR" && n.language == Language::Ko));
        assert_eq!(news[0].stock_code, "005930");
        assert_eq!(feed.requested(), vec![url]);
    }

    #[tokio::test]
    async fn feed_errors_propagate_to_the_caller() {
        let url = build_feed_url("Samsung Electronics", Language::En).unwrap().to_string();
        let feed = Arc::new(StaticFeed::new().with_error(&url, "connection reset"));
        let fetcher = NewsFetcher::new(feed, 500);

        let plan = Market::Kospi.feed_plan()[1];
        let err = fetcher.collect(&INST, &plan).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
