use super::envelope::{self, Instruction, TimelineTweet};
use super::timeline_features;
use crate::page::{collect_paged, Page, PagedQuery};
use crate::records::SearchHit;
use crate::session::Session;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SEARCH_TIMELINE_URL: &str =
    "https://twitter.com/i/api/graphql/nK1dw4oV3k4w5TdtcAdSww/SearchTimeline";

/// The platform caps one search call at roughly this many tweets.
pub const SEARCH_PAGE_SIZE: usize = 20;

/// Server-side result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProduct {
    Latest,
    Top,
}

impl SearchProduct {
    fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "Latest",
            Self::Top => "Top",
        }
    }
}

/// Requested ordering of the final result set. `Likes` fetches `Top` and
/// re-sorts client-side by like count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Latest,
    Top,
    Likes,
}

impl SortOrder {
    fn product(self) -> SearchProduct {
        match self {
            Self::Latest => SearchProduct::Latest,
            Self::Top | Self::Likes => SearchProduct::Top,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search_by_raw_query: Option<SearchByRawQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchByRawQuery {
    search_timeline: Option<SearchTimeline>,
}

#[derive(Debug, Deserialize)]
struct SearchTimeline {
    timeline: Option<InstructionList>,
}

#[derive(Debug, Deserialize)]
struct InstructionList {
    #[serde(default)]
    instructions: Vec<Instruction>,
}

struct SearchQuery<'a> {
    session: &'a Session,
    query: String,
    product: SearchProduct,
}

#[async_trait]
impl PagedQuery for SearchQuery<'_> {
    type Item = TimelineTweet;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<TimelineTweet>> {
        let mut variables = json!({
            "rawQuery": self.query,
            "count": SEARCH_PAGE_SIZE,
            "querySource": "typed_query",
            "product": self.product.as_str(),
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = json!(cursor);
        }

        let response: SearchResponse = self
            .session
            .get_json(SEARCH_TIMELINE_URL, &variables, &timeline_features())
            .await?;

        let instructions = response
            .data
            .and_then(|d| d.search_by_raw_query)
            .and_then(|s| s.search_timeline)
            .and_then(|t| t.timeline)
            .map(|t| t.instructions)
            .unwrap_or_default();

        let (items, next_cursor) = envelope::collect_tweets(instructions);
        Ok(Page { items, next_cursor })
    }
}

/// Keyword search: paged collection up to `count` tweets, annotated with
/// where the keyword appears, in the requested order.
pub async fn search(
    session: &Session,
    keyword: &str,
    count: usize,
    sort: SortOrder,
    pace: Duration,
) -> Result<Vec<SearchHit>> {
    let query = SearchQuery {
        session,
        query: keyword.to_string(),
        product: sort.product(),
    };
    let collected = collect_paged(&query, count, pace).await?;

    let mut hits: Vec<SearchHit> = collected
        .into_iter()
        .map(|entry| {
            let keyword_locations =
                SearchHit::locate_keyword(keyword, &entry.tweet, &entry.author);
            SearchHit {
                user: entry.author,
                tweet: entry.tweet,
                keyword_locations,
            }
        })
        .collect();

    if sort == SortOrder::Likes {
        hits.sort_by(|a, b| b.tweet.like_count.cmp(&a.tweet.like_count));
    }
    Ok(hits)
}
