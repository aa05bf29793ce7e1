use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Created-at format used by the platform's legacy tweet payloads,
/// e.g. "Wed Oct 10 20:19:24 +0000 2018".
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Serialize)]
pub struct TweetRecord {
    pub tweet_id: String,
    pub user_id: String,
    pub user_name: String,
    pub screen_name: String,
    pub text: String,
    pub created_at: String,
    pub reply_count: u64,
    pub like_count: u64,
    pub repost_count: u64,
    pub quote_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    pub is_repost: bool,
    pub is_quote: bool,
    /// Handle of the user this tweet replies to, when the platform supplies it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub lang: String,
}

impl TweetRecord {
    pub fn tweet_url(&self) -> String {
        format!(
            "https://twitter.com/{}/status/{}",
            self.screen_name, self.tweet_id
        )
    }

    /// Replies + likes + reposts, used as a ranking heuristic.
    pub fn engagement_score(&self) -> u64 {
        self.reply_count + self.like_count + self.repost_count
    }

    pub fn parsed_created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT).ok()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub screen_name: String,
    pub description: String,
    pub location: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub tweets_count: u64,
    pub created_at: String,
    pub profile_image_url: String,
}

impl UserProfile {
    pub fn profile_url(&self) -> String {
        format!("https://twitter.com/{}", self.screen_name)
    }
}

/// Where a search keyword appears within a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordLocation {
    TweetText,
    ProfileDescription,
    UserName,
    ScreenName,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub user: UserProfile,
    pub tweet: TweetRecord,
    pub keyword_locations: Vec<KeywordLocation>,
}

impl SearchHit {
    pub fn locate_keyword(
        keyword: &str,
        tweet: &TweetRecord,
        user: &UserProfile,
    ) -> Vec<KeywordLocation> {
        let needle = keyword.to_lowercase();
        let mut locations = Vec::new();
        if tweet.text.to_lowercase().contains(&needle) {
            locations.push(KeywordLocation::TweetText);
        }
        if user.description.to_lowercase().contains(&needle) {
            locations.push(KeywordLocation::ProfileDescription);
        }
        if user.name.to_lowercase().contains(&needle) {
            locations.push(KeywordLocation::UserName);
        }
        if user.screen_name.to_lowercase().contains(&needle) {
            locations.push(KeywordLocation::ScreenName);
        }
        locations
    }
}

/// One entry of the frequent-replier report: who they are, how often they
/// replied, and a sample of their recent tweets.
#[derive(Debug, Clone, Serialize)]
pub struct FrequentReplier {
    pub profile: UserProfile,
    pub reply_count: u64,
    pub recent_tweets: Vec<TweetRecord>,
}
