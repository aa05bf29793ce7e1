//! Timeline envelope shared by search, user-timeline, and follower queries.
//! The platform wraps every paged result in instruction lists; entries that
//! are not plain tweets or users (promotions, modules, unknown instruction
//! kinds) are skipped rather than treated as errors.

use crate::records::{TweetRecord, UserProfile};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Instruction {
    TimelineAddEntries { entries: Vec<Entry> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    pub content: Option<EntryContent>,
}

#[derive(Debug, Deserialize)]
pub struct EntryContent {
    #[serde(rename = "itemContent")]
    pub item_content: Option<ItemContent>,
    /// Cursor entries carry the continuation token directly in the content.
    pub value: Option<String>,
    #[serde(rename = "cursorType")]
    pub cursor_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemContent {
    #[serde(rename = "itemType")]
    pub item_type: Option<String>,
    pub tweet_results: Option<TweetResults>,
    pub user_results: Option<UserResults>,
}

#[derive(Debug, Deserialize)]
pub struct TweetResults {
    pub result: Option<TweetResult>,
}

#[derive(Debug, Deserialize)]
pub struct TweetResult {
    pub rest_id: Option<String>,
    pub legacy: Option<TweetLegacy>,
    pub core: Option<TweetCore>,
    pub views: Option<Views>,
    /// TweetWithVisibilityResults nests the actual tweet one level down.
    pub tweet: Option<Box<TweetResult>>,
}

#[derive(Debug, Deserialize)]
pub struct Views {
    pub count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TweetCore {
    pub user_results: Option<UserResults>,
}

#[derive(Debug, Deserialize)]
pub struct UserResults {
    pub result: Option<UserResult>,
}

#[derive(Debug, Deserialize)]
pub struct UserResult {
    pub rest_id: Option<String>,
    pub legacy: Option<UserLegacy>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TweetLegacy {
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub is_quote_status: bool,
    pub in_reply_to_screen_name: Option<String>,
    pub retweeted_status_result: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserLegacy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub friends_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub profile_image_url_https: String,
}

/// A tweet together with its author's full profile, as one timeline entry
/// carries both.
#[derive(Debug, Clone)]
pub struct TimelineTweet {
    pub tweet: TweetRecord,
    pub author: UserProfile,
}

pub fn profile_from_user_result(result: &UserResult) -> Option<UserProfile> {
    let legacy = result.legacy.as_ref()?;
    Some(UserProfile {
        user_id: result.rest_id.clone()?,
        name: legacy.name.clone(),
        screen_name: legacy.screen_name.clone(),
        description: legacy.description.clone(),
        location: legacy.location.clone(),
        followers_count: legacy.followers_count,
        following_count: legacy.friends_count,
        tweets_count: legacy.statuses_count,
        created_at: legacy.created_at.clone(),
        profile_image_url: legacy.profile_image_url_https.clone(),
    })
}

fn tweet_from_result(result: &TweetResult) -> Option<TimelineTweet> {
    // Unwrap the visibility-results wrapper when present.
    if let Some(inner) = &result.tweet {
        return tweet_from_result(inner);
    }
    let legacy = result.legacy.as_ref()?;
    let author = result
        .core
        .as_ref()
        .and_then(|core| core.user_results.as_ref())
        .and_then(|users| users.result.as_ref())
        .and_then(profile_from_user_result)?;

    let tweet = TweetRecord {
        tweet_id: result.rest_id.clone()?,
        user_id: author.user_id.clone(),
        user_name: author.name.clone(),
        screen_name: author.screen_name.clone(),
        text: legacy.full_text.clone(),
        created_at: legacy.created_at.clone(),
        reply_count: legacy.reply_count,
        like_count: legacy.favorite_count,
        repost_count: legacy.retweet_count,
        quote_count: legacy.quote_count,
        view_count: result
            .views
            .as_ref()
            .and_then(|v| v.count.as_deref())
            .and_then(|c| c.parse().ok()),
        is_repost: legacy.retweeted_status_result.is_some(),
        is_quote: legacy.is_quote_status,
        in_reply_to: legacy.in_reply_to_screen_name.clone(),
        lang: legacy.lang.clone(),
    };
    Some(TimelineTweet { tweet, author })
}

/// Walk the instruction list and collect tweet entries plus the bottom
/// continuation cursor.
pub fn collect_tweets(instructions: Vec<Instruction>) -> (Vec<TimelineTweet>, Option<String>) {
    let mut tweets = Vec::new();
    let mut cursor = None;
    for_each_content(instructions, |content| {
        if let Some(item) = &content.item_content {
            if item.item_type.as_deref() != Some("TimelineTweet") {
                return;
            }
            if let Some(found) = item
                .tweet_results
                .as_ref()
                .and_then(|r| r.result.as_ref())
                .and_then(tweet_from_result)
            {
                tweets.push(found);
            }
        } else if content.cursor_type.as_deref() == Some("Bottom") {
            cursor = content.value.clone();
        }
    });
    (tweets, cursor)
}

/// Walk the instruction list and collect user entries (follower listings)
/// plus the bottom continuation cursor.
pub fn collect_users(instructions: Vec<Instruction>) -> (Vec<UserProfile>, Option<String>) {
    let mut users = Vec::new();
    let mut cursor = None;
    for_each_content(instructions, |content| {
        if let Some(item) = &content.item_content {
            if item.item_type.as_deref() != Some("TimelineUser") {
                return;
            }
            if let Some(profile) = item
                .user_results
                .as_ref()
                .and_then(|r| r.result.as_ref())
                .and_then(profile_from_user_result)
            {
                users.push(profile);
            }
        } else if content.cursor_type.as_deref() == Some("Bottom") {
            cursor = content.value.clone();
        }
    });
    (users, cursor)
}

fn for_each_content<F: FnMut(&EntryContent)>(instructions: Vec<Instruction>, mut f: F) {
    for instruction in instructions {
        if let Instruction::TimelineAddEntries { entries } = instruction {
            for entry in entries {
                if let Some(content) = entry.content {
                    f(&content);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tweet_entry(id: &str, text: &str) -> serde_json::Value {
        json!({
            "content": {
                "itemContent": {
                    "itemType": "TimelineTweet",
                    "tweet_results": {
                        "result": {
                            "rest_id": id,
                            "views": {"count": "1200"},
                            "legacy": {
                                "full_text": text,
                                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                                "reply_count": 1,
                                "favorite_count": 2,
                                "retweet_count": 3,
                                "quote_count": 0,
                                "lang": "en",
                                "is_quote_status": false,
                                "in_reply_to_screen_name": "someone"
                            },
                            "core": {
                                "user_results": {
                                    "result": {
                                        "rest_id": "42",
                                        "legacy": {
                                            "name": "Author",
                                            "screen_name": "author",
                                            "followers_count": 9,
                                            "friends_count": 8,
                                            "statuses_count": 7,
                                            "created_at": "Mon Jan 01 00:00:00 +0000 2018",
                                            "profile_image_url_https": "https://pbs/img.jpg"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    fn cursor_entry(value: &str, kind: &str) -> serde_json::Value {
        json!({
            "content": {
                "value": value,
                "cursorType": kind
            }
        })
    }

    fn parse_instructions(value: serde_json::Value) -> Vec<Instruction> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_collects_tweets_and_bottom_cursor() {
        let instructions = parse_instructions(json!([
            {"type": "TimelineClearCache"},
            {"type": "TimelineAddEntries", "entries": [
                tweet_entry("100", "hello"),
                tweet_entry("101", "world"),
                cursor_entry("cursor-top", "Top"),
                cursor_entry("cursor-bottom", "Bottom"),
            ]}
        ]));
        let (tweets, cursor) = collect_tweets(instructions);
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].tweet.tweet_id, "100");
        assert_eq!(tweets[0].tweet.screen_name, "author");
        assert_eq!(tweets[0].tweet.view_count, Some(1200));
        assert_eq!(tweets[0].tweet.in_reply_to.as_deref(), Some("someone"));
        assert_eq!(tweets[0].author.followers_count, 9);
        assert_eq!(cursor.as_deref(), Some("cursor-bottom"));
    }

    #[test]
    fn test_unknown_instruction_kinds_are_skipped() {
        let instructions = parse_instructions(json!([
            {"type": "TimelineTerminateTimeline", "direction": "Bottom"},
            {"type": "TimelinePinEntry", "entry": {}}
        ]));
        let (tweets, cursor) = collect_tweets(instructions);
        assert!(tweets.is_empty());
        assert!(cursor.is_none());
    }

    #[test]
    fn test_entries_without_tweet_payload_are_skipped() {
        let instructions = parse_instructions(json!([
            {"type": "TimelineAddEntries", "entries": [
                {"content": {"itemContent": {"itemType": "TimelineTweet"}}},
                {"content": null},
                tweet_entry("7", "kept"),
            ]}
        ]));
        let (tweets, _) = collect_tweets(instructions);
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].tweet.text, "kept");
    }

    #[test]
    fn test_repost_flag_follows_retweeted_status_presence() {
        let mut entry = tweet_entry("1", "RT @x: hi");
        entry["content"]["itemContent"]["tweet_results"]["result"]["legacy"]
            ["retweeted_status_result"] = json!({"result": {}});
        let instructions = parse_instructions(json!([
            {"type": "TimelineAddEntries", "entries": [entry, tweet_entry("2", "plain")]}
        ]));
        let (tweets, _) = collect_tweets(instructions);
        assert!(tweets[0].tweet.is_repost);
        assert!(!tweets[1].tweet.is_repost);
    }

    #[test]
    fn test_visibility_wrapper_is_unwrapped() {
        let inner = tweet_entry("55", "wrapped")["content"]["itemContent"]["tweet_results"]
            ["result"]
            .clone();
        let instructions = parse_instructions(json!([
            {"type": "TimelineAddEntries", "entries": [
                {"content": {"itemContent": {
                    "itemType": "TimelineTweet",
                    "tweet_results": {"result": {"tweet": inner}}
                }}}
            ]}
        ]));
        let (tweets, _) = collect_tweets(instructions);
        assert_eq!(tweets.len(), 1);
        assert_eq!(tweets[0].tweet.tweet_id, "55");
    }

    #[test]
    fn test_collects_follower_users() {
        let instructions = parse_instructions(json!([
            {"type": "TimelineAddEntries", "entries": [
                {"content": {"itemContent": {
                    "itemType": "TimelineUser",
                    "user_results": {"result": {
                        "rest_id": "9",
                        "legacy": {"name": "Fan", "screen_name": "fan_one"}
                    }}
                }}},
                cursor_entry("more-users", "Bottom"),
            ]}
        ]));
        let (users, cursor) = collect_users(instructions);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].screen_name, "fan_one");
        assert_eq!(cursor.as_deref(), Some("more-users"));
    }
}
