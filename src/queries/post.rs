use super::timeline_features;
use crate::session::Session;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;

const CREATE_TWEET_URL: &str =
    "https://twitter.com/i/api/graphql/znq7jUAqRjmPj7IszLem5Q/CreateTweet";

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: Option<CreateTweetData>,
}

#[derive(Debug, Deserialize)]
struct CreateTweetData {
    create_tweet: Option<CreateTweetResult>,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResult {
    tweet_results: Option<TweetResults>,
}

#[derive(Debug, Deserialize)]
struct TweetResults {
    result: Option<TweetResult>,
}

#[derive(Debug, Deserialize)]
struct TweetResult {
    rest_id: Option<String>,
}

/// Post a tweet and return its id. Only the approval-gated pipeline calls
/// this; nothing else in the toolkit writes to the platform.
pub async fn create_tweet(session: &Session, text: &str) -> Result<String> {
    let body = json!({
        "variables": {
            "tweet_text": text,
            "dark_request": false,
            "media": { "media_entities": [], "possibly_sensitive": false },
            "semantic_annotation_ids": [],
        },
        "features": timeline_features(),
        "queryId": "znq7jUAqRjmPj7IszLem5Q",
    });

    let response: CreateTweetResponse = session.post_json(CREATE_TWEET_URL, &body).await?;
    response
        .data
        .and_then(|d| d.create_tweet)
        .and_then(|c| c.tweet_results)
        .and_then(|t| t.result)
        .and_then(|r| r.rest_id)
        .ok_or_else(|| anyhow!("create tweet returned no id"))
}
