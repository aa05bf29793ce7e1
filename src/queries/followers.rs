use super::envelope::{self, Instruction};
use super::profile::{self, TimelineKind};
use super::timeline_features;
use crate::page::{collect_paged, Page, PagedQuery};
use crate::records::{TweetRecord, UserProfile};
use crate::session::Session;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const FOLLOWERS_URL: &str =
    "https://twitter.com/i/api/graphql/rRXFSG5vR6drKr5M37YOTw/Followers";

pub const FOLLOWERS_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    data: Option<FollowersData>,
}

#[derive(Debug, Deserialize)]
struct FollowersData {
    user: Option<FollowersUser>,
}

#[derive(Debug, Deserialize)]
struct FollowersUser {
    result: Option<FollowersResult>,
}

#[derive(Debug, Deserialize)]
struct FollowersResult {
    timeline: Option<TimelineWrapper>,
}

#[derive(Debug, Deserialize)]
struct TimelineWrapper {
    timeline: Option<InstructionList>,
}

#[derive(Debug, Deserialize)]
struct InstructionList {
    #[serde(default)]
    instructions: Vec<Instruction>,
}

struct FollowersQuery<'a> {
    session: &'a Session,
    user_id: String,
}

#[async_trait]
impl PagedQuery for FollowersQuery<'_> {
    type Item = UserProfile;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<UserProfile>> {
        let mut variables = json!({
            "userId": self.user_id,
            "count": FOLLOWERS_PAGE_SIZE,
            "includePromotedContent": false,
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = json!(cursor);
        }

        let response: FollowersResponse = self
            .session
            .get_json(FOLLOWERS_URL, &variables, &timeline_features())
            .await?;

        let instructions = response
            .data
            .and_then(|d| d.user)
            .and_then(|u| u.result)
            .and_then(|r| r.timeline)
            .and_then(|w| w.timeline)
            .map(|t| t.instructions)
            .unwrap_or_default();

        let (items, next_cursor) = envelope::collect_users(instructions);
        Ok(Page { items, next_cursor })
    }
}

/// Most recent followers of a user, newest first.
pub async fn latest_followers(
    session: &Session,
    user_id: &str,
    count: usize,
    pace: Duration,
) -> Result<Vec<UserProfile>> {
    let query = FollowersQuery {
        session,
        user_id: user_id.to_string(),
    };
    collect_paged(&query, count, pace).await
}

/// Knobs for the followers' tweets-of-today scan. The walk costs one
/// timeline fetch per follower and the platform rate-limits those
/// aggressively, so the limits default small.
#[derive(Debug, Clone)]
pub struct FollowerScan {
    pub follower_limit: usize,
    pub tweets_per_follower: usize,
    pub quota: usize,
    pub user_delay: Duration,
}

impl Default for FollowerScan {
    fn default() -> Self {
        Self {
            follower_limit: 3,
            tweets_per_follower: 2,
            quota: 10,
            user_delay: Duration::from_secs(15),
        }
    }
}

/// Collect tweets posted today (UTC) by the account's latest followers.
/// A failure on one follower's timeline skips that follower; the scan
/// carries on with what it has.
pub async fn followers_tweets_today(
    session: &Session,
    user_id: &str,
    scan: &FollowerScan,
) -> Result<Vec<TweetRecord>> {
    let followers =
        latest_followers(session, user_id, scan.follower_limit, Duration::ZERO).await?;
    let today = Utc::now().date_naive();
    let mut tweets = Vec::new();

    for (i, follower) in followers.iter().enumerate() {
        if i > 0 && !scan.user_delay.is_zero() {
            tracing::info!(
                "waiting {}s before the next follower timeline",
                scan.user_delay.as_secs()
            );
            tokio::time::sleep(scan.user_delay).await;
        }

        let timeline = match profile::user_tweets(
            session,
            &follower.user_id,
            TimelineKind::Tweets,
            scan.tweets_per_follower,
            Duration::ZERO,
        )
        .await
        {
            Ok(timeline) => timeline,
            Err(err) => {
                tracing::warn!(
                    "skipping follower @{}: {err:#}",
                    follower.screen_name
                );
                continue;
            }
        };

        for tweet in timeline {
            if posted_on(&tweet, today) {
                tweets.push(tweet);
                if tweets.len() >= scan.quota {
                    return Ok(tweets);
                }
            }
        }
    }

    Ok(tweets)
}

fn posted_on(tweet: &TweetRecord, day: NaiveDate) -> bool {
    tweet
        .parsed_created_at()
        .map(|dt| dt.with_timezone(&Utc).date_naive() == day)
        .unwrap_or(false)
}
