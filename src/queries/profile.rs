use super::envelope::{self, Instruction, TimelineTweet, UserResult};
use super::{timeline_features, user_features};
use crate::page::{collect_paged, Page, PagedQuery};
use crate::records::{TweetRecord, UserProfile};
use crate::session::Session;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const USER_BY_SCREEN_NAME_URL: &str =
    "https://twitter.com/i/api/graphql/xmU6X_CKVnQ5lSrCbAmJsg/UserByScreenName";
const USER_TWEETS_URL: &str =
    "https://twitter.com/i/api/graphql/E3opETHurmVJflFsUBVuUQ/UserTweets";
const USER_TWEETS_AND_REPLIES_URL: &str =
    "https://twitter.com/i/api/graphql/bt4TKuFz4T7Ckk-VvQVSow/UserTweetsAndReplies";

/// The platform accepts up to this many tweets per timeline call.
pub const TIMELINE_PAGE_SIZE: usize = 100;

/// Which of the user's timelines to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    Tweets,
    Replies,
}

impl TimelineKind {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Tweets => USER_TWEETS_URL,
            Self::Replies => USER_TWEETS_AND_REPLIES_URL,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    data: Option<UserLookupData>,
}

#[derive(Debug, Deserialize)]
struct UserLookupData {
    user: Option<UserResults>,
}

#[derive(Debug, Deserialize)]
struct UserResults {
    result: Option<UserResult>,
}

/// Resolve a handle (without the leading `@`) to a full profile.
pub async fn user_by_handle(session: &Session, handle: &str) -> Result<UserProfile> {
    let handle = handle.trim_start_matches('@');
    let variables = json!({ "screen_name": handle });
    let response: UserLookupResponse = session
        .get_json(USER_BY_SCREEN_NAME_URL, &variables, &user_features())
        .await?;

    response
        .data
        .and_then(|d| d.user)
        .and_then(|u| u.result)
        .as_ref()
        .and_then(envelope::profile_from_user_result)
        .ok_or_else(|| anyhow!("user @{handle} not found"))
}

#[derive(Debug, Deserialize)]
struct UserTimelineResponse {
    data: Option<UserTimelineData>,
}

#[derive(Debug, Deserialize)]
struct UserTimelineData {
    user: Option<UserTimelineResult>,
}

#[derive(Debug, Deserialize)]
struct UserTimelineResult {
    result: Option<UserTimelineInner>,
}

#[derive(Debug, Deserialize)]
struct UserTimelineInner {
    timeline_v2: Option<TimelineWrapper>,
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

struct UserTimelineQuery<'a> {
    session: &'a Session,
    user_id: String,
    kind: TimelineKind,
}

#[async_trait]
impl PagedQuery for UserTimelineQuery<'_> {
    type Item = TimelineTweet;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<TimelineTweet>> {
        let mut variables = json!({
            "userId": self.user_id,
            "count": TIMELINE_PAGE_SIZE,
            "includePromotedContent": false,
            "withQuickPromoteEligibilityTweetFields": false,
            "withVoice": true,
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = json!(cursor);
        }

        let response: UserTimelineResponse = self
            .session
            .get_json(self.kind.endpoint(), &variables, &timeline_features())
            .await?;

        // The endpoint has shipped the timeline under both names.
        let instructions = response
            .data
            .and_then(|d| d.user)
            .and_then(|u| u.result)
            .and_then(|r| r.timeline_v2.or(r.timeline))
            .and_then(|w| w.timeline)
            .map(|t| t.instructions)
            .unwrap_or_default();

        let (items, next_cursor) = envelope::collect_tweets(instructions);
        Ok(Page { items, next_cursor })
    }
}

/// Fetch up to `quota` tweets from one of a user's timelines, newest first.
pub async fn user_tweets(
    session: &Session,
    user_id: &str,
    kind: TimelineKind,
    quota: usize,
    pace: Duration,
) -> Result<Vec<TweetRecord>> {
    let query = UserTimelineQuery {
        session,
        user_id: user_id.to_string(),
        kind,
    };
    let collected = collect_paged(&query, quota, pace).await?;
    Ok(collected.into_iter().map(|entry| entry.tweet).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_kind_selects_endpoint() {
        assert!(TimelineKind::Tweets.endpoint().ends_with("UserTweets"));
        assert!(TimelineKind::Replies
            .endpoint()
            .ends_with("UserTweetsAndReplies"));
    }
}
