use crate::queries::post;
use crate::records::SearchHit;
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

/// Drafts a short post from a source tweet. Remote and opaque.
#[async_trait]
pub trait Composer {
    async fn compose(&self, source_text: &str) -> Result<String>;
}

/// Appends rows to a spreadsheet. Remote and opaque.
#[async_trait]
pub trait SheetAppender {
    async fn append(&self, rows: &[Vec<String>]) -> Result<()>;
}

/// The manual gate: nothing is posted without an explicit yes.
pub trait Approver {
    fn approve(&self, draft: &str) -> Result<bool>;
}

/// Publishes an approved draft.
#[async_trait]
pub trait Poster {
    async fn post(&self, text: &str) -> Result<String>;
}

/// Chat-completions style composer.
pub struct ChatComposer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatComposer {
    pub fn new(endpoint: String, model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn compose_prompt(source_text: &str) -> String {
    format!(
        "Draft a new post inspired by the tweet below.\n\
         Original tweet: {source_text}\n\
         Requirements:\n\
         - respect the original's subject but add your own angle\n\
         - keep it short and readable\n\
         - include one or two hashtags\n\
         - stay under 140 characters"
    )
}

#[async_trait]
impl Composer for ChatComposer {
    async fn compose(&self, source_text: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": compose_prompt(source_text)}],
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("composer request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("composer API error: {status}"));
        }
        let parsed: ChatResponse = response.json().await.context("composer response shape")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("composer returned no choices"))
    }
}

/// values:append-style spreadsheet client.
pub struct SheetClient {
    client: reqwest::Client,
    endpoint: String,
    sheet_id: String,
    token: String,
}

impl SheetClient {
    pub fn new(endpoint: String, sheet_id: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            sheet_id,
            token,
        }
    }
}

#[async_trait]
impl SheetAppender for SheetClient {
    async fn append(&self, rows: &[Vec<String>]) -> Result<()> {
        let url = format!(
            "{}/{}/values/Sheet1!A:E:append?valueInputOption=RAW",
            self.endpoint, self.sheet_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()
            .await
            .context("sheet append request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("sheet API error: {status}"));
        }
        Ok(())
    }
}

/// Shows the draft on the terminal and waits for a y/n answer.
pub struct StdinApprover;

impl Approver for StdinApprover {
    fn approve(&self, draft: &str) -> Result<bool> {
        println!("\n=== Review before posting ===");
        println!("{draft}");
        print!("\nApprove this post? (y/n): ");
        std::io::stdout().flush().context("flush prompt")?;
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("read approval answer")?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}

pub struct SessionPoster<'a> {
    pub session: &'a Session,
}

#[async_trait]
impl Poster for SessionPoster<'_> {
    async fn post(&self, text: &str) -> Result<String> {
        post::create_tweet(self.session, text).await
    }
}

/// What one pipeline run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub collected: usize,
    pub sheet_appended: bool,
    pub posted: Vec<String>,
    pub skipped: usize,
}

/// Spreadsheet row per collected tweet: posted-at, text, reply count, URL,
/// engagement score.
pub fn sheet_rows(hits: &[SearchHit]) -> Vec<Vec<String>> {
    hits.iter()
        .map(|hit| {
            vec![
                hit.tweet.created_at.clone(),
                hit.tweet.text.clone(),
                hit.tweet.reply_count.to_string(),
                hit.tweet.tweet_url(),
                hit.tweet.engagement_score().to_string(),
            ]
        })
        .collect()
}

/// The `n` highest-engagement hits; equal scores keep collection order.
pub fn select_top(mut hits: Vec<SearchHit>, n: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.tweet.engagement_score().cmp(&a.tweet.engagement_score()));
    hits.truncate(n);
    hits
}

pub struct Pipeline<C, S, A, P> {
    pub composer: C,
    pub sheet: S,
    pub approver: A,
    pub poster: P,
    pub top_n: usize,
    pub post_interval: Duration,
}

impl<C, S, A, P> Pipeline<C, S, A, P>
where
    C: Composer,
    S: SheetAppender,
    A: Approver,
    P: Poster,
{
    /// Run the collect → record → compose → gate → post sequence over an
    /// already-collected result set. Per-item failures skip the item; only
    /// the manual gate decides what gets published.
    pub async fn run(&self, hits: Vec<SearchHit>) -> Result<PipelineReport> {
        let mut report = PipelineReport {
            collected: hits.len(),
            ..PipelineReport::default()
        };

        match self.sheet.append(&sheet_rows(&hits)).await {
            Ok(()) => report.sheet_appended = true,
            Err(err) => tracing::warn!("sheet append failed, continuing: {err:#}"),
        }

        let top = select_top(hits, self.top_n);
        let total = top.len();
        for (i, hit) in top.into_iter().enumerate() {
            let draft = match self.composer.compose(&hit.tweet.text).await {
                Ok(draft) => draft,
                Err(err) => {
                    tracing::warn!("composer failed for {}: {err:#}", hit.tweet.tweet_id);
                    report.skipped += 1;
                    continue;
                }
            };

            if self.approver.approve(&draft)? {
                match self.poster.post(&draft).await {
                    Ok(id) => {
                        tracing::info!("posted tweet {id}");
                        report.posted.push(id);
                    }
                    Err(err) => {
                        tracing::warn!("posting failed: {err:#}");
                        report.skipped += 1;
                    }
                }
            } else {
                tracing::info!("draft declined, not posting");
                report.skipped += 1;
            }

            if i + 1 < total && !self.post_interval.is_zero() {
                tokio::time::sleep(self.post_interval).await;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TweetRecord, UserProfile};
    use std::sync::Mutex;

    fn hit(id: &str, likes: u64) -> SearchHit {
        let tweet = TweetRecord {
            tweet_id: id.into(),
            user_id: "u".into(),
            user_name: "User".into(),
            screen_name: "user".into(),
            text: format!("tweet {id}"),
            created_at: "Wed Oct 10 20:19:24 +0000 2018".into(),
            reply_count: 1,
            like_count: likes,
            repost_count: 0,
            quote_count: 0,
            view_count: None,
            is_repost: false,
            is_quote: false,
            in_reply_to: None,
            lang: "en".into(),
        };
        let user = UserProfile {
            user_id: "u".into(),
            name: "User".into(),
            screen_name: "user".into(),
            description: String::new(),
            location: String::new(),
            followers_count: 0,
            following_count: 0,
            tweets_count: 0,
            created_at: String::new(),
            profile_image_url: String::new(),
        };
        SearchHit {
            user,
            tweet,
            keyword_locations: Vec::new(),
        }
    }

    struct EchoComposer {
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Composer for EchoComposer {
        async fn compose(&self, source_text: &str) -> Result<String> {
            if let Some(needle) = &self.fail_for {
                if source_text.contains(needle.as_str()) {
                    return Err(anyhow!("composer down"));
                }
            }
            Ok(format!("draft of {source_text}"))
        }
    }

    #[derive(Default)]
    struct RecordingSheet {
        rows: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl SheetAppender for RecordingSheet {
        async fn append(&self, rows: &[Vec<String>]) -> Result<()> {
            if self.fail {
                return Err(anyhow!("sheet down"));
            }
            self.rows.lock().unwrap().extend(rows.iter().cloned());
            Ok(())
        }
    }

    struct FixedApprover(bool);

    impl Approver for FixedApprover {
        fn approve(&self, _draft: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Poster for RecordingPoster {
        async fn post(&self, text: &str) -> Result<String> {
            let mut posts = self.posts.lock().unwrap();
            posts.push(text.to_string());
            Ok(format!("id-{}", posts.len()))
        }
    }

    fn pipeline(
        approve: bool,
        sheet_fail: bool,
        composer_fail_for: Option<&str>,
    ) -> Pipeline<EchoComposer, RecordingSheet, FixedApprover, RecordingPoster> {
        Pipeline {
            composer: EchoComposer {
                fail_for: composer_fail_for.map(String::from),
            },
            sheet: RecordingSheet {
                fail: sheet_fail,
                ..RecordingSheet::default()
            },
            approver: FixedApprover(approve),
            poster: RecordingPoster::default(),
            top_n: 2,
            post_interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_approved_drafts_post_in_engagement_order() {
        let p = pipeline(true, false, None);
        let report = p
            .run(vec![hit("low", 1), hit("high", 50), hit("mid", 10)])
            .await
            .unwrap();
        assert_eq!(report.posted.len(), 2);
        assert!(report.sheet_appended);
        let posts = p.poster.posts.lock().unwrap();
        assert_eq!(posts[0], "draft of tweet high");
        assert_eq!(posts[1], "draft of tweet mid");
    }

    #[tokio::test]
    async fn test_declined_drafts_never_post() {
        let p = pipeline(false, false, None);
        let report = p.run(vec![hit("a", 5), hit("b", 3)]).await.unwrap();
        assert!(report.posted.is_empty());
        assert_eq!(report.skipped, 2);
        assert!(p.poster.posts.lock().unwrap().is_empty());
        // collection is still recorded to the sheet
        assert_eq!(p.sheet.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sheet_failure_does_not_stop_the_run() {
        let p = pipeline(true, true, None);
        let report = p.run(vec![hit("a", 5)]).await.unwrap();
        assert!(!report.sheet_appended);
        assert_eq!(report.posted.len(), 1);
    }

    #[tokio::test]
    async fn test_composer_failure_skips_that_item() {
        let p = pipeline(true, false, Some("high"));
        let report = p.run(vec![hit("high", 50), hit("low", 1)]).await.unwrap();
        assert_eq!(report.posted.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(p.poster.posts.lock().unwrap()[0], "draft of tweet low");
    }

    #[test]
    fn test_sheet_rows_carry_url_and_engagement_score() {
        let rows = sheet_rows(&[hit("42", 9)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][3], "https://twitter.com/user/status/42");
        // 1 reply + 9 likes + 0 reposts
        assert_eq!(rows[0][4], "10");
    }

    #[test]
    fn test_select_top_is_stable_on_ties() {
        let top = select_top(vec![hit("first", 5), hit("second", 5), hit("big", 9)], 2);
        assert_eq!(top[0].tweet.tweet_id, "big");
        assert_eq!(top[1].tweet.tweet_id, "first");
    }
}
