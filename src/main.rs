use anyhow::{Context, Result};
use birdwatch::config::Config;
use birdwatch::cookies;
use birdwatch::pipeline::{ChatComposer, Pipeline, SessionPoster, SheetClient, StdinApprover};
use birdwatch::queries::followers::{self, FollowerScan};
use birdwatch::queries::profile::{self, TimelineKind};
use birdwatch::queries::search::{self, SortOrder};
use birdwatch::records::FrequentReplier;
use birdwatch::replies::{MentionSource, ReplyTally};
use birdwatch::session::Session;
use birdwatch::sink::ResultSink;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "birdwatch", version, about = "Cookie-replay X/Twitter collection toolkit")]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a browser cookie export into the flat bundle used for auth
    Cookies,
    /// Search tweets by keyword and save the hits
    Search {
        keyword: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long, value_enum, default_value = "top")]
        sort: SortArg,
    },
    /// Look up a user's profile and recent tweets
    Profile {
        handle: String,
        #[arg(long, default_value_t = 3)]
        tweets: usize,
    },
    /// Collect today's tweets from the account's latest followers
    Followers {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long, default_value_t = 3)]
        followers: usize,
        #[arg(long, default_value_t = 2)]
        per_follower: usize,
    },
    /// Scan a user's replies and report who they reply to most
    Replies {
        handle: String,
        #[arg(long, default_value_t = 200)]
        scan: usize,
        #[arg(long, default_value_t = 3)]
        min_count: u64,
        #[arg(long, value_enum, default_value = "text")]
        source: SourceArg,
        /// Also write the report as a CSV table
        #[arg(long)]
        table: bool,
    },
    /// Collect top tweets, record them to a spreadsheet, draft posts and
    /// publish each one only after manual approval
    Pipeline {
        keyword: String,
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Latest,
    Top,
    Likes,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Latest => SortOrder::Latest,
            SortArg::Top => SortOrder::Top,
            SortArg::Likes => SortOrder::Likes,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    /// Parse @mentions from reply text
    Text,
    /// Use the structured reply-to field
    Structured,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Cookies => cmd_cookies(&config),
        Command::Search {
            keyword,
            count,
            sort,
        } => cmd_search(&config, &keyword, count, sort.into()).await,
        Command::Profile { handle, tweets } => cmd_profile(&config, &handle, tweets).await,
        Command::Followers {
            count,
            followers,
            per_follower,
        } => cmd_followers(&config, count, followers, per_follower).await,
        Command::Replies {
            handle,
            scan,
            min_count,
            source,
            table,
        } => cmd_replies(&config, &handle, scan, min_count, source, table).await,
        Command::Pipeline { keyword, count } => cmd_pipeline(&config, &keyword, count).await,
    }
}

fn open_session(config: &Config) -> Result<Session> {
    Session::from_cookie_file(&config.auth.cookie_file)
        .context("session bootstrap failed; run `birdwatch cookies` first")
}

fn page_pace(config: &Config) -> Duration {
    Duration::from_secs(config.pacing.page_delay_secs)
}

fn cmd_cookies(config: &Config) -> Result<()> {
    let bundle =
        cookies::convert_export_file(&config.auth.cookie_export, &config.auth.cookie_file)?;
    println!(
        "Converted {} cookies into {}",
        bundle.len(),
        config.auth.cookie_file.display()
    );
    Ok(())
}

async fn cmd_search(config: &Config, keyword: &str, count: usize, sort: SortOrder) -> Result<()> {
    let session = open_session(config)?;
    println!("Searching for '{keyword}'...");
    let hits = search::search(&session, keyword, count, sort, page_pace(config)).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("\nResults ({}):", hits.len());
    for hit in &hits {
        println!("\n-------------------");
        println!("@{} ({})", hit.user.screen_name, hit.user.name);
        println!("{}", hit.tweet.text);
        println!("Posted: {}", hit.tweet.created_at);
        println!(
            "Reposts: {}, Likes: {}",
            hit.tweet.repost_count, hit.tweet.like_count
        );
        if !hit.keyword_locations.is_empty() {
            println!("Keyword found in: {:?}", hit.keyword_locations);
        }
    }

    let sink = ResultSink::init(&config.output.search_dir)?;
    let path = sink.save_json("search", keyword, &hits)?;
    println!("\nSaved results to {}", path.display());
    Ok(())
}

async fn cmd_profile(config: &Config, handle: &str, tweet_count: usize) -> Result<()> {
    let session = open_session(config)?;
    let user = profile::user_by_handle(&session, handle).await?;

    println!("\nProfile:");
    println!("{} (@{})", user.name, user.screen_name);
    println!("{}", user.description);
    println!(
        "Followers: {}, Following: {}, Tweets: {}",
        user.followers_count, user.following_count, user.tweets_count
    );

    let tweets = profile::user_tweets(
        &session,
        &user.user_id,
        TimelineKind::Tweets,
        tweet_count,
        page_pace(config),
    )
    .await?;

    println!("\nRecent tweets ({}):", tweets.len());
    for tweet in &tweets {
        println!("\n-------------------");
        println!("{}", tweet.text);
        println!("Posted: {}", tweet.created_at);
        println!("Reposts: {}, Likes: {}", tweet.repost_count, tweet.like_count);
    }

    let sink = ResultSink::init(&config.output.profile_dir)?;
    let path = sink.save_json(
        "profile",
        handle,
        &serde_json::json!({ "profile": user, "tweets": tweets }),
    )?;
    println!("\nSaved profile to {}", path.display());
    Ok(())
}

async fn cmd_followers(
    config: &Config,
    count: usize,
    follower_limit: usize,
    per_follower: usize,
) -> Result<()> {
    let session = open_session(config)?;
    let self_handle = session.verify().await?;
    println!("Authenticated as @{self_handle}");

    let me = profile::user_by_handle(&session, &self_handle).await?;
    let scan = FollowerScan {
        follower_limit,
        tweets_per_follower: per_follower,
        quota: count,
        user_delay: Duration::from_secs(config.pacing.follower_delay_secs),
    };

    println!("Collecting today's tweets from the latest followers...");
    let tweets = followers::followers_tweets_today(&session, &me.user_id, &scan).await?;

    println!("\nCollected {} tweets:", tweets.len());
    for tweet in &tweets {
        println!("\n-------------------");
        println!("@{} ({})", tweet.screen_name, tweet.user_name);
        println!("{}", tweet.text);
        println!("Posted: {}", tweet.created_at);
    }

    if !tweets.is_empty() {
        let sink = ResultSink::init(&config.output.follower_dir)?;
        let path = sink.save_json("followers_tweets", "", &tweets)?;
        println!("\nSaved tweets to {}", path.display());
    }
    Ok(())
}

async fn cmd_replies(
    config: &Config,
    handle: &str,
    scan: usize,
    min_count: u64,
    source: SourceArg,
    table: bool,
) -> Result<()> {
    let session = open_session(config)?;
    let target = profile::user_by_handle(&session, handle).await?;
    println!("Scanning @{}'s replies...", target.screen_name);

    let (kind, mention_source) = match source {
        SourceArg::Text => (TimelineKind::Replies, MentionSource::TextMentions),
        SourceArg::Structured => (TimelineKind::Tweets, MentionSource::StructuredReply),
    };

    let scanned = profile::user_tweets(
        &session,
        &target.user_id,
        kind,
        scan,
        page_pace(config),
    )
    .await?;

    let mut tally = ReplyTally::new(&target.screen_name);
    for tweet in &scanned {
        tally.observe(tweet, mention_source);
    }
    println!(
        "Scanned {} tweets; {} reply occurrences counted",
        scanned.len(),
        tally.total()
    );

    if tally.is_empty() {
        println!("No replies found.");
        return Ok(());
    }

    // Enrich each qualifying handle with their profile and a few recent
    // tweets; a failing lookup skips that handle.
    let mut repliers: Vec<FrequentReplier> = Vec::new();
    for (reply_handle, reply_count) in tally.most_common(min_count) {
        let user = match profile::user_by_handle(&session, &reply_handle).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!("skipping @{reply_handle}: {err:#}");
                continue;
            }
        };
        let recent_tweets = profile::user_tweets(
            &session,
            &user.user_id,
            TimelineKind::Tweets,
            3,
            page_pace(config),
        )
        .await
        .unwrap_or_default();
        println!("Fetched @{reply_handle} ({reply_count} replies)");
        repliers.push(FrequentReplier {
            profile: user,
            reply_count,
            recent_tweets,
        });
    }

    if repliers.is_empty() {
        println!("No users with at least {min_count} replies.");
        return Ok(());
    }

    println!(
        "\nUsers with at least {} replies ({}):",
        min_count,
        repliers.len()
    );
    for replier in &repliers {
        println!("\n-------------------");
        println!(
            "{} (@{})",
            replier.profile.name, replier.profile.screen_name
        );
        println!("Replies: {}", replier.reply_count);
        println!(
            "Followers: {}, Following: {}",
            replier.profile.followers_count, replier.profile.following_count
        );
    }

    let sink = ResultSink::init(&config.output.reply_dir)?;
    let path = sink.save_json("analysis", handle, &repliers)?;
    println!("\nSaved analysis to {}", path.display());

    if table {
        let path = sink.save_table(
            "analysis",
            handle,
            &[
                "analyzed_user",
                "analyzed_at",
                "name",
                "handle",
                "bio",
                "account_created",
                "reply_count",
                "followers",
                "following",
                "tweets",
                "location",
                "avatar_url",
                "profile_url",
                "recent_tweets",
            ],
            &table_rows(handle, &repliers),
        )?;
        println!("Saved table to {}", path.display());
    }
    Ok(())
}

fn table_rows(analyzed: &str, repliers: &[FrequentReplier]) -> Vec<Vec<String>> {
    let analyzed_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
    repliers
        .iter()
        .map(|r| {
            let recent = r
                .recent_tweets
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            vec![
                analyzed.to_string(),
                analyzed_at.clone(),
                r.profile.name.clone(),
                format!("@{}", r.profile.screen_name),
                r.profile.description.clone(),
                r.profile.created_at.clone(),
                r.reply_count.to_string(),
                r.profile.followers_count.to_string(),
                r.profile.following_count.to_string(),
                r.profile.tweets_count.to_string(),
                r.profile.location.clone(),
                r.profile.profile_image_url.clone(),
                r.profile.profile_url(),
                recent,
            ]
        })
        .collect()
}

async fn cmd_pipeline(config: &Config, keyword: &str, count: usize) -> Result<()> {
    let session = open_session(config)?;

    let composer_key = std::env::var(&config.pipeline.composer_key_env).with_context(|| {
        format!(
            "composer API key not set; export {}",
            config.pipeline.composer_key_env
        )
    })?;
    let sheet_token = std::env::var(&config.pipeline.sheet_key_env).with_context(|| {
        format!(
            "sheet token not set; export {}",
            config.pipeline.sheet_key_env
        )
    })?;

    println!("Collecting top tweets for '{keyword}'...");
    let hits = search::search(
        &session,
        keyword,
        count,
        SortOrder::Top,
        page_pace(config),
    )
    .await?;
    println!("Collected {} tweets", hits.len());

    let pipeline = Pipeline {
        composer: ChatComposer::new(
            config.pipeline.composer_endpoint.clone(),
            config.pipeline.composer_model.clone(),
            composer_key,
        ),
        sheet: SheetClient::new(
            config.pipeline.sheet_endpoint.clone(),
            config.pipeline.sheet_id.clone(),
            sheet_token,
        ),
        approver: StdinApprover,
        poster: SessionPoster { session: &session },
        top_n: config.pipeline.top_n,
        post_interval: Duration::from_secs(config.pacing.post_interval_secs),
    };

    let report = pipeline.run(hits).await?;
    println!(
        "\nPipeline finished: {} collected, {} posted, {} skipped{}",
        report.collected,
        report.posted.len(),
        report.skipped,
        if report.sheet_appended {
            ""
        } else {
            " (sheet append failed)"
        }
    );
    Ok(())
}
