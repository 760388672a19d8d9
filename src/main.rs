use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::info;
use structopt::StructOpt;
use url::Url;

use shuiyuan::cloud::load_font;
use shuiyuan::{
    emoji, read_cookie, Config, Forum, KeywordAnalyzer, OutputStore, Pipeline, StopWords,
    WordCloud,
};

#[allow(missing_docs)]
#[derive(Debug, StructOpt)]
#[structopt(
    name = "shuiyuan",
    about = "Collect the post history of a forum user and summarize keywords and emoji."
)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
struct App {
    #[structopt(
        name = "username",
        help = "The user whose posts to collect. Asked for interactively if omitted."
    )]
    username: Option<String>,
    #[structopt(
        long = "cookies",
        help = "File holding the session cookie.",
        default_value = "cookies.txt",
        parse(from_os_str)
    )]
    cookies: PathBuf,
    #[structopt(
        long = "output",
        short = "o",
        help = "Directory for all output files, defaults to the username.",
        parse(from_os_str)
    )]
    output: Option<PathBuf>,
    #[structopt(
        long = "font",
        help = "Font used to render the word cloud.",
        parse(from_os_str)
    )]
    font: Option<PathBuf>,
    #[structopt(
        long = "stopwords",
        help = "Word list with one stopword per line, the bundled list is used otherwise.",
        parse(from_os_str)
    )]
    stopwords: Option<PathBuf>,
    #[structopt(flatten)]
    opts: Opts,
}

#[derive(Debug, Clone, StructOpt)]
pub struct Opts {
    #[structopt(long = "base-url", help = "Root of the forum.")]
    base_url: Option<Url>,
    #[structopt(
        long = "slack",
        help = "Additional posts to page through to also reach deleted ones."
    )]
    slack: Option<u64>,
    #[structopt(long = "workers", help = "Max. concurrent requests for post bodies.")]
    workers: Option<usize>,
    #[structopt(long = "timeout", help = "Request timeout in seconds, 0 disables it.")]
    timeout: Option<u64>,
    #[structopt(
        long = "dedup",
        help = "Fetch and count a post once even if the action log lists it repeatedly."
    )]
    dedup: bool,
}

impl Opts {
    fn as_config(&self, cookie: String) -> anyhow::Result<Config> {
        let mut config = Config::builder().cookie(cookie);
        if let Some(base_url) = self.base_url.clone() {
            config = config.base_url(base_url)?;
        }
        if let Some(slack) = self.slack {
            config = config.deleted_posts_slack(slack);
        }
        if let Some(workers) = self.workers {
            config = config.post_workers(workers);
        }
        if let Some(timeout) = self.timeout {
            config = config.request_timeout(if timeout == 0 {
                None
            } else {
                Some(Duration::from_secs(timeout))
            });
        }
        if self.dedup {
            config = config.dedup_post_refs(true);
        }

        Ok(config.build())
    }
}

impl App {
    async fn run(self) -> anyhow::Result<()> {
        let username = match self.username {
            Some(username) => username,
            None => prompt_username()?,
        };

        // everything local first, so a missing file fails before any request
        let cookie = read_cookie(&self.cookies)?;
        let stopwords = match &self.stopwords {
            Some(path) => StopWords::read_from(path)?.with_extra(),
            None => StopWords::bundled()?,
        };
        let cloud = match &self.font {
            Some(font) => WordCloud::default().font_path(font),
            None => WordCloud::default(),
        };
        let font = load_font(&cloud.font_path)?;
        let store = OutputStore::new(self.output.unwrap_or_else(|| PathBuf::from(&username)))
            .create()?;

        let forum = Forum::new(self.opts.as_config(cookie)?)?;
        let pipeline = Pipeline::new(forum, KeywordAnalyzer::new(stopwords), store)
            .word_cloud(cloud, font);
        let report = pipeline.run(&username).await?;

        info!("outputs stored in {}", pipeline.store().dir().display());
        println!(
            "{}: {} references, {} posts, {} with text, {} keywords",
            report.username,
            report.references,
            report.posts,
            report.corpus,
            report.keywords.len()
        );
        if let Some(cloud) = &report.cloud {
            println!("word cloud: {}", cloud.display());
        }
        for (title, count) in emoji::ranked(&report.emoji) {
            println!("{}\t{}", title, count);
        }
        Ok(())
    }
}

fn prompt_username() -> anyhow::Result<String> {
    print!("username: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read username")?;
    let username = line.trim();
    if username.is_empty() {
        return Err(anyhow!("no username given"));
    }
    Ok(username.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    App::from_args().run().await
}
