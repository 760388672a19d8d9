use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fnv::FnvHashMap;
use serde::Serialize;

use crate::emoji;
use crate::keywords::KeywordFrequencyTable;
use crate::post::{CleanedPost, PostReference};

/// Row of `context.csv`.
#[derive(Debug, Serialize)]
struct ContextRow<'a> {
    topic: u64,
    post: u64,
    context: &'a str,
}

/// Row of `emoji.csv`.
#[derive(Debug, Serialize)]
struct EmojiRow<'a> {
    #[serde(rename = "Emoji")]
    emoji: &'a str,
    #[serde(rename = "Count")]
    count: usize,
}

/// The files of a single run. Existing files are overwritten.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub const POST_IDS: &'static str = "post_id.txt";
    pub const CONTEXT: &'static str = "context.csv";
    pub const KEYWORDS: &'static str = "keywords.csv";
    pub const EMOJI: &'static str = "emoji.csv";

    pub fn new<T: AsRef<Path>>(dir: T) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Create the directory if it does not exist yet.
    pub fn create(self) -> Result<Self> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Where the word cloud of `username` goes.
    pub fn cloud_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}.png", username))
    }

    /// One `topic_id,post_number` line per reference.
    pub fn write_post_ids(&self, references: &[PostReference]) -> Result<PathBuf> {
        let path = self.path(Self::POST_IDS);
        let mut out = BufWriter::new(
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
        );
        for reference in references {
            writeln!(out, "{}", reference)?;
        }
        out.flush()?;
        Ok(path)
    }

    pub fn read_post_ids(&self) -> Result<Vec<PostReference>> {
        let path = self.path(Self::POST_IDS);
        let f = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut references = Vec::new();
        for line in BufReader::new(f).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            references.push(line.parse()?);
        }
        Ok(references)
    }

    /// Posts with text as `topic,post,context`.
    pub fn write_contexts(&self, posts: &[CleanedPost]) -> Result<PathBuf> {
        let path = self.path(Self::CONTEXT);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for post in posts.iter().filter(|post| post.has_text()) {
            let reference = post.reference.unwrap_or_default();
            writer.serialize(ContextRow {
                topic: reference.topic_id,
                post: reference.post_number,
                context: &post.text,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// The keyword table as `Keyword,Frequency`.
    pub fn write_keywords(&self, table: &KeywordFrequencyTable) -> Result<PathBuf> {
        let path = self.path(Self::KEYWORDS);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for row in table.iter() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// The emoji tally as `Emoji,Count`, most used first.
    pub fn write_emoji(&self, tally: &FnvHashMap<String, usize>) -> Result<PathBuf> {
        let path = self.path(Self::EMOJI);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for (emoji, count) in emoji::ranked(tally) {
            writer.serialize(EmojiRow { emoji, count })?;
        }
        writer.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KeywordFrequency;

    #[test]
    fn post_ids_roundtrip_with_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("user")).create().unwrap();
        let refs = vec![
            PostReference::new(10, 1),
            PostReference::new(10, 2),
            PostReference::new(10, 1),
            PostReference::new(7, 33),
        ];
        store.write_post_ids(&refs).unwrap();
        assert_eq!(
            fs::read_to_string(store.path(OutputStore::POST_IDS)).unwrap(),
            "10,1\n10,2\n10,1\n7,33\n"
        );
        assert_eq!(store.read_post_ids().unwrap(), refs);
    }

    #[test]
    fn contexts_skip_empty_posts() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let posts = vec![
            CleanedPost {
                reference: Some(PostReference::new(1, 2)),
                text: "你好,世界".to_string(),
                emoji_titles: vec![],
            },
            CleanedPost {
                reference: Some(PostReference::new(1, 3)),
                text: String::new(),
                emoji_titles: vec![":smile:".to_string()],
            },
        ];
        store.write_contexts(&posts).unwrap();
        assert_eq!(
            fs::read_to_string(store.path(OutputStore::CONTEXT)).unwrap(),
            "topic,post,context\n1,2,\"你好,世界\"\n"
        );
    }

    #[test]
    fn keyword_and_emoji_tables() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let table = KeywordFrequencyTable::new(vec![
            KeywordFrequency {
                keyword: "鱼".to_string(),
                frequency: 0.5,
            },
            KeywordFrequency {
                keyword: "猫".to_string(),
                frequency: 1.5,
            },
        ]);
        store.write_keywords(&table).unwrap();
        assert_eq!(
            fs::read_to_string(store.path(OutputStore::KEYWORDS)).unwrap(),
            "Keyword,Frequency\n猫,1.5\n鱼,0.5\n"
        );

        let tally = emoji::tally(vec![vec!["cry", "smile", "smile"]]);
        store.write_emoji(&tally).unwrap();
        assert_eq!(
            fs::read_to_string(store.path(OutputStore::EMOJI)).unwrap(),
            "Emoji,Count\nsmile,2\ncry,1\n"
        );
    }
}
