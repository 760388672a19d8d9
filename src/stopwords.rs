use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::iter::FromIterator;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::ShuiyuanError;

/// Punctuation, whitespace and filler words the word list misses.
pub const EXTRA_STOPWORDS: &[&str] = &[
    " ", "", ",", "，", "。", ".", ":", "：", "“", "”", "、", "；", "(", ")", "（", "）", "《", "》",
    "？", "！", "!", "\u{a0}", "\u{3000}", "\t", "\n", "一个", "两个", "三个", "几个", "好像",
    "?",
];

/// An immutable set of words the keyword analysis ignores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWords {
    words: HashSet<String>,
}

impl Deref for StopWords {
    type Target = HashSet<String>;

    fn deref(&self) -> &Self::Target {
        &self.words
    }
}

impl StopWords {
    /// Location of the word list shipped with the crate.
    pub fn bundled_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/baidu_stopwords.txt")
    }

    /// The shipped word list together with the [`EXTRA_STOPWORDS`].
    pub fn bundled() -> Result<Self> {
        Ok(Self::read_from(Self::bundled_path())?.with_extra())
    }

    /// Read a word list with one word per line.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = match fs::File::open(path) {
            Ok(f) => f,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ShuiyuanError::ResourceNotFound {
                    kind: "stopword list",
                    path: path.to_path_buf(),
                }
                .into())
            }
            Err(err) => {
                return Err(err).context(format!("Failed to open {}", path.display()));
            }
        };
        let words: HashSet<_> = BufReader::new(f)
            .lines()
            .collect::<io::Result<_>>()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self { words })
    }

    /// Add the [`EXTRA_STOPWORDS`].
    pub fn with_extra(self) -> Self {
        self.with_words(EXTRA_STOPWORDS.iter().copied())
    }

    pub fn with_words<I, T>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.words.extend(words.into_iter().map(Into::into));
        self
    }
}

impl<T: Into<String>> FromIterator<T> for StopWords {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::default().with_words(iter)
    }
}
