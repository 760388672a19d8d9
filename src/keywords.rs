//! Keyword statistics over the text of all posts.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use fnv::FnvHashMap;
use jieba_rs::Jieba;
use serde::{Deserialize, Serialize};

use crate::stopwords::StopWords;

/// Separator the tokens of a document are rejoined with before vectorizing.
pub const TOKEN_SEPARATOR: &str = " ";

/// Word segmentation with stopword removal.
pub struct Tokenizer {
    jieba: Jieba,
    stopwords: StopWords,
}

impl Tokenizer {
    pub fn new(stopwords: StopWords) -> Self {
        Self {
            jieba: Jieba::new(),
            stopwords,
        }
    }

    pub fn stopwords(&self) -> &StopWords {
        &self.stopwords
    }

    /// Segment `text` into words, dropping stopwords and tokens without any
    /// letter or digit.
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .filter(|token| !self.stopwords.contains(*token) && is_word(token))
            .collect()
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

/// Whether the token contains at least one letter or digit.
fn is_word(token: &str) -> bool {
    token.chars().any(char::is_alphanumeric)
}

/// TF-IDF weighting of whitespace separated documents.
///
/// Terms are lowercased, idf is smoothed as `ln((1 + n) / (1 + df)) + 1` and
/// every document vector is l2 normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfidfVectorizer;

impl TfidfVectorizer {
    /// One sparse row of term weights per document.
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> Vec<BTreeMap<String, f64>> {
        let counts: Vec<BTreeMap<String, usize>> = documents
            .iter()
            .map(|doc| {
                let mut counts = BTreeMap::new();
                for term in doc.as_ref().split_whitespace() {
                    *counts.entry(term.to_lowercase()).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut document_frequency: FnvHashMap<&str, usize> = FnvHashMap::default();
        for row in &counts {
            for term in row.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = |term: &str| {
            let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        };

        counts
            .iter()
            .map(|row| {
                let mut weights: BTreeMap<String, f64> = row
                    .iter()
                    .map(|(term, count)| (term.clone(), *count as f64 * idf(term)))
                    .collect();
                let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    weights.values_mut().for_each(|w| *w /= norm);
                }
                weights
            })
            .collect()
    }
}

/// A keyword and its aggregated TF-IDF weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordFrequency {
    #[serde(rename = "Keyword")]
    pub keyword: String,
    #[serde(rename = "Frequency")]
    pub frequency: f64,
}

/// Keywords sorted descending by frequency, ties ascending by keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordFrequencyTable {
    rows: Vec<KeywordFrequency>,
}

impl KeywordFrequencyTable {
    pub fn new<I: IntoIterator<Item = KeywordFrequency>>(rows: I) -> Self {
        let mut rows: Vec<_> = rows.into_iter().collect();
        rows.sort_by(|a, b| {
            b.frequency
                .partial_cmp(&a.frequency)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        Self { rows }
    }

    /// Sum the weights of every term over all documents.
    pub fn from_weights(rows: &[BTreeMap<String, f64>]) -> Self {
        let mut per_term: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for row in rows {
            for (term, weight) in row {
                per_term.entry(term.as_str()).or_default().push(*weight);
            }
        }
        // summing in sorted order keeps the totals independent of document order
        Self::new(per_term.into_iter().map(|(term, mut weights)| {
            weights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            KeywordFrequency {
                keyword: term.to_string(),
                frequency: weights.iter().sum(),
            }
        }))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeywordFrequency> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[KeywordFrequency] {
        &self.rows
    }

    pub fn get(&self, keyword: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.keyword == keyword)
            .map(|row| row.frequency)
    }

    /// The highest frequency in the table.
    pub fn max_frequency(&self) -> Option<f64> {
        self.rows.first().map(|row| row.frequency)
    }
}

/// Ranks the keywords of a corpus of post texts.
#[derive(Debug)]
pub struct KeywordAnalyzer {
    tokenizer: Tokenizer,
    vectorizer: TfidfVectorizer,
}

impl KeywordAnalyzer {
    pub fn new(stopwords: StopWords) -> Self {
        Self {
            tokenizer: Tokenizer::new(stopwords),
            vectorizer: TfidfVectorizer,
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Tokens of every document.
    pub fn tokenize<'a, S: AsRef<str>>(&self, corpus: &'a [S]) -> Vec<Vec<&'a str>> {
        corpus
            .iter()
            .map(|text| self.tokenizer.tokenize(text.as_ref()))
            .collect()
    }

    pub fn rank_keywords<S: AsRef<str>>(&self, corpus: &[S]) -> KeywordFrequencyTable {
        let documents: Vec<String> = self
            .tokenize(corpus)
            .iter()
            .map(|tokens| tokens.join(TOKEN_SEPARATOR))
            .collect();
        KeywordFrequencyTable::from_weights(&self.vectorizer.fit_transform(&documents))
    }
}
