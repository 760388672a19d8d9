use std::path::PathBuf;

use ab_glyph::FontVec;
use anyhow::Result;
use fnv::FnvHashMap;
use log::info;

use crate::clean::{DefaultDocumentCleaner, DocumentCleaner};
use crate::cloud::WordCloud;
use crate::collect::{collect_post_ids, dedup};
use crate::emoji;
use crate::forum::Forum;
use crate::keywords::{KeywordAnalyzer, KeywordFrequencyTable};
use crate::post::{CleanedPost, PostReference};
use crate::storage::OutputStore;

/// Turn fetched bodies into cleaned posts, dropping posts that no longer
/// exist.
pub fn clean_posts<C: DocumentCleaner>(
    cleaner: &C,
    fetched: Vec<(PostReference, Option<String>)>,
) -> Vec<CleanedPost> {
    fetched
        .into_iter()
        .filter_map(|(reference, body)| {
            body.map(|body| CleanedPost {
                reference: Some(reference),
                ..cleaner.extract(&body)
            })
        })
        .collect()
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub username: String,
    /// Number of references the action log yielded, duplicates included.
    pub references: usize,
    /// Number of posts that still existed.
    pub posts: usize,
    /// Number of posts with text left after cleaning.
    pub corpus: usize,
    pub keywords: KeywordFrequencyTable,
    pub emoji: FnvHashMap<String, usize>,
    /// Location of the rendered word cloud, if one was rendered.
    pub cloud: Option<PathBuf>,
}

/// Ties the stages together: collect ids, fetch, clean, rank, render and
/// store everything.
pub struct Pipeline<C: DocumentCleaner = DefaultDocumentCleaner> {
    forum: Forum,
    cleaner: C,
    analyzer: KeywordAnalyzer,
    store: OutputStore,
    cloud: Option<(WordCloud, FontVec)>,
}

impl<C: DocumentCleaner> std::fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("forum", &self.forum)
            .field("analyzer", &self.analyzer)
            .field("store", &self.store)
            .field("cloud", &self.cloud.as_ref().map(|(cloud, _)| cloud))
            .finish()
    }
}

impl Pipeline {
    pub fn new(forum: Forum, analyzer: KeywordAnalyzer, store: OutputStore) -> Self {
        Self {
            forum,
            cleaner: DefaultDocumentCleaner,
            analyzer,
            store,
            cloud: None,
        }
    }
}

impl<C: DocumentCleaner> Pipeline<C> {
    pub fn with_cleaner<T: DocumentCleaner>(self, cleaner: T) -> Pipeline<T> {
        Pipeline {
            forum: self.forum,
            cleaner,
            analyzer: self.analyzer,
            store: self.store,
            cloud: self.cloud,
        }
    }

    /// Also render a word cloud with the already loaded `font`.
    pub fn word_cloud(mut self, cloud: WordCloud, font: FontVec) -> Self {
        self.cloud = Some((cloud, font));
        self
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub async fn run(&self, username: &str) -> Result<Report> {
        info!("collecting posts of {}", username);
        let mut references = collect_post_ids(&self.forum, username).await?;
        let found = references.len();
        info!("found {} posts of {}", found, username);
        self.store.write_post_ids(&references)?;

        if self.forum.config().dedup_post_refs() {
            references = dedup(references);
        }

        let fetched = self.forum.fetch_posts(&references).await?;
        let posts = clean_posts(&self.cleaner, fetched);
        info!("fetched {} of {} posts", posts.len(), references.len());
        self.store.write_contexts(&posts)?;

        let corpus: Vec<&str> = posts
            .iter()
            .filter(|post| post.has_text())
            .map(|post| post.text.as_str())
            .collect();
        let keywords = self.analyzer.rank_keywords(&corpus);
        info!(
            "ranked {} keywords over {} posts with text",
            keywords.len(),
            corpus.len()
        );
        self.store.write_keywords(&keywords)?;

        let cloud = match &self.cloud {
            Some((cloud, font)) => {
                let path = self.store.cloud_path(username);
                cloud.render_to_file(&keywords, font, &path)?;
                info!("word cloud stored at {}", path.display());
                Some(path)
            }
            None => None,
        };

        let emoji = emoji::tally(posts.iter().map(|post| &post.emoji_titles));
        self.store.write_emoji(&emoji)?;

        Ok(Report {
            username: username.to_string(),
            references: found,
            posts: posts.len(),
            corpus: corpus.len(),
            keywords,
            emoji,
            cloud,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_posts_are_dropped() {
        let fetched = vec![
            (PostReference::new(1, 1), Some("<p>hello</p>".to_string())),
            (PostReference::new(1, 2), None),
            (
                PostReference::new(2, 1),
                Some(r#"<p><img class="emoji" title=":smile:"></p>"#.to_string()),
            ),
        ];
        let posts = clean_posts(&DefaultDocumentCleaner, fetched);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].reference, Some(PostReference::new(1, 1)));
        assert_eq!(posts[0].text, "hello");
        assert_eq!(posts[1].reference, Some(PostReference::new(2, 1)));
        assert!(!posts[1].has_text());
        assert_eq!(posts[1].emoji_titles, vec![":smile:".to_string()]);
    }
}
