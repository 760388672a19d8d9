use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Marker the forum puts into the body of a post its author deleted.
pub const DELETED_BY_AUTHOR: &str = "（帖子已被作者删除）";

/// Identifies a single post of a user: the topic and the post's sequence
/// number inside that topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostReference {
    pub topic_id: u64,
    pub post_number: u64,
}

impl PostReference {
    pub fn new(topic_id: u64, post_number: u64) -> Self {
        Self {
            topic_id,
            post_number,
        }
    }
}

/// Same format as a line of the id list file: `topic_id,post_number`.
impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.topic_id, self.post_number)
    }
}

impl FromStr for PostReference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (topic, post) = s
            .trim()
            .split_once(',')
            .ok_or_else(|| anyhow!("expected `topic_id,post_number`, got {:?}", s))?;
        Ok(Self {
            topic_id: topic
                .trim()
                .parse()
                .with_context(|| format!("invalid topic id in {:?}", s))?,
            post_number: post
                .trim()
                .parse()
                .with_context(|| format!("invalid post number in {:?}", s))?,
        })
    }
}

/// The plain text and emoji of one post after all markup was stripped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanedPost {
    pub reference: Option<PostReference>,
    /// Empty if nothing but noise was left or the author deleted the post.
    pub text: String,
    /// Titles of all emoji images in document order.
    pub emoji_titles: Vec<String>,
}

impl CleanedPost {
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Response of `/u/{username}/summary.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryResponse {
    pub user_summary: UserSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserSummary {
    pub post_count: u64,
}

/// Response of `/user_actions.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserActionsResponse {
    #[serde(default)]
    pub user_actions: Vec<UserAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAction {
    pub topic_id: u64,
    pub post_number: u64,
}

impl From<&UserAction> for PostReference {
    fn from(action: &UserAction) -> Self {
        PostReference::new(action.topic_id, action.post_number)
    }
}

/// Response of `/t/topic/{topic_id}/{post_number}.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicResponse {
    pub post_stream: PostStream,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostStream {
    #[serde(default)]
    pub posts: Vec<TopicPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicPost {
    pub post_number: u64,
    #[serde(default)]
    pub cooked: Option<String>,
}

impl TopicResponse {
    /// The raw html body of the post with the given sequence number, if the
    /// stream contains it.
    pub fn cooked(&self, post_number: u64) -> Option<&str> {
        self.post_stream
            .posts
            .iter()
            .find(|post| post.post_number == post_number)
            .and_then(|post| post.cooked.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference() {
        let r: PostReference = "123,4".parse().unwrap();
        assert_eq!(r, PostReference::new(123, 4));
        assert_eq!(r.to_string(), "123,4");

        assert!("123".parse::<PostReference>().is_err());
        assert!("a,4".parse::<PostReference>().is_err());
    }

    #[test]
    fn locate_post_in_stream() {
        let json = r#"{"post_stream":{"posts":[
            {"post_number":1,"cooked":"<p>first</p>"},
            {"post_number":7,"cooked":"<p>seventh</p>"}
        ]}}"#;
        let topic: TopicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(topic.cooked(7), Some("<p>seventh</p>"));
        assert_eq!(topic.cooked(2), None);
    }
}
