//! Enumerating all posts of a user through the paginated action log.

use std::future::Future;

use anyhow::Result;
use fnv::FnvHashSet;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::info;

use crate::forum::Forum;
use crate::post::PostReference;

/// Run `task` for every item with at most `limit` tasks in flight.
///
/// Results are returned in the order the items were submitted, not in the
/// order the tasks completed. The first error aborts the whole batch.
pub async fn ordered_fan_out<I, F, Fut, T>(items: I, limit: usize, task: F) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream::iter(items.into_iter().map(task))
        .buffered(limit.max(1))
        .try_collect()
        .await
}

/// Offsets of all action log pages needed to cover `post_count` posts plus
/// `slack` posts the summary does not count.
pub fn page_offsets(post_count: u64, slack: u64, page_size: u64) -> impl Iterator<Item = u64> {
    (0..post_count.saturating_add(slack)).step_by(page_size.max(1) as usize)
}

/// All posts `username` authored, in page order.
///
/// The same reference may show up more than once, see [`dedup`].
pub async fn collect_post_ids(forum: &Forum, username: &str) -> Result<Vec<PostReference>> {
    let config = forum.config();
    let post_count = forum.post_count(username).await?;
    let offsets: Vec<u64> = page_offsets(
        post_count,
        config.deleted_posts_slack(),
        config.page_size(),
    )
    .collect();
    info!(
        "{} declares {} posts, requesting {} pages",
        username,
        post_count,
        offsets.len()
    );

    let pages = ordered_fan_out(offsets, config.id_workers(), |offset| {
        forum.user_actions(username, offset)
    })
    .await?;

    Ok(pages.into_iter().flatten().collect())
}

/// Remove repeated references, keeping the first occurrence.
pub fn dedup(references: Vec<PostReference>) -> Vec<PostReference> {
    let mut seen = FnvHashSet::default();
    references
        .into_iter()
        .filter(|reference| seen.insert(*reference))
        .collect()
}
