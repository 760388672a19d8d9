use fnv::FnvHashMap;

/// Count how often every emoji occurs across all posts.
pub fn tally<I, P, S>(all_emoji_titles: I) -> FnvHashMap<String, usize>
where
    I: IntoIterator<Item = P>,
    P: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = FnvHashMap::default();
    for title in all_emoji_titles.into_iter().flatten() {
        *counts.entry(title.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

/// The tally ordered by descending count, ties by name.
pub fn ranked(tally: &FnvHashMap<String, usize>) -> Vec<(&str, usize)> {
    let mut ranked: Vec<_> = tally
        .iter()
        .map(|(title, count)| (title.as_str(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}
