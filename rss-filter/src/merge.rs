use crate::types::Post;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::debug;

/// Concatenate upstream sequences in the given order and drop duplicates.
///
/// A post is a duplicate if its identity or its link was already seen, and
/// the first occurrence wins, so earlier upstreams take precedence. The
/// result is ordered newest first; undated posts follow the dated ones.
/// The sort is stable, so ties keep their first-occurrence order.
pub fn merge_and_dedup<I, S>(sources: I) -> Vec<Post>
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = Post>,
{
    let mut seen_identities = HashSet::new();
    let mut seen_links = HashSet::new();
    let mut merged = Vec::new();
    let mut total = 0usize;

    for post in sources.into_iter().flatten() {
        total += 1;
        let new_identity = !seen_identities.contains(&post.identity);
        let new_link = !seen_links.contains(&post.link);
        if new_identity && new_link {
            seen_identities.insert(post.identity.clone());
            seen_links.insert(post.link.clone());
            merged.push(post);
        } else {
            debug!("Removing duplicate entry: {} ({})", post.title, post.link);
        }
    }

    if merged.len() < total {
        debug!("Removed {} duplicate entries", total - merged.len());
    }

    merged.sort_by_key(|post| match post.published_at {
        Some(at) => (0, Reverse(Some(at))),
        None => (1, Reverse(None)),
    });
    merged
}
