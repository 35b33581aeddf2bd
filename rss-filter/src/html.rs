//! HTML views for the index and stats pages.

use crate::cache::CacheStatus;
use crate::stats::{FeedReport, RecentPost};
use maud::{html, Markup, DOCTYPE};

pub fn index_page<'a>(feeds: impl IntoIterator<Item = &'a str>) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head { title { "Feeds list" } }
            body {
                h1 { "Feeds list" }
                ul {
                    @for name in feeds {
                        li { a href=(format!("{name}.rss")) { (name) } }
                    }
                }
                p { a href="stats" { "Filter statistics" } }
            }
        }
    }
}

pub fn stats_page(reports: &[FeedReport], cache: &[CacheStatus]) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head { title { "Filter statistics" } }
            body {
                h1 { "Filter statistics" }
                @if reports.is_empty() {
                    p { "No feeds have been requested yet." }
                }
                @for report in reports {
                    (feed_section(report))
                }
                h2 { "Upstream cache" }
                table {
                    tr { th { "URL" } th { "Age (s)" } th { "Posts" } th { "Last error" } }
                    @for status in cache {
                        tr {
                            td { a href=(status.url) { (status.url) } }
                            td {
                                @if let Some(age) = status.age_secs { (age) } @else { "-" }
                            }
                            td { (status.posts) }
                            td { (status.last_error.as_deref().unwrap_or("")) }
                        }
                    }
                }
            }
        }
    }
}

fn feed_section(report: &FeedReport) -> Markup {
    html! {
        h2 { (report.name) }
        p {
            "Passed: " (report.counters.passed) ", blocked: " (report.counters.blocked)
        }
        table {
            tr { th { "Title" } th { "Creator" } th { "Categories" } th { "Reason" } }
            tr { td colspan="4" { h3 { "Blocked" } } }
            @for post in &report.blocked { (post_row(post)) }
            tr { td colspan="4" { h3 { "Passed" } } }
            @for post in &report.passed { (post_row(post)) }
        }
        (tally_table("Blocked categories", "Category", &report.blocked_categories))
        (tally_table("Passed categories", "Category", &report.passed_categories))
        (tally_table("Blocked creators", "Creator", &report.blocked_creators))
        (tally_table("Passed creators", "Creator", &report.passed_creators))
    }
}

fn post_row(post: &RecentPost) -> Markup {
    html! {
        tr {
            td { a href=(post.link) { (post.title) } }
            td { (post.creator) }
            td { (post.categories.join(", ")) }
            td { (post.reason) }
        }
    }
}

fn tally_table(caption: &str, column: &str, rows: &[(String, usize)]) -> Markup {
    html! {
        h3 { (caption) }
        table {
            tr { th { (column) } th { "Count" } }
            @for (value, count) in rows {
                tr { td { (value) } td { (count) } }
            }
        }
    }
}
