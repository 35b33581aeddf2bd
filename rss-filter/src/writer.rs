use crate::types::{AggregatorError, Post, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// Serializes posts into an RSS 2.0 document.
pub struct FeedWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl FeedWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    /// Write a complete channel named `title` containing `posts`.
    pub fn write_feed<'a, I>(mut self, title: &str, link: &str, posts: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a Post>,
    {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.event(Event::Start(
            BytesStart::new("rss").with_attributes([("version", "2.0"), ("xmlns:dc", DC_NAMESPACE)]),
        ))?;
        self.event(Event::Start(BytesStart::new("channel")))?;
        self.text_element("title", title)?;
        self.text_element("link", link)?;
        self.text_element("description", &format!("Filtered feed {title}"))?;

        for post in posts {
            self.write_item(post)?;
        }

        self.event(Event::End(BytesEnd::new("channel")))?;
        self.event(Event::End(BytesEnd::new("rss")))?;

        Ok(self.writer.into_inner().into_inner())
    }

    fn write_item(&mut self, post: &Post) -> Result<()> {
        self.event(Event::Start(BytesStart::new("item")))?;
        self.text_element("title", &post.title)?;

        if let Some(guid) = &post.guid {
            let permalink = if *guid == post.link { "true" } else { "false" };
            self.event(Event::Start(
                BytesStart::new("guid").with_attributes([("isPermaLink", permalink)]),
            ))?;
            self.event(Event::Text(BytesText::new(guid)))?;
            self.event(Event::End(BytesEnd::new("guid")))?;
        }

        self.text_element("link", &post.link)?;
        if let Some(description) = &post.description {
            self.text_element("description", description)?;
        }
        if let Some(published) = post.published_at {
            self.text_element("pubDate", &published.to_rfc2822())?;
        }
        for category in &post.categories {
            self.text_element("category", category)?;
        }
        if !post.creator.is_empty() {
            self.text_element("dc:creator", &post.creator)?;
        }

        self.event(Event::End(BytesEnd::new("item")))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| AggregatorError::Codec(e.to_string()))
    }
}

impl Default for FeedWriter {
    fn default() -> Self {
        Self::new()
    }
}
