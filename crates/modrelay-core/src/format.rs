//! Rendering of queue items into Discord embeds.

use crate::source::{CommentItem, ItemContent, ItemDescriptor, PostItem, Report};
use serde::{Deserialize, Serialize};

const COMMENT_COLOR: u32 = 0xEEEEEE;
const POST_COLOR: u32 = 0x00BCD4;

const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;

// ---------------------------------------------------------------------------
// Embed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

/// Discord embed object, serialized as-is into the webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub url: String,
    pub color: u32,
    pub author: EmbedAuthor,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumbnail: Option<EmbedThumbnail>,
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Pure rendering of an item into a notification payload.
pub trait Formatter {
    fn render(&self, item: &ItemDescriptor) -> Embed;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedFormatter;

impl Formatter for EmbedFormatter {
    fn render(&self, item: &ItemDescriptor) -> Embed {
        match &item.content {
            ItemContent::Comment(c) => comment_embed(c),
            ItemContent::Post(p) => post_embed(p),
        }
    }
}

fn comment_embed(comment: &CommentItem) -> Embed {
    let reports = report_lines(&comment.reports);
    let description = if reports.is_empty() {
        comment.body.clone()
    } else {
        format!("{}\n\n{}", comment.body, reports)
    };
    Embed {
        title: truncate(&format!("Comment by {}", comment.author), TITLE_LIMIT),
        description: truncate(&description, DESCRIPTION_LIMIT),
        url: format!("https://reddit.com{}", comment.permalink),
        color: COMMENT_COLOR,
        author: EmbedAuthor {
            name: format!("u/{}", comment.author),
        },
        thumbnail: None,
    }
}

fn post_embed(post: &PostItem) -> Embed {
    let title = if post.is_self {
        post.title.clone()
    } else {
        format!("{} ({})", post.title, post.domain)
    };
    // Self posts never carry a meaningful preview image.
    let thumbnail = if post.is_self {
        None
    } else {
        post.thumbnail
            .as_ref()
            .map(|url| EmbedThumbnail { url: url.clone() })
    };
    Embed {
        title: truncate(&title, TITLE_LIMIT),
        description: truncate(&report_lines(&post.reports), DESCRIPTION_LIMIT),
        url: format!("https://redd.it/{}", post.id),
        color: POST_COLOR,
        author: EmbedAuthor {
            name: format!("u/{}", post.author),
        },
        thumbnail,
    }
}

fn report_lines(reports: &[Report]) -> String {
    reports
        .iter()
        .map(|r| format!("{}: {}", r.source, r.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `limit` characters, ending in an ellipsis when cut.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit - 1).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(source: &str, reason: &str) -> Report {
        Report {
            source: source.into(),
            reason: reason.into(),
        }
    }

    fn link_post() -> PostItem {
        PostItem {
            id: "xyz".into(),
            author: "alice".into(),
            title: "Fan art".into(),
            domain: "i.imgur.com".into(),
            is_self: false,
            thumbnail: Some("https://preview.redd.it/x.png".into()),
            reports: vec![report("1", "spam")],
        }
    }

    #[test]
    fn comment_embed_includes_body_and_reports() {
        let item = ItemDescriptor::new(
            "t1_abc",
            ItemContent::Comment(CommentItem {
                author: "bob".into(),
                body: "rude words".into(),
                permalink: "/r/sub/comments/p/t/abc/".into(),
                reports: vec![report("modguy", "rule 1"), report("2", "harassment")],
            }),
        );
        let embed = EmbedFormatter.render(&item);
        assert_eq!(embed.title, "Comment by bob");
        assert_eq!(embed.description, "rude words\n\nmodguy: rule 1\n2: harassment");
        assert_eq!(embed.url, "https://reddit.com/r/sub/comments/p/t/abc/");
        assert_eq!(embed.color, COMMENT_COLOR);
        assert_eq!(embed.author.name, "u/bob");
        assert!(embed.thumbnail.is_none());
    }

    #[test]
    fn link_post_shows_domain_and_thumbnail() {
        let embed = EmbedFormatter.render(&ItemDescriptor::new("t3_xyz", ItemContent::Post(link_post())));
        assert_eq!(embed.title, "Fan art (i.imgur.com)");
        assert_eq!(embed.description, "1: spam");
        assert_eq!(embed.url, "https://redd.it/xyz");
        assert_eq!(embed.color, POST_COLOR);
        assert_eq!(
            embed.thumbnail.map(|t| t.url).as_deref(),
            Some("https://preview.redd.it/x.png")
        );
    }

    #[test]
    fn self_post_has_plain_title_and_no_thumbnail() {
        let mut post = link_post();
        post.is_self = true;
        let embed = EmbedFormatter.render(&ItemDescriptor::new("t3_xyz", ItemContent::Post(post)));
        assert_eq!(embed.title, "Fan art");
        assert!(embed.thumbnail.is_none());
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let long = "é".repeat(5000);
        let out = truncate(&long, DESCRIPTION_LIMIT);
        assert_eq!(out.chars().count(), DESCRIPTION_LIMIT);
        assert!(out.ends_with('\u{2026}'));
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn empty_description_is_omitted_from_json() {
        let mut post = link_post();
        post.reports.clear();
        let embed = EmbedFormatter.render(&ItemDescriptor::new("t3_xyz", ItemContent::Post(post)));
        let json = serde_json::to_value(&embed).unwrap();
        assert!(json.get("description").is_none());
        assert_eq!(json["author"]["name"], "u/alice");
    }
}
