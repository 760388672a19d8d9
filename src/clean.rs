use select::document::Document;
use select::node::Node;
use select::predicate::{Attr, Class, Name, Predicate};

use lazy_static::lazy_static;

use crate::post::{CleanedPost, DELETED_BY_AUTHOR};

/// Separator between the text fragments of a post.
pub const TEXT_SEPARATOR: &str = ",";

/// A kind of node that carries no content written by the author.
///
/// Matching nodes are skipped together with everything below them.
pub struct RemovalRule {
    /// Short name of what the rule strips, e.g. `quote`.
    pub name: &'static str,
    predicate: Box<dyn Fn(&Node) -> bool + Send + Sync>,
}

impl RemovalRule {
    pub fn new<P>(name: &'static str, predicate: P) -> Self
    where
        P: Predicate + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Box::new(move |node| predicate.matches(node)),
        }
    }

    #[inline]
    pub fn matches(&self, node: &Node) -> bool {
        (self.predicate)(node)
    }
}

impl std::fmt::Debug for RemovalRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalRule")
            .field("name", &self.name)
            .finish()
    }
}

lazy_static! {
    /// Markup the forum renders around or inside a post that is not part of
    /// what the author wrote.
    pub static ref NOISE_RULES: Vec<RemovalRule> = vec![
        RemovalRule::new("signature", Name("div").and(Attr("data-signature", ()))),
        RemovalRule::new(
            "image",
            Name("div").and(Class("lightbox-wrapper").or(Class("video-container"))),
        ),
        RemovalRule::new("onebox", Name("aside").and(Class("onebox"))),
        RemovalRule::new("math", Class("math")),
        RemovalRule::new("poll", Name("div").and(Class("poll-info"))),
        RemovalRule::new("local-date", Name("span").and(Class("discourse-local-date"))),
        RemovalRule::new("code", Name("code")),
        RemovalRule::new("quote", Name("aside").and(Class("quote"))),
        // mentions, links and attachments
        RemovalRule::new("link", Name("a")),
    ];
}

pub trait DocumentCleaner {
    /// The nodes to ignore.
    fn removal_rules(&self) -> &[RemovalRule];

    fn is_noise(&self, node: &Node) -> bool {
        self.removal_rules().iter().any(|rule| rule.matches(node))
    }

    /// Whether the node is an emoji image.
    fn is_emoji(&self, node: &Node) -> bool {
        Name("img").and(Class("emoji")).matches(node)
    }

    /// Collect the trimmed, non-empty text fragments and the emoji titles of
    /// the node, skipping all noise.
    fn collect<'a>(&self, node: &Node<'a>, text: &mut Vec<&'a str>, emoji: &mut Vec<String>) {
        if self.is_noise(node) {
            return;
        }
        if let Some(fragment) = node.as_text() {
            let fragment = fragment.trim();
            if !fragment.is_empty() {
                text.push(fragment);
            }
        } else if self.is_emoji(node) {
            if let Some(title) = node.attr("title") {
                emoji.push(title.to_string());
            }
        }
        for child in node.children() {
            self.collect(&child, text, emoji);
        }
    }

    /// Strip the raw html body of a post down to its plain text and emoji.
    fn extract(&self, raw: &str) -> CleanedPost {
        let doc = Document::from(raw);
        let mut fragments = Vec::new();
        let mut emoji_titles = Vec::new();
        for root in doc.find(|node: &Node| node.parent().is_none()) {
            self.collect(&root, &mut fragments, &mut emoji_titles);
        }

        let text = if raw.contains(DELETED_BY_AUTHOR) {
            String::new()
        } else {
            fragments.join(TEXT_SEPARATOR)
        };

        CleanedPost {
            reference: None,
            text,
            emoji_titles,
        }
    }
}

/// Cleaner using the [`NOISE_RULES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDocumentCleaner;

impl DocumentCleaner for DefaultDocumentCleaner {
    fn removal_rules(&self) -> &[RemovalRule] {
        &NOISE_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(raw: &str) -> CleanedPost {
        DefaultDocumentCleaner.extract(raw)
    }

    fn rule(name: &str) -> &'static RemovalRule {
        NOISE_RULES.iter().find(|r| r.name == name).unwrap()
    }

    fn first_match(html: &str, rule: &RemovalRule) -> bool {
        let doc = Document::from(html);
        let matched = doc.find(|n: &Node| rule.matches(n)).next().is_some();
        matched
    }

    #[test]
    fn each_rule_matches_its_markup() {
        let samples = [
            ("signature", r#"<div data-signature="">sig</div>"#),
            ("image", r#"<div class="lightbox-wrapper"><img src="x"></div>"#),
            ("image", r#"<div class="video-container">v</div>"#),
            ("onebox", r#"<aside class="onebox allowlistedgeneric">o</aside>"#),
            ("math", r#"<span class="math">x^2</span>"#),
            ("poll", r#"<div class="poll-info">12 votes</div>"#),
            ("local-date", r#"<span class="discourse-local-date">2024</span>"#),
            ("code", "<pre><code>fn main() {}</code></pre>"),
            ("quote", r#"<aside class="quote no-group">q</aside>"#),
            ("link", r#"<a class="mention" href="/u/x">@x</a>"#),
        ];
        for (name, html) in samples.iter() {
            assert!(first_match(html, rule(name)), "{} did not match {}", name, html);
        }
    }

    #[test]
    fn rules_do_not_match_content() {
        let html = r#"<p class="cooked">hello <strong>world</strong></p>"#;
        for rule in NOISE_RULES.iter() {
            let doc = Document::from(html);
            let hit = doc
                .find(|n: &Node| n.name().is_some() && rule.matches(n))
                .next();
            assert!(hit.is_none(), "{} matched plain content", rule.name);
        }
    }

    #[test]
    fn noise_only_is_empty() {
        let raw = r#"
            <div data-signature="">my signature</div>
            <div class="lightbox-wrapper"><a href="/img.png"><img src="/img.png"></a></div>
            <aside class="onebox allowlistedgeneric"><header>site</header><p>preview</p></aside>
            <p><span class="math">\frac{1}{2}</span></p>
            <div class="poll-info"><span>3 voters</span></div>
            <p><span class="discourse-local-date" data-date="2024-01-01">2024-01-01</span></p>
            <pre><code>let x = 1;</code></pre>
            <aside class="quote quote-modified"><blockquote><p>quoted</p></blockquote></aside>
            <p><a class="mention" href="/u/someone">@someone</a></p>
        "#;
        assert_eq!(extract(raw).text, "");
    }

    #[test]
    fn joins_fragments_with_separator() {
        let raw = "<p>今天 天气 不错</p><p> 出去 <strong>玩</strong> </p>";
        assert_eq!(extract(raw).text, "今天 天气 不错,出去,玩");
    }

    #[test]
    fn quote_is_dropped_but_reply_kept() {
        let raw = r#"<aside class="quote no-group"><blockquote><p>他说的</p></blockquote></aside><p>我的回复</p>"#;
        assert_eq!(extract(raw).text, "我的回复");
    }

    #[test]
    fn deleted_by_author_is_empty() {
        let raw = "<p>（帖子已被作者删除）</p><p>still some text</p>";
        let post = extract(raw);
        assert_eq!(post.text, "");
        assert!(!post.has_text());
    }

    #[test]
    fn emoji_only_post() {
        let raw = r#"<p><img src="/images/emoji/smile.png" title=":smile:" class="emoji" alt=":smile:"></p>"#;
        let post = extract(raw);
        assert_eq!(post.text, "");
        assert_eq!(post.emoji_titles, vec![":smile:".to_string()]);
    }

    #[test]
    fn emoji_in_document_order() {
        let raw = r#"<p>哈哈<img class="emoji" title=":joy:"> 好<img class="emoji only-emoji" title=":cry:"><img title="not an emoji"></p>"#;
        let post = extract(raw);
        assert_eq!(post.text, "哈哈,好");
        assert_eq!(post.emoji_titles, vec![":joy:".to_string(), ":cry:".to_string()]);
    }
}
