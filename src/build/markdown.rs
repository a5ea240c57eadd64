//! Markdown rendering with pulldown-cmark.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

/// A rendered page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// Text of the first top-level heading, if any
    pub title: Option<String>,
}

fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

pub fn render(markdown: &str) -> Rendered {
    let events: Vec<Event<'_>> = Parser::new_ext(markdown, options()).collect();
    let title = first_heading(&events);

    let mut html_out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_out, events.into_iter());

    Rendered {
        html: html_out,
        title,
    }
}

/// Plain text of the first heading, preferring `h1`.
fn first_heading(events: &[Event<'_>]) -> Option<String> {
    let mut best: Option<(HeadingLevel, String)> = None;
    let mut current: Option<(HeadingLevel, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, .. }) => current = Some((*level, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if level == HeadingLevel::H1 {
                        return Some(text);
                    }
                    if best.is_none() {
                        best = Some((level, text));
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(_, text)| text)
}
