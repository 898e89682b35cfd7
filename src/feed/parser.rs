//! Tolerant RSS 2.0 / Atom parser.
//!
//! The root element decides the extraction schema: `<rss>` routes to RSS 2.0,
//! `<feed>` to Atom, anything else is not a feed. Malformed XML, truncated
//! documents and unknown elements never produce an error; the result is
//! `None` or a feed with the salvageable subset of its items.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::feed::dates::{parse_iso_date, parse_rss_date};
use crate::feed::types::{Feed, FeedItem};

/// Parse raw feed XML into a normalized feed.
pub fn parse(xml: &str) -> Option<Feed> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                return match e.local_name().as_ref() {
                    b"rss" => parse_rss(&mut reader),
                    b"feed" => parse_atom(&mut reader),
                    _ => None,
                };
            }
            // An empty root element has no channel and no entries.
            Ok(Event::Empty(_)) | Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

/// Collect the text content of the element `start` opened, up to its end tag.
///
/// Text of nested elements is included, markup is not. Returns `None` only
/// when the document ends or breaks before the element is closed.
fn element_text(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Option<String> {
    let end = start.to_end().into_owned();
    let mut depth = 0usize;
    let mut text = String::new();

    loop {
        match reader.read_event().ok()? {
            Event::Start(_) => depth += 1,
            Event::End(e) if depth == 0 && e.name() == end.name() => {
                return Some(text.trim().to_string());
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Unescaped value of an attribute, if present.
fn attribute_value(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// RSS 2.0: find the `<channel>` under `<rss>` and extract it.
fn parse_rss(reader: &mut Reader<&[u8]>) -> Option<Feed> {
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"channel" {
                    return parse_rss_channel(reader);
                }
                reader.read_to_end(e.name()).ok()?;
            }
            Event::End(_) | Event::Eof => return None,
            _ => {}
        }
    }
}

fn parse_rss_channel(reader: &mut Reader<&[u8]>) -> Option<Feed> {
    let mut feed = Feed::default();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"title" => feed.title = element_text(reader, &e)?,
                b"link" => feed.link = element_text(reader, &e)?,
                b"description" => feed.description = element_text(reader, &e)?,
                b"pubDate" => feed.pub_date = parse_rss_date(&element_text(reader, &e)?),
                b"lastBuildDate" => {
                    feed.last_build_date = parse_rss_date(&element_text(reader, &e)?)
                }
                b"item" => {
                    if let Some(item) = parse_rss_item(reader, &e) {
                        feed.items.push(item);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).ok()?;
                }
            },
            Event::End(_) => return Some(feed),
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn parse_rss_item(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Option<FeedItem> {
    let end = start.to_end().into_owned();
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut item = FeedItem::default();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"title" => title = Some(element_text(reader, &e)?),
                b"description" => description = Some(element_text(reader, &e)?),
                b"link" => item.link = element_text(reader, &e)?,
                b"pubDate" => item.pub_date = parse_rss_date(&element_text(reader, &e)?),
                b"guid" => item.guid = element_text(reader, &e)?,
                b"enclosure" => {
                    item.enclosure_url = attribute_value(&e, "url").unwrap_or_default();
                    reader.read_to_end(e.name()).ok()?;
                }
                _ => {
                    reader.read_to_end(e.name()).ok()?;
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"enclosure" {
                    item.enclosure_url = attribute_value(&e, "url").unwrap_or_default();
                }
            }
            Event::End(e) if e.name() == end.name() => break,
            Event::End(_) => {}
            Event::Eof => return None,
            _ => {}
        }
    }

    // An item with neither a title nor a description is malformed. Drop it
    // and keep the rest of the feed.
    if title.is_none() && description.is_none() {
        return None;
    }
    item.title = title.unwrap_or_default();
    item.description = description.unwrap_or_default();
    Some(item)
}

/// Atom: extract directly from the children of `<feed>`.
fn parse_atom(reader: &mut Reader<&[u8]>) -> Option<Feed> {
    let mut feed = Feed::default();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"title" => feed.title = element_text(reader, &e)?,
                b"subtitle" => feed.description = element_text(reader, &e)?,
                b"link" => {
                    if feed.link.is_empty() {
                        feed.link = attribute_value(&e, "href").unwrap_or_default();
                    }
                    reader.read_to_end(e.name()).ok()?;
                }
                b"updated" => {
                    // Atom has no separate build timestamp; `updated` serves
                    // as both the publication date and the watermark.
                    let when = parse_iso_date(&element_text(reader, &e)?);
                    feed.pub_date = when;
                    feed.last_build_date = when;
                }
                b"entry" => {
                    if let Some(item) = parse_atom_entry(reader, &e) {
                        feed.items.push(item);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).ok()?;
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" && feed.link.is_empty() {
                    feed.link = attribute_value(&e, "href").unwrap_or_default();
                }
            }
            Event::End(_) => return Some(feed),
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn parse_atom_entry(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Option<FeedItem> {
    let end = start.to_end().into_owned();
    let mut title: Option<String> = None;
    let mut content: Option<String> = None;
    let mut summary: Option<String> = None;
    let mut published: Option<DateTime<Utc>> = None;
    let mut updated: Option<DateTime<Utc>> = None;
    let mut item = FeedItem::default();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"title" => title = Some(element_text(reader, &e)?),
                b"content" => content = Some(element_text(reader, &e)?),
                b"summary" => summary = Some(element_text(reader, &e)?),
                b"link" => {
                    if item.link.is_empty() {
                        item.link = attribute_value(&e, "href").unwrap_or_default();
                    }
                    reader.read_to_end(e.name()).ok()?;
                }
                b"published" => published = parse_iso_date(&element_text(reader, &e)?),
                b"updated" => updated = parse_iso_date(&element_text(reader, &e)?),
                b"id" => item.guid = element_text(reader, &e)?,
                _ => {
                    reader.read_to_end(e.name()).ok()?;
                }
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" && item.link.is_empty() {
                    item.link = attribute_value(&e, "href").unwrap_or_default();
                }
            }
            Event::End(e) if e.name() == end.name() => break,
            Event::End(_) => {}
            Event::Eof => return None,
            _ => {}
        }
    }

    let description = content.or(summary);
    if title.is_none() && description.is_none() {
        return None;
    }
    item.title = title.unwrap_or_default();
    item.description = description.unwrap_or_default();
    item.pub_date = published.or(updated);
    // Atom entries have no enclosure element; the entry link stands in.
    item.enclosure_url = item.link.clone();
    Some(item)
}
