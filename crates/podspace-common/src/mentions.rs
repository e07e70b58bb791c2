//! `@name` mentions in chat text.
//!
//! Cursor positions are byte offsets into the UTF-8 text. Offsets past the
//! end are clamped, offsets inside a multi-byte character are moved back to
//! the previous boundary.

use std::sync::LazyLock;

use regex::Regex;

use crate::roster::Member;

static MENTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+").expect("mention pattern is valid"));

/// An in-progress mention at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    /// Byte offset of the `@`.
    pub start: usize,
    /// Lowercased text typed after the `@`.
    pub query: String,
}

/// A piece of a rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Mention { text: &'a str, member_id: i64 },
}

fn clamp_cursor(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

/// The mention being typed at `cursor`, if any.
///
/// A mention is considered finished as soon as a space or newline follows
/// the `@`.
pub fn active_query(text: &str, cursor: usize) -> Option<MentionQuery> {
    let before = &text[..clamp_cursor(text, cursor)];
    let start = before.rfind('@')?;
    let typed = &before[start + 1..];
    if typed.contains(' ') || typed.contains('\n') {
        return None;
    }
    Some(MentionQuery {
        start,
        query: typed.to_lowercase(),
    })
}

/// Members whose name contains `query` (case-insensitive).
pub fn suggest<'a>(roster: &'a [Member], query: &str) -> Vec<&'a Member> {
    let query = query.to_lowercase();
    roster
        .iter()
        .filter(|m| m.name.to_lowercase().contains(&query))
        .collect()
}

/// Replace the mention being typed at `cursor` with `@name `.
///
/// Returns the new text and the cursor position just after the inserted
/// space. Text without an `@` before the cursor is returned unchanged.
pub fn complete(text: &str, cursor: usize, name: &str) -> (String, usize) {
    let cursor = clamp_cursor(text, cursor);
    let Some(start) = text[..cursor].rfind('@') else {
        return (text.to_string(), cursor);
    };
    let mut out = String::with_capacity(text.len() + name.len() + 2);
    out.push_str(&text[..start]);
    out.push('@');
    out.push_str(name);
    out.push(' ');
    out.push_str(&text[cursor..]);
    (out, start + name.len() + 2)
}

/// Find the member a mention token (without the `@`) refers to.
///
/// An exact case-insensitive name match wins; otherwise the first member
/// whose name contains the token.
pub fn resolve<'a>(roster: &'a [Member], token: &str) -> Option<&'a Member> {
    let token = token.to_lowercase();
    roster
        .iter()
        .find(|m| m.name.to_lowercase() == token)
        .or_else(|| roster.iter().find(|m| m.name.to_lowercase().contains(&token)))
}

/// Split a message into plain text and resolved mentions.
pub fn segments<'a>(message: &'a str, roster: &[Member]) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut last = 0;
    for token in MENTION_TOKEN.find_iter(message) {
        if token.start() > last {
            out.push(Segment::Text(&message[last..token.start()]));
        }
        let text = token.as_str();
        match resolve(roster, &text[1..]) {
            Some(member) => out.push(Segment::Mention {
                text,
                member_id: member.id,
            }),
            None => out.push(Segment::Text(text)),
        }
        last = token.end();
    }
    if last < message.len() {
        out.push(Segment::Text(&message[last..]));
    }
    out
}

/// Ids of every member mentioned in `message`, in first-mention order.
pub fn mentioned_members(message: &str, roster: &[Member]) -> Vec<i64> {
    let mut ids = Vec::new();
    for segment in segments(message, roster) {
        if let Segment::Mention { member_id, .. } = segment {
            if !ids.contains(&member_id) {
                ids.push(member_id);
            }
        }
    }
    ids
}
