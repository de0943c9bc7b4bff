//! Bracket-tag text protocol
//!
//! Every chunk a peer sends is free text that may carry a name tag such as
//! `[alice] hello`. Only the first `[` and the first `]` after it form the
//! tag; any later brackets are ordinary text. Text without a tag is valid
//! and passes through unchanged.

use std::net::SocketAddr;
use std::ops::Range;

use crate::types::Handle;

/// Location of the first bracket tag in a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    /// Byte index of the opening `[`
    pub open: usize,
    /// Byte index of the closing `]`
    pub close: usize,
}

impl TagSpan {
    /// Byte range of the text between the brackets
    pub fn interior(&self) -> Range<usize> {
        self.open + 1..self.close
    }
}

/// Find the first `[` and the first `]` following it
///
/// Returns `None` when the line has no such pair.
pub fn find_tag(line: &str) -> Option<TagSpan> {
    let open = line.find('[')?;
    let close = open + 1 + line[open + 1..].find(']')?;
    Some(TagSpan { open, close })
}

/// Name claimed in the line's tag, trimmed
///
/// `None` for a missing tag or one holding only whitespace.
pub fn claimed_name(line: &str) -> Option<&str> {
    let span = find_tag(line)?;
    let name = line[span.interior()].trim();
    (!name.is_empty()).then_some(name)
}

/// Replace the interior of the first tag with `handle`
///
/// Everything outside the tag's interior is kept byte for byte.
pub fn rewrite(line: &str, handle: &Handle) -> String {
    let Some(span) = find_tag(line) else {
        return line.to_string();
    };

    let mut out = String::with_capacity(line.len() + handle.as_str().len());
    out.push_str(&line[..=span.open]);
    out.push_str(handle.as_str());
    out.push_str(&line[span.close..]);
    out
}

/// Announcement prefixed to a peer's first message
pub fn connected_notice(addr: SocketAddr, handle: &Handle) -> String {
    format!("Connected {} {}\n", addr, handle)
}

/// Offline notice broadcast when a connection ends
///
/// An orderly close reads `Offline1 <handle> <addr>`; a failure reads
/// `Offline2 <addr> <handle>`. The handle is empty if the peer was never named.
pub fn offline_notice(addr: SocketAddr, handle: Option<&Handle>, clean: bool) -> String {
    let handle = handle.map(Handle::as_str).unwrap_or_default();
    if clean {
        format!("Offline1 {} {}\n", handle, addr)
    } else {
        format!("Offline2 {} {}\n", addr, handle)
    }
}
