// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured document parser — turns driver XML into a generic element tree.
//
// Attributes and text content live in separate, always-present fields. RD
// drivers put some values in attributes (`qScore`) and others in element text
// (the base64 `Data` payload), so the two must never be merged. Same-named
// siblings keep their document order.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;

use rdbridge_core::error::{BridgeError, Result};

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    pub tag: String,
    /// Possibly empty.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated text and CDATA content, trimmed. Possibly empty.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All direct children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Breadth-first search for the shallowest element named `tag`, looking
    /// at most `max_depth` levels below `self` (`self` is depth 0).
    pub fn find(&self, tag: &str, max_depth: usize) -> Option<&Element> {
        let mut level: Vec<&Element> = vec![self];
        for depth in 0..=max_depth {
            if let Some(hit) = level.iter().copied().find(|e| e.tag == tag) {
                return Some(hit);
            }
            if depth == max_depth {
                break;
            }
            level = level.iter().flat_map(|e| e.children.iter()).collect();
            if level.is_empty() {
                break;
            }
        }
        None
    }
}

/// Parse raw response bytes. Invalid UTF-8 is a malformed document.
pub fn parse_bytes(bytes: &[u8]) -> Result<Element> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| BridgeError::MalformedDocument(format!("invalid UTF-8: {e}")))?;
    parse(text)
}

/// Parse a markup document into its root element.
pub fn parse(markup: &str) -> Result<Element> {
    if markup.trim().is_empty() {
        return Err(BridgeError::MalformedDocument("empty document".into()));
    }

    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed("multiple root elements", position));
                }
                stack.push(open_element(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = open_element(&start)?;
                attach(element, &mut stack, &mut root, position)?;
            }
            Ok(Event::End(_)) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without opening tag", position))?;
                let trimmed = element.text.trim();
                if trimmed.len() != element.text.len() {
                    element.text = trimmed.to_string();
                }
                attach(element, &mut stack, &mut root, position)?;
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| malformed(&format!("bad text: {e}"), position))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&value),
                    None if value.trim().is_empty() => {}
                    None => return Err(malformed("text outside root element", position)),
                }
            }
            Ok(Event::CData(cdata)) => {
                let value = String::from_utf8(cdata.into_inner().into_owned())
                    .map_err(|e| malformed(&format!("bad CDATA: {e}"), position))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&value),
                    None => return Err(malformed("CDATA outside root element", position)),
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctype.
            Ok(_) => {}
            Err(e) => return Err(malformed(&e.to_string(), position)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(BridgeError::MalformedDocument(format!(
            "unclosed element <{}>",
            open.tag
        )));
    }
    root.ok_or_else(|| BridgeError::MalformedDocument("no root element".into()))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| BridgeError::MalformedDocument(format!("bad tag name: {e}")))?
        .to_string();

    let mut element = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            BridgeError::MalformedDocument(format!("bad attribute on <{}>: {e}", element.tag))
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| BridgeError::MalformedDocument(format!("bad attribute name: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| BridgeError::MalformedDocument(format!("bad value for {key}: {e}")))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
    position: u64,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(malformed("multiple root elements", position)),
        None => *root = Some(element),
    }
    Ok(())
}

fn malformed(reason: &str, position: u64) -> BridgeError {
    BridgeError::MalformedDocument(format!("{reason} (near byte {position})"))
}
