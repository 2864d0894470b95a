// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of DhLotto.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Small extraction helpers for the portal's server-rendered pages.
//!
//! The markup carries stable ids and classes, so value extraction is plain
//! string scanning over the page text; no DOM is built.

/// Digits of `text`, concatenated and parsed. `0` when there are none.
/// Tolerates thousands separators and surrounding labels ("1,000원").
pub fn parse_digits(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Text content of a fragment with all tags removed, trimmed at both ends.
pub fn strip_tags(fragment: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_owned()
}

/// Slice of `html` starting at the first occurrence of `marker`.
pub fn section_from<'a>(html: &'a str, marker: &str) -> Option<&'a str> {
    html.find(marker).map(|at| &html[at..])
}

/// Immediate text of the element carrying `id="<id>"`.
pub fn element_text_by_id(html: &str, id: &str) -> Option<String> {
    let marker = format!("id=\"{id}\"");
    let rest = section_from(html, &marker)?;
    let open_end = rest.find('>')?;
    let content = &rest[open_end + 1..];
    let close = content.find('<')?;
    let text = content[..close].trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Inner text of the first `<tag>…</tag>` element in `html`.
pub fn first_tag_text(html: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let rest = section_from(html, &open)?;
    let open_end = rest.find('>')?;
    let end = rest.find(&close)?;
    (end > open_end).then(|| strip_tags(&rest[open_end + 1..end]))
}

fn is_anchor_start(html: &str, at: usize) -> bool {
    html[at..]
        .as_bytes()
        .get(2)
        .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>')
}

/// Whether any `<a>` element's opening tag mentions `class`.
pub fn has_anchor_with_class(html: &str, class: &str) -> bool {
    !anchors_with_class(html, class).is_empty()
}

/// Whether any `<a>` element with `class` in its opening tag has text
/// containing `needle`.
pub fn anchor_with_class_contains(html: &str, class: &str, needle: &str) -> bool {
    anchors_with_class(html, class)
        .iter()
        .any(|inner| strip_tags(inner).contains(needle))
}

fn anchors_with_class(html: &str, class: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut offset = 0;
    while let Some(found) = html[offset..].find("<a") {
        let at = offset + found;
        if is_anchor_start(html, at) {
            let rest = &html[at..];
            if let Some(open_end) = rest.find('>') {
                if rest[..open_end].contains(class) {
                    if let Some(close) = rest.find("</a>") {
                        if close > open_end {
                            out.push(rest[open_end + 1..close].to_owned());
                        }
                    }
                }
            }
        }
        offset = at + 2;
    }
    out
}

fn elements(html: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(&open) {
        let tail = &rest[start..];
        let Some(open_end) = tail.find('>') else { break };
        let Some(end) = tail.find(&close) else { break };
        if end > open_end {
            out.push(tail[open_end + 1..end].to_owned());
            rest = &tail[end + close.len()..];
        } else {
            rest = &tail[open.len()..];
        }
    }
    out
}

/// Inner fragments of the `<tr>` rows of the first table body in `html`.
pub fn table_rows(html: &str) -> Vec<String> {
    let Some(body) = section_from(html, "<tbody") else {
        return Vec::new();
    };
    let body = body.find("</tbody>").map_or(body, |end| &body[..end]);
    elements(body, "tr")
}

/// Inner fragments of the `<td>` cells of a row fragment.
pub fn table_cells(row: &str) -> Vec<String> {
    elements(row, "td")
}

/// Inner fragments of the `<li>` items of a fragment.
pub fn list_items(html: &str) -> Vec<String> {
    elements(html, "li")
}

/// Texts of all `<td>` cells whose opening tag mentions `class`, in
/// document order.
pub fn td_texts_with_class(html: &str, class: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find("<td") {
        let tail = &rest[start..];
        let Some(open_end) = tail.find('>') else { break };
        let Some(end) = tail.find("</td>") else { break };
        if end > open_end && tail[..open_end].contains(class) {
            out.push(strip_tags(&tail[open_end + 1..end]));
        }
        rest = &tail[3..];
    }
    out
}

/// Texts of the innermost `<span>` elements of a fragment, in document
/// order. Wrapper spans that only hold other tags are skipped.
pub fn span_texts(fragment: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = fragment;
    while let Some(start) = rest.find("<span") {
        let tail = &rest[start..];
        if let Some(open_end) = tail.find('>') {
            let content = &tail[open_end + 1..];
            if let Some(next_tag) = content.find('<') {
                if content[next_tag..].starts_with("</span>") {
                    let text = content[..next_tag].trim();
                    if !text.is_empty() {
                        out.push(text.to_owned());
                    }
                }
            }
        }
        rest = &rest[start + 5..];
    }
    out
}

/// Order number and barcode from a receipt link, e.g.
/// `href="javascript:detailPop('12345', '67890')"`.
pub fn receipt_link(cell: &str) -> Option<(String, String)> {
    let rest = section_from(cell, "detailPop(")?;
    let mut quoted = rest.split('\'');
    quoted.next()?;
    let order_no = quoted.next()?;
    quoted.next()?;
    let barcode = quoted.next()?;
    if order_no.chars().all(|c| c.is_ascii_digit())
        && barcode.chars().all(|c| c.is_ascii_digit())
        && !order_no.is_empty()
        && !barcode.is_empty()
    {
        Some((order_no.to_owned(), barcode.to_owned()))
    } else {
        None
    }
}
