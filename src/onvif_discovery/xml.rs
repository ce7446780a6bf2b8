//! Namespace-agnostic XML scraping for SOAP replies
//!
//! Devices disagree on namespace prefixes (`tds:`, `tt:`, `d:`, `wsdd:` or
//! none at all), so elements are matched by local name only.

/// Position of the next opening tag whose local name is `tag`, and the
/// index just past its `>`. Self-closing tags are reported with
/// `self_closing = true`.
struct OpenTag {
    start: usize,
    content_start: usize,
    self_closing: bool,
}

fn find_open_tag(xml: &str, tag: &str, from: usize) -> Option<OpenTag> {
    let mut pos = from;
    while let Some(rel) = xml[pos..].find('<') {
        let start = pos + rel;
        let rest = &xml[start + 1..];
        if rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('!') {
            pos = start + 1;
            continue;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        let close = rest.find('>')?;
        if local == tag {
            return Some(OpenTag {
                start,
                content_start: start + 1 + close + 1,
                self_closing: rest[..close].ends_with('/'),
            });
        }
        pos = start + 1;
    }
    None
}

/// Index of the closing tag matching the element opened before `from`,
/// nested same-name elements accounted for
fn find_close_tag(xml: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(rel) = xml[pos..].find('<') {
        let start = pos + rel;
        let rest = &xml[start + 1..];
        let closing = rest.starts_with('/');
        let name_src = if closing { &rest[1..] } else { rest };
        let name_end = name_src
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(name_src.len());
        let name = &name_src[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        let gt = rest.find('>')?;

        if local == tag {
            if closing {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + 1 + gt + 1));
                }
            } else if !rest[..gt].ends_with('/') {
                depth += 1;
            }
        }
        pos = start + 1;
    }
    None
}

/// Every element named `tag` as (opening tag, inner markup), in document order
pub fn extract_elements<'a>(xml: &'a str, tag: &str) -> Vec<(&'a str, &'a str)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(open) = find_open_tag(xml, tag, pos) {
        let head = &xml[open.start..open.content_start];
        if open.self_closing {
            out.push((head, ""));
            pos = open.content_start;
            continue;
        }
        match find_close_tag(xml, tag, open.content_start) {
            Some((end, after)) => {
                out.push((head, &xml[open.content_start..end]));
                pos = after;
            }
            None => break,
        }
    }
    out
}

/// Inner markup of every element named `tag`, in document order
pub fn extract_sections<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    extract_elements(xml, tag).into_iter().map(|(_, inner)| inner).collect()
}

/// Inner markup of the first element named `tag`
pub fn extract_section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    extract_sections(xml, tag).into_iter().next()
}

/// Trimmed text of the first non-empty element named `tag`
pub fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    extract_sections(xml, tag)
        .into_iter()
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.contains('<'))
        .map(unescape)
}

/// Attribute value on the first element named `tag`
pub fn extract_xml_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let open = find_open_tag(xml, tag, 0)?;
    let head = &xml[open.start..open.content_start];
    let mut search = head;
    loop {
        let idx = search.find(attr)?;
        let before_ok = idx == 0 || {
            let b = search.as_bytes()[idx - 1];
            b.is_ascii_whitespace() || b == b':'
        };
        let after = &search[idx + attr.len()..];
        if before_ok {
            if let Some(value) = after.trim_start().strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let body = &value[1..];
                    let end = body.find(quote)?;
                    return Some(unescape(&body[..end]));
                }
            }
        }
        search = after;
    }
}

/// `XAddr` inside a `GetCapabilities` section such as `Media`
pub fn extract_capability_xaddr(xml: &str, capability: &str) -> Option<String> {
    let section = extract_section(xml, capability)?;
    extract_xml_value(section, "XAddr")
}

/// SOAP fault codes that mean the credential was refused
pub fn is_auth_fault(xml: &str) -> bool {
    xml.contains("NotAuthorized") || xml.contains("FailedAuthentication") || xml.contains("Sender not Authorized")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
