//! Channel placeholder templates
//!
//! Patterns such as `/Streaming/Channels/{channel*100+1}` are parsed once into
//! literal and placeholder segments and rendered per channel.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Integer placeholders understood inside `{...}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `{channel}` -> 3
    Channel,
    /// `{channel01}` -> 03
    ChannelPadded,
    /// `{channel*100+1}` -> 301
    ChannelMain,
    /// `{channel*100+2}` -> 302
    ChannelSub,
    /// `{channel+100}` -> 103
    ChannelOffset,
}

/// Placeholder table, looked up by exact name
const PLACEHOLDERS: &[(&str, Placeholder)] = &[
    ("channel", Placeholder::Channel),
    ("channel01", Placeholder::ChannelPadded),
    ("channel*100+1", Placeholder::ChannelMain),
    ("channel*100+2", Placeholder::ChannelSub),
    ("channel+100", Placeholder::ChannelOffset),
];

impl Placeholder {
    fn lookup(name: &str) -> Option<Self> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        PLACEHOLDERS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, p)| *p)
    }

    fn render(self, channel: u32) -> String {
        match self {
            Placeholder::Channel => channel.to_string(),
            Placeholder::ChannelPadded => format!("{:02}", channel),
            Placeholder::ChannelMain => channel.saturating_mul(100).saturating_add(1).to_string(),
            Placeholder::ChannelSub => channel.saturating_mul(100).saturating_add(2).to_string(),
            Placeholder::ChannelOffset => channel.saturating_add(100).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Parsed path pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| Error::Parse(format!("unclosed placeholder in {}", raw)))?;
            let name = &after[..close];
            let placeholder = Placeholder::lookup(name)
                .ok_or_else(|| Error::Parse(format!("unknown placeholder {{{}}} in {}", name, raw)))?;
            segments.push(Segment::Value(placeholder));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn render(&self, channel: u32) -> String {
        let mut out = String::with_capacity(self.raw.len() + 4);
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Value(p) => out.push_str(&p.render(channel)),
            }
        }
        out
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for PathPattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        PathPattern::parse(&value)
    }
}

impl From<PathPattern> for String {
    fn from(value: PathPattern) -> Self {
        value.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// NVR/DVR channel template, shared by every alias that maps to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub key: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub main: PathPattern,
    #[serde(default)]
    pub sub: Option<PathPattern>,
}

impl PathTemplate {
    pub fn new(key: &str, aliases: &[&str], main: &str, sub: Option<&str>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            key: key.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            main: PathPattern::parse(main)?,
            sub: sub.map(PathPattern::parse).transpose()?,
        }))
    }

    /// (main, sub) paths for one channel
    pub fn resolve(&self, channel: u32) -> (String, Option<String>) {
        (
            self.main.render(channel),
            self.sub.as_ref().map(|s| s.render(channel)),
        )
    }
}
