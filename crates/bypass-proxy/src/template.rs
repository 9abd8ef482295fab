//! Minimal compiled template for the PAC script.
//!
//! Supports literal text and `{{.Field}}` actions, where `Field` is one of
//! the [`Field`] variants. The template is parsed once at startup; a
//! compiled [`PacTemplate`] is immutable and can be executed concurrently.

use std::io::Write;

use crate::error::{PacError, Result};

/// Values a template action can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Proxy address advertised to the browser.
    ProxyAddr,
    /// Quoted, pre-escaped direct domains joined with `",\n"`.
    DirectDomains,
    /// Serialized top-level table entries.
    TopLevel,
}

impl Field {
    /// Parses an action name (without the leading dot).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ProxyAddr" => Some(Field::ProxyAddr),
            "DirectDomains" => Some(Field::DirectDomains),
            "TopLevel" => Some(Field::TopLevel),
            _ => None,
        }
    }
}

/// Data passed to [`PacTemplate::execute`].
#[derive(Debug, Clone, Copy)]
pub struct PacFields<'a> {
    pub proxy_addr: &'a str,
    pub direct_domains: &'a str,
    pub top_level: &'a str,
}

impl<'a> PacFields<'a> {
    fn get(&self, field: Field) -> &'a str {
        match field {
            Field::ProxyAddr => self.proxy_addr,
            Field::DirectDomains => self.direct_domains,
            Field::TopLevel => self.top_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Action(Field),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl PacTemplate {
    /// Parses `source` into a template.
    ///
    /// Fails on an unterminated action, an action that is not a field
    /// reference, or an unknown field name.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                PacError::Initialization(format!(
                    "template {}: unclosed action at byte {}",
                    name,
                    source.len() - rest.len() + open
                ))
            })?;

            let action = after_open[..close].trim();
            let field_name = action.strip_prefix('.').ok_or_else(|| {
                PacError::Initialization(format!(
                    "template {}: unsupported action {:?}",
                    name, action
                ))
            })?;
            let field = Field::parse(field_name).ok_or_else(|| {
                PacError::Initialization(format!(
                    "template {}: unknown field {:?}",
                    name, field_name
                ))
            })?;

            segments.push(Segment::Action(field));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { name, segments })
    }

    /// Writes the expanded template to `out`.
    pub fn execute<W: Write>(&self, out: &mut W, fields: &PacFields<'_>) -> Result<()> {
        for segment in &self.segments {
            let text = match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Action(field) => fields.get(*field),
            };
            out.write_all(text.as_bytes()).map_err(|e| {
                PacError::Render(format!("template {}: {}", self.name, e))
            })?;
        }
        Ok(())
    }

    /// Fields referenced by this template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Action(field) => Some(*field),
            Segment::Text(_) => None,
        })
    }
}
