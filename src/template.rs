//! Parsing of flag/env/artifact-name templates into chunk sequences

use crate::error::TemplateParseError;
use indexmap::IndexSet;
use std::str::FromStr;

/// One segment of a parsed template: either literal text or a reference to
/// a build variable by name.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Chunk {
    Literal(String),
    Variable(String),
}

/// A parsed template string. Text runs are literal; `%{name}` references a
/// build variable; `%%` encodes a literal `%`. Parsing records the set of
/// referenced variable names so expansion gates can be checked without
/// re-walking the chunks.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Template {
    chunks: Vec<Chunk>,
    referenced: IndexSet<String>,
}

impl Template {
    /// Parse a template in a single pass. A lone `%` not followed by `%` or
    /// `{`, an empty variable name, and an unterminated reference are all
    /// errors, reported with their byte position.
    pub fn parse(input: &str) -> Result<Self, TemplateParseError> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut referenced = IndexSet::new();
        let mut literal = String::new();
        let mut rest = input;
        let mut position = 0;

        while let Some(percent) = rest.find('%') {
            literal.push_str(&rest[..percent]);
            match rest[percent + 1..].chars().next() {
                Some('%') => {
                    literal.push('%');
                    position += percent + 2;
                    rest = &rest[percent + 2..];
                }
                Some('{') => {
                    let Some(close) = rest[percent + 2..].find('}') else {
                        return Err(TemplateParseError {
                            input: input.to_owned(),
                            position: position + percent,
                            message: "unterminated variable reference",
                        });
                    };
                    let name = &rest[percent + 2..percent + 2 + close];
                    if name.is_empty() {
                        return Err(TemplateParseError {
                            input: input.to_owned(),
                            position: position + percent,
                            message: "empty variable name",
                        });
                    }
                    if !literal.is_empty() {
                        chunks.push(Chunk::Literal(std::mem::take(&mut literal)));
                    }
                    chunks.push(Chunk::Variable(name.to_owned()));
                    referenced.insert(name.to_owned());
                    position += percent + 2 + close + 1;
                    rest = &rest[percent + 2 + close + 1..];
                }
                _ => {
                    return Err(TemplateParseError {
                        input: input.to_owned(),
                        position: position + percent,
                        message: "expected '%' or '{' after '%'",
                    });
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            chunks.push(Chunk::Literal(literal));
        }
        Ok(Self { chunks, referenced })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Names of all variables this template references
    pub fn referenced_variables(&self) -> &IndexSet<String> {
        &self.referenced
    }
}

impl FromStr for Template {
    type Err = TemplateParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}
