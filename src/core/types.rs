use crate::core::{Result, SeqError};
use crate::dialect::DdlProvider;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref PLAIN_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$")
        .expect("identifier pattern is valid");
}

/// Java-style integral width of the counter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumberType {
    #[serde(alias = "i16", alias = "smallint")]
    Short,
    #[serde(alias = "i32", alias = "int")]
    Integer,
    #[default]
    #[serde(alias = "i64", alias = "bigint")]
    Long,
}

impl NumberType {
    pub fn min_value(self) -> i64 {
        match self {
            Self::Short => i16::MIN as i64,
            Self::Integer => i32::MIN as i64,
            Self::Long => i64::MIN,
        }
    }

    pub fn max_value(self) -> i64 {
        match self {
            Self::Short => i16::MAX as i64,
            Self::Integer => i32::MAX as i64,
            Self::Long => i64::MAX,
        }
    }

    pub fn contains(self, value: i64) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
        }
    }
}

impl FromStr for NumberType {
    type Err = SeqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "i16" | "smallint" => Ok(Self::Short),
            "integer" | "int" | "i32" => Ok(Self::Integer),
            "long" | "i64" | "bigint" => Ok(Self::Long),
            other => Err(SeqError::Configuration(format!(
                "Unknown number type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for NumberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single database object name, optionally quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    text: String,
    quoted: bool,
}

impl Identifier {
    /// Parses `name`, `"name"`, `` `name` `` or `[name]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.len() >= 2 {
            let bytes = raw.as_bytes();
            let (first, last) = (bytes[0], bytes[raw.len() - 1]);
            let quoted = matches!((first, last), (b'"', b'"') | (b'`', b'`') | (b'[', b']'));
            if quoted {
                let inner = &raw[1..raw.len() - 1];
                if inner.is_empty() {
                    return Err(SeqError::Configuration("Empty quoted identifier".into()));
                }
                return Ok(Self::quoted(inner));
            }
        }

        if !PLAIN_IDENTIFIER.is_match(raw) {
            return Err(SeqError::Configuration(format!(
                "Invalid identifier '{}'",
                raw
            )));
        }
        Ok(Self {
            text: raw.to_string(),
            quoted: false,
        })
    }

    pub fn quoted(text: &str) -> Self {
        Self {
            text: text.to_string(),
            quoted: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Renders the identifier as it must appear in SQL for `dialect`.
    pub fn render<D: DdlProvider + ?Sized>(&self, dialect: &D) -> String {
        if self.quoted {
            format!(
                "{}{}{}",
                dialect.open_quote(),
                self.text,
                dialect.close_quote()
            )
        } else {
            self.text.clone()
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// `catalog.schema.object`, with catalog and schema optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    catalog: Option<Identifier>,
    schema: Option<Identifier>,
    object: Identifier,
}

impl QualifiedName {
    pub fn new(catalog: Option<Identifier>, schema: Option<Identifier>, object: Identifier) -> Self {
        Self {
            catalog,
            schema,
            object,
        }
    }

    /// Parses dotted text; dots inside quotes do not split.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = split_qualified(raw)?;
        let mut idents = parts
            .iter()
            .map(|p| Identifier::parse(p))
            .collect::<Result<Vec<_>>>()?;

        match idents.len() {
            1 => Ok(Self::new(None, None, idents.remove(0))),
            2 => {
                let object = idents.remove(1);
                Ok(Self::new(None, Some(idents.remove(0)), object))
            }
            3 => {
                let object = idents.remove(2);
                let schema = idents.remove(1);
                Ok(Self::new(Some(idents.remove(0)), Some(schema), object))
            }
            n => Err(SeqError::Configuration(format!(
                "Qualified name '{}' has {} parts, expected at most 3",
                raw, n
            ))),
        }
    }

    pub fn catalog(&self) -> Option<&Identifier> {
        self.catalog.as_ref()
    }

    pub fn schema(&self) -> Option<&Identifier> {
        self.schema.as_ref()
    }

    pub fn object(&self) -> &Identifier {
        &self.object
    }

    pub fn render<D: DdlProvider + ?Sized>(&self, dialect: &D) -> String {
        [self.catalog.as_ref(), self.schema.as_ref(), Some(&self.object)]
            .into_iter()
            .flatten()
            .map(|ident| ident.render(dialect))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{}.", catalog)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.object)
    }
}

impl FromStr for QualifiedName {
    type Err = SeqError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split_qualified(raw: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for ch in raw.trim().chars() {
        match closing {
            Some(close) => {
                current.push(ch);
                if ch == close {
                    closing = None;
                }
            }
            None => match ch {
                '.' => parts.push(std::mem::take(&mut current)),
                '"' | '`' => {
                    closing = Some(ch);
                    current.push(ch);
                }
                '[' => {
                    closing = Some(']');
                    current.push(ch);
                }
                _ => current.push(ch),
            },
        }
    }

    if closing.is_some() {
        return Err(SeqError::Configuration(format!(
            "Unterminated quoted identifier in '{}'",
            raw
        )));
    }
    parts.push(current);

    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(SeqError::Configuration(format!(
            "Empty name segment in '{}'",
            raw
        )));
    }
    Ok(parts)
}
