use std::fmt;

use crate::ast::ExprNode;
use crate::value::Value;

/// The four statement operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `new`: append an instantiation of the definition as the last child
    /// of every selected module.
    New,
    /// `set`: overwrite every selected module with a fresh instantiation.
    Edit,
    /// `get`: deep-copy every selected module into the output accumulator.
    Print,
    /// `del`: remove every selected module from its parent's child list.
    Delete,
}

impl OperationKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            OperationKind::New => "new",
            OperationKind::Edit => "set",
            OperationKind::Print => "get",
            OperationKind::Delete => "del",
        }
    }

    pub fn from_keyword(word: &str) -> Option<OperationKind> {
        match word {
            "new" => Some(OperationKind::New),
            "set" => Some(OperationKind::Edit),
            "get" => Some(OperationKind::Print),
            "del" => Some(OperationKind::Delete),
            _ => None,
        }
    }

    pub fn takes_definition(&self) -> bool {
        matches!(self, OperationKind::New | OperationKind::Edit)
    }
}

/// Payload format keyword of an embedded data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Yaml,
}

impl DataFormat {
    pub fn keyword(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Yaml => "yaml",
        }
    }
}

/// A module payload as written in a definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `json ... end` / `yaml ... end`, parsed into a structured value at
    /// statement-parse time.
    Data { format: DataFormat, value: Value },
    /// A quoted string.
    Text(String),
}

/// The definition part of a `new`/`set` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Definition {
    /// Implicit singleton tag used for later addressing; `@none` leaves it
    /// unset.
    pub handle: Option<String>,
    /// Additional tags from the `as` clause.
    pub tags: Vec<String>,
    pub payload: Option<Payload>,
    /// `has { ... }` sub-statements; the parser restricts these to
    /// context-free `new` statements.
    pub children: Vec<Statement>,
}

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The `in`/`at` clause, absent for root-addressed statements.
    pub context: Option<ExprNode>,
    /// `at`: stop the whole traversal at the first selected module.
    pub greedy: bool,
    pub operation: OperationKind,
    pub definition: Option<Definition>,
}

impl Statement {
    /// Canonical text form. Reparsing the result yields a structurally
    /// identical statement.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        if let Some(expr) = &self.context {
            out.push_str(if self.greedy { "at " } else { "in " });
            out.push_str(&expr.to_string());
            out.push(' ');
        }
        out.push_str(self.operation.keyword());
        if let Some(definition) = &self.definition {
            out.push(' ');
            write_definition(&mut out, definition);
        }
        out.push(';');
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn write_definition(out: &mut String, definition: &Definition) {
    match &definition.handle {
        Some(handle) => out.push_str(handle),
        None => out.push_str("@none"),
    }
    if !definition.tags.is_empty() {
        out.push_str(" as ");
        out.push_str(&definition.tags.join(", "));
    }
    if let Some(payload) = &definition.payload {
        out.push_str(" is ");
        write_payload(out, payload);
    }
    if !definition.children.is_empty() {
        out.push_str(" has { ");
        for child in &definition.children {
            out.push_str(&child.canonical());
            out.push(' ');
        }
        out.push('}');
    }
}

fn write_payload(out: &mut String, payload: &Payload) {
    match payload {
        Payload::Data { format, value } => {
            out.push_str(format.keyword());
            out.push(' ');
            let text = match format {
                DataFormat::Json => serde_json::to_string(&value.to_json())
                    .unwrap_or_else(|_| "null".to_string()),
                DataFormat::Yaml => serde_yaml::to_string(&value.to_yaml())
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_else(|_| "null".to_string()),
            };
            out.push_str(&escape_embedded(&text));
            out.push_str(" end");
        }
        Payload::Text(text) => {
            out.push('\'');
            for ch in text.chars() {
                match ch {
                    '\\' => out.push_str("\\\\"),
                    '\'' => out.push_str("\\'"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    _ => out.push(ch),
                }
            }
            out.push('\'');
        }
    }
}

/// Escape a serialized payload so raw capture reads it back verbatim: the
/// marker and comment characters and any word-boundary `end` are escaped.
fn escape_embedded(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '@' {
            out.push_str("\\@");
            i += 1;
            continue;
        }
        if ch == '#' {
            out.push_str("\\#");
            i += 1;
            continue;
        }
        if ch == 'e' && word_start(&chars, i) && chars[i..].starts_with(&['e', 'n', 'd']) {
            let boundary_after = chars
                .get(i + 3)
                .is_none_or(|c| !c.is_alphanumeric() && *c != '_');
            if boundary_after {
                out.push_str("\\e");
                i += 1;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn word_start(chars: &[char], i: usize) -> bool {
    i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_')
}
