use crate::ast::{
    DataFormat, Definition, OperationKind, Payload, Statement, Token, TokenKind,
};
use crate::context;
use crate::error::{Error, Position, Result};
use crate::value::Value;

/// Recursive-descent statement parser over one statement's tokens.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn here(&self) -> Option<Position> {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.position.clone())
    }

    fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(token) => Error::syntax(
                format!("expected {expected}, found {}", token.describe()),
                Some(token.position.clone()),
            ),
            None => Error::syntax(format!("expected {expected}, found end of input"), self.here()),
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        match self.peek() {
            Some(token) if token.is_symbol(symbol) => {
                self.bump();
                Ok(())
            }
            _ => Err(self.unexpected(&format!("'{symbol}'"))),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        match self.peek() {
            Some(token) if token.is_keyword(word) => {
                self.bump();
                Ok(())
            }
            _ => Err(self.unexpected(&format!("'{word}'"))),
        }
    }

    /// All tokens consumed?
    pub fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(Error::syntax(
                format!("unexpected {} after statement", token.describe()),
                Some(token.position.clone()),
            )),
        }
    }

    /// `stmt := [("in"|"at") expr] operation [definition] ";"`
    pub fn parse_statement(&mut self) -> Result<Statement> {
        let (context, greedy) = self.parse_context_clause()?;
        let operation = self.parse_operation()?;
        let definition = if operation.takes_definition() {
            Some(self.parse_definition()?)
        } else {
            None
        };
        self.expect_symbol(";")?;
        Ok(Statement {
            context,
            greedy,
            operation,
            definition,
        })
    }

    fn parse_context_clause(&mut self) -> Result<(Option<crate::ast::ExprNode>, bool)> {
        let greedy = match self.peek() {
            Some(token) if token.is_keyword("in") => false,
            Some(token) if token.is_keyword("at") => true,
            _ => return Ok((None, false)),
        };
        let clause_position = self.bump().map(|t| t.position);
        let mut clause = Vec::new();
        loop {
            match self.peek() {
                Some(token)
                    if matches!(&token.kind, TokenKind::Keyword(k)
                        if OperationKind::from_keyword(k).is_some()) =>
                {
                    break
                }
                Some(_) => {
                    if let Some(token) = self.bump() {
                        clause.push(token);
                    }
                }
                None => {
                    return Err(Error::syntax(
                        "expected an operation after the context expression",
                        clause_position,
                    ))
                }
            }
        }
        if clause.is_empty() {
            return Err(Error::syntax("empty context expression", clause_position));
        }
        Ok((Some(context::parse(&clause)?), greedy))
    }

    fn parse_operation(&mut self) -> Result<OperationKind> {
        match self.peek() {
            Some(token) => {
                if let TokenKind::Keyword(word) = &token.kind {
                    if let Some(operation) = OperationKind::from_keyword(word) {
                        self.bump();
                        return Ok(operation);
                    }
                }
                Err(self.unexpected("an operation ('new', 'set', 'get' or 'del')"))
            }
            None => Err(self.unexpected("an operation ('new', 'set', 'get' or 'del')")),
        }
    }

    /// `definition := handle ["as" tagList] ["is" payload] ["has" "{" stmt* "}"]`
    fn parse_definition(&mut self) -> Result<Definition> {
        let handle = match self.peek() {
            Some(token) if token.is_keyword("none") => {
                self.bump();
                None
            }
            // the placeholder lexes as a keyword; it is a tag here
            Some(token) if token.is_keyword("uuid") => {
                self.bump();
                Some("@uuid".to_string())
            }
            Some(Token {
                kind: TokenKind::Tag(_),
                ..
            }) => {
                let Some(Token {
                    kind: TokenKind::Tag(tag),
                    ..
                }) = self.bump()
                else {
                    unreachable!()
                };
                Some(tag)
            }
            _ => return Err(self.unexpected("a handle tag or '@none'")),
        };

        let mut definition = Definition {
            handle,
            ..Definition::default()
        };

        if self.peek().is_some_and(|t| t.is_keyword("as")) {
            self.bump();
            definition.tags = self.parse_tag_list(definition.handle.as_deref())?;
        }
        if self.peek().is_some_and(|t| t.is_keyword("is")) {
            self.bump();
            definition.payload = Some(self.parse_payload()?);
        }
        if self.peek().is_some_and(|t| t.is_keyword("has")) {
            self.bump();
            self.expect_symbol("{")?;
            while !self.peek().is_some_and(|t| t.is_symbol("}")) {
                let position = self.here();
                let child = self.parse_statement()?;
                if child.operation != OperationKind::New {
                    return Err(Error::syntax(
                        "only 'new' statements may appear in a 'has' block",
                        position,
                    ));
                }
                if child.context.is_some() {
                    return Err(Error::syntax(
                        "statements in a 'has' block cannot carry a context clause",
                        position,
                    ));
                }
                definition.children.push(child);
            }
            self.expect_symbol("}")?;
        }
        Ok(definition)
    }

    /// `tag ("," tag)*`, rejecting duplicates (the handle included).
    fn parse_tag_list(&mut self, handle: Option<&str>) -> Result<Vec<String>> {
        let mut tags: Vec<String> = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token.is_keyword("uuid") => {
                    self.bump();
                    tags.push("@uuid".to_string());
                }
                Some(Token {
                    kind: TokenKind::Tag(_),
                    position,
                }) => {
                    let position = position.clone();
                    let Some(Token {
                        kind: TokenKind::Tag(tag),
                        ..
                    }) = self.bump()
                    else {
                        unreachable!()
                    };
                    // several @uuid placeholders are fine; each becomes a
                    // distinct identifier at instantiation time
                    let duplicate = tag != "@uuid"
                        && (tags.contains(&tag) || handle.is_some_and(|h| h == tag));
                    if duplicate {
                        return Err(Error::syntax(
                            format!("duplicate tag '{tag}' in tag list"),
                            Some(position),
                        ));
                    }
                    tags.push(tag);
                }
                _ => return Err(self.unexpected("a tag")),
            }
            if self.peek().is_some_and(|t| t.is_symbol(",")) {
                self.bump();
            } else {
                return Ok(tags);
            }
        }
    }

    fn parse_payload(&mut self) -> Result<Payload> {
        let Some(token) = self.bump() else {
            return Err(self.unexpected("a payload"));
        };
        match token.kind {
            TokenKind::Keyword(ref word) if word == "json" || word == "yaml" => {
                let format = if word == "json" {
                    DataFormat::Json
                } else {
                    DataFormat::Yaml
                };
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some(Token {
                            kind: TokenKind::DataFragment(fragment),
                            ..
                        }) => text.push_str(&fragment),
                        Some(t) if t.is_keyword("end") => break,
                        Some(t) => {
                            return Err(Error::syntax(
                                format!("unexpected {} inside payload block", t.describe()),
                                Some(t.position),
                            ))
                        }
                        None => {
                            return Err(Error::syntax(
                                "payload block is missing its 'end'",
                                Some(token.position.clone()),
                            ))
                        }
                    }
                }
                let value = parse_data_block(format, &text, &token.position)?;
                Ok(Payload::Data { format, value })
            }
            TokenKind::LineString(text)
            | TokenKind::MultiString(text)
            | TokenKind::DynamicString(text) => Ok(Payload::Text(text)),
            _ => Err(Error::syntax(
                format!(
                    "expected a payload ('json', 'yaml' or a string), found {}",
                    token.describe()
                ),
                Some(token.position),
            )),
        }
    }
}

fn parse_data_block(format: DataFormat, text: &str, position: &Position) -> Result<Value> {
    match format {
        DataFormat::Json => {
            let parsed: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                Error::syntax(format!("malformed json payload: {e}"), Some(position.clone()))
            })?;
            Ok(Value::from_json(&parsed))
        }
        DataFormat::Yaml => {
            let parsed: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
                Error::syntax(format!("malformed yaml payload: {e}"), Some(position.clone()))
            })?;
            Value::from_yaml(&parsed).map_err(|e| {
                Error::syntax(format!("malformed yaml payload: {e}"), Some(position.clone()))
            })
        }
    }
}

/// Build a statement from the programmatic AST form: a map with an
/// `operation` string and optional `context`, `greedy`, `handle`, `tags`,
/// `payload` and `nested` entries. Anything structurally malformed is
/// rejected with a Syntax error before it reaches the composer.
pub fn from_value(node: &Value) -> Result<Statement> {
    let Value::Map(_) = node else {
        return Err(Error::syntax("statement node must be a map", None));
    };

    let operation = match node.get_key("operation") {
        Some(Value::String(word)) => OperationKind::from_keyword(word).ok_or_else(|| {
            Error::syntax(format!("unknown operation '{word}'"), None)
        })?,
        Some(_) | None => {
            return Err(Error::syntax("statement operation must be a string", None));
        }
    };

    let context = match node.get_key("context") {
        Some(Value::String(text)) => Some(context::parse_text(text)?),
        Some(_) => {
            return Err(Error::syntax(
                "statement context must be an expression string",
                None,
            ))
        }
        None => None,
    };

    let greedy = match node.get_key("greedy") {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(Error::syntax("'greedy' must be a boolean", None)),
        None => false,
    };

    let handle = match node.get_key("handle") {
        Some(Value::String(tag)) => Some(tag.clone()),
        Some(_) => return Err(Error::syntax("'handle' must be a string", None)),
        None => None,
    };

    let tags = match node.get_key("tags") {
        Some(Value::List(items)) => {
            let mut tags: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(tag) = item else {
                    return Err(Error::syntax("tag lists must be arrays of strings", None));
                };
                if tag != "@uuid" && tags.contains(tag) {
                    return Err(Error::syntax(
                        format!("duplicate tag '{tag}' in tag list"),
                        None,
                    ));
                }
                tags.push(tag.clone());
            }
            tags
        }
        Some(_) => return Err(Error::syntax("tag lists must be arrays of strings", None)),
        None => Vec::new(),
    };

    let payload = node.get_key("payload").map(|value| Payload::Data {
        format: DataFormat::Json,
        value: value.clone(),
    });

    let children = match node.get_key("nested") {
        Some(Value::List(items)) => {
            let mut children = Vec::with_capacity(items.len());
            for item in items {
                let child = from_value(item)?;
                if child.operation != OperationKind::New || child.context.is_some() {
                    return Err(Error::syntax(
                        "nested statements must be context-free 'new' statements",
                        None,
                    ));
                }
                children.push(child);
            }
            children
        }
        Some(_) => {
            return Err(Error::syntax(
                "nested lists must be arrays of statement nodes",
                None,
            ))
        }
        None => Vec::new(),
    };

    let has_definition =
        handle.is_some() || !tags.is_empty() || payload.is_some() || !children.is_empty();
    let definition = if operation.takes_definition() {
        Some(Definition {
            handle,
            tags,
            payload,
            children,
        })
    } else if has_definition {
        return Err(Error::syntax(
            format!(
                "'{}' statements do not take a definition",
                operation.keyword()
            ),
            None,
        ));
    } else {
        None
    };

    Ok(Statement {
        context,
        greedy,
        operation,
        definition,
    })
}

/// Build statements from a list of programmatic nodes, or a single node.
pub fn from_values(value: &Value) -> Result<Vec<Statement>> {
    match value {
        Value::List(items) => items.iter().map(from_value).collect(),
        Value::Map(_) => Ok(vec![from_value(value)?]),
        _ => Err(Error::syntax(
            "programmatic input must be a statement node or a list of them",
            None,
        )),
    }
}
