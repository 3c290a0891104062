use std::path::PathBuf;

use crate::ast::{Token, TokenKind};
use crate::error::{Error, Position, Result};

/// Reserved words. Bare identifiers matching one of these lex as keyword
/// tokens; the `@` marker forces the same reading anywhere.
const KEYWORDS: &[&str] = &[
    "in", "at", "new", "set", "get", "del", "as", "is", "has", "json", "yaml", "end", "and", "or",
    "xor", "not", "to", "toward", "then", "else", "none", "uuid", "depth", "count", "index",
    "draw", "true", "false",
];

/// Buffers raw input text and exposes single-character lookahead and
/// consumption with line/column and byte-offset tracking.
pub struct CharCursor {
    chars: Vec<char>,
    position: usize,
    offset: usize,
    line: u32,
    column: u32,
    path: Option<PathBuf>,
}

impl CharCursor {
    pub fn new(input: &str) -> Self {
        CharCursor {
            chars: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            path: None,
        }
    }

    pub fn with_path(input: &str, path: Option<PathBuf>) -> Self {
        let mut cursor = CharCursor::new(input);
        cursor.path = path;
        cursor
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    pub fn peek_at(&self, lookahead: usize) -> Option<char> {
        self.chars.get(self.position + lookahead).copied()
    }

    pub fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Byte offset of the next unread character.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            path: self.path.clone(),
        }
    }
}

/// Lexer mode stack states. `Normal` sits at the bottom; raw-capture
/// modes persist across `next_token` calls so a payload block can emit
/// several fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    LineString,
    MultiString,
    DynamicString,
    Embedded,
    Comment,
}

/// Outcome of a single [`Lexer::next_token`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    /// A complete token.
    Token(Token),
    /// Clean end of input.
    End,
    /// Input ended inside a token or raw-capture mode; more text may
    /// complete it. Carry-aware callers retry with a longer buffer.
    Partial,
}

/// The token lexer: consumes a [`CharCursor`], produces typed tokens.
pub struct Lexer {
    cursor: CharCursor,
    modes: Vec<Mode>,
    /// A token produced alongside another one, emitted on the next call
    /// (an `@end` directive closing a non-empty payload fragment).
    pending: Option<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            cursor: CharCursor::new(input),
            modes: vec![Mode::Normal],
            pending: None,
        }
    }

    pub fn with_path(input: &str, path: Option<PathBuf>) -> Self {
        Lexer {
            cursor: CharCursor::with_path(input, path),
            modes: vec![Mode::Normal],
            pending: None,
        }
    }

    /// Byte offset just past the most recently produced token.
    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    fn mode(&self) -> Mode {
        *self.modes.last().unwrap_or(&Mode::Normal)
    }

    fn syntax(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, Some(self.cursor.position()))
    }

    pub fn next_token(&mut self) -> Result<Scan> {
        if let Some(token) = self.pending.take() {
            return Ok(Scan::Token(token));
        }
        loop {
            match self.mode() {
                Mode::Normal => match self.next_normal()? {
                    Some(scan) => return Ok(scan),
                    None => continue,
                },
                Mode::Comment => {
                    while let Some(ch) = self.cursor.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.cursor.next();
                    }
                    self.modes.pop();
                }
                Mode::LineString => return self.read_line_string(),
                Mode::MultiString => return self.read_multi_string(),
                Mode::DynamicString => return self.read_dynamic_string(),
                Mode::Embedded => match self.read_embedded()? {
                    Some(scan) => return Ok(scan),
                    None => continue,
                },
            }
        }
    }

    /// One step in normal mode. `Ok(None)` means a mode switch happened
    /// and the caller should loop.
    fn next_normal(&mut self) -> Result<Option<Scan>> {
        self.skip_whitespace();
        let position = self.cursor.position();
        let Some(ch) = self.cursor.peek() else {
            return Ok(Some(Scan::End));
        };
        match ch {
            '#' => {
                self.cursor.next();
                self.modes.push(Mode::Comment);
                Ok(None)
            }
            '\'' => {
                self.cursor.next();
                self.modes.push(Mode::LineString);
                Ok(None)
            }
            '`' => {
                self.cursor.next();
                self.modes.push(Mode::MultiString);
                Ok(None)
            }
            '"' => {
                self.cursor.next();
                self.modes.push(Mode::DynamicString);
                Ok(None)
            }
            '@' => {
                self.cursor.next();
                match self.read_marker(position)? {
                    Some(scan) => Ok(Some(scan)),
                    None => Ok(Some(Scan::Partial)),
                }
            }
            c if is_identifier_start(c) => {
                let text = self.read_identifier();
                let lowered = text.to_lowercase();
                if KEYWORDS.contains(&lowered.as_str()) {
                    if lowered == "json" || lowered == "yaml" {
                        self.modes.push(Mode::Embedded);
                    }
                    Ok(Some(Scan::Token(Token::new(
                        TokenKind::Keyword(lowered),
                        position,
                    ))))
                } else {
                    Ok(Some(Scan::Token(Token::new(TokenKind::Tag(text), position))))
                }
            }
            c if is_symbol_start(c) => {
                let symbol = self.read_symbol()?;
                Ok(Some(Scan::Token(Token::new(
                    TokenKind::Symbol(symbol),
                    position,
                ))))
            }
            c => Err(self.syntax(format!("unexpected character '{c}'"))),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.cursor.peek() {
            if ch.is_whitespace() {
                self.cursor.next();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.cursor.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                text.push(ch);
                self.cursor.next();
            } else if ch == '.'
                && !text.is_empty()
                && text.chars().all(|c| c.is_ascii_digit())
                && self.cursor.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            {
                // numeric literal with a fraction, e.g. 2.5
                text.push(ch);
                self.cursor.next();
            } else {
                break;
            }
        }
        text
    }

    /// `@` was consumed. Reads a keyword directive or a variable
    /// reference; `Ok(None)` means the input ended mid-reference.
    fn read_marker(&mut self, position: Position) -> Result<Option<Scan>> {
        if self.cursor.peek().is_none() {
            return Ok(None);
        }
        if !self.cursor.peek().is_some_and(is_identifier_start) {
            return Err(self.syntax("expected identifier after '@'"));
        }
        let name = self.read_identifier();
        let lowered = name.to_lowercase();
        if KEYWORDS.contains(&lowered.as_str()) {
            if lowered == "json" || lowered == "yaml" {
                self.modes.push(Mode::Embedded);
            }
            return Ok(Some(Scan::Token(Token::new(
                TokenKind::Keyword(lowered),
                position,
            ))));
        }
        let mut text = format!("@{name}");
        match self.read_variable_suffix(&mut text)? {
            true => Ok(Some(Scan::Token(Token::new(TokenKind::Tag(text), position)))),
            false => Ok(None),
        }
    }

    /// A variable reference may be followed immediately by a
    /// brace-enclosed nested identifier, recursively, to support composed
    /// dynamic tag names. Returns false when the input ended inside the
    /// braces; an unmatched brace against other text is a lexical error.
    fn read_variable_suffix(&mut self, text: &mut String) -> Result<bool> {
        while self.cursor.peek() == Some('{') {
            self.cursor.next();
            text.push('{');
            match self.cursor.peek() {
                Some('@') => {
                    self.cursor.next();
                    if !self.cursor.peek().is_some_and(is_identifier_start) {
                        return if self.cursor.peek().is_none() {
                            Ok(false)
                        } else {
                            Err(self.syntax("expected identifier after '@'"))
                        };
                    }
                    let inner = self.read_identifier();
                    text.push('@');
                    text.push_str(&inner);
                    if !self.read_variable_suffix(text)? {
                        return Ok(false);
                    }
                }
                Some(c) if is_identifier_start(c) => {
                    let inner = self.read_identifier();
                    text.push_str(&inner);
                }
                Some(_) => return Err(self.syntax("unmatched '{' in variable reference")),
                None => return Ok(false),
            }
            match self.cursor.peek() {
                Some('}') => {
                    self.cursor.next();
                    text.push('}');
                }
                Some(_) => return Err(self.syntax("unmatched '{' in variable reference")),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Assemble the longest valid multi-character operator.
    fn read_symbol(&mut self) -> Result<String> {
        let Some(first) = self.cursor.next() else {
            return Err(self.syntax("unexpected end of input"));
        };
        let second = self.cursor.peek();
        let symbol = match (first, second) {
            ('!', Some('=')) => self.take("!="),
            ('!', Some('<')) if self.cursor.peek_at(1) == Some('<') => self.take("!<<"),
            ('!', Some('<')) => self.take("!<"),
            ('!', Some('>')) if self.cursor.peek_at(1) == Some('>') => self.take("!>>"),
            ('!', Some('>')) => self.take("!>"),
            ('!', _) => "!".to_string(),
            ('<', Some('=')) => self.take("<="),
            ('<', Some('<')) => self.take("<<"),
            ('<', _) => "<".to_string(),
            ('>', Some('=')) => self.take(">="),
            ('>', Some('>')) => self.take(">>"),
            ('>', _) => ">".to_string(),
            ('/', Some('/')) => self.take("//"),
            ('/', _) => "/".to_string(),
            ('*', Some('*')) => self.take("**"),
            ('*', _) => "*".to_string(),
            ('=', Some('=')) => self.take("=="),
            ('=', _) => {
                return Err(self.syntax("unexpected '=' (did you mean '=='?)"));
            }
            (c, _) => c.to_string(),
        };
        Ok(symbol)
    }

    /// Consume the tail of `symbol` (its first character is already
    /// consumed) and return it.
    fn take(&mut self, symbol: &'static str) -> String {
        for _ in 1..symbol.chars().count() {
            self.cursor.next();
        }
        symbol.to_string()
    }

    fn read_line_string(&mut self) -> Result<Scan> {
        let position = self.cursor.position();
        let mut text = String::new();
        loop {
            match self.cursor.next() {
                None => return Ok(Scan::Partial),
                Some('\'') => {
                    self.modes.pop();
                    return Ok(Scan::Token(Token::new(TokenKind::LineString(text), position)));
                }
                Some('\n') => return Err(self.syntax("unterminated string before end of line")),
                Some('\\') => match self.read_escape()? {
                    Some(ch) => text.push(ch),
                    None => return Ok(Scan::Partial),
                },
                Some(ch) => text.push(ch),
            }
        }
    }

    fn read_multi_string(&mut self) -> Result<Scan> {
        let position = self.cursor.position();
        let mut text = String::new();
        loop {
            match self.cursor.next() {
                None => return Ok(Scan::Partial),
                Some('`') => {
                    self.modes.pop();
                    return Ok(Scan::Token(Token::new(
                        TokenKind::MultiString(text),
                        position,
                    )));
                }
                Some('\\') => match self.read_escape()? {
                    Some(ch) => text.push(ch),
                    None => return Ok(Scan::Partial),
                },
                Some(ch) => text.push(ch),
            }
        }
    }

    /// Dynamic strings allow `@` directives during capture: `@uuid`
    /// splices the placeholder text resolved at instantiation time, any
    /// other reference is kept literally.
    fn read_dynamic_string(&mut self) -> Result<Scan> {
        let position = self.cursor.position();
        let mut text = String::new();
        loop {
            match self.cursor.next() {
                None => return Ok(Scan::Partial),
                Some('"') => {
                    self.modes.pop();
                    return Ok(Scan::Token(Token::new(
                        TokenKind::DynamicString(text),
                        position,
                    )));
                }
                Some('\\') => match self.read_escape()? {
                    Some(ch) => text.push(ch),
                    None => return Ok(Scan::Partial),
                },
                Some('@') => {
                    if !self.cursor.peek().is_some_and(is_identifier_start) {
                        return Err(self.syntax("expected identifier after '@'"));
                    }
                    let name = self.read_identifier();
                    text.push('@');
                    text.push_str(&name);
                }
                Some(ch) => text.push(ch),
            }
        }
    }

    fn read_escape(&mut self) -> Result<Option<char>> {
        match self.cursor.next() {
            None => Ok(None),
            Some('n') => Ok(Some('\n')),
            Some('t') => Ok(Some('\t')),
            Some('r') => Ok(Some('\r')),
            Some('\\') => Ok(Some('\\')),
            Some('\'') => Ok(Some('\'')),
            Some('"') => Ok(Some('"')),
            Some('`') => Ok(Some('`')),
            Some('@') => Ok(Some('@')),
            Some(ch) => Err(self.syntax(format!("invalid escape sequence '\\{ch}'"))),
        }
    }

    /// Embedded-data capture. Reads raw characters until the `end`
    /// terminator (bare word or `@end`), a `#` comment, or an unescaped
    /// `@` directive. `\@` gives a literal marker, `\#` a literal hash,
    /// `\e` a literal 'e' that never starts the terminator; any other
    /// backslash pair passes through unchanged so JSON string escapes
    /// survive. `Ok(None)` means a directive was handled inline and the
    /// caller should loop.
    fn read_embedded(&mut self) -> Result<Option<Scan>> {
        let position = self.cursor.position();
        let mut text = String::new();
        loop {
            let Some(ch) = self.cursor.peek() else {
                return Ok(Some(Scan::Partial));
            };
            if ch == '\\' {
                self.cursor.next();
                match self.cursor.next() {
                    None => return Ok(Some(Scan::Partial)),
                    Some('@') => text.push('@'),
                    Some('#') => text.push('#'),
                    Some('e') => text.push('e'),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                continue;
            }
            if ch == '@' {
                self.cursor.next();
                if !self.cursor.peek().is_some_and(is_identifier_start) {
                    return if self.cursor.peek().is_none() {
                        Ok(Some(Scan::Partial))
                    } else {
                        Err(self.syntax("expected identifier after '@'"))
                    };
                }
                let directive_position = self.cursor.position();
                let name = self.read_identifier().to_lowercase();
                match name.as_str() {
                    "end" => {
                        self.modes.pop();
                        if text.is_empty() {
                            return Ok(Some(Scan::Token(Token::new(
                                TokenKind::Keyword("end".to_string()),
                                position,
                            ))));
                        }
                        // the terminator is already consumed; emit the
                        // fragment now and the `end` keyword on the next
                        // call
                        self.pending = Some(Token::new(
                            TokenKind::Keyword("end".to_string()),
                            directive_position,
                        ));
                        return Ok(Some(Scan::Token(Token::new(
                            TokenKind::DataFragment(text),
                            position,
                        ))));
                    }
                    "uuid" => {
                        // spliced quoted, so the placeholder is a string
                        // value in the embedded document
                        text.push_str("\"@uuid\"");
                    }
                    other => {
                        return Err(Error::syntax(
                            format!("unknown payload directive '@{other}'"),
                            Some(directive_position),
                        ))
                    }
                }
                continue;
            }
            if ch == '#' {
                // comments are stripped from the payload; an `end`
                // inside one does not terminate the capture
                self.cursor.next();
                self.modes.push(Mode::Comment);
                if text.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Scan::Token(Token::new(
                    TokenKind::DataFragment(text),
                    position,
                ))));
            }
            if self.at_embedded_terminator(text.chars().last()) {
                self.modes.pop();
                if text.is_empty() {
                    return Ok(None); // normal mode lexes the bare `end` keyword
                }
                return Ok(Some(Scan::Token(Token::new(
                    TokenKind::DataFragment(text),
                    position,
                ))));
            }
            text.push(ch);
            self.cursor.next();
        }
    }

    /// A bare word `end` at a word boundary terminates embedded capture.
    fn at_embedded_terminator(&self, prev: Option<char>) -> bool {
        if prev.is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return false;
        }
        if self.cursor.peek() != Some('e')
            || self.cursor.peek_at(1) != Some('n')
            || self.cursor.peek_at(2) != Some('d')
        {
            return false;
        }
        !self
            .cursor
            .peek_at(3)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_symbol_start(c: char) -> bool {
    matches!(
        c,
        ';' | '{' | '}' | '(' | ')' | ',' | '&' | '|' | '^' | '!' | '*' | '~' | '%' | '?' | '/'
            | '<' | '>' | '='
    )
}

/// Groups tokens into complete statements.
///
/// A statement is complete when the brace depth is zero and the last
/// token was the `;` terminator. The carry buffer holds raw text, so a
/// statement may be split at an arbitrary character boundary across input
/// chunks: lexing the chunks always equals lexing their concatenation.
pub struct StatementLexer {
    carry: String,
    path: Option<PathBuf>,
}

impl Default for StatementLexer {
    fn default() -> Self {
        StatementLexer::new()
    }
}

impl StatementLexer {
    pub fn new() -> Self {
        StatementLexer {
            carry: String::new(),
            path: None,
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        StatementLexer {
            carry: String::new(),
            path: Some(path),
        }
    }

    /// Append an input chunk to the carry buffer.
    pub fn feed(&mut self, chunk: &str) {
        self.carry.push_str(chunk);
    }

    /// Whether incomplete input is being carried.
    pub fn carrying(&self) -> bool {
        !self.carry.trim().is_empty()
    }

    /// Discard carried input (an interactive front end abandoning a
    /// half-typed statement).
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// Pull the next complete statement's tokens, terminator included.
    ///
    /// Returns `Ok(None)` when the buffered input holds no complete
    /// statement and `accept_carry` is true (the text is carried for the
    /// next call), or when the input is exhausted. With `accept_carry`
    /// false, leftover tokens are a Syntax error.
    pub fn next(&mut self, accept_carry: bool) -> Result<Option<Vec<Token>>> {
        let mut lexer = Lexer::with_path(&self.carry, self.path.clone());
        let mut tokens = Vec::new();
        let mut depth = 0i32;
        let partial = loop {
            match lexer.next_token() {
                Err(error) => {
                    self.carry.clear();
                    return Err(error);
                }
                Ok(Scan::Token(token)) => {
                    if token.is_symbol("{") {
                        depth += 1;
                    } else if token.is_symbol("}") {
                        depth -= 1;
                        if depth < 0 {
                            let position = token.position.clone();
                            self.carry.clear();
                            return Err(Error::syntax("unmatched '}'", Some(position)));
                        }
                    }
                    let terminator = depth == 0 && token.is_symbol(";");
                    tokens.push(token);
                    if terminator {
                        self.carry = self.carry[lexer.offset()..].to_string();
                        return Ok(Some(tokens));
                    }
                }
                Ok(Scan::End) => break false,
                Ok(Scan::Partial) => break true,
            }
        };
        if tokens.is_empty() && !partial {
            self.carry.clear();
            return Ok(None);
        }
        if accept_carry {
            return Ok(None);
        }
        let position = tokens.last().map(|t| t.position.clone());
        self.carry.clear();
        Err(Error::syntax("incomplete statement", position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut kinds = Vec::new();
        loop {
            match lexer.next_token().unwrap() {
                Scan::Token(token) => kinds.push(token.kind),
                Scan::End => return kinds,
                Scan::Partial => panic!("unexpected partial"),
            }
        }
    }

    #[test]
    fn test_longest_match_symbols() {
        assert_eq!(
            kinds("!>> << // ** != &"),
            vec![
                TokenKind::Symbol("!>>".into()),
                TokenKind::Symbol("<<".into()),
                TokenKind::Symbol("//".into()),
                TokenKind::Symbol("**".into()),
                TokenKind::Symbol("!=".into()),
                TokenKind::Symbol("&".into()),
            ]
        );
    }

    #[test]
    fn test_ampersand_before_toward_splits_cleanly() {
        assert_eq!(
            kinds("a &// b"),
            vec![
                TokenKind::Tag("a".into()),
                TokenKind::Symbol("&".into()),
                TokenKind::Symbol("//".into()),
                TokenKind::Tag("b".into()),
            ]
        );
    }

    #[test]
    fn test_marker_keyword_is_lowercased() {
        assert_eq!(kinds("@NONE"), vec![TokenKind::Keyword("none".into())]);
    }

    #[test]
    fn test_nested_variable_reference() {
        assert_eq!(
            kinds("@outer{@inner{leaf}}"),
            vec![TokenKind::Tag("@outer{@inner{leaf}}".into())]
        );
    }

    #[test]
    fn test_unmatched_variable_brace_is_an_error() {
        let mut lexer = Lexer::new("@outer{*}");
        assert!(lexer.next_token().is_err());
    }
}
