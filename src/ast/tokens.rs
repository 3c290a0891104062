use crate::error::{Error, Position, Result};

/// Lexical token kinds.
///
/// Tokens are stateless once produced; the context parser re-classifies
/// them into [`ContextToken`]s without losing the source position.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Reserved word or `@`-marker directive, lower-cased.
    Keyword(String),
    /// Identifier usable as a tag, including `@name{...}` variable
    /// references (flattened to their source text).
    Tag(String),
    /// Operator or punctuation, assembled longest-match.
    Symbol(String),
    /// `'...'` raw single-line string.
    LineString(String),
    /// `` `...` `` raw multi-line string.
    MultiString(String),
    /// `"..."` string; `@` directives were spliced in during capture.
    DynamicString(String),
    /// Raw slice of a `json ... end` / `yaml ... end` payload block.
    DataFragment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Token { kind, position }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == word)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(&self.kind, TokenKind::Symbol(s) if s == symbol)
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Keyword(k) => format!("keyword '{k}'"),
            TokenKind::Tag(t) => format!("tag '{t}'"),
            TokenKind::Symbol(s) => format!("'{s}'"),
            TokenKind::LineString(_)
            | TokenKind::MultiString(_)
            | TokenKind::DynamicString(_) => "string".to_string(),
            TokenKind::DataFragment(_) => "payload data".to_string(),
        }
    }
}

/// Operator codes of the context-expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOp {
    Not,
    And,
    Xor,
    Or,
    Then,
    Else,
    Parent,
    ParentNot,
    Ascend,
    AscendNot,
    Child,
    ChildNot,
    Descend,
    DescendNot,
    To,
    Toward,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ContextOp {
    /// Precedence class, tightest binding highest. Comparisons bind
    /// tightest; transitions loosest.
    pub fn precedence(&self) -> u8 {
        use ContextOp::*;
        match self {
            Eq | Ne | Lt | Le | Gt | Ge => 8,
            Not => 7,
            And => 6,
            Xor => 5,
            Or => 4,
            Then | Else => 3,
            Parent | ParentNot | Ascend | AscendNot | Child | ChildNot | Descend | DescendNot => 2,
            To | Toward => 1,
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, ContextOp::Not)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ContextOp::Eq
                | ContextOp::Ne
                | ContextOp::Lt
                | ContextOp::Le
                | ContextOp::Gt
                | ContextOp::Ge
        )
    }

    /// The level-stepping operators chain toward deeper levels, so
    /// `a / b / c` must group as `a / (b / c)`.
    pub fn is_right_associative(&self) -> bool {
        self.is_unary() || matches!(self.precedence(), 1 | 2)
    }
}

/// Terminal nodes of a context expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    /// Literal tag text, matched against the tag-set at the tested level.
    Tag(String),
    /// `true`/`false`/`**`: unconditional result, final at every level.
    Truth(bool),
    /// `*`: any one tag.
    Any,
    /// `~`: matches only at the root level of the tested context.
    Root,
    /// `%`: the selection candidate has no children.
    Leaf,
    /// `?`: coin flip.
    Random,
    /// `@depth`: length of the candidate's context.
    Depth,
    /// `@count`: number of children of the candidate.
    Count,
    /// `@index`: candidate's position among its siblings.
    Index,
    /// `@draw`: uniform draw in [0, 1).
    Draw,
    /// Numeric literal, for the comparison operators.
    Number(f64),
}

impl Terminal {
    /// Value queries and numbers are comparison operands; a following bare
    /// `<`/`>` is read as a comparison rather than a relational operator.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Terminal::Depth
                | Terminal::Count
                | Terminal::Index
                | Terminal::Draw
                | Terminal::Number(_)
        )
    }
}

/// A token re-classified for the context-expression parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextToken {
    Op(ContextOp, Position),
    Terminal(Terminal, Position),
    Open(Position),
    Close(Position),
}

impl ContextToken {
    pub fn position(&self) -> &Position {
        match self {
            ContextToken::Op(_, p)
            | ContextToken::Terminal(_, p)
            | ContextToken::Open(p)
            | ContextToken::Close(p) => p,
        }
    }
}

impl Token {
    /// Re-classify this token into the context-token view.
    ///
    /// `prev` is the previously classified token: a bare `<`/`>` after a
    /// value terminal is a comparison, after anything else a relational
    /// operator.
    pub fn classify(&self, prev: Option<&ContextToken>) -> Result<ContextToken> {
        let position = self.position.clone();
        let after_value = matches!(
            prev,
            Some(ContextToken::Terminal(t, _)) if t.is_value()
        );
        match &self.kind {
            TokenKind::Symbol(s) => {
                let classified = match s.as_str() {
                    "(" => return Ok(ContextToken::Open(position)),
                    ")" => return Ok(ContextToken::Close(position)),
                    "!" => ContextToken::Op(ContextOp::Not, position),
                    "&" => ContextToken::Op(ContextOp::And, position),
                    "^" => ContextToken::Op(ContextOp::Xor, position),
                    "|" | "," => ContextToken::Op(ContextOp::Or, position),
                    "/" => ContextToken::Op(ContextOp::To, position),
                    "//" => ContextToken::Op(ContextOp::Toward, position),
                    ">" if after_value => ContextToken::Op(ContextOp::Gt, position),
                    ">" => ContextToken::Op(ContextOp::Parent, position),
                    "<" if after_value => ContextToken::Op(ContextOp::Lt, position),
                    "<" => ContextToken::Op(ContextOp::Child, position),
                    ">>" => ContextToken::Op(ContextOp::Ascend, position),
                    "<<" => ContextToken::Op(ContextOp::Descend, position),
                    "!>" => ContextToken::Op(ContextOp::ParentNot, position),
                    "!<" => ContextToken::Op(ContextOp::ChildNot, position),
                    "!>>" => ContextToken::Op(ContextOp::AscendNot, position),
                    "!<<" => ContextToken::Op(ContextOp::DescendNot, position),
                    "==" => ContextToken::Op(ContextOp::Eq, position),
                    "!=" => ContextToken::Op(ContextOp::Ne, position),
                    "<=" => ContextToken::Op(ContextOp::Le, position),
                    ">=" => ContextToken::Op(ContextOp::Ge, position),
                    "*" => ContextToken::Terminal(Terminal::Any, position),
                    "**" => ContextToken::Terminal(Terminal::Truth(true), position),
                    "~" => ContextToken::Terminal(Terminal::Root, position),
                    "%" => ContextToken::Terminal(Terminal::Leaf, position),
                    "?" => ContextToken::Terminal(Terminal::Random, position),
                    other => {
                        return Err(Error::syntax(
                            format!("'{other}' is not a context operator"),
                            Some(self.position.clone()),
                        ))
                    }
                };
                Ok(classified)
            }
            TokenKind::Keyword(word) => {
                let classified = match word.as_str() {
                    "not" => ContextToken::Op(ContextOp::Not, position),
                    "and" => ContextToken::Op(ContextOp::And, position),
                    "xor" => ContextToken::Op(ContextOp::Xor, position),
                    "or" => ContextToken::Op(ContextOp::Or, position),
                    "to" => ContextToken::Op(ContextOp::To, position),
                    "toward" => ContextToken::Op(ContextOp::Toward, position),
                    "then" => ContextToken::Op(ContextOp::Then, position),
                    "else" => ContextToken::Op(ContextOp::Else, position),
                    "true" => ContextToken::Terminal(Terminal::Truth(true), position),
                    "false" => ContextToken::Terminal(Terminal::Truth(false), position),
                    "depth" => ContextToken::Terminal(Terminal::Depth, position),
                    "count" => ContextToken::Terminal(Terminal::Count, position),
                    "index" => ContextToken::Terminal(Terminal::Index, position),
                    "draw" => ContextToken::Terminal(Terminal::Draw, position),
                    other => {
                        return Err(Error::syntax(
                            format!("keyword '{other}' is not allowed in a context expression"),
                            Some(self.position.clone()),
                        ))
                    }
                };
                Ok(classified)
            }
            TokenKind::Tag(text) => {
                // a digit-shaped tag is a numeric literal only as a
                // comparison operand; anywhere else it matches as a tag
                let after_comparison = matches!(
                    prev,
                    Some(ContextToken::Op(op, _)) if op.is_comparison()
                );
                if after_comparison && numeric_shape(text) {
                    if let Ok(number) = text.parse::<f64>() {
                        return Ok(ContextToken::Terminal(Terminal::Number(number), position));
                    }
                }
                Ok(ContextToken::Terminal(
                    Terminal::Tag(text.clone()),
                    position,
                ))
            }
            _ => Err(Error::syntax(
                format!("{} is not allowed in a context expression", self.describe()),
                Some(self.position.clone()),
            )),
        }
    }
}

/// The lexer's numeric token shape: digits with at most one fraction.
/// Deliberately narrower than `str::parse::<f64>`, which also accepts
/// `nan`, `inf` and exponent forms that must stay tags.
fn numeric_shape(text: &str) -> bool {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}
