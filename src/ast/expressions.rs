use std::fmt;

use crate::ast::tokens::Terminal;

/// Relational comparison kinds over value terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareKind::Eq => "==",
            CompareKind::Ne => "!=",
            CompareKind::Lt => "<",
            CompareKind::Le => "<=",
            CompareKind::Gt => ">",
            CompareKind::Ge => ">=",
        }
    }

    pub fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            CompareKind::Eq => left == right,
            CompareKind::Ne => left != right,
            CompareKind::Lt => left < right,
            CompareKind::Le => left <= right,
            CompareKind::Gt => left > right,
            CompareKind::Ge => left >= right,
        }
    }
}

/// Binary operator kinds of the context expression tree.
///
/// The relational operators carry their negated forms (`!>` etc.) as a
/// flag rather than separate variants; the matcher flips the structural
/// check, validity propagation is unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryKind {
    And,
    Xor,
    Or,
    Parent { negated: bool },
    Ascend { negated: bool },
    Child { negated: bool },
    Descend { negated: bool },
    To,
    Toward,
    Compare(CompareKind),
}

impl BinaryKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryKind::And => "&",
            BinaryKind::Xor => "^",
            BinaryKind::Or => "|",
            BinaryKind::Parent { negated: false } => ">",
            BinaryKind::Parent { negated: true } => "!>",
            BinaryKind::Ascend { negated: false } => ">>",
            BinaryKind::Ascend { negated: true } => "!>>",
            BinaryKind::Child { negated: false } => "<",
            BinaryKind::Child { negated: true } => "!<",
            BinaryKind::Descend { negated: false } => "<<",
            BinaryKind::Descend { negated: true } => "!<<",
            BinaryKind::To => "/",
            BinaryKind::Toward => "//",
            BinaryKind::Compare(kind) => kind.symbol(),
        }
    }
}

/// Special one-token terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    /// `*`
    Any,
    /// `~`
    Root,
    /// `%`
    Leaf,
    /// `?`
    Random,
}

/// Value-query terminals for the comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Depth,
    Count,
    Index,
    Draw,
}

/// A context expression node. Immutable once built; owned exclusively by
/// the statement that references it.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// Literal tag text.
    Literal(String),
    /// Unconditional boolean, final at every level.
    Truth(bool),
    Special(SpecialKind),
    Value(ValueKind),
    Number(f64),
    Not(Box<ExprNode>),
    Binary {
        op: BinaryKind,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    /// Parsed but reserved: no evaluation semantics exist.
    Ternary {
        condition: Box<ExprNode>,
        then_branch: Box<ExprNode>,
        else_branch: Box<ExprNode>,
    },
}

impl ExprNode {
    pub(crate) fn from_terminal(terminal: &Terminal) -> ExprNode {
        match terminal {
            Terminal::Tag(text) => ExprNode::Literal(text.clone()),
            Terminal::Truth(b) => ExprNode::Truth(*b),
            Terminal::Any => ExprNode::Special(SpecialKind::Any),
            Terminal::Root => ExprNode::Special(SpecialKind::Root),
            Terminal::Leaf => ExprNode::Special(SpecialKind::Leaf),
            Terminal::Random => ExprNode::Special(SpecialKind::Random),
            Terminal::Depth => ExprNode::Value(ValueKind::Depth),
            Terminal::Count => ExprNode::Value(ValueKind::Count),
            Terminal::Index => ExprNode::Value(ValueKind::Index),
            Terminal::Draw => ExprNode::Value(ValueKind::Draw),
            Terminal::Number(n) => ExprNode::Number(*n),
        }
    }
}

/// Canonical text form: fully parenthesized, so reparsing it yields a
/// structurally identical tree.
impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Literal(text) => write!(f, "{text}"),
            ExprNode::Truth(true) => write!(f, "true"),
            ExprNode::Truth(false) => write!(f, "false"),
            ExprNode::Special(SpecialKind::Any) => write!(f, "*"),
            ExprNode::Special(SpecialKind::Root) => write!(f, "~"),
            ExprNode::Special(SpecialKind::Leaf) => write!(f, "%"),
            ExprNode::Special(SpecialKind::Random) => write!(f, "?"),
            ExprNode::Value(ValueKind::Depth) => write!(f, "@depth"),
            ExprNode::Value(ValueKind::Count) => write!(f, "@count"),
            ExprNode::Value(ValueKind::Index) => write!(f, "@index"),
            ExprNode::Value(ValueKind::Draw) => write!(f, "@draw"),
            ExprNode::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            ExprNode::Not(operand) => write!(f, "!({operand})"),
            ExprNode::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExprNode::Ternary {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({condition} then {then_branch} else {else_branch})"),
        }
    }
}
