//! Context-expression parsing: classic two-phase infix → postfix → tree
//! conversion over re-classified tokens.

use crate::ast::{
    BinaryKind, CompareKind, ContextOp, ContextToken, ExprNode, Terminal, Token,
};
use crate::error::{Error, Position, Result};

/// Parse the tokens of an `in`/`at` clause into an expression tree.
pub fn parse(tokens: &[Token]) -> Result<ExprNode> {
    let classified = classify(tokens)?;
    let postfix = to_postfix(&classified)?;
    build_tree(&postfix)
}

/// Convenience entry for programmatic callers holding expression text.
pub fn parse_text(text: &str) -> Result<ExprNode> {
    use crate::lexer::{Lexer, Scan};
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token()? {
            Scan::Token(token) => tokens.push(token),
            Scan::End => break,
            Scan::Partial => {
                return Err(Error::syntax("incomplete context expression", None));
            }
        }
    }
    parse(&tokens)
}

fn classify(tokens: &[Token]) -> Result<Vec<ContextToken>> {
    if tokens.is_empty() {
        return Err(Error::syntax("empty context expression", None));
    }
    let mut classified: Vec<ContextToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let context_token = token.classify(classified.last())?;
        classified.push(context_token);
    }
    Ok(classified)
}

/// One element of the postfix stream.
#[derive(Debug, Clone)]
enum PostfixItem {
    Terminal(Terminal, Position),
    Op(ContextOp, Position),
}

/// Shunting-yard: a left-associative operator leaves the stack while its
/// precedence is at least the incoming one's; right-associative operators
/// (`!` and the level-stepping family) only yield to strictly tighter
/// ones. Parentheses short-circuit precedence in the usual stack-based
/// way.
fn to_postfix(tokens: &[ContextToken]) -> Result<Vec<PostfixItem>> {
    enum StackItem {
        Op(ContextOp, Position),
        Open(Position),
    }

    let mut output = Vec::new();
    let mut stack: Vec<StackItem> = Vec::new();
    for token in tokens {
        match token {
            ContextToken::Terminal(terminal, position) => {
                output.push(PostfixItem::Terminal(terminal.clone(), position.clone()));
            }
            ContextToken::Open(position) => stack.push(StackItem::Open(position.clone())),
            ContextToken::Close(position) => loop {
                match stack.pop() {
                    Some(StackItem::Op(op, p)) => output.push(PostfixItem::Op(op, p)),
                    Some(StackItem::Open(_)) => break,
                    None => {
                        return Err(Error::syntax("unmatched ')'", Some(position.clone())));
                    }
                }
            },
            ContextToken::Op(op, position) => {
                while let Some(StackItem::Op(top, _)) = stack.last() {
                    let yields = if op.is_right_associative() {
                        top.precedence() > op.precedence()
                    } else {
                        top.precedence() >= op.precedence()
                    };
                    if !yields {
                        break;
                    }
                    let Some(StackItem::Op(top, top_position)) = stack.pop() else {
                        unreachable!()
                    };
                    output.push(PostfixItem::Op(top, top_position));
                }
                stack.push(StackItem::Op(*op, position.clone()));
            }
        }
    }
    while let Some(item) = stack.pop() {
        match item {
            StackItem::Op(op, position) => output.push(PostfixItem::Op(op, position)),
            StackItem::Open(position) => {
                return Err(Error::syntax("unmatched '('", Some(position)));
            }
        }
    }
    Ok(output)
}

/// Reduce the postfix stream to a tree: unary operators pop one operand,
/// binary two; `then`/`else` together pop three.
fn build_tree(postfix: &[PostfixItem]) -> Result<ExprNode> {
    /// `then` parks its two operands until the matching `else` arrives.
    enum Partial {
        Node(ExprNode),
        Then(ExprNode, ExprNode),
    }

    fn pop_node(stack: &mut Vec<Partial>, position: &Position) -> Result<ExprNode> {
        match stack.pop() {
            Some(Partial::Node(node)) => Ok(node),
            Some(Partial::Then(..)) => Err(Error::syntax(
                "'then' without matching 'else'",
                Some(position.clone()),
            )),
            None => Err(Error::syntax(
                "malformed context expression",
                Some(position.clone()),
            )),
        }
    }

    let mut stack: Vec<Partial> = Vec::new();
    for item in postfix {
        match item {
            PostfixItem::Terminal(terminal, _) => {
                stack.push(Partial::Node(ExprNode::from_terminal(terminal)));
            }
            PostfixItem::Op(ContextOp::Not, position) => {
                let operand = pop_node(&mut stack, position)?;
                stack.push(Partial::Node(ExprNode::Not(Box::new(operand))));
            }
            PostfixItem::Op(ContextOp::Then, position) => {
                let then_branch = pop_node(&mut stack, position)?;
                let condition = pop_node(&mut stack, position)?;
                stack.push(Partial::Then(condition, then_branch));
            }
            PostfixItem::Op(ContextOp::Else, position) => {
                let else_branch = pop_node(&mut stack, position)?;
                match stack.pop() {
                    Some(Partial::Then(condition, then_branch)) => {
                        stack.push(Partial::Node(ExprNode::Ternary {
                            condition: Box::new(condition),
                            then_branch: Box::new(then_branch),
                            else_branch: Box::new(else_branch),
                        }));
                    }
                    _ => {
                        return Err(Error::syntax(
                            "'else' without matching 'then'",
                            Some(position.clone()),
                        ))
                    }
                }
            }
            PostfixItem::Op(op, position) => {
                let right = pop_node(&mut stack, position)?;
                let left = pop_node(&mut stack, position)?;
                stack.push(Partial::Node(ExprNode::Binary {
                    op: binary_kind(*op),
                    left: Box::new(left),
                    right: Box::new(right),
                }));
            }
        }
    }
    match (stack.pop(), stack.is_empty()) {
        (Some(Partial::Node(node)), true) => Ok(node),
        (Some(Partial::Then(..)), _) => {
            Err(Error::syntax("'then' without matching 'else'", None))
        }
        _ => Err(Error::syntax("malformed context expression", None)),
    }
}

fn binary_kind(op: ContextOp) -> BinaryKind {
    match op {
        ContextOp::And => BinaryKind::And,
        ContextOp::Xor => BinaryKind::Xor,
        ContextOp::Or => BinaryKind::Or,
        ContextOp::Parent => BinaryKind::Parent { negated: false },
        ContextOp::ParentNot => BinaryKind::Parent { negated: true },
        ContextOp::Ascend => BinaryKind::Ascend { negated: false },
        ContextOp::AscendNot => BinaryKind::Ascend { negated: true },
        ContextOp::Child => BinaryKind::Child { negated: false },
        ContextOp::ChildNot => BinaryKind::Child { negated: true },
        ContextOp::Descend => BinaryKind::Descend { negated: false },
        ContextOp::DescendNot => BinaryKind::Descend { negated: true },
        ContextOp::To => BinaryKind::To,
        ContextOp::Toward => BinaryKind::Toward,
        ContextOp::Eq => BinaryKind::Compare(CompareKind::Eq),
        ContextOp::Ne => BinaryKind::Compare(CompareKind::Ne),
        ContextOp::Lt => BinaryKind::Compare(CompareKind::Lt),
        ContextOp::Le => BinaryKind::Compare(CompareKind::Le),
        ContextOp::Gt => BinaryKind::Compare(CompareKind::Gt),
        ContextOp::Ge => BinaryKind::Compare(CompareKind::Ge),
        ContextOp::Not | ContextOp::Then | ContextOp::Else => {
            unreachable!("handled before binary reduction")
        }
    }
}
