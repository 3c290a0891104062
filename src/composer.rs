use std::collections::HashMap;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::ast::{
    BinaryKind, Definition, ExprNode, OperationKind, Payload, SpecialKind, Statement, ValueKind,
};
use crate::error::{Error, Result};
use crate::lexer::StatementLexer;
use crate::parser::{self, Parser};
use crate::tree::{Step, Tree};
use crate::value::Value;

/// Map keys of a stored module.
const TAGS_KEY: &str = "tags";
const PAYLOAD_KEY: &str = "payload";
const NESTED_KEY: &str = "nested";

/// Tag text replaced with a freshly generated identifier per instantiated
/// copy.
const UUID_PLACEHOLDER: &str = "@uuid";

/// Result of matching one expression node against a tested context.
///
/// `matched` is the boolean outcome; `is_final` carries the asymmetric
/// validity propagation: a module is selected only when its own context
/// matches *and* the match terminates at the deepest tested level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Match {
    matched: bool,
    is_final: bool,
}

/// Values the comparison terminals are resolved against, fixed per
/// selection candidate.
struct Candidate {
    depth: usize,
    child_count: usize,
    index: usize,
    leaf: bool,
}

/// Interprets statement ASTs against the persistent module tree.
///
/// The tree is exclusively owned; callers needing concurrent access must
/// serialize requests externally. One `compose` call runs to completion
/// before the next begins.
pub struct Composer {
    tree: Tree,
    lexer: StatementLexer,
}

impl Default for Composer {
    fn default() -> Self {
        Composer::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Composer {
            tree: Tree::new(),
            lexer: StatementLexer::new(),
        }
    }

    /// Read-only view of the module store.
    pub fn store(&self) -> &Value {
        self.tree.root()
    }

    /// Whether an incomplete statement is being carried between calls.
    pub fn carrying(&self) -> bool {
        self.lexer.carrying()
    }

    /// Discard carried input.
    pub fn reset_carry(&mut self) {
        self.lexer.reset();
    }

    /// Lex, parse and apply every complete statement in `source`,
    /// returning the deep-copied snapshots selected by `get` statements
    /// in selection order.
    ///
    /// With `accept_carry`, trailing tokens that do not yet form a
    /// complete statement are carried to the next call; otherwise they
    /// are a Syntax error. Each statement is parsed and validated in full
    /// before any tree mutation begins.
    pub fn compose(&mut self, source: &str, accept_carry: bool) -> Result<Vec<Value>> {
        self.lexer.feed(source);
        let mut output = Vec::new();
        let result = self.drain(accept_carry, &mut output);
        if result.is_err() {
            // unconsumed input after a failed statement is not trusted
            self.lexer.reset();
        }
        result.map(|()| output)
    }

    fn drain(&mut self, accept_carry: bool, output: &mut Vec<Value>) -> Result<()> {
        while let Some(tokens) = self.lexer.next(accept_carry)? {
            let mut parser = Parser::new(tokens);
            let statement = parser.parse_statement()?;
            parser.expect_end()?;
            self.apply(&statement, output)?;
        }
        Ok(())
    }

    /// Apply pre-built statements: the programmatic entry for trusted
    /// callers, structurally validated before composition.
    pub fn compose_ast(&mut self, nodes: &Value) -> Result<Vec<Value>> {
        let statements = parser::from_values(nodes)?;
        let mut output = Vec::new();
        for statement in &statements {
            self.apply(statement, &mut output)?;
        }
        Ok(output)
    }

    /// Apply a single parsed statement.
    pub fn apply(&mut self, statement: &Statement, output: &mut Vec<Value>) -> Result<()> {
        debug!(
            operation = statement.operation.keyword(),
            greedy = statement.greedy,
            "composing statement"
        );
        let mut halted = false;
        self.traverse(statement, output, &mut halted)?;
        Ok(())
    }

    /// Depth-first traversal: recurse into the children of the module at
    /// the cursor, then test the module itself and perform the operation
    /// when it is selected. Returns whether the caller must re-test the
    /// current index instead of advancing (a deletion at index 0 shifted
    /// a new module into place).
    fn traverse(
        &mut self,
        statement: &Statement,
        output: &mut Vec<Value>,
        halted: &mut bool,
    ) -> Result<bool> {
        self.tree.enter_list(NESTED_KEY);
        while !self.tree.is_empty() {
            if statement.greedy && *halted {
                break;
            }
            if self.traverse(statement, output, halted)? {
                continue;
            }
            self.tree.next_item()?;
        }
        self.tree.leave_list(NESTED_KEY)?;

        if statement.greedy && *halted {
            return Ok(false);
        }
        if self.selected(statement)? {
            trace!(path = ?self.tree.path(), "module selected");
            *halted = true;
            return self.compose_module(statement, output);
        }
        Ok(false)
    }

    /// Is the module at the cursor selected by the statement's context?
    fn selected(&self, statement: &Statement) -> Result<bool> {
        let indices = self.cursor_indices()?;
        let mut chain: Vec<&Value> = Vec::with_capacity(indices.len());
        let mut node = self.tree.root();
        for &index in &indices {
            node = node
                .get_key(NESTED_KEY)
                .and_then(|nested| nested.get_index(index))
                .ok_or_else(|| Error::logic("cursor points at a missing module"))?;
            chain.push(node);
        }
        match &statement.context {
            // the empty expression matches only the empty context, i.e.
            // the anonymous store root
            None => Ok(chain.is_empty()),
            Some(expr) => {
                let children = module_children(node);
                let candidate = Candidate {
                    depth: chain.len(),
                    child_count: children.len(),
                    index: indices.last().copied().unwrap_or(0),
                    leaf: children.is_empty(),
                };
                let outcome = self.match_expr(expr, &chain, 0, &candidate)?;
                Ok(outcome.matched && outcome.is_final)
            }
        }
    }

    /// The module index path encoded in the cursor, shape-checked.
    fn cursor_indices(&self) -> Result<Vec<usize>> {
        let path = self.tree.path();
        if path.len() % 2 != 0 {
            return Err(Error::logic("cursor is not positioned on a module"));
        }
        let mut indices = Vec::with_capacity(path.len() / 2);
        for pair in path.chunks(2) {
            match pair {
                [Step::Key(key), Step::Index(index)] if key == NESTED_KEY => indices.push(*index),
                _ => return Err(Error::logic("cursor is not positioned on a module")),
            }
        }
        Ok(indices)
    }

    /// Recursive matcher. `chain` is the path of modules whose tag-sets
    /// form the tested context; `level` indexes into it. The validity
    /// (`is_final`) propagation rules are deliberately asymmetric and
    /// must not be "simplified".
    fn match_expr(
        &self,
        expr: &ExprNode,
        chain: &[&Value],
        level: usize,
        candidate: &Candidate,
    ) -> Result<Match> {
        if level >= chain.len() {
            // out of range is vacuously final so it never blocks an
            // enclosing validity check
            return Ok(Match {
                matched: false,
                is_final: true,
            });
        }
        let deepest = level == chain.len() - 1;
        match expr {
            ExprNode::Truth(value) => Ok(Match {
                matched: *value,
                is_final: true,
            }),
            ExprNode::Literal(tag) => Ok(Match {
                matched: module_tags(chain[level]).iter().any(|t| t == tag),
                is_final: deepest,
            }),
            ExprNode::Special(SpecialKind::Any) => Ok(Match {
                matched: true,
                is_final: deepest,
            }),
            ExprNode::Special(SpecialKind::Root) => Ok(Match {
                matched: level == 0,
                is_final: deepest,
            }),
            ExprNode::Special(SpecialKind::Leaf) => Ok(Match {
                matched: candidate.leaf,
                is_final: deepest,
            }),
            ExprNode::Special(SpecialKind::Random) => Ok(Match {
                matched: coin_flip(),
                is_final: deepest,
            }),
            ExprNode::Value(_) | ExprNode::Number(_) => Err(Error::syntax(
                "value terminals are only allowed as comparison operands",
                None,
            )),
            ExprNode::Not(operand) => {
                let inner = self.match_expr(operand, chain, level, candidate)?;
                Ok(Match {
                    matched: !inner.matched,
                    is_final: inner.is_final,
                })
            }
            ExprNode::Binary { op, left, right } => {
                self.match_binary(*op, left, right, chain, level, candidate)
            }
            ExprNode::Ternary { .. } => Err(Error::logic(
                "ternary context operator is not implemented",
            )),
        }
    }

    fn match_binary(
        &self,
        op: BinaryKind,
        left: &ExprNode,
        right: &ExprNode,
        chain: &[&Value],
        level: usize,
        candidate: &Candidate,
    ) -> Result<Match> {
        match op {
            BinaryKind::And => {
                let a = self.match_expr(left, chain, level, candidate)?;
                if !a.matched {
                    return Ok(Match {
                        matched: false,
                        is_final: a.is_final,
                    });
                }
                let b = self.match_expr(right, chain, level, candidate)?;
                Ok(Match {
                    matched: b.matched,
                    is_final: a.is_final && b.is_final,
                })
            }
            BinaryKind::Or => {
                let a = self.match_expr(left, chain, level, candidate)?;
                if a.matched {
                    return Ok(Match {
                        matched: true,
                        is_final: a.is_final,
                    });
                }
                let b = self.match_expr(right, chain, level, candidate)?;
                Ok(Match {
                    matched: b.matched,
                    is_final: b.is_final && (b.matched || a.is_final),
                })
            }
            BinaryKind::Xor => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let b = self.match_expr(right, chain, level, candidate)?;
                Ok(Match {
                    matched: a.matched != b.matched,
                    is_final: if a.matched { a.is_final } else { b.is_final },
                })
            }
            BinaryKind::Parent { negated } => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let mut found = false;
                if a.matched {
                    for child in module_children(chain[level]) {
                        let mut extended: Vec<&Value> = chain[..=level].to_vec();
                        extended.push(child);
                        if self
                            .match_expr(right, &extended, level + 1, candidate)?
                            .matched
                        {
                            found = true;
                            break;
                        }
                    }
                }
                Ok(Match {
                    matched: a.matched && (found != negated),
                    is_final: a.is_final,
                })
            }
            BinaryKind::Ascend { negated } => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let mut found = false;
                if a.matched {
                    let prefix: Vec<&Value> = chain[..=level].to_vec();
                    found = self.scan_descendants(right, &prefix, candidate)?;
                }
                Ok(Match {
                    matched: a.matched && (found != negated),
                    is_final: a.is_final,
                })
            }
            BinaryKind::Child { negated } => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let b = if level == 0 {
                    Match {
                        matched: false,
                        is_final: true,
                    }
                } else {
                    self.match_expr(right, chain, level - 1, candidate)?
                };
                Ok(Match {
                    matched: a.matched && (b.matched != negated),
                    is_final: a.is_final,
                })
            }
            BinaryKind::Descend { negated } => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let mut found = false;
                if a.matched {
                    for tested in (0..level).rev() {
                        if self.match_expr(right, chain, tested, candidate)?.matched {
                            found = true;
                            break;
                        }
                    }
                }
                Ok(Match {
                    matched: a.matched && (found != negated),
                    is_final: a.is_final,
                })
            }
            BinaryKind::To => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let b = self.match_expr(right, chain, level + 1, candidate)?;
                Ok(Match {
                    matched: a.matched && b.matched,
                    is_final: b.is_final,
                })
            }
            BinaryKind::Toward => {
                let a = self.match_expr(left, chain, level, candidate)?;
                let mut b = Match {
                    matched: false,
                    is_final: true,
                };
                for tested in level + 1..chain.len() {
                    b = self.match_expr(right, chain, tested, candidate)?;
                    if b.matched && b.is_final {
                        break;
                    }
                }
                Ok(Match {
                    matched: a.matched && b.matched && b.is_final,
                    is_final: b.is_final,
                })
            }
            BinaryKind::Compare(kind) => {
                let left = self.value_of(left, candidate)?;
                let right = self.value_of(right, candidate)?;
                Ok(Match {
                    matched: kind.holds(left, right),
                    is_final: level == chain.len() - 1,
                })
            }
        }
    }

    /// `>>` scan: test the right operand against every descendant at its
    /// own level, descending while nothing matched.
    fn scan_descendants(
        &self,
        expr: &ExprNode,
        prefix: &[&Value],
        candidate: &Candidate,
    ) -> Result<bool> {
        let parent = prefix[prefix.len() - 1];
        for child in module_children(parent) {
            let mut extended: Vec<&Value> = prefix.to_vec();
            extended.push(child);
            if self
                .match_expr(expr, &extended, extended.len() - 1, candidate)?
                .matched
            {
                return Ok(true);
            }
            if self.scan_descendants(expr, &extended, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolve a comparison operand.
    fn value_of(&self, expr: &ExprNode, candidate: &Candidate) -> Result<f64> {
        match expr {
            ExprNode::Number(n) => Ok(*n),
            ExprNode::Value(ValueKind::Depth) => Ok(candidate.depth as f64),
            ExprNode::Value(ValueKind::Count) => Ok(candidate.child_count as f64),
            ExprNode::Value(ValueKind::Index) => Ok(candidate.index as f64),
            ExprNode::Value(ValueKind::Draw) => Ok(random_unit()),
            _ => Err(Error::syntax(
                "comparison operands must be value terminals or numbers",
                None,
            )),
        }
    }

    /// Perform the statement's operation on the selected module at the
    /// cursor. Returns whether the caller must re-test the current index.
    fn compose_module(&mut self, statement: &Statement, output: &mut Vec<Value>) -> Result<bool> {
        match statement.operation {
            OperationKind::Print => {
                let snapshot = self
                    .tree
                    .get()
                    .cloned()
                    .ok_or_else(|| Error::logic("selected module vanished before printing"))?;
                output.push(snapshot);
                Ok(false)
            }
            OperationKind::Edit => {
                let definition = statement
                    .definition
                    .as_ref()
                    .ok_or_else(|| Error::logic("edit statement without a definition"))?;
                let module = instantiate(definition)?;
                self.tree.set(module);
                Ok(false)
            }
            OperationKind::New => {
                let definition = statement
                    .definition
                    .as_ref()
                    .ok_or_else(|| Error::logic("new statement without a definition"))?;
                let module = instantiate(definition)?;
                self.tree.enter_key(NESTED_KEY);
                self.tree.append(module);
                self.tree.leave()?;
                Ok(false)
            }
            OperationKind::Delete => self.delete_current(),
        }
    }

    /// Remove the module at the cursor from its parent's child list,
    /// keeping sibling iteration correct. Deleting at index 0 leaves the
    /// indexed position, clears it and reports the deletion so the
    /// caller does not advance into now-shifted indices; deleting at a
    /// later index splices it out and re-enters the preceding index.
    fn delete_current(&mut self) -> Result<bool> {
        if self.tree.depth() == 0 {
            warn!("the store root cannot be deleted; statement ignored");
            return Ok(false);
        }
        let Step::Index(index) = self.tree.leave()? else {
            return Err(Error::logic("delete at a non-indexed position"));
        };
        self.tree.remove(index)?;
        if index == 0 {
            self.tree.enter_index(0);
            Ok(true)
        } else {
            self.tree.enter_index(index - 1);
            Ok(false)
        }
    }
}

/// Deep-copy the definition into a fresh module value. Any tag literally
/// equal to the UUID placeholder is replaced with a freshly generated
/// UUID per copy, so structurally identical templates get distinct
/// identities.
fn instantiate(definition: &Definition) -> Result<Value> {
    let mut module = HashMap::new();
    let mut tags: Vec<Value> = Vec::new();
    if let Some(handle) = &definition.handle {
        tags.push(Value::String(resolve_tag(handle)));
    }
    for tag in &definition.tags {
        tags.push(Value::String(resolve_tag(tag)));
    }
    if !tags.is_empty() {
        module.insert(TAGS_KEY.to_string(), Value::List(tags));
    }
    if let Some(payload) = &definition.payload {
        let value = match payload {
            Payload::Data { value, .. } => resolve_placeholders(value.clone()),
            Payload::Text(text) => Value::String(resolve_text(text)),
        };
        module.insert(PAYLOAD_KEY.to_string(), value);
    }
    if !definition.children.is_empty() {
        let mut children = Vec::with_capacity(definition.children.len());
        for child in &definition.children {
            let child_definition = child.definition.as_ref().ok_or_else(|| {
                Error::syntax("'has' entries must be 'new' definitions", None)
            })?;
            children.push(instantiate(child_definition)?);
        }
        module.insert(NESTED_KEY.to_string(), Value::List(children));
    }
    Ok(Value::Map(module))
}

fn resolve_tag(tag: &str) -> String {
    if tag == UUID_PLACEHOLDER {
        Uuid::new_v4().to_string()
    } else {
        tag.to_string()
    }
}

/// Replace placeholder strings inside a payload, each occurrence with a
/// distinct identifier.
fn resolve_placeholders(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_text(&text)),
        Value::List(items) => Value::List(items.into_iter().map(resolve_placeholders).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, resolve_placeholders(v)))
                .collect(),
        ),
        other => other,
    }
}

fn resolve_text(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(at) = result.find(UUID_PLACEHOLDER) {
        result.replace_range(at..at + UUID_PLACEHOLDER.len(), &Uuid::new_v4().to_string());
    }
    result
}

fn module_tags(module: &Value) -> Vec<String> {
    match module.get_key(TAGS_KEY) {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn module_children(module: &Value) -> &[Value] {
    match module.get_key(NESTED_KEY) {
        Some(Value::List(items)) => items,
        _ => &[],
    }
}

/// Coin flip for the `?` terminal, drawn from the v4 identifier source
/// (the only randomness collaborator this crate carries).
fn coin_flip() -> bool {
    Uuid::new_v4().as_u128() & 1 == 0
}

/// Uniform draw in [0, 1) for the `@draw` value query.
fn random_unit() -> f64 {
    const BITS: u32 = 53;
    let mantissa = Uuid::new_v4().as_u128() & ((1u128 << BITS) - 1);
    mantissa as f64 / (1u128 << BITS) as f64
}
