use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// One component of a cursor path: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

impl Step {
    pub fn key(name: &str) -> Step {
        Step::Key(name.to_string())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(k) => write!(f, "{k}"),
            Step::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A position-addressable tree with a stack cursor.
///
/// The cursor is a path of [`Step`]s into a [`Value`]. Reading never
/// modifies the tree; writing materializes missing containers on the way
/// down — a list when the component addressing the missing node is an
/// index, a map when it is a key, recursively at every level. Definition
/// code relies on "enter a position, then check emptiness" without
/// pre-declaring shape, so this rule must hold exactly.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Value,
    path: Vec<Step>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            root: Value::Null,
            path: Vec::new(),
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn path(&self) -> &[Step] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    fn path_display(&self) -> String {
        self.path
            .iter()
            .map(Step::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Push a component onto the cursor. Navigation alone never creates
    /// anything.
    pub fn enter(&mut self, step: Step) {
        self.path.push(step);
    }

    pub fn enter_key(&mut self, key: &str) {
        self.path.push(Step::Key(key.to_string()));
    }

    pub fn enter_index(&mut self, index: usize) {
        self.path.push(Step::Index(index));
    }

    /// Pop the innermost component.
    pub fn leave(&mut self) -> Result<Step> {
        self.path
            .pop()
            .ok_or_else(|| Error::logic("leave() on a cursor already at the root"))
    }

    /// Internal consistency check: the cursor must currently end with
    /// `expected`. A mismatch is a Logic error, not user-facing.
    pub fn assert_suffix(&self, expected: &[Step]) -> Result<()> {
        if self.path.ends_with(expected) {
            Ok(())
        } else {
            Err(Error::logic(format!(
                "cursor at [{}] does not end with [{}]",
                self.path_display(),
                expected
                    .iter()
                    .map(Step::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            )))
        }
    }

    /// The value at the cursor, if the position exists.
    pub fn get(&self) -> Option<&Value> {
        self.get_at(&self.path)
    }

    /// The value at an arbitrary path, read-only.
    pub fn get_at(&self, path: &[Step]) -> Option<&Value> {
        let mut value = &self.root;
        for step in path {
            value = match (value, step) {
                (Value::Map(entries), Step::Key(key)) => entries.get(key)?,
                (Value::List(items), Step::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// True when the position is missing or holds an empty container.
    pub fn is_empty(&self) -> bool {
        self.get().is_none_or(Value::is_empty)
    }

    /// Overwrite the value at the cursor, materializing intermediate
    /// containers as needed.
    pub fn set(&mut self, value: Value) {
        *self.slot_mut() = value;
    }

    /// Append to the list at the cursor. A missing position becomes a
    /// one-element list; a scalar is coerced into a list holding the prior
    /// value plus the appended one.
    pub fn append(&mut self, value: Value) {
        let slot = self.slot_mut();
        match slot {
            Value::Null => *slot = Value::List(vec![value]),
            Value::List(items) => items.push(value),
            _ => {
                let prior = std::mem::replace(slot, Value::Null);
                *slot = Value::List(vec![prior, value]);
            }
        }
    }

    /// Remove and return the element at `index` of the list at the cursor.
    pub fn remove(&mut self, index: usize) -> Result<Value> {
        let at = self.path_display();
        match self.slot_mut() {
            Value::List(items) if index < items.len() => Ok(items.remove(index)),
            _ => Err(Error::logic(format!(
                "remove({index}) at [{at}]: no such element"
            ))),
        }
    }

    /// Enter the indexed child list stored under `key`, positioned on
    /// index 0.
    pub fn enter_list(&mut self, key: &str) {
        self.enter_key(key);
        self.enter_index(0);
    }

    /// Advance the cursor to the next list item. Returns whether the new
    /// slot is non-empty.
    pub fn next_item(&mut self) -> Result<bool> {
        match self.leave()? {
            Step::Index(index) => {
                self.enter_index(index + 1);
                Ok(!self.is_empty())
            }
            step => Err(Error::logic(format!(
                "next_item() at non-indexed position [{step}]"
            ))),
        }
    }

    /// Leave an indexed child list entered with [`Tree::enter_list`],
    /// checking that the cursor actually sits inside one.
    pub fn leave_list(&mut self, key: &str) -> Result<()> {
        match self.leave()? {
            Step::Index(_) => {}
            step => {
                return Err(Error::logic(format!(
                    "leave_list({key}) at non-indexed position [{step}]"
                )))
            }
        }
        match self.leave()? {
            Step::Key(k) if k == key => Ok(()),
            step => Err(Error::logic(format!(
                "leave_list({key}) left [{step}] instead"
            ))),
        }
    }

    /// Resolve the cursor for writing, creating missing containers. The
    /// shape of a created container is decided by the component addressing
    /// it.
    fn slot_mut(&mut self) -> &mut Value {
        let mut value = &mut self.root;
        for step in &self.path {
            match step {
                Step::Key(key) => {
                    if !matches!(value, Value::Map(_)) {
                        *value = Value::Map(Default::default());
                    }
                    let Value::Map(entries) = value else {
                        unreachable!()
                    };
                    value = entries.entry(key.clone()).or_insert(Value::Null);
                }
                Step::Index(index) => {
                    if !matches!(value, Value::List(_)) {
                        *value = Value::List(Vec::new());
                    }
                    let Value::List(items) = value else {
                        unreachable!()
                    };
                    while items.len() <= *index {
                        items.push(Value::Null);
                    }
                    value = &mut items[*index];
                }
            }
        }
        value
    }
}
