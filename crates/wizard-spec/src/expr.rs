use std::cmp::Ordering;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{FieldStore, is_empty_value};

/// Small expression language for cross-field step conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Literal { value: Value },
    /// Field value, with dotted or pointer paths into structured values.
    Field { path: String },
    IsSet { path: String },
    /// Item count of an array or character count of a string.
    Count { path: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
    Eq { left: Box<Expr>, right: Box<Expr> },
    Ne { left: Box<Expr>, right: Box<Expr> },
    Lt { left: Box<Expr>, right: Box<Expr> },
    Lte { left: Box<Expr>, right: Box<Expr> },
    Gt { left: Box<Expr>, right: Box<Expr> },
    Gte { left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field { path: path.into() }
    }

    pub fn literal(value: Value) -> Self {
        Expr::Literal { value }
    }

    pub fn evaluate_value(&self, store: &FieldStore) -> Option<Value> {
        match self {
            Expr::Literal { value } => Some(value.clone()),
            Expr::Field { path } => lookup(store, path).cloned(),
            Expr::IsSet { path } => Some(Value::Bool(
                lookup(store, path).is_some_and(|value| !is_empty_value(value)),
            )),
            Expr::Count { path } => {
                let count = match lookup(store, path) {
                    Some(Value::Array(items)) => items.len(),
                    Some(Value::String(text)) => text.chars().count(),
                    Some(Value::Null) | None => 0,
                    Some(_) => 1,
                };
                Some(Value::from(count))
            }
            Expr::And { expressions } => evaluate_all(expressions, store, false),
            Expr::Or { expressions } => evaluate_all(expressions, store, true),
            Expr::Not { expression } => expression
                .evaluate_bool(store)
                .map(|value| Value::Bool(!value)),
            Expr::Eq { left, right } => {
                let left = left.evaluate_value(store)?;
                let right = right.evaluate_value(store)?;
                Some(Value::Bool(left == right))
            }
            Expr::Ne { left, right } => {
                let left = left.evaluate_value(store)?;
                let right = right.evaluate_value(store)?;
                Some(Value::Bool(left != right))
            }
            Expr::Lt { left, right } => compare(left, right, store, |o| o == Ordering::Less),
            Expr::Lte { left, right } => compare(left, right, store, |o| o != Ordering::Greater),
            Expr::Gt { left, right } => compare(left, right, store, |o| o == Ordering::Greater),
            Expr::Gte { left, right } => compare(left, right, store, |o| o != Ordering::Less),
        }
    }

    /// `None` when an operand is missing or the types cannot be compared.
    pub fn evaluate_bool(&self, store: &FieldStore) -> Option<bool> {
        match self.evaluate_value(store)? {
            Value::Bool(value) => Some(value),
            Value::Number(number) => number.as_f64().map(|value| value != 0.0),
            Value::Null => Some(false),
            _ => None,
        }
    }
}

// `short_circuit` is the value that ends evaluation: false for and, true for or.
fn evaluate_all(expressions: &[Expr], store: &FieldStore, short_circuit: bool) -> Option<Value> {
    let mut undecided = false;
    for expression in expressions {
        match expression.evaluate_bool(store) {
            Some(value) if value == short_circuit => return Some(Value::Bool(short_circuit)),
            Some(_) => {}
            None => undecided = true,
        }
    }
    if undecided {
        None
    } else {
        Some(Value::Bool(!short_circuit))
    }
}

fn compare<F>(left: &Expr, right: &Expr, store: &FieldStore, predicate: F) -> Option<Value>
where
    F: Fn(Ordering) -> bool,
{
    let left = left.evaluate_value(store)?;
    let right = right.evaluate_value(store)?;
    let ordering = match (&left, &right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?)?,
        (Value::String(left), Value::String(right)) => left.cmp(right),
        _ if left == right => Ordering::Equal,
        _ => return None,
    };
    Some(Value::Bool(predicate(ordering)))
}

fn lookup<'a>(store: &'a FieldStore, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if let Some(pointer) = path.strip_prefix('/') {
        let (head, rest) = match pointer.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (pointer, None),
        };
        let root = store.get(head)?;
        return match rest {
            Some(rest) => root.pointer(&format!("/{rest}")),
            None => Some(root),
        };
    }

    let mut segments = path.split('.').filter(|segment| !segment.is_empty());
    let mut current = store.get(segments.next()?)?;
    for segment in segments {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}
