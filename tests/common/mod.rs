#![allow(dead_code)]

use eventstate::Change;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Every `(value, change)` pair a handler received, in order.
pub type Calls = Rc<RefCell<Vec<(Value, Change)>>>;

pub fn calls() -> Calls {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn recorder(calls: &Calls) -> impl Fn(&Value, &Change) + 'static {
    let calls = calls.clone();
    move |value, change| calls.borrow_mut().push((value.clone(), change.clone()))
}

pub fn values(calls: &Calls) -> Vec<Value> {
    calls.borrow().iter().map(|(v, _)| v.clone()).collect()
}

pub fn paths(calls: &Calls) -> Vec<String> {
    calls.borrow().iter().map(|(_, c)| c.path.clone()).collect()
}

/// Shared, ordered trace of which handler fired, for ordering tests.
pub type Trace = Rc<RefCell<Vec<String>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn tracer(trace: &Trace, label: &str) -> impl Fn(&Value, &Change) + 'static {
    let trace = trace.clone();
    let label = label.to_string();
    move |_, _| trace.borrow_mut().push(label.clone())
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoState {
    pub items: Vec<TodoItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub text: String,
    pub done: bool,
}

pub fn todo(id: u64, text: &str) -> Value {
    json!({"id": id, "text": text, "done": false})
}

pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.'),
        None => false,
    }
}
