use crate::value::Value;
use crate::vm::{Error, Vm};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub type ProcBody = Rc<dyn Fn(&mut Vm, &Value, &[Value]) -> Result<Value, Error>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Any,
}

impl Arity {
    /// Host-language arity number; variadic is `-1`.
    pub fn as_int(&self) -> i64 {
        match self {
            Arity::Exact(n) => *n as i64,
            Arity::Any => -1,
        }
    }
}

/// A native method body. `body` receives the VM, the receiver and the
/// argument slice.
#[derive(Clone)]
pub struct Proc {
    pub name: String,
    pub arity: Arity,
    pub body: ProcBody,
}

impl Proc {
    pub fn new(
        name: &str,
        arity: Arity,
        body: impl Fn(&mut Vm, &Value, &[Value]) -> Result<Value, Error> + 'static,
    ) -> Self {
        Self {
            name: name.to_owned(),
            arity,
            body: Rc::new(body),
        }
    }

    /// Two procs are the same implementation only if they share a body.
    pub fn same_body(&self, other: &Proc) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl PartialEq for Proc {
    fn eq(&self, other: &Self) -> bool {
        self.same_body(other)
    }
}

impl Debug for Proc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "<fn {}@{}>", self.name, self.arity.as_int())
    }
}
