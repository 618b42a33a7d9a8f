use crate::symbol::Symbol;
use std::fmt::{Debug, Formatter};

mod proc;
pub use proc::{Arity, Proc, ProcBody};

mod obj;
pub use obj::{Obj, ObjInner};

mod class;
pub use class::{Class, ClassKind, MethodEntry};

mod obj_instance;
pub use obj_instance::ObjInstance;

mod string;
pub use string::ObjString;

/// Index of an object in the VM heap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Debug for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "#{}", self.0)
    }
}

/// Object identity for heap values, structural equality for immediates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Symbol(Symbol),
    Obj(ObjRef),
}

impl Value {
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil) || matches!(self, Value::Boolean(false))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsey()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn obj(&self) -> Option<ObjRef> {
        if let Self::Obj(r) = self {
            return Some(*r);
        }
        None
    }

    pub fn integer(&self) -> Option<i64> {
        if let Self::Integer(i) = self {
            return Some(*i);
        }
        None
    }

    pub fn symbol(&self) -> Option<Symbol> {
        if let Self::Symbol(s) = self {
            return Some(*s);
        }
        None
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Symbol(_) => "symbol",
            Value::Obj(_) => "object",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Self::Symbol(v)
    }
}

impl From<ObjRef> for Value {
    fn from(v: ObjRef) -> Self {
        Self::Obj(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}
