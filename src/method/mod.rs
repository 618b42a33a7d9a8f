//! `Method` and `UnboundMethod` handles.
//!
//! A handle captures a resolved method (its implementation plus the class
//! that defines it) apart from invoking it. Handles are created by
//! `Kernel#method`, `Module#instance_method`, `bind`, `unbind` and
//! `super_method`; each of those allocates a fresh immutable handle.

use crate::symbol::Symbol;
use crate::value::{ClassKind, ObjRef, Proc, Value};
use crate::vm::{Error, RuntimeProblem, Vm};

mod bind;
mod call;
mod init;
mod resolve;
mod super_method;

pub use call::MethodNameScope;
pub use init::init;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    Method,
    UnboundMethod,
}

impl HandleKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            HandleKind::Method => "Method",
            HandleKind::UnboundMethod => "UnboundMethod",
        }
    }
}

/// Where an implementation was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    Class(ObjRef),
    /// Modules impose no receiver constraint on `bind`. `origin` is the
    /// class whose resolution order the module was reached through;
    /// `super_method` continues along that order.
    Module { module: ObjRef, origin: ObjRef },
    Singleton { class: ObjRef, attached: Value },
}

impl Owner {
    pub fn class_ref(&self) -> ObjRef {
        match self {
            Owner::Class(r) | Owner::Module { module: r, .. } => *r,
            Owner::Singleton { class, .. } => *class,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Implementation {
    Direct(Proc),
    /// No body exists; calls go through `method_missing`.
    Fallback,
}

impl Implementation {
    pub fn same_as(&self, other: &Implementation) -> bool {
        match (self, other) {
            (Implementation::Direct(a), Implementation::Direct(b)) => a.same_body(b),
            (Implementation::Fallback, Implementation::Fallback) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MethodHandle {
    pub owner: Owner,
    /// `None` for unbound handles.
    pub receiver: Option<Value>,
    pub name: Symbol,
    pub implementation: Implementation,
}

impl MethodHandle {
    pub fn bound(owner: Owner, receiver: Value, name: Symbol, implementation: Implementation) -> Self {
        Self {
            owner,
            receiver: Some(receiver),
            name,
            implementation,
        }
    }

    pub fn unbound(owner: Owner, name: Symbol, implementation: Implementation) -> Self {
        Self {
            owner,
            receiver: None,
            name,
            implementation,
        }
    }

    pub fn kind(&self) -> HandleKind {
        match self.receiver {
            Some(_) => HandleKind::Method,
            None => HandleKind::UnboundMethod,
        }
    }

    pub fn arity(&self) -> i64 {
        match &self.implementation {
            Implementation::Direct(proc) => proc.arity.as_int(),
            Implementation::Fallback => -1,
        }
    }

    /// Same owner, name, implementation and receiver identity.
    pub fn same_as(&self, other: &MethodHandle) -> bool {
        self.owner == other.owner
            && self.name == other.name
            && self.receiver == other.receiver
            && self.implementation.same_as(&other.implementation)
    }
}

impl Vm {
    /// Classifies `class`, found while searching from `origin`, as a
    /// handle owner.
    pub fn owner_of(&self, class: ObjRef, origin: ObjRef) -> Owner {
        match self.class(class).map(|c| c.kind) {
            Some(ClassKind::Module) => Owner::Module {
                module: class,
                origin,
            },
            Some(ClassKind::Singleton { attached }) => Owner::Singleton { class, attached },
            _ => Owner::Class(class),
        }
    }

    /// Allocates the heap object for a handle. No validation happens here;
    /// every construction path checks its own legality rules first.
    pub(crate) fn method_object_alloc(&mut self, kind: HandleKind, handle: MethodHandle) -> Result<Value, Error> {
        debug_assert_eq!(kind, handle.kind());
        let class = match kind {
            HandleKind::Method => self.method_class()?,
            HandleKind::UnboundMethod => self.unbound_method_class()?,
        };
        Ok(Value::Obj(self.allocator_mut().allocate_method(class, handle)))
    }

    /// Borrows the handle stored in `value`.
    pub fn handle(&self, value: &Value) -> Result<&MethodHandle, Error> {
        match value.obj().and_then(|r| self.allocator().get(r).method()) {
            Some(handle) => Ok(handle),
            None => Err(self.new_runtime_error(RuntimeProblem::InvalidArgument {
                expected: "Method or UnboundMethod".to_owned(),
                got: self.class_name(self.obj_class(value)),
            })),
        }
    }

    /// Like [`Vm::handle`] but also requires the given kind; the other kind
    /// does not respond to `operation`.
    pub(crate) fn handle_of_kind(
        &self,
        value: &Value,
        kind: HandleKind,
        operation: &str,
    ) -> Result<MethodHandle, Error> {
        let handle = self.handle(value)?;
        if handle.kind() != kind {
            return Err(self.new_runtime_error(RuntimeProblem::NoMethod {
                name: operation.to_owned(),
                receiver: self.inspect(value),
            }));
        }
        Ok(handle.clone())
    }

    /// `#<Method: Child(Base)#greet>` / `#<UnboundMethod: Base#greet>`.
    pub fn handle_inspect(&self, handle: &MethodHandle) -> String {
        let owner = self.class_name(handle.owner.class_ref());
        let name = self.sym_name(handle.name);
        match handle.receiver {
            Some(receiver) => {
                let class = self.class_name(self.class_of(&receiver));
                if class == owner {
                    format!("#<Method: {}#{}>", class, name)
                } else {
                    format!("#<Method: {}({})#{}>", class, owner, name)
                }
            }
            None => format!("#<UnboundMethod: {}#{}>", owner, name),
        }
    }
}
