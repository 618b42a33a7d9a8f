use crate::method::{HandleKind, Implementation, MethodHandle};
use crate::symbol::Symbol;
use crate::value::Value;
use crate::vm::{Error, RuntimeProblem, Vm};
use std::ops::{Deref, DerefMut};

/// Renames the executing method of the current frame for as long as the
/// scope lives. The previous name is put back on drop, so every exit path
/// (including `?` and unwinding) restores it.
pub struct MethodNameScope<'a> {
    vm: &'a mut Vm,
    depth: usize,
    saved: Option<Symbol>,
}

impl<'a> MethodNameScope<'a> {
    pub fn enter(vm: &'a mut Vm, name: Symbol) -> Self {
        let depth = vm.frame_depth();
        let saved = vm.replace_method_name(depth, Some(name));
        Self { vm, depth, saved }
    }
}

impl Deref for MethodNameScope<'_> {
    type Target = Vm;
    fn deref(&self) -> &Vm {
        &*self.vm
    }
}

impl DerefMut for MethodNameScope<'_> {
    fn deref_mut(&mut self) -> &mut Vm {
        &mut *self.vm
    }
}

impl Drop for MethodNameScope<'_> {
    fn drop(&mut self) {
        self.vm.replace_method_name(self.depth, self.saved);
    }
}

impl Vm {
    /// Invokes a bound handle as if its method had been called directly:
    /// inside the body the executing name is the handle's name and
    /// dispatch is relative to the owner.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.sym_name(handle.name)))]
    pub fn call_handle(&mut self, handle: &MethodHandle, args: &[Value]) -> Result<Value, Error> {
        let receiver = match handle.receiver {
            Some(receiver) => receiver,
            None => {
                return Err(self.new_runtime_error(RuntimeProblem::NoMethod {
                    name: "call".to_owned(),
                    receiver: self.handle_inspect(handle),
                }))
            }
        };
        let mut scope = MethodNameScope::enter(self, handle.name);
        match &handle.implementation {
            Implementation::Direct(proc) => {
                scope.yield_with_class(proc, args, receiver, handle.owner.class_ref())
            }
            Implementation::Fallback => scope.method_missing(receiver, handle.name, args),
        }
    }

    /// `method.call(*args)` / `method[*args]`.
    pub fn method_call(&mut self, method: Value, args: &[Value]) -> Result<Value, Error> {
        let handle = self.handle_of_kind(&method, HandleKind::Method, "call")?;
        self.call_handle(&handle, args)
    }
}
