use crate::method::{Implementation, MethodHandle, Owner};
use crate::value::Value;
use crate::vm::{Error, Vm};

impl Vm {
    /// The implementation `handle` overrides. A class owner is searched
    /// from its superclass, so modules included into the owner itself are
    /// not consulted. A module owner continues along the resolution order
    /// it was found in, right after the module.
    pub fn super_handle(&self, handle: &MethodHandle) -> Option<MethodHandle> {
        let (origin, (found, proc)) = match handle.owner {
            Owner::Module { module, origin } => (
                origin,
                self.method_search_after(origin, module, handle.name)?,
            ),
            _ => {
                let super_owner = self.superclass(handle.owner.class_ref())?;
                (super_owner, self.method_search(super_owner, handle.name)?)
            }
        };
        tracing::debug!(
            name = %self.sym_name(handle.name),
            owner = %self.class_name(found),
            "super method"
        );
        Some(MethodHandle {
            owner: self.owner_of(found, origin),
            receiver: handle.receiver,
            name: handle.name,
            implementation: Implementation::Direct(proc),
        })
    }

    /// `handle.super_method`; `nil` when no ancestor defines the name.
    pub fn super_method(&mut self, handle: Value) -> Result<Value, Error> {
        let current = self.handle(&handle)?.clone();
        match self.super_handle(&current) {
            Some(found) => self.method_object_alloc(current.kind(), found),
            None => Ok(Value::Nil),
        }
    }
}
