use crate::method::{HandleKind, MethodHandle, Owner};
use crate::value::Value;
use crate::vm::{Error, RuntimeProblem, Vm};

impl Vm {
    /// Checks that `receiver` may be bound to a handle owned by `owner`.
    pub fn check_bindable(&self, owner: &Owner, receiver: &Value) -> Result<(), Error> {
        let class = match owner {
            Owner::Module { .. } => return Ok(()),
            Owner::Class(class) | Owner::Singleton { class, .. } => *class,
        };
        if class == self.obj_class(receiver) || self.is_kind_of(receiver, class) {
            return Ok(());
        }
        tracing::debug!(
            owner = %self.class_name(class),
            receiver = %self.inspect(receiver),
            "bind rejected"
        );
        let problem = match owner {
            Owner::Singleton { .. } => RuntimeProblem::SingletonMethodForDifferentObject,
            _ => RuntimeProblem::BindArgumentMismatch(self.class_name(class)),
        };
        Err(self.new_runtime_error(problem))
    }

    pub fn bind_handle(&self, handle: &MethodHandle, receiver: Value) -> Result<MethodHandle, Error> {
        self.check_bindable(&handle.owner, &receiver)?;
        Ok(MethodHandle::bound(
            handle.owner,
            receiver,
            handle.name,
            handle.implementation.clone(),
        ))
    }

    pub fn unbind_handle(&self, handle: &MethodHandle) -> MethodHandle {
        MethodHandle::unbound(handle.owner, handle.name, handle.implementation.clone())
    }

    /// `unbound_method.bind(receiver)`.
    pub fn bind(&mut self, unbound: Value, receiver: Value) -> Result<Value, Error> {
        let handle = self.handle_of_kind(&unbound, HandleKind::UnboundMethod, "bind")?;
        let bound = self.bind_handle(&handle, receiver)?;
        self.method_object_alloc(HandleKind::Method, bound)
    }

    /// `method.unbind`.
    pub fn unbind(&mut self, method: Value) -> Result<Value, Error> {
        let handle = self.handle_of_kind(&method, HandleKind::Method, "unbind")?;
        let unbound = self.unbind_handle(&handle);
        self.method_object_alloc(HandleKind::UnboundMethod, unbound)
    }
}
