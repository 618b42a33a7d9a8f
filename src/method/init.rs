use crate::value::{Arity, ObjRef, Value};
use crate::vm::Vm;

/// Defines `Method`, `UnboundMethod`, `Kernel#method` and
/// `Module#instance_method`.
pub fn init(vm: &mut Vm) {
    let core = *vm.core();
    let unbound_method = vm.define_class("UnboundMethod", Some(core.object));
    let method = vm.define_class("Method", Some(core.object));

    for class in [unbound_method, method] {
        // handles are only created by the operations below
        if let Err(err) = vm.undef_class_method(class, "new") {
            tracing::warn!(%err, "could not undefine new");
        }
        define_reflection(vm, class);
    }

    vm.define_method(unbound_method, "bind", Arity::Exact(1), |vm, this, args| {
        vm.bind(*this, args[0])
    });
    vm.define_method(unbound_method, "super_method", Arity::Exact(0), |vm, this, _| {
        vm.super_method(*this)
    });

    vm.define_method(method, "call", Arity::Any, |vm, this, args| {
        vm.method_call(*this, args)
    });
    if let Err(err) = vm.alias_method(method, "[]", "call") {
        tracing::warn!(%err, "could not alias []");
    }
    vm.define_method(method, "unbind", Arity::Exact(0), |vm, this, _| vm.unbind(*this));
    vm.define_method(method, "super_method", Arity::Exact(0), |vm, this, _| {
        vm.super_method(*this)
    });
    vm.define_method(method, "receiver", Arity::Exact(0), |vm, this, _| {
        Ok(vm.handle(this)?.receiver.into())
    });

    vm.define_method(core.kernel, "method", Arity::Exact(1), |vm, this, args| {
        let name = vm.to_sym(&args[0])?;
        vm.method(*this, name)
    });
    vm.define_method(core.module, "instance_method", Arity::Exact(1), |vm, this, args| {
        let name = vm.to_sym(&args[0])?;
        vm.instance_method(*this, name)
    });
}

/// Read-only accessors shared by both handle classes.
fn define_reflection(vm: &mut Vm, class: ObjRef) {
    vm.define_method(class, "owner", Arity::Exact(0), |vm, this, _| {
        Ok(Value::Obj(vm.handle(this)?.owner.class_ref()))
    });
    vm.define_method(class, "name", Arity::Exact(0), |vm, this, _| {
        Ok(Value::Symbol(vm.handle(this)?.name))
    });
    vm.define_method(class, "arity", Arity::Exact(0), |vm, this, _| {
        Ok(Value::Integer(vm.handle(this)?.arity()))
    });
    vm.define_method(class, "inspect", Arity::Exact(0), |vm, this, _| {
        let text = vm.inspect(this);
        Ok(vm.new_string(&text))
    });
    vm.define_method(class, "==", Arity::Exact(1), |vm, this, args| {
        let lhs = vm.handle(this)?;
        let same = match args[0].obj().and_then(|r| vm.allocator().get(r).method()) {
            Some(rhs) => lhs.same_as(rhs),
            None => false,
        };
        Ok(Value::Boolean(same))
    });
}
