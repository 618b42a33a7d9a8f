use crate::method::{HandleKind, Implementation, MethodHandle, Owner};
use crate::symbol::Symbol;
use crate::value::{ObjRef, Value};
use crate::vm::{Error, RuntimeProblem, Vm, RESPOND_TO_MISSING};

impl Vm {
    /// Finds where `name` is implemented, starting at `class`.
    ///
    /// When nothing defines `name` and a `respond_to_missing?` hook exists
    /// along the same order, `obj` is asked about it through ordinary
    /// dispatch; a truthy answer yields a [`Implementation::Fallback`]
    /// owned by `class`.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.sym_name(name), class = %self.class_name(class)))]
    pub fn search_method_owner(
        &mut self,
        class: ObjRef,
        obj: Value,
        name: Symbol,
    ) -> Result<(Owner, Implementation), Error> {
        if let Some((found, proc)) = self.method_search(class, name) {
            tracing::debug!(owner = %self.class_name(found), "resolved");
            return Ok((self.owner_of(found, class), Implementation::Direct(proc)));
        }

        let hook = self.intern(RESPOND_TO_MISSING);
        if self.method_search(class, hook).is_some() {
            let answer =
                self.funcall_sym(obj, hook, &[Value::Symbol(name), Value::Boolean(false)])?;
            if answer.is_truthy() {
                tracing::debug!("resolved through respond_to_missing?");
                return Ok((self.owner_of(class, class), Implementation::Fallback));
            }
        }

        Err(self.new_runtime_error(RuntimeProblem::UndefinedMethodForClass {
            name: self.sym_name(name).to_owned(),
            class: self.class_name(class),
        }))
    }

    /// `obj.method(name)`: a handle bound to `obj`, resolved from its
    /// runtime class.
    pub fn method(&mut self, obj: Value, name: Symbol) -> Result<Value, Error> {
        let class = self.class_of(&obj);
        let (owner, implementation) = self.search_method_owner(class, obj, name)?;
        self.method_object_alloc(
            HandleKind::Method,
            MethodHandle::bound(owner, obj, name, implementation),
        )
    }

    /// `module.instance_method(name)`: an unbound handle resolved from the
    /// class or module itself.
    pub fn instance_method(&mut self, module: Value, name: Symbol) -> Result<Value, Error> {
        let class = self.expect_class(&module)?;
        let (owner, implementation) = self.search_method_owner(class, module, name)?;
        self.method_object_alloc(
            HandleKind::UnboundMethod,
            MethodHandle::unbound(owner, name, implementation),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::method::{Implementation, Owner};
    use crate::value::{Arity, Value};
    use crate::vm::{Error, RuntimeError, RuntimeProblem, Vm};
    use assert_matches::assert_matches;

    #[test]
    fn owner_is_the_defining_ancestor() {
        let mut vm = Vm::new();
        let base = vm.define_class("Base", None);
        let middle = vm.define_class("Middle", Some(base));
        let leaf = vm.define_class("Leaf", Some(middle));
        vm.define_method(base, "greet", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
        let greet = vm.intern("greet");
        let obj = vm.new_object(leaf);

        let (owner, implementation) = vm.search_method_owner(leaf, obj, greet).unwrap();
        assert_eq!(owner, Owner::Class(base));
        assert_matches!(implementation, Implementation::Direct(_));

        let m = vm.method(obj, greet).unwrap();
        assert_eq!(vm.handle(&m).unwrap().owner, Owner::Class(base));
        let um = vm.instance_method(Value::Obj(middle), greet).unwrap();
        assert_eq!(vm.handle(&um).unwrap().owner, Owner::Class(base));
        assert_eq!(vm.handle(&um).unwrap().receiver, None);
    }

    #[test]
    fn module_owner() {
        let mut vm = Vm::new();
        let module = vm.define_module("Mod");
        let x = vm.define_class("X", None);
        vm.include_module(x, module).unwrap();
        vm.define_method(module, "shout", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
        let shout = vm.intern("shout");
        let um = vm.instance_method(Value::Obj(x), shout).unwrap();
        assert_eq!(
            vm.handle(&um).unwrap().owner,
            Owner::Module { module, origin: x }
        );
        let from_module = vm.instance_method(Value::Obj(module), shout).unwrap();
        assert_eq!(
            vm.handle(&from_module).unwrap().owner,
            Owner::Module {
                module,
                origin: module
            }
        );
    }

    #[test]
    fn singleton_owner() {
        let mut vm = Vm::new();
        let base = vm.define_class("Base", None);
        let obj = vm.new_object(base);
        vm.define_singleton_method(obj, "only_me", Arity::Exact(0), |_, _, _| Ok(Value::Nil))
            .unwrap();
        let only_me = vm.intern("only_me");
        let m = vm.method(obj, only_me).unwrap();
        let singleton = vm.singleton_class(obj).unwrap();
        assert_eq!(
            vm.handle(&m).unwrap().owner,
            Owner::Singleton {
                class: singleton,
                attached: obj
            }
        );
    }

    #[test]
    fn undefined_method_is_a_name_error() {
        let mut vm = Vm::new();
        let base = vm.define_class("Base", None);
        let obj = vm.new_object(base);
        let nope = vm.intern("nope");
        let err = vm.method(obj, nope).unwrap_err();
        assert_matches!(
            &err,
            Error::RuntimeError(RuntimeError {
                problem: RuntimeProblem::UndefinedMethodForClass { name, class },
                ..
            }) if name == "nope" && class == "Base"
        );
        assert_eq!(err.to_string(), "NameError: undefined method `nope' for class `Base'");
        let err = vm.instance_method(Value::Obj(base), nope).unwrap_err();
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn respond_to_missing_fallback() {
        let mut vm = Vm::new();
        let base = vm.define_class("Ghost", None);
        let child = vm.define_class("GhostChild", Some(base));
        vm.define_method(base, "respond_to_missing?", Arity::Exact(2), |vm, _, args| {
            let name = args[0].symbol().map(|s| vm.sym_name(s).to_owned());
            assert_eq!(args[1], Value::Boolean(false));
            Ok(Value::Boolean(name.as_deref().map_or(false, |n| n.starts_with("dyn_"))))
        });
        let obj = vm.new_object(child);
        let dynamic = vm.intern("dyn_hello");
        let m = vm.method(obj, dynamic).unwrap();
        let handle = vm.handle(&m).unwrap();
        assert_eq!(handle.owner, Owner::Class(child));
        assert_matches!(handle.implementation, Implementation::Fallback);
        assert_eq!(handle.arity(), -1);

        let other = vm.intern("hello");
        let err = vm.method(obj, other).unwrap_err();
        assert_matches!(
            err.problem(),
            Some(RuntimeProblem::UndefinedMethodForClass { class, .. }) if class == "GhostChild"
        );
    }

    #[test]
    fn hook_runs_on_the_invoking_object() {
        let mut vm = Vm::new();
        let ghost = vm.define_class("Ghost", None);
        vm.define_method(ghost, "respond_to_missing?", Arity::Exact(2), |_, _, _| {
            Ok(Value::Boolean(true))
        });
        vm.define_singleton_method(
            Value::Obj(ghost),
            "respond_to_missing?",
            Arity::Exact(2),
            |_, _, _| Ok(Value::Boolean(false)),
        )
        .unwrap();
        let phantom = vm.intern("phantom");

        // the instance hook answers for instances only
        let obj = vm.new_object(ghost);
        assert!(vm.method(obj, phantom).is_ok());
        let err = vm.instance_method(Value::Obj(ghost), phantom).unwrap_err();
        assert_matches!(
            err.problem(),
            Some(RuntimeProblem::UndefinedMethodForClass { name, class })
                if name == "phantom" && class == "Ghost"
        );
    }

    #[test]
    fn class_level_hook_answers_for_instance_method() {
        let mut vm = Vm::new();
        let ghost = vm.define_class("Ghost", None);
        vm.define_method(ghost, "respond_to_missing?", Arity::Exact(2), |_, _, _| {
            Ok(Value::Boolean(true))
        });
        vm.define_singleton_method(
            Value::Obj(ghost),
            "respond_to_missing?",
            Arity::Exact(2),
            |vm, this, _| Ok(Value::Boolean(vm.expect_class(this).is_ok())),
        )
        .unwrap();
        let phantom = vm.intern("phantom");
        let um = vm.instance_method(Value::Obj(ghost), phantom).unwrap();
        let handle = vm.handle(&um).unwrap();
        assert_eq!(handle.owner, Owner::Class(ghost));
        assert_matches!(handle.implementation, Implementation::Fallback);
    }

    #[test]
    fn default_hook_answers_false() {
        let mut vm = Vm::new();
        let base = vm.define_class("Base", None);
        let phantom = vm.intern("phantom");
        let obj = vm.new_object(base);
        let answer = vm
            .funcall(obj, "respond_to_missing?", &[Value::Symbol(phantom), Value::Boolean(false)])
            .unwrap();
        assert_eq!(answer, Value::Boolean(false));
        assert_eq!(vm.method(obj, phantom).unwrap_err().kind(), "NameError");
    }

    #[test]
    fn undef_hides_inherited_method() {
        let mut vm = Vm::new();
        let base = vm.define_class("Base", None);
        let child = vm.define_class("Child", Some(base));
        vm.define_method(base, "greet", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
        vm.undef_method(child, "greet");
        let greet = vm.intern("greet");
        let obj = vm.new_object(child);
        assert_eq!(vm.method(obj, greet).unwrap_err().kind(), "NameError");
    }

    #[test]
    fn instance_method_requires_a_module() {
        let mut vm = Vm::new();
        let greet = vm.intern("greet");
        let err = vm.instance_method(Value::Integer(3), greet).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }
}
