use crate::value::{Arity, Value};
use crate::vm::{RuntimeProblem, Vm, INITIALIZER_NAME, RESPOND_TO_MISSING};

impl Vm {
    pub(super) fn register_builtins(&mut self) {
        let core = *self.core();

        self.define_method(core.class, "new", Arity::Any, |vm, this, args| {
            let class = vm.expect_class(this)?;
            let instance = vm.new_object(class);
            let initializer = vm.intern(INITIALIZER_NAME);
            match vm.method_search(class, initializer) {
                Some((owner, proc)) => {
                    vm.invoke_proc(&proc, Some(initializer), args, instance, owner)?;
                }
                None if !args.is_empty() => {
                    return Err(
                        vm.new_runtime_error(RuntimeProblem::InvalidNumberOfArguments {
                            expected: 0,
                            passed: args.len(),
                        }),
                    )
                }
                None => {}
            }
            Ok(instance)
        });

        self.define_method(core.kernel, "__method__", Arity::Exact(0), |vm, _, _| {
            Ok(vm.caller_method_name().into())
        });

        self.define_method(core.kernel, "class", Arity::Exact(0), |vm, this, _| {
            Ok(Value::Obj(vm.obj_class(this)))
        });

        self.define_method(core.kernel, "respond_to?", Arity::Exact(1), |vm, this, args| {
            let name = vm.to_sym(&args[0])?;
            Ok(vm.respond_to(this, name).into())
        });

        self.define_method(core.kernel, RESPOND_TO_MISSING, Arity::Exact(2), |_, _, _| {
            Ok(Value::Boolean(false))
        });

        self.define_method(core.module, "name", Arity::Exact(0), |vm, this, _| {
            let class = vm.expect_class(this)?;
            match vm.class(class).and_then(|c| c.name.clone()) {
                Some(name) => Ok(vm.new_string(&name)),
                None => Ok(Value::Nil),
            }
        });
    }
}
