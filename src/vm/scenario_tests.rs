use crate::method::{HandleKind, Owner};
use crate::value::{Arity, ObjRef, Value};
use crate::vm::{Error, Vm};
use maplit::btreemap;
use std::collections::BTreeMap;

/// Builds classes from a `name => superclass` table; `None` inherits from
/// `Object`. Parents must sort before their children.
fn classes(vm: &mut Vm, table: BTreeMap<&str, Option<&str>>) -> BTreeMap<String, ObjRef> {
    let mut out = BTreeMap::new();
    for (name, superclass) in table {
        let superclass = superclass.map(|s| out[s]);
        out.insert(name.to_owned(), vm.define_class(name, superclass));
    }
    out
}

fn greeting(text: &'static str) -> impl Fn(&mut Vm, &Value, &[Value]) -> Result<Value, Error> {
    move |vm, _, _| Ok(vm.new_string(text))
}

fn text(vm: &Vm, value: &Value) -> String {
    vm.string_value(value).unwrap_or_default().to_owned()
}

#[test]
fn inherited_greet() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "Base" => None, "Child" => Some("Base") });
    let body = greeting("hello from Base");
    vm.define_method(c["Base"], "greet", Arity::Exact(0), body);

    let obj = vm.funcall(Value::Obj(c["Child"]), "new", &[]).unwrap();
    let greet = vm.intern("greet");
    let m = vm.method(obj, greet).unwrap();

    assert_eq!(vm.handle(&m).unwrap().owner, Owner::Class(c["Base"]));
    let out = vm.method_call(m, &[]).unwrap();
    assert_eq!(text(&vm, &out), "hello from Base");
    assert_eq!(vm.super_method(m).unwrap(), Value::Nil);
}

#[test]
fn overridden_greet_super_calls_base() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "Base" => None, "Child" => Some("Base") });
    let base_body = greeting("base");
    let child_body = greeting("child");
    vm.define_method(c["Base"], "greet", Arity::Exact(0), base_body);
    vm.define_method(c["Child"], "greet", Arity::Exact(0), child_body);

    let obj = vm.new_object(c["Child"]);
    let greet = vm.intern("greet");
    let m = vm.method(obj, greet).unwrap();
    let out = vm.method_call(m, &[]).unwrap();
    assert_eq!(text(&vm, &out), "child");

    let sup = vm.super_method(m).unwrap();
    let out = vm.method_call(sup, &[]).unwrap();
    assert_eq!(text(&vm, &out), "base");
}

#[test]
fn module_method_binds_to_unrelated_class() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "X" => None, "Y" => None });
    let module = vm.define_module("Mod");
    vm.include_module(c["X"], module).unwrap();
    let body = greeting("HEY");
    vm.define_method(module, "shout", Arity::Exact(0), body);

    let shout = vm.intern("shout");
    let um = vm.instance_method(Value::Obj(c["X"]), shout).unwrap();
    let y = vm.new_object(c["Y"]);
    assert!(!vm.is_kind_of(&y, module));
    let m = vm.bind(um, y).unwrap();
    let out = vm.method_call(m, &[]).unwrap();
    assert_eq!(text(&vm, &out), "HEY");
}

#[test]
fn unbind_bind_round_trip() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "Base" => None, "Child" => Some("Base") });
    let count = vm.intern("@count");
    vm.define_method(c["Base"], "bump", Arity::Exact(1), move |vm, this, args| {
        let current = vm.get_ivar(this, count).integer().unwrap_or(0);
        let next = current + args[0].integer().unwrap_or(0);
        vm.set_ivar(this, count, Value::Integer(next));
        Ok(Value::Integer(next))
    });
    let obj = vm.new_object(c["Child"]);
    let bump = vm.intern("bump");
    let m = vm.method(obj, bump).unwrap();
    let um = vm.unbind(m).unwrap();
    let again = vm.bind(um, obj).unwrap();

    let (a, b) = (vm.handle(&m).unwrap(), vm.handle(&again).unwrap());
    assert!(a.same_as(b));
    assert_eq!(b.kind(), HandleKind::Method);

    assert_eq!(vm.method_call(m, &[Value::Integer(2)]).unwrap(), Value::Integer(2));
    assert_eq!(vm.method_call(again, &[Value::Integer(2)]).unwrap(), Value::Integer(4));
}

#[test]
fn bind_compatibility_table() {
    let mut vm = Vm::new();
    let c = classes(
        &mut vm,
        btreemap! { "A" => None, "B" => Some("A"), "D" => None },
    );
    vm.define_method(c["A"], "m", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
    let m = vm.intern("m");
    let um = vm.instance_method(Value::Obj(c["A"]), m).unwrap();

    let cases = btreemap! {
        "A" => true,
        "B" => true,
        "D" => false,
    };
    for (class, ok) in cases {
        let obj = vm.new_object(c[class]);
        assert_eq!(vm.bind(um, obj).is_ok(), ok, "binding to an instance of {}", class);
    }
}

#[test]
fn handles_are_fresh_and_immutable() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "Base" => None });
    vm.define_method(c["Base"], "greet", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
    let greet = vm.intern("greet");
    let obj = vm.new_object(c["Base"]);
    let m1 = vm.method(obj, greet).unwrap();
    let m2 = vm.method(obj, greet).unwrap();
    assert_ne!(m1, m2);
    assert!(vm.handle(&m1).unwrap().same_as(vm.handle(&m2).unwrap()));

    // redefining the method does not touch existing handles
    vm.define_method(c["Base"], "greet", Arity::Exact(0), |_, _, _| Ok(Value::Integer(2)));
    assert_eq!(vm.method_call(m1, &[]).unwrap(), Value::Nil);
    let m3 = vm.method(obj, greet).unwrap();
    assert_eq!(vm.method_call(m3, &[]).unwrap(), Value::Integer(2));
}

#[test]
fn failed_lookup_allocates_nothing() {
    let mut vm = Vm::new();
    let c = classes(&mut vm, btreemap! { "Base" => None, "Other" => None });
    vm.define_method(c["Base"], "greet", Arity::Exact(0), |_, _, _| Ok(Value::Nil));
    let greet = vm.intern("greet");
    let missing = vm.intern("missing");
    let obj = vm.new_object(c["Base"]);
    let other = vm.new_object(c["Other"]);
    let um = vm.instance_method(Value::Obj(c["Base"]), greet).unwrap();

    let before = vm.allocator().len();
    assert!(vm.method(obj, missing).is_err());
    assert!(vm.bind(um, other).is_err());
    assert_eq!(vm.allocator().len(), before);
    assert_eq!(vm.frame_depth(), 1);
}
