use crate::allocator::Allocator;
use crate::value::{Class, ClassKind, ObjRef};
use crate::vm::CoreClasses;
use fxhash::FxHashMap;
use maplit::hashmap;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Plain classes created right after the four root classes, keyed by name
/// with their superclass.
static BOOT_CLASSES: Lazy<HashMap<&str, &str>> = Lazy::new(|| {
    hashmap! {
        "NilClass" => "Object",
        "TrueClass" => "Object",
        "FalseClass" => "Object",
        "Integer" => "Object",
        "Symbol" => "Object",
        "String" => "Object",
    }
});

fn named(name: &str, kind: ClassKind, superclass: Option<ObjRef>) -> Class {
    Class::new(Some(name.to_owned()), kind, superclass)
}

pub(super) fn boot_classes(
    allocator: &mut Allocator,
    globals: &mut FxHashMap<String, ObjRef>,
) -> CoreClasses {
    // `Class` is its own class; its superclass is patched once `Module`
    // exists.
    let class = allocator.allocate_self_classed(named("Class", ClassKind::Class, None));
    let basic_object = allocator.allocate_class(class, named("BasicObject", ClassKind::Class, None));
    let object = allocator.allocate_class(
        class,
        named("Object", ClassKind::Class, Some(basic_object)),
    );
    let module = allocator.allocate_class(class, named("Module", ClassKind::Class, Some(object)));
    if let Some(c) = allocator.get_mut(class).class_mut() {
        c.superclass = Some(module);
    }
    let kernel = allocator.allocate_class(module, named("Kernel", ClassKind::Module, None));
    if let Some(c) = allocator.get_mut(object).class_mut() {
        c.include(kernel);
    }

    for (name, r) in [
        ("Class", class),
        ("BasicObject", basic_object),
        ("Object", object),
        ("Module", module),
        ("Kernel", kernel),
    ] {
        globals.insert(name.to_owned(), r);
    }

    for (name, superclass) in BOOT_CLASSES.iter() {
        let superclass = globals.get(*superclass).copied();
        let r = allocator.allocate_class(class, named(name, ClassKind::Class, superclass));
        globals.insert((*name).to_owned(), r);
    }

    let get = |name: &str| globals[name];
    CoreClasses {
        basic_object,
        object,
        module,
        class,
        kernel,
        nil_class: get("NilClass"),
        true_class: get("TrueClass"),
        false_class: get("FalseClass"),
        integer: get("Integer"),
        symbol: get("Symbol"),
        string: get("String"),
    }
}
