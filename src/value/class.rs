use crate::symbol::Symbol;
use crate::value::{ObjRef, Proc, Value};
use fxhash::FxHashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Module,
    /// Per-object class holding methods of a single receiver.
    Singleton { attached: Value },
}

#[derive(Clone, Debug, PartialEq)]
pub enum MethodEntry {
    Defined(Proc),
    /// `undef_method` marker; lookup stops here and reports nothing.
    Undefined,
}

#[derive(Clone, Debug)]
pub struct Class {
    pub name: Option<String>,
    pub kind: ClassKind,
    pub superclass: Option<ObjRef>,
    includes: Vec<ObjRef>,
    methods: FxHashMap<Symbol, MethodEntry>,
}

impl Class {
    pub fn new(name: Option<String>, kind: ClassKind, superclass: Option<ObjRef>) -> Self {
        Self {
            name,
            kind,
            superclass,
            includes: vec![],
            methods: Default::default(),
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, ClassKind::Module)
    }

    pub fn get_method(&self, name: Symbol) -> Option<&MethodEntry> {
        self.methods.get(&name)
    }

    pub fn add_method(&mut self, name: Symbol, body: Proc) {
        self.methods.insert(name, MethodEntry::Defined(body));
    }

    pub fn undef_method(&mut self, name: Symbol) {
        self.methods.insert(name, MethodEntry::Undefined);
    }

    /// Included modules in inclusion order.
    pub fn includes(&self) -> &[ObjRef] {
        &self.includes
    }

    pub fn include(&mut self, module: ObjRef) {
        self.includes.push(module);
    }
}
