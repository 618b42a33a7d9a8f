use crate::symbol::Symbol;
use crate::value::Value;
use fxhash::FxHashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjInstance {
    fields: FxHashMap<Symbol, Value>,
}

impl ObjInstance {
    pub fn get_field(&self, name: Symbol) -> Option<&Value> {
        self.fields.get(&name)
    }

    pub fn set_field(&mut self, name: Symbol, value: Value) {
        self.fields.insert(name, value);
    }
}
