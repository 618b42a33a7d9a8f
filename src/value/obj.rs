use crate::method::MethodHandle;
use crate::value::{Class, ObjInstance, ObjRef, ObjString};
use std::ops::{Deref, DerefMut};

#[derive(Clone, Debug)]
pub enum ObjInner {
    String(ObjString),
    Class(Class),
    Instance(ObjInstance),
    Method(MethodHandle),
}

impl ObjInner {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Class(c) if c.is_module() => "module",
            Self::Class(_) => "class",
            Self::Instance(_) => "instance",
            Self::Method(_) => "method",
        }
    }
}

/// A heap cell: the object's class pointer plus its payload. The class
/// pointer is repointed when a singleton class is created for the object.
#[derive(Clone, Debug)]
pub struct Obj {
    pub klass: ObjRef,
    pub inner: ObjInner,
}

impl Obj {
    pub fn string(&self) -> Option<&ObjString> {
        if let ObjInner::String(s) = &self.inner {
            return Some(s);
        }
        None
    }

    pub fn class(&self) -> Option<&Class> {
        if let ObjInner::Class(c) = &self.inner {
            return Some(c);
        }
        None
    }

    pub fn class_mut(&mut self) -> Option<&mut Class> {
        if let ObjInner::Class(c) = &mut self.inner {
            return Some(c);
        }
        None
    }

    pub fn instance(&self) -> Option<&ObjInstance> {
        if let ObjInner::Instance(i) = &self.inner {
            return Some(i);
        }
        None
    }

    pub fn instance_mut(&mut self) -> Option<&mut ObjInstance> {
        if let ObjInner::Instance(i) = &mut self.inner {
            return Some(i);
        }
        None
    }

    pub fn method(&self) -> Option<&MethodHandle> {
        if let ObjInner::Method(m) = &self.inner {
            return Some(m);
        }
        None
    }
}

impl Deref for Obj {
    type Target = ObjInner;
    fn deref(&self) -> &ObjInner {
        &self.inner
    }
}

impl DerefMut for Obj {
    fn deref_mut(&mut self) -> &mut ObjInner {
        &mut self.inner
    }
}
