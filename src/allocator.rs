use crate::method::MethodHandle;
use crate::value::{Class, Obj, ObjInner, ObjInstance, ObjRef, ObjString};

/// Object heap. Objects are never freed while the VM is alive; an
/// `ObjRef` stays valid for the allocator's whole lifetime.
#[derive(Debug, Default)]
pub struct Allocator {
    objects: Vec<Obj>,
}

impl Allocator {
    pub fn get(&self, r: ObjRef) -> &Obj {
        &self.objects[r.index()]
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut Obj {
        &mut self.objects[r.index()]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn allocate_string(&mut self, klass: ObjRef, v: String) -> ObjRef {
        self.record_object(klass, ObjInner::String(ObjString(v)))
    }

    pub fn allocate_class(&mut self, klass: ObjRef, class: Class) -> ObjRef {
        self.record_object(klass, ObjInner::Class(class))
    }

    pub fn allocate_obj_instance(&mut self, klass: ObjRef) -> ObjRef {
        self.record_object(klass, ObjInner::Instance(ObjInstance::default()))
    }

    pub fn allocate_method(&mut self, klass: ObjRef, handle: MethodHandle) -> ObjRef {
        self.record_object(klass, ObjInner::Method(handle))
    }

    /// Reserves a slot whose class pointer refers to itself. Used while
    /// booting `Class`, which is an instance of itself.
    pub(crate) fn allocate_self_classed(&mut self, class: Class) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        self.record_object(r, ObjInner::Class(class))
    }

    fn record_object(&mut self, klass: ObjRef, inner: ObjInner) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        tracing::trace!(obj = ?r, ty = inner.type_name(), "allocated");
        self.objects.push(Obj { klass, inner });
        r
    }
}
