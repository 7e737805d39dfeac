//! Reference-counted object storage.
//!
//! Every class instance and array lives in an `Rc<RefCell<Object>>`. The
//! last handle going away drops the object on the spot, which in turn drops
//! any host handle it carries, so host finalizers run deterministically.
//! Reference cycles between objects are never reclaimed.

use crate::types::ClassInfo;
use crate::value::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<RefCell<Object>>;

/// Allocation accounting shared by the heap and every object it created.
#[derive(Debug, Default)]
pub struct HeapStats {
    allocated: Cell<usize>,
    released: Cell<usize>,
}

impl HeapStats {
    pub fn allocated(&self) -> usize {
        self.allocated.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }

    /// Objects allocated and not yet released.
    pub fn live(&self) -> usize {
        self.allocated.get() - self.released.get()
    }
}

pub struct Instance {
    pub class: Rc<ClassInfo>,
    /// One slot per entry of `class.fields`.
    pub fields: Vec<Value>,
    /// Opaque state owned by a host class.
    pub host: Option<Box<dyn Any>>,
}

pub enum ObjectKind {
    Instance(Instance),
    Array(Vec<Value>),
}

pub struct Object {
    pub id: usize,
    pub kind: ObjectKind,
    stats: Rc<HeapStats>,
}

impl Object {
    pub fn type_name(&self) -> String {
        match &self.kind {
            ObjectKind::Instance(instance) => instance.class.name.clone(),
            ObjectKind::Array(_) => "array".to_string(),
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match &self.kind {
            ObjectKind::Instance(instance) => Some(instance),
            ObjectKind::Array(_) => None,
        }
    }

    pub fn as_instance_mut(&mut self) -> Option<&mut Instance> {
        match &mut self.kind {
            ObjectKind::Instance(instance) => Some(instance),
            ObjectKind::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(items) => Some(items),
            ObjectKind::Instance(_) => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.kind {
            ObjectKind::Array(items) => Some(items),
            ObjectKind::Instance(_) => None,
        }
    }

    /// Downcast the host handle of an instance.
    pub fn host<T: 'static>(&self) -> Option<&T> {
        self.as_instance()?.host.as_ref()?.downcast_ref::<T>()
    }

    pub fn host_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_instance_mut()?.host.as_mut()?.downcast_mut::<T>()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ObjectKind::Instance(instance) => f
                .debug_struct("Instance")
                .field("id", &self.id)
                .field("class", &instance.class.name)
                .field("fields", &instance.fields)
                .field("host", &instance.host.is_some())
                .finish(),
            ObjectKind::Array(items) => f
                .debug_struct("Array")
                .field("id", &self.id)
                .field("items", items)
                .finish(),
        }
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        self.stats.released.set(self.stats.released.get() + 1);
        tracing::trace!(id = self.id, "released heap object");
    }
}

/// Allocator for heap objects. Cloning shares the same accounting.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    stats: Rc<HeapStats>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    fn allocate(&self, kind: ObjectKind) -> ObjectRef {
        let id = self.stats.allocated.get();
        self.stats.allocated.set(id + 1);
        tracing::trace!(id, "allocated heap object");
        Rc::new(RefCell::new(Object {
            id,
            kind,
            stats: Rc::clone(&self.stats),
        }))
    }

    pub fn alloc_array(&self, items: Vec<Value>) -> ObjectRef {
        self.allocate(ObjectKind::Array(items))
    }

    pub fn alloc_instance(
        &self,
        class: Rc<ClassInfo>,
        fields: Vec<Value>,
        host: Option<Box<dyn Any>>,
    ) -> ObjectRef {
        self.allocate(ObjectKind::Instance(Instance {
            class,
            fields,
            host,
        }))
    }
}
