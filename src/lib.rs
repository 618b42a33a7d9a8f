pub mod allocator;
pub mod method;
pub mod symbol;
pub mod value;
pub mod vm;

pub use method::{HandleKind, Implementation, MethodHandle, Owner};
pub use value::{Arity, ObjRef, Value};
pub use vm::{Error, RuntimeError, RuntimeProblem, Vm, VmConfig};
