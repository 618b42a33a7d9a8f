use crate::allocator::Allocator;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{Arity, Class, ClassKind, MethodEntry, ObjInner, ObjRef, Proc, Value};
use arrayvec::ArrayVec;
use fxhash::FxHashMap;
use itertools::Itertools;
use once_cell::unsync::OnceCell;
use std::io::Write;
use thiserror::Error;

mod boot;
mod builtins;

#[cfg(test)]
mod scenario_tests;

pub const MAX_CALL_STACK_DEPTH: usize = 1000;
pub const INITIALIZER_NAME: &str = "initialize";
pub const METHOD_MISSING: &str = "method_missing";
pub const RESPOND_TO_MISSING: &str = "respond_to_missing?";

#[derive(Debug, Error)]
pub enum RuntimeProblem {
    #[error("undefined method `{name}' for class `{class}'")]
    UndefinedMethodForClass { name: String, class: String },
    #[error("undefined method `{name}' for {receiver}")]
    NoMethod { name: String, receiver: String },
    #[error("uninitialized constant {0}")]
    UninitializedConstant(String),
    #[error("singleton method called for a different object")]
    SingletonMethodForDifferentObject,
    #[error("bind argument must be an instance of {0}")]
    BindArgumentMismatch(String),
    #[error("{0} is not a symbol nor a string")]
    NotASymbol(String),
    #[error("wrong argument type {got} (expected {expected})")]
    InvalidArgument { expected: String, got: String },
    #[error("can't define singleton for {0}")]
    NoSingletonClass(String),
    #[error("wrong number of arguments (given {passed}, expected {expected})")]
    InvalidNumberOfArguments { expected: usize, passed: usize },
    #[error("stack level too deep (maximum call depth {0})")]
    MaxCallStackDepthReached(usize),
    #[error("{message}")]
    Raised { exception: String, message: String },
}

impl RuntimeProblem {
    /// Name of the host-language exception class this problem raises as.
    pub fn kind(&self) -> &str {
        use RuntimeProblem::*;
        match self {
            UndefinedMethodForClass { .. } | UninitializedConstant(_) => "NameError",
            NoMethod { .. } => "NoMethodError",
            SingletonMethodForDifferentObject
            | BindArgumentMismatch(_)
            | NotASymbol(_)
            | InvalidArgument { .. }
            | NoSingletonClass(_) => "TypeError",
            InvalidNumberOfArguments { .. } => "ArgumentError",
            MaxCallStackDepthReached(_) => "SystemStackError",
            Raised { exception, .. } => exception.as_str(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {}", .problem.kind(), .problem)]
pub struct RuntimeError {
    pub callstack: Vec<String>,
    pub problem: RuntimeProblem,
}

impl RuntimeError {
    pub fn print_callstack(&self, mut output: impl Write) -> std::io::Result<()> {
        writeln!(output, "Callstack:")?;
        for (i, frame) in self.callstack.iter().enumerate() {
            writeln!(output, "{:>3}: {}", i, frame)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    RuntimeError(#[from] RuntimeError),
}

impl Error {
    pub fn problem(&self) -> Option<&RuntimeProblem> {
        match self {
            Error::RuntimeError(e) => Some(&e.problem),
            Error::IoError(_) => None,
        }
    }

    pub fn kind(&self) -> &str {
        self.problem().map(|p| p.kind()).unwrap_or("IOError")
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VmConfig {
    /// Frames allowed above the top-level frame. Capped at
    /// [`MAX_CALL_STACK_DEPTH`].
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: MAX_CALL_STACK_DEPTH,
        }
    }
}

/// One activation record. `mid` is the name reflective code sees as
/// "the method currently executing"; `target_class` is the class the
/// body dispatches relative to.
#[derive(Clone, Copy, Debug)]
pub struct CallInfo {
    pub mid: Option<Symbol>,
    pub receiver: Value,
    pub target_class: ObjRef,
}

/// Classes created during boot that the VM consults directly.
#[derive(Clone, Copy, Debug)]
pub struct CoreClasses {
    pub basic_object: ObjRef,
    pub object: ObjRef,
    pub module: ObjRef,
    pub class: ObjRef,
    pub kernel: ObjRef,
    pub nil_class: ObjRef,
    pub true_class: ObjRef,
    pub false_class: ObjRef,
    pub integer: ObjRef,
    pub symbol: ObjRef,
    pub string: ObjRef,
}

pub struct Vm {
    allocator: Allocator,
    symbols: SymbolTable,
    globals: FxHashMap<String, ObjRef>,
    frames: ArrayVec<CallInfo, { MAX_CALL_STACK_DEPTH + 1 }>,
    config: VmConfig,
    core: CoreClasses,
    method_class: OnceCell<ObjRef>,
    unbound_method_class: OnceCell<ObjRef>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut allocator = Allocator::default();
        let mut globals = FxHashMap::default();
        let core = boot::boot_classes(&mut allocator, &mut globals);
        let mut vm = Self {
            allocator,
            symbols: SymbolTable::default(),
            globals,
            frames: ArrayVec::new(),
            config: VmConfig {
                max_call_depth: config.max_call_depth.min(MAX_CALL_STACK_DEPTH),
            },
            core,
            method_class: OnceCell::new(),
            unbound_method_class: OnceCell::new(),
        };
        vm.frames.push(CallInfo {
            mid: None,
            receiver: Value::Nil,
            target_class: core.object,
        });
        vm.register_builtins();
        crate::method::init(&mut vm);
        vm
    }

    pub fn core(&self) -> &CoreClasses {
        &self.core
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub(crate) fn allocator_mut(&mut self) -> &mut Allocator {
        &mut self.allocator
    }

    // Symbols

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn sym_name(&self, sym: Symbol) -> &str {
        self.symbols.name(sym)
    }

    /// Accepts a symbol or a string, the way call sites name methods.
    pub fn to_sym(&mut self, value: &Value) -> Result<Symbol, Error> {
        if let Value::Symbol(sym) = value {
            return Ok(*sym);
        }
        if let Some(s) = self.string_value(value).map(str::to_owned) {
            return Ok(self.intern(&s));
        }
        Err(self.new_runtime_error(RuntimeProblem::NotASymbol(self.inspect(value))))
    }

    // Errors

    fn current_callstack(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|frame| match frame.mid {
                Some(mid) => format!(
                    "{}#{}",
                    self.class_name(frame.target_class),
                    self.sym_name(mid)
                ),
                None => "<top>".to_owned(),
            })
            .rev()
            .collect()
    }

    pub fn new_runtime_error(&self, problem: RuntimeProblem) -> Error {
        Error::RuntimeError(RuntimeError {
            callstack: self.current_callstack(),
            problem,
        })
    }

    /// Builds an error of an arbitrary exception class, as a method body
    /// raising it would.
    pub fn raise(&self, exception: &str, message: &str) -> Error {
        self.new_runtime_error(RuntimeProblem::Raised {
            exception: exception.to_owned(),
            message: message.to_owned(),
        })
    }

    // Call frames

    #[cfg(not(feature = "trace"))]
    fn trace(&self) {}
    #[cfg(feature = "trace")]
    fn trace(&self) {
        println!("    frames: {:?}", self.current_callstack());
    }

    fn push_frame(&mut self, frame: CallInfo) -> Result<(), Error> {
        if self.frames.len() > self.config.max_call_depth {
            return Err(self.new_runtime_error(RuntimeProblem::MaxCallStackDepthReached(
                self.config.max_call_depth,
            )));
        }
        self.frames.push(frame);
        tracing::trace!(depth = self.frames.len(), "push frame");
        self.trace();
        Ok(())
    }

    fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "top-level frame must not be popped");
        self.frames.pop();
        tracing::trace!(depth = self.frames.len(), "pop frame");
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Name of the method executing in the innermost frame.
    pub fn current_method_name(&self) -> Option<Symbol> {
        self.frames.last().and_then(|f| f.mid)
    }

    /// Class the innermost frame dispatches relative to.
    pub fn current_target_class(&self) -> ObjRef {
        self.frames
            .last()
            .map(|f| f.target_class)
            .unwrap_or(self.core.object)
    }

    /// Name of the method executing in the frame that called the
    /// innermost one.
    pub fn caller_method_name(&self) -> Option<Symbol> {
        let len = self.frames.len();
        if len < 2 {
            return None;
        }
        self.frames[len - 2].mid
    }

    /// Overwrites the executing name of the frame at `depth` (1-based, as
    /// returned by [`Vm::frame_depth`]) and returns the previous name.
    pub(crate) fn replace_method_name(&mut self, depth: usize, mid: Option<Symbol>) -> Option<Symbol> {
        match self.frames.get_mut(depth.wrapping_sub(1)) {
            Some(frame) => std::mem::replace(&mut frame.mid, mid),
            None => None,
        }
    }

    // Class graph

    pub fn class(&self, r: ObjRef) -> Option<&Class> {
        self.allocator.get(r).class()
    }

    fn class_mut(&mut self, r: ObjRef) -> Option<&mut Class> {
        self.allocator.get_mut(r).class_mut()
    }

    /// Resolves a value that must name a class or module.
    pub fn expect_class(&self, value: &Value) -> Result<ObjRef, Error> {
        match value.obj() {
            Some(r) if self.class(r).is_some() => Ok(r),
            _ => Err(self.new_runtime_error(RuntimeProblem::InvalidArgument {
                expected: "Class or Module".to_owned(),
                got: self.class_name(self.obj_class(value)),
            })),
        }
    }

    pub fn class_get(&self, name: &str) -> Result<ObjRef, Error> {
        self.globals.get(name).copied().ok_or_else(|| {
            self.new_runtime_error(RuntimeProblem::UninitializedConstant(name.to_owned()))
        })
    }

    pub fn superclass(&self, class: ObjRef) -> Option<ObjRef> {
        self.class(class).and_then(|c| c.superclass)
    }

    pub fn is_module(&self, class: ObjRef) -> bool {
        self.class(class).map(|c| c.is_module()).unwrap_or(false)
    }

    pub fn class_name(&self, class: ObjRef) -> String {
        match self.class(class) {
            Some(Class { name: Some(name), .. }) => name.clone(),
            Some(Class {
                kind: ClassKind::Singleton { attached },
                ..
            }) => format!("#<Class:{}>", self.inspect(attached)),
            _ => format!("#<Class:{:?}>", class),
        }
    }

    /// Defines (or reopens) a named class. `superclass` defaults to
    /// `Object`.
    pub fn define_class(&mut self, name: &str, superclass: Option<ObjRef>) -> ObjRef {
        if let Some(existing) = self.globals.get(name) {
            return *existing;
        }
        let superclass = superclass.unwrap_or(self.core.object);
        let class = Class::new(Some(name.to_owned()), ClassKind::Class, Some(superclass));
        let r = self.allocator.allocate_class(self.core.class, class);
        self.globals.insert(name.to_owned(), r);
        tracing::debug!(class = name, superclass = %self.class_name(superclass), "defined class");
        r
    }

    pub fn define_module(&mut self, name: &str) -> ObjRef {
        if let Some(existing) = self.globals.get(name) {
            return *existing;
        }
        let module = Class::new(Some(name.to_owned()), ClassKind::Module, None);
        let r = self.allocator.allocate_class(self.core.module, module);
        self.globals.insert(name.to_owned(), r);
        tracing::debug!(module = name, "defined module");
        r
    }

    pub fn define_method(
        &mut self,
        class: ObjRef,
        name: &str,
        arity: Arity,
        body: impl Fn(&mut Vm, &Value, &[Value]) -> Result<Value, Error> + 'static,
    ) {
        let sym = self.intern(name);
        let proc = Proc::new(name, arity, body);
        if let Some(c) = self.class_mut(class) {
            c.add_method(sym, proc);
        }
    }

    pub fn define_singleton_method(
        &mut self,
        obj: Value,
        name: &str,
        arity: Arity,
        body: impl Fn(&mut Vm, &Value, &[Value]) -> Result<Value, Error> + 'static,
    ) -> Result<(), Error> {
        let singleton = self.singleton_class(obj)?;
        self.define_method(singleton, name, arity, body);
        Ok(())
    }

    pub fn undef_method(&mut self, class: ObjRef, name: &str) {
        let sym = self.intern(name);
        if let Some(c) = self.class_mut(class) {
            c.undef_method(sym);
        }
    }

    /// Undefines a method on the class object itself, e.g. `new`.
    pub fn undef_class_method(&mut self, class: ObjRef, name: &str) -> Result<(), Error> {
        let singleton = self.singleton_class(Value::Obj(class))?;
        self.undef_method(singleton, name);
        Ok(())
    }

    /// Makes `new_name` another entry for the implementation `old_name`
    /// currently resolves to from `class`.
    pub fn alias_method(&mut self, class: ObjRef, new_name: &str, old_name: &str) -> Result<(), Error> {
        let old = self.intern(old_name);
        let new = self.intern(new_name);
        let (_, proc) = match self.method_search(class, old) {
            Some(found) => found,
            None => {
                return Err(self.new_runtime_error(RuntimeProblem::UndefinedMethodForClass {
                    name: old_name.to_owned(),
                    class: self.class_name(class),
                }))
            }
        };
        if let Some(c) = self.class_mut(class) {
            c.add_method(new, proc);
        }
        Ok(())
    }

    /// Mixes `module` into `class`. Including a module that is already an
    /// ancestor is a no-op.
    pub fn include_module(&mut self, class: ObjRef, module: ObjRef) -> Result<(), Error> {
        if !self.is_module(module) {
            return Err(self.new_runtime_error(RuntimeProblem::InvalidArgument {
                expected: "Module".to_owned(),
                got: self.class_name(module),
            }));
        }
        if self.ancestors(class).contains(&module) {
            return Ok(());
        }
        if let Some(c) = self.class_mut(class) {
            c.include(module);
        }
        Ok(())
    }

    /// Resolution order starting at `class`: the class, its included
    /// modules newest first (each followed by its own inclusions), then
    /// the same for each superclass.
    pub fn ancestors(&self, class: ObjRef) -> Vec<ObjRef> {
        let mut out = vec![];
        let mut current = Some(class);
        while let Some(c) = current {
            self.push_with_includes(c, &mut out);
            current = self.superclass(c);
        }
        out
    }

    fn push_with_includes(&self, class: ObjRef, out: &mut Vec<ObjRef>) {
        if out.contains(&class) {
            return;
        }
        out.push(class);
        if let Some(c) = self.class(class) {
            for module in c.includes().iter().rev() {
                self.push_with_includes(*module, out);
            }
        }
    }

    pub fn ancestors_display(&self, class: ObjRef) -> String {
        self.ancestors(class)
            .into_iter()
            .map(|c| self.class_name(c))
            .join(", ")
    }

    /// Finds the implementation of `name` along the resolution order of
    /// `class`, returning the class it was found in.
    pub fn method_search(&self, class: ObjRef, name: Symbol) -> Option<(ObjRef, Proc)> {
        self.search_in(&self.ancestors(class), name)
    }

    /// Like [`Vm::method_search`], but only the entries that follow `after`
    /// in the resolution order of `class` are consulted.
    pub fn method_search_after(
        &self,
        class: ObjRef,
        after: ObjRef,
        name: Symbol,
    ) -> Option<(ObjRef, Proc)> {
        let order = self.ancestors(class);
        let start = order.iter().position(|c| *c == after)? + 1;
        self.search_in(&order[start..], name)
    }

    fn search_in(&self, order: &[ObjRef], name: Symbol) -> Option<(ObjRef, Proc)> {
        for c in order {
            match self.class(*c).and_then(|class| class.get_method(name)) {
                Some(MethodEntry::Defined(proc)) => return Some((*c, proc.clone())),
                Some(MethodEntry::Undefined) => return None,
                None => {}
            }
        }
        None
    }

    // Objects

    pub fn new_object(&mut self, class: ObjRef) -> Value {
        Value::Obj(self.allocator.allocate_obj_instance(class))
    }

    pub fn new_string(&mut self, s: &str) -> Value {
        Value::Obj(self.allocator.allocate_string(self.core.string, s.to_owned()))
    }

    pub fn string_value(&self, value: &Value) -> Option<&str> {
        value
            .obj()
            .and_then(|r| self.allocator.get(r).string())
            .map(|s| &**s)
    }

    pub fn get_ivar(&self, obj: &Value, name: Symbol) -> Value {
        obj.obj()
            .and_then(|r| self.allocator.get(r).instance())
            .and_then(|i| i.get_field(name))
            .copied()
            .unwrap_or(Value::Nil)
    }

    pub fn set_ivar(&mut self, obj: &Value, name: Symbol, value: Value) {
        if let Some(instance) = obj.obj().and_then(|r| self.allocator.get_mut(r).instance_mut()) {
            instance.set_field(name, value);
        }
    }

    /// Runtime class, singleton class included.
    pub fn class_of(&self, value: &Value) -> ObjRef {
        match value {
            Value::Nil => self.core.nil_class,
            Value::Boolean(true) => self.core.true_class,
            Value::Boolean(false) => self.core.false_class,
            Value::Integer(_) => self.core.integer,
            Value::Symbol(_) => self.core.symbol,
            Value::Obj(r) => self.allocator.get(*r).klass,
        }
    }

    /// Real class of a value, skipping any singleton class.
    pub fn obj_class(&self, value: &Value) -> ObjRef {
        let mut class = self.class_of(value);
        while let Some(c) = self.class(class) {
            match (c.kind, c.superclass) {
                (ClassKind::Singleton { .. }, Some(superclass)) => class = superclass,
                _ => break,
            }
        }
        class
    }

    pub fn is_kind_of(&self, value: &Value, class: ObjRef) -> bool {
        self.ancestors(self.class_of(value)).contains(&class)
    }

    /// Returns the per-object class of `value`, creating it on first use.
    pub fn singleton_class(&mut self, value: Value) -> Result<ObjRef, Error> {
        let r = match value {
            Value::Obj(r) => r,
            other => {
                return Err(self.new_runtime_error(RuntimeProblem::NoSingletonClass(
                    self.inspect(&other),
                )))
            }
        };
        let current = self.allocator.get(r).klass;
        if let Some(Class {
            kind: ClassKind::Singleton { attached },
            ..
        }) = self.class(current)
        {
            if *attached == value {
                return Ok(current);
            }
        }
        let singleton = Class::new(None, ClassKind::Singleton { attached: value }, Some(current));
        let s = self.allocator.allocate_class(self.core.class, singleton);
        self.allocator.get_mut(r).klass = s;
        tracing::debug!(obj = ?r, "created singleton class");
        Ok(s)
    }

    pub fn inspect(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_owned(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Symbol(s) => format!(":{}", self.sym_name(*s)),
            Value::Obj(r) => match &self.allocator.get(*r).inner {
                ObjInner::String(s) => format!("{:?}", s.0),
                ObjInner::Class(_) => self.class_name(*r),
                ObjInner::Instance(_) => format!("#<{}>", self.class_name(self.obj_class(value))),
                ObjInner::Method(handle) => self.handle_inspect(handle),
            },
        }
    }

    // Dispatch

    /// Runs `proc` in a new frame. The frame keeps the caller's executing
    /// name and dispatches relative to `class`.
    pub fn yield_with_class(
        &mut self,
        proc: &Proc,
        args: &[Value],
        receiver: Value,
        class: ObjRef,
    ) -> Result<Value, Error> {
        let mid = self.current_method_name();
        self.invoke_proc(proc, mid, args, receiver, class)
    }

    pub(crate) fn invoke_proc(
        &mut self,
        proc: &Proc,
        mid: Option<Symbol>,
        args: &[Value],
        receiver: Value,
        class: ObjRef,
    ) -> Result<Value, Error> {
        if let Arity::Exact(expected) = proc.arity {
            if expected != args.len() {
                return Err(
                    self.new_runtime_error(RuntimeProblem::InvalidNumberOfArguments {
                        expected,
                        passed: args.len(),
                    }),
                );
            }
        }
        self.push_frame(CallInfo {
            mid,
            receiver,
            target_class: class,
        })?;
        let body = proc.body.clone();
        let result = body(self, &receiver, args);
        self.pop_frame();
        result
    }

    pub fn funcall(&mut self, receiver: Value, name: &str, args: &[Value]) -> Result<Value, Error> {
        let sym = self.intern(name);
        self.funcall_sym(receiver, sym, args)
    }

    /// Ordinary dynamic dispatch: resolve from the receiver's runtime
    /// class, falling back to `method_missing`.
    pub fn funcall_sym(&mut self, receiver: Value, name: Symbol, args: &[Value]) -> Result<Value, Error> {
        let class = self.class_of(&receiver);
        match self.method_search(class, name) {
            Some((owner, proc)) => self.invoke_proc(&proc, Some(name), args, receiver, owner),
            None => self.method_missing(receiver, name, args),
        }
    }

    /// Routes a call with no implementation through the receiver's
    /// `method_missing`, passing the name as the first argument.
    pub fn method_missing(&mut self, receiver: Value, name: Symbol, args: &[Value]) -> Result<Value, Error> {
        let hook = self.intern(METHOD_MISSING);
        let class = self.class_of(&receiver);
        match self.method_search(class, hook) {
            Some((owner, proc)) => {
                let mut hook_args = Vec::with_capacity(args.len() + 1);
                hook_args.push(Value::Symbol(name));
                hook_args.extend_from_slice(args);
                self.invoke_proc(&proc, Some(hook), &hook_args, receiver, owner)
            }
            None => Err(self.new_runtime_error(RuntimeProblem::NoMethod {
                name: self.sym_name(name).to_owned(),
                receiver: self.inspect(&receiver),
            })),
        }
    }

    /// Direct lookup only; `respond_to_missing?` is not consulted.
    pub fn respond_to(&self, value: &Value, name: Symbol) -> bool {
        self.method_search(self.class_of(value), name).is_some()
    }

    pub(crate) fn method_class(&self) -> Result<ObjRef, Error> {
        self.method_class
            .get_or_try_init(|| self.class_get("Method"))
            .copied()
    }

    pub(crate) fn unbound_method_class(&self) -> Result<ObjRef, Error> {
        self.unbound_method_class
            .get_or_try_init(|| self.class_get("UnboundMethod"))
            .copied()
    }
}
