use rmethod::{Arity, Error, Value, Vm, VmConfig};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
#[structopt(name = "rmethod")]
struct Opt {
    /// Class or module to resolve the method from
    #[structopt(long, default_value = "Child")]
    class: String,

    /// Method name to resolve
    #[structopt(long, default_value = "greet")]
    method: String,

    /// Print the resolution order of the class first
    #[structopt(long)]
    ancestors: bool,

    /// Maximum call depth
    #[structopt(long)]
    max_call_depth: Option<usize>,
}

/// Base, Child < Base, Mod and X including Mod, plus a Ghost that answers
/// for any name through respond_to_missing?.
fn demo_world(vm: &mut Vm) -> Result<(), Error> {
    let base = vm.define_class("Base", None);
    let child = vm.define_class("Child", Some(base));
    let module = vm.define_module("Mod");
    let x = vm.define_class("X", None);
    vm.include_module(x, module)?;
    let ghost = vm.define_class("Ghost", None);

    vm.define_method(base, "greet", Arity::Exact(0), |vm, _, _| {
        Ok(vm.new_string("hello from Base"))
    });
    vm.define_method(child, "greet", Arity::Exact(0), |vm, _, _| {
        Ok(vm.new_string("hello from Child"))
    });
    vm.define_method(module, "shout", Arity::Exact(0), |vm, this, _| {
        let text = format!("HEY from {}", vm.inspect(this));
        Ok(vm.new_string(&text))
    });
    vm.define_method(ghost, "respond_to_missing?", Arity::Exact(2), |_, _, _| {
        Ok(Value::Boolean(true))
    });
    // answers for Ghost.instance_method as well
    vm.define_singleton_method(
        Value::Obj(ghost),
        "respond_to_missing?",
        Arity::Exact(2),
        |_, _, _| Ok(Value::Boolean(true)),
    )?;
    vm.define_method(ghost, "method_missing", Arity::Any, |vm, _, args| {
        let text = format!("boo ({})", vm.inspect(&args[0]));
        Ok(vm.new_string(&text))
    });
    Ok(())
}

fn run(opt: &Opt) -> Result<(), Error> {
    let mut config = VmConfig::default();
    if let Some(depth) = opt.max_call_depth {
        config.max_call_depth = depth;
    }
    let mut vm = Vm::with_config(config);
    demo_world(&mut vm)?;

    let class = vm.class_get(&opt.class)?;
    if opt.ancestors {
        println!("ancestors: {}", vm.ancestors_display(class));
    }

    let name = vm.intern(&opt.method);
    let mut current = vm.instance_method(Value::Obj(class), name)?;
    let receiver = if vm.is_module(class) {
        None
    } else {
        Some(vm.funcall(Value::Obj(class), "new", &[])?)
    };

    while !current.is_nil() {
        let owner = vm.handle(&current)?.owner.class_ref();
        println!("{}  owner: {}", vm.inspect(&current), vm.class_name(owner));
        if let Some(receiver) = receiver {
            let bound = vm.bind(current, receiver)?;
            let result = vm.method_call(bound, &[])?;
            println!("  => {}", vm.inspect(&result));
        }
        current = vm.super_method(current)?;
    }
    Ok(())
}

fn main() {
    if let Ok(filter) = EnvFilter::try_from_env("RMETHOD_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let opt = Opt::from_args();
    if let Err(err) = run(&opt) {
        eprintln!("{}", err);
        if let Error::RuntimeError(e) = &err {
            if let Err(io) = e.print_callstack(std::io::stderr()) {
                eprintln!("{}", io);
            }
        }
        std::process::exit(70);
    }
}
