mod builtins;

use rill_vm::Vm;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut vm = Vm::new();
    builtins::register(&mut vm);

    match args.len() {
        1 => repl(vm),
        2 => run_file(vm, &args[1]),
        _ => {
            eprintln!("usage: rill [script]");
            std::process::exit(64);
        }
    }
}

fn run_file(mut vm: Vm, path: &str) {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("rill: cannot open {path}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(errors) = compile(&mut vm, &source) {
        eprintln!("{errors}");
        eprintln!("rill: compilation failed");
        std::process::exit(1);
    }
    if let Err(e) = vm.run() {
        eprintln!("rill: runtime error: {e}");
        std::process::exit(1);
    }
}

fn repl(mut vm: Vm) {
    println!("rill {} repl", env!("CARGO_PKG_VERSION"));
    println!("type 'exit' to quit");
    println!();

    let config = rustyline::config::Config::builder()
        .auto_add_history(true)
        .build();
    let mut rl = match rustyline::DefaultEditor::with_config(config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("rill: cannot initialize line editor: {e}");
            return;
        }
    };

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line == "exit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                match compile(&mut vm, line) {
                    Ok(()) => {
                        if let Err(e) = vm.run() {
                            eprintln!("runtime error: {e}");
                            // The failed frame stack is useless to the
                            // next line; drop it, releasing each
                            // frame's closure reference.
                            while let Some(frame) = vm.frames.pop() {
                                vm.heap
                                    .release(rill_core::value::Value::Closure(frame.closure));
                            }
                        }
                    }
                    Err(errors) => eprintln!("{errors}"),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => continue,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("rill: readline error: {e}");
                break;
            }
        }
    }
}

fn compile(vm: &mut Vm, source: &str) -> Result<(), rill_compiler::CompileErrors> {
    vm.compile(source)?;
    if std::env::var_os("RILL_DUMP").is_some_and(|v| v == "1") {
        if let Some(frame) = vm.frames.last() {
            eprint!(
                "{}",
                rill_compiler::disasm::disassemble(&frame.proto, "<main>", &vm.heap.strings)
            );
        }
    }
    Ok(())
}
