use minipas::{Args, Compiler};
use rustyline::Editor;
use std::{fs, path::PathBuf, process};

fn main() {
    env_logger::init();
    let args = Args::new();
    let compiler = Compiler::new(args.listing);
    if let Some(file_name) = args.file_name {
        if !run_file(&compiler, file_name) {
            process::exit(1);
        }
    } else {
        run_prompt(&compiler);
    }
}

fn run_file(compiler: &Compiler, file_name: PathBuf) -> bool {
    match fs::read_to_string(&file_name) {
        Ok(source) => compiler.run(source).is_ok(),
        Err(e) => {
            eprintln!("cannot read '{}': {}", file_name.display(), e);
            false
        }
    }
}

/// Accumulates lines until one ends the program with `end.`.
fn run_prompt(compiler: &Compiler) {
    let mut editor = Editor::<()>::new();
    let mut source = String::new();
    loop {
        let prompt = if source.is_empty() { "$ " } else { ". " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(_) => break,
        };
        editor.add_history_entry(line.as_str());
        source.push_str(&line);
        source.push('\n');
        if line.trim_end().ends_with("end.") {
            compiler.run(std::mem::take(&mut source)).ok();
        }
    }
}
