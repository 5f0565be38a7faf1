use std::env;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process;

use paracl::{disassemble_chunk, read_chunk, run_chunk, Chunk};

fn main() {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("run") => run_command(&args[2..]),
        Some("dis") => dis_command(&args[2..]),
        _ => {
            eprintln!("Usage: paracl run <file.pclc>");
            eprintln!("       paracl dis <file.pclc>");
            eprintln!();
            eprintln!("Commands:");
            eprintln!("  run  Execute a compiled chunk (exit 2 on a runtime error)");
            eprintln!("  dis  Disassemble a compiled chunk");
            process::exit(1);
        }
    }
}

fn load_chunk(args: &[String], command: &str) -> Chunk {
    let path = match args.first() {
        Some(p) => p,
        None => {
            eprintln!("Usage: paracl {} <file.pclc>", command);
            process::exit(1);
        }
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening {}: {}", path, e);
            process::exit(1);
        }
    };

    match read_chunk(&mut BufReader::new(file)) {
        Ok(chunk) => chunk,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            process::exit(1);
        }
    }
}

fn run_command(args: &[String]) {
    let chunk = load_chunk(args, "run");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    if let Err(e) = run_chunk(&chunk, &mut input, &mut output) {
        let _ = output.flush();
        eprintln!("Runtime error: {}", e);
        process::exit(2);
    }
}

fn dis_command(args: &[String]) {
    let chunk = load_chunk(args, "dis");

    match disassemble_chunk(&chunk) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error disassembling chunk: {}", e);
            process::exit(1);
        }
    }
}
