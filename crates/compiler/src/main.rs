//! schemec CLI (SPEC_FULL.md §9).

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "schemec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "schemec - compile Scheme programs to x86-64 assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .scm file to NASM-syntax assembly
    Build {
        /// Input .scm source file
        input: PathBuf,

        /// Output .asm path (defaults to input filename with a .asm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the reader's S-expressions before compiling
        #[arg(long)]
        keep_sexpr: bool,

        /// Print the tag parser's AST before compiling
        #[arg(long)]
        keep_ast: bool,

        /// Stop after emitting assembly text (default; assembler/linker
        /// invocation is out of scope).
        #[arg(long)]
        emit_only: bool,

        /// Shell out to nasm/ld to assemble and link the output, if both
        /// are found on PATH.
        #[arg(long)]
        assemble: bool,
    },

    /// Run reader, tag parser, and semantic analyzer only; report the first error
    Check {
        /// Input .scm source file
        input: PathBuf,
    },

    /// Print the reader's S-expressions for a file
    DumpSexpr {
        /// Input .scm source file
        input: PathBuf,
    },

    /// Print the tag parser's (post-analysis) AST for a file
    DumpAst {
        /// Input .scm source file
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            keep_sexpr,
            keep_ast,
            emit_only: _,
            assemble,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("asm"));
            run_build(&input, &output, keep_sexpr, keep_ast, assemble);
        }
        Commands::Check { input } => run_check(&input),
        Commands::DumpSexpr { input } => run_dump_sexpr(&input),
        Commands::DumpAst { input } => run_dump_ast(&input),
    }
}

fn read_source(input: &Path) -> String {
    fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error: failed to read '{}': {e}", input.display());
        process::exit(1);
    })
}

fn run_build(input: &Path, output: &Path, keep_sexpr: bool, keep_ast: bool, assemble: bool) {
    let source = read_source(input);

    if keep_sexpr {
        match schemec::reader::read_all(&source) {
            Ok(forms) => {
                for form in &forms {
                    println!("{form}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }

    if keep_ast {
        match schemec::analyze_source(&source) {
            Ok(program) => {
                for node in &program {
                    println!("{node:#?}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }

    match schemec::compile_source(&source) {
        Ok(asm) => {
            if let Err(e) = fs::write(output, &asm) {
                eprintln!("Error: failed to write '{}': {e}", output.display());
                process::exit(1);
            }
            println!("Compiled {} -> {}", input.display(), output.display());

            if assemble {
                run_assemble(output);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Shell out to `nasm` then `ld`, exactly as the reference compiler shells
/// out to `clang`: an external collaborator, invoked, never reimplemented.
fn run_assemble(asm_path: &Path) {
    if which("nasm").is_none() || which("ld").is_none() {
        eprintln!("Error: --assemble requires both nasm and ld on PATH");
        process::exit(1);
    }

    let obj_path = asm_path.with_extension("o");
    let exe_path = asm_path.with_extension("");

    let nasm_status = process::Command::new("nasm")
        .args(["-f", "elf64", "-o"])
        .arg(&obj_path)
        .arg(asm_path)
        .status();
    match nasm_status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            eprintln!("Error: nasm exited with {status}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: failed to run nasm: {e}");
            process::exit(1);
        }
    }

    let ld_status = process::Command::new("ld")
        .arg(&obj_path)
        .arg("-o")
        .arg(&exe_path)
        .status();
    match ld_status {
        Ok(status) if status.success() => {
            println!("Linked {}", exe_path.display());
        }
        Ok(status) => {
            eprintln!("Error: ld exited with {status}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: failed to run ld: {e}");
            process::exit(1);
        }
    }
}

fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn run_check(input: &Path) {
    let source = read_source(input);
    match schemec::analyze_source(&source) {
        Ok(_) => println!("{}: ok", input.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_dump_sexpr(input: &Path) {
    let source = read_source(input);
    match schemec::reader::read_all(&source) {
        Ok(forms) => {
            for form in &forms {
                println!("{form}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_dump_ast(input: &Path) {
    let source = read_source(input);
    match schemec::analyze_source(&source) {
        Ok(program) => {
            for node in &program {
                println!("{node:#?}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
