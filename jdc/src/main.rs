use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};

use decomp_rs::{decompile_bytes, Options, Severity};

#[derive(Parser, Debug)]
#[command(author, version, about = "Decompile Java class files", long_about = None)]
struct Args {
    #[arg(value_name = "CLASSES", required = true)]
    class_file: Vec<PathBuf>,

    /// Print to stdout instead of writing <Name>.java files
    #[arg(short = 'p', long)]
    stdout: bool,

    /// Append line-number comments from the LineNumberTable
    #[arg(short = 'l', long)]
    line_comments: bool,

    /// Ignore LocalVariableTable names and use var<slot> everywhere
    #[arg(long)]
    no_names: bool,

    /// Emit while loops instead of reconstructing for loops
    #[arg(long)]
    while_loops: bool,

    /// Show raw allocation and <init> calls instead of constructor calls
    #[arg(long)]
    raw_constructors: bool,

    /// Spaces per indentation level
    #[arg(long, default_value_t = 4)]
    indent: usize,

    /// Largest class file accepted, in bytes
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    max_bytes: usize,

    /// Give up on a class after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print per-class statistics
    #[arg(short = 's', long)]
    stats: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let mut failures = 0usize;
    for path in &args.class_file {
        if path.extension().map_or(true, |ext| ext != "class") {
            error!("{}: not a java class file", path.display());
            failures += 1;
            continue;
        }
        let options = Options {
            emit_line_comments: args.line_comments,
            recover_variable_names: !args.no_names,
            fold_constructor_new: !args.raw_constructors,
            prefer_for_loops: !args.while_loops,
            max_bytes: args.max_bytes,
            indent_unit: " ".repeat(args.indent),
            deadline: args
                .timeout_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
        };
        match run(path, &options, &args) {
            Ok(()) => {}
            Err(message) => {
                error!("{}: {message}", path.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        std::process::exit(1);
    }
}

fn run(path: &PathBuf, options: &Options, args: &Args) -> Result<(), String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    if bytes.len() > options.max_bytes {
        return Err(format!(
            "file is {} bytes, over the {} byte limit",
            bytes.len(),
            options.max_bytes
        ));
    }
    let document = decompile_bytes(&bytes, options).map_err(|e| e.to_string())?;
    for diagnostic in &document.diagnostics {
        let text = match diagnostic.pc {
            Some(pc) => format!("{} (pc {pc})", diagnostic.message),
            None => diagnostic.message.clone(),
        };
        match diagnostic.severity {
            Severity::Error => error!("{}: {text}", path.display()),
            _ => info!("{}: {text}", path.display()),
        }
    }
    if args.stats {
        eprintln!(
            "{}: {} methods, {} instructions, {:?}",
            path.display(),
            document.stats.methods,
            document.stats.instructions,
            document.stats.elapsed
        );
    }
    if args.stdout {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(document.source_text.as_bytes())
            .map_err(|e| e.to_string())?;
    } else {
        let output = path.with_file_name(format!("{}.java", document.class.simple_name()));
        let mut file = File::create(&output).map_err(|e| e.to_string())?;
        file.write_all(document.source_text.as_bytes())
            .map_err(|e| e.to_string())?;
        info!("wrote {}", output.display());
    }
    Ok(())
}
