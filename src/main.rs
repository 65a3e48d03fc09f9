use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cclisp::error::LispError;
use cclisp::eval::{Machine, DEFAULT_MAX_FUEL};
use cclisp::reader;
use cclisp::symbol::sym;
use cclisp::value::Value;

/// A small Lisp with first-class continuations.
#[derive(Parser)]
#[command(name = "lisp", version, about)]
struct Cli {
    /// Enter the interactive shell after running FILE or CODE
    #[arg(short, long)]
    interactive: bool,

    /// Evaluate CODE and print each result
    #[arg(short = 'c', long = "code", value_name = "CODE")]
    code: Option<String>,

    /// Log every form `load` evaluates, with its result
    #[arg(long = "log-tests")]
    log_tests: bool,

    /// Trace each continuation step, rendering the chain to DEPTH nodes
    #[arg(
        long = "log-conts",
        value_name = "DEPTH",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "8"
    )]
    log_conts: Option<usize>,

    /// Source file to execute
    file: Option<PathBuf>,

    /// Arguments exposed to the script as `argv`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.log_conts.is_some() {
        Level::TRACE
    } else if cli.log_tests {
        Level::INFO
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set up logging");

    let mut machine = Machine::new(DEFAULT_MAX_FUEL);
    machine.log_conts = cli.log_conts;
    machine.log_loads = cli.log_tests;

    let mut ok = true;

    if let Some(code) = &cli.code {
        ok &= run_source(&mut machine, code, true);
    }

    if let Some(path) = &cli.file {
        bind_argv(&mut machine, &cli.script_args);
        match fs::read_to_string(path) {
            Ok(src) => ok &= run_source(&mut machine, &src, false),
            Err(e) => {
                eprintln!("error: cannot read {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    }

    let enter_repl = cli.interactive || (cli.file.is_none() && cli.code.is_none());
    if enter_repl {
        run_repl(&mut machine);
    } else if !ok {
        process::exit(1);
    }
}

/// Expose trailing command-line arguments to the script as a list of
/// strings bound to `argv`.
fn bind_argv(machine: &mut Machine, args: &[String]) {
    let values: Vec<Value> = args
        .iter()
        .map(|a| Value::Str(machine.strings.intern(a)))
        .collect();
    let list = machine.heap.list(&values);
    machine.envs.define(machine.root, sym::ARGV, list);
}

/// Read and evaluate every form in `src`. Returns false on the first error;
/// batch execution stops there.
fn run_source(machine: &mut Machine, src: &str, print_results: bool) -> bool {
    let mut pos = 0;
    loop {
        let read = reader::read_one_at(
            src,
            pos,
            &mut machine.heap,
            &mut machine.symbols,
            &mut machine.strings,
        );
        match read {
            Ok(Some((form, new_pos))) => {
                pos = new_pos;
                match machine.eval_form(form) {
                    Ok(val) => {
                        if print_results {
                            println!("{}", machine.render(val));
                        }
                    }
                    Err(e) => {
                        report_error(&e);
                        return false;
                    }
                }
            }
            Ok(None) => return true,
            Err(e) => {
                report_error(&e);
                return false;
            }
        }
    }
}

fn report_error(err: &LispError) {
    match err {
        LispError::Eval {
            message,
            form: Some(form),
        } => eprintln!("error: {}\n  in {}", message, form),
        other => eprintln!("error: {}", other),
    }
}

/// Interactive shell: accumulate lines until parens balance, then read,
/// evaluate and print each form. Routed errors leave the shell alive.
fn run_repl(machine: &mut Machine) {
    let mut rl = DefaultEditor::new().expect("failed to initialize line editor");
    let mut buf = String::new();
    let mut depth: i32 = 0;

    loop {
        let prompt = if buf.is_empty() { "> " } else { "  " };
        match rl.readline(prompt) {
            Ok(line) => {
                // Track paren depth (naive but sufficient for well-formed input)
                for ch in line.chars() {
                    match ch {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                }
                buf.push_str(&line);
                buf.push('\n');

                if depth <= 0 {
                    depth = 0;
                    let input = std::mem::take(&mut buf);
                    let trimmed = input.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);
                    eval_and_print(machine, &input);
                }
            }
            Err(ReadlineError::Interrupted) => {
                buf.clear();
                depth = 0;
            }
            Err(ReadlineError::Eof) => {
                println!("Bye. Have a nice day :)");
                break;
            }
            Err(e) => {
                eprintln!("error: {}", e);
                break;
            }
        }
    }
}

fn eval_and_print(machine: &mut Machine, input: &str) {
    let mut pos = 0;
    loop {
        let read = reader::read_one_at(
            input,
            pos,
            &mut machine.heap,
            &mut machine.symbols,
            &mut machine.strings,
        );
        match read {
            Ok(Some((form, new_pos))) => {
                pos = new_pos;
                match machine.eval_form(form) {
                    Ok(val) => println!("{}", machine.render(val)),
                    Err(e) => report_error(&e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                report_error(&e);
                break;
            }
        }
    }
}
