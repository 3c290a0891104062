use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use tagql::{Composer, Error, Value};

#[derive(Parser)]
#[command(name = "tagql", version, about = "Query and define hierarchical tag-addressed data")]
struct Args {
    /// Script file to run; reads stdin when omitted
    file: Option<PathBuf>,

    /// Statements to run before the file or stdin input
    #[arg(short = 'c', long = "command")]
    command: Option<String>,

    /// Output format for printed modules
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut composer = Composer::new();

    if let Some(source) = &args.command {
        if let Err(error) = run_batch(&mut composer, source, args.format) {
            return fail(&error);
        }
    }

    let result = match &args.file {
        Some(path) => run_file(&mut composer, path, args.format),
        None if args.command.is_some() && atty::is(atty::Stream::Stdin) => Ok(()),
        None if atty::is(atty::Stream::Stdin) => repl(&mut composer, args.format),
        None => run_stdin(&mut composer, args.format),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => fail(&error),
    }
}

fn fail(error: &Error) -> ExitCode {
    eprintln!("error: {error}");
    ExitCode::FAILURE
}

fn run_file(composer: &mut Composer, path: &PathBuf, format: Format) -> Result<(), Error> {
    let source = fs::read_to_string(path).map_err(|e| Error::File {
        message: format!("cannot read {}: {e}", path.display()),
        fatal: true,
    })?;
    run_batch(composer, &source, format)
}

fn run_stdin(composer: &mut Composer, format: Format) -> Result<(), Error> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| Error::File {
            message: format!("cannot read stdin: {e}"),
            fatal: true,
        })?;
    run_batch(composer, &source, format)
}

fn run_batch(composer: &mut Composer, source: &str, format: Format) -> Result<(), Error> {
    let output = composer.compose(source, false)?;
    print_output(&output, format)
}

/// Interactive loop. Incomplete statements are carried to the next line;
/// errors are reported and the session continues.
fn repl(composer: &mut Composer, format: Format) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        let prompt = if composer.carrying() { "   ...> " } else { "tagql> " };
        print!("{prompt}");
        io::stdout().flush().ok();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(Error::File {
                    message: format!("cannot read stdin: {e}"),
                    fatal: true,
                })
            }
        }
        match composer.compose(&line, true) {
            Ok(output) => {
                if let Err(error) = print_output(&output, format) {
                    eprintln!("error: {error}");
                }
            }
            Err(error) => {
                eprintln!("error: {error}");
                if error.is_fatal() {
                    return Err(error);
                }
            }
        }
    }
}

fn print_output(output: &[Value], format: Format) -> Result<(), Error> {
    for module in output {
        match format {
            Format::Json => {
                let rendered = serde_json::to_string_pretty(&module.to_json())
                    .map_err(|e| Error::logic(format!("cannot render output: {e}")))?;
                println!("{rendered}");
            }
            Format::Yaml => {
                let rendered = serde_yaml::to_string(&module.to_yaml())
                    .map_err(|e| Error::logic(format!("cannot render output: {e}")))?;
                print!("{rendered}");
            }
        }
    }
    Ok(())
}
