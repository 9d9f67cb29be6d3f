use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::{self, Scanner};
use rox::session::{RunError, Session, EXIT_RUNTIME_ERROR, EXIT_STATIC_ERROR};

/// Exit status when the input file cannot be read.
const EXIT_IO_ERROR: i32 = 74;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs a Lox program from a file, or starts a prompt when no file is given
    Run { filename: Option<PathBuf> },
}

/// Reads a whole file as UTF‑8 text.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

/// Like [`read_file`], but exits with the I/O status on failure.
fn read_source(filename: &Path) -> String {
    match read_file(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(EXIT_IO_ERROR);
        }
    }
}

fn no_input() -> ! {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{} {}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokenized = true;

    if json {
        let (tokens, diagnostics) = scanner::scan(source);
        for e in &diagnostics {
            eprintln!("{}", e);
        }
        tokenized = diagnostics.is_empty();
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in Scanner::new(source) {
            match token {
                Ok(token) => println!("{}", token),
                Err(e) => {
                    tokenized = false;
                    eprintln!("{}", e);
                }
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);
        std::process::exit(EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(source: &str) {
    let (tokens, diagnostics) = scanner::scan(source);
    let result = if diagnostics.is_empty() {
        Parser::new(&tokens).parse_expression()
    } else {
        Err(diagnostics)
    };

    match result {
        Ok(expr) => println!("{}", AstPrinter::print(&expr)),
        Err(diagnostics) => {
            eprintln!("{}", diagnostics);
            std::process::exit(EXIT_STATIC_ERROR);
        }
    }
}

fn evaluate(source: &str) {
    let (tokens, diagnostics) = scanner::scan(source);
    let result = if diagnostics.is_empty() {
        Parser::new(&tokens).parse_expression()
    } else {
        Err(diagnostics)
    };

    let expr = match result {
        Ok(expr) => expr,
        Err(diagnostics) => {
            eprintln!("{}", diagnostics);
            std::process::exit(EXIT_STATIC_ERROR);
        }
    };

    // A lone expression has no scopes, so every name is a global.
    match Interpreter::new().evaluate(&expr) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_RUNTIME_ERROR);
        }
    }
}

/// Prints a failed run to stderr, with the call trace for runtime errors.
fn report(e: &RunError) {
    eprintln!("{}", e);
    for frame in e.stack_trace() {
        eprintln!("{}", frame);
    }
}

fn run_file(filename: &Path) {
    let source = read_source(filename);
    debug!("Provided input:\n{}", source);

    if let Err(e) = Session::new().run(&source) {
        report(&e);
        std::process::exit(e.exit_code());
    }

    info!("Program executed successfully");
}

/// Interactive prompt: one persistent session, errors reported per line.
fn repl() -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = Session::new();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 || line.trim_end() == "exit" {
            return Ok(());
        }

        let start = Instant::now();
        if let Err(e) = session.run(&line) {
            report(&e);
        }
        info!("Prompt line executed in {:?}", start.elapsed());
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let filename = filename.unwrap_or_else(|| no_input());
            tokenize(&read_source(&filename), json)?;
        }

        Commands::Parse { filename } => {
            let filename = filename.unwrap_or_else(|| no_input());
            parse(&read_source(&filename));
        }

        Commands::Evaluate { filename } => {
            let filename = filename.unwrap_or_else(|| no_input());
            evaluate(&read_source(&filename));
        }

        Commands::Run { filename } => match filename {
            Some(filename) => run_file(&filename),
            None => repl()?,
        },
    }

    Ok(())
}
