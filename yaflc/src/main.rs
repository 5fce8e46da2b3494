#[macro_use]
extern crate clap;

use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use clap::Arg;

use yaflparse::{Error as YaflError, Limits};

#[derive(Debug)]
enum Error {
    Io(std::io::Error, IOErrorContext, PathBuf),
    Yafl(YaflError),
    Limits(&'static str, String),
}

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => write!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                },
                path.display(),
                err
            ),
            Error::Yafl(err) => write!(f, "{}", err),
            Error::Limits(flag, value) => write!(f, "--{} expects a positive integer, got \"{}\"", flag, value),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("Sets the source file to compile and run; reads stdin if omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("code_size")
                .short("c")
                .long("code-size")
                .takes_value(true)
                .value_name("CODE_SIZE")
                .help("Overrides the code segment size (spec.md §5 CODE_SIZE)"),
        )
        .arg(
            Arg::with_name("stack_size")
                .short("s")
                .long("stack-size")
                .takes_value(true)
                .value_name("STACK_SIZE")
                .help("Overrides the value stack size (spec.md §5 STCK_SIZE)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Raises the log level; repeat for more detail (-vv for per-instruction trace)"),
        )
        .arg(
            Arg::with_name("disassemble")
                .long("disassemble")
                .help("Compiles and prints the emitted bytecode instead of running it"),
        )
        .get_matches();

    init_logger(matches.occurrences_of("verbose"));

    let result = limits_from_matches(&matches).and_then(|limits| {
        run(
            matches.value_of("SOURCE"),
            matches.is_present("disassemble"),
            limits,
        )
    });

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info,yaflvm=debug,yaflparse=debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn limits_from_matches(matches: &clap::ArgMatches) -> Result<Limits, Error> {
    let mut limits = Limits::default();
    if let Some(code_size) = matches.value_of("code_size") {
        limits.code_size = code_size
            .parse()
            .map_err(|_| Error::Limits("code-size", code_size.to_owned()))?;
    }
    if let Some(stack_size) = matches.value_of("stack_size") {
        limits.stack_size = stack_size
            .parse()
            .map_err(|_| Error::Limits("stack-size", stack_size.to_owned()))?;
    }
    Ok(limits)
}

fn run(source_path: Option<&str>, disassemble: bool, limits: Limits) -> Result<(), Error> {
    let source = read_source(source_path)?;

    if disassemble {
        let code = yaflparse::compile_with_limits(&source, limits).map_err(Error::Yafl)?;
        print!("{}", yaflvm::codegen::render(&code));
        return Ok(());
    }

    yaflparse::compile_and_run_stdio_with_limits(&source, limits).map_err(Error::Yafl)
}

fn read_source(source_path: Option<&str>) -> Result<String, Error> {
    let mut source = String::new();
    match source_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            let file = File::open(path)
                .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;
            BufReader::new(file)
                .read_to_string(&mut source)
                .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;
        }
        None => {
            let stdin = std::io::stdin();
            stdin
                .lock()
                .read_to_string(&mut source)
                .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, PathBuf::from("<stdin>")))?;
        }
    }
    Ok(source)
}
