use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use tipy::ast;
use tipy::check;
use tipy::config::{Config, DEBUG_AST_EXEC, DEBUG_AST_STOP, DEFAULT_TABSIZE};
use tipy::interpreter::Interpreter;
use tipy::parser;

const LANGUAGE: &str = "tipy";
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage(executable: &str, stream: &mut dyn Write) {
    let _ = writeln!(stream);
    let _ = writeln!(stream, "{LANGUAGE} version {VERSION}");
    let _ = writeln!(stream, "usage: {executable} [options] module");
    let _ = writeln!(stream, "module: name of file containing code to execute");
    let _ = writeln!(stream, "options");
    let _ = writeln!(stream, "-d[detail] = show debug info");
    let _ = writeln!(stream, "    detail = sum of options (default = 8)");
    let _ = writeln!(stream, "    option  0: no debug output");
    let _ = writeln!(stream, "    option  1: show tokens during parsing");
    let _ = writeln!(
        stream,
        "    option  4: show abstract syntax tree after parsing and stop"
    );
    let _ = writeln!(
        stream,
        "    option  8: show abstract syntax tree after parsing and execute"
    );
    let _ = writeln!(stream, "-h = show usage information");
    let _ = writeln!(stream, "-t[tabsize] = set tab size in spaces");
    let _ = writeln!(stream, "    tabsize = >= 1 (default = {DEFAULT_TABSIZE})");
    let _ = writeln!(stream, "-v = show version information");
}

fn run(module_name: &str, config: &Config) -> tipy::error::Result<i32> {
    let root = parser::parse_file(module_name, config)?;

    if config.debug & (DEBUG_AST_STOP | DEBUG_AST_EXEC) != 0 {
        let mut stdout = io::stdout();
        ast::dump(&root, &mut stdout);
        if config.debug & DEBUG_AST_STOP != 0 {
            return Ok(0);
        }
    }

    check::check_program(&root)?;

    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut stdout = io::stdout();
    Interpreter::new(&mut stdin, &mut stdout).run(&root)
}

fn main() {
    let mut args = env::args();
    let executable = args
        .next()
        .as_deref()
        .map(|path| {
            Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string())
        })
        .unwrap_or_else(|| LANGUAGE.to_string());

    let mut config = Config::default();
    let mut modules: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix('-') else {
            modules.push(arg);
            modules.extend(args);
            break;
        };
        let mut flag_chars = flag.chars();
        match flag_chars.next() {
            Some('h') => {
                usage(&executable, &mut io::stdout());
                process::exit(0);
            }
            Some('v') => {
                println!("{LANGUAGE} version {VERSION}");
                process::exit(0);
            }
            Some('t') => {
                let rest = flag_chars.as_str();
                match rest.parse::<usize>() {
                    Ok(tabsize) if tabsize >= 1 => config.tabsize = tabsize,
                    Ok(tabsize) => {
                        eprintln!("{executable}: invalid tabsize {tabsize}");
                        config.tabsize = DEFAULT_TABSIZE;
                    }
                    Err(_) => config.tabsize = DEFAULT_TABSIZE,
                }
            }
            Some('d') => {
                let rest = flag_chars.as_str();
                config.debug = rest.parse::<u32>().unwrap_or(DEBUG_AST_EXEC);
            }
            other => {
                eprintln!(
                    "{executable}: unknown option -{}",
                    other.map(String::from).unwrap_or_default()
                );
                usage(&executable, &mut io::stderr());
                process::exit(0);
            }
        }
    }

    if modules.is_empty() {
        eprintln!("{executable}: module name missing");
        usage(&executable, &mut io::stderr());
        process::exit(0);
    }
    if modules.len() > 1 {
        eprintln!("{executable}: too many modules");
        usage(&executable, &mut io::stderr());
        process::exit(0);
    }

    match run(&modules[0], &config) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("{error}");
            process::exit(error.exit_code());
        }
    }
}
