//! AST dumper: parses a template, runs the configured passes and prints
//! the deterministic dump of the resulting tree.

use std::{env, path::PathBuf, process::ExitCode};

use weft::{Compiler, Options, PassKind};

fn usage(binary: &str) {
    eprintln!("USAGE: {binary} [options] <template>");
    eprintln!("OPTIONS:");
    eprintln!("  --enable-all-passes                        Enable all passes [default]");
    eprintln!("  --disable-all-passes                       Disable all passes");
    for pass in PassKind::ALL {
        eprintln!("  --enable-{pass}");
        eprintln!("  --disable-{pass}");
    }
    eprintln!("  --template-basepath | -t                   Template basepath");
    eprintln!("  --help | -h                                Display this message");
}

struct Args {
    enabled: Vec<PassKind>,
    basepath: Option<PathBuf>,
    template: PathBuf,
}

fn parse_args(binary: &str, args: &[String]) -> Result<Args, ExitCode> {
    let mut enabled = PassKind::ALL.to_vec();
    let mut basepath = None;
    let mut template = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--enable-all-passes" => enabled = PassKind::ALL.to_vec(),
            "--disable-all-passes" => enabled.clear(),
            "--template-basepath" | "-t" => match iter.next() {
                Some(path) => basepath = Some(PathBuf::from(path)),
                None => {
                    eprintln!("{binary}: '{arg}' requires an argument");
                    return Err(ExitCode::FAILURE);
                }
            },
            "--help" | "-h" => {
                usage(binary);
                return Err(ExitCode::SUCCESS);
            }
            flag if flag.starts_with("--enable-") || flag.starts_with("--disable-") => {
                let enable = flag.starts_with("--enable-");
                let name = flag.trim_start_matches(if enable { "--enable-" } else { "--disable-" });
                let Ok(pass) = name.parse::<PassKind>() else {
                    eprintln!("{binary}: unknown pass '{name}'");
                    usage(binary);
                    return Err(ExitCode::FAILURE);
                };
                if enable {
                    if !enabled.contains(&pass) {
                        enabled.push(pass);
                        enabled.sort_by_key(|p| PassKind::ALL.iter().position(|a| a == p));
                    }
                } else {
                    enabled.retain(|p| *p != pass);
                }
            }
            flag if flag.starts_with('-') => {
                eprintln!("{binary}: unknown option '{flag}'");
                usage(binary);
                return Err(ExitCode::FAILURE);
            }
            path => {
                if template.replace(PathBuf::from(path)).is_some() {
                    usage(binary);
                    return Err(ExitCode::FAILURE);
                }
            }
        }
    }

    let Some(template) = template else {
        usage(binary);
        return Err(ExitCode::FAILURE);
    };
    Ok(Args {
        enabled,
        basepath,
        template,
    })
}

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();
    let binary = argv.first().map_or("weft-ast", String::as_str);
    let args = match parse_args(binary, &argv[1..]) {
        Ok(args) => args,
        Err(code) => return code,
    };

    // Without an explicit basepath, includes resolve relative to the
    // template's own directory.
    let basepath = args.basepath.unwrap_or_else(|| {
        args.template
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    });

    let compiler = Compiler::new(Options {
        base_path: basepath,
        passes: args.enabled,
        undefined_check: false,
    });
    match compiler.compile_file(&args.template) {
        Ok(template) => {
            print!("{}", template.dump());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
