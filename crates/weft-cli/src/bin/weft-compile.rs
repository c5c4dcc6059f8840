//! Source-emitting compiler: prints the JavaScript renderer for a template
//! on stdout. Diagnostics go to stderr.

use std::{env, path::PathBuf, process::ExitCode};

use weft::{Compiler, Options, PassKind};

fn usage(binary: &str) {
    eprintln!("USAGE: {binary} [options] <template>");
    eprintln!("OPTIONS:");
    eprintln!("  --enable-pass=<pass>                       Enable pass (all are enabled by default)");
    eprintln!("  --disable-pass=<pass>                      Disable pass");
    eprintln!("  --list-passes                              Lists all passes");
    eprintln!("  --template-basepath | -t                   Template basepath");
    eprintln!("  --enable-undefined-check                   Checks whether a value is undefined and replaces it with an empty string");
    eprintln!("  --help | -h                                Display this message");
}

fn list_passes() {
    eprintln!("Available passes:");
    for pass in PassKind::ALL {
        eprintln!("  {pass}");
    }
}

fn toggle_pass(binary: &str, enabled: &mut Vec<PassKind>, name: &str, enable: bool) -> Result<(), ExitCode> {
    let Ok(pass) = name.parse::<PassKind>() else {
        eprintln!("{binary}: unknown pass '{name}'");
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
    Ok(())
}

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();
    let binary = argv.first().map_or("weft-compile", String::as_str).to_owned();
    let args = &argv[1..];

    let mut enabled = PassKind::ALL.to_vec();
    let mut basepath: Option<PathBuf> = None;
    let mut undefined_check = false;
    let mut template: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        i += 1;

        // Pass toggles accept both '--enable-pass=<n>' and '--enable-pass <n>'.
        let (toggle, inline_name) = if let Some(name) = arg.strip_prefix("--enable-pass=") {
            (Some(true), Some(name.to_owned()))
        } else if let Some(name) = arg.strip_prefix("--disable-pass=") {
            (Some(false), Some(name.to_owned()))
        } else if arg == "--enable-pass" {
            (Some(true), None)
        } else if arg == "--disable-pass" {
            (Some(false), None)
        } else {
            (None, None)
        };

        if let Some(enable) = toggle {
            let name = match inline_name {
                Some(name) => name,
                None => match args.get(i) {
                    Some(name) => {
                        i += 1;
                        name.clone()
                    }
                    None => {
                        eprintln!("{binary}: '{arg}' requires an argument");
                        return ExitCode::FAILURE;
                    }
                },
            };
            if let Err(code) = toggle_pass(&binary, &mut enabled, &name, enable) {
                return code;
            }
            continue;
        }

        match arg {
            "--list-passes" => {
                list_passes();
                return ExitCode::SUCCESS;
            }
            "--enable-undefined-check" => undefined_check = true,
            "--template-basepath" | "-t" => match args.get(i) {
                Some(path) => {
                    basepath = Some(PathBuf::from(path));
                    i += 1;
                }
                None => {
                    eprintln!("{binary}: '{arg}' requires an argument");
                    return ExitCode::FAILURE;
                }
            },
            "--help" | "-h" => {
                usage(&binary);
                return ExitCode::SUCCESS;
            }
            flag if flag.starts_with('-') => {
                eprintln!("{binary}: unknown option '{flag}'");
                usage(&binary);
                return ExitCode::FAILURE;
            }
            path => {
                if template.replace(PathBuf::from(path)).is_some() {
                    usage(&binary);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    let Some(template) = template else {
        usage(&binary);
        return ExitCode::FAILURE;
    };

    let basepath = basepath.unwrap_or_else(|| {
        template
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    });

    let compiler = Compiler::new(Options {
        base_path: basepath,
        passes: enabled,
        undefined_check,
    });
    let emitted = compiler.compile_file(&template).and_then(|t| t.to_javascript());
    match emitted {
        Ok(source) => {
            print!("{source}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
