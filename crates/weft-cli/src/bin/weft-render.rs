//! Native-render driver: compiles a template with the native backend and
//! renders it against a JSON data file.

use std::{env, fs, path::PathBuf, process::ExitCode};

use weft::{Compiler, DataBindings, Object, Options};

fn usage(binary: &str) {
    eprintln!("USAGE: {binary} [options] <template>");
    eprintln!("OPTIONS:");
    eprintln!("  --template-basepath | -t <path>            Template basepath");
    eprintln!("  --data | -d <file.json>                    JSON object with the template's variables");
    eprintln!("  --help | -h                                Display this message");
}

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().collect();
    let binary = argv.first().map_or("weft-render", String::as_str).to_owned();
    let args = &argv[1..];

    let mut basepath: Option<PathBuf> = None;
    let mut data_path: Option<PathBuf> = None;
    let mut template: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        i += 1;
        match arg {
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
            "--data" | "-d" => match args.get(i) {
                Some(path) => {
                    data_path = Some(PathBuf::from(path));
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

    // JSON object order is preserved into the data map, so loop output
    // follows the file.
    let data = match &data_path {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    eprintln!("{binary}: couldn't read '{}': {err}", path.display());
                    return ExitCode::FAILURE;
                }
            };
            match serde_json::from_str::<Object>(&text) {
                Ok(Object::Map(map)) => map,
                Ok(other) => {
                    eprintln!("{binary}: '{}' must hold a JSON object, not {}", path.display(), other.type_name());
                    return ExitCode::FAILURE;
                }
                Err(err) => {
                    eprintln!("{binary}: invalid JSON in '{}': {err}", path.display());
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Default::default(),
    };

    let basepath = basepath.unwrap_or_else(|| {
        template
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    });

    let compiler = Compiler::new(Options::all_passes(basepath));
    let compiled = compiler
        .compile_file(&template)
        .and_then(|t| t.compile_native::<DataBindings>());
    let compiled = match compiled {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut bindings = DataBindings::new(data);
    match compiled.render(&mut bindings) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
