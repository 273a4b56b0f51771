use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use milanc::{CompileOptions, CompileResult, Compiler, Error, Machine, Program, VmOptions};

const USAGE: &str = "\
usage: milanc [--json] [--config FILE] <source>
       milanc run [--config FILE] <source>
       milanc exec [--config FILE] <listing>";

/// Settings file layout for `--config`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    compile: CompileOptions,
    vm: VmOptions,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    /// Print the listing (or JSON) of a source file
    Compile,
    /// Compile and execute a source file
    Run,
    /// Execute a stored listing
    Exec,
}

#[derive(Debug)]
struct Args {
    mode: Mode,
    json: bool,
    config: Option<String>,
    path: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut mode = Mode::Compile;
    let mut json = false;
    let mut config = None;
    let mut path = None;
    let mut first = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "run" if first => mode = Mode::Run,
            "exec" if first => mode = Mode::Exec,
            "--json" => json = true,
            "--config" => {
                config = Some(args.next().context("--config requires a file name")?);
            }
            "-h" | "--help" => bail!("{}", USAGE),
            other if other.starts_with("--") => bail!("unknown option '{}'\n{}", other, USAGE),
            _ if path.is_none() => path = Some(arg),
            _ => bail!("unexpected argument '{}'\n{}", arg, USAGE),
        }
        first = false;
    }

    if json && mode != Mode::Compile {
        bail!("--json only applies when compiling\n{}", USAGE);
    }

    Ok(Args {
        mode,
        json,
        config,
        path: path.context(USAGE)?,
    })
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("cannot read config '{}'", path))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config '{}'", path))
}

fn compile_file(path: &str, options: &CompileOptions) -> Result<CompileResult> {
    let source =
        fs::read_to_string(path).with_context(|| format!("cannot read source '{}'", path))?;

    match Compiler::new(options.clone()).compile(&source) {
        Ok(result) => Ok(result),
        Err(Error::TranslationFailed { count, diagnostics }) => {
            for diagnostic in &diagnostics {
                eprintln!("{}: {}", path, diagnostic);
            }
            if count > diagnostics.len() {
                eprintln!("{}: {} more error(s) not shown", path, count - diagnostics.len());
            }
            bail!("{} error(s), no program emitted", count)
        }
        Err(other) => Err(other.into()),
    }
}

fn execute(program: Program, options: VmOptions) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut machine = Machine::new(program, options);
    machine.run(&mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(args.config.as_deref())?;

    match args.mode {
        Mode::Compile => {
            let result = compile_file(&args.path, &config.compile)?;
            let mut stdout = io::stdout().lock();
            if args.json {
                serde_json::to_writer_pretty(&mut stdout, &result)?;
                writeln!(stdout)?;
            } else {
                write!(stdout, "{}", result.listing)?;
            }
        }
        Mode::Run => {
            let result = compile_file(&args.path, &config.compile)?;
            execute(result.program, config.vm)?;
        }
        Mode::Exec => {
            let text = fs::read_to_string(&args.path)
                .with_context(|| format!("cannot read listing '{}'", args.path))?;
            let program: Program = text.parse()?;
            execute(program, config.vm)?;
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("milanc: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["prog.mil"]).unwrap();
        assert_eq!(parsed.mode, Mode::Compile);
        assert!(!parsed.json);

        let parsed = args(&["run", "--config", "vm.json", "prog.mil"]).unwrap();
        assert_eq!(parsed.mode, Mode::Run);
        assert_eq!(parsed.config.as_deref(), Some("vm.json"));
        assert_eq!(parsed.path, "prog.mil");

        assert_eq!(args(&["exec", "out.lst"]).unwrap().mode, Mode::Exec);
        assert!(args(&["--json", "prog.mil"]).unwrap().json);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["a", "b"]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["run", "--json", "a"]).is_err());
        assert!(args(&["--fast", "a"]).is_err());
    }

    #[test]
    fn test_config_sections_default() {
        let config: Config = serde_json::from_str(r#"{"vm": {"max_steps": 10}}"#).unwrap();
        assert_eq!(config.vm.max_steps, 10);
        assert_eq!(config.vm.memory_size, VmOptions::default().memory_size);
        assert_eq!(config.compile, CompileOptions::default());
    }
}
