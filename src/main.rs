use std::io::Read;
use std::process::ExitCode;

use decafc::errors::CompileError;
use decafc::{compile, Options};

const USAGE: &str = "usage: decafc [-d tac] [-k registers] [file]";

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(Options, Option<String>), String> {
	let mut options = Options::default();
	let mut path = None;
	while let Some(arg) = args.next() {
		match arg.as_str() {
			"-d" => match args.next().as_deref() {
				Some("tac") => options.debug_tac = true,
				Some(other) => log::warn!("unknown debug key '{other}'"),
				None => return Err(USAGE.to_string()),
			},
			"-k" => {
				let count = args.next().ok_or_else(|| USAGE.to_string())?;
				options.registers = count
					.parse()
					.map_err(|_| format!("invalid register count '{count}'"))?;
			}
			"-h" | "--help" => return Err(USAGE.to_string()),
			_ if path.is_none() => path = Some(arg),
			_ => return Err(USAGE.to_string()),
		}
	}
	Ok((options, path))
}

fn main() -> ExitCode {
	env_logger::init();
	let (options, path) = match parse_args(std::env::args().skip(1)) {
		Ok(parsed) => parsed,
		Err(message) => {
			eprintln!("{message}");
			return ExitCode::FAILURE;
		}
	};
	let source = match &path {
		Some(path) => std::fs::read_to_string(path),
		None => {
			let mut source = String::new();
			std::io::stdin().read_to_string(&mut source).map(|_| source)
		}
	};
	let source = match source {
		Ok(source) => source,
		Err(error) => {
			eprintln!("{}: {error}", path.as_deref().unwrap_or("<stdin>"));
			return ExitCode::FAILURE;
		}
	};
	log::debug!("compiling with {options:?}");

	match compile(&source, &options) {
		Ok(output) => {
			print!("{output}");
			ExitCode::SUCCESS
		}
		Err(CompileError::Semantic(diagnostics)) => {
			for diagnostic in &diagnostics {
				eprintln!("\n{diagnostic}\n");
			}
			eprintln!("{}", CompileError::Semantic(diagnostics));
			ExitCode::FAILURE
		}
		Err(error) => {
			eprintln!("{error}");
			ExitCode::FAILURE
		}
	}
}
