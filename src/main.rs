use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use storesim::{start, RunConfig, SimError};

const PROMPTS: [&str; 3] = [
    "Enter number of assistants: ",
    "Enter the number of ticks in the run: ",
    "Enter tick time size (in ms): ",
];

/// Take the three run values from the command line, or ask for them
fn collect_inputs() -> io::Result<Vec<String>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() == PROMPTS.len() {
        return Ok(args);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut inputs = Vec::with_capacity(PROMPTS.len());
    for prompt in PROMPTS {
        print!("{}", prompt);
        io::stdout().flush()?;
        let line = lines
            .next()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input ended early")))?;
        inputs.push(line);
    }
    Ok(inputs)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let inputs = match collect_inputs() {
        Ok(inputs) => inputs,
        Err(err) => {
            eprintln!("Could not read run parameters: {}", err);
            return ExitCode::from(2);
        }
    };

    let config = match RunConfig::from_inputs(&inputs[0], &inputs[1], &inputs[2]) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", SimError::from(err));
            return ExitCode::from(2);
        }
    };

    match start(config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
