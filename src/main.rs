use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    std::process::exit(turnforge::cli::run_with_args(&args));
}
