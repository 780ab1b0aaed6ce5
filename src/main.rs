//! Mudanza CLI — Chef-to-Ansible cookbook migration.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "mudanza",
    version,
    about = "Convert Chef cookbooks to Ansible playbooks — recipes, attributes, ERB templates"
)]
struct Cli {
    #[command(subcommand)]
    command: mudanza::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = mudanza::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
