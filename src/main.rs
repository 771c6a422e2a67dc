mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "payslab", version, about = "Salary breakdown and income tax across tax regimes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Break down a salary and compare take-home pay across regimes
    Calculate(cmd::calculate::CalculateCommand),
    /// Validate and display the rule set for a fiscal year
    Rules(cmd::rules::RulesCommand),
    /// Print the JSON schema of an input or rule set file
    Schema(cmd::schema::SchemaCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Calculate(command) => command.exec().await,
        Command::Rules(command) => command.exec().await,
        Command::Schema(command) => command.exec(),
    }
}
