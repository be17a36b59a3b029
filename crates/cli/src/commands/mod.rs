pub mod check;
pub mod once;
pub mod run;
pub mod state;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Poll continuously until interrupted
    Run(run::RunArgs),
    /// Run a single poll cycle and exit
    Once(once::OnceArgs),
    /// Show the recorded order states
    State(state::StateArgs),
    /// Validate configuration and print it with secrets hidden
    Check(check::CheckArgs),
}
