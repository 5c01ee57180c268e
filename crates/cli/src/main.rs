use clap::Parser;

fn main() -> anyhow::Result<()> {
    splitledger_observability::init();

    let cli = splitledger_cli::Cli::parse();
    let stdout = std::io::stdout();
    splitledger_cli::run(cli, &mut stdout.lock())
}
