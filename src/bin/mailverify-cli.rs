#[path = "mailverify-cli/args.rs"]
mod args;
#[path = "mailverify-cli/output.rs"]
mod output;

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use mailverify_lib::{ClassifierTables, Classifiers, Verifier};
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands};
use output::OutputRow;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "warn,mailverify_lib=debug",
        _ => "warn,mailverify_lib=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_inputs(cli: &Cli) -> Result<Option<Vec<String>>> {
    if cli.stdin {
        let mut emails = Vec::new();
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            if !line.trim().is_empty() {
                emails.push(line);
            }
        }
        return Ok(Some(emails));
    }
    Ok(match &cli.cmd {
        Some(Commands::Verify { email }) => Some(vec![email.clone()]),
        None => None,
    })
}

async fn verify_all(verifier: &Verifier, emails: Vec<String>, concurrency: usize) -> Vec<OutputRow> {
    stream::iter(emails)
        .map(|email| {
            let verifier = verifier.clone();
            async move { OutputRow::from_outcome(verifier.verify(&email).await) }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(emails) = read_inputs(&cli)? else {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(());
    };

    let config = cli.load_config()?;
    let mut builder = Verifier::builder(config);
    if let Some(dir) = &cli.tables_dir {
        let tables = ClassifierTables::load_from_dir(dir)
            .with_context(|| format!("load tables from {}", dir.display()))?;
        builder = builder.classifiers(Arc::new(Classifiers::new(Arc::new(tables))));
    }
    let verifier = builder.build().context("cannot build verifier")?;

    let rows = verify_all(&verifier, emails, cli.concurrency).await;
    output::write_reports(&rows, &cli)?;

    // codes de sortie : 0 OK, 2 au moins une adresse `no`, 1 fatal
    if output::any_unreachable(&rows) {
        std::process::exit(2);
    }
    Ok(())
}
