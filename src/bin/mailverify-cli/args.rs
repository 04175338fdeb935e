use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use mailverify_lib::{ValidationMode, VerifierConfig};

#[derive(Parser)]
#[command(name = "mailverify-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// lit des adresses depuis stdin (une par ligne)
    #[arg(long)]
    pub stdin: bool,

    /// write report to file (format selon --format)
    #[arg(long)]
    pub out: Option<String>,

    /// format: human|json|ndjson|csv
    #[arg(long, default_value = "human")]
    pub format: String,

    /// fichier de configuration TOML (feature `with-serde`)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// mode: strict|relaxed
    #[arg(long)]
    pub mode: Option<String>,

    /// désactive la sonde SMTP (syntaxe, classement et MX seulement)
    #[arg(long)]
    pub no_smtp: bool,

    /// interroge Gravatar (feature `with-gravatar`)
    #[arg(long)]
    pub gravatar: bool,

    /// délai global par adresse (ms)
    #[arg(long = "timeout")]
    pub timeout_ms: Option<u64>,

    /// nom utilisé pour EHLO/HELO
    #[arg(long)]
    pub helo: Option<String>,

    /// enveloppe MAIL FROM (par défaut postmaster@<helo>)
    #[arg(long = "from")]
    pub mail_from: Option<String>,

    /// nombre maximum d'MX interrogés
    #[arg(long = "max-mx")]
    pub max_mx: Option<usize>,

    /// port SMTP
    #[arg(long)]
    pub port: Option<u16>,

    /// n'essaie pas STARTTLS même s'il est proposé
    #[arg(long)]
    pub no_starttls: bool,

    /// détecte le catch-all dans la même session plutôt qu'en parallèle
    #[arg(long)]
    pub sequential_catch_all: bool,

    /// répertoire contenant disposable.txt, free.txt et roles.txt
    #[arg(long = "tables")]
    pub tables_dir: Option<PathBuf>,

    /// vérifications simultanées en mode --stdin
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// affiche la transcription SMTP en sortie human
    #[arg(long)]
    pub transcript: bool,

    /// -v debug, -vv trace (RUST_LOG prend le pas)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    Verify {
        /// adresse e-mail à vérifier
        email: String,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    /// File config (or defaults) with command-line overrides applied on top.
    pub fn load_config(&self) -> Result<VerifierConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => VerifierConfig::default(),
        };

        if let Some(mode) = self.mode.as_deref() {
            config.validation_mode = mode_from_str(mode)?;
        }
        if self.no_smtp {
            config.smtp_enabled = false;
        }
        if self.gravatar {
            config.gravatar_enabled = true;
        }
        if let Some(timeout) = self.timeout_ms {
            config.deadline_ms = timeout;
        }
        if let Some(helo) = &self.helo {
            config.smtp.helo_domain = helo.clone();
        }
        if let Some(from) = &self.mail_from {
            config.smtp.mail_from = from.clone();
        }
        if let Some(max_mx) = self.max_mx {
            config.smtp.max_hosts = max_mx;
        }
        if let Some(port) = self.port {
            config.smtp.port = port;
        }
        if self.no_starttls {
            config.smtp.opportunistic_tls = false;
        }
        if self.sequential_catch_all {
            config.smtp.parallel_catch_all = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

pub fn mode_from_str(s: &str) -> Result<ValidationMode> {
    match s {
        "strict" => Ok(ValidationMode::Strict),
        "relaxed" => Ok(ValidationMode::Relaxed),
        other => bail!("unknown --mode '{other}', use: strict|relaxed"),
    }
}

#[cfg(feature = "with-serde")]
fn read_config(path: &std::path::Path) -> Result<VerifierConfig> {
    VerifierConfig::from_toml_file(path).with_context(|| format!("load {}", path.display()))
}

#[cfg(not(feature = "with-serde"))]
fn read_config(_path: &std::path::Path) -> Result<VerifierConfig> {
    bail!("--config nécessite la feature 'with-serde'")
}
