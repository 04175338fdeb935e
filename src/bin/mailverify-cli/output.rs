use std::fmt::Write as _;

use anyhow::{Context, Result, bail};

use crate::args::Cli;
use mailverify_lib::{Reachability, SmtpEvent, SmtpProbeReport, VerificationResult, VerifyError};

#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
pub struct OutputRow {
    #[cfg_attr(feature = "with-serde", serde(flatten))]
    pub result: VerificationResult,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
}

impl OutputRow {
    pub fn from_outcome(outcome: Result<VerificationResult, VerifyError>) -> Self {
        match outcome {
            Ok(result) => Self {
                result,
                error: None,
            },
            Err(err) => {
                let error = Some(format!("{}: {err}", err.code()));
                Self {
                    result: err.into_result(),
                    error,
                }
            }
        }
    }
}

pub fn write_reports(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    match cli.format.as_str() {
        "human" => write_human(rows, cli),
        "json" => write_json(rows, cli),
        "ndjson" => write_ndjson(rows, cli),
        "csv" => write_csv(rows, cli),
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    }
}

pub fn any_unreachable(rows: &[OutputRow]) -> bool {
    rows.iter()
        .any(|row| row.result.reachable == Reachability::No)
}

fn write_human(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let text = render_human(rows, cli.transcript)?;
    match &cli.out {
        Some(path) => write_all_atomically(path, text.as_bytes()),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn render_human(rows: &[OutputRow], transcript: bool) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        let result = &row.result;
        let tag = match result.reachable {
            Reachability::Yes => "[YES]    ",
            Reachability::No => "[NO]     ",
            Reachability::Unknown => "[UNKNOWN]",
        };
        if result.syntax.valid {
            writeln!(out, "{tag} {}", result.email)?;
        } else {
            writeln!(out, "{tag} {} :: {}", result.email, result.syntax.reasons.join("; "))?;
            continue;
        }

        writeln!(out, "        flags: {}", format_flags(result))?;
        writeln!(
            out,
            "        smtp: host_exists={} deliverable={} catch_all={} full_inbox={} disabled={}",
            result.smtp.host_exists,
            result.smtp.deliverable,
            result.smtp.catch_all,
            result.smtp.full_inbox,
            result.smtp.disabled,
        )?;
        if let Some(suggestion) = &result.suggestion {
            writeln!(out, "        did you mean: {}@{suggestion}", result.syntax.username)?;
        }
        if let Some(gravatar) = result.gravatar {
            writeln!(out, "        gravatar: {gravatar}")?;
        }
        if let Some(error) = &row.error {
            writeln!(out, "        error: {error}")?;
        }
        if let Some(probe) = &result.probe {
            writeln!(
                out,
                "        probe: {} (confidence {:.2})",
                probe.conclusion, probe.confidence
            )?;
            if transcript {
                write_transcript(&mut out, probe)?;
            }
        }
    }
    Ok(out)
}

fn format_flags(result: &VerificationResult) -> String {
    let mut parts = vec![format!("mx={}", result.has_mx_records)];
    if result.disposable {
        parts.push("disposable".to_string());
    }
    if result.free {
        parts.push("free".to_string());
    }
    if result.role_account {
        parts.push("role".to_string());
    }
    parts.join(", ")
}

fn write_transcript(out: &mut String, probe: &SmtpProbeReport) -> std::fmt::Result {
    for attempt in &probe.attempts {
        let verdict = match attempt.catch_all {
            Some(true) => " catch-all",
            _ => "",
        };
        writeln!(
            out,
            "          {} -> {} ({:?}){verdict}",
            attempt.host, attempt.outcome, attempt.reached
        )?;
        for event in &attempt.events {
            match event {
                SmtpEvent::Sent { command, .. } => writeln!(out, "            > {command}")?,
                SmtpEvent::Received { reply, .. } => writeln!(out, "            < {reply}")?,
                SmtpEvent::Error { stage, message } => {
                    writeln!(out, "            ! {stage:?}: {message}")?
                }
            }
        }
    }
    Ok(())
}

#[cfg(feature = "with-serde")]
fn write_json(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    let s = serde_json::to_string_pretty(rows)?;
    if let Some(path) = &cli.out {
        write_all_atomically(path, s.as_bytes())?;
    } else {
        println!("{s}");
    }
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_: &[OutputRow], _: &Cli) -> Result<()> {
    bail!("format=json nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-serde")]
fn write_ndjson(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.out {
        let mut buf = Vec::new();
        for row in rows {
            let line = serde_json::to_string(row)?;
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        write_all_atomically(path, &buf)?;
    } else {
        for row in rows {
            println!("{}", serde_json::to_string(row)?);
        }
    }
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_ndjson(_: &[OutputRow], _: &Cli) -> Result<()> {
    bail!("format=ndjson nécessite la feature 'with-serde'")
}

#[cfg(feature = "with-csv")]
const CSV_HEADER: [&str; 13] = [
    "email",
    "reachable",
    "valid",
    "username",
    "domain",
    "has_mx_records",
    "host_exists",
    "deliverable",
    "catch_all",
    "full_inbox",
    "disabled",
    "flags",
    "suggestion",
];

#[cfg(feature = "with-csv")]
fn write_csv(rows: &[OutputRow], cli: &Cli) -> Result<()> {
    if let Some(path) = &cli.out {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(CSV_HEADER)?;
        for row in rows {
            wtr.write_record(csv_record(row))?;
        }
        let data = wtr.into_inner()?;
        write_all_atomically(path, &data)?;
    } else {
        let mut wtr = csv::Writer::from_writer(std::io::stdout());
        wtr.write_record(CSV_HEADER)?;
        for row in rows {
            wtr.write_record(csv_record(row))?;
        }
        wtr.flush()?;
    }
    Ok(())
}

#[cfg(not(feature = "with-csv"))]
fn write_csv(_: &[OutputRow], _: &Cli) -> Result<()> {
    bail!("format=csv nécessite la feature 'with-csv'")
}

#[cfg(feature = "with-csv")]
fn csv_record(row: &OutputRow) -> Vec<String> {
    let result = &row.result;
    let mut flags = Vec::new();
    if result.disposable {
        flags.push("disposable");
    }
    if result.free {
        flags.push("free");
    }
    if result.role_account {
        flags.push("role");
    }

    vec![
        result.email.clone(),
        result.reachable.to_string(),
        result.syntax.valid.to_string(),
        result.syntax.username.clone(),
        result.syntax.domain.clone(),
        result.has_mx_records.to_string(),
        result.smtp.host_exists.to_string(),
        result.smtp.deliverable.to_string(),
        result.smtp.catch_all.to_string(),
        result.smtp.full_inbox.to_string(),
        result.smtp.disabled.to_string(),
        flags.join("|"),
        result.suggestion.clone().unwrap_or_default(),
    ]
}

fn write_all_atomically(path: &str, bytes: &[u8]) -> Result<()> {
    use std::io::Write as _;

    let tmp = format!("{path}.tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).with_context(|| format!("rename {tmp} -> {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mailverify_lib::{ValidationMode, parse_email};

    fn rows() -> Vec<OutputRow> {
        let syntax = parse_email("not-an-email", ValidationMode::Strict);
        vec![OutputRow {
            result: VerificationResult::rejected("not-an-email", syntax),
            error: None,
        }]
    }

    #[test]
    fn human_report_honours_out() {
        let path = std::env::temp_dir().join(format!("mailverify-human-{}.txt", std::process::id()));
        let path_str = path.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["mailverify-cli", "--out", path_str.as_str(), "verify", "not-an-email"])
            .expect("parse");

        write_reports(&rows(), &cli).expect("write");
        let written = std::fs::read_to_string(&path).expect("report file");
        std::fs::remove_file(&path).ok();

        assert!(written.starts_with("[NO]      not-an-email :: "));
        assert!(written.ends_with('\n'));
    }
}
