//! fOS Audit - command-line driver
//!
//! Usage: fos-audit <FILE> [--url <PAGE_URL>] [--config <FILE>] [--pretty] [--report]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fos_audit::{AuditConfig, AuditRunner, CspAnalyzer, PageSnapshot};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: fos-audit <FILE> [--url <PAGE_URL>] [--config <FILE>] [--pretty] [--report]";

#[derive(Debug, Default)]
struct Args {
    input: PathBuf,
    url: Option<String>,
    config: Option<PathBuf>,
    pretty: bool,
    report: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut input = None;
        let mut parsed = Args::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--url" => parsed.url = Some(args.next().context("--url needs a value")?),
                "--config" => parsed.config = Some(args.next().context("--config needs a value")?.into()),
                "--pretty" => parsed.pretty = true,
                "--report" => parsed.report = true,
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
                _ if input.is_none() => input = Some(PathBuf::from(&arg)),
                _ => bail!("unexpected argument {}\n{}", arg, USAGE),
            }
        }

        parsed.input = input.context(USAGE)?;
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            AuditConfig::from_json(&json).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => AuditConfig::default(),
    };

    let snapshot = load_snapshot(&args.input, args.url.as_deref())?;

    let json = if args.report {
        let report = AuditRunner::with_csp(config).run(&snapshot);
        to_json(&report, args.pretty)?
    } else {
        let result = CspAnalyzer::new(config)
            .analyze(&snapshot)
            .with_context(|| format!("failed to analyze {}", args.input.display()))?;
        to_json(&result, args.pretty)?
    };

    println!("{}", json);
    Ok(())
}

fn load_snapshot(path: &Path, url: Option<&str>) -> Result<PageSnapshot> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));

    if is_html {
        let url = url.unwrap_or("about:blank");
        PageSnapshot::from_html(&text, url)
            .with_context(|| format!("failed to read {} as page {} (pass --url)", path.display(), url))
    } else {
        let mut snapshot = PageSnapshot::from_json(&text)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        if let Some(url) = url {
            snapshot.page_url = url.to_string();
        }
        Ok(snapshot)
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        Args::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_args() {
        let parsed = args(&["page.html", "--url", "https://example.com/", "--pretty"]).unwrap();
        assert_eq!(parsed.input, PathBuf::from("page.html"));
        assert_eq!(parsed.url.as_deref(), Some("https://example.com/"));
        assert!(parsed.pretty);
        assert!(!parsed.report);
    }

    #[test]
    fn test_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
        assert!(args(&["a.json", "--url"]).is_err());
        assert!(args(&["a.json", "--verbose"]).is_err());
    }
}
