//! Gallery maintenance commands.

use super::open_gallery;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use vitalwatch::EnrolledIdentity;
use vitalwatch::config::VitalwatchConfig;

/// Where the encoding of a new identity comes from.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct EncodingArgs {
    /// Comma-separated encoding values.
    #[arg(long, allow_hyphen_values = true)]
    encoding: Option<String>,

    /// JSON file holding an array of numbers.
    #[arg(long)]
    encoding_file: Option<PathBuf>,
}

impl EncodingArgs {
    fn read(&self) -> anyhow::Result<Vec<f64>> {
        if let Some(path) = &self.encoding_file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of numbers", path.display()));
        }
        let csv = self.encoding.as_deref().unwrap_or_default();
        parse_csv(csv)
    }
}

fn parse_csv(csv: &str) -> anyhow::Result<Vec<f64>> {
    csv.split(',')
        .enumerate()
        .map(|(i, value)| {
            value
                .trim()
                .parse::<f64>()
                .with_context(|| format!("encoding value {} ('{}') is not a number", i + 1, value.trim()))
        })
        .collect()
}

/// Output format for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Aligned columns.
    Table,
    /// JSON array.
    Json,
}

#[derive(Serialize)]
struct ListedIdentity<'a> {
    name: &'a str,
    contact: Option<&'a str>,
    dimensions: usize,
    enrolled_at: Option<DateTime<Utc>>,
}

/// Enroll command.
pub fn cmd_enroll(
    config: &VitalwatchConfig,
    name: String,
    contact: Option<String>,
    encoding: EncodingArgs,
) -> anyhow::Result<()> {
    let values = encoding.read()?;
    let gallery = open_gallery(config)?;
    let replacing = gallery.lookup(&name).is_some();

    let identity = EnrolledIdentity::new(name, values, contact).with_enrolled_at(Utc::now());
    let has_contact = identity.contact().is_some();
    let name = identity.name.clone();
    gallery.enroll(identity)?;
    gallery.close()?;

    println!(
        "{} '{name}'{}",
        if replacing { "Replaced" } else { "Enrolled" },
        if has_contact { "" } else { " (no emergency contact: alerts will not be sent)" }
    );
    Ok(())
}

/// Remove command.
pub fn cmd_remove(config: &VitalwatchConfig, name: &str) -> anyhow::Result<()> {
    let gallery = open_gallery(config)?;
    let removed = gallery.remove(name)?;
    gallery.close()?;
    if !removed {
        anyhow::bail!("no identity named '{name}' is enrolled");
    }
    println!("Removed '{name}'");
    Ok(())
}

/// List command.
pub fn cmd_list(config: &VitalwatchConfig, format: ListFormat) -> anyhow::Result<()> {
    let gallery = open_gallery(config)?;
    let identities = gallery.identities();
    let listed: Vec<ListedIdentity<'_>> = identities
        .iter()
        .map(|identity| ListedIdentity {
            name: &identity.name,
            contact: identity.contact(),
            dimensions: identity.encoding.dimensions(),
            enrolled_at: identity.enrolled_at,
        })
        .collect();

    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&listed)?),
        ListFormat::Table => {
            if listed.is_empty() {
                println!("No identities enrolled.");
            } else {
                let width = listed.iter().map(|i| i.name.len()).max().unwrap_or(4).max(4);
                println!("{:<width$}  {:<16}  {:>4}  ENROLLED", "NAME", "CONTACT", "DIMS");
                for identity in &listed {
                    println!(
                        "{:<width$}  {:<16}  {:>4}  {}",
                        identity.name,
                        identity.contact.unwrap_or("-"),
                        identity.dimensions,
                        identity
                            .enrolled_at
                            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339()),
                    );
                }
            }
        },
    }

    drop(identities);
    gallery.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        assert_eq!(parse_csv("0.5, -1,2e-3").unwrap(), vec![0.5, -1.0, 0.002]);
        let err = parse_csv("0.5,x").unwrap_err();
        assert!(err.to_string().contains("encoding value 2"));
    }
}
