//! Command-line arguments.

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;

pub const USAGE: &str = "usage: bookwise-batch <catalog.json> [--date YYYY-MM-DD] [--budget AMOUNT] [--max-items N]";

#[derive(Debug, Clone, PartialEq)]
pub struct BatchArgs {
    pub catalog: String,
    /// Analysis date; today (UTC) when absent.
    pub as_of: Option<NaiveDate>,
    /// Reorder budget; when set the run also selects what to order.
    pub budget: Option<f64>,
    pub max_items: usize,
}

const DEFAULT_MAX_ITEMS: usize = 50;

impl BatchArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut catalog = None;
        let mut as_of = None;
        let mut budget = None;
        let mut max_items = DEFAULT_MAX_ITEMS;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--date" => {
                    let raw = value_for(&mut args, "--date")?;
                    as_of = Some(
                        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                            .with_context(|| format!("invalid --date {raw:?}"))?,
                    );
                }
                "--budget" => {
                    let raw = value_for(&mut args, "--budget")?;
                    budget = Some(raw.parse::<f64>().with_context(|| format!("invalid --budget {raw:?}"))?);
                }
                "--max-items" => {
                    let raw = value_for(&mut args, "--max-items")?;
                    max_items = raw
                        .parse::<usize>()
                        .with_context(|| format!("invalid --max-items {raw:?}"))?;
                }
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                path => {
                    if catalog.replace(path.to_string()).is_some() {
                        bail!("more than one catalog file given\n{USAGE}");
                    }
                }
            }
        }

        Ok(Self {
            catalog: catalog.ok_or_else(|| anyhow!("missing catalog file\n{USAGE}"))?,
            as_of,
            budget,
            max_items,
        })
    }
}

fn value_for(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next().ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<BatchArgs> {
        BatchArgs::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn catalog_only() {
        let args = parse(&["catalog.json"]).unwrap();
        assert_eq!(args.catalog, "catalog.json");
        assert_eq!(args.as_of, None);
        assert_eq!(args.budget, None);
        assert_eq!(args.max_items, DEFAULT_MAX_ITEMS);
    }

    #[test]
    fn all_flags() {
        let args = parse(&["--date", "2026-01-15", "c.json", "--budget", "2500", "--max-items", "8"]).unwrap();
        assert_eq!(args.as_of, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(args.budget, Some(2500.0));
        assert_eq!(args.max_items, 8);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.json", "b.json"]).is_err());
        assert!(parse(&["a.json", "--date", "15/01/2026"]).is_err());
        assert!(parse(&["a.json", "--budget"]).is_err());
        assert!(parse(&["a.json", "--verbose"]).is_err());
    }
}
