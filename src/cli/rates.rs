use super::ui;
use crate::core::{CurrencyCode, CurrencyRegistry};
use crate::store::{RateCache, Snapshot};
use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use comfy_table::Cell;
use std::time::Duration as StdDuration;

/// Prints the cache contents, optionally forcing a full refresh first.
pub async fn run(
    cache: &RateCache,
    registry: &CurrencyRegistry,
    refresh: bool,
    timeout: Option<StdDuration>,
) -> Result<()> {
    if refresh {
        let spinner = ui::new_spinner("Refreshing exchange rates...");
        let result = cache.force_refresh(timeout).await;
        spinner.finish_and_clear();

        if let Err(e) = result {
            eprintln!(
                "{}",
                ui::style_text(&format!("Refresh failed: {e}"), ui::StyleType::Error)
            );
            return Err(e.into());
        }
    }

    let snapshot = cache.snapshot().await?;
    println!("{}", render_report(&snapshot, registry, Utc::now()));
    Ok(())
}

/// Age of a quote as `hh:mm`.
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn render_report(
    snapshot: &Snapshot,
    registry: &CurrencyRegistry,
    now: DateTime<Utc>,
) -> String {
    let base = snapshot
        .base
        .map_or_else(|| "unknown".to_string(), |code| registry.describe(code));
    let cached_at = snapshot.last_refresh.map_or_else(
        || "never".to_string(),
        |ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Bid"),
        ui::header_cell("Ask"),
        ui::header_cell("Age"),
    ]);

    let mut codes: Vec<CurrencyCode> = snapshot.rates.keys().copied().collect();
    codes.sort();
    for code in codes {
        let quote = snapshot.rates[&code];
        table.add_row(vec![
            Cell::new(registry.describe(code)),
            ui::number_cell(quote.bid, 4),
            ui::number_cell(quote.ask, 4),
            ui::format_optional_cell(quote.age(now), format_age),
        ]);
    }

    format!(
        "{}\nBase: {}\nCached at: {}\n{}",
        ui::style_text("Exchange Rates", ui::StyleType::Title),
        ui::style_text(&base, ui::StyleType::Value),
        cached_at,
        table
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Quote;
    use std::collections::HashMap;

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::minutes(0)), "00:00");
        assert_eq!(format_age(Duration::minutes(125)), "02:05");
        assert_eq!(format_age(Duration::seconds(59)), "00:00");
        assert_eq!(format_age(Duration::hours(30)), "30:00");
    }

    #[test]
    fn test_render_report_lists_quotes() {
        let registry = CurrencyRegistry::default();
        let now = Utc::now();
        let snapshot = Snapshot {
            base: Some(CurrencyCode::Gel),
            last_refresh: Some(now),
            rates: HashMap::from([
                (CurrencyCode::Usd, Quote::new(2.70, 2.75, now - Duration::minutes(90))),
                (
                    CurrencyCode::Rur,
                    Quote {
                        bid: 0.028,
                        ask: 0.030,
                        updated_at: None,
                    },
                ),
            ]),
        };

        let output = render_report(&snapshot, &registry, now);
        assert!(output.contains("(GEL)"));
        assert!(output.contains("2.7000"));
        assert!(output.contains("2.7500"));
        assert!(output.contains("01:30"));
        assert!(output.contains("N/A"));
        assert!(!output.contains("never"));

        let rur = output.find("(RUR)").unwrap();
        let usd = output.find("(USD)").unwrap();
        assert!(rur < usd);
    }

    #[test]
    fn test_render_report_for_empty_cache() {
        let registry = CurrencyRegistry::default();
        let output = render_report(&Snapshot::default(), &registry, Utc::now());
        assert!(output.contains("Base: "));
        assert!(output.contains("unknown"));
        assert!(output.contains("never"));
    }
}
