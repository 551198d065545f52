use super::ui;
use crate::core::{CurrencyCode, CurrencyRegistry, RateError, default_counter};
use crate::store::{Conversion, ConversionSource, RateCache};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use tracing::debug;

/// Outcome of one requested conversion, kept even when it failed.
#[derive(Debug, Clone)]
pub struct ConversionRow {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub amount: f64,
    pub result: Result<Conversion, RateError>,
}

/// Resolves user tokens to codes, failing on the first unrecognized one.
pub fn resolve_tokens(
    registry: &CurrencyRegistry,
    tokens: &[String],
) -> Result<Vec<CurrencyCode>, RateError> {
    tokens
        .iter()
        .map(|token| {
            registry
                .normalize(token)
                .ok_or_else(|| RateError::UnknownCurrency(token.clone()))
        })
        .collect()
}

pub async fn run(
    cache: &RateCache,
    registry: &CurrencyRegistry,
    amount: f64,
    from: &str,
    targets: &[String],
) -> Result<()> {
    let from_token = [from.to_string()];
    let resolved = resolve_tokens(registry, &from_token)
        .and_then(|from| resolve_tokens(registry, targets).map(|to| (from[0], to)));
    let (from, targets) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error));
            eprintln!("{}", registry.help_text());
            return Err(e.into());
        }
    };

    let targets: Vec<Option<CurrencyCode>> = if targets.is_empty() {
        vec![None]
    } else {
        targets.into_iter().map(Some).collect()
    };

    let pending = targets.into_iter().map(|to| async move {
        let result = cache.compute_counter_amount(from, to, amount).await;
        debug!(?result, "Conversion finished");
        ConversionRow {
            from,
            to: to.unwrap_or_else(|| default_counter(from)),
            amount,
            result,
        }
    });
    let rows = join_all(pending).await;

    println!("{}", render_conversions(&rows, registry));
    Ok(())
}

/// Error text with currency codes rendered as labels.
fn describe_error(err: &RateError, registry: &CurrencyRegistry) -> String {
    match err {
        RateError::Unavailable { from, to } => format!(
            "Conversion unavailable from {} to {}",
            registry.describe_token(from),
            registry.describe_token(to)
        ),
        other => other.to_string(),
    }
}

pub fn render_conversions(rows: &[ConversionRow], registry: &CurrencyRegistry) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Have"),
        ui::header_cell("Want"),
        ui::header_cell("Amount"),
        ui::header_cell("Source"),
    ]);

    let mut notes = Vec::new();
    for row in rows {
        let converted = row.result.as_ref().ok().map(|c| c.converted);
        let source = match &row.result {
            Ok(c) if c.source == ConversionSource::Direct => "provider",
            Ok(_) => "cached rates",
            Err(_) => "",
        };
        if let Err(e) = &row.result {
            notes.push(format!(
                "{}, the {} side is left empty",
                describe_error(e, registry),
                row.to
            ));
        }

        table.add_row(vec![
            Cell::new(format!("{:.2} {}", row.amount, registry.describe(row.from))),
            Cell::new(registry.describe(row.to)),
            ui::format_optional_cell(converted, |v| format!("{v:.2}")),
            Cell::new(source),
        ]);
    }

    let mut output = table.to_string();
    for note in notes {
        output.push('\n');
        output.push_str(&ui::style_text(&note, ui::StyleType::Subtle));
    }
    output
}
