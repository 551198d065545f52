use super::ui;
use crate::core::{CurrencyRegistry, default_counter};
use comfy_table::Cell;

pub fn render_currencies(registry: &CurrencyRegistry) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Aliases"),
        ui::header_cell("Default counter"),
    ]);

    for code in registry.codes() {
        table.add_row(vec![
            Cell::new(registry.describe(code)),
            Cell::new(registry.aliases_of(code).join(", ")),
            Cell::new(registry.describe(default_counter(code))),
        ]);
    }

    format!(
        "{}\n{}\n{}",
        ui::style_text("Supported Currencies", ui::StyleType::Title),
        table,
        ui::style_text(&registry.help_text(), ui::StyleType::Subtle)
    )
}

pub fn run(registry: &CurrencyRegistry) {
    println!("{}", render_currencies(registry));
}
