use std::fmt::Write as _;

use client_core::{ListMode, ListSnapshot};
use shared::domain::Currency;

pub const EMPTY_STATE: &str = "No currencies available";

pub fn render_rows(currencies: &[Currency]) -> String {
    if currencies.is_empty() {
        return format!("{EMPTY_STATE}\n");
    }

    let name_width = currencies
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    for currency in currencies {
        let badge = currency.badge().unwrap_or('?');
        let _ = writeln!(
            out,
            "[{badge}] {name:<name_width$}  {label}",
            name = currency.name,
            label = currency.trailing_label(),
        );
        // Fiat rows carry their symbol on a second line.
        if currency.is_fiat() {
            let _ = writeln!(out, "    {}", currency.symbol);
        }
    }
    out
}

pub fn render_snapshot(snapshot: &ListSnapshot) -> String {
    let header = match (&snapshot.mode, snapshot.query.as_deref()) {
        (ListMode::Filtered, Some(query)) => format!(
            "-- search \"{query}\": {} match(es) --",
            snapshot.currencies.len()
        ),
        _ => format!("-- {} currencies --", snapshot.currencies.len()),
    };
    format!("{header}\n{}", render_rows(&snapshot.currencies))
}
