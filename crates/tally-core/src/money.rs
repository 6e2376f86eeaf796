//! Money formatting for reports: two decimals, thousands separators.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::value::CellValue;

/// Format an amount as `1,234,567.89`. Rounds half away from zero.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// Format a money cell, or `None` when it does not hold a number.
#[must_use]
pub fn format_cell_amount(cell: &CellValue) -> Option<String> {
    cell.as_decimal().map(format_amount)
}
