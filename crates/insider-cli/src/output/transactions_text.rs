use std::io;

use serde_json::Value;

use super::format::{self, Column};

pub fn render_transactions(data: &Value) -> io::Result<String> {
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("transactions output requires rows"))?;
    let ticker = data.get("ticker").and_then(Value::as_str).unwrap_or("");

    let heading = if rows.len() == 1 {
        format!("1 insider transaction for {ticker}.")
    } else {
        format!("{} insider transactions for {ticker}.", rows.len())
    };
    let mut lines = vec![heading, adjustment_line(data), String::new()];

    let columns = [
        Column::left("Filed"),
        Column::left("Accession"),
        Column::left("Code"),
        Column::right("Shares"),
        Column::right("Price"),
        Column::right("Owned after"),
    ];
    let table_rows = rows
        .iter()
        .map(|row| {
            vec![
                value_str(row, "filing_date").to_string(),
                value_str(row, "accession_number").to_string(),
                value_str(row, "code").to_string(),
                format_quantity(row.get("shares")),
                format_price(row.get("price_per_share")),
                format_quantity(row.get("shares_owned_following")),
            ]
        })
        .collect::<Vec<_>>();
    lines.extend(format::render_table_or_blocks(
        &columns,
        &table_rows,
        format::terminal_width(),
        "Transaction",
    ));

    Ok(lines.join("\n"))
}

fn adjustment_line(data: &Value) -> String {
    let Some(adjustment) = data.get("adjustment") else {
        return "Prices: as stored (--raw).".to_string();
    };
    match adjustment.get("status").and_then(Value::as_str) {
        Some("applied") => {
            let count = |key: &str| adjustment.get(key).and_then(Value::as_u64).unwrap_or(0);
            format!(
                "Prices: split-adjusted to filing-day closes ({} split days in history, {} rows without a close kept as stored).",
                count("split_days"),
                count("unmatched_rows"),
            )
        }
        Some("no_splits") => format!(
            "Prices: as stored; no splits between {} and {}.",
            value_str(data, "history_start"),
            value_str(data, "history_end"),
        ),
        _ => format!(
            "Prices: as stored; split adjustment unavailable ({}).",
            value_str(adjustment, "reason")
        ),
    }
}

fn format_quantity(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_f64)
        .map(|number| number.to_string())
        .unwrap_or_default()
}

fn format_price(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_f64)
        .map(|number| format!("{number:.2}"))
        .unwrap_or_default()
}

fn value_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::render_transactions;

    fn payload(adjustment: Option<serde_json::Value>) -> serde_json::Value {
        let mut data = json!({
            "ticker": "ABC",
            "adjusted": adjustment.is_some(),
            "history_start": "2020-03-01",
            "history_end": "2024-01-15",
            "row_count": 1,
            "rows": [{
                "accession_number": "A1",
                "filing_date": "2021-03-01",
                "ticker": "ABC",
                "shares": 150.0,
                "price_per_share": 11.0,
                "code": "A",
                "shares_owned_following": 2200.0
            }]
        });
        if let Some(value) = adjustment {
            data["adjustment"] = value;
        }
        data
    }

    #[test]
    fn renders_rows_with_two_decimal_prices() {
        let rendered = render_transactions(&payload(None));
        assert!(rendered.is_ok());
        if let Ok(text) = rendered {
            assert!(text.starts_with("1 insider transaction for ABC."));
            assert!(text.contains("Prices: as stored (--raw)."));
            assert!(text.contains("2021-03-01"));
            assert!(text.contains("11.00"));
            assert!(text.contains("2200"));
        }
    }

    #[test]
    fn describes_each_adjustment_status() {
        let applied = render_transactions(&payload(Some(json!({
            "status": "applied", "split_days": 1, "adjusted_rows": 1, "unmatched_rows": 0
        }))));
        assert!(matches!(applied, Ok(text) if text.contains("split-adjusted to filing-day closes (1 split days")));

        let no_splits = render_transactions(&payload(Some(json!({ "status": "no_splits" }))));
        assert!(matches!(no_splits, Ok(text) if text.contains("no splits between 2020-03-01 and 2024-01-15")));

        let unavailable = render_transactions(&payload(Some(json!({
            "status": "unavailable", "reason": "price service returned HTTP 503 for `ABC`"
        }))));
        assert!(matches!(unavailable, Ok(text) if text.contains("adjustment unavailable (price service returned HTTP 503")));
    }
}
