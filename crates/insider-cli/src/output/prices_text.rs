use std::io;

use serde_json::Value;

use super::format::{self, Column};

pub fn render_price_history(data: &Value) -> io::Result<String> {
    let points = data
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("prices output requires points"))?;
    let text = |key: &str| data.get(key).and_then(Value::as_str).unwrap_or("");
    let split_days = data.get("split_days").and_then(Value::as_u64).unwrap_or(0);

    let mut lines = vec![
        format!(
            "{} trading days for {} from {} to {} ({split_days} with a split).",
            points.len(),
            text("ticker"),
            text("start"),
            text("end"),
        ),
        String::new(),
    ];

    let columns = [
        Column::left("Date"),
        Column::right("Open"),
        Column::right("High"),
        Column::right("Low"),
        Column::right("Close"),
        Column::right("Volume"),
        Column::right("Split"),
    ];
    let rows = points
        .iter()
        .map(|point| {
            let price = |key: &str| {
                point
                    .get(key)
                    .and_then(Value::as_f64)
                    .map(|value| format!("{value:.2}"))
                    .unwrap_or_else(|| "-".to_string())
            };
            vec![
                point.get("date").and_then(Value::as_str).unwrap_or("").to_string(),
                price("open"),
                price("high"),
                price("low"),
                price("close"),
                point
                    .get("volume")
                    .and_then(Value::as_u64)
                    .map(|volume| volume.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                point
                    .get("split_ratio")
                    .and_then(Value::as_f64)
                    .map(|ratio| format!("{ratio}:1"))
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    lines.extend(format::render_table_or_blocks(
        &columns,
        &rows,
        format::terminal_width(),
        "Day",
    ));

    Ok(lines.join("\n"))
}
