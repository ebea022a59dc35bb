use std::io;

use serde_json::{Map, Value};

use super::format::{self, Column};

pub fn render_ingest_run(data: &Value) -> io::Result<String> {
    let partitions = data
        .get("partitions")
        .and_then(Value::as_array)
        .ok_or_else(|| io::Error::other("ingest output requires partitions"))?;

    let mut lines = vec!["Ingest completed.".to_string(), String::new(), "Summary:".to_string()];
    let entries = [
        ("Run ID:", value_str(data, "run_id").to_string()),
        ("Store:", value_str(data, "db_path").to_string()),
        ("Partitions:", partitions.len().to_string()),
        ("Batch size:", value_u64(data, "batch_size").to_string()),
        ("Rows inserted:", value_u64(data, "rows_inserted").to_string()),
        (
            "Skipped existing:",
            value_u64(data, "rows_skipped_existing").to_string(),
        ),
        ("Rows rejected:", value_u64(data, "rows_rejected").to_string()),
    ];
    lines.extend(format::key_value_rows(&entries, 2));

    lines.push(String::new());
    lines.push("Partitions:".to_string());
    let columns = [
        Column::left("Partition"),
        Column::right("Legs read"),
        Column::right("Collapsed"),
        Column::right("Matched"),
        Column::right("Inserted"),
        Column::right("Chunks"),
    ];
    let rows = partitions.iter().map(partition_row).collect::<Vec<_>>();
    lines.extend(format::render_table_or_blocks(
        &columns,
        &rows,
        format::terminal_width(),
        "Partition",
    ));

    if let Some(rejections) = data.get("rejections").and_then(Value::as_object)
        && !rejections.is_empty()
    {
        lines.push(String::new());
        lines.push("Rejected rows by reason:".to_string());
        lines.extend(render_rejections(rejections));
    }

    if let Some(store) = data.get("store") {
        lines.push(String::new());
        lines.push("Store now holds:".to_string());
        let filings = match (
            store.get("earliest_filing").and_then(Value::as_str),
            store.get("latest_filing").and_then(Value::as_str),
        ) {
            (Some(earliest), Some(latest)) => format!("{earliest} to {latest}"),
            _ => "none".to_string(),
        };
        let entries = [
            ("Transactions:", value_u64(store, "rows").to_string()),
            ("Tickers:", value_u64(store, "tickers").to_string()),
            ("Filed:", filings),
        ];
        lines.extend(format::key_value_rows(&entries, 2));
    }

    Ok(lines.join("\n"))
}

fn partition_row(partition: &Value) -> Vec<String> {
    let nested = |section: &str, key: &str| {
        partition
            .get(section)
            .map(|value| value_u64(value, key))
            .unwrap_or(0)
    };
    vec![
        value_str(partition, "partition").to_string(),
        value_u64(partition, "transaction_rows_read").to_string(),
        nested("dedupe", "collapsed_groups").to_string(),
        nested("join", "matched").to_string(),
        nested("load", "rows_inserted").to_string(),
        nested("load", "chunks_committed").to_string(),
    ]
}

fn render_rejections(rejections: &Map<String, Value>) -> Vec<String> {
    let labels = rejections
        .keys()
        .map(|reason| format!("{reason}:"))
        .collect::<Vec<_>>();
    let entries = labels
        .iter()
        .zip(rejections.values())
        .map(|(label, count)| (label.as_str(), count.as_u64().unwrap_or(0).to_string()))
        .collect::<Vec<_>>();
    format::key_value_rows(&entries, 2)
}

fn value_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn value_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}
