use serde_json::Value;

/// Renders a JSON array of resources as a narrow text table, falling back to
/// pretty-printed JSON for anything that isn't a flat array of objects.
pub fn render_table(value: &Value, columns: &[&str]) -> String {
    let Some(rows) = value.as_array() else {
        return serde_json::to_string_pretty(value).unwrap_or_default();
    };
    if rows.is_empty() {
        return "No resources.".to_string();
    }

    let mut out = String::new();
    out.push_str(&columns.join("  "));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| {
                row.get(col)
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        out.push_str(&cells.join("  "));
        out.push('\n');
    }
    out
}

pub fn render_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
