use serde_json::Value;

/// Format a byte count as "500 B", "2.0 KB" or "1.5 MB"
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / KB)
    } else {
        format!("{:.1} MB", bytes as f64 / (KB * KB))
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Uppercase the first character
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turn a field key into a label: `full_name` → "Full Name", `firstName` → "First Name"
pub fn format_field_name(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c == '_' {
            spaced.push(' ');
        } else {
            if c.is_ascii_uppercase() {
                spaced.push(' ');
            }
            spaced.push(c);
        }
    }
    spaced
        .trim()
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn scalar_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a submitted form value for display
pub fn format_field_value(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(scalar_display).collect::<Vec<_>>().join(", "),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Null => "—".to_string(),
        Value::Object(_) => value.to_string(),
        other => scalar_display(other),
    }
}
