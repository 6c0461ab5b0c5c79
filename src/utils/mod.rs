/// Splits `field=value`. The value may be empty; the field may not.
pub fn parse_assignment(value: &str) -> Result<(String, String), String> {
    let (field, raw) = value
        .split_once('=')
        .ok_or_else(|| "expected FIELD=VALUE".to_string())?;
    let field = field.trim();
    if field.is_empty() {
        return Err("field name is empty".to_string());
    }
    Ok((field.to_string(), raw.to_string()))
}

pub fn parse_assignments(values: &[String]) -> Result<Vec<(String, String)>, String> {
    values
        .iter()
        .map(|v| parse_assignment(v).map_err(|e| format!("invalid assignment '{v}': {e}")))
        .collect()
}

/// Table names become URL path segments; only word characters and dashes pass.
pub fn validate_table_name(table: &str) -> Result<(), String> {
    let table = table.trim();
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!("invalid table name '{table}'"));
    }
    Ok(())
}

/// Parses `+HH:MM`, `-HH:MM` or `UTC` into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Result<chrono::FixedOffset, String> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("utc") || v.eq_ignore_ascii_case("z") {
        return chrono::FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string());
    }
    let (sign, rest) = match v.as_bytes().first() {
        Some(b'+') => (1, &v[1..]),
        Some(b'-') => (-1, &v[1..]),
        _ => return Err("expected +HH:MM, -HH:MM or UTC".to_string()),
    };
    let (h, m) = rest.split_once(':').unwrap_or((rest, "0"));
    let h: i32 = h.parse().map_err(|_| format!("invalid hours '{h}'"))?;
    let m: i32 = m.parse().map_err(|_| format!("invalid minutes '{m}'"))?;
    if h > 23 || m > 59 {
        return Err("offset out of range".to_string());
    }
    chrono::FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(|| "offset out of range".to_string())
}
