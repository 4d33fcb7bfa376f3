//! Small terminal-output helpers.

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM`, or pass the raw
/// value through when it does not parse.
pub fn format_datetime(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Two-column list: `  name  detail`.
pub fn print_rows(rows: &[(String, String)]) {
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, detail) in rows {
        println!("  {name:<width$}  {detail}");
    }
}

/// Plural suffix helper.
pub fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_rfc3339() {
        assert_eq!(
            format_datetime("2026-07-01T12:30:00Z"),
            "2026-07-01 12:30"
        );
    }

    #[test]
    fn passes_through_garbage() {
        assert_eq!(format_datetime("yesterday"), "yesterday");
    }

    #[test]
    fn plural_suffix() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(2), "s");
    }
}
