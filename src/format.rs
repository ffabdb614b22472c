//! Display formatting helpers shared by tables, summaries and insight text

/// Format an integer with thousands separators
pub fn format_number(n: i64) -> String {
    let negative = n < 0;
    let digits = n.unsigned_abs().to_string();
    let mut result = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if negative {
        format!("-{result}")
    } else {
        result
    }
}

/// Format a USD amount as `$x.xx`
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.2}")
}

/// Format a percentage with one decimal
pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}

/// Humanize a millisecond duration (`ms`, `s`, `m`, `h`)
pub fn format_duration_ms(ms: i64) -> String {
    let ms = ms.max(0);
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{}s", (ms as f64 / 1_000.0).round() as i64)
    } else if ms < 3_600_000 {
        format!("{}m", (ms as f64 / 60_000.0).round() as i64)
    } else {
        format!("{}h", (ms as f64 / 3_600_000.0).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(-1_234), "-1,234");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "$0.00");
        assert_eq!(format_cost(1.767_5), "$1.77");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(500), "500ms");
        assert_eq!(format_duration_ms(45_000), "45s");
        assert_eq!(format_duration_ms(120_000), "2m");
        assert_eq!(format_duration_ms(7_200_000), "2h");
        assert_eq!(format_duration_ms(-5), "0ms");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(12.34), "12.3%");
    }
}
