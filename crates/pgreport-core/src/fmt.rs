//! Shared formatting helpers.
//!
//! Pure functions only. Execution times are rendered server-side, see
//! `queries::exec_time_fmt_expr`.

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Round to two decimals, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Bytes to gigabytes (GiB), rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / GIB)
}

/// Mebibytes to gigabytes (GiB), rounded to two decimals.
pub fn mib_to_gb(mib: u64) -> f64 {
    round2(mib as f64 / 1024.0)
}

// ---------------------------------------------------------------------------
// Sizes
// ---------------------------------------------------------------------------

/// Format byte count preferring GB: `"1.50 GB"`, `"12.3 MB"`, `"512 KB"`.
pub fn format_bytes_prefer_gb(bytes: i64) -> String {
    let size = bytes.max(0) as f64;
    if size >= GIB {
        format!("{:.2} GB", size / GIB)
    } else if size >= MIB {
        format!("{:.1} MB", size / MIB)
    } else {
        format!("{:.0} KB", size / 1024.0)
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Suffix appended to query text cut by [`truncate_query`].
pub const TRUNCATED_SUFFIX: &str = "... [truncated]";

/// Normalize text for single-line display with space collapsing.
/// Replaces newlines, carriage returns and tabs with spaces.
pub fn normalize_for_display(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        let ch = match ch {
            '\n' | '\t' => ' ',
            '\r' => continue,
            c => c,
        };
        if ch == ' ' {
            if !prev_space {
                result.push(ch);
            }
            prev_space = true;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result
}

/// Shorten query text to at most `max_len` characters for table display.
///
/// The cut lands on a statement-friendly boundary (`;`, a closing bracket,
/// or a space) within the last 100 characters before the cut point, and
/// the result ends with [`TRUNCATED_SUFFIX`].
pub fn truncate_query(query: &str, max_len: usize) -> String {
    let chars: Vec<char> = query.chars().collect();
    if chars.len() <= max_len {
        return query.to_string();
    }

    let limit = max_len.saturating_sub(TRUNCATED_SUFFIX.len());
    let lower = limit.saturating_sub(100);
    let mut cut = limit;
    for i in (lower..limit).rev() {
        match chars[i] {
            ';' | ')' | ']' | '}' => {
                cut = i + 1;
                break;
            }
            ' ' => {
                cut = i;
                break;
            }
            _ => {}
        }
    }
    if cut == 0 {
        cut = limit;
    }

    let mut out: String = chars[..cut].iter().collect();
    out.truncate(out.trim_end().len());
    out.push_str(TRUNCATED_SUFFIX);
    out
}

/// Fit a cell into `width` characters, ending with `..` when cut.
pub fn fit(s: &str, width: usize) -> String {
    let count = s.chars().count();
    if count <= width {
        return s.to_string();
    }
    if width <= 2 {
        return s.chars().take(width).collect();
    }
    let mut out: String = s.chars().take(width - 2).collect();
    out.push_str("..");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(15.625), 15.63);
        assert_eq!(round2(3.90625), 3.91);
        assert_eq!(round2(11.71875), 11.72);
    }

    #[test]
    fn mib_to_gb_matches_free_output_conversion() {
        assert_eq!(mib_to_gb(16000), 15.63);
        assert_eq!(mib_to_gb(4000), 3.91);
        assert_eq!(mib_to_gb(0), 0.0);
    }

    #[test]
    fn bytes_prefer_gb() {
        assert_eq!(format_bytes_prefer_gb(3 * 1024 * 1024 * 1024 / 2), "1.50 GB");
        assert_eq!(format_bytes_prefer_gb(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes_prefer_gb(8192), "8 KB");
        assert_eq!(format_bytes_prefer_gb(-10), "0 KB");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            normalize_for_display("SELECT *\n\tFROM  t\r\nWHERE x = 1"),
            "SELECT * FROM t WHERE x = 1"
        );
    }

    #[test]
    fn truncate_query_keeps_short_text() {
        assert_eq!(truncate_query("SELECT 1", 300), "SELECT 1");
    }

    #[test]
    fn truncate_query_cuts_on_boundary() {
        let q = format!("SELECT {} FROM t", "abc, ".repeat(100));
        let out = truncate_query(&q, 120);
        assert!(out.ends_with(TRUNCATED_SUFFIX));
        assert!(out.chars().count() <= 120);
        let body = out.trim_end_matches(TRUNCATED_SUFFIX);
        assert!(body.ends_with(','));
    }

    #[test]
    fn truncate_query_without_boundaries() {
        let q = "x".repeat(400);
        let out = truncate_query(&q, 100);
        assert_eq!(out.chars().count(), 100);
    }

    #[test]
    fn fit_marks_cut_cells() {
        assert_eq!(fit("public.orders", 20), "public.orders");
        assert_eq!(fit("public.orders", 8), "public..");
        assert_eq!(fit("abc", 2), "ab");
    }
}
