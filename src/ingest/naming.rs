//! Identifier normalization for generated table and column names.
//!
//! Every name that ends up in DDL passes through this module, which keeps the
//! character set to `[a-z0-9_]`.

use std::collections::HashSet;

/// Prefix for column names that would otherwise start with a digit.
pub const DIGIT_PREFIX: &str = "year_";

/// Name of the synthetic row key every data table carries.
pub const ROW_KEY_COLUMN: &str = "id";

/// Postgres truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Lowercases, trims and collapses every run of characters outside
/// `[a-z0-9]` into a single underscore.
pub fn sanitize_identifier(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for c in name.trim().chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    result
}

/// Like [`sanitize_identifier`], but a leading digit gets [`DIGIT_PREFIX`] so
/// spreadsheet headers such as `2021` become `year_2021`.
pub fn sanitize_column_name(name: &str) -> String {
    let clean = sanitize_identifier(name);
    if clean.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{DIGIT_PREFIX}{clean}")
    } else {
        clean
    }
}

/// False for names that sanitized down to nothing useful.
pub fn is_usable_identifier(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphanumeric())
}

/// `base` shortened so that `base` + `suffix` fits [`MAX_IDENTIFIER_LEN`].
/// Sanitized names are ASCII, so truncating at any byte is safe.
fn fit_identifier(base: &str, suffix: &str) -> String {
    let budget = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len());
    let kept = &base[..base.len().min(budget)];
    format!("{kept}{suffix}")
}

/// Sanitizes a header row.
///
/// Degenerate headers become `unnamed_<position>`. Every name is cut to
/// [`MAX_IDENTIFIER_LEN`] before uniqueness is checked, because Postgres
/// would truncate it anyway. Names that repeat after that, or that clash with
/// [`ROW_KEY_COLUMN`], get a numeric suffix (`segment`, `segment_1`, ...).
pub fn sanitize_column_names(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([ROW_KEY_COLUMN.to_owned()]);
    let mut cleaned = Vec::with_capacity(headers.len());

    for (position, header) in headers.iter().enumerate() {
        let mut base = sanitize_column_name(header);
        if !is_usable_identifier(&base) {
            base = format!("unnamed_{position}");
        }

        let mut candidate = fit_identifier(&base, "");
        let mut count = 0;
        while seen.contains(&candidate) {
            count += 1;
            candidate = fit_identifier(&base, &format!("_{count}"));
        }

        if count > 0 {
            tracing::warn!("Duplicate column header '{header}' renamed to '{candidate}'");
        }

        seen.insert(candidate.clone());
        cleaned.push(candidate);
    }

    cleaned
}

/// Builds the physical table name from the workbook's region and market name
/// plus the dataset id.
///
/// The id is always kept whole; the descriptive prefix is shortened to fit
/// [`MAX_IDENTIFIER_LEN`].
pub fn table_name(region: &str, market_name: &str, table_id: &str) -> String {
    let id = sanitize_identifier(table_id);
    let joined = [region, market_name]
        .iter()
        .map(|part| sanitize_identifier(part))
        .filter(|part| is_usable_identifier(part))
        .collect::<Vec<_>>()
        .join("_");

    let mut prefix = sanitize_identifier(&joined)
        .trim_matches('_')
        .to_owned();
    if prefix.is_empty() {
        prefix = "data".to_owned();
    }

    let budget = MAX_IDENTIFIER_LEN.saturating_sub(id.len() + 1);
    prefix.truncate(budget);
    let prefix = prefix.trim_end_matches('_');

    format!("{prefix}_{id}")
}

/// Extracts the year from a `year_<dddd>` column name.
///
/// A trailing `_<suffix>` (from duplicate-header renaming) is tolerated.
pub fn parse_year_column(name: &str) -> Option<i32> {
    let rest = name.strip_prefix(DIGIT_PREFIX)?;
    let digits = rest.split('_').next()?;
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_sanitization() {
        assert_eq!(sanitize_identifier("  Market Size (USD) "), "market_size_usd_");
        assert_eq!(sanitize_identifier("Sub-Segment"), "sub_segment");
        assert_eq!(sanitize_identifier("a   --  b"), "a_b");
        assert_eq!(sanitize_identifier("Région"), "r_gion");
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(sanitize_identifier(""), "");
        assert_eq!(sanitize_identifier("   "), "");
        assert_eq!(sanitize_identifier("%%%"), "_");
        assert!(!is_usable_identifier("_"));
        assert!(!is_usable_identifier(""));
        assert!(is_usable_identifier("a_"));
    }

    #[test]
    fn test_digit_prefix() {
        assert_eq!(sanitize_column_name("2021"), "year_2021");
        assert_eq!(sanitize_column_name(" 2021 (F)"), "year_2021_f_");
        assert_eq!(sanitize_column_name("Segment"), "segment");
        assert!(sanitize_column_name("9lives").starts_with(DIGIT_PREFIX));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "Region",
            "  2020 ",
            "Sub Segment / Type",
            "__x__",
            "%%",
            "",
            "ÄÖÜ 12",
            "year_2031",
            "MiXeD-Case_name",
        ];
        for s in samples {
            let once = sanitize_identifier(s);
            assert_eq!(sanitize_identifier(&once), once, "identifier: {s:?}");

            let once = sanitize_column_name(s);
            assert_eq!(sanitize_column_name(&once), once, "column: {s:?}");
        }
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let headers = vec![
            "Segment".to_owned(),
            "segment".to_owned(),
            "SEGMENT ".to_owned(),
            "ID".to_owned(),
            String::new(),
        ];
        assert_eq!(
            sanitize_column_names(&headers),
            vec!["segment", "segment_1", "segment_2", "id_1", "unnamed_4"]
        );
    }

    #[test]
    fn test_long_headers_stay_distinct_after_truncation() {
        let shared = "Compound annual growth rate of passenger vehicle sales across";
        let headers = vec![
            format!("{shared} all urban markets (%)"),
            format!("{shared} all rural markets (%)"),
            format!("{shared} all urban markets (%)"),
        ];
        let names = sanitize_column_names(&headers);

        assert!(names.iter().all(|n| n.len() <= MAX_IDENTIFIER_LEN), "{names:?}");
        assert_eq!(names[0].len(), MAX_IDENTIFIER_LEN);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len(), "{names:?}");
        assert!(names[1].ends_with("_1"));
        assert!(names[2].ends_with("_2"));
    }

    #[test]
    fn test_short_headers_are_not_truncated() {
        let header = "a".repeat(MAX_IDENTIFIER_LEN);
        let names = sanitize_column_names(&[header.clone(), header.clone()]);
        assert_eq!(names[0], header);
        assert_eq!(names[1].len(), MAX_IDENTIFIER_LEN);
        assert!(names[1].ends_with("_1"));
    }

    #[test]
    fn test_table_name_layout() {
        assert_eq!(
            table_name("North America", "Electric Vehicles", "ab12cd34"),
            "north_america_electric_vehicles_ab12cd34"
        );
        assert_eq!(table_name("", "  ", "ab12cd34"), "data_ab12cd34");
        assert_eq!(table_name("(EU)", "", "ab12cd34"), "eu_ab12cd34");
    }

    #[test]
    fn test_table_name_fits_postgres_limit() {
        let long = "very long region name ".repeat(10);
        let name = table_name(&long, &long, "ab12cd34");
        assert!(name.len() <= MAX_IDENTIFIER_LEN);
        assert!(name.ends_with("_ab12cd34"));
        assert!(!name.contains("__"));
    }

    #[test]
    fn test_parse_year_column() {
        assert_eq!(parse_year_column("year_2020"), Some(2020));
        assert_eq!(parse_year_column("year_2020_1"), Some(2020));
        assert_eq!(parse_year_column("year_20201"), None);
        assert_eq!(parse_year_column("yearly_growth"), None);
        assert_eq!(parse_year_column("year_abcd"), None);
    }
}
