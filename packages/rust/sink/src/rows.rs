//! Sheet row layout and append planning.

use std::collections::HashSet;

use jobflow_shared::{ListingRecord, normalize_url};

/// Column header written to an empty worksheet.
pub const HEADER: [&str; 8] = [
    "job_url",
    "title",
    "company",
    "location",
    "job_type",
    "job_level",
    "applied",
    "status",
];

/// `=HYPERLINK("url","title")`, or the bare title when there is no URL.
pub fn hyperlink(url: &str, title: &str) -> String {
    if url.is_empty() {
        return title.to_string();
    }
    format!("=HYPERLINK(\"{url}\",\"{}\")", title.replace('"', "\"\""))
}

/// One sheet row for a record, in [`HEADER`] order.
pub fn record_row(record: &ListingRecord) -> Vec<String> {
    vec![
        record.job_url.clone(),
        hyperlink(&record.job_url, &record.title),
        record.company.clone(),
        record.location.clone(),
        record.job_type.clone(),
        record.job_level.clone(),
        String::new(),
        String::new(),
    ]
}

/// Normalized URLs already present in the `job_url` column.
pub fn existing_keys(values: &[Vec<String>]) -> HashSet<String> {
    let Some((header, rows)) = values.split_first() else {
        return HashSet::new();
    };
    let Some(url_idx) = header.iter().position(|h| h == "job_url") else {
        return HashSet::new();
    };
    rows.iter()
        .filter_map(|row| row.get(url_idx))
        .filter(|url| !url.is_empty())
        .map(|url| normalize_url(url))
        .collect()
}

/// What to send for one append call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendPlan {
    /// Rows to append, header first when the sheet was empty.
    pub rows: Vec<Vec<String>>,
    /// Number of listing rows (header excluded).
    pub new_rows: usize,
}

/// Plans an append of `records` against the current sheet `values`.
/// Records whose URL is already in the sheet are skipped.
pub fn plan_append(values: &[Vec<String>], records: &[ListingRecord]) -> AppendPlan {
    let existing = existing_keys(values);
    let mut rows: Vec<Vec<String>> = Vec::new();
    if values.is_empty() {
        rows.push(HEADER.iter().map(|h| h.to_string()).collect());
    }
    let before = rows.len();
    rows.extend(
        records
            .iter()
            .filter(|record| !existing.contains(&record.url_key()))
            .map(record_row),
    );
    let new_rows = rows.len() - before;
    AppendPlan { rows, new_rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, title: &str) -> ListingRecord {
        ListingRecord {
            job_url: url.into(),
            title: title.into(),
            company: "Acme".into(),
            ..Default::default()
        }
    }

    fn sheet(urls: &[&str]) -> Vec<Vec<String>> {
        let mut values = vec![HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
        for url in urls {
            values.push(vec![url.to_string(), "x".into()]);
        }
        values
    }

    #[test]
    fn hyperlink_escapes_quotes() {
        assert_eq!(
            hyperlink("https://a/1", "The \"Best\" Job"),
            "=HYPERLINK(\"https://a/1\",\"The \"\"Best\"\" Job\")"
        );
        assert_eq!(hyperlink("", "No Link"), "No Link");
    }

    #[test]
    fn empty_sheet_gets_header() {
        let plan = plan_append(&[], &[record("https://a/1", "Dev")]);
        assert_eq!(plan.new_rows, 1);
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.rows[0][0], "job_url");
        assert_eq!(plan.rows[1][0], "https://a/1");
        assert_eq!(plan.rows[1].len(), HEADER.len());
    }

    #[test]
    fn skips_urls_already_in_sheet() {
        let values = sheet(&["https://a/1/", "https://a/2?utm_source=mail"]);
        let records = [
            record("https://a/1", "One"),
            record("https://a/2", "Two"),
            record("https://a/3", "Three"),
        ];
        let plan = plan_append(&values, &records);
        assert_eq!(plan.new_rows, 1);
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0][0], "https://a/3");
    }

    #[test]
    fn header_without_url_column_skips_nothing() {
        let values = vec![vec!["name".to_string()], vec!["https://a/1".to_string()]];
        let plan = plan_append(&values, &[record("https://a/1", "One")]);
        assert_eq!(plan.new_rows, 1);
        assert_eq!(plan.rows.len(), 1);
    }
}
