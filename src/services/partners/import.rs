use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::partners::NewPartner;

const REQUIRED_HEADERS: [&str; 2] = ["name", "base_rate_bps"];

#[derive(Debug, Deserialize)]
struct PartnerRow {
    name: String,
    website: Option<String>,
    base_rate_bps: i32,
    promo_rate_bps: Option<i32>,
    promo_expires_at: Option<DateTime<Utc>>,
    followers: Option<i64>,
}

impl From<PartnerRow> for NewPartner {
    fn from(row: PartnerRow) -> Self {
        NewPartner {
            name: row.name,
            website: row.website.filter(|w| !w.is_empty()),
            base_rate_bps: row.base_rate_bps,
            promo_rate_bps: row.promo_rate_bps,
            promo_expires_at: row.promo_expires_at,
            followers: row.followers.unwrap_or(0),
            subid_param: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Rows that parsed and validated, keyed by their line in the upload.
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub partners: Vec<(u64, NewPartner)>,
    pub skipped: Vec<SkippedRow>,
}

/// Parses a partner CSV upload. Fails only when the header row is unusable;
/// bad data rows are collected in `skipped`.
pub fn parse_partners(body: &str) -> Result<ParsedImport, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("unreadable header row: {e}"))?
        .clone();
    for required in REQUIRED_HEADERS {
        if !headers.iter().any(|h| h == required) {
            return Err(format!("missing column {required}"));
        }
    }

    let mut parsed = ParsedImport::default();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                log::warn!("Skipping unreadable partner row at line {}: {}", line, e);
                parsed.skipped.push(SkippedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let partner: NewPartner = match record.deserialize::<PartnerRow>(Some(&headers)) {
            Ok(row) => row.into(),
            Err(e) => {
                log::warn!("Skipping malformed partner row at line {}: {}", line, e);
                parsed.skipped.push(SkippedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Err(reason) = partner.validate() {
            log::warn!("Skipping invalid partner row at line {}: {}", line, reason);
            parsed.skipped.push(SkippedRow { line, reason });
            continue;
        }

        parsed.partners.push((line, partner));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "name,website,base_rate_bps,promo_rate_bps,promo_expires_at,followers";

    #[test]
    fn parses_rows_with_optional_columns() {
        let body = format!(
            "{HEADER}\n{}\n{}\n",
            "Acme,https://acme.example.com,500,,,1200", "Globex,,300,900,2030-01-01T00:00:00Z,"
        );

        let parsed = parse_partners(&body).unwrap();

        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.partners.len(), 2);
        let (line, acme) = &parsed.partners[0];
        assert_eq!(*line, 2);
        assert_eq!(acme.website.as_deref(), Some("https://acme.example.com"));
        assert_eq!(acme.followers, 1200);
        let (_, globex) = &parsed.partners[1];
        assert_eq!(globex.website, None);
        assert_eq!(globex.promo_rate_bps, Some(900));
        assert!(globex.promo_expires_at.is_some());
        assert_eq!(globex.followers, 0);
    }

    #[test]
    fn bad_rows_are_skipped_with_their_line() {
        let body = format!(
            "{HEADER}\nAcme,,lots,,,\nGlobex,,20000,,,\nInitech,,100,500,,\nHooli,,250,,,\n"
        );

        let parsed = parse_partners(&body).unwrap();

        assert_eq!(parsed.partners.len(), 1);
        assert_eq!(parsed.partners[0].1.name, "Hooli");
        let lines: Vec<u64> = parsed.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn missing_required_column_fails_whole_upload() {
        let result = parse_partners("name,website\nAcme,https://acme.example.com\n");
        assert!(result.is_err());
    }
}
