use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Request bodies ─────────────────────────────────────────────────────────
//
// `url` fields deserialize as Option so an absent field reaches the store's
// own validation (400 "destination url is required") instead of being
// rejected by the JSON extractor.

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub url: Option<String>,
    /// Caller-supplied slug; a random one is generated when absent.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub url: Option<String>,
    #[serde(default = "default_bulk_count")]
    pub count: usize,
    pub prefix: Option<String>,
}

fn default_bulk_count() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct DeleteByUrlRequest {
    pub url: Option<String>,
}

/// Raw pagination parameters. Kept as strings so a non-numeric value falls
/// back to the default instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    pub fn page(&self) -> u64 {
        parse_or(&self.page, 1)
    }

    pub fn limit(&self) -> u64 {
        parse_or(&self.limit, 100)
    }
}

/// Leading digit run of the value, so "25abc" reads as 25; anything without
/// a usable positive number falls back to the default.
fn parse_or(value: &Option<String>, default: u64) -> u64 {
    let Some(raw) = value.as_deref() else {
        return default;
    };
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

// ── Response bodies ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub short: String,
    pub slug: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct BulkLink {
    pub slug: String,
    pub short: String,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub total: usize,
    pub url: String,
    pub links: Vec<BulkLink>,
}

#[derive(Debug, Serialize)]
pub struct ListLink {
    pub slug: String,
    pub short: String,
    pub url: String,
    pub visits: i64,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub total: u64,
    pub page: u64,
    pub pages: u64,
    pub links: Vec<ListLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_fall_back_on_garbage() {
        let params = ListParams {
            page: Some("abc".into()),
            limit: Some("0".into()),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);

        let params = ListParams {
            page: Some("3".into()),
            limit: Some("25".into()),
        };
        assert_eq!(params.page(), 3);
        assert_eq!(params.limit(), 25);

        let params = ListParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);
    }

    #[test]
    fn list_params_read_the_leading_digit_run() {
        let params = ListParams {
            page: Some(" 7".into()),
            limit: Some("25abc".into()),
        };
        assert_eq!(params.page(), 7);
        assert_eq!(params.limit(), 25);

        // No leading digits at all falls back.
        let params = ListParams {
            page: Some("x2".into()),
            limit: Some("-5".into()),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);
    }
}
