//! SRU searchRetrieve requests over HTTP

use harvestline_core::{PipelineError, block_on, http_client};

/// Parameters of one searchRetrieve page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub version: &'a str,
    pub connection: &'a str,
    pub query: &'a str,
    /// 1-based offset of the first record
    pub start_record: u64,
    pub maximum_records: u32,
}

impl PageRequest<'_> {
    /// Query string parameters in wire order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("version", self.version.to_string()),
            ("operation", "searchRetrieve".to_string()),
            ("x-connection", self.connection.to_string()),
            ("query", self.query.to_string()),
            ("startRecord", self.start_record.to_string()),
            ("maximumRecords", self.maximum_records.to_string()),
        ]
    }
}

/// Anything that can answer a page request with a raw XML body.
pub trait PageSource {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<u8>, PipelineError>;
}

/// HTTP GET against an SRU endpoint using the shared client
#[derive(Debug, Clone)]
pub struct SruClient {
    base_url: String,
}

impl SruClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl PageSource for SruClient {
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<u8>, PipelineError> {
        let pairs = request.query_pairs();
        block_on(async {
            let response = http_client()
                .get(&self.base_url)
                .query(&pairs)
                .send()
                .await
                .map_err(PipelineError::from_reqwest)?;
            log::debug!("GET {} -> {}", response.url(), response.status());
            let body = response
                .error_for_status()
                .map_err(PipelineError::from_reqwest)?
                .bytes()
                .await
                .map_err(PipelineError::from_reqwest)?;
            Ok(body.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_wire_names() {
        let request = PageRequest {
            version: "2.0",
            connection: "BWB",
            query: "modified<=2025-02-13",
            start_record: 101,
            maximum_records: 100,
        };
        let pairs = request.query_pairs();
        let names: Vec<_> = pairs.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            [
                "version",
                "operation",
                "x-connection",
                "query",
                "startRecord",
                "maximumRecords"
            ]
        );
        assert_eq!(pairs[1].1, "searchRetrieve");
        assert_eq!(pairs[4].1, "101");
    }
}
