use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::cli::config::HttpTargetConfig;

/// One fetch to perform, built once per crawl and reused by every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Successful fetch result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Why an HTTP target could not be turned into a request
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid http method '{0}'")]
    Method(String),

    #[error("parsing url '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header name '{0}'")]
    HeaderName(String),

    #[error("invalid value of header '{0}'")]
    HeaderValue(String),
}

impl CrawlRequest {
    pub fn from_target(target: &HttpTargetConfig) -> Result<Self, RequestError> {
        let method = Method::from_bytes(target.method.as_bytes())
            .map_err(|_| RequestError::Method(target.method.clone()))?;

        let url = Url::parse(&target.url).map_err(|source| RequestError::Url {
            url: target.url.clone(),
            source,
        })?;

        let mut headers = HeaderMap::with_capacity(target.header.len());
        for (name, value) in &target.header {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RequestError::HeaderName(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| RequestError::HeaderValue(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            url,
            method,
            headers,
            body: target.body.clone().into_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn target(method: &str, url: &str, header: &[(&str, &str)]) -> HttpTargetConfig {
        HttpTargetConfig {
            method: method.to_string(),
            url: url.to_string(),
            header: header
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            body: r#"{"message":"hello, world!"}"#.to_string(),
        }
    }

    #[test]
    fn test_from_target() {
        let request = CrawlRequest::from_target(&target(
            "POST",
            "https://foo.com/api/reserve",
            &[("content-type", "application/json")],
        ))
        .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url.as_str(), "https://foo.com/api/reserve");
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.body, br#"{"message":"hello, world!"}"#.to_vec());
    }

    #[test]
    fn test_invalid_targets() {
        assert!(matches!(
            CrawlRequest::from_target(&target("GE T", "https://foo.com", &[])),
            Err(RequestError::Method(_))
        ));
        assert!(matches!(
            CrawlRequest::from_target(&target("GET", "foo", &[])),
            Err(RequestError::Url { .. })
        ));
        assert!(matches!(
            CrawlRequest::from_target(&target("GET", "https://foo.com", &[("bad header", "x")])),
            Err(RequestError::HeaderName(_))
        ));
        assert!(matches!(
            CrawlRequest::from_target(&target("GET", "https://foo.com", &[("x-test", "line\nbreak")])),
            Err(RequestError::HeaderValue(_))
        ));
    }
}
