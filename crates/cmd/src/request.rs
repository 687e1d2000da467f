// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Crawl requests and their flat-record form.

use std::{collections::BTreeSet, fmt};

use frontq_queue::{BoxError, FlatRecord, RecordConverter, RecordExt, Value};
use snafu::{Snafu, ensure};

/// A pending fetch. Callbacks are stored by name and resolved against the
/// converter's registry when the request is read back.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    pub url:         String,
    pub method:      String,
    /// Header name to a list of values.
    pub headers:     FlatRecord,
    pub body:        Vec<u8>,
    pub meta:        FlatRecord,
    pub encoding:    String,
    pub priority:    i64,
    pub dont_filter: bool,
    pub callback:    Option<String>,
    pub errback:     Option<String>,
    pub flags:       Vec<String>,
    pub cb_kwargs:   FlatRecord,
}

impl CrawlRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url:         url.into(),
            method:      "GET".to_string(),
            headers:     FlatRecord::new(),
            body:        Vec::new(),
            meta:        FlatRecord::new(),
            encoding:    "utf-8".to_string(),
            priority:    0,
            dont_filter: false,
            callback:    None,
            errback:     None,
            flags:       Vec::new(),
            cb_kwargs:   FlatRecord::new(),
        }
    }
}

impl fmt::Display for CrawlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if self.priority != 0 {
            write!(f, " priority={}", self.priority)?;
        }
        if let Some(callback) = &self.callback {
            write!(f, " callback={callback}")?;
        }
        if !self.meta.is_empty() {
            write!(f, " meta={}", Value::Map(self.meta.clone()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum RequestError {
    #[snafu(display("Callback `{name}` is not registered"))]
    UnknownCallback { name: String },

    #[snafu(display("Header `{name}` must hold a list of strings"))]
    MalformedHeader { name: String },

    #[snafu(display("Request record has unexpected fields: {fields:?}"))]
    UnexpectedFields { fields: Vec<String> },
}

/// Converts [`CrawlRequest`]s to flat records and back.
///
/// With a non-empty registry, only callbacks it names survive a round trip
/// through the queue.
#[derive(Debug, Clone, Default)]
pub struct RequestConverter {
    callbacks: BTreeSet<String>,
}

impl RequestConverter {
    pub fn new<I, S>(callbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            callbacks: callbacks.into_iter().map(Into::into).collect(),
        }
    }

    fn resolve(&self, name: Option<String>) -> Result<Option<String>, RequestError> {
        match name {
            Some(name) => {
                ensure!(
                    self.callbacks.is_empty() || self.callbacks.contains(&name),
                    UnknownCallbackSnafu { name }
                );
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }
}

fn strings(values: &[String]) -> Value {
    Value::List(values.iter().map(|s| Value::from(s.as_str())).collect())
}

impl RecordConverter for RequestConverter {
    type Item = CrawlRequest;

    fn to_record(&self, request: &CrawlRequest) -> Result<FlatRecord, BoxError> {
        let callback = self.resolve(request.callback.clone())?;
        let errback = self.resolve(request.errback.clone())?;

        let mut record = FlatRecord::new();
        record.insert("url".into(), request.url.as_str().into());
        record.insert("method".into(), request.method.as_str().into());
        record.insert("headers".into(), Value::Map(request.headers.clone()));
        record.insert("body".into(), request.body.as_slice().into());
        record.insert("meta".into(), Value::Map(request.meta.clone()));
        record.insert("_encoding".into(), request.encoding.as_str().into());
        record.insert("priority".into(), request.priority.into());
        record.insert("dont_filter".into(), request.dont_filter.into());
        record.insert("callback".into(), callback.into());
        record.insert("errback".into(), errback.into());
        record.insert("flags".into(), strings(&request.flags));
        record.insert("cb_kwargs".into(), Value::Map(request.cb_kwargs.clone()));
        Ok(record)
    }

    fn from_record(&self, mut record: FlatRecord) -> Result<CrawlRequest, BoxError> {
        let headers = record.take_map("headers")?;
        for (name, values) in &headers {
            let well_formed = matches!(
                values,
                Value::List(items) if items.iter().all(|v| v.as_str().is_some())
            );
            ensure!(well_formed, MalformedHeaderSnafu { name });
        }

        let flags = record
            .take_list("flags")?
            .into_iter()
            .filter_map(|flag| flag.as_str().map(str::to_string))
            .collect();

        let request = CrawlRequest {
            url: record.take_str("url")?,
            method: record.take_str("method")?,
            headers,
            body: record.take_bytes("body")?,
            meta: record.take_map("meta")?,
            encoding: record.take_str("_encoding")?,
            priority: record.take_i64("priority")?,
            dont_filter: record.take_bool("dont_filter")?,
            callback: self.resolve(record.take_opt_str("callback")?)?,
            errback: self.resolve(record.take_opt_str("errback")?)?,
            flags,
            cb_kwargs: record.take_map("cb_kwargs")?,
        };

        ensure!(
            record.is_empty(),
            UnexpectedFieldsSnafu {
                fields: record.into_keys().collect::<Vec<_>>(),
            }
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use frontq_queue::{MemoryStore, ObjectCodec, PrimitiveCodec, QueueError, RecordQueue};

    use super::*;

    fn full_request() -> CrawlRequest {
        let mut request = CrawlRequest::get("https://example.com/catalog?page=2");
        request.method = "POST".to_string();
        request.headers.insert(
            "Accept".into(),
            Value::List(vec!["text/html".into(), "*/*".into()]),
        );
        request.body = b"q=shoes".to_vec();
        request.meta.insert("depth".into(), 2i64.into());
        request.priority = -5;
        request.dont_filter = true;
        request.callback = Some("parse_item".to_string());
        request.flags = vec!["cached".to_string()];
        request.cb_kwargs.insert("category".into(), "shoes".into());
        request
    }

    #[test]
    fn test_record_round_trip() {
        let converter = RequestConverter::new(["parse_item"]);
        let request = full_request();

        let record = converter.to_record(&request).unwrap();
        assert_eq!(record["url"], Value::from("https://example.com/catalog?page=2"));
        assert_eq!(record["errback"], Value::Null);

        assert_eq!(converter.from_record(record).unwrap(), request);
    }

    #[test]
    fn test_unknown_callback_rejected_both_ways() {
        let converter = RequestConverter::new(["parse"]);
        let request = full_request();
        assert!(converter.to_record(&request).is_err());

        let record = RequestConverter::default().to_record(&request).unwrap();
        let err = converter.from_record(record).unwrap_err();
        assert!(err.to_string().contains("parse_item"));
    }

    #[test]
    fn test_unexpected_field_rejected() {
        let converter = RequestConverter::default();
        let mut record = converter.to_record(&CrawlRequest::get("http://x")).unwrap();
        record.insert("_class".into(), "FormRequest".into());

        let err = converter.from_record(record).unwrap_err();
        assert!(err.to_string().contains("_class"));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let converter = RequestConverter::default();
        let mut record = converter.to_record(&CrawlRequest::get("http://x")).unwrap();
        record.insert(
            "headers".into(),
            Value::Map(FlatRecord::from([("Accept".to_string(), Value::Int(1))])),
        );
        assert!(converter.from_record(record).is_err());
    }

    #[test]
    fn test_requests_through_both_codecs() {
        let mut object =
            RecordQueue::new(MemoryStore::fifo(), ObjectCodec, RequestConverter::default());
        let mut primitive =
            RecordQueue::new(MemoryStore::fifo(), PrimitiveCodec, RequestConverter::default());

        object.push(&full_request()).unwrap();
        primitive.push(&full_request()).unwrap();

        assert_eq!(object.pop().unwrap(), Some(full_request()));
        assert_eq!(primitive.pop().unwrap(), Some(full_request()));
    }

    #[test]
    fn test_unregistered_callback_leaves_queue_empty() {
        let mut queue = RecordQueue::new(
            MemoryStore::lifo(),
            PrimitiveCodec,
            RequestConverter::new(["parse"]),
        );
        let err = queue.push(&full_request()).unwrap_err();
        assert!(matches!(err, QueueError::RecordConversion { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_display() {
        let mut request = CrawlRequest::get("http://x");
        assert_eq!(request.to_string(), "GET http://x");
        request.priority = 3;
        request.callback = Some("parse".to_string());
        assert_eq!(request.to_string(), "GET http://x priority=3 callback=parse");
    }
}
