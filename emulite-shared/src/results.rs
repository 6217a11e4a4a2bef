//! Intermediate test results in newline-delimited JSON.
//!
//! Each record is written as a single line of the form
//! `{"testResult":{...}}` with object keys sorted and no extra whitespace,
//! so the output can be appended to and consumed line by line.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EmuliteError, EmuliteResult};

/// Common values for [`TestResult::status`].
pub mod status {
    pub const PASS: &str = "PASS";
    pub const SKIP: &str = "SKIP";
    pub const FAIL: &str = "FAIL";
}

/// Start time recorded when none is given.
pub const DEFAULT_START_TIME: &str = "2015-10-21T07:28:00.000Z";

/// Run duration recorded when none is given.
pub const DEFAULT_RUN_DURATION: &str = "1.00s";

/// MIME type recorded for artifacts when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file produced by a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub file_path: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl Artifact {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            remote_url: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_remote_url(mut self, remote_url: impl Into<String>) -> Self {
        self.remote_url = Some(remote_url.into());
        self
    }
}

/// A `key:value` tag attached to a test result.
///
/// Keys are not unique; the same key may appear several times on one result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl FromStr for Tag {
    type Err = EmuliteError;

    /// Splits on the first colon only, so `"a:b:c"` yields key `a`, value `b:c`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s.split_once(':').ok_or_else(|| {
            EmuliteError::InvalidArgument(format!("tag '{}' is not of the form key:value", s))
        })?;

        Ok(Tag {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Result of a single test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub test_path: String,
    pub status: String,
    /// Explicit expectation; `None` means "derive from status".
    pub is_expected: Option<bool>,
    pub start_time: String,
    pub run_duration: String,
    pub output_artifacts: Option<BTreeMap<String, Artifact>>,
    pub tags: Option<Vec<Tag>>,
}

impl TestResult {
    /// Create a passing result for `test_path` with default timings.
    pub fn new(test_path: impl Into<String>) -> Self {
        Self {
            test_path: test_path.into(),
            status: status::PASS.to_string(),
            is_expected: None,
            start_time: DEFAULT_START_TIME.to_string(),
            run_duration: DEFAULT_RUN_DURATION.to_string(),
            output_artifacts: None,
            tags: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_is_expected(mut self, is_expected: bool) -> Self {
        self.is_expected = Some(is_expected);
        self
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = start_time.into();
        self
    }

    pub fn with_run_duration(mut self, run_duration: impl Into<String>) -> Self {
        self.run_duration = run_duration.into();
        self
    }

    pub fn with_artifact(mut self, name: impl Into<String>, artifact: Artifact) -> Self {
        self.output_artifacts
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), artifact);
        self
    }

    /// Attach tags given as `key:value` strings.
    pub fn with_tags<I, S>(mut self, tags: I) -> EmuliteResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = tags
            .into_iter()
            .map(|tag| tag.as_ref().parse::<Tag>())
            .collect::<EmuliteResult<Vec<_>>>()?;
        self.tags = Some(parsed);
        Ok(self)
    }

    /// Whether the status was expected.
    ///
    /// Defaults to true for `PASS` and `SKIP` and false otherwise, unless set
    /// explicitly with [`TestResult::with_is_expected`].
    pub fn expected(&self) -> bool {
        self.is_expected
            .unwrap_or(self.status == status::PASS || self.status == status::SKIP)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestResultRecord<'a> {
    test_path: &'a str,
    status: &'a str,
    is_expected: bool,
    start_time: &'a str,
    run_duration: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_artifacts: Option<&'a BTreeMap<String, Artifact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [Tag]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    test_result: TestResultRecord<'a>,
}

impl Serialize for TestResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record().serialize(serializer)
    }
}

impl TestResult {
    fn record(&self) -> TestResultRecord<'_> {
        TestResultRecord {
            test_path: &self.test_path,
            status: &self.status,
            is_expected: self.expected(),
            start_time: &self.start_time,
            run_duration: &self.run_duration,
            output_artifacts: self.output_artifacts.as_ref(),
            tags: self.tags.as_deref(),
        }
    }

    /// Render as one line of the intermediate results log (no trailing newline).
    pub fn to_json_line(&self) -> EmuliteResult<String> {
        let envelope = Envelope {
            test_result: self.record(),
        };
        // Going through Value sorts keys at every nesting level.
        let value = serde_json::to_value(&envelope)
            .map_err(|e| EmuliteError::Internal(format!("Failed to encode test result: {}", e)))?;
        Ok(value.to_string())
    }
}

/// Write results to `writer`, one JSON object per line.
pub fn serialize_intermediate_results<W: Write>(
    results: &[TestResult],
    mut writer: W,
) -> EmuliteResult<()> {
    for result in results {
        let line = result.to_json_line()?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| EmuliteError::Storage(format!("Failed to write test result: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| EmuliteError::Storage(format!("Failed to flush test results: {}", e)))
}

/// Write results to the file at `path`, replacing any previous content.
pub fn serialize_intermediate_results_to_path(
    results: &[TestResult],
    path: &Path,
) -> EmuliteResult<()> {
    let file = File::create(path).map_err(|e| {
        EmuliteError::Storage(format!(
            "Failed to create results file {}: {}",
            path.display(),
            e
        ))
    })?;
    serialize_intermediate_results(results, BufWriter::new(file))
}
