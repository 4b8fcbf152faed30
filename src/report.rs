//! Per-stage outcomes and the report a whole run produces.
//!
//! A [`StageReport`] is assembled by a single [`StageReportBuilder`] owned by
//! one pipeline run. Stages are appended in execution order and the finished
//! report is handed to the caller as an immutable value.

use crate::error::{DocConvError, StageError};
use serde::Serialize;

/// Outcome of a single named stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    /// Fixed stage name, e.g. `"processThumb"`.
    pub stage_name: String,
    pub succeeded: bool,
    /// Captured tool output or a short description. May be empty.
    pub message: Option<String>,
    /// Why the stage failed. Always `None` when `succeeded` is true.
    pub cause: Option<StageError>,
}

impl StageResult {
    /// A successful stage with an optional message.
    pub fn success(stage_name: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage_name: stage_name.into(),
            succeeded: true,
            message: (!message.is_empty()).then_some(message),
            cause: None,
        }
    }

    /// A failed stage. The message defaults to the error's display text.
    pub fn failure(stage_name: impl Into<String>, cause: StageError) -> Self {
        Self {
            stage_name: stage_name.into(),
            succeeded: false,
            message: Some(cause.to_string()),
            cause: Some(cause),
        }
    }

    /// Same as [`StageResult::failure`] but keeps captured tool output as the message.
    pub fn failure_with_output(
        stage_name: impl Into<String>,
        cause: StageError,
        output: impl Into<String>,
    ) -> Self {
        let output = output.into();
        let mut result = Self::failure(stage_name, cause);
        if !output.is_empty() {
            result.message = Some(output);
        }
        result
    }

    /// Re-label a result produced by a collaborator under the pipeline's stage name.
    pub fn renamed(mut self, stage_name: &str) -> Self {
        self.stage_name = stage_name.to_string();
        self
    }
}

/// Overall verdict derived from a [`StageReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every recorded stage succeeded.
    Success,
    /// At least one stage succeeded and at least one failed.
    Partial,
    /// Nothing succeeded, or the run aborted before any stage.
    Failure,
}

/// Ordered collection of stage outcomes for one run.
///
/// Iteration order is execution order. Stage names are unique.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    stages: Vec<StageResult>,
    /// Set when the run stopped before its stages could execute.
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted: Option<String>,
}

impl StageReport {
    /// Look up a stage by name.
    pub fn get(&self, stage_name: &str) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage_name == stage_name)
    }

    /// Stage results in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.stages.iter()
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.stage_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages that did not succeed, in execution order.
    pub fn failed(&self) -> Vec<&StageResult> {
        self.stages.iter().filter(|s| !s.succeeded).collect()
    }

    /// Description of the fatal error that stopped the run early, if any.
    pub fn aborted(&self) -> Option<&str> {
        self.aborted.as_deref()
    }

    /// True when the run completed and every stage succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome() == RunOutcome::Success
    }

    pub fn outcome(&self) -> RunOutcome {
        let ok = self.stages.iter().filter(|s| s.succeeded).count();
        if self.aborted.is_none() && !self.stages.is_empty() && ok == self.stages.len() {
            RunOutcome::Success
        } else if ok > 0 {
            RunOutcome::Partial
        } else {
            RunOutcome::Failure
        }
    }
}

impl<'a> IntoIterator for &'a StageReport {
    type Item = &'a StageResult;
    type IntoIter = std::slice::Iter<'a, StageResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

/// Append-only builder for a [`StageReport`].
#[derive(Debug, Default)]
pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage result. A name already present is rejected, never overwritten.
    pub fn push(&mut self, result: StageResult) -> Result<&StageResult, DocConvError> {
        if self.report.get(&result.stage_name).is_some() {
            return Err(DocConvError::Internal(format!(
                "stage '{}' recorded twice in one run",
                result.stage_name
            )));
        }
        self.report.stages.push(result);
        let last = self.report.stages.len() - 1;
        Ok(&self.report.stages[last])
    }

    /// Finish the report after a fatal error.
    pub fn abort(mut self, error: &DocConvError) -> StageReport {
        self.report.aborted = Some(error.to_string());
        self.report
    }

    pub fn finish(self) -> StageReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str) -> StageResult {
        StageResult::success(name, "")
    }

    fn failed(name: &str) -> StageResult {
        StageResult::failure(name, StageError::Timeout { millis: 1000 })
    }

    #[test]
    fn preserves_insertion_order() {
        let mut b = StageReportBuilder::new();
        b.push(ok("processThumb")).unwrap();
        b.push(ok("processSWF")).unwrap();
        b.push(ok("processXML")).unwrap();
        let report = b.finish();
        assert_eq!(report.names(), vec!["processThumb", "processSWF", "processXML"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut b = StageReportBuilder::new();
        b.push(ok("processThumb")).unwrap();
        let err = b.push(failed("processThumb")).unwrap_err();
        assert!(err.to_string().contains("recorded twice"));
        let report = b.finish();
        assert_eq!(report.len(), 1);
        assert!(report.get("processThumb").unwrap().succeeded);
    }

    #[test]
    fn outcome_classification() {
        let mut b = StageReportBuilder::new();
        b.push(ok("a")).unwrap();
        b.push(ok("b")).unwrap();
        assert_eq!(b.finish().outcome(), RunOutcome::Success);

        let mut b = StageReportBuilder::new();
        b.push(ok("a")).unwrap();
        b.push(failed("b")).unwrap();
        let report = b.finish();
        assert_eq!(report.outcome(), RunOutcome::Partial);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].stage_name, "b");

        let mut b = StageReportBuilder::new();
        b.push(failed("a")).unwrap();
        assert_eq!(b.finish().outcome(), RunOutcome::Failure);

        assert_eq!(StageReport::default().outcome(), RunOutcome::Failure);
    }

    #[test]
    fn aborted_report_is_never_success() {
        let b = StageReportBuilder::new();
        let report = b.abort(&DocConvError::Internal("boom".into()));
        assert!(!report.is_success());
        assert!(report.aborted().unwrap().contains("boom"));
        assert!(report.is_empty());
    }

    #[test]
    fn empty_success_message_becomes_none() {
        let r = StageResult::success("processXML", "");
        assert!(r.message.is_none());
        let r = StageResult::success("processXML", "written");
        assert_eq!(r.message.as_deref(), Some("written"));
    }

    #[test]
    fn failure_keeps_captured_output() {
        let r = StageResult::failure_with_output(
            "processOpenOffice",
            StageError::NonZeroExit {
                code: 1,
                stderr: "boom".into(),
            },
            "stdout text",
        );
        assert!(!r.succeeded);
        assert_eq!(r.message.as_deref(), Some("stdout text"));
        assert!(r.cause.is_some());
    }

    #[test]
    fn report_serialises_in_order() {
        let mut b = StageReportBuilder::new();
        b.push(ok("processThumb")).unwrap();
        b.push(failed("processSWF")).unwrap();
        let json = serde_json::to_value(b.finish()).unwrap();
        let stages = json["stages"].as_array().unwrap();
        assert_eq!(stages[0]["stage_name"], "processThumb");
        assert_eq!(stages[1]["succeeded"], false);
        assert!(json.get("aborted").is_none());
    }
}
