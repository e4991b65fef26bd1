use lopdf::ObjectId;
use serde::Serialize;

/// One chapter start: the unit handed from an outline source to the materializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub title: String,
    pub page: u32,
}

impl Bookmark {
    pub fn new(title: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Page object reference taken from an explicit destination array.
    Explicit(ObjectId),
    /// Raw key bytes into the document's named destination table.
    Named(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutlineNode {
    pub title: String,
    pub children: Vec<OutlineNode>,
    pub destination: Option<Destination>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipNotice {
    pub item_key: String,
    pub attachment_key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitCounts {
    pub items: usize,
    pub pdf_attachments: usize,
    pub attachments_split: usize,
    pub attachments_skipped: usize,
    pub templates_bootstrapped: usize,
    pub sections_created: usize,
    pub outline_nodes_skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub report_version: u32,
    pub status: SplitStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub collection: String,
    pub field_copy: String,
    pub counts: SplitCounts,
    pub skipped: Vec<SkipNotice>,
    pub failure_reason: Option<String>,
}

impl SplitReport {
    pub fn new(started_at: String, collection: &str, field_copy: &str) -> Self {
        Self {
            report_version: 1,
            status: SplitStatus::Completed,
            started_at,
            finished_at: None,
            collection: collection.to_string(),
            field_copy: field_copy.to_string(),
            counts: SplitCounts::default(),
            skipped: Vec::new(),
            failure_reason: None,
        }
    }

    pub fn record_skip(&mut self, item_key: &str, attachment_key: &str, reason: &str) {
        self.counts.attachments_skipped += 1;
        self.skipped.push(SkipNotice {
            item_key: item_key.to_string(),
            attachment_key: attachment_key.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn fail(&mut self, err: &anyhow::Error) {
        self.failure_reason = Some(format!("{err:#}"));
    }

    pub fn finish(&mut self, finished_at: String) {
        self.status = if self.failure_reason.is_some() {
            SplitStatus::Failed
        } else if self.counts.attachments_skipped > 0 || self.counts.templates_bootstrapped > 0 {
            SplitStatus::Partial
        } else {
            SplitStatus::Completed
        };
        self.finished_at = Some(finished_at);
    }
}
