use std::collections::HashSet;

use crate::models::{RawFile, UploadCandidate};

pub const DEFAULT_ACCEPTED_TYPES: [&str; 4] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
];

const REJECTION_NOTICE: &str = "Some files were rejected. Please upload PDF/JPG/PNG/WEBP.";

/// Result of one submission: the newly accepted files and the aggregate
/// notice, if anything was rejected.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub accepted: Vec<UploadCandidate>,
    pub rejection_notice: Option<String>,
}

/// Receives the full ordered set after every successful append and after
/// clear.
pub type IntakeObserver = Box<dyn Fn(&[UploadCandidate]) + Send + Sync>;

/// Accepts candidate receipt files by media-type allow-list and keeps the
/// ordered set of accepted files for the extraction stage.
pub struct IntakeService {
    allowed_types: HashSet<String>,
    accepted: Vec<UploadCandidate>,
    rejection_notice: Option<String>,
    observer: Option<IntakeObserver>,
}

impl IntakeService {
    pub fn new() -> Self {
        Self::with_allowed_types(DEFAULT_ACCEPTED_TYPES)
    }

    pub fn with_allowed_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IntakeService {
            allowed_types: types.into_iter().map(Into::into).collect(),
            accepted: Vec::new(),
            rejection_notice: None,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: impl Fn(&[UploadCandidate]) + Send + Sync + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Partitions the input by allow-list membership, appends the accepted
    /// files in order, and returns the delta. Rejected files never block the
    /// accepted subset; they only produce the single aggregate notice. A
    /// fully valid submission clears a previous notice.
    pub fn submit(&mut self, files: Vec<RawFile>) -> SubmitOutcome {
        let mut accepted = Vec::new();
        let mut rejected = 0usize;

        for file in files {
            if self.allowed_types.contains(&file.media_type) {
                accepted.push(UploadCandidate::from_raw(file));
            } else {
                rejected += 1;
            }
        }

        if rejected > 0 {
            tracing::warn!(rejected, "rejected files with unsupported media types");
            self.rejection_notice = Some(REJECTION_NOTICE.to_string());
        } else {
            self.rejection_notice = None;
        }

        if accepted.is_empty() {
            return SubmitOutcome {
                accepted,
                rejection_notice: self.rejection_notice.clone(),
            };
        }

        self.accepted.extend(accepted.iter().cloned());
        tracing::debug!(added = accepted.len(), total = self.accepted.len(), "accepted files");
        if let Some(observer) = &self.observer {
            observer(&self.accepted);
        }

        SubmitOutcome {
            accepted,
            rejection_notice: self.rejection_notice.clone(),
        }
    }

    /// Empties the accepted set and the notice, notifying the observer with
    /// the empty set.
    pub fn clear(&mut self) {
        self.accepted.clear();
        self.rejection_notice = None;
        if let Some(observer) = &self.observer {
            observer(&self.accepted);
        }
    }

    pub fn files(&self) -> &[UploadCandidate] {
        &self.accepted
    }

    pub fn rejection_notice(&self) -> Option<&str> {
        self.rejection_notice.as_deref()
    }
}

impl Default for IntakeService {
    fn default() -> Self {
        Self::new()
    }
}
