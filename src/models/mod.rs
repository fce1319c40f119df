use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A file as handed over by the caller (drag-and-drop, picker, test fixture).
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// An accepted file awaiting extraction. `id` keys all downstream results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCandidate {
    pub id: Uuid,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn from_raw(file: RawFile) -> Self {
        UploadCandidate {
            id: Uuid::new_v4(),
            size_bytes: file.bytes.len() as u64,
            name: file.name,
            media_type: file.media_type,
            bytes: file.bytes,
        }
    }
}

/// Base64-encoded receipt payload sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub media_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        ImagePayload {
            media_type: media_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn from_candidate(candidate: &UploadCandidate) -> Self {
        Self::from_bytes(candidate.media_type.clone(), &candidate.bytes)
    }
}

/// A validated extraction result. Only produced after schema and business
/// validation, so `total` is finite and non-negative and `category_code` is
/// non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub date: NaiveDate,
    pub total: f64,
    #[serde(rename = "categoryCode")]
    pub category_code: String,
}

/// An expense bucket with the PCG account-code prefixes it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub name: String,
    pub color: String,
    pub codes: Vec<String>,
}

impl ExpenseCategory {
    pub fn matches(&self, code: &str) -> bool {
        let code = code.trim();
        self.codes.iter().any(|prefix| code.starts_with(prefix.as_str()))
    }
}

/// Ordered category buckets plus a fallback for unmapped codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMap {
    pub categories: Vec<ExpenseCategory>,
    pub fallback: ExpenseCategory,
}

impl CategoryMap {
    /// Index into `categories` of the first bucket whose prefix matches,
    /// or `None` for the fallback bucket.
    pub fn bucket_index(&self, code: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.matches(code))
    }

    pub fn resolve(&self, code: &str) -> &ExpenseCategory {
        match self.bucket_index(code) {
            Some(index) => &self.categories[index],
            None => &self.fallback,
        }
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        CategoryMap {
            categories: vec![
                ExpenseCategory {
                    name: "Travel".to_string(),
                    color: "#7C3AED".to_string(),
                    codes: vec!["6251".to_string(), "6256".to_string()],
                },
                ExpenseCategory {
                    name: "Meals".to_string(),
                    color: "#A78BFA".to_string(),
                    codes: vec!["6257".to_string()],
                },
                ExpenseCategory {
                    name: "Software".to_string(),
                    color: "#DDD6FE".to_string(),
                    codes: vec!["651".to_string()],
                },
            ],
            fallback: ExpenseCategory {
                name: "Uncategorized".to_string(),
                color: "#E4E4E7".to_string(),
                codes: Vec::new(),
            },
        }
    }
}

/// One slice of the expense donut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDatum {
    pub category: String,
    pub amount: f64,
    pub color: String,
}

/// A display row derived from the breakdown: amount formatted as EUR plus
/// its share of the grand total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRow {
    pub category: String,
    pub color: String,
    pub amount: f64,
    pub formatted_amount: String,
    pub percentage: u32,
}

/// Aggregated per-category totals in category declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    pub data: Vec<ExpenseDatum>,
    pub grand_total: f64,
}

impl ExpenseBreakdown {
    /// Share of the grand total, rounded to whole percent. Zero when the
    /// grand total is zero.
    pub fn percentage(&self, amount: f64) -> u32 {
        if self.grand_total > 0.0 {
            (amount / self.grand_total * 100.0).round() as u32
        } else {
            0
        }
    }

    pub fn formatted_total(&self) -> String {
        crate::utils::format_currency_eur(self.grand_total)
    }

    pub fn rows(&self) -> Vec<ExpenseRow> {
        self.data
            .iter()
            .map(|datum| ExpenseRow {
                category: datum.category.clone(),
                color: datum.color.clone(),
                amount: datum.amount,
                formatted_amount: crate::utils::format_currency_eur(datum.amount),
                percentage: self.percentage(datum.amount),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Extraction settings, passed in at construction. The credential arrives
/// out of band and is never logged.
#[derive(Clone)]
pub struct ExtractorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl ExtractorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        ExtractorConfig {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 1024,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}
