use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

pub type QuestionId = u32;

/// Canonical answer as stored in the data file: either a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(f64),
    Text(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Number(n) => write!(f, "{}", n),
            Answer::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub image_url: String,
    pub question: String,
    pub answer: Answer,
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    #[serde(default)]
    images: Vec<RawQuestion>,
}

// Fields are optional here so one bad entry doesn't reject the whole file.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    id: Option<QuestionId>,
    url: Option<String>,
    question: Option<String>,
    answer: Option<Answer>,
}

impl RawQuestion {
    fn into_record(self) -> Option<QuestionRecord> {
        let image_url = self.url.filter(|url| !url.trim().is_empty())?;
        let question = self.question.filter(|q| !q.trim().is_empty())?;
        Some(QuestionRecord {
            id: self.id?,
            image_url,
            question,
            answer: self.answer?,
        })
    }
}

/// Hands out question records in a shuffled, repeating cycle: no record is
/// dispensed twice until every record has been dispensed once.
pub struct QuestionPool {
    records: Vec<Arc<QuestionRecord>>,
    dispensed: HashSet<QuestionId>,
    rng: StdRng,
}

impl QuestionPool {
    pub fn new(records: Vec<QuestionRecord>) -> Self {
        Self::with_rng(records, StdRng::from_entropy())
    }

    /// Build a pool with a caller-supplied RNG (seeded in tests).
    pub fn with_rng(records: Vec<QuestionRecord>, rng: StdRng) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.id) {
                unique.push(Arc::new(record));
            } else {
                warn!("Skipping question with duplicate id {}", record.id);
            }
        }

        Self {
            records: unique,
            dispensed: HashSet::new(),
            rng,
        }
    }

    /// Parse a `{ "images": [...] }` document.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: QuestionFile =
            serde_json::from_str(json).context("Failed to parse question data")?;

        let total = file.images.len();
        let records: Vec<QuestionRecord> = file
            .images
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id;
                let record = raw.into_record();
                if record.is_none() {
                    warn!("Skipping invalid question record (id {:?})", id);
                }
                record
            })
            .collect();

        info!("Loaded {} of {} question records", records.len(), total);
        Ok(Self::new(records))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question file {}", path.display()))?;
        let pool = Self::from_json(&json)?;
        if pool.is_empty() {
            return Err(anyhow!("No usable questions in {}", path.display()));
        }
        Ok(pool)
    }

    /// Draw the next question. `None` only when the pool holds no records.
    pub fn next(&mut self) -> Option<Arc<QuestionRecord>> {
        if self.records.is_empty() {
            error!("No questions available in the pool");
            return None;
        }

        if self.dispensed.len() >= self.records.len() {
            self.dispensed.clear();
            info!("All questions used, resetting pool");
        }

        let mut eligible: Vec<&Arc<QuestionRecord>> = self
            .records
            .iter()
            .filter(|record| !self.dispensed.contains(&record.id))
            .collect();
        eligible.shuffle(&mut self.rng);

        let selected = Arc::clone(eligible.first()?);
        self.dispensed.insert(selected.id);
        Some(selected)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records still to be dispensed before the cycle resets.
    pub fn remaining_in_cycle(&self) -> usize {
        self.records.len() - self.dispensed.len()
    }
}
