//! Lexicon sentiment scorer for tweet text.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tweetharvest_core::Tweet;

use crate::error::AnalysisError;

/// Built-in word weights for English and Indonesian social-media text.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final score is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive
    ("great", 0.4),
    ("good", 0.3),
    ("excellent", 0.5),
    ("amazing", 0.5),
    ("awesome", 0.5),
    ("love", 0.5),
    ("loved", 0.5),
    ("best", 0.5),
    ("happy", 0.4),
    ("thanks", 0.3),
    ("recommend", 0.4),
    ("win", 0.4),
    ("success", 0.4),
    ("fast", 0.2),
    ("helpful", 0.4),
    ("bagus", 0.4),
    ("mantap", 0.5),
    ("keren", 0.4),
    ("senang", 0.4),
    ("suka", 0.3),
    ("terima", 0.1),
    ("kasih", 0.2),
    ("hebat", 0.5),
    // Negative
    ("bad", -0.4),
    ("terrible", -0.6),
    ("awful", -0.6),
    ("worst", -0.6),
    ("hate", -0.6),
    ("angry", -0.5),
    ("broken", -0.4),
    ("slow", -0.3),
    ("scam", -0.7),
    ("fail", -0.4),
    ("failed", -0.4),
    ("problem", -0.3),
    ("disappointed", -0.5),
    ("buruk", -0.5),
    ("jelek", -0.4),
    ("kecewa", -0.5),
    ("marah", -0.5),
    ("benci", -0.6),
    ("lambat", -0.3),
    ("rusak", -0.4),
    ("gagal", -0.4),
];

/// Sentiment class derived from the sign of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn from_score(score: f32) -> Self {
        if score > 0.0 {
            SentimentLabel::Positive
        } else if score < 0.0 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

/// Word-weight table. Use [`Lexicon::builtin`] or load a `word,weight` file.
#[derive(Debug, Clone)]
pub struct Lexicon {
    weights: HashMap<String, f32>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            weights: LEXICON
                .iter()
                .map(|&(word, weight)| (word.to_string(), weight))
                .collect(),
        }
    }

    /// Parses one `word,weight` pair per line. Blank lines and lines starting
    /// with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidEntry`] for a line without a comma or
    /// with a non-numeric weight.
    pub fn parse(source: &str) -> Result<Self, AnalysisError> {
        let mut weights = HashMap::new();
        for (idx, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (word, weight) = line.split_once(',').ok_or_else(|| AnalysisError::InvalidEntry {
                line: idx + 1,
                reason: "expected `word,weight`".to_string(),
            })?;
            let weight: f32 = weight
                .trim()
                .parse()
                .map_err(|e| AnalysisError::InvalidEntry {
                    line: idx + 1,
                    reason: format!("weight \"{}\": {e}", weight.trim()),
                })?;
            weights.insert(word.trim().to_lowercase(), weight);
        }
        Ok(Self { weights })
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Io`] if the file cannot be read, or
    /// [`AnalysisError::InvalidEntry`] as for [`Lexicon::parse`].
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let source = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let lexicon = Self::parse(&source)?;
        tracing::debug!(path = %path.display(), words = lexicon.len(), "loaded lexicon");
        Ok(lexicon)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sums the weights of every known word in `text`, clamped to `[-1.0, 1.0]`.
    #[must_use]
    pub fn score(&self, text: &str) -> f32 {
        let mut score = 0.0_f32;
        for word in text.split_whitespace() {
            let w = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if let Some(weight) = self.weights.get(&w) {
                score += weight;
            }
        }
        score.clamp(-1.0, 1.0)
    }
}

/// Label distribution over a set of tweets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub average_score: f32,
}

impl SentimentSummary {
    #[must_use]
    pub fn percentage(&self, label: SentimentLabel) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
        };
        #[allow(clippy::cast_precision_loss)]
        let pct = count as f64 * 100.0 / self.total as f64;
        pct
    }
}

#[must_use]
pub fn summarize_sentiment(tweets: &[Tweet], lexicon: &Lexicon) -> SentimentSummary {
    let mut summary = SentimentSummary {
        total: tweets.len(),
        positive: 0,
        negative: 0,
        neutral: 0,
        average_score: 0.0,
    };
    let mut sum = 0.0_f32;
    for tweet in tweets {
        let score = lexicon.score(&tweet.text);
        sum += score;
        match SentimentLabel::from_score(score) {
            SentimentLabel::Positive => summary.positive += 1,
            SentimentLabel::Negative => summary.negative += 1,
            SentimentLabel::Neutral => summary.neutral += 1,
        }
    }
    if !tweets.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let n = tweets.len() as f32;
        summary.average_score = sum / n;
    }
    summary
}
