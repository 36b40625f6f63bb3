//! Corpus-wide TF-IDF vectorizer.
//!
//! Fits a vocabulary over every paragraph in the corpus before emitting any
//! vector, so it is a batch algorithm: adding one paragraph can change
//! every vector.
//!
//! # Algorithm
//!
//! 1. Lowercase each text and extract tokens matching `\b\w\w+\b`.
//! 2. Count each term over the whole corpus; keep the `max_features` most
//!    frequent (ties broken alphabetically).
//! 3. Index the kept terms alphabetically.
//! 4. `idf(t) = ln((1 + n) / (1 + df(t))) + 1` where `n` is the number of
//!    texts and `df(t)` the number of texts containing `t`.
//! 5. A text's vector is raw term count × idf, L2-normalized. Texts with
//!    no in-vocabulary term map to the zero vector.
//!
//! # Example
//!
//! ```rust
//! use speech_eda_core::tfidf::TfidfVectorizer;
//!
//! let corpus = ["the union is strong", "the people are strong"];
//! let mut v = TfidfVectorizer::new(1536);
//! let vectors = v.fit_transform(&corpus).unwrap();
//! assert_eq!(vectors.len(), 2);
//! assert_eq!(vectors[0].len(), v.vocabulary().len());
//! ```

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::{Error, Result};

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is a valid regex"))
}

/// Lowercase and split into word tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    token_regex()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// TF-IDF model fitted over a fixed corpus.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    max_features: usize,
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Create an unfitted vectorizer keeping at most `max_features` terms.
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            vocabulary: Vec::new(),
            index: HashMap::new(),
            idf: Vec::new(),
        }
    }

    /// Fitted vocabulary in column order.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Learn vocabulary and idf weights from `corpus`.
    pub fn fit<S: AsRef<str>>(&mut self, corpus: &[S]) -> Result<()> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus("no texts to fit".to_string()));
        }

        let mut term_freq: HashMap<String, u64> = HashMap::new();
        let mut doc_freq: HashMap<String, u64> = HashMap::new();
        for text in corpus {
            let tokens = tokenize(text.as_ref());
            let mut seen: HashSet<&str> = HashSet::new();
            for tok in &tokens {
                *term_freq.entry(tok.clone()).or_insert(0) += 1;
                if seen.insert(tok.as_str()) {
                    *doc_freq.entry(tok.clone()).or_insert(0) += 1;
                }
            }
        }

        if term_freq.is_empty() {
            return Err(Error::EmptyCorpus("no tokens in any text".to_string()));
        }

        let mut ranked: Vec<(String, u64)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let kept: BTreeMap<String, ()> = ranked.into_iter().map(|(t, _)| (t, ())).collect();
        self.vocabulary = kept.into_keys().collect();
        self.index = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        let n = corpus.len() as f64;
        self.idf = self
            .vocabulary
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        Ok(())
    }

    /// Vectorize one text with the fitted model.
    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f64; self.vocabulary.len()];
        for tok in tokenize(text) {
            if let Some(&i) = self.index.get(&tok) {
                counts[i] += 1.0;
            }
        }

        for (c, idf) in counts.iter_mut().zip(self.idf.iter()) {
            *c *= idf;
        }

        let norm = counts.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for c in counts.iter_mut() {
                *c /= norm;
            }
        }

        counts.into_iter().map(|x| x as f32).collect()
    }

    /// Fit on `corpus`, then vectorize every text in it.
    pub fn fit_transform<S: AsRef<str>>(&mut self, corpus: &[S]) -> Result<Vec<Vec<f32>>> {
        self.fit(corpus)?;
        Ok(corpus.iter().map(|t| self.transform(t.as_ref())).collect())
    }
}
