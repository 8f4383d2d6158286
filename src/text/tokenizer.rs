use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LexiconError;

/// A morphological token. Offsets are char offsets into the tokenized text,
/// end exclusive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub surface: String,
    pub lemma: String,
    pub part_of_speech: String,
    pub reading: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

pub const NOUN_TAGS: &[&str] = &["NOUN", "NAME", "PLACE_NAME", "PRONOUN"];
pub const VERB_TAGS: &[&str] = &["VERB", "AUXILIARY_VERB"];
pub const ADJECTIVE_TAGS: &[&str] = &["ADJECTIVE", "ADJECTIVAL_NOUN"];
pub const ADVERB_TAGS: &[&str] = &["ADVERB"];

/// Turns raw OCR text into tagged tokens. Empty input yields no tokens.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn extract_words(&self, text: &str, allowed_pos: &[&str]) -> Vec<Token> {
        filter_by_pos(self.tokenize(text), allowed_pos)
    }

    fn extract_nouns(&self, text: &str) -> Vec<Token> {
        self.extract_words(text, NOUN_TAGS)
    }

    fn extract_verbs(&self, text: &str) -> Vec<Token> {
        self.extract_words(text, VERB_TAGS)
    }

    fn extract_adjectives(&self, text: &str) -> Vec<Token> {
        self.extract_words(text, ADJECTIVE_TAGS)
    }

    fn extract_adverbs(&self, text: &str) -> Vec<Token> {
        self.extract_words(text, ADVERB_TAGS)
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        (**self).tokenize(text)
    }
}

pub fn filter_by_pos(tokens: Vec<Token>, allowed_pos: &[&str]) -> Vec<Token> {
    tokens.into_iter().filter(|t| allowed_pos.contains(&t.part_of_speech.as_str())).collect()
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub surface: String,
    pub lemma: String,
    #[serde(default)]
    pub reading: String,
    #[serde(default = "unknown_pos")]
    pub pos: String,
}

fn unknown_pos() -> String {
    "UNKNOWN".to_string()
}

#[derive(Deserialize, Debug, Default)]
struct LexiconFile {
    #[serde(default, rename = "entry")]
    entries: Vec<LexiconEntry>,
}

/// Greedy longest-match tokenizer over a fixed surface-form lexicon.
///
/// Characters no entry covers come out as one-char tokens whose lemma is the
/// character itself. Whitespace never produces tokens.
#[derive(Debug, Default, Clone)]
pub struct LexiconTokenizer {
    by_surface: HashMap<String, LexiconEntry>,
    longest: usize,
}

impl LexiconTokenizer {
    pub fn new(entries: impl IntoIterator<Item = LexiconEntry>) -> Self {
        let mut tokenizer = Self::default();
        for mut entry in entries {
            let surface = entry.surface.trim().to_string();
            if surface.is_empty() || entry.lemma.trim().is_empty() {
                continue;
            }
            tokenizer.longest = tokenizer.longest.max(surface.chars().count());
            entry.surface = surface.clone();
            tokenizer.by_surface.insert(surface, entry);
        }
        tokenizer
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let file: LexiconFile = toml::from_str(contents)?;
        Ok(Self::new(file.entries))
    }

    pub fn load(path: &Path) -> Result<Self, LexiconError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| LexiconError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&contents).map_err(|source| LexiconError::Parse { path: path.to_path_buf(), source })
    }

    pub fn len(&self) -> usize {
        self.by_surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_surface.is_empty()
    }

    fn longest_match(&self, chars: &[char], start: usize) -> Option<(usize, &LexiconEntry)> {
        let max = self.longest.min(chars.len() - start);
        (1..=max).rev().find_map(|len| {
            let candidate: String = chars[start..start + len].iter().collect();
            self.by_surface.get(&candidate).map(|entry| (len, entry))
        })
    }
}

impl Tokenizer for LexiconTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut pos = 0;
        while pos < chars.len() {
            if chars[pos].is_whitespace() {
                pos += 1;
                continue;
            }
            let token = match self.longest_match(&chars, pos) {
                Some((len, entry)) => Token {
                    surface: entry.surface.clone(),
                    lemma: entry.lemma.clone(),
                    part_of_speech: entry.pos.clone(),
                    reading: if entry.reading.is_empty() { entry.surface.clone() } else { entry.reading.clone() },
                    start_offset: pos,
                    end_offset: pos + len,
                },
                None => {
                    let surface = chars[pos].to_string();
                    Token {
                        lemma: surface.clone(),
                        reading: surface.clone(),
                        surface,
                        part_of_speech: unknown_pos(),
                        start_offset: pos,
                        end_offset: pos + 1,
                    }
                }
            };
            pos = token.end_offset;
            tokens.push(token);
        }
        tokens
    }
}
