pub mod normalize;
pub mod tokenizer;

pub use normalize::normalize_text;
pub use tokenizer::{LexiconEntry, LexiconTokenizer, Token, Tokenizer};
