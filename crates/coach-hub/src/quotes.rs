use std::{fs, io, path::Path};

use rand::seq::SliceRandom;
use tracing::{info, warn};

const NO_QUOTES: &str = "No quotes available";

#[derive(Debug, Default, Clone)]
pub struct QuoteStore {
    quotes: Vec<String>,
}

impl QuoteStore {
    /// One quote per non-empty line. A missing file gives an empty store.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(event = "quotes_missing", path = %path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err),
        };
        let store = Self::from_lines(&raw);
        info!(event = "quotes_loaded", path = %path.display(), count = store.len());
        Ok(store)
    }

    pub fn from_lines(raw: &str) -> Self {
        let quotes = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { quotes }
    }

    pub fn random(&self) -> String {
        self.quotes
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| NO_QUOTES.to_string())
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }
}
