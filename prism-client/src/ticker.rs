//! Captions cycled on screen while an image is being generated.

use std::fmt;
use std::time::Duration;

/// How long each caption stays up.
pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Shown after the entry's own keywords, in this order.
pub const FILLERS: [&str; 5] = [
    "Adding colors",
    "Setting the lights",
    "Finishing up",
    "Almost there",
    "Just a moment!",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caption {
    Keyword(String),
    Filler(&'static str),
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caption::Keyword(keyword) => write!(f, "#{}", keyword),
            Caption::Filler(text) => f.write_str(text),
        }
    }
}

/// Endless cycle over the keywords followed by the filler captions.
#[derive(Debug, Clone, Default)]
pub struct KeywordTicker {
    keywords: Vec<String>,
    index: usize,
}

impl KeywordTicker {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords, index: 0 }
    }

    /// Swap in a new keyword set. The cycle restarts only if the set differs.
    pub fn set_keywords(&mut self, keywords: &[String]) {
        if self.keywords != keywords {
            self.keywords = keywords.to_vec();
            self.index = 0;
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Number of captions in one full cycle.
    pub fn cycle_len(&self) -> usize {
        self.keywords.len() + FILLERS.len()
    }

    fn caption_at(&self, index: usize) -> Caption {
        match self.keywords.get(index) {
            Some(keyword) => Caption::Keyword(keyword.clone()),
            None => Caption::Filler(FILLERS[index - self.keywords.len()]),
        }
    }
}

impl Iterator for KeywordTicker {
    type Item = Caption;

    fn next(&mut self) -> Option<Caption> {
        let caption = self.caption_at(self.index);
        self.index = (self.index + 1) % self.cycle_len();
        Some(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn keywords_come_before_fillers_and_cycle() {
        let ticker = KeywordTicker::new(words(&["walk", "sunny"]));
        let shown: Vec<String> = ticker.take(8).map(|c| c.to_string()).collect();

        assert_eq!(
            shown,
            vec![
                "#walk",
                "#sunny",
                "Adding colors",
                "Setting the lights",
                "Finishing up",
                "Almost there",
                "Just a moment!",
                "#walk",
            ]
        );
    }

    #[test]
    fn empty_keywords_still_show_fillers() {
        let mut ticker = KeywordTicker::default();
        assert_eq!(ticker.cycle_len(), FILLERS.len());
        assert_eq!(ticker.next(), Some(Caption::Filler("Adding colors")));
    }

    #[test]
    fn same_keywords_do_not_restart() {
        let mut ticker = KeywordTicker::new(words(&["walk", "sunny"]));
        ticker.next();

        ticker.set_keywords(&words(&["walk", "sunny"]));
        assert_eq!(ticker.next(), Some(Caption::Keyword("sunny".into())));
    }

    #[test]
    fn changed_keywords_restart_the_cycle() {
        let mut ticker = KeywordTicker::new(words(&["walk", "sunny"]));
        ticker.next();
        ticker.next();

        ticker.set_keywords(&words(&["rain"]));
        assert_eq!(ticker.next(), Some(Caption::Keyword("rain".into())));
        assert_eq!(ticker.next(), Some(Caption::Filler("Adding colors")));
    }
}
