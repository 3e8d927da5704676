//! Bitrate selection over a resolved stream.
//!
//! Bitrates travel as decimal kbps strings (the keys of a
//! [`StreamResolution`](crate::stream::StreamResolution)); selection sorts
//! them numerically, highest first, and applies a [`BitratePolicy`].

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// How a bitrate is picked from the available variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitratePolicy {
    /// Highest available bitrate.
    #[default]
    Highest,
    /// Highest bitrate not above the given kbps cap.
    Limit(u64),
    /// Let the user pick from the sorted list.
    Ask,
}

impl FromStr for BitratePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highest" | "best" => Ok(Self::Highest),
            "ask" => Ok(Self::Ask),
            other => other
                .parse::<u64>()
                .map(Self::Limit)
                .map_err(|_| Error::Config(format!("unknown bitrate policy: {s}"))),
        }
    }
}

impl fmt::Display for BitratePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "highest"),
            Self::Limit(max) => write!(f, "{max}"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Interactive chooser used by [`BitratePolicy::Ask`].
pub trait BitratePrompt {
    /// Offer `choices` (highest first) and return the picked index, or
    /// `None` if the user cancelled.
    fn choose(&mut self, choices: &[String]) -> Option<usize>;
}

impl<F> BitratePrompt for F
where
    F: FnMut(&[String]) -> Option<usize>,
{
    fn choose(&mut self, choices: &[String]) -> Option<usize> {
        self(choices)
    }
}

/// Sort bitrate keys by numeric value, highest first. Entries that are not
/// decimal numbers are dropped.
pub fn sorted_desc<'a, I>(available: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut numeric: Vec<(u64, &str)> = available
        .into_iter()
        .filter_map(|key| key.trim().parse::<u64>().ok().map(|kbps| (kbps, key)))
        .collect();
    numeric.sort_by(|a, b| b.0.cmp(&a.0));
    numeric.dedup_by_key(|(kbps, _)| *kbps);
    numeric.into_iter().map(|(_, key)| key.to_string()).collect()
}

/// Pick one bitrate according to `policy`.
///
/// Returns `None` when nothing qualifies: an empty input, a cap below every
/// variant, or a cancelled prompt.
pub fn select<'a, I>(available: I, policy: BitratePolicy, prompt: &mut dyn BitratePrompt) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let sorted = sorted_desc(available);

    match policy {
        BitratePolicy::Highest => sorted.into_iter().next(),
        BitratePolicy::Limit(max) => sorted
            .into_iter()
            .find(|key| key.trim().parse::<u64>().is_ok_and(|kbps| kbps <= max)),
        BitratePolicy::Ask => {
            if sorted.is_empty() {
                return None;
            }
            let index = prompt.choose(&sorted)?;
            sorted.get(index).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &[String]) -> Option<usize> {
        panic!("prompt should not be consulted")
    }

    #[test]
    fn highest_picks_top_value() {
        let picked = select(["5000", "1200", "800"], BitratePolicy::Highest, &mut never);
        assert_eq!(picked.as_deref(), Some("5000"));
    }

    #[test]
    fn limit_picks_highest_under_cap() {
        let picked = select(["800", "5000", "1200"], BitratePolicy::Limit(2000), &mut never);
        assert_eq!(picked.as_deref(), Some("1200"));
    }

    #[test]
    fn limit_is_inclusive() {
        let picked = select(["5000", "1200"], BitratePolicy::Limit(1200), &mut never);
        assert_eq!(picked.as_deref(), Some("1200"));
    }

    #[test]
    fn limit_below_everything_is_none() {
        assert_eq!(select(["5000"], BitratePolicy::Limit(100), &mut never), None);
    }

    #[test]
    fn sorting_is_numeric_not_lexical() {
        assert_eq!(sorted_desc(["800", "10000", "1200"]), vec!["10000", "1200", "800"]);
    }

    #[test]
    fn ask_offers_sorted_list() {
        let mut offered = Vec::new();
        let mut prompt = |choices: &[String]| -> Option<usize> {
            offered = choices.to_vec();
            Some(1)
        };
        let picked = select(["800", "5000", "1200"], BitratePolicy::Ask, &mut prompt);
        assert_eq!(picked.as_deref(), Some("1200"));
        assert_eq!(offered, vec!["5000", "1200", "800"]);
    }

    #[test]
    fn ask_cancelled_is_none() {
        let mut cancel = |_: &[String]| -> Option<usize> { None };
        assert_eq!(select(["5000", "1200"], BitratePolicy::Ask, &mut cancel), None);
    }

    #[test]
    fn ask_on_empty_set_skips_prompt() {
        assert_eq!(select(std::iter::empty(), BitratePolicy::Ask, &mut never), None);
    }

    #[test]
    fn parse_policy() {
        assert_eq!("highest".parse::<BitratePolicy>().unwrap(), BitratePolicy::Highest);
        assert_eq!("Best".parse::<BitratePolicy>().unwrap(), BitratePolicy::Highest);
        assert_eq!("ask".parse::<BitratePolicy>().unwrap(), BitratePolicy::Ask);
        assert_eq!("2500".parse::<BitratePolicy>().unwrap(), BitratePolicy::Limit(2500));
        assert!("fastest".parse::<BitratePolicy>().is_err());
    }
}
