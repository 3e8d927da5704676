use std::io::{self, BufRead, Write};

use anyhow::Result;

use espn_player::{BitratePolicy, Config, Playback};

use super::logged_in_player;

pub fn cmd_play(
    config: Config,
    airing_id: &str,
    channel: Option<&str>,
    policy: BitratePolicy,
) -> Result<()> {
    let player = logged_in_player(config)?;

    let stdin = io::stdin();
    let mut prompt = |choices: &[String]| -> Option<usize> { ask(choices, &mut stdin.lock()) };

    match player.play(airing_id, channel, policy, &mut prompt)? {
        Playback::Ready(item) => {
            println!("{}", item.playback_url());
            Ok(())
        }
        Playback::NoStream => anyhow::bail!("No stream available for airing {airing_id}"),
        Playback::NoAcceptableBitrate => {
            anyhow::bail!("No stream at or below the requested bitrate ({policy} kbps)")
        }
        Playback::Cancelled => {
            eprintln!("Cancelled");
            Ok(())
        }
    }
}

/// Offer `choices` on stderr and read a 1-based pick. Empty input cancels.
fn ask(choices: &[String], input: &mut impl BufRead) -> Option<usize> {
    eprintln!("Available bitrates:");
    for (i, choice) in choices.iter().enumerate() {
        eprintln!("  {}. {choice} kbps", i + 1);
    }
    eprint!("Pick a bitrate [1-{}]: ", choices.len());
    let _ = io::stderr().flush();

    let mut line = String::new();
    input.read_line(&mut line).ok()?;
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.parse::<usize>() {
        Ok(n) if (1..=choices.len()).contains(&n) => Some(n - 1),
        _ => {
            eprintln!("Invalid choice: {line}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<String> {
        vec!["5000".to_string(), "1200".to_string()]
    }

    #[test]
    fn test_ask_reads_one_based_choice() {
        assert_eq!(ask(&choices(), &mut "2\n".as_bytes()), Some(1));
    }

    #[test]
    fn test_ask_empty_or_invalid_cancels() {
        assert_eq!(ask(&choices(), &mut "\n".as_bytes()), None);
        assert_eq!(ask(&choices(), &mut "9\n".as_bytes()), None);
        assert_eq!(ask(&choices(), &mut "".as_bytes()), None);
    }
}
