pub mod browse;
pub mod login;
pub mod output;
pub mod play;

use anyhow::{Context, Result};

use espn_player::{Config, EspnPlayer};

/// Open the client and log in, as every browsing command needs.
fn logged_in_player(config: Config) -> Result<EspnPlayer> {
    let mut player = EspnPlayer::new(config).context("Failed to open profile")?;
    player.login().context("Login failed")?;
    Ok(player)
}
