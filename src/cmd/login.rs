use anyhow::{Context, Result};

use espn_player::{Config, EspnPlayer, Error};

pub fn cmd_login(config: Config) -> Result<()> {
    let mut player = EspnPlayer::new(config).context("Failed to open profile")?;

    match player.login() {
        Ok(()) => {
            eprintln!("✅ Logged in");
            Ok(())
        }
        Err(Error::MissingCredentials) => {
            anyhow::bail!("No stored token. Pass --username and --password, or set them in the config file.")
        }
        Err(Error::LoginFailure(code)) => anyhow::bail!("Login rejected by ESPN Player: {code}"),
        Err(e) => Err(e).context("Login failed"),
    }
}

pub fn cmd_logout(config: Config) -> Result<()> {
    let mut player = EspnPlayer::new(config).context("Failed to open profile")?;
    player.logout()?;
    eprintln!("👋 Logged out, stored credentials cleared");
    Ok(())
}
