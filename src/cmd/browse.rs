use anyhow::Result;

use espn_player::{Config, EventBucket, ListItem};

use super::logged_in_player;
use super::output::{print_empty, print_items};

pub fn cmd_categories(config: Config) -> Result<()> {
    let player = logged_in_player(config)?;
    let items = player.categories()?;
    show(&items, "categories");
    Ok(())
}

pub fn cmd_schedule(config: Config, service: &str, bucket: Option<EventBucket>) -> Result<()> {
    let player = logged_in_player(config)?;

    let items: Vec<ListItem> = match bucket {
        Some(bucket) => player.events(service, bucket)?,
        None => player.schedule(service)?.iter().map(ListItem::from).collect(),
    };
    show(&items, "events");
    Ok(())
}

pub fn cmd_channels(config: Config) -> Result<()> {
    let player = logged_in_player(config)?;
    let items = player.channels()?;
    show(&items, "channels");
    Ok(())
}

fn show(items: &[ListItem], what: &str) {
    if items.is_empty() {
        print_empty(what);
    } else {
        print_items(items);
    }
}
