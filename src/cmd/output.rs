use espn_player::ListItem;

/// Print one line per item: navigation query, then the label.
pub fn print_items(items: &[ListItem]) {
    for item in items {
        let marker = if item.playable { "▶" } else { "📁" };
        println!("{marker} {}\t{}", item.title, item.query());
    }
}

pub fn print_empty(what: &str) {
    eprintln!("No {what} found");
}
