use colored::*;
use recboard_core::ReclistEntry;
use std::path::Path;

/// One `path<TAB>text` line per entry, or pretty JSON when `json` is set.
pub fn render_entries(entries: &[ReclistEntry], json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string());
    }
    entries
        .iter()
        .map(|entry| format!("{}\t{}", entry.path, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the loaded reclist to stdout
pub fn print_entries(entries: &[ReclistEntry], json: bool) {
    if entries.is_empty() && !json {
        eprintln!(
            "{}",
            "The host returned no entries (missing, unreadable or empty reclist).".yellow()
        );
        return;
    }
    println!("{}", render_entries(entries, json));
}

pub fn print_saved(path: &Path, saved: bool) {
    if saved {
        println!("{} {}", "Saved".green().bold(), path.display());
    } else {
        eprintln!("{} {}", "Failed to save".red().bold(), path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<ReclistEntry> {
        vec![
            ReclistEntry {
                path: "/lists/a.wav".to_string(),
                text: "hello".to_string(),
            },
            ReclistEntry {
                path: "/lists/b.wav".to_string(),
                text: "world".to_string(),
            },
        ]
    }

    #[test]
    fn test_plain_rendering() {
        assert_eq!(
            render_entries(&entries(), false),
            "/lists/a.wav\thello\n/lists/b.wav\tworld"
        );
    }

    #[test]
    fn test_json_rendering_matches_wire_shape() {
        let rendered = render_entries(&entries(), true);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[1]["path"], "/lists/b.wav");
        assert_eq!(value[1]["text"], "world");
    }
}
