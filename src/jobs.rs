//! Built-in job definitions embedded in the binary
//!
//! This module embeds the bundled job YAML files directly into the binary,
//! allowing users to use `--job quotes` instead of specifying a file path.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in job YAML definitions
pub static BUILTIN_JOBS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Cursor-link pagination
    m.insert("quotes", include_str!("../jobs/quotes.yaml"));

    // Offset pagination against a POST form
    m.insert(
        "iowa-veterinarians",
        include_str!("../jobs/iowa-veterinarians.yaml"),
    );
    m.insert("iowa", include_str!("../jobs/iowa-veterinarians.yaml"));

    // Category-tree pagination
    m.insert("books", include_str!("../jobs/books.yaml"));

    m
});

/// Get a built-in job by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_JOBS.get(name).copied()
}

/// Check if a job name is a built-in job
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_JOBS.contains_key(name)
}

/// List all built-in job names (primary names only)
pub fn list_builtin() -> Vec<&'static str> {
    vec!["quotes", "iowa-veterinarians", "books"]
}

/// Job metadata for display
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub pagination: &'static str,
    pub aliases: &'static [&'static str],
}

/// Get display info about all built-in jobs
pub fn list_builtin_info() -> Vec<JobInfo> {
    vec![
        JobInfo {
            name: "quotes",
            description: "Quotes, authors and source page from quotes.toscrape.com",
            pagination: "next link",
            aliases: &[],
        },
        JobInfo {
            name: "iowa-veterinarians",
            description: "Iowa veterinarian license list",
            pagination: "offset (POST form)",
            aliases: &["iowa"],
        },
        JobInfo {
            name: "books",
            description: "Books per category from books.toscrape.com",
            pagination: "category tree + next link",
            aliases: &[],
        },
    ]
}
