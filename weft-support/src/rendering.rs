//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format construction chains, capability names,
//! and helpful suggestions in error output.

/// Renders a construction chain of bean ids as a readable string.
///
/// # Examples
/// ```
/// use weft_support::rendering::render_chain;
///
/// let chain = vec!["userService", "userRepo", "database", "userService"];
/// let rendered = render_chain(&chain);
/// assert_eq!(rendered, "userService → userRepo → database → userService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// A candidate definition listed in ambiguity errors.
#[derive(Debug)]
pub struct CandidateEntry {
    /// The definition id
    pub id: String,
    /// The scope (e.g., "Singleton", "Prototype")
    pub scope: String,
    /// Declared qualifier, if any
    pub qualifier: Option<String>,
    /// Whether the definition is marked primary
    pub primary: bool,
}

/// Renders the candidate set for a capability, one per line.
///
/// ```text
///   - zoneUtc8 [Singleton] (qualifier: "utc8", primary)
///   - zoneZ    [Singleton] (qualifier: "z")
/// ```
pub fn render_candidates(entries: &[CandidateEntry]) -> String {
    let max_id_len = entries.iter().map(|e| e.id.len()).max().unwrap_or(0);

    let mut result = String::new();
    for entry in entries {
        result.push_str(&format!(
            "  - {:<width$} [{}]",
            entry.id,
            entry.scope,
            width = max_id_len,
        ));

        let mut notes = Vec::new();
        if let Some(ref q) = entry.qualifier {
            notes.push(format!("qualifier: {q:?}"));
        }
        if entry.primary {
            notes.push("primary".to_string());
        }
        if !notes.is_empty() {
            result.push_str(&format!(" ({})", notes.join(", ")));
        }

        result.push('\n');
    }

    result
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use weft_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Mailer>");
/// assert_eq!(short, "Arc<dyn Mailer>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    // Strategy: take the last segment of each path component
    // "my_app::services::UserService" → "UserService"
    // "Arc<dyn my_app::Mailer>" → "Arc<dyn Mailer>"

    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next(); // consume second ':'
                current_segment.clear(); // discard path prefix
            }
            '<' | '>' | ',' | ' ' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => {
                current_segment.push(ch);
            }
        }
    }

    result.push_str(&current_segment);
    result
}

/// Generates a "did you mean?" suggestion based on registered names.
///
/// Compares the requested id or capability name against available ones
/// and suggests close matches.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            // Exact substring match (highest priority)
            if name_lower.contains(&requested_lower)
                || requested_lower.contains(&name_lower)
            {
                return Some((name, 100));
            }

            // Short name match
            if name_short.contains(&requested_short)
                || requested_short.contains(&name_short)
            {
                return Some((name, 80));
            }

            // Common prefix
            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
