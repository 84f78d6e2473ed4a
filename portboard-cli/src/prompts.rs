use anyhow::Result;
use inquire::{Select, Text};
use std::io::IsTerminal;

use portboard_core::OrganizationSnapshot;

/// Asks which user to act as, when a terminal is attached
///
/// Returns `None` for a non-interactive session or when the organization has
/// no active users.
pub fn prompt_select_user(org: &OrganizationSnapshot) -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let options: Vec<String> = org
        .users
        .iter()
        .filter(|u| u.active)
        .map(|u| format!("{} - {} ({})", u.id, u.name, u.grade_level))
        .collect();

    if options.is_empty() {
        return Ok(None);
    }

    let selected = Select::new("Act as user:", options).prompt()?;
    Ok(selected.split(" - ").next().map(str::to_string))
}

/// Asks for the next registry search, `None` once the user is done
pub fn prompt_search() -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    let answer = Text::new("Search (empty to finish):").prompt()?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(None)
    } else {
        Ok(Some(answer.to_string()))
    }
}
