//! JSON task file: an array of tasks in store shape.

use anyhow::{Context, Result};
use slotgate_core::{Task, TaskKey};
use std::collections::HashMap;
use std::path::Path;

pub fn load(path: &Path) -> Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read task file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse task file {}", path.display()))
}

pub fn save(path: &Path, tasks: &[Task]) -> Result<()> {
    let mut raw = serde_json::to_string_pretty(tasks).context("failed to encode tasks")?;
    raw.push('\n');
    std::fs::write(path, raw)
        .with_context(|| format!("failed to write task file {}", path.display()))
}

/// Reorder `tasks` to follow `order`, the key order of the file they were
/// loaded from. Tasks not in `order` go last, in their given order.
pub fn in_file_order(order: &[TaskKey], mut tasks: Vec<Task>) -> Vec<Task> {
    let position: HashMap<&TaskKey, usize> =
        order.iter().enumerate().map(|(i, key)| (key, i)).collect();
    tasks.sort_by_key(|task| position.get(&task.key()).copied().unwrap_or(usize::MAX));
    tasks
}
