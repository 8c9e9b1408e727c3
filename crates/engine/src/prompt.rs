//! Prompt templates for the two pipeline stages.
//!
//! Both prompts are built by pure functions so their exact text can be
//! pinned in tests without touching a backend.

use taskforge_core::Task;

/// Build the breakdown prompt: asks the model for a JSON array of task
/// objects, bounded between `min_tasks` and `max_tasks` items.
pub fn breakdown_prompt(objective: &str, min_tasks: usize, max_tasks: usize) -> String {
    format!(
        "You are a task planning assistant. Break this objective down into {} to {} concrete, actionable tasks.\n\n\
        Objective: {}\n\n\
        Respond with ONLY a JSON array, no prose before or after. Each element must be an object with:\n\
        - \"name\": a short task label\n\
        - \"description\": one sentence saying what to do\n\
        - \"priority\": one of \"critical\", \"high\", \"medium\", \"low\"\n\
        - \"estimatedTime\": a rough effort estimate such as \"30 minutes\"\n\n\
        List the tasks in the order they should be done.",
        min_tasks, max_tasks, objective
    )
}

/// Build the execution prompt for one task: embeds the task's name and
/// description and asks for a short actionable recommendation.
pub fn execution_prompt(objective: &str, task: &Task) -> String {
    format!(
        "You are working toward this objective: {}\n\n\
        Current task: {}\n\
        Details: {}\n\n\
        Carry out the task and reply with a concrete, actionable recommendation in 2-3 sentences. Be specific.",
        objective, task.name, task.description
    )
}
