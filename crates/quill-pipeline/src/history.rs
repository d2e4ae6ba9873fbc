use quill_llm::HistoryEntry;
use quill_persist::{ChatThread, TurnRole};

use crate::error::{PipelineError, Result};

/// Model-ready view of a thread
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedContext {
    /// Every turn before the pending one, oldest first
    pub history: Vec<HistoryEntry>,
    /// Content of the pending user turn
    pub prompt: String,
}

/// Split a thread whose newest turn is the pending user turn into history
/// and current prompt.
///
/// The pending turn is excluded from the history so the prompt reaches the
/// model exactly once.
pub fn project(thread: &ChatThread) -> Result<ProjectedContext> {
    let (pending, earlier) = thread
        .turns()
        .split_last()
        .ok_or_else(|| PipelineError::Unknown("thread has no pending turn".to_string()))?;

    if !pending.is_user() {
        return Err(PipelineError::Unknown(
            "newest turn is not a user turn".to_string(),
        ));
    }

    let history = earlier
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => HistoryEntry::user(turn.content.clone()),
            TurnRole::Assistant => HistoryEntry::model(turn.content.clone()),
        })
        .collect();

    Ok(ProjectedContext {
        history,
        prompt: pending.content.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_llm::ModelRole;
    use quill_persist::Turn;

    fn thread_with(turns: Vec<Turn>) -> ChatThread {
        let mut thread = ChatThread::new("owner", "Ada", "New chat");
        for turn in turns {
            thread.append(turn);
        }
        thread
    }

    #[test]
    fn test_first_message_has_empty_history() {
        let thread = thread_with(vec![Turn::user("Hello")]);
        let ctx = project(&thread).unwrap();
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.prompt, "Hello");
    }

    #[test]
    fn test_roles_map_and_prompt_is_excluded() {
        let thread = thread_with(vec![
            Turn::user("Hello"),
            Turn::assistant("Hi there"),
            Turn::user("Hello"),
        ]);
        let ctx = project(&thread).unwrap();

        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[0].role, ModelRole::User);
        assert_eq!(ctx.history[1].role, ModelRole::Model);
        assert_eq!(ctx.history[1].text, "Hi there");
        // Same text as an earlier turn still counts once as the prompt
        assert_eq!(ctx.prompt, "Hello");
    }

    #[test]
    fn test_requires_pending_user_turn() {
        assert!(project(&thread_with(vec![])).is_err());
        assert!(project(&thread_with(vec![Turn::user("a"), Turn::assistant("b")])).is_err());
    }
}
