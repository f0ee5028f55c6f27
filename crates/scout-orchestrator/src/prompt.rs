//! Prompt composition for research workers.

use scout_core::NormalizedTask;

/// Replay context for a steer invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SteeringContext {
    /// Every instruction given so far, oldest first; the last one is new.
    pub notes: Vec<String>,

    /// Final output of the previous attempt, if it produced any.
    pub previous_output: Option<String>,
}

const PREAMBLE: &str = "You are a research worker. A coordinating agent split a larger question into \
independent tasks and gave you exactly one of them.

Constraints:
- Work only on the task below; sibling tasks are handled by other workers.
- Do not modify files unless the task explicitly asks for it.
- Prefer primary sources, and cite every URL you rely on.
- Be concise; the coordinator reads several reports side by side.";

const OUTPUT_FORMAT: &str = "Output format:
End with a final answer that contains a one-paragraph summary, the key findings as bullet points, \
and a \"Sources\" section listing each full URL (http:// or https://) on its own line.";

/// Build the full prompt handed to the worker process.
pub fn compose_prompt(task: &NormalizedTask, steering: Option<&SteeringContext>) -> String {
    let mut prompt = format!(
        "{}\n\nTask id: {}\n\nTask:\n{}\n\n{}",
        PREAMBLE,
        task.id,
        task.prompt.trim(),
        OUTPUT_FORMAT
    );

    if let Some(steering) = steering {
        prompt.push_str("\n\n## Steering from the coordinator\n");
        prompt.push_str(
            "This task has been run before. Redo it, applying all of the following \
             instructions (most recent last):\n",
        );
        for (i, note) in steering.notes.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, note.trim()));
        }

        if let Some(previous) = steering
            .previous_output
            .as_deref()
            .filter(|o| !o.trim().is_empty())
        {
            prompt.push_str("\n## Your previous output\n");
            prompt.push_str(previous.trim());
            prompt.push('\n');
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::TaskId;

    fn task() -> NormalizedTask {
        NormalizedTask {
            id: TaskId::new("auth-scan"),
            prompt: "  Survey OAuth device flow support  ".to_string(),
            work_dir: None,
        }
    }

    #[test]
    fn test_plain_prompt() {
        let prompt = compose_prompt(&task(), None);
        assert!(prompt.starts_with("You are a research worker."));
        assert!(prompt.contains("Task id: auth-scan"));
        assert!(prompt.contains("Task:\nSurvey OAuth device flow support\n"));
        assert!(prompt.contains("Sources"));
        assert!(!prompt.contains("Steering"));
    }

    #[test]
    fn test_steering_block() {
        let steering = SteeringContext {
            notes: vec!["Focus on GitHub".to_string(), "Add dates".to_string()],
            previous_output: Some("Old findings".to_string()),
        };
        let prompt = compose_prompt(&task(), Some(&steering));

        let steering_at = prompt.find("## Steering from the coordinator").unwrap();
        assert!(steering_at > prompt.find("Output format:").unwrap());
        assert!(prompt.contains("1. Focus on GitHub\n2. Add dates\n"));
        assert!(prompt.ends_with("## Your previous output\nOld findings\n"));
    }

    #[test]
    fn test_empty_previous_output_is_omitted() {
        let steering = SteeringContext {
            notes: vec!["Retry".to_string()],
            previous_output: Some("   ".to_string()),
        };
        let prompt = compose_prompt(&task(), Some(&steering));
        assert!(prompt.contains("1. Retry"));
        assert!(!prompt.contains("previous output"));
    }
}
