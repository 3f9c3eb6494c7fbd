//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`
//! directory) so operators can tune worker behavior without recompiling.
//! The engine renders a planning context into a system message plus a
//! daily-briefing user message; the briefing ends with the send-directive
//! grammar the communication hub scans plans for.

use cadre_core::planning::PlanRequest;
use cadre_types::WorkerId;
use minijinja::Environment;

use crate::error::PlannerError;

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with all planning templates
/// pre-loaded. Templates can be edited on disk and will be picked up on
/// the next call to [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the worker's role in the organization.
    pub system: String,
    /// User message with the briefing, inbox, and directive grammar.
    pub user: String,
}

impl PromptEngine {
    /// Create a new prompt engine loading templates from the given directory.
    ///
    /// The directory must contain: `system.j2`, `briefing.j2`, `inbox.j2`,
    /// `directives.j2`.
    pub fn new(templates_dir: &str) -> Result<Self, PlannerError> {
        let mut env = Environment::new();

        for name in ["system", "briefing", "inbox", "directives"] {
            let source = load_template(templates_dir, &format!("{name}.j2"))?;
            env.add_template_owned(name.to_owned(), source)
                .map_err(|e| PlannerError::Template(format!("failed to add {name} template: {e}")))?;
        }

        Ok(Self { env })
    }

    /// Render the full prompt for one worker's plan generation.
    pub fn render(&self, context: &serde_json::Value) -> Result<RenderedPrompt, PlannerError> {
        let system = self.render_one("system", context)?;
        let briefing = self.render_one("briefing", context)?;
        let inbox = self.render_one("inbox", context)?;
        let directives = self.render_one("directives", context)?;

        let user = format!("{briefing}\n\n{inbox}\n\n{directives}");
        Ok(RenderedPrompt { system, user })
    }

    fn render_one(&self, name: &str, context: &serde_json::Value) -> Result<String, PlannerError> {
        self.env
            .get_template(name)
            .map_err(|e| PlannerError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| PlannerError::Template(format!("{name} render failed: {e}")))
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, PlannerError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| PlannerError::Template(format!("failed to read {path}: {e}")))
}

/// Build the template context for one worker's planning request.
///
/// Inbound sender ids are resolved to display names against the snapshot
/// roster; an unknown sender renders as "someone" rather than a raw UUID.
pub fn planning_context(request: &PlanRequest) -> serde_json::Value {
    let snapshot = &request.snapshot;
    let name_of = |id: WorkerId| -> String {
        snapshot
            .roster
            .iter()
            .find(|w| w.id == id)
            .map_or_else(|| "someone".to_owned(), |w| w.name.clone())
    };

    let inbox: Vec<serde_json::Value> = request
        .inbox
        .iter()
        .map(|message| {
            serde_json::json!({
                "from": name_of(message.sender),
                "channel": message.channel.to_string(),
                "subject": message.subject,
                "body": message.body,
                "needs_reply": message.needs_reply,
                "message_id": message.message_id.to_string(),
            })
        })
        .collect();

    let projects: Vec<serde_json::Value> = snapshot
        .active_projects
        .iter()
        .map(|project| {
            serde_json::json!({
                "name": project.name,
                "summary": project.summary,
                "plan_text": project.plan_text,
            })
        })
        .collect();

    let adjustments: Vec<&str> = request
        .adjustments
        .iter()
        .map(|a| a.directive.as_str())
        .collect();

    serde_json::json!({
        "worker": {
            "name": request.worker.name,
            "role": request.worker.role,
            "timezone": request.worker.timezone,
            "is_department_head": request.worker.is_department_head,
        },
        "tick": snapshot.tick,
        "clock_time": snapshot.clock_time,
        "day_index": snapshot.day_index,
        "week": snapshot.week,
        "collaborators": request.collaborator_names,
        "active_projects": projects,
        "adjustments": adjustments,
        "inbox": inbox,
        "participation_hint": request.participation_hint,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use cadre_core::planning::ContextSnapshot;
    use cadre_types::{
        Channel, InboundMessage, MessageId, Project, ProjectId, Worker, WorkerStatus,
    };
    use std::sync::Arc;

    fn write_test_templates(dir: &std::path::Path) {
        std::fs::write(
            dir.join("system.j2"),
            "You are {{ worker.name }}, {{ worker.role }} at a small studio.",
        )
        .ok();
        std::fs::write(
            dir.join("briefing.j2"),
            "## Briefing\nTime: {{ clock_time }} (week {{ week }})\n{% for p in active_projects %}Project: {{ p.name }} -- {{ p.summary }}\n{% endfor %}{% for a in adjustments %}Adjustment: {{ a }}\n{% endfor %}Collaborators: {{ collaborators | join(', ') }}",
        )
        .ok();
        std::fs::write(
            dir.join("inbox.j2"),
            "## Inbox\n{% for m in inbox %}- [{{ m.channel }}] from {{ m.from }}: {{ m.body }}{% if m.needs_reply %} (reply expected, id {{ m.message_id }}){% endif %}\n{% endfor %}",
        )
        .ok();
        std::fs::write(
            dir.join("directives.j2"),
            "## Sending\nUse lines like: Email at HH:MM to Name: Subject | Body",
        )
        .ok();
    }

    fn test_request() -> PlanRequest {
        let ada = Worker {
            id: cadre_types::WorkerId::new(),
            name: "Ada Lin".to_owned(),
            role: "Team Lead".to_owned(),
            timezone: "UTC".to_owned(),
            email: "ada.lin@cadre.local".to_owned(),
            chat_handle: "@ada.lin".to_owned(),
            is_department_head: true,
            status: WorkerStatus::Working,
            status_until_tick: None,
        };
        let grace = Worker {
            id: cadre_types::WorkerId::new(),
            name: "Grace Park".to_owned(),
            role: "Engineer".to_owned(),
            timezone: "UTC".to_owned(),
            email: "grace.park@cadre.local".to_owned(),
            chat_handle: "@grace.park".to_owned(),
            is_department_head: false,
            status: WorkerStatus::Working,
            status_until_tick: None,
        };
        let inbox = vec![InboundMessage {
            recipient: ada.id,
            sender: grace.id,
            channel: Channel::Chat,
            message_id: MessageId::new(),
            subject: None,
            body: "standup moved to 09:30".to_owned(),
            received_tick: 100,
            needs_reply: true,
            replied_tick: None,
        }];
        let snapshot = Arc::new(ContextSnapshot {
            tick: 101,
            day_index: 0,
            week: 1,
            clock_time: "01:41".to_owned(),
            roster: vec![ada.clone(), grace],
            active_projects: vec![Project {
                id: ProjectId::new(),
                name: "atlas".to_owned(),
                summary: "Mapping pipeline rewrite".to_owned(),
                start_week: 1,
                duration_weeks: 2,
                plan_text: None,
            }],
        });
        PlanRequest {
            worker: ada,
            snapshot,
            collaborator_names: vec!["Grace Park".to_owned()],
            adjustments: vec![],
            inbox,
            participation_hint: None,
        }
    }

    #[test]
    fn context_resolves_sender_names() {
        let context = planning_context(&test_request());
        assert_eq!(context["worker"]["name"], "Ada Lin");
        assert_eq!(context["inbox"][0]["from"], "Grace Park");
        assert_eq!(context["active_projects"][0]["name"], "atlas");
    }

    #[test]
    fn template_loading_and_rendering() {
        let unique = format!(
            "cadre_test_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        write_test_templates(&dir);

        let engine = PromptEngine::new(dir.to_str().unwrap_or("")).unwrap();
        let prompt = engine.render(&planning_context(&test_request())).unwrap();

        assert!(prompt.system.contains("Ada Lin"));
        assert!(prompt.user.contains("week 1"));
        assert!(prompt.user.contains("atlas"));
        assert!(prompt.user.contains("standup moved to 09:30"));
        assert!(prompt.user.contains("Email at HH:MM"));

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_template_returns_error() {
        let unique = format!(
            "cadre_missing_templates_{}_{:?}",
            std::process::id(),
            std::thread::current().id(),
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join("system.j2"), "test").ok();

        assert!(PromptEngine::new(dir.to_str().unwrap_or("")).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
