//! Project timelines, assignments, and chat-room lifecycle.
//!
//! Projects are week-granular: a project is active in weeks
//! `[start_week, start_week + duration_weeks - 1]`. Assignment rows link
//! workers to projects; a project with no rows is "unassigned" and every
//! active worker is an implicit member. Each project gets a chat room when
//! its window opens and the room is archived when the window closes.

use std::collections::BTreeMap;

use cadre_types::{ChatRoom, Project, ProjectAssignment, ProjectId, RoomId, Worker, WorkerId};
use tracing::info;

/// Errors from project bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Referenced a project that does not exist.
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),
}

/// Room changes produced by a weekly sync.
#[derive(Debug, Clone, Default)]
pub struct RoomSync {
    /// Rooms created this pass.
    pub created: Vec<ChatRoom>,
    /// Rooms archived this pass.
    pub archived: Vec<ChatRoom>,
}

/// Project and chat-room state.
#[derive(Debug, Clone, Default)]
pub struct ProjectManager {
    projects: BTreeMap<ProjectId, Project>,
    assignments: Vec<ProjectAssignment>,
    rooms: BTreeMap<ProjectId, ChatRoom>,
}

impl ProjectManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a project and its assignment rows.
    pub fn store(&mut self, project: Project, assignments: Vec<ProjectAssignment>) {
        info!(
            project_id = %project.id,
            name = %project.name,
            start_week = project.start_week,
            duration_weeks = project.duration_weeks,
            assignees = assignments.len(),
            "project stored"
        );
        self.assignments
            .retain(|a| a.project_id != project.id);
        self.assignments.extend(assignments);
        self.projects.insert(project.id, project);
    }

    /// All stored projects.
    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// All assignment rows.
    pub fn assignments(&self) -> &[ProjectAssignment] {
        &self.assignments
    }

    /// All chat rooms.
    pub fn rooms(&self) -> impl Iterator<Item = &ChatRoom> {
        self.rooms.values()
    }

    /// Look up a project.
    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// The plan text of a project, or of the most recently stored project
    /// when `id` is `None`.
    pub fn get_plan(&self, id: Option<ProjectId>) -> Option<&str> {
        match id {
            Some(id) => self.projects.get(&id)?.plan_text.as_deref(),
            None => self
                .projects
                .values()
                .next_back()?
                .plan_text
                .as_deref(),
        }
    }

    /// Replace a project's plan text.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::UnknownProject`] if the project does not
    /// exist.
    pub fn set_plan(&mut self, id: ProjectId, plan_text: String) -> Result<(), ProjectError> {
        let project = self
            .projects
            .get_mut(&id)
            .ok_or(ProjectError::UnknownProject(id))?;
        project.plan_text = Some(plan_text);
        Ok(())
    }

    /// Projects active during `week`, in stable id order.
    pub fn active_projects_for_week(&self, week: u32) -> Vec<&Project> {
        self.projects
            .values()
            .filter(|p| p.is_active_in(week))
            .collect()
    }

    /// Whether any project starts after `week`.
    pub fn has_future_project(&self, week: u32) -> bool {
        self.projects.values().any(|p| p.start_week > week)
    }

    /// All projects a worker is on during `week`. A worker may be on
    /// several concurrently. Unassigned projects match every worker.
    pub fn active_projects_for_worker(&self, worker_id: WorkerId, week: u32) -> Vec<&Project> {
        self.active_projects_for_week(week)
            .into_iter()
            .filter(|p| self.is_member(p.id, worker_id))
            .collect()
    }

    /// Whether a worker belongs to a project, explicitly or implicitly.
    pub fn is_member(&self, project_id: ProjectId, worker_id: WorkerId) -> bool {
        let mut rows = self
            .assignments
            .iter()
            .filter(|a| a.project_id == project_id)
            .peekable();
        // No rows at all: everyone is an implicit member.
        if rows.peek().is_none() {
            return true;
        }
        rows.any(|a| a.worker_id == worker_id)
    }

    /// Union of co-assigned workers across all the worker's active
    /// projects. A worker with no assignment anywhere collaborates with
    /// every other active worker.
    pub fn collaborators_for(
        &self,
        worker_id: WorkerId,
        week: u32,
        roster: &[Worker],
    ) -> Vec<WorkerId> {
        if self.assignments.iter().all(|a| a.worker_id != worker_id) {
            let mut out: Vec<WorkerId> = roster
                .iter()
                .filter(|w| w.id != worker_id && w.status.plans())
                .map(|w| w.id)
                .collect();
            out.sort_unstable();
            return out;
        }
        let mut out = Vec::new();
        for project in self.active_projects_for_worker(worker_id, week) {
            for member in self.members_of(project.id, roster) {
                if member != worker_id && !out.contains(&member) {
                    out.push(member);
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Explicit members of a project, or the whole active roster when the
    /// project has no assignment rows.
    pub fn members_of(&self, project_id: ProjectId, roster: &[Worker]) -> Vec<WorkerId> {
        let explicit: Vec<WorkerId> = self
            .assignments
            .iter()
            .filter(|a| a.project_id == project_id)
            .map(|a| a.worker_id)
            .collect();
        if explicit.is_empty() {
            roster
                .iter()
                .filter(|w| w.status.plans())
                .map(|w| w.id)
                .collect()
        } else {
            explicit
        }
    }

    /// Whether a project's window has closed as of `current_week`.
    pub fn is_complete(&self, project_id: ProjectId, current_week: u32) -> bool {
        self.projects
            .get(&project_id)
            .is_some_and(|p| current_week > p.end_week())
    }

    /// Create the chat room for a project whose window has begun.
    ///
    /// Idempotent: an existing active room is left alone. A previously
    /// archived room is reactivated (a replayed week reopens it).
    pub fn ensure_chat_room(&mut self, project_id: ProjectId, tick: u64) -> Option<ChatRoom> {
        let project = self.projects.get(&project_id)?;
        let room_key = format!("project-{}", project.name.to_lowercase().replace(' ', "-"));
        let entry = self.rooms.entry(project_id).or_insert_with(|| {
            info!(project_id = %project_id, room_key = %room_key, "chat room created");
            ChatRoom {
                id: RoomId::new(),
                project_id,
                room_key,
                is_active: true,
                created_tick: tick,
                archived_tick: None,
            }
        });
        if !entry.is_active {
            entry.is_active = true;
            entry.archived_tick = None;
        }
        Some(entry.clone())
    }

    /// Archive a project's chat room once its window has closed.
    pub fn archive_chat_room(&mut self, project_id: ProjectId, tick: u64) -> Option<ChatRoom> {
        let room = self.rooms.get_mut(&project_id)?;
        if room.is_active {
            room.is_active = false;
            room.archived_tick = Some(tick);
            info!(project_id = %project_id, room_key = %room.room_key, "chat room archived");
        }
        Some(room.clone())
    }

    /// Bring room state in line with the current week: open rooms for
    /// projects whose window is active, archive rooms for completed ones.
    pub fn sync_rooms(&mut self, week: u32, tick: u64) -> RoomSync {
        let mut sync = RoomSync::default();
        let ids: Vec<ProjectId> = self.projects.keys().copied().collect();
        for id in ids {
            let Some(project) = self.projects.get(&id) else {
                continue;
            };
            if project.is_active_in(week) {
                let had_room = self.rooms.get(&id).is_some_and(|r| r.is_active);
                if let Some(room) = self.ensure_chat_room(id, tick)
                    && !had_room
                {
                    sync.created.push(room);
                }
            } else if self.is_complete(id, week)
                && self.rooms.get(&id).is_some_and(|r| r.is_active)
                && let Some(room) = self.archive_chat_room(id, tick)
            {
                sync.archived.push(room);
            }
        }
        sync
    }

    /// Drop all chat rooms while keeping the project timeline. Used by run
    /// resets; the next tick's room sync recreates whatever is active.
    pub fn clear_rooms(&mut self) {
        self.rooms.clear();
    }

    /// Reload chat rooms from persisted state at startup.
    pub fn restore_rooms(&mut self, rooms: Vec<ChatRoom>) {
        self.rooms = rooms.into_iter().map(|r| (r.project_id, r)).collect();
    }

    /// Drop all projects, assignments, and rooms.
    pub fn clear(&mut self) {
        self.projects.clear();
        self.assignments.clear();
        self.rooms.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use cadre_types::WorkerStatus;

    fn worker(name: &str) -> Worker {
        Worker {
            id: WorkerId::new(),
            name: name.to_owned(),
            role: "Engineer".to_owned(),
            timezone: "UTC".to_owned(),
            email: format!("{name}@cadre.test"),
            chat_handle: format!("@{name}"),
            is_department_head: false,
            status: WorkerStatus::Working,
            status_until_tick: None,
        }
    }

    fn project(name: &str, start_week: u32, duration_weeks: u32) -> Project {
        Project {
            id: ProjectId::new(),
            name: name.to_owned(),
            summary: String::new(),
            start_week,
            duration_weeks,
            plan_text: None,
        }
    }

    #[test]
    fn timeline_window_is_inclusive() {
        let mut pm = ProjectManager::new();
        let p = project("alpha", 2, 3);
        let id = p.id;
        pm.store(p, Vec::new());

        assert!(pm.active_projects_for_week(1).is_empty());
        for week in 2..=4 {
            assert_eq!(pm.active_projects_for_week(week).len(), 1, "week {week}");
        }
        assert!(pm.active_projects_for_week(5).is_empty());
        assert!(!pm.is_complete(id, 4));
        assert!(pm.is_complete(id, 5));
    }

    #[test]
    fn worker_can_be_on_several_projects() {
        let dana = worker("dana");
        let mut pm = ProjectManager::new();
        let a = project("alpha", 1, 4);
        let b = project("beta", 1, 4);
        let a_id = a.id;
        let b_id = b.id;
        pm.store(
            a,
            vec![ProjectAssignment {
                project_id: a_id,
                worker_id: dana.id,
            }],
        );
        pm.store(
            b,
            vec![ProjectAssignment {
                project_id: b_id,
                worker_id: dana.id,
            }],
        );
        assert_eq!(pm.active_projects_for_worker(dana.id, 1).len(), 2);
    }

    #[test]
    fn unassigned_project_includes_everyone() {
        let dana = worker("dana");
        let priya = worker("priya");
        let tom = worker("tom");
        let roster = vec![dana.clone(), priya.clone(), tom.clone()];

        let mut pm = ProjectManager::new();
        pm.store(project("alpha", 1, 2), Vec::new());

        let collaborators = pm.collaborators_for(dana.id, 1, &roster);
        assert_eq!(collaborators.len(), 2);
        assert!(collaborators.contains(&priya.id));
        assert!(collaborators.contains(&tom.id));
    }

    #[test]
    fn worker_with_no_assignment_anywhere_collaborates_with_everyone() {
        let dana = worker("dana");
        let priya = worker("priya");
        let mut tom = worker("tom");
        tom.status = WorkerStatus::OffDuty;
        let newcomer = worker("newcomer");
        let roster = vec![dana.clone(), priya.clone(), tom.clone(), newcomer.clone()];

        // The only active project is explicitly staffed without the newcomer.
        let mut pm = ProjectManager::new();
        let a = project("alpha", 1, 2);
        let a_id = a.id;
        pm.store(
            a,
            vec![
                ProjectAssignment {
                    project_id: a_id,
                    worker_id: dana.id,
                },
                ProjectAssignment {
                    project_id: a_id,
                    worker_id: priya.id,
                },
            ],
        );

        let mut expected = vec![dana.id, priya.id];
        expected.sort_unstable();
        assert_eq!(pm.collaborators_for(newcomer.id, 1, &roster), expected);
    }

    #[test]
    fn collaborators_are_scoped_to_shared_projects() {
        let dana = worker("dana");
        let priya = worker("priya");
        let tom = worker("tom");
        let roster = vec![dana.clone(), priya.clone(), tom.clone()];

        let mut pm = ProjectManager::new();
        let a = project("alpha", 1, 2);
        let a_id = a.id;
        pm.store(
            a,
            vec![
                ProjectAssignment {
                    project_id: a_id,
                    worker_id: dana.id,
                },
                ProjectAssignment {
                    project_id: a_id,
                    worker_id: priya.id,
                },
            ],
        );
        // tom is on a separate project.
        let b = project("beta", 1, 2);
        let b_id = b.id;
        pm.store(
            b,
            vec![ProjectAssignment {
                project_id: b_id,
                worker_id: tom.id,
            }],
        );

        let collaborators = pm.collaborators_for(dana.id, 1, &roster);
        assert_eq!(collaborators, vec![priya.id]);
        assert!(!collaborators.contains(&tom.id));
    }

    #[test]
    fn rooms_open_and_archive_with_the_window() {
        let mut pm = ProjectManager::new();
        let p = project("alpha", 1, 2);
        let id = p.id;
        pm.store(p, Vec::new());

        let sync = pm.sync_rooms(1, 0);
        assert_eq!(sync.created.len(), 1);
        assert_eq!(sync.created[0].room_key, "project-alpha");

        // Still active in week 2: no changes.
        let sync = pm.sync_rooms(2, 7200);
        assert!(sync.created.is_empty());
        assert!(sync.archived.is_empty());

        // Window closed in week 3.
        let sync = pm.sync_rooms(3, 14_400);
        assert_eq!(sync.archived.len(), 1);
        assert!(!sync.archived[0].is_active);
        assert!(pm.rooms.get(&id).is_some_and(|r| !r.is_active));
    }

    #[test]
    fn ensure_chat_room_is_idempotent() {
        let mut pm = ProjectManager::new();
        let p = project("alpha", 1, 2);
        let id = p.id;
        pm.store(p, Vec::new());

        let first = pm.ensure_chat_room(id, 0).unwrap();
        let second = pm.ensure_chat_room(id, 99).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.created_tick, 0);
    }
}
