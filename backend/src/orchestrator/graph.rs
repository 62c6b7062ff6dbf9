//! Task graph
//!
//! Arena of subtasks owned by one compound request. Subtasks live in insertion
//! order in a `Vec`; an id index gives O(1) lookup. Nothing outside the graph
//! holds references into it, only ids.

use super::gate::FeedbackRequest;
use super::types::{SubTask, SubTaskKind, SubTaskSkeleton, SubTaskStatus};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Dependency-ordered subtasks of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredGraph")]
pub struct TaskGraph {
    /// Graph id
    pub id: String,
    /// User the graph belongs to
    pub owner_id: String,
    /// Message the graph was decomposed from
    pub original_message: String,
    subtasks: Vec<SubTask>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// Ids of completed subtasks, in completion order
    completion_order: Vec<String>,
    /// Subtask currently executing or waiting on the user
    pub current_subtask_id: Option<String>,
    /// Pending feedback request while the graph is paused
    pub awaiting: Option<FeedbackRequest>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Serialized form; the id index is rebuilt on load
#[derive(Deserialize)]
struct StoredGraph {
    id: String,
    owner_id: String,
    original_message: String,
    subtasks: Vec<SubTask>,
    #[serde(default)]
    completion_order: Vec<String>,
    #[serde(default)]
    current_subtask_id: Option<String>,
    #[serde(default)]
    awaiting: Option<FeedbackRequest>,
    created_at: DateTime<Utc>,
}

impl From<StoredGraph> for TaskGraph {
    fn from(stored: StoredGraph) -> Self {
        let index = build_index(&stored.subtasks);
        Self {
            id: stored.id,
            owner_id: stored.owner_id,
            original_message: stored.original_message,
            subtasks: stored.subtasks,
            index,
            completion_order: stored.completion_order,
            current_subtask_id: stored.current_subtask_id,
            awaiting: stored.awaiting,
            created_at: stored.created_at,
        }
    }
}

fn build_index(subtasks: &[SubTask]) -> HashMap<String, usize> {
    subtasks
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect()
}

/// Kahn's algorithm over skeleton indices; true when every node can be ordered
fn is_acyclic(skeletons: &[SubTaskSkeleton]) -> bool {
    let n = skeletons.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, skeleton) in skeletons.iter().enumerate() {
        for &dep in &skeleton.depends_on {
            in_degree[i] += 1;
            dependents[dep].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = 0;
    while let Some(i) = queue.pop_front() {
        ordered += 1;
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    ordered == n
}

impl TaskGraph {
    /// Build a graph from decomposed skeletons
    ///
    /// Structural problems reject the whole graph. A skeleton whose parameters
    /// fail validation still gets a subtask, created already `Failed`, so
    /// independent branches can run.
    ///
    /// # Arguments
    /// * `owner_id` - User the graph belongs to
    /// * `original_message` - Message the skeletons were decomposed from
    /// * `skeletons` - Subtasks in insertion order, dependencies by index
    ///
    /// # Returns
    /// * `Ok(TaskGraph)` - The graph with fresh subtask ids
    /// * `Err(AppError::InvalidGraph)` - Empty list, dangling index or cycle
    pub fn from_skeletons(
        owner_id: impl Into<String>,
        original_message: impl Into<String>,
        skeletons: Vec<SubTaskSkeleton>,
    ) -> Result<Self, AppError> {
        if skeletons.is_empty() {
            return Err(AppError::InvalidGraph("Graph has no subtasks".to_string()));
        }

        for (i, skeleton) in skeletons.iter().enumerate() {
            for &dep in &skeleton.depends_on {
                if dep >= skeletons.len() {
                    return Err(AppError::InvalidGraph(format!(
                        "Subtask {} ('{}') depends on missing subtask {}",
                        i, skeleton.description, dep
                    )));
                }
            }
        }
        if !is_acyclic(&skeletons) {
            return Err(AppError::InvalidGraph(
                "Subtask dependencies contain a cycle".to_string(),
            ));
        }

        let ids: Vec<String> = skeletons.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let subtasks: Vec<SubTask> = skeletons
            .into_iter()
            .zip(ids.iter())
            .map(|(skeleton, id)| {
                let mut depends_on: Vec<String> =
                    skeleton.depends_on.iter().map(|&d| ids[d].clone()).collect();
                depends_on.dedup();

                let (status, error) = match skeleton.params.validate() {
                    Ok(()) => (SubTaskStatus::Pending, None),
                    Err(msg) => {
                        tracing::warn!(
                            subtask_id = %id,
                            kind = skeleton.params.kind().as_str(),
                            error = %msg,
                            "Subtask failed validation"
                        );
                        (
                            SubTaskStatus::Failed,
                            Some(super::ExecutionError::Validation(msg).to_string()),
                        )
                    }
                };

                SubTask {
                    id: id.clone(),
                    description: skeleton.description,
                    params: skeleton.params,
                    depends_on,
                    require_confirmation: skeleton.require_confirmation,
                    confirmed: false,
                    status,
                    result: None,
                    error,
                }
            })
            .collect();

        let index = build_index(&subtasks);
        let graph = Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            original_message: original_message.into(),
            subtasks,
            index,
            completion_order: Vec::new(),
            current_subtask_id: None,
            awaiting: None,
            created_at: Utc::now(),
        };

        tracing::debug!(
            graph_id = %graph.id,
            subtasks = graph.subtasks.len(),
            "Built task graph"
        );
        Ok(graph)
    }

    /// Subtasks in insertion order
    pub fn subtasks(&self) -> &[SubTask] {
        &self.subtasks
    }

    /// Number of subtasks
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    /// True when the graph has no subtasks
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Position of a subtask in insertion order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Look up a subtask by id
    pub fn get(&self, id: &str) -> Option<&SubTask> {
        self.position(id).map(|i| &self.subtasks[i])
    }

    /// Subtask at `position`
    pub fn at(&self, position: usize) -> &SubTask {
        &self.subtasks[position]
    }

    pub(crate) fn at_mut(&mut self, position: usize) -> &mut SubTask {
        &mut self.subtasks[position]
    }

    /// Positions of the subtasks `position` depends on
    pub fn dependency_positions(&self, position: usize) -> Vec<usize> {
        self.subtasks[position]
            .depends_on
            .iter()
            .filter_map(|id| self.position(id))
            .collect()
    }

    /// True when every dependency of `position` is Completed
    pub fn dependencies_completed(&self, position: usize) -> bool {
        self.dependency_positions(position)
            .into_iter()
            .all(|d| self.subtasks[d].status == SubTaskStatus::Completed)
    }

    /// Ids of dependencies of `position` that are not Completed
    pub fn unmet_dependencies(&self, position: usize) -> Vec<String> {
        self.dependency_positions(position)
            .into_iter()
            .filter(|&d| self.subtasks[d].status != SubTaskStatus::Completed)
            .map(|d| self.subtasks[d].id.clone())
            .collect()
    }

    pub(crate) fn record_completion(&mut self, id: &str) {
        self.completion_order.push(id.to_string());
    }

    /// The most recently completed Search
    pub fn latest_completed_search(&self) -> Option<&SubTask> {
        self.completion_order
            .iter()
            .rev()
            .filter_map(|id| self.get(id))
            .find(|s| s.kind() == SubTaskKind::Search && s.status == SubTaskStatus::Completed)
    }

    /// True while some Search has not finished
    pub fn has_outstanding_search(&self) -> bool {
        self.subtasks
            .iter()
            .any(|s| s.kind() == SubTaskKind::Search && !s.status.is_terminal())
    }

    /// True while the graph waits on the user
    pub fn is_waiting(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Count of subtasks in `status`
    pub fn count(&self, status: SubTaskStatus) -> usize {
        self.subtasks.iter().filter(|s| s.status == status).count()
    }
}
