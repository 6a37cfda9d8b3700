use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    pub color: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub column_id: Uuid,
    pub name: String,
    pub description: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub name: String,
    pub completed: bool,
    pub created_at: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<TaskDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnView>,
}

// Service inputs

/// One entry of an "edit board" column list. Entries without an `id` are new.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSpec {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub color: String,
}

/// One entry of a replacement subtask list. Entries without an `id` are new.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtaskSpec {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

/// Partial column update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub position: Option<i64>,
}

/// Partial task update. `None` leaves a field unchanged; `subtasks` of
/// `Some` replaces the whole subtask list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub column_id: Option<Uuid>,
    pub position: Option<i64>,
    pub subtasks: Option<Vec<SubtaskSpec>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtaskUpdate {
    pub name: Option<String>,
    pub completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: Uuid::nil(),
            column_id: Uuid::nil(),
            name: "Write docs".into(),
            description: String::new(),
            position: 0,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn task_detail_flattens_task_fields() {
        let detail = TaskDetail {
            task: sample_task(),
            subtasks: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Write docs");
        assert_eq!(json["position"], 0);
        assert!(json["subtasks"].as_array().unwrap().is_empty());
        assert!(json.get("task").is_none());
    }

    #[test]
    fn column_spec_id_is_optional() {
        let spec: ColumnSpec =
            serde_json::from_str(r##"{"name": "Todo", "color": "#ff0000"}"##).unwrap();
        assert_eq!(spec.id, None);
        assert_eq!(spec.name, "Todo");
    }
}
