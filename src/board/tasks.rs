//! Task reordering: the tasks of one column form a dense position scope.
//! Tasks may also move between columns of the same board.

use std::collections::HashSet;

use rusqlite::{Connection, params};
use taskboard_common::position;
use taskboard_common::{Subtask, SubtaskSpec, SubtaskUpdate, Task, TaskDetail, TaskUpdate};
use tracing::{debug, info};
use uuid::Uuid;

use super::db::{self, BoardDb, Scope};
use super::validate;
use crate::errors::{BoardError, BoardResult};

/// Trim and check a replacement subtask list before the transaction opens.
fn validated_subtasks(subtasks: &[SubtaskSpec]) -> BoardResult<Vec<SubtaskSpec>> {
    let mut ids = HashSet::new();
    subtasks
        .iter()
        .map(|subtask| -> BoardResult<SubtaskSpec> {
            if let Some(id) = subtask.id {
                if !ids.insert(id) {
                    return Err(BoardError::validation(
                        "subtasks",
                        format!("subtask {} is listed more than once", id),
                    ));
                }
            }
            Ok(SubtaskSpec {
                id: subtask.id,
                name: validate::subtask_name(&subtask.name)?,
            })
        })
        .collect()
}

/// Make the task's subtasks match `wanted`: absent ids are deleted, listed
/// ids are renamed, entries without an id are created open. Completion is
/// never changed here.
fn reconcile_subtasks(conn: &Connection, task_id: Uuid, wanted: &[SubtaskSpec]) -> BoardResult<()> {
    let existing = db::list_subtasks(conn, task_id)?;
    let known: HashSet<Uuid> = existing.iter().map(|s| s.id).collect();
    if let Some(unknown) = wanted.iter().filter_map(|s| s.id).find(|id| !known.contains(id)) {
        return Err(BoardError::not_found("Subtask", unknown));
    }

    let kept: HashSet<Uuid> = wanted.iter().filter_map(|s| s.id).collect();
    for subtask in existing.iter().filter(|s| !kept.contains(&s.id)) {
        conn.execute("DELETE FROM subtasks WHERE id = ?1", params![subtask.id])?;
    }
    for subtask in wanted {
        match subtask.id {
            Some(id) => {
                conn.execute(
                    "UPDATE subtasks SET name = ?1 WHERE id = ?2",
                    params![subtask.name, id],
                )?;
            }
            None => {
                db::insert_subtask(conn, task_id, &subtask.name)?;
            }
        }
    }
    Ok(())
}

impl BoardDb {
    /// Create a task at the end of its column. Tasks are always appended;
    /// callers have no say in the initial position.
    pub fn create_task(
        &self,
        owner: &str,
        column_id: Uuid,
        name: &str,
        description: Option<&str>,
        subtasks: &[String],
    ) -> BoardResult<TaskDetail> {
        let name = validate::task_name(name)?;
        let description = validate::description(description)?;
        let subtasks = subtasks
            .iter()
            .map(|s| validate::subtask_name(s))
            .collect::<BoardResult<Vec<_>>>()?;

        let tx = self.write_tx()?;
        let column = db::find_column(&tx, owner, column_id)?;
        let scope = Scope::ColumnTasks(column.id);
        let now = db::now();
        let task = Task {
            id: Uuid::new_v4(),
            column_id: column.id,
            name,
            description,
            position: db::scope_len(&tx, scope)?,
            created_at: now.clone(),
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO tasks (id, column_id, name, description, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.column_id,
                task.name,
                task.description,
                task.position,
                task.created_at,
                task.updated_at
            ],
        )?;
        for subtask in &subtasks {
            db::insert_subtask(&tx, task.id, subtask)?;
        }
        db::ensure_dense(&tx, scope)?;

        let detail = db::task_detail(&tx, task)?;
        self.commit(tx)?;
        info!(task_id = %detail.task.id, column_id = %column.id, position = detail.task.position, "created task");
        Ok(detail)
    }

    pub fn get_task(&self, owner: &str, id: Uuid) -> BoardResult<TaskDetail> {
        let task = db::find_task(self.conn(), owner, id)?;
        db::task_detail(self.conn(), task)
    }

    /// Update a task's fields and/or move it.
    ///
    /// A `column_id` naming another column moves the task there: appended when
    /// `position` is absent, otherwise inserted at the clamped position. A
    /// `position` alone moves the task inside its column, clamped to the last
    /// index. The destination must be a column of the same board.
    pub fn update_task(&self, owner: &str, id: Uuid, update: TaskUpdate) -> BoardResult<TaskDetail> {
        let name = update.name.as_deref().map(validate::task_name).transpose()?;
        let description = update
            .description
            .as_deref()
            .map(|d| validate::description(Some(d)))
            .transpose()?;
        let subtasks = update.subtasks.as_deref().map(validated_subtasks).transpose()?;
        if let Some(requested) = update.position {
            validate::non_negative("position", requested)?;
        }

        let tx = self.write_tx()?;
        let task = db::find_task(&tx, owner, id)?;
        let origin = Scope::ColumnTasks(task.column_id);
        let now = db::now();

        match update.column_id.filter(|column_id| *column_id != task.column_id) {
            Some(destination_id) => {
                let current = db::find_column(&tx, owner, task.column_id)?;
                let destination = db::find_column(&tx, owner, destination_id)?;
                if destination.board_id != current.board_id {
                    return Err(BoardError::validation(
                        "column_id",
                        "destination column belongs to a different board",
                    ));
                }
                let dest_scope = Scope::ColumnTasks(destination.id);
                let plan = position::plan_cross_move(
                    task.position,
                    update.position,
                    db::scope_len(&tx, dest_scope)?,
                );
                debug!(
                    task_id = %task.id,
                    from_column = %task.column_id,
                    to_column = %destination.id,
                    from = task.position,
                    to = plan.target,
                    "moving task across columns"
                );

                db::apply_shift(&tx, origin, plan.origin)?;
                if let Some(shift) = plan.destination {
                    db::apply_shift(&tx, dest_scope, shift)?;
                }
                tx.execute(
                    "UPDATE tasks SET column_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
                    params![destination.id, plan.target, now, task.id],
                )?;
                db::ensure_dense(&tx, origin)?;
                db::ensure_dense(&tx, dest_scope)?;
            }
            None => {
                if let Some(requested) = update.position {
                    let plan = position::plan_move(task.position, requested, db::scope_len(&tx, origin)?);
                    if let Some(shift) = plan.shift {
                        debug!(task_id = %task.id, from = task.position, to = plan.target, "moving task");
                        db::apply_shift(&tx, origin, shift)?;
                        tx.execute(
                            "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3",
                            params![plan.target, now, task.id],
                        )?;
                        db::ensure_dense(&tx, origin)?;
                    }
                }
            }
        }

        if let Some(name) = &name {
            tx.execute(
                "UPDATE tasks SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, task.id],
            )?;
        }
        if let Some(description) = &description {
            tx.execute(
                "UPDATE tasks SET description = ?1, updated_at = ?2 WHERE id = ?3",
                params![description, now, task.id],
            )?;
        }
        if let Some(subtasks) = &subtasks {
            reconcile_subtasks(&tx, task.id, subtasks)?;
        }

        let updated = db::find_task(&tx, owner, task.id)?;
        let detail = db::task_detail(&tx, updated)?;
        self.commit(tx)?;
        info!(
            task_id = %detail.task.id,
            column_id = %detail.task.column_id,
            position = detail.task.position,
            "updated task"
        );
        Ok(detail)
    }

    /// Delete a task with its subtasks and close the gap in its column.
    pub fn delete_task(&self, owner: &str, id: Uuid) -> BoardResult<()> {
        let tx = self.write_tx()?;
        let task = db::find_task(&tx, owner, id)?;
        let scope = Scope::ColumnTasks(task.column_id);

        db::delete_task_rows(&tx, task.id)?;
        db::apply_shift(&tx, scope, position::remove_shift(task.position))?;
        db::ensure_dense(&tx, scope)?;
        self.commit(tx)?;

        info!(task_id = %task.id, column_id = %task.column_id, "deleted task");
        Ok(())
    }

    /// Rename a subtask or toggle its completion. The only way completion
    /// changes.
    pub fn update_subtask(
        &self,
        owner: &str,
        id: Uuid,
        update: SubtaskUpdate,
    ) -> BoardResult<Subtask> {
        let name = update.name.as_deref().map(validate::subtask_name).transpose()?;

        let tx = self.write_tx()?;
        let subtask = db::find_subtask(&tx, owner, id)?;
        if let Some(name) = &name {
            tx.execute(
                "UPDATE subtasks SET name = ?1 WHERE id = ?2",
                params![name, subtask.id],
            )?;
        }
        if let Some(completed) = update.completed {
            tx.execute(
                "UPDATE subtasks SET completed = ?1 WHERE id = ?2",
                params![completed, subtask.id],
            )?;
        }
        let updated = db::find_subtask(&tx, owner, subtask.id)?;
        self.commit(tx)?;

        info!(subtask_id = %updated.id, completed = updated.completed, "updated subtask");
        Ok(updated)
    }
}
