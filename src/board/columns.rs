//! Column reordering: the columns of one board form a dense position scope.

use rusqlite::{Connection, params};
use taskboard_common::position;
use taskboard_common::{BoardView, Column, ColumnSpec, ColumnUpdate, ColumnView};
use tracing::{debug, info};
use uuid::Uuid;

use super::boards::validated_columns;
use super::db::{self, BoardDb, Scope};
use super::validate;
use crate::errors::{BoardError, BoardResult};

/// Case-insensitive name clash with a sibling column, ignoring `except`.
fn ensure_unique_name(
    conn: &Connection,
    board_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> BoardResult<()> {
    let wanted = name.to_lowercase();
    let clash = db::list_columns(conn, board_id)?
        .into_iter()
        .filter(|column| Some(column.id) != except)
        .any(|column| column.name.to_lowercase() == wanted);
    if clash {
        return Err(BoardError::validation(
            "name",
            format!("a column named '{}' already exists on this board", name),
        ));
    }
    Ok(())
}

impl BoardDb {
    /// Create a column. `position` of `None` appends; a position past the end
    /// is clamped to append.
    pub fn create_column(
        &self,
        owner: &str,
        board_id: Uuid,
        name: &str,
        color: &str,
        position: Option<i64>,
    ) -> BoardResult<Column> {
        let name = validate::column_name(name)?;
        let color = validate::color(color)?;
        if let Some(requested) = position {
            validate::non_negative("position", requested)?;
        }

        let tx = self.write_tx()?;
        let board = db::find_board(&tx, owner, board_id)?;
        ensure_unique_name(&tx, board.id, &name, None)?;

        let scope = Scope::BoardColumns(board.id);
        let len = db::scope_len(&tx, scope)?;
        let target = position::clamp_insert(position, len);
        if target < len {
            db::apply_shift(&tx, scope, position::insert_shift(target))?;
        }
        let column = db::insert_column(&tx, board.id, &name, &color, target)?;
        db::ensure_dense(&tx, scope)?;
        self.commit(tx)?;

        info!(column_id = %column.id, board_id = %board.id, position = target, "created column");
        Ok(column)
    }

    /// The column with its tasks and their subtasks.
    pub fn get_column(&self, owner: &str, id: Uuid) -> BoardResult<ColumnView> {
        let column = db::find_column(self.conn(), owner, id)?;
        db::column_view(self.conn(), column)
    }

    /// Rename, recolor and/or move a column within its board.
    pub fn update_column(
        &self,
        owner: &str,
        id: Uuid,
        update: ColumnUpdate,
    ) -> BoardResult<Column> {
        let name = update.name.as_deref().map(validate::column_name).transpose()?;
        let color = update.color.as_deref().map(validate::color).transpose()?;
        if let Some(requested) = update.position {
            validate::non_negative("position", requested)?;
        }

        let tx = self.write_tx()?;
        let column = db::find_column(&tx, owner, id)?;
        let now = db::now();

        if let Some(name) = &name {
            ensure_unique_name(&tx, column.board_id, name, Some(column.id))?;
            tx.execute(
                "UPDATE columns SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, column.id],
            )?;
        }
        if let Some(color) = &color {
            tx.execute(
                "UPDATE columns SET color = ?1, updated_at = ?2 WHERE id = ?3",
                params![color, now, column.id],
            )?;
        }
        if let Some(requested) = update.position {
            let scope = Scope::BoardColumns(column.board_id);
            let plan = position::plan_move(column.position, requested, db::scope_len(&tx, scope)?);
            if let Some(shift) = plan.shift {
                debug!(column_id = %column.id, from = column.position, to = plan.target, "moving column");
                db::apply_shift(&tx, scope, shift)?;
                tx.execute(
                    "UPDATE columns SET position = ?1, updated_at = ?2 WHERE id = ?3",
                    params![plan.target, now, column.id],
                )?;
                db::ensure_dense(&tx, scope)?;
            }
        }

        let updated = db::find_column(&tx, owner, id)?;
        self.commit(tx)?;
        info!(column_id = %updated.id, position = updated.position, "updated column");
        Ok(updated)
    }

    /// Delete a column with its tasks and close the gap it leaves.
    pub fn delete_column(&self, owner: &str, id: Uuid) -> BoardResult<()> {
        let tx = self.write_tx()?;
        let column = db::find_column(&tx, owner, id)?;
        let scope = Scope::BoardColumns(column.board_id);

        db::delete_column_rows(&tx, column.id)?;
        db::apply_shift(&tx, scope, position::remove_shift(column.position))?;
        db::ensure_dense(&tx, scope)?;
        self.commit(tx)?;

        info!(column_id = %column.id, board_id = %column.board_id, "deleted column");
        Ok(())
    }

    /// Replace a board's name and full column list in one batch ("edit
    /// board").
    ///
    /// Columns whose id is missing from `columns` are deleted with their
    /// tasks; listed ids are renamed/recolored; entries without an id are
    /// created. Every column ends at its index in `columns`: positions are
    /// taken as final, not reached through single-step moves.
    pub fn reconcile_columns(
        &self,
        owner: &str,
        board_id: Uuid,
        name: &str,
        columns: &[ColumnSpec],
    ) -> BoardResult<BoardView> {
        let name = validate::board_name(name)?;
        let columns = validated_columns(columns)?;
        let mut listed = std::collections::HashSet::new();
        for id in columns.iter().filter_map(|c| c.id) {
            if !listed.insert(id) {
                return Err(BoardError::validation(
                    "columns",
                    format!("column {} is listed more than once", id),
                ));
            }
        }

        let tx = self.write_tx()?;
        let board = db::find_board(&tx, owner, board_id)?;
        let existing = db::list_columns(&tx, board.id)?;
        if let Some(unknown) = listed
            .iter()
            .find(|id| !existing.iter().any(|column| column.id == **id))
        {
            return Err(BoardError::not_found("Column", unknown));
        }

        let mut removed = 0usize;
        for column in existing.iter().filter(|c| !listed.contains(&c.id)) {
            db::delete_column_rows(&tx, column.id)?;
            removed += 1;
        }

        let now = db::now();
        for (index, column) in columns.iter().enumerate() {
            match column.id {
                Some(id) => {
                    tx.execute(
                        "UPDATE columns SET name = ?1, color = ?2, position = ?3, updated_at = ?4 WHERE id = ?5",
                        params![column.name, column.color, index as i64, now, id],
                    )?;
                }
                None => {
                    db::insert_column(&tx, board.id, &column.name, &column.color, index as i64)?;
                }
            }
        }
        tx.execute(
            "UPDATE boards SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, now, board.id],
        )?;
        db::ensure_dense(&tx, Scope::BoardColumns(board.id))?;

        let board = db::find_board(&tx, owner, board.id)?;
        let view = db::board_view(&tx, board)?;
        self.commit(tx)?;
        info!(board_id = %view.board.id, columns = view.columns.len(), removed, "reconciled board columns");
        Ok(view)
    }
}
