use rusqlite::params;
use taskboard_common::{Board, BoardView, ColumnSpec};
use tracing::info;
use uuid::Uuid;

use super::db::{self, BoardDb, Scope};
use super::validate;
use crate::errors::BoardResult;

impl BoardDb {
    /// Create a board with its initial columns, in list order. Ids on the
    /// column entries are ignored: every column is new.
    pub fn create_board(
        &self,
        owner: &str,
        name: &str,
        columns: &[ColumnSpec],
    ) -> BoardResult<BoardView> {
        let name = validate::board_name(name)?;
        let columns = validated_columns(columns)?;

        let tx = self.write_tx()?;
        let now = db::now();
        let board = Board {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            name,
            created_at: now.clone(),
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO boards (id, owner_id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![board.id, board.owner_id, board.name, board.created_at, board.updated_at],
        )?;
        for (index, column) in columns.iter().enumerate() {
            db::insert_column(&tx, board.id, &column.name, &column.color, index as i64)?;
        }
        db::ensure_dense(&tx, Scope::BoardColumns(board.id))?;

        let view = db::board_view(&tx, board)?;
        self.commit(tx)?;
        info!(board_id = %view.board.id, columns = view.columns.len(), "created board");
        Ok(view)
    }

    pub fn list_boards(&self, owner: &str) -> BoardResult<Vec<Board>> {
        db::list_boards(self.conn(), owner)
    }

    /// The board with its columns, tasks and subtasks, all in display order.
    pub fn get_board(&self, owner: &str, id: Uuid) -> BoardResult<BoardView> {
        let board = db::find_board(self.conn(), owner, id)?;
        db::board_view(self.conn(), board)
    }

    /// Delete a board and everything it owns.
    pub fn delete_board(&self, owner: &str, id: Uuid) -> BoardResult<()> {
        let tx = self.write_tx()?;
        let board = db::find_board(&tx, owner, id)?;
        db::delete_board_rows(&tx, board.id)?;
        self.commit(tx)?;
        info!(board_id = %board.id, "deleted board");
        Ok(())
    }
}

/// Validate a column list: field rules per entry, then case-insensitive name
/// uniqueness across the whole list. Returns the trimmed entries.
pub(crate) fn validated_columns(columns: &[ColumnSpec]) -> BoardResult<Vec<ColumnSpec>> {
    let columns = columns
        .iter()
        .map(|column| -> BoardResult<ColumnSpec> {
            Ok(ColumnSpec {
                id: column.id,
                name: validate::column_name(&column.name)?,
                color: validate::color(&column.color)?,
            })
        })
        .collect::<BoardResult<Vec<_>>>()?;
    validate::unique_names("columns", columns.iter().map(|c| c.name.as_str()))?;
    Ok(columns)
}
