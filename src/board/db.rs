use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use taskboard_common::position::{self, Shift};
use taskboard_common::{Board, BoardView, Column, ColumnView, Subtask, Task, TaskDetail};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::errors::{BoardError, BoardResult};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite I/O
/// off the async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    ///
    /// If the calling future is dropped (a request timeout, a client hang-up)
    /// the closure is skipped when it has not started yet, and any write it
    /// has in flight is rolled back instead of committed.
    pub async fn call<F, R>(&self, f: F) -> BoardResult<R>
    where
        F: FnOnce(&BoardDb) -> BoardResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        let (caller, _waiting) = oneshot::channel::<()>();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            if caller.is_closed() {
                debug!("caller gone before DB work started; skipping");
                return Err(BoardError::Abandoned);
            }
            *guard.caller.borrow_mut() = Some(caller);
            let result = f(&guard);
            guard.caller.borrow_mut().take();
            result
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct BoardDb {
    conn: Connection,
    /// Liveness of the async caller currently holding the lock, if any.
    caller: RefCell<Option<oneshot::Sender<()>>>,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self {
            conn,
            caller: RefCell::new(None),
        };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            caller: RefCell::new(None),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        // Foreign keys carry no ON DELETE action: cascades are issued as
        // explicit statements, children first.
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id BLOB PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS columns (
                    id BLOB PRIMARY KEY,
                    board_id BLOB NOT NULL REFERENCES boards(id),
                    name TEXT NOT NULL,
                    color TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id BLOB PRIMARY KEY,
                    column_id BLOB NOT NULL REFERENCES columns(id),
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    position INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS subtasks (
                    id BLOB PRIMARY KEY,
                    task_id BLOB NOT NULL REFERENCES tasks(id),
                    name TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_boards_owner ON boards(owner_id);
                CREATE INDEX IF NOT EXISTS idx_columns_board ON columns(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);
                CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Begin a write transaction. `IMMEDIATE` takes the write lock up front so
    /// two reorders of the same scope never compute shifts from the same read.
    pub(crate) fn write_tx(&self) -> BoardResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Commit a write transaction unless the caller that asked for it has
    /// gone away, in which case the transaction is dropped and rolls back.
    pub(crate) fn commit(&self, tx: Transaction<'_>) -> BoardResult<()> {
        let abandoned = self
            .caller
            .borrow()
            .as_ref()
            .is_some_and(|caller| caller.is_closed());
        if abandoned {
            warn!("caller gone before commit; rolling back");
            return Err(BoardError::Abandoned);
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current positions of a scope, in position order.
    pub fn scope_positions(&self, scope: Scope) -> BoardResult<Vec<i64>> {
        scope_positions(&self.conn, scope)
    }

    /// Scan every board and column and report scopes whose positions are not
    /// dense. Used by `taskboard check`; normal reads trust the invariant.
    pub fn find_violations(&self) -> BoardResult<Vec<Violation>> {
        let mut scopes = Vec::new();
        {
            let mut stmt = self.conn.prepare("SELECT id FROM boards ORDER BY created_at")?;
            let ids = stmt.query_map([], |row| row.get::<_, Uuid>(0))?;
            for id in ids {
                scopes.push(Scope::BoardColumns(id?));
            }
        }
        {
            let mut stmt = self.conn.prepare("SELECT id FROM columns ORDER BY created_at")?;
            let ids = stmt.query_map([], |row| row.get::<_, Uuid>(0))?;
            for id in ids {
                scopes.push(Scope::ColumnTasks(id?));
            }
        }

        let mut violations = Vec::new();
        for scope in scopes {
            let positions = scope_positions(&self.conn, scope)?;
            if !position::is_dense(&positions) {
                violations.push(Violation {
                    scope: scope.to_string(),
                    positions,
                });
            }
        }
        Ok(violations)
    }
}

/// A scope whose positions are not `0..len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub scope: String,
    pub positions: Vec<i64>,
}

// ── Scopes and shifts ─────────────────────────────────────────────────

/// A set of siblings sharing one position sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    BoardColumns(Uuid),
    ColumnTasks(Uuid),
}

impl Scope {
    fn table(&self) -> &'static str {
        match self {
            Self::BoardColumns(_) => "columns",
            Self::ColumnTasks(_) => "tasks",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::BoardColumns(_) => "board_id",
            Self::ColumnTasks(_) => "column_id",
        }
    }

    fn parent(&self) -> Uuid {
        match self {
            Self::BoardColumns(id) | Self::ColumnTasks(id) => *id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoardColumns(id) => write!(f, "columns of board {}", id),
            Self::ColumnTasks(id) => write!(f, "tasks of column {}", id),
        }
    }
}

pub(crate) fn scope_len(conn: &Connection, scope: Scope) -> BoardResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
        scope.table(),
        scope.key()
    );
    Ok(conn.query_row(&sql, params![scope.parent()], |row| row.get(0))?)
}

pub(crate) fn scope_positions(conn: &Connection, scope: Scope) -> BoardResult<Vec<i64>> {
    let sql = format!(
        "SELECT position FROM {} WHERE {} = ?1 ORDER BY position",
        scope.table(),
        scope.key()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![scope.parent()], |row| row.get(0))?;
    let mut positions = Vec::new();
    for row in rows {
        positions.push(row?);
    }
    Ok(positions)
}

/// Apply a bulk position shift to every sibling in range. Returns the number
/// of rows moved.
pub(crate) fn apply_shift(conn: &Connection, scope: Scope, shift: Shift) -> BoardResult<usize> {
    let sql = format!(
        "UPDATE {} SET position = position + ?1, updated_at = ?2
         WHERE {} = ?3 AND position >= ?4 AND (?5 IS NULL OR position < ?5)",
        scope.table(),
        scope.key()
    );
    let moved = conn.execute(
        &sql,
        params![shift.delta, now(), scope.parent(), shift.start, shift.end],
    )?;
    debug!(%scope, start = shift.start, end = ?shift.end, delta = shift.delta, moved, "applied shift");
    Ok(moved)
}

/// Post-condition check: fail with `InvariantViolation` unless the scope's
/// positions are exactly `0..len`. Callers run it before committing so a
/// violation rolls the whole transaction back.
pub(crate) fn ensure_dense(conn: &Connection, scope: Scope) -> BoardResult<()> {
    let positions = scope_positions(conn, scope)?;
    if position::is_dense(&positions) {
        Ok(())
    } else {
        error!(%scope, ?positions, "position invariant violated");
        Err(BoardError::InvariantViolation {
            scope: scope.to_string(),
            positions,
        })
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ── Row mapping ───────────────────────────────────────────────────────

const BOARD_FIELDS: &str = "b.id, b.owner_id, b.name, b.created_at, b.updated_at";
const COLUMN_FIELDS: &str =
    "c.id, c.board_id, c.name, c.color, c.position, c.created_at, c.updated_at";
const TASK_FIELDS: &str =
    "t.id, t.column_id, t.name, t.description, t.position, t.created_at, t.updated_at";
const SUBTASK_FIELDS: &str = "s.id, s.task_id, s.name, s.completed, s.created_at";

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        column_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn subtask_from_row(row: &Row<'_>) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        id: row.get(0)?,
        task_id: row.get(1)?,
        name: row.get(2)?,
        completed: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// ── Owner-scoped lookups ──────────────────────────────────────────────
//
// Every lookup joins up to `boards.owner_id`, so an entity owned by another
// principal is indistinguishable from a missing one.

pub(crate) fn find_board(conn: &Connection, owner: &str, id: Uuid) -> BoardResult<Board> {
    let sql = format!(
        "SELECT {BOARD_FIELDS} FROM boards b WHERE b.id = ?1 AND b.owner_id = ?2"
    );
    conn.query_row(&sql, params![id, owner], board_from_row)
        .optional()?
        .ok_or_else(|| BoardError::not_found("Board", id))
}

pub(crate) fn find_column(conn: &Connection, owner: &str, id: Uuid) -> BoardResult<Column> {
    let sql = format!(
        "SELECT {COLUMN_FIELDS} FROM columns c
         JOIN boards b ON b.id = c.board_id
         WHERE c.id = ?1 AND b.owner_id = ?2"
    );
    conn.query_row(&sql, params![id, owner], column_from_row)
        .optional()?
        .ok_or_else(|| BoardError::not_found("Column", id))
}

pub(crate) fn find_task(conn: &Connection, owner: &str, id: Uuid) -> BoardResult<Task> {
    let sql = format!(
        "SELECT {TASK_FIELDS} FROM tasks t
         JOIN columns c ON c.id = t.column_id
         JOIN boards b ON b.id = c.board_id
         WHERE t.id = ?1 AND b.owner_id = ?2"
    );
    conn.query_row(&sql, params![id, owner], task_from_row)
        .optional()?
        .ok_or_else(|| BoardError::not_found("Task", id))
}

pub(crate) fn find_subtask(conn: &Connection, owner: &str, id: Uuid) -> BoardResult<Subtask> {
    let sql = format!(
        "SELECT {SUBTASK_FIELDS} FROM subtasks s
         JOIN tasks t ON t.id = s.task_id
         JOIN columns c ON c.id = t.column_id
         JOIN boards b ON b.id = c.board_id
         WHERE s.id = ?1 AND b.owner_id = ?2"
    );
    conn.query_row(&sql, params![id, owner], subtask_from_row)
        .optional()?
        .ok_or_else(|| BoardError::not_found("Subtask", id))
}

pub(crate) fn list_boards(conn: &Connection, owner: &str) -> BoardResult<Vec<Board>> {
    let sql = format!(
        "SELECT {BOARD_FIELDS} FROM boards b WHERE b.owner_id = ?1 ORDER BY b.created_at, b.name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner], board_from_row)?;
    let mut boards = Vec::new();
    for row in rows {
        boards.push(row?);
    }
    Ok(boards)
}

pub(crate) fn list_columns(conn: &Connection, board_id: Uuid) -> BoardResult<Vec<Column>> {
    let sql = format!("SELECT {COLUMN_FIELDS} FROM columns c WHERE c.board_id = ?1 ORDER BY c.position");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![board_id], column_from_row)?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

pub(crate) fn list_tasks(conn: &Connection, column_id: Uuid) -> BoardResult<Vec<Task>> {
    let sql = format!("SELECT {TASK_FIELDS} FROM tasks t WHERE t.column_id = ?1 ORDER BY t.position");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![column_id], task_from_row)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Subtasks of a task in creation order.
pub(crate) fn list_subtasks(conn: &Connection, task_id: Uuid) -> BoardResult<Vec<Subtask>> {
    let sql = format!("SELECT {SUBTASK_FIELDS} FROM subtasks s WHERE s.task_id = ?1 ORDER BY s.rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![task_id], subtask_from_row)?;
    let mut subtasks = Vec::new();
    for row in rows {
        subtasks.push(row?);
    }
    Ok(subtasks)
}

// ── Views ─────────────────────────────────────────────────────────────

pub(crate) fn task_detail(conn: &Connection, task: Task) -> BoardResult<TaskDetail> {
    let subtasks = list_subtasks(conn, task.id)?;
    Ok(TaskDetail { task, subtasks })
}

pub(crate) fn column_view(conn: &Connection, column: Column) -> BoardResult<ColumnView> {
    let mut tasks = Vec::new();
    for task in list_tasks(conn, column.id)? {
        tasks.push(task_detail(conn, task)?);
    }
    Ok(ColumnView { column, tasks })
}

pub(crate) fn board_view(conn: &Connection, board: Board) -> BoardResult<BoardView> {
    let mut columns = Vec::new();
    for column in list_columns(conn, board.id)? {
        columns.push(column_view(conn, column)?);
    }
    Ok(BoardView { board, columns })
}

// ── Inserts ───────────────────────────────────────────────────────────

pub(crate) fn insert_column(
    conn: &Connection,
    board_id: Uuid,
    name: &str,
    color: &str,
    position: i64,
) -> BoardResult<Column> {
    let column = Column {
        id: Uuid::new_v4(),
        board_id,
        name: name.to_string(),
        color: color.to_string(),
        position,
        created_at: now(),
        updated_at: now(),
    };
    conn.execute(
        "INSERT INTO columns (id, board_id, name, color, position, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            column.id,
            column.board_id,
            column.name,
            column.color,
            column.position,
            column.created_at,
            column.updated_at
        ],
    )?;
    Ok(column)
}

pub(crate) fn insert_subtask(conn: &Connection, task_id: Uuid, name: &str) -> BoardResult<Subtask> {
    let subtask = Subtask {
        id: Uuid::new_v4(),
        task_id,
        name: name.to_string(),
        completed: false,
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO subtasks (id, task_id, name, completed, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            subtask.id,
            subtask.task_id,
            subtask.name,
            subtask.completed,
            subtask.created_at
        ],
    )?;
    Ok(subtask)
}

// ── Cascading deletes ─────────────────────────────────────────────────
//
// Children go first; the foreign keys reject any other order. None of these
// close the position gap they leave: the caller owns the scope's shift.

pub(crate) fn delete_task_rows(conn: &Connection, task_id: Uuid) -> BoardResult<()> {
    conn.execute("DELETE FROM subtasks WHERE task_id = ?1", params![task_id])?;
    conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
    Ok(())
}

pub(crate) fn delete_column_rows(conn: &Connection, column_id: Uuid) -> BoardResult<()> {
    conn.execute(
        "DELETE FROM subtasks WHERE task_id IN (SELECT id FROM tasks WHERE column_id = ?1)",
        params![column_id],
    )?;
    conn.execute("DELETE FROM tasks WHERE column_id = ?1", params![column_id])?;
    conn.execute("DELETE FROM columns WHERE id = ?1", params![column_id])?;
    Ok(())
}

pub(crate) fn delete_board_rows(conn: &Connection, board_id: Uuid) -> BoardResult<()> {
    conn.execute(
        "DELETE FROM subtasks WHERE task_id IN (
             SELECT t.id FROM tasks t JOIN columns c ON c.id = t.column_id WHERE c.board_id = ?1
         )",
        params![board_id],
    )?;
    conn.execute(
        "DELETE FROM tasks WHERE column_id IN (SELECT id FROM columns WHERE board_id = ?1)",
        params![board_id],
    )?;
    conn.execute("DELETE FROM columns WHERE board_id = ?1", params![board_id])?;
    conn.execute("DELETE FROM boards WHERE id = ?1", params![board_id])?;
    Ok(())
}
