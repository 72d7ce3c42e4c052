// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is the undo record of one write already applied to a locked
// table. Reverting restores the table to its state before that write.
//
// ============================================================================

use crate::core::Row;
use crate::storage::{RowId, Table};

/// Undo record for a single applied write
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted; undo removes it
    InsertRow { table: String, row_id: RowId },

    /// A row was deleted; undo puts it back under the same id
    DeleteRow {
        table: String,
        row_id: RowId,
        old_row: Row,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    /// Undo this change on the (already locked) table
    pub fn revert(self, table: &mut Table) {
        match self {
            Change::InsertRow { row_id, .. } => {
                table.remove(row_id);
            }
            Change::DeleteRow { row_id, old_row, .. } => {
                table.restore(row_id, old_row);
            }
        }
    }
}
