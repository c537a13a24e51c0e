//! Declarative column metadata and the per-type SQL fragment cache.
//!
//! Every entity declares an ordered list of [`ColumnDef`]s at construction
//! time; [`TableSchema::build`] derives the full persisted column list
//! (identity + version, type-specific, audit when declared) and renders the
//! statement fragments once. Schemas are cached behind a `OnceLock` per
//! entity type and are read-only afterwards, so concurrent reuse is safe.

use crate::database::entity::Entity;

/// Mapping of one entity field to one table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub field: &'static str,
    pub column: &'static str,
    /// Excluded from the generic update statement; a dedicated statement
    /// owns this column's mutation (counters, usage stats).
    pub skip_on_update: bool,
}

impl ColumnDef {
    pub const fn new(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            skip_on_update: false,
        }
    }

    pub const fn skip_on_update(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            skip_on_update: true,
        }
    }
}

const ID_COLUMN: ColumnDef = ColumnDef::new("id", "id");
const VERSION_COLUMN: ColumnDef = ColumnDef::new("row_version", "row_version");

const AUDIT_COLUMNS: [ColumnDef; 4] = [
    ColumnDef::new("created_at", "created_at"),
    ColumnDef::new("created_by", "created_by"),
    ColumnDef::new("updated_at", "updated_at"),
    ColumnDef::new("updated_by", "updated_by"),
];

/// Cached, immutable SQL rendering for one entity type.
///
/// A missing or inconsistent mapping is a programming fault and panics here
/// at first use; it is never surfaced as a runtime error kind.
#[derive(Debug)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,

    pub select_list: String,
    pub insert_columns: String,
    pub insert_params: String,
    pub update_assignments: String,

    pub select_by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub delete_many: String,
}

impl TableSchema {
    pub fn build<E: Entity>() -> Self {
        Self::new(E::TABLE, E::COLUMNS, E::AUDITABLE)
    }

    fn new(table: &'static str, columns: &[ColumnDef], auditable: bool) -> Self {
        assert!(!table.trim().is_empty(), "table name must not be empty");

        let mut all = vec![ID_COLUMN, VERSION_COLUMN];
        all.extend_from_slice(columns);
        if auditable {
            all.extend_from_slice(&AUDIT_COLUMNS);
        }

        for (idx, col) in all.iter().enumerate() {
            assert!(
                !col.column.trim().is_empty() && !col.field.trim().is_empty(),
                "{table}: column mapping at position {idx} has an empty name"
            );
            assert!(
                !all[..idx].iter().any(|other| other.column == col.column),
                "{table}: column {:?} is mapped more than once",
                col.column
            );
        }

        let select_list = all
            .iter()
            .map(|c| format!("\"{table}\".\"{}\" AS \"{}\"", c.column, c.field))
            .collect::<Vec<_>>()
            .join(", ");

        let insert_columns = all
            .iter()
            .map(|c| format!("\"{}\"", c.column))
            .collect::<Vec<_>>()
            .join(", ");

        let insert_params = (1..=all.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let updatable: Vec<&ColumnDef> = all
            .iter()
            .filter(|c| c.column != ID_COLUMN.column && c.column != VERSION_COLUMN.column)
            .filter(|c| !c.skip_on_update)
            .collect();

        let update_assignments = updatable
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{}\" = ${}", c.column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        let select_by_id =
            format!("SELECT {select_list} FROM \"{table}\" WHERE \"{table}\".\"id\" = $1 LIMIT 1");

        let insert = format!("INSERT INTO \"{table}\" ({insert_columns}) VALUES ({insert_params})");

        let id_param = updatable.len() + 1;
        let version_param = updatable.len() + 2;
        let update = format!(
            "UPDATE \"{table}\" SET {update_assignments}, \"row_version\" = \"row_version\" + 1 \
             WHERE \"id\" = ${id_param} AND \"row_version\" = ${version_param}"
        );

        let delete = format!("DELETE FROM \"{table}\" WHERE \"id\" = $1");
        let delete_many = format!("DELETE FROM \"{table}\" WHERE \"id\" = ANY($1)");

        Self {
            table,
            columns: all,
            select_list,
            insert_columns,
            insert_params,
            update_assignments,
            select_by_id,
            insert,
            update,
            delete,
            delete_many,
        }
    }

    /// Multi-row variant of the insert statement: one parameter set per row,
    /// numbered consecutively so rows bind back to back.
    pub fn insert_many_sql(&self, rows: usize) -> String {
        let width = self.columns.len();
        let values = (0..rows)
            .map(|row| {
                let params = (1..=width)
                    .map(|i| format!("${}", row * width + i))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO \"{}\" ({}) VALUES {values}",
            self.table, self.insert_columns
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("name", "name"),
        ColumnDef::skip_on_update("usage_count", "usage_count"),
    ];

    #[test]
    fn select_list_qualifies_and_aliases_every_column() {
        let schema = TableSchema::new("things", COLUMNS, false);
        assert_eq!(
            schema.select_list,
            "\"things\".\"id\" AS \"id\", \"things\".\"row_version\" AS \"row_version\", \
             \"things\".\"name\" AS \"name\", \"things\".\"usage_count\" AS \"usage_count\""
        );
    }

    #[test]
    fn insert_covers_all_columns_in_declaration_order() {
        let schema = TableSchema::new("things", COLUMNS, false);
        assert_eq!(
            schema.insert,
            "INSERT INTO \"things\" (\"id\", \"row_version\", \"name\", \"usage_count\") \
             VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn update_excludes_identity_version_and_skip_on_update_columns() {
        let schema = TableSchema::new("things", COLUMNS, false);
        assert_eq!(schema.update_assignments, "\"name\" = $1");
        assert_eq!(
            schema.update,
            "UPDATE \"things\" SET \"name\" = $1, \"row_version\" = \"row_version\" + 1 \
             WHERE \"id\" = $2 AND \"row_version\" = $3"
        );
    }

    #[test]
    fn audit_columns_appended_only_when_declared() {
        let plain = TableSchema::new("things", COLUMNS, false);
        assert_eq!(plain.columns.len(), 4);

        let audited = TableSchema::new("things", COLUMNS, true);
        assert_eq!(audited.columns.len(), 8);
        assert!(audited.update_assignments.contains("\"updated_by\" = $5"));
        // audit columns are updatable; only the skipped counter is excluded
        assert!(!audited.update_assignments.contains("usage_count"));
    }

    #[test]
    fn multi_row_insert_numbers_parameter_sets_consecutively() {
        let schema = TableSchema::new("things", COLUMNS, false);
        assert_eq!(
            schema.insert_many_sql(2),
            "INSERT INTO \"things\" (\"id\", \"row_version\", \"name\", \"usage_count\") \
             VALUES ($1, $2, $3, $4), ($5, $6, $7, $8)"
        );
    }

    #[test]
    #[should_panic(expected = "mapped more than once")]
    fn duplicate_column_mapping_is_a_construction_fault() {
        let duplicated: &[ColumnDef] = &[
            ColumnDef::new("name", "name"),
            ColumnDef::new("name_again", "name"),
        ];
        let _ = TableSchema::new("things", duplicated, false);
    }

    #[test]
    #[should_panic(expected = "mapped more than once")]
    fn reserved_identity_column_cannot_be_redeclared() {
        let clashing: &[ColumnDef] = &[ColumnDef::new("id", "id")];
        let _ = TableSchema::new("things", clashing, false);
    }
}
