//! Schema diff engine for comparing a model's output before and after a change
//!
//! Only changes that can break a consumer are reported. Added columns never
//! are; a rename shows up as the removal of the old name.

use breakcheck_core::{ChangeRecord, Schema, TypeChange};

/// Breaking changes between two revisions of one model
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare `old` against `new` for the file at `file_path`
    ///
    /// Rules are independent and may all fire. Records come out as column
    /// removals, then type changes, then a wildcard transition.
    pub fn compare(
        file_path: &str,
        old: &Schema,
        new: &Schema,
        affected_models: &[String],
    ) -> Vec<ChangeRecord> {
        let mut changes = Vec::new();

        let removed: Vec<String> = old.columns().difference(new.columns()).cloned().collect();
        if !removed.is_empty() {
            changes.push(ChangeRecord::column_removed(
                file_path,
                removed,
                affected_models.to_vec(),
            ));
        }

        let type_changes = type_changes(old, new);
        if !type_changes.is_empty() {
            changes.push(ChangeRecord::type_changed(
                file_path,
                type_changes,
                affected_models.to_vec(),
            ));
        }

        if old.is_wildcard() != new.is_wildcard() {
            let summary = if old.is_wildcard() {
                "projection changed from `*` to an explicit column list"
            } else {
                "projection changed from an explicit column list to `*`"
            };
            changes.push(ChangeRecord::schema_changed(
                file_path,
                summary,
                affected_models.to_vec(),
            ));
        }

        changes
    }
}

/// Columns present on both sides with a known, different type
fn type_changes(old: &Schema, new: &Schema) -> Vec<TypeChange> {
    old.columns()
        .intersection(new.columns())
        .filter_map(|column| {
            let old_type = old.column_type(column)?;
            let new_type = new.column_type(column)?;
            (old_type != new_type).then(|| TypeChange {
                column: column.clone(),
                old_type: old_type.to_string(),
                new_type: new_type.to_string(),
            })
        })
        .collect()
}
