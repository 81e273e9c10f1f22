//! Tera rendering engine: [`Renderer`] over embedded DDL templates.
//!
//! | Template              | Output                                          |
//! |-----------------------|-------------------------------------------------|
//! | `object.sql`          | procedure / view / function / trigger script    |
//! | `permissions.sql`     | `GRANT` / `DENY` lines for one object           |
//! | `schema.sql`          | guarded `CREATE SCHEMA`                         |
//! | `table.sql`           | table with keys, foreign keys and indexes       |
//! | `type.sql`            | alias type or table type                        |
//! | `data.sql`            | `INSERT` script for one table's rows            |
//! | `job.sql`             | SQL Agent job with steps and schedules          |
//! | `audit_header.sql`    | bundle header for a version upgrade             |
//!
//! Rendering is pure: the same rows and setting always produce the same text.

use std::collections::HashMap;

use tera::{Context, Tera, Value};

use ssc_core::{
    CatalogSnapshot, Idempotency, ObjectType, Setting, SqlColumn, SqlDataResult, SqlJob,
    SqlJobSchedule, SqlJobStep, SqlObject, SqlPermission, SqlTable, SqlType,
};

use crate::context::{
    AuditCtx, DataCtx, GrantCtx, JobCtx, ObjectCtx, PermissionsCtx, SchemaCtx, TableCtx, TypeCtx,
};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_object_id.tera", include_str!("templates/_partials/object_id.tera")),
    ("object.sql", include_str!("templates/object.sql.tera")),
    ("permissions.sql", include_str!("templates/permissions.sql.tera")),
    ("schema.sql", include_str!("templates/schema.sql.tera")),
    ("audit_header.sql", include_str!("templates/audit_header.sql.tera")),
    ("table.sql", include_str!("templates/table.sql.tera")),
    ("type.sql", include_str!("templates/type.sql.tera")),
    ("data.sql", include_str!("templates/data.sql.tera")),
    ("job.sql", include_str!("templates/job.sql.tera")),
];

/// Double single quotes so a value can sit inside a T-SQL string literal.
fn sql_quote(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("sql_quote", "value", String, value);
    Ok(Value::String(s.replace('\'', "''")))
}

fn build_tera() -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.register_filter("sql_quote", sql_quote);
    tera.add_raw_templates(TPLS.iter().map(|(name, body)| (*name, *body)))?;
    Ok(tera)
}

/// Idempotency guard configured for an object type.
fn guard_for(setting: &Setting, object_type: ObjectType) -> Idempotency {
    let guards = &setting.idempotency;
    match object_type {
        ObjectType::Procedure => guards.procs,
        ObjectType::View => guards.views,
        ObjectType::TableFunction | ObjectType::InlineFunction | ObjectType::ScalarFunction => {
            guards.functions
        }
        ObjectType::Trigger => guards.triggers,
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera-based DDL generator.
///
/// Uses embedded templates only. Create once with [`Renderer::new`] and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera()? })
    }

    /// Render the definition script for one object, guarded per the setting.
    pub fn render(&self, object: &SqlObject, setting: &Setting) -> Result<String, RenderError> {
        let object_type = supported_type(object)?;
        let ctx = ObjectCtx::new(object, object_type, guard_for(setting, object_type));
        self.render_template("object.sql", &ctx)
    }

    /// Render grant statements for `object`, ignoring rows for other objects.
    ///
    /// Returns an empty string when nothing is granted.
    pub fn render_permissions(
        &self,
        rows: &[SqlPermission],
        object: &SqlObject,
    ) -> Result<String, RenderError> {
        let grants: Vec<GrantCtx> = rows
            .iter()
            .filter(|p| p.name == object.name && p.schema == object.schema)
            .map(GrantCtx::from)
            .collect();
        if grants.is_empty() {
            return Ok(String::new());
        }
        self.render_template("permissions.sql", &PermissionsCtx { grants })
    }

    /// Render the full artifact for an object.
    ///
    /// Procedures carry their grants after the definition; other types render
    /// the definition only.
    pub fn render_artifact(
        &self,
        object: &SqlObject,
        permissions: &[SqlPermission],
        setting: &Setting,
    ) -> Result<String, RenderError> {
        let mut content = self.render(object, setting)?;
        if object.object_type() == Some(ObjectType::Procedure) {
            let grants = self.render_permissions(permissions, object)?;
            if !grants.is_empty() {
                content.push_str("\n\n");
                content.push_str(&grants);
            }
        }
        Ok(content)
    }

    pub fn render_schema(&self, schema: &str) -> Result<String, RenderError> {
        self.render_template("schema.sql", &SchemaCtx { schema: schema.to_string() })
    }

    /// Render a table with its columns, primary key, foreign keys and
    /// indexes, taken from the snapshot rows sharing the table's object id.
    pub fn render_table(
        &self,
        table: &SqlTable,
        snapshot: &CatalogSnapshot,
        setting: &Setting,
    ) -> Result<String, RenderError> {
        let ctx = TableCtx::new(
            table,
            snapshot,
            setting.idempotency.tables,
            setting.include_constraint_name,
        );
        self.render_template("table.sql", &ctx)
    }

    /// Render an alias type, or a table type from its columns.
    pub fn render_type(
        &self,
        ty: &SqlType,
        columns: &[SqlColumn],
        setting: &Setting,
    ) -> Result<String, RenderError> {
        self.render_template("type.sql", &TypeCtx::new(ty, columns, setting.idempotency.types))
    }

    pub fn render_data(
        &self,
        data: &SqlDataResult,
        setting: &Setting,
    ) -> Result<String, RenderError> {
        self.render_template("data.sql", &DataCtx::new(data, setting.idempotency.data))
    }

    pub fn render_job(
        &self,
        job: &SqlJob,
        steps: &[SqlJobStep],
        schedules: &[SqlJobSchedule],
        setting: &Setting,
    ) -> Result<String, RenderError> {
        let ctx = JobCtx::new(job, steps, schedules, setting.idempotency.jobs);
        self.render_template("job.sql", &ctx)
    }

    /// Header placed at the top of a version bundle. Contains no timestamps.
    pub fn render_audit_header(
        &self,
        name: &str,
        version: &str,
        label: &str,
    ) -> Result<String, RenderError> {
        let ctx = AuditCtx {
            name: name.to_string(),
            version: version.to_string(),
            label: label.to_string(),
        };
        self.render_template("audit_header.sql", &ctx)
    }

    fn render_template<T: serde::Serialize>(
        &self,
        name: &str,
        ctx: &T,
    ) -> Result<String, RenderError> {
        let ctx = Context::from_serialize(ctx)?;
        Ok(self.tera.render(name, &ctx)?)
    }
}

fn supported_type(object: &SqlObject) -> Result<ObjectType, RenderError> {
    object.object_type().ok_or_else(|| RenderError::UnsupportedType {
        name: object.name.clone(),
        type_code: object.type_code.trim().to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
