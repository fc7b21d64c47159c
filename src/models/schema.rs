//! Table schemas and their registration.
//!
//! A record type is declared once with a `SchemaBuilder`. Registration
//! partitions the declared fields into exactly one primary key and the
//! ordinary fields, then precomputes the select/insert/update/delete
//! statements used by every record of that type. The resulting
//! `TableSchema` is immutable.

use crate::error::SchemaError;
use crate::models::Field;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `n` comma-separated placeholders.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Declares a record type's fields before registration.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    table_name: Option<String>,
    declared: Vec<(String, Field)>,
}

impl SchemaBuilder {
    fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table_name: None,
            declared: Vec::new(),
        }
    }

    /// Override the table name (defaults to the type name).
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Declare a field under an attribute name. Declaration order is kept.
    pub fn field(mut self, attr: impl Into<String>, field: Field) -> Self {
        self.declared.push((attr.into(), field));
        self
    }

    /// Validate the declared fields and build the schema.
    pub fn register(self) -> Result<TableSchema, SchemaError> {
        let table_name = self
            .table_name
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.type_name.clone());

        let mut mappings = HashMap::with_capacity(self.declared.len());
        let mut fields = Vec::new();
        let mut primary_key: Option<String> = None;

        for (attr, field) in self.declared {
            info!("  found mapping: {} ==> {}", attr, field);
            if mappings.contains_key(&attr) {
                return Err(SchemaError::DuplicateField { field: attr });
            }
            if field.is_primary_key() {
                if primary_key.is_some() {
                    return Err(SchemaError::DuplicateKey { field: attr });
                }
                primary_key = Some(attr.clone());
            } else {
                fields.push(attr.clone());
            }
            mappings.insert(attr, field);
        }

        let primary_key = primary_key.ok_or_else(|| SchemaError::MissingKey {
            type_name: self.type_name.clone(),
        })?;

        info!(
            "found model: {} (table: {})",
            self.type_name, table_name
        );

        let templates = Templates::build(&table_name, &primary_key, &fields, &mappings);

        Ok(TableSchema {
            type_name: self.type_name,
            table_name,
            primary_key,
            fields,
            mappings,
            templates,
        })
    }

    /// Register and wrap the schema for sharing between records.
    pub fn register_shared(self) -> Result<Arc<TableSchema>, SchemaError> {
        self.register().map(Arc::new)
    }
}

/// Precomputed statements for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Templates {
    select: String,
    insert: String,
    update: String,
    delete: String,
}

impl Templates {
    fn build(
        table: &str,
        primary_key: &str,
        fields: &[String],
        mappings: &HashMap<String, Field>,
    ) -> Self {
        let column = |attr: &str| {
            mappings
                .get(attr)
                .map(|f| f.column_name(attr).to_string())
                .unwrap_or_else(|| attr.to_string())
        };
        // Select items are aliased back to the attribute name when the column differs,
        // so fetched rows are always keyed by attribute.
        let select_item = |attr: &str| {
            let col = column(attr);
            if col == attr {
                quote_ident(attr)
            } else {
                format!("{} {}", quote_ident(&col), quote_ident(attr))
            }
        };

        let table_q = quote_ident(table);
        let pk_q = quote_ident(&column(primary_key));

        let select_items: Vec<String> = std::iter::once(primary_key)
            .chain(fields.iter().map(String::as_str))
            .map(select_item)
            .collect();
        let insert_columns: Vec<String> = fields
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(primary_key))
            .map(|attr| quote_ident(&column(attr)))
            .collect();
        let assignments: Vec<String> = fields
            .iter()
            .map(|attr| format!("{}=?", quote_ident(&column(attr))))
            .collect();

        Self {
            select: format!("select {} from {}", select_items.join(", "), table_q),
            insert: format!(
                "insert into {} ({}) values ({})",
                table_q,
                insert_columns.join(", "),
                placeholders(insert_columns.len())
            ),
            update: format!(
                "update {} set {} where {}=?",
                table_q,
                assignments.join(", "),
                pk_q
            ),
            delete: format!("delete from {} where {}=?", table_q, pk_q),
        }
    }
}

/// Immutable per-type metadata: table, key, field order and SQL templates.
#[derive(Debug, Clone)]
pub struct TableSchema {
    type_name: String,
    table_name: String,
    primary_key: String,
    fields: Vec<String>,
    mappings: HashMap<String, Field>,
    templates: Templates,
}

impl TableSchema {
    /// Start declaring a record type.
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Attribute name of the primary key.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-key attribute names in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Descriptor for an attribute (primary key included).
    pub fn mapping(&self, attr: &str) -> Option<&Field> {
        self.mappings.get(attr)
    }

    pub fn mappings(&self) -> &HashMap<String, Field> {
        &self.mappings
    }

    /// Column name holding the primary key.
    pub fn primary_key_column(&self) -> &str {
        self.mappings
            .get(&self.primary_key)
            .map(|f| f.column_name(&self.primary_key))
            .unwrap_or(&self.primary_key)
    }

    pub fn select_sql(&self) -> &str {
        &self.templates.select
    }

    pub fn insert_sql(&self) -> &str {
        &self.templates.insert
    }

    pub fn update_sql(&self) -> &str {
        &self.templates.update
    }

    pub fn delete_sql(&self) -> &str {
        &self.templates.delete
    }

    /// Select by primary key.
    pub fn find_sql(&self) -> String {
        format!(
            "{} where {}=?",
            self.templates.select,
            quote_ident(self.primary_key_column())
        )
    }

    /// `create table if not exists` statement for this schema.
    pub fn create_table_sql(&self) -> String {
        let mut columns: Vec<String> = std::iter::once(&self.primary_key)
            .chain(self.fields.iter())
            .filter_map(|attr| {
                self.mappings.get(attr).map(|f| {
                    let not_null = if f.is_primary_key() { " not null" } else { "" };
                    format!(
                        "{} {}{}",
                        quote_ident(f.column_name(attr)),
                        f.sql_type(),
                        not_null
                    )
                })
            })
            .collect();
        columns.push(format!(
            "primary key ({})",
            quote_ident(self.primary_key_column())
        ));
        format!(
            "create table if not exists {} ({})",
            quote_ident(&self.table_name),
            columns.join(", ")
        )
    }
}
