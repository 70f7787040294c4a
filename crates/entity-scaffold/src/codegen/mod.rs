//! Source emission over the schema graph.
//!
//! Straightforward string assembly: one entity class and one configuration
//! class per table, plus the context file registering them. The graph is the
//! contract; everything here reads it without mutation.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::info;

use crate::analyzer::has_unique_index_matching;
use crate::config::GeneratorConfig;
use crate::core::naming::{pascal_case, pluralize, singularize};
use crate::core::relationship::{Relationship, RelationshipKind};
use crate::core::schema::{Column, ReferentialRule, Table};
use crate::error::{Result, ScaffoldError};

/// A rendered source file, before it is written to disk.
#[derive(Debug, Clone)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Emits entity classes, per-entity configurations and the context file.
pub struct Emitter<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> Emitter<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// Render every output file for the schema graph.
    pub fn render_all(
        &self,
        tables: &[Table],
        relationships: &[Relationship],
    ) -> Vec<EmittedFile> {
        let mut files = Vec::with_capacity(tables.len() * 2 + 1);

        for table in tables {
            let entity = self.entity_name(&table.name);
            files.push(EmittedFile {
                path: PathBuf::from("Entities").join(format!("{}.cs", entity)),
                contents: self.render_entity(table, relationships),
            });
            files.push(EmittedFile {
                path: PathBuf::from("Configurations").join(format!("{}Configuration.cs", entity)),
                contents: self.render_configuration(table),
            });
        }

        files.push(EmittedFile {
            path: PathBuf::from(format!("{}.cs", self.config.context_name)),
            contents: self.render_context(tables),
        });

        files
    }

    /// Render and write everything under the configured output directory.
    pub fn write_all(
        &self,
        tables: &[Table],
        relationships: &[Relationship],
    ) -> Result<Vec<PathBuf>> {
        let files = self.render_all(tables, relationships);
        let mut written = Vec::with_capacity(files.len());

        for file in files {
            let path = self.config.output.join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScaffoldError::CodeGeneration(format!(
                        "creating {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            std::fs::write(&path, &file.contents).map_err(|e| {
                ScaffoldError::CodeGeneration(format!("writing {}: {}", path.display(), e))
            })?;
            written.push(path);
        }

        info!("Wrote {} files to {}", written.len(), self.config.output.display());
        Ok(written)
    }

    /// Entity class name for a table. With pluralization enabled, plural
    /// table names produce singular entities.
    pub fn entity_name(&self, table_name: &str) -> String {
        let pascal = pascal_case(table_name);
        if self.config.pluralize {
            singularize(&pascal)
        } else {
            pascal
        }
    }

    /// Collection navigation name for an entity.
    fn collection_name(&self, entity: &str) -> String {
        if self.config.pluralize {
            pluralize(entity)
        } else {
            format!("{}List", entity)
        }
    }

    fn render_entity(&self, table: &Table, relationships: &[Relationship]) -> String {
        let entity = self.entity_name(&table.name);
        let mut out = String::new();

        writeln!(out, "using System;").unwrap();
        writeln!(out, "using System.Collections.Generic;").unwrap();
        if self.config.data_annotations {
            writeln!(out, "using System.ComponentModel.DataAnnotations;").unwrap();
        }
        writeln!(out).unwrap();
        writeln!(out, "namespace {}.Entities", self.config.namespace).unwrap();
        writeln!(out, "{{").unwrap();

        if let Some(comment) = &table.comment {
            writeln!(out, "    /// <summary>{}</summary>", xml_escape(comment)).unwrap();
        }
        writeln!(out, "    public class {}", entity).unwrap();
        writeln!(out, "    {{").unwrap();

        let single_pk = table.primary_key_columns().len() == 1;
        for column in &table.columns {
            self.render_property(&mut out, column, single_pk);
        }

        let navigations = self.navigation_properties(table, relationships);
        if !navigations.is_empty() {
            writeln!(out).unwrap();
            for nav in navigations {
                writeln!(out, "        {}", nav).unwrap();
            }
        }

        writeln!(out, "    }}").unwrap();
        writeln!(out, "}}").unwrap();
        out
    }

    fn render_property(&self, out: &mut String, column: &Column, single_pk: bool) {
        if let Some(comment) = &column.comment {
            writeln!(out, "        /// <summary>{}</summary>", xml_escape(comment)).unwrap();
        }
        if self.config.data_annotations {
            if column.is_primary_key && single_pk {
                writeln!(out, "        [Key]").unwrap();
            }
            if !column.is_nullable && column.data_type == "string" {
                writeln!(out, "        [Required]").unwrap();
            }
            if let Some(len) = column.max_length.filter(|l| *l > 0) {
                if column.data_type == "string" {
                    writeln!(out, "        [MaxLength({})]", len).unwrap();
                }
            }
        }
        writeln!(
            out,
            "        public {} {} {{ get; set; }}",
            csharp_type(column),
            pascal_case(&column.name)
        )
        .unwrap();
    }

    /// Navigation properties implied by the analyzed relationships.
    fn navigation_properties(&self, table: &Table, relationships: &[Relationship]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut props = Vec::new();

        let mut push = |name: String, declaration: String| {
            if seen.insert(name) {
                props.push(declaration);
            }
        };

        for rel in relationships {
            match rel.kind {
                RelationshipKind::OneToMany => {
                    if rel.source_table == table.name {
                        let entity = self.entity_name(&rel.target_table);
                        let name = self.collection_name(&entity);
                        push(
                            name.clone(),
                            format!(
                                "public ICollection<{entity}> {name} {{ get; set; }} = new List<{entity}>();"
                            ),
                        );
                    }
                    if rel.target_table == table.name {
                        let entity = self.entity_name(&rel.source_table);
                        push(
                            entity.clone(),
                            format!("public {entity}? {entity} {{ get; set; }}"),
                        );
                    }
                }
                RelationshipKind::OneToOne => {
                    if rel.source_table == table.name {
                        let entity = self.entity_name(&rel.target_table);
                        push(
                            entity.clone(),
                            format!("public {entity}? {entity} {{ get; set; }}"),
                        );
                    }
                    if rel.target_table == table.name {
                        let entity = self.entity_name(&rel.source_table);
                        push(
                            entity.clone(),
                            format!("public {entity}? {entity} {{ get; set; }}"),
                        );
                    }
                }
                RelationshipKind::ManyToMany => {
                    if rel.source_table == table.name {
                        let entity = self.entity_name(&rel.target_table);
                        let name = self.collection_name(&entity);
                        push(
                            name.clone(),
                            format!(
                                "public ICollection<{entity}> {name} {{ get; set; }} = new List<{entity}>();"
                            ),
                        );
                    }
                    if rel.target_table == table.name {
                        let entity = self.entity_name(&rel.source_table);
                        push(
                            entity.clone(),
                            format!("public {entity}? {entity} {{ get; set; }}"),
                        );
                    }
                }
                RelationshipKind::Unknown => {}
            }
        }

        props
    }

    fn render_configuration(&self, table: &Table) -> String {
        let entity = self.entity_name(&table.name);
        let mut out = String::new();

        writeln!(out, "using Microsoft.EntityFrameworkCore;").unwrap();
        writeln!(out, "using Microsoft.EntityFrameworkCore.Metadata.Builders;").unwrap();
        writeln!(out, "using {}.Entities;", self.config.namespace).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "namespace {}.Configurations", self.config.namespace).unwrap();
        writeln!(out, "{{").unwrap();
        writeln!(
            out,
            "    public class {entity}Configuration : IEntityTypeConfiguration<{entity}>"
        )
        .unwrap();
        writeln!(out, "    {{").unwrap();
        writeln!(
            out,
            "        public void Configure(EntityTypeBuilder<{entity}> builder)"
        )
        .unwrap();
        writeln!(out, "        {{").unwrap();
        writeln!(
            out,
            "            builder.ToTable(\"{}\", \"{}\");",
            table.name, table.schema
        )
        .unwrap();

        let pk: Vec<String> = table
            .primary_key_columns()
            .iter()
            .map(|c| pascal_case(&c.name))
            .collect();
        match pk.as_slice() {
            [] => writeln!(out, "            builder.HasNoKey();").unwrap(),
            [single] => writeln!(out, "            builder.HasKey(e => e.{});", single).unwrap(),
            many => writeln!(
                out,
                "            builder.HasKey(e => new {{ {} }});",
                many.iter()
                    .map(|c| format!("e.{}", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
            .unwrap(),
        }

        for column in &table.columns {
            let clauses = property_clauses(column);
            if !clauses.is_empty() {
                writeln!(
                    out,
                    "            builder.Property(e => e.{}){};",
                    pascal_case(&column.name),
                    clauses
                )
                .unwrap();
            }
        }

        for index in table.indexes.iter().filter(|i| !i.is_primary_key && i.is_unique) {
            let cols: Vec<String> = index
                .key_columns()
                .iter()
                .map(|c| format!("e.{}", pascal_case(c)))
                .collect();
            let selector = if cols.len() == 1 {
                cols[0].clone()
            } else {
                format!("new {{ {} }}", cols.join(", "))
            };
            writeln!(
                out,
                "            builder.HasIndex(e => {}).IsUnique().HasDatabaseName(\"{}\");",
                selector, index.name
            )
            .unwrap();
        }

        for fk in &table.foreign_keys {
            self.render_foreign_key(&mut out, table, fk, &entity);
        }

        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out, "}}").unwrap();
        out
    }

    fn render_foreign_key(
        &self,
        out: &mut String,
        table: &Table,
        fk: &crate::core::schema::ForeignKey,
        entity: &str,
    ) {
        let principal = self.entity_name(&fk.primary_table);
        let fk_props: Vec<String> = fk
            .column_pairs
            .iter()
            .map(|p| format!("e.{}", pascal_case(&p.fk_column)))
            .collect();
        let fk_selector = if fk_props.len() == 1 {
            fk_props[0].clone()
        } else {
            format!("new {{ {} }}", fk_props.join(", "))
        };

        // With unique-constraint detection off, the inverse is always a
        // collection; the detection knob routes single-column unique FKs
        // through a one-to-one mapping instead.
        let inverse = if self.config.detect_unique_constraints
            && has_unique_index_matching(table, fk)
        {
            format!(".WithOne(p => p.{})", entity)
        } else {
            format!(".WithMany(p => p.{})", self.collection_name(entity))
        };

        writeln!(out, "            builder.HasOne(e => e.{})", principal).unwrap();
        writeln!(out, "                {}", inverse).unwrap();
        writeln!(out, "                .HasForeignKey(e => {})", fk_selector).unwrap();
        writeln!(
            out,
            "                .OnDelete(DeleteBehavior.{})",
            delete_behavior(fk.delete_rule)
        )
        .unwrap();
        writeln!(out, "                .HasConstraintName(\"{}\");", fk.name).unwrap();
    }

    fn render_context(&self, tables: &[Table]) -> String {
        let context = &self.config.context_name;
        let mut out = String::new();

        writeln!(out, "using Microsoft.EntityFrameworkCore;").unwrap();
        writeln!(out, "using {}.Configurations;", self.config.namespace).unwrap();
        writeln!(out, "using {}.Entities;", self.config.namespace).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "namespace {}", self.config.namespace).unwrap();
        writeln!(out, "{{").unwrap();
        writeln!(out, "    public partial class {} : DbContext", context).unwrap();
        writeln!(out, "    {{").unwrap();
        writeln!(
            out,
            "        public {context}(DbContextOptions<{context}> options) : base(options)"
        )
        .unwrap();
        writeln!(out, "        {{").unwrap();
        writeln!(out, "        }}").unwrap();
        writeln!(out).unwrap();

        for table in tables {
            let entity = self.entity_name(&table.name);
            let set = self.collection_name(&entity);
            writeln!(
                out,
                "        public DbSet<{entity}> {set} {{ get; set; }}"
            )
            .unwrap();
        }

        writeln!(out).unwrap();
        writeln!(
            out,
            "        protected override void OnModelCreating(ModelBuilder modelBuilder)"
        )
        .unwrap();
        writeln!(out, "        {{").unwrap();
        for table in tables {
            let entity = self.entity_name(&table.name);
            writeln!(
                out,
                "            modelBuilder.ApplyConfiguration(new {}Configuration());",
                entity
            )
            .unwrap();
        }
        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out, "}}").unwrap();
        out
    }
}

/// C# property type for a column's canonical token.
fn csharp_type(column: &Column) -> String {
    let base = match column.data_type.as_str() {
        "string" => "string",
        "bool" => "bool",
        "byte" => "byte",
        "short" => "short",
        "int" => "int",
        "long" => "long",
        "float" => "float",
        "double" => "double",
        "decimal" => "decimal",
        "DateTime" => "DateTime",
        "DateTimeOffset" => "DateTimeOffset",
        "TimeSpan" => "TimeSpan",
        "Guid" => "Guid",
        "byte[]" => "byte[]",
        _ => "object",
    };
    if column.is_nullable {
        format!("{}?", base)
    } else {
        base.to_string()
    }
}

/// Fluent clauses for a column beyond its CLR type.
fn property_clauses(column: &Column) -> String {
    let mut clauses = String::new();
    if let Some(len) = column.max_length.filter(|l| *l > 0) {
        if column.data_type == "string" {
            write!(clauses, ".HasMaxLength({})", len).unwrap();
        }
    }
    if let (Some(precision), Some(scale)) = (column.precision, column.scale) {
        write!(clauses, ".HasPrecision({}, {})", precision, scale).unwrap();
    }
    if column.is_identity {
        clauses.push_str(".ValueGeneratedOnAdd()");
    }
    if column.is_row_version {
        clauses.push_str(".IsRowVersion()");
    }
    if let Some(default) = &column.default_value {
        write!(clauses, ".HasDefaultValueSql(\"{}\")", default.replace('"', "\\\"")).unwrap();
    }
    if column.is_computed {
        if let Some(expr) = &column.computed_expression {
            write!(
                clauses,
                ".HasComputedColumnSql(\"{}\")",
                expr.replace('"', "\\\"")
            )
            .unwrap();
        }
    }
    clauses
}

fn delete_behavior(rule: ReferentialRule) -> &'static str {
    match rule {
        ReferentialRule::Cascade => "Cascade",
        ReferentialRule::Restrict => "Restrict",
        ReferentialRule::SetNull => "SetNull",
        ReferentialRule::SetDefault | ReferentialRule::NoAction => "NoAction",
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppSettings, GeneratorConfig, Overrides};
    use crate::core::relationship::ForeignKeyInfo;
    use crate::core::schema::{ColumnPair, ForeignKey, Index, IndexColumn};

    fn config() -> GeneratorConfig {
        let settings = AppSettings::from_json(
            r#"{ "CodeGenerator": { "connection": "x", "namespace": "Sample.Data" } }"#,
        )
        .unwrap();
        GeneratorConfig::resolve(&settings.code_generator, Overrides::default()).unwrap()
    }

    fn orders_table() -> Table {
        let mut table = Table::new("dbo", "Orders");
        let mut id = Column::new("Id", "int", 1);
        id.is_primary_key = true;
        id.is_identity = true;
        table.columns.push(id);

        let mut name = Column::new("CustomerName", "string", 2);
        name.vendor_type = "nvarchar".to_string();
        name.max_length = Some(80);
        table.columns.push(name);

        let mut total = Column::new("Total", "decimal", 3);
        total.vendor_type = "decimal".to_string();
        total.precision = Some(18);
        total.scale = Some(2);
        total.is_nullable = true;
        table.columns.push(total);

        table.indexes.push(
            Index::new(
                "PK_Orders",
                true,
                true,
                false,
                "CLUSTERED",
                vec![IndexColumn {
                    column_name: "Id".to_string(),
                    key_ordinal: 1,
                    is_descending: false,
                    is_included: false,
                }],
            )
            .unwrap(),
        );
        table
    }

    #[test]
    fn test_entity_name_singularized_when_pluralize_on() {
        let config = config();
        let emitter = Emitter::new(&config);
        assert_eq!(emitter.entity_name("Orders"), "Order");
        assert_eq!(emitter.entity_name("order_details"), "OrderDetail");
        assert_eq!(emitter.entity_name("Status"), "Status");
    }

    #[test]
    fn test_render_entity_properties_and_annotations() {
        let config = config();
        let emitter = Emitter::new(&config);
        let rendered = emitter.render_entity(&orders_table(), &[]);

        assert!(rendered.contains("namespace Sample.Data.Entities"));
        assert!(rendered.contains("public class Order"));
        assert!(rendered.contains("[Key]"));
        assert!(rendered.contains("public int Id { get; set; }"));
        assert!(rendered.contains("[Required]"));
        assert!(rendered.contains("[MaxLength(80)]"));
        assert!(rendered.contains("public string CustomerName { get; set; }"));
        assert!(rendered.contains("public decimal? Total { get; set; }"));
    }

    #[test]
    fn test_render_entity_navigation_from_relationships() {
        let config = config();
        let emitter = Emitter::new(&config);
        let relationships = vec![Relationship {
            kind: RelationshipKind::OneToMany,
            source_table: "Orders".to_string(),
            target_table: "OrderDetails".to_string(),
            foreign_keys: vec![ForeignKeyInfo {
                foreign_key_column: "OrderId".to_string(),
                primary_key_column: "Id".to_string(),
                delete_rule: ReferentialRule::Cascade,
                update_rule: ReferentialRule::NoAction,
            }],
            junction: None,
        }];

        let rendered = emitter.render_entity(&orders_table(), &relationships);
        assert!(rendered.contains(
            "public ICollection<OrderDetail> OrderDetails { get; set; } = new List<OrderDetail>();"
        ));
    }

    #[test]
    fn test_render_configuration_key_and_fk() {
        let config = config();
        let emitter = Emitter::new(&config);

        let mut table = orders_table();
        table.foreign_keys.push(
            ForeignKey::new(
                "FK_Orders_Customers",
                "Customers",
                vec![ColumnPair {
                    fk_column: "CustomerName".to_string(),
                    pk_column: "Name".to_string(),
                }],
                ReferentialRule::SetNull,
                ReferentialRule::NoAction,
                true,
            )
            .unwrap(),
        );

        let rendered = emitter.render_configuration(&table);
        assert!(rendered.contains("builder.ToTable(\"Orders\", \"dbo\");"));
        assert!(rendered.contains("builder.HasKey(e => e.Id);"));
        assert!(rendered.contains(".HasMaxLength(80)"));
        assert!(rendered.contains(".HasPrecision(18, 2)"));
        assert!(rendered.contains(".ValueGeneratedOnAdd()"));
        assert!(rendered.contains("builder.HasOne(e => e.Customer)"));
        assert!(rendered.contains(".WithMany(p => p.Orders)"));
        assert!(rendered.contains(".OnDelete(DeleteBehavior.SetNull)"));
        assert!(rendered.contains(".HasConstraintName(\"FK_Orders_Customers\");"));
    }

    #[test]
    fn test_unique_constraint_knob_defaults_to_collection_inverse() {
        let mut cfg = config();

        let mut table = orders_table();
        table.indexes.push(
            Index::new(
                "UX_Orders_CustomerName",
                true,
                false,
                false,
                "NONCLUSTERED",
                vec![IndexColumn {
                    column_name: "CustomerName".to_string(),
                    key_ordinal: 1,
                    is_descending: false,
                    is_included: false,
                }],
            )
            .unwrap(),
        );
        table.foreign_keys.push(
            ForeignKey::new(
                "FK_Orders_Customers",
                "Customers",
                vec![ColumnPair {
                    fk_column: "CustomerName".to_string(),
                    pk_column: "Name".to_string(),
                }],
                ReferentialRule::NoAction,
                ReferentialRule::NoAction,
                true,
            )
            .unwrap(),
        );

        // Stub behavior: never a unique constraint.
        let rendered = Emitter::new(&cfg).render_configuration(&table);
        assert!(rendered.contains(".WithMany("));

        cfg.detect_unique_constraints = true;
        let rendered = Emitter::new(&cfg).render_configuration(&table);
        assert!(rendered.contains(".WithOne(p => p.Order)"));
    }

    #[test]
    fn test_render_context_registers_everything() {
        let config = config();
        let emitter = Emitter::new(&config);
        let tables = vec![orders_table(), Table::new("dbo", "Customers")];

        let rendered = emitter.render_context(&tables);
        assert!(rendered.contains("public partial class AppDbContext : DbContext"));
        assert!(rendered.contains("public DbSet<Order> Orders { get; set; }"));
        assert!(rendered.contains("public DbSet<Customer> Customers { get; set; }"));
        assert!(rendered.contains("modelBuilder.ApplyConfiguration(new OrderConfiguration());"));
    }

    #[test]
    fn test_render_all_layout() {
        let config = config();
        let emitter = Emitter::new(&config);
        let files = emitter.render_all(&[orders_table()], &[]);

        let paths: Vec<String> = files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            paths,
            ["Entities/Order.cs", "Configurations/OrderConfiguration.cs", "AppDbContext.cs"]
        );
    }

    #[test]
    fn test_write_all_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.output = dir.path().join("Generated");

        let written = Emitter::new(&cfg).write_all(&[orders_table()], &[]).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("Generated/Entities/Order.cs").exists());
        assert!(dir
            .path()
            .join("Generated/Configurations/OrderConfiguration.cs")
            .exists());
        assert!(dir.path().join("Generated/AppDbContext.cs").exists());
    }

    #[test]
    fn test_composite_key_configuration() {
        let config = config();
        let mut table = Table::new("dbo", "OrderDetails");
        for (i, name) in ["OrderId", "ProductId"].iter().enumerate() {
            let mut col = Column::new(*name, "int", i as i32 + 1);
            col.is_primary_key = true;
            table.columns.push(col);
        }

        let rendered = Emitter::new(&config).render_configuration(&table);
        assert!(rendered.contains("builder.HasKey(e => new { e.OrderId, e.ProductId });"));
    }
}
