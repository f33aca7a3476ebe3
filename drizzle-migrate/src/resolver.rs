//! Rename resolution.
//!
//! The differ only sees keys: a table renamed from `users` to `people` looks
//! like one deleted and one added table. Resolvers decide which of those pairs
//! are renames (or schema moves). Interactive prompts live outside this crate;
//! they plug in through [`RenameResolver`].

use async_trait::async_trait;

use drizzle_schema::{Column, Enum, Policy, Role, Sequence, Table, View};

use crate::error::MigrateResult;

/// Something a resolver can match by name.
pub trait ResolverItem: Clone + Send + Sync + 'static {
    /// Entity name.
    fn name(&self) -> &str;

    /// Owning schema, empty when the entity has none.
    fn schema(&self) -> &str {
        ""
    }
}

impl ResolverItem for String {
    fn name(&self) -> &str {
        self
    }
}

impl ResolverItem for Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }
}

impl ResolverItem for Column {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ResolverItem for View {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }
}

impl ResolverItem for Enum {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }
}

impl ResolverItem for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }
}

impl ResolverItem for Role {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ResolverItem for Policy {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Added and deleted candidates of one entity class.
#[derive(Debug, Clone)]
pub struct ResolverInput<T> {
    /// Owning table for table-scoped entities (columns, policies).
    pub table_name: String,
    /// Schema of the owning table.
    pub schema: String,
    /// Entities only in the new snapshot.
    pub created: Vec<T>,
    /// Entities only in the old snapshot.
    pub deleted: Vec<T>,
}

impl<T> ResolverInput<T> {
    /// Input for a top-level entity class.
    pub fn new(created: Vec<T>, deleted: Vec<T>) -> Self {
        Self {
            table_name: String::new(),
            schema: String::new(),
            created,
            deleted,
        }
    }

    /// Input scoped to one table.
    pub fn for_table(
        table_name: impl Into<String>,
        schema: impl Into<String>,
        created: Vec<T>,
        deleted: Vec<T>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            schema: schema.into(),
            created,
            deleted,
        }
    }
}

/// A resolved rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed<T> {
    /// Entity as it was.
    pub from: T,
    /// Entity as it is now.
    pub to: T,
}

/// An entity that changed schema but kept its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved {
    /// Entity name.
    pub name: String,
    /// Previous schema.
    pub schema_from: String,
    /// New schema.
    pub schema_to: String,
}

/// Partition returned by a resolver. Every input item is expected to appear
/// exactly once across `created`, `deleted`, `renamed` and `moved`.
#[derive(Debug, Clone)]
pub struct ResolverOutput<T> {
    /// True creations.
    pub created: Vec<T>,
    /// True deletions.
    pub deleted: Vec<T>,
    /// Renames. `from` keeps its original schema even when it also moved.
    pub renamed: Vec<Renamed<T>>,
    /// Schema moves.
    pub moved: Vec<Moved>,
}

impl<T> ResolverOutput<T> {
    /// Output that treats every candidate as a real create or drop.
    pub fn unchanged(input: ResolverInput<T>) -> Self {
        Self {
            created: input.created,
            deleted: input.deleted,
            renamed: Vec::new(),
            moved: Vec::new(),
        }
    }
}

/// Decides which add/drop pairs are renames.
#[async_trait]
pub trait RenameResolver<T: ResolverItem>: Send + Sync {
    /// Partition the candidates.
    async fn resolve(&self, input: ResolverInput<T>) -> MigrateResult<ResolverOutput<T>>;
}

/// Resolver that never detects renames.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenames;

#[async_trait]
impl<T: ResolverItem> RenameResolver<T> for NoRenames {
    async fn resolve(&self, input: ResolverInput<T>) -> MigrateResult<ResolverOutput<T>> {
        Ok(ResolverOutput::unchanged(input))
    }
}

/// Resolver driven by a fixed list of `from->to` pairs.
///
/// Names are qualified with their schema and, for columns and policies, their
/// table: `auth.users->auth.people`, `users.name->users.full_name`. The
/// default `public` schema may be omitted.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    pairs: Vec<(String, String)>,
}

impl StaticResolver {
    /// Build from `from->to` strings. Entries without `->` are ignored.
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = pairs
            .into_iter()
            .filter_map(|pair| {
                let (from, to) = pair.as_ref().split_once("->")?;
                Some((
                    normalize(from.trim()).to_string(),
                    normalize(to.trim()).to_string(),
                ))
            })
            .collect();
        Self { pairs }
    }

    fn target_of(&self, from: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| f == from)
            .map(|(_, t)| t.as_str())
    }
}

fn normalize(qualified: &str) -> &str {
    qualified.strip_prefix("public.").unwrap_or(qualified)
}

fn qualify<T: ResolverItem>(item: &T, table_name: &str, table_schema: &str) -> String {
    let parts = [table_schema, table_name, item.schema(), item.name()];
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".");
    normalize(&joined).to_string()
}

#[async_trait]
impl<T: ResolverItem> RenameResolver<T> for StaticResolver {
    async fn resolve(&self, input: ResolverInput<T>) -> MigrateResult<ResolverOutput<T>> {
        let ResolverInput {
            table_name,
            schema,
            mut created,
            deleted,
        } = input;

        let mut output = ResolverOutput {
            created: Vec::new(),
            deleted: Vec::new(),
            renamed: Vec::new(),
            moved: Vec::new(),
        };

        for from in deleted {
            let from_name = qualify(&from, &table_name, &schema);
            let target = self.target_of(&from_name).and_then(|target| {
                created
                    .iter()
                    .position(|c| qualify(c, &table_name, &schema) == target)
            });

            let Some(idx) = target else {
                output.deleted.push(from);
                continue;
            };

            let to = created.remove(idx);
            if from.schema() != to.schema() {
                output.moved.push(Moved {
                    name: from.name().to_string(),
                    schema_from: from.schema().to_string(),
                    schema_to: to.schema().to_string(),
                });
            }
            if from.name() != to.name() {
                tracing::debug!(from = %from_name, to = %to.name(), "Resolved rename");
                output.renamed.push(Renamed { from, to });
            }
        }

        output.created = created;
        Ok(output)
    }
}

/// One resolver per entity class, handed to the orchestrators.
#[derive(Clone, Copy)]
pub struct Resolvers<'a> {
    /// Postgres schemas.
    pub schemas: &'a dyn RenameResolver<String>,
    /// Postgres enums.
    pub enums: &'a dyn RenameResolver<Enum>,
    /// Postgres sequences.
    pub sequences: &'a dyn RenameResolver<Sequence>,
    /// Postgres roles.
    pub roles: &'a dyn RenameResolver<Role>,
    /// Tables.
    pub tables: &'a dyn RenameResolver<Table>,
    /// Columns, one call per table.
    pub columns: &'a dyn RenameResolver<Column>,
    /// Views.
    pub views: &'a dyn RenameResolver<View>,
    /// Table-bound policies, one call per table.
    pub policies: &'a dyn RenameResolver<Policy>,
    /// Policies declared outside of tables.
    pub ind_policies: &'a dyn RenameResolver<Policy>,
}

impl<'a> Resolvers<'a> {
    /// Use the same resolver for every entity class.
    pub fn uniform<R>(resolver: &'a R) -> Self
    where
        R: RenameResolver<String>
            + RenameResolver<Enum>
            + RenameResolver<Sequence>
            + RenameResolver<Role>
            + RenameResolver<Table>
            + RenameResolver<Column>
            + RenameResolver<View>
            + RenameResolver<Policy>,
    {
        Self {
            schemas: resolver,
            enums: resolver,
            sequences: resolver,
            roles: resolver,
            tables: resolver,
            columns: resolver,
            views: resolver,
            policies: resolver,
            ind_policies: resolver,
        }
    }
}

impl std::fmt::Debug for Resolvers<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers").finish_non_exhaustive()
    }
}
