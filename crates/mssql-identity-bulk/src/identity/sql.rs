//! Batches sent during an identity-preserving write.
//!
//! All of them run as plain batches on the caller's session. Staging tables
//! are `#` temp tables, so they must not be created through `sp_executesql`.

use super::plan::{WritePlan, ORDINAL_COLUMN};
use crate::config::{BulkCopyOptions, RowCorrelation};
use crate::core::identifier::{sql_literal, TempTable};

fn ordinal() -> String {
    format!("[{}]", ORDINAL_COLUMN)
}

fn table_hint(plan: &WritePlan) -> &'static str {
    if plan.options.contains(BulkCopyOptions::TABLE_LOCK) {
        " WITH (TABLOCK)"
    } else {
        ""
    }
}

/// Drops both staging tables if they exist. Safe to run at any point.
pub fn drop_staging_sql(holding: &TempTable, retrieval: &TempTable) -> String {
    format!("{}\n{}", holding.drop_if_exists(), retrieval.drop_if_exists())
}

pub fn cleanup_sql(plan: &WritePlan) -> String {
    drop_staging_sql(&plan.holding, &plan.retrieval)
}

/// Create the holding and retrieval tables.
///
/// The holding table copies the destination's definition for the inserted
/// columns only, since the bulk load addresses every holding column by
/// position, and gains an ordinal column. The retrieval column takes the
/// identity column's declared type from the catalog.
pub fn create_staging_sql(plan: &WritePlan) -> String {
    let destination = plan.destination.quoted();
    let holding = plan.holding.quoted();
    let retrieval = plan.retrieval.quoted();
    let identity = &plan.identity_quoted;
    let catalog = &plan.catalog_prefix;

    let retrieval_columns = match plan.correlation {
        RowCorrelation::SourceOrdinal => {
            format!("{} INT NOT NULL, {} BIGINT NULL", ordinal(), identity)
        }
        RowCorrelation::IdentityOrder => format!("{} BIGINT NULL", identity),
    };
    let alter_prefix = sql_literal(&format!(
        "ALTER TABLE {} ALTER COLUMN {} ",
        retrieval, identity
    ));
    let not_found = sql_literal(&format!(
        "Identity column {} not found on {}",
        identity, destination
    ));

    format!(
        "{cleanup}
DECLARE @identity_type NVARCHAR(300);
SELECT @identity_type = CASE
        WHEN t.name IN (N'decimal', N'numeric')
            THEN t.name + N'(' + CAST(c.precision AS NVARCHAR(10)) + N', 0)'
        ELSE t.name
    END
FROM {catalog}sys.columns c
JOIN {catalog}sys.types t ON t.user_type_id = c.system_type_id
WHERE c.object_id = OBJECT_ID({destination_literal}) AND c.name = {identity_literal};
IF @identity_type IS NULL
    THROW 50000, {not_found}, 1;
SELECT {columns} INTO {holding} FROM {destination} WHERE 1 = 0;
ALTER TABLE {holding} ADD {ordinal} INT NOT NULL;
CREATE TABLE {retrieval} ({retrieval_columns});
EXEC ({alter_prefix} + @identity_type + N' NULL');",
        cleanup = cleanup_sql(plan),
        destination_literal = sql_literal(&destination),
        identity_literal = sql_literal(&plan.identity_column),
        columns = plan.column_list(),
        ordinal = ordinal(),
    )
}

/// Move holding rows into the destination, return the captured identities
/// and drop both staging tables.
///
/// For [`RowCorrelation::SourceOrdinal`] the result rows are
/// `(ordinal, identity)` ordered by ordinal; for
/// [`RowCorrelation::IdentityOrder`] they are single identities in
/// ascending order.
pub fn capture_sql(plan: &WritePlan) -> String {
    let destination = plan.destination.quoted();
    let holding = plan.holding.quoted();
    let retrieval = plan.retrieval.quoted();
    let identity = &plan.identity_quoted;
    let columns = plan.column_list();
    let hint = table_hint(plan);

    let (transfer, select) = match plan.correlation {
        RowCorrelation::SourceOrdinal => {
            let sources = plan
                .columns
                .iter()
                .map(|c| format!("src.{}", c.quoted))
                .collect::<Vec<_>>()
                .join(", ");
            (
                format!(
                    "MERGE INTO {destination}{hint} AS dst
USING {holding} AS src
ON 1 = 0
WHEN NOT MATCHED THEN
    INSERT ({columns}) VALUES ({sources})
OUTPUT src.{ordinal}, INSERTED.{identity} INTO {retrieval} ({ordinal}, {identity});",
                    ordinal = ordinal(),
                ),
                format!(
                    "SELECT {ordinal}, {identity} FROM {retrieval} ORDER BY {ordinal};",
                    ordinal = ordinal(),
                ),
            )
        }
        RowCorrelation::IdentityOrder => (
            format!(
                "INSERT INTO {destination}{hint} ({columns}) OUTPUT INSERTED.{identity} INTO {retrieval} SELECT {columns} FROM {holding} ORDER BY {ordinal};",
                ordinal = ordinal(),
            ),
            format!("SELECT * FROM {retrieval} ORDER BY {identity};"),
        ),
    };

    // THROW aborts the batch, so a failed move never reaches the select
    let transfer = if plan.options.contains(BulkCopyOptions::USE_INTERNAL_TRANSACTION) {
        format!(
            "BEGIN TRY
    BEGIN TRANSACTION;
    {transfer}
    COMMIT TRANSACTION;
END TRY
BEGIN CATCH
    IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;
    THROW;
END CATCH;"
        )
    } else {
        format!(
            "BEGIN TRY
    {transfer}
END TRY
BEGIN CATCH
    THROW;
END CATCH;"
        )
    };

    format!(
        "{transfer}
{select}
DROP TABLE {holding};
DROP TABLE {retrieval};"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BulkCopyConfig;
    use crate::core::rowset::RowSet;
    use crate::core::value::SqlNullType;

    fn plan(config: BulkCopyConfig) -> WritePlan {
        let rows = RowSet::new("Widget")
            .with_column("Id", SqlNullType::I32)
            .with_column("Qty", SqlNullType::I32)
            .with_column("Name", SqlNullType::String);
        WritePlan::build(&config, &rows).unwrap()
    }

    fn widget() -> BulkCopyConfig {
        BulkCopyConfig::new("dbo.Widget").with_identity_column("Id")
    }

    #[test]
    fn test_cleanup_sql() {
        assert_eq!(
            cleanup_sql(&plan(widget())),
            "IF OBJECT_ID(N'tempdb..#WidgetTB', N'U') IS NOT NULL DROP TABLE [#WidgetTB];\n\
             IF OBJECT_ID(N'tempdb..#WidgetTR', N'U') IS NOT NULL DROP TABLE [#WidgetTR];"
        );
    }

    #[test]
    fn test_create_staging_sql() {
        let sql = create_staging_sql(&plan(widget()));
        assert!(sql.starts_with("IF OBJECT_ID(N'tempdb..#WidgetTB'"));
        assert!(sql.contains("OBJECT_ID(N'[dbo].[Widget]') AND c.name = N'Id'"));
        assert!(sql.contains("FROM sys.columns c"));
        assert!(sql.contains("SELECT [Qty], [Name] INTO [#WidgetTB] FROM [dbo].[Widget] WHERE 1 = 0;"));
        assert!(sql.contains("ALTER TABLE [#WidgetTB] ADD [__row_ordinal] INT NOT NULL;"));
        assert!(sql.contains("CREATE TABLE [#WidgetTR] ([__row_ordinal] INT NOT NULL, [Id] BIGINT NULL);"));
        assert!(sql.contains("EXEC (N'ALTER TABLE [#WidgetTR] ALTER COLUMN [Id] ' + @identity_type + N' NULL');"));
        assert!(!sql.contains("NOCOUNT"));
    }

    #[test]
    fn test_create_staging_sql_three_part_name() {
        let sql = create_staging_sql(&plan(
            BulkCopyConfig::new("Sales.dbo.Widget").with_identity_column("Id"),
        ));
        assert!(sql.contains("FROM [Sales].sys.columns c"));
        assert!(sql.contains("JOIN [Sales].sys.types t"));
        assert!(sql.contains("OBJECT_ID(N'[Sales].[dbo].[Widget]')"));
    }

    #[test]
    fn test_create_staging_sql_escapes_literals() {
        let config = BulkCopyConfig::new("dbo.[O'Brien]").with_identity_column("Id");
        let sql = create_staging_sql(&plan(config));
        assert!(sql.contains("OBJECT_ID(N'[dbo].[O''Brien]')"));
    }

    #[test]
    fn test_capture_sql_source_ordinal() {
        let sql = capture_sql(&plan(widget()));
        assert!(sql.contains("MERGE INTO [dbo].[Widget] AS dst"));
        assert!(sql.contains("USING [#WidgetTB] AS src"));
        assert!(sql.contains("INSERT ([Qty], [Name]) VALUES (src.[Qty], src.[Name])"));
        assert!(sql.contains(
            "OUTPUT src.[__row_ordinal], INSERTED.[Id] INTO [#WidgetTR] ([__row_ordinal], [Id]);"
        ));
        assert!(sql.contains("SELECT [__row_ordinal], [Id] FROM [#WidgetTR] ORDER BY [__row_ordinal];"));
        assert!(sql.ends_with("DROP TABLE [#WidgetTB];\nDROP TABLE [#WidgetTR];"));
        assert!(!sql.contains("TRANSACTION"));
        assert!(!sql.contains("TABLOCK"));
    }

    #[test]
    fn test_capture_sql_identity_order() {
        let sql = capture_sql(&plan(
            widget().with_correlation(RowCorrelation::IdentityOrder),
        ));
        assert!(sql.contains(
            "INSERT INTO [dbo].[Widget] ([Qty], [Name]) OUTPUT INSERTED.[Id] INTO [#WidgetTR] \
             SELECT [Qty], [Name] FROM [#WidgetTB] ORDER BY [__row_ordinal];"
        ));
        assert!(sql.contains("SELECT * FROM [#WidgetTR] ORDER BY [Id];"));
        assert!(!sql.contains("MERGE"));
    }

    #[test]
    fn test_capture_sql_options() {
        let sql = capture_sql(&plan(widget().with_options(
            BulkCopyOptions::TABLE_LOCK | BulkCopyOptions::USE_INTERNAL_TRANSACTION,
        )));
        assert!(sql.contains("MERGE INTO [dbo].[Widget] WITH (TABLOCK) AS dst"));
        assert!(sql.contains("BEGIN TRANSACTION;"));
        assert!(sql.contains("COMMIT TRANSACTION;"));
        assert!(sql.contains("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION;"));

        let sql = capture_sql(&plan(
            widget()
                .with_correlation(RowCorrelation::IdentityOrder)
                .with_options(BulkCopyOptions::TABLE_LOCK),
        ));
        assert!(sql.contains("INSERT INTO [dbo].[Widget] WITH (TABLOCK) ([Qty], [Name])"));
    }
}
