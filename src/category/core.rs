//! Defines the core data model and database queries for categories.
//!
//! Categories form a two-level hierarchy: a category may have a parent, and a
//! category that still has children cannot be deleted.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseID};

// ============================================================================
// MODELS
// ============================================================================

/// A spending or income category that transactions can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseID,
    /// The display name of the category.
    pub name: String,
    /// The ID of the parent category, if this is a subcategory.
    pub parent_id: Option<DatabaseID>,
    /// Sort key used when listing categories.
    pub display_order: i64,
}

/// The fields of a [Category] supplied by the client on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    /// The display name of the category.
    pub name: String,
    /// The ID of the parent category, if this is a subcategory.
    #[serde(default)]
    pub parent_id: Option<DatabaseID>,
    /// Sort key used when listing categories.
    #[serde(default)]
    pub display_order: i64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the category table in the database.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES category (id) ON UPDATE CASCADE ON DELETE SET NULL,
            display_order INTEGER NOT NULL DEFAULT 0
        )",
        (),
    )?;

    Ok(())
}

/// Create a new category in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::MissingParentCategory] if `data.parent_id` does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(data: CategoryData, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare(
            "INSERT INTO category (name, parent_id, display_order)
             VALUES (?1, ?2, ?3)
             RETURNING id, name, parent_id, display_order",
        )?
        .query_row(
            (&data.name, data.parent_id, data.display_order),
            map_row_to_category,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::MissingParentCategory,
            error => error.into(),
        })?;

    Ok(category)
}

/// Retrieve a category by its ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: DatabaseID, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare("SELECT id, name, parent_id, display_order FROM category WHERE id = :id")?
        .query_one(&[(":id", &id)], map_row_to_category)?;

    Ok(category)
}

/// Retrieve all categories, ordered by display order and then name.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, parent_id, display_order
             FROM category
             ORDER BY display_order, name",
        )?
        .query_map([], map_row_to_category)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Replace the stored fields of the category `id` with `data`.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryOwnParent] if `data.parent_id` is the category itself,
/// - [Error::MissingParentCategory] if `data.parent_id` does not refer to a real category,
/// - [Error::UpdateMissingCategory] if `id` does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    id: DatabaseID,
    data: CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    if data.parent_id == Some(id) {
        return Err(Error::CategoryOwnParent);
    }

    let rows_updated = connection
        .execute(
            "UPDATE category SET name = ?1, parent_id = ?2, display_order = ?3 WHERE id = ?4",
            (&data.name, data.parent_id, data.display_order, id),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::MissingParentCategory,
            error => error.into(),
        })?;

    if rows_updated == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    get_category(id, connection)
}

/// Delete the category `id`.
///
/// Transactions assigned to the category keep their rows and lose the
/// assignment.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryHasSubcategories] if other categories still name `id` as their parent,
/// - [Error::DeleteMissingCategory] if `id` does not refer to a real category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let child_count: i64 = connection
        .prepare("SELECT COUNT(id) FROM category WHERE parent_id = :id")?
        .query_one(&[(":id", &id)], |row| row.get(0))?;

    if child_count > 0 {
        return Err(Error::CategoryHasSubcategories);
    }

    let rows_deleted = connection.execute("DELETE FROM category WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

/// Convert a database row into a [Category].
///
/// # Errors
/// Returns a [rusqlite::Error] if a column is missing or holds an unexpected type.
pub fn map_row_to_category(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let parent_id = row.get(2)?;
    let display_order = row.get(3)?;

    Ok(Category {
        id,
        name,
        parent_id,
        display_order,
    })
}

// ============================================================================
// TESTS
// ============================================================================
