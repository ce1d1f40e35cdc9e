use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::models::{Book, BookQuery};

const BOOK_COLUMNS: &str = "id, title, author, year, copies";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        year: row.get(3)?,
        copies: row.get(4)?,
    })
}

/// Run a book query that takes a single bound parameter and collect the rows.
fn query_books<P: rusqlite::ToSql>(
    conn: &Connection,
    sql: &str,
    param: P,
    what: &str,
) -> Result<Vec<Book>> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("failed to prepare {what} query"))?;

    let books = stmt
        .query_map([param], book_from_row)
        .with_context(|| format!("failed to load {what}"))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to collect {what}"))?;

    Ok(books)
}

/// Insert a catalog entry and echo the hydrated struct back.
pub fn create_book(
    conn: &Connection,
    title: &str,
    author: &str,
    year: i32,
    copies: u32,
) -> Result<Book> {
    conn.execute(
        "INSERT INTO books (title, author, year, copies) VALUES (?1, ?2, ?3, ?4)",
        params![title, author, year, copies],
    )
    .context("failed to insert book")?;

    let id = conn.last_insert_rowid();
    info!(book_id = id, title, copies, "book added");
    Ok(Book {
        id,
        title: title.to_string(),
        author: author.to_string(),
        year,
        copies,
    })
}

pub fn fetch_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
        [id],
        book_from_row,
    )
    .optional()
    .context("failed to load book")
}

/// Every book carrying exactly this title, oldest entry first.
pub fn fetch_books_by_title(conn: &Connection, title: &str) -> Result<Vec<Book>> {
    query_books(
        conn,
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE title = ?1 ORDER BY id"),
        title,
        "books by title",
    )
}

/// First book with this title, or `None`. Duplicate titles resolve to the
/// lowest id so repeated lookups are stable.
pub fn fetch_first_book_by_title(conn: &Connection, title: &str) -> Result<Option<Book>> {
    let book = conn
        .query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE title = ?1 ORDER BY id LIMIT 1"),
            [title],
            book_from_row,
        )
        .optional()
        .context("failed to look up book by title")?;
    debug!(title, found = book.is_some(), "title lookup");
    Ok(book)
}

pub fn fetch_books_by_author(conn: &Connection, author: &str) -> Result<Vec<Book>> {
    query_books(
        conn,
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE author = ?1 ORDER BY id"),
        author,
        "books by author",
    )
}

pub fn fetch_books_by_year(conn: &Connection, year: i32) -> Result<Vec<Book>> {
    query_books(
        conn,
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE year = ?1 ORDER BY id"),
        year,
        "books by year",
    )
}

/// Books with at least one copy on the shelf, sorted for the report screen.
pub fn fetch_available_books(conn: &Connection) -> Result<Vec<Book>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE copies > 0
             ORDER BY title COLLATE NOCASE, id"
        ))
        .context("failed to prepare available books query")?;

    let books = stmt
        .query_map([], book_from_row)
        .context("failed to load available books")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect available books")?;

    Ok(books)
}

/// Combine the search dialog filters: the first title match, then every author
/// match, then every year match. A book matching several filters is listed
/// once.
pub fn search_books(conn: &Connection, query: &BookQuery) -> Result<Vec<Book>> {
    let mut results: Vec<Book> = Vec::new();

    if let Some(title) = &query.title {
        results.extend(fetch_first_book_by_title(conn, title)?);
    }
    if let Some(author) = &query.author {
        results.extend(fetch_books_by_author(conn, author)?);
    }
    if let Some(year) = query.year {
        results.extend(fetch_books_by_year(conn, year)?);
    }

    let mut seen = std::collections::HashSet::new();
    results.retain(|book| seen.insert(book.id));
    Ok(results)
}

/// Take one copy off the shelf. Returns `false` without touching the row when
/// no copy is left, so the caller can report the book as unavailable.
pub fn take_copy(conn: &Connection, book_id: i64) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE books SET copies = copies - 1 WHERE id = ?1 AND copies > 0",
            [book_id],
        )
        .context("failed to decrement copies")?;
    Ok(updated == 1)
}

pub fn restore_copy(conn: &Connection, book_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE books SET copies = copies + 1 WHERE id = ?1",
        [book_id],
    )
    .context("failed to increment copies")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn seeded() -> Connection {
        let conn = open_in_memory().expect("open");
        create_book(&conn, "Dune", "Herbert", 1965, 2).expect("dune");
        create_book(&conn, "Emma", "Austen", 1815, 0).expect("emma");
        create_book(&conn, "Children of Dune", "Herbert", 1976, 1).expect("children");
        create_book(&conn, "Persuasion", "Austen", 1817, 3).expect("persuasion");
        conn
    }

    #[test]
    fn title_lookup_is_exact() {
        let conn = seeded();
        let book = fetch_first_book_by_title(&conn, "Dune").expect("query");
        assert_eq!(book.map(|b| b.author), Some("Herbert".to_string()));
        assert_eq!(fetch_first_book_by_title(&conn, "dune").expect("query"), None);
        assert_eq!(fetch_first_book_by_title(&conn, "Missing").expect("query"), None);
    }

    #[test]
    fn duplicate_titles_resolve_to_lowest_id() {
        let conn = seeded();
        let copy = create_book(&conn, "Dune", "Someone Else", 2020, 5).expect("dup");
        let first = fetch_first_book_by_title(&conn, "Dune")
            .expect("query")
            .expect("present");
        assert_ne!(first.id, copy.id);
        assert_eq!(fetch_books_by_title(&conn, "Dune").expect("query").len(), 2);
    }

    #[test]
    fn author_and_year_return_all_matches() {
        let conn = seeded();
        let herbert: Vec<String> = fetch_books_by_author(&conn, "Herbert")
            .expect("query")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(herbert, vec!["Dune", "Children of Dune"]);
        assert!(fetch_books_by_author(&conn, "Tolkien").expect("query").is_empty());
        assert_eq!(fetch_books_by_year(&conn, 1815).expect("query").len(), 1);
    }

    #[test]
    fn available_books_skip_empty_shelves() {
        let conn = seeded();
        let titles: Vec<String> = fetch_available_books(&conn)
            .expect("query")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Children of Dune", "Dune", "Persuasion"]);
    }

    #[test]
    fn search_merges_filters_without_duplicates() {
        let conn = seeded();
        let query = BookQuery {
            title: Some("Dune".into()),
            author: Some("Herbert".into()),
            year: Some(1817),
        };
        let titles: Vec<String> = search_books(&conn, &query)
            .expect("search")
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Dune", "Children of Dune", "Persuasion"]);
        assert!(search_books(&conn, &BookQuery::default()).expect("search").is_empty());
    }

    #[test]
    fn take_copy_stops_at_zero() {
        let conn = seeded();
        let emma = fetch_first_book_by_title(&conn, "Emma")
            .expect("query")
            .expect("present");
        assert!(!take_copy(&conn, emma.id).expect("update"));
        restore_copy(&conn, emma.id).expect("restore");
        assert!(take_copy(&conn, emma.id).expect("update"));
        assert_eq!(fetch_book(&conn, emma.id).expect("load").map(|b| b.copies), Some(0));
    }
}
