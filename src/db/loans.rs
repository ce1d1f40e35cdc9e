//! Loan records and the two circulation transactions. Checkout and return
//! each touch two tables, so both run inside one `IMMEDIATE` transaction: if
//! any statement fails the transaction is dropped and SQLite rolls back both
//! writes.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::models::{Book, BookRef, CheckoutOutcome, Loan, LoanView, ReturnOutcome};

use super::books::{fetch_book, fetch_books_by_title, restore_copy, take_copy};
use super::users::fetch_user_by_external_id;

/// How a `BookRef` resolved against the catalog.
enum Resolved {
    Found(Book),
    NotFound,
    Ambiguous { title: String, matches: usize },
}

fn resolve_book(conn: &Connection, target: &BookRef) -> Result<Resolved> {
    match target {
        BookRef::Id(id) => Ok(match fetch_book(conn, *id)? {
            Some(book) => Resolved::Found(book),
            None => Resolved::NotFound,
        }),
        BookRef::Title(title) => {
            let mut books = fetch_books_by_title(conn, title)?;
            Ok(match books.len() {
                0 => Resolved::NotFound,
                1 => Resolved::Found(books.remove(0)),
                matches => Resolved::Ambiguous {
                    title: title.clone(),
                    matches,
                },
            })
        }
    }
}

pub fn create_loan(conn: &Connection, book_id: i64, external_id: &str) -> Result<Loan> {
    conn.execute(
        "INSERT INTO loans (book_id, external_id) VALUES (?1, ?2)",
        params![book_id, external_id],
    )
    .context("failed to insert loan")?;

    Ok(Loan {
        id: conn.last_insert_rowid(),
        book_id,
        external_id: external_id.to_string(),
    })
}

/// Oldest outstanding loan of this book to this patron, if any.
pub fn fetch_open_loan(conn: &Connection, book_id: i64, external_id: &str) -> Result<Option<Loan>> {
    conn.query_row(
        "SELECT id, book_id, external_id FROM loans
         WHERE book_id = ?1 AND external_id = ?2
         ORDER BY id LIMIT 1",
        params![book_id, external_id],
        |row| {
            Ok(Loan {
                id: row.get(0)?,
                book_id: row.get(1)?,
                external_id: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to look up loan")
}

pub fn delete_loan(conn: &Connection, loan_id: i64) -> Result<()> {
    conn.execute("DELETE FROM loans WHERE id = ?1", [loan_id])
        .context("failed to delete loan")?;
    Ok(())
}

/// Every outstanding loan with the book title and patron name filled in.
pub fn fetch_loans(conn: &Connection) -> Result<Vec<LoanView>> {
    let mut stmt = conn
        .prepare(
            "SELECT l.id, b.id, b.title, u.external_id, u.name
             FROM loans l
             INNER JOIN books b ON l.book_id = b.id
             INNER JOIN users u ON l.external_id = u.external_id
             ORDER BY l.id",
        )
        .context("failed to prepare loans query")?;

    let loans = stmt
        .query_map([], |row| {
            Ok(LoanView {
                loan_id: row.get(0)?,
                book_id: row.get(1)?,
                title: row.get(2)?,
                external_id: row.get(3)?,
                user_name: row.get(4)?,
            })
        })
        .context("failed to load loans")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect loans")?;

    Ok(loans)
}

/// Lend one copy of `target` to the patron. Checks run in order: book exists
/// (and is unambiguous), patron exists, a copy is on the shelf.
pub fn checkout(
    conn: &mut Connection,
    target: &BookRef,
    external_id: &str,
) -> Result<CheckoutOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("failed to begin checkout")?;

    let book = match resolve_book(&tx, target)? {
        Resolved::Found(book) => book,
        Resolved::NotFound => {
            debug!(?target, "checkout refused: book not found");
            return Ok(CheckoutOutcome::BookNotFound);
        }
        Resolved::Ambiguous { title, matches } => {
            debug!(%title, matches, "checkout refused: ambiguous title");
            return Ok(CheckoutOutcome::AmbiguousTitle { title, matches });
        }
    };

    let Some(user) = fetch_user_by_external_id(&tx, external_id)? else {
        debug!(external_id, "checkout refused: user not found");
        return Ok(CheckoutOutcome::UserNotFound);
    };

    if !take_copy(&tx, book.id)? {
        debug!(book_id = book.id, "checkout refused: no copies left");
        return Ok(CheckoutOutcome::Unavailable { title: book.title });
    }
    let loan = create_loan(&tx, book.id, &user.external_id)?;

    tx.commit().context("failed to commit checkout")?;
    info!(
        loan_id = loan.id,
        book_id = book.id,
        external_id,
        "book checked out"
    );

    Ok(CheckoutOutcome::CheckedOut {
        title: book.title,
        user_name: user.name,
    })
}

/// Close the oldest outstanding loan of `target` held by the patron and put
/// the copy back on the shelf.
pub fn return_book(
    conn: &mut Connection,
    target: &BookRef,
    external_id: &str,
) -> Result<ReturnOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("failed to begin return")?;

    let book = match resolve_book(&tx, target)? {
        Resolved::Found(book) => book,
        Resolved::NotFound => {
            debug!(?target, "return refused: book not found");
            return Ok(ReturnOutcome::BookNotFound);
        }
        Resolved::Ambiguous { title, matches } => {
            debug!(%title, matches, "return refused: ambiguous title");
            return Ok(ReturnOutcome::AmbiguousTitle { title, matches });
        }
    };

    let Some(loan) = fetch_open_loan(&tx, book.id, external_id)? else {
        debug!(book_id = book.id, external_id, "return refused: no such loan");
        return Ok(ReturnOutcome::LoanNotFound);
    };

    delete_loan(&tx, loan.id)?;
    restore_copy(&tx, book.id)?;

    tx.commit().context("failed to commit return")?;
    info!(loan_id = loan.id, book_id = book.id, external_id, "book returned");

    Ok(ReturnOutcome::Returned { title: book.title })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::db::{create_book, create_user, open_in_memory};

    fn title(t: &str) -> BookRef {
        BookRef::Title(t.to_string())
    }

    fn copies_of(conn: &Connection, book_id: i64) -> u32 {
        fetch_book(conn, book_id)
            .expect("load")
            .expect("present")
            .copies
    }

    fn loans_for(conn: &Connection, book_id: i64, external_id: &str) -> usize {
        fetch_loans(conn)
            .expect("loans")
            .into_iter()
            .filter(|l| l.book_id == book_id && l.external_id == external_id)
            .count()
    }

    /// Dune with two copies and Alice registered as `u1`.
    #[fixture]
    fn library() -> (Connection, Book) {
        let conn = open_in_memory().expect("open");
        let dune = create_book(&conn, "Dune", "Herbert", 1965, 2).expect("book");
        create_user(&conn, "Alice", "u1", "a@x").expect("user");
        (conn, dune)
    }

    #[rstest]
    fn dune_scenario(library: (Connection, Book)) {
        let (mut conn, dune) = library;

        let first = checkout(&mut conn, &title("Dune"), "u1").expect("checkout");
        assert_eq!(
            first,
            CheckoutOutcome::CheckedOut {
                title: "Dune".into(),
                user_name: "Alice".into()
            }
        );
        assert_eq!(copies_of(&conn, dune.id), 1);

        assert!(checkout(&mut conn, &title("Dune"), "u1")
            .expect("checkout")
            .is_success());
        assert_eq!(copies_of(&conn, dune.id), 0);

        assert_eq!(
            checkout(&mut conn, &title("Dune"), "u1").expect("checkout"),
            CheckoutOutcome::Unavailable {
                title: "Dune".into()
            }
        );
        assert_eq!(copies_of(&conn, dune.id), 0);
        assert_eq!(loans_for(&conn, dune.id, "u1"), 2);

        assert_eq!(
            return_book(&mut conn, &title("Dune"), "u1").expect("return"),
            ReturnOutcome::Returned {
                title: "Dune".into()
            }
        );
        assert_eq!(copies_of(&conn, dune.id), 1);
        assert_eq!(loans_for(&conn, dune.id, "u1"), 1);
    }

    #[rstest]
    fn checkout_then_return_restores_state(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        let before = copies_of(&conn, dune.id);

        checkout(&mut conn, &title("Dune"), "u1").expect("checkout");
        return_book(&mut conn, &title("Dune"), "u1").expect("return");

        assert_eq!(copies_of(&conn, dune.id), before);
        assert_eq!(loans_for(&conn, dune.id, "u1"), 0);
    }

    #[rstest]
    fn checkout_reports_missing_parties_in_order(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        assert_eq!(
            checkout(&mut conn, &title("Missing"), "nobody").expect("checkout"),
            CheckoutOutcome::BookNotFound
        );
        assert_eq!(
            checkout(&mut conn, &title("Dune"), "nobody").expect("checkout"),
            CheckoutOutcome::UserNotFound
        );
        assert_eq!(copies_of(&conn, dune.id), 2);
        assert!(fetch_loans(&conn).expect("loans").is_empty());
    }

    #[rstest]
    fn missing_user_outranks_an_empty_shelf(library: (Connection, Book)) {
        let (mut conn, _) = library;
        let sold_out = create_book(&conn, "Emma", "Austen", 1815, 0).expect("book");

        assert_eq!(
            checkout(&mut conn, &title("Emma"), "nobody").expect("checkout"),
            CheckoutOutcome::UserNotFound
        );
        assert_eq!(
            checkout(&mut conn, &title("Emma"), "u1").expect("checkout"),
            CheckoutOutcome::Unavailable {
                title: "Emma".into()
            }
        );
        assert_eq!(copies_of(&conn, sold_out.id), 0);
        assert!(fetch_loans(&conn).expect("loans").is_empty());
    }

    #[rstest]
    fn return_without_loan_is_refused(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        assert_eq!(
            return_book(&mut conn, &title("Missing"), "u1").expect("return"),
            ReturnOutcome::BookNotFound
        );
        assert_eq!(
            return_book(&mut conn, &title("Dune"), "u1").expect("return"),
            ReturnOutcome::LoanNotFound
        );
        assert_eq!(copies_of(&conn, dune.id), 2);
    }

    #[rstest]
    fn return_only_matches_the_borrower(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        create_user(&conn, "Bob", "u2", "b@x").expect("user");
        checkout(&mut conn, &title("Dune"), "u1").expect("checkout");

        assert_eq!(
            return_book(&mut conn, &title("Dune"), "u2").expect("return"),
            ReturnOutcome::LoanNotFound
        );
        assert_eq!(copies_of(&conn, dune.id), 1);
    }

    #[rstest]
    fn duplicate_titles_need_an_id(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        let reprint = create_book(&conn, "Dune", "Herbert", 2005, 1).expect("book");

        assert_eq!(
            checkout(&mut conn, &title("Dune"), "u1").expect("checkout"),
            CheckoutOutcome::AmbiguousTitle {
                title: "Dune".into(),
                matches: 2
            }
        );

        let outcome = checkout(&mut conn, &BookRef::Id(reprint.id), "u1").expect("checkout");
        assert!(outcome.is_success());
        assert_eq!(copies_of(&conn, reprint.id), 0);
        assert_eq!(copies_of(&conn, dune.id), 2);

        assert_eq!(
            return_book(&mut conn, &title("Dune"), "u1").expect("return"),
            ReturnOutcome::AmbiguousTitle {
                title: "Dune".into(),
                matches: 2
            }
        );
        assert!(return_book(&mut conn, &BookRef::Id(reprint.id), "u1")
            .expect("return")
            .is_success());
        assert_eq!(copies_of(&conn, reprint.id), 1);
    }

    #[rstest]
    fn failed_loan_insert_rolls_back_the_copy(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        conn.execute_batch(
            "CREATE TRIGGER reject_loans BEFORE INSERT ON loans
             BEGIN SELECT RAISE(ABORT, 'loan table offline'); END;",
        )
        .expect("trigger");

        assert!(checkout(&mut conn, &title("Dune"), "u1").is_err());
        assert_eq!(copies_of(&conn, dune.id), 2);
        assert!(fetch_loans(&conn).expect("loans").is_empty());
    }

    #[rstest]
    fn failed_copy_restore_keeps_the_loan(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        checkout(&mut conn, &title("Dune"), "u1").expect("checkout");
        conn.execute_batch(
            "CREATE TRIGGER reject_restock BEFORE UPDATE OF copies ON books
             BEGIN SELECT RAISE(ABORT, 'shelf locked'); END;",
        )
        .expect("trigger");

        assert!(return_book(&mut conn, &title("Dune"), "u1").is_err());
        assert_eq!(copies_of(&conn, dune.id), 1);
        assert_eq!(loans_for(&conn, dune.id, "u1"), 1);
    }

    #[rstest]
    fn copies_plus_loans_is_conserved(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        create_user(&conn, "Bob", "u2", "b@x").expect("user");
        let patrons = ["u1", "u2"];

        for step in 0..40usize {
            let patron = patrons[step % 2];
            let copies_before = copies_of(&conn, dune.id);
            if step % 3 == 2 {
                return_book(&mut conn, &title("Dune"), patron).expect("return");
            } else {
                let outcome = checkout(&mut conn, &title("Dune"), patron).expect("checkout");
                assert_eq!(
                    matches!(outcome, CheckoutOutcome::Unavailable { .. }),
                    copies_before == 0
                );
            }
            let outstanding = fetch_loans(&conn).expect("loans").len() as u32;
            assert_eq!(copies_of(&conn, dune.id) + outstanding, 2);
        }
    }

    #[rstest]
    fn loan_listing_joins_title_and_name(library: (Connection, Book)) {
        let (mut conn, dune) = library;
        checkout(&mut conn, &title("Dune"), "u1").expect("checkout");
        let loans = fetch_loans(&conn).expect("loans");
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].book_id, dune.id);
        assert_eq!(loans[0].summary(), "Dune - loaned to Alice");
    }
}
