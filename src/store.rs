//! SQLite persistence for documents, paragraphs, and notes.
//!
//! Repository-style query methods over a [`SqlitePool`]. Uniqueness rules
//! (filename, one note per paragraph) are enforced by the schema; violations
//! surface as [`ReaderError::Conflict`].

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::error::{is_unique_violation, ReaderError, Result};
use crate::models::{Document, Note, Paragraph};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        filename: row.get("filename"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        paragraphs: Vec::new(),
    }
}

fn paragraph_from_row(row: &SqliteRow) -> Paragraph {
    Paragraph {
        id: row.get("id"),
        file_id: row.get("file_id"),
        order: row.get("order"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn note_from_row(row: &SqliteRow) -> Note {
    Note {
        id: row.get("id"),
        paragraph_id: row.get("paragraph_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Documents ============

    /// All documents with their paragraphs, oldest first.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, filename, content, created_at, updated_at FROM files ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut documents: Vec<Document> = rows.iter().map(document_from_row).collect();
        let index: HashMap<i64, usize> = documents
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id, i))
            .collect();

        let paragraph_rows = sqlx::query(
            r#"SELECT id, file_id, "order", content, created_at, updated_at
               FROM paragraphs ORDER BY file_id ASC, "order" ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in &paragraph_rows {
            let paragraph = paragraph_from_row(row);
            if let Some(&i) = index.get(&paragraph.file_id) {
                documents[i].paragraphs.push(paragraph);
            }
        }

        Ok(documents)
    }

    /// Document by filename, with paragraphs loaded.
    pub async fn find_document(&self, filename: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, content, created_at, updated_at FROM files WHERE filename = ?",
        )
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut doc = document_from_row(&row);
        doc.paragraphs = self.list_paragraphs(doc.id).await?;
        Ok(Some(doc))
    }

    pub async fn document_exists(&self, filename: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM files WHERE filename = ?")
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a document with empty content to obtain its id.
    pub async fn create_placeholder(&self, filename: &str) -> Result<Document> {
        let now = now_ts();
        let result = sqlx::query(
            "INSERT INTO files (filename, content, created_at, updated_at) VALUES (?, '', ?, ?)",
        )
        .bind(filename)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReaderError::Conflict(format!("File name '{}' already taken.", filename))
            } else {
                e.into()
            }
        })?;

        Ok(Document {
            id: result.last_insert_rowid(),
            filename: filename.to_string(),
            content: String::new(),
            created_at: now,
            updated_at: now,
            paragraphs: Vec::new(),
        })
    }

    pub async fn set_document_content(&self, document_id: i64, content: &str) -> Result<()> {
        sqlx::query("UPDATE files SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now_ts())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rename `old` to `new`. Conflict if `new` is taken, not-found if `old` is absent.
    pub async fn rename_document(&self, old: &str, new: &str) -> Result<Document> {
        if self.document_exists(new).await? {
            return Err(ReaderError::Conflict("File name already taken.".to_string()));
        }

        let result = sqlx::query("UPDATE files SET filename = ?, updated_at = ? WHERE filename = ?")
            .bind(new)
            .bind(now_ts())
            .bind(old)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ReaderError::Conflict("File name already taken.".to_string())
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(ReaderError::NotFound("File not found.".to_string()));
        }

        self.find_document(new)
            .await?
            .ok_or_else(|| ReaderError::NotFound("File not found.".to_string()))
    }

    /// Delete a document and all of its paragraphs and notes.
    pub async fn delete_document_by_id(&self, document_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM notes WHERE paragraph_id IN (SELECT id FROM paragraphs WHERE file_id = ?)",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM paragraphs WHERE file_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Cascade delete by filename. Returns false if no such document.
    pub async fn delete_document(&self, filename: &str) -> Result<bool> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM files WHERE filename = ?")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => {
                self.delete_document_by_id(id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ============ Paragraphs ============

    /// Insert all paragraphs of a document in one transaction, numbered from 1.
    pub async fn insert_paragraphs(
        &self,
        document_id: i64,
        paragraphs: &[String],
    ) -> Result<Vec<Paragraph>> {
        let now = now_ts();
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(paragraphs.len());

        for (index, content) in paragraphs.iter().enumerate() {
            let order = index as i64 + 1;
            let result = sqlx::query(
                r#"INSERT INTO paragraphs (file_id, "order", content, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(document_id)
            .bind(order)
            .bind(content)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            inserted.push(Paragraph {
                id: result.last_insert_rowid(),
                file_id: document_id,
                order,
                content: content.clone(),
                created_at: now,
                updated_at: now,
            });
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn list_paragraphs(&self, document_id: i64) -> Result<Vec<Paragraph>> {
        let rows = sqlx::query(
            r#"SELECT id, file_id, "order", content, created_at, updated_at
               FROM paragraphs WHERE file_id = ? ORDER BY "order" ASC"#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(paragraph_from_row).collect())
    }

    pub async fn find_paragraph(&self, paragraph_id: i64) -> Result<Option<Paragraph>> {
        let row = sqlx::query(
            r#"SELECT id, file_id, "order", content, created_at, updated_at
               FROM paragraphs WHERE id = ?"#,
        )
        .bind(paragraph_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(paragraph_from_row))
    }

    // ============ Notes ============

    /// Notes of one document, in paragraph order.
    pub async fn list_notes_for_document(&self, document_id: i64) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            r#"SELECT n.id, n.paragraph_id, n.content, n.created_at, n.updated_at
               FROM notes n JOIN paragraphs p ON p.id = n.paragraph_id
               WHERE p.file_id = ? ORDER BY p."order" ASC"#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(note_from_row).collect())
    }

    pub async fn find_note(&self, note_id: i64) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, paragraph_id, content, created_at, updated_at FROM notes WHERE id = ?",
        )
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(note_from_row))
    }

    pub async fn find_note_for_paragraph(&self, paragraph_id: i64) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, paragraph_id, content, created_at, updated_at FROM notes WHERE paragraph_id = ?",
        )
        .bind(paragraph_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(note_from_row))
    }

    pub async fn insert_note(&self, paragraph_id: i64, content: &str) -> Result<Note> {
        let now = now_ts();
        let result = sqlx::query(
            "INSERT INTO notes (paragraph_id, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(paragraph_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReaderError::Conflict("Note already exists for this paragraph.".to_string())
            } else {
                e.into()
            }
        })?;

        Ok(Note {
            id: result.last_insert_rowid(),
            paragraph_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace a note's content. `None` if the note does not exist.
    pub async fn update_note(&self, note_id: i64, content: &str) -> Result<Option<Note>> {
        let result = sqlx::query("UPDATE notes SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now_ts())
            .bind(note_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_note(note_id).await
    }

    /// Returns false if the note did not exist.
    pub async fn delete_note(&self, note_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> Store {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        // One connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        apply_schema(&pool).await.unwrap();
        Store::new(pool)
    }

    #[tokio::test]
    async fn test_duplicate_filename_maps_to_conflict() {
        let store = memory_store().await;
        store.create_placeholder("a.pdf").await.unwrap();
        let err = store.create_placeholder("a.pdf").await.unwrap_err();
        assert!(matches!(err, ReaderError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_schema_rejects_second_note_for_paragraph() {
        let store = memory_store().await;
        let doc = store.create_placeholder("a.pdf").await.unwrap();
        let paragraphs = store
            .insert_paragraphs(doc.id, &["One.".to_string(), "Two.".to_string()])
            .await
            .unwrap();

        store.insert_note(paragraphs[0].id, "first").await.unwrap();
        let err = store
            .insert_note(paragraphs[0].id, "second")
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::Conflict(_)));
        assert_eq!(
            store
                .find_note_for_paragraph(paragraphs[0].id)
                .await
                .unwrap()
                .unwrap()
                .content,
            "first"
        );
    }

    #[tokio::test]
    async fn test_paragraph_orders_start_at_one() {
        let store = memory_store().await;
        let doc = store.create_placeholder("a.pdf").await.unwrap();
        let texts: Vec<String> = ["x.", "y.", "z."].iter().map(|s| s.to_string()).collect();
        store.insert_paragraphs(doc.id, &texts).await.unwrap();

        let orders: Vec<i64> = store
            .list_paragraphs(doc.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.order)
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_documents_groups_paragraphs() {
        let store = memory_store().await;
        let a = store.create_placeholder("a.pdf").await.unwrap();
        let b = store.create_placeholder("b.pdf").await.unwrap();
        store
            .insert_paragraphs(b.id, &["b1.".to_string(), "b2.".to_string()])
            .await
            .unwrap();
        store.insert_paragraphs(a.id, &["a1.".to_string()]).await.unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].paragraphs.len(), 1);
        assert_eq!(docs[1].paragraphs.len(), 2);
        assert_eq!(docs[1].paragraphs[1].content, "b2.");
    }

    #[tokio::test]
    async fn test_list_documents_after_id_gap() {
        let store = memory_store().await;
        let a = store.create_placeholder("a.pdf").await.unwrap();
        store.create_placeholder("b.pdf").await.unwrap();
        let c = store.create_placeholder("c.pdf").await.unwrap();
        store.insert_paragraphs(a.id, &["a1.".to_string()]).await.unwrap();
        store
            .insert_paragraphs(c.id, &["c1.".to_string(), "c2.".to_string()])
            .await
            .unwrap();
        assert!(store.delete_document("b.pdf").await.unwrap());

        let docs = store.list_documents().await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "c.pdf"]);
        assert_eq!(docs[0].paragraphs.len(), 1);
        assert_eq!(docs[1].paragraphs.len(), 2);
        assert!(docs[1].paragraphs.iter().all(|p| p.file_id == c.id));
    }

    #[tokio::test]
    async fn test_delete_missing_document() {
        let store = memory_store().await;
        assert!(!store.delete_document("nope.pdf").await.unwrap());
    }
}
