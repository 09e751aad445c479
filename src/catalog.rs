//! Name↔id↔file-handle directory of tables, plus the text-format schema
//! loader described in the external interfaces section.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{DbError, DbErrorKind};
use crate::field::Type;
use crate::heap_file::HeapFile;
use crate::schema::TupleDesc;

struct CatalogEntry {
    file: Arc<HeapFile>,
    name: String,
    primary_key: Option<String>,
}

/// Not expected to be mutated concurrently with execution; callers that
/// need that guarantee should hold it behind their own lock (the
/// `Database` context does, via `Arc<RwLock<Catalog>>`).
pub struct Catalog {
    by_id: HashMap<i32, CatalogEntry>,
    name_to_id: HashMap<String, i32>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog {
            by_id: HashMap::new(),
            name_to_id: HashMap::new(),
        }
    }

    /// Register `file` under `name`/`primary_key`, replacing any existing
    /// entry that shares the same name or is a re-registration of the same
    /// path under the same id. Rejects a call that would silently alias two
    /// *distinct* files onto the same id (a truncated-hash collision).
    pub fn add_table(
        &mut self,
        file: Arc<HeapFile>,
        name: &str,
        primary_key: Option<&str>,
    ) -> Result<(), DbError> {
        let id = file.id();

        if let Some(existing) = self.by_id.get(&id) {
            if existing.file.path() != file.path() {
                return Err(DbError::new(
                    DbErrorKind::TableIdCollision,
                    format!(
                        "table id {} would alias distinct files {} and {}",
                        id,
                        existing.file.path().display(),
                        file.path().display()
                    ),
                ));
            }
            if existing.name != name {
                self.name_to_id.remove(&existing.name);
            }
        }

        if let Some(&existing_id) = self.name_to_id.get(name) {
            if existing_id != id {
                self.by_id.remove(&existing_id);
            }
        }

        self.name_to_id.insert(name.to_string(), id);
        self.by_id.insert(
            id,
            CatalogEntry {
                file,
                name: name.to_string(),
                primary_key: primary_key.map(|s| s.to_string()),
            },
        );
        Ok(())
    }

    pub fn get_table(&self, table_id: i32) -> Result<Arc<HeapFile>, DbError> {
        self.by_id
            .get(&table_id)
            .map(|e| Arc::clone(&e.file))
            .ok_or_else(|| {
                DbError::new(DbErrorKind::NoSuchTable, format!("no table with id {}", table_id))
            })
    }

    pub fn get_table_id(&self, name: &str) -> Result<i32, DbError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| DbError::new(DbErrorKind::NoSuchTable, format!("no table named {}", name)))
    }

    pub fn primary_key(&self, table_id: i32) -> Result<Option<&str>, DbError> {
        self.by_id
            .get(&table_id)
            .map(|e| e.primary_key.as_deref())
            .ok_or_else(|| {
                DbError::new(DbErrorKind::NoSuchTable, format!("no table with id {}", table_id))
            })
    }

    /// Parse the catalog text format:
    /// `tablename (field1 type1 [pk], field2 type2, ...)`
    /// one line per table. Data files resolve to `<dir>/<tablename>.dat`.
    pub fn load_schema(&mut self, dir: impl AsRef<Path>, page_size: usize) -> Result<(), DbError> {
        let dir = dir.as_ref();
        let catalog_file = dir.join("catalog.txt");
        let contents = fs::read_to_string(&catalog_file)?;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.load_table_line(dir, line, page_size)?;
        }
        Ok(())
    }

    fn load_table_line(&mut self, dir: &Path, line: &str, page_size: usize) -> Result<(), DbError> {
        let open_paren = line.find('(').ok_or_else(|| {
            DbError::new(DbErrorKind::IoError, format!("malformed catalog line: {}", line))
        })?;
        let table_name = line[..open_paren].trim().to_string();
        let close_paren = line.rfind(')').ok_or_else(|| {
            DbError::new(DbErrorKind::IoError, format!("malformed catalog line: {}", line))
        })?;
        let body = &line[open_paren + 1..close_paren];

        let mut field_specs = Vec::new();
        let mut primary_key = None;
        for field_decl in body.split(',') {
            let tokens: Vec<&str> = field_decl.split_whitespace().collect();
            if tokens.len() < 2 {
                return Err(DbError::new(
                    DbErrorKind::IoError,
                    format!("malformed field declaration: {}", field_decl),
                ));
            }
            let field_name = tokens[0].to_string();
            let ty = match tokens[1].to_lowercase().as_str() {
                "int" => Type::Int,
                "string" => Type::String,
                other => {
                    return Err(DbError::new(
                        DbErrorKind::IoError,
                        format!("unknown field type: {}", other),
                    ))
                }
            };
            if tokens.get(2).map(|t| t.eq_ignore_ascii_case("pk")).unwrap_or(false) {
                primary_key = Some(field_name.clone());
            }
            field_specs.push((ty, Some(field_name)));
        }

        let schema = TupleDesc::new(field_specs)?;
        let data_path = dir.join(format!("{}.dat", table_name));
        let file = Arc::new(HeapFile::new(data_path, schema, page_size)?);
        self.add_table(file, &table_name, primary_key.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Type;
    use std::env;

    fn schema() -> TupleDesc {
        TupleDesc::named(vec![(Type::Int, "a")]).unwrap()
    }

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let mut p = env::temp_dir();
        p.push(format!("small-db-catalog-test-{}-{}", std::process::id(), name));
        p
    }

    #[test]
    fn add_table_rejects_distinct_paths_colliding_on_id() {
        let mut catalog = Catalog::new();
        let path_a = scratch_path("a.dat");
        let path_b = scratch_path("b.dat");
        let file_a = Arc::new(HeapFile::new_with_forced_id(&path_a, schema(), 4096, 42).unwrap());
        let file_b = Arc::new(HeapFile::new_with_forced_id(&path_b, schema(), 4096, 42).unwrap());

        catalog.add_table(file_a, "a", None).unwrap();
        let err = catalog.add_table(file_b, "b", None).unwrap_err();
        assert_eq!(err.kind(), DbErrorKind::TableIdCollision);
        // The original table is untouched by the rejected call.
        assert_eq!(catalog.get_table_id("a").unwrap(), 42);
        assert!(catalog.get_table_id("b").is_err());

        let _ = std::fs::remove_file(path_a);
        let _ = std::fs::remove_file(path_b);
    }

    #[test]
    fn add_table_replaces_same_path_registered_twice() {
        let mut catalog = Catalog::new();
        let path = scratch_path("same.dat");
        let first = Arc::new(HeapFile::new_with_forced_id(&path, schema(), 4096, 7).unwrap());
        let second = Arc::new(HeapFile::new_with_forced_id(&path, schema(), 4096, 7).unwrap());

        catalog.add_table(first, "t", None).unwrap();
        catalog.add_table(second, "t", None).unwrap();
        assert_eq!(catalog.get_table_id("t").unwrap(), 7);

        let _ = std::fs::remove_file(path);
    }
}
