//! Domain store: territories, their rooms, members and details.
//!
//! # Responsibility
//! - Own every read and write against `domains`, `rooms`, `members` and
//!   `details`.
//! - Turn constraint violations into typed collisions at the step that hit
//!   them.
//!
//! # Invariants
//! - `claim_domain` and `transfer_domain` are all-or-nothing.
//! - The owner is a member right after a claim or a transfer.
//! - Member inserts are idempotent; detail writes are upserts on a
//!   lower-cased key.
//! - Only `admin_fetch_domain_details` skips the membership check.
//! - Stored names, members, rooms and details never contain a reply
//!   delimiter, and `security`/`rating` details always hold integers.

use crate::db::{is_constraint_violation, DbError, ScopedSavepoint};
use crate::model::domain::{
    normalize_detail_key, Domain, DomainBundle, DomainDetail, DomainId, DomainSecurity,
    RATING_DETAIL_KEY, SECURITY_DETAIL_KEY,
};
use crate::model::find_wire_delimiter;
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DOMAIN_SELECT_SQL: &str = "SELECT
    d.idDomains AS idDomains,
    d.name AS name,
    d.sphere AS sphere,
    d.owner AS owner
FROM domains d";

/// Separates a detail key from its value inside a bundle's detail items.
const DETAIL_PAIR_SEP: char = ':';

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors from domain store operations.
#[derive(Debug)]
pub enum DomainError {
    /// `(name, owner)` or `(name, sphere)` already exists.
    NameCollision { name: String },
    /// `(sphere, room)` already belongs to a domain.
    RoomCollision { sphere: String, room: String },
    /// Member insert failed after the domain and room rows were written.
    MembershipFailure { member: String, source: DbError },
    /// No domain matches the given name (and owner, when one was given).
    NotFound { name: String },
    /// The actor is not listed as a member of the named domain.
    NotMember { member: String, name: String },
    /// Detail key is blank after normalization.
    InvalidDetailKey(String),
    /// `security` or `rating` value is not an integer.
    InvalidDetailValue { key: String, value: String },
    /// Detail tokens do not form whole key/value pairs.
    InvalidDetailPairs(usize),
    /// Text contains a character that structures composite replies.
    ReservedCharacter { field: &'static str, value: String },
    Db(DbError),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameCollision { name } => write!(f, "domain name `{name}` is already taken"),
            Self::RoomCollision { sphere, room } => {
                write!(f, "room {room} is already claimed in sphere {sphere}")
            }
            Self::MembershipFailure { member, source } => {
                write!(f, "could not add {member} as a domain member: {source}")
            }
            Self::NotFound { name } => write!(f, "domain not found: `{name}`"),
            Self::NotMember { member, name } => {
                write!(f, "{member} is not a member of domain `{name}`")
            }
            Self::InvalidDetailKey(key) => write!(f, "invalid domain detail key `{key}`"),
            Self::InvalidDetailValue { key, value } => {
                write!(f, "domain detail `{key}` must be a whole number, got `{value}`")
            }
            Self::InvalidDetailPairs(count) => write!(
                f,
                "invalid number of domain detail key/value pairs provided ({count} values)"
            ),
            Self::ReservedCharacter { field, .. } => {
                write!(f, "{field} contains a reserved delimiter character")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DomainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MembershipFailure { source, .. } => Some(source),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for DomainError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Domain ownership operations.
pub trait DomainStore {
    /// Creates a domain with its first room and its owner as first member.
    fn claim_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<DomainId>;
    /// Loads one domain by owner and name.
    fn get_domain(&self, owner: &str, name: &str) -> DomainResult<Option<Domain>>;
    /// Binds one more room to an owned domain.
    fn add_room_to_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<()>;
    /// Unbinds a room; returns removed row count (0 when it was not bound).
    fn remove_room_from_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<usize>;
    /// Adds members, ignoring ones already listed; returns newly added count.
    fn add_members(&self, owner: &str, name: &str, members: &[String]) -> DomainResult<usize>;
    /// Removes members; returns removed count.
    fn remove_members(&self, owner: &str, name: &str, members: &[String])
        -> DomainResult<usize>;
    /// Upserts one detail under its lower-cased key.
    fn set_detail(&self, owner: &str, name: &str, key: &str, value: &str) -> DomainResult<()>;
    /// Upserts `key value key value ...` tokens; returns pairs written.
    fn set_details(&self, owner: &str, name: &str, tokens: &[String]) -> DomainResult<usize>;
    /// Deletes the domain and every room, member and detail row under it.
    fn revoke_domain(&self, owner: &str, name: &str) -> DomainResult<()>;
    /// Hands the domain to `new_owner` and lists them as a member.
    fn transfer_domain(&self, old_owner: &str, new_owner: &str, name: &str)
        -> DomainResult<()>;
    /// Removes `member` from every domain called `name` that lists them.
    fn leave_domain(&self, member: &str, name: &str) -> DomainResult<()>;
    /// Whether `member` belongs to the domain holding `room` in `sphere`.
    fn check_membership(&self, member: &str, sphere: &str, room: &str) -> DomainResult<bool>;
    /// Full bundle, visible to members only.
    fn fetch_domain_details(&self, requester: &str, name: &str) -> DomainResult<DomainBundle>;
    /// Full bundle with no membership check.
    fn admin_fetch_domain_details(&self, name: &str) -> DomainResult<DomainBundle>;
    /// Security and rating of the domain owning `room` in `sphere`.
    fn get_domain_security(&self, room: &str, sphere: &str) -> DomainResult<DomainSecurity>;
}

/// SQLite-backed domain store.
pub struct SqliteDomainStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDomainStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn resolve_domain_id(&self, owner: &str, name: &str) -> DomainResult<DomainId> {
        self.conn
            .query_row(
                "SELECT idDomains FROM domains WHERE owner = ?1 AND name = ?2;",
                params![owner, name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DomainError::NotFound {
                name: name.to_string(),
            })
    }
}

impl DomainStore for SqliteDomainStore<'_> {
    fn claim_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<DomainId> {
        ensure_wire_safe("owner", owner)?;
        ensure_wire_safe("sphere", sphere)?;
        ensure_wire_safe("domain name", name)?;
        ensure_wire_safe("room", room)?;

        let savepoint = ScopedSavepoint::open(self.conn, "claim_domain")?;
        let conn = savepoint.conn();

        if domain_name_taken(conn, name, owner, sphere)? {
            return Err(DomainError::NameCollision {
                name: name.to_string(),
            });
        }
        let inserted = conn.execute(
            "INSERT INTO domains (name, sphere, owner) VALUES (?1, ?2, ?3);",
            params![name, sphere, owner],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(DomainError::NameCollision {
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }
        let domain_id = conn.last_insert_rowid();

        insert_room_claim(conn, domain_id, sphere, room)?;

        if let Err(err) = conn.execute(
            "INSERT INTO members (idDomains, member) VALUES (?1, ?2);",
            params![domain_id, owner],
        ) {
            warn!(
                "event=claim_domain module=repo status=error error_code=membership_failed domain_id={} error={}",
                domain_id, err
            );
            return Err(DomainError::MembershipFailure {
                member: owner.to_string(),
                source: err.into(),
            });
        }

        savepoint.release()?;
        Ok(domain_id)
    }

    fn get_domain(&self, owner: &str, name: &str) -> DomainResult<Option<Domain>> {
        let domain = self
            .conn
            .query_row(
                &format!("{DOMAIN_SELECT_SQL} WHERE d.owner = ?1 AND d.name = ?2;"),
                params![owner, name],
                parse_domain_row,
            )
            .optional()?;
        Ok(domain)
    }

    fn add_room_to_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<()> {
        ensure_wire_safe("sphere", sphere)?;
        ensure_wire_safe("room", room)?;
        let domain_id = self.resolve_domain_id(owner, name)?;
        insert_room_claim(self.conn, domain_id, sphere, room)
    }

    fn remove_room_from_domain(
        &self,
        owner: &str,
        sphere: &str,
        name: &str,
        room: &str,
    ) -> DomainResult<usize> {
        let domain_id = self.resolve_domain_id(owner, name)?;
        let removed = self.conn.execute(
            "DELETE FROM rooms WHERE idDomains = ?1 AND sphere = ?2 AND room = ?3;",
            params![domain_id, sphere, room],
        )?;
        Ok(removed)
    }

    fn add_members(&self, owner: &str, name: &str, members: &[String]) -> DomainResult<usize> {
        for member in members {
            ensure_wire_safe("member", member)?;
        }
        let domain_id = self.resolve_domain_id(owner, name)?;
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO members (idDomains, member) VALUES (?1, ?2);")?;
        let mut added = 0;
        for member in members {
            added += stmt.execute(params![domain_id, member])?;
        }
        Ok(added)
    }

    fn remove_members(
        &self,
        owner: &str,
        name: &str,
        members: &[String],
    ) -> DomainResult<usize> {
        let domain_id = self.resolve_domain_id(owner, name)?;
        let mut stmt = self
            .conn
            .prepare("DELETE FROM members WHERE idDomains = ?1 AND member = ?2;")?;
        let mut removed = 0;
        for member in members {
            removed += stmt.execute(params![domain_id, member])?;
        }
        Ok(removed)
    }

    fn set_detail(&self, owner: &str, name: &str, key: &str, value: &str) -> DomainResult<()> {
        let domain_id = self.resolve_domain_id(owner, name)?;
        upsert_detail(self.conn, domain_id, key, value)
    }

    fn set_details(&self, owner: &str, name: &str, tokens: &[String]) -> DomainResult<usize> {
        if tokens.len() % 2 != 0 {
            return Err(DomainError::InvalidDetailPairs(tokens.len()));
        }
        let domain_id = self.resolve_domain_id(owner, name)?;

        let savepoint = ScopedSavepoint::open(self.conn, "set_details")?;
        for pair in tokens.chunks_exact(2) {
            upsert_detail(savepoint.conn(), domain_id, &pair[0], &pair[1])?;
        }
        savepoint.release()?;
        Ok(tokens.len() / 2)
    }

    fn revoke_domain(&self, owner: &str, name: &str) -> DomainResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM domains WHERE owner = ?1 AND name = ?2;",
            params![owner, name],
        )?;
        if removed == 0 {
            return Err(DomainError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn transfer_domain(
        &self,
        old_owner: &str,
        new_owner: &str,
        name: &str,
    ) -> DomainResult<()> {
        ensure_wire_safe("owner", new_owner)?;
        let savepoint = ScopedSavepoint::open(self.conn, "transfer_domain")?;
        let conn = savepoint.conn();

        let updated = conn.execute(
            "UPDATE domains SET owner = ?1 WHERE name = ?2 AND owner = ?3;",
            params![new_owner, name, old_owner],
        );
        let changed = match updated {
            Ok(changed) => changed,
            Err(err) if is_constraint_violation(&err) => {
                return Err(DomainError::NameCollision {
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        if changed == 0 {
            return Err(DomainError::NotFound {
                name: name.to_string(),
            });
        }

        if let Err(err) = conn.execute(
            "INSERT OR IGNORE INTO members (idDomains, member)
             SELECT idDomains, ?1 FROM domains WHERE name = ?2 AND owner = ?1;",
            params![new_owner, name],
        ) {
            warn!(
                "event=transfer_domain module=repo status=error error_code=membership_failed error={}",
                err
            );
            return Err(DomainError::MembershipFailure {
                member: new_owner.to_string(),
                source: err.into(),
            });
        }

        savepoint.release()?;
        Ok(())
    }

    fn leave_domain(&self, member: &str, name: &str) -> DomainResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM members
             WHERE member = ?1
               AND idDomains IN (SELECT idDomains FROM domains WHERE name = ?2);",
            params![member, name],
        )?;
        if removed == 0 {
            return Err(DomainError::NotMember {
                member: member.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_membership(&self, member: &str, sphere: &str, room: &str) -> DomainResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM domains d
                JOIN rooms r ON r.idDomains = d.idDomains
                JOIN members m ON m.idDomains = d.idDomains
                WHERE d.sphere = ?2
                  AND r.sphere = ?2
                  AND r.room = ?3
                  AND m.member = ?1
            );",
            params![member, sphere, room],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn fetch_domain_details(&self, requester: &str, name: &str) -> DomainResult<DomainBundle> {
        let domain = self
            .conn
            .query_row(
                &format!(
                    "{DOMAIN_SELECT_SQL}
                     JOIN members m ON m.idDomains = d.idDomains
                     WHERE d.name = ?1 AND m.member = ?2
                     ORDER BY d.idDomains ASC
                     LIMIT 1;"
                ),
                params![name, requester],
                parse_domain_row,
            )
            .optional()?
            .ok_or_else(|| DomainError::NotMember {
                member: requester.to_string(),
                name: name.to_string(),
            })?;
        load_bundle(self.conn, domain)
    }

    fn admin_fetch_domain_details(&self, name: &str) -> DomainResult<DomainBundle> {
        let domain = self
            .conn
            .query_row(
                &format!("{DOMAIN_SELECT_SQL} WHERE d.name = ?1 ORDER BY d.idDomains ASC LIMIT 1;"),
                [name],
                parse_domain_row,
            )
            .optional()?
            .ok_or_else(|| DomainError::NotFound {
                name: name.to_string(),
            })?;
        load_bundle(self.conn, domain)
    }

    fn get_domain_security(&self, room: &str, sphere: &str) -> DomainResult<DomainSecurity> {
        let mut stmt = self.conn.prepare(
            "SELECT dt.key, dt.value
             FROM details dt
             JOIN rooms r ON r.idDomains = dt.idDomains
             WHERE r.room = ?1
               AND r.sphere = ?2
               AND dt.key IN (?3, ?4);",
        )?;
        let mut rows = stmt.query(params![room, sphere, SECURITY_DETAIL_KEY, RATING_DETAIL_KEY])?;

        let mut security = DomainSecurity::default();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            // Rows written before integer validation may hold anything; read them as unset.
            let Ok(parsed) = value.trim().parse::<i64>() else {
                warn!(
                    "event=domain_security module=repo status=degraded error_code=non_numeric_detail key={}",
                    key
                );
                continue;
            };
            if key == SECURITY_DETAIL_KEY {
                security.security = parsed;
            } else {
                security.rating = parsed;
            }
        }
        Ok(security)
    }
}

fn ensure_wire_safe(field: &'static str, value: &str) -> DomainResult<()> {
    match find_wire_delimiter(value) {
        Some(_) => Err(DomainError::ReservedCharacter {
            field,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

fn domain_name_taken(
    conn: &Connection,
    name: &str,
    owner: &str,
    sphere: &str,
) -> DomainResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM domains WHERE name = ?1 AND (owner = ?2 OR sphere = ?3)
        );",
        params![name, owner, sphere],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn insert_room_claim(
    conn: &Connection,
    domain_id: DomainId,
    sphere: &str,
    room: &str,
) -> DomainResult<()> {
    let collision = || DomainError::RoomCollision {
        sphere: sphere.to_string(),
        room: room.to_string(),
    };

    let claimed: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM rooms WHERE sphere = ?1 AND room = ?2);",
        params![sphere, room],
        |row| row.get(0),
    )?;
    if claimed == 1 {
        return Err(collision());
    }

    match conn.execute(
        "INSERT INTO rooms (idDomains, sphere, room) VALUES (?1, ?2, ?3);",
        params![domain_id, sphere, room],
    ) {
        Ok(_) => Ok(()),
        Err(err) if is_constraint_violation(&err) => Err(collision()),
        Err(err) => Err(err.into()),
    }
}

fn upsert_detail(conn: &Connection, domain_id: DomainId, key: &str, value: &str) -> DomainResult<()> {
    let normalized = normalize_detail_key(key);
    ensure_wire_safe("detail key", &normalized)?;
    ensure_wire_safe("detail value", value)?;
    if normalized.is_empty() || normalized.contains(DETAIL_PAIR_SEP) {
        return Err(DomainError::InvalidDetailKey(key.to_string()));
    }
    if (normalized == SECURITY_DETAIL_KEY || normalized == RATING_DETAIL_KEY)
        && value.trim().parse::<i64>().is_err()
    {
        return Err(DomainError::InvalidDetailValue {
            key: normalized,
            value: value.to_string(),
        });
    }
    conn.execute(
        "INSERT INTO details (idDomains, key, value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(idDomains, key) DO UPDATE SET value = excluded.value;",
        params![domain_id, normalized, value],
    )?;
    Ok(())
}

fn load_bundle(conn: &Connection, domain: Domain) -> DomainResult<DomainBundle> {
    let members = query_strings(
        conn,
        "SELECT member FROM members WHERE idDomains = ?1 ORDER BY rowid ASC;",
        domain.id,
    )?;
    let rooms = query_strings(
        conn,
        "SELECT room FROM rooms WHERE idDomains = ?1 ORDER BY rowid ASC;",
        domain.id,
    )?;

    let mut stmt =
        conn.prepare("SELECT key, value FROM details WHERE idDomains = ?1 ORDER BY key ASC;")?;
    let mut rows = stmt.query([domain.id])?;
    let mut details = Vec::new();
    while let Some(row) = rows.next()? {
        details.push(DomainDetail {
            key: row.get(0)?,
            value: row.get(1)?,
        });
    }

    Ok(DomainBundle {
        domain,
        members,
        rooms,
        details,
    })
}

fn query_strings(conn: &Connection, sql: &str, domain_id: DomainId) -> DomainResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([domain_id])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get(0)?);
    }
    Ok(values)
}

fn parse_domain_row(row: &Row<'_>) -> rusqlite::Result<Domain> {
    Ok(Domain {
        id: row.get("idDomains")?,
        name: row.get("name")?,
        sphere: row.get("sphere")?,
        owner: row.get("owner")?,
    })
}
