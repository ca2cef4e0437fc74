use mushdomain_core::db::open_db_in_memory;
use mushdomain_core::{DomainError, DomainSecurity, DomainStore, SqliteDomainStore};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn members(list: &[&str]) -> Vec<String> {
    list.iter().map(|value| value.to_string()).collect()
}

#[test]
fn claim_binds_owner_room_and_membership() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);

    let domain_id = store
        .claim_domain("P1", "S1", "North Tower", "R1")
        .unwrap();

    let domain = store.get_domain("P1", "North Tower").unwrap().unwrap();
    assert_eq!(domain.id, domain_id);
    assert_eq!(domain.sphere, "S1");
    assert!(store.check_membership("P1", "S1", "R1").unwrap());

    let bundle = store.fetch_domain_details("P1", "North Tower").unwrap();
    assert_eq!(bundle.members, vec!["P1"]);
    assert_eq!(bundle.rooms, vec!["R1"]);
}

#[test]
fn second_claim_with_same_name_collides_and_creates_nothing() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store
        .claim_domain("P1", "S1", "North Tower", "R2")
        .unwrap_err();
    assert!(matches!(err, DomainError::NameCollision { ref name } if name == "North Tower"));

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM domains;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM rooms WHERE room = 'R2';"), 0);
}

#[test]
fn name_is_unique_per_owner_and_per_sphere() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "Haven", "R1").unwrap();

    let same_owner = store.claim_domain("P1", "S2", "Haven", "R9").unwrap_err();
    assert!(matches!(same_owner, DomainError::NameCollision { .. }));

    let same_sphere = store.claim_domain("P2", "S1", "Haven", "R9").unwrap_err();
    assert!(matches!(same_sphere, DomainError::NameCollision { .. }));

    store.claim_domain("P2", "S2", "Haven", "R9").unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM domains;"), 2);
}

#[test]
fn room_collision_rolls_back_the_domain_row() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store.claim_domain("P2", "S1", "Harbor", "R1").unwrap_err();
    assert!(matches!(
        err,
        DomainError::RoomCollision { ref sphere, ref room } if sphere == "S1" && room == "R1"
    ));

    assert!(store.get_domain("P2", "Harbor").unwrap().is_none());
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM domains;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM members;"), 1);
}

#[test]
fn membership_failure_rolls_back_domain_and_room() {
    let conn = setup();
    conn.execute_batch(
        "CREATE TRIGGER block_members BEFORE INSERT ON members
         BEGIN
             SELECT RAISE(ABORT, 'members are read-only');
         END;",
    )
    .unwrap();
    let store = SqliteDomainStore::new(&conn);

    let err = store.claim_domain("P1", "S1", "North Tower", "R1").unwrap_err();
    assert!(matches!(err, DomainError::MembershipFailure { ref member, .. } if member == "P1"));

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM domains;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM rooms;"), 0);
}

#[test]
fn adding_a_claimed_room_to_another_domain_collides() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();
    store.claim_domain("P2", "S1", "Harbor", "R5").unwrap();

    let err = store
        .add_room_to_domain("P2", "S1", "Harbor", "R1")
        .unwrap_err();
    assert!(matches!(err, DomainError::RoomCollision { .. }));

    // Same room id in another sphere is a different room.
    store.add_room_to_domain("P2", "S2", "Harbor", "R1").unwrap();
}

#[test]
fn add_and_remove_rooms() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    store
        .add_room_to_domain("P1", "S1", "North Tower", "R2")
        .unwrap();
    assert!(store.check_membership("P1", "S1", "R2").unwrap());

    assert_eq!(
        store
            .remove_room_from_domain("P1", "S1", "North Tower", "R2")
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .remove_room_from_domain("P1", "S1", "North Tower", "R2")
            .unwrap(),
        0
    );
    assert!(!store.check_membership("P1", "S1", "R2").unwrap());
}

#[test]
fn operations_on_unknown_domain_report_not_found() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);

    let err = store
        .add_room_to_domain("P1", "S1", "Nowhere", "R1")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert!(matches!(
        store.revoke_domain("P1", "Nowhere").unwrap_err(),
        DomainError::NotFound { .. }
    ));
}

#[test]
fn adding_the_same_member_twice_keeps_one_row() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    let domain_id = store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    assert_eq!(
        store
            .add_members("P1", "North Tower", &members(&["P2", "P3"]))
            .unwrap(),
        2
    );
    assert_eq!(
        store
            .add_members("P1", "North Tower", &members(&["P2", "P1"]))
            .unwrap(),
        0
    );

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM members WHERE idDomains = ?1 AND member = 'P2';",
            [domain_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);

    assert_eq!(
        store
            .remove_members("P1", "North Tower", &members(&["P3", "P9"]))
            .unwrap(),
        1
    );
    let bundle = store.fetch_domain_details("P2", "North Tower").unwrap();
    assert_eq!(bundle.members, vec!["P1", "P2"]);
}

#[test]
fn detail_keys_are_lower_cased_and_upserted() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    store
        .set_detail("P1", "North Tower", "Security", "2")
        .unwrap();
    store
        .set_detail("P1", "North Tower", "SECURITY", "4")
        .unwrap();

    let bundle = store.fetch_domain_details("P1", "North Tower").unwrap();
    assert_eq!(bundle.details.len(), 1);
    assert_eq!(bundle.details[0].key, "security");
    assert_eq!(bundle.details[0].value, "4");

    let err = store.set_detail("P1", "North Tower", "  ", "x").unwrap_err();
    assert!(matches!(err, DomainError::InvalidDetailKey(_)));
}

#[test]
fn set_details_requires_whole_pairs() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let written = store
        .set_details(
            "P1",
            "North Tower",
            &members(&["Rating", "3", "lore", "old stones"]),
        )
        .unwrap();
    assert_eq!(written, 2);

    let err = store
        .set_details("P1", "North Tower", &members(&["rating", "4", "orphan"]))
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidDetailPairs(3)));

    let bundle = store.admin_fetch_domain_details("North Tower").unwrap();
    let keys: Vec<&str> = bundle.details.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, vec!["lore", "rating"]);
    assert_eq!(bundle.details[1].value, "3");
}

#[test]
fn revoke_cascades_to_rooms_members_and_details() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();
    store
        .add_members("P1", "North Tower", &members(&["P2"]))
        .unwrap();
    store
        .set_detail("P1", "North Tower", "security", "1")
        .unwrap();

    store.revoke_domain("P1", "North Tower").unwrap();

    for table in ["domains", "rooms", "members", "details"] {
        assert_eq!(
            count(&conn, &format!("SELECT COUNT(*) FROM {table};")),
            0,
            "{table} not emptied"
        );
    }
    // The room is free to claim again.
    store.claim_domain("P2", "S1", "Harbor", "R1").unwrap();
}

#[test]
fn transfer_changes_owner_and_adds_membership() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    store.transfer_domain("P1", "P2", "North Tower").unwrap();

    assert!(store.get_domain("P1", "North Tower").unwrap().is_none());
    let domain = store.get_domain("P2", "North Tower").unwrap().unwrap();
    assert_eq!(domain.owner, "P2");
    assert!(store.check_membership("P2", "S1", "R1").unwrap());
}

#[test]
fn transfer_of_unknown_domain_is_not_found() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store
        .transfer_domain("P3", "P2", "North Tower")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert_eq!(
        store.get_domain("P1", "North Tower").unwrap().unwrap().owner,
        "P1"
    );
}

#[test]
fn transfer_into_an_owner_name_clash_collides() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "Haven", "R1").unwrap();
    store.claim_domain("P2", "S2", "Haven", "R2").unwrap();

    let err = store.transfer_domain("P1", "P2", "Haven").unwrap_err();
    assert!(matches!(err, DomainError::NameCollision { .. }));
    assert_eq!(store.get_domain("P1", "Haven").unwrap().unwrap().sphere, "S1");
}

#[test]
fn leave_removes_membership_or_reports_not_member() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();
    store
        .add_members("P1", "North Tower", &members(&["P2"]))
        .unwrap();

    store.leave_domain("P2", "North Tower").unwrap();
    assert!(!store.check_membership("P2", "S1", "R1").unwrap());

    let err = store.leave_domain("P2", "North Tower").unwrap_err();
    assert!(matches!(err, DomainError::NotMember { .. }));
}

#[test]
fn check_membership_needs_matching_sphere_room_and_member() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    assert!(store.check_membership("P1", "S1", "R1").unwrap());
    assert!(!store.check_membership("P1", "S2", "R1").unwrap());
    assert!(!store.check_membership("P1", "S1", "R2").unwrap());
    assert!(!store.check_membership("P9", "S1", "R1").unwrap());
}

#[test]
fn details_are_hidden_from_non_members_but_not_from_admins() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store
        .fetch_domain_details("P9", "North Tower")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotMember { .. }));

    let bundle = store.admin_fetch_domain_details("North Tower").unwrap();
    assert_eq!(bundle.domain.owner, "P1");

    assert!(matches!(
        store.admin_fetch_domain_details("Nowhere").unwrap_err(),
        DomainError::NotFound { .. }
    ));
}

#[test]
fn security_defaults_to_zero_for_unset_keys() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    assert_eq!(
        store.get_domain_security("R1", "S1").unwrap(),
        DomainSecurity::default()
    );

    store
        .set_detail("P1", "North Tower", "Security", "3")
        .unwrap();
    assert_eq!(
        store.get_domain_security("R1", "S1").unwrap(),
        DomainSecurity {
            security: 3,
            rating: 0
        }
    );

    store.set_detail("P1", "North Tower", "rating", "2").unwrap();
    let security = store.get_domain_security("R1", "S1").unwrap();
    assert_eq!(security.rating, 2);

    assert_eq!(
        store.get_domain_security("R1", "S2").unwrap(),
        DomainSecurity::default()
    );
}

#[test]
fn security_and_rating_must_be_whole_numbers() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store
        .set_detail("P1", "North Tower", "Security", "high")
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::InvalidDetailValue { ref key, ref value } if key == "security" && value == "high"
    ));
    assert!(matches!(
        store
            .set_detail("P1", "North Tower", "rating", "2.5")
            .unwrap_err(),
        DomainError::InvalidDetailValue { .. }
    ));

    // Other keys stay free-form.
    store.set_detail("P1", "North Tower", "lore", "high").unwrap();
    assert_eq!(
        store.get_domain_security("R1", "S1").unwrap(),
        DomainSecurity::default()
    );
}

#[test]
fn rejected_pair_rolls_back_the_whole_detail_batch() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();

    let err = store
        .set_details(
            "P1",
            "North Tower",
            &members(&["lore", "old", "security", "high"]),
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidDetailValue { .. }));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM details;"), 0);
}

#[test]
fn stored_non_numeric_security_reads_as_unset() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);
    let domain_id = store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();
    conn.execute(
        "INSERT INTO details (idDomains, key, value) VALUES (?1, 'security', 'high'), (?1, 'rating', '2');",
        [domain_id],
    )
    .unwrap();

    assert_eq!(
        store.get_domain_security("R1", "S1").unwrap(),
        DomainSecurity {
            security: 0,
            rating: 2
        }
    );
}

#[test]
fn reply_delimiters_are_refused_on_every_write_path() {
    let conn = setup();
    let store = SqliteDomainStore::new(&conn);

    let err = store
        .claim_domain("P1", "S1", "North~Tower", "R1")
        .unwrap_err();
    assert!(matches!(err, DomainError::ReservedCharacter { field: "domain name", .. }));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM domains;"), 0);

    store.claim_domain("P1", "S1", "North Tower", "R1").unwrap();
    assert!(matches!(
        store
            .add_room_to_domain("P1", "S1", "North Tower", "R2|R3")
            .unwrap_err(),
        DomainError::ReservedCharacter { field: "room", .. }
    ));
    assert!(matches!(
        store
            .add_members("P1", "North Tower", &members(&["P2", "P3*"]))
            .unwrap_err(),
        DomainError::ReservedCharacter { field: "member", .. }
    ));
    assert!(matches!(
        store
            .set_detail("P1", "North Tower", "lore", "built ~ on stones")
            .unwrap_err(),
        DomainError::ReservedCharacter { field: "detail value", .. }
    ));
    assert!(matches!(
        store
            .set_detail("P1", "North Tower", "lore:old", "stones")
            .unwrap_err(),
        DomainError::InvalidDetailKey(_)
    ));
    assert!(matches!(
        store
            .transfer_domain("P1", "P>2", "North Tower")
            .unwrap_err(),
        DomainError::ReservedCharacter { field: "owner", .. }
    ));

    let bundle = store.fetch_domain_details("P1", "North Tower").unwrap();
    assert_eq!(bundle.members, vec!["P1"]);
    assert_eq!(bundle.rooms, vec!["R1"]);
    assert!(bundle.details.is_empty());
}
