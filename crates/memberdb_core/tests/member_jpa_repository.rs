use memberdb_core::db::open_db_in_memory;
use memberdb_core::{Member, MemberJpaRepository, RepoError, Session};
use uuid::Uuid;

#[test]
fn saved_member_is_found_again() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    let member = Member::new("memberA");
    let saved = repo.save(&member).unwrap();

    let found = repo.find(saved.id).unwrap();
    assert_eq!(found.id, member.id);
    assert_eq!(found, member);
}

#[test]
fn find_reports_missing_member() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    let missing = Uuid::new_v4();
    assert!(matches!(
        repo.find(missing).unwrap_err(),
        RepoError::NotFound { id, .. } if id == missing
    ));
    assert_eq!(repo.find_by_id(missing).unwrap(), None);
}

#[test]
fn basic_crud_round() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    let member1 = repo.save(&Member::new("member1")).unwrap();
    let member2 = repo.save(&Member::new("member2")).unwrap();

    assert_eq!(repo.find_by_id(member1.id).unwrap(), Some(member1.clone()));
    assert_eq!(repo.find_by_id(member2.id).unwrap(), Some(member2.clone()));
    assert_eq!(repo.find_all().unwrap().len(), 2);
    assert_eq!(repo.count().unwrap(), 2);

    repo.delete(&member1).unwrap();
    repo.delete(&member2).unwrap();
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn find_by_username_and_age_greater_than() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    repo.save(&Member::with_age("AAA", 10)).unwrap();
    repo.save(&Member::with_age("AAA", 20)).unwrap();

    let result = repo.find_by_username_and_age_greater_than("AAA", 15).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username, "AAA");
    assert_eq!(result[0].age, 20);
}

#[test]
fn named_query_returns_first_saved_member_first() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    let m1 = repo.save(&Member::with_age("AAA", 10)).unwrap();
    repo.save(&Member::with_age("AAA", 20)).unwrap();

    let result = repo.find_by_username("AAA").unwrap();
    assert_eq!(result[0], m1);
}

#[test]
fn paging_with_offset_and_limit() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    for index in 1..=5 {
        repo.save(&Member::with_age(format!("member{index}"), 10))
            .unwrap();
    }
    repo.save(&Member::with_age("member9", 11)).unwrap();

    let members = repo.find_by_page(10, 0, 3).unwrap();
    let names: Vec<&str> = members.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["member5", "member4", "member3"]);
    assert_eq!(repo.total_count(10).unwrap(), 5);

    let rest = repo.find_by_page(10, 3, 3).unwrap();
    assert_eq!(rest.len(), 2);
}

#[test]
fn bulk_age_plus_counts_updated_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    for (username, age) in [
        ("member1", 10),
        ("member2", 19),
        ("member3", 20),
        ("member4", 21),
        ("member5", 40),
    ] {
        repo.save(&Member::with_age(username, age)).unwrap();
    }

    assert_eq!(repo.bulk_age_plus(20).unwrap(), 3);
    assert_eq!(session.managed_count(), 5);
}

#[test]
fn bulk_age_plus_leaves_maximum_age_loadable() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = MemberJpaRepository::new(&session);

    repo.save(&Member::with_age("oldest", i32::MAX)).unwrap();

    assert_eq!(repo.bulk_age_plus(0).unwrap(), 0);
    session.clear();
    assert_eq!(repo.find_all().unwrap()[0].age, i32::MAX);
}
