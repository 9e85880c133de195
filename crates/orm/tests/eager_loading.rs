mod common;

use common::{init_tracing, school, school_with_config};
use elif_relations::{
    AttributeDescriptor, Filter, FindOptions, LoaderConfig, MemoryExecutor, Model, ModelError,
    Query, Registry, RelationshipDescriptor, Related, Schema,
};
use serde_json::json;
use std::sync::Arc;

fn names<'a>(items: impl IntoIterator<Item = elif_relations::InstanceRef<'a>>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| {
            item.get("name")
                .or_else(|| item.get("title"))
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn test_shared_target_is_one_instance() {
    init_tracing();
    let school = school();

    let students = school
        .student
        .find(Query::new().order_by("id"), FindOptions::with_related(["teacher"]))
        .await
        .unwrap();

    let bart = students.get(0).unwrap();
    let milhouse = students.get(2).unwrap();
    let bart_teacher = bart.one("teacher").unwrap();
    assert_eq!(bart_teacher, milhouse.one("teacher").unwrap());
    assert_eq!(bart_teacher.get("name"), Some(&json!("Krabappel")));

    // Nelson has no teacher: the slot is loaded and empty
    let nelson = students.get(3).unwrap();
    assert!(nelson.is_loaded("teacher"));
    assert_eq!(nelson.related("teacher"), Some(&Related::One(None)));

    // 4 students + 2 distinct teachers
    assert_eq!(students.graph().len(), 6);
    assert_eq!(school.executor.query_count().await, 2);
}

#[tokio::test]
async fn test_relationships_are_bidirectional() {
    let school = school();

    let teachers = school
        .teacher
        .find(Filter::eq("id", 1), FindOptions::with_related(["students"]))
        .await
        .unwrap();
    let krabappel = teachers.first().unwrap();

    let students = krabappel.many("students");
    assert_eq!(names(students.clone()), vec!["Bart", "Milhouse"]);
    for student in students {
        assert_eq!(student.one("teacher").unwrap(), krabappel);
    }

    let students = school
        .student
        .find(Query::new().where_eq("teacherId", 1), FindOptions::with_related(["teacher"]))
        .await
        .unwrap();
    let teacher = students.first().unwrap().one("teacher").unwrap();
    assert_eq!(names(teacher.many("students")), vec!["Bart", "Milhouse"]);
}

#[tokio::test]
async fn test_empty_result_issues_no_relationship_queries() {
    let school = school();

    let principals = school
        .principal
        .find(
            Filter::eq("id", 99),
            FindOptions::with_related(["teachers", "teachers.students.courses"]),
        )
        .await
        .unwrap();

    assert!(principals.is_empty());
    assert_eq!(principals.to_json(), json!([]));
    assert_eq!(school.executor.query_count().await, 1);
}

#[tokio::test]
async fn test_sources_without_matches_get_empty_slots() {
    let school = school();

    let principal = school
        .principal
        .find_or_fail(2, FindOptions::with_related(["teachers"]))
        .await
        .unwrap();
    assert_eq!(principal.instance().related("teachers"), Some(&Related::Many(Vec::new())));
    assert_eq!(
        principal.to_json(),
        json!({"id": 2, "name": "Chalmers", "teachers": []})
    );

    let largo = school
        .teacher
        .find_or_fail(3, FindOptions::with_related(["principal"]))
        .await
        .unwrap();
    assert_eq!(
        largo.to_json(),
        json!({"id": 3, "name": "Largo", "principalId": null, "principal": null})
    );
}

#[tokio::test]
async fn test_invalid_paths_fail_before_querying() {
    let school = school();

    let err = school
        .principal
        .find(Query::new(), FindOptions::with_related(["bogus"]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No such attribute 'bogus' on model 'principal'");

    let err = school
        .principal
        .find(Query::new(), FindOptions::with_related(["teachers.students.bogus"]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No such attribute 'bogus' on model 'student'");

    let err = school
        .teacher
        .find(Query::new(), FindOptions::with_related(["name"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::NoSuchRelationship { .. }));

    assert_eq!(school.executor.query_count().await, 0);
}

#[tokio::test]
async fn test_through_relationship() {
    let school = school();

    let students = school
        .student
        .find(Query::new().order_by("id"), FindOptions::with_related(["courses"]))
        .await
        .unwrap();

    let courses: Vec<Vec<String>> = students
        .iter()
        .map(|student| names(student.many("courses")))
        .collect();
    assert_eq!(
        courses,
        vec![vec!["Math", "Music"], vec!["Math"], vec![], vec![]]
    );

    // Math is shared by Bart and Lisa, and points back at both
    let bart = students.get(0).unwrap();
    let lisa = students.get(1).unwrap();
    let math = bart.many("courses")[0];
    assert_eq!(math, lisa.many("courses")[0]);
    assert_eq!(math.many("students"), vec![bart, lisa]);

    assert_eq!(school.executor.query_count_for("enrollments").await, 1);
    assert_eq!(school.executor.query_count_for("courses").await, 1);
}

#[tokio::test]
async fn test_through_relationship_from_the_other_side() {
    let school = school();

    let courses = school
        .course
        .find(Query::new().order_by("id"), FindOptions::with_related(["students"]))
        .await
        .unwrap();

    let math = courses.get(0).unwrap();
    let music = courses.get(1).unwrap();
    assert_eq!(names(math.many("students")), vec!["Bart", "Lisa"]);
    assert_eq!(names(music.many("students")), vec!["Bart"]);

    let bart = music.many("students")[0];
    assert_eq!(bart, math.many("students")[0]);
    assert_eq!(bart.many("courses"), vec![math, music]);
}

#[tokio::test]
async fn test_nested_paths_wire_every_level() {
    let school = school();

    let principal = school
        .principal
        .find_or_fail(1, FindOptions::with_related(["teachers.students"]))
        .await
        .unwrap();
    let skinner = principal.instance();

    let teachers = skinner.many("teachers");
    assert_eq!(names(teachers.clone()), vec!["Krabappel", "Hoover"]);
    for teacher in &teachers {
        assert_eq!(teacher.one("principal").unwrap(), skinner);
        for student in teacher.many("students") {
            assert_eq!(student.one("teacher").unwrap(), *teacher);
        }
    }
    assert_eq!(names(teachers[0].many("students")), vec!["Bart", "Milhouse"]);
    assert_eq!(names(teachers[1].many("students")), vec!["Lisa"]);

    // principals, teachers, students
    assert_eq!(school.executor.query_count().await, 3);
}

#[tokio::test]
async fn test_serialization_omits_back_references() {
    let school = school();

    let principal = school
        .principal
        .find_or_fail(1, FindOptions::with_related(["teachers.students"]))
        .await
        .unwrap();

    let expected = json!({
        "id": 1,
        "name": "Skinner",
        "teachers": [
            {
                "id": 1,
                "name": "Krabappel",
                "principalId": 1,
                "students": [
                    {"id": 1, "name": "Bart", "teacherId": 1},
                    {"id": 3, "name": "Milhouse", "teacherId": 1}
                ]
            },
            {
                "id": 2,
                "name": "Hoover",
                "principalId": 1,
                "students": [{"id": 2, "name": "Lisa", "teacherId": 2}]
            }
        ]
    });
    assert_eq!(principal.to_json(), expected);
    assert_eq!(serde_json::to_value(&principal).unwrap(), expected);
}

#[tokio::test]
async fn test_serialization_terminates_on_cycles() {
    let school = school();

    let students = school
        .student
        .find(Filter::eq("id", 1), FindOptions::with_related(["teacher", "courses"]))
        .await
        .unwrap();

    let json = students.to_json();
    let bart = &json[0];
    assert_eq!(bart["teacher"]["name"], json!("Krabappel"));
    // Bart is on the path, so the teacher's back-reference list skips him
    assert_eq!(bart["teacher"]["students"], json!([]));
    assert_eq!(bart["courses"][0]["title"], json!("Math"));
    assert_eq!(bart["courses"][0]["students"], json!([]));
}

#[tokio::test]
async fn test_query_failures_propagate() {
    let school = school();
    school.executor.fail_table("students", "connection reset").await;

    let err = school
        .teacher
        .find(Query::new(), FindOptions::with_related(["students"]))
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::QueryFailed("connection reset".to_string()));
}

#[tokio::test]
async fn test_keys_are_batched() {
    let school = school_with_config(LoaderConfig {
        max_batch_size: 2,
        ..LoaderConfig::default()
    });

    let students = school
        .student
        .find(Query::new(), FindOptions::with_related(["teacher", "courses"]))
        .await
        .unwrap();
    assert_eq!(students.len(), 4);

    // Two distinct teacher keys fit one batch
    assert_eq!(school.executor.query_count_for("teachers").await, 1);
    // Four student keys need two join table batches
    assert_eq!(school.executor.query_count_for("enrollments").await, 2);
    assert_eq!(school.executor.query_count_for("courses").await, 1);
}

#[tokio::test]
async fn test_sequential_siblings_load_the_same_graph() {
    let parallel = school();
    let sequential = school_with_config(LoaderConfig {
        parallel_siblings: false,
        ..LoaderConfig::default()
    });
    let options = FindOptions::with_related(["students.courses", "principal"]);

    let a = parallel
        .teacher
        .find(Query::new().order_by("id"), options.clone())
        .await
        .unwrap();
    let b = sequential
        .teacher
        .find(Query::new().order_by("id"), options)
        .await
        .unwrap();

    assert_eq!(a.to_json(), b.to_json());
    assert_eq!(
        parallel.executor.query_count().await,
        sequential.executor.query_count().await
    );
}

#[tokio::test]
async fn test_find_by_id_and_find_or_fail() {
    let school = school();

    let lisa = school
        .student
        .find_by_id(2, FindOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lisa.get("name"), Some(&json!("Lisa")));
    assert!(!lisa.instance().is_loaded("teacher"));

    assert!(school
        .student
        .find_by_id(42, FindOptions::new())
        .await
        .unwrap()
        .is_none());

    let err = school
        .student
        .find_or_fail(42, FindOptions::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::NotFound {
            table: "students".to_string(),
            key: "42".to_string(),
        }
    );
}

#[tokio::test]
async fn test_find_with_closure() {
    let school = school();

    let students = school
        .student
        .find_with(
            |query| query.where_in("id", vec![3, 1]).order_by_desc("name"),
            FindOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(names(students.iter()), vec!["Milhouse", "Bart"]);
}

#[tokio::test]
async fn test_undeclared_inverse_uses_conventional_slot() {
    let executor = MemoryExecutor::new()
        .with_rows("authors", vec![json!({"id": 1, "name": "Ann"})])
        .with_rows(
            "notes",
            vec![
                json!({"id": 1, "authorId": 1}),
                json!({"id": 2, "authorId": 1}),
            ],
        );
    let registry = Registry::new(executor);
    let author = Model::new(
        "author",
        Schema::define([("name", AttributeDescriptor::string())]).unwrap(),
    );
    let note = Model::new(
        "note",
        Schema::define([("author", RelationshipDescriptor::belongs_to())]).unwrap(),
    );
    registry.attach(&author).unwrap();
    registry.attach(&note).unwrap();

    let notes = note
        .find(Query::new(), FindOptions::with_related(["author"]))
        .await
        .unwrap();
    let ann = notes.first().unwrap().one("author").unwrap();
    assert_eq!(ann.many("notes").len(), 2);

    let edge = registry.edge(&note, "author").unwrap();
    let inverse = edge.inverse.as_ref().unwrap();
    assert_eq!(inverse.name, "notes");
    assert!(!inverse.declared);
}

#[tokio::test]
async fn test_model_attached_elsewhere_is_rejected() {
    let school = school();
    let other = Registry::new(MemoryExecutor::new());

    assert_eq!(
        other.attach(&school.teacher).unwrap_err(),
        ModelError::AlreadyAttached("teacher".to_string())
    );
}

struct Authors {
    registry: Registry,
    author: Model,
    profile: Model,
}

fn authors_with_profiles() -> Authors {
    let executor = MemoryExecutor::new()
        .with_rows(
            "authors",
            vec![json!({"id": 1, "name": "Ann"}), json!({"id": 2, "name": "Bo"})],
        )
        .with_rows(
            "profiles",
            vec![
                json!({"id": 10, "authorId": 1, "bio": "first"}),
                json!({"id": 11, "authorId": 1, "bio": "second"}),
            ],
        );
    let registry = Registry::new(executor);
    let author = Model::new(
        "author",
        Schema::define([
            ("name", AttributeDescriptor::from(AttributeDescriptor::string())),
            ("profile", RelationshipDescriptor::has_one().into()),
        ])
        .unwrap(),
    );
    let profile = Model::new(
        "profile",
        Schema::define([
            ("bio", AttributeDescriptor::from(AttributeDescriptor::string())),
            ("author", RelationshipDescriptor::belongs_to().into()),
        ])
        .unwrap(),
    );
    registry.attach(&author).unwrap();
    registry.attach(&profile).unwrap();

    Authors {
        registry,
        author,
        profile,
    }
}

#[tokio::test]
async fn test_has_one_keeps_first_match_and_wires_owner() {
    let fixture = authors_with_profiles();

    let authors = fixture
        .author
        .find(Query::new().order_by("id"), FindOptions::with_related(["profile"]))
        .await
        .unwrap();

    let ann = authors.get(0).unwrap();
    let bio = ann.one("profile").unwrap();
    assert_eq!(bio.get("bio"), Some(&json!("first")));
    assert_eq!(bio.one("author").unwrap(), ann);
    assert_eq!(authors.get(1).unwrap().related("profile"), Some(&Related::One(None)));

    let edge = fixture.registry.edge(&fixture.author, "profile").unwrap();
    assert_eq!(edge.inverse.as_ref().map(|slot| slot.name.as_str()), Some("author"));
}

#[tokio::test]
async fn test_single_back_reference_keeps_first_source() {
    let fixture = authors_with_profiles();

    let profiles = fixture
        .profile
        .find(Query::new().order_by("id"), FindOptions::with_related(["author"]))
        .await
        .unwrap();

    let first = profiles.get(0).unwrap();
    let second = profiles.get(1).unwrap();
    let ann = first.one("author").unwrap();
    assert_eq!(second.one("author").unwrap(), ann);
    // Same profile as loading `author.profile` directly
    assert_eq!(ann.one("profile").unwrap(), first);
    assert_eq!(ann.one("profile").unwrap().get("bio"), Some(&json!("first")));
}

#[tokio::test]
async fn test_unregistered_target_fails_before_querying() {
    let executor = Arc::new(MemoryExecutor::new().with_rows("haunts", vec![json!({"id": 1})]));
    let registry = Registry::shared(executor.clone());
    let haunt = Model::new(
        "haunt",
        Schema::define([("ghost", RelationshipDescriptor::belongs_to())]).unwrap(),
    );
    registry.attach(&haunt).unwrap();

    let err = haunt
        .find(Query::new(), FindOptions::with_related(["ghost"]))
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::NoSuchModel("ghost".to_string()));
    assert_eq!(err.to_string(), "No such model 'ghost'");
    assert_eq!(executor.query_count().await, 0);
}

#[tokio::test]
async fn test_nested_query_failure_aborts_the_call() {
    let school = school();
    school.executor.fail_table("courses", "boom").await;

    let result = school
        .principal
        .find(Query::new(), FindOptions::with_related(["teachers.students.courses"]))
        .await;
    assert_eq!(result.unwrap_err(), ModelError::QueryFailed("boom".to_string()));

    // Every level above the failing one ran
    for table in ["principals", "teachers", "students", "enrollments", "courses"] {
        assert_eq!(school.executor.query_count_for(table).await, 1, "{}", table);
    }
}

#[tokio::test]
async fn test_identity_holds_across_paths() {
    let school = school();

    let students = school
        .student
        .find(
            Query::new().order_by("id"),
            FindOptions::with_related(["teacher.students", "courses.students"]),
        )
        .await
        .unwrap();

    let bart = students.get(0).unwrap();
    let via_teacher = bart.one("teacher").unwrap().many("students")[0];
    let via_course = bart.many("courses")[0].many("students")[0];
    assert_eq!(via_teacher, bart);
    assert_eq!(via_course, bart);
    assert_eq!(via_teacher.id(), via_course.id());

    let lisa = students.get(1).unwrap();
    assert_eq!(lisa.one("teacher").unwrap().many("students"), vec![lisa]);
    assert_eq!(bart.many("courses")[0].many("students"), vec![bart, lisa]);

    // 4 students + 2 teachers + 2 courses, each row once
    assert_eq!(students.graph().len(), 8);
}
