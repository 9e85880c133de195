//! Shared school fixture: principals, teachers, students and courses

#![allow(dead_code)]

use std::sync::Arc;

use elif_relations::{
    AttributeDescriptor, LoaderConfig, MemoryExecutor, Model, Registry, RelationshipDescriptor,
    Schema,
};
use serde_json::json;

pub struct School {
    pub registry: Registry,
    pub executor: Arc<MemoryExecutor>,
    pub principal: Model,
    pub teacher: Model,
    pub student: Model,
    pub course: Model,
}

pub fn seeded_executor() -> MemoryExecutor {
    MemoryExecutor::new()
        .with_rows(
            "principals",
            vec![
                json!({"id": 1, "name": "Skinner"}),
                json!({"id": 2, "name": "Chalmers"}),
            ],
        )
        .with_rows(
            "teachers",
            vec![
                json!({"id": 1, "name": "Krabappel", "principalId": 1}),
                json!({"id": 2, "name": "Hoover", "principalId": 1}),
                json!({"id": 3, "name": "Largo", "principalId": null}),
            ],
        )
        .with_rows(
            "students",
            vec![
                json!({"id": 1, "name": "Bart", "teacherId": 1}),
                json!({"id": 2, "name": "Lisa", "teacherId": 2}),
                json!({"id": 3, "name": "Milhouse", "teacherId": 1}),
                json!({"id": 4, "name": "Nelson", "teacherId": null}),
            ],
        )
        .with_rows(
            "courses",
            vec![
                json!({"id": 1, "title": "Math"}),
                json!({"id": 2, "title": "Music"}),
            ],
        )
        .with_rows(
            "enrollments",
            vec![
                json!({"studentId": 1, "courseId": 1}),
                json!({"studentId": 1, "courseId": 2}),
                json!({"studentId": 2, "courseId": 1}),
            ],
        )
}

pub fn school() -> School {
    school_with_config(LoaderConfig::default())
}

pub fn school_with_config(config: LoaderConfig) -> School {
    let executor = Arc::new(seeded_executor());
    let registry = Registry::with_config(executor.clone(), config).unwrap();

    let principal = Model::new(
        "principal",
        Schema::define([
            ("name", AttributeDescriptor::from(AttributeDescriptor::string().required())),
            ("teachers", RelationshipDescriptor::has_many().into()),
        ])
        .unwrap(),
    );
    let teacher = Model::new(
        "teacher",
        Schema::define([
            ("name", AttributeDescriptor::from(AttributeDescriptor::string().required())),
            ("principal", RelationshipDescriptor::belongs_to().into()),
            ("students", RelationshipDescriptor::has_many().into()),
        ])
        .unwrap(),
    );
    let student = Model::new(
        "student",
        Schema::define([
            ("name", AttributeDescriptor::from(AttributeDescriptor::string().required())),
            ("teacher", RelationshipDescriptor::belongs_to().into()),
            ("courses", RelationshipDescriptor::has_many().through("enrollments").into()),
        ])
        .unwrap(),
    );
    let course = Model::new(
        "course",
        Schema::define([
            ("title", AttributeDescriptor::from(AttributeDescriptor::string())),
            ("students", RelationshipDescriptor::has_many().through("enrollments").into()),
        ])
        .unwrap(),
    );

    for model in [&principal, &teacher, &student, &course] {
        registry.attach(model).unwrap();
    }

    School {
        registry,
        executor,
        principal,
        teacher,
        student,
        course,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("elif_relations=debug")
        .with_test_writer()
        .try_init();
}
