//! Resolved relationship edges
//!
//! A [`RelationshipDescriptor`] only names things. Resolving it against a
//! registry picks the target model, fills in conventional key columns where
//! the schema left them out, selects the join strategy and finds the slot on
//! the target that receives back-references.

use crate::error::ModelResult;
use crate::model::Model;
use crate::naming;
use crate::registry::Registry;
use crate::schema::{Cardinality, KeyLocation, RelationshipDescriptor};

/// Join strategy of an edge.
///
/// `source_column` is always the column on the source row whose value
/// correlates the source with related rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Foreign key on the source row (`source_column`) pointing at `target_column`
    BelongsTo {
        source_column: String,
        target_column: String,
    },
    /// Foreign key on the target row (`target_column`) pointing at `source_column`, one result
    HasOne {
        source_column: String,
        target_column: String,
    },
    /// Foreign key on the target row (`target_column`) pointing at `source_column`
    HasMany {
        source_column: String,
        target_column: String,
    },
    /// Join table holding (`join_source_column`, `join_target_column`) pairs
    Through {
        join_table: String,
        source_column: String,
        join_source_column: String,
        join_target_column: String,
        target_column: String,
    },
}

impl JoinStrategy {
    /// Column on the source row used for correlation
    pub fn source_column(&self) -> &str {
        match self {
            JoinStrategy::BelongsTo { source_column, .. }
            | JoinStrategy::HasOne { source_column, .. }
            | JoinStrategy::HasMany { source_column, .. }
            | JoinStrategy::Through { source_column, .. } => source_column,
        }
    }

    /// Short name of the strategy, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            JoinStrategy::BelongsTo { .. } => "belongs_to",
            JoinStrategy::HasOne { .. } => "has_one",
            JoinStrategy::HasMany { .. } => "has_many",
            JoinStrategy::Through { .. } => "through",
        }
    }

    /// Check whether `other`, declared on the target model, is the mirror image of this edge
    fn mirrors(&self, other: &JoinStrategy) -> bool {
        match (self, other) {
            (
                JoinStrategy::BelongsTo {
                    source_column: fk,
                    target_column: key,
                },
                JoinStrategy::HasOne {
                    source_column: other_key,
                    target_column: other_fk,
                }
                | JoinStrategy::HasMany {
                    source_column: other_key,
                    target_column: other_fk,
                },
            ) => fk == other_fk && key == other_key,
            (
                JoinStrategy::HasOne {
                    source_column: key,
                    target_column: fk,
                }
                | JoinStrategy::HasMany {
                    source_column: key,
                    target_column: fk,
                },
                JoinStrategy::BelongsTo {
                    source_column: other_fk,
                    target_column: other_key,
                },
            ) => fk == other_fk && key == other_key,
            (
                JoinStrategy::Through {
                    join_table,
                    join_source_column,
                    join_target_column,
                    ..
                },
                JoinStrategy::Through {
                    join_table: other_table,
                    join_source_column: other_source,
                    join_target_column: other_target,
                    ..
                },
            ) => {
                join_table == other_table
                    && join_source_column == other_target
                    && join_target_column == other_source
            }
            _ => false,
        }
    }
}

/// Slot on the target model that receives back-references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseSlot {
    pub name: String,
    pub cardinality: Cardinality,
    /// `false` when the slot is not declared in the target schema
    pub declared: bool,
}

/// A relationship resolved against a registry
#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    /// Relationship attribute name on the source model
    pub name: String,
    pub source: Model,
    pub target: Model,
    pub cardinality: Cardinality,
    pub strategy: JoinStrategy,
    pub inverse: Option<InverseSlot>,
}

impl ResolvedEdge {
    /// Resolve `relation` on `source`, including its inverse slot
    pub(crate) fn resolve(registry: &Registry, source: &Model, relation: &str) -> ModelResult<Self> {
        let (target, cardinality, strategy) = resolve_strategy(registry, source, relation)?;
        let inverse = find_inverse(registry, source, relation, &target, &strategy)?;

        tracing::debug!(
            model = %source.name(),
            relation = %relation,
            target = %target.name(),
            strategy = strategy.kind(),
            inverse = ?inverse.as_ref().map(|slot| slot.name.as_str()),
            "resolved relationship"
        );

        Ok(Self {
            name: relation.to_string(),
            source: source.clone(),
            target,
            cardinality,
            strategy,
            inverse,
        })
    }
}

fn target_name<'a>(relation: &'a str, descriptor: &'a RelationshipDescriptor) -> &'a str {
    descriptor.target.as_deref().unwrap_or(relation)
}

/// Pick the target model and join strategy for a relationship, without inverse lookup
fn resolve_strategy(
    registry: &Registry,
    source: &Model,
    relation: &str,
) -> ModelResult<(Model, Cardinality, JoinStrategy)> {
    let descriptor = source.schema().relationship(source.name(), relation)?;
    let target = registry.resolve(target_name(relation, descriptor))?;

    let local = descriptor.local_field.clone();
    let foreign = descriptor.foreign_field.clone();

    let strategy = match (descriptor.cardinality, descriptor.key_location, &descriptor.through) {
        (Cardinality::Many, _, Some(join_table)) => JoinStrategy::Through {
            join_table: join_table.clone(),
            source_column: source.primary_key().to_string(),
            join_source_column: local.unwrap_or_else(|| naming::foreign_key(source.name())),
            join_target_column: foreign.unwrap_or_else(|| naming::foreign_key(target.name())),
            target_column: target.primary_key().to_string(),
        },
        (Cardinality::One, KeyLocation::Source, _) => JoinStrategy::BelongsTo {
            source_column: local.unwrap_or_else(|| naming::foreign_key(relation)),
            target_column: foreign.unwrap_or_else(|| target.primary_key().to_string()),
        },
        (Cardinality::One, KeyLocation::Target, _) => JoinStrategy::HasOne {
            source_column: local.unwrap_or_else(|| source.primary_key().to_string()),
            target_column: foreign.unwrap_or_else(|| naming::foreign_key(source.name())),
        },
        (Cardinality::Many, _, None) => JoinStrategy::HasMany {
            source_column: local.unwrap_or_else(|| source.primary_key().to_string()),
            target_column: foreign.unwrap_or_else(|| naming::foreign_key(source.name())),
        },
    };

    Ok((target, descriptor.cardinality, strategy))
}

/// Find the declared inverse of an edge, or derive the implicit one
fn find_inverse(
    registry: &Registry,
    source: &Model,
    relation: &str,
    target: &Model,
    strategy: &JoinStrategy,
) -> ModelResult<Option<InverseSlot>> {
    for (candidate, descriptor) in target.schema().relationships() {
        if Model::ptr_eq(source, target) && candidate == relation {
            continue;
        }
        let points_back = registry
            .lookup(target_name(candidate, descriptor))
            .is_some_and(|model| Model::ptr_eq(&model, source));
        if !points_back {
            continue;
        }

        let (_, cardinality, candidate_strategy) = resolve_strategy(registry, target, candidate)?;
        if strategy.mirrors(&candidate_strategy) {
            return Ok(Some(InverseSlot {
                name: candidate.to_string(),
                cardinality,
                declared: true,
            }));
        }
    }

    let (name, cardinality) = match strategy {
        JoinStrategy::BelongsTo { .. } | JoinStrategy::Through { .. } => {
            (naming::pluralize(source.name()), Cardinality::Many)
        }
        JoinStrategy::HasOne { .. } | JoinStrategy::HasMany { .. } => {
            (source.name().to_string(), Cardinality::One)
        }
    };

    // An implicit slot never shadows something the target declares.
    if target.schema().get(&name).is_some() {
        return Ok(None);
    }
    Ok(Some(InverseSlot {
        name,
        cardinality,
        declared: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn belongs_to(fk: &str) -> JoinStrategy {
        JoinStrategy::BelongsTo {
            source_column: fk.to_string(),
            target_column: "id".to_string(),
        }
    }

    fn has_many(fk: &str) -> JoinStrategy {
        JoinStrategy::HasMany {
            source_column: "id".to_string(),
            target_column: fk.to_string(),
        }
    }

    fn through(table: &str, source: &str, target: &str) -> JoinStrategy {
        JoinStrategy::Through {
            join_table: table.to_string(),
            source_column: "id".to_string(),
            join_source_column: source.to_string(),
            join_target_column: target.to_string(),
            target_column: "id".to_string(),
        }
    }

    #[test]
    fn test_mirror_detection() {
        assert!(belongs_to("teacherId").mirrors(&has_many("teacherId")));
        assert!(has_many("teacherId").mirrors(&belongs_to("teacherId")));
        assert!(!belongs_to("mentorId").mirrors(&has_many("teacherId")));
        assert!(!has_many("teacherId").mirrors(&has_many("teacherId")));

        assert!(through("enrollments", "student", "course")
            .mirrors(&through("enrollments", "course", "student")));
        assert!(!through("enrollments", "student", "course")
            .mirrors(&through("waitlist", "course", "student")));
    }

    #[test]
    fn test_source_column() {
        assert_eq!(belongs_to("principalId").source_column(), "principalId");
        assert_eq!(has_many("principalId").source_column(), "id");
        assert_eq!(through("enrollments", "a", "b").kind(), "through");
    }
}
