//! Built-in relation types for support-desk knowledge bases.
//!
//! | Group        | Types                                          |
//! |--------------|------------------------------------------------|
//! | Sequence     | NEXT_STEP, PREREQUISITE, FOLLOWS               |
//! | Citation     | REFERENCES, CITED_BY                           |
//! | Association  | RELATED_TO, SIMILAR_TO, ALTERNATIVE            |
//! | Organization | PARENT_OF, CHILD_OF, BELONGS_TO                |
//! | Function     | EXPLAINS, IMPLEMENTS, EXTENDS                  |
//! | Resolution   | SOLVES, CAUSES, PREVENTS                       |
//!
//! Enabled with `support_catalog = true` (the default).

use super::RelationTypeSpec;

/// Maximum parents per document.
pub const MAX_PARENTS: usize = 1;
/// Maximum children per document.
pub const MAX_CHILDREN: usize = 100;
/// Maximum prerequisites per document.
pub const MAX_PREREQUISITES: usize = 5;

pub fn support_catalog() -> Vec<RelationTypeSpec> {
    vec![
        // Sequence
        RelationTypeSpec::new("NEXT_STEP")
            .describe("Orders documents into a procedure")
            .require("order")
            .max_out(1)
            .acyclic()
            .incompatible_with("PREREQUISITE"),
        RelationTypeSpec::new("PREREQUISITE")
            .describe("Source must be read before target")
            .require("importance")
            .max_in(MAX_PREREQUISITES)
            .acyclic()
            .transitive(),
        RelationTypeSpec::new("FOLLOWS")
            .describe("Source continues the content of target")
            .acyclic()
            .transitive(),
        // Citation
        RelationTypeSpec::new("REFERENCES")
            .describe("Source cites target")
            .require("section")
            .inverse("CITED_BY"),
        RelationTypeSpec::new("CITED_BY")
            .describe("Source is cited by target")
            .require("section")
            .inverse("REFERENCES"),
        // Association
        RelationTypeSpec::new("RELATED_TO")
            .describe("General association")
            .require("type")
            .symmetric(),
        RelationTypeSpec::new("SIMILAR_TO")
            .describe("Content similarity")
            .require("similarity_score")
            .symmetric(),
        RelationTypeSpec::new("ALTERNATIVE")
            .describe("Documents offer alternative solutions")
            .require("scenario")
            .symmetric(),
        // Organization
        RelationTypeSpec::new("PARENT_OF")
            .describe("Source is the parent of target")
            .max_out(MAX_CHILDREN)
            .max_in(MAX_PARENTS)
            .acyclic()
            .inverse("CHILD_OF")
            .incompatible_with("CHILD_OF"),
        RelationTypeSpec::new("CHILD_OF")
            .describe("Source is a child of target")
            .max_out(MAX_PARENTS)
            .acyclic()
            .inverse("PARENT_OF"),
        RelationTypeSpec::new("BELONGS_TO")
            .describe("Source belongs to the collection or product of target")
            .acyclic()
            .transitive(),
        // Function
        RelationTypeSpec::new("EXPLAINS")
            .describe("Source explains the content of target")
            .require("aspect"),
        RelationTypeSpec::new("IMPLEMENTS")
            .describe("Source implements the feature described by target")
            .require("version"),
        RelationTypeSpec::new("EXTENDS")
            .describe("Source extends target")
            .acyclic()
            .transitive(),
        // Resolution
        RelationTypeSpec::new("SOLVES")
            .describe("Source resolves the problem described by target")
            .require("solution_type"),
        RelationTypeSpec::new("CAUSES")
            .describe("Source describes a cause of target")
            .transitive(),
        RelationTypeSpec::new("PREVENTS")
            .describe("Source prevents the problem described by target"),
    ]
}
