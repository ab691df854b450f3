//! Error type shared by the document store and the geometry resolver.
//!
//! Every variant is returned *before* any state is touched: a failed
//! operation leaves the store exactly as it found it.

use crate::doc::{ElementId, ElementKind};

/// Why a store or geometry operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    /// The referenced element is not in the store.
    #[error("element not found: {0}")]
    NotFound(ElementId),
    /// An element with this id already exists.
    #[error("duplicate element id: {0}")]
    DuplicateId(ElementId),
    /// Reparenting would make the element its own ancestor.
    #[error("parenting {child} under {parent} would create a cycle")]
    Cycle { child: ElementId, parent: ElementId },
    /// The ancestor walk exceeded the depth cap.
    #[error("ancestor chain of {0} exceeds the maximum depth")]
    DepthExceeded(ElementId),
    /// An element's `parent_id` names an element that no longer exists.
    #[error("element {child} references missing parent {parent}")]
    DanglingParent { child: ElementId, parent: ElementId },
    /// The element cannot take part in positional nesting.
    #[error("element {0} cannot be used as a parent or child")]
    InvalidParent(ElementId),
    /// `group_id` must reference a group-kind element.
    #[error("element {0} is not a valid group reference")]
    InvalidGroup(ElementId),
    /// Ungroup was asked for an element that is not a group.
    #[error("element {0} is not a group")]
    NotAGroup(ElementId),
    /// A connection endpoint is missing, is itself a connection, or repeats the other end.
    #[error("invalid connection endpoint: {0}")]
    InvalidEndpoint(ElementId),
    /// A field is not legal for the element's kind.
    #[error("field `{field}` is not valid for {kind:?} elements")]
    InvalidField { kind: ElementKind, field: &'static str },
}
