//! SeerShape: persistent identity and genealogy for B-rep sub-entities.
//!
//! A parametric CAD model is regenerated from its feature history every time a
//! parameter changes, and the geometry kernel hands back brand-new shape
//! objects each time. Anything that referred to "this edge" or "that face" of
//! the previous result (a fillet selection, a sketch attachment, a
//! dimension) needs a name that survives the rebuild. This crate supplies
//! those names.
//!
//! For each feature output a [`SeerShape`] keeps:
//! - an identity table binding every sub-entity to a [`StableId`];
//! - a containment graph (solid ⊃ shell ⊃ face ⊃ wire ⊃ edge ⊃ vertex) for
//!   structural queries;
//! - an append-only evolution ledger recording which ids became which;
//! - a feature-tag table and a derived-id table.
//!
//! After a regeneration, the matching strategies in [`matching`] carry ids
//! over from the previous version or from upstream features, guided by
//! shape identity, the kernel's "modified" history, and topology. A cleanup
//! pass then guarantees every entity has a unique non-nil id.
//!
//! The geometry kernel stays outside: it is reached through the traits in
//! [`kernel`]. [`reference`] provides a small in-memory kernel.
//!
//! # References
//!
//! - Kripac, J. "A mechanism for persistently naming topological entities in history-based parametric solid models" (1997)
//! - Capoyleas, Chen, Hoffmann. "Generic naming in generative, constraint-based design" (1996)
//!
//! # Example
//!
//! ```
//! use seershape::prelude::*;
//! use seershape::reference::{box_topology, ReferenceHistory, ReferenceShape};
//!
//! // The upstream feature resolved its box.
//! let old = box_topology(1.0, 1.0, 1.0);
//! let mut upstream = SeerShape::new();
//! upstream.set_shape(old.solid.clone());
//! upstream.ensure_no_nils();
//!
//! // The box was rebuilt taller; the kernel reports which face became which.
//! let new = box_topology(1.0, 1.0, 2.0);
//! let mut history = ReferenceHistory::new();
//! for (a, b) in old.faces.iter().zip(&new.faces) {
//!     history.record(a, b);
//! }
//!
//! let mut feature = SeerShape::new();
//! let ctx = MatchContext::<ReferenceShape>::new().with_oracle(&history);
//! let report = feature.regenerate(new.solid.clone(), &upstream, &MatchPlan::default(), &ctx);
//! assert_eq!(report.resolved_by(Strategy::FaceEdge), 12);
//!
//! let top_before = upstream.find_id(&old.faces[1]);
//! let top_after = feature.find_id(&new.faces[1]);
//! assert_eq!(feature.devolve(&top_after), vec![top_before]);
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod evolution;
pub mod fingerprint;
pub mod graph;
pub mod history;
pub mod id;
pub mod kernel;
pub mod matching;
pub mod persist;
pub mod query;
pub mod reference;
pub mod seer;
pub mod table;
pub mod tags;

pub use config::{MatchContext, MatchPlan, MatchReport, Strategy};
pub use error::{Result, SeerError};
pub use evolution::{EvolutionLedger, EvolveRecord};
pub use history::{HistoryGraph, ShapeHistory};
pub use id::{IdSource, RandomIds, SequentialIds, StableId};
pub use kernel::{Geometry, ModifiedOracle, Point3, Shape, ShapeType};
pub use persist::{LoadReport, Snapshot};
pub use seer::SeerShape;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::config::{MatchContext, MatchPlan, MatchReport, Strategy};
    pub use crate::error::{Result, SeerError};
    pub use crate::fingerprint::HashValue;
    pub use crate::history::{HistoryGraph, ShapeHistory};
    pub use crate::id::{IdSource, RandomIds, SequentialIds, StableId};
    pub use crate::kernel::{canonical_enumeration, Geometry, ModifiedOracle, Point3, Shape, ShapeType};
    pub use crate::persist::{LoadReport, Snapshot};
    pub use crate::seer::SeerShape;
}
