//! # Schema Sync
//!
//! Extracts collection schemas from annotated Python model classes and
//! synchronizes them into an Appwrite database.
//!
//! Model classes declare their fields with attribute declarators:
//!
//! ```python
//! class UserProfile(Model):
//!     bio: Optional[str] = StringAttribute(size=500)
//!     age: int = IntegerAttribute(min=0, max=150, required=True)
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │ Scanner  │──▶│ Builder  │──▶│ Reconcile   │──▶│  Apply   │
//! │ .py tree │   │ catalog  │   │ vs snapshot │   │  store   │
//! └──────────┘   └──────────┘   └─────────────┘   └──────────┘
//! ```
//!
//! Planning is pure. Only the snapshot fetch and apply talk to the store,
//! and nothing is ever deleted remotely.
//!
//! ## Quick Start
//!
//! ```bash
//! schemasync scan ./models                 # show what would be synced
//! schemasync plan ./models --update        # diff against the live database
//! schemasync create ./models               # create missing collections
//! schemasync update ./models --dry-run     # preview an update
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Attribute kinds, legal constraints, store payloads |
//! | [`scanner`] | Python source scanning |
//! | [`builder`] | Canonical descriptor normalization |
//! | [`reconcile`] | Plan computation and field-level merge |
//! | [`apply`] | Plan execution |
//! | [`store`] | Store trait and in-memory store |
//! | [`appwrite`] | Appwrite REST store |
//! | [`sync`] | Pipeline orchestration and CLI output |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`progress`] | Progress reporting |

pub mod appwrite;
pub mod apply;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod scanner;
pub mod store;
pub mod sync;
