//! Role resolution and authorization checkpoint for Taskboard Engine
//!
//! Answers one question for every feature module: may actor X perform an
//! operation requiring role set R on resource Y? The pieces:
//!
//! - **Role resolution** (`resolver`): a user's effective role on a project
//!   or group, with the ownership override (`owner`/`leader` field always
//!   counts as the top role) and, for groups, only `accepted` rows counting.
//! - **Permission checking** (`check`): the top role passes any required
//!   set, no role passes none, everything else passes by set membership;
//!   plus the convenience predicates (`can_edit_task`,
//!   `can_update_task_status`, ...).
//! - **Authorization checkpoint** (`policy`): `RequiredRoles` consts
//!   declared next to the operations they protect, enforced by
//!   [`Authorizer`] against the request's actor and an explicit resource id.
//!
//! Membership rows themselves are mutated through the `membership-engine`
//! workflows, not through this crate.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use auth_roles::{Authorizer, RequestContext, EDIT_PROJECT};
//! use membership_engine::{
//!     InMemoryGroupRepository, InMemoryProjectRepository, InMemoryUserDirectory, ProjectService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let projects = Arc::new(InMemoryProjectRepository::new());
//!     let groups = Arc::new(InMemoryGroupRepository::new());
//!     let users = Arc::new(InMemoryUserDirectory::new());
//!
//!     let owner = users.add_user("own@example.com");
//!     let project = ProjectService::new(projects.clone(), users.clone())
//!         .create("apollo", None, owner)
//!         .await?;
//!
//!     let authorizer = Authorizer::new(projects, groups);
//!     let ctx = RequestContext::for_actor(owner);
//!     authorizer.authorize_project(&ctx, EDIT_PROJECT, project.id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod check;
pub mod error;
pub mod policy;
pub mod resolver;

pub use check::*;
pub use error::*;
pub use policy::*;
pub use resolver::*;
