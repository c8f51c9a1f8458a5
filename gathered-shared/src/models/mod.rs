/// Database models for GatherEd
///
/// Each model owns its SQL. Higher layers reach these through the store
/// traits in [`crate::store`], never directly.
///
/// # Models
///
/// - `identity`: email + password hash, owned by the identity store
/// - `profile`: administrator and student profiles, and [`profile::Role`]
/// - `school`: tenants
/// - `pending_registration`: sign-ups awaiting verification
/// - `event`, `announcement`, `feedback`: school-scoped content
/// - `event_registration`: student registrations for events
///
/// # Example
///
/// ```no_run
/// use gathered_shared::models::school::School;
/// use gathered_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let school = School::create(&pool, "Cebu Institute of Technology").await?;
/// println!("Created school: {}", school.id);
/// # Ok(())
/// # }
/// ```

pub mod announcement;
pub mod event;
pub mod event_registration;
pub mod feedback;
pub mod identity;
pub mod pending_registration;
pub mod profile;
pub mod school;
