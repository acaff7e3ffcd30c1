//! Identity command implementation.

use crate::cli::IdentityArgs;
use crate::error::Result;
use crate::identity::parse_identity;
use tracing::debug;

/// Print the numeric source id encoded in a reflected identity.
///
/// # Errors
///
/// Returns [`MigrateError::IdentityParse`](crate::error::MigrateError::IdentityParse)
/// if the value is not a locator ending in an integer.
pub fn execute(args: &IdentityArgs) -> Result<()> {
    let id = parse_identity(&args.value)?;
    debug!(value = %args.value, id, "Parsed identity");
    println!("{id}");
    Ok(())
}
