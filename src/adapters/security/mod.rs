//! Security adapters.
//!
//! - `HmacTokenSigner` - Binds cache tokens to a subscriber session
//! - `MembershipPermissionChecker` - Scope membership visibility rules

mod hmac_signer;
mod membership_permission_checker;

pub use hmac_signer::HmacTokenSigner;
pub use membership_permission_checker::MembershipPermissionChecker;
