//! Capability traits consumed by the login pipeline.

/// A single granted capability, exposed as its authority string
/// (e.g. `"ROLE_ADMIN"`).
pub trait Authority {
    fn authority(&self) -> &str;
}

/// Credentials of a principal as seen by authentication and authorization.
///
/// Implementors expose the login identifier, the stored secret hash (never the
/// plaintext) and the set of granted capabilities.
pub trait Credential {
    /// Unique login identifier.
    fn identifier(&self) -> &str;

    /// Opaque stored secret hash.
    fn secret_hash(&self) -> &str;

    /// Authority strings of every granted capability, in no particular order.
    fn capabilities(&self) -> Vec<&str>;

    /// Exact, case-sensitive membership check.
    fn has_capability(&self, authority: &str) -> bool {
        self.capabilities().contains(&authority)
    }
}
