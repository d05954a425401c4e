/// Identity snapshot delivered to session observers.
///
/// Observers receive the username only; the bearer token never leaves the
/// session manager through this path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}
