use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

/// Password and ban checks consulted while a participant joins.
pub trait CredentialStore {
    fn game_password_required(&self) -> bool;

    fn verify_game_password(&self, password: &str) -> bool;

    fn company_password_required(&self, role: u8) -> bool;

    fn verify_company_password(&self, role: u8, password: &str) -> bool;

    /// Replace the password guarding `role`. An empty password removes it.
    fn set_company_password(&mut self, role: u8, password: &str);

    fn is_banned(&self, _peer: &SocketAddr) -> bool {
        false
    }
}

/// Fixed credentials, typically built from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    game_password: Option<String>,
    company_passwords: HashMap<u8, String>,
    banned: HashSet<IpAddr>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty password means no password.
    pub fn with_game_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.game_password = (!password.is_empty()).then_some(password);
        self
    }

    pub fn with_company_password(mut self, role: u8, password: impl Into<String>) -> Self {
        self.company_passwords.insert(role, password.into());
        self
    }

    pub fn ban(&mut self, ip: IpAddr) {
        self.banned.insert(ip);
    }

    pub fn unban(&mut self, ip: &IpAddr) -> bool {
        self.banned.remove(ip)
    }
}

impl CredentialStore for StaticCredentials {
    fn game_password_required(&self) -> bool {
        self.game_password.is_some()
    }

    fn verify_game_password(&self, password: &str) -> bool {
        self.game_password.as_deref().is_none_or(|p| p == password)
    }

    fn company_password_required(&self, role: u8) -> bool {
        self.company_passwords
            .get(&role)
            .is_some_and(|p| !p.is_empty())
    }

    fn verify_company_password(&self, role: u8, password: &str) -> bool {
        self.company_passwords
            .get(&role)
            .is_none_or(|p| p == password)
    }

    fn set_company_password(&mut self, role: u8, password: &str) {
        if password.is_empty() {
            self.company_passwords.remove(&role);
        } else {
            self.company_passwords.insert(role, password.to_string());
        }
    }

    fn is_banned(&self, peer: &SocketAddr) -> bool {
        self.banned.contains(&peer.ip())
    }
}
